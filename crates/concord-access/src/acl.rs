// acl.rs — Access control list data model.
//
// An AccessControlList is owned one-to-one by an intent. Absence of an ACL
// is meaningful and distinct from an ACL with zero entries: absence defers
// to the server-wide default policy (open), while a present ACL with
// `default_policy: closed` denies every unlisted principal.
//
// Invariant: at most one *active* (non-expired) entry per principal. The
// replace path (`upsert`) enforces this; the additive path (`insert`)
// surfaces a Conflict instead of silently duplicating.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AccessError;
use crate::tier::{PrincipalKind, Tier};

/// One principal's grant on one intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessEntry {
    /// Unique identifier for this entry.
    pub entry_id: Uuid,

    /// The principal this entry grants access to.
    pub principal_id: String,

    /// Whether the principal is a user, agent, or group.
    pub principal_kind: PrincipalKind,

    /// The granted permission tier.
    pub tier: Tier,

    /// Who issued the grant.
    pub granted_by: String,

    /// When the grant was issued.
    pub granted_at: DateTime<Utc>,

    /// Optional hard cutoff. An entry with `expires_at <= now` is treated
    /// as absent at read time — correctness never waits for a sweep.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    /// Optional free-text justification for the grant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,
}

impl AccessEntry {
    /// Create a new entry with a fresh id and the current timestamp.
    pub fn new(
        principal_id: impl Into<String>,
        principal_kind: PrincipalKind,
        tier: Tier,
        granted_by: impl Into<String>,
    ) -> Self {
        Self {
            entry_id: Uuid::new_v4(),
            principal_id: principal_id.into(),
            principal_kind,
            tier,
            granted_by: granted_by.into(),
            granted_at: Utc::now(),
            expires_at: None,
            justification: None,
        }
    }

    /// Set the expiry and return self (builder pattern).
    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Set the justification and return self.
    pub fn with_justification(mut self, justification: impl Into<String>) -> Self {
        self.justification = Some(justification.into());
        self
    }

    /// Whether this entry is expired as of `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Whether this entry is active (not expired) as of `now`.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.is_expired(now)
    }
}

/// What a present ACL says about principals it does not list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultPolicy {
    /// Unlisted principals get read access.
    Open,
    /// Unlisted principals get nothing.
    Closed,
}

/// The access control list for one intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessControlList {
    /// The intent this ACL belongs to.
    pub intent_id: Uuid,

    /// Policy for principals without an entry.
    pub default_policy: DefaultPolicy,

    /// The entries. Order carries no meaning.
    pub entries: Vec<AccessEntry>,
}

impl AccessControlList {
    /// Create an empty ACL with the given default policy.
    pub fn new(intent_id: Uuid, default_policy: DefaultPolicy) -> Self {
        Self {
            intent_id,
            default_policy,
            entries: Vec::new(),
        }
    }

    /// The active entry for a principal as of `now`, if any.
    pub fn active_entry(&self, principal_id: &str, now: DateTime<Utc>) -> Option<&AccessEntry> {
        self.entries
            .iter()
            .filter(|e| e.principal_id == principal_id && e.is_active(now))
            .max_by_key(|e| e.granted_at)
    }

    /// All active entries as of `now`. Expiry is evaluated here, at read
    /// time — a stale entry is never returned even if no sweep has run.
    pub fn list_active(&self, now: DateTime<Utc>) -> Vec<&AccessEntry> {
        self.entries.iter().filter(|e| e.is_active(now)).collect()
    }

    /// Insert or replace the entry for `entry.principal_id`.
    ///
    /// Enforces the one-active-entry invariant: any existing entries for the
    /// same principal are dropped and the most recent one returned, so the
    /// second grant's metadata supersedes the first.
    pub fn upsert(&mut self, entry: AccessEntry) -> Option<AccessEntry> {
        let mut replaced: Option<AccessEntry> = None;
        self.entries.retain(|e| {
            if e.principal_id == entry.principal_id {
                if replaced
                    .as_ref()
                    .is_none_or(|r| e.granted_at > r.granted_at)
                {
                    replaced = Some(e.clone());
                }
                false
            } else {
                true
            }
        });
        self.entries.push(entry);
        replaced
    }

    /// Strictly additive insert. Fails with `Conflict` if the principal
    /// already holds an active entry; expired leftovers are pruned instead.
    pub fn insert(&mut self, entry: AccessEntry, now: DateTime<Utc>) -> Result<(), AccessError> {
        if self.active_entry(&entry.principal_id, now).is_some() {
            return Err(AccessError::Conflict {
                intent_id: self.intent_id,
                principal_id: entry.principal_id.clone(),
            });
        }
        self.entries
            .retain(|e| e.principal_id != entry.principal_id);
        self.entries.push(entry);
        Ok(())
    }

    /// Remove an entry by id. Returns the removed entry, if it existed.
    pub fn remove(&mut self, entry_id: Uuid) -> Option<AccessEntry> {
        let idx = self.entries.iter().position(|e| e.entry_id == entry_id)?;
        Some(self.entries.remove(idx))
    }

    /// Remove all entries for a principal. Returns the removed entries.
    pub fn remove_principal(&mut self, principal_id: &str) -> Vec<AccessEntry> {
        let (removed, kept) = self
            .entries
            .drain(..)
            .partition(|e| e.principal_id == principal_id);
        self.entries = kept;
        removed
    }

    /// Drop expired entries as of `now`. Returns what was pruned, so the
    /// caller can emit `access_expired` events and run the cascade per entry.
    pub fn prune_expired(&mut self, now: DateTime<Utc>) -> Vec<AccessEntry> {
        let (expired, kept) = self.entries.drain(..).partition(|e| e.is_expired(now));
        self.entries = kept;
        expired
    }
}
