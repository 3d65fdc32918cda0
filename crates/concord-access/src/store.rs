// store.rs — AclStore: persistence and serialization scope for ACLs.
//
// Each intent's ACL is stored as a JSON file: `<store_dir>/<intent_id>.json`.
// This keeps intents isolated and makes the store easy to inspect manually.
//
// Concurrency: every mutating call runs inside a per-intent mutex, so
// concurrent grant/revoke on the same intent serialize into exactly one
// deterministic outcome. Reads do not take the mutex — writes go through a
// temp file plus rename, so a reader never observes a half-applied entry
// list. There is no lock spanning different intents.
//
// Side effect contract: every mutating call appends exactly one audit event
// per affected entry (`access_granted`, `access_revoked`, `access_expired`)
// carrying the acting principal.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use crate::acl::{AccessControlList, AccessEntry, DefaultPolicy};
use crate::audit::{AccessEventKind, EventLog, EventRecord};
use crate::error::AccessError;

/// How an entry left the ACL — decides which audit event is appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalKind {
    /// Explicitly revoked by a principal.
    Revoked,
    /// Hit its expiry cutoff.
    Expired,
}

/// Persistent store for per-intent ACLs.
pub struct AclStore {
    store_dir: PathBuf,
    /// One mutex per intent, created lazily. Guards mutations only.
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
    events: Arc<dyn EventLog>,
}

impl AclStore {
    /// Create a store backed by the given directory.
    /// Creates the directory if it doesn't exist.
    pub fn new(store_dir: impl AsRef<Path>, events: Arc<dyn EventLog>) -> Result<Self, AccessError> {
        let store_dir = store_dir.as_ref().to_path_buf();
        fs::create_dir_all(&store_dir).map_err(|source| AccessError::Io {
            path: store_dir.display().to_string(),
            source,
        })?;
        Ok(Self {
            store_dir,
            locks: Mutex::new(HashMap::new()),
            events,
        })
    }

    /// Get the ACL for an intent. `None` means the intent has no ACL, which
    /// defers to the server-wide default policy — distinct from an empty ACL.
    pub fn get(&self, intent_id: Uuid) -> Result<Option<AccessControlList>, AccessError> {
        let path = self.acl_file(intent_id);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path).map_err(|source| AccessError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let acl: AccessControlList = serde_json::from_str(&json)?;
        Ok(Some(acl))
    }

    /// Full replace — used for initial creation and inheritance.
    pub fn put(
        &self,
        acl: AccessControlList,
        acting_principal: &str,
    ) -> Result<(), AccessError> {
        let lock = self.intent_lock(acl.intent_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let intent_id = acl.intent_id;
        let entries = acl.entries.len();
        self.save(&acl)?;
        self.emit(
            EventRecord::access(intent_id, AccessEventKind::AccessGranted, acting_principal)
                .with_payload(serde_json::json!({ "replaced_acl": true, "entries": entries })),
        );
        Ok(())
    }

    /// Insert or replace the entry for `entry.principal_id`, enforcing the
    /// one-active-entry invariant. Creates an open-policy ACL if the intent
    /// had none, preserving the open default for unlisted principals.
    pub fn upsert_entry(
        &self,
        intent_id: Uuid,
        entry: AccessEntry,
        acting_principal: &str,
    ) -> Result<AccessEntry, AccessError> {
        let lock = self.intent_lock(intent_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut acl = self
            .get(intent_id)?
            .unwrap_or_else(|| AccessControlList::new(intent_id, DefaultPolicy::Open));
        let replaced = acl.upsert(entry.clone());
        self.save(&acl)?;
        self.emit(
            EventRecord::access(intent_id, AccessEventKind::AccessGranted, acting_principal)
                .with_payload(serde_json::json!({
                    "principal": entry.principal_id,
                    "tier": entry.tier,
                    "replaced": replaced.is_some(),
                })),
        );
        Ok(entry)
    }

    /// Strictly additive insert. Fails with `Conflict` if the principal
    /// already holds an active entry.
    pub fn insert_entry(
        &self,
        intent_id: Uuid,
        entry: AccessEntry,
        acting_principal: &str,
        now: DateTime<Utc>,
    ) -> Result<AccessEntry, AccessError> {
        let lock = self.intent_lock(intent_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut acl = self
            .get(intent_id)?
            .unwrap_or_else(|| AccessControlList::new(intent_id, DefaultPolicy::Open));
        acl.insert(entry.clone(), now)?;
        self.save(&acl)?;
        self.emit(
            EventRecord::access(intent_id, AccessEventKind::AccessGranted, acting_principal)
                .with_payload(serde_json::json!({
                    "principal": entry.principal_id,
                    "tier": entry.tier,
                    "replaced": false,
                })),
        );
        Ok(entry)
    }

    /// Remove one entry by id. Returns the removed entry, or `None` if
    /// neither the ACL nor the entry exists.
    pub fn remove_entry(
        &self,
        intent_id: Uuid,
        entry_id: Uuid,
        acting_principal: &str,
    ) -> Result<Option<AccessEntry>, AccessError> {
        let lock = self.intent_lock(intent_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let Some(mut acl) = self.get(intent_id)? else {
            return Ok(None);
        };
        let Some(removed) = acl.remove(entry_id) else {
            return Ok(None);
        };
        self.save(&acl)?;
        self.emit(
            EventRecord::access(intent_id, AccessEventKind::AccessRevoked, acting_principal)
                .with_payload(serde_json::json!({
                    "principal": removed.principal_id,
                    "entry_id": removed.entry_id,
                })),
        );
        Ok(Some(removed))
    }

    /// Remove every entry a principal holds on an intent. Used by the
    /// revocation cascade. Returns the removed entries.
    pub fn remove_principal(
        &self,
        intent_id: Uuid,
        principal_id: &str,
        acting_principal: &str,
        kind: RemovalKind,
    ) -> Result<Vec<AccessEntry>, AccessError> {
        let lock = self.intent_lock(intent_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let Some(mut acl) = self.get(intent_id)? else {
            return Ok(Vec::new());
        };
        let removed = acl.remove_principal(principal_id);
        if removed.is_empty() {
            return Ok(Vec::new());
        }
        self.save(&acl)?;
        let event_kind = match kind {
            RemovalKind::Revoked => AccessEventKind::AccessRevoked,
            RemovalKind::Expired => AccessEventKind::AccessExpired,
        };
        for entry in &removed {
            self.emit(
                EventRecord::access(intent_id, event_kind, acting_principal).with_payload(
                    serde_json::json!({
                        "principal": entry.principal_id,
                        "entry_id": entry.entry_id,
                        "tier": entry.tier,
                    }),
                ),
            );
        }
        Ok(removed)
    }

    /// Drop expired entries for one intent as of `now`, appending one
    /// `access_expired` event per pruned entry. Returns what was pruned.
    pub fn prune_expired(
        &self,
        intent_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<AccessEntry>, AccessError> {
        let lock = self.intent_lock(intent_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let Some(mut acl) = self.get(intent_id)? else {
            return Ok(Vec::new());
        };
        let expired = acl.prune_expired(now);
        if expired.is_empty() {
            return Ok(Vec::new());
        }
        self.save(&acl)?;
        for entry in &expired {
            self.emit(
                EventRecord::access(intent_id, AccessEventKind::AccessExpired, "system")
                    .with_payload(serde_json::json!({
                        "principal": entry.principal_id,
                        "entry_id": entry.entry_id,
                        "expired_at": entry.expires_at,
                    })),
            );
        }
        Ok(expired)
    }

    /// Active entries for an intent as of `now`. Expiry is evaluated here,
    /// lazily — an expired entry is never returned even before any sweep.
    pub fn list_active(
        &self,
        intent_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<AccessEntry>, AccessError> {
        match self.get(intent_id)? {
            Some(acl) => Ok(acl.list_active(now).into_iter().cloned().collect()),
            None => Ok(Vec::new()),
        }
    }

    /// All intent ids with a stored ACL. Used by the expiry sweep.
    pub fn intent_ids(&self) -> Result<Vec<Uuid>, AccessError> {
        let entries = fs::read_dir(&self.store_dir).map_err(|source| AccessError::Io {
            path: self.store_dir.display().to_string(),
            source,
        })?;
        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| AccessError::Io {
                path: self.store_dir.display().to_string(),
                source,
            })?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    if let Ok(id) = Uuid::parse_str(stem) {
                        ids.push(id);
                    }
                }
            }
        }
        Ok(ids)
    }

    /// Write the ACL via temp file + rename so readers see old or new,
    /// never a torn entry list.
    fn save(&self, acl: &AccessControlList) -> Result<(), AccessError> {
        let path = self.acl_file(acl.intent_id);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(acl)?;
        fs::write(&tmp, json).map_err(|source| AccessError::Io {
            path: tmp.display().to_string(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| AccessError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(())
    }

    /// Append an audit event. The ACL mutation is the authoritative step:
    /// an append failure is logged, not propagated.
    fn emit(&self, event: EventRecord) {
        if let Err(err) = self.events.append(event) {
            warn!(error = %err, "audit event append failed");
        }
    }

    fn intent_lock(&self, intent_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        locks
            .entry(intent_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn acl_file(&self, intent_id: Uuid) -> PathBuf {
        self.store_dir.join(format!("{}.json", intent_id))
    }
}
