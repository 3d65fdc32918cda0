// resolver.rs — Effective permission resolution.
//
// The single chokepoint for authorization: every protected operation calls
// `resolve()` (or the `require()` gate built on it) before proceeding.
//
// The algorithm, first match wins:
//   1. Intent creator → admin.
//   2. Active AccessEntry for the principal (expiry evaluated at `now`) → its tier.
//   3. Group entries whose membership (per the external directory) contains
//      the principal → highest matching tier.
//   4. No ACL, or ACL with open default policy → read.
//   5. Otherwise → no access.
//
// Fail-closed: any internal error resolves to no access, never a higher tier.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use crate::acl::AccessControlList;
use crate::collab::{Directory, IntentGraph};
use crate::error::AccessError;
use crate::store::AclStore;
use crate::tier::{PrincipalKind, Tier};

/// Computes a principal's effective permission on an intent at an instant.
pub struct PermissionResolver {
    store: Arc<AclStore>,
    graph: Arc<dyn IntentGraph>,
    /// Optional: without a directory, group entries simply never match.
    directory: Option<Arc<dyn Directory>>,
}

impl PermissionResolver {
    pub fn new(store: Arc<AclStore>, graph: Arc<dyn IntentGraph>) -> Self {
        Self {
            store,
            graph,
            directory: None,
        }
    }

    /// Attach the external directory used to match group entries.
    pub fn with_directory(mut self, directory: Arc<dyn Directory>) -> Self {
        self.directory = Some(directory);
        self
    }

    /// The effective tier for (principal, intent) at `now`.
    /// `None` means no access.
    pub fn resolve(&self, principal_id: &str, intent_id: Uuid, now: DateTime<Utc>) -> Option<Tier> {
        // Step 1: creator attribution.
        match self.graph.creator_of(intent_id) {
            Ok(Some(creator)) if creator == principal_id => return Some(Tier::Admin),
            Ok(_) => {}
            Err(err) => {
                warn!(intent = %intent_id, error = %err, "creator lookup failed; resolving as no access");
                return None;
            }
        }

        let acl = match self.store.get(intent_id) {
            Ok(acl) => acl,
            Err(err) => {
                warn!(intent = %intent_id, error = %err, "ACL read failed; resolving as no access");
                return None;
            }
        };

        match acl {
            Some(acl) => {
                // Step 2: direct entry.
                if let Some(entry) = acl.active_entry(principal_id, now) {
                    return Some(entry.tier);
                }
                // Step 3: group entries, resolved through the directory.
                if let Some(tier) = self.group_tier(&acl, principal_id, now) {
                    return Some(tier);
                }
                // Step 4/5: default policy for unlisted principals.
                match acl.default_policy {
                    crate::acl::DefaultPolicy::Open => Some(Tier::Read),
                    crate::acl::DefaultPolicy::Closed => None,
                }
            }
            // No ACL at all defers to the server-wide default: open.
            None => Some(Tier::Read),
        }
    }

    /// Gate for protected operations: succeeds with the caller's tier when it
    /// satisfies `required`, otherwise fails with `Forbidden` carrying both
    /// tiers so the caller can self-serve an access request.
    pub fn require(
        &self,
        principal_id: &str,
        intent_id: Uuid,
        now: DateTime<Utc>,
        required: Tier,
    ) -> Result<Tier, AccessError> {
        let current = self.resolve(principal_id, intent_id, now);
        match current {
            Some(tier) if tier.allows(required) => Ok(tier),
            _ => Err(AccessError::Forbidden { required, current }),
        }
    }

    /// Highest tier among active group entries whose membership contains the
    /// principal. Directory failures skip the entry (fail-closed).
    fn group_tier(
        &self,
        acl: &AccessControlList,
        principal_id: &str,
        now: DateTime<Utc>,
    ) -> Option<Tier> {
        let directory = self.directory.as_ref()?;
        acl.list_active(now)
            .into_iter()
            .filter(|e| e.principal_kind == PrincipalKind::Group)
            .filter(|e| match directory.resolve_group_members(&e.principal_id) {
                Ok(members) => members.contains(principal_id),
                Err(err) => {
                    warn!(group = %e.principal_id, error = %err, "group resolution failed; skipping entry");
                    false
                }
            })
            .map(|e| e.tier)
            .max()
    }
}
