// revocation.rs — The revocation cascade.
//
// Losing access is a three-step teardown, ordered so security wins even if
// the cascade is interrupted: (1) remove the ACL entries — this alone is
// authoritative, permission checks fail from here on; (2) revoke active
// leases, best effort with one retry; (3) invalidate cached contexts. A
// lease-teardown failure never resurrects the entry.
//
// The same cascade runs when an entry expires, with the expiry sweep as the
// trigger instead of an admin.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use concord_access::{AccessEntry, AccessError, AclStore, LeaseManager, RemovalKind};
use concord_context::ContextCache;

/// Outcome of one cascade run for one principal.
#[derive(Debug, Clone)]
pub struct CascadeOutcome {
    pub intent_id: Uuid,
    pub principal_id: String,
    /// The ACL entries actually removed. Empty means there was nothing to
    /// revoke — the cascade is then a no-op end to end.
    pub removed: Vec<AccessEntry>,
    /// Whether lease teardown succeeded. `false` leaves orphaned leases for
    /// the lease manager's own expiry to collect; access is already gone.
    pub leases_revoked: bool,
}

/// Coordinates ACL removal, lease teardown, and cache invalidation.
pub struct RevocationCascade {
    acl: Arc<AclStore>,
    leases: Arc<dyn LeaseManager>,
    cache: Arc<ContextCache>,
}

impl RevocationCascade {
    pub fn new(
        acl: Arc<AclStore>,
        leases: Arc<dyn LeaseManager>,
        cache: Arc<ContextCache>,
    ) -> Self {
        Self { acl, leases, cache }
    }

    /// Revoke a principal's access to an intent and tear down what depends
    /// on it. ACL removal is the authoritative step; everything after is
    /// best effort and never rolls it back.
    pub fn revoke(
        &self,
        intent_id: Uuid,
        principal_id: &str,
        acting_principal: &str,
    ) -> Result<CascadeOutcome, AccessError> {
        let removed =
            self.acl
                .remove_principal(intent_id, principal_id, acting_principal, RemovalKind::Revoked)?;
        if removed.is_empty() {
            return Ok(CascadeOutcome {
                intent_id,
                principal_id: principal_id.to_string(),
                removed,
                leases_revoked: true,
            });
        }

        let leases_revoked = self.teardown_leases(intent_id, principal_id);
        self.cache.invalidate_all(intent_id);
        info!(
            intent = %intent_id,
            principal = principal_id,
            entries = removed.len(),
            leases_revoked,
            "revocation cascade complete"
        );
        Ok(CascadeOutcome {
            intent_id,
            principal_id: principal_id.to_string(),
            removed,
            leases_revoked,
        })
    }

    /// Drop entries past their expiry across every stored ACL, running the
    /// post-removal half of the cascade for each affected principal.
    ///
    /// Expiry is already enforced lazily at read time; the sweep reclaims
    /// storage and tears down leases that outlived their grant. Returns the
    /// number of entries pruned.
    pub fn expire_sweep(&self, now: DateTime<Utc>) -> Result<usize, AccessError> {
        let mut total = 0;
        for intent_id in self.acl.intent_ids()? {
            let expired = self.acl.prune_expired(intent_id, now)?;
            if expired.is_empty() {
                continue;
            }
            for entry in &expired {
                self.teardown_leases(intent_id, &entry.principal_id);
            }
            self.cache.invalidate_all(intent_id);
            total += expired.len();
        }
        if total > 0 {
            info!(pruned = total, "expiry sweep complete");
        }
        Ok(total)
    }

    /// One retry, then give up and leave the leases to their own expiry.
    fn teardown_leases(&self, intent_id: Uuid, principal_id: &str) -> bool {
        for attempt in 1..=2 {
            match self.leases.revoke_leases_for(intent_id, principal_id) {
                Ok(()) => return true,
                Err(err) => {
                    warn!(
                        intent = %intent_id,
                        principal = principal_id,
                        attempt,
                        error = %err,
                        "lease teardown failed"
                    );
                }
            }
        }
        false
    }
}
