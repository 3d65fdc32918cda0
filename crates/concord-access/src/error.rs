// error.rs — Error taxonomy for the access core.
//
// One enum covers the whole core so that callers at the API boundary see a
// single, stable set of failure shapes. `Forbidden` deliberately carries both
// the required tier and the caller's current tier: an automated caller can
// read those and self-serve an access request instead of failing silently.

use thiserror::Error;
use uuid::Uuid;

use crate::tier::Tier;

/// Errors that can occur during access-core operations.
#[derive(Debug, Error)]
pub enum AccessError {
    /// The principal's effective tier is below what the operation requires.
    ///
    /// `current` is `None` when the principal has no access at all.
    /// Callers holding this error can submit an access request for `required`.
    #[error("forbidden: requires {required} access, caller has {}; submit an access request to obtain it", display_tier(.current))]
    Forbidden {
        required: Tier,
        current: Option<Tier>,
    },

    /// The intent does not exist, or its existence is masked from the caller.
    #[error("intent not found: {0}")]
    IntentNotFound(Uuid),

    /// The access request does not exist.
    #[error("access request not found: {0}")]
    RequestNotFound(Uuid),

    /// An additive grant collided with an existing active entry.
    /// The replace path (`upsert_entry`) is the way to change a grant.
    #[error("conflict: principal '{principal_id}' already holds an active entry on intent {intent_id}")]
    Conflict {
        intent_id: Uuid,
        principal_id: String,
    },

    /// Attempted to mutate an access request that has already been resolved.
    #[error("access request {request_id} is {status} and cannot be changed; submit a new request")]
    TerminalState { request_id: Uuid, status: String },

    /// The request-evaluation hook did not answer within its time budget.
    /// Treated as `defer` by the workflow — never as approval.
    #[error("policy hook for intent {intent_id} timed out after {timeout_ms}ms")]
    PolicyHookTimeout { intent_id: Uuid, timeout_ms: u64 },

    /// A collaborator call failed (event log, intent graph, leasing, ...).
    #[error("collaborator '{collaborator}' failed: {reason}")]
    Collaborator {
        collaborator: &'static str,
        reason: String,
    },

    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// Failed to serialize/deserialize a record.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn display_tier(tier: &Option<Tier>) -> String {
    match tier {
        Some(t) => t.to_string(),
        None => "no access".to_string(),
    }
}
