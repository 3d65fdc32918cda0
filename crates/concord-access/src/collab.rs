// collab.rs — Boundary traits for external collaborators.
//
// The access core does not own the intent graph, the leasing subsystem,
// attachment storage, or governance recording. It talks to each through a
// narrow trait defined here, so the surrounding server can wire in whatever
// transport or store it uses. Everything crossing these boundaries is
// passed by value — the core never holds references into collaborator state.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AccessError;
use crate::tier::Tier;

/// Summary of an intent's parent, as returned by the intent graph.
///
/// Carries every grade of detail; context filtering decides which fields a
/// given tier actually sees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParentSummary {
    pub intent_id: Uuid,
    pub title: String,
    pub status: String,
    /// Current working state — write tier and up.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_state: Option<serde_json::Value>,
    /// The full parent object, internal fields included — admin only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
}

/// One upstream dependency's outcome, keyed by dependency title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyResult {
    pub status: String,
    /// Final result, available once the dependency completes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// In-progress working state — write tier and up.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_state: Option<serde_json::Value>,
    /// Internal fields — admin only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal: Option<serde_json::Value>,
}

/// A record of one principal delegating work on an intent to another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelegationRecord {
    /// Who handed the work over.
    pub delegated_by: String,
    /// The intent the delegation originated from.
    pub origin_intent_id: Uuid,
    /// Arbitrary payload supplied by the delegating principal.
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// The intent graph collaborator: parent linkage, dependency outcomes,
/// creator attribution, and delegation records.
pub trait IntentGraph: Send + Sync {
    /// The principal that created the intent. `None` if the intent is unknown.
    fn creator_of(&self, intent_id: Uuid) -> Result<Option<String>, AccessError>;

    /// Summary of the intent's parent, if it has one.
    fn parent_summary(&self, intent_id: Uuid) -> Result<Option<ParentSummary>, AccessError>;

    /// Upstream dependency outcomes, keyed by dependency title.
    fn dependency_results(
        &self,
        intent_id: Uuid,
    ) -> Result<BTreeMap<String, DependencyResult>, AccessError>;

    /// The delegation record addressed to `principal_id` on this intent, if any.
    fn delegation_for(
        &self,
        intent_id: Uuid,
        principal_id: &str,
    ) -> Result<Option<DelegationRecord>, AccessError>;
}

/// An attachment on an intent, as returned by the attachment store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub attachment_id: Uuid,
    pub name: String,
    /// Public attachments are visible from read tier up.
    pub public: bool,
    /// Storage metadata (location, size, checksums) — admin only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<serde_json::Value>,
}

/// The attachment store collaborator.
pub trait AttachmentStore: Send + Sync {
    fn list_attachments(&self, intent_id: Uuid) -> Result<Vec<Attachment>, AccessError>;
}

/// The leasing collaborator. Lease scheduling is external; the core only
/// needs to tear leases down when a principal loses access.
pub trait LeaseManager: Send + Sync {
    /// Revoke every lease `principal_id` holds on `intent_id`.
    fn revoke_leases_for(&self, intent_id: Uuid, principal_id: &str) -> Result<(), AccessError>;
}

/// One governance decision, appended to the intent's broader audit trail
/// whenever an access request resolves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub decision_id: Uuid,
    pub intent_id: Uuid,
    /// The access request this decision resolves, when there is one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<Uuid>,
    pub decided_by: String,
    /// "approved" or "denied".
    pub decision: String,
    /// The tier actually granted (may be a downgrade from the requested one).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub granted_tier: Option<Tier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,
    pub decided_at: DateTime<Utc>,
}

/// The governance/arbitration collaborator: records decisions and escalates
/// deferred requests to humans.
pub trait Governance: Send + Sync {
    /// Persist a decision record in the intent's audit trail.
    fn record_decision(&self, record: &DecisionRecord) -> Result<(), AccessError>;

    /// Notify human reviewers that a request needs arbitration.
    fn escalate(
        &self,
        intent_id: Uuid,
        reason: &str,
        data: serde_json::Value,
    ) -> Result<(), AccessError>;
}

/// The external directory that resolves group membership.
/// Assumed available; never implemented by this core.
pub trait Directory: Send + Sync {
    fn resolve_group_members(&self, group_id: &str) -> Result<BTreeSet<String>, AccessError>;
}
