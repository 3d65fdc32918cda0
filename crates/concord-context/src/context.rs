// context.rs — The situational snapshot handed to an accessing principal.
//
// An IntentContext is derived per (principal, intent, instant), filtered to
// the principal's tier, held in the cache until its deadline, and never
// persisted durably. Each field wraps in FieldView so that a collaborator
// outage degrades that one field to an explicit "unavailable" marker —
// partiality is visible, not indistinguishable from "no data".

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use concord_access::{
    AccessEntry, Attachment, DelegationRecord, DependencyResult, EventRecord, ParentSummary,
    PrincipalKind, Tier,
};

/// One context field: present, or explicitly degraded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum FieldView<T> {
    /// The field was gathered and filtered normally.
    Present(T),
    /// The owning collaborator failed; the rest of the context stands.
    Unavailable { reason: String },
}

impl<T> FieldView<T> {
    /// The value, if present.
    pub fn value(&self) -> Option<&T> {
        match self {
            FieldView::Present(v) => Some(v),
            FieldView::Unavailable { .. } => None,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, FieldView::Unavailable { .. })
    }
}

/// The ACL as a given tier is allowed to see it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum AclView {
    /// Read tier: the ACL is omitted entirely.
    Omitted,
    /// Write tier: the caller's own entry only. `None` when the caller's
    /// access comes from the default policy or creator attribution.
    Own { entry: Option<AccessEntry> },
    /// Admin tier: the full active entry list.
    Full { entries: Vec<AccessEntry> },
}

/// A peer — another principal holding an active entry on the intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerView {
    pub principal_id: String,
    pub kind: PrincipalKind,
    /// Visible from write tier up.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<Tier>,
    /// Grant metadata — admin only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub granted_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub granted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,
}

/// The permission-filtered situational snapshot for one principal on one
/// intent. Own-permission and delegation fields are always fully visible to
/// their recipient — they describe the recipient's own situation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentContext {
    pub intent_id: Uuid,
    pub principal_id: String,

    /// The tier this context was filtered for.
    pub permission: Tier,

    /// Parent linkage, filtered per tier.
    pub parent: FieldView<Option<ParentSummary>>,

    /// Upstream dependency outcomes keyed by title, filtered per tier.
    pub dependencies: FieldView<BTreeMap<String, DependencyResult>>,

    /// Recent events, filtered by visibility class.
    pub events: FieldView<Vec<EventRecord>>,

    /// The ACL view this tier gets.
    pub acl: FieldView<AclView>,

    /// Other principals with active entries, excluding the caller.
    pub peers: FieldView<Vec<PeerView>>,

    /// Attachments, filtered per tier.
    pub attachments: FieldView<Vec<Attachment>>,

    /// Delegation record addressed to this principal, if any.
    pub delegation: FieldView<Option<DelegationRecord>>,

    /// When this snapshot was assembled.
    pub assembled_at: DateTime<Utc>,
}
