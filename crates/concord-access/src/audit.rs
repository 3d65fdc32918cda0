// audit.rs — Audit event model and the event-log boundary.
//
// Every ACL mutation and every access-request transition is recorded as one
// EventRecord appended to the external event log. The core owns the event
// *semantics* (which kinds exist, what visibility each carries); the log's
// storage and delivery transport belong to the collaborator behind the
// `EventLog` trait.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AccessError;

/// What kind of access action an event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessEventKind {
    /// An entry was created or replaced.
    AccessGranted,
    /// An entry was explicitly removed.
    AccessRevoked,
    /// An entry hit its expiry cutoff.
    AccessExpired,
    /// A principal submitted an access request.
    AccessRequested,
    /// An access request was approved.
    AccessRequestApproved,
    /// An access request was denied.
    AccessRequestDenied,
}

/// Who gets to see an event in a filtered context.
///
/// The context filtering matrix keys off this: read-tier principals see
/// `Public` events, write-tier adds `StateChange`, admin sees everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventVisibility {
    /// Visible to any principal with read access.
    Public,
    /// Visible from write tier up — records a state mutation.
    StateChange,
    /// Admin only.
    Internal,
}

/// A single audit event on an intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    /// Unique identifier for this event.
    pub event_id: Uuid,

    /// The intent this event belongs to.
    pub intent_id: Uuid,

    /// Event type as a string (access events use `AccessEventKind` names;
    /// the wider protocol appends its own types to the same log).
    pub event_type: String,

    /// The principal whose action caused this event.
    pub actor: String,

    /// Visibility class used by context filtering.
    pub visibility: EventVisibility,

    /// Arbitrary additional data.
    #[serde(default)]
    pub payload: serde_json::Value,

    /// When this event occurred (UTC).
    pub timestamp: DateTime<Utc>,
}

impl EventRecord {
    /// Create an access event with the current timestamp and a random id.
    ///
    /// ACL mutations are state changes; request submissions/denials carry no
    /// state mutation and stay public so requesters can see their own trail.
    pub fn access(intent_id: Uuid, kind: AccessEventKind, actor: impl Into<String>) -> Self {
        let visibility = match kind {
            AccessEventKind::AccessGranted
            | AccessEventKind::AccessRevoked
            | AccessEventKind::AccessExpired
            | AccessEventKind::AccessRequestApproved => EventVisibility::StateChange,
            AccessEventKind::AccessRequested | AccessEventKind::AccessRequestDenied => {
                EventVisibility::Public
            }
        };
        Self {
            event_id: Uuid::new_v4(),
            intent_id,
            event_type: kind_name(kind).to_string(),
            actor: actor.into(),
            visibility,
            payload: serde_json::Value::Null,
            timestamp: Utc::now(),
        }
    }

    /// Set the payload and return self (builder pattern).
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Override the visibility and return self.
    pub fn with_visibility(mut self, visibility: EventVisibility) -> Self {
        self.visibility = visibility;
        self
    }
}

fn kind_name(kind: AccessEventKind) -> &'static str {
    match kind {
        AccessEventKind::AccessGranted => "access_granted",
        AccessEventKind::AccessRevoked => "access_revoked",
        AccessEventKind::AccessExpired => "access_expired",
        AccessEventKind::AccessRequested => "access_requested",
        AccessEventKind::AccessRequestApproved => "access_request_approved",
        AccessEventKind::AccessRequestDenied => "access_request_denied",
    }
}

/// The external event-log collaborator.
///
/// Append delivery ordering per intent follows the order the core's
/// per-intent serialized sections complete; the log itself is trusted to
/// preserve append order.
pub trait EventLog: Send + Sync {
    /// Append one event to the intent's log.
    fn append(&self, event: EventRecord) -> Result<(), AccessError>;

    /// Recent events for an intent, oldest first.
    fn recent(&self, intent_id: Uuid) -> Result<Vec<EventRecord>, AccessError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acl_mutations_are_state_change_events() {
        let intent = Uuid::new_v4();
        for kind in [
            AccessEventKind::AccessGranted,
            AccessEventKind::AccessRevoked,
            AccessEventKind::AccessExpired,
        ] {
            let event = EventRecord::access(intent, kind, "actor");
            assert_eq!(event.visibility, EventVisibility::StateChange);
        }
    }

    #[test]
    fn request_submission_is_public() {
        let event = EventRecord::access(
            Uuid::new_v4(),
            AccessEventKind::AccessRequested,
            "stranger",
        );
        assert_eq!(event.visibility, EventVisibility::Public);
        assert_eq!(event.event_type, "access_requested");
    }

    #[test]
    fn event_kind_serializes_as_snake_case() {
        let json = serde_json::to_string(&AccessEventKind::AccessRequestApproved).unwrap();
        assert_eq!(json, "\"access_request_approved\"");
    }

    #[test]
    fn event_serialization_round_trip() {
        let event = EventRecord::access(
            Uuid::new_v4(),
            AccessEventKind::AccessGranted,
            "orchestrator",
        )
        .with_payload(serde_json::json!({"principal": "agent-1", "tier": "write"}));

        let json = serde_json::to_string(&event).unwrap();
        let restored: EventRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.event_id, event.event_id);
        assert_eq!(restored.event_type, "access_granted");
        assert_eq!(restored.payload, event.payload);
    }
}
