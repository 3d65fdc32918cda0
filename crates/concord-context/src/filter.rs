// filter.rs — The field-visibility matrix and its projections.
//
// The matrix below is the single auditable source of truth for what each
// tier sees of each context field. It is fixed policy, applied uniformly —
// not configurable per deployment. Filtering is per field: a write-tier
// principal gets the richer dependency view without gaining any visibility
// into the ACL.
//
//   field        | read           | write                  | admin
//   -------------+----------------+------------------------+----------------
//   parent       | title, status  | + current state        | full object
//   dependencies | final result   | + working state        | + internal
//   events       | public         | + state-change         | all
//   acl          | omitted        | own entry only         | full list
//   peers        | ids only       | + tier                 | + grant metadata
//   attachments  | public only    | all                    | + storage meta

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use concord_access::{
    AccessEntry, Attachment, DependencyResult, EventRecord, EventVisibility, ParentSummary, Tier,
};

use crate::context::{AclView, PeerView};

/// A context field named by the matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextField {
    Parent,
    Dependencies,
    Events,
    Acl,
    Peers,
    Attachments,
}

/// How much of a field a tier sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Detail {
    /// The field is omitted entirely.
    Hidden,
    /// The read-tier slice.
    Minimal,
    /// The write-tier slice.
    Extended,
    /// Everything, internal fields included.
    Full,
}

/// One row of the matrix.
pub struct FieldRule {
    pub field: ContextField,
    pub read: Detail,
    pub write: Detail,
    pub admin: Detail,
}

/// The visibility matrix, one row per field.
pub const VISIBILITY_MATRIX: &[FieldRule] = &[
    FieldRule {
        field: ContextField::Parent,
        read: Detail::Minimal,
        write: Detail::Extended,
        admin: Detail::Full,
    },
    FieldRule {
        field: ContextField::Dependencies,
        read: Detail::Minimal,
        write: Detail::Extended,
        admin: Detail::Full,
    },
    FieldRule {
        field: ContextField::Events,
        read: Detail::Minimal,
        write: Detail::Extended,
        admin: Detail::Full,
    },
    FieldRule {
        field: ContextField::Acl,
        read: Detail::Hidden,
        write: Detail::Minimal,
        admin: Detail::Full,
    },
    FieldRule {
        field: ContextField::Peers,
        read: Detail::Minimal,
        write: Detail::Extended,
        admin: Detail::Full,
    },
    FieldRule {
        field: ContextField::Attachments,
        read: Detail::Minimal,
        write: Detail::Extended,
        admin: Detail::Full,
    },
];

/// Look up the detail level for a field at a tier.
pub fn detail_for(field: ContextField, tier: Tier) -> Detail {
    match VISIBILITY_MATRIX.iter().find(|r| r.field == field) {
        Some(rule) => match tier {
            Tier::Read => rule.read,
            Tier::Write => rule.write,
            Tier::Admin => rule.admin,
        },
        // Unreachable while the matrix covers every field; hide if it ever isn't.
        None => Detail::Hidden,
    }
}

/// Project a parent summary down to the given detail level.
pub fn filter_parent(mut parent: ParentSummary, detail: Detail) -> ParentSummary {
    match detail {
        Detail::Hidden | Detail::Minimal => {
            parent.current_state = None;
            parent.detail = None;
        }
        Detail::Extended => {
            parent.detail = None;
        }
        Detail::Full => {}
    }
    parent
}

/// Project dependency outcomes down to the given detail level.
pub fn filter_dependencies(
    deps: BTreeMap<String, DependencyResult>,
    detail: Detail,
) -> BTreeMap<String, DependencyResult> {
    deps.into_iter()
        .map(|(title, mut dep)| {
            match detail {
                Detail::Hidden | Detail::Minimal => {
                    dep.working_state = None;
                    dep.internal = None;
                }
                Detail::Extended => {
                    dep.internal = None;
                }
                Detail::Full => {}
            }
            (title, dep)
        })
        .collect()
}

/// Keep only the events the detail level may see.
pub fn filter_events(events: Vec<EventRecord>, detail: Detail) -> Vec<EventRecord> {
    events
        .into_iter()
        .filter(|e| match detail {
            Detail::Hidden => false,
            Detail::Minimal => e.visibility == EventVisibility::Public,
            Detail::Extended => {
                matches!(
                    e.visibility,
                    EventVisibility::Public | EventVisibility::StateChange
                )
            }
            Detail::Full => true,
        })
        .collect()
}

/// Build the ACL view for a caller at the given detail level.
pub fn filter_acl(
    active_entries: Vec<AccessEntry>,
    caller: &str,
    detail: Detail,
) -> AclView {
    match detail {
        Detail::Hidden => AclView::Omitted,
        Detail::Minimal | Detail::Extended => AclView::Own {
            entry: active_entries
                .into_iter()
                .find(|e| e.principal_id == caller),
        },
        Detail::Full => AclView::Full {
            entries: active_entries,
        },
    }
}

/// Project an ACL entry into a peer view at the given detail level.
pub fn peer_view(entry: &AccessEntry, detail: Detail) -> PeerView {
    let mut view = PeerView {
        principal_id: entry.principal_id.clone(),
        kind: entry.principal_kind,
        tier: None,
        granted_by: None,
        granted_at: None,
        justification: None,
    };
    if detail >= Detail::Extended {
        view.tier = Some(entry.tier);
    }
    if detail >= Detail::Full {
        view.granted_by = Some(entry.granted_by.clone());
        view.granted_at = Some(entry.granted_at);
        view.justification = entry.justification.clone();
    }
    view
}

/// Filter attachments: read sees public ones, write sees all, admin also
/// keeps storage metadata.
pub fn filter_attachments(attachments: Vec<Attachment>, detail: Detail) -> Vec<Attachment> {
    attachments
        .into_iter()
        .filter(|a| detail >= Detail::Extended || a.public)
        .map(|mut a| {
            if detail < Detail::Full {
                a.storage = None;
            }
            a
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_access::{AccessEventKind, PrincipalKind};
    use uuid::Uuid;

    fn parent() -> ParentSummary {
        ParentSummary {
            intent_id: Uuid::new_v4(),
            title: "Ship release".to_string(),
            status: "running".to_string(),
            current_state: Some(serde_json::json!({"step": 3})),
            detail: Some(serde_json::json!({"internal_notes": "x"})),
        }
    }

    #[test]
    fn matrix_covers_every_field_once() {
        for field in [
            ContextField::Parent,
            ContextField::Dependencies,
            ContextField::Events,
            ContextField::Acl,
            ContextField::Peers,
            ContextField::Attachments,
        ] {
            let rows = VISIBILITY_MATRIX
                .iter()
                .filter(|r| r.field == field)
                .count();
            assert_eq!(rows, 1, "field {:?} must have exactly one rule", field);
        }
    }

    #[test]
    fn matrix_is_monotonic_in_tier() {
        // Higher tiers never see less of any field.
        for rule in VISIBILITY_MATRIX {
            assert!(rule.read <= rule.write, "{:?}", rule.field);
            assert!(rule.write <= rule.admin, "{:?}", rule.field);
        }
    }

    #[test]
    fn parent_read_view_is_title_and_status_only() {
        let filtered = filter_parent(parent(), detail_for(ContextField::Parent, Tier::Read));
        assert_eq!(filtered.title, "Ship release");
        assert_eq!(filtered.status, "running");
        assert!(filtered.current_state.is_none());
        assert!(filtered.detail.is_none());
    }

    #[test]
    fn parent_write_view_adds_current_state() {
        let filtered = filter_parent(parent(), detail_for(ContextField::Parent, Tier::Write));
        assert!(filtered.current_state.is_some());
        assert!(filtered.detail.is_none());
    }

    #[test]
    fn parent_admin_view_is_full() {
        let filtered = filter_parent(parent(), detail_for(ContextField::Parent, Tier::Admin));
        assert!(filtered.current_state.is_some());
        assert!(filtered.detail.is_some());
    }

    #[test]
    fn dependency_read_view_keeps_final_result_only() {
        let deps = BTreeMap::from([(
            "compile".to_string(),
            DependencyResult {
                status: "completed".to_string(),
                result: Some(serde_json::json!("ok")),
                working_state: Some(serde_json::json!({"progress": 80})),
                internal: Some(serde_json::json!({"worker": "w-1"})),
            },
        )]);
        let filtered =
            filter_dependencies(deps, detail_for(ContextField::Dependencies, Tier::Read));
        let dep = &filtered["compile"];
        assert!(dep.result.is_some());
        assert!(dep.working_state.is_none());
        assert!(dep.internal.is_none());
    }

    #[test]
    fn event_visibility_is_cumulative() {
        let intent = Uuid::new_v4();
        let events = vec![
            EventRecord::access(intent, AccessEventKind::AccessRequested, "a"), // public
            EventRecord::access(intent, AccessEventKind::AccessGranted, "b"),   // state-change
            EventRecord::access(intent, AccessEventKind::AccessGranted, "c")
                .with_visibility(EventVisibility::Internal),
        ];

        let read = filter_events(events.clone(), detail_for(ContextField::Events, Tier::Read));
        assert_eq!(read.len(), 1);

        let write = filter_events(
            events.clone(),
            detail_for(ContextField::Events, Tier::Write),
        );
        assert_eq!(write.len(), 2);

        let admin = filter_events(events, detail_for(ContextField::Events, Tier::Admin));
        assert_eq!(admin.len(), 3);
    }

    #[test]
    fn acl_hidden_for_read_own_for_write_full_for_admin() {
        let entries = vec![
            AccessEntry::new("me", PrincipalKind::Agent, Tier::Write, "granter"),
            AccessEntry::new("peer", PrincipalKind::User, Tier::Read, "granter"),
        ];

        let read = filter_acl(entries.clone(), "me", detail_for(ContextField::Acl, Tier::Read));
        assert_eq!(read, AclView::Omitted);

        let write = filter_acl(
            entries.clone(),
            "me",
            detail_for(ContextField::Acl, Tier::Write),
        );
        match write {
            AclView::Own { entry: Some(e) } => assert_eq!(e.principal_id, "me"),
            other => panic!("expected own entry, got {:?}", other),
        }

        let admin = filter_acl(entries, "me", detail_for(ContextField::Acl, Tier::Admin));
        match admin {
            AclView::Full { entries } => assert_eq!(entries.len(), 2),
            other => panic!("expected full list, got {:?}", other),
        }
    }

    #[test]
    fn peer_view_strips_metadata_below_admin() {
        let entry = AccessEntry::new("peer", PrincipalKind::User, Tier::Write, "granter")
            .with_justification("helping out");

        let read = peer_view(&entry, detail_for(ContextField::Peers, Tier::Read));
        assert!(read.tier.is_none());
        assert!(read.granted_by.is_none());

        let write = peer_view(&entry, detail_for(ContextField::Peers, Tier::Write));
        assert_eq!(write.tier, Some(Tier::Write));
        assert!(write.granted_by.is_none());

        let admin = peer_view(&entry, detail_for(ContextField::Peers, Tier::Admin));
        assert_eq!(admin.granted_by.as_deref(), Some("granter"));
        assert_eq!(admin.justification.as_deref(), Some("helping out"));
    }

    #[test]
    fn attachments_filtered_by_flag_and_storage_meta() {
        let attachments = vec![
            Attachment {
                attachment_id: Uuid::new_v4(),
                name: "public.md".to_string(),
                public: true,
                storage: Some(serde_json::json!({"bucket": "b"})),
            },
            Attachment {
                attachment_id: Uuid::new_v4(),
                name: "draft.md".to_string(),
                public: false,
                storage: Some(serde_json::json!({"bucket": "b"})),
            },
        ];

        let read = filter_attachments(
            attachments.clone(),
            detail_for(ContextField::Attachments, Tier::Read),
        );
        assert_eq!(read.len(), 1);
        assert!(read[0].storage.is_none());

        let write = filter_attachments(
            attachments.clone(),
            detail_for(ContextField::Attachments, Tier::Write),
        );
        assert_eq!(write.len(), 2);
        assert!(write.iter().all(|a| a.storage.is_none()));

        let admin = filter_attachments(
            attachments,
            detail_for(ContextField::Attachments, Tier::Admin),
        );
        assert_eq!(admin.len(), 2);
        assert!(admin.iter().all(|a| a.storage.is_some()));
    }
}
