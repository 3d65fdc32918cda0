// assembler.rs — Builds the filtered situational snapshot.
//
// The assembler gathers each context field from its owning collaborator and
// applies the visibility matrix before returning. Collaborator calls can
// block or be remote; none of them run under the per-intent mutation lock —
// assembly is read-only and must not serialize against unrelated grants.
//
// A collaborator failure degrades that one field to an explicit
// "unavailable" marker. A partial context is more useful than none, but the
// partiality stays visible to the caller.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use concord_access::{AccessError, AclStore, AttachmentStore, EventLog, IntentGraph, Tier};

use crate::context::{FieldView, IntentContext};
use crate::filter::{
    detail_for, filter_acl, filter_attachments, filter_dependencies, filter_events, filter_parent,
    peer_view, ContextField,
};

/// Assembles permission-filtered contexts from the collaborators that own
/// each field.
pub struct ContextAssembler {
    acl_store: Arc<AclStore>,
    graph: Arc<dyn IntentGraph>,
    events: Arc<dyn EventLog>,
    attachments: Arc<dyn AttachmentStore>,
}

impl ContextAssembler {
    pub fn new(
        acl_store: Arc<AclStore>,
        graph: Arc<dyn IntentGraph>,
        events: Arc<dyn EventLog>,
        attachments: Arc<dyn AttachmentStore>,
    ) -> Self {
        Self {
            acl_store,
            graph,
            events,
            attachments,
        }
    }

    /// Build the snapshot for (principal, intent) at the given tier.
    ///
    /// The tier has already been resolved by the caller; the assembler only
    /// applies the matrix, it never widens access.
    pub fn assemble(
        &self,
        principal_id: &str,
        intent_id: Uuid,
        permission: Tier,
        now: DateTime<Utc>,
    ) -> IntentContext {
        let parent = self
            .field("intent_graph", || {
                self.graph
                    .parent_summary(intent_id)
                    .map(|p| p.map(|p| filter_parent(p, detail_for(ContextField::Parent, permission))))
            });

        let dependencies = self.field("intent_graph", || {
            self.graph.dependency_results(intent_id).map(|deps| {
                filter_dependencies(deps, detail_for(ContextField::Dependencies, permission))
            })
        });

        let events = self.field("event_log", || {
            self.events
                .recent(intent_id)
                .map(|evs| filter_events(evs, detail_for(ContextField::Events, permission)))
        });

        let active_entries = self.acl_store.list_active(intent_id, now);

        let acl = match &active_entries {
            Ok(entries) => FieldView::Present(filter_acl(
                entries.clone(),
                principal_id,
                detail_for(ContextField::Acl, permission),
            )),
            Err(err) => self.degrade("acl_store", err),
        };

        let peers = match &active_entries {
            Ok(entries) => {
                let detail = detail_for(ContextField::Peers, permission);
                FieldView::Present(
                    entries
                        .iter()
                        .filter(|e| e.principal_id != principal_id)
                        .map(|e| peer_view(e, detail))
                        .collect(),
                )
            }
            Err(err) => self.degrade("acl_store", err),
        };

        let attachments = self.field("attachment_store", || {
            self.attachments.list_attachments(intent_id).map(|atts| {
                filter_attachments(atts, detail_for(ContextField::Attachments, permission))
            })
        });

        // Always fully visible to its recipient, whatever the tier.
        let delegation = self.field("intent_graph", || {
            self.graph.delegation_for(intent_id, principal_id)
        });

        IntentContext {
            intent_id,
            principal_id: principal_id.to_string(),
            permission,
            parent,
            dependencies,
            events,
            acl,
            peers,
            attachments,
            delegation,
            assembled_at: now,
        }
    }

    fn field<T>(
        &self,
        collaborator: &'static str,
        gather: impl FnOnce() -> Result<T, AccessError>,
    ) -> FieldView<T> {
        match gather() {
            Ok(value) => FieldView::Present(value),
            Err(err) => self.degrade(collaborator, &err),
        }
    }

    fn degrade<T>(&self, collaborator: &'static str, err: &AccessError) -> FieldView<T> {
        warn!(collaborator, error = %err, "context field degraded to unavailable");
        FieldView::Unavailable {
            reason: format!("{collaborator}: {err}"),
        }
    }
}
