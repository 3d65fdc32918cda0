// coordinator.rs — The one front door to the coordination core.
//
// The AccessCoordinator wires the ACL store, resolver, context pipeline,
// request workflow, and revocation cascade together, and gates every
// protected operation through the resolver before dispatching. Server
// handlers call these methods and nothing below them.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use concord_access::{
    AccessControlList, AccessEntry, AccessError, AclStore, AttachmentStore, DefaultPolicy,
    Directory, EventLog, Governance, IntentGraph, LeaseManager, PermissionResolver, PrincipalKind,
    Tier,
};
use concord_context::{ContextAssembler, ContextCache, IntentContext};
use concord_governance::{
    AccessRequest, AccessWorkflow, CascadeOutcome, Decision, RequestHook, RequestStore,
    RevocationCascade,
};

use crate::config::CoordinatorConfig;

/// The external subsystems the core talks to. The server wires these in at
/// startup; the core never constructs them.
pub struct Collaborators {
    pub graph: Arc<dyn IntentGraph>,
    pub events: Arc<dyn EventLog>,
    pub attachments: Arc<dyn AttachmentStore>,
    pub leases: Arc<dyn LeaseManager>,
    pub governance: Arc<dyn Governance>,
    /// Optional: without a directory, group ACL entries never match.
    pub directory: Option<Arc<dyn Directory>>,
}

/// Facade over the access-aware coordination core.
pub struct AccessCoordinator {
    acl: Arc<AclStore>,
    graph: Arc<dyn IntentGraph>,
    resolver: Arc<PermissionResolver>,
    assembler: ContextAssembler,
    cache: Arc<ContextCache>,
    workflow: AccessWorkflow,
    cascade: RevocationCascade,
}

impl AccessCoordinator {
    /// Wire the core against a data directory and the server's collaborators.
    /// ACLs land in `<data_dir>/acl`, requests in `<data_dir>/requests`.
    pub fn new(
        data_dir: impl AsRef<Path>,
        collaborators: Collaborators,
        config: CoordinatorConfig,
    ) -> Result<Self, AccessError> {
        let data_dir = data_dir.as_ref();
        let acl = Arc::new(AclStore::new(
            data_dir.join("acl"),
            collaborators.events.clone(),
        )?);

        let mut resolver = PermissionResolver::new(acl.clone(), collaborators.graph.clone());
        if let Some(directory) = collaborators.directory.clone() {
            resolver = resolver.with_directory(directory);
        }
        let resolver = Arc::new(resolver);

        let cache = Arc::new(ContextCache::with_ttl(chrono::Duration::seconds(
            config.context_ttl_secs,
        )));
        let assembler = ContextAssembler::new(
            acl.clone(),
            collaborators.graph.clone(),
            collaborators.events.clone(),
            collaborators.attachments.clone(),
        );

        let workflow = AccessWorkflow::new(
            RequestStore::new(data_dir.join("requests"))?,
            acl.clone(),
            resolver.clone(),
            collaborators.events.clone(),
            collaborators.governance,
            cache.clone(),
            Duration::from_millis(config.hook_timeout_ms),
        );
        let cascade = RevocationCascade::new(acl.clone(), collaborators.leases, cache.clone());

        Ok(Self {
            acl,
            graph: collaborators.graph,
            resolver,
            assembler,
            cache,
            workflow,
            cascade,
        })
    }

    /// The effective tier for (principal, intent) right now. `None` means
    /// no access.
    pub fn resolve_permission(&self, principal_id: &str, intent_id: Uuid) -> Option<Tier> {
        self.resolver.resolve(principal_id, intent_id, Utc::now())
    }

    /// Create (or replace) an intent's ACL with the given default policy.
    /// Requires admin — in practice the creator, right after creating the
    /// intent. Fails with `IntentNotFound` if the graph has never heard of
    /// the intent.
    pub fn create_acl(
        &self,
        acting_principal: &str,
        intent_id: Uuid,
        default_policy: DefaultPolicy,
    ) -> Result<(), AccessError> {
        if self.graph.creator_of(intent_id)?.is_none() {
            return Err(AccessError::IntentNotFound(intent_id));
        }
        self.resolver
            .require(acting_principal, intent_id, Utc::now(), Tier::Admin)?;
        self.acl
            .put(AccessControlList::new(intent_id, default_policy), acting_principal)?;
        self.cache.invalidate_all(intent_id);
        Ok(())
    }

    /// The caller's filtered situational snapshot of an intent. Requires
    /// read; served from cache when fresh.
    pub fn get_context(
        &self,
        principal_id: &str,
        intent_id: Uuid,
    ) -> Result<IntentContext, AccessError> {
        let now = Utc::now();
        let tier = self
            .resolver
            .require(principal_id, intent_id, now, Tier::Read)?;
        self.cache.get_or_assemble(principal_id, intent_id, tier, now, || {
            Ok(self.assembler.assemble(principal_id, intent_id, tier, now))
        })
    }

    /// Grant (or replace) a principal's access to an intent. Requires admin.
    pub fn grant_access(
        &self,
        acting_principal: &str,
        intent_id: Uuid,
        principal_id: &str,
        principal_kind: PrincipalKind,
        tier: Tier,
        expires_at: Option<DateTime<Utc>>,
        justification: Option<String>,
    ) -> Result<AccessEntry, AccessError> {
        self.resolver
            .require(acting_principal, intent_id, Utc::now(), Tier::Admin)?;
        let mut entry = AccessEntry::new(principal_id, principal_kind, tier, acting_principal);
        if let Some(expires_at) = expires_at {
            entry = entry.with_expiry(expires_at);
        }
        if let Some(justification) = justification {
            entry = entry.with_justification(justification);
        }
        let entry = self.acl.upsert_entry(intent_id, entry, acting_principal)?;
        self.cache.invalidate_all(intent_id);
        Ok(entry)
    }

    /// Revoke a principal's access and run the teardown cascade. Requires
    /// admin.
    pub fn revoke_access(
        &self,
        acting_principal: &str,
        intent_id: Uuid,
        principal_id: &str,
    ) -> Result<CascadeOutcome, AccessError> {
        self.resolver
            .require(acting_principal, intent_id, Utc::now(), Tier::Admin)?;
        self.cascade.revoke(intent_id, principal_id, acting_principal)
    }

    /// Active ACL entries for an intent. Requires admin; lower tiers see
    /// their filtered view through the context instead.
    pub fn list_access(
        &self,
        acting_principal: &str,
        intent_id: Uuid,
    ) -> Result<Vec<AccessEntry>, AccessError> {
        let now = Utc::now();
        self.resolver
            .require(acting_principal, intent_id, now, Tier::Admin)?;
        self.acl.list_active(intent_id, now)
    }

    /// Submit an access request. Open to any principal — the one operation
    /// that bypasses the permission gate.
    pub fn submit_access_request(
        &self,
        principal_id: impl Into<String>,
        principal_kind: PrincipalKind,
        intent_id: Uuid,
        requested_tier: Tier,
        justification: impl Into<String>,
    ) -> Result<AccessRequest, AccessError> {
        self.workflow
            .submit(principal_id, principal_kind, intent_id, requested_tier, justification)
    }

    /// Decide a pending request. Requires admin on the request's intent.
    pub fn decide_access_request(
        &self,
        acting_principal: &str,
        request_id: Uuid,
        decision: Decision,
        granted_tier: Option<Tier>,
        justification: Option<String>,
    ) -> Result<AccessRequest, AccessError> {
        self.workflow
            .decide(acting_principal, request_id, decision, granted_tier, justification)
    }

    /// Register a request-evaluation hook for an intent. Requires admin.
    pub fn register_request_hook(
        &self,
        acting_principal: &str,
        intent_id: Uuid,
        hook: Arc<dyn RequestHook>,
    ) -> Result<(), AccessError> {
        self.workflow.register_hook(acting_principal, intent_id, hook)
    }

    /// Remove the hook for an intent. Requires admin.
    pub fn clear_request_hook(
        &self,
        acting_principal: &str,
        intent_id: Uuid,
    ) -> Result<(), AccessError> {
        self.workflow.clear_hook(acting_principal, intent_id)
    }

    /// A request by id.
    pub fn get_access_request(
        &self,
        request_id: Uuid,
    ) -> Result<Option<AccessRequest>, AccessError> {
        self.workflow.get_request(request_id)
    }

    /// Pending requests awaiting arbitration, oldest first.
    pub fn pending_access_requests(&self) -> Result<Vec<AccessRequest>, AccessError> {
        self.workflow.pending_requests()
    }

    /// Drop every cached context for an intent. The coordinator invalidates
    /// on its own ACL mutations; the server calls this for the triggers it
    /// owns — a dependency completing, or a new event landing on the intent.
    pub fn invalidate_context(&self, intent_id: Uuid) {
        self.cache.invalidate_all(intent_id);
    }

    /// Reclaim expired grants across all intents: prune entries, tear down
    /// their leases, invalidate contexts. Returns the number pruned. Safe to
    /// run from a periodic job; expiry is enforced lazily regardless.
    pub fn expire_sweep(&self, now: DateTime<Utc>) -> Result<usize, AccessError> {
        let pruned = self.cascade.expire_sweep(now)?;
        self.cache.purge_expired(now);
        Ok(pruned)
    }
}
