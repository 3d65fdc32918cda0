// workflow.rs — The access-request workflow.
//
// Lifecycle: pending → {approved, denied}, terminal. Submission is the one
// operation that bypasses the permission gate — the whole point is obtaining
// access. A registered hook is consulted at submission time under a timeout;
// approve/deny verdicts resolve the request immediately, defer (and timeout)
// leaves it pending and escalates to human arbitration.
//
// Approval creates/updates the requester's AccessEntry at the decided tier,
// which may be a downgrade from the requested one. Every transition appends
// an audit event and, on resolution, a DecisionRecord.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use concord_access::{
    AccessEntry, AccessError, AccessEventKind, AclStore, DecisionRecord, EventLog, EventRecord,
    Governance, PermissionResolver, PrincipalKind, Tier,
};
use concord_context::ContextCache;

use crate::hook::{evaluate_bounded, HookRegistry, HookVerdict, RequestHook};
use crate::request::{AccessRequest, RequestStore};

/// Default time budget for a request-evaluation hook.
pub const DEFAULT_HOOK_TIMEOUT: Duration = Duration::from_secs(5);

/// An admin's decision on a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Deny,
}

/// Drives the request lifecycle: submission, hook evaluation, decisions.
pub struct AccessWorkflow {
    requests: RequestStore,
    acl: Arc<AclStore>,
    resolver: Arc<PermissionResolver>,
    events: Arc<dyn EventLog>,
    governance: Arc<dyn Governance>,
    cache: Arc<ContextCache>,
    hooks: HookRegistry,
    hook_timeout: Duration,
}

impl AccessWorkflow {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        requests: RequestStore,
        acl: Arc<AclStore>,
        resolver: Arc<PermissionResolver>,
        events: Arc<dyn EventLog>,
        governance: Arc<dyn Governance>,
        cache: Arc<ContextCache>,
        hook_timeout: Duration,
    ) -> Self {
        Self {
            requests,
            acl,
            resolver,
            events,
            governance,
            cache,
            hooks: HookRegistry::new(),
            hook_timeout,
        }
    }

    /// Submit a request for access. Allowed for any principal, including
    /// ones with no access at all — this operation alone bypasses the
    /// permission gate.
    pub fn submit(
        &self,
        principal_id: impl Into<String>,
        principal_kind: PrincipalKind,
        intent_id: Uuid,
        requested_tier: Tier,
        justification: impl Into<String>,
    ) -> Result<AccessRequest, AccessError> {
        let request = AccessRequest::new(
            intent_id,
            principal_id,
            principal_kind,
            requested_tier,
            justification,
        );
        self.requests.save(&request)?;
        self.emit(
            EventRecord::access(intent_id, AccessEventKind::AccessRequested, &request.principal_id)
                .with_payload(serde_json::json!({
                    "request_id": request.request_id,
                    "tier": request.requested_tier,
                })),
        );
        info!(request = %request.request_id, intent = %intent_id, "access request submitted");

        // Optional policy evaluation. The hook is consulted synchronously
        // but bounded; a timeout defers, it never approves.
        let Some(hook) = self.hooks.get(intent_id) else {
            return Ok(request);
        };
        match evaluate_bounded(hook, request.clone(), self.hook_timeout) {
            Ok(HookVerdict::Approve) => {
                self.apply_decision(request.request_id, "policy-hook", Decision::Approve, None, None)
            }
            Ok(HookVerdict::Deny) => self.apply_decision(
                request.request_id,
                "policy-hook",
                Decision::Deny,
                None,
                Some("denied by policy hook".to_string()),
            ),
            Ok(HookVerdict::Defer) => {
                self.escalate(&request, "deferred by policy hook");
                Ok(request)
            }
            Err(err @ AccessError::PolicyHookTimeout { .. }) => {
                warn!(request = %request.request_id, error = %err, "hook timed out; deferring");
                self.escalate(&request, "policy hook timed out");
                Ok(request)
            }
            Err(err) => Err(err),
        }
    }

    /// Decide a pending request. `acting_principal` must hold admin on the
    /// intent; `granted_tier` overrides the requested tier on approval
    /// (e.g., a downgrade).
    pub fn decide(
        &self,
        acting_principal: &str,
        request_id: Uuid,
        decision: Decision,
        granted_tier: Option<Tier>,
        justification: Option<String>,
    ) -> Result<AccessRequest, AccessError> {
        let request = self
            .requests
            .get(request_id)?
            .ok_or(AccessError::RequestNotFound(request_id))?;
        self.resolver
            .require(acting_principal, request.intent_id, Utc::now(), Tier::Admin)?;
        self.apply_decision(
            request_id,
            acting_principal,
            decision,
            granted_tier,
            justification,
        )
    }

    /// Register a request-evaluation hook for an intent. The caller must
    /// hold admin on the intent.
    pub fn register_hook(
        &self,
        acting_principal: &str,
        intent_id: Uuid,
        hook: Arc<dyn RequestHook>,
    ) -> Result<(), AccessError> {
        self.resolver
            .require(acting_principal, intent_id, Utc::now(), Tier::Admin)?;
        self.hooks.register(intent_id, hook);
        Ok(())
    }

    /// Remove the hook for an intent. Admin gated like registration.
    pub fn clear_hook(&self, acting_principal: &str, intent_id: Uuid) -> Result<(), AccessError> {
        self.resolver
            .require(acting_principal, intent_id, Utc::now(), Tier::Admin)?;
        self.hooks.clear(intent_id);
        Ok(())
    }

    /// A request by id.
    pub fn get_request(&self, request_id: Uuid) -> Result<Option<AccessRequest>, AccessError> {
        self.requests.get(request_id)
    }

    /// Pending requests awaiting arbitration, oldest first.
    pub fn pending_requests(&self) -> Result<Vec<AccessRequest>, AccessError> {
        self.requests.list_pending()
    }

    /// The shared transition path for admin decisions and hook verdicts.
    /// The terminal-state check runs inside the request store's lock, so a
    /// request resolves exactly once.
    fn apply_decision(
        &self,
        request_id: Uuid,
        decided_by: &str,
        decision: Decision,
        granted_tier: Option<Tier>,
        justification: Option<String>,
    ) -> Result<AccessRequest, AccessError> {
        let request = self.requests.update(request_id, |req| {
            let tier = granted_tier.unwrap_or(req.requested_tier);
            match decision {
                Decision::Approve => req.approve(decided_by, tier, justification.clone()),
                Decision::Deny => req.deny(decided_by, justification.clone()),
            }
        })?;

        match decision {
            Decision::Approve => {
                let tier = request.granted_tier.unwrap_or(request.requested_tier);
                let entry = AccessEntry::new(
                    &request.principal_id,
                    request.principal_kind,
                    tier,
                    decided_by,
                )
                .with_justification(&request.justification);
                self.acl.upsert_entry(request.intent_id, entry, decided_by)?;
                self.emit(
                    EventRecord::access(
                        request.intent_id,
                        AccessEventKind::AccessRequestApproved,
                        decided_by,
                    )
                    .with_payload(serde_json::json!({
                        "request_id": request.request_id,
                        "principal": request.principal_id,
                        "tier": tier,
                    })),
                );
            }
            Decision::Deny => {
                self.emit(
                    EventRecord::access(
                        request.intent_id,
                        AccessEventKind::AccessRequestDenied,
                        decided_by,
                    )
                    .with_payload(serde_json::json!({
                        "request_id": request.request_id,
                        "principal": request.principal_id,
                    })),
                );
            }
        }

        self.record_decision(&request, decided_by, decision);
        // The ACL changed (or a decision landed); no principal may keep a
        // pre-decision snapshot.
        self.cache.invalidate_all(request.intent_id);
        Ok(request)
    }

    fn record_decision(&self, request: &AccessRequest, decided_by: &str, decision: Decision) {
        let record = DecisionRecord {
            decision_id: Uuid::new_v4(),
            intent_id: request.intent_id,
            request_id: Some(request.request_id),
            decided_by: decided_by.to_string(),
            decision: match decision {
                Decision::Approve => "approved".to_string(),
                Decision::Deny => "denied".to_string(),
            },
            granted_tier: request.granted_tier,
            justification: request.decision_justification.clone(),
            decided_at: request.decided_at.unwrap_or_else(Utc::now),
        };
        if let Err(err) = self.governance.record_decision(&record) {
            warn!(request = %request.request_id, error = %err, "decision record write failed");
        }
    }

    fn escalate(&self, request: &AccessRequest, reason: &str) {
        let data = serde_json::json!({
            "request_id": request.request_id,
            "principal": request.principal_id,
            "tier": request.requested_tier,
        });
        if let Err(err) = self.governance.escalate(request.intent_id, reason, data) {
            warn!(request = %request.request_id, error = %err, "escalation failed; request stays pending");
        }
    }

    fn emit(&self, event: EventRecord) {
        if let Err(err) = self.events.append(event) {
            warn!(error = %err, "audit event append failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hook::RequestHook;
    use concord_access::{DelegationRecord, DependencyResult, IntentGraph, ParentSummary};
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use tempfile::tempdir;

    #[derive(Default)]
    struct MemoryLog {
        events: Mutex<Vec<EventRecord>>,
    }
    impl EventLog for MemoryLog {
        fn append(&self, event: EventRecord) -> Result<(), AccessError> {
            self.events.lock().unwrap().push(event);
            Ok(())
        }
        fn recent(&self, intent_id: Uuid) -> Result<Vec<EventRecord>, AccessError> {
            Ok(self
                .events
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.intent_id == intent_id)
                .cloned()
                .collect())
        }
    }

    struct Creators {
        map: BTreeMap<Uuid, String>,
    }
    impl IntentGraph for Creators {
        fn creator_of(&self, intent_id: Uuid) -> Result<Option<String>, AccessError> {
            Ok(self.map.get(&intent_id).cloned())
        }
        fn parent_summary(&self, _intent_id: Uuid) -> Result<Option<ParentSummary>, AccessError> {
            Ok(None)
        }
        fn dependency_results(
            &self,
            _intent_id: Uuid,
        ) -> Result<BTreeMap<String, DependencyResult>, AccessError> {
            Ok(BTreeMap::new())
        }
        fn delegation_for(
            &self,
            _intent_id: Uuid,
            _principal_id: &str,
        ) -> Result<Option<DelegationRecord>, AccessError> {
            Ok(None)
        }
    }

    #[derive(Default)]
    struct RecordingGovernance {
        decisions: Mutex<Vec<DecisionRecord>>,
        escalations: Mutex<Vec<(Uuid, String)>>,
    }
    impl Governance for RecordingGovernance {
        fn record_decision(&self, record: &DecisionRecord) -> Result<(), AccessError> {
            self.decisions.lock().unwrap().push(record.clone());
            Ok(())
        }
        fn escalate(
            &self,
            intent_id: Uuid,
            reason: &str,
            _data: serde_json::Value,
        ) -> Result<(), AccessError> {
            self.escalations
                .lock()
                .unwrap()
                .push((intent_id, reason.to_string()));
            Ok(())
        }
    }

    struct Fixture {
        workflow: AccessWorkflow,
        log: Arc<MemoryLog>,
        governance: Arc<RecordingGovernance>,
        resolver: Arc<PermissionResolver>,
        intent: Uuid,
        _dir: tempfile::TempDir,
    }

    /// Intent created by "orchestrator" with a closed ACL.
    fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let intent = Uuid::new_v4();
        let log = Arc::new(MemoryLog::default());
        let acl = Arc::new(AclStore::new(dir.path().join("acl"), log.clone()).unwrap());
        let graph = Arc::new(Creators {
            map: BTreeMap::from([(intent, "orchestrator".to_string())]),
        });
        acl.put(
            concord_access::AccessControlList::new(intent, concord_access::DefaultPolicy::Closed),
            "orchestrator",
        )
        .unwrap();
        let resolver = Arc::new(PermissionResolver::new(acl.clone(), graph));
        let governance = Arc::new(RecordingGovernance::default());
        let workflow = AccessWorkflow::new(
            RequestStore::new(dir.path().join("requests")).unwrap(),
            acl,
            resolver.clone(),
            log.clone(),
            governance.clone(),
            Arc::new(ContextCache::new()),
            Duration::from_millis(50),
        );
        Fixture {
            workflow,
            log,
            governance,
            resolver,
            intent,
            _dir: dir,
        }
    }

    #[test]
    fn submit_is_allowed_with_no_access() {
        let f = fixture();
        assert_eq!(f.resolver.resolve("stranger", f.intent, Utc::now()), None);

        let request = f
            .workflow
            .submit(
                "stranger",
                PrincipalKind::Agent,
                f.intent,
                Tier::Write,
                "need to contribute",
            )
            .unwrap();
        assert_eq!(request.status, crate::request::RequestStatus::Pending);

        let events = f.log.recent(f.intent).unwrap();
        assert_eq!(events.last().unwrap().event_type, "access_requested");
        assert_eq!(events.last().unwrap().actor, "stranger");
    }

    #[test]
    fn approve_grants_access_and_records_decision() {
        let f = fixture();
        let request = f
            .workflow
            .submit("stranger", PrincipalKind::Agent, f.intent, Tier::Write, "x")
            .unwrap();

        let decided = f
            .workflow
            .decide("orchestrator", request.request_id, Decision::Approve, None, None)
            .unwrap();
        assert_eq!(decided.status, crate::request::RequestStatus::Approved);

        // The requester now resolves to the granted tier.
        assert_eq!(
            f.resolver.resolve("stranger", f.intent, Utc::now()),
            Some(Tier::Write)
        );
        // access_granted appended with the deciding principal as actor.
        let events = f.log.recent(f.intent).unwrap();
        assert!(events
            .iter()
            .any(|e| e.event_type == "access_granted" && e.actor == "orchestrator"));
        assert!(events
            .iter()
            .any(|e| e.event_type == "access_request_approved"));
        // DecisionRecord written.
        let decisions = f.governance.decisions.lock().unwrap();
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].decision, "approved");
        assert_eq!(decisions[0].request_id, Some(request.request_id));
    }

    #[test]
    fn approve_can_downgrade_the_tier() {
        let f = fixture();
        let request = f
            .workflow
            .submit("stranger", PrincipalKind::Agent, f.intent, Tier::Admin, "x")
            .unwrap();

        let decided = f
            .workflow
            .decide(
                "orchestrator",
                request.request_id,
                Decision::Approve,
                Some(Tier::Read),
                Some("start small".to_string()),
            )
            .unwrap();
        assert_eq!(decided.granted_tier, Some(Tier::Read));
        assert_eq!(
            f.resolver.resolve("stranger", f.intent, Utc::now()),
            Some(Tier::Read)
        );
    }

    #[test]
    fn deny_leaves_acl_unchanged() {
        let f = fixture();
        let request = f
            .workflow
            .submit("stranger", PrincipalKind::Agent, f.intent, Tier::Write, "x")
            .unwrap();

        f.workflow
            .decide(
                "orchestrator",
                request.request_id,
                Decision::Deny,
                None,
                Some("not yet".to_string()),
            )
            .unwrap();

        assert_eq!(f.resolver.resolve("stranger", f.intent, Utc::now()), None);
        let events = f.log.recent(f.intent).unwrap();
        assert!(events
            .iter()
            .any(|e| e.event_type == "access_request_denied"));
    }

    #[test]
    fn non_admin_cannot_decide() {
        let f = fixture();
        let request = f
            .workflow
            .submit("stranger", PrincipalKind::Agent, f.intent, Tier::Write, "x")
            .unwrap();

        let err = f
            .workflow
            .decide("stranger", request.request_id, Decision::Approve, None, None)
            .unwrap_err();
        assert!(matches!(err, AccessError::Forbidden { .. }));
    }

    #[test]
    fn deciding_twice_is_terminal_state() {
        let f = fixture();
        let request = f
            .workflow
            .submit("stranger", PrincipalKind::Agent, f.intent, Tier::Write, "x")
            .unwrap();

        f.workflow
            .decide("orchestrator", request.request_id, Decision::Approve, None, None)
            .unwrap();
        let err = f
            .workflow
            .decide("orchestrator", request.request_id, Decision::Deny, None, None)
            .unwrap_err();
        assert!(matches!(err, AccessError::TerminalState { .. }));
    }

    struct Fixed(HookVerdict);
    impl RequestHook for Fixed {
        fn evaluate(&self, _request: &AccessRequest) -> HookVerdict {
            self.0
        }
    }

    #[test]
    fn hook_approve_resolves_at_submission() {
        let f = fixture();
        f.workflow
            .register_hook("orchestrator", f.intent, Arc::new(Fixed(HookVerdict::Approve)))
            .unwrap();

        let request = f
            .workflow
            .submit("stranger", PrincipalKind::Agent, f.intent, Tier::Write, "x")
            .unwrap();
        assert_eq!(request.status, crate::request::RequestStatus::Approved);
        assert_eq!(request.decided_by.as_deref(), Some("policy-hook"));
        assert_eq!(
            f.resolver.resolve("stranger", f.intent, Utc::now()),
            Some(Tier::Write)
        );
    }

    #[test]
    fn hook_defer_escalates_and_stays_pending() {
        let f = fixture();
        f.workflow
            .register_hook("orchestrator", f.intent, Arc::new(Fixed(HookVerdict::Defer)))
            .unwrap();

        let request = f
            .workflow
            .submit("stranger", PrincipalKind::Agent, f.intent, Tier::Write, "x")
            .unwrap();
        assert_eq!(request.status, crate::request::RequestStatus::Pending);

        let escalations = f.governance.escalations.lock().unwrap();
        assert_eq!(escalations.len(), 1);
        assert_eq!(escalations[0].0, f.intent);
        // An admin can still decide it later.
        drop(escalations);
        let decided = f
            .workflow
            .decide("orchestrator", request.request_id, Decision::Approve, None, None)
            .unwrap();
        assert_eq!(decided.status, crate::request::RequestStatus::Approved);
    }

    struct SlowHook;
    impl RequestHook for SlowHook {
        fn evaluate(&self, _request: &AccessRequest) -> HookVerdict {
            std::thread::sleep(Duration::from_millis(300));
            HookVerdict::Approve
        }
    }

    #[test]
    fn hook_timeout_defers_never_approves() {
        let f = fixture();
        f.workflow
            .register_hook("orchestrator", f.intent, Arc::new(SlowHook))
            .unwrap();

        let request = f
            .workflow
            .submit("stranger", PrincipalKind::Agent, f.intent, Tier::Write, "x")
            .unwrap();
        assert_eq!(request.status, crate::request::RequestStatus::Pending);
        assert_eq!(f.resolver.resolve("stranger", f.intent, Utc::now()), None);
        assert_eq!(f.governance.escalations.lock().unwrap().len(), 1);
    }

    #[test]
    fn hook_registration_is_admin_gated() {
        let f = fixture();
        let err = f
            .workflow
            .register_hook("stranger", f.intent, Arc::new(Fixed(HookVerdict::Approve)))
            .unwrap_err();
        assert!(matches!(err, AccessError::Forbidden { .. }));
    }

    #[test]
    fn pending_requests_lists_the_arbitration_queue() {
        let f = fixture();
        f.workflow
            .submit("a", PrincipalKind::Agent, f.intent, Tier::Read, "x")
            .unwrap();
        f.workflow
            .submit("b", PrincipalKind::User, f.intent, Tier::Write, "y")
            .unwrap();
        assert_eq!(f.workflow.pending_requests().unwrap().len(), 2);
    }
}
