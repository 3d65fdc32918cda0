// hook.rs — Request-evaluation hooks.
//
// An intent's admin may register a hook that is consulted synchronously when
// a request is submitted. The hook is an untrusted, possibly-slow plugin: it
// may call out to an agent registry or anything else that blocks. Its
// invocation is therefore bounded by a timeout, and a timeout is treated as
// `defer` — never, under any circumstances, as approval.

use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use concord_access::AccessError;

use crate::request::AccessRequest;

/// What a hook says about a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookVerdict {
    /// Grant the requested tier immediately.
    Approve,
    /// Deny immediately.
    Deny,
    /// Leave pending and escalate to human arbitration.
    Defer,
}

/// A registered request-evaluation strategy.
pub trait RequestHook: Send + Sync {
    fn evaluate(&self, request: &AccessRequest) -> HookVerdict;
}

/// Per-intent hook registrations.
#[derive(Default)]
pub struct HookRegistry {
    hooks: Mutex<HashMap<Uuid, Arc<dyn RequestHook>>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the hook for an intent.
    pub fn register(&self, intent_id: Uuid, hook: Arc<dyn RequestHook>) {
        self.hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(intent_id, hook);
    }

    /// Remove the hook for an intent, if any.
    pub fn clear(&self, intent_id: Uuid) {
        self.hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&intent_id);
    }

    pub fn get(&self, intent_id: Uuid) -> Option<Arc<dyn RequestHook>> {
        self.hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&intent_id)
            .cloned()
    }
}

/// Invoke a hook with a hard time budget.
///
/// The hook runs on its own thread; if it does not answer within `timeout`
/// the call returns `PolicyHookTimeout` and the thread is left to finish in
/// the background (its late answer is discarded).
pub fn evaluate_bounded(
    hook: Arc<dyn RequestHook + 'static>,
    request: AccessRequest,
    timeout: Duration,
) -> Result<HookVerdict, AccessError> {
    let intent_id = request.intent_id;
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        // The receiver may be gone already on timeout; that's fine.
        let _ = tx.send(hook.evaluate(&request));
    });
    match rx.recv_timeout(timeout) {
        Ok(verdict) => Ok(verdict),
        Err(_) => Err(AccessError::PolicyHookTimeout {
            intent_id,
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}
