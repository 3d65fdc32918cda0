// config.rs — Coordinator tuning knobs.

use serde::{Deserialize, Serialize};

use concord_context::DEFAULT_CONTEXT_TTL_SECS;

/// Default time budget for a request-evaluation hook, in milliseconds.
pub const DEFAULT_HOOK_TIMEOUT_MS: u64 = 5_000;

/// Tunables for the coordination core. Loaded from the server's config file
/// alongside everything else; defaults are safe for production.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// How long an assembled context stays servable, in seconds. Events and
    /// ACL changes invalidate earlier.
    pub context_ttl_secs: i64,
    /// Hard time budget for a registered request hook, in milliseconds.
    /// A hook that exceeds it defers the request.
    pub hook_timeout_ms: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            context_ttl_secs: DEFAULT_CONTEXT_TTL_SECS,
            hook_timeout_ms: DEFAULT_HOOK_TIMEOUT_MS,
        }
    }
}
