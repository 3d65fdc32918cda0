// cache.rs — Read-through cache for assembled contexts.
//
// Entries are keyed by (principal, intent) and carry a deadline. They hold
// no authority: a cached context is a projection, never mutated in place,
// and any component may invalidate entries without coordination. The
// assembler is invoked outside the cache's map lock, so a slow collaborator
// never blocks unrelated lookups.
//
// Because assembly runs unlocked, a mutation can land between a miss and
// the insert of its freshly assembled snapshot. Each intent therefore has
// an invalidation generation: invalidation bumps it, a miss captures it,
// and the insert is skipped if it moved — the next lookup reassembles
// against post-mutation state instead of resurrecting the old snapshot.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use tracing::debug;
use uuid::Uuid;

use concord_access::{AccessError, Tier};

use crate::context::IntentContext;

/// Default time-to-live for a cached context.
pub const DEFAULT_CONTEXT_TTL_SECS: i64 = 30;

struct Slot {
    context: IntentContext,
    deadline: DateTime<Utc>,
}

#[derive(Default)]
struct CacheState {
    slots: HashMap<(String, Uuid), Slot>,
    /// Per-intent invalidation counter. A snapshot assembled under an older
    /// generation is stale and must not be inserted.
    generations: HashMap<Uuid, u64>,
}

impl CacheState {
    fn generation(&self, intent_id: Uuid) -> u64 {
        self.generations.get(&intent_id).copied().unwrap_or(0)
    }

    fn bump(&mut self, intent_id: Uuid) {
        *self.generations.entry(intent_id).or_insert(0) += 1;
    }
}

/// TTL + event-invalidated cache of assembled contexts.
pub struct ContextCache {
    state: Mutex<CacheState>,
    ttl: Duration,
}

impl ContextCache {
    /// Create a cache with the default 30-second TTL.
    pub fn new() -> Self {
        Self::with_ttl(Duration::seconds(DEFAULT_CONTEXT_TTL_SECS))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            ttl,
        }
    }

    /// Return a cached context if present, not past its deadline, and
    /// assembled for the caller's current tier; otherwise assemble, store
    /// with deadline `now + ttl`, and return the fresh snapshot.
    ///
    /// A tier mismatch counts as a miss: a context filtered for an old tier
    /// must never be served after a grant or downgrade. A snapshot whose
    /// assembly raced an invalidation is returned to its caller but not
    /// cached.
    pub fn get_or_assemble<F>(
        &self,
        principal_id: &str,
        intent_id: Uuid,
        tier: Tier,
        now: DateTime<Utc>,
        assemble: F,
    ) -> Result<IntentContext, AccessError>
    where
        F: FnOnce() -> Result<IntentContext, AccessError>,
    {
        let key = (principal_id.to_string(), intent_id);
        let generation = {
            let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(slot) = state.slots.get(&key) {
                if slot.deadline > now && slot.context.permission == tier {
                    return Ok(slot.context.clone());
                }
            }
            state.generation(intent_id)
        };

        // Miss: assemble without holding the map lock.
        let context = assemble()?;
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.generation(intent_id) == generation {
            state.slots.insert(
                key,
                Slot {
                    context: context.clone(),
                    deadline: now + self.ttl,
                },
            );
        } else {
            debug!(
                principal = principal_id,
                intent = %intent_id,
                "snapshot raced an invalidation; not cached"
            );
        }
        Ok(context)
    }

    /// Drop the cached context for one (principal, intent) pair and bump
    /// the intent's generation so an in-flight assembly cannot re-insert
    /// pre-invalidation state.
    pub fn invalidate(&self, principal_id: &str, intent_id: Uuid) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.bump(intent_id);
        if state
            .slots
            .remove(&(principal_id.to_string(), intent_id))
            .is_some()
        {
            debug!(principal = principal_id, intent = %intent_id, "context invalidated");
        }
    }

    /// Drop every cached context for an intent. Called on any ACL mutation,
    /// dependency completion, or new event affecting the intent.
    pub fn invalidate_all(&self, intent_id: Uuid) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.bump(intent_id);
        let before = state.slots.len();
        state.slots.retain(|(_, id), _| *id != intent_id);
        if state.slots.len() != before {
            debug!(intent = %intent_id, dropped = before - state.slots.len(), "intent contexts invalidated");
        }
    }

    /// Drop entries past their deadline. Housekeeping only — expired entries
    /// are never served regardless.
    pub fn purge_expired(&self, now: DateTime<Utc>) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.slots.retain(|_, slot| slot.deadline > now);
    }

    /// Number of live cached entries. Test and metrics hook.
    pub fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .slots
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ContextCache {
    fn default() -> Self {
        Self::new()
    }
}
