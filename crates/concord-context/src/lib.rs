//! # concord-context
//!
//! Permission-filtered situational snapshots for Concord.
//!
//! Every access to an intent implicitly carries an [`IntentContext`]: parent
//! linkage, dependency outcomes, recent events, peers, attachments, and any
//! delegation record — each field cut down to the caller's tier by the
//! fixed visibility matrix in [`filter`]. Contexts are assembled on demand
//! by the [`ContextAssembler`] and held by the [`ContextCache`] until their
//! deadline or an invalidating event.
//!
//! ## Key invariants
//!
//! - **Filtering by field**, never whole-object redaction: write tier sees a
//!   richer dependency view without gaining ACL visibility.
//! - **Strict subsets**: the read view of any field is contained in the
//!   write view, and write in admin.
//! - **Visible partiality**: a collaborator outage degrades one field to an
//!   explicit unavailable marker, never to silent emptiness.
//! - **No authority in the cache**: cached contexts are projections; writes
//!   always go through the owning collaborator.

pub mod assembler;
pub mod cache;
pub mod context;
pub mod filter;

pub use assembler::ContextAssembler;
pub use cache::{ContextCache, DEFAULT_CONTEXT_TTL_SECS};
pub use context::{AclView, FieldView, IntentContext, PeerView};
pub use filter::{detail_for, ContextField, Detail, FieldRule, VISIBILITY_MATRIX};
