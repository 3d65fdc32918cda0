//! # concord-governance
//!
//! The access-request workflow and the revocation cascade for Concord.
//!
//! A principal without access to an intent submits an [`AccessRequest`];
//! the [`AccessWorkflow`] consults any registered [`RequestHook`] under a
//! timeout, escalates deferrals for human arbitration, and applies admin
//! decisions. Approval lands an ACL entry at the decided tier. The
//! [`RevocationCascade`] runs the teardown in the other direction: ACL
//! removal first (authoritative), then lease teardown and cache
//! invalidation (best effort).
//!
//! ## Key invariants
//!
//! - **Single transition**: a request resolves exactly once; later
//!   decisions fail with `TerminalState`.
//! - **Timeout is defer**: a hook that does not answer in time never
//!   approves.
//! - **Revocation is ordered**: once the ACL entry is gone, access is gone;
//!   a lease-teardown failure leaves orphans, not access.

pub mod hook;
pub mod request;
pub mod revocation;
pub mod workflow;

pub use hook::{evaluate_bounded, HookRegistry, HookVerdict, RequestHook};
pub use request::{AccessRequest, RequestStatus, RequestStore};
pub use revocation::{CascadeOutcome, RevocationCascade};
pub use workflow::{AccessWorkflow, Decision, DEFAULT_HOOK_TIMEOUT};
