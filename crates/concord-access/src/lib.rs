//! # concord-access
//!
//! ACL model and permission resolution for the Concord coordination core.
//!
//! Every principal touching a shared intent passes through the
//! [`PermissionResolver`], which computes an effective [`Tier`] from the
//! intent's [`AccessControlList`], creator attribution, and entry expiry.
//! The [`AclStore`] persists one ACL per intent and serializes mutations
//! per intent, appending an audit event for every change.
//!
//! ## Key invariants
//!
//! - **Fail closed**: any resolution error means no access, never a higher tier.
//! - **One active entry per principal**: a second grant replaces, not duplicates.
//! - **Lazy expiry**: expired entries are filtered at read time; correctness
//!   never depends on a background sweep having run.
//! - **Audited mutations**: every ACL change appends exactly one event per
//!   affected entry, carrying the acting principal.

pub mod acl;
pub mod audit;
pub mod collab;
pub mod error;
pub mod resolver;
pub mod store;
pub mod tier;

pub use acl::{AccessControlList, AccessEntry, DefaultPolicy};
pub use audit::{AccessEventKind, EventLog, EventRecord, EventVisibility};
pub use collab::{
    Attachment, AttachmentStore, DecisionRecord, DelegationRecord, DependencyResult, Directory,
    Governance, IntentGraph, LeaseManager, ParentSummary,
};
pub use error::AccessError;
pub use resolver::PermissionResolver;
pub use store::{AclStore, RemovalKind};
pub use tier::{PrincipalKind, Tier};
