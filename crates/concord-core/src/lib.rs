//! # concord-core
//!
//! The access-aware coordination core for Concord, behind one facade.
//!
//! Agents and users coordinate work through shared intents; every read of
//! an intent's situation and every change to who may touch it flows through
//! the [`AccessCoordinator`]:
//!
//! - permission resolution and gating ([`concord_access`])
//! - permission-filtered context snapshots, cached with a short TTL
//!   ([`concord_context`])
//! - the access-request workflow and the revocation cascade
//!   ([`concord_governance`])
//!
//! The server owns transport, the intent graph, leasing, and attachment
//! storage; it hands those in as [`Collaborators`] and calls coordinator
//! methods from its handlers.

pub mod config;
pub mod coordinator;

pub use config::{CoordinatorConfig, DEFAULT_HOOK_TIMEOUT_MS};
pub use coordinator::{AccessCoordinator, Collaborators};

pub use concord_access::{
    AccessControlList, AccessEntry, AccessError, AccessEventKind, AttachmentStore, DefaultPolicy,
    Directory, EventLog, EventRecord, EventVisibility, Governance, IntentGraph, LeaseManager,
    PrincipalKind, Tier,
};
pub use concord_context::{AclView, FieldView, IntentContext, PeerView};
pub use concord_governance::{AccessRequest, Decision, HookVerdict, RequestHook, RequestStatus};
