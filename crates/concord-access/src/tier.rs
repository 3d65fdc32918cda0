// tier.rs — Permission tiers and principal kinds.
//
// Tiers are a fixed, totally ordered set: read < write < admin. They are
// cumulative — holding admin implies write and read. Deriving `Ord` on the
// enum (variants declared in ascending order) gives us the ordering for
// free, so "does tier X satisfy requirement Y" is a plain `>=` comparison.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A permission tier on an intent.
///
/// Declaration order matters: `Ord` is derived from it, so `Read < Write < Admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// See the intent: filtered context, public events, final results.
    Read,
    /// Contribute to the intent: working state, state-change events.
    Write,
    /// Govern the intent: full visibility, grant/revoke, request decisions.
    Admin,
}

impl Tier {
    /// Check whether this tier satisfies a requirement (cumulative tiers).
    pub fn allows(self, required: Tier) -> bool {
        self >= required
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Read => write!(f, "read"),
            Tier::Write => write!(f, "write"),
            Tier::Admin => write!(f, "admin"),
        }
    }
}

/// What kind of principal an identifier names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalKind {
    /// A human user.
    User,
    /// An automated agent.
    Agent,
    /// A group whose membership is resolved by the external directory.
    Group,
}
