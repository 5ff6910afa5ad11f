//! Local store identities ("nid" in the original protocol's vocabulary).

use serde::{Deserialize, Serialize};

/// A local-id assigned by the store adapter. The wire identity of an
/// artifact is always its [`crate::Hash`]; `LocalId` never appears on the
/// wire, only in store-adapter calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LocalId(pub i64);

impl LocalId {
    /// The sentinel used for "no cursor" / "exhausted" (clone_seqno 0,
    /// resync cursor 0).
    pub const NONE: LocalId = LocalId(0);

    /// Whether this id is the "none"/exhausted sentinel.
    pub fn is_none(self) -> bool {
        self == Self::NONE
    }
}

impl From<i64> for LocalId {
    fn from(value: i64) -> Self {
        LocalId(value)
    }
}

impl std::fmt::Display for LocalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
