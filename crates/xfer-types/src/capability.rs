//! Peer capabilities granted by a successful `login` card.

use serde::{Deserialize, Serialize};

/// Capabilities a peer has been granted for the current session.
///
/// Multiple successful `login` cards within one message union their
/// capabilities: `a.union(b)` never removes a capability `a` already
/// held.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// May issue `pull`.
    pub read: bool,
    /// May issue `push`.
    pub write: bool,
    /// May issue `clone`.
    pub clone: bool,
}

impl Capabilities {
    /// The capabilities granted to an anonymous (`nobody`/`anonymous`) login.
    pub fn anonymous_defaults() -> Self {
        Self {
            read: true,
            write: false,
            clone: true,
        }
    }

    /// Union two capability sets (logical OR per flag).
    pub fn union(self, other: Capabilities) -> Capabilities {
        Capabilities {
            read: self.read || other.read,
            write: self.write || other.write,
            clone: self.clone || other.clone,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_is_strictly_additive() {
        let a = Capabilities {
            read: true,
            write: false,
            clone: false,
        };
        let b = Capabilities {
            read: false,
            write: true,
            clone: false,
        };
        let u = a.union(b);
        assert!(u.read && u.write && !u.clone);
    }

    #[test]
    fn anonymous_cannot_write() {
        assert!(!Capabilities::anonymous_defaults().write);
    }
}
