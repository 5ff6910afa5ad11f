//! # xfer-types
//!
//! Shared wire-agnostic domain types for the xfer synchronization protocol.
//! Every crate in the workspace depends on this one for the vocabulary that
//! the protocol grammar and the store adapter agree on: hashes, local
//! identities, and peer capabilities.
//!
//! ## Modules
//!
//! - [`hash`] — the `Hash` newtype and its two supported algorithms.
//! - [`ids`] — the `LocalId` store identity.
//! - [`capability`] — peer capability flags negotiated by `login`.

pub mod capability;
pub mod hash;
pub mod ids;

pub use capability::Capabilities;
pub use hash::{Hash, HashAlgorithm, HashError};
pub use ids::LocalId;
