//! The store adapter interface. The engine never touches a blob or a
//! SQL statement directly — every content and identity operation goes
//! through this trait, which `xfer-store` implements against SQLite and
//! an in-memory backend.

use thiserror::Error;
use xfer_types::{Hash, LocalId};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no such artifact: {0}")]
    NotFound(LocalId),
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Narrow interface over the content-addressed blob store. Implementors
/// use interior mutability (a pooled connection, a `RefCell`) so the
/// trait can be shared behind `&dyn StoreAdapter` across a whole request.
pub trait StoreAdapter {
    /// Resolve a hash to its local-id, creating a phantom row if absent
    /// and `create_phantom` is set.
    fn hash_to_local_id(&self, hash: &Hash, create_phantom: bool) -> Result<LocalId, StoreError>;

    fn local_id_to_hash(&self, id: LocalId) -> Result<Option<Hash>, StoreError>;

    fn content_get(&self, id: LocalId) -> Result<Option<Vec<u8>>, StoreError>;

    fn content_put(
        &self,
        bytes: &[u8],
        hash: &Hash,
        delta_src: Option<LocalId>,
        private: bool,
    ) -> Result<LocalId, StoreError>;

    fn is_private(&self, id: LocalId) -> Result<bool, StoreError>;

    fn make_public(&self, id: LocalId) -> Result<(), StoreError>;

    /// Mark an existing artifact private, the inverse of [`StoreAdapter::make_public`].
    fn make_private(&self, id: LocalId) -> Result<(), StoreError>;

    fn apply_delta(&self, src: LocalId, delta: &[u8]) -> Result<Vec<u8>, StoreError>;

    /// Encode `target`'s content as a diff against `src`'s content, for
    /// wire transmission. The inverse of [`StoreAdapter::apply_delta`].
    fn encode_delta(&self, src: LocalId, target: LocalId) -> Result<Vec<u8>, StoreError>;

    /// The store's own notion of the best delta source for `target`
    /// (e.g. the most recently stored sibling), if any.
    fn native_delta_source(&self, target: LocalId) -> Result<Option<LocalId>, StoreError>;

    /// The immediate parent-manifest artifact of `target`, if the store
    /// tracks manifest lineage.
    fn parent_manifest_source(&self, target: LocalId) -> Result<Option<LocalId>, StoreError>;

    fn is_phantom(&self, id: LocalId) -> Result<bool, StoreError>;

    fn phantom_count(&self) -> Result<usize, StoreError>;

    fn list_phantoms(&self, limit: usize) -> Result<Vec<LocalId>, StoreError>;

    fn list_private(&self) -> Result<Vec<LocalId>, StoreError>;

    /// The "root" (unclustered) set for normal-mode push announcements.
    fn iterate_root(&self) -> Result<Vec<LocalId>, StoreError>;

    /// All local-ids in descending order, strictly below `cursor` (or
    /// from the top if `cursor` is `None`) — resync mode.
    fn iterate_all_descending(&self, cursor: Option<LocalId>) -> Result<Vec<LocalId>, StoreError>;

    /// All local-ids in ascending order, at or above `cursor` — versioned
    /// clone streaming.
    fn iterate_ascending_from(&self, cursor: LocalId) -> Result<Vec<LocalId>, StoreError>;

    fn artifact_count(&self) -> Result<u64, StoreError>;

    fn begin(&self) -> Result<(), StoreError>;
    fn commit(&self) -> Result<(), StoreError>;
    fn rollback(&self) -> Result<(), StoreError>;
}
