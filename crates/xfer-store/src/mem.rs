//! A `HashMap`-backed [`StoreAdapter`], for fast unit tests across crates
//! that don't need SQLite's durability.

use std::cell::RefCell;
use std::collections::HashMap;

use xfer_core::store::{StoreAdapter, StoreError};
use xfer_types::{Hash, LocalId};

use crate::delta;

#[derive(Default)]
struct Row {
    hash: String,
    content: Option<Vec<u8>>,
    delta_src: Option<LocalId>,
    parent_manifest: Option<LocalId>,
    is_private: bool,
}

#[derive(Default)]
struct Inner {
    rows: HashMap<i64, Row>,
    by_hash: HashMap<String, i64>,
    next_id: i64,
    in_txn: bool,
    snapshot: Option<(HashMap<i64, Row>, HashMap<String, i64>, i64)>,
}

/// An in-memory [`StoreAdapter`]. Not thread-safe (`RefCell`); matches the
/// single-threaded-per-session calling convention the engine already
/// assumes.
pub struct MemoryStore {
    inner: RefCell<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        MemoryStore {
            inner: RefCell::new(Inner { next_id: 1, ..Inner::default() }),
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoreAdapter for MemoryStore {
    fn hash_to_local_id(&self, hash: &Hash, create_phantom: bool) -> std::result::Result<LocalId, StoreError> {
        let mut inner = self.inner.borrow_mut();
        if let Some(&id) = inner.by_hash.get(hash.as_str()) {
            return Ok(LocalId(id));
        }
        if !create_phantom {
            return Err(StoreError::NotFound(LocalId(0)));
        }
        let id = inner.next_id;
        inner.next_id += 1;
        inner.by_hash.insert(hash.as_str().to_string(), id);
        inner.rows.insert(
            id,
            Row {
                hash: hash.as_str().to_string(),
                ..Row::default()
            },
        );
        Ok(LocalId(id))
    }

    fn local_id_to_hash(&self, id: LocalId) -> std::result::Result<Option<Hash>, StoreError> {
        let inner = self.inner.borrow();
        Ok(inner.rows.get(&id.0).and_then(|r| Hash::parse(&r.hash).ok()))
    }

    fn content_get(&self, id: LocalId) -> std::result::Result<Option<Vec<u8>>, StoreError> {
        let inner = self.inner.borrow();
        Ok(inner.rows.get(&id.0).and_then(|r| r.content.clone()))
    }

    fn content_put(
        &self,
        bytes: &[u8],
        hash: &Hash,
        delta_src: Option<LocalId>,
        private: bool,
    ) -> std::result::Result<LocalId, StoreError> {
        let mut inner = self.inner.borrow_mut();
        let id = if let Some(&id) = inner.by_hash.get(hash.as_str()) {
            id
        } else {
            let id = inner.next_id;
            inner.next_id += 1;
            inner.by_hash.insert(hash.as_str().to_string(), id);
            id
        };
        let parent_manifest = inner.rows.get(&id).and_then(|r| r.parent_manifest);
        inner.rows.insert(
            id,
            Row {
                hash: hash.as_str().to_string(),
                content: Some(bytes.to_vec()),
                delta_src,
                parent_manifest,
                is_private: private,
            },
        );
        Ok(LocalId(id))
    }

    fn is_private(&self, id: LocalId) -> std::result::Result<bool, StoreError> {
        Ok(self.inner.borrow().rows.get(&id.0).map(|r| r.is_private).unwrap_or(false))
    }

    fn make_public(&self, id: LocalId) -> std::result::Result<(), StoreError> {
        if let Some(row) = self.inner.borrow_mut().rows.get_mut(&id.0) {
            row.is_private = false;
        }
        Ok(())
    }

    fn make_private(&self, id: LocalId) -> std::result::Result<(), StoreError> {
        if let Some(row) = self.inner.borrow_mut().rows.get_mut(&id.0) {
            row.is_private = true;
        }
        Ok(())
    }

    fn apply_delta(&self, src: LocalId, delta_bytes: &[u8]) -> std::result::Result<Vec<u8>, StoreError> {
        let src_content = self.content_get(src)?.ok_or(StoreError::NotFound(src))?;
        Ok(delta::apply(&src_content, delta_bytes)?)
    }

    fn encode_delta(&self, src: LocalId, target: LocalId) -> std::result::Result<Vec<u8>, StoreError> {
        let src_content = self.content_get(src)?.ok_or(StoreError::NotFound(src))?;
        let target_content = self.content_get(target)?.ok_or(StoreError::NotFound(target))?;
        Ok(delta::encode(&src_content, &target_content))
    }

    fn native_delta_source(&self, target: LocalId) -> std::result::Result<Option<LocalId>, StoreError> {
        Ok(self.inner.borrow().rows.get(&target.0).and_then(|r| r.delta_src))
    }

    fn parent_manifest_source(&self, target: LocalId) -> std::result::Result<Option<LocalId>, StoreError> {
        Ok(self.inner.borrow().rows.get(&target.0).and_then(|r| r.parent_manifest))
    }

    fn is_phantom(&self, id: LocalId) -> std::result::Result<bool, StoreError> {
        Ok(self.inner.borrow().rows.get(&id.0).map(|r| r.content.is_none()).unwrap_or(true))
    }

    fn phantom_count(&self) -> std::result::Result<usize, StoreError> {
        Ok(self.inner.borrow().rows.values().filter(|r| r.content.is_none()).count())
    }

    fn list_phantoms(&self, limit: usize) -> std::result::Result<Vec<LocalId>, StoreError> {
        let inner = self.inner.borrow();
        let mut ids: Vec<i64> = inner.rows.iter().filter(|(_, r)| r.content.is_none()).map(|(id, _)| *id).collect();
        ids.sort_unstable();
        ids.truncate(limit);
        Ok(ids.into_iter().map(LocalId).collect())
    }

    fn list_private(&self) -> std::result::Result<Vec<LocalId>, StoreError> {
        let inner = self.inner.borrow();
        let mut ids: Vec<i64> = inner
            .rows
            .iter()
            .filter(|(_, r)| r.is_private && r.content.is_some())
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        Ok(ids.into_iter().map(LocalId).collect())
    }

    fn iterate_root(&self) -> std::result::Result<Vec<LocalId>, StoreError> {
        let inner = self.inner.borrow();
        let mut ids: Vec<i64> = inner
            .rows
            .iter()
            .filter(|(_, r)| r.content.is_some() && !r.is_private)
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        Ok(ids.into_iter().map(LocalId).collect())
    }

    fn iterate_all_descending(&self, cursor: Option<LocalId>) -> std::result::Result<Vec<LocalId>, StoreError> {
        let inner = self.inner.borrow();
        let bound = cursor.map(|c| c.0).unwrap_or(i64::MAX);
        let mut ids: Vec<i64> = inner
            .rows
            .iter()
            .filter(|(id, r)| r.content.is_some() && **id < bound)
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable_by(|a, b| b.cmp(a));
        Ok(ids.into_iter().map(LocalId).collect())
    }

    fn iterate_ascending_from(&self, cursor: LocalId) -> std::result::Result<Vec<LocalId>, StoreError> {
        let inner = self.inner.borrow();
        let mut ids: Vec<i64> = inner
            .rows
            .iter()
            .filter(|(id, r)| r.content.is_some() && **id >= cursor.0)
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        Ok(ids.into_iter().map(LocalId).collect())
    }

    fn artifact_count(&self) -> std::result::Result<u64, StoreError> {
        Ok(self.inner.borrow().rows.values().filter(|r| r.content.is_some()).count() as u64)
    }

    fn begin(&self) -> std::result::Result<(), StoreError> {
        let mut inner = self.inner.borrow_mut();
        inner.snapshot = Some((inner.rows.clone_for_snapshot(), inner.by_hash.clone(), inner.next_id));
        inner.in_txn = true;
        Ok(())
    }

    fn commit(&self) -> std::result::Result<(), StoreError> {
        let mut inner = self.inner.borrow_mut();
        inner.snapshot = None;
        inner.in_txn = false;
        Ok(())
    }

    fn rollback(&self) -> std::result::Result<(), StoreError> {
        let mut inner = self.inner.borrow_mut();
        if let Some((rows, by_hash, next_id)) = inner.snapshot.take() {
            inner.rows = rows;
            inner.by_hash = by_hash;
            inner.next_id = next_id;
        }
        inner.in_txn = false;
        Ok(())
    }
}

trait CloneForSnapshot {
    fn clone_for_snapshot(&self) -> Self;
}

impl CloneForSnapshot for HashMap<i64, Row> {
    fn clone_for_snapshot(&self) -> Self {
        self.iter()
            .map(|(id, r)| {
                (
                    *id,
                    Row {
                        hash: r.hash.clone(),
                        content: r.content.clone(),
                        delta_src: r.delta_src,
                        parent_manifest: r.parent_manifest,
                        is_private: r.is_private,
                    },
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash_of(byte: u8) -> Hash {
        Hash::parse(&format!("{:02x}", byte).repeat(20)).unwrap()
    }

    #[test]
    fn phantom_then_fill_updates_in_place() {
        let store = MemoryStore::new();
        let hash = hash_of(0xab);
        let id = store.hash_to_local_id(&hash, true).unwrap();
        assert!(store.is_phantom(id).unwrap());
        store.content_put(b"payload", &hash, None, false).unwrap();
        assert!(!store.is_phantom(id).unwrap());
        assert_eq!(store.content_get(id).unwrap().unwrap(), b"payload");
    }

    #[test]
    fn rollback_restores_pre_transaction_state() {
        let store = MemoryStore::new();
        let hash = hash_of(0x01);
        store.content_put(b"before", &hash, None, false).unwrap();
        store.begin().unwrap();
        let hash2 = hash_of(0x02);
        store.content_put(b"during", &hash2, None, false).unwrap();
        store.rollback().unwrap();
        assert_eq!(store.artifact_count().unwrap(), 1);
    }

    #[test]
    fn commit_keeps_writes() {
        let store = MemoryStore::new();
        store.begin().unwrap();
        let hash = hash_of(0x03);
        store.content_put(b"kept", &hash, None, false).unwrap();
        store.commit().unwrap();
        assert_eq!(store.artifact_count().unwrap(), 1);
    }
}
