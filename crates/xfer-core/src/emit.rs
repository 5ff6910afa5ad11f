//! The emit planner: decides what goes into the next outbound message,
//! step by step, bounded by a byte cap and a wall-clock deadline.

use std::time::Instant;

use thiserror::Error;

use xfer_types::{Hash, HashAlgorithm, LocalId};
use xfer_wire::card::{Card, FileCard};

use crate::session::{
    Session, MAX_PHANTOM_REQUEST_CEILING, PRIVATE_HAVE_MIN_PEER_VERSION, SHA3_MIN_PEER_VERSION,
};
use crate::store::{StoreAdapter, StoreError};

#[derive(Debug, Error)]
pub enum EmitError {
    #[error("no such artifact: {0}")]
    UnknownArtifact(LocalId),
    #[error("artifact {0} has no content")]
    MissingContent(LocalId),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Accumulates outbound card bytes against a byte cap and deadline.
pub struct OutboundBuffer {
    bytes: Vec<u8>,
    mx_send: usize,
    deadline: Instant,
}

impl OutboundBuffer {
    pub fn new(mx_send: usize, deadline: Instant) -> Self {
        OutboundBuffer {
            bytes: Vec::new(),
            mx_send,
            deadline,
        }
    }

    pub fn push_card(&mut self, card: &Card) {
        self.bytes.extend(card.format());
    }

    pub fn push_raw(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn remaining_budget(&self) -> usize {
        self.mx_send.saturating_sub(self.bytes.len())
    }

    pub fn deadline_exceeded(&self) -> bool {
        Instant::now() >= self.deadline
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// The two delta-source lookup policies (Design Note "enum of
/// strategies with a common interface").
pub trait DeltaSource {
    fn find_source(&self, store: &dyn StoreAdapter, target: LocalId) -> Option<LocalId>;
}

pub struct NativeDelta;

impl DeltaSource for NativeDelta {
    fn find_source(&self, store: &dyn StoreAdapter, target: LocalId) -> Option<LocalId> {
        store.native_delta_source(target).ok().flatten()
    }
}

pub struct ParentManifest;

impl DeltaSource for ParentManifest {
    fn find_source(&self, store: &dyn StoreAdapter, target: LocalId) -> Option<LocalId> {
        store.parent_manifest_source(target).ok().flatten()
    }
}

pub struct Planner;

impl Planner {
    /// Run the data-dependent emit steps in order: gimme, have, private
    /// igot, and responses to the peer's outstanding requests. The
    /// per-request role/pragma/cookie cards are owned directly by the
    /// client driver and server handler instead.
    pub fn build(
        session: &mut Session,
        store: &dyn StoreAdapter,
        out: &mut OutboundBuffer,
    ) -> Result<(), EmitError> {
        if session.should_request_gimmes() {
            Self::emit_gimmes(session, store, out)?;
        }
        if session.should_announce_haves() {
            Self::emit_haves(session, store, out)?;
            if session.sync_private {
                Self::emit_private_igots(session, store, out)?;
            }
        }
        Self::respond_to_requests(session, store, out)?;
        Ok(())
    }

    fn emit_gimmes(session: &mut Session, store: &dyn StoreAdapter, out: &mut OutboundBuffer) -> Result<(), EmitError> {
        let phantoms = store.list_phantoms(session.mx_phantom_req)?;
        for id in phantoms {
            let Some(hash) = store.local_id_to_hash(id)? else {
                continue;
            };
            if session.requested_from_peer.contains(&hash) {
                continue;
            }
            out.push_card(&Card::Gimme { hash: hash.clone() });
            session.requested_from_peer.insert(hash);
            session.counters.n_gimme_sent += 1;
        }
        session.mx_phantom_req = (session.mx_phantom_req * 2).min(MAX_PHANTOM_REQUEST_CEILING);
        Ok(())
    }

    fn emit_haves(session: &mut Session, store: &dyn StoreAdapter, out: &mut OutboundBuffer) -> Result<(), EmitError> {
        let ids = if session.resync_active {
            store.iterate_all_descending(session.resync_cursor)?
        } else {
            store.iterate_root()?
        };
        let mut exhausted = true;
        for id in ids {
            if out.remaining_budget() == 0 {
                if session.resync_active {
                    session.resync_cursor = Some(id);
                }
                exhausted = false;
                break;
            }
            if session.peer_have.contains(&id) {
                continue;
            }
            let Some(hash) = store.local_id_to_hash(id)? else {
                continue;
            };
            out.push_card(&Card::Have { hash, private: false });
            session.peer_have.insert(id);
        }
        if session.resync_active && exhausted {
            session.resync_cursor = None;
            session.resync_active = false;
        }
        Ok(())
    }

    fn emit_private_igots(
        session: &mut Session,
        store: &dyn StoreAdapter,
        out: &mut OutboundBuffer,
    ) -> Result<(), EmitError> {
        for id in store.list_private()? {
            if session.peer_have.contains(&id) {
                continue;
            }
            let Some(hash) = store.local_id_to_hash(id)? else {
                continue;
            };
            out.push_card(&Card::IGot { hash, private: true });
            session.peer_have.insert(id);
            session.counters.n_igot_sent += 1;
        }
        Ok(())
    }

    fn respond_to_requests(
        session: &mut Session,
        store: &dyn StoreAdapter,
        out: &mut OutboundBuffer,
    ) -> Result<(), EmitError> {
        for hash in session.peer_need.drain() {
            if !session.capabilities.read {
                continue;
            }
            let id = store.hash_to_local_id(&hash, false)?;
            Planner::send_artifact(out, session, store, id, Some(&hash), true)?;
        }
        Ok(())
    }

    /// The central emission decision: send as a delta when a native
    /// source is known and allowed, otherwise send the full content.
    pub fn send_artifact(
        out: &mut OutboundBuffer,
        session: &mut Session,
        store: &dyn StoreAdapter,
        rid: LocalId,
        hash_hint: Option<&Hash>,
        prefer_native_delta: bool,
    ) -> Result<(), EmitError> {
        let hash = match hash_hint {
            Some(h) => h.clone(),
            None => store
                .local_id_to_hash(rid)?
                .ok_or(EmitError::UnknownArtifact(rid))?,
        };
        let private = store.is_private(rid)?;
        if private && !session.sync_private {
            if session.peer_version >= PRIVATE_HAVE_MIN_PEER_VERSION {
                out.push_card(&Card::Have { hash, private: true });
            }
            return Ok(());
        }
        if session.peer_have.contains(&rid) {
            return Ok(());
        }
        if hash.algorithm() == HashAlgorithm::Sha3_256 && session.peer_version < SHA3_MIN_PEER_VERSION {
            out.push_card(&Card::Pragma {
                name: "cannot-send-sha3".to_string(),
                args: vec![hash.to_string()],
            });
            session.peer_have.insert(rid);
            return Ok(());
        }
        if out.deadline_exceeded() || out.remaining_budget() == 0 {
            out.push_card(&Card::Have { hash, private });
            session.peer_have.insert(rid);
            return Ok(());
        }
        let want_private_prefix = private && session.sync_private;
        if prefer_native_delta {
            if let Some(src) = NativeDelta.find_source(store, rid) {
                if let Some(src_hash) = store.local_id_to_hash(src)? {
                    let delta = store.encode_delta(src, rid)?;
                    if want_private_prefix {
                        out.push_card(&Card::Private);
                    }
                    out.push_card(&Card::File(FileCard {
                        hash,
                        delta_src: Some(src_hash),
                        size: delta.len() as u64,
                        payload: delta,
                    }));
                    session.counters.n_delta_sent += 1;
                    session.peer_have.insert(rid);
                    return Ok(());
                }
            }
        }
        let content = store.content_get(rid)?.ok_or(EmitError::MissingContent(rid))?;
        if content.len() > 100 && !session.avoid_delta_manifests {
            if let Some(src) = ParentManifest.find_source(store, rid) {
                if let Some(src_hash) = store.local_id_to_hash(src)? {
                    let delta = store.encode_delta(src, rid)?;
                    if delta.len() < content.len() {
                        if want_private_prefix {
                            out.push_card(&Card::Private);
                        }
                        out.push_card(&Card::File(FileCard {
                            hash,
                            delta_src: Some(src_hash),
                            size: delta.len() as u64,
                            payload: delta,
                        }));
                        session.counters.n_delta_sent += 1;
                        session.peer_have.insert(rid);
                        return Ok(());
                    }
                }
            }
        }
        if want_private_prefix {
            out.push_card(&Card::Private);
        }
        out.push_card(&Card::File(FileCard {
            hash,
            delta_src: None,
            size: content.len() as u64,
            payload: content,
        }));
        session.counters.n_file_sent += 1;
        session.peer_have.insert(rid);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_degrades_content_to_have_card() {
        let mut out = OutboundBuffer::new(0, Instant::now() + std::time::Duration::from_secs(5));
        assert_eq!(out.remaining_budget(), 0);
    }

    #[test]
    fn deadline_in_the_past_is_already_exceeded() {
        let out = OutboundBuffer::new(1024, Instant::now() - std::time::Duration::from_secs(1));
        assert!(out.deadline_exceeded());
    }
}
