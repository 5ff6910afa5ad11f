//! Ingest handlers: one function per inbound card kind. Cards
//! arrive already parsed into [`xfer_wire::Card`] — arity and type
//! validation happened at parse time, so handlers only implement
//! semantics, never token counting.

use thiserror::Error;

use xfer_types::Hash;
use xfer_wire::card::{AtomCard, CFileCard, Card, CloneRequest, FileCard};
use xfer_wire::framing::is_discarded;
use xfer_wire::{Framer, WireError};

use xfer_crypto::VerifyOutcome;

use crate::auth::AuthStore;
use crate::session::Session;
use crate::store::{StoreAdapter, StoreError};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("wrong project")]
    ProjectMismatch,
    #[error("not authorized to {0}")]
    Unauthorized(&'static str),
    #[error("login failed")]
    AuthFailure,
    #[error("wrong hash on received artifact: {0}")]
    HashMismatch(Hash),
    #[error("decompress failed")]
    DecompressFailed,
    #[error("bad command: {0}")]
    UnknownCard(String),
    #[error("server sent HTML instead of the expected reply")]
    Html,
    #[error("{0}")]
    PeerAborted(String),
    #[error("partial atom range not supported: {0} [{1}, {2}) of {3}")]
    PartialAtomUnsupported(Hash, u64, u64, u64),
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Run the full inbound pass over one message buffer. Stops at the
/// first handler error instead of trying to process the remainder.
pub fn dispatch(
    session: &mut Session,
    store: &dyn StoreAdapter,
    auth: &dyn AuthStore,
    buf: &[u8],
) -> Result<(), IngestError> {
    if buf.first() == Some(&b'<') {
        return Err(IngestError::Html);
    }
    let mut framer = Framer::new(buf);
    while let Some(line) = framer.next_line() {
        if is_discarded(line) {
            continue;
        }
        let tail = framer.remaining();
        let card = Card::parse(line, &mut framer).map_err(|e| match e {
            WireError::UnknownCard(verb) => IngestError::UnknownCard(verb),
            other => IngestError::Wire(other),
        })?;
        handle_card(session, store, auth, card, tail)?;
    }
    Ok(())
}

fn handle_card(
    session: &mut Session,
    store: &dyn StoreAdapter,
    auth: &dyn AuthStore,
    card: Card,
    tail: &[u8],
) -> Result<(), IngestError> {
    match card {
        Card::Pull { scode: _, pcode } => handle_pull(session, pcode),
        Card::Push { scode: _, pcode } => handle_push(session, pcode),
        Card::Clone(req) => handle_clone(session, req),
        Card::Login { user, nonce, sig } => handle_login(session, auth, user, nonce, sig, tail),
        Card::Have { hash, private: _ } => handle_have(session, store, hash),
        Card::IGot { hash, private } => handle_igot(session, store, hash, private),
        Card::INeed { hash } | Card::Gimme { hash } => {
            handle_requested(session, hash);
            Ok(())
        }
        Card::File(f) => handle_file(session, store, f),
        Card::CFile(f) => handle_cfile(session, store, f),
        Card::Atom(a) => handle_atom(session, store, a),
        Card::Config { name, size: _, payload } => {
            handle_config(session, name, payload);
            Ok(())
        }
        Card::Cookie { text } => {
            session.cookie = Some(text);
            Ok(())
        }
        Card::Private => {
            session.pending_private = true;
            Ok(())
        }
        Card::CloneSeqno { next } => {
            session.clone_seqno = Some(next);
            Ok(())
        }
        Card::Message { text } => {
            handle_message(session, &text);
            Ok(())
        }
        Card::Pragma { name, args } => {
            handle_pragma(session, &name, &args);
            Ok(())
        }
        Card::Error { text } => handle_error(session, text),
    }
}

fn handle_pull(session: &mut Session, pcode: String) -> Result<(), IngestError> {
    if pcode != session.project_code {
        return Err(IngestError::ProjectMismatch);
    }
    if !session.capabilities.read {
        return Err(IngestError::Unauthorized("read"));
    }
    session.role.pull = true;
    Ok(())
}

fn handle_push(session: &mut Session, pcode: String) -> Result<(), IngestError> {
    if pcode != session.project_code {
        return Err(IngestError::ProjectMismatch);
    }
    if !session.capabilities.write {
        if session.role.pull {
            session.pull_only = true;
            return Ok(());
        }
        return Err(IngestError::Unauthorized("write"));
    }
    session.role.push = true;
    Ok(())
}

fn handle_clone(session: &mut Session, req: CloneRequest) -> Result<(), IngestError> {
    if !session.capabilities.clone {
        return Err(IngestError::Unauthorized("clone"));
    }
    session.role.clone = true;
    match req {
        CloneRequest::Unversioned => session.clone_seqno = None,
        CloneRequest::Versioned { version, seq } => {
            session.clone_version = Some(version);
            session.clone_seqno = Some(seq);
        }
    }
    Ok(())
}

fn handle_login(
    session: &mut Session,
    auth: &dyn AuthStore,
    user: String,
    nonce: String,
    sig: String,
    tail: &[u8],
) -> Result<(), IngestError> {
    if !xfer_crypto::login::verify_tail_hash(&nonce, tail) {
        return Err(IngestError::AuthFailure);
    }
    if xfer_crypto::login::is_anonymous(&user) {
        session.capabilities = session.capabilities.union(xfer_types::Capabilities::anonymous_defaults());
        return Ok(());
    }
    let record = auth.lookup(&user).ok_or(IngestError::AuthFailure)?;
    if !xfer_crypto::login::verify_signature(&nonce, &record.stored_secret, &user, &sig) {
        return Err(IngestError::AuthFailure);
    }
    session.capabilities = session.capabilities.union(record.capabilities);
    Ok(())
}

fn handle_have(session: &mut Session, store: &dyn StoreAdapter, hash: Hash) -> Result<(), IngestError> {
    if !session.role.push {
        return Ok(());
    }
    let id = store.hash_to_local_id(&hash, true)?;
    session.peer_have.insert(id);
    Ok(())
}

fn handle_igot(
    session: &mut Session,
    store: &dyn StoreAdapter,
    hash: Hash,
    private: bool,
) -> Result<(), IngestError> {
    let create = session.role.pull || session.role.clone;
    let id = store.hash_to_local_id(&hash, create)?;
    session.peer_have.insert(id);
    if private {
        store.make_private(id)?;
        session.counters.n_priv_igot += 1;
    } else {
        store.make_public(id)?;
    }
    Ok(())
}

fn handle_requested(session: &mut Session, hash: Hash) {
    if session.capabilities.read {
        session.peer_need.insert(hash);
    }
}

fn handle_file(session: &mut Session, store: &dyn StoreAdapter, f: FileCard) -> Result<(), IngestError> {
    let id = match &f.delta_src {
        None => {
            require_match(&f.payload, &f.hash)?;
            let id = store.content_put(&f.payload, &f.hash, None, session.pending_private)?;
            session.counters.n_file_rcvd += 1;
            id
        }
        Some(src_hash) => {
            let src_id = store.hash_to_local_id(src_hash, true)?;
            if store.is_phantom(src_id)? {
                require_match(&f.payload, &f.hash)?;
                let id = store.content_put(&f.payload, &f.hash, None, session.pending_private)?;
                session.counters.n_dangling_file += 1;
                id
            } else {
                let reconstructed = store.apply_delta(src_id, &f.payload)?;
                require_match(&reconstructed, &f.hash)?;
                let id = store.content_put(&reconstructed, &f.hash, Some(src_id), session.pending_private)?;
                session.counters.n_delta_rcvd += 1;
                id
            }
        }
    };
    session.pending_private = false;
    session.peer_have.insert(id);
    Ok(())
}

fn handle_cfile(session: &mut Session, store: &dyn StoreAdapter, f: CFileCard) -> Result<(), IngestError> {
    let payload = decompress(&f.codec, &f.payload)?;
    let plain = FileCard {
        hash: f.hash,
        delta_src: f.delta_src,
        size: payload.len() as u64,
        payload,
    };
    handle_file(session, store, plain)
}

fn decompress(codec: &str, payload: &[u8]) -> Result<Vec<u8>, IngestError> {
    use std::io::Read;
    match codec {
        "gzip" => {
            let mut out = Vec::new();
            flate2::read::GzDecoder::new(payload)
                .read_to_end(&mut out)
                .map_err(|_| IngestError::DecompressFailed)?;
            Ok(out)
        }
        _ => Err(IngestError::DecompressFailed),
    }
}

fn require_match(content: &[u8], hash: &Hash) -> Result<(), IngestError> {
    match xfer_crypto::verify(content, hash) {
        VerifyOutcome::Ok => Ok(()),
        _ => Err(IngestError::HashMismatch(hash.clone())),
    }
}

fn handle_atom(session: &mut Session, store: &dyn StoreAdapter, atom: AtomCard) -> Result<(), IngestError> {
    if atom.boff == 0 && atom.eoff == atom.size {
        require_match(&atom.payload, &atom.hash)?;
        let id = store.content_put(&atom.payload, &atom.hash, None, session.pending_private)?;
        session.pending_private = false;
        session.peer_have.insert(id);
        Ok(())
    } else {
        Err(IngestError::PartialAtomUnsupported(atom.hash, atom.boff, atom.eoff, atom.size))
    }
}

fn handle_config(session: &mut Session, name: String, payload: Vec<u8>) {
    if session.requested_config.contains(&name) {
        session.received_config.push((name, payload));
    }
}

fn handle_message(session: &mut Session, text: &str) {
    if text.starts_with("pull only") {
        session.role.push = false;
        session.pull_only = true;
    }
}

fn handle_pragma(session: &mut Session, name: &str, args: &[String]) {
    match name {
        "server-version" => {
            if let Some(v) = args.first().and_then(|s| s.parse::<i64>().ok()) {
                session.peer_version = v;
            }
            if args.len() >= 3 {
                session.peer_build = Some((args[1].clone(), args[2].clone()));
            }
        }
        "uv-pull-only" => session.role.push = false,
        "avoid-delta-manifests" => session.avoid_delta_manifests = true,
        "ci-lock-fail" => tracing::warn!(args = ?args, "ci-lock-fail"),
        "link" => tracing::debug!(args = ?args, "alternate repository link"),
        _ => {}
    }
}

fn handle_error(session: &mut Session, text: String) -> Result<(), IngestError> {
    if session.is_first_clone_round() {
        tracing::debug!(%text, "suppressing error on first clone round");
        return Ok(());
    }
    if session.pull_only && text == "not authorized to write" {
        tracing::warn!(%text);
        return Ok(());
    }
    Err(IngestError::PeerAborted(text))
}
