//! The server handler: one inbound message, one reply, exactly once per
//! HTTP call.

use std::time::{Duration, Instant};

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use xfer_types::LocalId;
use xfer_wire::card::Card;

use crate::auth::AuthStore;
use crate::config::ConfigAdapter;
use crate::emit::{OutboundBuffer, Planner};
use crate::error::ProtocolError;
use crate::ingest;
use crate::session::Session;
use crate::store::StoreAdapter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Post,
    Other,
}

pub struct ServerReply {
    pub bytes: Vec<u8>,
    pub errors: u32,
}

/// The method check is handled here rather than by the daemon's HTTP
/// layer so the core stays transport-agnostic while still owning the
/// "redirect non-POST to home" policy decision.
pub fn handle_request(
    method: HttpMethod,
    inbound: &[u8],
    store: &dyn StoreAdapter,
    auth: &dyn AuthStore,
    cfg: &dyn ConfigAdapter,
) -> Result<ServerReply, ProtocolError> {
    if method != HttpMethod::Post {
        return Err(ProtocolError::MethodNotAllowed);
    }

    store.begin()?;
    let max_time = Duration::from_secs(cfg.get_int("max-download-time", 300).max(0) as u64);
    let mut session = Session::new_server(cfg, Instant::now() + max_time);

    let outcome = ingest::dispatch(&mut session, store, auth, inbound);

    let mut errors = 0u32;
    let mut out = OutboundBuffer::new(session.mx_send, Instant::now() + max_time);

    match outcome {
        Ok(()) => {
            if session.role.push {
                for id in store.list_phantoms(500)? {
                    if let Some(hash) = store.local_id_to_hash(id)? {
                        out.push_card(&Card::INeed { hash });
                    }
                }
            }
            if session.clone_version.is_some() {
                stream_versioned_clone(&mut session, store, &mut out)?;
            } else if session.is_initial_clone_with_no_gimme() {
                for id in store.iterate_root()? {
                    if let Some(hash) = store.local_id_to_hash(id)? {
                        out.push_card(&Card::Have { hash, private: false });
                    }
                }
                if session.sync_private {
                    for id in store.list_private()? {
                        if let Some(hash) = store.local_id_to_hash(id)? {
                            out.push_card(&Card::IGot { hash, private: true });
                        }
                    }
                }
            }
            Planner::build(&mut session, store, &mut out)?;
            out.push_raw(timestamp_card(0).as_bytes());
            store.commit()?;
        }
        Err(e) => {
            errors += 1;
            out = OutboundBuffer::new(session.mx_send, Instant::now());
            out.push_card(&Card::Error { text: e.to_string() });
            out.push_raw(timestamp_card(errors).as_bytes());
            store.rollback()?;
        }
    }

    Ok(ServerReply {
        bytes: out.into_bytes(),
        errors,
    })
}

/// Versioned `clone V SEQ` pacing: stream artifacts ascending from
/// `SEQ` while budget allows, then report where to resume.
fn stream_versioned_clone(
    session: &mut Session,
    store: &dyn StoreAdapter,
    out: &mut OutboundBuffer,
) -> Result<(), ProtocolError> {
    let cursor = LocalId(session.clone_seqno.unwrap_or(0));
    let ids = store.iterate_ascending_from(cursor)?;
    let mut next = 0i64;
    for id in ids {
        if out.remaining_budget() == 0 {
            next = id.0;
            break;
        }
        Planner::send_artifact(out, session, store, id, None, false)?;
    }
    out.push_card(&Card::CloneSeqno { next });
    session.clone_seqno = Some(next);
    Ok(())
}

fn timestamp_card(errors: u32) -> String {
    let now = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string());
    format!("# timestamp {now} errors {errors}\n")
}
