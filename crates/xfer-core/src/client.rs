//! The client driver: the top-level per-round loop, alternating emit,
//! one HTTP exchange, and ingest until the termination predicate says
//! to stop.

use std::time::{Duration, Instant};

use rand::RngCore;
use thiserror::Error;

use xfer_wire::card::Card;

use crate::auth::{AuthRecord, AuthStore};
use crate::config::ConfigAdapter;
use crate::emit::{EmitError, OutboundBuffer, Planner};
use crate::ingest::{self, IngestError};
use crate::session::{terminate, Role, Session};
use crate::store::{StoreAdapter, StoreError};
use crate::transport::{Transport, TransportError};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    Emit(#[from] EmitError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("server sent HTML instead of the expected reply")]
    Html,
    #[error("round ceiling exceeded without termination")]
    RoundCeilingExceeded,
}

#[derive(Debug, Clone, Default)]
pub struct SessionReport {
    pub rounds: u32,
    pub errors: u32,
}

/// A client never needs to authenticate an inbound login card (the
/// server does that); this always-empty lookup satisfies
/// [`ingest::dispatch`]'s signature on the client side.
pub struct NoAuth;

impl AuthStore for NoAuth {
    fn lookup(&self, _user: &str) -> Option<AuthRecord> {
        None
    }
}

pub struct LoginCredentials {
    pub user: String,
    pub secret: Vec<u8>,
}

const CLIENT_VERSION: &str = "1";
const ROUND_CEILING: u32 = 64;

pub struct Driver<'a> {
    pub session: Session,
    pub store: &'a dyn StoreAdapter,
    pub login: LoginCredentials,
}

impl<'a> Driver<'a> {
    /// `resync` mirrors `--verily`: force a from-scratch `have` sweep
    /// instead of trusting whatever cursor the peer already reported.
    pub fn new(
        cfg: &dyn ConfigAdapter,
        role: Role,
        store: &'a dyn StoreAdapter,
        login: LoginCredentials,
        resync: bool,
    ) -> Self {
        let max_time = Duration::from_secs(cfg.get_int("max-download-time", 300).max(0) as u64);
        Driver {
            session: Session::new_client(cfg, role, Instant::now() + max_time, resync),
            store,
            login,
        }
    }

    /// Run rounds until [`terminate`] says to stop.
    pub fn run(&mut self, transport: &dyn Transport) -> Result<SessionReport, ClientError> {
        let auth = NoAuth;
        let mut errors = 0u32;

        loop {
            if self.session.round >= ROUND_CEILING {
                return Err(ClientError::RoundCeilingExceeded);
            }

            self.session.counters.reset();
            self.store.begin()?;

            let deadline = self.session.deadline;
            let mut out = OutboundBuffer::new(self.session.mx_send, deadline);
            out.push_card(&Card::Pragma {
                name: "client-version".to_string(),
                args: vec![CLIENT_VERSION.to_string()],
            });
            if self.session.role.push {
                out.push_card(&Card::Push {
                    scode: self.session.server_code.clone(),
                    pcode: self.session.project_code.clone(),
                });
            }
            if self.session.role.pull {
                out.push_card(&Card::Pull {
                    scode: self.session.server_code.clone(),
                    pcode: self.session.project_code.clone(),
                });
            }
            if let Some(cookie) = self.session.cookie.clone() {
                out.push_card(&Card::Cookie { text: cookie });
            }

            Planner::build(&mut self.session, self.store, &mut out)?;
            out.push_raw(format!("# NONCE {}\n", random_hex_token()).as_bytes());

            // The login card must precede every capability-gated card it
            // authorizes, so it is assembled last but written first: its
            // NONCE seals everything built above as the card's tail.
            let tail = out.into_bytes();
            let outbound_bytes = if self.session.is_first_clone_round() {
                tail
            } else {
                let nonce = xfer_crypto::sha1::hex(&tail);
                let sig = xfer_crypto::sha1::hex_concat(&[nonce.as_bytes(), self.login.secret.as_slice()]);
                let login_line = Card::Login {
                    user: self.login.user.clone(),
                    nonce,
                    sig,
                }
                .format();
                let mut bytes = login_line;
                bytes.extend_from_slice(&tail);
                bytes
            };
            let reply = match transport.exchange(&outbound_bytes) {
                Ok(bytes) => bytes,
                Err(e) => {
                    errors += 1;
                    self.store.rollback()?;
                    return Err(ClientError::Transport(e));
                }
            };

            if reply.first() == Some(&b'<') {
                self.store.rollback()?;
                return Err(ClientError::Html);
            }

            match ingest::dispatch(&mut self.session, self.store, &auth, &reply) {
                Ok(()) => self.store.commit()?,
                Err(e) => {
                    errors += 1;
                    self.store.rollback()?;
                    return Err(ClientError::Ingest(e));
                }
            }

            let round_outcome = self.session.round_outcome(self.store)?;
            self.session.round += 1;
            if terminate(&self.session, &round_outcome) {
                break;
            }
        }

        Ok(SessionReport {
            rounds: self.session.round,
            errors,
        })
    }
}

fn random_hex_token() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
