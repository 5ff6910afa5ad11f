//! Per-session state: role flags, negotiated peer version,
//! budgets, the per-round counters, and the two ephemeral peer-have /
//! peer-need sets.

use std::collections::HashSet;
use std::time::Instant;

use xfer_types::{Capabilities, Hash, LocalId};

use crate::config::ConfigAdapter;

/// Which top-level operation(s) the session is performing. More than one
/// can be set at once (e.g. a push session that was first granted pull).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Role {
    pub pull: bool,
    pub push: bool,
    pub clone: bool,
}

/// Counters reset once per round on the client, once per request on the
/// server.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoundCounters {
    pub n_file_sent: u32,
    pub n_delta_sent: u32,
    pub n_gimme_sent: u32,
    pub n_igot_sent: u32,
    pub n_file_rcvd: u32,
    pub n_delta_rcvd: u32,
    pub n_dangling_file: u32,
    pub n_priv_igot: u32,
}

impl RoundCounters {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Local-ids believed already held by the peer. Populated from inbound
/// `have`/`igot` cards and from our own outbound sends.
#[derive(Debug, Clone, Default)]
pub struct PeerHaveSet(HashSet<LocalId>);

impl PeerHaveSet {
    pub fn insert(&mut self, id: LocalId) -> bool {
        self.0.insert(id)
    }
    pub fn contains(&self, id: &LocalId) -> bool {
        self.0.contains(id)
    }
    pub fn clear(&mut self) {
        self.0.clear();
    }
}

/// Hashes the peer has asked us for via `ineed`/`gimme`, awaiting a
/// response from the emit planner.
#[derive(Debug, Clone, Default)]
pub struct PeerNeedSet(HashSet<Hash>);

impl PeerNeedSet {
    pub fn insert(&mut self, hash: Hash) -> bool {
        self.0.insert(hash)
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn drain(&mut self) -> Vec<Hash> {
        self.0.drain().collect()
    }
}

/// The inputs to [`terminate`], gathered after an inbound pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoundOutcome {
    pub files_received: bool,
    pub files_sent: bool,
    pub private_igot_round1: bool,
    pub uv_gimme_outstanding: bool,
    pub cloning: bool,
    pub clone_cursor_nonzero: bool,
    pub artifacts_increased: bool,
    pub phantoms_remaining: bool,
    pub more_to_send: bool,
}

pub struct Session {
    /// Whether this session is the serving side. The same `Role` flags
    /// mean different things to each side: a client's `role.push` is its
    /// own intent to send content, while a server's `role.pull` records
    /// that the *peer* asked to pull — and a pull request is served with
    /// `have` cards, the client-side job of `role.push`. `is_server`
    /// lets the emit planner pick the right verb without two copies of
    /// its logic.
    pub is_server: bool,
    pub role: Role,
    pub capabilities: Capabilities,
    pub sync_private: bool,
    pub resync_active: bool,
    pub resync_cursor: Option<LocalId>,
    pub clone_version: Option<i64>,
    pub clone_seqno: Option<i64>,
    pub peer_version: i64,
    pub peer_build: Option<(String, String)>,
    pub mx_send: usize,
    pub deadline: Instant,
    pub cookie: Option<String>,
    pub counters: RoundCounters,
    pub peer_have: PeerHaveSet,
    pub peer_need: PeerNeedSet,
    pub requested_from_peer: HashSet<Hash>,
    pub round: u32,
    pub pending_private: bool,
    pub project_code: String,
    pub server_code: String,
    pub mx_phantom_req: usize,
    pub uv_do_push: bool,
    pub pull_only: bool,
    pub avoid_delta_manifests: bool,
    pub requested_config: HashSet<String>,
    pub received_config: Vec<(String, Vec<u8>)>,
    pub last_artifact_count: u64,
}

/// Gimme batch size doubles each round, capped here (Design Note "bounded
/// cursor" — an unbounded doubling would defeat `mxSend` itself).
pub const MAX_PHANTOM_REQUEST_CEILING: usize = 2000;
const INITIAL_PHANTOM_REQUEST: usize = 50;

/// Below this negotiated peer build, a private-have announcement (P3)
/// would leak the existence of a private artifact to a peer too old to
/// understand it; suppress it entirely.
pub const PRIVATE_HAVE_MIN_PEER_VERSION: i64 = 20_200_413;

/// Below this negotiated peer version, SHA-3 hashes are not understood.
pub const SHA3_MIN_PEER_VERSION: i64 = 20_000;

impl Session {
    fn new(
        is_server: bool,
        project_code: String,
        server_code: String,
        cfg: &dyn ConfigAdapter,
        deadline: Instant,
    ) -> Self {
        let mx_send = cfg.get_int("max-upload", 8 * 1024 * 1024).max(0) as usize;
        Session {
            is_server,
            role: Role::default(),
            capabilities: Capabilities::anonymous_defaults(),
            sync_private: false,
            resync_active: false,
            resync_cursor: None,
            clone_version: None,
            clone_seqno: None,
            peer_version: 0,
            peer_build: None,
            mx_send,
            deadline,
            cookie: cfg.get("cookie"),
            counters: RoundCounters::default(),
            peer_have: PeerHaveSet::default(),
            peer_need: PeerNeedSet::default(),
            requested_from_peer: HashSet::new(),
            round: 0,
            pending_private: false,
            project_code,
            server_code,
            mx_phantom_req: INITIAL_PHANTOM_REQUEST,
            uv_do_push: false,
            pull_only: false,
            avoid_delta_manifests: false,
            requested_config: HashSet::new(),
            received_config: Vec::new(),
            last_artifact_count: 0,
        }
    }

    /// A fresh scratch session for one server request — `peerhave`
    /// /`peerneed` are dropped per HTTP round on the server.
    pub fn new_server(cfg: &dyn ConfigAdapter, deadline: Instant) -> Self {
        let project_code = cfg.get("project-code").unwrap_or_default();
        let server_code = cfg.get("server-code").unwrap_or_default();
        let mut session = Session::new(true, project_code, server_code, cfg, deadline);
        session.sync_private = cfg.get_bool("sync-private", false);
        session
    }

    /// A session that persists across rounds for the life of one client
    /// synchronization attempt. `resync` forces a full resend of `have`
    /// cards from the start of the store (`--verily`), ignoring any
    /// cursor the client would otherwise remember from a prior attempt.
    pub fn new_client(cfg: &dyn ConfigAdapter, role: Role, deadline: Instant, resync: bool) -> Self {
        let project_code = cfg.get("project-code").unwrap_or_default();
        let server_code = cfg.get("parent-project-code").unwrap_or_default();
        let mut session = Session::new(false, project_code, server_code, cfg, deadline);
        session.role = role;
        session.sync_private = cfg.get_bool("sync-private", false);
        session.resync_active = resync;
        session
    }

    /// The first round of a clone omits the login card entirely, since
    /// the project code needed to form it is only learned from the
    /// server's reply.
    pub fn is_first_clone_round(&self) -> bool {
        self.role.clone && self.round == 0
    }

    pub fn is_initial_clone_with_no_gimme(&self) -> bool {
        self.role.clone && self.clone_version.is_none() && self.peer_need.is_empty() && self.round == 0
    }

    /// Whether this side should announce `have` cards this round — a
    /// client's own push intent, or a server serving a peer's pull
    /// request.
    pub fn should_announce_haves(&self) -> bool {
        if self.is_server {
            self.role.pull
        } else {
            self.role.push
        }
    }

    /// Whether this side should request phantoms via `gimme` this round
    /// — never the server's job; servers fulfill requests, they don't
    /// originate them.
    pub fn should_request_gimmes(&self) -> bool {
        !self.is_server && (self.role.pull || self.role.clone)
    }

    /// Gather the inputs to the termination predicate and advance the
    /// rolling artifact-count baseline used by the clone clause.
    pub fn round_outcome(
        &mut self,
        store: &dyn crate::store::StoreAdapter,
    ) -> Result<RoundOutcome, crate::store::StoreError> {
        let phantoms_remaining = store.phantom_count()? > 0;
        let artifact_count = store.artifact_count()?;
        let artifacts_increased = artifact_count > self.last_artifact_count;
        self.last_artifact_count = artifact_count;
        Ok(RoundOutcome {
            files_received: self.counters.n_file_rcvd > 0 || self.counters.n_delta_rcvd > 0,
            files_sent: self.counters.n_file_sent > 0 || self.counters.n_delta_sent > 0,
            private_igot_round1: self.counters.n_priv_igot > 0 && self.round == 0,
            uv_gimme_outstanding: !self.requested_from_peer.is_empty() && !self.role.clone,
            cloning: self.role.clone,
            clone_cursor_nonzero: self.clone_seqno.map(|c| c != 0).unwrap_or(false),
            artifacts_increased,
            phantoms_remaining,
            more_to_send: self.role.push && (self.uv_do_push || !self.peer_need.is_empty()),
        })
    }
}

/// A disjunction of five clauses, each its own reason a round isn't done.
pub fn terminate(session: &Session, outcome: &RoundOutcome) -> bool {
    let go = (outcome.files_received && outcome.phantoms_remaining)
        || (outcome.files_sent && outcome.more_to_send)
        || outcome.private_igot_round1
        || (outcome.uv_gimme_outstanding && (outcome.files_received || session.round < 3))
        || (outcome.cloning
            && (session.round < 2
                || outcome.files_received
                || (outcome.clone_cursor_nonzero && outcome.artifacts_increased)));
    !go
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with_round(round: u32) -> Session {
        struct NoCfg;
        impl ConfigAdapter for NoCfg {
            fn get_int(&self, _: &str, default: i64) -> i64 {
                default
            }
            fn get_bool(&self, _: &str, default: bool) -> bool {
                default
            }
            fn get(&self, _: &str) -> Option<String> {
                None
            }
            fn set(&mut self, _: &str, _: &str) {}
        }
        let mut session = Session::new_server(&NoCfg, Instant::now());
        session.round = round;
        session
    }

    #[test]
    fn stops_when_nothing_outstanding() {
        let session = session_with_round(1);
        let outcome = RoundOutcome::default();
        assert!(terminate(&session, &outcome));
    }

    #[test]
    fn continues_while_phantoms_remain_after_receiving() {
        let session = session_with_round(1);
        let outcome = RoundOutcome {
            files_received: true,
            phantoms_remaining: true,
            ..Default::default()
        };
        assert!(!terminate(&session, &outcome));
    }

    #[test]
    fn clone_continues_for_first_two_rounds_unconditionally() {
        let session = session_with_round(0);
        let outcome = RoundOutcome {
            cloning: true,
            ..Default::default()
        };
        assert!(!terminate(&session, &outcome));
    }

    #[test]
    fn clone_stops_once_cursor_exhausted_and_round_advanced() {
        let session = session_with_round(5);
        let outcome = RoundOutcome {
            cloning: true,
            clone_cursor_nonzero: false,
            files_received: false,
            ..Default::default()
        };
        assert!(terminate(&session, &outcome));
    }

    #[test]
    fn private_igot_on_round_one_forces_another_round() {
        let session = session_with_round(0);
        let outcome = RoundOutcome {
            private_igot_round1: true,
            ..Default::default()
        };
        assert!(!terminate(&session, &outcome));
    }
}
