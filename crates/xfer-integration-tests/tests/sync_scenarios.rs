//! End-to-end protocol scenarios, each driving a real client/server
//! round trip over [`xfer_transport::Loopback`] against a
//! [`xfer_store::SqliteStore`] (or, for the wire-level cases, the raw
//! ingest dispatcher directly).

mod support;

use xfer_core::client::{Driver, LoginCredentials};
use xfer_core::ingest::{self, IngestError};
use xfer_core::server::{self, HttpMethod};
use xfer_core::store::StoreAdapter;
use xfer_core::session::{Role, Session};
use xfer_store::SqliteStore;
use xfer_transport::Loopback;
use xfer_types::Hash;

use support::{full_capabilities, MapAuth, MapConfig};

fn hash_of(content: &[u8]) -> Hash {
    Hash::parse(&xfer_crypto::sha1::hex(content)).expect("valid sha1 hash")
}

/// Prepend an anonymous `login` card sealing `body` as its tail, so a
/// hand-built request can reach capability-gated cards (`clone`, `push`)
/// without standing up real credentials.
fn with_anonymous_login(body: &str) -> Vec<u8> {
    let nonce = xfer_crypto::sha1::hex(body.as_bytes());
    format!("login nobody {nonce} ignored\n{body}").into_bytes()
}

#[test]
fn empty_pull_reports_no_artifacts_and_converges() {
    let server_store = SqliteStore::open_memory().unwrap();
    let client_store = SqliteStore::open_memory().unwrap();
    let cfg = MapConfig::new().with("project-code", "proj1");
    let auth = MapAuth::new();

    let loopback = Loopback {
        store: &server_store,
        auth: &auth,
        cfg: &cfg,
    };

    let login = LoginCredentials {
        user: "nobody".to_string(),
        secret: Vec::new(),
    };
    let mut driver = Driver::new(&cfg, Role { pull: true, push: false, clone: false }, &client_store, login, false);
    let report = driver.run(&loopback).unwrap();

    assert_eq!(report.errors, 0);
    assert_eq!(client_store.artifact_count().unwrap(), 0);
}

#[test]
fn pushing_the_same_artifact_twice_is_idempotent() {
    use xfer_core::store::StoreAdapter;

    let server_store = SqliteStore::open_memory().unwrap();
    let cfg = MapConfig::new().with("project-code", "proj1");
    let auth = MapAuth::new().with_user("alice", b"hunter2", full_capabilities());

    let content = b"first manifest content";
    let hash = hash_of(content);

    for _ in 0..2 {
        let client_store = SqliteStore::open_memory().unwrap();
        client_store.content_put(content, &hash, None, false).unwrap();

        let loopback = Loopback {
            store: &server_store,
            auth: &auth,
            cfg: &cfg,
        };
        let login = LoginCredentials {
            user: "alice".to_string(),
            secret: b"hunter2".to_vec(),
        };
        let mut driver = Driver::new(&cfg, Role { pull: false, push: true, clone: false }, &client_store, login, false);
        let report = driver.run(&loopback).unwrap();
        assert_eq!(report.errors, 0);
    }

    assert_eq!(server_store.artifact_count().unwrap(), 1);
}

#[test]
fn file_card_with_wrong_hash_is_rejected() {
    let store = SqliteStore::open_memory().unwrap();
    let cfg = MapConfig::new().with("project-code", "proj1");
    let mut session = Session::new_server(&cfg, std::time::Instant::now() + std::time::Duration::from_secs(60));
    let auth = MapAuth::new();

    let wrong_hash = "a".repeat(40);
    let payload = b"hello world";
    let message = format!("file {wrong_hash} {}\n", payload.len());
    let mut buf = message.into_bytes();
    buf.extend_from_slice(payload);
    buf.push(b'\n');

    let err = ingest::dispatch(&mut session, &store, &auth, &buf).unwrap_err();
    assert!(matches!(err, IngestError::HashMismatch(_)));
}

#[test]
fn login_with_wrong_signature_is_rejected() {
    let store = SqliteStore::open_memory().unwrap();
    let cfg = MapConfig::new().with("project-code", "proj1");
    let mut session = Session::new_server(&cfg, std::time::Instant::now() + std::time::Duration::from_secs(60));
    let auth = MapAuth::new().with_user("alice", b"hunter2", full_capabilities());

    let tail = b"";
    let nonce = xfer_crypto::sha1::hex(tail);
    let bad_sig = "0".repeat(40);
    let message = format!("login alice {nonce} {bad_sig}\n");

    let err = ingest::dispatch(&mut session, &store, &auth, message.as_bytes()).unwrap_err();
    assert!(matches!(err, IngestError::AuthFailure));
}

#[test]
fn versioned_clone_streams_ascending_and_reports_a_resumable_cursor() {
    use xfer_core::store::StoreAdapter;

    let store = SqliteStore::open_memory().unwrap();
    for i in 0..5u8 {
        let content = vec![i; 32];
        let hash = hash_of(&content);
        store.content_put(&content, &hash, None, false).unwrap();
    }

    // A tiny byte budget forces the server to stop partway through and
    // report where the client should resume.
    let cfg = MapConfig::new().with("project-code", "proj1").with("max-upload", "80");
    let auth = MapAuth::new();

    let request = with_anonymous_login("clone 1 0\n");
    let reply = server::handle_request(HttpMethod::Post, &request, &store, &auth, &cfg).unwrap();
    let reply_text = String::from_utf8_lossy(&reply.bytes);

    let first_cursor: i64 = reply_text
        .lines()
        .find_map(|l| l.strip_prefix("clone_seqno "))
        .and_then(|v| v.trim().parse().ok())
        .expect("reply carries a clone_seqno card");
    assert!(first_cursor > 0, "a tight budget should leave work outstanding");
    assert!(first_cursor < 6, "cursor should not overrun the 5 stored artifacts");
}

#[test]
fn reissuing_clone_from_zero_redelivers_the_same_artifact_set() {
    use xfer_core::store::StoreAdapter;

    let store = SqliteStore::open_memory().unwrap();
    for i in 0..3u8 {
        let content = vec![i; 16];
        let hash = hash_of(&content);
        store.content_put(&content, &hash, None, false).unwrap();
    }

    let cfg = MapConfig::new().with("project-code", "proj1");
    let auth = MapAuth::new();

    // First round consumes the whole store and advances past it.
    let request = with_anonymous_login("clone 1 0\n");
    let first = server::handle_request(HttpMethod::Post, &request, &store, &auth, &cfg).unwrap();
    let first_text = String::from_utf8_lossy(&first.bytes);
    let advanced_cursor: i64 = first_text
        .lines()
        .find_map(|l| l.strip_prefix("clone_seqno "))
        .and_then(|v| v.trim().parse().ok())
        .unwrap();
    assert_eq!(advanced_cursor, 0, "an unbounded budget drains the store in one round");

    // Reissuing `clone V 0` (a fresh client starting over, not this
    // session's own `--verily` resync) gets the same artifacts back.
    let second = server::handle_request(HttpMethod::Post, &request, &store, &auth, &cfg).unwrap();
    let second_text = String::from_utf8_lossy(&second.bytes);
    assert_eq!(
        second_text.matches("file ").count(),
        first_text.matches("file ").count(),
        "reissuing clone from zero should re-stream the same artifact set"
    );
}

#[test]
fn private_igot_marks_only_the_named_artifact_private() {
    use xfer_core::store::StoreAdapter;

    let store = SqliteStore::open_memory().unwrap();
    let named_content = b"artifact the peer claims privately";
    let named_hash = hash_of(named_content);
    let named_id = store.content_put(named_content, &named_hash, None, false).unwrap();

    let unrelated_content = b"an unrelated public artifact";
    let unrelated_hash = hash_of(unrelated_content);
    let unrelated_id = store.content_put(unrelated_content, &unrelated_hash, None, false).unwrap();

    let cfg = MapConfig::new().with("project-code", "proj1");
    let mut session = Session::new_server(&cfg, std::time::Instant::now() + std::time::Duration::from_secs(60));
    session.role.pull = true;
    let auth = MapAuth::new();

    let message = format!("igot {named_hash} 1\nigot {unrelated_hash}\n");
    ingest::dispatch(&mut session, &store, &auth, message.as_bytes()).unwrap();

    assert!(store.is_private(named_id).unwrap(), "igot HASH 1 should mark its own hash private");
    assert!(!store.is_private(unrelated_id).unwrap(), "an unrelated igot must not inherit the prior card's privacy flag");
    assert!(!session.pending_private, "igot must not leave pending_private set for the next file/atom card");
}

#[test]
fn verily_resync_sweeps_every_artifact_and_advances_a_cursor_across_rounds() {
    use std::time::{Duration, Instant};

    use xfer_core::emit::{OutboundBuffer, Planner};
    use xfer_core::store::StoreAdapter;

    let store = SqliteStore::open_memory().unwrap();
    for i in 0..5u8 {
        let content = vec![i; 16];
        let hash = hash_of(&content);
        store.content_put(&content, &hash, None, false).unwrap();
    }

    let cfg = MapConfig::new().with("project-code", "proj1");
    let deadline = Instant::now() + Duration::from_secs(60);

    // `--verily` on the client flows straight into `Session::new_client`'s
    // `resync` flag — this is the same constructor `Driver::new` calls.
    let mut session = Session::new_client(&cfg, Role { pull: false, push: true, clone: false }, deadline, true);
    assert!(session.resync_active, "--verily must enable resync_active on the client session");

    // A tight budget can only fit a couple of `have` cards, so the sweep
    // over 5 artifacts cannot finish in a single pass.
    let mut first_round = OutboundBuffer::new(100, deadline);
    Planner::build(&mut session, &store, &mut first_round).unwrap();
    assert!(
        session.resync_cursor.is_some(),
        "a budget-starved resync sweep should checkpoint a cursor rather than finish"
    );
    assert!(session.resync_active, "resync stays active until the sweep is exhausted");

    // A generous budget lets the second round pick up from that cursor
    // and finish draining the store.
    let mut second_round = OutboundBuffer::new(8192, deadline);
    Planner::build(&mut session, &store, &mut second_round).unwrap();
    assert!(
        session.resync_cursor.is_none(),
        "resync should clear its cursor once the sweep reaches the start of the store"
    );
    assert!(!session.resync_active, "resync should turn itself off once exhausted");
}
