//! xferd: the sync protocol daemon and CLI.
//!
//! `serve` runs the HTTP endpoint; `client` drives one sync session
//! against a remote `serve` endpoint; `test-xfer` replays a captured
//! inbound message straight through the server handler and prints the
//! reply, for debugging the wire format offline.

mod auth;
mod config;
mod http_server;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use xfer_core::client::{Driver, LoginCredentials};
use xfer_core::config::ConfigAdapter;
use xfer_core::server::{self, HttpMethod};
use xfer_core::session::Role;
use xfer_store::SqliteStore;
use xfer_transport::HttpTransport;

use crate::auth::StaticAuthStore;
use crate::config::{DaemonConfig, TomlConfigAdapter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("xfer=info".parse()?),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let command = args.next().unwrap_or_default();
    let rest: Vec<String> = args.collect();

    match command.as_str() {
        "serve" => cmd_serve(&rest).await,
        "client" => cmd_client(&rest),
        "test-xfer" => cmd_test_xfer(&rest),
        _ => {
            eprintln!("usage: xferd <serve|client|test-xfer> [options]");
            Ok(())
        }
    }
}

fn flag(args: &[String], name: &str) -> Option<String> {
    args.iter().position(|a| a == name).and_then(|i| args.get(i + 1)).cloned()
}

fn flag_present(args: &[String], name: &str) -> bool {
    args.iter().any(|a| a == name)
}

fn load_config(args: &[String]) -> anyhow::Result<DaemonConfig> {
    let path = flag(args, "--config")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("xfer.toml"));
    DaemonConfig::load(&path)
}

async fn cmd_serve(args: &[String]) -> anyhow::Result<()> {
    let config = load_config(args)?;
    let listen_addr = flag(args, "--listen").unwrap_or_else(|| config.server.listen_addr.clone());

    let db_path = config.data_dir().join("xfer.db");
    info!(?db_path, "opening store");
    let store = Arc::new(SqliteStore::open(&db_path)?);
    let auth = Arc::new(StaticAuthStore::from_config(&config.users));
    let cfg = Arc::new(TomlConfigAdapter::new(config));

    http_server::run(&listen_addr, store, auth, cfg).await
}

fn cmd_client(args: &[String]) -> anyhow::Result<()> {
    let config = load_config(args)?;
    let url = flag(args, "--url").ok_or_else(|| anyhow::anyhow!("--url is required"))?;
    let role_arg = flag(args, "--role").unwrap_or_else(|| "pull".to_string());
    let user = flag(args, "--user").unwrap_or_else(|| "anonymous".to_string());
    let secret = flag(args, "--secret")
        .map(|s| hex::decode(s).unwrap_or_default())
        .unwrap_or_default();
    let private = flag_present(args, "--private");
    let resync = flag_present(args, "--verily");

    let role = Role {
        pull: role_arg.contains("pull") || role_arg.contains("clone"),
        push: role_arg.contains("push"),
        clone: role_arg.contains("clone"),
    };

    let db_path = config.data_dir().join("xfer.db");
    let store = SqliteStore::open(&db_path)?;
    let mut cfg = TomlConfigAdapter::new(config);
    if private {
        cfg.set("sync-private", "true");
    }
    let transport = HttpTransport::new(url)?;

    let login = LoginCredentials { user, secret };
    let mut driver = Driver::new(&cfg, role, &store, login, resync);
    let report = driver.run(&transport)?;
    info!(rounds = report.rounds, errors = report.errors, "sync session complete");
    Ok(())
}

fn cmd_test_xfer(args: &[String]) -> anyhow::Result<()> {
    let path = args
        .first()
        .ok_or_else(|| anyhow::anyhow!("usage: xferd test-xfer <xferfile>"))?;
    let inbound = std::fs::read(path)?;

    let config = load_config(args)?;
    let store = SqliteStore::open_memory()?;
    let auth = StaticAuthStore::from_config(&config.users);
    let cfg = TomlConfigAdapter::new(config);

    let reply = server::handle_request(HttpMethod::Post, &inbound, &store, &auth, &cfg)?;
    std::io::Write::write_all(&mut std::io::stdout(), &reply.bytes)?;
    Ok(())
}
