//! Configuration file management: the on-disk form of the knobs
//! [`xfer_core::config::ConfigAdapter`] exposes to the protocol engine,
//! plus the static user table the daemon's [`crate::auth::StaticAuthStore`]
//! is built from.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use xfer_core::config::ConfigAdapter;

/// Complete daemon configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Repository identity settings.
    #[serde(default)]
    pub repository: RepositoryConfig,
    /// Transfer budget settings.
    #[serde(default)]
    pub limits: LimitsConfig,
    /// `serve` subcommand settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Static login table for the `login` card.
    #[serde(default)]
    pub users: Vec<UserConfig>,
}

/// Repository configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// This repository's project code, checked against every inbound
    /// `pull`/`push`/`clone` card.
    #[serde(default)]
    pub project_code: String,
    /// This repository's server code, advertised back to clients.
    #[serde(default)]
    pub server_code: String,
    /// The parent repository's project code, used as the client's own
    /// server code when acting as a sync client.
    #[serde(default)]
    pub parent_project_code: String,
    /// Anti-CSRF cookie text echoed back on every round.
    #[serde(default)]
    pub cookie: String,
    /// Whether this side is willing to exchange private artifacts with
    /// a peer that has also agreed to it.
    #[serde(default)]
    pub sync_private: bool,
}

/// Transfer budget configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Byte cap per round (`mxSend`). 0 = unbounded.
    #[serde(default)]
    pub max_download: i64,
    /// Wall-clock deadline per round, in seconds.
    #[serde(default = "default_max_download_time")]
    pub max_download_time: i64,
    /// Byte cap on outbound uploads. 0 = unbounded.
    #[serde(default)]
    pub max_upload: i64,
    /// Never advertise local artifacts to the peer, even when pushing.
    #[serde(default)]
    pub dont_push: bool,
}

/// `serve` subcommand configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the `serve` subcommand binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// SQLite store path. Empty = platform default.
    #[serde(default)]
    pub data_dir: String,
}

/// One entry in the static login table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConfig {
    pub user: String,
    /// Hex-encoded shared secret (or raw password; see
    /// `xfer_crypto::login::candidate_secrets`).
    pub secret: String,
    #[serde(default = "default_true")]
    pub read: bool,
    #[serde(default)]
    pub write: bool,
    #[serde(default = "default_true")]
    pub clone: bool,
}

fn default_true() -> bool {
    true
}

fn default_max_download_time() -> i64 {
    300
}

fn default_listen_addr() -> String {
    "127.0.0.1:8080".to_string()
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_download: 0,
            max_download_time: default_max_download_time(),
            max_upload: 0,
            dont_push: false,
        }
    }
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            project_code: String::new(),
            server_code: String::new(),
            parent_project_code: String::new(),
            cookie: String::new(),
            sync_private: false,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            data_dir: String::new(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from `path`, or fall back to defaults if it
    /// does not exist.
    pub fn load(path: &PathBuf) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: DaemonConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// The store path, honoring `$XFER_DATA_DIR` and `server.data_dir`.
    pub fn data_dir(&self) -> PathBuf {
        if !self.server.data_dir.is_empty() {
            return PathBuf::from(&self.server.data_dir);
        }
        if let Ok(dir) = std::env::var("XFER_DATA_DIR") {
            return PathBuf::from(dir);
        }
        PathBuf::from(".")
    }
}

/// Adapts [`DaemonConfig`] to [`ConfigAdapter`], translating the engine's
/// dashed knob names to the config file's nested fields. `set` writes go
/// to an overlay map so the engine can record pragmas like
/// `avoid-delta-manifests` without mutating the loaded file.
pub struct TomlConfigAdapter {
    config: DaemonConfig,
    overrides: Mutex<HashMap<String, String>>,
}

impl TomlConfigAdapter {
    pub fn new(config: DaemonConfig) -> Self {
        TomlConfigAdapter {
            config,
            overrides: Mutex::new(HashMap::new()),
        }
    }
}

impl ConfigAdapter for TomlConfigAdapter {
    fn get_int(&self, name: &str, default: i64) -> i64 {
        if let Some(v) = self.overrides.lock().unwrap().get(name) {
            return v.parse().unwrap_or(default);
        }
        match name {
            "max-download" => self.config.limits.max_download,
            "max-download-time" => self.config.limits.max_download_time,
            "max-upload" => self.config.limits.max_upload,
            _ => default,
        }
    }

    fn get_bool(&self, name: &str, default: bool) -> bool {
        if let Some(v) = self.overrides.lock().unwrap().get(name) {
            return v == "1" || v == "true";
        }
        match name {
            "dont-push" => self.config.limits.dont_push,
            "sync-private" => self.config.repository.sync_private,
            _ => default,
        }
    }

    fn get(&self, name: &str) -> Option<String> {
        if let Some(v) = self.overrides.lock().unwrap().get(name) {
            return Some(v.clone());
        }
        match name {
            "cookie" if !self.config.repository.cookie.is_empty() => Some(self.config.repository.cookie.clone()),
            "project-code" => Some(self.config.repository.project_code.clone()),
            "server-code" => Some(self.config.repository.server_code.clone()),
            "parent-project-code" => Some(self.config.repository.parent_project_code.clone()),
            _ => None,
        }
    }

    fn set(&mut self, name: &str, value: &str) {
        self.overrides.lock().unwrap().insert(name.to_string(), value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = DaemonConfig::default();
        let toml_str = toml::to_string(&config).expect("serialize");
        let parsed: DaemonConfig = toml::from_str(&toml_str).expect("parse");
        assert_eq!(parsed.limits.max_download_time, 300);
        assert_eq!(parsed.server.listen_addr, "127.0.0.1:8080");
    }

    #[test]
    fn adapter_reads_named_knobs() {
        let mut config = DaemonConfig::default();
        config.repository.project_code = "abc123".to_string();
        config.limits.max_upload = 8_388_608;
        let adapter = TomlConfigAdapter::new(config);
        assert_eq!(adapter.get("project-code").as_deref(), Some("abc123"));
        assert_eq!(adapter.get_int("max-upload", 0), 8_388_608);
        assert_eq!(adapter.get_int("unknown-knob", 42), 42);
    }

    #[test]
    fn set_overlays_without_touching_loaded_config() {
        let mut adapter = TomlConfigAdapter::new(DaemonConfig::default());
        adapter.set("avoid-delta-manifests", "1");
        assert!(adapter.get_bool("avoid-delta-manifests", false));
        assert_eq!(adapter.config.limits.dont_push, false);
    }
}
