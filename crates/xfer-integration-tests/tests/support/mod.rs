//! Shared test doubles: a `HashMap`-backed `ConfigAdapter` and a
//! `HashMap`-backed `AuthStore`, the same shape `xfer_core::session`'s
//! own unit tests use for `NoCfg`, generalized to hold actual values.

use std::collections::HashMap;

use xfer_core::auth::{AuthRecord, AuthStore};
use xfer_core::config::ConfigAdapter;
use xfer_types::Capabilities;

#[derive(Default)]
pub struct MapConfig {
    values: HashMap<String, String>,
}

impl MapConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.values.insert(name.to_string(), value.to_string());
        self
    }
}

impl ConfigAdapter for MapConfig {
    fn get_int(&self, name: &str, default: i64) -> i64 {
        self.values.get(name).and_then(|v| v.parse().ok()).unwrap_or(default)
    }

    fn get_bool(&self, name: &str, default: bool) -> bool {
        self.values.get(name).map(|v| v == "1" || v == "true").unwrap_or(default)
    }

    fn get(&self, name: &str) -> Option<String> {
        self.values.get(name).cloned()
    }

    fn set(&mut self, name: &str, value: &str) {
        self.values.insert(name.to_string(), value.to_string());
    }
}

#[derive(Default)]
pub struct MapAuth {
    users: HashMap<String, AuthRecord>,
}

impl MapAuth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user: &str, secret: &[u8], capabilities: Capabilities) -> Self {
        self.users.insert(
            user.to_string(),
            AuthRecord {
                stored_secret: secret.to_vec(),
                capabilities,
            },
        );
        self
    }
}

impl AuthStore for MapAuth {
    fn lookup(&self, user: &str) -> Option<AuthRecord> {
        self.users.get(user).cloned()
    }
}

pub fn full_capabilities() -> Capabilities {
    Capabilities {
        read: true,
        write: true,
        clone: true,
    }
}
