//! A static, config-file-backed [`AuthStore`]: the daemon has no
//! notion of a user database beyond the `[[users]]` table in its config
//! file.

use std::collections::HashMap;

use xfer_core::auth::{AuthRecord, AuthStore};
use xfer_types::Capabilities;

use crate::config::UserConfig;

pub struct StaticAuthStore {
    users: HashMap<String, AuthRecord>,
}

impl StaticAuthStore {
    pub fn from_config(entries: &[UserConfig]) -> Self {
        let users = entries
            .iter()
            .map(|u| {
                let stored_secret = hex::decode(&u.secret).unwrap_or_else(|_| u.secret.clone().into_bytes());
                let record = AuthRecord {
                    stored_secret,
                    capabilities: Capabilities {
                        read: u.read,
                        write: u.write,
                        clone: u.clone,
                    },
                };
                (u.user.clone(), record)
            })
            .collect();
        StaticAuthStore { users }
    }
}

impl AuthStore for StaticAuthStore {
    fn lookup(&self, user: &str) -> Option<AuthRecord> {
        self.users.get(user).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_finds_configured_user() {
        let entries = vec![UserConfig {
            user: "alice".to_string(),
            secret: hex::encode(b"hunter2"),
            read: true,
            write: true,
            clone: true,
        }];
        let store = StaticAuthStore::from_config(&entries);
        let record = store.lookup("alice").expect("alice configured");
        assert_eq!(record.stored_secret, b"hunter2");
        assert!(record.capabilities.write);
    }

    #[test]
    fn lookup_misses_unknown_user() {
        let store = StaticAuthStore::from_config(&[]);
        assert!(store.lookup("bob").is_none());
    }

    #[test]
    fn non_hex_secret_falls_back_to_raw_bytes() {
        let entries = vec![UserConfig {
            user: "carol".to_string(),
            secret: "plaintext-password".to_string(),
            read: true,
            write: false,
            clone: true,
        }];
        let store = StaticAuthStore::from_config(&entries);
        let record = store.lookup("carol").unwrap();
        assert_eq!(record.stored_secret, b"plaintext-password");
    }
}
