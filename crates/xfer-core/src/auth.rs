//! User lookup for the `login` card. Kept as its own narrow trait,
//! separate from the store adapter, so a test can supply a couple of
//! in-memory users without standing up a whole store.

use xfer_types::Capabilities;

#[derive(Debug, Clone)]
pub struct AuthRecord {
    pub stored_secret: Vec<u8>,
    pub capabilities: Capabilities,
}

pub trait AuthStore {
    fn lookup(&self, user: &str) -> Option<AuthRecord>;
}
