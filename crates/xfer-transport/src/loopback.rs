//! An in-process transport that calls the server handler directly,
//! skipping HTTP and gzip entirely. Used by the integration tests and by
//! `test-xfer` to drive a full client/server round trip in one process.

use xfer_core::auth::AuthStore;
use xfer_core::config::ConfigAdapter;
use xfer_core::server::{self, HttpMethod};
use xfer_core::store::StoreAdapter;
use xfer_core::transport::{Transport, TransportError};

pub struct Loopback<'a> {
    pub store: &'a dyn StoreAdapter,
    pub auth: &'a dyn AuthStore,
    pub cfg: &'a dyn ConfigAdapter,
}

impl<'a> Transport for Loopback<'a> {
    fn exchange(&self, outbound: &[u8]) -> Result<Vec<u8>, TransportError> {
        let reply = server::handle_request(HttpMethod::Post, outbound, self.store, self.auth, self.cfg)
            .map_err(|e| TransportError::Io(e.to_string()))?;
        Ok(reply.bytes)
    }
}
