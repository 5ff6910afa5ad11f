//! The transport interface: a single blocking exchange of opaque
//! message bytes. Everything about HTTP — content negotiation, gzip,
//! redirects — lives on the other side of this trait, in `xfer-transport`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport I/O failure: {0}")]
    Io(String),
    #[error("too many redirects")]
    TooManyRedirects,
}

pub trait Transport {
    fn exchange(&self, outbound: &[u8]) -> Result<Vec<u8>, TransportError>;
}
