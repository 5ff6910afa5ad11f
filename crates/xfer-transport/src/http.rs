//! The HTTP transport: one blocking POST per round, gzip on the wire in
//! both directions. The engine only ever sees decompressed bytes — HTTP
//! is the carrier here, never part of the protocol itself.

use std::io::{Read, Write};
use std::time::Duration;

use xfer_core::transport::{Transport, TransportError};

const MAX_REDIRECTS: usize = 20;

/// A transport that POSTs the outbound message to a fixed URL and
/// returns the server's reply body.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    url: String,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| TransportError::Io(e.to_string()))?;
        Ok(HttpTransport { client, url: url.into() })
    }
}

impl Transport for HttpTransport {
    fn exchange(&self, outbound: &[u8]) -> Result<Vec<u8>, TransportError> {
        let compressed = gzip_compress(outbound).map_err(|e| TransportError::Io(e.to_string()))?;

        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/x-fossil")
            .header("Content-Encoding", "gzip")
            .header("Accept-Encoding", "gzip")
            .body(compressed)
            .send()
            .map_err(|e| {
                if e.is_redirect() {
                    TransportError::TooManyRedirects
                } else {
                    TransportError::Io(e.to_string())
                }
            })?;

        let gzipped = response.headers().get("content-encoding").map(|v| v == "gzip").unwrap_or(false);
        let body = response.bytes().map_err(|e| TransportError::Io(e.to_string()))?;

        if gzipped {
            gzip_decompress(&body).map_err(|e| TransportError::Io(e.to_string()))
        } else {
            Ok(body.to_vec())
        }
    }
}

fn gzip_compress(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(bytes)?;
    encoder.finish()
}

fn gzip_decompress(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    flate2::read::GzDecoder::new(bytes).read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gzip_round_trips() {
        let original = b"pull scode pcode\nlogin anonymous nonce sig\n";
        let compressed = gzip_compress(original).unwrap();
        assert_ne!(compressed, original);
        let decompressed = gzip_decompress(&compressed).unwrap();
        assert_eq!(decompressed, original);
    }
}
