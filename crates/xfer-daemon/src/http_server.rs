//! The `serve` subcommand: a minimal HTTP/1.1 server that accepts one
//! POST per sync round and hands the body to
//! [`xfer_core::server::handle_request`]. Gzip framing mirrors
//! [`xfer_transport::HttpTransport`] exactly, since the two are the two
//! ends of the same wire.
//!
//! No server framework crate is pulled in here — accepting a connection,
//! reading a fixed-length body, and writing a reply is little enough
//! code that hand-rolling it keeps the dependency list honest about what
//! this binary actually needs. The accept loop itself follows the same
//! shape as any `tokio::net` listener loop: bind once, accept forever,
//! spawn a task per connection.

use std::io::{Read, Write};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};

use xfer_core::server::{self, HttpMethod};

use crate::auth::StaticAuthStore;
use crate::config::TomlConfigAdapter;

/// Bind `listen_addr` and serve sync requests until the process is
/// killed.
pub async fn run(
    listen_addr: &str,
    store: Arc<xfer_store::SqliteStore>,
    auth: Arc<StaticAuthStore>,
    cfg: Arc<TomlConfigAdapter>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(listen_addr).await?;
    info!(%listen_addr, "xferd listening");

    loop {
        let (stream, peer) = listener.accept().await?;
        let store = store.clone();
        let auth = auth.clone();
        let cfg = cfg.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, store, auth, cfg).await {
                warn!(%peer, error = %e, "connection failed");
            }
        });
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    store: Arc<xfer_store::SqliteStore>,
    auth: Arc<StaticAuthStore>,
    cfg: Arc<TomlConfigAdapter>,
) -> anyhow::Result<()> {
    let (reader, mut writer) = stream.split();
    let mut reader = BufReader::new(reader);

    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;
    let is_post = request_line.starts_with("POST ");

    let mut content_length = 0usize;
    let mut gzip_in = false;
    let mut accept_gzip = false;
    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line).await?;
        if n == 0 || line == "\r\n" || line == "\n" {
            break;
        }
        let lower = line.to_ascii_lowercase();
        if let Some(v) = lower.strip_prefix("content-length:") {
            content_length = v.trim().parse().unwrap_or(0);
        } else if lower.starts_with("content-encoding:") && lower.contains("gzip") {
            gzip_in = true;
        } else if lower.starts_with("accept-encoding:") && lower.contains("gzip") {
            accept_gzip = true;
        }
    }

    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).await?;

    let method = if is_post { HttpMethod::Post } else { HttpMethod::Other };
    let (status, mut response_body) = tokio::task::spawn_blocking(move || -> anyhow::Result<(u16, Vec<u8>)> {
        let inbound = if gzip_in { gzip_decompress(&body)? } else { body };
        match server::handle_request(method, &inbound, store.as_ref(), auth.as_ref(), cfg.as_ref()) {
            Ok(reply) => Ok((200, reply.bytes)),
            Err(e) => Ok((500, e.to_string().into_bytes())),
        }
    })
    .await??;

    let content_encoding = if accept_gzip {
        response_body = gzip_compress(&response_body)?;
        "gzip"
    } else {
        "identity"
    };

    let header = format!(
        "HTTP/1.1 {status} {reason}\r\n\
         Content-Type: application/x-fossil\r\n\
         Content-Encoding: {content_encoding}\r\n\
         Content-Length: {len}\r\n\
         Connection: close\r\n\r\n",
        status = status,
        reason = if status == 200 { "OK" } else { "Internal Server Error" },
        content_encoding = content_encoding,
        len = response_body.len(),
    );
    writer.write_all(header.as_bytes()).await?;
    writer.write_all(&response_body).await?;
    writer.flush().await?;
    Ok(())
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
