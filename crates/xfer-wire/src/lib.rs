//! # xfer-wire
//!
//! The line-oriented wire format: splitting a message buffer into cards,
//! tokenizing card headers, extracting binary payloads, and the tagged
//! [`card::Card`] variant that turns a validated header into a typed value
//! before any ingest handler ever sees it.

pub mod card;
pub mod framing;
pub mod tokenize;

pub use card::Card;
pub use framing::Framer;

/// Errors produced while framing or parsing a card.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WireError {
    /// A card's header did not match any known grammar for its verb
    /// (wrong token count, non-hash where a hash is required, non-integer
    /// size, negative size).
    #[error("bad command: {0}")]
    MalformedCard(String),

    /// A card declared a payload length that the remaining buffer could
    /// not satisfy.
    #[error("truncated payload: expected {expected} bytes, {available} available")]
    TruncatedPayload { expected: usize, available: usize },

    /// The verb did not match any known card kind.
    #[error("bad command: {0}")]
    UnknownCard(String),

    /// The first byte of the message was `<` — an HTML document arrived
    /// at a protocol endpoint rather than a card stream.
    #[error("server sent HTML instead of the expected reply")]
    HtmlAtEndpoint,
}
