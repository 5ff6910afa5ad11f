//! The umbrella error used at the dispatch boundary. Each crate
//! still owns its narrow error enum; this only exists where callers need
//! to propagate across more than one of them (the server handler calls
//! into ingest, emit, and the store in the same function).

use thiserror::Error;

use crate::emit::EmitError;
use crate::ingest::IngestError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("method not allowed: xfer only accepts POST")]
    MethodNotAllowed,
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    Emit(#[from] EmitError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
