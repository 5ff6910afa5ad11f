//! Integration test crate for the sync protocol.
//!
//! This crate has no library code — it only contains integration tests
//! that drive a full client/server round trip over [`xfer_transport::Loopback`],
//! exercising six scenarios: empty pull, push duplicate, hash
//! mismatch, login failure, clone cursor, and resync cursor.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p xfer-integration-tests
//! ```
