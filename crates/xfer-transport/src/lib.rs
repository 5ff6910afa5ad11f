//! # xfer-transport
//!
//! Carries opaque message bytes between client and server. Implements
//! [`xfer_core::transport::Transport`] two ways:
//!
//! - [`http::HttpTransport`] — blocking HTTP POST with gzip in both
//!   directions, for talking to a real server over the network.
//! - [`loopback::Loopback`] — calls the server handler in-process, for
//!   tests and the `test-xfer` scenario runner.

pub mod http;
pub mod loopback;

pub use http::HttpTransport;
pub use loopback::Loopback;
