//! TLS termination and origination
//!
//! The listener terminates the client's TLS session (negotiating `h2`
//! via ALPN) and a matching client-side configuration dials the origin,
//! offering the protocol the client negotiated. Both sides expose the
//! [`crate::session::SessionOps`] trait so the proxy core never knows
//! whether a leg is encrypted.
//!
//! Built on OpenSSL. The origin connection does not verify the peer
//! certificate; this is a debugging proxy, not a trust boundary.

pub mod config;
pub mod session;

pub use config::{ClientConfigBuilder, ServerConfigBuilder, TlsConfig, TlsError};
pub use session::TlsSessionOps;

/// Result type for TLS operations
pub type Result<T> = std::result::Result<T, TlsError>;
