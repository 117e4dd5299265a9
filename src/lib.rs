//! h2lens - HTTP/2 analyzing proxy
//!
//! This crate terminates a TLS (or plaintext) client connection, relays
//! the byte stream verbatim to an origin server, and emits a structured
//! trace of every HTTP/2 frame observed on either leg: decoded headers,
//! flow-control window evolution, settings, and the rest.

pub mod analyzer;
pub mod output;
pub mod proxy;
pub mod session;
pub mod tls;
