//! TLS configuration
//!
//! Builders for the listening (server) and origin-facing (client) TLS
//! contexts. The server side requires a certificate and key from disk;
//! the client side is deliberately permissive about the origin's
//! certificate.

use openssl::ssl::{SslContextBuilder, SslFiletype, SslMethod, SslVerifyMode};
use std::net::TcpStream;
use std::path::Path;

/// TLS errors
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("OpenSSL error: {0}")]
    OpenSsl(#[from] openssl::error::ErrorStack),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Certificate error: {0}")]
    Certificate(String),

    #[error("Handshake failed: {0}")]
    HandshakeFailed(String),
}

/// TLS configuration (immutable after building)
#[derive(Clone)]
pub struct TlsConfig {
    pub(crate) ctx: openssl::ssl::SslContext,
    pub(crate) is_server: bool,
    pub(crate) servername: Option<String>,
}

impl TlsConfig {
    /// Create a new client configuration builder
    pub fn client() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Create a new server configuration builder
    pub fn server() -> ServerConfigBuilder {
        ServerConfigBuilder::new()
    }

    /// Connect to the origin with TLS (client-side)
    pub fn connect(&self, stream: TcpStream) -> Result<super::TlsSessionOps, TlsError> {
        if self.is_server {
            return Err(TlsError::InvalidConfig(
                "cannot use server config for client connection".to_string(),
            ));
        }
        super::session::TlsSessionOps::connect(stream, self.clone())
    }

    /// Accept a client connection with TLS (server-side)
    pub fn accept(&self, stream: TcpStream) -> Result<super::TlsSessionOps, TlsError> {
        if !self.is_server {
            return Err(TlsError::InvalidConfig(
                "cannot use client config for server accept".to_string(),
            ));
        }
        super::session::TlsSessionOps::accept(stream, self.clone())
    }
}

/// Client (origin-facing) configuration builder
pub struct ClientConfigBuilder {
    ctx_builder: SslContextBuilder,
    servername: Option<String>,
}

impl ClientConfigBuilder {
    fn new() -> Self {
        let mut ctx_builder = SslContextBuilder::new(SslMethod::tls_client())
            .expect("Failed to create SSL context");

        // Origin certificates are not verified (debugging proxy,
        // self-signed origins are the normal case)
        ctx_builder.set_verify(SslVerifyMode::NONE);

        ClientConfigBuilder {
            ctx_builder,
            servername: None,
        }
    }

    /// Set ALPN protocols to offer, most preferred first
    pub fn alpn(mut self, protocols: &[&str]) -> Result<Self, TlsError> {
        // Wire format: each protocol length-prefixed
        let mut alpn_bytes = Vec::new();
        for proto in protocols {
            alpn_bytes.push(proto.len() as u8);
            alpn_bytes.extend_from_slice(proto.as_bytes());
        }
        self.ctx_builder.set_alpn_protos(&alpn_bytes)?;
        Ok(self)
    }

    /// Set SNI servername
    pub fn servername(mut self, name: impl Into<String>) -> Self {
        self.servername = Some(name.into());
        self
    }

    /// Build the TLS configuration
    pub fn build(self) -> Result<TlsConfig, TlsError> {
        Ok(TlsConfig {
            ctx: self.ctx_builder.build(),
            is_server: false,
            servername: self.servername,
        })
    }
}

/// Server (listening) configuration builder
pub struct ServerConfigBuilder {
    ctx_builder: SslContextBuilder,
    has_cert: bool,
    has_key: bool,
}

impl ServerConfigBuilder {
    fn new() -> Self {
        let ctx_builder = SslContextBuilder::new(SslMethod::tls_server())
            .expect("Failed to create SSL context");

        ServerConfigBuilder {
            ctx_builder,
            has_cert: false,
            has_key: false,
        }
    }

    /// Load the server certificate chain from a PEM file
    pub fn cert_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, TlsError> {
        self.ctx_builder
            .set_certificate_chain_file(path.as_ref())
            .map_err(|err| {
                TlsError::Certificate(format!(
                    "failed to load certificate {}: {}",
                    path.as_ref().display(),
                    err
                ))
            })?;
        self.has_cert = true;
        Ok(self)
    }

    /// Load the private key from a PEM file
    pub fn key_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, TlsError> {
        self.ctx_builder
            .set_private_key_file(path.as_ref(), SslFiletype::PEM)
            .map_err(|err| {
                TlsError::Certificate(format!(
                    "failed to load private key {}: {}",
                    path.as_ref().display(),
                    err
                ))
            })?;
        self.has_key = true;
        Ok(self)
    }

    /// Set ALPN protocols to accept (server-side selection callback)
    pub fn alpn(mut self, protocols: &[&str]) -> Result<Self, TlsError> {
        let protocols_vec: Vec<Vec<u8>> = protocols.iter().map(|p| p.as_bytes().to_vec()).collect();

        self.ctx_builder
            .set_alpn_select_callback(move |_ssl, client_protos| {
                // Client protocols arrive length-prefixed; pick the first
                // one we also speak.
                let mut pos = 0;
                while pos < client_protos.len() {
                    let len = client_protos[pos] as usize;
                    pos += 1;
                    if pos + len > client_protos.len() {
                        break;
                    }
                    let client_proto = &client_protos[pos..pos + len];
                    for proto in &protocols_vec {
                        if client_proto == proto.as_slice() {
                            return Ok(client_proto);
                        }
                    }
                    pos += len;
                }
                Err(openssl::ssl::AlpnError::NOACK)
            });

        Ok(self)
    }

    /// Build the TLS configuration
    pub fn build(mut self) -> Result<TlsConfig, TlsError> {
        if !self.has_cert || !self.has_key {
            return Err(TlsError::InvalidConfig(
                "server TLS requires a certificate and key".to_string(),
            ));
        }
        self.ctx_builder.check_private_key().map_err(|err| {
            TlsError::Certificate(format!("private key does not match certificate: {}", err))
        })?;

        Ok(TlsConfig {
            ctx: self.ctx_builder.build(),
            is_server: true,
            servername: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_builder() {
        let config = TlsConfig::client()
            .alpn(&["h2"])
            .unwrap()
            .servername("example.com")
            .build()
            .unwrap();

        assert!(!config.is_server);
        assert_eq!(config.servername, Some("example.com".to_string()));
    }

    #[test]
    fn test_server_requires_cert_and_key() {
        let result = TlsConfig::server().build();
        assert!(matches!(result, Err(TlsError::InvalidConfig(_))));
    }

    #[test]
    fn test_missing_cert_file_errors() {
        let result = TlsConfig::server().cert_file("/nonexistent/cert.pem");
        assert!(matches!(result, Err(TlsError::Certificate(_))));
    }
}
