//! TLS session operations
//!
//! Implements [`SessionOps`] over an OpenSSL stream so the proxy treats
//! encrypted legs exactly like plain ones. The readiness poll accounts
//! for records OpenSSL has already buffered, which the raw descriptor
//! cannot reveal.

use super::config::{TlsConfig, TlsError};
use crate::session::{poll_fd, PollEvents, SessionOps};
use openssl::ssl::{Ssl, SslStream};
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::os::fd::{AsRawFd, RawFd};
use std::time::Duration;

/// TLS-encrypted session.
pub struct TlsSessionOps {
    stream: SslStream<TcpStream>,
    failed: bool,
}

impl TlsSessionOps {
    /// Connect to the origin and perform the TLS handshake (client-side).
    pub fn connect(tcp_stream: TcpStream, config: TlsConfig) -> Result<Self, TlsError> {
        let mut ssl = Ssl::new(&config.ctx)?;

        if let Some(ref servername) = config.servername {
            ssl.set_hostname(servername)?;
        }

        let stream = ssl
            .connect(tcp_stream)
            .map_err(|err| TlsError::HandshakeFailed(format!("connect failed: {}", err)))?;

        Ok(TlsSessionOps {
            stream,
            failed: false,
        })
    }

    /// Accept a client connection and perform the TLS handshake
    /// (server-side).
    pub fn accept(tcp_stream: TcpStream, config: TlsConfig) -> Result<Self, TlsError> {
        let ssl = Ssl::new(&config.ctx)?;

        let stream = ssl
            .accept(tcp_stream)
            .map_err(|err| TlsError::HandshakeFailed(format!("accept failed: {}", err)))?;

        Ok(TlsSessionOps {
            stream,
            failed: false,
        })
    }

    /// ALPN protocol agreed during the handshake, if any.
    pub fn negotiated_protocol(&self) -> Option<String> {
        self.stream
            .ssl()
            .selected_alpn_protocol()
            .map(|proto| String::from_utf8_lossy(proto).into_owned())
    }

    /// Whether an I/O operation on this session has failed.
    pub fn failed(&self) -> bool {
        self.failed
    }
}

impl SessionOps for TlsSessionOps {
    fn raw_fd(&self) -> RawFd {
        self.stream.get_ref().as_raw_fd()
    }

    fn poll(&self, events: PollEvents, timeout: Option<Duration>) -> io::Result<bool> {
        // Data already decrypted inside OpenSSL never shows on the fd
        if events == PollEvents::Read || events == PollEvents::Both {
            if self.stream.ssl().pending() > 0 {
                return Ok(true);
            }
        }

        poll_fd(self.raw_fd(), events, timeout)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.stream.read(buf) {
            Ok(n) => Ok(n),
            Err(err) => {
                self.failed = true;
                Err(err)
            }
        }
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.stream.write(buf) {
            Ok(n) => Ok(n),
            Err(err) => {
                self.failed = true;
                Err(err)
            }
        }
    }

    fn close(&mut self) -> io::Result<()> {
        if !self.failed {
            let _ = self.stream.shutdown();
        }

        use std::net::Shutdown;
        self.stream.get_mut().shutdown(Shutdown::Both)
    }
}
