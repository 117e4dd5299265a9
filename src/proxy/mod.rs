//! Analyzing proxy
//!
//! Accepts client connections, relays every byte verbatim to the origin,
//! and feeds the same bytes to a [`FrameAnalyzer`]. Each connection gets
//! one consumer thread that owns the analyzer and both write paths, fed
//! by two reader threads (one per socket leg) over a channel; within a
//! connection nothing else touches analyzer state, so record order per
//! direction is exactly wire order.

use crate::analyzer::record::ConnectionContext;
use crate::analyzer::FrameAnalyzer;
use crate::output::SharedSink;
use crate::session::{self, FdSessionOps, PollEvents, SessionOps};
use crate::tls::{TlsConfig, TlsError};
use std::io;
use std::net::{IpAddr, SocketAddr, TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// ALPN protocols offered on the listening side. The draft identifiers
/// keep old clients debuggable.
pub const ALPN_PROTOCOLS: &[&str] = &["h2", "h2-16", "h2-15", "h2-14"];

/// Read buffer size per socket leg
const READ_BUFFER_SIZE: usize = 16384;

/// Proxy errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("TLS error: {0}")]
    Tls(#[from] TlsError),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Result type for proxy operations
pub type Result<T> = std::result::Result<T, Error>;

/// Listener and origin endpoints.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Address to listen on
    pub listen_ip: IpAddr,
    /// Port to listen on
    pub listen_port: u16,
    /// Listen in plaintext (h2c) instead of terminating TLS
    pub direct: bool,
    /// Origin host to relay to
    pub origin_host: String,
    /// Origin port
    pub origin_port: u16,
    /// Connect to the origin in plaintext
    pub origin_direct: bool,
    /// Server certificate (PEM), required unless `direct`
    pub cert: Option<PathBuf>,
    /// Server private key (PEM), required unless `direct`
    pub key: Option<PathBuf>,
}

/// Bind the listener and serve connections until an accept-loop error
/// that is not per-connection (bind and TLS setup errors are fatal).
pub fn run(config: ProxyConfig, sink: SharedSink) -> Result<()> {
    let server_tls = if config.direct {
        None
    } else {
        Some(build_server_tls(&config)?)
    };

    let listener = TcpListener::bind((config.listen_ip, config.listen_port))?;
    tracing::info!(
        addr = %format!("{}:{}", config.listen_ip, config.listen_port),
        origin = %format!("{}:{}", config.origin_host, config.origin_port),
        "listening"
    );

    serve(listener, server_tls, Arc::new(config), sink)
}

/// Accept loop over an already-bound listener. Accept errors are logged
/// and the loop continues; each connection runs on its own thread.
pub fn serve(
    listener: TcpListener,
    server_tls: Option<TlsConfig>,
    config: Arc<ProxyConfig>,
    sink: SharedSink,
) -> Result<()> {
    loop {
        match listener.accept() {
            Ok((stream, peer)) => {
                let config = config.clone();
                let server_tls = server_tls.clone();
                let sink = sink.clone();
                thread::spawn(move || {
                    handle_connection(stream, peer, config, server_tls, sink);
                });
            }
            Err(err) => {
                tracing::error!(error = %err, "accept failed");
            }
        }
    }
}

fn build_server_tls(config: &ProxyConfig) -> Result<TlsConfig> {
    let (cert, key) = match (&config.cert, &config.key) {
        (Some(cert), Some(key)) => (cert, key),
        _ => {
            return Err(Error::Config(
                "certificate and key are required unless --direct is set".to_string(),
            ))
        }
    };

    Ok(TlsConfig::server()
        .cert_file(cert)?
        .key_file(key)?
        .alpn(ALPN_PROTOCOLS)?
        .build()?)
}

/// A chunk read from one leg, or that leg's end.
enum PeerEvent {
    Chunk { remote: bool, data: Vec<u8> },
    Closed { remote: bool, error: Option<io::Error> },
}

type SharedSession = Arc<Mutex<Box<dyn SessionOps + Send>>>;

fn handle_connection(
    tcp: TcpStream,
    peer: SocketAddr,
    config: Arc<ProxyConfig>,
    server_tls: Option<TlsConfig>,
    sink: SharedSink,
) {
    // Terminate (or pass through) the client leg first; ALPN is known
    // once the handshake completes.
    let (client_session, alpn): (Box<dyn SessionOps + Send>, Option<String>) = match server_tls {
        None => (Box::new(FdSessionOps::new(tcp)), None),
        Some(tls) => match tls.accept(tcp) {
            Ok(session) => {
                let alpn = session.negotiated_protocol();
                (Box::new(session), alpn)
            }
            Err(err) => {
                tracing::error!(peer = %peer, error = %err, "TLS handshake failed");
                return;
            }
        },
    };

    let mut analyzer = FrameAnalyzer::new(ConnectionContext::new(peer), sink);
    analyzer.on_connect();
    if let Some(protocol) = &alpn {
        analyzer.on_alpn(protocol);
    }

    let origin_session = match connect_origin(&config, alpn.as_deref()) {
        Ok(session) => session,
        Err(err) => {
            tracing::error!(peer = %peer, error = %err, "unable to connect to the origin");
            analyzer.on_close();
            return;
        }
    };

    let client: SharedSession = Arc::new(Mutex::new(client_session));
    let origin: SharedSession = Arc::new(Mutex::new(origin_session));

    let (tx, rx) = mpsc::channel();
    spawn_reader(client.clone(), false, tx.clone());
    spawn_reader(origin.clone(), true, tx);

    for event in rx {
        match event {
            PeerEvent::Chunk { remote, data } => {
                // Forward to the opposite leg before analyzing, so the
                // analyzer can never delay the traffic it observes.
                let target = if remote { &client } else { &origin };
                let write_result = match target.lock() {
                    Ok(mut session) => session::write_all(session.as_mut(), &data),
                    Err(_) => break,
                };
                if let Err(err) = write_result {
                    tracing::error!(peer = %peer, remote, error = %err, "unable to proxy data");
                    break;
                }

                analyzer.on_bytes(&data, remote);
            }
            PeerEvent::Closed { error: None, .. } => break,
            PeerEvent::Closed {
                remote,
                error: Some(err),
            } => {
                tracing::error!(peer = %peer, remote, error = %err, "peer read error");
                break;
            }
        }
    }

    for session in [&client, &origin] {
        if let Ok(mut session) = session.lock() {
            let _ = session.close();
        }
    }
    analyzer.on_close();
}

fn connect_origin(
    config: &ProxyConfig,
    alpn: Option<&str>,
) -> Result<Box<dyn SessionOps + Send>> {
    let tcp = TcpStream::connect((config.origin_host.as_str(), config.origin_port))?;

    if config.origin_direct {
        return Ok(Box::new(FdSessionOps::new(tcp)));
    }

    // Offer the origin exactly what the client negotiated
    let protocols: Vec<&str> = match alpn {
        Some(protocol) => vec![protocol],
        None => vec!["h2"],
    };
    let tls = TlsConfig::client()
        .alpn(&protocols)?
        .servername(&config.origin_host)
        .build()?;

    Ok(Box::new(tls.connect(tcp)?))
}

/// Read one socket leg and deliver chunks to the consumer. Waits for
/// readability on the raw fd without the session lock so the consumer
/// can write to this leg concurrently.
fn spawn_reader(session: SharedSession, remote: bool, tx: Sender<PeerEvent>) {
    thread::spawn(move || {
        let fd = match session.lock() {
            Ok(session) => session.raw_fd(),
            Err(_) => return,
        };

        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        loop {
            if let Err(err) = session::wait_readable(fd) {
                let _ = tx.send(PeerEvent::Closed {
                    remote,
                    error: Some(err),
                });
                return;
            }

            let mut guard = match session.lock() {
                Ok(guard) => guard,
                Err(_) => return,
            };

            // Drain everything available, including records OpenSSL has
            // already decrypted past the fd.
            loop {
                match guard.read(&mut buf) {
                    Ok(0) => {
                        drop(guard);
                        let _ = tx.send(PeerEvent::Closed {
                            remote,
                            error: None,
                        });
                        return;
                    }
                    Ok(n) => {
                        if tx
                            .send(PeerEvent::Chunk {
                                remote,
                                data: buf[..n].to_vec(),
                            })
                            .is_err()
                        {
                            return;
                        }
                    }
                    Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
                    Err(err) => {
                        drop(guard);
                        let _ = tx.send(PeerEvent::Closed {
                            remote,
                            error: Some(err),
                        });
                        return;
                    }
                }

                match guard.poll(PollEvents::Read, Some(Duration::ZERO)) {
                    Ok(true) => continue,
                    _ => break,
                }
            }
        }
    });
}
