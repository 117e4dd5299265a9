//! HTTP/2 frame analysis pipeline
//!
//! This module is the core of h2lens: per-connection reassembly of TCP
//! chunks into HTTP/2 frames, per-type payload decoding, HPACK dynamic
//! table maintenance, and flow-control window bookkeeping, all kept
//! separately for the two directions of a proxied connection.
//!
//! # Architecture
//!
//! Raw bytes flow through four cooperating pieces:
//!
//! 1. [`ChunkReassembler`] buffers partial reads and emits whole frames,
//!    stripping the 24-octet connection preface on the client direction.
//! 2. [`HeaderDecoder`] decompresses HEADERS / PUSH_PROMISE /
//!    CONTINUATION fragments through a stateful per-direction HPACK
//!    decoder.
//! 3. [`FlowController`] tracks connection and per-stream receive
//!    windows as DATA, SETTINGS, and WINDOW_UPDATE frames imply them.
//! 4. [`FrameAnalyzer`] owns one of each per direction, classifies every
//!    frame, drives the state updates, and emits one [`Event`] per
//!    observation through the injected sink.
//!
//! Bytes are proxied verbatim elsewhere; nothing here modifies traffic,
//! and nothing here validates conformance beyond what decoding requires.
//!
//! # Example
//!
//! ```no_run
//! use h2lens::analyzer::{ConnectionContext, FrameAnalyzer};
//! use h2lens::output::{shared, HumanSink};
//!
//! let sink = shared(HumanSink::stdout());
//! let peer = "192.0.2.1:50000".parse().unwrap();
//! let mut analyzer = FrameAnalyzer::new(ConnectionContext::new(peer), sink);
//!
//! analyzer.on_connect();
//! analyzer.on_alpn("h2");
//! // chunks read from the client leg:
//! analyzer.on_bytes(b"...", false);
//! // chunks read from the origin leg:
//! analyzer.on_bytes(b"...", true);
//! analyzer.on_close();
//! ```

pub mod connection;
pub mod error;
pub mod flow_control;
pub mod frames;
pub mod headers;
pub mod reassembly;
pub mod record;
pub mod settings;

pub use connection::FrameAnalyzer;
pub use error::{Error, ErrorCode, Result};
pub use flow_control::FlowController;
pub use frames::{FrameFlags, FrameType, PrioritySpec, RawFrame};
pub use headers::HeaderDecoder;
pub use reassembly::ChunkReassembler;
pub use record::{ConnectionContext, Event, EventKind, FramePayload, FrameRecord};
pub use settings::{Setting, SettingId};

/// HTTP/2 connection preface sent once by clients (RFC 7540 Section 3.5)
pub const CONNECTION_PREFACE: &[u8] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";

/// HTTP/2 frame header size (9 octets)
pub const FRAME_HEADER_SIZE: usize = 9;

/// Default initial flow-control window size (65535 octets)
pub const DEFAULT_INITIAL_WINDOW_SIZE: u32 = 65535;

/// Default HPACK dynamic table size (4096 octets)
pub const DEFAULT_HEADER_TABLE_SIZE: u32 = 4096;
