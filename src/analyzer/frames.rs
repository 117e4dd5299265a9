//! HTTP/2 frame types and utilities
//!
//! This module defines the frame-level vocabulary used by the analyzer:
//! the ten frame types of RFC 7540 Section 6, their flag bits with the
//! symbolic names each type assigns to them, priority parameters, and the
//! raw frame unit produced by reassembly.

use bytes::Bytes;
use serde::Serialize;
use std::fmt;

/// HTTP/2 frame types (RFC 7540 Section 6)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    /// DATA frame (0x0) - Conveys arbitrary, variable-length sequences of octets
    Data = 0x0,
    /// HEADERS frame (0x1) - Opens a stream and carries header block fragment
    Headers = 0x1,
    /// PRIORITY frame (0x2) - Specifies sender-advised priority of a stream
    Priority = 0x2,
    /// RST_STREAM frame (0x3) - Allows immediate termination of a stream
    RstStream = 0x3,
    /// SETTINGS frame (0x4) - Conveys configuration parameters
    Settings = 0x4,
    /// PUSH_PROMISE frame (0x5) - Used to notify peer of intent to initiate stream
    PushPromise = 0x5,
    /// PING frame (0x6) - Mechanism for measuring round-trip time
    Ping = 0x6,
    /// GOAWAY frame (0x7) - Initiates shutdown of connection
    Goaway = 0x7,
    /// WINDOW_UPDATE frame (0x8) - Implements flow control
    WindowUpdate = 0x8,
    /// CONTINUATION frame (0x9) - Continues sequence of header block fragments
    Continuation = 0x9,
}

impl FrameType {
    /// Convert frame type to u8
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Create frame type from u8
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x0 => Some(FrameType::Data),
            0x1 => Some(FrameType::Headers),
            0x2 => Some(FrameType::Priority),
            0x3 => Some(FrameType::RstStream),
            0x4 => Some(FrameType::Settings),
            0x5 => Some(FrameType::PushPromise),
            0x6 => Some(FrameType::Ping),
            0x7 => Some(FrameType::Goaway),
            0x8 => Some(FrameType::WindowUpdate),
            0x9 => Some(FrameType::Continuation),
            _ => None,
        }
    }

    /// Get frame type name
    pub fn name(&self) -> &'static str {
        match self {
            FrameType::Data => "DATA",
            FrameType::Headers => "HEADERS",
            FrameType::Priority => "PRIORITY",
            FrameType::RstStream => "RST_STREAM",
            FrameType::Settings => "SETTINGS",
            FrameType::PushPromise => "PUSH_PROMISE",
            FrameType::Ping => "PING",
            FrameType::Goaway => "GOAWAY",
            FrameType::WindowUpdate => "WINDOW_UPDATE",
            FrameType::Continuation => "CONTINUATION",
        }
    }

    /// Resolve a wire value to its symbolic name, synthesizing one for
    /// types outside the registry (the reassembler still emits those).
    pub fn name_of(byte: u8) -> String {
        match Self::from_u8(byte) {
            Some(known) => known.name().to_string(),
            None => format!("UNKNOWN_FRAME_TYPE_0x{:x}", byte),
        }
    }

    /// Flag bits this frame type assigns a meaning to, with their
    /// symbolic names. Bits not listed here are never symbolized even if
    /// set in the frame header.
    pub fn flag_names(self) -> &'static [(u8, &'static str)] {
        match self {
            FrameType::Data => &[
                (FrameFlags::END_STREAM, "END_STREAM"),
                (FrameFlags::PADDED, "PADDED"),
            ],
            FrameType::Headers => &[
                (FrameFlags::END_STREAM, "END_STREAM"),
                (FrameFlags::END_HEADERS, "END_HEADERS"),
                (FrameFlags::PADDED, "PADDED"),
                (FrameFlags::PRIORITY, "PRIORITY"),
            ],
            FrameType::Settings => &[(FrameFlags::ACK, "ACK")],
            FrameType::PushPromise => &[
                (FrameFlags::END_HEADERS, "END_HEADERS"),
                (FrameFlags::PADDED, "PADDED"),
            ],
            FrameType::Ping => &[(FrameFlags::ACK, "ACK")],
            FrameType::Continuation => &[(FrameFlags::END_HEADERS, "END_HEADERS")],
            _ => &[],
        }
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:x})", self.name(), self.as_u8())
    }
}

/// HTTP/2 frame flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameFlags(u8);

impl FrameFlags {
    /// Create empty flags
    pub fn empty() -> Self {
        FrameFlags(0)
    }

    /// Create from u8
    pub fn from_u8(flags: u8) -> Self {
        FrameFlags(flags)
    }

    /// Get raw u8 value
    pub fn as_u8(&self) -> u8 {
        self.0
    }

    /// Set a flag
    pub fn set(&mut self, flag: u8) {
        self.0 |= flag;
    }

    /// Check if a flag is set
    pub fn is_set(&self, flag: u8) -> bool {
        (self.0 & flag) != 0
    }

    // Common flags

    /// END_STREAM flag (0x1)
    pub const END_STREAM: u8 = 0x1;

    /// ACK flag (0x1) - used for SETTINGS and PING
    pub const ACK: u8 = 0x1;

    /// END_HEADERS flag (0x4)
    pub const END_HEADERS: u8 = 0x4;

    /// PADDED flag (0x8)
    pub const PADDED: u8 = 0x8;

    /// PRIORITY flag (0x20)
    pub const PRIORITY: u8 = 0x20;

    /// Check if ACK is set
    pub fn is_ack(&self) -> bool {
        self.is_set(Self::ACK)
    }

    /// Check if PADDED is set
    pub fn is_padded(&self) -> bool {
        self.is_set(Self::PADDED)
    }

    /// Check if PRIORITY is set
    pub fn is_priority(&self) -> bool {
        self.is_set(Self::PRIORITY)
    }
}

/// Priority parameters carried by PRIORITY frames and by HEADERS frames
/// with the PRIORITY flag (RFC 7540 Section 6.3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PrioritySpec {
    /// Stream this one depends on (31 bits)
    pub stream_dependency: u32,
    /// Weight as carried on the wire (0-255)
    pub weight: u8,
    /// Exclusive dependency flag
    pub exclusive: bool,
}

impl PrioritySpec {
    /// Parse the 5-octet priority block: 1-bit exclusive flag, 31-bit
    /// stream dependency, 8-bit weight.
    pub fn parse(block: &[u8; 5]) -> Self {
        let dep = u32::from_be_bytes([block[0], block[1], block[2], block[3]]);
        PrioritySpec {
            stream_dependency: dep & 0x7FFF_FFFF,
            weight: block[4],
            exclusive: (dep & 0x8000_0000) != 0,
        }
    }
}

/// A reassembled frame: the decoded 9-octet header plus its opaque payload.
///
/// The frame type is kept raw so unknown types flow through to the
/// analyzer, which decides how to report them.
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// Declared payload length (24 bits)
    pub length: u32,
    /// Frame type octet
    pub frame_type: u8,
    /// Flag octet
    pub flags: FrameFlags,
    /// Stream ID with the reserved high bit masked to zero
    pub stream_id: u32,
    /// Payload bytes (exactly `length` octets)
    pub payload: Bytes,
}
