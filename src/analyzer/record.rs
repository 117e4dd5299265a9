//! Event and frame record model
//!
//! Every observation — connection open/close, negotiated protocol, and
//! each decoded frame — becomes one [`Event`] handed to the output sink.
//! The structured serialization rules live here as `Serialize` impls:
//! frame types and flags serialize as their symbolic names, window sizes
//! as the current value only, opaque bytes as lowercase hex, and settings
//! as an insertion-ordered name-to-value object.

use super::frames::PrioritySpec;
use super::settings::Setting;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::{SystemTime, UNIX_EPOCH};

/// Identity of one analyzed connection, carried into every record.
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    /// Stable identifier: the client's "ip:port"
    pub id: String,
    /// Client IP address
    pub remote_ip: IpAddr,
    /// Client port
    pub remote_port: u16,
    /// ALPN-negotiated protocol, once known
    pub alpn: Option<String>,
}

impl ConnectionContext {
    /// Build a context from the accepted peer address.
    pub fn new(peer: SocketAddr) -> Self {
        ConnectionContext {
            id: peer.to_string(),
            remote_ip: peer.ip(),
            remote_port: peer.port(),
            alpn: None,
        }
    }
}

/// Event discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Connect,
    Close,
    ConnectionState,
    Frame,
}

/// Negotiated-protocol state attached to `connection_state` events.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionState {
    pub negotiated_protocol: String,
}

/// One emitted record.
///
/// `remote == true` marks traffic originating from the origin server
/// (read on the origin-facing socket, forwarded toward the client).
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    /// Nanoseconds since the Unix epoch
    pub time: i64,
    pub remote: bool,
    pub remote_addr: IpAddr,
    pub remote_port: u16,
    pub connection_id: String,
    pub stream_id: u32,
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<ConnectionState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame: Option<FrameRecord>,
}

impl Event {
    /// Create an event skeleton for this connection; the caller attaches
    /// the state or frame sub-object.
    pub fn new(kind: EventKind, context: &ConnectionContext, remote: bool, stream_id: u32) -> Self {
        Event {
            time: now_nanos(),
            remote,
            remote_addr: context.remote_ip,
            remote_port: context.remote_port,
            connection_id: context.id.clone(),
            stream_id,
            kind,
            state: None,
            frame: None,
        }
    }
}

fn now_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

/// A numeric identifier paired with its symbolic name. Serializes as the
/// name alone; the human sink prints both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameId {
    pub id: u8,
    pub name: String,
}

impl fmt::Display for NameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:x})", self.name, self.id)
    }
}

impl Serialize for NameId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name)
    }
}

/// An RFC 7540 error code with its resolved name. Serializes as the
/// numeric code; the human sink prints the name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorCodeInfo {
    pub id: u32,
    pub name: String,
}

impl ErrorCodeInfo {
    pub fn new(code: u32) -> Self {
        ErrorCodeInfo {
            id: code,
            name: super::error::ErrorCode::name_of(code),
        }
    }
}

impl fmt::Display for ErrorCodeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:x})", self.name, self.id)
    }
}

impl Serialize for ErrorCodeInfo {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.id)
    }
}

/// Post-update window state: the clamped current value and the change
/// actually applied. Serializes as the current value only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSnapshot {
    pub current: i32,
    pub delta: i32,
}

impl Serialize for WindowSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.current)
    }
}

/// Connection- and stream-level snapshots; only the meaningful side is
/// present (a connection-level WINDOW_UPDATE has no stream snapshot).
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct WindowSizes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection: Option<WindowSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<WindowSnapshot>,
}

/// Bytes rendered as lowercase hex in structured output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexBytes(pub Vec<u8>);

impl fmt::Display for HexBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl Serialize for HexBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// One decoded header field. Header sets are ordered lists, not maps, so
/// legal repeated names (set-cookie) survive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderField {
    pub name: String,
    pub value: String,
}

/// Settings in wire order; serializes as a name-to-value object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsList(pub Vec<Setting>);

impl Serialize for SettingsList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for setting in &self.0 {
            map.serialize_entry(&setting.name, &setting.value)?;
        }
        map.end()
    }
}

/// One fully decoded frame.
#[derive(Debug, Clone, Serialize)]
pub struct FrameRecord {
    /// Declared payload length in octets
    pub length: u32,
    #[serde(rename = "type")]
    pub kind: NameId,
    /// Flags set in the header that the frame type assigns a name to
    pub flags: Vec<NameId>,
    /// Type-specific decode; `None` for unknown frame types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<FramePayload>,
}

/// Type-tagged frame payload. The sink matches on the variant.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum FramePayload {
    Data(DataPayload),
    Headers(HeadersPayload),
    Priority(PriorityPayload),
    RstStream(RstStreamPayload),
    Settings(SettingsPayload),
    PushPromise(PushPromisePayload),
    Ping(PingPayload),
    GoAway(GoAwayPayload),
    WindowUpdate(WindowUpdatePayload),
    Continuation(ContinuationPayload),
}

/// DATA: window state after the debit.
#[derive(Debug, Clone, Serialize)]
pub struct DataPayload {
    pub window_size: WindowSizes,
}

/// HEADERS: optional priority block and the decoded fields.
#[derive(Debug, Clone, Serialize)]
pub struct HeadersPayload {
    #[serde(flatten)]
    pub priority: Option<PrioritySpec>,
    pub header_fields: Vec<HeaderField>,
}

/// PRIORITY: the priority block.
#[derive(Debug, Clone, Serialize)]
pub struct PriorityPayload {
    #[serde(flatten)]
    pub priority: PrioritySpec,
}

/// RST_STREAM: the error code.
#[derive(Debug, Clone, Serialize)]
pub struct RstStreamPayload {
    pub error_code: ErrorCodeInfo,
}

/// SETTINGS: parameters in wire order; empty for ACK.
#[derive(Debug, Clone, Serialize)]
pub struct SettingsPayload {
    pub parameters: SettingsList,
}

/// PUSH_PROMISE: promised stream and the decoded fields.
#[derive(Debug, Clone, Serialize)]
pub struct PushPromisePayload {
    pub promised_stream_id: u32,
    pub header_fields: Vec<HeaderField>,
}

/// PING: the 8 opaque octets, absent when the payload was empty.
#[derive(Debug, Clone, Serialize)]
pub struct PingPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opaque_data: Option<HexBytes>,
}

/// GOAWAY: last stream, error code, optional debug bytes.
#[derive(Debug, Clone, Serialize)]
pub struct GoAwayPayload {
    pub last_stream_id: u32,
    pub error_code: ErrorCodeInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_debug_data: Option<HexBytes>,
}

/// WINDOW_UPDATE: the increment and the credited window.
#[derive(Debug, Clone, Serialize)]
pub struct WindowUpdatePayload {
    pub window_size_increment: u32,
    pub window_size: WindowSizes,
}

/// CONTINUATION: the decoded fields.
#[derive(Debug, Clone, Serialize)]
pub struct ContinuationPayload {
    pub header_fields: Vec<HeaderField>,
}
