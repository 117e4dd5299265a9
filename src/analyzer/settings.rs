//! HTTP/2 SETTINGS parameters
//!
//! This module implements the SETTINGS parameter registry of RFC 7540
//! Section 6.5.2 (plus the RFC 8441 and RFC 9218 extensions) and the
//! parsing of SETTINGS frame payloads into ordered parameter lists.

use super::error::{Error, Result};
use std::fmt;

/// HTTP/2 settings parameters (RFC 7540 Section 6.5.2)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum SettingId {
    /// SETTINGS_HEADER_TABLE_SIZE (0x1)
    /// Maximum size of the header compression table the sender will use
    HeaderTableSize = 0x1,

    /// SETTINGS_ENABLE_PUSH (0x2)
    /// Used to disable server push
    EnablePush = 0x2,

    /// SETTINGS_MAX_CONCURRENT_STREAMS (0x3)
    /// Maximum number of concurrent streams
    MaxConcurrentStreams = 0x3,

    /// SETTINGS_INITIAL_WINDOW_SIZE (0x4)
    /// Sender's initial window size for stream-level flow control
    InitialWindowSize = 0x4,

    /// SETTINGS_MAX_FRAME_SIZE (0x5)
    /// Size of the largest frame payload the sender will accept
    MaxFrameSize = 0x5,

    /// SETTINGS_MAX_HEADER_LIST_SIZE (0x6)
    /// Advisory maximum size of a header list
    MaxHeaderListSize = 0x6,

    /// SETTINGS_ENABLE_CONNECT_PROTOCOL (0x8) - RFC 8441
    /// Enables CONNECT requests with the :protocol pseudo-header
    EnableConnectProtocol = 0x8,

    /// SETTINGS_NO_RFC7540_PRIORITIES (0x9) - RFC 9218
    /// Indicates RFC 7540 priorities are not used
    NoRfc7540Priorities = 0x9,
}

impl SettingId {
    /// Convert to u16
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Create from u16
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x1 => Some(SettingId::HeaderTableSize),
            0x2 => Some(SettingId::EnablePush),
            0x3 => Some(SettingId::MaxConcurrentStreams),
            0x4 => Some(SettingId::InitialWindowSize),
            0x5 => Some(SettingId::MaxFrameSize),
            0x6 => Some(SettingId::MaxHeaderListSize),
            0x8 => Some(SettingId::EnableConnectProtocol),
            0x9 => Some(SettingId::NoRfc7540Priorities),
            _ => None,
        }
    }

    /// Get parameter name
    pub fn name(&self) -> &'static str {
        match self {
            SettingId::HeaderTableSize => "HEADER_TABLE_SIZE",
            SettingId::EnablePush => "ENABLE_PUSH",
            SettingId::MaxConcurrentStreams => "MAX_CONCURRENT_STREAMS",
            SettingId::InitialWindowSize => "INITIAL_WINDOW_SIZE",
            SettingId::MaxFrameSize => "MAX_FRAME_SIZE",
            SettingId::MaxHeaderListSize => "MAX_HEADER_LIST_SIZE",
            SettingId::EnableConnectProtocol => "ENABLE_CONNECT_PROTOCOL",
            SettingId::NoRfc7540Priorities => "NO_RFC7540_PRIORITIES",
        }
    }

    /// Resolve a wire identifier to its symbolic name, synthesizing one
    /// for identifiers outside the registry.
    pub fn name_of(id: u16) -> String {
        match Self::from_u16(id) {
            Some(known) => known.name().to_string(),
            None => format!("UNKNOWN_SETTING_0x{:x}", id),
        }
    }
}

impl fmt::Display for SettingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:x})", self.name(), self.as_u16())
    }
}

/// One setting as observed on the wire: identifier, resolved name, value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Setting {
    /// Parameter identifier (16 bits)
    pub id: u16,
    /// Symbolic name, synthesized for unknown identifiers
    pub name: String,
    /// Parameter value (32 bits)
    pub value: u32,
}

/// Parse a SETTINGS payload into its parameters, preserving wire order.
///
/// Each parameter occupies 6 octets: a 16-bit identifier followed by a
/// 32-bit value. A payload that is not a multiple of 6 octets is a
/// FRAME_SIZE_ERROR (RFC 7540 Section 6.5).
pub fn parse_settings(payload: &[u8]) -> Result<Vec<Setting>> {
    if payload.len() % 6 != 0 {
        return Err(Error::FrameSize(format!(
            "SETTINGS payload length {} is not a multiple of 6",
            payload.len()
        )));
    }

    let mut settings = Vec::with_capacity(payload.len() / 6);
    for entry in payload.chunks_exact(6) {
        let id = u16::from_be_bytes([entry[0], entry[1]]);
        let value = u32::from_be_bytes([entry[2], entry[3], entry[4], entry[5]]);
        settings.push(Setting {
            id,
            name: SettingId::name_of(id),
            value,
        });
    }

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setting_id_conversion() {
        assert_eq!(SettingId::HeaderTableSize.as_u16(), 0x1);
        assert_eq!(SettingId::InitialWindowSize.as_u16(), 0x4);

        assert_eq!(SettingId::from_u16(0x1), Some(SettingId::HeaderTableSize));
        assert_eq!(SettingId::from_u16(0x9), Some(SettingId::NoRfc7540Priorities));
        assert_eq!(SettingId::from_u16(0x7), None);
        assert_eq!(SettingId::from_u16(0xff), None);
    }

    #[test]
    fn test_setting_id_name() {
        assert_eq!(SettingId::MaxFrameSize.name(), "MAX_FRAME_SIZE");
        assert_eq!(SettingId::name_of(0x4), "INITIAL_WINDOW_SIZE");
        assert_eq!(SettingId::name_of(0xf00), "UNKNOWN_SETTING_0xf00");
    }

    #[test]
    fn test_parse_settings_empty() {
        assert_eq!(parse_settings(&[]).unwrap(), vec![]);
    }

    #[test]
    fn test_parse_settings_preserves_order() {
        // MAX_FRAME_SIZE=16384 before HEADER_TABLE_SIZE=8192
        let payload = [
            0x00, 0x05, 0x00, 0x00, 0x40, 0x00, // MAX_FRAME_SIZE
            0x00, 0x01, 0x00, 0x00, 0x20, 0x00, // HEADER_TABLE_SIZE
        ];
        let settings = parse_settings(&payload).unwrap();

        assert_eq!(settings.len(), 2);
        assert_eq!(settings[0].name, "MAX_FRAME_SIZE");
        assert_eq!(settings[0].value, 16384);
        assert_eq!(settings[1].name, "HEADER_TABLE_SIZE");
        assert_eq!(settings[1].value, 8192);
    }

    #[test]
    fn test_parse_settings_unknown_id() {
        let payload = [0x0f, 0x00, 0x00, 0x00, 0x00, 0x01];
        let settings = parse_settings(&payload).unwrap();

        assert_eq!(settings[0].id, 0x0f00);
        assert_eq!(settings[0].name, "UNKNOWN_SETTING_0xf00");
        assert_eq!(settings[0].value, 1);
    }

    #[test]
    fn test_parse_settings_bad_length() {
        let payload = [0x00, 0x04, 0x00, 0x00];
        assert!(parse_settings(&payload).is_err());
    }
}
