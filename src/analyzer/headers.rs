//! HPACK decoder driver
//!
//! Header-block fragments from HEADERS, PUSH_PROMISE, and CONTINUATION
//! frames are fed through one stateful decoder per direction; the dynamic
//! table built by earlier fragments is what makes later ones decodable,
//! so fragments must arrive in wire order with no gaps.

use super::error::{Error, Result};
use super::DEFAULT_HEADER_TABLE_SIZE;

/// Stateful header-block decompressor for one direction.
///
/// Wraps the `hpack` crate's decoder. The emitter is passed per call
/// rather than stored, so each decode reaches exactly the sink that asked
/// for it.
pub struct HeaderDecoder {
    decoder: hpack::Decoder<'static>,
}

impl HeaderDecoder {
    /// Create a decoder with the default dynamic table size
    /// ([`DEFAULT_HEADER_TABLE_SIZE`]), in effect until a SETTINGS frame
    /// resizes it.
    pub fn new() -> Self {
        let mut decoder = hpack::Decoder::new();
        decoder.set_max_table_size(DEFAULT_HEADER_TABLE_SIZE as usize);
        HeaderDecoder { decoder }
    }

    /// Decode a header-block fragment, invoking `emit` once per decoded
    /// field. The dynamic table persists across calls.
    pub fn decode<F>(&mut self, block: &[u8], mut emit: F) -> Result<()>
    where
        F: FnMut(&[u8], &[u8]),
    {
        self.decoder
            .decode_with_cb(block, |name, value| emit(&name, &value))
            .map_err(|err| Error::Compression(format!("{:?}", err)))
    }

    /// Resize the dynamic table, from an observed
    /// SETTINGS_HEADER_TABLE_SIZE for this direction.
    pub fn set_max_dynamic_table_size(&mut self, size: u32) {
        self.decoder.set_max_table_size(size as usize);
    }
}

impl Default for HeaderDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HeaderDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeaderDecoder").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(decoder: &mut HeaderDecoder, block: &[u8]) -> Vec<(String, String)> {
        let mut fields = Vec::new();
        decoder
            .decode(block, |name, value| {
                fields.push((
                    String::from_utf8_lossy(name).into_owned(),
                    String::from_utf8_lossy(value).into_owned(),
                ))
            })
            .unwrap();
        fields
    }

    #[test]
    fn test_decode_static_table_entries() {
        let mut decoder = HeaderDecoder::new();

        // 0x82 = :method: GET, 0x86 = :scheme: http, 0x84 = :path: /
        let fields = collect(&mut decoder, &[0x82, 0x86, 0x84]);

        assert_eq!(
            fields,
            vec![
                (":method".to_string(), "GET".to_string()),
                (":scheme".to_string(), "http".to_string()),
                (":path".to_string(), "/".to_string()),
            ]
        );
    }

    #[test]
    fn test_dynamic_table_persists_across_calls() {
        let mut encoder = hpack::Encoder::new();
        let mut decoder = HeaderDecoder::new();

        // First block inserts x-trace into the dynamic table
        let first = encoder.encode(vec![(&b"x-trace"[..], &b"abc"[..])]);
        assert_eq!(
            collect(&mut decoder, &first),
            vec![("x-trace".to_string(), "abc".to_string())]
        );

        // Second block can reference it by index
        let second = encoder.encode(vec![(&b"x-trace"[..], &b"abc"[..])]);
        assert_eq!(
            collect(&mut decoder, &second),
            vec![("x-trace".to_string(), "abc".to_string())]
        );
    }

    #[test]
    fn test_split_block_equals_whole_block() {
        // Feeding a block as two fragments in order yields the same
        // fields as feeding it at once (HEADERS + CONTINUATION case,
        // where each fragment is itself a valid decode unit).
        let mut encoder = hpack::Encoder::new();
        let first = encoder.encode(vec![(&b":status"[..], &b"200"[..])]);
        let second = encoder.encode(vec![(&b"server"[..], &b"origin"[..])]);

        let mut split = HeaderDecoder::new();
        let mut a = collect(&mut split, &first);
        a.extend(collect(&mut split, &second));

        let mut joined = Vec::new();
        joined.extend_from_slice(&first);
        joined.extend_from_slice(&second);
        let mut whole = HeaderDecoder::new();
        let b = collect(&mut whole, &joined);

        assert_eq!(a, b);
    }

    #[test]
    fn test_decode_error_reported() {
        let mut decoder = HeaderDecoder::new();

        // Index 0 is not a valid indexed header field
        let result = decoder.decode(&[0x80], |_, _| {});
        assert!(result.is_err());
    }
}
