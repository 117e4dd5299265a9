//! Frame reassembly
//!
//! TCP delivers the HTTP/2 byte stream in arbitrary chunks. The
//! reassembler buffers partial reads per direction and emits whole frames
//! once their declared length is available. On the client-to-origin
//! direction it also detects and strips the 24-octet connection preface
//! before framing starts.

use super::frames::{FrameFlags, RawFrame};
use super::{CONNECTION_PREFACE, FRAME_HEADER_SIZE};
use bytes::{Buf, BytesMut};

/// Reassembles one direction of a connection into whole HTTP/2 frames.
///
/// The loop is purely length-driven: unknown frame types are emitted like
/// any other, and a corrupt length field cannot be detected here (it
/// surfaces later as a type-specific decode error).
#[derive(Debug)]
pub struct ChunkReassembler {
    carry: BytesMut,
    preface_seen: bool,
}

impl ChunkReassembler {
    /// Create a reassembler. `expect_preface` is true for the
    /// client-to-origin direction only; the origin never sends a preface.
    pub fn new(expect_preface: bool) -> Self {
        ChunkReassembler {
            carry: BytesMut::new(),
            preface_seen: !expect_preface,
        }
    }

    /// Whether the preface has been handled (or was never expected).
    pub fn preface_seen(&self) -> bool {
        self.preface_seen
    }

    /// Number of carried-over bytes awaiting completion.
    pub fn buffered(&self) -> usize {
        self.carry.len()
    }

    /// Feed a chunk of bytes, returning every frame completed by it.
    ///
    /// A single call may yield zero, one, or many frames. Zero-length
    /// payloads are legal.
    pub fn ingest(&mut self, chunk: &[u8]) -> Vec<RawFrame> {
        self.carry.extend_from_slice(chunk);

        if !self.preface_seen {
            if self.carry.len() < CONNECTION_PREFACE.len() {
                return Vec::new();
            }
            if self.carry.starts_with(CONNECTION_PREFACE) {
                self.carry.advance(CONNECTION_PREFACE.len());
            }
            // Either way the preface question is settled for this
            // direction: a peer that did not lead with it never will.
            self.preface_seen = true;
        }

        let mut frames = Vec::new();
        loop {
            if self.carry.len() < FRAME_HEADER_SIZE {
                break;
            }

            let payload_len = ((self.carry[0] as usize) << 16)
                | ((self.carry[1] as usize) << 8)
                | (self.carry[2] as usize);
            if self.carry.len() < FRAME_HEADER_SIZE + payload_len {
                break;
            }

            let frame = self.carry.split_to(FRAME_HEADER_SIZE + payload_len).freeze();
            let stream_id = ((frame[5] as u32 & 0x7F) << 24)
                | ((frame[6] as u32) << 16)
                | ((frame[7] as u32) << 8)
                | (frame[8] as u32);

            frames.push(RawFrame {
                length: payload_len as u32,
                frame_type: frame[3],
                flags: FrameFlags::from_u8(frame[4]),
                stream_id,
                payload: frame.slice(FRAME_HEADER_SIZE..),
            });
        }

        frames
    }
}
