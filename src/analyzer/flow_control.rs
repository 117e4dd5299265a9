//! Flow-control window bookkeeping
//!
//! Each direction of a connection gets one controller tracking the
//! connection-level window and one window per stream, as the traffic
//! implies them: DATA debits, WINDOW_UPDATE credits, and
//! SETTINGS_INITIAL_WINDOW_SIZE seeds windows created later.
//!
//! The analyzer only observes traffic, so windows are clamped into
//! [0, 2^31-1] instead of treating overdraw as a protocol error; the
//! returned delta reflects the clamped change actually applied.

use super::record::WindowSnapshot;
use super::DEFAULT_INITIAL_WINDOW_SIZE;
use std::collections::HashMap;

/// Per-direction receive-window state.
///
/// A stream window is created lazily on first reference, seeded from the
/// `initial_window_size` in effect at that moment. Changing the initial
/// size does not touch windows that already exist (RFC 7540 Section
/// 6.9.2 calls for a delta adjustment; see DESIGN.md).
#[derive(Debug)]
pub struct FlowController {
    initial_window_size: u32,
    connection_window: i32,
    stream_windows: HashMap<u32, i32>,
}

impl FlowController {
    /// Create a controller with the protocol defaults (65535).
    pub fn new() -> Self {
        FlowController {
            initial_window_size: DEFAULT_INITIAL_WINDOW_SIZE,
            connection_window: DEFAULT_INITIAL_WINDOW_SIZE as i32,
            stream_windows: HashMap::new(),
        }
    }

    /// Current initial window size used to seed new stream windows.
    pub fn initial_window_size(&self) -> u32 {
        self.initial_window_size
    }

    /// Replace the initial window size from SETTINGS_INITIAL_WINDOW_SIZE.
    /// Existing stream windows keep their balance.
    pub fn set_initial_window_size(&mut self, size: u32) {
        self.initial_window_size = size;
    }

    /// Apply a delta to the connection window and return the post-update
    /// snapshot. Negative deltas come from DATA, positive ones from
    /// WINDOW_UPDATE on stream 0.
    pub fn update_connection_window(&mut self, delta: i32) -> WindowSnapshot {
        let original = self.connection_window;
        self.connection_window = Self::apply(original, delta);

        WindowSnapshot {
            current: self.connection_window,
            delta: self.connection_window - original,
        }
    }

    /// Apply a delta to a stream window, creating it at the current
    /// initial size on first reference, and return the post-update
    /// snapshot.
    pub fn update_stream_window(&mut self, stream_id: u32, delta: i32) -> WindowSnapshot {
        let seed = self.initial_window_size.min(i32::MAX as u32) as i32;
        let window = self.stream_windows.entry(stream_id).or_insert(seed);

        let original = *window;
        *window = Self::apply(original, delta);

        WindowSnapshot {
            current: *window,
            delta: *window - original,
        }
    }

    /// Number of stream windows materialized so far.
    pub fn stream_count(&self) -> usize {
        self.stream_windows.len()
    }

    fn apply(current: i32, delta: i32) -> i32 {
        (current as i64 + delta as i64).clamp(0, i32::MAX as i64) as i32
    }
}

impl Default for FlowController {
    fn default() -> Self {
        Self::new()
    }
}
