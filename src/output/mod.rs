//! Output sinks
//!
//! Every connection task reports through one process-wide sink. The sink
//! is behind a mutex so a record from one connection is never interleaved
//! with another's; analyzers hold a [`SharedSink`] clone and know nothing
//! about the concrete format.

pub mod human;
pub mod json;

pub use human::HumanSink;
pub use json::JsonSink;

use crate::analyzer::record::Event;
use std::sync::{Arc, Mutex};

/// Consumer of analyzer events.
pub trait RecordSink {
    /// Handle one event. Implementations must not panic on malformed
    /// content; a record that cannot be rendered is dropped.
    fn emit(&mut self, event: &Event);
}

/// The sink handle shared by all connection tasks.
pub type SharedSink = Arc<Mutex<dyn RecordSink + Send>>;

/// Wrap a sink for sharing across connection threads.
pub fn shared<S: RecordSink + Send + 'static>(sink: S) -> SharedSink {
    Arc::new(Mutex::new(sink))
}

/// Sink that appends cloned events to a shared vector. Used by tests and
/// by embedders that want programmatic access to the trace.
pub struct CaptureSink {
    events: Arc<Mutex<Vec<Event>>>,
}

impl CaptureSink {
    pub fn new(events: Arc<Mutex<Vec<Event>>>) -> Self {
        CaptureSink { events }
    }
}

impl RecordSink for CaptureSink {
    fn emit(&mut self, event: &Event) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::record::{ConnectionContext, EventKind};

    #[test]
    fn test_capture_sink_collects_events() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = shared(CaptureSink::new(events.clone()));

        let context = ConnectionContext::new("127.0.0.1:40000".parse().unwrap());
        let event = Event::new(EventKind::Connect, &context, true, 0);
        sink.lock().unwrap().emit(&event);

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].connection_id, "127.0.0.1:40000");
    }
}
