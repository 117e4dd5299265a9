//! Structured formatter
//!
//! One self-describing JSON object per line. Frame types and flags
//! serialize as their symbolic names, window sizes as the current value,
//! opaque bytes as hex; the serialization rules themselves live on the
//! record types. A record that fails to serialize is logged and dropped.

use super::RecordSink;
use crate::analyzer::record::Event;
use std::io::Write;

/// JSON-lines sink.
pub struct JsonSink {
    out: Box<dyn Write + Send>,
}

impl JsonSink {
    /// Sink writing to standard output.
    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    /// Sink writing to an arbitrary writer.
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        JsonSink { out }
    }
}

impl RecordSink for JsonSink {
    fn emit(&mut self, event: &Event) {
        match serde_json::to_string(event) {
            Ok(line) => {
                let _ = writeln!(self.out, "{}", line);
                let _ = self.out.flush();
            }
            Err(err) => {
                tracing::error!(error = %err, "record serialization failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::record::{
        ConnectionContext, EventKind, FramePayload, FrameRecord, NameId, SettingsList,
        SettingsPayload,
    };
    use crate::analyzer::settings::Setting;
    use std::sync::{Arc, Mutex};

    #[derive(Clone)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_one_object_per_line() {
        let buf = SharedBuf(Arc::new(Mutex::new(Vec::new())));
        let mut sink = JsonSink::new(Box::new(buf.clone()));

        let context = ConnectionContext::new("10.0.0.1:1234".parse().unwrap());
        sink.emit(&Event::new(EventKind::Connect, &context, true, 0));

        let mut event = Event::new(EventKind::Frame, &context, false, 0);
        event.frame = Some(FrameRecord {
            length: 6,
            kind: NameId {
                id: 0x4,
                name: "SETTINGS".to_string(),
            },
            flags: vec![],
            payload: Some(FramePayload::Settings(SettingsPayload {
                parameters: SettingsList(vec![Setting {
                    id: 0x4,
                    name: "INITIAL_WINDOW_SIZE".to_string(),
                    value: 1000,
                }]),
            })),
        });
        sink.emit(&event);

        let bytes = buf.0.lock().unwrap().clone();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["type"], "connect");
        assert_eq!(first["remote"], true);
        assert_eq!(first["remote_addr"], "10.0.0.1");
        assert_eq!(first["remote_port"], 1234);

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["type"], "frame");
        assert_eq!(second["frame"]["type"], "SETTINGS");
        assert_eq!(
            second["frame"]["payload"]["parameters"]["INITIAL_WINDOW_SIZE"],
            1000
        );
    }
}
