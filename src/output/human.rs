//! Terminal formatter
//!
//! One header line per event, prefixed by the direction glyph (`==>`
//! cyan for origin-side traffic, `<==` magenta for client-side), the
//! connection id, and the stream id. Frames get indented continuation
//! lines for flags, priority, header fields, window snapshots, settings,
//! and opaque data, each behind a gray `|` delimiter.

use super::RecordSink;
use crate::analyzer::record::{
    Event, EventKind, FramePayload, FrameRecord, HeaderField, WindowSizes,
};
use std::io::Write;

const CYAN: &str = "\x1b[36m";
const MAGENTA: &str = "\x1b[35m";
const GRAY: &str = "\x1b[90m";
const RESET: &str = "\x1b[0m";

const DETAIL_INDENT: usize = 28;

fn color(code: &str, msg: &str) -> String {
    format!("{}{}{}", code, msg, RESET)
}

/// Human-readable sink writing ANSI-colored lines.
pub struct HumanSink {
    out: Box<dyn Write + Send>,
}

impl HumanSink {
    /// Sink writing to standard output.
    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    /// Sink writing to an arbitrary writer.
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        HumanSink { out }
    }

    fn print(&mut self, event: &Event, message: &str, details: &[String]) {
        let glyph = if event.remote {
            color(CYAN, "==>")
        } else {
            color(MAGENTA, "<==")
        };
        let delimiter = color(GRAY, "|");

        let mut lines = Vec::with_capacity(1 + details.len());
        lines.push(format!(
            "{} [{}] [{:>3}] {}",
            glyph, event.connection_id, event.stream_id, message
        ));
        for detail in details {
            lines.push(format!(
                "{}{} {}",
                " ".repeat(DETAIL_INDENT),
                delimiter,
                detail
            ));
        }

        let _ = writeln!(self.out, "{}", lines.join("\n"));
        let _ = self.out.flush();
    }
}

impl RecordSink for HumanSink {
    fn emit(&mut self, event: &Event) {
        match event.kind {
            EventKind::Connect => self.print(event, "Connected", &[]),
            EventKind::Close => self.print(event, "Closed", &[]),
            EventKind::ConnectionState => {
                let protocol = event
                    .state
                    .as_ref()
                    .map(|s| s.negotiated_protocol.as_str())
                    .unwrap_or("");
                self.print(event, &format!("Negotiated Protocol: {}", protocol), &[]);
            }
            EventKind::Frame => {
                let Some(frame) = event.frame.as_ref() else {
                    return;
                };
                let type_color = if event.remote { CYAN } else { MAGENTA };
                let message = format!(
                    "{} Frame <Length:{}>",
                    color(type_color, &frame.kind.name),
                    frame.length
                );
                let details = frame_details(frame);
                self.print(event, &message, &details);
            }
        }
    }
}

fn frame_details(frame: &FrameRecord) -> Vec<String> {
    let mut details = Vec::new();

    if !frame.flags.is_empty() {
        details.push("Flags:".to_string());
        for flag in &frame.flags {
            details.push(format!("  - {} (0x{:x})", flag.name, flag.id));
        }
    }

    let Some(payload) = frame.payload.as_ref() else {
        return details;
    };

    match payload {
        FramePayload::Data(data) => {
            push_window_sizes(&mut details, &data.window_size);
        }

        FramePayload::Headers(headers) => {
            if let Some(priority) = &headers.priority {
                details.push(format!("Stream Dependency: {}", priority.stream_dependency));
                details.push(format!("Weight: {}", priority.weight));
                details.push(format!(
                    "Exclusive: {}",
                    if priority.exclusive { "Yes" } else { "No" }
                ));
            }
            push_header_fields(&mut details, &headers.header_fields);
        }

        FramePayload::Priority(priority) => {
            details.push(format!(
                "Stream Dependency: {}",
                priority.priority.stream_dependency
            ));
            details.push(format!("Weight: {}", priority.priority.weight));
            details.push(format!(
                "Exclusive: {}",
                if priority.priority.exclusive { "Yes" } else { "No" }
            ));
        }

        FramePayload::RstStream(rst) => {
            details.push(format!("Error Code: {}", rst.error_code));
        }

        FramePayload::Settings(settings) => {
            if !settings.parameters.0.is_empty() {
                details.push("Parameters:".to_string());
                for setting in &settings.parameters.0 {
                    details.push(format!(
                        "  {} (0x{:x}): {}",
                        setting.name, setting.id, setting.value
                    ));
                }
            }
        }

        FramePayload::PushPromise(pp) => {
            details.push(format!("Promised Stream ID: {}", pp.promised_stream_id));
            push_header_fields(&mut details, &pp.header_fields);
        }

        FramePayload::Ping(ping) => {
            if let Some(data) = &ping.opaque_data {
                details.push(format!("Opaque Data: 0x{}", data));
            }
        }

        FramePayload::GoAway(goaway) => {
            details.push(format!("Last Stream ID: {}", goaway.last_stream_id));
            details.push(format!("Error Code: {}", goaway.error_code));
            if let Some(debug) = &goaway.additional_debug_data {
                details.push(format!("Additional Debug Data: 0x{}", debug));
            }
        }

        FramePayload::WindowUpdate(wu) => {
            details.push(format!("Window Size Increment: {}", wu.window_size_increment));
            push_window_sizes(&mut details, &wu.window_size);
        }

        FramePayload::Continuation(cont) => {
            push_header_fields(&mut details, &cont.header_fields);
        }
    }

    details
}

fn push_window_sizes(details: &mut Vec<String>, sizes: &WindowSizes) {
    details.push("Window Size:".to_string());
    if let Some(connection) = &sizes.connection {
        details.push(format!(
            "  Connection: {} ({})",
            connection.current, connection.delta
        ));
    }
    if let Some(stream) = &sizes.stream {
        details.push(format!("  Stream: {} ({})", stream.current, stream.delta));
    }
}

fn push_header_fields(details: &mut Vec<String>, fields: &[HeaderField]) {
    if fields.is_empty() {
        return;
    }
    details.push("Header Fields:".to_string());
    for field in fields {
        details.push(format!("  {}: {}", field.name, field.value));
    }
}
