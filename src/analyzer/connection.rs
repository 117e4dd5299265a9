//! Per-connection frame analysis
//!
//! [`FrameAnalyzer`] is the façade that ties the pipeline together: it
//! owns one reassembler, one HPACK decoder, and one flow controller per
//! direction, turns byte chunks into typed frame records, and hands each
//! record to the injected sink.
//!
//! Decode failures never terminate the connection: the error is logged
//! through the diagnostic stream and processing resumes at the framing
//! boundary the reassembler already established.

use super::error::{Error, Result};
use super::flow_control::FlowController;
use super::frames::{FrameType, PrioritySpec, RawFrame};
use super::headers::HeaderDecoder;
use super::reassembly::ChunkReassembler;
use super::record::{
    ConnectionContext, ConnectionState, ContinuationPayload, DataPayload, ErrorCodeInfo, Event,
    EventKind, FramePayload, FrameRecord, GoAwayPayload, HeaderField, HeadersPayload, HexBytes,
    NameId, PingPayload, PriorityPayload, PushPromisePayload, RstStreamPayload, SettingsList,
    SettingsPayload, WindowSizes, WindowUpdatePayload,
};
use super::settings::{parse_settings, SettingId};
use crate::output::SharedSink;

/// The stateful units of one direction. The two directions share nothing;
/// crossing between them is done only by the analyzer's flow-control
/// dispatch below.
#[derive(Debug)]
struct DirectionState {
    reassembler: ChunkReassembler,
    headers: HeaderDecoder,
    flow: FlowController,
}

impl DirectionState {
    fn new(remote: bool) -> Self {
        DirectionState {
            // Only the client leads with the connection preface
            reassembler: ChunkReassembler::new(!remote),
            headers: HeaderDecoder::new(),
            flow: FlowController::new(),
        }
    }
}

/// Analyzes one proxied connection: classifies every reassembled frame,
/// drives HPACK and flow-control state, and emits one [`Event`] per
/// observation through the shared sink.
pub struct FrameAnalyzer {
    context: ConnectionContext,
    remote: DirectionState,
    origin: DirectionState,
    sink: SharedSink,
}

impl FrameAnalyzer {
    /// Create the analyzer for a freshly accepted connection.
    pub fn new(context: ConnectionContext, sink: SharedSink) -> Self {
        FrameAnalyzer {
            context,
            remote: DirectionState::new(true),
            origin: DirectionState::new(false),
            sink,
        }
    }

    /// Connection identity carried into every record.
    pub fn context(&self) -> &ConnectionContext {
        &self.context
    }

    /// Emit the connection-open event.
    pub fn on_connect(&mut self) {
        let event = Event::new(EventKind::Connect, &self.context, true, 0);
        self.emit(event);
    }

    /// Record the negotiated ALPN protocol and emit a state event.
    pub fn on_alpn(&mut self, protocol: &str) {
        self.context.alpn = Some(protocol.to_string());
        let mut event = Event::new(EventKind::ConnectionState, &self.context, true, 0);
        event.state = Some(ConnectionState {
            negotiated_protocol: protocol.to_string(),
        });
        self.emit(event);
    }

    /// Feed a chunk observed on one leg. `remote == true` means the chunk
    /// was read from the origin-facing socket.
    pub fn on_bytes(&mut self, chunk: &[u8], remote: bool) {
        let frames = if remote {
            self.remote.reassembler.ingest(chunk)
        } else {
            self.origin.reassembler.ingest(chunk)
        };

        for raw in frames {
            match self.analyze_frame(&raw, remote) {
                Ok(record) => {
                    let mut event =
                        Event::new(EventKind::Frame, &self.context, remote, raw.stream_id);
                    event.frame = Some(record);
                    self.emit(event);
                }
                Err(err) => {
                    tracing::warn!(
                        connection = %self.context.id,
                        frame_type = raw.frame_type,
                        stream_id = raw.stream_id,
                        error = %err,
                        "frame decode error"
                    );
                }
            }
        }
    }

    /// Emit the connection-close event. Called on every teardown path.
    pub fn on_close(&mut self) {
        let event = Event::new(EventKind::Close, &self.context, true, 0);
        self.emit(event);
    }

    fn emit(&self, event: Event) {
        if let Ok(mut sink) = self.sink.lock() {
            sink.emit(&event);
        }
    }

    fn analyze_frame(&mut self, raw: &RawFrame, remote: bool) -> Result<FrameRecord> {
        let kind = FrameType::from_u8(raw.frame_type);

        let mut flags = Vec::new();
        if let Some(frame_type) = kind {
            for &(bit, name) in frame_type.flag_names() {
                if raw.flags.is_set(bit) {
                    flags.push(NameId {
                        id: bit,
                        name: name.to_string(),
                    });
                }
            }
        }

        let payload = match kind {
            Some(FrameType::Data) => Some(FramePayload::Data(self.analyze_data(raw, remote)?)),
            Some(FrameType::Headers) => {
                Some(FramePayload::Headers(self.analyze_headers(raw, remote)?))
            }
            Some(FrameType::Priority) => Some(FramePayload::Priority(analyze_priority(raw)?)),
            Some(FrameType::RstStream) => Some(FramePayload::RstStream(analyze_rst_stream(raw)?)),
            Some(FrameType::Settings) => {
                Some(FramePayload::Settings(self.analyze_settings(raw, remote)?))
            }
            Some(FrameType::PushPromise) => Some(FramePayload::PushPromise(
                self.analyze_push_promise(raw, remote)?,
            )),
            Some(FrameType::Ping) => Some(FramePayload::Ping(analyze_ping(raw)?)),
            Some(FrameType::Goaway) => Some(FramePayload::GoAway(analyze_goaway(raw)?)),
            Some(FrameType::WindowUpdate) => Some(FramePayload::WindowUpdate(
                self.analyze_window_update(raw, remote)?,
            )),
            Some(FrameType::Continuation) => Some(FramePayload::Continuation(
                self.analyze_continuation(raw, remote)?,
            )),
            None => None,
        };

        Ok(FrameRecord {
            length: raw.length,
            kind: NameId {
                id: raw.frame_type,
                name: FrameType::name_of(raw.frame_type),
            },
            flags,
            payload,
        })
    }

    /// The controller debited by DATA crosses directions: a DATA frame
    /// consumes the receive window of the peer it is heading towards.
    fn data_flow(&mut self, remote: bool) -> &mut FlowController {
        if remote {
            &mut self.origin.flow
        } else {
            &mut self.remote.flow
        }
    }

    /// WINDOW_UPDATE and SETTINGS act on the sender's own side.
    fn control_flow(&mut self, remote: bool) -> &mut FlowController {
        if remote {
            &mut self.remote.flow
        } else {
            &mut self.origin.flow
        }
    }

    fn analyze_data(&mut self, raw: &RawFrame, remote: bool) -> Result<DataPayload> {
        let data = strip_padding(&raw.payload, raw.flags.is_padded())?;
        let size = data.len() as i32;
        let stream_id = raw.stream_id;

        let flow = self.data_flow(remote);
        let connection = flow.update_connection_window(-size);
        let stream = flow.update_stream_window(stream_id, -size);

        Ok(DataPayload {
            window_size: WindowSizes {
                connection: Some(connection),
                stream: Some(stream),
            },
        })
    }

    fn analyze_headers(&mut self, raw: &RawFrame, remote: bool) -> Result<HeadersPayload> {
        let mut body = strip_padding(&raw.payload, raw.flags.is_padded())?;

        let priority = if raw.flags.is_priority() {
            if body.len() < 5 {
                return Err(Error::FrameSize(
                    "HEADERS priority block needs 5 octets".to_string(),
                ));
            }
            let mut block = [0u8; 5];
            block.copy_from_slice(&body[..5]);
            body = &body[5..];
            Some(PrioritySpec::parse(&block))
        } else {
            None
        };

        let header_fields = self.decode_header_block(body, remote);

        Ok(HeadersPayload {
            priority,
            header_fields,
        })
    }

    fn analyze_settings(&mut self, raw: &RawFrame, remote: bool) -> Result<SettingsPayload> {
        if raw.flags.is_ack() {
            return Ok(SettingsPayload {
                parameters: SettingsList::default(),
            });
        }

        let settings = parse_settings(&raw.payload)?;

        for setting in &settings {
            match SettingId::from_u16(setting.id) {
                Some(SettingId::InitialWindowSize) => {
                    self.control_flow(remote)
                        .set_initial_window_size(setting.value);
                }
                Some(SettingId::HeaderTableSize) => {
                    let decoder = if remote {
                        &mut self.remote.headers
                    } else {
                        &mut self.origin.headers
                    };
                    decoder.set_max_dynamic_table_size(setting.value);
                }
                _ => {}
            }
        }

        Ok(SettingsPayload {
            parameters: SettingsList(settings),
        })
    }

    fn analyze_push_promise(&mut self, raw: &RawFrame, remote: bool) -> Result<PushPromisePayload> {
        let body = strip_padding(&raw.payload, raw.flags.is_padded())?;
        if body.len() < 4 {
            return Err(Error::FrameSize(
                "PUSH_PROMISE needs a 4-octet promised stream id".to_string(),
            ));
        }

        let promised = u32::from_be_bytes([body[0], body[1], body[2], body[3]]) & 0x7FFF_FFFF;
        let header_fields = self.decode_header_block(&body[4..], remote);

        Ok(PushPromisePayload {
            promised_stream_id: promised,
            header_fields,
        })
    }

    fn analyze_window_update(
        &mut self,
        raw: &RawFrame,
        remote: bool,
    ) -> Result<WindowUpdatePayload> {
        if raw.payload.len() != 4 {
            return Err(Error::FrameSize(format!(
                "WINDOW_UPDATE payload must be 4 octets, got {}",
                raw.payload.len()
            )));
        }

        let increment =
            u32::from_be_bytes([raw.payload[0], raw.payload[1], raw.payload[2], raw.payload[3]])
                & 0x7FFF_FFFF;
        let stream_id = raw.stream_id;

        let flow = self.control_flow(remote);
        let window_size = if stream_id == 0 {
            WindowSizes {
                connection: Some(flow.update_connection_window(increment as i32)),
                stream: None,
            }
        } else {
            WindowSizes {
                connection: None,
                stream: Some(flow.update_stream_window(stream_id, increment as i32)),
            }
        };

        Ok(WindowUpdatePayload {
            window_size_increment: increment,
            window_size,
        })
    }

    fn analyze_continuation(&mut self, raw: &RawFrame, remote: bool) -> Result<ContinuationPayload> {
        Ok(ContinuationPayload {
            header_fields: self.decode_header_block(&raw.payload, remote),
        })
    }

    /// Run a header-block fragment through this direction's decoder. An
    /// HPACK error is logged and the fields decoded before it are kept;
    /// the dynamic table stays whatever state the decoder left it in.
    fn decode_header_block(&mut self, block: &[u8], remote: bool) -> Vec<HeaderField> {
        let decoder = if remote {
            &mut self.remote.headers
        } else {
            &mut self.origin.headers
        };

        let mut fields = Vec::new();
        if let Err(err) = decoder.decode(block, |name, value| {
            fields.push(HeaderField {
                name: String::from_utf8_lossy(name).into_owned(),
                value: String::from_utf8_lossy(value).into_owned(),
            });
        }) {
            tracing::warn!(
                connection = %self.context.id,
                error = %err,
                "header block decode error"
            );
        }
        fields
    }
}

/// Validate and remove DATA/HEADERS/PUSH_PROMISE padding: one pad-length
/// octet up front, that many octets of padding at the end.
fn strip_padding(payload: &[u8], padded: bool) -> Result<&[u8]> {
    if !padded {
        return Ok(payload);
    }

    let (&pad_len, rest) = payload
        .split_first()
        .ok_or_else(|| Error::Padding("padded frame with empty payload".to_string()))?;

    if pad_len as usize > rest.len() {
        return Err(Error::Padding(format!(
            "pad length {} exceeds remaining {} octets",
            pad_len,
            rest.len()
        )));
    }

    Ok(&rest[..rest.len() - pad_len as usize])
}

fn analyze_priority(raw: &RawFrame) -> Result<PriorityPayload> {
    if raw.payload.len() != 5 {
        return Err(Error::FrameSize(format!(
            "PRIORITY payload must be 5 octets, got {}",
            raw.payload.len()
        )));
    }

    let mut block = [0u8; 5];
    block.copy_from_slice(&raw.payload[..5]);
    Ok(PriorityPayload {
        priority: PrioritySpec::parse(&block),
    })
}

fn analyze_rst_stream(raw: &RawFrame) -> Result<RstStreamPayload> {
    if raw.payload.len() != 4 {
        return Err(Error::FrameSize(format!(
            "RST_STREAM payload must be 4 octets, got {}",
            raw.payload.len()
        )));
    }

    let code =
        u32::from_be_bytes([raw.payload[0], raw.payload[1], raw.payload[2], raw.payload[3]]);
    Ok(RstStreamPayload {
        error_code: ErrorCodeInfo::new(code),
    })
}

fn analyze_ping(raw: &RawFrame) -> Result<PingPayload> {
    match raw.payload.len() {
        0 => Ok(PingPayload { opaque_data: None }),
        8 => Ok(PingPayload {
            opaque_data: Some(HexBytes(raw.payload.to_vec())),
        }),
        n => Err(Error::FrameSize(format!(
            "PING payload must be 8 octets, got {}",
            n
        ))),
    }
}

fn analyze_goaway(raw: &RawFrame) -> Result<GoAwayPayload> {
    if raw.payload.len() < 8 {
        return Err(Error::FrameSize(format!(
            "GOAWAY payload must be at least 8 octets, got {}",
            raw.payload.len()
        )));
    }

    let last =
        u32::from_be_bytes([raw.payload[0], raw.payload[1], raw.payload[2], raw.payload[3]])
            & 0x7FFF_FFFF;
    let code =
        u32::from_be_bytes([raw.payload[4], raw.payload[5], raw.payload[6], raw.payload[7]]);
    let debug = &raw.payload[8..];

    Ok(GoAwayPayload {
        last_stream_id: last,
        error_code: ErrorCodeInfo::new(code),
        additional_debug_data: if debug.is_empty() {
            None
        } else {
            Some(HexBytes(debug.to_vec()))
        },
    })
}
