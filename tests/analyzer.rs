//! Analyzer integration tests
//!
//! These drive a full FrameAnalyzer through a capture sink and verify:
//! - preface handling and frame sequencing
//! - flow-control window evolution across SETTINGS, DATA, WINDOW_UPDATE
//! - HPACK state continuity across HEADERS and CONTINUATION
//! - direction isolation

use h2lens::analyzer::record::{ConnectionContext, Event, EventKind, FramePayload};
use h2lens::analyzer::{FrameAnalyzer, CONNECTION_PREFACE};
use h2lens::output::{shared, CaptureSink};
use std::sync::{Arc, Mutex};

fn analyzer() -> (FrameAnalyzer, Arc<Mutex<Vec<Event>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = shared(CaptureSink::new(events.clone()));
    let peer = "127.0.0.1:50000".parse().unwrap();
    (
        FrameAnalyzer::new(ConnectionContext::new(peer), sink),
        events,
    )
}

fn frame_bytes(frame_type: u8, flags: u8, stream_id: u32, payload: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(9 + payload.len());
    let len = payload.len();
    bytes.push(((len >> 16) & 0xFF) as u8);
    bytes.push(((len >> 8) & 0xFF) as u8);
    bytes.push((len & 0xFF) as u8);
    bytes.push(frame_type);
    bytes.push(flags);
    bytes.extend_from_slice(&stream_id.to_be_bytes());
    bytes.extend_from_slice(payload);
    bytes
}

fn frames(events: &Arc<Mutex<Vec<Event>>>) -> Vec<Event> {
    events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| e.kind == EventKind::Frame)
        .cloned()
        .collect()
}

#[test]
fn bare_preface_then_empty_settings() {
    let (mut analyzer, events) = analyzer();

    let mut input = CONNECTION_PREFACE.to_vec();
    input.extend_from_slice(&frame_bytes(0x4, 0, 0, &[]));
    analyzer.on_bytes(&input, false);

    let frames = frames(&events);
    assert_eq!(frames.len(), 1);

    let frame = frames[0].frame.as_ref().unwrap();
    assert_eq!(frame.kind.name, "SETTINGS");
    assert_eq!(frame.length, 0);
    assert!(frame.flags.is_empty());
    assert!(!frames[0].remote);
    match frame.payload.as_ref().unwrap() {
        FramePayload::Settings(settings) => assert!(settings.parameters.0.is_empty()),
        other => panic!("expected SETTINGS payload, got {:?}", other),
    }
}

#[test]
fn settings_ack() {
    let (mut analyzer, events) = analyzer();

    analyzer.on_bytes(&frame_bytes(0x4, 0x1, 0, &[]), true);

    let frames = frames(&events);
    let frame = frames[0].frame.as_ref().unwrap();
    assert_eq!(frame.kind.name, "SETTINGS");
    assert_eq!(frame.flags.len(), 1);
    assert_eq!(frame.flags[0].name, "ACK");
    assert_eq!(frame.flags[0].id, 0x1);
    match frame.payload.as_ref().unwrap() {
        FramePayload::Settings(settings) => assert!(settings.parameters.0.is_empty()),
        other => panic!("expected SETTINGS payload, got {:?}", other),
    }
}

#[test]
fn data_debits_connection_and_stream_windows() {
    let (mut analyzer, events) = analyzer();

    analyzer.on_bytes(CONNECTION_PREFACE, false);
    analyzer.on_bytes(&frame_bytes(0x0, 0, 1, &[0u8; 100]), false);

    let frames = frames(&events);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].stream_id, 1);

    match frames[0].frame.as_ref().unwrap().payload.as_ref().unwrap() {
        FramePayload::Data(data) => {
            let connection = data.window_size.connection.unwrap();
            let stream = data.window_size.stream.unwrap();
            assert_eq!(connection.current, 65435);
            assert_eq!(connection.delta, -100);
            assert_eq!(stream.current, 65435);
            assert_eq!(stream.delta, -100);
        }
        other => panic!("expected DATA payload, got {:?}", other),
    }
}

#[test]
fn window_update_on_connection() {
    let (mut analyzer, events) = analyzer();

    analyzer.on_bytes(&frame_bytes(0x8, 0, 0, &1000u32.to_be_bytes()), true);

    let frames = frames(&events);
    match frames[0].frame.as_ref().unwrap().payload.as_ref().unwrap() {
        FramePayload::WindowUpdate(wu) => {
            assert_eq!(wu.window_size_increment, 1000);
            let connection = wu.window_size.connection.unwrap();
            assert_eq!(connection.current, 66535);
            assert_eq!(connection.delta, 1000);
            assert!(wu.window_size.stream.is_none());
        }
        other => panic!("expected WINDOW_UPDATE payload, got {:?}", other),
    }
}

#[test]
fn initial_window_size_seeds_stream_created_later() {
    let (mut analyzer, events) = analyzer();

    // The client announces INITIAL_WINDOW_SIZE=1000; DATA flowing from
    // the origin towards the client then consumes that budget.
    let mut input = CONNECTION_PREFACE.to_vec();
    input.extend_from_slice(&frame_bytes(
        0x4,
        0,
        0,
        &[0x00, 0x04, 0x00, 0x00, 0x03, 0xe8],
    ));
    analyzer.on_bytes(&input, false);
    analyzer.on_bytes(&frame_bytes(0x0, 0, 3, &[0u8; 200]), true);

    let frames = frames(&events);
    assert_eq!(frames.len(), 2);

    match frames[0].frame.as_ref().unwrap().payload.as_ref().unwrap() {
        FramePayload::Settings(settings) => {
            assert_eq!(settings.parameters.0.len(), 1);
            assert_eq!(settings.parameters.0[0].name, "INITIAL_WINDOW_SIZE");
            assert_eq!(settings.parameters.0[0].value, 1000);
        }
        other => panic!("expected SETTINGS payload, got {:?}", other),
    }

    match frames[1].frame.as_ref().unwrap().payload.as_ref().unwrap() {
        FramePayload::Data(data) => {
            let stream = data.window_size.stream.unwrap();
            assert_eq!(stream.current, 800);
            assert_eq!(stream.delta, -200);
        }
        other => panic!("expected DATA payload, got {:?}", other),
    }
}

#[test]
fn split_ping_emits_one_record() {
    let (mut analyzer, events) = analyzer();

    let ping = frame_bytes(0x6, 0, 0, &[1, 2, 3, 4, 5, 6, 7, 8]);
    analyzer.on_bytes(&ping[..9], true);
    assert!(frames(&events).is_empty());

    analyzer.on_bytes(&ping[9..], true);
    let frames = frames(&events);
    assert_eq!(frames.len(), 1);

    match frames[0].frame.as_ref().unwrap().payload.as_ref().unwrap() {
        FramePayload::Ping(ping) => {
            assert_eq!(
                ping.opaque_data.as_ref().unwrap().to_string(),
                "0102030405060708"
            );
        }
        other => panic!("expected PING payload, got {:?}", other),
    }
}

#[test]
fn headers_then_continuation_share_hpack_state() {
    let (mut analyzer, events) = analyzer();

    // Two fragments from one peer: the first inserts a custom header
    // into the dynamic table, the second references it by index. Only a
    // decoder that carried state across the frames can resolve it.
    let mut encoder = hpack::Encoder::new();
    let first = encoder.encode(vec![
        (&b":status"[..], &b"200"[..]),
        (&b"x-request-id"[..], &b"abc123"[..]),
    ]);
    let second = encoder.encode(vec![(&b"x-request-id"[..], &b"abc123"[..])]);

    analyzer.on_bytes(&frame_bytes(0x1, 0, 1, &first), true);
    analyzer.on_bytes(&frame_bytes(0x9, 0x4, 1, &second), true);

    let frames = frames(&events);
    assert_eq!(frames.len(), 2);

    match frames[0].frame.as_ref().unwrap().payload.as_ref().unwrap() {
        FramePayload::Headers(headers) => {
            assert_eq!(headers.header_fields.len(), 2);
            assert_eq!(headers.header_fields[1].name, "x-request-id");
        }
        other => panic!("expected HEADERS payload, got {:?}", other),
    }
    match frames[1].frame.as_ref().unwrap().payload.as_ref().unwrap() {
        FramePayload::Continuation(cont) => {
            assert_eq!(cont.header_fields.len(), 1);
            assert_eq!(cont.header_fields[0].name, "x-request-id");
            assert_eq!(cont.header_fields[0].value, "abc123");
        }
        other => panic!("expected CONTINUATION payload, got {:?}", other),
    }
}

#[test]
fn directions_have_independent_hpack_tables() {
    let (mut analyzer, events) = analyzer();

    // The origin fills its dynamic table; the client's decoder must not
    // see those entries. An indexed reference that only exists in the
    // origin's table fails to decode on the client direction, and the
    // record still comes out (with no fields) while the origin keeps
    // decoding fine.
    let mut encoder = hpack::Encoder::new();
    let insert = encoder.encode(vec![(&b"x-secret"[..], &b"origin-only"[..])]);
    let reference = encoder.encode(vec![(&b"x-secret"[..], &b"origin-only"[..])]);

    analyzer.on_bytes(&frame_bytes(0x1, 0x4, 1, &insert), true);

    analyzer.on_bytes(CONNECTION_PREFACE, false);
    analyzer.on_bytes(&frame_bytes(0x1, 0x4, 1, &reference), false);

    analyzer.on_bytes(&frame_bytes(0x9, 0x4, 1, &reference), true);

    let frames = frames(&events);
    assert_eq!(frames.len(), 3);

    match frames[1].frame.as_ref().unwrap().payload.as_ref().unwrap() {
        FramePayload::Headers(headers) => assert!(headers.header_fields.is_empty()),
        other => panic!("expected HEADERS payload, got {:?}", other),
    }
    match frames[2].frame.as_ref().unwrap().payload.as_ref().unwrap() {
        FramePayload::Continuation(cont) => {
            assert_eq!(cont.header_fields[0].value, "origin-only");
        }
        other => panic!("expected CONTINUATION payload, got {:?}", other),
    }
}

#[test]
fn directions_have_independent_flow_state() {
    let (mut analyzer, events) = analyzer();

    // Drain most of one direction's connection window; the other
    // direction still reports a full one.
    analyzer.on_bytes(CONNECTION_PREFACE, false);
    analyzer.on_bytes(&frame_bytes(0x0, 0, 1, &[0u8; 60000]), false);
    analyzer.on_bytes(&frame_bytes(0x0, 0, 2, &[0u8; 100]), true);

    let frames = frames(&events);
    match frames[0].frame.as_ref().unwrap().payload.as_ref().unwrap() {
        FramePayload::Data(data) => {
            assert_eq!(data.window_size.connection.unwrap().current, 5535);
        }
        other => panic!("expected DATA payload, got {:?}", other),
    }
    match frames[1].frame.as_ref().unwrap().payload.as_ref().unwrap() {
        FramePayload::Data(data) => {
            assert_eq!(data.window_size.connection.unwrap().current, 65435);
        }
        other => panic!("expected DATA payload, got {:?}", other),
    }
}

#[test]
fn window_clamps_at_zero() {
    let (mut analyzer, events) = analyzer();

    analyzer.on_bytes(CONNECTION_PREFACE, false);
    analyzer.on_bytes(&frame_bytes(0x0, 0, 1, &[0u8; 40000]), false);
    analyzer.on_bytes(&frame_bytes(0x0, 0, 1, &[0u8; 40000]), false);

    let frames = frames(&events);
    match frames[1].frame.as_ref().unwrap().payload.as_ref().unwrap() {
        FramePayload::Data(data) => {
            let connection = data.window_size.connection.unwrap();
            assert_eq!(connection.current, 0);
            // Only 25535 octets of credit were left to take
            assert_eq!(connection.delta, -25535);
        }
        other => panic!("expected DATA payload, got {:?}", other),
    }
}

#[test]
fn arbitrary_chunking_equals_single_chunk() {
    // The same byte stream, delivered whole or byte-by-byte, yields the
    // same record sequence.
    let mut stream = CONNECTION_PREFACE.to_vec();
    stream.extend_from_slice(&frame_bytes(0x4, 0, 0, &[0x00, 0x04, 0x00, 0x00, 0x10, 0x00]));
    stream.extend_from_slice(&frame_bytes(0x0, 0x1, 1, b"response body"));
    stream.extend_from_slice(&frame_bytes(0x8, 0, 1, &500u32.to_be_bytes()));

    let (mut whole, whole_events) = analyzer();
    whole.on_bytes(&stream, false);

    let (mut dribble, dribble_events) = analyzer();
    for byte in &stream {
        dribble.on_bytes(std::slice::from_ref(byte), false);
    }

    let whole_frames = frames(&whole_events);
    let dribble_frames = frames(&dribble_events);
    assert_eq!(whole_frames.len(), 3);
    assert_eq!(whole_frames.len(), dribble_frames.len());

    for (a, b) in whole_frames.iter().zip(dribble_frames.iter()) {
        let fa = a.frame.as_ref().unwrap();
        let fb = b.frame.as_ref().unwrap();
        assert_eq!(fa.kind.name, fb.kind.name);
        assert_eq!(fa.length, fb.length);
        assert_eq!(a.stream_id, b.stream_id);
    }
}
