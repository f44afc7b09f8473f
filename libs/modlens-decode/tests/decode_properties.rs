//! Decoder Property Tests
//!
//! End-to-end checks through the public API:
//! - Reference frames (read registers, coil write, malformed, device id)
//! - Rejection rules (short frames, foreign protocol ids)
//! - Statistics consistency over mixed traffic
//! - Decoding the same frame in fresh sessions

#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

use modlens_decode::{
    decode_frame, DecodedPayload, ErrorKind, FrameOutcome, FunctionCode, ParserState, RawFrame,
    ReadData, WriteValue,
};

fn frame(hex: &str) -> RawFrame {
    RawFrame::from_hex(hex).unwrap()
}

/// Build a frame around `pdu_payload` with a correct Length field
fn build(tid: u16, unit: u8, fc: u8, pdu_payload: &[u8]) -> RawFrame {
    let length = (pdu_payload.len() + 2) as u16;
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&tid.to_be_bytes());
    bytes.extend_from_slice(&[0x00, 0x00]);
    bytes.extend_from_slice(&length.to_be_bytes());
    bytes.push(unit);
    bytes.push(fc);
    bytes.extend_from_slice(pdu_payload);
    RawFrame::new(bytes)
}

// ============================================================================
// Reference frames
// ============================================================================

#[test]
fn test_read_holding_registers_response() {
    let mut state = ParserState::new();
    let FrameOutcome::Recorded(tx) = state.parse_frame(&frame("00 01 00 00 00 07 01 03 04 00 01 00 FF"))
    else {
        panic!("frame should decode");
    };

    let header = tx.header();
    assert_eq!(header.transaction_id, 1);
    assert_eq!(header.protocol_id, 0);
    assert_eq!(header.length, 7);
    assert_eq!(header.unit_id, 1);
    assert_eq!(header.function_code, 3);
    assert_eq!(
        tx.payload(),
        &DecodedPayload::ReadValues {
            byte_count: 4,
            data: ReadData::Registers(vec![1, 255]),
        }
    );
}

#[test]
fn test_write_single_coil_values() {
    let on = decode_frame(&build(1, 1, 5, &[0x00, 0x10, 0xFF, 0x00]), 0).unwrap();
    assert_eq!(
        on.payload(),
        &DecodedPayload::WriteSingle {
            address: 16,
            value: WriteValue::Coil(true),
        }
    );

    let off = decode_frame(&build(2, 1, 5, &[0x00, 0x10, 0x00, 0x00]), 0).unwrap();
    assert_eq!(
        off.payload(),
        &DecodedPayload::WriteSingle {
            address: 16,
            value: WriteValue::Coil(false),
        }
    );
}

#[test]
fn test_empty_read_payload_is_malformed_and_parsing_continues() {
    let mut state = ParserState::new();
    state.parse_frame(&build(1, 1, 3, &[]));
    state.parse_frame(&build(2, 1, 6, &[0x00, 0x01, 0x00, 0x2A]));

    let txs = state.transactions();
    assert_eq!(txs.len(), 2);
    assert_eq!(
        txs[0].payload(),
        &DecodedPayload::Malformed {
            reason: ErrorKind::TruncatedPayload,
            partial: Some(vec![]),
        }
    );
    assert_eq!(
        txs[1].payload(),
        &DecodedPayload::WriteSingle {
            address: 1,
            value: WriteValue::Register(42),
        }
    );
}

#[test]
fn test_device_identification_partial_objects() {
    let mut payload = vec![0x0E, 0x01, 0x01, 0x00, 0x00, 0x02];
    payload.extend_from_slice(&[0x00, 0x04]);
    payload.extend_from_slice(b"ACME");
    // Second object: header only, value missing
    payload.extend_from_slice(&[0x01, 0x08]);

    let mut state = ParserState::new();
    state.parse_frame(&build(9, 1, 43, &payload));

    let tx = &state.transactions()[0];
    let DecodedPayload::DeviceIdentification {
        objects, overrun, ..
    } = tx.payload()
    else {
        panic!("expected DeviceIdentification, got {:?}", tx.payload());
    };
    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0].value, "ACME");
    assert_eq!(overrun.map(|o| o.index), Some(1));
    assert_eq!(state.diagnostics()[0].kind, ErrorKind::ObjectOverrun);
}

// ============================================================================
// Rejection rules
// ============================================================================

#[test]
fn test_foreign_protocol_ids_never_recorded() {
    let mut state = ParserState::new();
    for protocol_id in [1u16, 2, 0x00FF, 0x1234, u16::MAX] {
        let mut bytes = build(1, 1, 3, &[0x02, 0x00, 0x01]).as_bytes().to_vec();
        bytes[2..4].copy_from_slice(&protocol_id.to_be_bytes());
        state.parse_frame(&RawFrame::new(bytes));
    }

    assert!(state.transactions().is_empty());
    assert_eq!(state.diagnostics().len(), 5);
    assert!(state
        .diagnostics()
        .iter()
        .all(|d| d.kind == ErrorKind::InvalidProtocolId && d.sequence.is_none()));
}

#[test]
fn test_short_frames_rejected() {
    let full = build(1, 1, 3, &[0x00]);
    let mut state = ParserState::new();
    for len in 0..8 {
        let truncated = RawFrame::new(full.as_bytes()[..len].to_vec());
        let outcome = state.parse_frame(&truncated);
        assert!(
            matches!(outcome, FrameOutcome::Rejected(ref e) if e.kind() == ErrorKind::FrameTooShort),
            "len {} not rejected",
            len
        );
    }
    assert!(state.transactions().is_empty());
}

// ============================================================================
// Statistics and invariants
// ============================================================================

fn mixed_traffic() -> Vec<RawFrame> {
    vec![
        build(1, 1, 1, &[0x01, 0x0F]),
        build(2, 1, 2, &[0x01, 0x00]),
        build(3, 2, 3, &[0x02, 0x12, 0x34]),
        build(4, 2, 4, &[0x00]),
        build(5, 3, 5, &[0x00, 0x01, 0xFF, 0x00]),
        build(6, 3, 6, &[0x00, 0x01, 0x00, 0x07]),
        build(7, 4, 15, &[0x00, 0x00, 0x00, 0x10]),
        build(8, 4, 16, &[0x00, 0x00, 0x00, 0x02]),
        build(9, 5, 43, &[0x0E, 0x01, 0x01, 0x00, 0x00, 0x00]),
        build(10, 5, 0x41, &[0xAA]),
        build(11, 5, 0x83, &[0x02]),
        build(12, 5, 3, &[]),
    ]
}

#[test]
fn test_statistics_consistency() {
    let mut state = ParserState::new();
    for f in mixed_traffic() {
        state.parse_frame(&f);
    }
    // One rejected frame must not move any counter
    state.parse_frame(&frame("0001 0007 0003 01 03 00"));

    let stats = state.statistics();
    assert_eq!(stats.transaction_count, 12);
    assert_eq!(stats.function_codes.values().sum::<u64>(), stats.transaction_count);
    assert!(stats.read_operations + stats.write_operations <= stats.transaction_count);
    assert_eq!(stats.read_operations, 5);
    assert_eq!(stats.write_operations, 4);
    assert_eq!(stats.unit_ids.len(), 5);
    assert_eq!(stats.function_codes.get(&3), Some(&2));
}

#[test]
fn test_length_matches_consumed_payload() {
    let mut state = ParserState::new();
    for f in mixed_traffic() {
        state.parse_frame(&f);
    }
    for tx in state.transactions() {
        assert_eq!(tx.header().length as usize, tx.payload_len() + 2);
    }
}

#[test]
fn test_sequence_follows_arrival_order() {
    let mut state = ParserState::new();
    // Wire transaction ids deliberately out of order
    for tid in [500u16, 3, 77, 3] {
        state.parse_frame(&build(tid, 1, 6, &[0x00, 0x00, 0x00, 0x01]));
    }
    let seqs: Vec<u64> = state.transactions().iter().map(|t| t.sequence()).collect();
    assert_eq!(seqs, vec![0, 1, 2, 3]);
}

#[test]
fn test_fresh_sessions_decode_identically() {
    let frames = mixed_traffic();
    let mut first = ParserState::new();
    let mut second = ParserState::new();

    // Offset the second session's counter so sequences differ
    second.parse_frame(&build(99, 9, 6, &[0x00, 0x00, 0x00, 0x00]));

    for f in &frames {
        first.parse_frame(f);
        second.parse_frame(f);
    }

    let a = first.transactions();
    let b = &second.transactions()[1..];
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(b) {
        assert_ne!(x.sequence(), y.sequence());
        assert_eq!(x, &y.clone().with_sequence(x.sequence()));
    }
}

#[test]
fn test_function_code_labels_in_output() {
    let mut state = ParserState::new();
    for f in mixed_traffic() {
        state.parse_frame(&f);
    }
    let json = serde_json::to_value(state.transactions()).unwrap();
    assert_eq!(json[0]["function_name"], "Read Coils");
    assert_eq!(json[8]["function_name"], "Read Device Identification");
    assert_eq!(json[9]["function_name"], "Unknown (65)");
    assert_eq!(FunctionCode::from(0x41).to_string(), "FC65 (Unknown (65))");
}
