//! Parsing session state: transaction log, statistics and diagnostics
//!
//! One `ParserState` per capture stream. It is not shared: callers merging
//! several streams serialise appends themselves (mutex or single consumer).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use crate::error::{DecodeError, ErrorKind};
use crate::frame::RawFrame;
use crate::function_code::FunctionCode;
use crate::payload::DecodedPayload;
use crate::source::SourceEvent;
use crate::transaction::{decode_frame, Transaction};

/// Point-in-time copy of the running counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    pub transaction_count: u64,
    pub function_codes: BTreeMap<u8, u64>,
    pub unit_ids: BTreeSet<u8>,
    pub read_operations: u64,
    pub write_operations: u64,
}

/// Running counters updated on every recorded Transaction
#[derive(Debug, Default)]
pub struct StatisticsAggregator {
    current: Statistics,
}

impl StatisticsAggregator {
    pub fn observe(&mut self, tx: &Transaction) {
        let stats = &mut self.current;
        let fc: FunctionCode = tx.function_code();

        stats.transaction_count += 1;
        *stats.function_codes.entry(fc.code()).or_insert(0) += 1;
        stats.unit_ids.insert(tx.unit_id());

        if fc.is_read() {
            stats.read_operations += 1;
        } else if fc.is_write() {
            stats.write_operations += 1;
        }
    }

    pub fn snapshot(&self) -> Statistics {
        self.current.clone()
    }
}

/// Per-frame problem reported alongside normal output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// 0-based index of the frame among all frames offered to this session
    pub frame_index: u64,
    pub kind: ErrorKind,
    pub message: String,
    /// Set when the frame still produced a Transaction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
    pub raw_hex: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Outcome of offering one frame to the parser
#[derive(Debug)]
pub enum FrameOutcome<'a> {
    /// A Transaction was recorded (its payload may still be malformed)
    Recorded(&'a Transaction),
    /// No Transaction; a diagnostic was appended
    Rejected(DecodeError),
}

/// Transaction store, statistics and diagnostics of one parsing session
#[derive(Debug, Default)]
pub struct ParserState {
    transactions: Vec<Transaction>,
    diagnostics: Vec<Diagnostic>,
    stats: StatisticsAggregator,
    next_sequence: u64,
    frames_seen: u64,
}

impl ParserState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `frame` and record the result.
    ///
    /// Never fails: rejected frames and malformed payloads are noted as
    /// diagnostics and the session continues with the next frame.
    pub fn parse_frame(&mut self, frame: &RawFrame) -> FrameOutcome<'_> {
        let frame_index = self.frames_seen;
        self.frames_seen += 1;

        match decode_frame(frame, self.next_sequence) {
            Ok(tx) => {
                self.note_payload_problem(frame_index, &tx);
                FrameOutcome::Recorded(self.record(tx))
            },
            Err(e) => {
                warn!("Frame #{} rejected: {}", frame_index, e);
                self.push_diagnostic(Diagnostic {
                    frame_index,
                    kind: e.kind(),
                    message: e.to_string(),
                    sequence: None,
                    raw_hex: frame.to_hex(),
                    timestamp: frame.timestamp(),
                });
                FrameOutcome::Rejected(e)
            },
        }
    }

    /// Append a decoded Transaction and update statistics.
    ///
    /// The Transaction is renumbered with this session's next sequence value.
    pub fn record(&mut self, tx: Transaction) -> &Transaction {
        let tx = tx.with_sequence(self.next_sequence);
        self.next_sequence += 1;
        self.stats.observe(&tx);
        self.transactions.push(tx);
        &self.transactions[self.transactions.len() - 1]
    }

    /// Apply one frame-source event
    pub fn ingest(&mut self, event: SourceEvent) {
        match event {
            SourceEvent::Frame(frame) => {
                self.parse_frame(&frame);
            },
            SourceEvent::Dropped {
                bytes,
                reason,
                timestamp,
            } => self.record_dropped(&bytes, &reason, timestamp),
        }
    }

    /// Note bytes a frame source had to discard (counts as an offered frame)
    pub fn record_dropped(&mut self, bytes: &[u8], reason: &str, timestamp: Option<DateTime<Utc>>) {
        let frame_index = self.frames_seen;
        self.frames_seen += 1;
        warn!(
            "Frame #{} dropped ({} bytes): {}",
            frame_index,
            bytes.len(),
            reason
        );
        self.push_diagnostic(Diagnostic {
            frame_index,
            kind: ErrorKind::FrameTooShort,
            message: reason.to_string(),
            sequence: None,
            raw_hex: hex::encode(bytes),
            timestamp,
        });
    }

    pub fn push_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn statistics(&self) -> Statistics {
        self.stats.snapshot()
    }

    /// Frames offered so far, including rejected and dropped ones
    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    /// Consume the session, keeping the transaction log and diagnostics
    pub fn into_parts(self) -> (Vec<Transaction>, Vec<Diagnostic>, Statistics) {
        let stats = self.stats.snapshot();
        (self.transactions, self.diagnostics, stats)
    }

    fn note_payload_problem(&mut self, frame_index: u64, tx: &Transaction) {
        if !tx.is_complete() {
            let message = format!(
                "{}: frame ended after {} of {} declared payload bytes",
                ErrorKind::TruncatedPayload,
                tx.payload_len(),
                tx.header().declared_payload_len()
            );
            self.push_payload_diagnostic(frame_index, tx, ErrorKind::TruncatedPayload, message);
            return;
        }

        let message = match tx.payload() {
            DecodedPayload::Malformed { reason, .. } => format!(
                "{}: {} payload too short ({} bytes)",
                reason,
                tx.function_code(),
                tx.payload_len()
            ),
            DecodedPayload::DeviceIdentification {
                overrun: Some(overrun),
                objects,
                ..
            } => format!(
                "{} (decoded {} objects)",
                DecodeError::from(*overrun),
                objects.len()
            ),
            DecodedPayload::Unknown { .. } => {
                debug!(
                    "Frame #{}: {}",
                    frame_index,
                    DecodeError::UnsupportedFunctionCode(tx.function_code().code())
                );
                return;
            },
            _ => return,
        };

        let Some(kind) = tx.payload().problem() else {
            return;
        };
        self.push_payload_diagnostic(frame_index, tx, kind, message);
    }

    fn push_payload_diagnostic(
        &mut self,
        frame_index: u64,
        tx: &Transaction,
        kind: ErrorKind,
        message: String,
    ) {
        debug!("Frame #{} seq={}: {}", frame_index, tx.sequence(), message);
        self.push_diagnostic(Diagnostic {
            frame_index,
            kind,
            message,
            sequence: Some(tx.sequence()),
            raw_hex: tx.raw_hex().to_string(),
            timestamp: tx.timestamp(),
        });
    }
}
