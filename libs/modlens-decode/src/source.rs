//! Frame sources: anything that turns captured bytes into MBAP frames
//!
//! Sources yield [`SourceEvent`]s in arrival order. Bytes that can never form
//! a complete frame are surfaced as `Dropped` events rather than errors so the
//! session records a diagnostic and carries on.
//!
//! - [`StreamFrameSource`]: live or file-backed byte streams (`AsyncRead`)
//! - [`crate::pcap::PcapFrameSource`]: capture files, reassembled per TCP flow

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::codec::MbapCodec;
use crate::error::SourceError;
use crate::frame::RawFrame;
use crate::state::ParserState;

/// Item produced by a frame source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    /// A complete MBAP-delimited frame
    Frame(RawFrame),
    /// Bytes discarded because they cannot complete a frame
    Dropped {
        bytes: Bytes,
        reason: String,
        timestamp: Option<DateTime<Utc>>,
    },
}

impl SourceEvent {
    /// Set the timestamp unless the event already carries one
    pub fn stamped(self, at: DateTime<Utc>) -> Self {
        match self {
            Self::Frame(frame) if frame.timestamp().is_none() => {
                Self::Frame(frame.with_timestamp(at))
            },
            Self::Dropped {
                bytes,
                reason,
                timestamp: None,
            } => Self::Dropped {
                bytes,
                reason,
                timestamp: Some(at),
            },
            other => other,
        }
    }
}

/// Feed every event of a batch source into `state`.
///
/// Stops at the first source error; events already ingested stay recorded.
pub fn run_batch<I>(events: I, state: &mut ParserState) -> Result<u64, SourceError>
where
    I: IntoIterator<Item = Result<SourceEvent, SourceError>>,
{
    let mut count = 0u64;
    for event in events {
        state.ingest(event?);
        count += 1;
    }
    Ok(count)
}

// ============================================================================
// Streaming source
// ============================================================================

/// MBAP frames read from an async byte stream
pub struct StreamFrameSource<R> {
    framed: FramedRead<R, MbapCodec>,
    receive_timestamps: bool,
}

impl<R: AsyncRead + Unpin> StreamFrameSource<R> {
    pub fn new(reader: R) -> Self {
        Self::with_codec(reader, MbapCodec::new())
    }

    pub fn with_codec(reader: R, codec: MbapCodec) -> Self {
        Self {
            framed: FramedRead::new(reader, codec),
            receive_timestamps: false,
        }
    }

    /// Stamp each event with the wall-clock time it was delimited
    pub fn with_receive_timestamps(mut self) -> Self {
        self.receive_timestamps = true;
        self
    }

    /// Next event, or `None` once the stream is exhausted.
    ///
    /// Cancel-safe: buffered bytes of an unfinished frame stay in the source.
    pub async fn next_event(&mut self) -> Option<Result<SourceEvent, SourceError>> {
        let item = self.framed.next().await?;
        if self.receive_timestamps {
            Some(item.map(|event| event.stamped(Utc::now())))
        } else {
            Some(item)
        }
    }

    /// Bytes received but not yet delimited into a frame
    pub fn buffered(&self) -> usize {
        self.framed.read_buffer().len()
    }
}

/// How a [`run_stream`] call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSummary {
    /// Events ingested (frames and drops)
    pub events: u64,
    /// True when stopped by the cancellation token rather than EOF
    pub cancelled: bool,
}

/// Drive `source` into `state` until EOF or `cancel` fires.
///
/// On cancellation any partially buffered frame is discarded; recorded
/// transactions are untouched. A stream that ends without producing a single
/// event fails with [`SourceError::ClosedBeforeData`].
pub async fn run_stream<R>(
    source: &mut StreamFrameSource<R>,
    state: &mut ParserState,
    cancel: CancellationToken,
) -> Result<StreamSummary, SourceError>
where
    R: AsyncRead + Unpin,
{
    let mut summary = StreamSummary {
        events: 0,
        cancelled: false,
    };

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                info!(
                    "Stream cancelled: {} events, {}B unfinished frame discarded",
                    summary.events,
                    source.buffered()
                );
                summary.cancelled = true;
                break;
            }

            event = source.next_event() => {
                match event {
                    Some(Ok(event)) => {
                        state.ingest(event);
                        summary.events += 1;
                    },
                    Some(Err(e)) => return Err(e),
                    None => {
                        debug!("Stream EOF after {} events", summary.events);
                        break;
                    },
                }
            }
        }
    }

    if summary.events == 0 && !summary.cancelled {
        return Err(SourceError::ClosedBeforeData);
    }
    Ok(summary)
}
