//! Capture-file frame source
//!
//! Reads libpcap files, keeps TCP segments to or from the configured MODBUS
//! ports and reassembles each flow's byte stream into MBAP frames. A segment
//! may carry several frames and a frame may span several segments.
//!
//! TCP sequence numbers are not tracked: segments are appended in capture
//! order, so retransmitted or reordered segments corrupt that flow's framing.

use bytes::BytesMut;
use chrono::{DateTime, Utc};
use etherparse::{NetSlice, SlicedPacket, TransportSlice};
use pcap_file::pcap::PcapReader;
use pcap_file::DataLink;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::io::{BufReader, Read};
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;
use tokio_util::codec::Decoder;
use tracing::{debug, info, trace, warn};

use crate::codec::MbapCodec;
use crate::constants::{MAX_DECLARED_FRAME_LEN, MODBUS_TCP_PORT};
use crate::error::SourceError;
use crate::source::SourceEvent;

/// Which TCP traffic is treated as MODBUS/TCP
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureOptions {
    /// Matched against both source and destination port
    pub ports: Vec<u16>,
    pub max_frame_len: usize,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            ports: vec![MODBUS_TCP_PORT],
            max_frame_len: MAX_DECLARED_FRAME_LEN,
        }
    }
}

/// Counters logged when a capture is exhausted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CaptureStats {
    pub packets_read: u64,
    pub segments_matched: u64,
    pub non_tcp_skipped: u64,
    pub frames_emitted: u64,
    pub frames_dropped: u64,
}

/// Link layer framing of the packets in a capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkKind {
    Ethernet,
    Ip,
}

impl LinkKind {
    fn from_datalink(datalink: DataLink) -> Result<Self, SourceError> {
        match datalink {
            DataLink::ETHERNET => Ok(Self::Ethernet),
            DataLink::RAW | DataLink::IPV4 | DataLink::IPV6 => Ok(Self::Ip),
            other => Err(SourceError::UnsupportedLinkType(format!("{:?}", other))),
        }
    }

    fn slice(self, data: &[u8]) -> Option<SlicedPacket<'_>> {
        let sliced = match self {
            Self::Ethernet => SlicedPacket::from_ethernet(data),
            Self::Ip => SlicedPacket::from_ip(data),
        };
        match sliced {
            Ok(sliced) => Some(sliced),
            Err(e) => {
                trace!("Unparseable packet: {}", e);
                None
            },
        }
    }
}

// ============================================================================
// Per-flow reassembly
// ============================================================================

/// Direction-specific TCP flow identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlowKey {
    pub src: SocketAddr,
    pub dst: SocketAddr,
}

#[derive(Debug)]
struct FlowBuffer {
    buf: BytesMut,
    codec: MbapCodec,
    /// Arrival rank, keeps end-of-capture flushing in capture order
    first_seen: u64,
    last_timestamp: Option<DateTime<Utc>>,
}

/// Turns TCP payload segments into MBAP frames, one buffer per flow
#[derive(Debug)]
pub struct TcpReassembler {
    max_frame_len: usize,
    flows: HashMap<FlowKey, FlowBuffer>,
    flows_opened: u64,
}

impl TcpReassembler {
    pub fn new(max_frame_len: usize) -> Self {
        Self {
            max_frame_len,
            flows: HashMap::new(),
            flows_opened: 0,
        }
    }

    /// Append one segment's payload and collect every frame it completes
    pub fn push_segment(
        &mut self,
        flow: FlowKey,
        payload: &[u8],
        timestamp: Option<DateTime<Utc>>,
        out: &mut VecDeque<SourceEvent>,
    ) -> Result<(), SourceError> {
        let flows_opened = &mut self.flows_opened;
        let max_frame_len = self.max_frame_len;
        let entry = self.flows.entry(flow).or_insert_with(|| {
            *flows_opened += 1;
            debug!("New MODBUS flow {} -> {}", flow.src, flow.dst);
            FlowBuffer {
                buf: BytesMut::new(),
                codec: MbapCodec::with_max_frame_len(max_frame_len),
                first_seen: *flows_opened,
                last_timestamp: None,
            }
        });

        entry.buf.extend_from_slice(payload);
        entry.last_timestamp = timestamp;

        while let Some(event) = entry.codec.decode(&mut entry.buf)? {
            out.push_back(stamp(event, timestamp));
        }
        Ok(())
    }

    /// Flush every flow at end of capture; leftovers become `Dropped` events
    pub fn finish(&mut self, out: &mut VecDeque<SourceEvent>) -> Result<(), SourceError> {
        let mut flows: Vec<(FlowKey, FlowBuffer)> = self.flows.drain().collect();
        flows.sort_by_key(|(_, flow)| flow.first_seen);

        for (key, mut flow) in flows {
            while let Some(event) = flow.codec.decode_eof(&mut flow.buf)? {
                if matches!(event, SourceEvent::Dropped { .. }) {
                    warn!("Flow {} -> {} ended mid-frame", key.src, key.dst);
                }
                out.push_back(stamp(event, flow.last_timestamp));
            }
        }
        Ok(())
    }

    pub fn active_flows(&self) -> usize {
        self.flows.len()
    }
}

fn stamp(event: SourceEvent, timestamp: Option<DateTime<Utc>>) -> SourceEvent {
    match timestamp {
        Some(ts) => event.stamped(ts),
        None => event,
    }
}

fn capture_time(since_epoch: Duration) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(since_epoch.as_secs() as i64, since_epoch.subsec_nanos())
}

// ============================================================================
// Capture file source
// ============================================================================

/// MBAP frames reassembled from a pcap file, in capture order
pub struct PcapFrameSource<R: Read> {
    reader: PcapReader<R>,
    link: LinkKind,
    ports: Vec<u16>,
    reassembler: TcpReassembler,
    pending: VecDeque<SourceEvent>,
    stats: CaptureStats,
    finished: bool,
}

impl PcapFrameSource<BufReader<File>> {
    /// Open a capture file; a missing or unreadable file is fatal
    pub fn open(path: impl AsRef<Path>, options: &CaptureOptions) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        info!("Reading capture {}", path.display());
        Self::new(BufReader::new(file), options)
    }
}

impl<R: Read> PcapFrameSource<R> {
    pub fn new(reader: R, options: &CaptureOptions) -> Result<Self, SourceError> {
        let reader = PcapReader::new(reader)?;
        let link = LinkKind::from_datalink(reader.header().datalink)?;
        debug!("Capture link type: {:?}", reader.header().datalink);

        Ok(Self {
            reader,
            link,
            ports: options.ports.clone(),
            reassembler: TcpReassembler::new(options.max_frame_len),
            pending: VecDeque::new(),
            stats: CaptureStats::default(),
            finished: false,
        })
    }

    pub fn stats(&self) -> CaptureStats {
        self.stats
    }

    fn is_modbus_port(&self, port: u16) -> bool {
        self.ports.contains(&port)
    }

    fn handle_packet(
        &mut self,
        data: &[u8],
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<(), SourceError> {
        let Some(sliced) = self.link.slice(data) else {
            self.stats.non_tcp_skipped += 1;
            return Ok(());
        };

        let (src_ip, dst_ip): (IpAddr, IpAddr) = match &sliced.net {
            Some(NetSlice::Ipv4(ipv4)) => (
                ipv4.header().source_addr().into(),
                ipv4.header().destination_addr().into(),
            ),
            Some(NetSlice::Ipv6(ipv6)) => (
                ipv6.header().source_addr().into(),
                ipv6.header().destination_addr().into(),
            ),
            _ => {
                self.stats.non_tcp_skipped += 1;
                return Ok(());
            },
        };

        let Some(TransportSlice::Tcp(tcp)) = &sliced.transport else {
            self.stats.non_tcp_skipped += 1;
            return Ok(());
        };

        let (src_port, dst_port) = (tcp.source_port(), tcp.destination_port());
        let payload = tcp.payload();
        if payload.is_empty() || !(self.is_modbus_port(src_port) || self.is_modbus_port(dst_port))
        {
            return Ok(());
        }

        self.stats.segments_matched += 1;
        let flow = FlowKey {
            src: SocketAddr::new(src_ip, src_port),
            dst: SocketAddr::new(dst_ip, dst_port),
        };
        trace!("Segment {} -> {}: {}B", flow.src, flow.dst, payload.len());

        self.reassembler
            .push_segment(flow, payload, timestamp, &mut self.pending)
    }

    fn count(&mut self, event: &SourceEvent) {
        match event {
            SourceEvent::Frame(_) => self.stats.frames_emitted += 1,
            SourceEvent::Dropped { .. } => self.stats.frames_dropped += 1,
        }
    }
}

impl<R: Read> Iterator for PcapFrameSource<R> {
    type Item = Result<SourceEvent, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                self.count(&event);
                return Some(Ok(event));
            }
            if self.finished {
                return None;
            }

            let (data, timestamp) = match self.reader.next_packet() {
                Some(Ok(packet)) => (packet.data.into_owned(), capture_time(packet.timestamp)),
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(e.into()));
                },
                None => {
                    self.finished = true;
                    if let Err(e) = self.reassembler.finish(&mut self.pending) {
                        return Some(Err(e));
                    }
                    let pending = self
                        .pending
                        .iter()
                        .filter(|event| matches!(event, SourceEvent::Frame(_)))
                        .count() as u64;
                    info!(
                        "Capture done: packets_read={}, segments_matched={}, non_tcp_skipped={}, frames_emitted={}",
                        self.stats.packets_read,
                        self.stats.segments_matched,
                        self.stats.non_tcp_skipped,
                        self.stats.frames_emitted + pending
                    );
                    continue;
                },
            };

            self.stats.packets_read += 1;
            if let Err(e) = self.handle_packet(&data, timestamp) {
                self.finished = true;
                return Some(Err(e));
            }
        }
    }
}
