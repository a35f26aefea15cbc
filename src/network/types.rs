use std::net::IpAddr;

use chrono::{DateTime, Utc};

use crate::error::Error;
use crate::network::decode;

/// One captured or file-loaded packet plus its metadata. Immutable after
/// construction; the display fields are derived from the raw bytes once.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Interface the frame was captured on; `None` for file-loaded frames.
    pub interface: Option<String>,
    /// Raw link-layer bytes.
    pub data: Vec<u8>,
    /// Length on the wire (>= `data.len()` when truncated by the snap length).
    pub wire_len: u32,
    pub timestamp: DateTime<Utc>,
    /// One-line display summary.
    pub summary: String,
    /// Top-level protocol name; `None` when the frame is too short to carry
    /// an Ethernet header.
    pub protocol: Option<&'static str>,
    pub source: Option<IpAddr>,
    pub destination: Option<IpAddr>,
}

impl Frame {
    pub fn from_wire(
        interface: Option<String>,
        data: Vec<u8>,
        wire_len: u32,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let decoded = decode::decode(&data);
        Frame {
            interface,
            wire_len: wire_len.max(data.len() as u32),
            timestamp,
            summary: decoded.summary,
            protocol: decoded.protocol,
            source: decoded.source,
            destination: decoded.destination,
            data,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Entry on the delivery queue between capture tasks and a live consumer.
/// Errors stay tagged with the interface they came from.
#[derive(Debug)]
pub enum CaptureEvent {
    Frame { interface: String, frame: Frame },
    Error { interface: String, error: Error },
}

pub(crate) fn timeval_to_datetime(ts: &libc::timeval) -> DateTime<Utc> {
    DateTime::from_timestamp(ts.tv_sec as i64, (ts.tv_usec.max(0) as u32) * 1000)
        .unwrap_or_else(Utc::now)
}
