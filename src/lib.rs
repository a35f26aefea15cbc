//! Network diagnostics: concurrent packet capture sessions across multiple
//! interfaces, an indexed frame store with live protocol statistics, PCAP
//! load/save, frame filtering, and a lightweight traffic/latency monitor.

pub mod error;
pub mod monitor;
pub mod network;
pub mod utils;

pub use error::{Error, Result};
pub use network::session::{load_interfaces, CaptureSession};
pub use network::store::FrameStore;
pub use network::types::{CaptureEvent, Frame};
