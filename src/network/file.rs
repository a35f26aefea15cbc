//! Capture-file load and save. The on-disk format is the standard libpcap
//! one, read and written through the same `pcap` crate that drives live
//! capture, so files interoperate with external analyzers.

use std::fs::File;
use std::path::Path;

use chrono::{DateTime, Utc};
use pcap::{Capture, Linktype, Packet as PcapPacket, PacketHeader};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::network::stats::ProtocolStats;
use crate::network::store::FrameStore;
use crate::network::types::{timeval_to_datetime, Frame};

/// Replaces the store contents with the frames in `path` (tagged with no
/// interface) and recomputes the protocol tally. Returns the count loaded.
///
/// Partial loads succeed: reading stops at the first unparseable record,
/// and only a file yielding zero frames is an error. Missing or unreadable
/// paths are I/O errors; only content problems are format errors.
pub fn load(path: &Path, store: &FrameStore, stats: &ProtocolStats) -> Result<usize> {
    File::open(path)?;
    let mut reader = Capture::from_file(path).map_err(|e| Error::FileFormat(e.to_string()))?;

    store.clear();
    stats.clear();

    let mut loaded = 0usize;
    loop {
        match reader.next_packet() {
            Ok(packet) => {
                store.append(Frame::from_wire(
                    None,
                    packet.data.to_vec(),
                    packet.header.len,
                    timeval_to_datetime(&packet.header.ts),
                ));
                loaded += 1;
            }
            Err(pcap::Error::NoMorePackets) => break,
            Err(e) => {
                debug!("stopped reading {}: {}", path.display(), e);
                break;
            }
        }
    }

    if loaded == 0 {
        return Err(Error::FileFormat(format!(
            "no valid frames in {}",
            path.display()
        )));
    }
    stats.recompute(&store.snapshot());
    info!("loaded {} frames from {}", loaded, path.display());
    Ok(loaded)
}

/// Writes the store — or only the frames tagged with `interface` — to
/// `path`. Returns the count written.
pub fn save(path: &Path, store: &FrameStore, interface: Option<&str>) -> Result<usize> {
    let frames = store.snapshot();
    let selected: Vec<&Frame> = frames
        .iter()
        .filter(|frame| match interface {
            Some(name) => frame.interface.as_deref() == Some(name),
            None => true,
        })
        .collect();
    if selected.is_empty() {
        return Err(Error::NoData);
    }

    let dead = Capture::dead(Linktype::ETHERNET).map_err(|e| Error::Io(std::io::Error::other(e)))?;
    let mut savefile = dead
        .savefile(path)
        .map_err(|e| Error::Io(std::io::Error::other(e)))?;

    for frame in &selected {
        let header = PacketHeader {
            ts: datetime_to_timeval(frame.timestamp),
            caplen: frame.data.len() as u32,
            len: frame.wire_len,
        };
        savefile.write(&PcapPacket::new(&header, &frame.data));
    }
    savefile
        .flush()
        .map_err(|e| Error::Io(std::io::Error::other(e)))?;

    info!("wrote {} frames to {}", selected.len(), path.display());
    Ok(selected.len())
}

fn datetime_to_timeval(timestamp: DateTime<Utc>) -> libc::timeval {
    libc::timeval {
        tv_sec: timestamp.timestamp() as libc::time_t,
        tv_usec: timestamp.timestamp_subsec_micros() as libc::suseconds_t,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::testutil::*;
    use std::io::Write as _;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("nettrace-{}-{}", std::process::id(), name))
    }

    fn seeded_store() -> FrameStore {
        let store = FrameStore::new();
        store.append(Frame::from_wire(
            Some("eth0".to_string()),
            ipv4_tcp_frame([10, 0, 0, 1], [10, 0, 0, 2], 443, 51000),
            0,
            Utc::now(),
        ));
        store.append(Frame::from_wire(
            Some("wlan0".to_string()),
            ipv4_udp_frame([192, 168, 1, 5], [192, 168, 1, 1], 5353, 5353),
            0,
            Utc::now(),
        ));
        store.append(Frame::from_wire(
            Some("eth0".to_string()),
            arp_request_frame([10, 0, 0, 1], [10, 0, 0, 2]),
            0,
            Utc::now(),
        ));
        store
    }

    #[test]
    fn save_with_empty_store_fails_with_no_data() {
        let path = temp_path("empty.pcap");
        let result = save(&path, &FrameStore::new(), None);
        assert!(matches!(result, Err(Error::NoData)));
        assert!(!path.exists());
    }

    #[test]
    fn save_with_empty_interface_selection_fails_with_no_data() {
        let path = temp_path("no-selection.pcap");
        let result = save(&path, &seeded_store(), Some("tun9"));
        assert!(matches!(result, Err(Error::NoData)));
    }

    #[test]
    fn load_missing_path_is_an_io_error() {
        let store = FrameStore::new();
        let stats = ProtocolStats::new();
        let result = load(Path::new("/nonexistent/nettrace.pcap"), &store, &stats);
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn load_garbage_is_a_format_error() {
        let path = temp_path("garbage.pcap");
        std::fs::write(&path, b"this is not a capture file").unwrap();

        let store = FrameStore::new();
        let stats = ProtocolStats::new();
        let result = load(&path, &store, &stats);
        assert!(matches!(result, Err(Error::FileFormat(_))));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn load_header_only_file_is_a_format_error() {
        let path = temp_path("header-only.pcap");
        {
            // libpcap global header, little endian, no records
            let mut file = std::fs::File::create(&path).unwrap();
            file.write_all(&0xa1b2c3d4u32.to_le_bytes()).unwrap();
            file.write_all(&2u16.to_le_bytes()).unwrap();
            file.write_all(&4u16.to_le_bytes()).unwrap();
            file.write_all(&0u32.to_le_bytes()).unwrap();
            file.write_all(&0u32.to_le_bytes()).unwrap();
            file.write_all(&65535u32.to_le_bytes()).unwrap();
            file.write_all(&1u32.to_le_bytes()).unwrap();
        }

        let store = FrameStore::new();
        let stats = ProtocolStats::new();
        let result = load(&path, &store, &stats);
        assert!(matches!(result, Err(Error::FileFormat(_))));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn save_then_load_round_trips_every_byte() {
        let path = temp_path("roundtrip.pcap");
        let store = seeded_store();
        let originals = store.snapshot();

        let written = save(&path, &store, None).unwrap();
        assert_eq!(written, 3);

        store.clear();
        let stats = ProtocolStats::new();
        let loaded = load(&path, &store, &stats).unwrap();
        assert_eq!(loaded, 3);

        let reloaded = store.snapshot();
        for (reloaded, original) in reloaded.iter().zip(&originals) {
            assert_eq!(reloaded.data, original.data);
            assert!(reloaded.interface.is_none());
        }

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.get("IPv4"), Some(&2));
        assert_eq!(snapshot.get("ARP"), Some(&1));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn save_filtered_by_interface_keeps_only_that_slice() {
        let path = temp_path("filtered.pcap");
        let store = seeded_store();

        let written = save(&path, &store, Some("eth0")).unwrap();
        assert_eq!(written, 2);

        let reload = FrameStore::new();
        let stats = ProtocolStats::new();
        assert_eq!(load(&path, &reload, &stats).unwrap(), 2);

        std::fs::remove_file(&path).ok();
    }
}
