use std::net::IpAddr;

use crate::network::types::Frame;

/// Selects frames matching every present criterion; absent criteria match
/// everything. Pure function over a store snapshot, preserving order.
///
/// The protocol filter is a case-insensitive substring match against the
/// frame summary; the address filters are exact matches against the
/// decoded network-layer addresses. A frame without a decoded address
/// never matches a present address filter.
pub fn apply_filters(
    frames: &[Frame],
    protocol: Option<&str>,
    source: Option<&str>,
    destination: Option<&str>,
) -> Vec<Frame> {
    frames
        .iter()
        .filter(|frame| matches_protocol(frame, protocol))
        .filter(|frame| matches_address(frame.source, source))
        .filter(|frame| matches_address(frame.destination, destination))
        .cloned()
        .collect()
}

fn matches_protocol(frame: &Frame, protocol: Option<&str>) -> bool {
    match protocol {
        Some(protocol) => frame
            .summary
            .to_uppercase()
            .contains(&protocol.to_uppercase()),
        None => true,
    }
}

fn matches_address(address: Option<IpAddr>, wanted: Option<&str>) -> bool {
    match wanted {
        Some(wanted) => address.map_or(false, |address| address.to_string() == wanted),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::testutil::*;
    use chrono::Utc;

    fn frames() -> Vec<Frame> {
        vec![
            Frame::from_wire(
                Some("eth0".to_string()),
                ipv4_tcp_frame([10, 0, 0, 1], [10, 0, 0, 2], 443, 51000),
                0,
                Utc::now(),
            ),
            Frame::from_wire(
                Some("wlan0".to_string()),
                ipv4_udp_frame([192, 168, 1, 5], [192, 168, 1, 1], 5353, 5353),
                0,
                Utc::now(),
            ),
            Frame::from_wire(None, runt_frame(), 0, Utc::now()),
        ]
    }

    #[test]
    fn no_filters_returns_everything_in_order() {
        let frames = frames();
        let selected = apply_filters(&frames, None, None, None);
        assert_eq!(selected.len(), frames.len());
        for (kept, original) in selected.iter().zip(&frames) {
            assert_eq!(kept.summary, original.summary);
        }
    }

    #[test]
    fn protocol_filter_is_case_insensitive() {
        let frames = frames();
        let lower = apply_filters(&frames, Some("tcp"), None, None);
        let upper = apply_filters(&frames, Some("TCP"), None, None);
        assert_eq!(lower.len(), 1);
        assert_eq!(upper.len(), 1);
        assert!(lower[0].summary.contains("TCP"));
    }

    #[test]
    fn source_filter_matches_exactly() {
        let frames = frames();
        assert_eq!(
            apply_filters(&frames, None, Some("192.168.1.5"), None).len(),
            1
        );
        // prefixes are not matches
        assert!(apply_filters(&frames, None, Some("192.168.1"), None).is_empty());
    }

    #[test]
    fn destination_filter_matches_exactly() {
        let frames = frames();
        let selected = apply_filters(&frames, None, None, Some("10.0.0.2"));
        assert_eq!(selected.len(), 1);
        assert!(selected[0].summary.contains("TCP"));
    }

    #[test]
    fn frames_without_addresses_never_match_address_filters() {
        let frames = vec![Frame::from_wire(None, runt_frame(), 0, Utc::now())];
        assert!(apply_filters(&frames, None, Some("10.0.0.1"), None).is_empty());
        assert!(apply_filters(&frames, None, None, Some("10.0.0.1")).is_empty());
    }

    #[test]
    fn filters_combine_with_and() {
        let frames = frames();
        let selected = apply_filters(&frames, Some("IPv4"), Some("192.168.1.5"), None);
        assert_eq!(selected.len(), 1);
        assert!(selected[0].summary.contains("UDP"));

        // contradictory criteria select nothing
        assert!(apply_filters(&frames, Some("TCP"), Some("192.168.1.5"), None).is_empty());
    }
}
