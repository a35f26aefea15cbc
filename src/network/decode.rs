//! Wire-format decoding on top of pnet: one-line summaries, the top-level
//! protocol name, optional network-layer addresses, and the multi-line
//! per-frame detail view.

use std::fmt::Write as _;
use std::net::IpAddr;

use pnet::packet::{
    arp::{ArpOperation, ArpOperations, ArpPacket},
    ethernet::{EtherTypes, EthernetPacket},
    icmp::IcmpPacket,
    icmpv6::Icmpv6Packet,
    ip::{IpNextHeaderProtocol, IpNextHeaderProtocols},
    ipv4::Ipv4Packet,
    ipv6::Ipv6Packet,
    tcp::TcpPacket,
    udp::UdpPacket,
    Packet,
};

use crate::network::types::Frame;

/// Everything the rest of the crate needs from one header walk.
pub struct Decoded {
    pub summary: String,
    pub protocol: Option<&'static str>,
    pub source: Option<IpAddr>,
    pub destination: Option<IpAddr>,
}

impl Decoded {
    fn opaque(summary: String, protocol: Option<&'static str>) -> Self {
        Decoded {
            summary,
            protocol,
            source: None,
            destination: None,
        }
    }
}

pub fn decode(data: &[u8]) -> Decoded {
    let Some(ethernet) = EthernetPacket::new(data) else {
        return Decoded::opaque(format!("Unparsed frame, {} bytes", data.len()), None);
    };

    match ethernet.get_ethertype() {
        EtherTypes::Ipv4 => decode_ipv4(&ethernet),
        EtherTypes::Ipv6 => decode_ipv6(&ethernet),
        EtherTypes::Arp => decode_arp(&ethernet),
        other => Decoded::opaque(
            format!(
                "Ethernet 0x{:04x} {} > {}, {} bytes",
                other.0,
                ethernet.get_source(),
                ethernet.get_destination(),
                data.len()
            ),
            Some("Ethernet"),
        ),
    }
}

fn decode_ipv4(ethernet: &EthernetPacket) -> Decoded {
    let Some(ip) = Ipv4Packet::new(ethernet.payload()) else {
        return Decoded::opaque("Ethernet / IPv4, truncated header".to_string(), Some("IPv4"));
    };

    let src = ip.get_source();
    let dst = ip.get_destination();
    let summary = match ip.get_next_level_protocol() {
        IpNextHeaderProtocols::Tcp => match TcpPacket::new(ip.payload()) {
            Some(tcp) => format!(
                "Ethernet / IPv4 / TCP {}:{} > {}:{}",
                src,
                tcp.get_source(),
                dst,
                tcp.get_destination()
            ),
            None => format!("Ethernet / IPv4 / TCP {} > {}, truncated", src, dst),
        },
        IpNextHeaderProtocols::Udp => match UdpPacket::new(ip.payload()) {
            Some(udp) => format!(
                "Ethernet / IPv4 / UDP {}:{} > {}:{}",
                src,
                udp.get_source(),
                dst,
                udp.get_destination()
            ),
            None => format!("Ethernet / IPv4 / UDP {} > {}, truncated", src, dst),
        },
        IpNextHeaderProtocols::Icmp => match IcmpPacket::new(ip.payload()) {
            Some(icmp) => format!(
                "Ethernet / IPv4 / ICMP {} > {}, type {}",
                src,
                dst,
                icmp.get_icmp_type().0
            ),
            None => format!("Ethernet / IPv4 / ICMP {} > {}, truncated", src, dst),
        },
        other => format!("Ethernet / IPv4 proto {} {} > {}", other.0, src, dst),
    };

    Decoded {
        summary,
        protocol: Some("IPv4"),
        source: Some(IpAddr::V4(src)),
        destination: Some(IpAddr::V4(dst)),
    }
}

fn decode_ipv6(ethernet: &EthernetPacket) -> Decoded {
    let Some(ip) = Ipv6Packet::new(ethernet.payload()) else {
        return Decoded::opaque("Ethernet / IPv6, truncated header".to_string(), Some("IPv6"));
    };

    let src = ip.get_source();
    let dst = ip.get_destination();
    let summary = match ip.get_next_header() {
        IpNextHeaderProtocols::Tcp => match TcpPacket::new(ip.payload()) {
            Some(tcp) => format!(
                "Ethernet / IPv6 / TCP {}:{} > {}:{}",
                src,
                tcp.get_source(),
                dst,
                tcp.get_destination()
            ),
            None => format!("Ethernet / IPv6 / TCP {} > {}, truncated", src, dst),
        },
        IpNextHeaderProtocols::Udp => match UdpPacket::new(ip.payload()) {
            Some(udp) => format!(
                "Ethernet / IPv6 / UDP {}:{} > {}:{}",
                src,
                udp.get_source(),
                dst,
                udp.get_destination()
            ),
            None => format!("Ethernet / IPv6 / UDP {} > {}, truncated", src, dst),
        },
        IpNextHeaderProtocols::Icmpv6 => match Icmpv6Packet::new(ip.payload()) {
            Some(icmp) => format!(
                "Ethernet / IPv6 / ICMPv6 {} > {}, type {}",
                src,
                dst,
                icmp.get_icmpv6_type().0
            ),
            None => format!("Ethernet / IPv6 / ICMPv6 {} > {}, truncated", src, dst),
        },
        other => format!("Ethernet / IPv6 next header {} {} > {}", other.0, src, dst),
    };

    Decoded {
        summary,
        protocol: Some("IPv6"),
        source: Some(IpAddr::V6(src)),
        destination: Some(IpAddr::V6(dst)),
    }
}

fn decode_arp(ethernet: &EthernetPacket) -> Decoded {
    let summary = match ArpPacket::new(ethernet.payload()) {
        Some(arp) => format!(
            "Ethernet / ARP {} {} > {}",
            operation_name(arp.get_operation()),
            arp.get_sender_proto_addr(),
            arp.get_target_proto_addr()
        ),
        None => "Ethernet / ARP, truncated".to_string(),
    };
    Decoded::opaque(summary, Some("ARP"))
}

fn operation_name(operation: ArpOperation) -> &'static str {
    match operation {
        ArpOperations::Request => "request",
        ArpOperations::Reply => "reply",
        _ => "unknown operation",
    }
}

/// Multi-line description of a frame for the detail view: decoded layers
/// plus a hex dump of the leading bytes.
pub fn detail(frame: &Frame) -> String {
    let mut out = String::new();
    let origin = frame.interface.as_deref().unwrap_or("loaded from file");
    let _ = writeln!(out, "Interface: {}", origin);
    let _ = writeln!(
        out,
        "Captured:  {}",
        frame.timestamp.format("%Y-%m-%d %H:%M:%S%.6f UTC")
    );
    let _ = writeln!(
        out,
        "Length:    {} bytes on wire, {} captured",
        frame.wire_len,
        frame.data.len()
    );
    let _ = writeln!(out, "Summary:   {}", frame.summary);

    if let Some(ethernet) = EthernetPacket::new(&frame.data) {
        let _ = writeln!(
            out,
            "Ethernet:  {} > {}, ethertype 0x{:04x}",
            ethernet.get_source(),
            ethernet.get_destination(),
            ethernet.get_ethertype().0
        );
        match ethernet.get_ethertype() {
            EtherTypes::Ipv4 => {
                if let Some(ip) = Ipv4Packet::new(ethernet.payload()) {
                    let _ = writeln!(
                        out,
                        "IPv4:      {} > {}, ttl {}, protocol {}",
                        ip.get_source(),
                        ip.get_destination(),
                        ip.get_ttl(),
                        ip.get_next_level_protocol().0
                    );
                    detail_transport(&mut out, ip.get_next_level_protocol(), ip.payload());
                }
            }
            EtherTypes::Ipv6 => {
                if let Some(ip) = Ipv6Packet::new(ethernet.payload()) {
                    let _ = writeln!(
                        out,
                        "IPv6:      {} > {}, hop limit {}, next header {}",
                        ip.get_source(),
                        ip.get_destination(),
                        ip.get_hop_limit(),
                        ip.get_next_header().0
                    );
                    detail_transport(&mut out, ip.get_next_header(), ip.payload());
                }
            }
            EtherTypes::Arp => {
                if let Some(arp) = ArpPacket::new(ethernet.payload()) {
                    let _ = writeln!(
                        out,
                        "ARP:       {} {} > {}",
                        operation_name(arp.get_operation()),
                        arp.get_sender_proto_addr(),
                        arp.get_target_proto_addr()
                    );
                }
            }
            _ => {}
        }
    }

    let shown = frame.data.len().min(64);
    let _ = writeln!(out, "Data (first {} of {} bytes):", shown, frame.data.len());
    let _ = write!(out, "{}", hex_dump(&frame.data[..shown]));
    out
}

fn detail_transport(out: &mut String, protocol: IpNextHeaderProtocol, payload: &[u8]) {
    match protocol {
        IpNextHeaderProtocols::Tcp => {
            if let Some(tcp) = TcpPacket::new(payload) {
                let _ = writeln!(
                    out,
                    "TCP:       port {} > {}, seq {}, flags 0x{:02x}",
                    tcp.get_source(),
                    tcp.get_destination(),
                    tcp.get_sequence(),
                    tcp.get_flags()
                );
            }
        }
        IpNextHeaderProtocols::Udp => {
            if let Some(udp) = UdpPacket::new(payload) {
                let _ = writeln!(
                    out,
                    "UDP:       port {} > {}, length {}",
                    udp.get_source(),
                    udp.get_destination(),
                    udp.get_length()
                );
            }
        }
        _ => {}
    }
}

fn hex_dump(data: &[u8]) -> String {
    let mut out = String::new();
    for (offset, chunk) in data.chunks(16).enumerate() {
        let bytes: Vec<String> = chunk.iter().map(|b| format!("{:02x}", b)).collect();
        let _ = writeln!(out, "{:04x}   {}", offset * 16, bytes.join(" "));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::testutil::*;
    use chrono::Utc;

    #[test]
    fn tcp_frame_decodes_all_fields() {
        let data = ipv4_tcp_frame([10, 0, 0, 1], [10, 0, 0, 2], 443, 51000);
        let decoded = decode(&data);
        assert_eq!(decoded.protocol, Some("IPv4"));
        assert_eq!(decoded.source, Some("10.0.0.1".parse().unwrap()));
        assert_eq!(decoded.destination, Some("10.0.0.2".parse().unwrap()));
        assert!(decoded.summary.contains("TCP"));
        assert!(decoded.summary.contains("443"));
    }

    #[test]
    fn udp_frame_summary_names_udp() {
        let data = ipv4_udp_frame([192, 168, 1, 5], [192, 168, 1, 1], 5353, 5353);
        let decoded = decode(&data);
        assert_eq!(decoded.protocol, Some("IPv4"));
        assert!(decoded.summary.contains("UDP"));
        assert!(!decoded.summary.contains("TCP"));
    }

    #[test]
    fn arp_frame_has_no_address_fields() {
        let decoded = decode(&arp_request_frame([192, 168, 1, 10], [192, 168, 1, 1]));
        assert_eq!(decoded.protocol, Some("ARP"));
        assert!(decoded.source.is_none());
        assert!(decoded.destination.is_none());
        assert!(decoded.summary.contains("ARP"));
        assert!(decoded.summary.contains("192.168.1.1"));
    }

    #[test]
    fn runt_frame_decodes_to_nothing() {
        let decoded = decode(&runt_frame());
        assert_eq!(decoded.protocol, None);
        assert!(decoded.source.is_none());
        assert!(decoded.destination.is_none());
    }

    #[test]
    fn detail_includes_layer_lines_and_hex() {
        let frame = Frame::from_wire(
            Some("eth0".to_string()),
            ipv4_tcp_frame([10, 0, 0, 1], [10, 0, 0, 2], 80, 40000),
            0,
            Utc::now(),
        );
        let text = detail(&frame);
        assert!(text.contains("Interface: eth0"));
        assert!(text.contains("Ethernet:"));
        assert!(text.contains("IPv4:"));
        assert!(text.contains("TCP:"));
        assert!(text.contains("0000"));
    }

    #[test]
    fn detail_marks_file_loaded_frames() {
        let frame = Frame::from_wire(None, runt_frame(), 0, Utc::now());
        assert!(detail(&frame).contains("loaded from file"));
    }
}
