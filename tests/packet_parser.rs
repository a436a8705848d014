mod common;

use common::{arp_reply_frame, ethernet_frame, ipv4_packet, sll_frame, tcp_frame, ACK};
use muninn_net::packet_parser::{parse_frame, LinkType, NetworkPacket};
use pcap_file::DataLink;

#[test]
fn test_ethernet_ipv4() {
    let frame = tcp_frame([10, 0, 0, 1], 80, [10, 0, 0, 2], 40000, ACK, b"hello");

    match parse_frame(&frame, LinkType::Ethernet) {
        NetworkPacket::Ipv4(packet) => {
            assert_eq!(packet[0], 0x45);
            assert_eq!(packet.len(), frame.len() - 14);
        }
        other => panic!("Expected IPv4, got {other:?}"),
    }
}

#[test]
fn test_sll_ipv4() {
    let ip = ipv4_packet([10, 0, 0, 1], [10, 0, 0, 2], 6, &[0u8; 20]);
    let frame = sll_frame(0x0800, &ip);

    assert_eq!(parse_frame(&frame, LinkType::LinuxSll), NetworkPacket::Ipv4(&ip));
}

#[test]
fn test_ethernet_arp() {
    let frame = arp_reply_frame([192, 168, 1, 20], [0x00, 0x0c, 0x29, 0x01, 0x02, 0x03]);

    assert!(matches!(
        parse_frame(&frame, LinkType::Ethernet),
        NetworkPacket::Arp(packet) if packet.len() == 28
    ));
}

#[test]
fn test_other_ethertypes_are_ignored() {
    // IPv6 and VLAN-tagged frames
    for ethertype in [0x86dd, 0x8100, 0x88cc] {
        let frame = ethernet_frame(ethertype, &[0u8; 40]);
        assert_eq!(parse_frame(&frame, LinkType::Ethernet), NetworkPacket::None);
    }
}

#[test]
fn test_header_only_frame() {
    let frame = ethernet_frame(0x0800, &[]);
    assert_eq!(parse_frame(&frame, LinkType::Ethernet), NetworkPacket::Ipv4(&[]));
}

#[test]
fn test_link_type_from_datalink() {
    assert_eq!(
        LinkType::try_from(DataLink::LINUX_SLL).ok(),
        Some(LinkType::LinuxSll)
    );
    assert_eq!(LinkType::LinuxSll.datalink(), DataLink::LINUX_SLL);
    assert_eq!(LinkType::Ethernet.header_len(), 14);
    assert_eq!(LinkType::LinuxSll.header_len(), 16);
}
