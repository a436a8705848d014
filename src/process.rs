use crate::asset_store::IpPort;
use crate::filter::MonitoredNetworks;
use crate::packet_parser::{parse_frame, LinkType, NetworkPacket};
use pnet::packet::arp::{ArpOperations, ArpPacket};
use pnet::packet::icmp::{IcmpPacket, IcmpTypes};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::tcp::{TcpFlags, TcpPacket};
use pnet::util::MacAddr;
use std::net::Ipv4Addr;
use std::time::Duration;
use tracing::trace;

const IPV4_MIN_HEADER_LEN: usize = 20;
const TCP_MIN_HEADER_LEN: usize = 20;
const ICMP_MIN_HEADER_LEN: usize = 8;
/// Ethernet/IPv4 ARP body: 8 fixed bytes plus two 6+4 address pairs
const ARP_IPV4_LEN: usize = 28;

const FLAGS_SYN_ACK: u8 = TcpFlags::SYN | TcpFlags::ACK;
const FLAGS_ACK: u8 = TcpFlags::ACK;
const FLAGS_ACK_PSH: u8 = TcpFlags::ACK | TcpFlags::PSH;

/// One captured frame as handed over by a packet source.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    /// Capture timestamp, relative to the Unix epoch
    pub timestamp: Duration,
    /// Length of the frame on the wire; `data` may be shorter when the capture was truncated
    pub wire_len: u32,
    pub data: &'a [u8],
    pub link: LinkType,
}

impl<'a> Frame<'a> {
    pub fn new(data: &'a [u8], link: LinkType) -> Self {
        Self {
            timestamp: Duration::ZERO,
            wire_len: data.len() as u32,
            data,
            link,
        }
    }
}

/// What a frame means to the identification engine.
///
/// TCP and ICMP events carry both endpoints: `server` (or `peer`) is the host
/// being fingerprinted, `client` is whoever talked to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketEvent<'a> {
    /// A server answered a connection attempt
    SynAck { server: IpPort, client: IpPort },
    /// ACK or ACK+PSH segment sent by `server`, with its TCP payload
    Payload {
        server: IpPort,
        client: IpPort,
        payload: &'a [u8],
    },
    /// ICMP echo reply sent by `peer` to `client`
    EchoReply { peer: Ipv4Addr, client: Ipv4Addr },
    /// ARP reply announcing `ip` at `mac`
    ArpReply { ip: Ipv4Addr, mac: MacAddr },
    Ignore,
}

/// Turn a captured frame into a [`PacketEvent`].
///
/// Truncated or malformed headers never fail; they produce `PacketEvent::Ignore`.
/// SYN-ACK and echo reply sources are checked against `networks` here, ARP
/// replies are not filtered.
pub fn dissect<'a>(frame: &Frame<'a>, networks: &MonitoredNetworks) -> PacketEvent<'a> {
    match parse_frame(frame.data, frame.link) {
        NetworkPacket::Ipv4(packet) => dissect_ipv4(packet, networks),
        NetworkPacket::Arp(packet) => dissect_arp(packet),
        NetworkPacket::None => PacketEvent::Ignore,
    }
}

fn dissect_ipv4<'a>(packet: &'a [u8], networks: &MonitoredNetworks) -> PacketEvent<'a> {
    if packet.len() < IPV4_MIN_HEADER_LEN {
        trace!("Truncated IPv4 header: {} bytes", packet.len());
        return PacketEvent::Ignore;
    }
    let Some(ipv4) = Ipv4Packet::new(packet) else {
        return PacketEvent::Ignore;
    };

    let header_len = usize::from(ipv4.get_header_length()) * 4;
    if header_len < IPV4_MIN_HEADER_LEN || header_len > packet.len() {
        trace!("Invalid IPv4 header length: {}", header_len);
        return PacketEvent::Ignore;
    }
    // Only the first fragment carries the transport header
    if ipv4.get_fragment_offset() != 0 {
        return PacketEvent::Ignore;
    }

    // Ethernet padding sits after total_length; a bogus total falls back to what was captured
    let total_len = usize::from(ipv4.get_total_length());
    let end = if total_len >= header_len {
        total_len.min(packet.len())
    } else {
        packet.len()
    };
    let transport = &packet[header_len..end];
    let source = ipv4.get_source();
    let destination = ipv4.get_destination();

    match ipv4.get_next_level_protocol() {
        IpNextHeaderProtocols::Tcp => dissect_tcp(transport, source, destination, networks),
        IpNextHeaderProtocols::Icmp => dissect_icmp(transport, source, destination, networks),
        _ => PacketEvent::Ignore,
    }
}

fn dissect_tcp<'a>(
    segment: &'a [u8],
    source: Ipv4Addr,
    destination: Ipv4Addr,
    networks: &MonitoredNetworks,
) -> PacketEvent<'a> {
    if segment.len() < TCP_MIN_HEADER_LEN {
        trace!("Truncated TCP header: {} bytes", segment.len());
        return PacketEvent::Ignore;
    }
    let Some(tcp) = TcpPacket::new(segment) else {
        return PacketEvent::Ignore;
    };
    let data_offset = usize::from(tcp.get_data_offset()) * 4;
    if data_offset < TCP_MIN_HEADER_LEN || data_offset > segment.len() {
        trace!("Invalid TCP data offset: {}", data_offset);
        return PacketEvent::Ignore;
    }

    let server = IpPort::new(source, tcp.get_source());
    let client = IpPort::new(destination, tcp.get_destination());

    match tcp.get_flags() {
        FLAGS_SYN_ACK => {
            if !networks.matches(server.ip) {
                return PacketEvent::Ignore;
            }
            // FTP data channels: the active-mode server side shows up on an ephemeral port
            if matches!(client.port, 20 | 21) && server.port > 1024 {
                return PacketEvent::Ignore;
            }
            PacketEvent::SynAck { server, client }
        }
        FLAGS_ACK | FLAGS_ACK_PSH => {
            let payload = &segment[data_offset..];
            if payload.is_empty() {
                return PacketEvent::Ignore;
            }
            PacketEvent::Payload {
                server,
                client,
                payload,
            }
        }
        _ => PacketEvent::Ignore,
    }
}

fn dissect_icmp<'a>(
    message: &'a [u8],
    source: Ipv4Addr,
    destination: Ipv4Addr,
    networks: &MonitoredNetworks,
) -> PacketEvent<'a> {
    if message.len() < ICMP_MIN_HEADER_LEN {
        return PacketEvent::Ignore;
    }
    if !networks.matches(source) {
        return PacketEvent::Ignore;
    }
    match IcmpPacket::new(message) {
        Some(icmp) if icmp.get_icmp_type() == IcmpTypes::EchoReply => PacketEvent::EchoReply {
            peer: source,
            client: destination,
        },
        _ => PacketEvent::Ignore,
    }
}

fn dissect_arp(packet: &[u8]) -> PacketEvent<'_> {
    if packet.len() < ARP_IPV4_LEN {
        trace!("Truncated ARP message: {} bytes", packet.len());
        return PacketEvent::Ignore;
    }
    let Some(arp) = ArpPacket::new(packet) else {
        return PacketEvent::Ignore;
    };
    // pnet reads fixed Ethernet/IPv4 offsets, so anything else would be misparsed
    if arp.get_hw_addr_len() != 6 || arp.get_proto_addr_len() != 4 {
        return PacketEvent::Ignore;
    }
    if arp.get_operation() != ArpOperations::Reply {
        return PacketEvent::Ignore;
    }
    PacketEvent::ArpReply {
        ip: arp.get_sender_proto_addr(),
        mac: arp.get_sender_hw_addr(),
    }
}
