/// Link-layer demultiplexing for captured frames
///
/// Two encapsulations are supported:
/// - Ethernet (live interfaces and most capture files)
/// - Linux cooked capture (SLL), used when capturing on non-Ethernet or "any" interfaces
///
/// Both carry an EtherType that selects the network-layer continuation. Only
/// IPv4 and ARP are of interest; every other payload type is ignored.
use crate::error::MuninnNetError;
use pcap_file::DataLink;
use pnet::packet::ethernet::{EtherType, EtherTypes, EthernetPacket};
use std::fmt;
use tracing::trace;

/// Ethernet header: [6B dst][6B src][2B ethertype]
pub const ETHERNET_HEADER_LEN: usize = 14;

/// SLL header: [2B packet type][2B ARPHRD][2B addr len][8B addr][2B protocol]
pub const SLL_HEADER_LEN: usize = 16;

/// Link-layer encapsulation of a captured frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    /// Standard Ethernet frame (14-byte header)
    Ethernet,
    /// Linux cooked capture (16-byte header)
    LinuxSll,
}

impl LinkType {
    /// Offset of the network-layer header
    pub fn header_len(&self) -> usize {
        match self {
            LinkType::Ethernet => ETHERNET_HEADER_LEN,
            LinkType::LinuxSll => SLL_HEADER_LEN,
        }
    }

    /// pcap datalink value used when writing frames back out
    pub fn datalink(&self) -> DataLink {
        match self {
            LinkType::Ethernet => DataLink::ETHERNET,
            LinkType::LinuxSll => DataLink::LINUX_SLL,
        }
    }
}

impl TryFrom<DataLink> for LinkType {
    type Error = MuninnNetError;

    fn try_from(datalink: DataLink) -> Result<Self, Self::Error> {
        match datalink {
            DataLink::ETHERNET => Ok(LinkType::Ethernet),
            DataLink::LINUX_SLL => Ok(LinkType::LinuxSll),
            other => Err(MuninnNetError::UnsupportedLinkType(format!("{other:?}"))),
        }
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkType::Ethernet => f.write_str("Ethernet"),
            LinkType::LinuxSll => f.write_str("Linux cooked (SLL)"),
        }
    }
}

/// Network-layer payload of a frame
#[derive(Debug, PartialEq, Eq)]
pub enum NetworkPacket<'a> {
    /// IPv4 header and everything after it
    Ipv4(&'a [u8]),
    /// ARP message
    Arp(&'a [u8]),
    /// Truncated frame or a payload type nobody here cares about
    None,
}

/// Strip the link-layer header of `frame` and classify what follows
///
/// # Arguments
/// * `frame` - Captured bytes, starting at the link-layer header
/// * `link` - Encapsulation announced by the capture source
///
/// # Returns
/// * `NetworkPacket` - IPv4 or ARP slice, or `None` when the frame is too short
///   or carries another protocol
pub fn parse_frame(frame: &[u8], link: LinkType) -> NetworkPacket<'_> {
    let Some(ethertype) = link_ethertype(frame, link) else {
        trace!("Frame shorter than the {} header", link);
        return NetworkPacket::None;
    };

    let payload = &frame[link.header_len()..];
    match ethertype {
        EtherTypes::Ipv4 => NetworkPacket::Ipv4(payload),
        EtherTypes::Arp => NetworkPacket::Arp(payload),
        _ => NetworkPacket::None,
    }
}

fn link_ethertype(frame: &[u8], link: LinkType) -> Option<EtherType> {
    match link {
        LinkType::Ethernet => {
            if frame.len() < ETHERNET_HEADER_LEN {
                return None;
            }
            EthernetPacket::new(frame).map(|ethernet| ethernet.get_ethertype())
        }
        LinkType::LinuxSll => {
            if frame.len() < SLL_HEADER_LEN {
                return None;
            }
            Some(EtherType::new(u16::from_be_bytes([frame[14], frame[15]])))
        }
    }
}
