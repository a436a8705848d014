#![allow(dead_code)]

use muninn_net::{ArpAsset, Asset, MuninnNetError, OutputSink, ReportRecord};
use std::cell::RefCell;
use std::rc::Rc;

pub const SYN: u8 = 0x02;
pub const SYN_ACK: u8 = 0x12;
pub const ACK: u8 = 0x10;
pub const ACK_PSH: u8 = 0x18;
pub const FIN_ACK: u8 = 0x11;

pub const CLIENT_MAC: [u8; 6] = [0x00, 0x11, 0x22, 0x33, 0x44, 0x55];
pub const SERVER_MAC: [u8; 6] = [0x00, 0x0c, 0x29, 0xaa, 0xbb, 0xcc];

/// IPv4 header (IHL=5, no options) followed by `payload`
pub fn ipv4_packet(src: [u8; 4], dst: [u8; 4], protocol: u8, payload: &[u8]) -> Vec<u8> {
    let total_len = (20 + payload.len()) as u16;
    let mut packet = vec![
        0x45, 0x00, // Version=4, IHL=5, TOS=0
        0x00, 0x00, // Total length, set below
        0x12, 0x34, // Identification
        0x40, 0x00, // Flags=DF, Fragment offset=0
        0x40, protocol, // TTL=64, Protocol
        0x00, 0x00, // Checksum (not verified)
    ];
    packet[2..4].copy_from_slice(&total_len.to_be_bytes());
    packet.extend_from_slice(&src);
    packet.extend_from_slice(&dst);
    packet.extend_from_slice(payload);
    packet
}

/// TCP header (data offset 5, no options) followed by `payload`
pub fn tcp_segment(src_port: u16, dst_port: u16, flags: u8, payload: &[u8]) -> Vec<u8> {
    let mut segment = Vec::with_capacity(20 + payload.len());
    segment.extend_from_slice(&src_port.to_be_bytes());
    segment.extend_from_slice(&dst_port.to_be_bytes());
    segment.extend_from_slice(&[0x00, 0x00, 0x00, 0x01]); // Sequence number
    segment.extend_from_slice(&[0x00, 0x00, 0x00, 0x01]); // Acknowledgment number
    segment.push(0x50); // Data offset=5
    segment.push(flags);
    segment.extend_from_slice(&[0xff, 0xff]); // Window
    segment.extend_from_slice(&[0x00, 0x00]); // Checksum
    segment.extend_from_slice(&[0x00, 0x00]); // Urgent pointer
    segment.extend_from_slice(payload);
    segment
}

pub fn ethernet_frame(ethertype: u16, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(14 + payload.len());
    frame.extend_from_slice(&CLIENT_MAC);
    frame.extend_from_slice(&SERVER_MAC);
    frame.extend_from_slice(&ethertype.to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// Linux cooked capture header followed by `payload`
pub fn sll_frame(ethertype: u16, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(16 + payload.len());
    frame.extend_from_slice(&[0x00, 0x00]); // Packet type: to us
    frame.extend_from_slice(&[0x00, 0x01]); // ARPHRD_ETHER
    frame.extend_from_slice(&[0x00, 0x06]); // Address length
    frame.extend_from_slice(&SERVER_MAC);
    frame.extend_from_slice(&[0x00, 0x00]); // Address padding
    frame.extend_from_slice(&ethertype.to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// Ethernet/IPv4/TCP frame from `src:src_port` to `dst:dst_port`
pub fn tcp_frame(
    src: [u8; 4],
    src_port: u16,
    dst: [u8; 4],
    dst_port: u16,
    flags: u8,
    payload: &[u8],
) -> Vec<u8> {
    let segment = tcp_segment(src_port, dst_port, flags, payload);
    ethernet_frame(0x0800, &ipv4_packet(src, dst, 6, &segment))
}

pub fn sll_tcp_frame(
    src: [u8; 4],
    src_port: u16,
    dst: [u8; 4],
    dst_port: u16,
    flags: u8,
    payload: &[u8],
) -> Vec<u8> {
    let segment = tcp_segment(src_port, dst_port, flags, payload);
    sll_frame(0x0800, &ipv4_packet(src, dst, 6, &segment))
}

/// ICMP message of `icmp_type` with an 8-byte header and no data
pub fn icmp_frame(src: [u8; 4], dst: [u8; 4], icmp_type: u8) -> Vec<u8> {
    let icmp = [icmp_type, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01];
    ethernet_frame(0x0800, &ipv4_packet(src, dst, 1, &icmp))
}

pub fn echo_reply_frame(src: [u8; 4], dst: [u8; 4]) -> Vec<u8> {
    icmp_frame(src, dst, 0)
}

/// Ethernet/IPv4 ARP message with operation `op` (1 request, 2 reply)
pub fn arp_frame(op: u16, sender_ip: [u8; 4], sender_mac: [u8; 6]) -> Vec<u8> {
    let mut arp = vec![
        0x00, 0x01, // Hardware type: Ethernet
        0x08, 0x00, // Protocol type: IPv4
        0x06, 0x04, // Hardware/protocol address lengths
    ];
    arp.extend_from_slice(&op.to_be_bytes());
    arp.extend_from_slice(&sender_mac);
    arp.extend_from_slice(&sender_ip);
    arp.extend_from_slice(&CLIENT_MAC);
    arp.extend_from_slice(&[192, 168, 1, 1]);
    ethernet_frame(0x0806, &arp)
}

pub fn arp_reply_frame(sender_ip: [u8; 4], sender_mac: [u8; 6]) -> Vec<u8> {
    arp_frame(2, sender_ip, sender_mac)
}

/// A notification seen by [`RecordingSink`]
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Asset(Asset),
    Arp(ArpAsset),
    Stat(Asset),
    Shutdown,
}

/// Output sink that records every notification for later inspection.
#[derive(Clone, Default)]
pub struct RecordingSink {
    pub notifications: Rc<RefCell<Vec<Notification>>>,
    pub restored: Vec<ReportRecord>,
    pub fail: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn with_restored(records: Vec<ReportRecord>) -> Self {
        Self {
            restored: records,
            ..Self::default()
        }
    }

    pub fn handle(&self) -> Rc<RefCell<Vec<Notification>>> {
        Rc::clone(&self.notifications)
    }

    fn record(&mut self, notification: Notification) -> Result<(), MuninnNetError> {
        if self.fail {
            return Err(MuninnNetError::Misconfiguration("sink failure".to_string()));
        }
        self.notifications.borrow_mut().push(notification);
        Ok(())
    }
}

impl OutputSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    fn init(&mut self) -> Result<(), MuninnNetError> {
        Ok(())
    }

    fn restore(&mut self) -> Result<Vec<ReportRecord>, MuninnNetError> {
        Ok(std::mem::take(&mut self.restored))
    }

    fn on_asset(&mut self, asset: &Asset) -> Result<(), MuninnNetError> {
        self.record(Notification::Asset(asset.clone()))
    }

    fn on_arp(&mut self, arp: &ArpAsset) -> Result<(), MuninnNetError> {
        self.record(Notification::Arp(arp.clone()))
    }

    fn on_stat(&mut self, asset: &Asset) -> Result<(), MuninnNetError> {
        self.record(Notification::Stat(asset.clone()))
    }

    fn shutdown(&mut self) -> Result<(), MuninnNetError> {
        self.notifications.borrow_mut().push(Notification::Shutdown);
        Ok(())
    }
}

/// Unique path in the system temp directory
pub fn temp_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("muninn-test-{}-{}", std::process::id(), name))
}
