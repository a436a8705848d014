use crate::asset_store::{ArpAsset, Asset, IpPort, Protocol};
use pnet::util::MacAddr;
use std::fmt;
use std::fmt::Formatter;

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => f.write_str("TCP"),
            Protocol::Icmp => f.write_str("ICMP"),
        }
    }
}

impl fmt::Display for IpPort {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

/// MAC address as upper-case, colon separated hex.
pub struct UpperMac<'a>(pub &'a MacAddr);

impl fmt::Display for UpperMac<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let MacAddr(a, b, c, d, e, g) = *self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Port - {} / Host - {} / Service - {} / Application - {}",
            self.port(),
            self.ip(),
            self.service,
            self.application
        )
    }
}

impl fmt::Display for ArpAsset {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "IP Address - {} / MAC Address - {}", self.ip, UpperMac(&self.mac))?;
        if let Some(vendor) = &self.vendor {
            write!(f, " ({vendor})")?;
        }
        Ok(())
    }
}
