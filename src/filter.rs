use crate::error::MuninnNetError;
use pnet::ipnetwork::Ipv4Network;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// One monitored CIDR block.
///
/// The prefix length must be in `1..=32`; anything else is rejected when the
/// entry is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitoredNetwork {
    network: Ipv4Network,
}

impl MonitoredNetwork {
    /// Creates a monitored block from an address and a prefix length.
    ///
    /// Host bits in `address` are ignored; `10.0.0.7/24` monitors `10.0.0.0/24`.
    pub fn new(address: Ipv4Addr, prefix: u8) -> Result<Self, MuninnNetError> {
        if !(1..=32).contains(&prefix) {
            return Err(MuninnNetError::InvalidNetwork(format!(
                "{address}/{prefix}: prefix length must be between 1 and 32"
            )));
        }
        let network = Ipv4Network::new(address, prefix)
            .map_err(|e| MuninnNetError::InvalidNetwork(format!("{address}/{prefix}: {e}")))?;
        Ok(Self { network })
    }

    /// Network address with host bits cleared.
    pub fn network(&self) -> Ipv4Addr {
        self.network.network()
    }

    pub fn netmask(&self) -> Ipv4Addr {
        self.network.mask()
    }

    pub fn prefix(&self) -> u8 {
        self.network.prefix()
    }

    /// `(ip & netmask) == network`
    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        u32::from(ip) & u32::from(self.netmask()) == u32::from(self.network())
    }
}

impl fmt::Display for MonitoredNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network(), self.prefix())
    }
}

impl FromStr for MonitoredNetwork {
    type Err = MuninnNetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (address, prefix) = s.split_once('/').ok_or_else(|| {
            MuninnNetError::InvalidNetwork(format!("{s}: expected network/prefix-length"))
        })?;
        let address: Ipv4Addr = address
            .trim()
            .parse()
            .map_err(|e| MuninnNetError::InvalidNetwork(format!("{s}: {e}")))?;
        let prefix: u8 = prefix
            .trim()
            .parse()
            .map_err(|e| MuninnNetError::InvalidNetwork(format!("{s}: {e}")))?;
        Self::new(address, prefix)
    }
}

/// Ordered list of monitored networks.
///
/// An address passes when any entry contains it. An empty list passes every
/// address.
///
/// # Examples
///
/// ```rust
/// use muninn_net::MonitoredNetworks;
/// use std::net::Ipv4Addr;
///
/// let networks = MonitoredNetworks::new()
///     .allow("10.0.0.0/24")
///     .unwrap();
/// assert!(networks.matches(Ipv4Addr::new(10, 0, 0, 5)));
/// assert!(!networks.matches(Ipv4Addr::new(192, 168, 1, 5)));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MonitoredNetworks {
    networks: Vec<MonitoredNetwork>,
}

impl MonitoredNetworks {
    /// Create an empty list, which monitors everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a block in CIDR notation
    ///
    /// # Errors
    ///
    /// Returns an error if the CIDR notation is invalid or the prefix length
    /// is outside `1..=32`.
    pub fn allow(mut self, cidr: &str) -> Result<Self, MuninnNetError> {
        self.push(cidr.parse()?);
        Ok(self)
    }

    /// Parse a comma separated list such as `"192.168.0.0/24, 10.0.0.0/16"`.
    ///
    /// Empty items are skipped, so a trailing comma is accepted.
    pub fn parse_list(list: &str) -> Result<Self, MuninnNetError> {
        let mut networks = Self::new();
        networks.extend_from_list(list)?;
        Ok(networks)
    }

    /// Append every block of a comma separated list.
    pub fn extend_from_list(&mut self, list: &str) -> Result<(), MuninnNetError> {
        for item in list.split(',').map(str::trim).filter(|item| !item.is_empty()) {
            self.push(item.parse()?);
        }
        Ok(())
    }

    pub fn push(&mut self, network: MonitoredNetwork) {
        self.networks.push(network);
    }

    /// Check whether `ip` belongs to a monitored network
    ///
    /// # Returns
    ///
    /// `true` on the first entry with `(ip & netmask) == network`, or when
    /// no networks are configured at all.
    pub fn matches(&self, ip: Ipv4Addr) -> bool {
        self.networks.is_empty() || self.networks.iter().any(|net| net.contains(ip))
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.networks.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MonitoredNetwork> {
        self.networks.iter()
    }
}

impl fmt::Display for MonitoredNetworks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("any");
        }
        for (i, network) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{network}")?;
        }
        Ok(())
    }
}
