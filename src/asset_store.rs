use crate::vendor::VendorLookup;
use pnet::util::MacAddr;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::SystemTime;
use tracing::{debug, warn};

/// Number of payload-bearing packets inspected per TCP asset before giving up.
pub const IDENTIFICATION_ATTEMPTS: u8 = 4;

/// Label used until a signature classifies an asset.
pub const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Tcp,
    Icmp,
}

impl Protocol {
    /// IANA protocol number
    pub fn number(&self) -> u8 {
        match self {
            Protocol::Tcp => 6,
            Protocol::Icmp => 1,
        }
    }

    pub fn from_number(number: u8) -> Option<Self> {
        match number {
            6 => Some(Protocol::Tcp),
            1 => Some(Protocol::Icmp),
            _ => None,
        }
    }
}

/// An IPv4 address and port pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IpPort {
    pub ip: Ipv4Addr,
    pub port: u16,
}

impl IpPort {
    pub fn new(ip: Ipv4Addr, port: u16) -> Self {
        Self { ip, port }
    }
}

/// Identity of a tracked asset. ICMP keys always use port 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AssetKey {
    pub ip: Ipv4Addr,
    pub port: u16,
    pub protocol: Protocol,
}

impl AssetKey {
    pub fn tcp(ip: Ipv4Addr, port: u16) -> Self {
        Self {
            ip,
            port,
            protocol: Protocol::Tcp,
        }
    }

    pub fn icmp(ip: Ipv4Addr) -> Self {
        Self {
            ip,
            port: 0,
            protocol: Protocol::Icmp,
        }
    }
}

/// Where a record comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discovery {
    /// Seen on the wire just now; TCP assets get a full attempts budget
    Live,
    /// Read back from a previous report; already finalized
    Restored(SystemTime),
}

impl Discovery {
    fn timestamp(&self) -> SystemTime {
        match self {
            Discovery::Live => SystemTime::now(),
            Discovery::Restored(at) => *at,
        }
    }
}

/// A tracked TCP or ICMP endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub key: AssetKey,
    /// Who connected to the asset when it was first seen
    pub client: IpPort,
    pub service: String,
    pub application: String,
    /// Inspected payload chunks, upper-case hex
    pub payload_hex: String,
    pub discovered: SystemTime,
    pub attempts: u8,
}

impl Asset {
    pub fn ip(&self) -> Ipv4Addr {
        self.key.ip
    }

    pub fn port(&self) -> u16 {
        self.key.port
    }

    pub fn protocol(&self) -> Protocol {
        self.key.protocol
    }

    pub fn is_finalized(&self) -> bool {
        self.attempts == 0
    }

    /// Neither service nor application has been classified.
    pub fn is_unknown(&self) -> bool {
        self.service == UNKNOWN && self.application == UNKNOWN
    }
}

/// An observed IP to MAC pairing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArpAsset {
    pub ip: Ipv4Addr,
    pub mac: MacAddr,
    pub vendor: Option<String>,
    pub discovered: SystemTime,
}

/// All assets known to the engine.
///
/// Records keep their insertion order for reporting and are indexed by key for
/// constant-time lookups. Nothing is ever removed before the store is dropped.
#[derive(Debug, Default)]
pub struct AssetStore {
    assets: Vec<Asset>,
    index: HashMap<AssetKey, usize>,
    arp_assets: Vec<ArpAsset>,
    arp_index: HashMap<(Ipv4Addr, MacAddr), usize>,
}

impl AssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exists(&self, key: &AssetKey) -> bool {
        self.index.contains_key(key)
    }

    pub fn exists_tcp(&self, ip: Ipv4Addr, port: u16) -> bool {
        self.exists(&AssetKey::tcp(ip, port))
    }

    pub fn exists_icmp(&self, ip: Ipv4Addr) -> bool {
        self.exists(&AssetKey::icmp(ip))
    }

    pub fn exists_arp(&self, ip: Ipv4Addr, mac: MacAddr) -> bool {
        self.arp_index.contains_key(&(ip, mac))
    }

    /// Track a new TCP or ICMP asset.
    ///
    /// Live TCP assets start with [`IDENTIFICATION_ATTEMPTS`]; ICMP and restored
    /// assets start finalized. For ICMP keys the port is forced to 0.
    ///
    /// # Returns
    /// `false` without touching the store when the key is already tracked.
    pub fn insert_asset(
        &mut self,
        key: AssetKey,
        client: IpPort,
        service: &str,
        application: &str,
        discovery: Discovery,
    ) -> bool {
        let key = match key.protocol {
            Protocol::Icmp => AssetKey::icmp(key.ip),
            Protocol::Tcp => key,
        };
        if self.exists(&key) {
            warn!("Asset {}:{} already tracked, insert ignored", key.ip, key.port);
            return false;
        }

        let attempts = match (key.protocol, discovery) {
            (Protocol::Icmp, _) | (_, Discovery::Restored(_)) => 0,
            (Protocol::Tcp, Discovery::Live) => IDENTIFICATION_ATTEMPTS,
        };

        debug!(
            "New asset {}:{} ({:?}), attempts {}",
            key.ip, key.port, key.protocol, attempts
        );
        self.index.insert(key, self.assets.len());
        self.assets.push(Asset {
            key,
            client,
            service: service.to_string(),
            application: application.to_string(),
            payload_hex: String::new(),
            discovered: discovery.timestamp(),
            attempts,
        });
        true
    }

    /// Record a new IP to MAC pairing, resolving the vendor from the MAC prefix.
    ///
    /// # Returns
    /// `false` when the pair is already known.
    pub fn insert_arp(
        &mut self,
        ip: Ipv4Addr,
        mac: MacAddr,
        discovery: Discovery,
        vendors: &dyn VendorLookup,
    ) -> bool {
        if self.exists_arp(ip, mac) {
            warn!("ARP pair {} / {} already tracked, insert ignored", ip, mac);
            return false;
        }
        self.arp_index.insert((ip, mac), self.arp_assets.len());
        self.arp_assets.push(ArpAsset {
            ip,
            mac,
            vendor: vendors.lookup(&mac).map(str::to_string),
            discovered: discovery.timestamp(),
        });
        true
    }

    pub fn asset(&self, key: &AssetKey) -> Option<&Asset> {
        self.index.get(key).map(|&i| &self.assets[i])
    }

    pub fn arp_asset(&self, ip: Ipv4Addr, mac: MacAddr) -> Option<&ArpAsset> {
        self.arp_index
            .get(&(ip, mac))
            .map(|&i| &self.arp_assets[i])
    }

    fn asset_mut(&mut self, key: &AssetKey) -> Option<&mut Asset> {
        match self.index.get(key) {
            Some(&i) => self.assets.get_mut(i),
            None => {
                warn!("Asset {}:{} is not tracked", key.ip, key.port);
                None
            }
        }
    }

    pub fn attempts(&self, key: &AssetKey) -> Option<u8> {
        self.asset(key).map(|asset| asset.attempts)
    }

    /// Set the remaining attempts of an asset.
    ///
    /// The budget never grows back: a value above the current one is refused.
    pub fn set_attempts(&mut self, key: &AssetKey, attempts: u8) -> bool {
        let Some(asset) = self.asset_mut(key) else {
            return false;
        };
        if attempts > asset.attempts {
            warn!(
                "Refusing to raise attempts of {}:{} from {} to {}",
                key.ip, key.port, asset.attempts, attempts
            );
            return false;
        }
        asset.attempts = attempts;
        true
    }

    /// Add a payload chunk, hex encoded, to the asset's buffer.
    ///
    /// The chunk inspected right after the first decrement starts a fresh buffer;
    /// later chunks extend it.
    pub fn append_payload(&mut self, key: &AssetKey, payload: &[u8]) -> bool {
        let Some(asset) = self.asset_mut(key) else {
            return false;
        };
        let encoded = hex::encode_upper(payload);
        if asset.attempts == IDENTIFICATION_ATTEMPTS - 1 {
            asset.payload_hex = encoded;
        } else {
            asset.payload_hex.push_str(&encoded);
        }
        true
    }

    pub fn update_classification(&mut self, key: &AssetKey, service: &str, application: &str) -> bool {
        let Some(asset) = self.asset_mut(key) else {
            return false;
        };
        asset.service = service.to_string();
        asset.application = application.to_string();
        true
    }

    /// Every tracked TCP/ICMP asset in discovery order
    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    /// Every ARP observation in discovery order
    pub fn arp_assets(&self) -> &[ArpAsset] {
        &self.arp_assets
    }

    /// Number of TCP and ICMP assets
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    /// No TCP or ICMP asset is tracked; ARP observations are not counted.
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}
