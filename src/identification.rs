use crate::asset_store::{AssetKey, AssetStore, Discovery, IpPort, UNKNOWN};
use crate::error::MuninnNetError;
use crate::output::{OutputSink, OutputSinks, ReportRecord};
use crate::process::PacketEvent;
use crate::signature_matcher::SignatureSet;
use crate::vendor::{NoVendors, VendorLookup};
use std::net::Ipv4Addr;
use tracing::{debug, info};

/// What the engine did with one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Nothing to do: not tracked, already finalized, or not interesting
    Ignored,
    /// A TCP service started being tracked
    NewAsset,
    /// A tracked TCP service answered again; sinks got a statistics notice
    KnownAsset,
    /// A payload was inspected; `finalized` when that used up the budget or matched
    Inspected { matched: bool, finalized: bool },
    /// A host answered a ping for the first time
    NewIcmpAsset,
    /// A new IP to MAC pairing was recorded
    NewArpAsset,
}

impl Disposition {
    /// The frame went through signature matching.
    pub fn was_inspected(&self) -> bool {
        matches!(self, Disposition::Inspected { .. })
    }
}

/// Per-asset identification state machine.
///
/// Owns the asset store, the signatures, the vendor table and the active
/// output sinks; every event is processed to completion before the next one.
pub struct Identifier {
    store: AssetStore,
    signatures: SignatureSet,
    vendors: Box<dyn VendorLookup>,
    sinks: OutputSinks,
}

impl Identifier {
    pub fn new(signatures: SignatureSet) -> Self {
        Self {
            store: AssetStore::new(),
            signatures,
            vendors: Box::new(NoVendors),
            sinks: OutputSinks::new(),
        }
    }

    pub fn with_vendors(mut self, vendors: Box<dyn VendorLookup>) -> Self {
        self.vendors = vendors;
        self
    }

    /// Activate an output sink and load whatever it restored into the store.
    pub fn add_sink(&mut self, sink: Box<dyn OutputSink>) -> Result<(), MuninnNetError> {
        let restored = self.sinks.activate(sink)?;
        let count = restored.len();
        for record in restored {
            self.restore(record);
        }
        if count > 0 {
            info!("Restored {} records from an earlier report", count);
        }
        Ok(())
    }

    fn restore(&mut self, record: ReportRecord) {
        match record {
            ReportRecord::Asset {
                key,
                service,
                application,
                discovered,
            } => {
                if !self.store.exists(&key) {
                    self.store.insert_asset(
                        key,
                        IpPort::new(Ipv4Addr::UNSPECIFIED, 0),
                        &service,
                        &application,
                        Discovery::Restored(discovered),
                    );
                }
            }
            ReportRecord::Arp {
                ip,
                mac,
                discovered,
            } => {
                if !self.store.exists_arp(ip, mac) {
                    self.store.insert_arp(
                        ip,
                        mac,
                        Discovery::Restored(discovered),
                        self.vendors.as_ref(),
                    );
                }
            }
        }
    }

    /// Apply one dissected event.
    pub fn handle_event(&mut self, event: &PacketEvent<'_>) -> Disposition {
        match event {
            PacketEvent::SynAck { server, client } => self.on_syn_ack(*server, *client),
            PacketEvent::Payload {
                server, payload, ..
            } => self.on_payload(AssetKey::tcp(server.ip, server.port), payload),
            PacketEvent::EchoReply { peer, client } => self.on_echo_reply(*peer, *client),
            PacketEvent::ArpReply { ip, mac } => {
                if self.store.exists_arp(*ip, *mac) {
                    return Disposition::Ignored;
                }
                self.store
                    .insert_arp(*ip, *mac, Discovery::Live, self.vendors.as_ref());
                if let Some(arp) = self.store.arp_asset(*ip, *mac) {
                    self.sinks.on_arp(arp);
                }
                Disposition::NewArpAsset
            }
            PacketEvent::Ignore => Disposition::Ignored,
        }
    }

    fn on_syn_ack(&mut self, server: IpPort, client: IpPort) -> Disposition {
        let key = AssetKey::tcp(server.ip, server.port);
        if let Some(asset) = self.store.asset(&key) {
            self.sinks.on_stat(asset);
            return Disposition::KnownAsset;
        }
        self.store
            .insert_asset(key, client, UNKNOWN, UNKNOWN, Discovery::Live);
        Disposition::NewAsset
    }

    fn on_payload(&mut self, key: AssetKey, payload: &[u8]) -> Disposition {
        let attempts = match self.store.attempts(&key) {
            Some(attempts) if attempts > 0 => attempts,
            _ => return Disposition::Ignored,
        };

        let mut remaining = attempts - 1;
        self.store.set_attempts(&key, remaining);
        self.store.append_payload(&key, payload);

        let matched = match self.signatures.identify(payload) {
            Some(identification) => {
                debug!(
                    "{}:{} identified as {} / {}",
                    key.ip, key.port, identification.service, identification.application
                );
                self.store.update_classification(
                    &key,
                    &identification.service,
                    &identification.application,
                );
                remaining = 0;
                self.store.set_attempts(&key, 0);
                true
            }
            None => false,
        };

        let finalized = remaining == 0;
        if finalized {
            if let Some(asset) = self.store.asset(&key) {
                self.sinks.on_asset(asset);
            }
        }
        Disposition::Inspected { matched, finalized }
    }

    fn on_echo_reply(&mut self, peer: Ipv4Addr, client: Ipv4Addr) -> Disposition {
        if self.store.exists_icmp(peer) {
            return Disposition::Ignored;
        }
        let key = AssetKey::icmp(peer);
        self.store.insert_asset(
            key,
            IpPort::new(client, 0),
            "ICMP",
            "ICMP",
            Discovery::Live,
        );
        if let Some(asset) = self.store.asset(&key) {
            self.sinks.on_asset(asset);
        }
        Disposition::NewIcmpAsset
    }

    pub fn store(&self) -> &AssetStore {
        &self.store
    }

    pub fn signatures(&self) -> &SignatureSet {
        &self.signatures
    }

    pub fn sinks(&self) -> &OutputSinks {
        &self.sinks
    }

    /// Shut every active sink down.
    pub fn shutdown(&mut self) {
        self.sinks.shutdown();
    }
}
