#![forbid(unsafe_code)]

pub mod asset_store;
pub mod banner_dump;
pub mod config;
pub mod display;
pub mod error;
pub mod filter;
pub mod identification;
pub mod output;
pub mod output_csv;
#[cfg(unix)]
pub mod output_fifo;
pub mod output_screen;
pub mod packet_parser;
pub mod process;
pub mod signature;
pub mod signature_matcher;
pub mod vendor;

// Re-exports
pub use asset_store::*;
pub use config::{Config, OutputSpec};
pub use error::*;
pub use filter::{MonitoredNetwork, MonitoredNetworks};
pub use identification::{Disposition, Identifier};
pub use output::{OutputSink, OutputSinks, ReportRecord};
pub use packet_parser::LinkType;
pub use process::{dissect, Frame, PacketEvent};
pub use signature::{Signature, TemplateToken, Title};
pub use signature_matcher::{Identification, LoadMode, SignatureSet};
pub use vendor::{NoVendors, VendorDb, VendorLookup};

use crate::banner_dump::BannerDump;
use pcap_file::pcap::PcapReader;
use pnet::datalink::{self, Channel, Config as ChannelConfig};
use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info, warn};

/// How long a live read may block before the cancellation flag is checked again.
pub const LIVE_READ_TIMEOUT: Duration = Duration::from_millis(250);

/// A frame copied out of a packet source.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub timestamp: Duration,
    pub wire_len: u32,
    pub data: Vec<u8>,
}

/// One read from a packet source.
#[derive(Debug)]
pub enum CaptureRead {
    Frame(CapturedFrame),
    /// The read timed out without a frame
    Idle,
}

/// Counters kept by the capture driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub frames: u64,
    pub ignored: u64,
    pub inspected: u64,
    pub read_errors: u64,
}

/// A passive asset detector.
///
/// Feeds captured frames through the dissector and the identification engine,
/// one frame at a time. Shutdown flushes the banner dump and closes every output
/// exactly once; it also runs when the value is dropped.
pub struct MuninnNet {
    identifier: Identifier,
    networks: MonitoredNetworks,
    dump_path: Option<PathBuf>,
    dump: Option<BannerDump>,
    stats: CaptureStats,
    shut_down: bool,
}

impl MuninnNet {
    /// Creates a detector around an identification engine.
    ///
    /// # Parameters
    /// - `identifier`: Engine holding signatures, vendors and active outputs
    /// - `networks`: Networks whose servers are tracked; empty tracks everything
    pub fn new(identifier: Identifier, networks: MonitoredNetworks) -> Self {
        Self {
            identifier,
            networks,
            dump_path: None,
            dump: None,
            stats: CaptureStats::default(),
            shut_down: false,
        }
    }

    /// Build everything a configuration describes.
    ///
    /// # Errors
    /// An unreadable signature file, a signature error in strict mode, or an
    /// output that cannot be opened.
    pub fn from_config(config: &Config) -> Result<Self, MuninnNetError> {
        let signatures = SignatureSet::load(&config.signature_file, config.signature_mode)?;
        if signatures.is_empty() {
            warn!(
                "No usable signatures in {}, services will stay unknown",
                config.signature_file.display()
            );
        }

        let vendors: Box<dyn VendorLookup> = match VendorDb::load(&config.vendor_file) {
            Ok(db) => Box::new(db),
            Err(e) => {
                warn!(
                    "Unable to load vendor file {}: {}",
                    config.vendor_file.display(),
                    e
                );
                Box::new(NoVendors)
            }
        };

        let mut identifier = Identifier::new(signatures).with_vendors(vendors);
        for sink in config.build_sinks()? {
            identifier.add_sink(sink)?;
        }

        info!(
            "Outputs: {}; monitored networks: {}",
            identifier.sinks().names().collect::<Vec<_>>().join(", "),
            config.networks
        );

        let mut muninn = Self::new(identifier, config.networks.clone());
        muninn.dump_path = config.dump_file.clone();
        Ok(muninn)
    }

    /// Write every inspected frame to a pcap file at `path`.
    pub fn with_banner_dump<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.dump_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    pub fn store(&self) -> &AssetStore {
        self.identifier.store()
    }

    pub fn stats(&self) -> CaptureStats {
        self.stats
    }

    /// Dissect and apply a single frame.
    pub fn process_frame(&mut self, frame: &Frame<'_>) -> Disposition {
        self.stats.frames += 1;
        let event = dissect(frame, &self.networks);
        let disposition = self.identifier.handle_event(&event);

        match disposition {
            Disposition::Ignored => self.stats.ignored += 1,
            Disposition::Inspected { .. } => {
                self.stats.inspected += 1;
                self.dump_frame(frame);
            }
            _ => {}
        }
        disposition
    }

    fn dump_frame(&mut self, frame: &Frame<'_>) {
        if self.dump.is_none() {
            let Some(path) = self.dump_path.take() else {
                return;
            };
            match BannerDump::create(&path, frame.link) {
                Ok(dump) => self.dump = Some(dump),
                Err(e) => {
                    error!("Banner dump disabled: {}", e);
                    return;
                }
            }
        }
        if let Some(dump) = self.dump.as_mut() {
            if dump.link() != frame.link {
                debug!("Not dumping {} frame into {} dump", frame.link, dump.link());
                return;
            }
            if let Err(e) = dump.write(frame) {
                warn!("{}", e);
            }
        }
    }

    fn process_with<F>(
        &mut self,
        link: LinkType,
        mut packet_fn: F,
        cancel_signal: Option<Arc<AtomicBool>>,
    ) -> Result<(), MuninnNetError>
    where
        F: FnMut() -> Option<Result<CaptureRead, MuninnNetError>>,
    {
        loop {
            if let Some(ref cancel) = cancel_signal {
                if cancel.load(Ordering::Relaxed) {
                    debug!("Cancellation signal received, stopping packet processing");
                    break;
                }
            }

            let Some(read) = packet_fn() else {
                debug!("Packet source exhausted");
                break;
            };

            match read {
                Ok(CaptureRead::Frame(captured)) => {
                    let frame = Frame {
                        timestamp: captured.timestamp,
                        wire_len: captured.wire_len,
                        data: &captured.data,
                        link,
                    };
                    self.process_frame(&frame);
                }
                Ok(CaptureRead::Idle) => {}
                Err(e) => {
                    self.stats.read_errors += 1;
                    error!("Failed to read packet: {}", e);
                }
            }
        }
        Ok(())
    }

    /// Capture from a live network interface until cancelled.
    ///
    /// # Parameters
    /// - `interface_name`: The name of the network interface to capture from.
    /// - `cancel_signal`: Optional flag; set it to stop after the current frame.
    pub fn analyze_network(
        &mut self,
        interface_name: &str,
        cancel_signal: Option<Arc<AtomicBool>>,
    ) -> Result<(), MuninnNetError> {
        let interfaces = datalink::interfaces();
        let interface = interfaces
            .into_iter()
            .find(|iface| iface.name == interface_name)
            .ok_or_else(|| {
                MuninnNetError::Capture(format!(
                    "Could not find network interface: {interface_name}"
                ))
            })?;

        info!("Capturing on interface {}", interface.name);

        let config = ChannelConfig {
            promiscuous: true,
            read_timeout: Some(LIVE_READ_TIMEOUT),
            ..ChannelConfig::default()
        };

        let (_tx, mut rx) = match datalink::channel(&interface, config) {
            Ok(Channel::Ethernet(tx, rx)) => (tx, rx),
            Ok(_) => {
                return Err(MuninnNetError::UnsupportedLinkType(
                    "non-Ethernet channel".to_string(),
                ))
            }
            Err(e) => {
                return Err(MuninnNetError::Capture(format!(
                    "Unable to create channel: {e}"
                )))
            }
        };

        self.process_with(
            LinkType::Ethernet,
            move || match rx.next() {
                Ok(packet) => Some(Ok(CaptureRead::Frame(CapturedFrame {
                    timestamp: SystemTime::now()
                        .duration_since(UNIX_EPOCH)
                        .unwrap_or_default(),
                    wire_len: packet.len() as u32,
                    data: packet.to_vec(),
                }))),
                Err(e) if e.kind() == ErrorKind::TimedOut => Some(Ok(CaptureRead::Idle)),
                Err(e) => Some(Err(MuninnNetError::Capture(format!(
                    "Error receiving packet: {e}"
                )))),
            },
            cancel_signal,
        )
    }

    /// Replay a pcap file.
    ///
    /// # Errors
    /// The file cannot be opened, is not a pcap file, or uses a link type other
    /// than Ethernet or Linux cooked capture.
    pub fn analyze_pcap<P: AsRef<Path>>(
        &mut self,
        pcap_path: P,
        cancel_signal: Option<Arc<AtomicBool>>,
    ) -> Result<(), MuninnNetError> {
        let pcap_path = pcap_path.as_ref();
        let file = File::open(pcap_path)?;
        let mut pcap_reader = PcapReader::new(file).map_err(|e| {
            MuninnNetError::Capture(format!("Failed to create PCAP reader: {e}"))
        })?;
        let link = LinkType::try_from(pcap_reader.header().datalink)?;

        info!("Reading {} ({})", pcap_path.display(), link);

        let mut failed = false;
        self.process_with(
            link,
            move || {
                // A broken record leaves the reader out of sync
                if failed {
                    return None;
                }
                match pcap_reader.next_packet() {
                    Some(Ok(packet)) => Some(Ok(CaptureRead::Frame(CapturedFrame {
                        timestamp: packet.timestamp,
                        wire_len: packet.orig_len,
                        data: packet.data.to_vec(),
                    }))),
                    Some(Err(e)) => {
                        failed = true;
                        Some(Err(MuninnNetError::Capture(format!(
                            "Error reading PCAP packet: {e}"
                        ))))
                    }
                    None => None,
                }
            },
            cancel_signal,
        )
    }

    /// Flush the banner dump and shut every output down.
    ///
    /// Only the first call has any effect.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        if let Some(dump) = self.dump.take() {
            let frames = dump.frames();
            match dump.finish() {
                Ok(()) => debug!("Banner dump closed after {} frames", frames),
                Err(e) => warn!("Failed to close banner dump: {}", e),
            }
        }
        self.identifier.shutdown();

        let store = self.identifier.store();
        info!(
            "Processed {} frames ({} ignored, {} inspected, {} read errors); {} assets, {} ARP assets",
            self.stats.frames,
            self.stats.ignored,
            self.stats.inspected,
            self.stats.read_errors,
            store.len(),
            store.arp_assets().len()
        );
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }
}

impl Drop for MuninnNet {
    fn drop(&mut self) {
        self.shutdown();
    }
}
