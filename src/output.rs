use crate::asset_store::{ArpAsset, Asset, AssetKey};
use crate::error::MuninnNetError;
use pnet::util::MacAddr;
use std::net::Ipv4Addr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

pub const DEFAULT_REPORT_FILE: &str = "assets.csv";
pub const DEFAULT_FIFO_FILE: &str = "muninn.fifo";

/// A record read back from a previous report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportRecord {
    Asset {
        key: AssetKey,
        service: String,
        application: String,
        discovered: SystemTime,
    },
    Arp {
        ip: Ipv4Addr,
        mac: MacAddr,
        discovered: SystemTime,
    },
}

/// Destination for discovery notifications.
///
/// All methods report failures instead of panicking; [`OutputSinks`] logs them
/// and carries on with the remaining sinks.
pub trait OutputSink {
    fn name(&self) -> &str;

    /// Open files or pipes. Called once, before any notification.
    fn init(&mut self) -> Result<(), MuninnNetError>;

    /// Records persisted by an earlier run, taken once right after `init`.
    fn restore(&mut self) -> Result<Vec<ReportRecord>, MuninnNetError> {
        Ok(Vec::new())
    }

    /// An asset was finalized.
    fn on_asset(&mut self, asset: &Asset) -> Result<(), MuninnNetError>;

    /// A new IP to MAC pairing was seen.
    fn on_arp(&mut self, arp: &ArpAsset) -> Result<(), MuninnNetError>;

    /// A known TCP service answered another connection.
    fn on_stat(&mut self, _asset: &Asset) -> Result<(), MuninnNetError> {
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), MuninnNetError>;
}

/// Active sinks, notified in activation order.
#[derive(Default)]
pub struct OutputSinks {
    sinks: Vec<Box<dyn OutputSink>>,
}

impl OutputSinks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialise `sink` and add it to the active list.
    ///
    /// # Returns
    /// The records the sink restored from an earlier run.
    ///
    /// # Errors
    /// A sink that fails to initialise is not activated.
    pub fn activate(
        &mut self,
        mut sink: Box<dyn OutputSink>,
    ) -> Result<Vec<ReportRecord>, MuninnNetError> {
        sink.init()?;
        let restored = sink.restore().unwrap_or_else(|e| {
            warn!("Output '{}' could not restore earlier records: {}", sink.name(), e);
            Vec::new()
        });
        debug!(
            "Output '{}' active, {} records restored",
            sink.name(),
            restored.len()
        );
        self.sinks.push(sink);
        Ok(restored)
    }

    pub fn on_asset(&mut self, asset: &Asset) {
        for sink in self.sinks.iter_mut() {
            if let Err(e) = sink.on_asset(asset) {
                warn!("Output '{}' failed to record asset: {}", sink.name(), e);
            }
        }
    }

    pub fn on_arp(&mut self, arp: &ArpAsset) {
        for sink in self.sinks.iter_mut() {
            if let Err(e) = sink.on_arp(arp) {
                warn!("Output '{}' failed to record ARP asset: {}", sink.name(), e);
            }
        }
    }

    pub fn on_stat(&mut self, asset: &Asset) {
        for sink in self.sinks.iter_mut() {
            if let Err(e) = sink.on_stat(asset) {
                warn!("Output '{}' failed to record statistics: {}", sink.name(), e);
            }
        }
    }

    /// Shut every sink down and deactivate it.
    pub fn shutdown(&mut self) {
        for mut sink in self.sinks.drain(..) {
            if let Err(e) = sink.shutdown() {
                warn!("Output '{}' failed to shut down: {}", sink.name(), e);
            }
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sinks.iter().map(|sink| sink.name())
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

/// Build a sink from its configured name (`screen`, `csv` or `fifo`).
///
/// `args` is the file the sink writes to; each sink has its own default.
pub fn create_sink(
    name: &str,
    args: Option<&str>,
    hide_unknowns: bool,
) -> Result<Box<dyn OutputSink>, MuninnNetError> {
    match name.to_ascii_lowercase().as_str() {
        "screen" => Ok(Box::new(crate::output_screen::ScreenOutput::new())),
        "csv" => Ok(Box::new(crate::output_csv::CsvOutput::new(
            args.unwrap_or(DEFAULT_REPORT_FILE),
            hide_unknowns,
        ))),
        #[cfg(unix)]
        "fifo" => Ok(Box::new(crate::output_fifo::FifoOutput::new(
            args.unwrap_or(DEFAULT_FIFO_FILE),
            hide_unknowns,
        ))),
        other => Err(MuninnNetError::Misconfiguration(format!(
            "unknown output '{other}'"
        ))),
    }
}

/// Seconds since the Unix epoch, as written in reports.
pub fn unix_seconds(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

pub fn from_unix_seconds(seconds: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(seconds)
}
