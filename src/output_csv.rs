use crate::asset_store::{ArpAsset, Asset, AssetKey, Protocol};
use crate::display::UpperMac;
use crate::error::MuninnNetError;
use crate::output::{from_unix_seconds, unix_seconds, OutputSink, ReportRecord};
use csv::{ReaderBuilder, StringRecord, Writer, WriterBuilder};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const CSV_HEADER: &str = "asset,port,proto,service,application,discovered";

/// Appends discoveries to a CSV report.
///
/// An existing report is read back on `init` so that assets from earlier runs
/// are known to the engine and not reported twice. Fields are quoted when they
/// contain separators, quotes or line breaks, since banners come off the wire.
pub struct CsvOutput {
    path: PathBuf,
    hide_unknowns: bool,
    writer: Option<Writer<File>>,
    restored: Vec<ReportRecord>,
}

impl CsvOutput {
    pub fn new<P: AsRef<Path>>(path: P, hide_unknowns: bool) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            hide_unknowns,
            writer: None,
            restored: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_row(&mut self, row: &[&str]) -> Result<(), MuninnNetError> {
        let writer = self.writer.as_mut().ok_or_else(|| {
            MuninnNetError::Misconfiguration(format!(
                "report {} is not open",
                self.path.display()
            ))
        })?;
        writer.write_record(row).map_err(csv_error)?;
        writer.flush()?;
        Ok(())
    }
}

impl OutputSink for CsvOutput {
    fn name(&self) -> &str {
        "csv"
    }

    fn init(&mut self) -> Result<(), MuninnNetError> {
        let mut needs_header = true;
        if self.path.exists() {
            info!("Processing existing report {}", self.path.display());
            let content = fs::read_to_string(&self.path)?;
            needs_header = content.trim().is_empty();
            self.restored = parse_report(&content);
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        self.writer = Some(WriterBuilder::new().has_headers(false).from_writer(file));
        if needs_header {
            let header: Vec<&str> = CSV_HEADER.split(',').collect();
            self.write_row(&header)?;
        }
        Ok(())
    }

    fn restore(&mut self) -> Result<Vec<ReportRecord>, MuninnNetError> {
        Ok(std::mem::take(&mut self.restored))
    }

    fn on_asset(&mut self, asset: &Asset) -> Result<(), MuninnNetError> {
        if self.hide_unknowns && asset.is_unknown() {
            return Ok(());
        }
        self.write_row(&[
            &asset.ip().to_string(),
            &asset.port().to_string(),
            &asset.protocol().number().to_string(),
            &asset.service,
            &asset.application,
            &unix_seconds(asset.discovered).to_string(),
        ])
    }

    fn on_arp(&mut self, arp: &ArpAsset) -> Result<(), MuninnNetError> {
        let service = match &arp.vendor {
            Some(vendor) => format!("ARP ({vendor})"),
            None => "ARP".to_string(),
        };
        self.write_row(&[
            &arp.ip.to_string(),
            "0",
            "0",
            &service,
            &UpperMac(&arp.mac).to_string(),
            &unix_seconds(arp.discovered).to_string(),
        ])
    }

    fn shutdown(&mut self) -> Result<(), MuninnNetError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        debug!("Closed report {}", self.path.display());
        Ok(())
    }
}

fn csv_error(e: csv::Error) -> MuninnNetError {
    match e.into_kind() {
        csv::ErrorKind::Io(e) => MuninnNetError::Io(e),
        other => MuninnNetError::Misconfiguration(format!("CSV error: {other:?}")),
    }
}

/// Parse the rows of a report; the header and malformed rows are skipped.
pub fn parse_report(content: &str) -> Vec<ReportRecord> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut records = Vec::new();
    for (index, result) in reader.records().enumerate() {
        match result {
            Ok(row) => match parse_report_record(&row) {
                Some(record) => records.push(record),
                None => debug!("Skipping report row {}", index + 2),
            },
            Err(e) => warn!("Unreadable report row {}: {}", index + 2, e),
        }
    }
    records
}

/// `ip,port,proto,service,application,discovered`
pub fn parse_report_record(row: &StringRecord) -> Option<ReportRecord> {
    if row.len() != 6 {
        return None;
    }
    let ip = row.get(0)?.trim().parse().ok()?;
    let port: u16 = row.get(1)?.trim().parse().ok()?;
    let proto: u8 = row.get(2)?.trim().parse().ok()?;
    let service = row.get(3)?;
    let application = row.get(4)?;
    let discovered: u64 = row.get(5)?.trim().parse().ok()?;
    if discovered == 0 || service.is_empty() || application.is_empty() {
        return None;
    }

    let discovered = from_unix_seconds(discovered);
    if proto == 0 {
        return Some(ReportRecord::Arp {
            ip,
            mac: application.trim().parse().ok()?,
            discovered,
        });
    }

    let key = match Protocol::from_number(proto)? {
        Protocol::Tcp => AssetKey::tcp(ip, port),
        Protocol::Icmp => AssetKey::icmp(ip),
    };
    Some(ReportRecord::Asset {
        key,
        service: service.to_string(),
        application: application.to_string(),
        discovered,
    })
}
