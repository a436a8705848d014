use crate::asset_store::{ArpAsset, Asset, Protocol};
use crate::display::UpperMac;
use crate::error::MuninnNetError;
use crate::output::{unix_seconds, OutputSink};
use nix::sys::stat::Mode;
use nix::unistd::mkfifo;
use std::borrow::Cow;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

/// Streams discoveries into a named pipe for an external agent.
///
/// Each record is a type code on its own line (`01` asset, `02` ARP, `03`
/// statistics), one field per line, and a line holding a single `.`.
pub struct FifoOutput {
    path: PathBuf,
    hide_unknowns: bool,
    file: Option<File>,
}

impl FifoOutput {
    pub fn new<P: AsRef<Path>>(path: P, hide_unknowns: bool) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            hide_unknowns,
            file: None,
        }
    }

    fn write_record(&mut self, fields: &[String]) -> Result<(), MuninnNetError> {
        let file = self.file.as_mut().ok_or_else(|| {
            MuninnNetError::Misconfiguration(format!("fifo {} is not open", self.path.display()))
        })?;
        let mut record = fields
            .iter()
            .map(|field| single_line(field))
            .collect::<Vec<_>>()
            .join("\n");
        record.push_str("\n.\n");
        file.write_all(record.as_bytes())?;
        file.flush()?;
        Ok(())
    }
}

/// Line breaks inside a field would shift every following field of the record.
fn single_line(field: &str) -> Cow<'_, str> {
    if field.contains(['\r', '\n']) {
        Cow::Owned(field.replace(['\r', '\n'], " "))
    } else {
        Cow::Borrowed(field)
    }
}

impl OutputSink for FifoOutput {
    fn name(&self) -> &str {
        "fifo"
    }

    fn init(&mut self) -> Result<(), MuninnNetError> {
        if !self.path.exists() {
            mkfifo(&self.path, Mode::from_bits_truncate(0o755)).map_err(std::io::Error::from)?;
            debug!("Created fifo {}", self.path.display());
        }
        // Read access as well, so opening does not wait for a reader
        let file = OpenOptions::new().read(true).write(true).open(&self.path)?;
        self.file = Some(file);
        Ok(())
    }

    fn on_asset(&mut self, asset: &Asset) -> Result<(), MuninnNetError> {
        if asset.protocol() != Protocol::Tcp || (self.hide_unknowns && asset.is_unknown()) {
            return Ok(());
        }
        self.write_record(&[
            "01".to_string(),
            asset.client.ip.to_string(),
            u32::from(asset.client.ip).to_string(),
            asset.ip().to_string(),
            u32::from(asset.ip()).to_string(),
            asset.client.port.to_string(),
            asset.port().to_string(),
            asset.protocol().number().to_string(),
            asset.service.clone(),
            asset.application.clone(),
            unix_seconds(asset.discovered).to_string(),
            asset.payload_hex.clone(),
        ])
    }

    fn on_arp(&mut self, arp: &ArpAsset) -> Result<(), MuninnNetError> {
        self.write_record(&[
            "02".to_string(),
            arp.ip.to_string(),
            u32::from(arp.ip).to_string(),
            arp.vendor.clone().unwrap_or_else(|| "unknown".to_string()),
            UpperMac(&arp.mac).to_string(),
            unix_seconds(arp.discovered).to_string(),
        ])
    }

    fn on_stat(&mut self, asset: &Asset) -> Result<(), MuninnNetError> {
        self.write_record(&[
            "03".to_string(),
            asset.ip().to_string(),
            asset.port().to_string(),
            asset.protocol().number().to_string(),
            unix_seconds(SystemTime::now()).to_string(),
        ])
    }

    fn shutdown(&mut self) -> Result<(), MuninnNetError> {
        self.file = None;
        Ok(())
    }
}
