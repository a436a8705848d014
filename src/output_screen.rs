use crate::asset_store::{ArpAsset, Asset};
use crate::error::MuninnNetError;
use crate::output::OutputSink;
use std::io::{self, Write};

/// Prints every discovery to standard output.
#[derive(Debug, Default)]
pub struct ScreenOutput;

impl ScreenOutput {
    pub fn new() -> Self {
        Self
    }
}

impl OutputSink for ScreenOutput {
    fn name(&self) -> &str {
        "screen"
    }

    fn init(&mut self) -> Result<(), MuninnNetError> {
        Ok(())
    }

    fn on_asset(&mut self, asset: &Asset) -> Result<(), MuninnNetError> {
        writeln!(io::stdout().lock(), "[*] Asset Found:  {asset}")?;
        Ok(())
    }

    fn on_arp(&mut self, arp: &ArpAsset) -> Result<(), MuninnNetError> {
        writeln!(io::stdout().lock(), "[*] Asset Found:  {arp}")?;
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), MuninnNetError> {
        io::stdout().flush()?;
        Ok(())
    }
}
