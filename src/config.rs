use crate::error::MuninnNetError;
use crate::filter::MonitoredNetworks;
use crate::output::{self, OutputSink, DEFAULT_REPORT_FILE};
use crate::signature_matcher::LoadMode;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

pub const DEFAULT_SIGNATURE_FILE: &str = "muninn-signature-list";
pub const DEFAULT_VENDOR_FILE: &str = "muninn-ether-codes";

/// One `output name[: args]` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSpec {
    pub name: String,
    pub args: Option<String>,
}

impl FromStr for OutputSpec {
    type Err = MuninnNetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, args) = match s.split_once(':') {
            Some((name, args)) => (name.trim(), Some(args.trim())),
            None => (s.trim(), None),
        };
        if name.is_empty() {
            return Err(MuninnNetError::Misconfiguration(format!(
                "output without a name: '{s}'"
            )));
        }
        Ok(Self {
            name: name.to_ascii_lowercase(),
            args: args.filter(|args| !args.is_empty()).map(str::to_string),
        })
    }
}

/// Engine configuration.
///
/// Read from a file of `param value` lines; the command line overrides single
/// fields afterwards.
#[derive(Debug, Clone)]
pub struct Config {
    pub signature_file: PathBuf,
    pub vendor_file: PathBuf,
    pub outputs: Vec<OutputSpec>,
    pub interface: Option<String>,
    pub networks: MonitoredNetworks,
    /// csv and fifo sinks skip assets that were never classified
    pub hide_unknowns: bool,
    /// Used by the csv sink when its output line has no argument
    pub report_file: PathBuf,
    pub dump_file: Option<PathBuf>,
    pub signature_mode: LoadMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            signature_file: PathBuf::from(DEFAULT_SIGNATURE_FILE),
            vendor_file: PathBuf::from(DEFAULT_VENDOR_FILE),
            outputs: Vec::new(),
            interface: None,
            networks: MonitoredNetworks::new(),
            hide_unknowns: false,
            report_file: PathBuf::from(DEFAULT_REPORT_FILE),
            dump_file: None,
            signature_mode: LoadMode::default(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, MuninnNetError> {
        let path = path.as_ref();
        debug!("Processing configuration {}", path.display());
        let content = fs::read_to_string(path)?;
        content.parse()
    }

    /// Apply one `param value` pair.
    ///
    /// # Errors
    /// Invalid values for known parameters. Unknown parameters are only logged.
    pub fn set(&mut self, param: &str, value: &str) -> Result<(), MuninnNetError> {
        match param.to_ascii_lowercase().as_str() {
            "sig_file" => self.signature_file = PathBuf::from(value),
            "mac_file" => self.vendor_file = PathBuf::from(value),
            "output" => self.outputs.push(value.parse()?),
            "interface" => self.interface = Some(value.to_string()),
            "network" => self.networks.extend_from_list(value)?,
            "hide_unknowns" => self.hide_unknowns = parse_flag(param, value)?,
            "report_file" => self.report_file = PathBuf::from(value),
            "dump_file" => self.dump_file = Some(PathBuf::from(value)),
            "strict_signatures" => {
                self.signature_mode = if parse_flag(param, value)? {
                    LoadMode::Strict
                } else {
                    LoadMode::Lenient
                }
            }
            "daemon" | "pid_file" | "user" | "group" | "filter" => {
                warn!("Configuration parameter '{}' is not supported, ignored", param)
            }
            other => warn!("Unknown configuration parameter '{}', ignored", other),
        }
        Ok(())
    }

    /// Configured outputs, or `screen` and `csv` when none are configured.
    pub fn effective_outputs(&self) -> Vec<OutputSpec> {
        if !self.outputs.is_empty() {
            return self.outputs.clone();
        }
        ["screen", "csv"]
            .into_iter()
            .map(|name| OutputSpec {
                name: name.to_string(),
                args: None,
            })
            .collect()
    }

    /// Build every effective output sink.
    pub fn build_sinks(&self) -> Result<Vec<Box<dyn OutputSink>>, MuninnNetError> {
        self.effective_outputs()
            .iter()
            .map(|spec| {
                let args = match (spec.name.as_str(), spec.args.as_deref()) {
                    ("csv", None) => self.report_file.to_str(),
                    (_, args) => args,
                };
                output::create_sink(&spec.name, args, self.hide_unknowns)
            })
            .collect()
    }
}

impl FromStr for Config {
    type Err = MuninnNetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut config = Config::default();
        for line in s.lines() {
            let line = match line.split_once('#') {
                Some((before, _)) => before,
                None => line,
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Some((param, value)) = line.split_once(char::is_whitespace) else {
                warn!("Configuration line without a value: '{}'", line);
                continue;
            };
            let value = value.trim();
            debug!("config param '{}' value '{}'", param, value);
            config.set(param, value)?;
        }
        Ok(config)
    }
}

fn parse_flag(param: &str, value: &str) -> Result<bool, MuninnNetError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "yes" | "true" | "on" => Ok(true),
        "0" | "no" | "false" | "off" => Ok(false),
        _ => Err(MuninnNetError::Misconfiguration(format!(
            "{param}: expected 1 or 0, got '{value}'"
        ))),
    }
}
