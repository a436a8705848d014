use clap::Parser;
use muninn_net::{Config, MuninnNet, MuninnNetError};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// Passive asset detection from observed network traffic
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file (`param value` lines)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Network interface to capture from
    #[arg(short = 'i', long, conflicts_with = "read")]
    interface: Option<String>,

    /// Replay a pcap file instead of capturing live
    #[arg(short = 'r', long)]
    read: Option<PathBuf>,

    /// Monitored networks, e.g. "192.168.0.0/24,10.0.0.0/16"
    #[arg(short = 'n', long)]
    networks: Option<String>,

    /// Signature file
    #[arg(short = 's', long)]
    signatures: Option<PathBuf>,

    /// MAC vendor file
    #[arg(short = 'm', long = "mac-file")]
    mac_file: Option<PathBuf>,

    /// CSV report file
    #[arg(short = 'w', long)]
    report: Option<PathBuf>,

    /// Dump the frames used for identification into this pcap file
    #[arg(short = 'd', long)]
    dump: Option<PathBuf>,

    /// Leave unidentified services out of the csv and fifo outputs
    #[arg(short = 'U', long = "hide-unknowns")]
    hide_unknowns: bool,

    /// Debug logging
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Log file path
    #[arg(short = 'l', long = "log-file")]
    log_file: Option<String>,
}

fn initialize_logging(log_file: Option<String>, verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let default_directive = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let console_writer = std::io::stderr.with_max_level(level);

    match log_file {
        Some(log_file) => {
            let file_appender =
                RollingFileAppender::new(Rotation::NEVER, ".", log_file).with_max_level(level);
            let subscriber = fmt()
                .with_env_filter(filter)
                .with_writer(console_writer.and(file_appender))
                .finish();
            set_subscriber(subscriber);
        }
        None => {
            let subscriber = fmt()
                .with_env_filter(filter)
                .with_writer(console_writer)
                .finish();
            set_subscriber(subscriber);
        }
    }
}

fn set_subscriber<S>(subscriber: S)
where
    S: tracing::Subscriber + Send + Sync + 'static,
{
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set subscriber: {e}");
        std::process::exit(1);
    }
}

fn build_config(args: &Args) -> Result<Config, MuninnNetError> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    if let Some(interface) = &args.interface {
        config.interface = Some(interface.clone());
    }
    if let Some(networks) = &args.networks {
        config.networks.extend_from_list(networks)?;
    }
    if let Some(signatures) = &args.signatures {
        config.signature_file = signatures.clone();
    }
    if let Some(mac_file) = &args.mac_file {
        config.vendor_file = mac_file.clone();
    }
    if let Some(report) = &args.report {
        config.report_file = report.clone();
    }
    if let Some(dump) = &args.dump {
        config.dump_file = Some(dump.clone());
    }
    if args.hide_unknowns {
        config.hide_unknowns = true;
    }
    Ok(config)
}

fn run(args: &Args, cancel_signal: Arc<AtomicBool>) -> Result<(), MuninnNetError> {
    let config = build_config(args)?;
    let mut muninn = MuninnNet::from_config(&config)?;

    let result = match (&args.read, &config.interface) {
        (Some(pcap), _) => muninn.analyze_pcap(pcap, Some(cancel_signal)),
        (None, Some(interface)) => muninn.analyze_network(interface, Some(cancel_signal)),
        (None, None) => Err(MuninnNetError::Misconfiguration(
            "no interface configured, use --interface or --read".to_string(),
        )),
    };

    muninn.shutdown();
    result
}

fn main() -> ExitCode {
    let args = Args::parse();
    initialize_logging(args.log_file.clone(), args.verbose);

    let cancel_signal = Arc::new(AtomicBool::new(false));
    let ctrl_c_signal = cancel_signal.clone();
    // SIGINT, SIGTERM and SIGHUP all stop the capture
    if let Err(e) = ctrlc::set_handler(move || {
        ctrl_c_signal.store(true, Ordering::Relaxed);
    }) {
        error!("Error setting signal handler: {e}");
        return ExitCode::FAILURE;
    }

    match run(&args, cancel_signal.clone()) {
        Ok(()) => {
            if cancel_signal.load(Ordering::Relaxed) {
                info!("Received signal, shut down");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
