use muninn_net::config::{DEFAULT_SIGNATURE_FILE, DEFAULT_VENDOR_FILE};
use muninn_net::{
    Config, LoadMode, MuninnNetError, OutputSpec, SignatureSet, VendorDb, VendorLookup,
};
use pnet::util::MacAddr;
use std::net::Ipv4Addr;
use std::path::PathBuf;

fn parse(text: &str) -> Config {
    text.parse()
        .unwrap_or_else(|e| panic!("Failed to parse configuration: {e}"))
}

#[test]
fn test_defaults() {
    let config = Config::default();

    assert_eq!(config.signature_file, PathBuf::from(DEFAULT_SIGNATURE_FILE));
    assert_eq!(config.vendor_file, PathBuf::from(DEFAULT_VENDOR_FILE));
    assert_eq!(config.report_file, PathBuf::from("assets.csv"));
    assert!(config.networks.is_empty());
    assert!(config.interface.is_none());
    assert!(config.dump_file.is_none());
    assert!(!config.hide_unknowns);
    assert_eq!(config.signature_mode, LoadMode::Lenient);
}

#[test]
fn test_full_file() {
    let config = parse(
        "# muninn configuration\n\
         sig_file /etc/muninn/muninn-signature-list\n\
         mac_file /etc/muninn/muninn-ether-codes   # OUI table\n\
         \n\
         interface eth1\n\
         network 192.168.0.0/16, 10.0.0.0/8\n\
         network 172.16.0.0/12\n\
         output screen\n\
         output csv: /var/lib/muninn/assets.csv\n\
         hide_unknowns 1\n\
         dump_file banners.pcap\n\
         strict_signatures 1\n",
    );

    assert_eq!(
        config.signature_file,
        PathBuf::from("/etc/muninn/muninn-signature-list")
    );
    assert_eq!(config.vendor_file, PathBuf::from("/etc/muninn/muninn-ether-codes"));
    assert_eq!(config.interface.as_deref(), Some("eth1"));
    assert_eq!(config.networks.len(), 3);
    assert!(config.networks.matches(Ipv4Addr::new(172, 20, 1, 1)));
    assert!(!config.networks.matches(Ipv4Addr::new(8, 8, 8, 8)));
    assert_eq!(
        config.outputs,
        vec![
            OutputSpec {
                name: "screen".to_string(),
                args: None
            },
            OutputSpec {
                name: "csv".to_string(),
                args: Some("/var/lib/muninn/assets.csv".to_string())
            },
        ]
    );
    assert!(config.hide_unknowns);
    assert_eq!(config.dump_file, Some(PathBuf::from("banners.pcap")));
    assert_eq!(config.signature_mode, LoadMode::Strict);
}

#[test]
fn test_parameter_names_are_case_insensitive() {
    let config = parse("INTERFACE eth0\nHide_Unknowns yes\n");

    assert_eq!(config.interface.as_deref(), Some("eth0"));
    assert!(config.hide_unknowns);
}

#[test]
fn test_unknown_and_unsupported_parameters_are_skipped() {
    let config = parse("daemon 1\npid_file /var/run/muninn.pid\ncolour blue\ninterface eth0\n");
    assert_eq!(config.interface.as_deref(), Some("eth0"));
}

#[test]
fn test_default_outputs() {
    let config = Config::default();
    let names: Vec<String> = config
        .effective_outputs()
        .into_iter()
        .map(|spec| spec.name)
        .collect();
    assert_eq!(names, vec!["screen", "csv"]);

    let config = parse("output fifo: /tmp/muninn.fifo\n");
    assert_eq!(config.effective_outputs().len(), 1);
}

#[test]
fn test_invalid_network_is_fatal() {
    let result = "network 10.0.0.0/33\n".parse::<Config>();
    assert!(matches!(result, Err(MuninnNetError::InvalidNetwork(_))));
}

#[test]
fn test_invalid_flag_is_fatal() {
    let result = "hide_unknowns maybe\n".parse::<Config>();
    assert!(matches!(result, Err(MuninnNetError::Misconfiguration(_))));
}

#[test]
fn test_output_spec() {
    let spec: OutputSpec = "CSV : report.csv "
        .parse()
        .unwrap_or_else(|e| panic!("Failed to parse output: {e}"));
    assert_eq!(spec.name, "csv");
    assert_eq!(spec.args.as_deref(), Some("report.csv"));

    let spec: OutputSpec = "csv:"
        .parse()
        .unwrap_or_else(|e| panic!("Failed to parse output: {e}"));
    assert_eq!(spec.args, None);

    assert!(":x".parse::<OutputSpec>().is_err());
}

#[test]
fn test_unknown_output_name() {
    let config = parse("output printer\n");
    assert!(matches!(
        config.build_sinks(),
        Err(MuninnNetError::Misconfiguration(_))
    ));
}

#[test]
fn test_missing_file() {
    assert!(matches!(
        Config::load("/nonexistent/muninn.conf"),
        Err(MuninnNetError::Io(_))
    ));
}

fn shipped(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config").join(name)
}

#[test]
fn test_shipped_files_load() {
    let config = Config::load(shipped("muninn.conf"))
        .unwrap_or_else(|e| panic!("Failed to load sample configuration: {e}"));
    assert_eq!(config.interface.as_deref(), Some("eth0"));
    assert_eq!(config.outputs.len(), 2);

    let signatures = SignatureSet::load(shipped("muninn-signature-list"), LoadMode::Strict)
        .unwrap_or_else(|e| panic!("Failed to load sample signatures: {e}"));
    let ssh = signatures
        .identify(b"SSH-2.0-OpenSSH_8.9p1 Ubuntu-3\r\n")
        .unwrap_or_else(|| panic!("OpenSSH banner should match"));
    assert_eq!(ssh.service, "ssh");
    assert_eq!(ssh.application, "OpenSSH 8.9p1 (protocol 2.0)");

    let vendors = VendorDb::load(shipped("muninn-ether-codes"))
        .unwrap_or_else(|e| panic!("Failed to load sample vendors: {e}"));
    assert_eq!(
        vendors.lookup(&MacAddr::new(0x00, 0x50, 0x56, 0x01, 0x02, 0x03)),
        Some("VMware")
    );
}
