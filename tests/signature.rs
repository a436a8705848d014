use muninn_net::signature::MAX_CAPTURE_LEN;
use muninn_net::{LoadMode, MuninnNetError, Signature, SignatureSet};

fn signature(line: &str) -> Signature {
    line.parse()
        .unwrap_or_else(|e| panic!("Failed to parse signature {line:?}: {e}"))
}

fn signature_set(text: &str) -> SignatureSet {
    SignatureSet::parse(text, LoadMode::Strict)
        .unwrap_or_else(|e| panic!("Failed to parse signatures: {e}"))
}

#[test]
fn test_openssh_template() {
    let sig = signature(r"ssh,x/OpenSSH/$1/,SSH-2\.0-OpenSSH_(\S+)");

    assert_eq!(sig.service, "ssh");
    assert_eq!(
        sig.identify(b"SSH-2.0-OpenSSH_3.8.1p1\r\n").as_deref(),
        Some("OpenSSH 3.8.1p1")
    );
}

#[test]
fn test_version_and_extra_info() {
    let sig = signature(r"www,v/Apache/$1/$2,Server: Apache/(\S+) \((\w+)\)");

    assert_eq!(
        sig.identify(b"HTTP/1.1 200 OK\r\nServer: Apache/2.2.3 (Unix)\r\n")
            .as_deref(),
        Some("Apache 2.2.3 (Unix)")
    );
}

#[test]
fn test_title_without_placeholders() {
    let sig = signature(r"ftp,v/vsftpd///,^220 .*vsFTPd");

    assert_eq!(sig.identify(b"220 (vsFTPd 2.0.5)\r\n").as_deref(), Some("vsftpd"));
    assert_eq!(sig.identify(b"220 ProFTPD ready\r\n"), None);
}

#[test]
fn test_pattern_may_contain_commas() {
    let sig = signature(r"test,v/Test/$1/,Server: (\w+),(\d+)");

    assert_eq!(sig.pattern_str(), r"Server: (\w+),(\d+)");
    assert_eq!(sig.identify(b"Server: abc,12").as_deref(), Some("Test abc"));
}

#[test]
fn test_missing_group_expands_to_nothing() {
    let sig = signature(r"foo,v/Foo/$1/$3,foo(bar)?");

    assert_eq!(sig.identify(b"foo").as_deref(), Some("Foo  ()"));
}

#[test]
fn test_long_capture_is_clipped() {
    let sig = signature(r"long,v/$1//,^(A+)");
    let payload = vec![b'A'; 150];

    let application = sig
        .identify(&payload)
        .unwrap_or_else(|| panic!("Payload should match"));
    assert_eq!(application.len(), MAX_CAPTURE_LEN);
}

#[test]
fn test_binary_payload() {
    let sig = signature(r"rdp,v/Remote Desktop///,^\x03\x00\x00\x13");

    assert_eq!(
        sig.identify(&[0x03, 0x00, 0x00, 0x13, 0x0e, 0xd0, 0xff]).as_deref(),
        Some("Remote Desktop")
    );
}

#[test]
fn test_malformed_lines() {
    let cases = [
        "ssh,v/OpenSSH/$1/",
        "ssh",
        r"ssh,v/OpenSSH/$1,SSH-(\S+)",
        r"ssh,v/OpenSSH/$1/,SSH-(\S+",
    ];

    for line in cases {
        assert!(
            matches!(
                Signature::from_line(line, 7),
                Err(MuninnNetError::InvalidSignature { line: 7, .. })
            ),
            "{line:?} should be rejected"
        );
    }
}

#[test]
fn test_first_match_wins() {
    let set = signature_set(
        "first,v/First///,.*\n\
         second,v/Second///,.*\n",
    );

    let identification = set
        .identify(b"anything at all")
        .unwrap_or_else(|| panic!("Payload should match"));
    assert_eq!(identification.service, "first");
    assert_eq!(identification.application, "First");
}

#[test]
fn test_earliest_matching_signature_wins() {
    let set = signature_set(
        "smtp,v/Sendmail///,^220 .* Sendmail\n\
         www,v/nginx/$1/,Server: nginx/([\\d.]+)\n\
         www,v/Generic HTTP///,^HTTP/\n",
    );

    let identification = set
        .identify(b"HTTP/1.1 200 OK\r\nServer: nginx/1.18.0\r\n")
        .unwrap_or_else(|| panic!("Payload should match"));
    assert_eq!(identification.application, "nginx 1.18.0");
    assert_eq!(set.identify(b"SSH-2.0-dropbear"), None);
}

#[test]
fn test_comments_blank_lines_and_crlf() {
    let set = signature_set(
        "# service,title,pattern\r\n\
         \r\n\
         ssh,v/OpenSSH/$1/,SSH-2\\.0-OpenSSH_(\\S+)\r\n\
         \n\
         #ftp,v/ignored///,^220\n",
    );

    assert_eq!(set.len(), 1);
    assert_eq!(set.signatures()[0].line, 3);
}

#[test]
fn test_lenient_mode_skips_bad_lines() {
    let text = "ssh,v/OpenSSH/$1/,SSH-2\\.0-OpenSSH_(\\S+)\n\
                broken line\n\
                www,v/Apache/$1/,Server: Apache/(\\S+)\n\
                bad,v/Bad///,(unclosed\n";

    let set = SignatureSet::parse(text, LoadMode::Lenient)
        .unwrap_or_else(|e| panic!("Lenient parsing should not fail: {e}"));
    let services: Vec<&str> = set.signatures().iter().map(|s| s.service.as_str()).collect();
    assert_eq!(services, vec!["ssh", "www"]);

    assert!(matches!(
        SignatureSet::parse(text, LoadMode::Strict),
        Err(MuninnNetError::InvalidSignature { line: 2, .. })
    ));
}

#[test]
fn test_default_parse_is_lenient() {
    let set: SignatureSet = "nonsense\nssh,v/OpenSSH///,SSH\n"
        .parse()
        .unwrap_or_else(|e| panic!("Failed to parse signatures: {e}"));
    assert_eq!(set.len(), 1);
}

#[test]
fn test_empty_set_never_matches() {
    let set = SignatureSet::default();
    assert!(set.is_empty());
    assert_eq!(set.identify(b"SSH-2.0-OpenSSH_3.8.1p1"), None);
}

#[test]
fn test_missing_file_is_an_error() {
    let result = SignatureSet::load("/nonexistent/muninn-signature-list", LoadMode::Lenient);
    assert!(matches!(result, Err(MuninnNetError::Io(_))));
}
