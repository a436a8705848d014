use thiserror::Error;

/// Error handling for asset detection, signature loading and capture.
#[derive(Error, Debug)]
pub enum MuninnNetError {
    /// A file could not be opened, read or written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A signature line could not be turned into a usable signature.
    ///
    /// The line number is 1-based and refers to the signature file.
    #[error("Invalid signature at line {line}: {reason}")]
    InvalidSignature { line: usize, reason: String },

    /// A monitored network entry is not a valid `a.b.c.d/prefix` block.
    #[error("Invalid network: {0}")]
    InvalidNetwork(String),

    /// The packet source failed.
    #[error("Capture error: {0}")]
    Capture(String),

    /// The capture source uses a link-layer encapsulation the dissector does not know.
    #[error("Unsupported link type: {0}")]
    UnsupportedLinkType(String),

    /// Configuration is missing or invalid.
    #[error("Misconfiguration: {0}")]
    Misconfiguration(String),
}
