use crate::error::MuninnNetError;
use crate::signature::{template_preview, Signature};
use regex::bytes::{RegexSet, RegexSetBuilder};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// How a signature file with bad lines is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadMode {
    /// Skip and log bad lines
    #[default]
    Lenient,
    /// Fail on the first bad line
    Strict,
}

/// Result of a successful match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identification {
    pub service: String,
    pub application: String,
}

/// Ordered signature list. The first signature whose pattern matches wins.
///
/// A `RegexSet` over all patterns answers "which signatures match" in one pass;
/// only the lowest matching index is then run again for its capture groups.
#[derive(Debug, Clone, Default)]
pub struct SignatureSet {
    signatures: Vec<Signature>,
    prefilter: Option<RegexSet>,
}

impl SignatureSet {
    pub fn new(signatures: Vec<Signature>) -> Self {
        let prefilter = build_prefilter(&signatures);
        Self {
            signatures,
            prefilter,
        }
    }

    /// Load signatures from a file.
    ///
    /// # Errors
    /// An unreadable file is always an error. Bad lines are an error only in
    /// [`LoadMode::Strict`].
    pub fn load<P: AsRef<Path>>(path: P, mode: LoadMode) -> Result<Self, MuninnNetError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let set = Self::parse(&content, mode)?;
        info!("Loaded {} signatures from {}", set.len(), path.display());
        Ok(set)
    }

    /// Parse signature text, one `service,title,pattern` per line.
    ///
    /// Empty lines and lines starting with `#` are ignored.
    pub fn parse(content: &str, mode: LoadMode) -> Result<Self, MuninnNetError> {
        let mut signatures = Vec::new();

        for (index, line) in content.lines().enumerate() {
            let line = line.trim_end_matches('\r');
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match Signature::from_line(line, index + 1) {
                Ok(signature) => {
                    debug!(
                        "Signature {}: {} -> {}",
                        signature.line,
                        signature.service,
                        template_preview(signature.title.template())
                    );
                    signatures.push(signature);
                }
                Err(e) if mode == LoadMode::Lenient => warn!("Skipping signature: {}", e),
                Err(e) => return Err(e),
            }
        }

        Ok(Self::new(signatures))
    }

    /// Classify a payload.
    ///
    /// # Returns
    /// Service and rendered application of the first matching signature in
    /// load order, or `None` when nothing matches.
    pub fn identify(&self, payload: &[u8]) -> Option<Identification> {
        let start = match &self.prefilter {
            Some(set) => set.matches(payload).iter().next()?,
            None => 0,
        };

        self.signatures[start..].iter().find_map(|signature| {
            signature
                .identify(payload)
                .map(|application| Identification {
                    service: signature.service.clone(),
                    application,
                })
        })
    }

    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }
}

impl FromStr for SignatureSet {
    type Err = MuninnNetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s, LoadMode::default())
    }
}

fn build_prefilter(signatures: &[Signature]) -> Option<RegexSet> {
    if signatures.is_empty() {
        return None;
    }
    match RegexSetBuilder::new(signatures.iter().map(Signature::pattern_str))
        .unicode(false)
        .build()
    {
        Ok(set) => Some(set),
        Err(e) => {
            // Falls back to trying every signature in order
            warn!("Signature prefilter unavailable: {}", e);
            None
        }
    }
}
