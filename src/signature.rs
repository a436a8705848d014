use crate::error::MuninnNetError;
use nom::branch::alt;
use nom::bytes::complete::is_not;
use nom::character::complete::{char, satisfy};
use nom::combinator::{all_consuming, map};
use nom::multi::many0;
use nom::sequence::preceded;
use nom::{IResult, Parser};
use regex::bytes::{Captures, Regex, RegexBuilder};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// Longest capture, in bytes, copied into an application string.
pub const MAX_CAPTURE_LEN: usize = 99;

/// Piece of an application title template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateToken {
    Literal(String),
    /// `$N`: the N-th capture group of the matching pattern
    Capture(usize),
}

/// The `/`-separated title of a signature, e.g. `v/OpenSSH/$1/protocol 2.0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Title {
    pub application: String,
    pub version: String,
    pub extra: String,
    template: Vec<TemplateToken>,
}

impl Title {
    pub fn new(application: &str, version: &str, extra: &str) -> Self {
        let mut joined = application.to_string();
        if !version.is_empty() {
            joined.push(' ');
            joined.push_str(version);
        }
        if !extra.is_empty() {
            joined.push_str(" (");
            joined.push_str(extra);
            joined.push(')');
        }

        Self {
            application: application.to_string(),
            version: version.to_string(),
            extra: extra.to_string(),
            template: parse_template(&joined),
        }
    }

    pub fn template(&self) -> &[TemplateToken] {
        &self.template
    }

    /// Build the application string, replacing `$N` with capture group N.
    ///
    /// Missing groups expand to nothing; captures longer than
    /// [`MAX_CAPTURE_LEN`] bytes are clipped.
    pub fn render(&self, captures: &Captures<'_>) -> String {
        let mut application = String::new();
        for token in &self.template {
            match token {
                TemplateToken::Literal(text) => application.push_str(text),
                TemplateToken::Capture(group) => {
                    if let Some(m) = captures.get(*group) {
                        let bytes = m.as_bytes();
                        let clipped = &bytes[..bytes.len().min(MAX_CAPTURE_LEN)];
                        application.push_str(&String::from_utf8_lossy(clipped));
                    }
                }
            }
        }
        application
    }
}

impl fmt::Display for Title {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.application, self.version, self.extra)
    }
}

fn capture_token(input: &str) -> IResult<&str, TemplateToken> {
    map(
        preceded(char('$'), satisfy(|c| c.is_ascii_digit())),
        |digit| TemplateToken::Capture(usize::from(digit as u8 - b'0')),
    )
    .parse(input)
}

fn literal_token(input: &str) -> IResult<&str, TemplateToken> {
    alt((
        map(is_not("$"), |text: &str| TemplateToken::Literal(text.to_string())),
        // `$` not followed by a digit stays as is
        map(char('$'), |_| TemplateToken::Literal("$".to_string())),
    ))
    .parse(input)
}

/// Tokenise a title template; adjacent literals are merged.
pub fn parse_template(input: &str) -> Vec<TemplateToken> {
    let tokens = match all_consuming(many0(alt((capture_token, literal_token)))).parse(input) {
        Ok((_, tokens)) => tokens,
        Err(_) => vec![TemplateToken::Literal(input.to_string())],
    };

    let mut merged: Vec<TemplateToken> = Vec::with_capacity(tokens.len());
    for token in tokens {
        match (merged.last_mut(), token) {
            (Some(TemplateToken::Literal(previous)), TemplateToken::Literal(text)) => {
                previous.push_str(&text)
            }
            (_, token) => merged.push(token),
        }
    }
    merged
}

/// One fingerprint rule: `service,title,pattern`.
#[derive(Debug, Clone)]
pub struct Signature {
    pub service: String,
    pub title: Title,
    pub pattern: Regex,
    /// 1-based line in the signature file, 0 when built in code
    pub line: usize,
}

impl Signature {
    /// Parse one signature line.
    ///
    /// The pattern is everything after the second comma, so patterns may contain
    /// commas. The title must split on `/` into at least four parts; the first one
    /// is a type tag and is not used.
    pub fn from_line(line: &str, line_number: usize) -> Result<Self, MuninnNetError> {
        let invalid = |reason: String| MuninnNetError::InvalidSignature {
            line: line_number,
            reason,
        };

        let mut fields = line.splitn(3, ',');
        let (Some(service), Some(title), Some(pattern)) =
            (fields.next(), fields.next(), fields.next())
        else {
            return Err(invalid(format!("expected service,title,pattern: {line}")));
        };

        let parts: Vec<&str> = title.split('/').collect();
        if parts.len() < 4 {
            return Err(invalid(format!(
                "title `{title}` needs four `/`-separated parts"
            )));
        }

        let pattern = RegexBuilder::new(pattern)
            .unicode(false)
            .build()
            .map_err(|e| invalid(format!("pattern does not compile: {e}")))?;

        Ok(Self {
            service: service.to_string(),
            title: Title::new(parts[1], parts[2], parts[3]),
            pattern,
            line: line_number,
        })
    }

    /// Match `payload` and render the application string on success.
    pub fn identify(&self, payload: &[u8]) -> Option<String> {
        self.pattern
            .captures(payload)
            .map(|captures| self.title.render(&captures))
    }

    pub fn pattern_str(&self) -> &str {
        self.pattern.as_str()
    }
}

impl FromStr for Signature {
    type Err = MuninnNetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_line(s, 0)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.service, self.title, self.pattern.as_str())
    }
}

/// Render a template without a match, for previews and logs.
pub fn template_preview(template: &[TemplateToken]) -> Cow<'_, str> {
    match template {
        [TemplateToken::Literal(text)] => Cow::Borrowed(text.as_str()),
        tokens => Cow::Owned(
            tokens
                .iter()
                .map(|token| match token {
                    TemplateToken::Literal(text) => text.clone(),
                    TemplateToken::Capture(group) => format!("${group}"),
                })
                .collect(),
        ),
    }
}
