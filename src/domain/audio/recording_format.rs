//! Recording format value object

use std::fmt;
use std::str::FromStr;

use crate::domain::error::FormatParseError;

/// Default candidate list, probed in order. First supported wins.
pub const DEFAULT_FORMAT_CANDIDATES: &[&str] = &[
    "audio/webm;codecs=opus",
    "audio/ogg;codecs=opus",
    "audio/flac",
    "audio/wav",
];

/// A capture container format, identified by its MIME type and optional codec.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordingFormat {
    essence: String,
    codecs: Option<String>,
}

impl RecordingFormat {
    /// Create a format from a bare MIME type without codec parameter
    pub fn new(essence: impl Into<String>) -> Self {
        Self {
            essence: essence.into().to_ascii_lowercase(),
            codecs: None,
        }
    }

    /// Attach a codec parameter
    pub fn with_codecs(mut self, codecs: impl Into<String>) -> Self {
        self.codecs = Some(codecs.into().to_ascii_lowercase());
        self
    }

    /// The MIME type without parameters (e.g. `audio/webm`)
    pub fn essence(&self) -> &str {
        &self.essence
    }

    /// The codec parameter, if any
    pub fn codecs(&self) -> Option<&str> {
        self.codecs.as_deref()
    }

    /// Container subtype (e.g. `webm`, `flac`)
    pub fn container(&self) -> &str {
        self.essence
            .split_once('/')
            .map(|(_, sub)| sub)
            .unwrap_or(&self.essence)
    }

    /// File extension for the container
    pub fn extension(&self) -> &str {
        match self.container() {
            "mpeg" => "mp3",
            "x-wav" | "wave" => "wav",
            other => other,
        }
    }

    /// Full MIME string including the codec parameter
    pub fn mime_type(&self) -> String {
        match &self.codecs {
            Some(codecs) => format!("{};codecs={}", self.essence, codecs),
            None => self.essence.clone(),
        }
    }

    /// Parse every candidate, skipping malformed entries
    pub fn parse_candidates<S: AsRef<str>>(candidates: &[S]) -> Vec<Self> {
        candidates
            .iter()
            .filter_map(|c| c.as_ref().parse().ok())
            .collect()
    }

    /// Default prioritized candidate list
    pub fn default_candidates() -> Vec<Self> {
        Self::parse_candidates(DEFAULT_FORMAT_CANDIDATES)
    }

    /// Pick the first candidate for which `is_supported` returns true.
    pub fn select_first_supported<F>(candidates: &[Self], mut is_supported: F) -> Option<Self>
    where
        F: FnMut(&str) -> bool,
    {
        candidates
            .iter()
            .find(|format| is_supported(&format.mime_type()))
            .cloned()
    }
}

impl FromStr for RecordingFormat {
    type Err = FormatParseError;

    /// Parse strings like `audio/flac` or `audio/webm;codecs=opus`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || FormatParseError {
            input: s.to_string(),
        };

        let mut parts = s.split(';').map(str::trim);
        let essence = parts.next().filter(|e| !e.is_empty()).ok_or_else(err)?;

        let (kind, sub) = essence.split_once('/').ok_or_else(err)?;
        if kind.is_empty() || sub.is_empty() || sub.contains('/') {
            return Err(err());
        }

        let mut format = Self::new(essence);
        for param in parts {
            if param.is_empty() {
                continue;
            }
            let (key, value) = param.split_once('=').ok_or_else(err)?;
            if key.trim().eq_ignore_ascii_case("codecs") {
                let value = value.trim().trim_matches('"');
                if value.is_empty() {
                    return Err(err());
                }
                format = format.with_codecs(value);
            }
        }

        Ok(format)
    }
}

impl fmt::Display for RecordingFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mime_type())
    }
}
