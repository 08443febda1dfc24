//! Plaintext and markdown extraction, also the sniffing fallback

use std::path::Path;

use super::{Extraction, Extractor};
use crate::error::{Error, Result};

const EXTENSIONS: &[&str] = &[
    "txt", "md", "markdown", "rst", "org", "adoc", "log", "csv", "tsv", "ini", "cfg", "conf",
    "yaml", "yml", "toml", "tex", "html", "htm", "xml",
];

/// Fraction of non-text bytes above which content is considered binary
const BINARY_THRESHOLD: f64 = 0.05;

/// Extracts any text-like file; the registry's last resort
pub struct PlainTextExtractor;

impl PlainTextExtractor {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for PlainTextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether the bytes look like text: valid UTF-8 with few control bytes
fn looks_like_text(bytes: &[u8]) -> bool {
    if bytes.is_empty() {
        return true;
    }
    let Ok(_) = std::str::from_utf8(bytes) else {
        return false;
    };
    let control = bytes
        .iter()
        .filter(|b| b.is_ascii_control() && !matches!(b, b'\n' | b'\r' | b'\t'))
        .count();
    (control as f64) / (bytes.len() as f64) <= BINARY_THRESHOLD
}

impl Extractor for PlainTextExtractor {
    fn name(&self) -> &str {
        "plaintext"
    }

    fn handles_extension(&self, extension: &str) -> bool {
        EXTENSIONS.contains(&extension)
    }

    fn sniff(&self, bytes: &[u8]) -> bool {
        looks_like_text(bytes)
    }

    fn extract(&self, bytes: &[u8], path: &Path) -> Result<Extraction> {
        let text = std::str::from_utf8(bytes).map_err(|e| {
            Error::Extraction(format!("{} is not valid UTF-8: {}", path.display(), e))
        })?;
        if !looks_like_text(bytes) {
            return Err(Error::Extraction(format!(
                "{} looks like binary content",
                path.display()
            )));
        }
        Ok(Extraction::prose(text.to_string()))
    }
}
