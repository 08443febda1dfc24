//! Source-code extraction

use std::path::Path;

use super::{Extraction, Extractor};
use crate::error::{Error, Result};
use crate::types::ChunkKind;

const EXTENSIONS: &[&str] = &[
    "rs", "py", "js", "jsx", "ts", "tsx", "go", "java", "kt", "c", "h", "cc", "cpp", "hpp",
    "cs", "rb", "php", "swift", "scala", "sh", "bash", "zsh", "pl", "lua", "sql",
];

/// Extracts source files verbatim and tags them for the code chunker
pub struct CodeExtractor;

impl CodeExtractor {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for CodeExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor for CodeExtractor {
    fn name(&self) -> &str {
        "code"
    }

    fn handles_extension(&self, extension: &str) -> bool {
        EXTENSIONS.contains(&extension)
    }

    fn sniff(&self, bytes: &[u8]) -> bool {
        // Shebang is the only reliable extension-free signal
        bytes.starts_with(b"#!")
    }

    fn extract(&self, bytes: &[u8], path: &Path) -> Result<Extraction> {
        let text = std::str::from_utf8(bytes).map_err(|e| {
            Error::Extraction(format!("{} is not valid UTF-8: {}", path.display(), e))
        })?;
        Ok(Extraction {
            text: text.to_string(),
            kind: ChunkKind::Code,
            image: None,
            audio: None,
        })
    }
}
