//! # Extraction
//!
//! Turning file bytes into text, chunks and entities. The registry maps
//! extensions (and a magic-byte sniff) to [`Extractor`] capability objects;
//! the chunkers and the entity recognizer operate on the extracted text.
//!
//! Format adapters that need third-party parsers (PDF, DOCX, OCR, audio
//! tags) plug in through the same trait and are not part of this crate.

mod chunker;
mod code;
mod fae;
mod ner;
mod plain;

pub use chunker::{chunk_code, chunk_prose, estimate_tokens, ChunkSpan};
pub use code::CodeExtractor;
pub use fae::FaeExtractor;
pub use ner::{normalize_form, EntityRecognizer, RawEntity, RegexRecognizer};
pub use plain::PlainTextExtractor;

use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::types::{AudioSidecar, ChunkKind, ImageSidecar};

/// Image metadata captured during extraction, before a file id exists
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageMeta {
    pub width: u32,
    pub height: u32,
    pub camera: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub taken_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl ImageMeta {
    /// Attach the owning file and produce the persisted record
    pub fn into_sidecar(self, file_id: &str) -> ImageSidecar {
        ImageSidecar {
            file_id: file_id.to_string(),
            width: self.width,
            height: self.height,
            camera: self.camera,
            latitude: self.latitude,
            longitude: self.longitude,
            taken_at: self.taken_at,
        }
    }
}

/// Audio metadata captured during extraction, before a file id exists
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioMeta {
    pub duration_secs: f64,
    pub codec: Option<String>,
    pub sample_rate: Option<u32>,
}

impl AudioMeta {
    /// Attach the owning file and produce the persisted record
    pub fn into_sidecar(self, file_id: &str) -> AudioSidecar {
        AudioSidecar {
            file_id: file_id.to_string(),
            duration_secs: self.duration_secs,
            codec: self.codec,
            sample_rate: self.sample_rate,
        }
    }
}

/// Raw output of an extractor: text plus structural hints and side-metadata
#[derive(Debug, Clone)]
pub struct Extraction {
    pub text: String,
    /// How the text should be chunked
    pub kind: ChunkKind,
    pub image: Option<ImageMeta>,
    pub audio: Option<AudioMeta>,
}

impl Extraction {
    /// Plain prose extraction with no side-metadata
    pub fn prose(text: String) -> Self {
        Self {
            text,
            kind: ChunkKind::Prose,
            image: None,
            audio: None,
        }
    }
}

/// Capability object turning bytes into text, hints and side-metadata
pub trait Extractor: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &str;

    /// Whether this extractor claims the given lowercase extension
    fn handles_extension(&self, extension: &str) -> bool;

    /// Magic-byte fallback when no extractor claimed the extension
    fn sniff(&self, bytes: &[u8]) -> bool;

    /// Extract text and side-metadata
    ///
    /// # Errors
    ///
    /// Returns [`Error::Extraction`] for malformed or unsupported content.
    fn extract(&self, bytes: &[u8], path: &Path) -> Result<Extraction>;
}

/// Extension map plus sniffing fallback over the registered extractors
pub struct ExtractorRegistry {
    extractors: Vec<Arc<dyn Extractor>>,
    fallback: Arc<dyn Extractor>,
}

impl ExtractorRegistry {
    /// Registry with the built-in extractors: conversational-AI exports,
    /// source code, and plaintext/markdown (also the fallback)
    #[must_use]
    pub fn with_builtins() -> Self {
        let plain: Arc<dyn Extractor> = Arc::new(PlainTextExtractor::new());
        Self {
            extractors: vec![
                Arc::new(FaeExtractor::new()),
                Arc::new(CodeExtractor::new()),
                Arc::clone(&plain),
            ],
            fallback: plain,
        }
    }

    /// Register an additional extractor ahead of the built-ins
    pub fn register(&mut self, extractor: Arc<dyn Extractor>) {
        self.extractors.insert(0, extractor);
    }

    /// Resolve an extractor: extension first, magic-byte sniff second,
    /// plaintext fallback last (refusing content that is not text)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Extraction`] when the bytes are not extractable by
    /// any registered capability.
    pub fn resolve(&self, extension: &str, bytes: &[u8]) -> Result<Arc<dyn Extractor>> {
        for extractor in &self.extractors {
            if extractor.handles_extension(extension) {
                return Ok(Arc::clone(extractor));
            }
        }
        for extractor in &self.extractors {
            if extractor.sniff(bytes) {
                return Ok(Arc::clone(extractor));
            }
        }
        if self.fallback.sniff(bytes) {
            Ok(Arc::clone(&self.fallback))
        } else {
            Err(Error::Extraction(format!(
                "No extractor for extension '{extension}' and content did not sniff as text"
            )))
        }
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_markdown_to_plaintext() {
        let registry = ExtractorRegistry::with_builtins();
        let extractor = registry.resolve("md", b"# heading").expect("resolve");
        assert_eq!(extractor.name(), "plaintext");
    }

    #[test]
    fn resolves_rust_to_code() {
        let registry = ExtractorRegistry::with_builtins();
        let extractor = registry.resolve("rs", b"fn main() {}").expect("resolve");
        assert_eq!(extractor.name(), "code");
    }

    #[test]
    fn sniffs_unknown_extension_text() {
        let registry = ExtractorRegistry::with_builtins();
        let extractor = registry
            .resolve("weird", b"just ordinary notes")
            .expect("resolve");
        assert_eq!(extractor.name(), "plaintext");
    }

    #[test]
    fn refuses_binary_content() {
        let registry = ExtractorRegistry::with_builtins();
        let bytes: Vec<u8> = (0u16..512).map(|i| (i % 251) as u8).collect();
        assert!(registry.resolve("dat", &bytes).is_err());
    }

    #[test]
    fn sidecar_drafts_attach_their_file() {
        let image = ImageMeta {
            width: 800,
            height: 600,
            camera: Some("Pixel 9".to_string()),
            ..ImageMeta::default()
        };
        let sidecar = image.into_sidecar("file-1");
        assert_eq!(sidecar.file_id, "file-1");
        assert_eq!(sidecar.width, 800);

        let audio = AudioMeta {
            duration_secs: 12.5,
            ..AudioMeta::default()
        };
        assert_eq!(audio.into_sidecar("file-2").file_id, "file-2");
    }
}
