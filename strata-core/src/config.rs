//! Daemon configuration
//!
//! Configuration is loaded once at startup from `config.toml` in the state
//! directory (or an explicit path) and is immutable afterwards. All tunable
//! bounds of the engine live here so that tests can shrink them.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Top-level configuration for the strata daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrataConfig {
    /// State directory holding the catalog, vector index, jobs database,
    /// lock file and log file
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    /// Root directories watched for changes and scanned by excavation
    #[serde(default)]
    pub watch_roots: Vec<PathBuf>,
    /// HTTP control plane settings
    #[serde(default)]
    pub http: HttpConfig,
    /// File watcher settings
    #[serde(default)]
    pub watcher: WatcherConfig,
    /// Extraction pipeline settings
    #[serde(default)]
    pub extraction: ExtractionConfig,
    /// Correlation engine bounds and thresholds
    #[serde(default)]
    pub correlation: CorrelationConfig,
    /// Job queue settings
    #[serde(default)]
    pub queue: QueueConfig,
    /// Seconds the current job may keep running after shutdown is requested
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
}

/// HTTP control plane settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Bind address
    pub bind: String,
    /// TCP port
    pub port: u16,
}

/// File watcher settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Debounce window per path, milliseconds
    pub debounce_ms: u64,
    /// Extensions never ingested (lowercase, without dot)
    pub extension_blacklist: Vec<String>,
}

/// Extraction pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Lower bound for prose chunk size, tokens
    pub prose_min_tokens: usize,
    /// Upper bound for prose chunk size, tokens
    pub prose_max_tokens: usize,
    /// Hard cap for code chunk size, tokens
    pub code_max_tokens: usize,
    /// Embedding dimensionality; must match the provider
    pub embedding_dimension: usize,
    /// Entries in the embedding memoization cache
    pub embed_cache_size: usize,
    /// Largest file the pipeline will read, bytes
    pub max_file_size_bytes: u64,
}

/// Correlation engine bounds and discovery thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationConfig {
    /// Only the top-K most frequent consolidated entities participate in
    /// co-occurrence construction
    pub max_entities: usize,
    /// Per-file cap on entity pairs; larger sets are sampled deterministically
    pub max_pairs_per_file: usize,
    /// Hard cap on total pairs counted per run
    pub max_total_pairs: u64,
    /// Minimum confidence for a pattern to surface as a discovery
    pub min_confidence: f64,
    /// Minimum distinct source files for a pattern to surface
    pub min_sources: usize,
}

/// Job queue settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Attempt ceiling; a recovered job past this is failed terminally
    pub max_attempts: u32,
}

fn default_state_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".strata")
}

fn default_shutdown_grace() -> u64 {
    30
}

impl Default for StrataConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            watch_roots: Vec::new(),
            http: HttpConfig::default(),
            watcher: WatcherConfig::default(),
            extraction: ExtractionConfig::default(),
            correlation: CorrelationConfig::default(),
            queue: QueueConfig::default(),
            shutdown_grace_secs: default_shutdown_grace(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 7777,
        }
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            extension_blacklist: vec![
                "exe".to_string(),
                "dll".to_string(),
                "so".to_string(),
                "dylib".to_string(),
                "bin".to_string(),
                "o".to_string(),
                "a".to_string(),
                "zip".to_string(),
                "gz".to_string(),
                "tar".to_string(),
                "db".to_string(),
                "sqlite".to_string(),
                "redb".to_string(),
                "lock".to_string(),
                "tmp".to_string(),
            ],
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            prose_min_tokens: 500,
            prose_max_tokens: 1000,
            code_max_tokens: 1200,
            embedding_dimension: 384,
            embed_cache_size: 2048,
            max_file_size_bytes: 32 * 1024 * 1024,
        }
    }
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            max_entities: 50_000,
            max_pairs_per_file: 500,
            max_total_pairs: 1_000_000,
            min_confidence: 0.7,
            min_sources: 2,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

impl StrataConfig {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Fatal(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        toml::from_str(&content)
            .map_err(|e| Error::Fatal(format!("Failed to parse config {}: {}", path.display(), e)))
    }

    /// Load from the default location inside a state directory, falling back
    /// to defaults when no file exists
    pub fn load_or_default(state_dir: &Path) -> Result<Self> {
        let path = state_dir.join("config.toml");
        if path.exists() {
            let mut config = Self::load(&path)?;
            config.state_dir = state_dir.to_path_buf();
            Ok(config)
        } else {
            Ok(Self {
                state_dir: state_dir.to_path_buf(),
                ..Self::default()
            })
        }
    }

    /// Write the configuration to `config.toml` under the state directory
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::InvalidInput(format!("Failed to serialize config: {e}")))?;
        std::fs::create_dir_all(&self.state_dir)?;
        std::fs::write(self.state_dir.join("config.toml"), content)?;
        Ok(())
    }

    /// Path of the relational catalog database
    pub fn catalog_path(&self) -> PathBuf {
        self.state_dir.join("catalog.db")
    }

    /// Directory holding the vector index
    pub fn vector_dir(&self) -> PathBuf {
        self.state_dir.join("vectors")
    }

    /// Path of the vector database file
    pub fn vector_db_path(&self) -> PathBuf {
        self.vector_dir().join("vectors.db")
    }

    /// Path of the durable jobs database
    pub fn jobs_path(&self) -> PathBuf {
        self.state_dir.join("jobs.redb")
    }

    /// Path of the single-instance advisory lock
    pub fn lock_path(&self) -> PathBuf {
        self.state_dir.join("strata.lock")
    }

    /// Path of the rolling log file
    pub fn log_path(&self) -> PathBuf {
        self.state_dir.join("strata.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_published_bounds() {
        let config = StrataConfig::default();
        assert_eq!(config.watcher.debounce_ms, 500);
        assert_eq!(config.correlation.max_entities, 50_000);
        assert_eq!(config.correlation.max_pairs_per_file, 500);
        assert_eq!(config.correlation.max_total_pairs, 1_000_000);
        assert!((config.correlation.min_confidence - 0.7).abs() < f64::EPSILON);
        assert_eq!(config.correlation.min_sources, 2);
        assert_eq!(config.queue.max_attempts, 3);
        assert_eq!(config.http.port, 7777);
        assert_eq!(config.extraction.embedding_dimension, 384);
    }

    #[test]
    fn round_trips_through_toml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = StrataConfig {
            state_dir: dir.path().to_path_buf(),
            watch_roots: vec![PathBuf::from("/tmp/notes")],
            ..StrataConfig::default()
        };
        config.save().expect("save");

        let loaded = StrataConfig::load_or_default(dir.path()).expect("load");
        assert_eq!(loaded.watch_roots, config.watch_roots);
        assert_eq!(loaded.http.port, config.http.port);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let loaded = StrataConfig::load_or_default(dir.path()).expect("load");
        assert_eq!(loaded.state_dir, dir.path());
        assert!(loaded.watch_roots.is_empty());
    }
}
