//! Error types for the strata engine

/// Result type alias for strata operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy for the indexing and correlation engine
///
/// Variants map to handling policy, not to the module that raised them:
/// transient and extraction failures are confined to the job that hit them,
/// programmer and consistency errors must propagate, fatal errors refuse
/// daemon startup.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Disk full, file temporarily locked, interrupted read
    #[error("Transient I/O error: {0}")]
    TransientIo(String),

    /// Malformed file, unsupported format variant
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// Signature or shape mismatch between pipeline and stores; never swallowed
    #[error("Programmer error: {0}")]
    Programmer(String),

    /// Chunk without vector or vector without chunk outside reconciliation
    #[error("Consistency violation: {0}")]
    Consistency(String),

    /// GPU probe, network-backed provider or other optional capability missing
    #[error("External capability unavailable: {0}")]
    ExternalUnavailable(String),

    /// Cannot open a store, second daemon instance, bad bootstrap ordering
    #[error("Fatal: {0}")]
    Fatal(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Check if this error is recoverable by re-running the same job later
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::TransientIo(_) | Error::Storage(_) | Error::Io(_) => true,
            Error::Extraction(_)
            | Error::Programmer(_)
            | Error::Consistency(_)
            | Error::ExternalUnavailable(_)
            | Error::Fatal(_)
            | Error::NotFound(_)
            | Error::InvalidInput(_)
            | Error::InvalidState(_)
            | Error::Serialization(_) => false,
        }
    }

    /// Programmer and consistency errors must be logged at error level and
    /// re-raised, never downgraded to a warning.
    pub fn is_programmer(&self) -> bool {
        matches!(self, Error::Programmer(_) | Error::Consistency(_))
    }

    /// Fatal errors refuse daemon startup with a diagnostic
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Fatal(_))
    }
}
