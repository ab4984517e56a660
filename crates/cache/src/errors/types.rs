//! Core error types for the cache system

use std::path::PathBuf;
use std::time::Duration;

/// Result type for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

/// Re-export CacheError as Error for convenience
pub use CacheError as Error;

/// Error type for cache operations
#[derive(Debug)]
pub enum CacheError {
    /// Requested key is absent or expired
    EntryNotFound {
        namespace: String,
        key: String,
        recovery_hint: RecoveryHint,
    },

    /// A write was attempted but could not be observed afterwards
    EntryWriteFailed {
        namespace: String,
        key: String,
        reason: String,
        recovery_hint: RecoveryHint,
    },

    /// Backend construction could not acquire its storage resource
    EngineInitializationFailed {
        location: PathBuf,
        reason: String,
        recovery_hint: RecoveryHint,
    },

    /// The storage reported an internal consistency error for a key
    EntryMalformed {
        key: String,
        reason: String,
        recovery_hint: RecoveryHint,
    },

    /// I/O errors during cache operations
    Io {
        path: PathBuf,
        operation: &'static str,
        source: std::io::Error,
        recovery_hint: RecoveryHint,
    },

    /// Serialization/deserialization errors
    Serialization {
        key: String,
        operation: SerializationOp,
        source: Box<dyn std::error::Error + Send + Sync>,
        recovery_hint: RecoveryHint,
    },

    /// Invalid cache key
    InvalidKey {
        key: String,
        reason: String,
        recovery_hint: RecoveryHint,
    },

    /// Backend failure outside the read/write taxonomy
    Storage {
        store: StoreType,
        operation: &'static str,
        reason: String,
        recovery_hint: RecoveryHint,
    },

    /// Configuration error
    Configuration {
        message: String,
        recovery_hint: RecoveryHint,
    },
}

/// Recovery hints for error handling
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryHint {
    /// Retry the operation
    Retry { after: Duration },

    /// Compute the value and populate the cache
    Populate,

    /// Remove the entry and recompute it
    Invalidate,

    /// Check file permissions
    CheckPermissions { path: PathBuf },

    /// Check disk space and clean up if needed
    CheckDiskSpace,

    /// Update cache configuration
    UpdateConfiguration,

    /// Serialize access through the thread-safe mode
    EnableThreadSafety,

    /// No automated recovery possible
    Manual { instructions: String },

    /// Operation can be safely ignored
    Ignore,
}

/// Serialization operation types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerializationOp {
    Encode,
    Decode,
}

/// Cache store types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreType {
    FlatFile,
    SingleFile,
    Engine,
    Null,
}

impl StoreType {
    /// Short human-readable name, also used in collector labels
    pub const fn name(self) -> &'static str {
        match self {
            Self::FlatFile => "FlatFileCache",
            Self::SingleFile => "SingleFileCache",
            Self::Engine => "EngineCache",
            Self::Null => "NullCache",
        }
    }
}
