//! Error conversion utilities

use super::types::{CacheError, RecoveryHint, SerializationOp, StoreType};
use std::path::{Path, PathBuf};
use std::time::Duration;

impl CacheError {
    pub(crate) fn not_found(namespace: &str, key: &str) -> Self {
        Self::EntryNotFound {
            namespace: namespace.to_string(),
            key: key.to_string(),
            recovery_hint: RecoveryHint::Populate,
        }
    }

    pub(crate) fn write_failed(namespace: &str, key: &str, reason: impl Into<String>) -> Self {
        Self::EntryWriteFailed {
            namespace: namespace.to_string(),
            key: key.to_string(),
            reason: reason.into(),
            recovery_hint: RecoveryHint::CheckDiskSpace,
        }
    }

    pub(crate) fn init_failed(location: &Path, reason: impl Into<String>) -> Self {
        Self::EngineInitializationFailed {
            location: location.to_path_buf(),
            reason: reason.into(),
            recovery_hint: RecoveryHint::CheckPermissions {
                path: location.to_path_buf(),
            },
        }
    }

    pub(crate) fn malformed(key: &str, reason: impl Into<String>) -> Self {
        Self::EntryMalformed {
            key: key.to_string(),
            reason: reason.into(),
            recovery_hint: RecoveryHint::EnableThreadSafety,
        }
    }

    pub(crate) fn io(path: &Path, operation: &'static str, source: std::io::Error) -> Self {
        let recovery_hint = match source.kind() {
            std::io::ErrorKind::PermissionDenied => RecoveryHint::CheckPermissions {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::Interrupted | std::io::ErrorKind::WouldBlock => {
                RecoveryHint::Retry {
                    after: Duration::from_millis(10),
                }
            }
            _ => RecoveryHint::CheckDiskSpace,
        };
        Self::Io {
            path: path.to_path_buf(),
            operation,
            source,
            recovery_hint,
        }
    }

    pub(crate) fn storage(store: StoreType, operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Storage {
            store,
            operation,
            reason: reason.into(),
            recovery_hint: RecoveryHint::Retry {
                after: Duration::from_millis(50),
            },
        }
    }

    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            recovery_hint: RecoveryHint::UpdateConfiguration,
        }
    }

    pub(crate) fn invalid_key(key: &str, reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            key: key.to_string(),
            reason: reason.into(),
            recovery_hint: RecoveryHint::Manual {
                instructions: "Derive keys with create_cache_key".to_string(),
            },
        }
    }

    /// Attach the key to a serialization error raised by the codec
    pub(crate) fn for_key(self, key: &str) -> Self {
        match self {
            Self::Serialization {
                operation,
                source,
                recovery_hint,
                ..
            } => Self::Serialization {
                key: key.to_string(),
                operation,
                source,
                recovery_hint,
            },
            Self::EntryMalformed {
                reason,
                recovery_hint,
                ..
            } => Self::EntryMalformed {
                key: key.to_string(),
                reason,
                recovery_hint,
            },
            other => other,
        }
    }
}

impl From<std::io::Error> for CacheError {
    fn from(error: std::io::Error) -> Self {
        Self::io(&PathBuf::from("."), "unknown", error)
    }
}

/// Convert serde_json errors to cache errors
impl From<serde_json::Error> for CacheError {
    fn from(error: serde_json::Error) -> Self {
        let operation = if error.is_data() || error.is_syntax() || error.is_eof() {
            SerializationOp::Decode
        } else {
            SerializationOp::Encode
        };
        Self::Serialization {
            key: String::new(),
            operation,
            source: Box::new(error),
            recovery_hint: RecoveryHint::Invalidate,
        }
    }
}

/// Convert bincode errors to cache errors
impl From<bincode::Error> for CacheError {
    fn from(error: bincode::Error) -> Self {
        Self::Serialization {
            key: String::new(),
            operation: SerializationOp::Decode,
            source: error,
            recovery_hint: RecoveryHint::Invalidate,
        }
    }
}
