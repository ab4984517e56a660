//! Display implementations for cache errors

use super::types::CacheError;
use std::fmt;

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EntryNotFound { namespace, key, .. } => {
                write!(f, "Cache entry does not exist: {namespace}::{key}")
            }
            Self::EntryWriteFailed {
                namespace,
                key,
                reason,
                ..
            } => write!(
                f,
                "Cache entry {namespace}::{key} has not been set: {reason}"
            ),
            Self::EngineInitializationFailed {
                location, reason, ..
            } => write!(
                f,
                "Failed to initialize cache storage at '{}': {reason}",
                location.display()
            ),
            Self::EntryMalformed { key, reason, .. } => {
                write!(f, "Cache entry '{key}' is malformed: {reason}")
            }
            Self::Io {
                path,
                operation,
                source,
                ..
            } => write!(
                f,
                "I/O error during {} on '{}': {}",
                operation,
                path.display(),
                source
            ),
            Self::Serialization {
                key,
                operation,
                source,
                ..
            } => write!(f, "Failed to {operation:?} cache entry '{key}': {source}"),
            Self::InvalidKey { key, reason, .. } => {
                write!(f, "Invalid cache key '{key}': {reason}")
            }
            Self::Storage {
                store,
                operation,
                reason,
                ..
            } => write!(f, "{} failed to {operation}: {reason}", store.name()),
            Self::Configuration { message, .. } => {
                write!(f, "Cache configuration error: {message}")
            }
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Serialization { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}
