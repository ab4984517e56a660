//! Recovery utilities for cache errors

use super::types::{CacheError, RecoveryHint};

impl CacheError {
    /// Get the recovery hint for this error
    #[must_use]
    pub const fn recovery_hint(&self) -> &RecoveryHint {
        match self {
            Self::EntryNotFound { recovery_hint, .. }
            | Self::EntryWriteFailed { recovery_hint, .. }
            | Self::EngineInitializationFailed { recovery_hint, .. }
            | Self::EntryMalformed { recovery_hint, .. }
            | Self::Io { recovery_hint, .. }
            | Self::Serialization { recovery_hint, .. }
            | Self::InvalidKey { recovery_hint, .. }
            | Self::Storage { recovery_hint, .. }
            | Self::Configuration { recovery_hint, .. } => recovery_hint,
        }
    }

    /// A cold or expired entry; callers compute the value and populate the cache
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::EntryNotFound { .. })
    }

    /// The storage reported an inconsistent state for the key
    #[must_use]
    pub const fn is_malformed(&self) -> bool {
        matches!(self, Self::EntryMalformed { .. })
    }

    /// Check if this error is transient and can be retried
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self.recovery_hint(),
            RecoveryHint::Retry { .. } | RecoveryHint::EnableThreadSafety
        )
    }
}
