//! Value serialization boundary
//!
//! The cache engine stores bytes plus envelope metadata; turning values into
//! bytes is the codec's job. Any `Serialize + DeserializeOwned` type is a valid
//! cache value, subject to what the chosen format can represent.

use crate::errors::{CacheError, RecoveryHint, Result, SerializationOp};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};

/// Encoding used for cached values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    /// Compact binary encoding for typed values
    #[default]
    Bincode,
    /// Self-describing JSON; required for dynamically typed values such as `serde_json::Value`
    Json,
}

impl Codec {
    /// Serialize a value for cache storage
    pub fn encode<T: Serialize + ?Sized>(self, value: &T) -> Result<Vec<u8>> {
        let encoded = match self {
            Self::Bincode => bincode::serialize(value).map_err(|e| {
                Box::new(e) as Box<dyn std::error::Error + Send + Sync>
            }),
            Self::Json => serde_json::to_vec(value).map_err(|e| {
                Box::new(e) as Box<dyn std::error::Error + Send + Sync>
            }),
        };

        encoded.map_err(|source| CacheError::Serialization {
            key: String::new(),
            operation: SerializationOp::Encode,
            source,
            recovery_hint: RecoveryHint::Manual {
                instructions: "Check that the value is serializable with the configured codec"
                    .to_string(),
            },
        })
    }

    /// Deserialize a value from cache storage
    pub fn decode<T: DeserializeOwned>(self, data: &[u8]) -> Result<T> {
        match self {
            Self::Bincode => bincode::deserialize(data).map_err(CacheError::from),
            Self::Json => serde_json::from_slice(data).map_err(CacheError::from),
        }
    }

    /// Whether `data` parses as some value of this format
    ///
    /// `None` when the format is not self-describing and can only be checked
    /// against a concrete type.
    pub fn is_well_formed(self, data: &[u8]) -> Option<bool> {
        match self {
            Self::Bincode => None,
            Self::Json => Some(serde_json::from_slice::<IgnoredAny>(data).is_ok()),
        }
    }

    /// File extension used by the flat-file backend
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Bincode => "bin",
            Self::Json => "json",
        }
    }
}
