//! Cache key derivation
//!
//! Keys are built from an ordered list of *plain* parts, kept readable with
//! unsafe characters replaced by `_`, and an ordered list of *hashed* parts,
//! each replaced by its content hash. Keys are never decoded back into their
//! inputs.

use crate::errors::{CacheError, Result};
use chrono::{Local, NaiveDate};
use indexmap::IndexMap;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt::Display;

/// Characters replaced with `_` in plain key parts
pub const UNSAFE_KEY_CHARS: &str = "*.,'\"|<>[]?!-:;()@#$%^&{} ";

/// Separator between key parts
pub const KEY_SEPARATOR: &str = "_";

/// Number of digest bytes kept by [`hash`]
const HASH_BYTES: usize = 16;

/// Ordered list of stringified key parts
///
/// A bare string becomes a single part, sequences become one part per item
/// and maps become `"key_value"` parts in iteration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyParts(Vec<String>);

impl KeyParts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a part, builder style
    #[must_use]
    pub fn with(mut self, part: impl Display) -> Self {
        self.push(part);
        self
    }

    pub fn push(&mut self, part: impl Display) {
        self.0.push(part.to_string());
    }

    /// Flatten `(key, value)` pairs into `"key_value"` parts
    pub fn from_pairs<K: Display, V: Display>(pairs: impl IntoIterator<Item = (K, V)>) -> Self {
        Self(pairs.into_iter().map(|(k, v)| format!("{k}_{v}")).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl From<&str> for KeyParts {
    fn from(part: &str) -> Self {
        Self(vec![part.to_string()])
    }
}

impl From<String> for KeyParts {
    fn from(part: String) -> Self {
        Self(vec![part])
    }
}

impl From<&String> for KeyParts {
    fn from(part: &String) -> Self {
        Self(vec![part.clone()])
    }
}

impl<T: Display> From<Vec<T>> for KeyParts {
    fn from(parts: Vec<T>) -> Self {
        parts.into_iter().collect()
    }
}

impl<T: Display> From<&[T]> for KeyParts {
    fn from(parts: &[T]) -> Self {
        parts.iter().collect()
    }
}

impl<T: Display, const N: usize> From<[T; N]> for KeyParts {
    fn from(parts: [T; N]) -> Self {
        parts.into_iter().collect()
    }
}

impl<K: Display, V: Display> From<IndexMap<K, V>> for KeyParts {
    fn from(map: IndexMap<K, V>) -> Self {
        Self::from_pairs(map)
    }
}

impl<K: Display, V: Display> From<BTreeMap<K, V>> for KeyParts {
    fn from(map: BTreeMap<K, V>) -> Self {
        Self::from_pairs(map)
    }
}

impl<T: Display> FromIterator<T> for KeyParts {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(iter.into_iter().map(|p| p.to_string()).collect())
    }
}

/// Stable content hash: SHA-256 truncated to 128 bits, lowercase hex
pub fn hash(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    hex::encode(&digest[..HASH_BYTES])
}

/// Replace every character of [`UNSAFE_KEY_CHARS`] with `_`
pub fn sanitize_part(part: &str) -> String {
    part.chars()
        .map(|c| if UNSAFE_KEY_CHARS.contains(c) { '_' } else { c })
        .collect()
}

/// Derive a cache key, optionally suffixed with today's local date (`YYYYMMDD`)
///
/// Fails with [`CacheError::InvalidKey`] when both part lists are empty.
pub fn create_cache_key(
    plain: impl Into<KeyParts>,
    hashed: impl Into<KeyParts>,
    with_current_date: bool,
) -> Result<String> {
    let date = with_current_date.then(|| Local::now().date_naive());
    compose_cache_key(plain, hashed, date)
}

/// Deterministic core of [`create_cache_key`] with an explicit date suffix
pub fn compose_cache_key(
    plain: impl Into<KeyParts>,
    hashed: impl Into<KeyParts>,
    date: Option<NaiveDate>,
) -> Result<String> {
    let plain = plain.into();
    let hashed = hashed.into();

    if plain.is_empty() && hashed.is_empty() {
        return Err(CacheError::invalid_key(
            "",
            "at least one plain or hashed key part is required",
        ));
    }

    let mut parts: Vec<String> = Vec::with_capacity(plain.len() + hashed.len() + 1);
    parts.extend(plain.iter().map(sanitize_part));
    parts.extend(hashed.iter().map(hash));
    if let Some(date) = date {
        parts.push(date.format("%Y%m%d").to_string());
    }

    Ok(parts.join(KEY_SEPARATOR))
}

/// Check that a key is usable with every backend
///
/// Any non-empty string is accepted. Backends whose storage names are
/// restricted (file names, engine key sizes) map keys onto admissible names
/// themselves.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::invalid_key(key, "key cannot be empty"));
    }

    Ok(())
}
