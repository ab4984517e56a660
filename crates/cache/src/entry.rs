//! TTL envelope around stored values

pub mod format;

use crate::codec::Codec;
use crate::errors::Result;
use format::RawEntry;
use serde::{de::DeserializeOwned, Serialize};

/// A value with its write time and optional time-to-live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry<T> {
    pub data: T,
    /// Unix seconds at write time
    pub timestamp: u64,
    /// Seconds the entry stays valid; `None` never expires
    pub ttl_s: Option<u64>,
}

impl<T> CacheEntry<T> {
    pub fn new(data: T, timestamp: u64, ttl_s: Option<u64>) -> Self {
        Self {
            data,
            timestamp,
            ttl_s,
        }
    }

    /// Valid iff there is no TTL or less than `ttl_s` seconds have passed
    pub fn is_valid_at(&self, now: u64) -> bool {
        format::is_valid(self.timestamp, self.ttl_s, now)
    }

    pub fn expires_at(&self) -> Option<u64> {
        self.ttl_s.map(|ttl| self.timestamp.saturating_add(ttl))
    }
}

impl<T: Serialize> CacheEntry<T> {
    pub fn encode(&self, codec: Codec) -> Result<Vec<u8>> {
        let payload = codec.encode(&self.data)?;
        format::encode_raw(&payload, self.timestamp, self.ttl_s)
    }
}

/// A decoded stored value
///
/// `Legacy` values were persisted without an envelope and carry no
/// timestamp or TTL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry<T> {
    Legacy(T),
    Enveloped(CacheEntry<T>),
}

impl<T: DeserializeOwned> Entry<T> {
    pub fn decode(bytes: &[u8], codec: Codec) -> Result<Self> {
        match format::decode_raw(bytes)? {
            RawEntry::Legacy(payload) => Ok(Self::Legacy(codec.decode(payload)?)),
            RawEntry::Enveloped { header, payload } => Ok(Self::Enveloped(CacheEntry {
                data: codec.decode(payload)?,
                timestamp: header.timestamp,
                ttl_s: header.ttl_s(),
            })),
        }
    }
}

impl<T> Entry<T> {
    pub fn is_legacy(&self) -> bool {
        matches!(self, Self::Legacy(_))
    }

    /// Legacy entries never expire
    pub fn is_valid_at(&self, now: u64) -> bool {
        match self {
            Self::Legacy(_) => true,
            Self::Enveloped(entry) => entry.is_valid_at(now),
        }
    }

    pub fn into_data(self) -> T {
        match self {
            Self::Legacy(data) => data,
            Self::Enveloped(entry) => entry.data,
        }
    }
}
