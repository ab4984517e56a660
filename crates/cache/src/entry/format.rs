//! Binary envelope format
//!
//! An enveloped entry is a fixed-size bincode header followed by the
//! codec-encoded payload. Bytes that do not start with [`ENTRY_MAGIC`] were
//! written before envelopes existed and are handed back untouched.

use crate::errors::{CacheError, RecoveryHint, Result, SerializationOp};
use crc32c::crc32c;
use serde::{Deserialize, Serialize};

/// Magic number for enveloped entries: "MEMO"
pub const ENTRY_MAGIC: u32 = u32::from_le_bytes(*b"MEMO");

/// Current envelope format version
pub const ENTRY_VERSION: u16 = 1;

/// Serialized size of [`EntryHeader`]
pub const HEADER_LEN: usize = 32;

/// Envelope header preceding every stored payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(C)]
pub struct EntryHeader {
    magic: u32,
    version: u16,
    /// Bit 0: TTL present
    flags: u16,
    /// CRC32C of the header with this field zeroed
    header_crc: u32,
    /// Unix seconds at write time
    pub timestamp: u64,
    ttl_s: u64,
    /// CRC32C of the payload
    pub data_crc: u32,
}

impl EntryHeader {
    const FLAG_TTL: u16 = 1 << 0;

    pub fn new(timestamp: u64, ttl_s: Option<u64>, payload: &[u8]) -> Self {
        let mut header = Self {
            magic: ENTRY_MAGIC,
            version: ENTRY_VERSION,
            flags: if ttl_s.is_some() { Self::FLAG_TTL } else { 0 },
            header_crc: 0,
            timestamp,
            ttl_s: ttl_s.unwrap_or(0),
            data_crc: crc32c(payload),
        };
        header.header_crc = header.calculate_crc();
        header
    }

    fn calculate_crc(&self) -> u32 {
        let mut temp = *self;
        temp.header_crc = 0;

        match bincode::serialize(&temp) {
            Ok(bytes) => crc32c(&bytes),
            Err(_) => 0,
        }
    }

    pub fn ttl_s(&self) -> Option<u64> {
        (self.flags & Self::FLAG_TTL != 0).then_some(self.ttl_s)
    }

    /// Whether the entry described by this header is still live at `now`
    pub fn is_valid_at(&self, now: u64) -> bool {
        is_valid(self.timestamp, self.ttl_s(), now)
    }

    fn validate(&self, payload: &[u8]) -> Result<()> {
        if self.version > ENTRY_VERSION {
            return Err(CacheError::EntryMalformed {
                key: String::new(),
                reason: format!("Unsupported entry version: {}", self.version),
                recovery_hint: RecoveryHint::Invalidate,
            });
        }

        let expected_crc = self.calculate_crc();
        if self.header_crc != expected_crc {
            return Err(CacheError::EntryMalformed {
                key: String::new(),
                reason: format!(
                    "Header CRC mismatch: expected {:08x}, got {:08x}",
                    expected_crc, self.header_crc
                ),
                recovery_hint: RecoveryHint::Invalidate,
            });
        }

        let actual_crc = crc32c(payload);
        if actual_crc != self.data_crc {
            return Err(CacheError::EntryMalformed {
                key: String::new(),
                reason: format!(
                    "Data CRC mismatch: expected {:08x}, got {:08x}",
                    self.data_crc, actual_crc
                ),
                recovery_hint: RecoveryHint::Invalidate,
            });
        }

        Ok(())
    }
}

/// Valid iff there is no TTL or less than `ttl_s` seconds have passed since `timestamp`
pub fn is_valid(timestamp: u64, ttl_s: Option<u64>, now: u64) -> bool {
    match ttl_s {
        None => true,
        Some(ttl) => now.saturating_sub(timestamp) < ttl,
    }
}

/// Stored bytes split into header and payload
#[derive(Debug, PartialEq, Eq)]
pub enum RawEntry<'a> {
    Legacy(&'a [u8]),
    Enveloped {
        header: EntryHeader,
        payload: &'a [u8],
    },
}

/// Prefix `payload` with an envelope header
pub fn encode_raw(payload: &[u8], timestamp: u64, ttl_s: Option<u64>) -> Result<Vec<u8>> {
    let header = EntryHeader::new(timestamp, ttl_s, payload);

    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    bincode::serialize_into(&mut out, &header).map_err(|e| CacheError::Serialization {
        key: String::new(),
        operation: SerializationOp::Encode,
        source: e,
        recovery_hint: RecoveryHint::Ignore,
    })?;
    out.extend_from_slice(payload);
    Ok(out)
}

/// Split stored bytes, validating the header when one is present
pub fn decode_raw(bytes: &[u8]) -> Result<RawEntry<'_>> {
    if !has_magic(bytes) {
        return Ok(RawEntry::Legacy(bytes));
    }

    if bytes.len() < HEADER_LEN {
        return Err(CacheError::EntryMalformed {
            key: String::new(),
            reason: format!("Truncated envelope: {} bytes", bytes.len()),
            recovery_hint: RecoveryHint::Invalidate,
        });
    }

    let (head, payload) = bytes.split_at(HEADER_LEN);
    let header: EntryHeader = bincode::deserialize(head)?;
    header.validate(payload)?;

    Ok(RawEntry::Enveloped { header, payload })
}

fn has_magic(bytes: &[u8]) -> bool {
    bytes
        .get(..4)
        .and_then(|m| <[u8; 4]>::try_from(m).ok())
        .is_some_and(|m| u32::from_le_bytes(m) == ENTRY_MAGIC)
}
