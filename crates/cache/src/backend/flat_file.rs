//! One file per key

use super::{ensure_dir, StorageBackend};
use crate::config::CacheConfig;
use crate::errors::{CacheError, Result, StoreType};
use crate::keys::hash;
use crate::lock::OpLock;
use crate::namespace::Namespace;
use memoria_utils::write_atomic;
use std::fs;
use std::io;
use std::path::PathBuf;

/// Longest file stem written; leaves room under NAME_MAX for the extension
/// and the temporary-file affixes
const MAX_FILE_STEM: usize = 200;

/// Prefix of stems derived from a key hash; percent-encoding never emits it
const HASHED_STEM_PREFIX: &str = "%h";

/// File stem for `key`
///
/// Keys are percent-encoded, with a leading `.` escaped as well, so every key
/// maps to a distinct plain file name inside the namespace directory. Stems
/// longer than [`MAX_FILE_STEM`] are replaced by a hash of the key.
fn file_stem(key: &str) -> String {
    let encoded = urlencoding::encode(key);
    let stem = match encoded.strip_prefix('.') {
        Some(rest) => format!("%2E{rest}"),
        None => encoded.into_owned(),
    };

    if stem.len() > MAX_FILE_STEM {
        format!("{HASHED_STEM_PREFIX}{}", hash(key))
    } else {
        stem
    }
}

/// Stores each entry as `<namespace dir>/<key>.<ext>`
///
/// Keys that are not plain file names are escaped, see [`file_stem`].
///
/// Writes land in a temporary sibling that is renamed over the target, so a
/// reader never observes a partial file. Without `thread_safe`, concurrent
/// writers of one key race and the last rename wins.
#[derive(Debug)]
pub struct FlatFileBackend {
    dir: PathBuf,
    namespace: String,
    extension: &'static str,
    lock: OpLock,
}

impl FlatFileBackend {
    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", file_stem(key), self.extension))
    }
}

impl StorageBackend for FlatFileBackend {
    const KIND: StoreType = StoreType::FlatFile;

    fn open(namespace: &Namespace, config: &CacheConfig) -> Result<Self> {
        let dir = namespace.path();
        ensure_dir(&dir)?;

        Ok(Self {
            dir,
            namespace: namespace.name().to_string(),
            extension: config.codec.extension(),
            lock: OpLock::new(config.thread_safe),
        })
    }

    fn location(&self) -> String {
        self.dir.to_string_lossy().into_owned()
    }

    fn op_lock(&self) -> &OpLock {
        &self.lock
    }

    fn contains(&self, key: &str) -> Result<bool> {
        let path = self.entry_path(key);
        match fs::metadata(&path) {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::io(&path, "stat entry", e)),
        }
    }

    fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.entry_path(key);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::io(&path, "read entry", e)),
        }
    }

    fn store(&self, key: &str, bytes: &[u8]) -> Result<()> {
        // The directory may have been removed externally since construction
        if !self.dir.is_dir() {
            ensure_dir(&self.dir)?;
        }

        write_atomic(&self.entry_path(key), bytes)
            .map_err(|e| CacheError::write_failed(&self.namespace, key, e.to_string()))
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let path = self.entry_path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::io(&path, "remove entry", e)),
        }
    }
}
