//! Hierarchical storage namespaces
//!
//! Every handle stores its entries under `<base_dir>/.cache/<namespace>`.
//! Sub-caches extend the parent's namespace with one more `/`-separated
//! segment, so sibling and parent keys never share a storage location.

use crate::errors::{CacheError, Result};
use std::fmt;
use std::panic::Location;
use std::path::{Path, PathBuf};

/// Directory below the base directory that holds every namespace
pub const CACHE_DIR_NAME: &str = ".cache";

/// Separator between namespace segments
pub const NAMESPACE_SEPARATOR: char = '/';

/// Joiner between a derived sub-cache name and its explicit suffix
pub const SUFFIX_JOINER: &str = "__";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    root: PathBuf,
    name: String,
}

impl Namespace {
    /// Create a namespace rooted at `<base_dir>/.cache`
    pub fn new(base_dir: impl AsRef<Path>, name: &str) -> Result<Self> {
        Ok(Self {
            root: base_dir.as_ref().join(CACHE_DIR_NAME),
            name: normalize(name)?,
        })
    }

    /// Namespace one level below this one
    pub fn child(&self, name: &str) -> Result<Self> {
        let child = normalize(name)?;
        Ok(Self {
            root: self.root.clone(),
            name: format!("{}{NAMESPACE_SEPARATOR}{child}", self.name),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `<base_dir>/.cache`
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding this namespace's entries
    pub fn path(&self) -> PathBuf {
        self.name
            .split(NAMESPACE_SEPARATOR)
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }

    pub fn depth(&self) -> usize {
        self.name.split(NAMESPACE_SEPARATOR).count()
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Name derived from the calling source file, e.g. `llm_client` for `src/llm_client.rs`
pub fn caller_name(caller: &Location<'_>) -> String {
    Path::new(caller.file())
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .unwrap_or("default")
        .to_string()
}

/// Sub-cache name: the caller's name, plus `__<suffix>` when one is given
pub fn derive_child_name(caller: &Location<'_>, suffix: Option<&str>) -> String {
    let base = caller_name(caller);
    match suffix.map(str::trim).filter(|s| !s.is_empty()) {
        Some(suffix) => format!("{base}{SUFFIX_JOINER}{suffix}"),
        None => base,
    }
}

/// Trim surrounding separators and reject segments that would escape the root
fn normalize(name: &str) -> Result<String> {
    let trimmed = name.trim_matches(NAMESPACE_SEPARATOR);

    if trimmed.is_empty() {
        return Err(CacheError::configuration(format!(
            "namespace '{name}' is empty"
        )));
    }

    for segment in trimmed.split(NAMESPACE_SEPARATOR) {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(CacheError::configuration(format!(
                "namespace '{name}' contains an invalid segment '{segment}'"
            )));
        }
        if segment.contains('\\') || segment.contains('\0') {
            return Err(CacheError::configuration(format!(
                "namespace '{name}' contains a forbidden character"
            )));
        }
    }

    Ok(trimmed.to_string())
}
