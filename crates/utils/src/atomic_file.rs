//! Crash-safe file replacement
//!
//! Readers of a path written through [`write_atomic`] observe either the old
//! content or the new content, never a truncated file.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Write `content` to `path` through a sibling temporary file and a rename.
///
/// The parent directory must already exist. On failure the temporary file is
/// removed and the original file, if any, is left untouched.
pub fn write_atomic(path: &Path, content: &[u8]) -> io::Result<()> {
    let temp_path = temp_sibling(path)?;

    let written = (|| -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)?;
        file.write_all(content)?;
        file.sync_all()
    })();

    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    fs::rename(&temp_path, path).inspect_err(|_| {
        let _ = fs::remove_file(&temp_path);
    })
}

/// Temporary path next to `path`, hidden and unique per call.
fn temp_sibling(path: &Path) -> io::Result<PathBuf> {
    let parent = path.parent().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("path '{}' has no parent directory", path.display()),
        )
    })?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(parent.join(format!(".{file_name}.{}.tmp", Uuid::new_v4().simple())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_atomic_write() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("entry.bin");

        write_atomic(&file_path, b"payload").unwrap();

        assert_eq!(fs::read(&file_path).unwrap(), b"payload");
    }

    #[test]
    fn test_atomic_write_overwrites_existing() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("entry.bin");
        fs::write(&file_path, b"old").unwrap();

        write_atomic(&file_path, b"new").unwrap();

        assert_eq!(fs::read(&file_path).unwrap(), b"new");
    }

    #[test]
    fn test_atomic_write_leaves_no_temp_files() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("entry.bin");

        write_atomic(&file_path, b"one").unwrap();
        write_atomic(&file_path, b"two").unwrap();

        let names: Vec<_> = fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn test_atomic_write_is_complete_on_return() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("entry.bin");
        let content = vec![0xabu8; 1024 * 1024];

        write_atomic(&file_path, &content).unwrap();

        let on_disk = OpenOptions::new().read(true).open(&file_path).unwrap();
        assert_eq!(on_disk.metadata().unwrap().len(), content.len() as u64);
        assert_eq!(fs::read(&file_path).unwrap(), content);
    }

    #[test]
    fn test_atomic_write_missing_parent_fails() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("missing").join("entry.bin");

        assert!(write_atomic(&file_path, b"payload").is_err());
        assert!(!file_path.exists());
    }
}
