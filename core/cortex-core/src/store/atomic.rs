//! Crash-safe file replacement.
//!
//! Bytes go to a `.tmp-*` sibling of the target, which is then renamed over it. The
//! sibling lives in the same directory so the rename never crosses a filesystem. If
//! anything fails before the rename, the temp file is removed on drop and the target
//! keeps its previous contents.
//!
//! Callers serialize writers that share a target path; this module does no locking.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use tempfile::Builder;

use crate::error::{CortexError, Result};

/// Prefix of in-flight temp files. Directory scans skip names starting with it.
pub const TEMP_PREFIX: &str = ".tmp-";

/// Atomically replaces `path` with `data`.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    write_atomic_with(path, |file| file.write_all(data))
}

/// Atomically replaces `path` with whatever `fill` writes into the temp file.
///
/// An error from `fill` aborts the write before the rename.
pub fn write_atomic_with<F>(path: &Path, fill: F) -> Result<()>
where
    F: FnOnce(&mut File) -> std::io::Result<()>,
{
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut temp = Builder::new()
        .prefix(TEMP_PREFIX)
        .tempfile_in(parent)
        .map_err(|e| {
            CortexError::io(format!("creating temp file in {}", parent.display()), e)
        })?;

    fill(temp.as_file_mut())
        .and_then(|_| temp.as_file_mut().flush())
        .map_err(|e| CortexError::io(format!("writing temp file for {}", path.display()), e))?;

    temp.persist(path).map_err(|e| {
        CortexError::io(format!("renaming temp file onto {}", path.display()), e.error)
    })?;

    Ok(())
}

/// Returns true for names that belong to in-flight writes or hidden files.
pub(crate) fn is_ignored_name(name: &str) -> bool {
    name.starts_with('.') || name.starts_with(TEMP_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fs_err as fs;
    use tempfile::TempDir;

    fn temp_leftovers(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .filter(|n| n.starts_with(TEMP_PREFIX))
            .collect()
    }

    #[test]
    fn creates_new_file() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("new.md");

        write_atomic(&target, b"hello").unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "hello");
        assert!(temp_leftovers(temp.path()).is_empty());
    }

    #[test]
    fn replaces_existing_file() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("file.md");
        fs::write(&target, "old contents that are longer").unwrap();

        write_atomic(&target, b"new").unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "new");
    }

    #[test]
    fn aborted_write_leaves_target_untouched() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("file.md");
        fs::write(&target, "original").unwrap();

        let result = write_atomic_with(&target, |file| {
            file.write_all(b"partial")?;
            Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"))
        });

        assert!(matches!(result, Err(CortexError::Io { .. })));
        assert_eq!(fs::read_to_string(&target).unwrap(), "original");
        assert!(temp_leftovers(temp.path()).is_empty());
    }

    #[test]
    fn failed_rename_cleans_up_temp_file() {
        let temp = TempDir::new().unwrap();
        // A non-empty directory cannot be replaced by a file rename.
        let target = temp.path().join("occupied");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("keep.txt"), "x").unwrap();

        assert!(write_atomic(&target, b"data").is_err());
        assert!(target.join("keep.txt").exists());
        assert!(temp_leftovers(temp.path()).is_empty());
    }

    #[test]
    fn missing_parent_directory_is_io_error() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("nope").join("file.md");
        assert!(matches!(
            write_atomic(&target, b"x"),
            Err(CortexError::Io { .. })
        ));
    }

    #[test]
    fn ignored_names() {
        assert!(is_ignored_name(".tmp-abc123"));
        assert!(is_ignored_name(".DS_Store"));
        assert!(!is_ignored_name("fix-login-1234abcd.md"));
    }
}
