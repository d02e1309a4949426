//! Swapping a rewritten archive in place of the original

use std::fs::{self, File};
use std::io;
use std::path::Path;

use crate::error::{Error, Result};

/// Moves a finished file over its destination
pub trait Replacer {
    /// Replace `to` with `from`. After success `from` no longer exists.
    fn replace(&self, from: &Path, to: &Path) -> io::Result<()>;
}

/// Replaces the destination with a single rename
///
/// `rename(2)` swaps the directory entry atomically on Unix and the standard
/// library uses `MoveFileExW(MOVEFILE_REPLACE_EXISTING)` on Windows, so the
/// destination always holds either the old or the new archive.
#[derive(Debug, Default, Clone, Copy)]
pub struct RenameReplacer;

impl Replacer for RenameReplacer {
    fn replace(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }
}

/// Replace `original` with `temp` after checking both files
///
/// When a check fails neither file is touched. When the replacer fails the
/// temporary file is left on disk.
pub fn swap_into_place(original: &Path, temp: &Path, replacer: &dyn Replacer) -> Result<()> {
    let original_meta = fs::metadata(original).map_err(|e| {
        Error::Swap(format!("original {} is not accessible: {}", original.display(), e))
    })?;
    if !original_meta.is_file() {
        return Err(Error::Swap(format!(
            "original {} is not a regular file",
            original.display()
        )));
    }

    let temp_meta = fs::metadata(temp)
        .map_err(|e| Error::Swap(format!("temporary file {} is missing: {}", temp.display(), e)))?;
    if !temp_meta.is_file() {
        return Err(Error::Swap(format!(
            "temporary file {} is not a regular file",
            temp.display()
        )));
    }
    // Opened only to prove it is readable, closed before the rename
    drop(File::open(temp).map_err(|e| {
        Error::Swap(format!("temporary file {} is not readable: {}", temp.display(), e))
    })?);

    replacer.replace(temp, original).map_err(|e| {
        Error::Swap(format!(
            "cannot move {} to {}: {}",
            temp.display(),
            original.display(),
            e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct FailingReplacer;

    impl Replacer for FailingReplacer {
        fn replace(&self, _from: &Path, _to: &Path) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::Other, "injected failure"))
        }
    }

    #[test]
    fn test_swap_replaces_original() {
        let dir = TempDir::new().unwrap();
        let original = dir.path().join("a.jar");
        let temp = dir.path().join("a.jar.tmp");
        fs::write(&original, b"old").unwrap();
        fs::write(&temp, b"new").unwrap();

        swap_into_place(&original, &temp, &RenameReplacer).unwrap();

        assert_eq!(fs::read(&original).unwrap(), b"new");
        assert!(!temp.exists());
    }

    #[test]
    fn test_swap_requires_temp_file() {
        let dir = TempDir::new().unwrap();
        let original = dir.path().join("a.jar");
        fs::write(&original, b"old").unwrap();

        let result = swap_into_place(&original, &dir.path().join("missing.tmp"), &RenameReplacer);

        assert!(matches!(result, Err(Error::Swap(_))));
        assert_eq!(fs::read(&original).unwrap(), b"old");
    }

    #[test]
    fn test_swap_requires_original_file() {
        let dir = TempDir::new().unwrap();
        let original = dir.path().join("a.jar");
        let temp = dir.path().join("a.jar.tmp");
        fs::create_dir(&original).unwrap();
        fs::write(&temp, b"new").unwrap();

        let result = swap_into_place(&original, &temp, &RenameReplacer);

        assert!(matches!(result, Err(Error::Swap(_))));
        assert!(original.is_dir());
        assert_eq!(fs::read(&temp).unwrap(), b"new");
    }

    #[test]
    fn test_failed_replace_keeps_both_files() {
        let dir = TempDir::new().unwrap();
        let original = dir.path().join("a.jar");
        let temp = dir.path().join("a.jar.tmp");
        fs::write(&original, b"old").unwrap();
        fs::write(&temp, b"new").unwrap();

        let result = swap_into_place(&original, &temp, &FailingReplacer);

        assert!(matches!(result, Err(Error::Swap(_))));
        assert_eq!(fs::read(&original).unwrap(), b"old");
        assert_eq!(fs::read(&temp).unwrap(), b"new");
    }
}
