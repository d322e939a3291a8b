//! Filesystem metadata helpers
//!
//! This module wraps the handful of OS primitives the persistence engine
//! relies on: symlink redirection, size and modification-time probes that
//! treat a missing file as absent rather than an error, and best-effort
//! clearing of platform file attributes before an overwrite.
//!
//! ## Cross-Platform Behavior
//!
//! - **Unix**: attribute clearing is a no-op; symlinks resolve natively
//! - **Windows**: the read-only attribute is cleared before overwriting,
//!   mirroring how hidden configuration files must be made writable first

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::trace;

/// Resolve one level of symlink indirection
///
/// If `path` is a symbolic link, returns the link's target so that edits
/// land on the intended file rather than replacing the link itself. A
/// relative target is resolved against the link's parent directory. Any
/// other path, including a missing one, is returned unchanged.
///
/// Only a single level is followed; a chain of links resolves to the next
/// link, matching the behavior of editors that preserve link structure.
pub fn redirected_path(path: &Path) -> PathBuf {
    let Ok(metadata) = fs::symlink_metadata(path) else {
        return path.to_path_buf();
    };
    if !metadata.file_type().is_symlink() {
        return path.to_path_buf();
    }

    match fs::read_link(path) {
        Ok(target) if target.is_absolute() => {
            trace!("Redirecting {:?} to link target {:?}", path, target);
            target
        }
        Ok(target) => {
            let resolved = match path.parent() {
                Some(parent) => parent.join(&target),
                None => target,
            };
            trace!("Redirecting {:?} to link target {:?}", path, resolved);
            resolved
        }
        Err(_) => path.to_path_buf(),
    }
}

/// Size of a regular file in bytes, or `None` if it is missing or not a file
pub fn file_size(path: &Path) -> Option<u64> {
    let metadata = fs::metadata(path).ok()?;
    metadata.is_file().then(|| metadata.len())
}

/// Last modification time of a file, or `None` if it cannot be read
pub fn modification_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).ok()?.modified().ok()
}

/// Clear file attributes that would block an overwrite (best-effort)
///
/// Failure is ignored; if the attribute genuinely prevents writing, the
/// write itself will fail and report the error.
#[cfg(windows)]
pub fn clear_overwrite_attributes(path: &Path) {
    if let Ok(metadata) = fs::metadata(path) {
        let mut perms = metadata.permissions();
        if perms.readonly() {
            perms.set_readonly(false);
            let _ = fs::set_permissions(path, perms);
        }
    }
}

/// Clear file attributes that would block an overwrite (best-effort)
#[cfg(not(windows))]
pub fn clear_overwrite_attributes(_path: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_size() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("data.xml");

        assert_eq!(file_size(&file), None);

        fs::write(&file, b"hello").unwrap();
        assert_eq!(file_size(&file), Some(5));

        assert_eq!(file_size(temp_dir.path()), None);
    }

    #[test]
    fn test_modification_time() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("data.xml");

        assert_eq!(modification_time(&file), None);

        fs::write(&file, b"hello").unwrap();
        assert!(modification_time(&file).is_some());
    }

    #[test]
    fn test_redirected_path_regular_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("data.xml");
        fs::write(&file, b"hello").unwrap();

        assert_eq!(redirected_path(&file), file);
    }

    #[cfg(unix)]
    #[test]
    fn test_redirected_path_follows_one_level() {
        use std::os::unix::fs::symlink;

        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("real.xml");
        let link = temp_dir.path().join("link.xml");
        fs::write(&target, b"hello").unwrap();
        symlink(&target, &link).unwrap();

        assert_eq!(redirected_path(&link), target);
    }

    #[cfg(unix)]
    #[test]
    fn test_redirected_path_relative_target() {
        use std::os::unix::fs::symlink;

        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("real.xml");
        let link = temp_dir.path().join("link.xml");
        fs::write(&target, b"hello").unwrap();
        symlink(Path::new("real.xml"), &link).unwrap();

        assert_eq!(redirected_path(&link), temp_dir.path().join("real.xml"));
    }

    #[test]
    fn test_missing_path_unchanged() {
        let p = Path::new("/nonexistent/config.xml");
        assert_eq!(redirected_path(p), p);
    }
}
