//! Atomic control-file replacement.
//!
//! Control files are downloaded to `<name>_new` and only renamed over the
//! original once fully on disk, so the original is never half-written. On
//! platforms that refuse to rename over an existing or open file the
//! original is first moved aside to `<name>_old`; that backup doubles as the
//! recovery source if the swap dies between the two renames.

use std::fs;
use std::io;
use std::path::Path;
use tracing::warn;

/// Suffix of an in-flight control file download.
pub const NEW_SUFFIX: &str = "_new";

/// Suffix of a pre-replace control file backup.
pub const OLD_SUFFIX: &str = "_old";

/// How a freshly downloaded control file replaces the original.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceStrategy {
    /// Rename the fresh copy directly over the original.
    Direct,
    /// Move the original aside to `<name>_old` first, then rename.
    BackupThenRename,
}

impl ReplaceStrategy {
    /// Strategy for the platform we are running on.
    pub fn for_platform() -> ReplaceStrategy {
        if cfg!(windows) {
            ReplaceStrategy::BackupThenRename
        } else {
            ReplaceStrategy::Direct
        }
    }

    /// Move `<name>_new` over `<name>` inside `dir`. Backup bookkeeping
    /// failures are logged and tolerated; a failed final rename propagates.
    pub fn replace(self, dir: &Path, name: &str) -> io::Result<()> {
        let original = dir.join(name);
        let fresh = dir.join(format!("{}{}", name, NEW_SUFFIX));

        if self == ReplaceStrategy::BackupThenRename && original.exists() {
            let backup = dir.join(format!("{}{}", name, OLD_SUFFIX));
            if backup.exists() {
                if let Err(e) = fs::remove_file(&backup) {
                    warn!("Failed to delete stale backup {}: {}", backup.display(), e);
                }
            }
            if let Err(e) = fs::rename(&original, &backup) {
                warn!(
                    "Failed to move {} aside; the final rename will likely fail: {}",
                    original.display(),
                    e
                );
            }
        }

        fs::rename(&fresh, &original)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_direct_replace_swaps_content() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("ctl.txt"), b"old").unwrap();
        fs::write(dir.path().join("ctl.txt_new"), b"new").unwrap();

        ReplaceStrategy::Direct.replace(dir.path(), "ctl.txt").unwrap();

        assert_eq!(fs::read(dir.path().join("ctl.txt")).unwrap(), b"new");
        assert!(!dir.path().join("ctl.txt_new").exists());
        assert!(!dir.path().join("ctl.txt_old").exists());
    }

    #[test]
    fn test_direct_replace_works_without_original() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("ctl.txt_new"), b"new").unwrap();

        ReplaceStrategy::Direct.replace(dir.path(), "ctl.txt").unwrap();
        assert_eq!(fs::read(dir.path().join("ctl.txt")).unwrap(), b"new");
    }

    #[test]
    fn test_backup_mode_preserves_previous_copy() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("ctl.txt"), b"old").unwrap();
        fs::write(dir.path().join("ctl.txt_new"), b"new").unwrap();

        ReplaceStrategy::BackupThenRename
            .replace(dir.path(), "ctl.txt")
            .unwrap();

        assert_eq!(fs::read(dir.path().join("ctl.txt")).unwrap(), b"new");
        assert_eq!(fs::read(dir.path().join("ctl.txt_old")).unwrap(), b"old");
        assert!(!dir.path().join("ctl.txt_new").exists());
    }

    #[test]
    fn test_backup_mode_replaces_stale_backup() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("ctl.txt"), b"current").unwrap();
        fs::write(dir.path().join("ctl.txt_old"), b"ancient").unwrap();
        fs::write(dir.path().join("ctl.txt_new"), b"new").unwrap();

        ReplaceStrategy::BackupThenRename
            .replace(dir.path(), "ctl.txt")
            .unwrap();

        assert_eq!(fs::read(dir.path().join("ctl.txt_old")).unwrap(), b"current");
    }

    #[test]
    fn test_failed_final_rename_leaves_backup_intact() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("ctl.txt"), b"old").unwrap();
        // no ctl.txt_new on disk, so the final rename must fail

        let result = ReplaceStrategy::BackupThenRename.replace(dir.path(), "ctl.txt");
        assert!(result.is_err());
        assert_eq!(fs::read(dir.path().join("ctl.txt_old")).unwrap(), b"old");
    }
}
