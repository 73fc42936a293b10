//! File identity across renames.

use std::io;
use std::path::Path;

/// `(device_id, inode)` pair. Two paths with the same `DevInode` refer to
/// the same underlying file even if one was renamed or replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DevInode {
    pub device: u64,
    pub inode: u64,
}

impl DevInode {
    pub fn is_valid(&self) -> bool {
        self.device != 0 && self.inode != 0
    }

    #[cfg(unix)]
    fn from_metadata(meta: &std::fs::Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;
        DevInode {
            device: meta.dev(),
            inode: meta.ino(),
        }
    }

    #[cfg(not(unix))]
    fn from_metadata(_meta: &std::fs::Metadata) -> Self {
        // No stable dev/inode concept off Unix; every file is reported
        // invalid so callers skip it rather than silently misidentifying
        // distinct files as the same one.
        DevInode::default()
    }
}

/// Stats `path` and extracts its [`DevInode`].
pub fn stat_dev_inode(path: &Path) -> io::Result<DevInode> {
    let meta = std::fs::metadata(path)?;
    Ok(DevInode::from_metadata(&meta))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_dev_inode_is_invalid() {
        assert!(!DevInode::default().is_valid());
    }

    #[cfg(unix)]
    #[test]
    fn stat_real_file_is_valid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.log");
        std::fs::write(&path, b"hi").unwrap();
        let di = stat_dev_inode(&path).unwrap();
        assert!(di.is_valid());
    }
}
