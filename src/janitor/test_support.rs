//! Failing doubles shared by the pass tests.

use std::io;
use std::path::Path;

use crate::core::errors::{JanitorError, Result};
use crate::platform::capacity::{DiskCapacityProbe, DiskUsage};
use crate::platform::fs::{DirEntryInfo, Filesystem, LocalFilesystem};

/// Local filesystem whose removals always fail.
pub(crate) struct ReadOnlyFs;

impl Filesystem for ReadOnlyFs {
    fn list_dir(&self, dir: &Path) -> Result<Vec<DirEntryInfo>> {
        LocalFilesystem.list_dir(dir)
    }

    fn file_size(&self, path: &Path) -> Result<u64> {
        LocalFilesystem.file_size(path)
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        Err(JanitorError::io(
            path,
            io::Error::new(io::ErrorKind::PermissionDenied, "read-only"),
        ))
    }
}

/// Capacity source that can never be read.
pub(crate) struct UnreadableVolume;

impl DiskCapacityProbe for UnreadableVolume {
    fn size(&self) -> Result<DiskUsage> {
        Err(JanitorError::DiskCapacity {
            path: "/unreadable".into(),
            details: "statvfs: input/output error".to_string(),
        })
    }
}
