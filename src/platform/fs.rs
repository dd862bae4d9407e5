//! Filesystem accessor: the listing, stat and removal primitives the janitor
//! passes are written against.

#![allow(missing_docs)]

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::core::errors::{JanitorError, Result};

/// One regular file found by [`Filesystem::list_dir`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntryInfo {
    pub name: OsString,
    pub path: PathBuf,
    pub modified: SystemTime,
}

impl DirEntryInfo {
    /// UTF-8 view of the file name, if it has one.
    #[must_use]
    pub fn name_str(&self) -> Option<&str> {
        self.name.to_str()
    }
}

/// File operations used by the cleanup passes.
pub trait Filesystem: Send + Sync {
    /// List the files directly inside `dir`. Subdirectories are not reported.
    fn list_dir(&self, dir: &Path) -> Result<Vec<DirEntryInfo>>;
    /// Size in bytes of the file at `path`.
    fn file_size(&self, path: &Path) -> Result<u64>;
    fn remove_file(&self, path: &Path) -> Result<()>;
}

/// `std::fs` backed accessor.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFilesystem;

impl Filesystem for LocalFilesystem {
    fn list_dir(&self, dir: &Path) -> Result<Vec<DirEntryInfo>> {
        let reader = fs::read_dir(dir).map_err(|source| JanitorError::io(dir, source))?;

        let mut entries = Vec::new();
        for entry in reader {
            let entry = entry.map_err(|source| JanitorError::io(dir, source))?;
            let path = entry.path();
            let metadata = entry
                .metadata()
                .map_err(|source| JanitorError::io(&path, source))?;
            if metadata.is_dir() {
                continue;
            }
            let modified = metadata
                .modified()
                .map_err(|source| JanitorError::io(&path, source))?;
            entries.push(DirEntryInfo {
                name: entry.file_name(),
                path,
                modified,
            });
        }

        entries.sort_by(|left, right| left.name.cmp(&right.name));
        Ok(entries)
    }

    fn file_size(&self, path: &Path) -> Result<u64> {
        fs::metadata(path)
            .map(|metadata| metadata.len())
            .map_err(|source| JanitorError::io(path, source))
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).map_err(|source| JanitorError::io(path, source))
    }
}
