//! Disk capacity probe: total and free bytes of the volume holding a path.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use crate::core::errors::{JanitorError, Result};

/// Capacity snapshot for one volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskUsage {
    pub total_bytes: u64,
    pub free_bytes: u64,
}

impl DiskUsage {
    /// Bytes that must be free for `percent` of the volume to be free.
    #[must_use]
    pub fn desired_free_bytes(&self, percent: u8) -> u64 {
        let wide = u128::from(self.total_bytes) * u128::from(percent) / 100;
        u64::try_from(wide).unwrap_or(u64::MAX)
    }
}

/// Reports the capacity of the volume a probe was built for.
pub trait DiskCapacityProbe: Send + Sync {
    fn size(&self) -> Result<DiskUsage>;
}

/// `statvfs`-backed probe. Free bytes are those available to unprivileged
/// writers (`f_bavail`), which is what uploads and conversions compete for.
#[derive(Debug, Clone)]
pub struct StatvfsProbe {
    path: PathBuf,
}

impl StatvfsProbe {
    /// Build a probe for the volume containing `path`. Fails if the volume
    /// cannot be inspected right now.
    pub fn new(path: &Path) -> Result<Self> {
        let probe = Self {
            path: path.to_path_buf(),
        };
        probe.size()?;
        Ok(probe)
    }
}

#[cfg(unix)]
impl DiskCapacityProbe for StatvfsProbe {
    #[allow(clippy::useless_conversion)]
    fn size(&self) -> Result<DiskUsage> {
        let stat =
            nix::sys::statvfs::statvfs(&self.path).map_err(|error| JanitorError::DiskCapacity {
                path: self.path.clone(),
                details: error.to_string(),
            })?;
        let fragment = u64::from(stat.fragment_size());
        Ok(DiskUsage {
            total_bytes: u64::from(stat.blocks()).saturating_mul(fragment),
            free_bytes: u64::from(stat.blocks_available()).saturating_mul(fragment),
        })
    }
}

#[cfg(not(unix))]
impl DiskCapacityProbe for StatvfsProbe {
    fn size(&self) -> Result<DiskUsage> {
        Err(JanitorError::UnsupportedPlatform {
            details: format!(
                "no disk capacity probe for {} on this platform",
                self.path.display()
            ),
        })
    }
}

/// Probe returning a fixed reading, for deterministic tests and dry runs.
#[derive(Debug, Clone, Copy)]
pub struct FixedCapacityProbe {
    usage: DiskUsage,
}

impl FixedCapacityProbe {
    #[must_use]
    pub fn new(total_bytes: u64, free_bytes: u64) -> Self {
        Self {
            usage: DiskUsage {
                total_bytes,
                free_bytes,
            },
        }
    }
}

impl DiskCapacityProbe for FixedCapacityProbe {
    fn size(&self) -> Result<DiskUsage> {
        Ok(self.usage)
    }
}
