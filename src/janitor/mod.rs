//! The janitor: three cleanup passes over a bundle directory.
//!
//! 1. [`uploads`]: remove uploads that sat unconverted for too long.
//! 2. [`dead_dumps`]: remove dumps the authority reports as errored or does
//!    not know at all.
//! 3. [`free_space`]: evict dumps in the authority's order until the desired
//!    share of the volume is free.
//!
//! Passes run in that order and the first error aborts the run. Nothing is
//! carried between runs except the lazily built disk probe: every pass lists
//! the directory and asks the authority afresh, so the next run simply picks up
//! where a failed one stopped.

#![allow(missing_docs)]

pub mod batch;
pub mod dead_dumps;
pub mod free_space;
#[cfg(test)]
pub(crate) mod test_support;
pub mod uploads;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::authority::LifecycleAuthority;
use crate::core::config::JanitorConfig;
use crate::core::errors::Result;
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};
use crate::platform::capacity::DiskCapacityProbe;
use crate::platform::fs::{Filesystem, LocalFilesystem};

pub use self::batch::batch_ids;
pub use self::free_space::FreeSpaceOutcome;

/// Maximum number of dump ids sent to the authority in one states request.
pub const DEAD_DUMP_BATCH_SIZE: usize = 100;

/// Construction options for [`Janitor`].
#[derive(Debug, Clone)]
pub struct JanitorOpts {
    pub bundle_dir: PathBuf,
    /// Share of the volume to keep free, 0..=100.
    pub desired_percent_free: u8,
    pub max_unconverted_upload_age: Duration,
}

impl From<&JanitorConfig> for JanitorOpts {
    fn from(config: &JanitorConfig) -> Self {
        Self {
            bundle_dir: config.bundle_dir.clone(),
            desired_percent_free: config.desired_percent_free.min(100),
            max_unconverted_upload_age: config.max_unconverted_upload_age(),
        }
    }
}

/// What one run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub uploads_removed: usize,
    pub dead_dumps_removed: usize,
    pub unparsable_dump_names: usize,
    pub dumps_evicted: usize,
    pub bytes_evicted: u64,
    pub free_space: FreeSpaceOutcome,
    pub duration_ms: u64,
}

impl RunReport {
    /// One-line `key=value` rendering for logs.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "uploads_removed={} dead_dumps_removed={} unparsable={} evicted={} bytes_evicted={} free_space={}",
            self.uploads_removed,
            self.dead_dumps_removed,
            self.unparsable_dump_names,
            self.dumps_evicted,
            self.bytes_evicted,
            self.free_space.label(),
        )
    }

    /// Total number of files this run deleted.
    #[must_use]
    pub fn files_removed(&self) -> usize {
        self.uploads_removed + self.dead_dumps_removed + self.dumps_evicted
    }
}

/// Disk janitor for one bundle directory.
///
/// Runs must be serialized by the caller: two overlapping runs over the same
/// directory can race on listing versus removal.
pub struct Janitor {
    bundle_dir: PathBuf,
    desired_percent_free: u8,
    max_unconverted_upload_age: Duration,
    authority: Arc<dyn LifecycleAuthority>,
    fs: Arc<dyn Filesystem>,
    disk_probe: Option<Box<dyn DiskCapacityProbe>>,
    logger: Option<ActivityLoggerHandle>,
}

impl Janitor {
    #[must_use]
    pub fn new(opts: JanitorOpts, authority: Arc<dyn LifecycleAuthority>) -> Self {
        Self {
            bundle_dir: opts.bundle_dir,
            desired_percent_free: opts.desired_percent_free.min(100),
            max_unconverted_upload_age: opts.max_unconverted_upload_age,
            authority,
            fs: Arc::new(LocalFilesystem),
            disk_probe: None,
            logger: None,
        }
    }

    /// Replace the local filesystem accessor.
    #[must_use]
    pub fn with_filesystem(mut self, fs: Arc<dyn Filesystem>) -> Self {
        self.fs = fs;
        self
    }

    /// Use `probe` instead of building a `statvfs` probe on first use.
    #[must_use]
    pub fn with_disk_probe(mut self, probe: Box<dyn DiskCapacityProbe>) -> Self {
        self.disk_probe = Some(probe);
        self
    }

    #[must_use]
    pub fn with_logger(mut self, logger: ActivityLoggerHandle) -> Self {
        self.logger = Some(logger);
        self
    }

    #[must_use]
    pub fn bundle_dir(&self) -> &Path {
        &self.bundle_dir
    }

    /// Run all three passes in order, stopping at the first error.
    pub fn run(&mut self) -> Result<RunReport> {
        let start = Instant::now();
        let mut report = RunReport::default();

        self.clean_failed_uploads(&mut report)?;
        self.remove_dead_dumps(&mut report)?;
        self.free_space(&mut report)?;

        report.duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        Ok(report)
    }

    fn log_event(&self, event: ActivityEvent) {
        if let Some(logger) = &self.logger {
            logger.send(event);
        }
    }
}
