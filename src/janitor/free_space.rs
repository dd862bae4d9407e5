//! Free space reclaimer.
//!
//! When the volume holding the bundle directory has less free space than the
//! configured share, dumps are evicted one at a time in the order the authority
//! hands them out. The authority picks the victim and forgets it; this pass only
//! deletes the file and counts the bytes.

use serde::Serialize;

use crate::core::errors::{JanitorError, Result};
use crate::core::paths::db_filename;
use crate::janitor::{Janitor, RunReport};
use crate::logger::activity::ActivityEvent;
use crate::platform::capacity::{DiskCapacityProbe, StatvfsProbe};

/// How the free space pass ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FreeSpaceOutcome {
    /// The pass did not run.
    #[default]
    NotChecked,
    /// Enough space was free before anything was evicted.
    AlreadySatisfied,
    /// Evictions freed at least the missing bytes.
    TargetReached,
    /// The authority ran out of prunable dumps first.
    NothingPrunable { bytes_short: u64 },
}

impl FreeSpaceOutcome {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::NotChecked => "not_checked",
            Self::AlreadySatisfied => "already_satisfied",
            Self::TargetReached => "target_reached",
            Self::NothingPrunable { .. } => "nothing_prunable",
        }
    }
}

impl Janitor {
    /// Evict dumps until the desired share of the volume is free or the
    /// authority has nothing left to prune.
    pub(crate) fn free_space(&mut self, report: &mut RunReport) -> Result<()> {
        let usage = self.disk_probe()?.size()?;
        let desired = usage.desired_free_bytes(self.desired_percent_free);
        if usage.free_bytes >= desired {
            report.free_space = FreeSpaceOutcome::AlreadySatisfied;
            return Ok(());
        }

        report.free_space = self.clean_old_dumps(desired - usage.free_bytes, report)?;
        Ok(())
    }

    /// The probe is built on first use and kept for the janitor's lifetime.
    fn disk_probe(&mut self) -> Result<&dyn DiskCapacityProbe> {
        if self.disk_probe.is_none() {
            self.disk_probe = Some(Box::new(StatvfsProbe::new(&self.bundle_dir)?));
        }
        self.disk_probe
            .as_deref()
            .ok_or_else(|| JanitorError::Runtime {
                details: "disk probe missing after initialization".to_string(),
            })
    }

    fn clean_old_dumps(
        &self,
        mut bytes_to_free: u64,
        report: &mut RunReport,
    ) -> Result<FreeSpaceOutcome> {
        while bytes_to_free > 0 {
            let Some(bytes_removed) = self.clean_old_dump(report)? else {
                return Ok(FreeSpaceOutcome::NothingPrunable {
                    bytes_short: bytes_to_free,
                });
            };
            if bytes_removed >= bytes_to_free {
                break;
            }
            bytes_to_free -= bytes_removed;
        }
        Ok(FreeSpaceOutcome::TargetReached)
    }

    /// Evict the authority's next victim. `None` when nothing is prunable.
    fn clean_old_dump(&self, report: &mut RunReport) -> Result<Option<u64>> {
        let target = self.authority.prune()?;
        if !target.prunable {
            return Ok(None);
        }

        let path = db_filename(&self.bundle_dir, target.id);
        let size = self.fs.file_size(&path)?;
        self.fs.remove_file(&path)?;

        report.dumps_evicted += 1;
        report.bytes_evicted = report.bytes_evicted.saturating_add(size);
        self.log_event(ActivityEvent::DumpEvicted {
            id: target.id,
            path: path.to_string_lossy().into_owned(),
            size_bytes: size,
        });
        Ok(Some(size))
    }
}
