//! Stale upload reclaimer.
//!
//! An upload still sitting in `uploads/` after the configured age means its
//! conversion crashed or was abandoned. The pass is purely age based.

use std::time::{Duration, SystemTime};

use crate::core::errors::Result;
use crate::core::paths::uploads_dir;
use crate::janitor::{Janitor, RunReport};
use crate::logger::activity::ActivityEvent;

impl Janitor {
    /// Remove every upload whose age is at least the configured maximum.
    pub(crate) fn clean_failed_uploads(&self, report: &mut RunReport) -> Result<()> {
        let now = SystemTime::now();
        for entry in self.fs.list_dir(&uploads_dir(&self.bundle_dir))? {
            // An mtime in the future counts as brand new.
            let age = now
                .duration_since(entry.modified)
                .unwrap_or(Duration::ZERO);
            if age < self.max_unconverted_upload_age {
                continue;
            }

            self.fs.remove_file(&entry.path)?;
            report.uploads_removed += 1;
            self.log_event(ActivityEvent::UploadRemoved {
                path: entry.path.to_string_lossy().into_owned(),
                age_secs: age.as_secs(),
            });
        }
        Ok(())
    }
}
