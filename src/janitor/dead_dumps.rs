//! Dead dump reconciler.
//!
//! Every dump on disk is checked against the authority. A dump is dead when the
//! authority reports it `errored` or does not know its id at all; any other
//! state, including ones this crate has never heard of, keeps it.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use crate::authority::ERRORED_STATE;
use crate::core::errors::Result;
use crate::core::paths::{dbs_dir, parse_dump_id};
use crate::janitor::{DEAD_DUMP_BATCH_SIZE, Janitor, RunReport, batch_ids};
use crate::logger::activity::{ActivityEvent, DeadDumpReason};

impl Janitor {
    /// Remove dumps that are errored or unknown to the authority.
    pub(crate) fn remove_dead_dumps(&self, report: &mut RunReport) -> Result<()> {
        let paths_by_id = self.dump_paths_by_id(report)?;
        let ids: Vec<i64> = paths_by_id.keys().copied().collect();

        let mut states = HashMap::with_capacity(ids.len());
        for batch in batch_ids(&ids, DEAD_DUMP_BATCH_SIZE) {
            states.extend(self.authority.states(batch)?);
        }

        for (id, paths) in &paths_by_id {
            let reason = match states.get(id) {
                None => DeadDumpReason::Unknown,
                Some(state) if state == ERRORED_STATE => DeadDumpReason::Errored,
                Some(_) => continue,
            };
            for path in paths {
                self.fs.remove_file(path)?;
                report.dead_dumps_removed += 1;
                self.log_event(ActivityEvent::DumpRemoved {
                    id: *id,
                    path: path.to_string_lossy().into_owned(),
                    reason,
                });
            }
        }
        Ok(())
    }

    /// Files in `dbs/` grouped by the id their name starts with, ascending.
    ///
    /// Names without an integer id are left alone; they are counted and
    /// logged so orphans do not go unnoticed forever.
    fn dump_paths_by_id(&self, report: &mut RunReport) -> Result<BTreeMap<i64, Vec<PathBuf>>> {
        let mut paths_by_id: BTreeMap<i64, Vec<PathBuf>> = BTreeMap::new();
        for entry in self.fs.list_dir(&dbs_dir(&self.bundle_dir))? {
            match entry.name_str().and_then(parse_dump_id) {
                Some(id) => paths_by_id.entry(id).or_default().push(entry.path),
                None => {
                    report.unparsable_dump_names += 1;
                    self.log_event(ActivityEvent::UnparsableDumpName {
                        path: entry.path.to_string_lossy().into_owned(),
                    });
                }
            }
        }
        Ok(paths_by_id)
    }
}
