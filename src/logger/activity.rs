//! Activity logger thread.
//!
//! A dedicated thread owns the [`JsonlWriter`]. Everything else sends
//! [`ActivityEvent`]s through a bounded crossbeam channel with `try_send`, so a
//! slow disk never stalls a cleanup pass.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::core::errors::{JanitorError, Result};
use crate::janitor::RunReport;
use crate::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};

const CHANNEL_CAPACITY: usize = 1024;

/// Why the dead dump reconciler removed a dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadDumpReason {
    /// The authority reported the `errored` state.
    Errored,
    /// The authority does not know the id.
    Unknown,
}

impl DeadDumpReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Errored => "errored",
            Self::Unknown => "unknown",
        }
    }
}

/// Events emitted by the janitor and its daemon loop.
#[derive(Debug, Clone)]
pub enum ActivityEvent {
    JanitorStarted {
        version: String,
        config_hash: String,
    },
    JanitorStopped {
        reason: String,
        runs: u64,
    },
    UploadRemoved {
        path: String,
        age_secs: u64,
    },
    DumpRemoved {
        id: i64,
        path: String,
        reason: DeadDumpReason,
    },
    DumpEvicted {
        id: i64,
        path: String,
        size_bytes: u64,
    },
    UnparsableDumpName {
        path: String,
    },
    RunCompleted {
        report: RunReport,
    },
    RunFailed {
        code: String,
        message: String,
        retryable: bool,
    },
    ConfigReloaded {
        old_hash: String,
        new_hash: String,
    },
    ConfigReloadFailed {
        code: String,
        message: String,
    },
    /// Sentinel asking the logger thread to flush and exit.
    Shutdown,
}

/// Cloneable, non-blocking handle to the logger thread.
#[derive(Clone)]
pub struct ActivityLoggerHandle {
    tx: Sender<ActivityEvent>,
    dropped_events: Arc<AtomicU64>,
}

impl ActivityLoggerHandle {
    /// Build a handle over a fresh channel without a logger thread. The caller
    /// drains the receiver; used by tests that assert on emitted events.
    #[must_use]
    pub fn detached(capacity: usize) -> (Self, Receiver<ActivityEvent>) {
        let (tx, rx) = bounded(capacity);
        (
            Self {
                tx,
                dropped_events: Arc::new(AtomicU64::new(0)),
            },
            rx,
        )
    }

    /// Send an event. A full channel drops the event and bumps the counter.
    pub fn send(&self, event: ActivityEvent) {
        if let Err(TrySendError::Full(_)) = self.tx.try_send(event) {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Ask the logger thread to flush and exit. Blocks until the sentinel is queued.
    pub fn shutdown(&self) {
        let _ = self.tx.send(ActivityEvent::Shutdown);
    }
}

/// Spawn the logger thread writing to the given JSONL file.
pub fn spawn_logger(
    jsonl_config: JsonlConfig,
) -> Result<(ActivityLoggerHandle, thread::JoinHandle<()>)> {
    let (tx, rx) = bounded::<ActivityEvent>(CHANNEL_CAPACITY);
    let dropped = Arc::new(AtomicU64::new(0));
    let handle = ActivityLoggerHandle {
        tx,
        dropped_events: Arc::clone(&dropped),
    };

    let join = thread::Builder::new()
        .name("bj-logger".to_string())
        .spawn(move || logger_thread_main(&rx, jsonl_config, &dropped))
        .map_err(|e| JanitorError::Runtime {
            details: format!("failed to spawn logger thread: {e}"),
        })?;

    Ok((handle, join))
}

fn logger_thread_main(rx: &Receiver<ActivityEvent>, config: JsonlConfig, dropped: &AtomicU64) {
    let mut jsonl = JsonlWriter::open(config);

    while let Ok(event) = rx.recv() {
        let lost = dropped.swap(0, Ordering::Relaxed);
        if lost > 0 {
            let mut warn = LogEntry::new(EventType::LogDropped, Severity::Warning);
            warn.details = Some(format!("{lost} log events dropped due to back-pressure"));
            jsonl.write_entry(&warn);
        }

        if matches!(event, ActivityEvent::Shutdown) {
            break;
        }
        jsonl.write_entry(&event_to_log_entry(&event));
        jsonl.flush();
    }

    jsonl.sync();
}

/// Map an event onto its JSONL record.
pub fn event_to_log_entry(event: &ActivityEvent) -> LogEntry {
    match event {
        ActivityEvent::JanitorStarted {
            version,
            config_hash,
        } => {
            let mut e = LogEntry::new(EventType::JanitorStart, Severity::Info);
            e.details = Some(format!("version={version} config_hash={config_hash}"));
            e.ok = Some(true);
            e
        }
        ActivityEvent::JanitorStopped { reason, runs } => {
            let mut e = LogEntry::new(EventType::JanitorStop, Severity::Info);
            e.details = Some(format!("reason={reason} runs={runs}"));
            e.ok = Some(true);
            e
        }
        ActivityEvent::UploadRemoved { path, age_secs } => {
            let mut e = LogEntry::new(EventType::UploadRemove, Severity::Info);
            e.path = Some(path.clone());
            e.details = Some(format!("age={age_secs}s"));
            e.ok = Some(true);
            e
        }
        ActivityEvent::DumpRemoved { id, path, reason } => {
            let mut e = LogEntry::new(EventType::DumpRemove, Severity::Info);
            e.dump_id = Some(*id);
            e.path = Some(path.clone());
            e.reason = Some(reason.as_str().to_string());
            e.ok = Some(true);
            e
        }
        ActivityEvent::DumpEvicted {
            id,
            path,
            size_bytes,
        } => {
            let mut e = LogEntry::new(EventType::DumpEvict, Severity::Info);
            e.dump_id = Some(*id);
            e.path = Some(path.clone());
            e.size = Some(*size_bytes);
            e.ok = Some(true);
            e
        }
        ActivityEvent::UnparsableDumpName { path } => {
            let mut e = LogEntry::new(EventType::UnparsableDumpName, Severity::Warning);
            e.path = Some(path.clone());
            e.details = Some("file name has no integer dump id; left in place".to_string());
            e
        }
        ActivityEvent::RunCompleted { report } => {
            let mut e = LogEntry::new(EventType::RunComplete, Severity::Info);
            e.duration_ms = Some(report.duration_ms);
            e.details = Some(report.summary());
            e.ok = Some(true);
            e
        }
        ActivityEvent::RunFailed {
            code,
            message,
            retryable,
        } => {
            let severity = if *retryable {
                Severity::Warning
            } else {
                Severity::Critical
            };
            let mut e = LogEntry::new(EventType::RunFailed, severity);
            e.error_code = Some(code.clone());
            e.error_message = Some(message.clone());
            e.ok = Some(false);
            e
        }
        ActivityEvent::ConfigReloaded { old_hash, new_hash } => {
            let mut e = LogEntry::new(EventType::ConfigReload, Severity::Info);
            e.details = Some(format!("config hash: {old_hash} -> {new_hash}"));
            e.ok = Some(true);
            e
        }
        ActivityEvent::ConfigReloadFailed { code, message } => {
            let mut e = LogEntry::new(EventType::ConfigReload, Severity::Warning);
            e.error_code = Some(code.clone());
            e.error_message = Some(message.clone());
            e.ok = Some(false);
            e
        }
        ActivityEvent::Shutdown => LogEntry::new(EventType::JanitorStop, Severity::Info),
    }
}
