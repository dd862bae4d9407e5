//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use bundle_janitor::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{JanitorError, Result};

// Collaborators
pub use crate::authority::{EvictionTarget, HttpAuthority, LifecycleAuthority, MemoryAuthority};
pub use crate::platform::capacity::{DiskCapacityProbe, DiskUsage, FixedCapacityProbe, StatvfsProbe};
pub use crate::platform::fs::{DirEntryInfo, Filesystem, LocalFilesystem};

// Janitor
pub use crate::janitor::{FreeSpaceOutcome, Janitor, JanitorOpts, RunReport};

// Logging
pub use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle, spawn_logger};

// Daemon
#[cfg(feature = "daemon")]
pub use crate::daemon::loop_main::JanitorDaemon;
