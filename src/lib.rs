#![forbid(unsafe_code)]

//! Bundle janitor: keeps a code-intelligence bundle directory within its disk
//! budget.
//!
//! Each run makes three passes over the bundle root:
//! 1. **Stale uploads**: raw uploads that were never converted are removed
//!    once they pass a maximum age.
//! 2. **Dead dumps**: converted dumps the lifecycle authority reports as
//!    errored, or does not know at all, are removed.
//! 3. **Free space**: while the volume is below its desired free share, the
//!    authority's next prunable dump is evicted.
//!
//! # Library usage
//!
//! ```rust,no_run
//! use bundle_janitor::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use bundle_janitor::core::config::Config;
//! use bundle_janitor::janitor::{Janitor, JanitorOpts};
//! ```

pub mod prelude;

pub mod authority;
pub mod core;
#[cfg(feature = "daemon")]
pub mod daemon;
pub mod janitor;
pub mod logger;
pub mod platform;
