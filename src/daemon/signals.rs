//! Signal handling: SIGTERM/SIGINT graceful shutdown, SIGHUP config reload and
//! SIGUSR1 run-now.
//!
//! Uses the `signal-hook` crate for safe signal registration. The daemon loop
//! polls [`SignalHandler`] flags between runs and while sleeping rather than
//! blocking on signals.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use signal_hook::consts::{SIGINT, SIGTERM};

/// Thread-safe signal state shared between the signal handler and the loop.
///
/// All flags use `Ordering::Relaxed`: the loop polls them and no other memory
/// is published through them.
#[derive(Clone, Default)]
pub struct SignalHandler {
    shutdown_flag: Arc<AtomicBool>,
    reload_flag: Arc<AtomicBool>,
    run_now_flag: Arc<AtomicBool>,
}

impl SignalHandler {
    /// Create a handler and register OS signal hooks.
    ///
    /// Registration is best-effort; failures are reported on stderr.
    pub fn new() -> Self {
        let handler = Self::unregistered();
        handler.register_signals();
        handler
    }

    /// Handler with no OS hooks, driven only through the `request_*` methods.
    #[must_use]
    pub fn unregistered() -> Self {
        Self::default()
    }

    pub fn should_shutdown(&self) -> bool {
        self.shutdown_flag.load(Ordering::Relaxed)
    }

    /// Check (and clear) whether a config reload has been requested.
    pub fn should_reload(&self) -> bool {
        self.reload_flag.swap(false, Ordering::Relaxed)
    }

    /// Peek at the reload flag without clearing it.
    pub fn reload_pending(&self) -> bool {
        self.reload_flag.load(Ordering::Relaxed)
    }

    /// Check (and clear) whether an immediate run has been requested.
    pub fn should_run_now(&self) -> bool {
        self.run_now_flag.swap(false, Ordering::Relaxed)
    }

    /// Peek at the run-now flag without clearing it.
    pub fn run_now_pending(&self) -> bool {
        self.run_now_flag.load(Ordering::Relaxed)
    }

    pub fn request_shutdown(&self) {
        self.shutdown_flag.store(true, Ordering::Relaxed);
    }

    pub fn request_reload(&self) {
        self.reload_flag.store(true, Ordering::Relaxed);
    }

    pub fn request_run_now(&self) {
        self.run_now_flag.store(true, Ordering::Relaxed);
    }

    fn register_signals(&self) {
        if let Err(e) = signal_hook::flag::register(SIGTERM, Arc::clone(&self.shutdown_flag)) {
            eprintln!("[BJ-SIGNAL] failed to register SIGTERM: {e}");
        }
        if let Err(e) = signal_hook::flag::register(SIGINT, Arc::clone(&self.shutdown_flag)) {
            eprintln!("[BJ-SIGNAL] failed to register SIGINT: {e}");
        }

        #[cfg(unix)]
        {
            use signal_hook::consts::{SIGHUP, SIGUSR1};
            if let Err(e) = signal_hook::flag::register(SIGHUP, Arc::clone(&self.reload_flag)) {
                eprintln!("[BJ-SIGNAL] failed to register SIGHUP: {e}");
            }
            if let Err(e) = signal_hook::flag::register(SIGUSR1, Arc::clone(&self.run_now_flag)) {
                eprintln!("[BJ-SIGNAL] failed to register SIGUSR1: {e}");
            }
        }
    }
}
