//! Daemon loop: run the janitor, sleep for the interval, repeat.
//!
//! Runs happen on the calling thread one after another, so two runs never
//! overlap. A failed run is logged and the next tick retries from scratch.
//! The sleep is sliced so SIGTERM, SIGHUP and SIGUSR1 are observed within
//! [`SLEEP_SLICE`].

#![allow(missing_docs)]

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::authority::HttpAuthority;
use crate::core::config::Config;
use crate::core::errors::Result;
use crate::daemon::signals::SignalHandler;
use crate::janitor::{Janitor, JanitorOpts, RunReport};
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle, spawn_logger};
use crate::logger::jsonl::JsonlConfig;

/// Longest uninterrupted sleep between signal checks.
pub const SLEEP_SLICE: Duration = Duration::from_millis(250);

/// Build a janitor talking to the HTTP authority named in `config`.
pub fn build_janitor(config: &Config, logger: ActivityLoggerHandle) -> Result<Janitor> {
    let authority = HttpAuthority::from_config(&config.authority)?;
    Ok(Janitor::new(JanitorOpts::from(&config.janitor), Arc::new(authority)).with_logger(logger))
}

/// Periodic janitor runner.
pub struct JanitorDaemon {
    config: Config,
    janitor: Janitor,
    logger_handle: ActivityLoggerHandle,
    logger_join: Option<thread::JoinHandle<()>>,
    signal_handler: SignalHandler,
    start_time: Instant,
    runs: u64,
    failed_runs: u64,
}

impl JanitorDaemon {
    /// Spawn the logger, register signals and build the janitor.
    pub fn init(config: Config) -> Result<Self> {
        let (logger_handle, logger_join) =
            spawn_logger(JsonlConfig::at(config.paths.jsonl_log.clone()))?;
        let janitor = build_janitor(&config, logger_handle.clone())?;
        let mut daemon = Self::from_parts(config, janitor, logger_handle, SignalHandler::new());
        daemon.logger_join = Some(logger_join);
        Ok(daemon)
    }

    /// Assemble a daemon from prebuilt parts. The caller owns the logger thread,
    /// if any.
    #[must_use]
    pub fn from_parts(
        config: Config,
        janitor: Janitor,
        logger_handle: ActivityLoggerHandle,
        signal_handler: SignalHandler,
    ) -> Self {
        Self {
            config,
            janitor,
            logger_handle,
            logger_join: None,
            signal_handler,
            start_time: Instant::now(),
            runs: 0,
            failed_runs: 0,
        }
    }

    #[must_use]
    pub fn signal_handler(&self) -> &SignalHandler {
        &self.signal_handler
    }

    #[must_use]
    pub fn runs(&self) -> u64 {
        self.runs
    }

    #[must_use]
    pub fn failed_runs(&self) -> u64 {
        self.failed_runs
    }

    /// Run until shutdown is requested.
    ///
    /// This is the main entry point for `bundle-janitor daemon`.
    pub fn run(&mut self) -> Result<()> {
        let config_hash = self.config.stable_hash().unwrap_or_default();
        self.logger_handle.send(ActivityEvent::JanitorStarted {
            version: env!("CARGO_PKG_VERSION").to_string(),
            config_hash,
        });
        eprintln!(
            "[BJ-DAEMON] watching {} every {}s",
            self.janitor.bundle_dir().display(),
            self.config.janitor.interval_secs
        );

        loop {
            if self.signal_handler.should_shutdown() {
                eprintln!("[BJ-DAEMON] shutdown requested");
                break;
            }
            if self.signal_handler.should_reload() {
                self.handle_config_reload();
            }

            let _ = self.run_once();

            self.sleep_until_next_run();
        }

        self.shutdown();
        Ok(())
    }

    /// Perform one janitor run and log its outcome.
    pub fn run_once(&mut self) -> Result<RunReport> {
        self.runs += 1;
        match self.janitor.run() {
            Ok(report) => {
                self.logger_handle.send(ActivityEvent::RunCompleted {
                    report: report.clone(),
                });
                Ok(report)
            }
            Err(e) => {
                self.failed_runs += 1;
                eprintln!("[BJ-DAEMON] run failed: {e}");
                self.logger_handle.send(ActivityEvent::RunFailed {
                    code: e.code().to_string(),
                    message: e.to_string(),
                    retryable: e.is_retryable(),
                });
                Err(e)
            }
        }
    }

    /// Sleep for the configured interval. Returns early on shutdown, reload or
    /// a run-now request, leaving the flag for the loop to consume. An
    /// interval too large to represent as a deadline sleeps until signalled.
    fn sleep_until_next_run(&self) {
        let deadline = Instant::now().checked_add(self.config.janitor.interval());
        loop {
            if self.signal_handler.should_shutdown() || self.signal_handler.reload_pending() {
                return;
            }
            if self.signal_handler.should_run_now() {
                eprintln!("[BJ-DAEMON] immediate run requested");
                return;
            }
            let slice = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return;
                    }
                    SLEEP_SLICE.min(deadline - now)
                }
                None => SLEEP_SLICE,
            };
            thread::sleep(slice);
        }
    }

    fn handle_config_reload(&mut self) {
        eprintln!("[BJ-DAEMON] config reload requested (SIGHUP)");

        let reloaded = Config::load(Some(&self.config.paths.config_file)).and_then(|new_config| {
            let janitor = build_janitor(&new_config, self.logger_handle.clone())?;
            Ok((new_config, janitor))
        });

        match reloaded {
            Ok((new_config, janitor)) => {
                let old_hash = self.config.stable_hash().unwrap_or_default();
                let new_hash = new_config.stable_hash().unwrap_or_default();
                if old_hash == new_hash {
                    eprintln!("[BJ-DAEMON] config unchanged, skipping reload");
                    return;
                }
                self.janitor = janitor;
                self.config = new_config;
                self.logger_handle
                    .send(ActivityEvent::ConfigReloaded { old_hash, new_hash });
                eprintln!("[BJ-DAEMON] config reloaded");
            }
            Err(e) => {
                eprintln!("[BJ-DAEMON] config reload failed: {e}");
                self.logger_handle.send(ActivityEvent::ConfigReloadFailed {
                    code: e.code().to_string(),
                    message: e.to_string(),
                });
            }
        }
    }

    fn shutdown(&mut self) {
        let uptime_secs = self.start_time.elapsed().as_secs();
        self.logger_handle.send(ActivityEvent::JanitorStopped {
            reason: "clean shutdown".to_string(),
            runs: self.runs,
        });

        if let Some(logger_join) = self.logger_join.take() {
            self.logger_handle.shutdown();
            let _ = logger_join.join();
        }

        eprintln!(
            "[BJ-DAEMON] shutdown complete (runs={} failed={} uptime={uptime_secs}s)",
            self.runs, self.failed_runs
        );
    }
}
