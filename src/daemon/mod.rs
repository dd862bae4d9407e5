//! Daemon subsystem: periodic janitor loop and signal handling.

pub mod loop_main;
pub mod signals;
