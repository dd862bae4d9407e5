//! Core types: errors, configuration, bundle layout.

pub mod config;
pub mod errors;
pub mod paths;
