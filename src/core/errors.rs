//! BJ-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, JanitorError>;

/// Top-level error type for the bundle janitor.
#[derive(Debug, Error)]
pub enum JanitorError {
    #[error("[BJ-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[BJ-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[BJ-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[BJ-1101] unsupported platform: {details}")]
    UnsupportedPlatform { details: String },

    #[error("[BJ-2001] disk capacity probe failure for {path}: {details}")]
    DiskCapacity { path: PathBuf, details: String },

    #[error("[BJ-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[BJ-2201] lifecycle authority {operation} failed: {details}")]
    Authority {
        operation: &'static str,
        details: String,
    },

    #[error("[BJ-2202] lifecycle authority {operation} returned HTTP {status}")]
    AuthorityStatus { operation: &'static str, status: u16 },

    #[error("[BJ-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[BJ-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl JanitorError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "BJ-1001",
            Self::MissingConfig { .. } => "BJ-1002",
            Self::ConfigParse { .. } => "BJ-1003",
            Self::UnsupportedPlatform { .. } => "BJ-1101",
            Self::DiskCapacity { .. } => "BJ-2001",
            Self::Serialization { .. } => "BJ-2101",
            Self::Authority { .. } => "BJ-2201",
            Self::AuthorityStatus { .. } => "BJ-2202",
            Self::Io { .. } => "BJ-3002",
            Self::Runtime { .. } => "BJ-3900",
        }
    }

    /// Whether the next scheduled run might succeed where this one failed.
    ///
    /// The janitor itself never retries; the daemon loop uses this only to
    /// pick the severity of the logged failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Io { .. }
                | Self::DiskCapacity { .. }
                | Self::Authority { .. }
                | Self::AuthorityStatus { .. }
                | Self::Runtime { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<serde_json::Error> for JanitorError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for JanitorError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

impl From<toml::ser::Error> for JanitorError {
    fn from(value: toml::ser::Error) -> Self {
        Self::Serialization {
            context: "toml",
            details: value.to_string(),
        }
    }
}
