//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::errors::{JanitorError, Result};
use crate::core::paths::resolve_absolute_path;

/// Full janitor configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub janitor: JanitorConfig,
    pub authority: AuthorityConfig,
    pub paths: PathsConfig,
}

/// Cleanup thresholds and scheduling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct JanitorConfig {
    /// Root of the bundle tree (holds `uploads/` and `dbs/`).
    pub bundle_dir: PathBuf,
    /// Percentage of the volume that should be kept free (0..=100).
    pub desired_percent_free: u8,
    /// Uploads older than this are considered abandoned.
    pub max_unconverted_upload_age_secs: u64,
    /// Delay between two daemon runs.
    pub interval_secs: u64,
}

/// Where and how to reach the lifecycle authority.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AuthorityConfig {
    pub base_url: String,
    /// Per-request deadline applied by the HTTP client.
    pub timeout_secs: u64,
}

/// Filesystem paths used by the janitor itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    pub jsonl_log: PathBuf,
}

impl Default for JanitorConfig {
    fn default() -> Self {
        Self {
            bundle_dir: PathBuf::from("/lsif-storage"),
            desired_percent_free: 10,
            max_unconverted_upload_age_secs: 24 * 60 * 60,
            interval_secs: 60,
        }
    }
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3186".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                eprintln!("[BJ-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths");
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        Self {
            config_file: home_dir
                .join(".config")
                .join("bundle-janitor")
                .join("config.toml"),
            jsonl_log: home_dir
                .join(".local")
                .join("share")
                .join("bundle-janitor")
                .join("activity.jsonl"),
        }
    }
}

impl JanitorConfig {
    #[must_use]
    pub fn max_unconverted_upload_age(&self) -> Duration {
        Duration::from_secs(self.max_unconverted_upload_age_secs)
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl AuthorityConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf)
                .map_err(|source| JanitorError::io(&path_buf, source))?;
            toml::from_str::<Self>(&raw)?
        } else if path.is_some() {
            return Err(JanitorError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides_from(env_var)?;
        cfg.normalize_paths();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Deterministic hash of the effective config for logging.
    ///
    /// FNV-1a over the canonical JSON form, stable across processes.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("BUNDLE_JANITOR_BUNDLE_DIR") {
            self.janitor.bundle_dir = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("BUNDLE_JANITOR_DESIRED_PERCENT_FREE") {
            self.janitor.desired_percent_free =
                parse_env("BUNDLE_JANITOR_DESIRED_PERCENT_FREE", &raw)?;
        }
        if let Some(raw) = lookup("BUNDLE_JANITOR_MAX_UNCONVERTED_UPLOAD_AGE_SECS") {
            self.janitor.max_unconverted_upload_age_secs =
                parse_env("BUNDLE_JANITOR_MAX_UNCONVERTED_UPLOAD_AGE_SECS", &raw)?;
        }
        if let Some(raw) = lookup("BUNDLE_JANITOR_INTERVAL_SECS") {
            self.janitor.interval_secs = parse_env("BUNDLE_JANITOR_INTERVAL_SECS", &raw)?;
        }
        if let Some(raw) = lookup("BUNDLE_JANITOR_AUTHORITY_URL") {
            self.authority.base_url = raw;
        }
        if let Some(raw) = lookup("BUNDLE_JANITOR_AUTHORITY_TIMEOUT_SECS") {
            self.authority.timeout_secs =
                parse_env("BUNDLE_JANITOR_AUTHORITY_TIMEOUT_SECS", &raw)?;
        }
        if let Some(raw) = lookup("BUNDLE_JANITOR_JSONL_LOG") {
            self.paths.jsonl_log = PathBuf::from(raw);
        }
        Ok(())
    }

    fn normalize_paths(&mut self) {
        self.janitor.bundle_dir = resolve_absolute_path(&self.janitor.bundle_dir);
        let trimmed = self.authority.base_url.trim().trim_end_matches('/');
        self.authority.base_url = trimmed.to_string();
    }

    fn validate(&self) -> Result<()> {
        if self.janitor.desired_percent_free > 100 {
            return Err(JanitorError::InvalidConfig {
                details: format!(
                    "janitor.desired_percent_free must be in [0, 100], got {}",
                    self.janitor.desired_percent_free
                ),
            });
        }
        if self.janitor.interval_secs == 0 {
            return Err(JanitorError::InvalidConfig {
                details: "janitor.interval_secs must be > 0".to_string(),
            });
        }
        if self.authority.timeout_secs == 0 {
            return Err(JanitorError::InvalidConfig {
                details: "authority.timeout_secs must be > 0".to_string(),
            });
        }
        let url = self.authority.base_url.as_str();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(JanitorError::InvalidConfig {
                details: format!("authority.base_url must be an http(s) URL, got {url:?}"),
            });
        }
        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env<T>(name: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|error| JanitorError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}

#[cfg(test)]
mod tests {
    use super::{Config, JanitorError};
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
            .collect()
    }

    #[test]
    fn default_config_is_valid() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.janitor.desired_percent_free, 10);
        assert_eq!(
            cfg.janitor.max_unconverted_upload_age(),
            Duration::from_secs(86_400)
        );
    }

    #[test]
    fn percent_above_hundred_is_rejected() {
        let mut cfg = Config::default();
        cfg.janitor.desired_percent_free = 101;
        let err = cfg.validate().expect_err("expected invalid percent");
        match err {
            JanitorError::InvalidConfig { details } => {
                assert!(details.contains("desired_percent_free"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn zero_interval_is_rejected() {
        let mut cfg = Config::default();
        cfg.janitor.interval_secs = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn non_http_authority_url_is_rejected() {
        let mut cfg = Config::default();
        cfg.authority.base_url = "ftp://api".to_string();
        let err = cfg.validate().expect_err("expected invalid url");
        assert_eq!(err.code(), "BJ-1001");
    }

    #[test]
    fn stable_hash_changes_when_config_changes() {
        let cfg = Config::default();
        let before = cfg.stable_hash().expect("hash should compute");
        let mut modified = Config::default();
        modified.janitor.desired_percent_free += 1;
        let after = modified.stable_hash().expect("hash should compute");
        assert_ne!(before, after);
        assert_eq!(before, Config::default().stable_hash().unwrap());
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let env = vars(&[
            ("BUNDLE_JANITOR_BUNDLE_DIR", "/data/bundles"),
            ("BUNDLE_JANITOR_DESIRED_PERCENT_FREE", "25"),
            ("BUNDLE_JANITOR_MAX_UNCONVERTED_UPLOAD_AGE_SECS", "3600"),
            ("BUNDLE_JANITOR_AUTHORITY_URL", "http://api:3186/"),
        ]);
        let mut cfg = Config::default();
        cfg.apply_env_overrides_from(|name| env.get(name).cloned())
            .expect("overrides should apply");
        assert_eq!(cfg.janitor.bundle_dir, PathBuf::from("/data/bundles"));
        assert_eq!(cfg.janitor.desired_percent_free, 25);
        assert_eq!(cfg.janitor.max_unconverted_upload_age_secs, 3600);

        cfg.normalize_paths();
        assert_eq!(cfg.authority.base_url, "http://api:3186");
    }

    #[test]
    fn unparsable_env_override_is_an_error() {
        let env = vars(&[("BUNDLE_JANITOR_DESIRED_PERCENT_FREE", "lots")]);
        let mut cfg = Config::default();
        let err = cfg
            .apply_env_overrides_from(|name| env.get(name).cloned())
            .expect_err("expected parse failure");
        assert_eq!(err.code(), "BJ-1003");
        assert!(err.to_string().contains("BUNDLE_JANITOR_DESIRED_PERCENT_FREE"));
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let err = Config::load(Some(Path::new("/nonexistent_bj/config.toml")))
            .expect_err("explicit path must exist");
        assert!(matches!(err, JanitorError::MissingConfig { .. }));
    }

    #[test]
    fn partial_toml_file_keeps_defaults_for_missing_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            format!(
                "[janitor]\nbundle_dir = {:?}\ndesired_percent_free = 15\n",
                dir.path().display().to_string()
            ),
        )
        .unwrap();

        let cfg = Config::load(Some(&path)).expect("config should load");
        assert_eq!(cfg.janitor.desired_percent_free, 15);
        assert_eq!(cfg.janitor.interval_secs, 60);
        assert_eq!(cfg.authority.timeout_secs, 30);
        assert_eq!(cfg.paths.config_file, path);
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[janitor\nbundle_dir = 3").unwrap();
        let err = Config::load(Some(&path)).expect_err("expected parse failure");
        assert_eq!(err.code(), "BJ-1003");
    }
}
