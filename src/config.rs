//! Application-level configuration loading: database location, uploads, cache TTLs and
//! ingestion limits.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "ANIGUESS_BACK_CONFIG_PATH";

const DEFAULT_DATABASE_URL: &str = "sqlite://data/aniguess.db";
const DEFAULT_UPLOADS_DIR: &str = "uploads";
const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone, PartialEq)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// sqlx connection string of the SQLite database.
    pub database_url: String,
    /// Directory receiving uploaded images, served under `/uploads`.
    pub uploads_dir: PathBuf,
    /// HTTP listening port.
    pub port: u16,
    /// Cache lifetimes.
    pub cache: CacheTtls,
    /// Bounds applied to archive ingestion.
    pub batch: BatchLimits,
    /// Largest accepted image, in bytes.
    pub max_image_bytes: usize,
    /// Largest accepted request body on upload routes, in bytes.
    pub max_upload_bytes: usize,
}

/// Time-to-live of cached reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    /// Leaderboard, per-user stats and pack listings.
    pub volatile: Duration,
    /// Openings and global statistics.
    pub slow: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            volatile: Duration::from_secs(60),
            slow: Duration::from_secs(300),
        }
    }
}

/// Upper bounds for a single archive ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    /// Maximum number of manifest rows.
    pub max_rows: usize,
    /// Wall-clock budget for a whole ingestion.
    pub deadline: Duration,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            max_rows: 500,
            deadline: Duration::from_secs(60),
        }
    }
}

impl AppConfig {
    /// Load the configuration from disk, then apply environment overrides.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let config = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    info!(path = %path.display(), "loaded configuration file");
                    raw.into()
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        };

        config.with_env_overrides(|key| env::var(key).ok())
    }

    /// Apply `DATABASE_URL`, `UPLOADS_DIR` and `PORT`/`SERVER_PORT` from `lookup`.
    fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup("DATABASE_URL").filter(|value| !value.is_empty()) {
            self.database_url = url;
        }
        if let Some(dir) = lookup("UPLOADS_DIR").filter(|value| !value.is_empty()) {
            self.uploads_dir = PathBuf::from(dir);
        }
        let port = lookup("PORT").or_else(|| lookup("SERVER_PORT"));
        if let Some(raw) = port {
            match raw.parse::<u16>() {
                Ok(port) => self.port = port,
                Err(_) => warn!(value = %raw, "ignoring invalid port override"),
            }
        }
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_owned(),
            uploads_dir: PathBuf::from(DEFAULT_UPLOADS_DIR),
            port: DEFAULT_PORT,
            cache: CacheTtls::default(),
            batch: BatchLimits::default(),
            max_image_bytes: 10 * 1024 * 1024,
            max_upload_bytes: 100 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    database_url: Option<String>,
    uploads_dir: Option<PathBuf>,
    port: Option<u16>,
    cache: RawCache,
    batch: RawBatch,
    max_image_bytes: Option<usize>,
    max_upload_bytes: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawCache {
    volatile_ttl_secs: Option<u64>,
    slow_ttl_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawBatch {
    max_rows: Option<usize>,
    deadline_secs: Option<u64>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = Self::default();
        Self {
            database_url: value.database_url.unwrap_or(defaults.database_url),
            uploads_dir: value.uploads_dir.unwrap_or(defaults.uploads_dir),
            port: value.port.unwrap_or(defaults.port),
            cache: CacheTtls {
                volatile: value
                    .cache
                    .volatile_ttl_secs
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.cache.volatile),
                slow: value
                    .cache
                    .slow_ttl_secs
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.cache.slow),
            },
            batch: BatchLimits {
                max_rows: value.batch.max_rows.unwrap_or(defaults.batch.max_rows),
                deadline: value
                    .batch
                    .deadline_secs
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.batch.deadline),
            },
            max_image_bytes: value.max_image_bytes.unwrap_or(defaults.max_image_bytes),
            max_upload_bytes: value.max_upload_bytes.unwrap_or(defaults.max_upload_bytes),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
