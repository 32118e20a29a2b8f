//! Client configuration loaded from environment variables.
//!
//! Every setting has a default, so a tab starts with zero configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use huddle_shared::constants::{MAX_ATTACHMENT_SIZE, SCROLL_BOTTOM_THRESHOLD_PX, SYNC_INTERVAL_MS};
use huddle_store::{KeyValueStore, MemoryStore, SqliteStore, StoreError};

/// Which key/value backend holds the collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Sqlite,
    Memory,
}

impl FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(StoreKind::Sqlite),
            "memory" => Ok(StoreKind::Memory),
            other => Err(format!("unknown store kind: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Env: `HUDDLE_STORE` (`sqlite` / `memory`)
    /// Default: `sqlite`
    pub store: StoreKind,

    /// SQLite database file.
    /// Env: `HUDDLE_DB_PATH`
    /// Default: `None`, the platform data directory.
    pub db_path: Option<PathBuf>,

    /// Identity of this tab.
    /// Env: `HUDDLE_USERNAME`
    /// Default: `None`, the `user` collection, then `guest`.
    pub username: Option<String>,

    /// Env: `HUDDLE_SYNC_INTERVAL_MS`
    /// Default: 2000 ms
    pub sync_interval: Duration,

    /// Env: `HUDDLE_SCROLL_THRESHOLD_PX`
    /// Default: 50
    pub scroll_threshold_px: f64,

    /// Env: `HUDDLE_OFFER_TIMEOUT_SECS` (`0` disables)
    /// Default: `None`, wait indefinitely.
    pub offer_timeout: Option<Duration>,

    /// Env: `HUDDLE_MAX_ATTACHMENT_BYTES`
    /// Default: 5 MiB
    pub max_attachment_bytes: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            store: StoreKind::Sqlite,
            db_path: None,
            username: None,
            sync_interval: Duration::from_millis(SYNC_INTERVAL_MS),
            scroll_threshold_px: SCROLL_BOTTOM_THRESHOLD_PX,
            offer_timeout: None,
            max_attachment_bytes: MAX_ATTACHMENT_SIZE,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over any variable source.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(value) = var("HUDDLE_STORE") {
            match value.parse() {
                Ok(kind) => config.store = kind,
                Err(e) => tracing::warn!(error = %e, "Invalid HUDDLE_STORE, using default"),
            }
        }

        if let Some(path) = var("HUDDLE_DB_PATH") {
            if !path.trim().is_empty() {
                config.db_path = Some(PathBuf::from(path));
            }
        }

        if let Some(name) = var("HUDDLE_USERNAME") {
            if !name.trim().is_empty() {
                config.username = Some(name.trim().to_string());
            }
        }

        if let Some(ms) = parse_var::<u64>(&var, "HUDDLE_SYNC_INTERVAL_MS") {
            if ms > 0 {
                config.sync_interval = Duration::from_millis(ms);
            }
        }

        if let Some(px) = parse_var::<f64>(&var, "HUDDLE_SCROLL_THRESHOLD_PX") {
            if px.is_finite() && px >= 0.0 {
                config.scroll_threshold_px = px;
            }
        }

        if let Some(secs) = parse_var::<u64>(&var, "HUDDLE_OFFER_TIMEOUT_SECS") {
            config.offer_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        if let Some(bytes) = parse_var::<usize>(&var, "HUDDLE_MAX_ATTACHMENT_BYTES") {
            config.max_attachment_bytes = bytes;
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter.

        config
    }

    /// Open the configured backend.
    pub fn open_store(&self) -> Result<Arc<dyn KeyValueStore>, StoreError> {
        Ok(match self.store {
            StoreKind::Memory => Arc::new(MemoryStore::new()),
            StoreKind::Sqlite => match &self.db_path {
                Some(path) => Arc::new(SqliteStore::open_at(path)?),
                None => Arc::new(SqliteStore::open_default()?),
            },
        })
    }
}

fn parse_var<T: FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = var(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Invalid value, using default");
            None
        }
    }
}
