//! Connection configuration.

use std::path::Path;

use crate::error::{DbError, Result};

pub const ENV_DB_URL: &str = "FEEDBACK_DB_URL";
pub const ENV_MAX_CONNECTIONS: &str = "FEEDBACK_DB_MAX_CONNECTIONS";

pub(crate) const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Store configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    /// SQLite connection URL (`sqlite:<path>` or `sqlite::memory:`)
    pub url: String,
    /// Maximum connections in the pool
    pub max_connections: u32,
}

impl DbConfig {
    /// File-backed database, created if missing.
    ///
    /// The path goes into a URL, so `?` and `%` in it are read as URL syntax.
    /// Use [`crate::FeedbackDb::open`] for arbitrary paths.
    pub fn sqlite(path: impl AsRef<Path>) -> Self {
        Self {
            url: format!("sqlite:{}", path.as_ref().display()),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }

    /// In-memory database (for testing).
    ///
    /// Every pooled connection would get its own empty database, so the pool
    /// is pinned to a single connection.
    pub fn sqlite_memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
        }
    }

    /// Read `FEEDBACK_DB_URL` / `FEEDBACK_DB_MAX_CONNECTIONS`.
    ///
    /// Returns `Ok(None)` when no URL is configured.
    pub fn from_env() -> Result<Option<Self>> {
        Self::from_vars(
            std::env::var(ENV_DB_URL).ok(),
            std::env::var(ENV_MAX_CONNECTIONS).ok(),
        )
    }

    fn from_vars(url: Option<String>, max_connections: Option<String>) -> Result<Option<Self>> {
        let url = match url.map(|u| u.trim().to_string()) {
            Some(url) if !url.is_empty() => url,
            _ => return Ok(None),
        };
        if !url.starts_with("sqlite:") {
            return Err(DbError::invalid_input(format!(
                "{} must be a sqlite: URL, got '{}'",
                ENV_DB_URL, url
            )));
        }

        let mut config = Self {
            url,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        };
        if config.is_memory() {
            config.max_connections = 1;
        }
        if let Some(raw) = max_connections {
            let max: u32 = raw.trim().parse().map_err(|_| {
                DbError::invalid_input(format!(
                    "{} must be a positive integer, got '{}'",
                    ENV_MAX_CONNECTIONS, raw
                ))
            })?;
            config = config.with_max_connections(max);
        }
        Ok(Some(config))
    }

    /// Set maximum connections. Ignored for in-memory databases.
    pub fn with_max_connections(mut self, max: u32) -> Self {
        if !self.is_memory() {
            self.max_connections = max.max(1);
        }
        self
    }

    pub fn is_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }
}
