//! Locating and opening the question database.

use anyhow::{Context, Result};
use feedback_db::{DbConfig, FeedbackDb};
use std::path::{Path, PathBuf};
use tracing::debug;

const DB_FILE_NAME: &str = "feedback.sqlite3";

/// Default database path: `<feedback home>/feedback.sqlite3`.
pub fn default_db_path() -> Result<PathBuf> {
    Ok(feedback_logging::feedback_home()?.join(DB_FILE_NAME))
}

/// Open the database from, in order: `--db`, `FEEDBACK_DB_URL`, the default
/// path.
pub async fn open_db(explicit: Option<&Path>) -> Result<FeedbackDb> {
    if let Some(path) = explicit {
        return FeedbackDb::open(path)
            .await
            .with_context(|| format!("Failed to open database at {}", path.display()));
    }

    if let Some(config) = DbConfig::from_env().context("Invalid database configuration")? {
        debug!(url = %config.url, "Using database from environment");
        let url = config.url.clone();
        return FeedbackDb::connect(config)
            .await
            .with_context(|| format!("Failed to connect to {}", url));
    }

    let path = default_db_path()?;
    FeedbackDb::open(&path)
        .await
        .with_context(|| format!("Failed to open database at {}", path.display()))
}
