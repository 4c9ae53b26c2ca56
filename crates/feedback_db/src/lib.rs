//! Ordered feedback question store.
//!
//! Every feedback session owns a sequence of questions numbered `1..=N` with
//! no gaps. This crate keeps that numbering intact while questions are
//! created, moved, edited and deleted, and does each of those inside a single
//! SQLite transaction.
//!
//! # Usage
//!
//! ```rust,ignore
//! use feedback_db::{
//!     FeedbackDb, NewQuestion, ParticipantType, Placement, QuestionType, SessionKey,
//! };
//!
//! let db = FeedbackDb::open("~/.feedback_questions/feedback.sqlite3").await?;
//! let session = SessionKey::new("CS101", "Midterm feedback");
//! db.session_create(&session).await?;
//!
//! let q = NewQuestion::new("How clear were the lectures?", QuestionType::Text,
//!     ParticipantType::Students, ParticipantType::Creator);
//! let created = db.place_question(&session, Placement::Create(q), 0).await?;
//! ```
//!
//! Pool-level methods on [`FeedbackDb`] each run in their own transaction.
//! The connection-level functions in [`lookup`], [`lifecycle`], [`renumber`],
//! [`placement`] and [`sessions`] take `&mut SqliteConnection` so callers can
//! compose several of them inside one [`DbTransaction`].

mod config;
mod error;
mod schema;
mod types;

pub mod lifecycle;
pub mod lookup;
pub mod placement;
pub mod renumber;
pub mod sessions;
pub mod validation;

pub use config::DbConfig;
use config::DEFAULT_MAX_CONNECTIONS;
pub use error::{DbError, Result};
pub use feedback_ids::QuestionId;
pub use placement::Placement;
pub use types::*;

use chrono::SubsecRound;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::Sqlite;
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

/// Explicit transaction handle. Dropping it without committing rolls back.
pub type DbTransaction = sqlx::Transaction<'static, Sqlite>;

/// Handle to the question store.
#[derive(Clone)]
pub struct FeedbackDb {
    pool: SqlitePool,
}

impl FeedbackDb {
    /// Open or create a database at the given path.
    ///
    /// Creates all tables if they don't exist.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        // Filename, not URL: the path may contain `?` or `%`.
        let options = SqliteConnectOptions::new().filename(path);
        let db = Self::connect_with(options, DEFAULT_MAX_CONNECTIONS, false).await?;
        info!(path = %path.display(), "Database opened");
        Ok(db)
    }

    /// Open a private in-memory database (for testing).
    pub async fn open_in_memory() -> Result<Self> {
        Self::connect(DbConfig::sqlite_memory()).await
    }

    /// Connect with an explicit configuration and ensure the schema.
    pub async fn connect(config: DbConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)?;
        Self::connect_with(options, config.max_connections, config.is_memory()).await
    }

    async fn connect_with(
        options: SqliteConnectOptions,
        max_connections: u32,
        in_memory: bool,
    ) -> Result<Self> {
        let mut options = options.create_if_missing(true).foreign_keys(true);
        if !in_memory {
            options = options
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal);
        }

        let mut pool_options = SqlitePoolOptions::new().max_connections(max_connections);
        if in_memory {
            // The database lives only as long as its single connection.
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }

        let pool = pool_options.connect_with(options).await?;
        let db = Self { pool };
        db.ensure_schema().await?;
        Ok(db)
    }

    /// Get the underlying connection pool (escape hatch for complex queries).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Start a transaction. Pair with [`FeedbackDb::finish`].
    pub async fn begin(&self) -> Result<DbTransaction> {
        Ok(self.pool.begin().await?)
    }

    /// Commit on `Ok`, roll back on `Err`.
    ///
    /// The transaction is consumed either way, so the connection always goes
    /// back to the pool.
    pub async fn finish<T>(&self, tx: DbTransaction, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                tx.commit()
                    .await
                    .map_err(|e| DbError::Transaction(format!("Commit failed: {}", e)))?;
                Ok(value)
            }
            Err(err) => match tx.rollback().await {
                Ok(()) => {
                    warn!(error = %err, "Transaction rolled back");
                    Err(err)
                }
                Err(rollback_err) => Err(DbError::Transaction(format!(
                    "Transaction failed: {}; rollback failed: {}",
                    err, rollback_err
                ))),
            },
        }
    }

    /// Close the database connection.
    pub async fn close(self) {
        self.pool.close().await;
    }
}

// Timestamp utilities
impl FeedbackDb {
    /// Current time as milliseconds since Unix epoch.
    pub fn now_millis() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    /// Convert stored milliseconds to DateTime.
    ///
    /// Values outside chrono's range are `InvalidState`.
    pub fn millis_to_datetime(millis: i64) -> Result<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::from_timestamp_millis(millis).ok_or_else(|| {
            DbError::invalid_state(format!("Timestamp out of range: {} ms", millis))
        })
    }

    /// Current time at the precision the store keeps.
    pub fn now() -> chrono::DateTime<chrono::Utc> {
        chrono::Utc::now().trunc_subsecs(3)
    }
}
