//! Feedback session records.
//!
//! Only what the question store needs: resolve a session, create a bare
//! record, and delete one together with the questions it owns.

use sqlx::{Row, SqliteConnection};
use tracing::info;

use crate::error::{DbError, Result};
use crate::types::{FeedbackSession, SessionKey};
use crate::validation::sanitize_session;
use crate::FeedbackDb;

pub async fn find_session(
    conn: &mut SqliteConnection,
    key: &SessionKey,
) -> Result<Option<FeedbackSession>> {
    let row = sqlx::query(
        "SELECT course_id, session_name, created_at FROM feedback_sessions \
         WHERE course_id = ? AND session_name = ?",
    )
    .bind(&key.course_id)
    .bind(&key.session_name)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(|row| {
        Ok::<_, DbError>(FeedbackSession {
            course_id: row.try_get("course_id")?,
            session_name: row.try_get("session_name")?,
            created_at: FeedbackDb::millis_to_datetime(row.try_get("created_at")?)?,
        })
    })
    .transpose()
}

/// Insert a session. Fails with `InvalidInput` if it already exists.
pub async fn insert_session(
    conn: &mut SqliteConnection,
    key: &SessionKey,
) -> Result<FeedbackSession> {
    let key = sanitize_session(key);
    if key.course_id.is_empty() || key.session_name.is_empty() {
        return Err(DbError::invalid_input(
            "course id and session name must not be empty",
        ));
    }
    if find_session(&mut *conn, &key).await?.is_some() {
        return Err(DbError::invalid_input(format!(
            "Feedback session already exists: {}",
            key
        )));
    }

    let now = FeedbackDb::now();
    sqlx::query(
        "INSERT INTO feedback_sessions (course_id, session_name, created_at) VALUES (?, ?, ?)",
    )
    .bind(&key.course_id)
    .bind(&key.session_name)
    .bind(now.timestamp_millis())
    .execute(&mut *conn)
    .await?;

    Ok(FeedbackSession {
        course_id: key.course_id,
        session_name: key.session_name,
        created_at: now,
    })
}

/// Delete a session: owned questions first, then the session row.
///
/// Returns `(session_deleted, questions_deleted)`.
pub async fn remove_session(conn: &mut SqliteConnection, key: &SessionKey) -> Result<(bool, u64)> {
    let questions = sqlx::query(
        "DELETE FROM feedback_questions WHERE course_id = ? AND session_name = ?",
    )
    .bind(&key.course_id)
    .bind(&key.session_name)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    let sessions = sqlx::query(
        "DELETE FROM feedback_sessions WHERE course_id = ? AND session_name = ?",
    )
    .bind(&key.course_id)
    .bind(&key.session_name)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    Ok((sessions > 0, questions))
}

impl FeedbackDb {
    /// Create a feedback session.
    pub async fn session_create(&self, key: &SessionKey) -> Result<FeedbackSession> {
        let mut tx = self.begin().await?;
        let result = insert_session(&mut tx, key).await;
        let session = self.finish(tx, result).await?;
        info!(course_id = %session.course_id, session = %session.session_name, "Session created");
        Ok(session)
    }

    /// Get a session, `None` if it does not exist.
    pub async fn session_get(&self, key: &SessionKey) -> Result<Option<FeedbackSession>> {
        let mut conn = self.pool.acquire().await?;
        find_session(&mut conn, &sanitize_session(key)).await
    }

    /// Delete a session and every question it owns. Returns `false` if the
    /// session did not exist.
    pub async fn session_delete(&self, key: &SessionKey) -> Result<bool> {
        let key = sanitize_session(key);
        let mut tx = self.begin().await?;
        let result = remove_session(&mut tx, &key).await;
        let (deleted, questions) = self.finish(tx, result).await?;
        if deleted {
            info!(
                course_id = %key.course_id,
                session = %key.session_name,
                questions,
                "Session deleted"
            );
        }
        Ok(deleted)
    }
}
