//! Read-only question queries.
//!
//! Missing data is `None` or an empty `Vec`, never an error. Queries run on
//! whatever connection they are given, so inside a transaction they see that
//! transaction's writes and do not see rows it already deleted.

use feedback_ids::QuestionId;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use tracing::{debug, error};

use crate::error::{DbError, Result};
use crate::types::*;
use crate::validation::sanitize_session;
use crate::FeedbackDb;

pub(crate) const QUESTION_COLUMNS: &str = "id, course_id, session_name, question_number, \
     question_text, question_metadata, question_type, giver_type, recipient_type, \
     number_of_entities, show_responses_to, show_giver_name_to, show_recipient_name_to, \
     created_at, updated_at";

/// Question by identity.
pub async fn find_by_id(
    conn: &mut SqliteConnection,
    session: &SessionKey,
    id: &QuestionId,
) -> Result<Option<FeedbackQuestion>> {
    let sql = format!(
        "SELECT {} FROM feedback_questions WHERE course_id = ? AND session_name = ? AND id = ?",
        QUESTION_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(&session.course_id)
        .bind(&session.session_name)
        .bind(id.as_str())
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => Ok(Some(row_to_question(&row)?)),
        None => {
            debug!(session = %session, question_id = %id, "Trying to get non-existent question");
            Ok(None)
        }
    }
}

/// Question at a given position.
///
/// Two questions sharing a number breaks the numbering invariant; that is
/// logged as an error and the first one by id is returned.
pub async fn find_by_number(
    conn: &mut SqliteConnection,
    session: &SessionKey,
    question_number: i32,
) -> Result<Option<FeedbackQuestion>> {
    let sql = format!(
        "SELECT {} FROM feedback_questions \
         WHERE course_id = ? AND session_name = ? AND question_number = ? ORDER BY id",
        QUESTION_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(&session.course_id)
        .bind(&session.session_name)
        .bind(question_number)
        .fetch_all(&mut *conn)
        .await?;

    if rows.len() > 1 {
        error!(
            session = %session,
            question_number,
            matches = rows.len(),
            "More than one question with the same question number"
        );
    }

    match rows.first() {
        Some(row) => Ok(Some(row_to_question(row)?)),
        None => {
            debug!(session = %session, question_number, "Trying to get non-existent question");
            Ok(None)
        }
    }
}

/// All questions of a session, ascending by number.
pub async fn list_for_session(
    conn: &mut SqliteConnection,
    session: &SessionKey,
) -> Result<Vec<FeedbackQuestion>> {
    let sql = format!(
        "SELECT {} FROM feedback_questions WHERE course_id = ? AND session_name = ? \
         ORDER BY question_number, id",
        QUESTION_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(&session.course_id)
        .bind(&session.session_name)
        .fetch_all(&mut *conn)
        .await?;

    rows.iter().map(row_to_question).collect()
}

/// Questions of a session answered by `giver`. No ordering guarantee.
pub async fn list_for_giver_type(
    conn: &mut SqliteConnection,
    session: &SessionKey,
    giver: ParticipantType,
) -> Result<Vec<FeedbackQuestion>> {
    let sql = format!(
        "SELECT {} FROM feedback_questions \
         WHERE course_id = ? AND session_name = ? AND giver_type = ?",
        QUESTION_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(&session.course_id)
        .bind(&session.session_name)
        .bind(giver.as_str())
        .fetch_all(&mut *conn)
        .await?;

    rows.iter().map(row_to_question).collect()
}

/// Questions across every session of a course.
pub async fn list_for_course(
    conn: &mut SqliteConnection,
    course_id: &str,
) -> Result<Vec<FeedbackQuestion>> {
    let sql = format!(
        "SELECT {} FROM feedback_questions WHERE course_id = ? \
         ORDER BY session_name, question_number, id",
        QUESTION_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(course_id)
        .fetch_all(&mut *conn)
        .await?;

    rows.iter().map(row_to_question).collect()
}

pub async fn count_for_session(conn: &mut SqliteConnection, session: &SessionKey) -> Result<usize> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM feedback_questions WHERE course_id = ? AND session_name = ?",
    )
    .bind(&session.course_id)
    .bind(&session.session_name)
    .fetch_one(&mut *conn)
    .await?;

    Ok(count as usize)
}

pub(crate) fn row_to_question(row: &SqliteRow) -> Result<FeedbackQuestion> {
    let id: String = row.try_get("id")?;
    let id = QuestionId::parse(&id)
        .map_err(|e| DbError::invalid_state(format!("Stored question id: {}", e)))?;

    let question_type: String = row.try_get("question_type")?;
    let question_type = QuestionType::parse(&question_type).ok_or_else(|| {
        DbError::invalid_state(format!("Unknown question type: {}", question_type))
    })?;

    let metadata: Option<String> = row.try_get("question_metadata")?;
    let question_metadata = metadata
        .map(|raw| serde_json::from_str(&raw))
        .transpose()?;

    Ok(FeedbackQuestion {
        id,
        course_id: row.try_get("course_id")?,
        session_name: row.try_get("session_name")?,
        question_number: row.try_get("question_number")?,
        question_text: row.try_get("question_text")?,
        question_metadata,
        question_type,
        giver_type: participant(row, "giver_type")?,
        recipient_type: participant(row, "recipient_type")?,
        number_of_entities_to_give_feedback_to: row.try_get("number_of_entities")?,
        show_responses_to: viewers(row, "show_responses_to")?,
        show_giver_name_to: viewers(row, "show_giver_name_to")?,
        show_recipient_name_to: viewers(row, "show_recipient_name_to")?,
        created_at: FeedbackDb::millis_to_datetime(row.try_get("created_at")?)?,
        updated_at: FeedbackDb::millis_to_datetime(row.try_get("updated_at")?)?,
    })
}

fn participant(row: &SqliteRow, column: &str) -> Result<ParticipantType> {
    let raw: String = row.try_get(column)?;
    ParticipantType::parse(&raw).ok_or_else(|| {
        DbError::invalid_state(format!("Unknown participant type in {}: {}", column, raw))
    })
}

fn viewers(row: &SqliteRow, column: &str) -> Result<Vec<ParticipantType>> {
    let raw: String = row.try_get(column)?;
    Ok(serde_json::from_str(&raw)?)
}

impl FeedbackDb {
    /// Get a question by identity.
    pub async fn get_question(
        &self,
        session: &SessionKey,
        id: &QuestionId,
    ) -> Result<Option<FeedbackQuestion>> {
        let mut conn = self.pool.acquire().await?;
        find_by_id(&mut conn, &sanitize_session(session), id).await
    }

    /// Get the question at `question_number` in a session.
    pub async fn get_question_by_number(
        &self,
        session: &SessionKey,
        question_number: i32,
    ) -> Result<Option<FeedbackQuestion>> {
        let mut conn = self.pool.acquire().await?;
        find_by_number(&mut conn, &sanitize_session(session), question_number).await
    }

    /// All questions of a session, sorted by question number.
    pub async fn list_questions_for_session(
        &self,
        session: &SessionKey,
    ) -> Result<Vec<FeedbackQuestion>> {
        let mut conn = self.pool.acquire().await?;
        list_for_session(&mut conn, &sanitize_session(session)).await
    }

    /// Questions of a session for one giver role. Sort them yourself if
    /// order matters.
    pub async fn list_questions_for_giver_type(
        &self,
        session: &SessionKey,
        giver: ParticipantType,
    ) -> Result<Vec<FeedbackQuestion>> {
        let mut conn = self.pool.acquire().await?;
        list_for_giver_type(&mut conn, &sanitize_session(session), giver).await
    }

    /// All questions of a course.
    pub async fn list_questions_for_course(
        &self,
        course_id: &str,
    ) -> Result<Vec<FeedbackQuestion>> {
        let mut conn = self.pool.acquire().await?;
        list_for_course(&mut conn, course_id.trim()).await
    }

    pub async fn count_questions_for_session(&self, session: &SessionKey) -> Result<usize> {
        let mut conn = self.pool.acquire().await?;
        count_for_session(&mut conn, &sanitize_session(session)).await
    }
}
