//! Creating, updating and deleting questions.
//!
//! Creates go through the placement path so a new question can land in the
//! middle of a session without breaking the numbering. Deletes close the gap
//! they leave behind. Plain updates write whatever number they are given;
//! use [`FeedbackDb::place_question`] to move a question.

use feedback_ids::QuestionId;
use sqlx::SqliteConnection;
use tracing::{debug, info};

use crate::error::{DbError, Result};
use crate::lookup;
use crate::placement::{self, Placement};
use crate::renumber;
use crate::sessions;
use crate::types::*;
use crate::validation::{merge, sanitize_session, validate};
use crate::FeedbackDb;

fn viewers_json(viewers: &[ParticipantType]) -> Result<String> {
    Ok(serde_json::to_string(viewers)?)
}

fn metadata_json(question: &FeedbackQuestion) -> Result<Option<String>> {
    question
        .question_metadata
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(DbError::from)
}

/// Insert a validated record. The owning session must exist.
pub async fn insert_question(
    conn: &mut SqliteConnection,
    question: &FeedbackQuestion,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO feedback_questions (
            id, course_id, session_name, question_number, question_text, question_metadata,
            question_type, giver_type, recipient_type, number_of_entities,
            show_responses_to, show_giver_name_to, show_recipient_name_to,
            created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(question.id.as_str())
    .bind(&question.course_id)
    .bind(&question.session_name)
    .bind(question.question_number)
    .bind(&question.question_text)
    .bind(metadata_json(question)?)
    .bind(question.question_type.as_str())
    .bind(question.giver_type.as_str())
    .bind(question.recipient_type.as_str())
    .bind(question.number_of_entities_to_give_feedback_to)
    .bind(viewers_json(&question.show_responses_to)?)
    .bind(viewers_json(&question.show_giver_name_to)?)
    .bind(viewers_json(&question.show_recipient_name_to)?)
    .bind(question.created_at.timestamp_millis())
    .bind(question.updated_at.timestamp_millis())
    .execute(&mut *conn)
    .await?;

    debug!(question = %question.backup_identifier(), "Question inserted");
    Ok(())
}

/// Overwrite every mutable column of an existing record, `updated_at`
/// included. Fails with `NotFound` if no row matches the identity.
pub async fn write_question(
    conn: &mut SqliteConnection,
    question: &FeedbackQuestion,
) -> Result<()> {
    let affected = sqlx::query(
        r#"
        UPDATE feedback_questions SET
            question_number = ?,
            question_text = ?,
            question_metadata = ?,
            question_type = ?,
            giver_type = ?,
            recipient_type = ?,
            number_of_entities = ?,
            show_responses_to = ?,
            show_giver_name_to = ?,
            show_recipient_name_to = ?,
            updated_at = ?
        WHERE id = ? AND course_id = ? AND session_name = ?
        "#,
    )
    .bind(question.question_number)
    .bind(&question.question_text)
    .bind(metadata_json(question)?)
    .bind(question.question_type.as_str())
    .bind(question.giver_type.as_str())
    .bind(question.recipient_type.as_str())
    .bind(question.number_of_entities_to_give_feedback_to)
    .bind(viewers_json(&question.show_responses_to)?)
    .bind(viewers_json(&question.show_giver_name_to)?)
    .bind(viewers_json(&question.show_recipient_name_to)?)
    .bind(question.updated_at.timestamp_millis())
    .bind(question.id.as_str())
    .bind(&question.course_id)
    .bind(&question.session_name)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    if affected == 0 {
        return Err(DbError::not_found(format!(
            "Trying to update non-existent feedback question: {}",
            question.backup_identifier()
        )));
    }
    Ok(())
}

/// Resolve, merge ("keep existing"), validate and write an update.
///
/// `updated_at` advances unless `keep_timestamp` is set.
pub async fn update_in(
    conn: &mut SqliteConnection,
    update: &QuestionUpdate,
    keep_timestamp: bool,
) -> Result<FeedbackQuestion> {
    let session = sanitize_session(&update.session);
    let existing = lookup::find_by_id(&mut *conn, &session, &update.id)
        .await?
        .ok_or_else(|| {
            DbError::not_found(format!(
                "Trying to update non-existent feedback question: {} in {}",
                update.id, session
            ))
        })?;

    let mut merged = merge(&existing, update);
    if !keep_timestamp {
        merged.updated_at = FeedbackDb::now();
    }
    validate(&merged)?;

    write_question(&mut *conn, &merged).await?;
    Ok(merged)
}

/// Delete a question row. Returns whether a row was removed.
pub async fn remove_question(
    conn: &mut SqliteConnection,
    session: &SessionKey,
    id: &QuestionId,
) -> Result<bool> {
    let affected = sqlx::query(
        "DELETE FROM feedback_questions WHERE course_id = ? AND session_name = ? AND id = ?",
    )
    .bind(&session.course_id)
    .bind(&session.session_name)
    .bind(id.as_str())
    .execute(&mut *conn)
    .await?
    .rows_affected();

    Ok(affected > 0)
}

/// Delete a question from its session and close the gap it leaves.
///
/// A question that is not in the session is a no-op returning `false`.
pub async fn delete_in(
    conn: &mut SqliteConnection,
    session: &SessionKey,
    id: &QuestionId,
) -> Result<bool> {
    if sessions::find_session(&mut *conn, session).await?.is_none() {
        return Err(DbError::not_found(format!(
            "Trying to delete a question from non-existent session: {}",
            session
        )));
    }

    let mut questions = lookup::list_for_session(&mut *conn, session).await?;
    let Some(position) = questions.iter().position(|q| &q.id == id) else {
        debug!(session = %session, question_id = %id, "Question already absent, nothing to delete");
        return Ok(false);
    };

    // Moving the question to the end pulls every later question one slot
    // earlier; removing it from the end then leaves 1..N-1.
    let old_number = questions[position].question_number;
    let last = questions.len() as i32;
    let shifted = renumber::apply_shift(&mut questions, old_number, last)?;
    renumber::persist_shifts(&mut *conn, &questions, &shifted).await?;

    remove_question(&mut *conn, session, id).await
}

/// Delete every question of the given courses, without renumbering.
///
/// For course teardown, where the owning sessions go away too.
pub async fn remove_for_courses(conn: &mut SqliteConnection, course_ids: &[String]) -> Result<u64> {
    if course_ids.is_empty() {
        return Ok(0);
    }

    let placeholders = vec!["?"; course_ids.len()].join(", ");
    let sql = format!(
        "DELETE FROM feedback_questions WHERE course_id IN ({})",
        placeholders
    );
    let mut query = sqlx::query(&sql);
    for course_id in course_ids {
        query = query.bind(course_id.trim());
    }

    Ok(query.execute(&mut *conn).await?.rows_affected())
}

impl FeedbackDb {
    /// Add a question to an existing session.
    ///
    /// A `question_number` of zero or less appends; a number inside the
    /// session shifts later questions back by one.
    pub async fn create_question(
        &self,
        session: &SessionKey,
        question: NewQuestion,
    ) -> Result<FeedbackQuestion> {
        self.place_question(session, Placement::Create(question), 0)
            .await
    }

    /// Like [`FeedbackDb::create_question`], for callers that already know
    /// the session exists.
    pub async fn create_question_without_existence_check(
        &self,
        session: &SessionKey,
        question: NewQuestion,
    ) -> Result<FeedbackQuestion> {
        let mut tx = self.begin().await?;
        let result =
            placement::place_in(&mut tx, session, Placement::Create(question), 0, false).await;
        let created = self.finish(tx, result).await?;
        info!(question = %created.backup_identifier(), "Question created");
        Ok(created)
    }

    /// Add several questions in one transaction. Either all are created or
    /// none are.
    pub async fn create_questions(
        &self,
        session: &SessionKey,
        questions: Vec<NewQuestion>,
    ) -> Result<Vec<FeedbackQuestion>> {
        let session = sanitize_session(session);
        let mut tx = self.begin().await?;
        let result = async {
            if sessions::find_session(&mut tx, &session).await?.is_none() {
                return Err(DbError::not_found(format!(
                    "Trying to add questions to non-existent session: {}",
                    session
                )));
            }
            let mut created = Vec::with_capacity(questions.len());
            for question in questions {
                created.push(
                    placement::place_in(&mut tx, &session, Placement::Create(question), 0, false)
                        .await?,
                );
            }
            Ok::<_, DbError>(created)
        }
        .await;

        let created = self.finish(tx, result).await?;
        info!(session = %session, count = created.len(), "Questions created");
        Ok(created)
    }

    /// Update a question, advancing `updated_at`.
    pub async fn update_question(&self, update: &QuestionUpdate) -> Result<FeedbackQuestion> {
        self.update_question_with(update, false).await
    }

    /// Update a question, leaving `updated_at` untouched.
    pub async fn update_question_keep_timestamp(
        &self,
        update: &QuestionUpdate,
    ) -> Result<FeedbackQuestion> {
        self.update_question_with(update, true).await
    }

    async fn update_question_with(
        &self,
        update: &QuestionUpdate,
        keep_timestamp: bool,
    ) -> Result<FeedbackQuestion> {
        let mut tx = self.begin().await?;
        let result = update_in(&mut tx, update, keep_timestamp).await;
        let updated = self.finish(tx, result).await?;
        info!(question = %updated.backup_identifier(), keep_timestamp, "Question updated");
        Ok(updated)
    }

    /// Delete a question and renumber the rest of its session.
    ///
    /// Fails with `NotFound` only if the session is missing; deleting an
    /// unknown question returns `Ok(false)`.
    pub async fn delete_question(&self, session: &SessionKey, id: &QuestionId) -> Result<bool> {
        let session = sanitize_session(session);
        let mut tx = self.begin().await?;
        let result = delete_in(&mut tx, &session, id).await;
        let deleted = self.finish(tx, result).await?;
        if deleted {
            info!(session = %session, question_id = %id, "Question deleted");
        }
        Ok(deleted)
    }

    /// Delete all questions of one course.
    pub async fn delete_questions_for_course(&self, course_id: &str) -> Result<u64> {
        self.delete_questions_for_courses(&[course_id.to_string()])
            .await
    }

    /// Delete all questions of several courses. Sessions are left in place
    /// for the caller to remove.
    pub async fn delete_questions_for_courses(&self, course_ids: &[String]) -> Result<u64> {
        let mut tx = self.begin().await?;
        let result = remove_for_courses(&mut tx, course_ids).await;
        let deleted = self.finish(tx, result).await?;
        info!(courses = ?course_ids, deleted, "Course questions deleted");
        Ok(deleted)
    }
}
