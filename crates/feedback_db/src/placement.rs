//! Add or move a question as one unit of work.
//!
//! [`FeedbackDb::place_question`] re-resolves the session, loads its sorted
//! questions, shifts the ones between the old and new position, then inserts
//! or updates the placed question. Everything happens in one transaction, so
//! a failure at any step leaves the session exactly as it was.

use feedback_ids::QuestionId;
use sqlx::SqliteConnection;
use tracing::info;

use crate::error::{DbError, Result};
use crate::lifecycle;
use crate::lookup;
use crate::renumber;
use crate::sessions;
use crate::types::*;
use crate::validation::{merge, sanitize_new, sanitize_session, validate};
use crate::FeedbackDb;

/// What is being placed.
#[derive(Debug, Clone)]
pub enum Placement {
    /// A new question. Its `question_number` is the requested slot; zero or
    /// less appends.
    Create(NewQuestion),
    /// An existing question. `question_number: None` keeps its slot; zero or
    /// less moves it to the end.
    Update(QuestionUpdate),
}

/// Resolved old and new slot of a placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Positions {
    pub old_number: i32,
    pub new_number: i32,
}

/// Resolve where a question comes from and where it goes in a session of
/// `count` questions.
///
/// `stored_number` is the current slot of an existing question, `None` for a
/// new one (which comes from `count + 1`). A positive `old_number` from the
/// caller must agree with that, otherwise the caller's view is stale.
pub fn resolve_positions(
    count: usize,
    stored_number: Option<i32>,
    old_number: i32,
    requested: Option<i32>,
) -> Result<Positions> {
    let past_end = count as i32 + 1;
    let actual_old = stored_number.unwrap_or(past_end);

    if old_number > 0 && old_number != actual_old {
        return Err(DbError::invalid_input(format!(
            "question is at position {}, not {}",
            actual_old, old_number
        )));
    }

    let last_slot = if stored_number.is_some() { count as i32 } else { past_end };
    let new_number = match requested {
        None => actual_old,
        Some(n) if n <= 0 => past_end,
        Some(n) => n,
    }
    .clamp(1, last_slot.max(1));

    Ok(Positions {
        old_number: actual_old,
        new_number,
    })
}

/// Place a question on an open connection or transaction.
///
/// With `verify_session` unset the session lookup is skipped and a missing
/// session surfaces as a foreign key failure on insert.
pub async fn place_in(
    conn: &mut SqliteConnection,
    session: &SessionKey,
    placement: Placement,
    old_number: i32,
    verify_session: bool,
) -> Result<FeedbackQuestion> {
    let session = sanitize_session(session);
    if verify_session && sessions::find_session(&mut *conn, &session).await?.is_none() {
        return Err(DbError::not_found(format!(
            "Trying to place a question in non-existent session: {}",
            session
        )));
    }

    let mut questions = lookup::list_for_session(&mut *conn, &session).await?;

    match placement {
        Placement::Create(new) => {
            let new = sanitize_new(new);
            let positions =
                resolve_positions(questions.len(), None, old_number, Some(new.question_number))?;
            let question = new.into_question(
                QuestionId::new(),
                &session,
                positions.new_number,
                FeedbackDb::now(),
            );
            validate(&question)?;

            let shifted =
                renumber::apply_shift(&mut questions, positions.old_number, positions.new_number)?;
            renumber::persist_shifts(&mut *conn, &questions, &shifted).await?;
            lifecycle::insert_question(&mut *conn, &question).await?;
            Ok(question)
        }
        Placement::Update(mut update) => {
            if sanitize_session(&update.session) != session {
                return Err(DbError::invalid_input(format!(
                    "question {} belongs to {}, not {}",
                    update.id, update.session, session
                )));
            }
            let existing = questions
                .iter()
                .find(|q| q.id == update.id)
                .ok_or_else(|| {
                    DbError::not_found(format!(
                        "Trying to move non-existent feedback question: {} in {}",
                        update.id, session
                    ))
                })?;

            let positions = resolve_positions(
                questions.len(),
                Some(existing.question_number),
                old_number,
                update.question_number,
            )?;
            update.session = session.clone();
            update.question_number = Some(positions.new_number);
            validate(&merge(existing, &update))?;

            let shifted =
                renumber::apply_shift(&mut questions, positions.old_number, positions.new_number)?;
            renumber::persist_shifts(&mut *conn, &questions, &shifted).await?;
            lifecycle::update_in(&mut *conn, &update, false).await
        }
    }
}

impl FeedbackDb {
    /// Add or move a question, renumbering the rest of the session.
    ///
    /// `old_number` is the position the caller last saw the question at;
    /// pass zero or less to let the store work it out.
    pub async fn place_question(
        &self,
        session: &SessionKey,
        placement: Placement,
        old_number: i32,
    ) -> Result<FeedbackQuestion> {
        let mut tx = self.begin().await?;
        let result = place_in(&mut tx, session, placement, old_number, true).await;
        let placed = self.finish(tx, result).await?;
        info!(
            course_id = %placed.course_id,
            session = %placed.session_name,
            question_id = %placed.id,
            question_number = placed.question_number,
            "Question placed"
        );
        Ok(placed)
    }
}
