//! Renumbering engine.
//!
//! Works on a session's questions loaded in number order, so position `p`
//! lives at index `p - 1`. A shift opens a slot at `new_number` by moving
//! every question between the old and new position one slot towards the old
//! one. Only `question_number` changes, and the writes keep `updated_at`.

use sqlx::SqliteConnection;
use tracing::{debug, error};

use crate::error::{DbError, Result};
use crate::lifecycle;
use crate::lookup;
use crate::types::{FeedbackQuestion, QuestionUpdate, SessionKey};
use crate::validation::sanitize_session;
use crate::FeedbackDb;

/// Check that `questions` (sorted by number) are numbered exactly `1..=N`.
pub fn verify_contiguous(questions: &[FeedbackQuestion]) -> Result<()> {
    for (index, question) in questions.iter().enumerate() {
        let expected = index as i32 + 1;
        if question.question_number != expected {
            error!(
                question = %question.backup_identifier(),
                expected,
                "Question numbering is not contiguous"
            );
            return Err(DbError::invariant(format!(
                "expected question number {} but found {} ({})",
                expected,
                question.question_number,
                question.id
            )));
        }
    }
    Ok(())
}

/// Shift numbers in memory to open `new_number` for the question leaving
/// `old_number`. Returns the indices of the questions that changed.
///
/// `old_number` is `N + 1` for a question not yet in the list. Both numbers
/// must already be resolved to `1..=N+1`.
pub fn apply_shift(
    questions: &mut [FeedbackQuestion],
    old_number: i32,
    new_number: i32,
) -> Result<Vec<usize>> {
    verify_contiguous(questions)?;

    let past_end = questions.len() as i32 + 1;
    if !(1..=past_end).contains(&old_number) || !(1..=past_end).contains(&new_number) {
        return Err(DbError::invalid_input(format!(
            "cannot move a question from {} to {} in a session of {}",
            old_number,
            new_number,
            questions.len()
        )));
    }

    let mut touched = Vec::new();
    if old_number > new_number {
        for i in (new_number..old_number).rev() {
            let index = (i - 1) as usize;
            questions[index].question_number += 1;
            touched.push(index);
        }
    } else if old_number < new_number && old_number < past_end - 1 {
        for i in (old_number + 1)..=new_number {
            let index = (i - 1) as usize;
            questions[index].question_number -= 1;
            touched.push(index);
        }
    }

    Ok(touched)
}

/// Write the numbers of the shifted questions, keeping their timestamps.
///
/// A shift that no longer finds its row, or that somehow fails validation,
/// means the loaded list disagrees with the store.
pub async fn persist_shifts(
    conn: &mut SqliteConnection,
    questions: &[FeedbackQuestion],
    touched: &[usize],
) -> Result<()> {
    for &index in touched {
        let question = &questions[index];
        let update = QuestionUpdate::new(question.session_key(), question.id.clone())
            .question_number(question.question_number);

        match lifecycle::update_in(&mut *conn, &update, true).await {
            Ok(_) => {
                debug!(question = %question.backup_identifier(), "Question shifted");
            }
            Err(err @ (DbError::InvalidInput(_) | DbError::NotFound(_))) => {
                error!(
                    question = %question.backup_identifier(),
                    error = %err,
                    "Renumbering shift failed"
                );
                return Err(DbError::invariant(format!(
                    "shifting {} failed: {}",
                    question.backup_identifier(),
                    err
                )));
            }
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

impl FeedbackDb {
    /// Check that a session's questions are numbered exactly `1..=N`.
    pub async fn verify_numbering(&self, session: &SessionKey) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        let questions = lookup::list_for_session(&mut conn, &sanitize_session(session)).await?;
        verify_contiguous(&questions)
    }
}
