//! Schema creation. All CREATE statements live here.

use crate::error::Result;
use crate::FeedbackDb;
use tracing::debug;

impl FeedbackDb {
    /// Ensure all tables exist.
    pub(crate) async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS feedback_sessions (
                course_id TEXT NOT NULL,
                session_name TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                PRIMARY KEY (course_id, session_name)
            )"#,
        )
        .execute(&self.pool)
        .await?;

        // No ON DELETE CASCADE: questions are deleted before their session.
        // question_number is not UNIQUE; a shift passes through duplicates
        // before the transaction commits.
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS feedback_questions (
                id TEXT PRIMARY KEY,
                course_id TEXT NOT NULL,
                session_name TEXT NOT NULL,
                question_number INTEGER NOT NULL,
                question_text TEXT NOT NULL,
                question_metadata TEXT,
                question_type TEXT NOT NULL,
                giver_type TEXT NOT NULL,
                recipient_type TEXT NOT NULL,
                number_of_entities INTEGER NOT NULL,
                show_responses_to TEXT NOT NULL,
                show_giver_name_to TEXT NOT NULL,
                show_recipient_name_to TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                FOREIGN KEY (course_id, session_name)
                    REFERENCES feedback_sessions(course_id, session_name)
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_questions_session_number \
             ON feedback_questions(course_id, session_name, question_number)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_questions_giver \
             ON feedback_questions(course_id, session_name, giver_type)",
        )
        .execute(&self.pool)
        .await?;

        debug!("Database schema verified");
        Ok(())
    }
}
