//! Session command - create and delete feedback sessions

use anyhow::{bail, Result};
use clap::Subcommand;
use feedback_db::{FeedbackDb, SessionKey};
use serde_json::json;

use super::output::Output;

#[derive(Subcommand, Debug, Clone)]
pub enum SessionAction {
    /// Create an empty feedback session
    Create { course: String, session: String },
    /// Delete a session and all of its questions
    Delete { course: String, session: String },
}

pub async fn run(db: &FeedbackDb, action: SessionAction, out: Output) -> Result<()> {
    match action {
        SessionAction::Create { course, session } => {
            let created = db.session_create(&SessionKey::new(course, session)).await?;
            out.emit(&created, || {
                format!("Created session {}", created.key())
            })
        }
        SessionAction::Delete { course, session } => {
            let key = SessionKey::new(course, session);
            if !db.session_delete(&key).await? {
                bail!("Session not found: {}", key);
            }
            out.emit(&json!({ "deleted": key }), || format!("Deleted session {}", key))
        }
    }
}
