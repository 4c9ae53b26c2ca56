//! Course command - course-wide teardown

use anyhow::Result;
use clap::Subcommand;
use feedback_db::FeedbackDb;
use serde_json::json;

use super::output::Output;

#[derive(Subcommand, Debug, Clone)]
pub enum CourseAction {
    /// Delete every question of one or more courses
    Purge {
        #[arg(required = true)]
        courses: Vec<String>,
    },
}

pub async fn run(db: &FeedbackDb, action: CourseAction, out: Output) -> Result<()> {
    match action {
        CourseAction::Purge { courses } => {
            let deleted = db.delete_questions_for_courses(&courses).await?;
            out.emit(
                &json!({ "courses": courses, "deletedQuestions": deleted }),
                || format!("Deleted {} question(s) from {}", deleted, courses.join(", ")),
            )
        }
    }
}
