//! Question command - add, move, edit, delete and list questions
//!
//! `add` and `move` go through `place_question`, so the rest of the session is
//! renumbered in the same transaction. `edit` never changes the position.

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use feedback_db::{
    FeedbackDb, NewQuestion, ParticipantType, Placement, QuestionId, QuestionType, QuestionUpdate,
    SessionKey, UNLIMITED_RECIPIENTS,
};
use serde_json::json;

use super::output::{print_json, print_questions, Output};

/// Course and session a question belongs to.
#[derive(Args, Debug, Clone)]
pub struct SessionArgs {
    /// Course ID
    pub course: String,
    /// Feedback session name
    pub session: String,
}

impl SessionArgs {
    fn key(&self) -> SessionKey {
        SessionKey::new(&self.course, &self.session)
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum QuestionAction {
    /// Add a question (appends unless --number is given)
    Add {
        #[command(flatten)]
        target: SessionArgs,

        /// Question text
        text: String,

        /// Question type (text, mcq, msq, numscale, constsum, contrib, rubric, ...)
        #[arg(short = 't', long = "type", default_value = "TEXT")]
        question_type: QuestionType,

        /// Who answers the question
        #[arg(long, default_value = "STUDENTS")]
        giver: ParticipantType,

        /// Who the answers are about
        #[arg(long, default_value = "SELF")]
        recipient: ParticipantType,

        /// Position to insert at; later questions move back
        #[arg(short = 'n', long)]
        number: Option<i32>,

        /// Recipients each giver answers for (-100 = unlimited)
        #[arg(long, default_value_t = UNLIMITED_RECIPIENTS, allow_negative_numbers = true)]
        entities: i32,

        /// Roles that can see responses (comma-separated)
        #[arg(long, value_delimiter = ',')]
        show_responses_to: Vec<ParticipantType>,

        /// Roles that can see the giver's name (comma-separated)
        #[arg(long, value_delimiter = ',')]
        show_giver_name_to: Vec<ParticipantType>,

        /// Roles that can see the recipient's name (comma-separated)
        #[arg(long, value_delimiter = ',')]
        show_recipient_name_to: Vec<ParticipantType>,

        /// Type-specific payload as JSON
        #[arg(long)]
        metadata: Option<String>,
    },

    /// Move a question to another position
    Move {
        #[command(flatten)]
        target: SessionArgs,

        /// Question ID
        id: QuestionId,

        /// New position (0 or less moves it to the end)
        #[arg(allow_negative_numbers = true)]
        to: i32,

        /// Position the question is expected to be at; fails if it moved
        #[arg(long)]
        from: Option<i32>,
    },

    /// Edit question fields in place
    Edit {
        #[command(flatten)]
        target: SessionArgs,

        /// Question ID
        id: QuestionId,

        #[arg(long)]
        text: Option<String>,

        #[arg(short = 't', long = "type")]
        question_type: Option<QuestionType>,

        #[arg(long)]
        giver: Option<ParticipantType>,

        #[arg(long)]
        recipient: Option<ParticipantType>,

        /// Recipients each giver answers for (-100 = unlimited)
        #[arg(long, allow_negative_numbers = true)]
        entities: Option<i32>,

        /// Roles that can see responses (comma-separated, replaces the set)
        #[arg(long, value_delimiter = ',')]
        show_responses_to: Option<Vec<ParticipantType>>,

        /// Roles that can see the giver's name (comma-separated, replaces the set)
        #[arg(long, value_delimiter = ',')]
        show_giver_name_to: Option<Vec<ParticipantType>>,

        /// Roles that can see the recipient's name (comma-separated, replaces the set)
        #[arg(long, value_delimiter = ',')]
        show_recipient_name_to: Option<Vec<ParticipantType>>,

        /// Type-specific payload as JSON
        #[arg(long)]
        metadata: Option<String>,

        /// Do not advance the last-updated timestamp
        #[arg(long)]
        keep_timestamp: bool,
    },

    /// Delete a question and close the gap it leaves
    Delete {
        #[command(flatten)]
        target: SessionArgs,

        /// Question ID
        id: QuestionId,
    },

    /// List a session's questions in order
    List {
        #[command(flatten)]
        target: SessionArgs,

        /// Only questions answered by this role
        #[arg(long)]
        giver: Option<ParticipantType>,
    },
}

pub async fn run(db: &FeedbackDb, action: QuestionAction, out: Output) -> Result<()> {
    match action {
        QuestionAction::Add {
            target,
            text,
            question_type,
            giver,
            recipient,
            number,
            entities,
            show_responses_to,
            show_giver_name_to,
            show_recipient_name_to,
            metadata,
        } => {
            let mut question = NewQuestion::new(text, question_type, giver, recipient)
                .at_number(number.unwrap_or(0))
                .with_entity_limit(entities)
                .with_visibility(show_responses_to, show_giver_name_to, show_recipient_name_to);
            if let Some(raw) = metadata {
                let value: serde_json::Value =
                    serde_json::from_str(&raw).context("--metadata is not valid JSON")?;
                question = question.with_metadata(value);
            }

            let created = db
                .place_question(&target.key(), Placement::Create(question), 0)
                .await?;
            out.emit(&created, || {
                format!(
                    "Added question {} at position {}",
                    created.id, created.question_number
                )
            })
        }

        QuestionAction::Move {
            target,
            id,
            to,
            from,
        } => {
            let update = QuestionUpdate::new(target.key(), id).question_number(to);
            let moved = db
                .place_question(&target.key(), Placement::Update(update), from.unwrap_or(0))
                .await?;
            out.emit(&moved, || {
                format!("Moved question {} to position {}", moved.id, moved.question_number)
            })
        }

        QuestionAction::Edit {
            target,
            id,
            text,
            question_type,
            giver,
            recipient,
            entities,
            show_responses_to,
            show_giver_name_to,
            show_recipient_name_to,
            metadata,
            keep_timestamp,
        } => {
            let mut update = QuestionUpdate::new(target.key(), id);
            update.question_text = text;
            update.question_type = question_type;
            update.giver_type = giver;
            update.recipient_type = recipient;
            update.number_of_entities_to_give_feedback_to = entities;
            update.show_responses_to = show_responses_to;
            update.show_giver_name_to = show_giver_name_to;
            update.show_recipient_name_to = show_recipient_name_to;
            update.question_metadata = metadata
                .map(|raw| serde_json::from_str(&raw))
                .transpose()
                .context("--metadata is not valid JSON")?;

            let updated = if keep_timestamp {
                db.update_question_keep_timestamp(&update).await?
            } else {
                db.update_question(&update).await?
            };
            out.emit(&updated, || format!("Updated question {}", updated.id))
        }

        QuestionAction::Delete { target, id } => {
            let key = target.key();
            if !db.delete_question(&key, &id).await? {
                bail!("Question {} not found in {}", id, key);
            }
            out.emit(&json!({ "deleted": id }), || format!("Deleted question {}", id))
        }

        QuestionAction::List { target, giver } => {
            let key = target.key();
            let mut questions = match giver {
                Some(giver) => db.list_questions_for_giver_type(&key, giver).await?,
                None => db.list_questions_for_session(&key).await?,
            };
            questions.sort_by_key(|q| q.question_number);

            if out.json {
                return print_json(&questions);
            }
            if questions.is_empty() {
                println!("No questions in {}", key);
                return Ok(());
            }
            print_questions(&questions);
            Ok(())
        }
    }
}
