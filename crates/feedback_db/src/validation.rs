//! Input sanitisation, validation and the "keep existing" merge.
//!
//! Everything here is pure; callers run it before touching the store so a
//! rejected input never leaves a partial write behind.

use crate::error::{DbError, Result};
use crate::types::*;

/// Trim identifiers.
pub fn sanitize_session(key: &SessionKey) -> SessionKey {
    SessionKey::new(key.course_id.trim(), key.session_name.trim())
}

/// Trim text and normalise visibility sets.
pub fn sanitize_new(mut question: NewQuestion) -> NewQuestion {
    question.question_text = question.question_text.trim().to_string();
    normalize_viewers(&mut question.show_responses_to);
    normalize_viewers(&mut question.show_giver_name_to);
    normalize_viewers(&mut question.show_recipient_name_to);
    question
}

fn normalize_viewers(viewers: &mut Vec<ParticipantType>) {
    viewers.sort();
    viewers.dedup();
}

/// Apply an update onto the stored record. `None` fields keep the stored value.
///
/// Timestamps are copied from `existing`; the writer decides whether
/// `updated_at` advances.
pub fn merge(existing: &FeedbackQuestion, update: &QuestionUpdate) -> FeedbackQuestion {
    let mut merged = existing.clone();

    if let Some(number) = update.question_number {
        merged.question_number = number;
    }
    if let Some(text) = &update.question_text {
        merged.question_text = text.trim().to_string();
    }
    if let Some(metadata) = &update.question_metadata {
        merged.question_metadata = Some(metadata.clone());
    }
    if let Some(question_type) = update.question_type {
        merged.question_type = question_type;
    }
    if let Some(giver) = update.giver_type {
        merged.giver_type = giver;
    }
    if let Some(recipient) = update.recipient_type {
        merged.recipient_type = recipient;
    }
    if let Some(limit) = update.number_of_entities_to_give_feedback_to {
        merged.number_of_entities_to_give_feedback_to = limit;
    }
    if let Some(viewers) = &update.show_responses_to {
        merged.show_responses_to = viewers.clone();
        normalize_viewers(&mut merged.show_responses_to);
    }
    if let Some(viewers) = &update.show_giver_name_to {
        merged.show_giver_name_to = viewers.clone();
        normalize_viewers(&mut merged.show_giver_name_to);
    }
    if let Some(viewers) = &update.show_recipient_name_to {
        merged.show_recipient_name_to = viewers.clone();
        normalize_viewers(&mut merged.show_recipient_name_to);
    }

    merged
}

/// Check a question record. Reports every failed rule at once.
pub fn validate(question: &FeedbackQuestion) -> Result<()> {
    let problems = invalidity_info(question);
    if problems.is_empty() {
        Ok(())
    } else {
        Err(DbError::invalid_input(problems.join("; ")))
    }
}

/// Human-readable list of failed rules; empty when the record is valid.
pub fn invalidity_info(question: &FeedbackQuestion) -> Vec<String> {
    let mut problems = Vec::new();

    if question.course_id.trim().is_empty() {
        problems.push("course id must not be empty".to_string());
    }
    if question.session_name.trim().is_empty() {
        problems.push("feedback session name must not be empty".to_string());
    }
    if question.question_text.trim().is_empty() {
        problems.push("question text must not be empty".to_string());
    }
    if question.question_number < 1 {
        problems.push(format!(
            "question number must be at least 1, got {}",
            question.question_number
        ));
    }
    if !question.giver_type.is_valid_giver() {
        problems.push(format!("{} is not a valid feedback giver", question.giver_type));
    }
    if !question.recipient_type.is_valid_recipient() {
        problems.push(format!(
            "{} is not a valid feedback recipient",
            question.recipient_type
        ));
    }

    let limit = question.number_of_entities_to_give_feedback_to;
    if limit != UNLIMITED_RECIPIENTS && limit < 1 {
        problems.push(format!(
            "number of entities to give feedback to must be positive or {}, got {}",
            UNLIMITED_RECIPIENTS, limit
        ));
    }

    let sets = [
        ("show responses to", &question.show_responses_to),
        ("show giver name to", &question.show_giver_name_to),
        ("show recipient name to", &question.show_recipient_name_to),
    ];
    for (label, viewers) in sets {
        for viewer in viewers.iter().filter(|v| !v.is_valid_viewer()) {
            problems.push(format!("{} cannot include {}", label, viewer));
        }
        if question.recipient_type == ParticipantType::None {
            for viewer in viewers.iter().filter(|v| {
                matches!(
                    v,
                    ParticipantType::Receiver | ParticipantType::ReceiverTeamMembers
                )
            }) {
                problems.push(format!(
                    "{} cannot include {} when there is no recipient",
                    label, viewer
                ));
            }
        }
    }

    for (label, viewers) in [
        ("giver name", &question.show_giver_name_to),
        ("recipient name", &question.show_recipient_name_to),
    ] {
        for viewer in viewers
            .iter()
            .filter(|v| !question.show_responses_to.contains(*v))
        {
            problems.push(format!(
                "{} cannot see the {} without seeing the response",
                viewer, label
            ));
        }
    }

    problems
}
