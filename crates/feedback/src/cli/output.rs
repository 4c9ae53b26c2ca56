//! Output formatting for CLI commands.
//!
//! Human output goes through comfy-table; `--json` prints the raw records.

use anyhow::Result;
use chrono::{DateTime, Utc};
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Color, ContentArrangement, Table};
use feedback_db::{FeedbackQuestion, ParticipantType};
use serde::Serialize;

/// Output mode chosen on the command line.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    pub json: bool,
}

impl Output {
    /// Print `value` as pretty JSON, or `message` for humans.
    pub fn emit<T: Serialize>(&self, value: &T, message: impl FnOnce() -> String) -> Result<()> {
        if self.json {
            print_json(value)
        } else {
            println!("{}", message());
            Ok(())
        }
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a table with headers.
pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let header_cells: Vec<Cell> = headers
        .iter()
        .map(|h| Cell::new(h).fg(Color::Cyan))
        .collect();
    table.set_header(header_cells);

    for row in rows {
        table.add_row(row);
    }

    println!("{}", table);
}

/// Print questions as a table in the order given.
pub fn print_questions(questions: &[FeedbackQuestion]) {
    let rows = questions
        .iter()
        .map(|q| {
            vec![
                q.question_number.to_string(),
                q.id.to_string(),
                q.question_type.to_string(),
                format!("{} -> {}", q.giver_type, q.recipient_type),
                format_viewers(&q.show_responses_to),
                truncate(&q.question_text, 48),
                format_timestamp(&q.updated_at),
            ]
        })
        .collect();

    print_table(
        &["#", "ID", "TYPE", "GIVER -> RECIPIENT", "RESPONSES VISIBLE TO", "TEXT", "UPDATED"],
        rows,
    );
}

pub fn format_viewers(viewers: &[ParticipantType]) -> String {
    if viewers.is_empty() {
        return "-".to_string();
    }
    viewers
        .iter()
        .map(|v| v.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Truncate to `max` characters, marking the cut with "...".
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let kept: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}
