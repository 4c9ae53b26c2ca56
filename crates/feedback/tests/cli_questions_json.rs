use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuestionRow {
    id: String,
    question_number: i32,
    question_text: String,
    giver_type: String,
    show_responses_to: Vec<String>,
    show_giver_name_to: Vec<String>,
    number_of_entities_to_give_feedback_to: i32,
    question_metadata: serde_json::Value,
}

fn feedbackq_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_feedbackq"))
}

struct Env {
    home: TempDir,
}

impl Env {
    fn new() -> Self {
        Self {
            home: TempDir::new().expect("create temp home"),
        }
    }

    fn run(&self, args: &[&str]) -> Output {
        let db = self.home.path().join("feedback.sqlite3");
        Command::new(feedbackq_bin())
            .arg("--db")
            .arg(&db)
            .args(args)
            .env("FEEDBACK_HOME", self.home.path())
            .env_remove("FEEDBACK_DB")
            .env_remove("FEEDBACK_DB_URL")
            .env_remove("RUST_LOG")
            .output()
            .expect("failed to execute feedbackq")
    }

    fn run_ok(&self, args: &[&str]) -> Output {
        let output = self.run(args);
        assert!(
            output.status.success(),
            "command failed: {}\nstdout:\n{}\nstderr:\n{}",
            args.join(" "),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        output
    }

    fn run_json<T: DeserializeOwned>(&self, args: &[&str]) -> T {
        let mut full = vec!["--json"];
        full.extend_from_slice(args);
        let output = self.run_ok(&full);
        serde_json::from_slice(&output.stdout).unwrap_or_else(|err| {
            panic!(
                "failed to parse JSON output: {}\nstdout:\n{}",
                err,
                String::from_utf8_lossy(&output.stdout)
            )
        })
    }

    fn list(&self) -> Vec<QuestionRow> {
        self.run_json(&["question", "list", "CS101", "Midterm"])
    }
}

fn texts(rows: &[QuestionRow]) -> Vec<&str> {
    rows.iter().map(|r| r.question_text.as_str()).collect()
}

#[test]
fn test_add_move_delete_keeps_numbering() {
    let env = Env::new();
    env.run_ok(&["session", "create", "CS101", "Midterm"]);

    for text in ["First", "Second", "Third"] {
        env.run_ok(&["question", "add", "CS101", "Midterm", text]);
    }
    let inserted: QuestionRow = env.run_json(&[
        "question", "add", "CS101", "Midterm", "Inserted", "--number", "2",
    ]);
    assert_eq!(inserted.question_number, 2);

    let rows = env.list();
    assert_eq!(texts(&rows), vec!["First", "Inserted", "Second", "Third"]);
    let numbers: Vec<i32> = rows.iter().map(|r| r.question_number).collect();
    assert_eq!(numbers, vec![1, 2, 3, 4]);

    let third = &rows[3];
    let moved: QuestionRow =
        env.run_json(&["question", "move", "CS101", "Midterm", &third.id, "1"]);
    assert_eq!(moved.question_number, 1);
    assert_eq!(
        texts(&env.list()),
        vec!["Third", "First", "Inserted", "Second"]
    );

    env.run_ok(&["question", "delete", "CS101", "Midterm", &inserted.id]);
    let rows = env.list();
    assert_eq!(texts(&rows), vec!["Third", "First", "Second"]);
    let numbers: Vec<i32> = rows.iter().map(|r| r.question_number).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
}

#[test]
fn test_add_with_roles_and_visibility() {
    let env = Env::new();
    env.run_ok(&["session", "create", "CS101", "Midterm"]);

    let added: QuestionRow = env.run_json(&[
        "question",
        "add",
        "CS101",
        "Midterm",
        "Rate your teammates",
        "--type",
        "contrib",
        "--giver",
        "students",
        "--recipient",
        "own-team-members",
        "--show-responses-to",
        "instructors,receiver",
    ]);

    assert_eq!(added.giver_type, "STUDENTS");
    assert_eq!(added.show_responses_to, vec!["INSTRUCTORS", "RECEIVER"]);
}

#[test]
fn test_edit_visibility_sets_together() {
    let env = Env::new();
    env.run_ok(&["session", "create", "CS101", "Midterm"]);

    let added: QuestionRow = env.run_json(&[
        "question",
        "add",
        "CS101",
        "Midterm",
        "Peer review",
        "--show-responses-to",
        "instructors,students",
        "--show-giver-name-to",
        "students",
    ]);
    assert_eq!(added.show_giver_name_to, vec!["STUDENTS"]);

    // Narrowing responses alone leaves students able to see names only.
    let output = env.run(&[
        "question",
        "edit",
        "CS101",
        "Midterm",
        &added.id,
        "--show-responses-to",
        "instructors",
    ]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("cannot see the giver name"), "{}", stderr);

    let edited: QuestionRow = env.run_json(&[
        "question",
        "edit",
        "CS101",
        "Midterm",
        &added.id,
        "--show-responses-to",
        "instructors",
        "--show-giver-name-to",
        "instructors",
        "--entities",
        "2",
        "--metadata",
        r#"{"hint":"be kind"}"#,
    ]);
    assert_eq!(edited.show_responses_to, vec!["INSTRUCTORS"]);
    assert_eq!(edited.show_giver_name_to, vec!["INSTRUCTORS"]);
    assert_eq!(edited.number_of_entities_to_give_feedback_to, 2);
    assert_eq!(edited.question_metadata["hint"], "be kind");
    assert_eq!(edited.question_number, 1);
}

#[test]
fn test_invalid_question_is_rejected() {
    let env = Env::new();
    env.run_ok(&["session", "create", "CS101", "Midterm"]);

    let output = env.run(&[
        "question", "add", "CS101", "Midterm", "Bad", "--giver", "receiver",
    ]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("not a valid feedback giver"), "{}", stderr);
    assert!(env.list().is_empty());
}

#[test]
fn test_missing_session_fails() {
    let env = Env::new();
    let output = env.run(&["question", "add", "CS101", "Nope", "Hello?"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Not found"));
}

#[test]
fn test_course_purge() {
    let env = Env::new();
    env.run_ok(&["session", "create", "CS101", "Midterm"]);
    env.run_ok(&["question", "add", "CS101", "Midterm", "One"]);
    env.run_ok(&["question", "add", "CS101", "Midterm", "Two"]);

    let result: serde_json::Value = env.run_json(&["course", "purge", "CS101"]);
    assert_eq!(result["deletedQuestions"], 2);
    assert!(env.list().is_empty());
}
