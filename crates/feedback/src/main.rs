//! `feedbackq`: manage the ordered questions of feedback sessions.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use feedback_logging::LogConfig;
use std::path::PathBuf;
use std::process::ExitCode;

mod cli;

#[derive(Parser, Debug)]
#[command(name = "feedbackq", about = "Manage ordered feedback session questions")]
struct Cli {
    /// Enable verbose logging (info/debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Database file (defaults to ~/.feedback_questions/feedback.sqlite3)
    #[arg(long, global = true, env = "FEEDBACK_DB")]
    db: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create or delete feedback sessions
    Session {
        #[command(subcommand)]
        action: cli::session::SessionAction,
    },

    /// Add, move, edit, delete and list questions
    Question {
        #[command(subcommand)]
        action: cli::question::QuestionAction,
    },

    /// Course-wide maintenance
    Course {
        #[command(subcommand)]
        action: cli::course::CourseAction,
    },
}

async fn run_command(cli: Cli) -> Result<()> {
    let db = cli::context::open_db(cli.db.as_deref()).await?;
    let out = cli::output::Output { json: cli.json };

    let result = match cli.command {
        Commands::Session { action } => cli::session::run(&db, action, out).await,
        Commands::Question { action } => cli::question::run(&db, action, out).await,
        Commands::Course { action } => cli::course::run(&db, action, out).await,
    };

    db.close().await;
    result
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = feedback_logging::init_logging(LogConfig {
        app_name: "feedbackq",
        verbose: cli.verbose,
    }) {
        eprintln!("Warning: failed to initialize file logging: {:#}", err);
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run_command(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}
