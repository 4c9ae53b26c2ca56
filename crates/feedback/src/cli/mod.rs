//! Subcommands of `feedbackq`.

pub mod context;
pub mod course;
pub mod output;
pub mod question;
pub mod session;
