//! Styling for messages written to stderr.
//!
//! Stdout carries only JSON, so everything here is for humans.

use colored::Colorize;

pub(crate) struct Theme;

impl Theme {
    pub(crate) fn success(text: &str) -> String {
        format!("{} {}", "✓".green(), text)
    }

    pub(crate) fn error(text: &str) -> String {
        text.red().to_string()
    }

    pub(crate) fn warning(text: &str) -> String {
        format!("{} {}", "!".yellow(), text.yellow())
    }

    pub(crate) fn info(text: &str) -> String {
        format!("{} {}", "i".blue(), text)
    }

    /// Action status, colored by how far along it is.
    pub(crate) fn status(status: &str) -> String {
        match status {
            "EXECUTED" => status.green().to_string(),
            "APPROVED" => status.cyan().to_string(),
            "EXPIRED" => status.red().to_string(),
            _ => status.yellow().to_string(),
        }
    }
}
