//! Output formatting for CLI commands

use serde::Serialize;

use crate::domain::TaskStatus;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Output helper for consistent formatting
pub struct Output {
    format: OutputFormat,
    verbose: bool,
}

impl Output {
    pub fn new(format: OutputFormat, verbose: bool) -> Self {
        Self { format, verbose }
    }

    /// Prints a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Text => println!("{}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({
                        "success": true,
                        "message": message
                    })
                );
            }
        }
    }

    /// Prints structured data as a single JSON line
    pub fn data<T: Serialize>(&self, data: &T) {
        if let Ok(json) = serde_json::to_string(data) {
            println!("{}", json);
        }
    }

    /// Returns true if using JSON format
    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    /// Prints one line of the indented task listing
    pub fn task_row(&self, depth: usize, status: TaskStatus, name: &str) {
        println!("{}", task_row(depth, status, name));
    }

    /// Prints a `Label: value` line of a task summary
    pub fn field(&self, label: &str, value: impl std::fmt::Display) {
        println!("{}: {}", label, value);
    }

    /// Prints a titled block after a blank line
    pub fn section<I, S>(&self, title: &str, lines: I, indent: bool)
    where
        I: IntoIterator<Item = S>,
        S: std::fmt::Display,
    {
        println!("\n{}:", title);
        let pad = if indent { "  " } else { "" };
        for line in lines {
            println!("{}{}", pad, line);
        }
    }

    /// Prints a verbose debug message (only when --verbose is set)
    pub fn verbose(&self, message: &str) {
        if self.verbose {
            eprintln!("[verbose] {}", message);
        }
    }

    /// Prints a verbose debug message with context (only when --verbose is set)
    pub fn verbose_ctx(&self, context: &str, message: &str) {
        if self.verbose {
            eprintln!("[verbose:{}] {}", context, message);
        }
    }
}

fn status_marker(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Done => "[x]",
        TaskStatus::Undone => "[ ]",
        TaskStatus::Default => " - ",
    }
}

/// Top-level tasks sit at depth 1 and are not indented
fn task_row(depth: usize, status: TaskStatus, name: &str) -> String {
    format!(
        "{}{} {}",
        "  ".repeat(depth.saturating_sub(1)),
        status_marker(status),
        name
    )
}
