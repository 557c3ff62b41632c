//! # Command-Line Interface
//!
//! User-facing `tasktree` commands and output formatting.
//!
//! ## Commands
//!
//! | Command | Purpose |
//! |---------|---------|
//! | `init [DIR]` | Create or open a tree and remember it |
//! | `list` | Print the tree, indented |
//! | `add <PARENT> <NAME>` | Add a task |
//! | `rm <PATH>` | Remove a task and its subtree |
//! | `rename <PATH> <NAME>` | Rename a task |
//! | `mv <PATH> <DEST>` | Move a task under another one |
//! | `text <PATH> <TEXT>` | Set a task's body text |
//! | `status <PATH> <STATUS>` | Set `default`, `done` or `undone` |
//! | `show <PATH>` | Print one task |
//!
//! Paths are plain names joined by `/` (e.g. `groceries/milk`); `/` or `.`
//! is the root.
//!
//! ## Output Formats
//!
//! All commands support `--format`:
//! - `text` (default) - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! ## Verbose Mode
//!
//! `--verbose` (or `-v`) prints debug messages and library logs:
//! ```bash
//! tasktree --verbose list
//! ```
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod app;
mod output;
mod task;

pub use app::{run, Cli, Commands};
pub use output::{Output, OutputFormat};
