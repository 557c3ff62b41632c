//! Main CLI application structure

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use super::output::{Output, OutputFormat};
use super::task;
use crate::storage::{install_interrupt_handler, Settings, TaskTreeStore};

#[derive(Parser)]
#[command(name = "tasktree")]
#[command(author, version, about = "Hierarchical task lists stored as plain directories")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Task tree directory (defaults to the last tree used)
    #[arg(long, short = 'r', global = true, env = "TASKTREE_ROOT")]
    pub root: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Enable verbose output for debugging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Open the tree even if it looks locked by another process
    #[arg(long, global = true)]
    pub force: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a task tree
    Init {
        /// Directory to initialize (defaults to --root, then the current directory)
        path: Option<PathBuf>,
    },

    /// Show the whole tree
    List,

    /// Add a task
    ///
    /// Examples:
    ///   tasktree add / "Groceries"
    ///   tasktree add groceries "Buy milk"
    Add {
        /// Parent task path (`/` for the top level)
        parent: String,

        /// Task name
        name: String,
    },

    /// Remove a task and everything below it
    Rm {
        /// Task path
        path: String,
    },

    /// Rename a task
    Rename {
        /// Task path
        path: String,

        /// New name
        name: String,
    },

    /// Move a task under another one
    Mv {
        /// Task path
        path: String,

        /// New parent path (`/` for the top level)
        dest: String,
    },

    /// Set a task's text
    Text {
        /// Task path
        path: String,

        /// New text
        text: String,
    },

    /// Set a task's status
    Status {
        /// Task path
        path: String,

        /// default, done or undone
        status: String,
    },

    /// Show task details
    Show {
        /// Task path
        path: String,
    },
}

/// Installs the log subscriber; `RUST_LOG` wins over `--verbose`
fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "off" };
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|raw| {
            let raw = raw.trim();
            if raw.is_empty() {
                return None;
            }
            EnvFilter::try_new(raw).ok()
        })
        .unwrap_or_else(|| EnvFilter::new(fallback));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .try_init();
}

/// Main entry point for the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let output = Output::new(cli.format, cli.verbose);

    output.verbose("tasktree starting");

    if let Err(err) = install_interrupt_handler() {
        output.verbose(&format!("Could not install Ctrl+C handler: {}", err));
    }

    let mut settings = Settings::load()?;
    let ignore_lock = cli.force || settings.ignore_lock;

    let root = match &cli.command {
        Commands::Init { path } => path
            .clone()
            .or_else(|| cli.root.clone())
            .unwrap_or_else(|| PathBuf::from(".")),
        _ => resolve_root(cli.root.as_deref(), &settings)?,
    };
    output.verbose_ctx("root", &format!("Using task tree at: {}", root.display()));

    let mut store = TaskTreeStore::open(&root, ignore_lock)
        .with_context(|| format!("Failed to open task tree at {}", root.display()))?;

    match cli.command {
        Commands::Init { .. } => {
            output.success(&format!("Initialized task tree at {}", root.display()));
        }
        Commands::List => task::list(&mut store, &output)?,
        Commands::Add { parent, name } => task::add(&mut store, &output, &parent, &name)?,
        Commands::Rm { path } => task::remove(&mut store, &output, &path)?,
        Commands::Rename { path, name } => task::rename(&mut store, &output, &path, &name)?,
        Commands::Mv { path, dest } => task::move_task(&mut store, &output, &path, &dest)?,
        Commands::Text { path, text } => task::set_text(&mut store, &output, &path, &text)?,
        Commands::Status { path, status } => {
            task::set_status(&mut store, &output, &path, &status)?
        }
        Commands::Show { path } => task::show(&mut store, &output, &path)?,
    }

    store
        .close()
        .with_context(|| format!("Failed to save task tree at {}", root.display()))?;

    settings.last_root = Some(std::fs::canonicalize(&root).unwrap_or(root));
    settings.save()?;

    output.verbose("Command completed successfully");
    Ok(())
}

/// Picks the tree to operate on: `--root`, then the last tree used
fn resolve_root(root: Option<&Path>, settings: &Settings) -> Result<PathBuf> {
    root.map(Path::to_path_buf)
        .or_else(|| settings.last_root.clone())
        .ok_or_else(|| {
            anyhow::anyhow!("No task tree selected. Use --root or run 'tasktree init <DIR>' first.")
        })
}
