//! # Storage Layer
//!
//! Persistence of a task tree as a directory hierarchy.
//!
//! ## On-disk Layout
//!
//! | Data | Format | Location |
//! |------|--------|----------|
//! | Tree metadata | Config text | `<root>/meta.cfg` |
//! | Lock | Zero-byte file | `<root>/tree.lck` |
//! | Task metadata | Config text | `<task dir>/task.cfg` |
//! | Task body | Raw UTF-8 | `<task dir>/task.txt` |
//! | Child order | One plain name per line | `<dir>/children.ndx` |
//! | Settings | TOML | platform config dir |
//!
//! ```text
//! tree/
//! ├── meta.cfg
//! ├── tree.lck
//! ├── children.ndx
//! └── groceries/
//!     ├── task.cfg
//!     ├── task.txt
//!     ├── children.ndx
//!     └── milk/
//!         └── ...
//! ```
//!
//! ## Concurrency Safety
//!
//! - [`TreeLock`] keeps other processes out while a tree is open (`fs2`)
//! - All file writes are atomic (temp file + rename)
//!
//! ## Key Types
//!
//! - [`TaskTreeStore`] - Open tree, structural operations and write-out
//! - [`ConfigText`] - The line-oriented key/value format
//! - [`Settings`] - User settings

mod atomic;
mod config_text;
mod error;
mod lock;
mod node_files;
mod settings;
mod store;

pub use config_text::{ConfigText, ConfigTextError};
pub use error::{Result, StoreError};
pub use lock::{install_interrupt_handler, LockRegistry, TreeLock, LOCK_FILE, LOCK_REGISTRY};
pub use node_files::{INDEX_FILE, LEGACY_META_FILE, META_FILE, TEXT_FILE};
pub use settings::{Settings, SettingsError, SETTINGS_ENV};
pub use store::{TaskTreeStore, TREE_META_FILE};
