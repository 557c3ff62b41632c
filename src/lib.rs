//! tasktree - Hierarchical task lists stored as plain directories
//!
//! Each task is a directory holding its metadata, its text and an ordered
//! index of its children. [`storage::TaskTreeStore`] keeps the in-memory
//! tree and the directory hierarchy in sync.

pub mod cli;
pub mod domain;
pub mod storage;

pub use domain::{NodeId, TaskNode, TaskStatus, TaskTree};
pub use storage::{StoreError, TaskTreeStore};
