//! Domain models for tasktree
//!
//! Contains the task tree and naming rules without any I/O concerns.

mod plain_name;
mod task;
mod tree;

pub use plain_name::{base_name, AllocationError, PlainNameAllocator, MAX_LEN as PLAIN_NAME_MAX_LEN};
pub use task::{current_timestamp, StatusError, TaskNode, TaskStatus};
pub use tree::{NodeId, TaskTree, TreeError};
