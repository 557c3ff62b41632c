//! Task domain model
//!
//! A task is one node of the hierarchy: a display name, an optional body text,
//! a status and the bookkeeping the store needs to keep memory and disk in sync.

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum StatusError {
    #[error("Invalid task status code: {0} (expected 1 = done, 2 = undone, 3 = default)")]
    InvalidStatus(i64),

    #[error("Invalid task status '{0}' (expected default, done or undone)")]
    InvalidLabel(String),
}

/// Status of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Default,
    Done,
    Undone,
}

impl TaskStatus {
    /// Returns the integer code stored in `task.cfg`
    pub fn code(&self) -> i64 {
        match self {
            TaskStatus::Done => 1,
            TaskStatus::Undone => 2,
            TaskStatus::Default => 3,
        }
    }

    /// Converts a stored integer code back into a status
    pub fn from_code(code: i64) -> Result<Self, StatusError> {
        match code {
            1 => Ok(TaskStatus::Done),
            2 => Ok(TaskStatus::Undone),
            3 => Ok(TaskStatus::Default),
            other => Err(StatusError::InvalidStatus(other)),
        }
    }

    /// Returns a display label for the status
    pub fn label(&self) -> &'static str {
        match self {
            TaskStatus::Default => "default",
            TaskStatus::Done => "done",
            TaskStatus::Undone => "undone",
        }
    }

    /// Returns true if this status represents completion
    pub fn is_complete(&self) -> bool {
        matches!(self, TaskStatus::Done)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TaskStatus {
    type Err = StatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(TaskStatus::Default),
            "done" => Ok(TaskStatus::Done),
            "undone" => Ok(TaskStatus::Undone),
            other => Err(StatusError::InvalidLabel(other.to_string())),
        }
    }
}

/// Returns current timestamp in milliseconds since epoch
pub fn current_timestamp() -> i64 {
    Utc::now().timestamp_millis()
}

/// A single task node
///
/// Parent and child links live in [`TaskTree`](super::TaskTree); the node
/// itself only carries its own attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskNode {
    name: String,
    text: Option<String>,
    status: TaskStatus,
    creation_time: i64,
    dirty: bool,

    /// Cached filesystem identifier, cleared on rename or move
    plain_name: Option<String>,

    /// Directory segment the node currently occupies on disk
    disk_name: Option<String>,
}

impl TaskNode {
    /// Creates a fresh task: dirty, empty text, stamped with the current time
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: Some(String::new()),
            status: TaskStatus::Default,
            creation_time: current_timestamp(),
            dirty: true,
            plain_name: None,
            disk_name: None,
        }
    }

    /// Builds a node that mirrors what was read from `dir_name` on disk
    pub fn loaded(
        name: impl Into<String>,
        creation_time: i64,
        status: TaskStatus,
        text: Option<String>,
        dir_name: impl Into<String>,
    ) -> Self {
        let dir_name = dir_name.into();
        Self {
            name: name.into(),
            text,
            status,
            creation_time,
            dirty: false,
            plain_name: Some(dir_name.clone()),
            disk_name: Some(dir_name),
        }
    }

    /// The root sentinel: never persisted, never named
    pub(crate) fn root() -> Self {
        Self {
            name: String::new(),
            text: None,
            status: TaskStatus::Default,
            creation_time: current_timestamp(),
            dirty: false,
            plain_name: None,
            disk_name: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sets the display name; returns true if it actually changed
    pub fn set_name(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if name == self.name {
            return false;
        }
        self.name = name;
        self.plain_name = None;
        self.dirty = true;
        true
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Sets the body text; returns true if it actually changed
    pub fn set_text(&mut self, text: Option<String>) -> bool {
        if text == self.text {
            return false;
        }
        self.text = text;
        self.dirty = true;
        true
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    /// Sets the status; returns true if it actually changed
    pub fn set_status(&mut self, status: TaskStatus) -> bool {
        if status == self.status {
            return false;
        }
        self.status = status;
        self.dirty = true;
        true
    }

    /// Sets the status from its stored integer code
    pub fn set_status_code(&mut self, code: i64) -> Result<bool, StatusError> {
        let status = TaskStatus::from_code(code)?;
        Ok(self.set_status(status))
    }

    pub fn creation_time(&self) -> i64 {
        self.creation_time
    }

    pub fn set_creation_time(&mut self, creation_time: i64) {
        if creation_time != self.creation_time {
            self.creation_time = creation_time;
            self.dirty = true;
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }

    /// Returns the cached plain name, if one has been allocated
    pub fn plain_name(&self) -> Option<&str> {
        self.plain_name.as_deref()
    }

    pub(crate) fn set_plain_name(&mut self, plain_name: Option<String>) {
        self.plain_name = plain_name;
    }

    /// Returns the directory segment this node occupies on disk, if any
    pub fn disk_name(&self) -> Option<&str> {
        self.disk_name.as_deref()
    }

    pub(crate) fn set_disk_name(&mut self, disk_name: Option<String>) {
        self.disk_name = disk_name;
    }
}

impl fmt::Display for TaskNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
