//! Files of a single task directory
//!
//! | File | Contents |
//! |------|----------|
//! | `task.cfg` | `name`, `creation_time`, `status` in the config text format |
//! | `task.txt` | Raw UTF-8 body text |
//! | `children.ndx` | Child plain names, one per line, in order |
//! | `meta.txt` | Legacy two-line metadata (name, creation time), read only |

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::atomic::{write_atomic, TEMP_SUFFIX};
use super::config_text::ConfigText;
use super::error::{io_err, Result, StoreError};
use crate::domain::{TaskNode, TaskStatus};

/// Node metadata file
pub const META_FILE: &str = "task.cfg";

/// Node body text file
pub const TEXT_FILE: &str = "task.txt";

/// Child index file
pub const INDEX_FILE: &str = "children.ndx";

/// Metadata file written by older versions
pub const LEGACY_META_FILE: &str = "meta.txt";

const KEY_NAME: &str = "name";
const KEY_CREATION_TIME: &str = "creation_time";
const KEY_STATUS: &str = "status";

const TASK_FILES: [&str; 4] = [META_FILE, TEXT_FILE, INDEX_FILE, LEGACY_META_FILE];

/// What a task directory holds, before it becomes a tree node
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub name: String,
    pub creation_time: i64,
    pub status: TaskStatus,
    pub text: Option<String>,
}

impl NodeRecord {
    /// Turns the record into a clean node living in directory `dir_name`
    pub fn into_node(self, dir_name: &str) -> TaskNode {
        TaskNode::loaded(
            self.name,
            self.creation_time,
            self.status,
            self.text,
            dir_name,
        )
    }
}

/// Returns true if the directory holds node metadata
pub fn is_task_dir(dir: &Path) -> bool {
    dir.join(META_FILE).is_file() || dir.join(LEGACY_META_FILE).is_file()
}

/// Reads a task directory; `Ok(None)` if it is not a task directory
pub fn read_node(dir: &Path) -> Result<Option<NodeRecord>> {
    let meta_path = dir.join(META_FILE);
    let legacy_path = dir.join(LEGACY_META_FILE);

    let (name, creation_time, status) = if meta_path.is_file() {
        let config = ConfigText::load(&meta_path)?;
        let name = config
            .get(KEY_NAME)
            .ok_or_else(|| missing(&meta_path, KEY_NAME))?
            .to_string();
        let creation_time = config
            .get_i64(KEY_CREATION_TIME)
            .ok_or_else(|| missing(&meta_path, KEY_CREATION_TIME))?;
        let status = config
            .get_i64(KEY_STATUS)
            .and_then(|code| TaskStatus::from_code(code).ok())
            .unwrap_or_default();
        (name, creation_time, status)
    } else if legacy_path.is_file() {
        let content = fs::read_to_string(&legacy_path).map_err(io_err(&legacy_path))?;
        let mut lines = content.lines();
        let name = lines
            .next()
            .ok_or_else(|| missing(&legacy_path, KEY_NAME))?
            .to_string();
        let creation_time = lines
            .next()
            .and_then(|line| line.trim().parse().ok())
            .ok_or_else(|| missing(&legacy_path, KEY_CREATION_TIME))?;
        debug!(path = %legacy_path.display(), "read legacy metadata");
        (name, creation_time, TaskStatus::Default)
    } else {
        return Ok(None);
    };

    let text_path = dir.join(TEXT_FILE);
    let text = if text_path.is_file() {
        Some(fs::read_to_string(&text_path).map_err(io_err(&text_path))?)
    } else {
        None
    };

    Ok(Some(NodeRecord {
        name,
        creation_time,
        status,
        text,
    }))
}

fn missing(path: &Path, field: &'static str) -> StoreError {
    StoreError::MissingMetadata {
        path: path.to_path_buf(),
        field,
    }
}

/// Writes a node's metadata and body text into `dir`
pub fn write_node(dir: &Path, task: &TaskNode) -> Result<()> {
    let mut config = ConfigText::new();
    config.set(KEY_NAME, task.name());
    config.set(KEY_CREATION_TIME, task.creation_time().to_string());
    config.set(KEY_STATUS, task.status().code().to_string());
    config.store(&dir.join(META_FILE))?;

    let text_path = dir.join(TEXT_FILE);
    write_atomic(&text_path, task.text().unwrap_or_default().as_bytes())
        .map_err(io_err(&text_path))?;

    debug!(path = %dir.display(), name = task.name(), "wrote task files");
    Ok(())
}

/// Reads the child index of a directory, if one exists
pub fn read_index(dir: &Path) -> Result<Option<Vec<String>>> {
    let path = dir.join(INDEX_FILE);
    if !path.is_file() {
        return Ok(None);
    }

    let content = fs::read_to_string(&path).map_err(io_err(&path))?;
    Ok(Some(
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect(),
    ))
}

/// Writes the child index of a directory
pub fn write_index(dir: &Path, names: &[String]) -> Result<()> {
    let path = dir.join(INDEX_FILE);
    let mut content = String::new();
    for name in names {
        content.push_str(name);
        content.push('\n');
    }
    write_atomic(&path, content.as_bytes()).map_err(io_err(&path))
}

/// Lists the names of all sub-directories, sorted
pub fn list_subdirs(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err(dir))? {
        let entry = entry.map_err(io_err(dir))?;
        let file_type = entry.file_type().map_err(io_err(&entry.path()))?;
        if !file_type.is_dir() {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => names.push(name),
            Err(raw) => warn!(dir = %dir.display(), name = ?raw, "skipping non UTF-8 directory"),
        }
    }
    names.sort();
    Ok(names)
}

/// Lists every entry name in a directory (empty if it does not exist)
pub fn list_entries(dir: &Path) -> Result<HashSet<String>> {
    if !dir.is_dir() {
        return Ok(HashSet::new());
    }

    let mut names = HashSet::new();
    for entry in fs::read_dir(dir).map_err(io_err(dir))? {
        let entry = entry.map_err(io_err(dir))?;
        names.insert(entry.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}

fn is_task_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    TASK_FILES
        .iter()
        .any(|task| name == *task || name.strip_suffix(TEMP_SUFFIX) == Some(*task))
}

/// Deletes a task directory tree.
///
/// Task files are removed, then directories that ended up empty. A directory
/// still holding anything else is left in place; returns whether `dir` itself
/// was removed.
pub fn remove_tree(dir: &Path) -> Result<bool> {
    let mut kept: Vec<PathBuf> = Vec::new();

    let entries = fs::read_dir(dir)
        .map_err(io_err(dir))?
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(io_err(dir))?;

    for entry in entries {
        let path = entry.path();
        let file_type = entry.file_type().map_err(io_err(&path))?;

        if file_type.is_dir() {
            if !remove_tree(&path)? {
                kept.push(path);
            }
        } else if is_task_file(&path) {
            fs::remove_file(&path).map_err(io_err(&path))?;
        } else {
            kept.push(path);
        }
    }

    if kept.is_empty() {
        fs::remove_dir(dir).map_err(io_err(dir))?;
        debug!(path = %dir.display(), "removed task directory");
        Ok(true)
    } else {
        warn!(
            path = %dir.display(),
            kept = kept.len(),
            "directory holds non-task files, leaving it in place"
        );
        Ok(false)
    }
}
