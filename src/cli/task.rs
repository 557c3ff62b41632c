//! Task CLI commands

use anyhow::{Context, Result};
use chrono::DateTime;

use super::output::Output;
use crate::domain::{NodeId, TaskStatus};
use crate::storage::TaskTreeStore;

/// Looks up a task by its plain-name path
fn resolve(store: &TaskTreeStore, path: &str) -> Result<NodeId> {
    store
        .find_by_path(path)?
        .ok_or_else(|| anyhow::anyhow!("Task not found: {}", path))
}

fn resolve_task(store: &TaskTreeStore, path: &str) -> Result<NodeId> {
    let id = resolve(store, path)?;
    if id == store.root() {
        anyhow::bail!("'{}' is the tree root, not a task", path);
    }
    Ok(id)
}

fn format_time(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| millis.to_string())
}

pub fn list(store: &mut TaskTreeStore, output: &Output) -> Result<()> {
    let entries = store.walk()?;
    output.verbose_ctx("list", &format!("Walking {} tasks", entries.len()));

    if output.is_json() {
        let mut items = Vec::with_capacity(entries.len());
        for (id, depth) in entries {
            let path = store.path_of(id)?;
            let node = store.node(id)?;
            items.push(serde_json::json!({
                "path": path,
                "name": node.name(),
                "status": node.status(),
                "depth": depth,
                "children": store.children(id)?.len(),
            }));
        }
        output.data(&items);
    } else if entries.is_empty() {
        output.success("No tasks");
    } else {
        for (id, depth) in entries {
            let node = store.node(id)?;
            output.task_row(depth, node.status(), node.name());
        }
    }

    Ok(())
}

pub fn add(store: &mut TaskTreeStore, output: &Output, parent: &str, name: &str) -> Result<()> {
    let parent_id = resolve(store, parent)?;
    let id = store.add(parent_id, name)?;
    let path = store.path_of(id)?;

    if output.is_json() {
        let node = store.node(id)?;
        output.data(&serde_json::json!({
            "path": path,
            "name": node.name(),
            "status": node.status(),
            "creation_time": node.creation_time(),
        }));
    } else {
        output.success(&format!("Added task: {} - {}", path, name));
    }

    Ok(())
}

pub fn remove(store: &mut TaskTreeStore, output: &Output, path: &str) -> Result<()> {
    let id = resolve_task(store, path)?;
    let name = store.node(id)?.name().to_string();

    store
        .remove(id)
        .with_context(|| format!("Failed to remove task: {}", path))?;

    if output.is_json() {
        output.data(&serde_json::json!({
            "path": path,
            "name": name,
            "removed": true,
        }));
    } else {
        output.success(&format!("Removed task: {} - {}", path, name));
    }

    Ok(())
}

pub fn rename(store: &mut TaskTreeStore, output: &Output, path: &str, name: &str) -> Result<()> {
    let id = resolve_task(store, path)?;

    let changed = store
        .rename(id, Some(name))
        .with_context(|| format!("Failed to rename task: {}", path))?;
    let new_path = store.path_of(id)?;

    if output.is_json() {
        output.data(&serde_json::json!({
            "path": new_path,
            "old_path": path,
            "name": name,
            "changed": changed,
        }));
    } else if changed {
        output.success(&format!("Renamed task: {} -> {}", path, new_path));
    } else {
        output.success(&format!("Task {} is already named '{}'", path, name));
    }

    Ok(())
}

pub fn move_task(store: &mut TaskTreeStore, output: &Output, path: &str, dest: &str) -> Result<()> {
    let id = resolve_task(store, path)?;
    let dest_id = resolve(store, dest)?;

    let moved = store
        .move_node(dest_id, id)
        .with_context(|| format!("Failed to move {} to {}", path, dest))?;
    let new_path = store.path_of(id)?;

    if output.is_json() {
        output.data(&serde_json::json!({
            "path": new_path,
            "old_path": path,
            "moved": moved,
        }));
    } else if moved {
        output.success(&format!("Moved task: {} -> {}", path, new_path));
    } else {
        output.success(&format!("Task {} is already under {}", path, dest));
    }

    Ok(())
}

pub fn set_text(store: &mut TaskTreeStore, output: &Output, path: &str, text: &str) -> Result<()> {
    let id = resolve_task(store, path)?;
    store.set_text(id, Some(text.to_string()))?;

    if output.is_json() {
        output.data(&serde_json::json!({
            "path": path,
            "text": text,
        }));
    } else {
        output.success(&format!("Updated text: {}", path));
    }

    Ok(())
}

pub fn set_status(store: &mut TaskTreeStore, output: &Output, path: &str, status: &str) -> Result<()> {
    let id = resolve_task(store, path)?;
    let status: TaskStatus = status.parse()?;
    store.set_status(id, status)?;

    if output.is_json() {
        output.data(&serde_json::json!({
            "path": path,
            "status": status,
        }));
    } else {
        output.success(&format!("Marked task {} as {}", path, status));
    }

    Ok(())
}

pub fn show(store: &mut TaskTreeStore, output: &Output, path: &str) -> Result<()> {
    let id = resolve_task(store, path)?;
    let path = store.path_of(id)?;

    let child_ids = store.children(id)?.to_vec();
    let mut children = Vec::with_capacity(child_ids.len());
    for child in child_ids {
        children.push(store.path_of(child)?);
    }
    let node = store.node(id)?;

    if output.is_json() {
        output.data(&serde_json::json!({
            "path": path,
            "name": node.name(),
            "status": node.status(),
            "creation_time": node.creation_time(),
            "text": node.text(),
            "children": children,
        }));
    } else {
        output.field("Task", node.name());
        output.field("Path", &path);
        output.field("Status", node.status());
        output.field("Created", format_time(node.creation_time()));

        if !children.is_empty() {
            output.section("Children", &children, true);
        }

        if let Some(text) = node.text().filter(|t| !t.is_empty()) {
            output.section("Text", [text], false);
        }
    }

    Ok(())
}
