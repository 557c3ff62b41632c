//! Directory-backed task tree store
//!
//! Every task lives in its own directory, named after the task's plain name and
//! nested under its parent's directory. The store keeps the in-memory tree and
//! that directory hierarchy in step:
//! - Structural changes (remove, rename, move) hit the disk immediately
//! - Attribute changes only mark the node dirty until the next write-out
//! - Plain names are allocated lazily, when a node's path is first needed

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::config_text::ConfigText;
use super::error::{io_err, Result, StoreError};
use super::lock::TreeLock;
use super::node_files;
use crate::domain::{current_timestamp, NodeId, PlainNameAllocator, TaskNode, TaskStatus, TaskTree};

/// Tree-level metadata file in the root directory
pub const TREE_META_FILE: &str = "meta.cfg";

const KEY_CREATION_TIME: &str = "creationTime";
const KEY_FORMAT: &str = "format";
const FORMAT_FS: &str = "fs";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StoreState {
    Open,
    Closed,
}

/// An open task tree backed by a directory
#[derive(Debug)]
pub struct TaskTreeStore {
    path: PathBuf,
    tree: TaskTree,
    meta: ConfigText,
    lock: Option<TreeLock>,
    ignore_lock: bool,
    state: StoreState,
}

impl TaskTreeStore {
    /// Opens (or creates) the tree stored under `path`
    pub fn open(path: impl AsRef<Path>, ignore_lock: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        fs::create_dir_all(&path).map_err(io_err(&path))?;

        if TreeLock::is_present(&path) && !ignore_lock {
            return Err(StoreError::Locked(path));
        }

        let meta = load_tree_meta(&path)?;

        let mut tree = TaskTree::new();
        let root = tree.root();
        if let Some(created) = meta.get_i64(KEY_CREATION_TIME) {
            let root_node = tree.get_mut(root)?;
            root_node.set_creation_time(created);
            root_node.set_dirty(false);
        }
        load_children(&mut tree, root, &path)?;

        let lock = TreeLock::acquire(&path, ignore_lock)?;
        info!(path = %path.display(), tasks = tree.len(), "opened task tree");

        Ok(Self {
            path,
            tree,
            meta,
            lock: Some(lock),
            ignore_lock,
            state: StoreState::Open,
        })
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state {
            StoreState::Open => Ok(()),
            StoreState::Closed => Err(StoreError::Closed),
        }
    }

    /// Backing directory of the tree
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.state == StoreState::Open
    }

    /// Creation time of the tree itself, from `meta.cfg`
    pub fn creation_time(&self) -> Option<i64> {
        self.meta.get_i64(KEY_CREATION_TIME)
    }

    /// Number of tasks, not counting the root
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn root(&self) -> NodeId {
        self.tree.root()
    }

    pub fn node(&self, id: NodeId) -> Result<&TaskNode> {
        Ok(self.tree.get(id)?)
    }

    pub fn children(&self, id: NodeId) -> Result<&[NodeId]> {
        Ok(self.tree.children(id)?)
    }

    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>> {
        Ok(self.tree.parent(id)?)
    }

    /// Every task below the root in pre-order, with its depth (root children are 1)
    pub fn walk(&self) -> Result<Vec<(NodeId, usize)>> {
        let mut out = Vec::with_capacity(self.tree.len());
        let mut stack: Vec<(NodeId, usize)> = self
            .tree
            .children(self.tree.root())?
            .iter()
            .rev()
            .map(|id| (*id, 1))
            .collect();

        while let Some((id, depth)) = stack.pop() {
            out.push((id, depth));
            stack.extend(self.tree.children(id)?.iter().rev().map(|c| (*c, depth + 1)));
        }
        Ok(out)
    }

    /// Resolves a `/`-separated path of plain names; `/`, `.` or `""` is the root
    pub fn find_by_path(&self, path: &str) -> Result<Option<NodeId>> {
        let mut current = self.tree.root();

        for segment in path.split('/').filter(|s| !s.is_empty() && *s != ".") {
            let mut found = None;
            for child in self.tree.children(current)? {
                let node = self.tree.get(*child)?;
                if node.plain_name() == Some(segment) || node.disk_name() == Some(segment) {
                    found = Some(*child);
                    break;
                }
            }
            match found {
                Some(child) => current = child,
                None => return Ok(None),
            }
        }

        Ok(Some(current))
    }

    /// Plain-name path of a node relative to the tree root (`/` for the root)
    pub fn path_of(&mut self, id: NodeId) -> Result<String> {
        self.ensure_open()?;
        if self.tree.is_root(id) {
            return Ok("/".to_string());
        }

        let mut segments = Vec::new();
        let mut chain = self.tree.ancestors(id)?;
        chain.reverse();
        chain.push(id);

        let mut dir = self.path.clone();
        for node in chain.into_iter().skip(1) {
            let plain = self.ensure_plain_name(node, &dir)?;
            dir.push(&plain);
            segments.push(plain);
        }
        Ok(segments.join("/"))
    }

    /// Adds a new task as the last child of `parent`; nothing is written yet
    pub fn add(&mut self, parent: NodeId, name: impl Into<String>) -> Result<NodeId> {
        self.ensure_open()?;
        let task = TaskNode::new(name);
        debug!(parent = %parent, name = task.name(), "adding task");
        Ok(self.tree.push_child(parent, task)?)
    }

    pub fn set_text(&mut self, id: NodeId, text: Option<String>) -> Result<bool> {
        self.ensure_open()?;
        if self.tree.is_root(id) {
            return Ok(false);
        }
        Ok(self.tree.get_mut(id)?.set_text(text))
    }

    pub fn set_status(&mut self, id: NodeId, status: TaskStatus) -> Result<bool> {
        self.ensure_open()?;
        if self.tree.is_root(id) {
            return Ok(false);
        }
        Ok(self.tree.get_mut(id)?.set_status(status))
    }

    /// Sets a status from its stored integer code; invalid codes change nothing
    pub fn set_status_code(&mut self, id: NodeId, code: i64) -> Result<bool> {
        let status = TaskStatus::from_code(code)?;
        self.set_status(id, status)
    }

    /// Deletes a task and its subtree, in memory and on disk
    pub fn remove(&mut self, id: NodeId) -> Result<()> {
        self.ensure_open()?;
        if self.tree.is_root(id) {
            return Ok(());
        }

        if let Some(dir) = self.disk_dir(id)?.filter(|d| d.is_dir()) {
            node_files::remove_tree(&dir)?;
        }

        let (parent, _) = self.tree.detach(id)?;
        let removed = self.tree.free_subtree(id)?;
        self.tree.get_mut(parent)?.set_dirty(true);

        debug!(node = %id, removed, "removed task");
        Ok(())
    }

    /// Renames a task, renaming its directory if the plain name changes.
    ///
    /// Returns false when there was nothing to do.
    pub fn rename(&mut self, id: NodeId, name: Option<&str>) -> Result<bool> {
        self.ensure_open()?;
        let Some(name) = name else {
            return Ok(false);
        };
        if self.tree.is_root(id) || self.tree.get(id)?.name() == name {
            return Ok(false);
        }

        let parent = self.tree.parent(id)?.ok_or(StoreError::UnknownNode(id))?;
        let parent_dir = self.dir_of(parent)?;

        let snapshot = self.tree.get(id)?.clone();
        self.tree.get_mut(id)?.set_name(name);

        if let Err(err) = self.ensure_plain_name(id, &parent_dir) {
            *self.tree.get_mut(id)? = snapshot;
            return Err(err);
        }

        debug!(node = %id, name, "renamed task");
        Ok(true)
    }

    /// Moves a task (and its subtree) to the end of `dest`'s children
    pub fn move_node(&mut self, dest: NodeId, id: NodeId) -> Result<bool> {
        self.move_to(dest, None, id)
    }

    /// Moves a task under `dest` at `index` (clamped), or last when `None`.
    ///
    /// Within the same parent this reorders; without an index it is a no-op.
    pub fn move_to(&mut self, dest: NodeId, index: Option<usize>, id: NodeId) -> Result<bool> {
        self.ensure_open()?;

        if !self.tree.check_move(dest, id)? {
            let Some(index) = index else {
                return Ok(false);
            };
            let (parent, _) = self.tree.detach(id)?;
            self.tree.attach(parent, id, Some(index))?;
            self.tree.get_mut(parent)?.set_dirty(true);
            return Ok(true);
        }

        let old_parent = self.tree.parent(id)?.ok_or(StoreError::UnknownNode(id))?;
        let old_dir = self.disk_dir(id)?.filter(|d| d.is_dir());
        let dest_dir = self.dir_of(dest)?;

        let snapshot = self.tree.get(id)?.clone();
        let (_, old_index) = self.tree.detach(id)?;
        self.tree.attach(dest, id, index)?;
        {
            let node = self.tree.get_mut(id)?;
            node.set_plain_name(None);
            node.set_disk_name(None);
        }

        if let Err(err) = self.relink(id, dest, &dest_dir, old_dir.as_deref()) {
            self.tree.detach(id)?;
            self.tree.attach(old_parent, id, Some(old_index))?;
            *self.tree.get_mut(id)? = snapshot;
            return Err(err);
        }

        self.tree.get_mut(old_parent)?.set_dirty(true);
        self.tree.get_mut(dest)?.set_dirty(true);
        debug!(node = %id, from = %old_parent, to = %dest, "moved task");
        Ok(true)
    }

    /// Gives a freshly attached node its plain name under `dest` and carries its
    /// directory over, if it had one
    fn relink(
        &mut self,
        id: NodeId,
        dest: NodeId,
        dest_dir: &Path,
        old_dir: Option<&Path>,
    ) -> Result<()> {
        let plain = self.ensure_plain_name(id, dest_dir)?;

        match old_dir {
            Some(old_dir) => {
                self.materialize_dir(dest)?;
                let new_dir = dest_dir.join(&plain);
                fs::rename(old_dir, &new_dir).map_err(io_err(old_dir))?;
                debug!(from = %old_dir.display(), to = %new_dir.display(), "moved task directory");
                self.tree.get_mut(id)?.set_disk_name(Some(plain));
            }
            None => self.tree.mark_subtree_dirty(id)?,
        }
        Ok(())
    }

    /// Writes every dirty task and every child index; returns tasks written
    pub fn write_out(&mut self) -> Result<usize> {
        let root = self.tree.root();
        self.write_out_from(root)
    }

    /// Like [`write_out`](Self::write_out), limited to `id` and its descendants
    pub fn write_out_from(&mut self, id: NodeId) -> Result<usize> {
        self.ensure_open()?;
        // Ancestors created here must carry a disk name or later moves and
        // removals lose track of the directory.
        let dir = self.materialize_dir(id)?;
        let written = self.write_recurse(id, &dir)?;
        debug!(node = %id, written, "wrote task tree");
        Ok(written)
    }

    fn write_recurse(&mut self, id: NodeId, dir: &Path) -> Result<usize> {
        let mut written = 0;

        fs::create_dir_all(dir).map_err(io_err(dir))?;

        if !self.tree.is_root(id) {
            let node = self.tree.get_mut(id)?;
            let plain = node.plain_name().map(String::from);
            node.set_disk_name(plain);

            if node.is_dirty() {
                node_files::write_node(dir, self.tree.get(id)?)?;
                written += 1;
            }
        }

        let children = self.tree.children(id)?.to_vec();
        let mut names = Vec::with_capacity(children.len());
        for child in &children {
            names.push(self.ensure_plain_name(*child, dir)?);
        }
        node_files::write_index(dir, &names)?;
        self.tree.get_mut(id)?.set_dirty(false);

        for (child, name) in children.iter().zip(&names) {
            written += self.write_recurse(*child, &dir.join(name))?;
        }
        Ok(written)
    }

    /// Saves the tree and releases the lock.
    ///
    /// A failed close leaves the store open, so it can be retried (possibly
    /// after [`relocate`](Self::relocate)). Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.state == StoreState::Closed {
            return Ok(());
        }

        self.meta.store(&self.path.join(TREE_META_FILE))?;
        let written = self.write_out()?;

        if let Some(lock) = self.lock.as_mut() {
            lock.release()?;
        }
        self.lock = None;
        self.state = StoreState::Closed;

        info!(path = %self.path.display(), written, "closed task tree");
        Ok(())
    }

    /// Points the store at a new backing directory.
    ///
    /// The lock moves along; every task is marked dirty and loses its disk
    /// location, so the next write-out recreates the whole tree there.
    pub fn relocate(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.ensure_open()?;
        let path = path.as_ref().to_path_buf();
        fs::create_dir_all(&path).map_err(io_err(&path))?;

        let lock = TreeLock::acquire(&path, self.ignore_lock)?;
        if let Some(old) = self.lock.as_mut() {
            if let Err(err) = old.release() {
                warn!(error = %err, "could not release the previous lock");
            }
        }
        self.lock = Some(lock);

        let root = self.tree.root();
        for id in self.tree.descendants(root)? {
            let node = self.tree.get_mut(id)?;
            node.set_plain_name(None);
            node.set_disk_name(None);
        }
        self.tree.mark_subtree_dirty(root)?;

        info!(from = %self.path.display(), to = %path.display(), "relocated task tree");
        self.path = path;
        Ok(())
    }

    /// Directory of a node, allocating plain names along the way
    fn dir_of(&mut self, id: NodeId) -> Result<PathBuf> {
        if self.tree.is_root(id) {
            return Ok(self.path.clone());
        }
        let parent = self.tree.parent(id)?.ok_or(StoreError::UnknownNode(id))?;
        let parent_dir = self.dir_of(parent)?;
        let plain = self.ensure_plain_name(id, &parent_dir)?;
        Ok(parent_dir.join(plain))
    }

    /// Where the node currently sits on disk, if every ancestor is there too
    fn disk_dir(&self, id: NodeId) -> Result<Option<PathBuf>> {
        let mut segments = Vec::new();
        let mut current = id;
        while !self.tree.is_root(current) {
            let node = self.tree.get(current)?;
            match node.disk_name() {
                Some(name) => segments.push(name.to_string()),
                None => return Ok(None),
            }
            current = self.tree.parent(current)?.ok_or(StoreError::UnknownNode(current))?;
        }

        let mut path = self.path.clone();
        for segment in segments.iter().rev() {
            path.push(segment);
        }
        Ok(Some(path))
    }

    /// Creates a node's directory (and its ancestors') without writing files
    fn materialize_dir(&mut self, id: NodeId) -> Result<PathBuf> {
        let dir = self.dir_of(id)?;
        fs::create_dir_all(&dir).map_err(io_err(&dir))?;

        let mut current = id;
        while !self.tree.is_root(current) {
            let node = self.tree.get_mut(current)?;
            if node.disk_name().is_none() {
                let plain = node.plain_name().map(String::from);
                node.set_disk_name(plain);
            }
            current = self.tree.parent(current)?.ok_or(StoreError::UnknownNode(current))?;
        }
        Ok(dir)
    }

    /// Returns the node's plain name, allocating one under `parent_dir` if needed.
    ///
    /// A node already on disk under another name has its directory renamed.
    fn ensure_plain_name(&mut self, id: NodeId, parent_dir: &Path) -> Result<String> {
        let node = self.tree.get(id)?;
        if let Some(plain) = node.plain_name() {
            return Ok(plain.to_string());
        }
        let own_disk = node.disk_name().map(String::from);

        let mut taken: HashSet<String> = node_files::list_entries(parent_dir)?;
        if let Some(own) = &own_disk {
            taken.remove(own);
        }
        for sibling in self.tree.siblings(id)? {
            let sibling = self.tree.get(sibling)?;
            taken.extend(sibling.plain_name().map(String::from));
            taken.extend(sibling.disk_name().map(String::from));
        }

        let plain = PlainNameAllocator::new(&taken).allocate(self.tree.get(id)?.name())?;

        if let Some(old) = own_disk.filter(|old| *old != plain) {
            let old_dir = parent_dir.join(&old);
            if old_dir.is_dir() {
                let new_dir = parent_dir.join(&plain);
                fs::rename(&old_dir, &new_dir).map_err(io_err(&old_dir))?;
                debug!(from = %old_dir.display(), to = %new_dir.display(), "renamed task directory");

                self.tree.get_mut(id)?.set_disk_name(Some(plain.clone()));
                if let Some(parent) = self.tree.parent(id)? {
                    self.tree.get_mut(parent)?.set_dirty(true);
                }
            } else {
                self.tree.get_mut(id)?.set_disk_name(None);
                self.tree.mark_subtree_dirty(id)?;
            }
        }

        self.tree.get_mut(id)?.set_plain_name(Some(plain.clone()));
        Ok(plain)
    }
}

/// Loads `meta.cfg`, or writes a fresh one for a new tree
fn load_tree_meta(root: &Path) -> Result<ConfigText> {
    let path = root.join(TREE_META_FILE);
    if path.is_file() {
        return Ok(ConfigText::load(&path)?);
    }

    let mut meta = ConfigText::new();
    meta.set(KEY_CREATION_TIME, current_timestamp().to_string());
    meta.set(KEY_FORMAT, FORMAT_FS);
    meta.store(&path)?;
    debug!(path = %path.display(), "initialized tree metadata");
    Ok(meta)
}

/// Loads the task directories below `dir` as children of `parent`.
///
/// Indexed entries come first in index order, then the rest by name.
fn load_children(tree: &mut TaskTree, parent: NodeId, dir: &Path) -> Result<()> {
    let subdirs = node_files::list_subdirs(dir)?;
    let present: HashSet<&str> = subdirs.iter().map(String::as_str).collect();

    let mut order: Vec<String> = Vec::with_capacity(subdirs.len());
    let mut indexed: HashSet<String> = HashSet::new();

    if let Some(index) = node_files::read_index(dir)? {
        for name in index {
            if !present.contains(name.as_str()) {
                warn!(dir = %dir.display(), entry = %name, "index names a missing directory, skipping");
                continue;
            }
            if indexed.insert(name.clone()) {
                order.push(name);
            }
        }
    }
    order.extend(subdirs.iter().filter(|name| !indexed.contains(*name)).cloned());

    for name in order {
        let child_dir = dir.join(&name);
        match node_files::read_node(&child_dir)? {
            Some(record) => {
                let id = tree.push_child(parent, record.into_node(&name))?;
                load_children(tree, id, &child_dir)?;
            }
            None if indexed.contains(&name) => {
                warn!(dir = %child_dir.display(), "indexed directory is not a task, skipping");
            }
            None => debug!(dir = %child_dir.display(), "skipping non-task directory"),
        }
    }
    Ok(())
}
