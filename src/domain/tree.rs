//! Task tree
//!
//! Nodes live in an arena and are addressed by stable [`NodeId`]s. The tree
//! owns every parent/child link, so ownership and traversal stay independent of
//! whatever surface is displaying the hierarchy.

use std::fmt;

use thiserror::Error;

use super::task::TaskNode;

#[derive(Debug, Error, PartialEq)]
pub enum TreeError {
    #[error("Task node not found: {0}")]
    UnknownNode(NodeId),

    #[error("Invalid move: {0}")]
    InvalidMove(String),
}

/// Stable handle to a node in a [`TaskTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Returns the raw arena index
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
struct Slot {
    task: TaskNode,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// An ordered tree of tasks under a sentinel root
#[derive(Debug, Clone)]
pub struct TaskTree {
    slots: Vec<Option<Slot>>,
    root: NodeId,
}

impl Default for TaskTree {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskTree {
    /// Creates a tree holding only the root sentinel
    pub fn new() -> Self {
        Self {
            slots: vec![Some(Slot {
                task: TaskNode::root(),
                parent: None,
                children: Vec::new(),
            })],
            root: NodeId(0),
        }
    }

    /// Returns the root sentinel
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn is_root(&self, id: NodeId) -> bool {
        id == self.root
    }

    /// Returns true if the id refers to a live node
    pub fn contains(&self, id: NodeId) -> bool {
        self.slots.get(id.0).is_some_and(|s| s.is_some())
    }

    /// Number of tasks in the tree, not counting the root
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count() - 1
    }

    /// Returns true if the tree holds nothing but the root
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, id: NodeId) -> Result<&Slot, TreeError> {
        self.slots
            .get(id.0)
            .and_then(|s| s.as_ref())
            .ok_or(TreeError::UnknownNode(id))
    }

    fn slot_mut(&mut self, id: NodeId) -> Result<&mut Slot, TreeError> {
        self.slots
            .get_mut(id.0)
            .and_then(|s| s.as_mut())
            .ok_or(TreeError::UnknownNode(id))
    }

    pub fn get(&self, id: NodeId) -> Result<&TaskNode, TreeError> {
        self.slot(id).map(|s| &s.task)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Result<&mut TaskNode, TreeError> {
        self.slot_mut(id).map(|s| &mut s.task)
    }

    /// Returns the parent of a node; `None` for the root
    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>, TreeError> {
        self.slot(id).map(|s| s.parent)
    }

    /// Returns the children of a node in order
    pub fn children(&self, id: NodeId) -> Result<&[NodeId], TreeError> {
        self.slot(id).map(|s| s.children.as_slice())
    }

    /// Returns the other children of a node's parent
    pub fn siblings(&self, id: NodeId) -> Result<Vec<NodeId>, TreeError> {
        match self.parent(id)? {
            Some(parent) => Ok(self
                .children(parent)?
                .iter()
                .copied()
                .filter(|c| *c != id)
                .collect()),
            None => Ok(Vec::new()),
        }
    }

    /// Appends a new task as the last child of `parent`
    pub fn push_child(&mut self, parent: NodeId, task: TaskNode) -> Result<NodeId, TreeError> {
        self.slot(parent)?;

        let id = NodeId(self.slots.len());
        self.slots.push(Some(Slot {
            task,
            parent: Some(parent),
            children: Vec::new(),
        }));
        self.slot_mut(parent)?.children.push(id);
        Ok(id)
    }

    /// Unlinks a node from its parent, keeping its subtree intact.
    ///
    /// Returns the former parent and the index the node had there.
    pub fn detach(&mut self, id: NodeId) -> Result<(NodeId, usize), TreeError> {
        let parent = self
            .parent(id)?
            .ok_or_else(|| TreeError::InvalidMove("the root cannot be detached".to_string()))?;

        let siblings = &mut self.slot_mut(parent)?.children;
        let index = siblings
            .iter()
            .position(|c| *c == id)
            .ok_or(TreeError::UnknownNode(id))?;
        siblings.remove(index);

        self.slot_mut(id)?.parent = None;
        Ok((parent, index))
    }

    /// Links a detached node under `parent`, at `index` or at the end
    pub fn attach(
        &mut self,
        parent: NodeId,
        id: NodeId,
        index: Option<usize>,
    ) -> Result<(), TreeError> {
        self.slot(id)?;
        let children = &mut self.slot_mut(parent)?.children;
        let index = index.map_or(children.len(), |i| i.min(children.len()));
        children.insert(index, id);
        self.slot_mut(id)?.parent = Some(parent);
        Ok(())
    }

    /// Drops a detached node and all of its descendants from the arena.
    ///
    /// Freed slots are never handed out again, so a stale [`NodeId`] keeps
    /// failing with [`TreeError::UnknownNode`] instead of naming a new task.
    /// The arena only grows for the lifetime of an open tree.
    pub fn free_subtree(&mut self, id: NodeId) -> Result<usize, TreeError> {
        let doomed = self.descendants(id)?;
        for node in &doomed {
            self.slots[node.0] = None;
        }
        Ok(doomed.len())
    }

    /// Returns `id` and all of its descendants in pre-order
    pub fn descendants(&self, id: NodeId) -> Result<Vec<NodeId>, TreeError> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            let slot = self.slot(next)?;
            out.push(next);
            stack.extend(slot.children.iter().rev().copied());
        }
        Ok(out)
    }

    /// Returns the chain from `id`'s parent up to the root
    pub fn ancestors(&self, id: NodeId) -> Result<Vec<NodeId>, TreeError> {
        let mut out = Vec::new();
        let mut current = self.parent(id)?;
        while let Some(node) = current {
            out.push(node);
            current = self.parent(node)?;
        }
        Ok(out)
    }

    /// Returns true if `node` is `candidate` or one of its ancestors
    pub fn is_self_or_ancestor(&self, node: NodeId, candidate: NodeId) -> Result<bool, TreeError> {
        let mut current = Some(candidate);
        while let Some(at) = current {
            if at == node {
                return Ok(true);
            }
            current = self.parent(at)?;
        }
        Ok(false)
    }

    /// Validates moving `node` under `dest` without touching the tree.
    ///
    /// Returns `Ok(false)` when `dest` already is the parent.
    pub fn check_move(&self, dest: NodeId, node: NodeId) -> Result<bool, TreeError> {
        self.slot(dest)?;
        if self.is_root(node) {
            return Err(TreeError::InvalidMove("the root cannot be moved".to_string()));
        }
        if dest == node {
            return Err(TreeError::InvalidMove(format!(
                "cannot move '{}' onto itself",
                self.get(node)?.name()
            )));
        }
        if self.parent(node)? == Some(dest) {
            return Ok(false);
        }
        if self.is_self_or_ancestor(node, dest)? {
            return Err(TreeError::InvalidMove(format!(
                "cannot move '{}' under its own descendant '{}'",
                self.get(node)?.name(),
                self.get(dest)?.name()
            )));
        }
        Ok(true)
    }

    /// Marks a node and all of its descendants dirty
    pub fn mark_subtree_dirty(&mut self, id: NodeId) -> Result<(), TreeError> {
        for node in self.descendants(id)? {
            self.get_mut(node)?.set_dirty(true);
        }
        Ok(())
    }

    /// Depth of a node below the root (root is 0)
    pub fn depth(&self, id: NodeId) -> Result<usize, TreeError> {
        Ok(self.ancestors(id)?.len())
    }
}
