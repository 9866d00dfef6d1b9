//! Tree vertices.
//!
//! A [`Node`] is a cheap, clonable handle to a shared vertex. Each vertex owns
//! its children through strong handles and points back at its parent and its
//! tree through weak references, so a dropped subtree is reclaimed without
//! cycles.
//!
//! Locking: every vertex has one `RwLock` guarding its value, status and
//! children, and a second, leaf-level lock guarding its back-references. State
//! locks are only ever nested parent before child. No other lock is taken
//! while a back-reference lock is held.
//!
//! Operations that move an existing vertex (attach, move, replace, delete)
//! additionally serialize on one process-wide structure lock, taken before
//! any vertex lock. Cycle checks and parent rewiring therefore never observe
//! a half-finished move.

use crate::error::{self, HubtreeError, Result};
use crate::tree::{Tree, TreeShared};
use crate::value::Value;
use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::ser::{CompactFormatter, Formatter, PrettyFormatter};
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak,
};

/// Free-form status annotations, e.g. `{"online": true}`.
pub type StatusMap = serde_json::Map<String, serde_json::Value>;

#[derive(Clone)]
pub struct Node {
    inner: Arc<NodeInner>,
}

struct NodeInner {
    id: String,
    state: RwLock<NodeState>,
    links: RwLock<Links>,
}

#[derive(Default)]
struct NodeState {
    value: Option<Value>,
    status: StatusMap,
    children: BTreeMap<String, Node>,
}

// Drops deep chains iteratively instead of recursing once per level.
impl Drop for NodeState {
    fn drop(&mut self) {
        let mut pending: Vec<Node> = std::mem::take(&mut self.children).into_values().collect();
        while let Some(node) = pending.pop() {
            if let Ok(inner) = Arc::try_unwrap(node.inner) {
                let mut state = inner.state.into_inner().unwrap_or_else(PoisonError::into_inner);
                pending.extend(std::mem::take(&mut state.children).into_values());
            }
        }
    }
}

#[derive(Default)]
struct Links {
    parent: Weak<NodeInner>,
    tree: Weak<TreeShared>,
}

static STRUCTURE: Mutex<()> = Mutex::new(());

fn structure() -> MutexGuard<'static, ()> {
    STRUCTURE.lock().unwrap_or_else(PoisonError::into_inner)
}

fn decode_error(e: serde_json::Error) -> HubtreeError {
    HubtreeError::Decode(e.to_string())
}

impl Node {
    /// Creates a detached node with no value, status or children.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(NodeInner {
                id: id.into(),
                state: RwLock::new(NodeState::default()),
                links: RwLock::new(Links::default()),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Whether two handles refer to the same vertex.
    pub fn ptr_eq(a: &Node, b: &Node) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    fn read(&self) -> RwLockReadGuard<'_, NodeState> {
        self.inner.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, NodeState> {
        self.inner.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn links(&self) -> RwLockReadGuard<'_, Links> {
        self.inner.links.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn links_mut(&self) -> RwLockWriteGuard<'_, Links> {
        self.inner.links.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn value(&self) -> Option<Value> {
        self.read().value.clone()
    }

    /// Constructs a [`Value`] from `input` and attaches it, replacing any
    /// previous value.
    pub fn set_value(&self, input: serde_json::Value) -> Result<()> {
        let value = Value::from_json(input)?;
        self.put_value(value)
    }

    /// Attaches an already constructed value. Values holding a non-finite
    /// float are rejected with [`HubtreeError::UnsupportedType`].
    pub fn put_value(&self, value: Value) -> Result<()> {
        value.validate()?;
        self.write().value = Some(value);
        Ok(())
    }

    pub fn clear_value(&self) -> Option<Value> {
        self.write().value.take()
    }

    pub fn parent(&self) -> Option<Node> {
        self.links()
            .parent
            .upgrade()
            .map(|inner| Node { inner })
    }

    pub fn tree(&self) -> Option<Tree> {
        self.links().tree.upgrade().map(Tree::from_shared)
    }

    /// Version counter of the owning tree.
    pub fn version(&self) -> Result<u64> {
        self.tree()
            .map(|tree| tree.version())
            .ok_or(HubtreeError::Detached)
    }

    fn tree_link(&self) -> Weak<TreeShared> {
        self.links().tree.clone()
    }

    /// Points this node and its whole subtree at `tree`.
    pub(crate) fn bind_tree(&self, tree: &Weak<TreeShared>) {
        let mut stack = vec![self.clone()];
        while let Some(node) = stack.pop() {
            node.links_mut().tree = tree.clone();
            stack.extend(node.read().children.values().cloned());
        }
    }

    /// Severs this node's parent and tree back-references, across its subtree.
    pub(crate) fn detach(&self) {
        self.links_mut().parent = Weak::new();
        self.bind_tree(&Weak::new());
    }

    /// Removes this node from its parent's children, if it is still listed
    /// there, and clears the parent link.
    pub(crate) fn unlink(&self) {
        let _structure = structure();
        self.unlink_locked();
    }

    fn unlink_locked(&self) {
        if let Some(parent) = self.parent() {
            let mut state = parent.write();
            if state
                .children
                .get(self.id())
                .is_some_and(|existing| Node::ptr_eq(existing, self))
            {
                state.children.remove(self.id());
            }
        }
        self.links_mut().parent = Weak::new();
    }

    /// Creates a child that is already linked to this node, for insertion
    /// while the caller holds this node's state lock.
    fn linked_child(&self, id: &str) -> Node {
        let child = Node::new(id);
        {
            let mut links = child.links_mut();
            links.parent = Arc::downgrade(&self.inner);
            links.tree = self.tree_link();
        }
        child
    }

    /// Inserts `child` under its id without any cycle or ownership checks.
    fn attach(&self, child: Node) -> Option<Node> {
        {
            let mut links = child.links_mut();
            links.parent = Arc::downgrade(&self.inner);
        }
        child.bind_tree(&self.tree_link());

        let replaced = self.write().children.insert(child.id().to_string(), child.clone());
        match replaced {
            Some(old) if !Node::ptr_eq(&old, &child) => {
                old.detach();
                Some(old)
            }
            _ => None,
        }
    }

    /// Attaches `child` under this node, replacing any sibling with the same
    /// id. The replaced node, if any, is detached and returned.
    ///
    /// A child that still belongs to another parent is moved. Attaching a
    /// node beneath itself fails with [`HubtreeError::Cycle`].
    pub fn add_child(&self, child: Node) -> Result<Option<Node>> {
        let _structure = structure();
        let mut cursor = Some(self.clone());
        while let Some(node) = cursor {
            if Node::ptr_eq(&node, &child) {
                return Err(HubtreeError::Cycle(child.id().to_string()));
            }
            cursor = node.parent();
        }

        if child.parent().is_some_and(|previous| !Node::ptr_eq(&previous, self)) {
            child.unlink_locked();
        }

        Ok(self.attach(child))
    }

    /// Creates and attaches a fresh child named `id`.
    pub fn add_new_child(&self, id: impl Into<String>) -> Node {
        let child = Node::new(id);
        let _structure = structure();
        self.attach(child.clone());
        child
    }

    pub fn child(&self, id: &str) -> Option<Node> {
        self.read().children.get(id).cloned()
    }

    pub fn children(&self) -> Vec<Node> {
        self.read().children.values().cloned().collect()
    }

    pub fn children_ids(&self) -> Vec<String> {
        self.read().children.keys().cloned().collect()
    }

    pub fn child_count(&self) -> usize {
        self.read().children.len()
    }

    /// Resolves `path` relative to this node. The empty path is the node
    /// itself.
    pub fn child_by_path<S: AsRef<str>>(&self, path: &[S]) -> Result<Node> {
        let mut current = self.clone();
        for segment in path {
            let next = current.child(segment.as_ref());
            current = next.ok_or_else(|| error::not_found(path))?;
        }
        tracing::trace!(node = %current.id(), depth = path.len(), "resolved path");
        Ok(current)
    }

    /// Resolves `path`, creating every missing node along the way.
    ///
    /// Each level is looked up and, if absent, inserted under a single write
    /// lock on its parent, so concurrent callers converge on the same nodes.
    pub fn ensure_path<S: AsRef<str>>(&self, path: &[S]) -> Node {
        let mut current = self.clone();
        for segment in path {
            let segment = segment.as_ref();
            let next = {
                let mut state = current.write();
                match state.children.get(segment) {
                    Some(existing) => existing.clone(),
                    None => {
                        let created = current.linked_child(segment);
                        state.children.insert(segment.to_string(), created.clone());
                        tracing::debug!(
                            parent = %current.id(),
                            id = %segment,
                            "created intermediate node"
                        );
                        created
                    }
                }
            };
            current = next;
        }
        current
    }

    /// Attaches `child` at `path`, creating intermediate nodes as needed and
    /// replacing any node already at the leaf position.
    pub fn set_child_by_path<S: AsRef<str>>(
        &self,
        child: Node,
        path: &[S],
    ) -> Result<Option<Node>> {
        self.ensure_path(path).add_child(child)
    }

    /// Removes the descendant addressed by `path` and returns it detached.
    ///
    /// Returns `Ok(None)` when nothing lives at `path`. The empty path cannot
    /// be deleted.
    pub fn delete_path<S: AsRef<str>>(&self, path: &[S]) -> Result<Option<Node>> {
        let Some((last, init)) = path.split_last() else {
            return Err(HubtreeError::InvalidPath(
                "cannot delete the node a path is resolved against".to_string(),
            ));
        };

        let _structure = structure();
        let parent = match self.child_by_path(init) {
            Ok(parent) => parent,
            Err(HubtreeError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        let removed = parent.write().children.remove(last.as_ref());
        if let Some(node) = &removed {
            node.detach();
            tracing::debug!(parent = %parent.id(), id = %node.id(), "deleted node");
        }
        Ok(removed)
    }

    /// Merges `values` into the status map key by key. With `recursive`, the
    /// same merge is applied once to every descendant.
    pub fn set_status(&self, values: &StatusMap, recursive: bool) {
        if values.is_empty() {
            return;
        }

        let mut pending = vec![self.clone()];
        while let Some(node) = pending.pop() {
            let mut state = node.write();
            for (key, value) in values {
                state.status.insert(key.clone(), value.clone());
            }
            if recursive {
                pending.extend(state.children.values().cloned());
            }
            tracing::trace!(node = %node.id(), keys = values.len(), "merged status");
        }
    }

    /// Point-in-time copy of the status map.
    ///
    /// The copy is deep: nested JSON is cloned, so it never aliases the live
    /// tree.
    pub fn status(&self) -> StatusMap {
        self.read().status.clone()
    }

    /// Canonical compact JSON for this node and its subtree.
    ///
    /// Subtrees of any depth are encoded; the stack grows on demand.
    pub fn to_json(&self) -> Result<String> {
        self.encode_with(CompactFormatter)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        self.encode_with(PrettyFormatter::new())
    }

    fn encode_with<F: Formatter>(&self, formatter: F) -> Result<String> {
        let mut out = Vec::new();
        let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
        self.serialize(serde_stacker::Serializer::new(&mut ser))?;
        String::from_utf8(out).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e).into())
    }

    /// Decodes a detached node and its subtree. Attach it to a tree with
    /// [`Node::add_child`] or [`Tree::new`] before use.
    ///
    /// Nesting depth is unbounded. A `"value": null` entry is rejected rather
    /// than read as an absent value.
    pub fn from_json(bytes: &[u8]) -> Result<Node> {
        let mut de = serde_json::Deserializer::from_slice(bytes);
        de.disable_recursion_limit();
        let node = Node::deserialize(serde_stacker::Deserializer::new(&mut de))
            .map_err(decode_error)?;
        de.end().map_err(decode_error)?;
        Ok(node)
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let state = self.read();
        let len = if state.value.is_some() { 4 } else { 3 };
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry("id", self.id())?;
        if let Some(value) = &state.value {
            map.serialize_entry("value", value)?;
        }
        map.serialize_entry("status", &state.status)?;
        map.serialize_entry("children", &state.children)?;
        map.end()
    }
}

#[derive(Deserialize)]
struct NodeRepr {
    id: String,
    #[serde(default, deserialize_with = "present_value")]
    value: Option<Value>,
    #[serde(default)]
    status: StatusMap,
    #[serde(default)]
    children: BTreeMap<String, Node>,
}

fn present_value<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let repr = NodeRepr::deserialize(deserializer)?;
        let node = Node::new(repr.id);
        {
            let mut state = node.write();
            state.value = repr.value;
            state.status = repr.status;
        }
        for (key, child) in repr.children {
            if key != child.id() {
                return Err(D::Error::custom(format!(
                    "child key '{}' does not match child id '{}'",
                    key,
                    child.id()
                )));
            }
            node.attach(child);
        }
        Ok(node)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.read();
        f.debug_struct("Node")
            .field("id", &self.id())
            .field("value", &state.value)
            .field("status", &state.status)
            .field("children", &state.children.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let out = self.to_json_pretty().map_err(|_| fmt::Error)?;
        f.write_str(&out)
    }
}
