use crate::config::{TreeConfig, VersionPolicy};
use crate::error::{HubtreeError, Result};
use crate::node::{Node, StatusMap};
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

pub(crate) struct TreeShared {
    root: Node,
    version: AtomicU64,
    config: TreeConfig,
}

/// A rooted hierarchy of [`Node`]s with a shared version counter.
///
/// `Tree` is a handle: clones share the same nodes and counter and may be
/// used from any thread.
///
/// The version counter is an activity count. It only ever grows, but it is
/// advanced outside the node locks, so its increments carry no ordering
/// relative to the mutations they accompany.
#[derive(Clone)]
pub struct Tree {
    shared: Arc<TreeShared>,
}

impl Tree {
    /// Builds a tree around `root` with the default configuration.
    pub fn new(root: Node) -> Self {
        Self::with_root(root, TreeConfig::default())
    }

    /// Builds a tree with a fresh root named after `config.root_id`.
    pub fn with_config(config: TreeConfig) -> Self {
        let root = Node::new(config.root_id.clone());
        Self::with_root(root, config)
    }

    /// Builds a tree around `root`. Any existing subtree under `root` becomes
    /// part of the tree; if `root` was a child elsewhere it is moved out.
    pub fn with_root(root: Node, config: TreeConfig) -> Self {
        let shared = Arc::new(TreeShared {
            root: root.clone(),
            version: AtomicU64::new(0),
            config,
        });
        root.unlink();
        root.bind_tree(&Arc::downgrade(&shared));
        Self { shared }
    }

    pub(crate) fn from_shared(shared: Arc<TreeShared>) -> Self {
        Self { shared }
    }

    pub fn root(&self) -> &Node {
        &self.shared.root
    }

    pub fn config(&self) -> &TreeConfig {
        &self.shared.config
    }

    pub fn version(&self) -> u64 {
        self.shared.version.load(Ordering::Acquire)
    }

    /// Raises the counter to at least `version`, never lowering it.
    pub(crate) fn restore_version(&self, version: u64) {
        self.shared.version.fetch_max(version, Ordering::AcqRel);
    }

    fn bump(&self) {
        self.shared.version.fetch_add(1, Ordering::AcqRel);
    }

    /// Bumps for operations that only read.
    fn touch(&self) {
        if self.shared.config.version_policy == VersionPolicy::Activity {
            self.bump();
        }
    }

    /// Merges `values` into the status of the node at `path`, creating the
    /// node and any missing ancestors first.
    ///
    /// With `recursive` the merge also reaches every descendant of the
    /// target. With `bubble_up` it reaches every strict ancestor up to and
    /// including the root, non-recursively.
    pub fn set_node_status<S: AsRef<str>>(
        &self,
        values: &StatusMap,
        recursive: bool,
        bubble_up: bool,
        path: &[S],
    ) -> Node {
        let target = self.shared.root.ensure_path(path);
        target.set_status(values, recursive);

        if bubble_up {
            let mut cursor = target.parent();
            while let Some(ancestor) = cursor {
                ancestor.set_status(values, false);
                cursor = ancestor.parent();
            }
        }

        self.bump();
        tracing::trace!(
            depth = path.len(),
            recursive,
            bubble_up,
            "set node status"
        );
        target
    }

    /// Status snapshot of the node at `path`.
    pub fn node_status<S: AsRef<str>>(&self, path: &[S]) -> Result<StatusMap> {
        let node = self.shared.root.child_by_path(path)?;
        self.touch();
        Ok(node.status())
    }

    /// Creates a node named `id` beneath `path`, creating intermediate nodes
    /// as needed. A node already named `id` at that position is replaced.
    pub fn new_node<S: AsRef<str>>(&self, id: impl Into<String>, path: &[S]) -> Node {
        let node = self.shared.root.ensure_path(path).add_new_child(id);
        self.bump();
        node
    }

    pub fn node<S: AsRef<str>>(&self, path: &[S]) -> Result<Node> {
        let node = self.shared.root.child_by_path(path)?;
        self.touch();
        Ok(node)
    }

    /// Sets the value of the node at `path`.
    pub fn set_node_value<S: AsRef<str>>(
        &self,
        input: serde_json::Value,
        path: &[S],
    ) -> Result<()> {
        let node = self.shared.root.child_by_path(path)?;
        node.set_value(input)?;
        self.bump();
        Ok(())
    }

    /// Deletes the node at `path` and returns it, detached.
    ///
    /// Under [`VersionPolicy::Activity`] the counter advances even when
    /// nothing was removed.
    pub fn delete_node<S: AsRef<str>>(&self, path: &[S]) -> Result<Option<Node>> {
        let removed = self.shared.root.delete_path(path)?;
        match (&removed, self.shared.config.version_policy) {
            (Some(_), _) | (None, VersionPolicy::Activity) => self.bump(),
            (None, VersionPolicy::MutationsOnly) => {}
        }
        Ok(removed)
    }

    pub fn to_json(&self) -> Result<String> {
        self.shared.root.to_json()
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        self.shared.root.to_json_pretty()
    }

    /// Decodes a full tree from the JSON form of its root.
    pub fn from_json(bytes: &[u8], config: TreeConfig) -> Result<Self> {
        let root = Node::from_json(bytes)?;
        Ok(Self::with_root(root, config))
    }
}

impl Serialize for Tree {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.shared.root.serialize(serializer)
    }
}

impl fmt::Debug for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tree")
            .field("root", &self.shared.root.id())
            .field("version", &self.version())
            .field("config", &self.shared.config)
            .finish()
    }
}

impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.shared.root, f)
    }
}

impl From<Node> for Tree {
    fn from(root: Node) -> Self {
        Tree::new(root)
    }
}

impl TryFrom<&[u8]> for Tree {
    type Error = HubtreeError;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        Tree::from_json(bytes, TreeConfig::default())
    }
}
