//! Resource tree walked by a sync pass
//!
//! The tree is read-only while a pass is in flight. Mutating it mid-pass
//! (e.g. through interior mutability in a resource) is the caller's
//! responsibility; the orchestrator does not guard against it.

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use url::Url;

use crate::cancel::CancellationFlag;
use crate::models::SyncResult;

/// A leaf unit of remote synchronization work
///
/// Implementations must be safe to call repeatedly, should poll `cancel`
/// during long-running I/O, and must only add to `result`.
pub trait SyncableResource: Send + Sync {
    /// Stable identifier of the resource
    fn id(&self) -> &str;

    /// Remote endpoint backing this resource, if any
    fn endpoint(&self) -> Option<&Url> {
        None
    }

    /// Synchronize this resource with its remote
    ///
    /// Returning `Err` is recorded as a hard failure for this resource; the
    /// pass then continues with the next sibling.
    fn sync(&self, authority: &str, cancel: &CancellationFlag, result: &mut SyncResult)
    -> Result<()>;
}

/// A child of a [`ResourceGroup`]
#[derive(Clone)]
pub enum ResourceNode {
    Group(ResourceGroup),
    Leaf(Arc<dyn SyncableResource>),
}

impl fmt::Debug for ResourceNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceNode::Group(group) => f.debug_tuple("Group").field(group).finish(),
            ResourceNode::Leaf(leaf) => f.debug_tuple("Leaf").field(&leaf.id()).finish(),
        }
    }
}

impl From<ResourceGroup> for ResourceNode {
    fn from(group: ResourceGroup) -> Self {
        ResourceNode::Group(group)
    }
}

impl From<Arc<dyn SyncableResource>> for ResourceNode {
    fn from(leaf: Arc<dyn SyncableResource>) -> Self {
        ResourceNode::Leaf(leaf)
    }
}

/// Ordered container of resources and nested groups
#[derive(Debug, Clone, Default)]
pub struct ResourceGroup {
    children: Vec<ResourceNode>,
}

impl ResourceGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a nested group
    pub fn with_group(mut self, group: ResourceGroup) -> Self {
        self.children.push(ResourceNode::Group(group));
        self
    }

    /// Append a leaf resource
    pub fn with_leaf(mut self, leaf: Arc<dyn SyncableResource>) -> Self {
        self.children.push(ResourceNode::Leaf(leaf));
        self
    }

    pub fn push(&mut self, node: impl Into<ResourceNode>) {
        self.children.push(node.into());
    }

    pub fn children(&self) -> &[ResourceNode] {
        &self.children
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of leaves in the whole subtree
    pub fn leaf_count(&self) -> usize {
        self.children
            .iter()
            .map(|child| match child {
                ResourceNode::Group(group) => group.leaf_count(),
                ResourceNode::Leaf(_) => 1,
            })
            .sum()
    }

    /// Leaf ids in pre-order
    pub fn leaf_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        self.collect_leaf_ids(&mut ids);
        ids
    }

    fn collect_leaf_ids(&self, ids: &mut Vec<String>) {
        for child in &self.children {
            match child {
                ResourceNode::Group(group) => group.collect_leaf_ids(ids),
                ResourceNode::Leaf(leaf) => ids.push(leaf.id().to_string()),
            }
        }
    }

    /// Depth of the deepest nested group (a flat group has depth 1)
    pub fn depth(&self) -> usize {
        1 + self
            .children
            .iter()
            .filter_map(|child| match child {
                ResourceNode::Group(group) => Some(group.depth()),
                ResourceNode::Leaf(_) => None,
            })
            .max()
            .unwrap_or(0)
    }
}
