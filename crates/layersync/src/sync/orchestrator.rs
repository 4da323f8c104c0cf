//! Depth-first walk over the resource tree

use crate::cancel::CancellationFlag;
use crate::error::SyncError;
use crate::models::{ResourceGroup, ResourceNode, SyncResult};

/// Deepest group nesting a pass will descend into
pub const MAX_TREE_DEPTH: usize = 64;

/// Walks a [`ResourceGroup`] in pre-order, syncing every leaf
///
/// The walk is strictly sequential. Leaf failures are recorded and the walk
/// moves on; only cancellation or a malformed tree stops it early. A
/// cancelled walk is not resumable, the next pass starts from the root.
pub struct SyncOrchestrator {
    authority: String,
}

impl SyncOrchestrator {
    pub fn new(authority: impl Into<String>) -> Self {
        Self {
            authority: authority.into(),
        }
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Run one pass over `root`
    ///
    /// `cancel` is checked before every child, group or leaf. Everything
    /// recorded into `result` stays there when the pass is cut short.
    pub fn run(
        &self,
        root: &ResourceGroup,
        cancel: &CancellationFlag,
        result: &mut SyncResult,
    ) -> Result<(), SyncError> {
        self.walk(root, cancel, result, 1)
    }

    fn walk(
        &self,
        group: &ResourceGroup,
        cancel: &CancellationFlag,
        result: &mut SyncResult,
        depth: usize,
    ) -> Result<(), SyncError> {
        if depth > MAX_TREE_DEPTH {
            return Err(SyncError::MalformedTree(format!(
                "groups nested deeper than {}",
                MAX_TREE_DEPTH
            )));
        }

        for child in group.children() {
            if cancel.is_cancelled() {
                log::info!("Sync canceled, skipping remaining resources");
                return Ok(());
            }

            match child {
                ResourceNode::Group(nested) => self.walk(nested, cancel, result, depth + 1)?,
                ResourceNode::Leaf(resource) => {
                    match resource.endpoint() {
                        Some(url) => log::debug!("Syncing resource {} ({})", resource.id(), url),
                        None => log::debug!("Syncing resource {}", resource.id()),
                    }
                    result.record_visit();
                    if let Err(e) = resource.sync(&self.authority, cancel, result) {
                        log::warn!("Resource {} failed to sync: {:#}", resource.id(), e);
                        result.record_hard_error(resource.id(), format!("{:#}", e));
                    }
                }
            }
        }

        Ok(())
    }
}
