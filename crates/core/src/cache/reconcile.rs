use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::sync::Arc;

use tracing::debug;

use crate::cache::{CommentCache, InFlight, PageRequest};
use crate::domain::comments::{CommentId, CommentNode, CommentPage};
use crate::error::{CacheError, Operation};
use crate::tree::Forest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    /// The page became the new top-level slice and paging restarted.
    Replaced { top_level: usize },
    /// Optimistic comments were waiting, so the page was merged by id.
    Merged { top_level: usize },
}

impl CommentCache {
    pub fn begin_refresh(&self) -> PageRequest {
        self.cursor.first_page(self.page_size)
    }

    pub fn settle_refresh<E: Display>(
        &mut self,
        _request: PageRequest,
        outcome: Result<CommentPage, E>,
    ) -> Result<Refresh, CacheError> {
        let mut page = outcome.map_err(|err| CacheError::remote(Operation::FetchPage, err))?;
        let nodes = self.apply_pending(std::mem::take(&mut page.nodes));

        if self.pending_creates() == 0 {
            let (forest, _) = Forest::new().append_top_many(nodes);
            self.forest = forest;
            self.cursor.reset_to(&page);
            debug!(top_level = self.forest.len(), "thread replaced from first page");
            return Ok(Refresh::Replaced {
                top_level: self.forest.len(),
            });
        }

        let merged = merge_by_id(self.forest.roots(), nodes, true);
        let (forest, _) = Forest::new().append_top_many(merged);
        self.forest = forest;
        debug!(
            top_level = self.forest.len(),
            pending = self.pending_creates(),
            "first page merged around pending comments"
        );
        Ok(Refresh::Merged {
            top_level: self.forest.len(),
        })
    }

    /// Re-applies optimistic state to server nodes: pending deletes stay
    /// hidden and pending edits keep their local body.
    pub(crate) fn apply_pending(&self, nodes: Vec<CommentNode>) -> Vec<CommentNode> {
        if self.in_flight.is_empty() {
            return nodes;
        }
        nodes
            .into_iter()
            .filter_map(|node| self.apply_pending_node(node))
            .collect()
    }

    fn apply_pending_node(&self, mut node: CommentNode) -> Option<CommentNode> {
        match self.in_flight.get(&node.id) {
            Some(InFlight::Delete { .. }) => return None,
            Some(InFlight::Edit { body, updated_at }) => {
                node.body = body.clone();
                node.updated_at = Some(*updated_at);
            }
            Some(InFlight::Create) | None => {}
        }
        if let Some(children) = node.children.take() {
            node.children = Some(Arc::new(self.apply_pending(Arc::unwrap_or_clone(children))));
        }
        Some(node)
    }
}

/// Merges server nodes into a local sibling list. Synthetic local nodes stay
/// in front, server nodes follow in server order and win over local nodes
/// with the same id. Local nodes the server did not return are kept only when
/// `keep_unmatched` is set (top level, where they belong to later pages).
fn merge_by_id(
    local: &[CommentNode],
    authoritative: Vec<CommentNode>,
    keep_unmatched: bool,
) -> Vec<CommentNode> {
    let by_id: HashMap<CommentId, &CommentNode> =
        local.iter().map(|node| (node.id, node)).collect();
    let returned: HashSet<CommentId> = authoritative.iter().map(|node| node.id).collect();

    let mut merged = Vec::with_capacity(local.len() + authoritative.len());
    merged.extend(local.iter().filter(|node| node.is_synthetic()).cloned());
    for node in authoritative {
        match by_id.get(&node.id) {
            Some(local_node) => merged.push(merge_node(local_node, node)),
            None => merged.push(node),
        }
    }
    if keep_unmatched {
        merged.extend(
            local
                .iter()
                .filter(|node| !node.is_synthetic() && !returned.contains(&node.id))
                .cloned(),
        );
    }
    merged
}

fn merge_node(local: &CommentNode, mut authoritative: CommentNode) -> CommentNode {
    if !local.children().iter().any(holds_synthetic) {
        return authoritative;
    }
    let children = authoritative
        .children
        .take()
        .map(Arc::unwrap_or_clone)
        .unwrap_or_default();
    authoritative.children = Some(Arc::new(merge_by_id(local.children(), children, false)));
    authoritative
}

fn holds_synthetic(node: &CommentNode) -> bool {
    node.is_synthetic() || node.children().iter().any(holds_synthetic)
}
