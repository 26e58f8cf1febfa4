use std::collections::HashSet;
use std::sync::Arc;

use tracing::warn;

use crate::domain::comments::{CommentId, CommentNode, MAX_DEPTH};
use crate::error::TreeError;
use crate::tree::NodePath;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Position {
    #[default]
    Front,
    /// Clamped to the sibling count.
    Index(usize),
}

impl Position {
    fn resolve(self, len: usize) -> usize {
        match self {
            Position::Front => 0,
            Position::Index(index) => index.min(len),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removed {
    pub node: CommentNode,
    pub index: usize,
}

/// Ordered comment forest. Every operation derives a new forest; subtrees
/// that are not on the edited path stay shared with the old one, and the old
/// one never observes the edit.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Forest {
    roots: Arc<Vec<CommentNode>>,
}

impl Forest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_roots(nodes: Vec<CommentNode>) -> Self {
        let roots = nodes
            .into_iter()
            .map(|mut node| {
                node.parent_id = None;
                cap_depth(node, 0)
            })
            .collect();
        Self {
            roots: Arc::new(roots),
        }
    }

    pub fn roots(&self) -> &[CommentNode] {
        &self.roots
    }

    /// Number of top-level comments.
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Number of comments at every depth.
    pub fn total(&self) -> usize {
        self.roots.iter().map(CommentNode::subtree_len).sum()
    }

    pub fn ids(&self) -> HashSet<CommentId> {
        let mut ids = HashSet::new();
        collect_ids(&self.roots, &mut ids);
        ids
    }

    pub fn contains(&self, id: CommentId) -> bool {
        self.find_path(id).is_some()
    }

    pub fn find_path(&self, id: CommentId) -> Option<NodePath> {
        find_in(&self.roots, id, &mut Vec::new())
    }

    pub fn find(&self, id: CommentId) -> Option<&CommentNode> {
        let path = self.find_path(id)?;
        self.get(&path)
    }

    pub fn get(&self, path: &NodePath) -> Option<&CommentNode> {
        let mut siblings: &[CommentNode] = &self.roots;
        for ancestor in path.ancestors() {
            let node = siblings.iter().find(|node| node.id == *ancestor)?;
            siblings = node.children();
        }
        siblings.iter().find(|node| node.id == path.id())
    }

    pub fn replace_at(&self, path: &NodePath, node: CommentNode) -> Result<Forest, TreeError> {
        let mut roots = Arc::clone(&self.roots);
        let siblings = siblings_mut(&mut roots, path.ancestors(), false)?;
        let slot = siblings
            .iter_mut()
            .find(|existing| existing.id == path.id())
            .ok_or(TreeError::NotFound(path.id()))?;
        let mut node = cap_depth(node, path.depth());
        node.parent_id = path.ancestors().last().copied();
        *slot = node;
        Ok(Forest { roots })
    }

    pub fn remove_at(&self, path: &NodePath) -> Result<(Forest, Removed), TreeError> {
        let mut roots = Arc::clone(&self.roots);
        let siblings = siblings_mut(&mut roots, path.ancestors(), false)?;
        let index = siblings
            .iter()
            .position(|existing| existing.id == path.id())
            .ok_or(TreeError::NotFound(path.id()))?;
        let node = siblings.remove(index);
        Ok((Forest { roots }, Removed { node, index }))
    }

    pub fn insert_child(
        &self,
        parent: &NodePath,
        node: CommentNode,
        position: Position,
    ) -> Result<Forest, TreeError> {
        if parent.depth() >= MAX_DEPTH {
            return Err(TreeError::DepthExceeded(parent.id()));
        }
        let mut roots = Arc::clone(&self.roots);
        let chain: Vec<CommentId> = parent.ids().collect();
        let siblings = siblings_mut(&mut roots, &chain, true)?;
        let mut node = cap_depth(node, parent.depth() + 1);
        node.parent_id = Some(parent.id());
        let index = position.resolve(siblings.len());
        siblings.insert(index, node);
        Ok(Forest { roots })
    }

    pub fn insert_top(&self, mut node: CommentNode, position: Position) -> Forest {
        let mut roots = Arc::clone(&self.roots);
        let siblings = Arc::make_mut(&mut roots);
        node.parent_id = None;
        let index = position.resolve(siblings.len());
        siblings.insert(index, cap_depth(node, 0));
        Forest { roots }
    }

    pub fn prepend_top(&self, node: CommentNode) -> Forest {
        self.insert_top(node, Position::Front)
    }

    /// Appends top-level nodes after the existing ones, skipping any id that
    /// is already present anywhere in the forest. Returns the number appended.
    pub fn append_top_many<I>(&self, nodes: I) -> (Forest, usize)
    where
        I: IntoIterator<Item = CommentNode>,
    {
        let mut seen = self.ids();
        let mut roots = Arc::clone(&self.roots);
        let mut appended = 0;
        for node in nodes {
            let Some(mut node) = dedup_subtree(node, &mut seen) else {
                continue;
            };
            node.parent_id = None;
            Arc::make_mut(&mut roots).push(cap_depth(node, 0));
            appended += 1;
        }
        (Forest { roots }, appended)
    }
}

fn collect_ids(nodes: &[CommentNode], ids: &mut HashSet<CommentId>) {
    for node in nodes {
        ids.insert(node.id);
        collect_ids(node.children(), ids);
    }
}

fn find_in(
    nodes: &[CommentNode],
    id: CommentId,
    ancestors: &mut Vec<CommentId>,
) -> Option<NodePath> {
    for node in nodes {
        if node.id == id {
            return Some(NodePath::new(ancestors.clone(), id));
        }
        ancestors.push(node.id);
        if let Some(path) = find_in(node.children(), id, ancestors) {
            return Some(path);
        }
        ancestors.pop();
    }
    None
}

/// Walks `chain` from the roots and returns the sibling list below its last
/// id, copying every list on the way so shared forests stay untouched.
fn siblings_mut<'a>(
    roots: &'a mut Arc<Vec<CommentNode>>,
    chain: &[CommentId],
    init_missing: bool,
) -> Result<&'a mut Vec<CommentNode>, TreeError> {
    let mut current = Arc::make_mut(roots);
    for ancestor in chain {
        let siblings = current;
        let node = siblings
            .iter_mut()
            .find(|node| node.id == *ancestor)
            .ok_or(TreeError::NotFound(*ancestor))?;
        if node.children.is_none() && !init_missing {
            return Err(TreeError::NotFound(*ancestor));
        }
        let children = node.children.get_or_insert_with(Default::default);
        current = Arc::make_mut(children);
    }
    Ok(current)
}

/// Drops the node if its id was already seen, and prunes already-seen
/// descendants otherwise.
pub(crate) fn dedup_subtree(
    mut node: CommentNode,
    seen: &mut HashSet<CommentId>,
) -> Option<CommentNode> {
    if !seen.insert(node.id) {
        return None;
    }
    if let Some(children) = node.children.take() {
        let kept: Vec<CommentNode> = children
            .iter()
            .cloned()
            .filter_map(|child| dedup_subtree(child, seen))
            .collect();
        node.children = Some(Arc::new(kept));
    }
    Some(node)
}

fn exceeds_depth(node: &CommentNode, depth: usize) -> bool {
    if depth >= MAX_DEPTH {
        return node.children.is_some();
    }
    node.children()
        .iter()
        .any(|child| exceeds_depth(child, depth + 1))
}

fn cap_depth(mut node: CommentNode, depth: usize) -> CommentNode {
    if !exceeds_depth(&node, depth) {
        return node;
    }
    if depth >= MAX_DEPTH {
        let dropped = node.children.take().map_or(0, |children| {
            children.iter().map(CommentNode::subtree_len).sum::<usize>()
        });
        if dropped > 0 {
            warn!(comment_id = %node.id, dropped, "replies below maximum depth dropped");
        }
        return node;
    }
    if let Some(children) = node.children.as_mut() {
        let capped: Vec<CommentNode> = children
            .iter()
            .cloned()
            .map(|child| cap_depth(child, depth + 1))
            .collect();
        *children = Arc::new(capped);
    }
    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ids, node, sample_roots, with_children};

    #[test]
    fn find_path_reaches_every_depth() {
        let forest = Forest::from_roots(sample_roots());
        let path = forest.find_path(CommentId(3)).unwrap();
        assert_eq!(path.ancestors(), &[CommentId(1), CommentId(2)]);
        assert_eq!(path.depth(), 2);
        assert_eq!(forest.find_path(CommentId(4)).unwrap().depth(), 0);
        assert!(forest.find_path(CommentId(99)).is_none());
        assert_eq!(forest.total(), 4);
    }

    #[test]
    fn replace_at_keeps_position_and_leaves_old_forest_alone() {
        let forest = Forest::from_roots(vec![node(1, None), node(2, None), node(3, None)]);
        let path = forest.find_path(CommentId(2)).unwrap();
        let updated = forest.replace_at(&path, node(20, None)).unwrap();
        assert_eq!(ids(updated.roots()), vec![1, 20, 3]);
        assert_eq!(ids(forest.roots()), vec![1, 2, 3]);
    }

    #[test]
    fn replace_at_missing_node_is_not_found() {
        let forest = Forest::from_roots(sample_roots());
        let stale = NodePath::root(CommentId(1)).child(CommentId(42));
        assert_eq!(
            forest.replace_at(&stale, node(42, Some(1))),
            Err(TreeError::NotFound(CommentId(42)))
        );
    }

    #[test]
    fn remove_at_reports_sibling_index() {
        let forest = Forest::from_roots(vec![with_children(
            node(1, None),
            vec![node(2, Some(1)), node(3, Some(1)), node(4, Some(1))],
        )]);
        let path = forest.find_path(CommentId(3)).unwrap();
        let (updated, removed) = forest.remove_at(&path).unwrap();
        assert_eq!(removed.index, 1);
        assert_eq!(removed.node.id, CommentId(3));
        assert_eq!(ids(updated.roots()[0].children()), vec![2, 4]);
        assert_eq!(ids(forest.roots()[0].children()), vec![2, 3, 4]);
    }

    #[test]
    fn remove_top_level_node() {
        let forest = Forest::from_roots(sample_roots());
        let (updated, removed) = forest.remove_at(&NodePath::root(CommentId(1))).unwrap();
        assert_eq!(removed.index, 0);
        assert_eq!(removed.node.subtree_len(), 3);
        assert_eq!(ids(updated.roots()), vec![4]);
        assert!(!updated.contains(CommentId(3)));
    }

    #[test]
    fn insert_child_initializes_children_and_prepends() {
        let forest = Forest::from_roots(vec![node(1, None)]);
        let parent = NodePath::root(CommentId(1));
        let forest = forest
            .insert_child(&parent, node(10, None), Position::Front)
            .unwrap();
        let forest = forest
            .insert_child(&parent, node(11, None), Position::Front)
            .unwrap();
        let children = forest.roots()[0].children();
        assert_eq!(ids(children), vec![11, 10]);
        assert_eq!(children[0].parent_id, Some(CommentId(1)));
    }

    #[test]
    fn insert_child_at_index_is_clamped() {
        let forest = Forest::from_roots(vec![with_children(
            node(1, None),
            vec![node(2, Some(1)), node(3, Some(1))],
        )]);
        let parent = NodePath::root(CommentId(1));
        let middle = forest
            .insert_child(&parent, node(9, Some(1)), Position::Index(1))
            .unwrap();
        assert_eq!(ids(middle.roots()[0].children()), vec![2, 9, 3]);
        let end = forest
            .insert_child(&parent, node(9, Some(1)), Position::Index(40))
            .unwrap();
        assert_eq!(ids(end.roots()[0].children()), vec![2, 3, 9]);
    }

    #[test]
    fn insert_child_below_max_depth_is_rejected() {
        let forest = Forest::from_roots(sample_roots());
        let deepest = forest.find_path(CommentId(3)).unwrap();
        assert_eq!(
            forest.insert_child(&deepest, node(5, Some(3)), Position::Front),
            Err(TreeError::DepthExceeded(CommentId(3)))
        );
    }

    #[test]
    fn from_roots_truncates_below_max_depth() {
        let too_deep = with_children(
            node(1, None),
            vec![with_children(
                node(2, Some(1)),
                vec![with_children(node(3, Some(2)), vec![node(4, Some(3))])],
            )],
        );
        let forest = Forest::from_roots(vec![too_deep]);
        assert!(forest.find(CommentId(3)).unwrap().children.is_none());
        assert!(!forest.contains(CommentId(4)));
    }

    #[test]
    fn append_top_many_skips_known_ids() {
        let forest = Forest::from_roots(sample_roots());
        let batch = vec![node(4, None), node(5, None), node(3, None), node(5, None)];
        let (updated, appended) = forest.append_top_many(batch);
        assert_eq!(appended, 1);
        assert_eq!(ids(updated.roots()), vec![1, 4, 5]);
        assert_eq!(updated.total(), 5);
    }

    #[test]
    fn append_top_many_prunes_known_descendants() {
        let forest = Forest::from_roots(sample_roots());
        let incoming = with_children(node(6, None), vec![node(2, Some(6)), node(7, Some(6))]);
        let (updated, appended) = forest.append_top_many(vec![incoming]);
        assert_eq!(appended, 1);
        assert_eq!(ids(updated.find(CommentId(6)).unwrap().children()), vec![7]);
    }
}
