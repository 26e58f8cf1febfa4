use std::fmt;

use crate::domain::comments::CommentId;

/// Chain of ids from a top-level comment down to (and including) a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodePath {
    ancestors: Vec<CommentId>,
    id: CommentId,
}

impl NodePath {
    pub fn new(ancestors: Vec<CommentId>, id: CommentId) -> Self {
        Self { ancestors, id }
    }

    pub fn root(id: CommentId) -> Self {
        Self::new(Vec::new(), id)
    }

    pub fn id(&self) -> CommentId {
        self.id
    }

    pub fn ancestors(&self) -> &[CommentId] {
        &self.ancestors
    }

    pub fn depth(&self) -> usize {
        self.ancestors.len()
    }

    pub fn parent(&self) -> Option<NodePath> {
        let mut ancestors = self.ancestors.clone();
        let id = ancestors.pop()?;
        Some(NodePath { ancestors, id })
    }

    pub fn child(&self, id: CommentId) -> NodePath {
        let mut ancestors = self.ancestors.clone();
        ancestors.push(self.id);
        NodePath { ancestors, id }
    }

    /// Ancestors plus the node itself, root first.
    pub fn ids(&self) -> impl Iterator<Item = CommentId> + '_ {
        self.ancestors.iter().copied().chain(std::iter::once(self.id))
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for id in self.ids() {
            if !first {
                f.write_str("/")?;
            }
            write!(f, "{id}")?;
            first = false;
        }
        Ok(())
    }
}
