use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Deepest level a comment may sit at; nodes here never hold children.
pub const MAX_DEPTH: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommentId(pub i64);

impl CommentId {
    /// Optimistic nodes carry negative ids until the server confirms them.
    pub fn is_synthetic(self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The post or project a thread hangs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(pub i64);

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorSnapshot {
    pub id: i64,
    pub name: String,
    pub avatar_url: Option<String>,
    pub role: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentNode {
    pub id: CommentId,
    pub parent_id: Option<CommentId>,
    pub author: AuthorSnapshot,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Arc<Vec<CommentNode>>>,
}

impl CommentNode {
    pub fn children(&self) -> &[CommentNode] {
        match &self.children {
            Some(children) => children.as_slice(),
            None => &[],
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.id.is_synthetic()
    }

    /// Node plus every descendant.
    pub fn subtree_len(&self) -> usize {
        1 + self
            .children()
            .iter()
            .map(CommentNode::subtree_len)
            .sum::<usize>()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommentPage {
    pub nodes: Vec<CommentNode>,
    pub next_cursor: Option<String>,
    pub has_next: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewComment {
    pub target: TargetId,
    pub parent_id: Option<CommentId>,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedComment {
    pub id: CommentId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateComment {
    pub id: CommentId,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditedComment {
    pub updated_at: DateTime<Utc>,
}
