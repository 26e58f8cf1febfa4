use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use crate::domain::comments::{AuthorSnapshot, CommentId, CommentNode, CommentPage};

pub fn ts(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, minute, 0).unwrap()
}

pub fn author() -> AuthorSnapshot {
    AuthorSnapshot {
        id: 7,
        name: "ink".to_string(),
        avatar_url: Some("https://example.com/ink.png".to_string()),
        role: Some("admin".to_string()),
        city: None,
    }
}

pub fn node(id: i64, parent: Option<i64>) -> CommentNode {
    CommentNode {
        id: CommentId(id),
        parent_id: parent.map(CommentId),
        author: author(),
        body: format!("comment {id}"),
        created_at: ts(0),
        updated_at: None,
        children: None,
    }
}

pub fn with_children(mut parent: CommentNode, children: Vec<CommentNode>) -> CommentNode {
    parent.children = Some(Arc::new(children));
    parent
}

pub fn ids(nodes: &[CommentNode]) -> Vec<i64> {
    nodes.iter().map(|node| node.id.0).collect()
}

pub fn page(nodes: Vec<CommentNode>, next_cursor: Option<&str>, has_next: bool) -> CommentPage {
    CommentPage {
        nodes,
        next_cursor: next_cursor.map(str::to_string),
        has_next,
    }
}

/// 1 -> [2 -> [3]], 4
pub fn sample_roots() -> Vec<CommentNode> {
    vec![
        with_children(
            node(1, None),
            vec![with_children(node(2, Some(1)), vec![node(3, Some(2))])],
        ),
        node(4, None),
    ]
}
