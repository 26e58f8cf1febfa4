use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use inkthread_core::api::CommentApi;
use inkthread_core::domain::comments::{
    AuthorSnapshot, CommentId, CommentNode, CommentPage, CreatedComment, EditedComment, MAX_DEPTH,
    NewComment, TargetId, UpdateComment,
};
use inkthread_core::error::{Operation, ValidationError};
use inkthread_core::types::comment_body::CommentBody;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryApiError {
    #[error("injected failure for {0}")]
    Injected(Operation),
    #[error("comment {0} not found")]
    NotFound(CommentId),
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),
    #[error("invalid comment: {0}")]
    Invalid(#[from] ValidationError),
}

#[derive(Debug, Clone)]
struct StoredComment {
    target: TargetId,
    parent_id: Option<CommentId>,
    author: AuthorSnapshot,
    body: String,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct MemoryState {
    next_id: i64,
    comments: BTreeMap<CommentId, StoredComment>,
    fail_next: HashSet<Operation>,
}

/// In-process comment service. Ids are handed out in ascending order and
/// every sibling list is served newest first; cursors are plain offsets into
/// the top-level list.
#[derive(Debug)]
pub struct MemoryCommentApi {
    author: AuthorSnapshot,
    state: Mutex<MemoryState>,
}

impl MemoryCommentApi {
    /// `author` is the session user new comments are attributed to.
    pub fn new(author: AuthorSnapshot) -> Self {
        Self {
            author,
            state: Mutex::new(MemoryState {
                next_id: 1,
                comments: BTreeMap::new(),
                fail_next: HashSet::new(),
            }),
        }
    }

    /// Stores a comment directly, bypassing failure injection.
    pub async fn seed(
        &self,
        target: TargetId,
        parent_id: Option<CommentId>,
        author: &AuthorSnapshot,
        body: &str,
    ) -> Result<CommentId, MemoryApiError> {
        let mut state = self.state.lock().await;
        let (id, _) = state.insert(target, parent_id, author.clone(), body)?;
        Ok(id)
    }

    /// Makes the next call of `operation` fail once.
    pub async fn fail_next(&self, operation: Operation) {
        self.state.lock().await.fail_next.insert(operation);
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.comments.len()
    }

    pub async fn contains(&self, id: CommentId) -> bool {
        self.state.lock().await.comments.contains_key(&id)
    }

    pub async fn body_of(&self, id: CommentId) -> Option<String> {
        let state = self.state.lock().await;
        state.comments.get(&id).map(|comment| comment.body.clone())
    }
}

impl MemoryState {
    fn take_failure(&mut self, operation: Operation) -> Result<(), MemoryApiError> {
        if self.fail_next.remove(&operation) {
            debug!(%operation, "injected failure");
            return Err(MemoryApiError::Injected(operation));
        }
        Ok(())
    }

    fn depth_of(&self, id: CommentId) -> Option<usize> {
        let mut depth = 0;
        let mut current = self.comments.get(&id)?;
        while let Some(parent) = current.parent_id {
            current = self.comments.get(&parent)?;
            depth += 1;
        }
        Some(depth)
    }

    fn insert(
        &mut self,
        target: TargetId,
        parent_id: Option<CommentId>,
        author: AuthorSnapshot,
        body: &str,
    ) -> Result<(CommentId, DateTime<Utc>), MemoryApiError> {
        let body = CommentBody::try_from(body)?;
        if let Some(parent) = parent_id {
            self.comments
                .get(&parent)
                .filter(|comment| comment.target == target)
                .ok_or(MemoryApiError::NotFound(parent))?;
            if self.depth_of(parent).unwrap_or(0) >= MAX_DEPTH {
                return Err(ValidationError::ReplyTooDeep(parent).into());
            }
        }
        let id = CommentId(self.next_id);
        self.next_id += 1;
        let created_at = Utc::now();
        self.comments.insert(
            id,
            StoredComment {
                target,
                parent_id,
                author,
                body: body.into_inner(),
                created_at,
                updated_at: None,
            },
        );
        Ok((id, created_at))
    }

    /// Newest first, which is descending id order.
    fn children_of(&self, target: TargetId, parent: Option<CommentId>) -> Vec<CommentId> {
        self.comments
            .iter()
            .rev()
            .filter(|(_, comment)| comment.target == target && comment.parent_id == parent)
            .map(|(id, _)| *id)
            .collect()
    }

    fn build(&self, target: TargetId, id: CommentId) -> Option<CommentNode> {
        let stored = self.comments.get(&id)?;
        let replies: Vec<CommentNode> = self
            .children_of(target, Some(id))
            .into_iter()
            .filter_map(|child| self.build(target, child))
            .collect();
        Some(CommentNode {
            id,
            parent_id: stored.parent_id,
            author: stored.author.clone(),
            body: stored.body.clone(),
            created_at: stored.created_at,
            updated_at: stored.updated_at,
            children: (!replies.is_empty()).then(|| Arc::new(replies)),
        })
    }

    fn remove_subtree(&mut self, id: CommentId) -> usize {
        let children: Vec<CommentId> = self
            .comments
            .iter()
            .filter(|(_, comment)| comment.parent_id == Some(id))
            .map(|(child, _)| *child)
            .collect();
        let mut removed = usize::from(self.comments.remove(&id).is_some());
        for child in children {
            removed += self.remove_subtree(child);
        }
        removed
    }
}

impl CommentApi for MemoryCommentApi {
    type Error = MemoryApiError;

    async fn fetch_page(
        &self,
        target: TargetId,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<CommentPage, MemoryApiError> {
        let mut state = self.state.lock().await;
        state.take_failure(Operation::FetchPage)?;
        let offset = match cursor {
            Some(cursor) => cursor
                .parse::<usize>()
                .map_err(|_| MemoryApiError::InvalidCursor(cursor.to_string()))?,
            None => 0,
        };
        let top_level = state.children_of(target, None);
        let end = offset.saturating_add(limit).min(top_level.len());
        let nodes: Vec<CommentNode> = top_level[offset.min(end)..end]
            .iter()
            .filter_map(|id| state.build(target, *id))
            .collect();
        let has_next = end < top_level.len();
        Ok(CommentPage {
            nodes,
            next_cursor: has_next.then(|| end.to_string()),
            has_next,
        })
    }

    async fn create_comment(&self, comment: &NewComment) -> Result<CreatedComment, MemoryApiError> {
        let mut state = self.state.lock().await;
        state.take_failure(Operation::Create)?;
        let (id, created_at) = state.insert(
            comment.target,
            comment.parent_id,
            self.author.clone(),
            &comment.body,
        )?;
        Ok(CreatedComment { id, created_at })
    }

    async fn update_comment(
        &self,
        update: &UpdateComment,
    ) -> Result<EditedComment, MemoryApiError> {
        let mut state = self.state.lock().await;
        state.take_failure(Operation::Update)?;
        let body = CommentBody::try_from(update.body.as_str())?;
        let stored = state
            .comments
            .get_mut(&update.id)
            .ok_or(MemoryApiError::NotFound(update.id))?;
        let updated_at = Utc::now();
        stored.body = body.into_inner();
        stored.updated_at = Some(updated_at);
        Ok(EditedComment { updated_at })
    }

    async fn delete_comment(&self, id: CommentId) -> Result<(), MemoryApiError> {
        let mut state = self.state.lock().await;
        state.take_failure(Operation::Delete)?;
        match state.remove_subtree(id) {
            0 => Err(MemoryApiError::NotFound(id)),
            removed => {
                debug!(comment_id = %id, removed, "deleted comment subtree");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGET: TargetId = TargetId(1);

    fn author() -> AuthorSnapshot {
        AuthorSnapshot {
            id: 1,
            name: "reader".to_string(),
            avatar_url: None,
            role: None,
            city: None,
        }
    }

    async fn seeded(count: usize) -> MemoryCommentApi {
        let api = MemoryCommentApi::new(author());
        for n in 0..count {
            api.seed(TARGET, None, &author(), &format!("top {n}")).await.unwrap();
        }
        api
    }

    fn ids(page: &CommentPage) -> Vec<i64> {
        page.nodes.iter().map(|node| node.id.0).collect()
    }

    #[tokio::test]
    async fn pages_newest_first_with_offset_cursor() {
        let api = seeded(5).await;
        let first = api.fetch_page(TARGET, 2, None).await.unwrap();
        assert_eq!(ids(&first), vec![5, 4]);
        assert_eq!(first.next_cursor.as_deref(), Some("2"));
        assert!(first.has_next);

        let last = api.fetch_page(TARGET, 2, Some("4")).await.unwrap();
        assert_eq!(ids(&last), vec![1]);
        assert!(!last.has_next);
        assert_eq!(last.next_cursor, None);

        let past_end = api.fetch_page(TARGET, 2, Some("9")).await.unwrap();
        assert!(past_end.nodes.is_empty());
    }

    #[tokio::test]
    async fn pages_only_hold_the_requested_target() {
        let api = seeded(2).await;
        api.seed(TargetId(2), None, &author(), "elsewhere").await.unwrap();
        let page = api.fetch_page(TARGET, 10, None).await.unwrap();
        assert_eq!(ids(&page), vec![2, 1]);
    }

    #[tokio::test]
    async fn replies_nest_and_depth_is_capped() {
        let api = seeded(1).await;
        let reply = api.seed(TARGET, Some(CommentId(1)), &author(), "r").await.unwrap();
        let nested = api.seed(TARGET, Some(reply), &author(), "rr").await.unwrap();
        let err = api
            .create_comment(&NewComment {
                target: TARGET,
                parent_id: Some(nested),
                body: "too deep".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err, MemoryApiError::Invalid(ValidationError::ReplyTooDeep(nested)));

        let page = api.fetch_page(TARGET, 10, None).await.unwrap();
        let root = &page.nodes[0];
        assert_eq!(root.children()[0].id, reply);
        assert_eq!(root.children()[0].children()[0].id, nested);
    }

    #[tokio::test]
    async fn injected_failure_fires_once() {
        let api = seeded(1).await;
        api.fail_next(Operation::Delete).await;
        assert_eq!(
            api.delete_comment(CommentId(1)).await,
            Err(MemoryApiError::Injected(Operation::Delete))
        );
        assert!(api.contains(CommentId(1)).await);
        api.delete_comment(CommentId(1)).await.unwrap();
        assert_eq!(api.len().await, 0);
    }

    #[tokio::test]
    async fn delete_removes_replies() {
        let api = seeded(1).await;
        api.seed(TARGET, Some(CommentId(1)), &author(), "r").await.unwrap();
        api.delete_comment(CommentId(1)).await.unwrap();
        assert_eq!(api.len().await, 0);
        assert_eq!(
            api.delete_comment(CommentId(1)).await,
            Err(MemoryApiError::NotFound(CommentId(1)))
        );
    }

    #[tokio::test]
    async fn update_sets_body_and_timestamp() {
        let api = seeded(1).await;
        let edited = api
            .update_comment(&UpdateComment {
                id: CommentId(1),
                body: "  changed ".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(api.body_of(CommentId(1)).await.as_deref(), Some("changed"));
        let page = api.fetch_page(TARGET, 1, None).await.unwrap();
        assert_eq!(page.nodes[0].updated_at, Some(edited.updated_at));
    }

    #[tokio::test]
    async fn bad_cursor_is_rejected() {
        let api = seeded(1).await;
        assert_eq!(
            api.fetch_page(TARGET, 1, Some("abc")).await,
            Err(MemoryApiError::InvalidCursor("abc".to_string()))
        );
    }
}
