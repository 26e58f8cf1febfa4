use std::fmt::Display;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::cache::{CommentCache, InFlight};
use crate::domain::comments::{
    AuthorSnapshot, CommentId, CommentNode, CreatedComment, EditedComment, MAX_DEPTH, NewComment,
    UpdateComment,
};
use crate::error::{CacheError, Operation, ValidationError};
use crate::tree::{NodePath, Position, dedup_subtree};
use crate::types::comment_body::CommentBody;

#[derive(Debug)]
pub struct PendingCreate {
    synthetic_id: CommentId,
    request: NewComment,
}

impl PendingCreate {
    pub fn synthetic_id(&self) -> CommentId {
        self.synthetic_id
    }

    /// Payload for the remote call; never carries the synthetic id.
    pub fn request(&self) -> &NewComment {
        &self.request
    }
}

#[derive(Debug)]
pub struct PendingEdit {
    request: UpdateComment,
    previous_body: String,
    previous_updated_at: Option<DateTime<Utc>>,
}

impl PendingEdit {
    pub fn id(&self) -> CommentId {
        self.request.id
    }

    pub fn request(&self) -> &UpdateComment {
        &self.request
    }
}

#[derive(Debug)]
pub struct PendingDelete {
    parent: Option<NodePath>,
    index: usize,
    subtree: CommentNode,
}

impl PendingDelete {
    pub fn id(&self) -> CommentId {
        self.subtree.id
    }

    /// Sibling index the comment was removed from.
    pub fn index(&self) -> usize {
        self.index
    }
}

impl CommentCache {
    pub fn begin_create(
        &mut self,
        author: &AuthorSnapshot,
        parent_id: Option<CommentId>,
        body: &str,
        now: DateTime<Utc>,
    ) -> Result<PendingCreate, CacheError> {
        let body = CommentBody::try_from(body)?;
        let parent = match parent_id {
            Some(parent_id) => {
                self.guard_parent(parent_id)?;
                self.forest.find_path(parent_id)
            }
            None => None,
        };
        if let Some(parent) = &parent {
            if parent.depth() >= MAX_DEPTH {
                return Err(ValidationError::ReplyTooDeep(parent.id()).into());
            }
        }

        let id = self.synthetic.next(now);
        let node = CommentNode {
            id,
            parent_id: parent.as_ref().map(NodePath::id),
            author: author.clone(),
            body: body.as_str().to_string(),
            created_at: now,
            updated_at: None,
            children: Some(Arc::new(Vec::new())),
        };
        self.forest = match &parent {
            Some(parent) => self.forest.insert_child(parent, node, Position::Front)?,
            None => {
                if let Some(parent_id) = parent_id {
                    debug!(%parent_id, "reply parent no longer loaded; posting at top level");
                }
                self.forest.prepend_top(node)
            }
        };
        self.in_flight.insert(id, InFlight::Create);
        debug!(synthetic_id = %id, "optimistic comment inserted");

        Ok(PendingCreate {
            synthetic_id: id,
            request: NewComment {
                target: self.target,
                parent_id: parent.map(|parent| parent.id()),
                body: body.into_inner(),
            },
        })
    }

    /// Swaps the synthetic comment for the confirmed one in place, or drops
    /// it when the remote call failed.
    pub fn settle_create<E: Display>(
        &mut self,
        pending: PendingCreate,
        outcome: Result<CreatedComment, E>,
    ) -> Result<CommentId, CacheError> {
        let synthetic_id = pending.synthetic_id;
        self.in_flight.remove(&synthetic_id);
        let path = self.forest.find_path(synthetic_id);

        let created = match outcome {
            Ok(created) => created,
            Err(err) => {
                if let Some(path) = path {
                    let (forest, _) = self.forest.remove_at(&path)?;
                    self.forest = forest;
                }
                return Err(CacheError::remote(Operation::Create, err));
            }
        };

        let Some(path) = path else {
            debug!(%synthetic_id, comment_id = %created.id, "confirmed comment no longer in tree");
            return Ok(created.id);
        };
        if self.forest.contains(created.id) {
            // A page fetch already delivered the authoritative copy.
            let (forest, _) = self.forest.remove_at(&path)?;
            self.forest = forest;
        } else {
            let Some(mut node) = self.forest.get(&path).cloned() else {
                return Ok(created.id);
            };
            node.id = created.id;
            node.created_at = created.created_at;
            self.forest = self.forest.replace_at(&path, node)?;
        }
        debug!(%synthetic_id, comment_id = %created.id, "optimistic comment confirmed");
        Ok(created.id)
    }

    pub fn begin_edit(
        &mut self,
        id: CommentId,
        body: &str,
        now: DateTime<Utc>,
    ) -> Result<PendingEdit, CacheError> {
        let body = CommentBody::try_from(body)?;
        self.guard(id)?;
        let path = self
            .forest
            .find_path(id)
            .ok_or(CacheError::NotFoundLocal(id))?;
        let current = self
            .forest
            .get(&path)
            .cloned()
            .ok_or(CacheError::NotFoundLocal(id))?;

        let mut edited = current.clone();
        edited.body = body.as_str().to_string();
        edited.updated_at = Some(now);
        self.forest = self.forest.replace_at(&path, edited)?;
        self.in_flight.insert(
            id,
            InFlight::Edit {
                body: body.as_str().to_string(),
                updated_at: now,
            },
        );

        Ok(PendingEdit {
            request: UpdateComment {
                id,
                body: body.into_inner(),
            },
            previous_body: current.body,
            previous_updated_at: current.updated_at,
        })
    }

    pub fn settle_edit<E: Display>(
        &mut self,
        pending: PendingEdit,
        outcome: Result<EditedComment, E>,
    ) -> Result<(), CacheError> {
        let id = pending.id();
        self.in_flight.remove(&id);
        let current = self
            .forest
            .find_path(id)
            .and_then(|path| Some((self.forest.get(&path)?.clone(), path)));

        match outcome {
            Ok(edited) => {
                let Some((mut node, path)) = current else {
                    debug!(comment_id = %id, "edited comment no longer in tree");
                    return Ok(());
                };
                node.updated_at = Some(edited.updated_at);
                self.forest = self.forest.replace_at(&path, node)?;
                Ok(())
            }
            Err(err) => {
                if let Some((mut node, path)) = current {
                    node.body = pending.previous_body;
                    node.updated_at = pending.previous_updated_at;
                    self.forest = self.forest.replace_at(&path, node)?;
                }
                Err(CacheError::remote(Operation::Update, err))
            }
        }
    }

    pub fn begin_delete(&mut self, id: CommentId) -> Result<PendingDelete, CacheError> {
        self.guard(id)?;
        let path = self
            .forest
            .find_path(id)
            .ok_or(CacheError::NotFoundLocal(id))?;
        if let Some(node) = self.forest.get(&path) {
            self.guard_subtree(node)?;
        }
        let (forest, removed) = self.forest.remove_at(&path)?;
        self.forest = forest;
        self.in_flight.insert(
            id,
            InFlight::Delete {
                ancestors: path.ancestors().to_vec(),
            },
        );
        Ok(PendingDelete {
            parent: path.parent(),
            index: removed.index,
            subtree: removed.node,
        })
    }

    /// On failure the subtree goes back to the exact sibling index it was
    /// removed from.
    pub fn settle_delete<E: Display>(
        &mut self,
        pending: PendingDelete,
        outcome: Result<(), E>,
    ) -> Result<(), CacheError> {
        let id = pending.id();
        self.in_flight.remove(&id);

        if let Err(err) = outcome {
            self.restore_subtree(pending);
            return Err(CacheError::remote(Operation::Delete, err));
        }
        if let Some(path) = self.forest.find_path(id) {
            let (forest, _) = self.forest.remove_at(&path)?;
            self.forest = forest;
        }
        Ok(())
    }

    fn restore_subtree(&mut self, pending: PendingDelete) {
        let id = pending.id();
        let mut seen = self.forest.ids();
        let Some(subtree) = dedup_subtree(pending.subtree, &mut seen) else {
            debug!(comment_id = %id, "deleted comment already back in tree");
            return;
        };
        let position = Position::Index(pending.index);
        match pending.parent {
            None => self.forest = self.forest.insert_top(subtree, position),
            Some(parent) => {
                let Some(parent) = self.forest.find_path(parent.id()) else {
                    debug!(comment_id = %id, "parent of deleted comment is gone");
                    return;
                };
                match self.forest.insert_child(&parent, subtree, position) {
                    Ok(forest) => self.forest = forest,
                    Err(err) => debug!(comment_id = %id, error = %err, "delete rollback skipped"),
                }
            }
        }
    }

    /// A subtree can only be deleted when nothing inside it, or already
    /// removed from below it, is still waiting on the server.
    fn guard_subtree(&self, root: &CommentNode) -> Result<(), CacheError> {
        for (pending_id, pending) in &self.in_flight {
            let below = match pending {
                InFlight::Delete { ancestors } => ancestors.contains(&root.id),
                InFlight::Create | InFlight::Edit { .. } => false,
            };
            if below || holds_id(root, *pending_id) {
                return Err(CacheError::OperationInProgress(*pending_id));
            }
        }
        Ok(())
    }

    fn guard_parent(&self, parent_id: CommentId) -> Result<(), CacheError> {
        // The parent's own creation has not been confirmed, so there is no
        // server id to reply to yet.
        if parent_id.is_synthetic() && self.in_flight.contains_key(&parent_id) {
            return Err(CacheError::OperationInProgress(parent_id));
        }
        Ok(())
    }
}

fn holds_id(node: &CommentNode, id: CommentId) -> bool {
    node.id == id || node.children().iter().any(|child| holds_id(child, id))
}
