use thiserror::Error;

use crate::domain::comments::CommentId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("comment body is empty")]
    EmptyBody,
    #[error("comment body is {len} characters, limit is {max}")]
    BodyTooLong { len: usize, max: usize },
    #[error("comment {0} is at the maximum depth and cannot be replied to")]
    ReplyTooDeep(CommentId),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("comment {0} not found in tree")]
    NotFound(CommentId),
    #[error("comment {0} cannot hold children")]
    DepthExceeded(CommentId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    FetchPage,
    Create,
    Update,
    Delete,
}

impl Operation {
    pub fn label(self) -> &'static str {
        match self {
            Operation::FetchPage => "fetch page",
            Operation::Create => "create comment",
            Operation::Update => "update comment",
            Operation::Delete => "delete comment",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("invalid comment: {0}")]
    Validation(#[from] ValidationError),
    #[error("an operation on comment {0} is already in progress")]
    OperationInProgress(CommentId),
    #[error("comment {0} is no longer in the local tree")]
    NotFoundLocal(CommentId),
    #[error("{operation} failed: {message}")]
    RemoteFailure { operation: Operation, message: String },
}

impl CacheError {
    pub fn remote(operation: Operation, err: impl std::fmt::Display) -> Self {
        CacheError::RemoteFailure {
            operation,
            message: err.to_string(),
        }
    }

    /// Local misses are not user-facing; callers drop them silently.
    pub fn is_silent(&self) -> bool {
        matches!(self, CacheError::NotFoundLocal(_))
    }
}

impl From<TreeError> for CacheError {
    fn from(err: TreeError) -> Self {
        match err {
            TreeError::NotFound(id) => CacheError::NotFoundLocal(id),
            TreeError::DepthExceeded(id) => {
                CacheError::Validation(ValidationError::ReplyTooDeep(id))
            }
        }
    }
}
