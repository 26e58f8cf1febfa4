use std::fmt::Display;
use std::future::Future;

use crate::domain::comments::{
    CommentId, CommentPage, CreatedComment, EditedComment, NewComment, TargetId, UpdateComment,
};

/// Remote comment service as seen by the cache. Transport, auth and wire
/// format belong to the implementor.
pub trait CommentApi: Send + Sync {
    type Error: Display + Send;

    fn fetch_page(
        &self,
        target: TargetId,
        limit: usize,
        cursor: Option<&str>,
    ) -> impl Future<Output = Result<CommentPage, Self::Error>> + Send;

    fn create_comment(
        &self,
        comment: &NewComment,
    ) -> impl Future<Output = Result<CreatedComment, Self::Error>> + Send;

    fn update_comment(
        &self,
        update: &UpdateComment,
    ) -> impl Future<Output = Result<EditedComment, Self::Error>> + Send;

    fn delete_comment(&self, id: CommentId) -> impl Future<Output = Result<(), Self::Error>> + Send;
}
