use std::fmt;

use inkthread_core::domain::comments::CommentId;

/// One user-facing outcome per settled thread operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadNotice {
    Created { synthetic_id: CommentId, id: CommentId },
    CreateFailed { synthetic_id: CommentId, message: String },
    Edited { id: CommentId },
    EditFailed { id: CommentId, message: String },
    Deleted { id: CommentId },
    DeleteFailed { id: CommentId, message: String },
    PageLoaded { appended: usize, has_next: bool },
    PageFailed { message: String },
    Refreshed { top_level: usize, merged: bool },
    RefreshFailed { message: String },
}

impl ThreadNotice {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ThreadNotice::CreateFailed { .. }
                | ThreadNotice::EditFailed { .. }
                | ThreadNotice::DeleteFailed { .. }
                | ThreadNotice::PageFailed { .. }
                | ThreadNotice::RefreshFailed { .. }
        )
    }
}

impl fmt::Display for ThreadNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadNotice::Created { id, .. } => write!(f, "comment {id} posted"),
            ThreadNotice::CreateFailed { message, .. } => {
                write!(f, "comment could not be posted: {message}")
            }
            ThreadNotice::Edited { id } => write!(f, "comment {id} updated"),
            ThreadNotice::EditFailed { id, message } => {
                write!(f, "comment {id} could not be updated: {message}")
            }
            ThreadNotice::Deleted { id } => write!(f, "comment {id} deleted"),
            ThreadNotice::DeleteFailed { id, message } => {
                write!(f, "comment {id} could not be deleted: {message}")
            }
            ThreadNotice::PageLoaded { appended, has_next } => {
                write!(f, "{appended} more comments loaded")?;
                if !has_next {
                    f.write_str(", end of thread")?;
                }
                Ok(())
            }
            ThreadNotice::PageFailed { message } => write!(f, "loading more failed: {message}"),
            ThreadNotice::Refreshed { top_level, merged } => {
                write!(f, "thread refreshed ({top_level} top-level comments")?;
                if *merged {
                    f.write_str(", pending comments kept")?;
                }
                f.write_str(")")
            }
            ThreadNotice::RefreshFailed { message } => write!(f, "refresh failed: {message}"),
        }
    }
}
