use std::sync::Arc;

use chrono::Utc;
use inkthread_core::api::CommentApi;
use inkthread_core::cache::{CommentCache, LoadMore, Refresh};
use inkthread_core::domain::comments::{AuthorSnapshot, CommentId, TargetId};
use inkthread_core::error::CacheError;
use inkthread_core::tree::Forest;
use thiserror::Error;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info, warn};

use crate::thread::notice::ThreadNotice;

#[derive(Debug, Error)]
pub enum ThreadError {
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Drives one comment thread: applies each intent to the cache, runs the
/// remote call without holding the lock, then settles the outcome.
pub struct ThreadController<A> {
    cache: Arc<RwLock<CommentCache>>,
    api: Arc<A>,
    author: AuthorSnapshot,
    notices: mpsc::UnboundedSender<ThreadNotice>,
}

impl<A> Clone for ThreadController<A> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            api: Arc::clone(&self.api),
            author: self.author.clone(),
            notices: self.notices.clone(),
        }
    }
}

impl<A: CommentApi> ThreadController<A> {
    pub fn new(
        api: Arc<A>,
        target: TargetId,
        page_size: usize,
        author: AuthorSnapshot,
    ) -> (Self, mpsc::UnboundedReceiver<ThreadNotice>) {
        let (notices, receiver) = mpsc::unbounded_channel();
        let controller = Self {
            cache: Arc::new(RwLock::new(CommentCache::new(target, page_size))),
            api,
            author,
            notices,
        };
        (controller, receiver)
    }

    pub async fn snapshot(&self) -> Forest {
        self.cache.read().await.snapshot()
    }

    pub async fn has_next(&self) -> bool {
        self.cache.read().await.cursor().has_next()
    }

    pub async fn refresh(&self) -> Result<Refresh, ThreadError> {
        let (request, target) = {
            let cache = self.cache.read().await;
            (cache.begin_refresh(), cache.target())
        };
        let outcome = self
            .api
            .fetch_page(target, request.limit, request.cursor.as_deref())
            .await;
        let settled = self.cache.write().await.settle_refresh(request, outcome);
        match settled {
            Ok(refresh) => {
                let (top_level, merged) = match refresh {
                    Refresh::Replaced { top_level } => (top_level, false),
                    Refresh::Merged { top_level } => (top_level, true),
                };
                info!(%target, top_level, merged, "thread refreshed");
                self.notify(ThreadNotice::Refreshed { top_level, merged });
                Ok(refresh)
            }
            Err(err) => {
                warn!(%target, error = %err, "thread refresh failed");
                self.notify(ThreadNotice::RefreshFailed {
                    message: remote_message(&err),
                });
                Err(err.into())
            }
        }
    }

    /// `Ok(None)` when the thread is exhausted or a page is already loading.
    pub async fn load_more(&self) -> Result<Option<LoadMore>, ThreadError> {
        let (request, target) = {
            let mut cache = self.cache.write().await;
            let target = cache.target();
            match cache.begin_load_more() {
                Some(request) => (request, target),
                None => {
                    debug!(%target, "load more skipped");
                    return Ok(None);
                }
            }
        };
        let outcome = self
            .api
            .fetch_page(target, request.limit, request.cursor.as_deref())
            .await;
        let settled = self.cache.write().await.settle_load_more(request, outcome);
        match settled {
            Ok(LoadMore::Appended {
                appended,
                skipped,
                has_next,
            }) => {
                info!(%target, appended, skipped, has_next, "page loaded");
                self.notify(ThreadNotice::PageLoaded { appended, has_next });
                Ok(Some(LoadMore::Appended {
                    appended,
                    skipped,
                    has_next,
                }))
            }
            Ok(LoadMore::Stale) => Ok(Some(LoadMore::Stale)),
            Err(err) => {
                warn!(%target, error = %err, "loading page failed");
                self.notify(ThreadNotice::PageFailed {
                    message: remote_message(&err),
                });
                Err(err.into())
            }
        }
    }

    /// Returns the server id of the new comment.
    pub async fn create(
        &self,
        parent_id: Option<CommentId>,
        body: &str,
    ) -> Result<CommentId, ThreadError> {
        let pending = self
            .cache
            .write()
            .await
            .begin_create(&self.author, parent_id, body, Utc::now())?;
        let synthetic_id = pending.synthetic_id();
        let outcome = self.api.create_comment(pending.request()).await;
        let settled = self.cache.write().await.settle_create(pending, outcome);
        match settled {
            Ok(id) => {
                info!(%synthetic_id, comment_id = %id, "comment created");
                self.notify(ThreadNotice::Created { synthetic_id, id });
                Ok(id)
            }
            Err(err) => {
                warn!(%synthetic_id, error = %err, "comment create rolled back");
                self.notify(ThreadNotice::CreateFailed {
                    synthetic_id,
                    message: remote_message(&err),
                });
                Err(err.into())
            }
        }
    }

    pub async fn edit(&self, id: CommentId, body: &str) -> Result<(), ThreadError> {
        let begun = self.cache.write().await.begin_edit(id, body, Utc::now());
        let pending = match begun {
            Ok(pending) => pending,
            Err(err) if err.is_silent() => {
                debug!(comment_id = %id, "edit skipped: comment not loaded");
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };
        let outcome = self.api.update_comment(pending.request()).await;
        let settled = self.cache.write().await.settle_edit(pending, outcome);
        match settled {
            Ok(()) => {
                info!(comment_id = %id, "comment edited");
                self.notify(ThreadNotice::Edited { id });
                Ok(())
            }
            Err(err) => {
                warn!(comment_id = %id, error = %err, "comment edit rolled back");
                self.notify(ThreadNotice::EditFailed {
                    id,
                    message: remote_message(&err),
                });
                Err(err.into())
            }
        }
    }

    pub async fn delete(&self, id: CommentId) -> Result<(), ThreadError> {
        let begun = self.cache.write().await.begin_delete(id);
        let pending = match begun {
            Ok(pending) => pending,
            Err(err) if err.is_silent() => {
                debug!(comment_id = %id, "delete skipped: comment not loaded");
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };
        let outcome = self.api.delete_comment(id).await;
        let settled = self.cache.write().await.settle_delete(pending, outcome);
        match settled {
            Ok(()) => {
                info!(comment_id = %id, "comment deleted");
                self.notify(ThreadNotice::Deleted { id });
                Ok(())
            }
            Err(err) => {
                warn!(comment_id = %id, error = %err, "comment delete rolled back");
                self.notify(ThreadNotice::DeleteFailed {
                    id,
                    message: remote_message(&err),
                });
                Err(err.into())
            }
        }
    }

    fn notify(&self, notice: ThreadNotice) {
        if self.notices.send(notice).is_err() {
            debug!("thread notice receiver dropped");
        }
    }
}

fn remote_message(err: &CacheError) -> String {
    match err {
        CacheError::RemoteFailure { message, .. } => message.clone(),
        other => other.to_string(),
    }
}
