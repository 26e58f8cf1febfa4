use std::sync::Arc;

use inkthread_core::domain::comments::{AuthorSnapshot, CommentId, TargetId};
use inkthread_core::error::Operation;
use inkthread_infra::memory::{MemoryApiError, MemoryCommentApi};
use tokio::sync::mpsc;
use tracing::info;

use crate::render::render_thread;
use crate::thread::{ThreadController, ThreadError, ThreadNotice};

const DEMO_TARGET: TargetId = TargetId(1);
const DEMO_PAGE_SIZE: usize = 3;

fn guest(id: i64, name: &str, city: Option<&str>) -> AuthorSnapshot {
    AuthorSnapshot {
        id,
        name: name.to_string(),
        avatar_url: None,
        role: None,
        city: city.map(str::to_string),
    }
}

async fn seed(api: &MemoryCommentApi) -> Result<(), MemoryApiError> {
    let alice = guest(101, "alice", Some("Hangzhou"));
    let bob = guest(102, "bob", None);
    let first = api.seed(DEMO_TARGET, None, &alice, "Great write-up, thanks.").await?;
    api.seed(DEMO_TARGET, Some(first), &bob, "Agreed, the diagrams help a lot.").await?;
    for n in 1..=5 {
        api.seed(DEMO_TARGET, None, &bob, &format!("Follow-up question #{n}"))
            .await?;
    }
    Ok(())
}

/// Walks a thread through paging, optimistic writes and a forced rollback
/// against the in-memory service.
pub async fn run(author: AuthorSnapshot) -> Result<(), ThreadError> {
    let api = Arc::new(MemoryCommentApi::new(author.clone()));
    if let Err(err) = seed(&api).await {
        info!(error = %err, "demo seed incomplete");
    }
    let (thread, mut notices) =
        ThreadController::new(Arc::clone(&api), DEMO_TARGET, DEMO_PAGE_SIZE, author);

    thread.refresh().await?;
    while thread.has_next().await {
        thread.load_more().await?;
    }
    drain(&mut notices);
    print!("{}", render_thread(&thread.snapshot().await));

    let first = CommentId(1);
    let reply = thread.create(Some(first), "Replying from the demo.").await?;
    thread.edit(reply, "Replying from the demo (edited).").await?;

    api.fail_next(Operation::Delete).await;
    if let Err(err) = thread.delete(first).await {
        info!(error = %err, "delete rolled back as scripted");
    }
    api.fail_next(Operation::Create).await;
    if let Err(err) = thread.create(None, "This one will not make it.").await {
        info!(error = %err, "create rolled back as scripted");
    }
    drain(&mut notices);

    println!();
    print!("{}", render_thread(&thread.snapshot().await));
    Ok(())
}

fn drain(notices: &mut mpsc::UnboundedReceiver<ThreadNotice>) {
    while let Ok(notice) = notices.try_recv() {
        let marker = if notice.is_failure() { "!" } else { "-" };
        println!("{marker} {notice}");
    }
}
