mod cli;
mod config;
mod demo;
mod render;
mod state;
mod thread;
mod wiring;

use clap::Parser;
use inkthread_core::domain::comments::{CommentId, TargetId};
use inkthread_infra::http::HttpCommentApi;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::config::ConfigError;
use crate::render::render_thread;
use crate::thread::{ThreadController, ThreadError, ThreadNotice};
use crate::wiring::WiringError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("invalid cli: {0}")]
    InvalidCli(String),
    #[error("wiring error: {0}")]
    Wiring(#[from] WiringError),
    #[error("thread error: {0}")]
    Thread(#[from] ThreadError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    config::load_dotenv()?;
    let mut config = config::AppConfig::from_env()?;
    if let Some(target) = cli.target {
        config.target_id = TargetId(target);
    }

    if let Command::Demo = cli.command {
        info!("running demo against in-memory comment service");
        demo::run(config.author.clone()).await?;
        return Ok(());
    }

    let state = wiring::build_state(config)?;
    info!(
        api_url = state.api.base_url(),
        target = %state.config.target_id,
        "comment thread starting"
    );
    let (thread, mut notices) = ThreadController::new(
        state.api.clone(),
        state.config.target_id,
        state.config.page_size,
        state.config.author.clone(),
    );
    thread.refresh().await?;

    match cli.command {
        Command::Show { pages, json } => {
            if pages == 0 {
                return Err(AppError::InvalidCli("--pages must be at least 1".to_string()));
            }
            for _ in 1..pages {
                if thread.load_more().await?.is_none() {
                    break;
                }
            }
            let forest = thread.snapshot().await;
            if json {
                println!("{}", serde_json::to_string_pretty(forest.roots())?);
            } else {
                print!("{}", render_thread(&forest));
            }
        }
        Command::Post { body, parent } => {
            let parent = parent.map(CommentId);
            if let Some(parent) = parent {
                load_until_found(&thread, parent).await?;
            }
            thread.create(parent, &body).await?;
        }
        Command::Edit { id, body } => {
            let id = CommentId(id);
            if load_until_found(&thread, id).await? {
                thread.edit(id, &body).await?;
            }
        }
        Command::Delete { id } => {
            let id = CommentId(id);
            if load_until_found(&thread, id).await? {
                thread.delete(id).await?;
            }
        }
        Command::Demo => {}
    }

    print_notices(&mut notices);
    Ok(())
}

/// Pages through the thread until `id` is loaded.
async fn load_until_found(
    thread: &ThreadController<HttpCommentApi>,
    id: CommentId,
) -> Result<bool, ThreadError> {
    loop {
        if thread.snapshot().await.contains(id) {
            return Ok(true);
        }
        if thread.load_more().await?.is_none() {
            warn!(comment_id = %id, "comment not found in thread");
            return Ok(false);
        }
    }
}

fn print_notices(notices: &mut mpsc::UnboundedReceiver<ThreadNotice>) {
    while let Ok(notice) = notices.try_recv() {
        if matches!(notice, ThreadNotice::Refreshed { .. } | ThreadNotice::PageLoaded { .. }) {
            continue;
        }
        println!("{notice}");
    }
}
