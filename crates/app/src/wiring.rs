use std::sync::Arc;

use inkthread_infra::http::HttpCommentApi;
use reqwest::Client;
use thiserror::Error;

use crate::config::AppConfig;
use crate::state::AppState;

#[derive(Debug, Error)]
pub enum WiringError {
    #[error("http client error: {0}")]
    HttpClient(#[from] reqwest::Error),
}

pub fn build_state(config: AppConfig) -> Result<AppState, WiringError> {
    let client = Client::builder().timeout(config.request_timeout).build()?;
    let api = HttpCommentApi::new(client, &config.api_url, config.api_token.clone());
    Ok(AppState {
        config: Arc::new(config),
        api: Arc::new(api),
    })
}
