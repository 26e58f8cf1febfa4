use std::sync::Arc;

use inkthread_infra::http::HttpCommentApi;

use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub api: Arc<HttpCommentApi>,
}
