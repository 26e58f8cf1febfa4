use std::sync::Arc;

use chrono::{DateTime, Utc};
use inkthread_core::api::CommentApi;
use inkthread_core::domain::comments::{
    AuthorSnapshot, CommentId, CommentNode, CommentPage, CreatedComment, EditedComment, NewComment,
    TargetId, UpdateComment,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum HttpApiError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("comment service returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

/// `CommentApi` over the comment service's JSON endpoints.
#[derive(Debug, Clone)]
pub struct HttpCommentApi {
    http: reqwest::Client,
    base_url: Arc<str>,
    token: Option<Arc<str>>,
}

impl HttpCommentApi {
    pub fn new(http: reqwest::Client, base_url: &str, token: Option<String>) -> Self {
        Self {
            http,
            base_url: Arc::from(base_url.trim_end_matches('/')),
            token: token.map(Arc::from),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn comments_url(&self) -> String {
        format!("{}/comments", self.base_url)
    }

    fn comment_url(&self, id: CommentId) -> String {
        format!("{}/comments/{id}", self.base_url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, HttpApiError> {
        let response = self
            .authorize(request)
            .header("Accept", "application/json")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HttpApiError::Status { status, body });
        }
        Ok(response)
    }
}

impl CommentApi for HttpCommentApi {
    type Error = HttpApiError;

    async fn fetch_page(
        &self,
        target: TargetId,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<CommentPage, HttpApiError> {
        let mut query = vec![
            ("targetId", target.to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor.to_string()));
        }
        let request = self.http.get(self.comments_url()).query(&query);
        let body = self.send(request).await?.text().await?;
        let page: WirePage = serde_json::from_str(&body)
            .map_err(|err| HttpApiError::InvalidResponse(format!("comment page: {err}")))?;
        let page = page.into_page()?;
        debug!(
            target = %target,
            nodes = page.nodes.len(),
            has_next = page.has_next,
            "fetched comment page"
        );
        Ok(page)
    }

    async fn create_comment(&self, comment: &NewComment) -> Result<CreatedComment, HttpApiError> {
        let request = self.http.post(self.comments_url()).json(&WireNewComment {
            target_id: comment.target.0,
            parent_id: comment.parent_id.map(|id| id.0),
            body: &comment.body,
        });
        let created: WireCreated = self.send(request).await?.json().await?;
        Ok(CreatedComment {
            id: CommentId(created.id),
            created_at: parse_datetime(&created.created_at)?,
        })
    }

    async fn update_comment(&self, update: &UpdateComment) -> Result<EditedComment, HttpApiError> {
        let request = self
            .http
            .patch(self.comment_url(update.id))
            .json(&WireUpdate { body: &update.body });
        let edited: WireEdited = self.send(request).await?.json().await?;
        Ok(EditedComment {
            updated_at: parse_datetime(&edited.updated_at)?,
        })
    }

    async fn delete_comment(&self, id: CommentId) -> Result<(), HttpApiError> {
        self.send(self.http.delete(self.comment_url(id))).await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePage {
    nodes: Vec<WireNode>,
    next_cursor: Option<String>,
    #[serde(default)]
    has_next: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireNode {
    id: i64,
    parent_id: Option<i64>,
    author: WireAuthor,
    body: String,
    created_at: String,
    updated_at: Option<String>,
    #[serde(default)]
    children: Option<Vec<WireNode>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireAuthor {
    id: i64,
    name: String,
    avatar_url: Option<String>,
    role: Option<String>,
    city: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireNewComment<'a> {
    target_id: i64,
    parent_id: Option<i64>,
    body: &'a str,
}

#[derive(Debug, Serialize)]
struct WireUpdate<'a> {
    body: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCreated {
    id: i64,
    created_at: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEdited {
    updated_at: String,
}

impl WirePage {
    fn into_page(self) -> Result<CommentPage, HttpApiError> {
        let mut nodes = Vec::with_capacity(self.nodes.len());
        for node in self.nodes {
            nodes.push(map_node(node)?);
        }
        Ok(CommentPage {
            nodes,
            next_cursor: self.next_cursor.filter(|cursor| !cursor.is_empty()),
            has_next: self.has_next,
        })
    }
}

fn map_node(node: WireNode) -> Result<CommentNode, HttpApiError> {
    let created_at = parse_datetime(&node.created_at)?;
    let updated_at = node.updated_at.as_deref().map(parse_datetime).transpose()?;
    let children = match node.children {
        Some(children) => {
            let mut mapped = Vec::with_capacity(children.len());
            for child in children {
                mapped.push(map_node(child)?);
            }
            Some(Arc::new(mapped))
        }
        None => None,
    };
    Ok(CommentNode {
        id: CommentId(node.id),
        parent_id: node.parent_id.map(CommentId),
        author: AuthorSnapshot {
            id: node.author.id,
            name: node.author.name,
            avatar_url: node.author.avatar_url,
            role: node.author.role,
            city: node.author.city,
        },
        body: node.body,
        created_at,
        updated_at,
        children,
    })
}

fn parse_datetime(value: &str) -> Result<DateTime<Utc>, HttpApiError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| HttpApiError::InvalidTimestamp(value.to_string()))
}
