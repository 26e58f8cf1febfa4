mod client;

pub use client::{HttpApiError, HttpCommentApi};
