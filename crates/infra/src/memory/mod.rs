mod server;

pub use server::{MemoryApiError, MemoryCommentApi};
