pub mod comment_body;
