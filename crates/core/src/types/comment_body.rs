use std::fmt;

use crate::error::ValidationError;

pub const MAX_BODY_CHARS: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommentBody(String);

impl CommentBody {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<&str> for CommentBody {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyBody);
        }
        let len = trimmed.chars().count();
        if len > MAX_BODY_CHARS {
            return Err(ValidationError::BodyTooLong {
                len,
                max: MAX_BODY_CHARS,
            });
        }
        Ok(CommentBody(trimmed.to_string()))
    }
}

impl fmt::Display for CommentBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
