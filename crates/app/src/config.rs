use std::path::Path;
use std::time::Duration;

use inkthread_core::cache::DEFAULT_PAGE_SIZE;
use inkthread_core::domain::comments::{AuthorSnapshot, TargetId};
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_url: String,
    pub api_token: Option<String>,
    pub target_id: TargetId,
    pub page_size: usize,
    pub request_timeout: Duration,
    pub author: AuthorSnapshot,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid integer for {0}: {1}")]
    InvalidNumber(&'static str, String),
    #[error("invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_url = read_string(&lookup, "INKTHREAD_API_URL", "http://127.0.0.1:8080/api");
        if api_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue("INKTHREAD_API_URL", api_url));
        }
        let api_token = read_optional_string(&lookup, "INKTHREAD_API_TOKEN");
        let target_id = read_i64(&lookup, "INKTHREAD_TARGET_ID", 1)?;
        let page_size = read_usize(&lookup, "INKTHREAD_PAGE_SIZE", DEFAULT_PAGE_SIZE)?;
        if page_size == 0 {
            return Err(ConfigError::InvalidValue(
                "INKTHREAD_PAGE_SIZE",
                page_size.to_string(),
            ));
        }
        let request_timeout_secs = read_u64(&lookup, "INKTHREAD_REQUEST_TIMEOUT_SECS", 15)?;
        let author = AuthorSnapshot {
            id: read_i64(&lookup, "INKTHREAD_AUTHOR_ID", 1)?,
            name: read_string(&lookup, "INKTHREAD_AUTHOR_NAME", "anonymous"),
            avatar_url: read_optional_string(&lookup, "INKTHREAD_AUTHOR_AVATAR_URL"),
            role: read_optional_string(&lookup, "INKTHREAD_AUTHOR_ROLE"),
            city: read_optional_string(&lookup, "INKTHREAD_AUTHOR_CITY"),
        };

        Ok(Self {
            api_url,
            api_token,
            target_id: TargetId(target_id),
            page_size,
            request_timeout: Duration::from_secs(request_timeout_secs),
            author,
        })
    }
}

pub fn load_dotenv() -> Result<(), std::io::Error> {
    let path = Path::new(".env");
    if !path.exists() {
        return Ok(());
    }
    let contents = std::fs::read_to_string(path)?;
    for (key, value) in parse_dotenv(&contents) {
        if std::env::var_os(&key).is_none() {
            // Safety: invoked during startup before any threads are spawned.
            unsafe {
                std::env::set_var(key, value);
            }
        }
    }
    Ok(())
}

fn read_string<F>(lookup: &F, key: &'static str, default: &'static str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).unwrap_or_else(|| default.to_string())
}

fn read_i64<F>(lookup: &F, key: &'static str, default: i64) -> Result<i64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key).unwrap_or_else(|| default.to_string());
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::InvalidNumber(key, raw))
}

fn read_u64<F>(lookup: &F, key: &'static str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key).unwrap_or_else(|| default.to_string());
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::InvalidNumber(key, raw))
}

fn read_usize<F>(lookup: &F, key: &'static str, default: usize) -> Result<usize, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key).unwrap_or_else(|| default.to_string());
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::InvalidNumber(key, raw))
}

fn read_optional_string<F>(lookup: &F, key: &'static str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(key).unwrap_or_default();
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    contents
        .lines()
        .filter_map(parse_dotenv_line)
        .collect()
}

fn parse_dotenv_line(line: &str) -> Option<(String, String)> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
    let (key, value) = trimmed.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), parse_dotenv_value(value.trim())))
}

fn parse_dotenv_value(value: &str) -> String {
    if let Some(stripped) = value.strip_prefix('"').and_then(|inner| inner.strip_suffix('"')) {
        return unescape_double_quoted(stripped);
    }
    if let Some(stripped) = value.strip_prefix('\'').and_then(|inner| inner.strip_suffix('\'')) {
        return stripped.to_string();
    }
    // Unquoted values may carry a trailing comment.
    match value.split_once(" #") {
        Some((head, _)) => head.trim_end().to_string(),
        None => value.to_string(),
    }
}

fn unescape_double_quoted(value: &str) -> String {
    let mut output = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            output.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => output.push('\n'),
            Some('t') => output.push('\t'),
            Some('\\') => output.push('\\'),
            Some('"') => output.push('"'),
            Some(other) => {
                output.push('\\');
                output.push(other);
            }
            None => output.push('\\'),
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.api_url, "http://127.0.0.1:8080/api");
        assert_eq!(config.api_token, None);
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(config.request_timeout, Duration::from_secs(15));
        assert_eq!(config.author.name, "anonymous");
        assert_eq!(config.author.role, None);
    }

    #[test]
    fn reads_author_snapshot() {
        let config = config_from(&[
            ("INKTHREAD_TARGET_ID", "42"),
            ("INKTHREAD_AUTHOR_ID", "7"),
            ("INKTHREAD_AUTHOR_NAME", "wincer"),
            ("INKTHREAD_AUTHOR_ROLE", " admin "),
            ("INKTHREAD_AUTHOR_CITY", ""),
        ])
        .unwrap();
        assert_eq!(config.target_id, TargetId(42));
        assert_eq!(config.author.id, 7);
        assert_eq!(config.author.name, "wincer");
        assert_eq!(config.author.role.as_deref(), Some("admin"));
        assert_eq!(config.author.city, None);
    }

    #[test]
    fn rejects_bad_numbers() {
        assert!(matches!(
            config_from(&[("INKTHREAD_PAGE_SIZE", "ten")]),
            Err(ConfigError::InvalidNumber("INKTHREAD_PAGE_SIZE", _))
        ));
        assert!(matches!(
            config_from(&[("INKTHREAD_PAGE_SIZE", "0")]),
            Err(ConfigError::InvalidValue("INKTHREAD_PAGE_SIZE", _))
        ));
    }

    #[test]
    fn rejects_blank_api_url() {
        assert!(matches!(
            config_from(&[("INKTHREAD_API_URL", "  ")]),
            Err(ConfigError::InvalidValue("INKTHREAD_API_URL", _))
        ));
    }

    #[test]
    fn parse_dotenv_line_basic() {
        let (key, value) = parse_dotenv_line("export FOO=bar").unwrap();
        assert_eq!(key, "FOO");
        assert_eq!(value, "bar");
    }

    #[test]
    fn parse_dotenv_line_quotes() {
        let (_, value) = parse_dotenv_line(r#"FOO="line\n\"quote\"""#).unwrap();
        assert_eq!(value, "line\n\"quote\"");
        let (_, value) = parse_dotenv_line("FOO='a # b'").unwrap();
        assert_eq!(value, "a # b");
    }

    #[test]
    fn parse_dotenv_line_trailing_comment() {
        let (_, value) = parse_dotenv_line("INKTHREAD_PAGE_SIZE=20 # per page").unwrap();
        assert_eq!(value, "20");
    }

    #[test]
    fn parse_dotenv_skips_comments_and_blanks() {
        let parsed = parse_dotenv("# comment\n\nA=1\n=2\nB = two\n");
        assert_eq!(
            parsed,
            vec![
                ("A".to_string(), "1".to_string()),
                ("B".to_string(), "two".to_string()),
            ]
        );
    }
}
