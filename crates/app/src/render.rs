use std::fmt;

use inkthread_core::domain::comments::CommentNode;
use inkthread_core::tree::Forest;

const INDENT: &str = "    ";

/// Plain-text rendering of a thread, one block per comment, replies indented
/// under their parent.
pub fn render_thread(forest: &Forest) -> String {
    ThreadView(forest).to_string()
}

struct ThreadView<'a>(&'a Forest);

impl fmt::Display for ThreadView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return writeln!(f, "(no comments)");
        }
        for node in self.0.roots() {
            write_node(f, node, 0)?;
        }
        Ok(())
    }
}

fn write_node(f: &mut fmt::Formatter<'_>, node: &CommentNode, depth: usize) -> fmt::Result {
    let pad = INDENT.repeat(depth);
    write!(f, "{pad}#{} {}", node.id, node.author.name)?;
    if let Some(role) = &node.author.role {
        write!(f, " [{role}]")?;
    }
    if let Some(city) = &node.author.city {
        write!(f, " from {city}")?;
    }
    write!(f, " at {}", node.created_at.format("%Y-%m-%d %H:%M"))?;
    if node.updated_at.is_some() {
        f.write_str(" (edited)")?;
    }
    if node.is_synthetic() {
        f.write_str(" (sending)")?;
    }
    writeln!(f)?;
    for line in node.body.lines() {
        writeln!(f, "{pad}  {line}")?;
    }
    for child in node.children() {
        write_node(f, child, depth + 1)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use inkthread_core::domain::comments::{AuthorSnapshot, CommentId};

    use super::*;

    fn node(id: i64, body: &str) -> CommentNode {
        CommentNode {
            id: CommentId(id),
            parent_id: None,
            author: AuthorSnapshot {
                id: 1,
                name: "wincer".to_string(),
                avatar_url: None,
                role: Some("admin".to_string()),
                city: None,
            },
            body: body.to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap(),
            updated_at: None,
            children: None,
        }
    }

    #[test]
    fn renders_replies_indented() {
        let mut root = node(1, "top");
        root.children = Some(Arc::new(vec![node(2, "reply\nsecond line")]));
        let text = render_thread(&Forest::from_roots(vec![root]));
        assert_eq!(
            text,
            "#1 wincer [admin] at 2024-03-01 09:30\n  top\n    #2 wincer [admin] at 2024-03-01 09:30\n      reply\n      second line\n"
        );
    }

    #[test]
    fn marks_pending_comments() {
        let text = render_thread(&Forest::from_roots(vec![node(-5, "hi")]));
        assert!(text.starts_with("#-5 wincer [admin] at 2024-03-01 09:30 (sending)\n"));
    }

    #[test]
    fn shows_city_and_edit_marker() {
        let mut edited = node(3, "changed");
        edited.author.city = Some("Hangzhou".to_string());
        edited.updated_at = Some(Utc.with_ymd_and_hms(2024, 3, 2, 10, 0, 0).unwrap());
        let text = render_thread(&Forest::from_roots(vec![edited]));
        assert_eq!(
            text,
            "#3 wincer [admin] from Hangzhou at 2024-03-01 09:30 (edited)\n  changed\n"
        );
    }

    #[test]
    fn empty_thread() {
        assert_eq!(render_thread(&Forest::new()), "(no comments)\n");
    }
}
