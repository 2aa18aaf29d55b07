//! Inline annotation directives embedded in SQL comments
//!
//! Authors can attach a description, an override name or an override type to
//! an object or column straight from the SQL source:
//!
//! ```sql
//! id BIGINT, -- comment: Primary identifier; rename: Id; type: long;
//! name TEXT  -- comment(Display name); rename(DisplayName);
//! ```
//!
//! Both the `key: value;` and the `key(value);` forms are accepted, may be
//! mixed, and appear in any order. Parsing stops at the first text that is
//! not a directive; that text is kept verbatim in `remainder`.

use serde::{Deserialize, Serialize};

/// Directives parsed from a comment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotations {
    /// Description text (`comment:` / `comment(...)`)
    pub comment: Option<String>,
    /// Override name (`rename:` / `rename(...)`)
    pub rename: Option<String>,
    /// Override type (`type:` / `type(...)`)
    pub type_override: Option<String>,
    /// Text that followed the last recognized directive
    pub remainder: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Directive {
    Comment,
    Rename,
    Type,
}

const DIRECTIVES: &[(&str, Directive)] = &[
    ("comment", Directive::Comment),
    ("rename", Directive::Rename),
    ("type", Directive::Type),
];

impl Annotations {
    /// Parse the directive micro-format out of a comment body.
    pub fn parse(text: &str) -> Self {
        let mut annotations = Annotations::default();
        let mut rest = text.trim();

        loop {
            rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == ';');
            if rest.is_empty() {
                break;
            }
            match parse_directive(rest) {
                Some((directive, value, tail)) => {
                    let value = Some(value.trim().to_string()).filter(|v| !v.is_empty());
                    match directive {
                        Directive::Comment => annotations.comment = value,
                        Directive::Rename => annotations.rename = value,
                        Directive::Type => annotations.type_override = value,
                    }
                    rest = tail;
                }
                None => {
                    annotations.remainder = Some(rest.trim_end().to_string());
                    break;
                }
            }
        }

        annotations
    }

    /// Whether no directive and no free text were found.
    pub fn is_empty(&self) -> bool {
        self.comment.is_none()
            && self.rename.is_none()
            && self.type_override.is_none()
            && self.remainder.is_none()
    }

    /// Whether at least one directive was recognized.
    pub fn has_directives(&self) -> bool {
        self.comment.is_some() || self.rename.is_some() || self.type_override.is_some()
    }

    /// The description: the `comment` directive, or the free text of a comment without directives.
    pub fn description(&self) -> Option<&str> {
        match &self.comment {
            Some(comment) => Some(comment),
            None if !self.has_directives() => self.remainder.as_deref(),
            None => None,
        }
    }

    /// Fill the description from another source unless one is already present.
    pub fn with_fallback_comment(mut self, comment: Option<&str>) -> Self {
        if self.description().is_none() {
            if let Some(text) = comment {
                self.comment = Some(text.to_string());
            }
        }
        self
    }
}

/// Try to read one directive at the start of `text`.
/// Returns the directive, its value and the remaining text.
fn parse_directive(text: &str) -> Option<(Directive, &str, &str)> {
    let (directive, after_key) = DIRECTIVES.iter().find_map(|(key, directive)| {
        let head = text.get(..key.len())?;
        if !head.eq_ignore_ascii_case(key) {
            return None;
        }
        Some((*directive, text[key.len()..].trim_start()))
    })?;

    if let Some(value_and_tail) = after_key.strip_prefix(':') {
        return Some(match value_and_tail.find(';') {
            Some(end) => (directive, &value_and_tail[..end], &value_and_tail[end + 1..]),
            None => (directive, value_and_tail, ""),
        });
    }

    if let Some(inner) = after_key.strip_prefix('(') {
        let mut depth = 1usize;
        for (i, c) in inner.char_indices() {
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some((directive, &inner[..i], &inner[i + 1..]));
                    }
                }
                _ => {}
            }
        }
    }

    None
}
