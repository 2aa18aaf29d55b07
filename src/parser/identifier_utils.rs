//! Centralized identifier handling utilities for PostgreSQL parsing.
//!
//! PostgreSQL quotes identifiers with double quotes (`"Mixed Case"`, with `""`
//! as the escape for a literal quote) and limits them to 63 bytes
//! (`NAMEDATALEN - 1`). The server silently truncates longer names and the
//! extractors warn about them.
//!
//! # Examples
//!
//! ```ignore
//! use crate::parser::identifier_utils::*;
//!
//! assert_eq!(normalize_identifier("\"MyTable\""), "MyTable");
//! assert_eq!(split_qualified_name("app.\"Users\""), (Some("app".into()), "Users".into()));
//! assert_eq!(default_constraint_name("orders", &["customer_id"], "fkey"), "orders_customer_id_fkey");
//! ```

use sqlparser::tokenizer::{Token, Word};

/// Maximum identifier length in bytes before PostgreSQL truncates it.
pub const MAX_IDENTIFIER_BYTES: usize = 63;

/// Strips surrounding double quotes from an identifier and unescapes `""`.
///
/// ```ignore
/// assert_eq!(normalize_identifier("\"My\"\"Table\""), "My\"Table");
/// assert_eq!(normalize_identifier("  users "), "users");
/// ```
pub fn normalize_identifier(ident: &str) -> String {
    let trimmed = ident.trim();
    if is_double_quoted(trimmed) {
        trimmed[1..trimmed.len() - 1].replace("\"\"", "\"")
    } else {
        trimmed.to_string()
    }
}

/// Checks if a string is a quoted identifier (starts and ends with `"`).
pub fn is_double_quoted(ident: &str) -> bool {
    ident.len() >= 2 && ident.starts_with('"') && ident.ends_with('"')
}

/// Whether `ident` exceeds PostgreSQL's identifier length limit.
pub fn is_identifier_too_long(ident: &str) -> bool {
    ident.len() > MAX_IDENTIFIER_BYTES
}

/// Converts a sqlparser-rs Word token back to SQL, keeping its quoting.
pub fn format_word(word: &Word) -> String {
    match word.quote_style {
        Some('"') => format!("\"{}\"", word.value.replace('"', "\"\"")),
        _ => word.value.clone(),
    }
}

/// Converts a sqlparser-rs Token to a string representation.
///
/// Used when SQL has to be rebuilt from tokens rather than sliced from the
/// source, e.g. for debugging output.
pub fn format_token(token: &Token) -> String {
    match token {
        Token::Word(w) => format_word(w),
        Token::Number(n, _) => n.clone(),
        Token::SingleQuotedString(s) => format!("'{}'", s.replace('\'', "''")),
        Token::EscapedStringLiteral(s) => format!("E'{}'", s),
        Token::DollarQuotedString(s) => s.to_string(),
        Token::Whitespace(ws) => ws.to_string(),
        other => other.to_string(),
    }
}

/// Splits a possibly quoted, dotted name into schema and object name parts.
///
/// Dots inside double quotes do not separate. With three or more parts the
/// last two are used (a leading database name is dropped).
///
/// ```ignore
/// assert_eq!(split_qualified_name("app.users"), (Some("app".into()), "users".into()));
/// assert_eq!(split_qualified_name("\"a.b\""), (None, "a.b".into()));
/// ```
pub fn split_qualified_name(name: &str) -> (Option<String>, String) {
    let mut parts: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = name.trim().chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            '.' if !in_quotes => parts.push(std::mem::take(&mut current).trim().to_string()),
            _ => current.push(c),
        }
    }
    parts.push(current.trim().to_string());

    let name = parts.pop().unwrap_or_default();
    (parts.pop().filter(|s| !s.is_empty()), name)
}

/// Renders `schema.name`, or just `name` when unqualified.
pub fn qualified_display(schema: Option<&str>, name: &str) -> String {
    match schema {
        Some(schema) => format!("{}.{}", schema, name),
        None => name.to_string(),
    }
}

/// The name PostgreSQL generates for an unnamed constraint or index:
/// `table_col1_col2_suffix`, truncated to the identifier limit.
///
/// Suffixes follow the server: `pkey`, `key`, `fkey`, `check`, `excl`, `idx`.
pub fn default_constraint_name(table: &str, columns: &[&str], suffix: &str) -> String {
    let mut name = String::from(table);
    for column in columns {
        name.push('_');
        name.push_str(column);
    }
    let budget = MAX_IDENTIFIER_BYTES.saturating_sub(suffix.len() + 1);
    truncate_to_bytes(&mut name, budget);
    name.push('_');
    name.push_str(suffix);
    name
}

fn truncate_to_bytes(text: &mut String, max: usize) {
    if text.len() <= max {
        return;
    }
    let mut cut = max;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlparser::keywords::Keyword;

    #[test]
    fn test_normalize_identifier() {
        assert_eq!(normalize_identifier("\"MyTable\""), "MyTable");
        assert_eq!(normalize_identifier("\"My\"\"Table\""), "My\"Table");
        assert_eq!(normalize_identifier(" users "), "users");
    }

    #[test]
    fn test_split_qualified_name() {
        assert_eq!(
            split_qualified_name("app.users"),
            (Some("app".to_string()), "users".to_string())
        );
        assert_eq!(
            split_qualified_name("db.app.\"Users\""),
            (Some("app".to_string()), "Users".to_string())
        );
        assert_eq!(split_qualified_name("\"a.b\""), (None, "a.b".to_string()));
    }

    #[test]
    fn test_format_word_quotes() {
        let word = Word {
            value: "Mixed".to_string(),
            quote_style: Some('"'),
            keyword: Keyword::NoKeyword,
        };
        assert_eq!(format_word(&word), "\"Mixed\"");
    }

    #[test]
    fn test_default_constraint_name() {
        assert_eq!(default_constraint_name("users", &[], "pkey"), "users_pkey");
        assert_eq!(
            default_constraint_name("orders", &["customer_id"], "fkey"),
            "orders_customer_id_fkey"
        );
        let long = "t".repeat(80);
        let generated = default_constraint_name(&long, &["c"], "key");
        assert_eq!(generated.len(), MAX_IDENTIFIER_BYTES);
        assert!(generated.ends_with("_key"));
    }

    #[test]
    fn test_identifier_length() {
        assert!(!is_identifier_too_long(&"a".repeat(63)));
        assert!(is_identifier_too_long(&"a".repeat(64)));
    }
}
