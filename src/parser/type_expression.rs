//! Type expression parsing shared by columns, attributes, domains and functions
//!
//! Accepts the spellings PostgreSQL accepts for a type reference:
//!
//! ```sql
//! NUMERIC(12,2)   VARCHAR(255)   character varying(50)
//! INTEGER[]       INT[3][]       integer ARRAY
//! timestamp(3) with time zone    public.my_type[]
//! geometry(Point, 4326)
//! ```
//!
//! Built-in type names are upper-cased with single spaces; user-defined
//! names keep their spelling.

use serde::{Deserialize, Serialize};

use crate::util::collapse_whitespace;

/// A parsed type reference
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeExpression {
    /// Type name without modifiers or array suffixes
    pub base_type: String,
    /// Length of character and bit types
    pub length: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    /// Raw modifier list, e.g. `["Point", "4326"]`
    pub modifiers: Vec<String>,
    pub array_dimensions: usize,
    /// The text as written
    pub original: String,
}

impl TypeExpression {
    pub fn is_array(&self) -> bool {
        self.array_dimensions > 0
    }

    /// `smallserial`, `serial` and `bigserial` (and their numbered aliases)
    pub fn is_serial(&self) -> bool {
        SERIAL_TYPES.contains(&self.base_type.as_str())
    }

    pub fn is_builtin(&self) -> bool {
        is_builtin_type(&self.base_type)
    }
}

const SERIAL_TYPES: &[&str] = &[
    "SMALLSERIAL",
    "SERIAL",
    "BIGSERIAL",
    "SERIAL2",
    "SERIAL4",
    "SERIAL8",
];

/// Types whose single modifier is a length rather than a precision
const LENGTH_TYPES: &[&str] = &[
    "BIT",
    "BIT VARYING",
    "BPCHAR",
    "CHAR",
    "CHARACTER",
    "CHARACTER VARYING",
    "NATIONAL CHARACTER",
    "NATIONAL CHARACTER VARYING",
    "NCHAR",
    "VARBIT",
    "VARCHAR",
];

const BUILTIN_TYPES: &[&str] = &[
    "BIGINT",
    "BIGSERIAL",
    "BIT",
    "BIT VARYING",
    "BOOL",
    "BOOLEAN",
    "BOX",
    "BPCHAR",
    "BYTEA",
    "CHAR",
    "CHARACTER",
    "CHARACTER VARYING",
    "CIDR",
    "CIRCLE",
    "DATE",
    "DATERANGE",
    "DECIMAL",
    "DOUBLE PRECISION",
    "FLOAT",
    "FLOAT4",
    "FLOAT8",
    "INET",
    "INT",
    "INT2",
    "INT4",
    "INT4RANGE",
    "INT8",
    "INT8RANGE",
    "INTEGER",
    "INTERVAL",
    "JSON",
    "JSONB",
    "JSONPATH",
    "LINE",
    "LSEG",
    "MACADDR",
    "MACADDR8",
    "MONEY",
    "NAME",
    "NATIONAL CHARACTER",
    "NATIONAL CHARACTER VARYING",
    "NCHAR",
    "NUMERIC",
    "NUMRANGE",
    "OID",
    "PATH",
    "PG_LSN",
    "POINT",
    "POLYGON",
    "REAL",
    "REGCLASS",
    "REGTYPE",
    "SERIAL",
    "SERIAL2",
    "SERIAL4",
    "SERIAL8",
    "SMALLINT",
    "SMALLSERIAL",
    "TEXT",
    "TIME",
    "TIME WITH TIME ZONE",
    "TIME WITHOUT TIME ZONE",
    "TIMESTAMP",
    "TIMESTAMP WITH TIME ZONE",
    "TIMESTAMP WITHOUT TIME ZONE",
    "TIMESTAMPTZ",
    "TIMETZ",
    "TSQUERY",
    "TSRANGE",
    "TSTZRANGE",
    "TSVECTOR",
    "TXID_SNAPSHOT",
    "UUID",
    "VARBIT",
    "VARCHAR",
    "XML",
];

/// Whether `name` (any case) is a built-in PostgreSQL type name.
pub fn is_builtin_type(name: &str) -> bool {
    let upper = collapse_whitespace(name).to_uppercase();
    BUILTIN_TYPES.binary_search(&upper.as_str()).is_ok() || upper.starts_with("INTERVAL ")
}

/// Parse a type reference. `None` for blank text or unbalanced brackets.
pub fn parse_type_expression(text: &str) -> Option<TypeExpression> {
    let original = text.trim();
    if original.is_empty() || !is_balanced(original) {
        return None;
    }

    let (core, array_dimensions) = strip_array_suffixes(original);
    if core.is_empty() {
        return None;
    }

    let (name, modifiers) = match find_unquoted(core, '(') {
        Some(open) => {
            let close = matching_paren(core, open)?;
            let name = format!("{} {}", &core[..open], &core[close + 1..]);
            let modifiers: Vec<String> = core[open + 1..close]
                .split(',')
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect();
            (collapse_whitespace(&name), modifiers)
        }
        None => (collapse_whitespace(core), Vec::new()),
    };
    if name.is_empty() {
        return None;
    }

    let base_type = if is_builtin_type(&name) {
        name.to_uppercase()
    } else {
        name
    };

    let numeric: Option<Vec<u32>> = modifiers.iter().map(|m| m.parse::<u32>().ok()).collect();
    let (mut length, mut precision, mut scale) = (None, None, None);
    if let Some(values) = numeric.filter(|v| !v.is_empty()) {
        if LENGTH_TYPES.contains(&base_type.as_str()) {
            length = values.first().copied();
        } else {
            precision = values.first().copied();
            scale = values.get(1).copied();
        }
    }

    Some(TypeExpression {
        base_type,
        length,
        precision,
        scale,
        modifiers,
        array_dimensions,
        original: original.to_string(),
    })
}

/// Remove `[]`, `[n]`, `ARRAY` and `ARRAY[n]` suffixes, counting dimensions.
fn strip_array_suffixes(text: &str) -> (&str, usize) {
    let mut core = text.trim_end();
    let mut dimensions = 0;
    loop {
        if core.ends_with(']') {
            match core.rfind('[') {
                Some(open) if core[open + 1..core.len() - 1].trim().chars().all(|c| c.is_ascii_digit()) => {
                    dimensions += 1;
                    core = core[..open].trim_end();
                    // `ARRAY[4]` is a single dimension
                    if let Some(stripped) = strip_trailing_word(core, "ARRAY") {
                        core = stripped;
                    }
                    continue;
                }
                _ => break,
            }
        }
        if let Some(stripped) = strip_trailing_word(core, "ARRAY") {
            dimensions += 1;
            core = stripped;
            continue;
        }
        break;
    }
    (core, dimensions)
}

fn strip_trailing_word<'a>(text: &'a str, word: &str) -> Option<&'a str> {
    let split = text.len().checked_sub(word.len())?;
    if !text.is_char_boundary(split) || !text[split..].eq_ignore_ascii_case(word) {
        return None;
    }
    let head = &text[..split];
    if !head.ends_with(char::is_whitespace) {
        return None;
    }
    Some(head.trim_end())
}

/// Parentheses and brackets are balanced outside double quotes.
fn is_balanced(text: &str) -> bool {
    let mut stack = Vec::new();
    let mut in_quotes = false;
    for c in text.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            '(' | '[' if !in_quotes => stack.push(c),
            ')' if !in_quotes => {
                if stack.pop() != Some('(') {
                    return false;
                }
            }
            ']' if !in_quotes => {
                if stack.pop() != Some('[') {
                    return false;
                }
            }
            _ => {}
        }
    }
    stack.is_empty() && !in_quotes
}

fn find_unquoted(text: &str, target: char) -> Option<usize> {
    let mut in_quotes = false;
    for (i, c) in text.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            c if c == target && !in_quotes => return Some(i),
            _ => {}
        }
    }
    None
}

fn matching_paren(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in text[open..].char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}
