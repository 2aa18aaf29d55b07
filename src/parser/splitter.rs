//! Top-level statement splitting for PostgreSQL scripts
//!
//! The splitter walks the script once, tracking the lexical mode (plain code,
//! single-quoted literal, quoted identifier, line comment, block comment or
//! dollar-quoted body) and the parenthesis depth. A statement ends when, in
//! plain code at depth 0:
//!
//! - a semicolon is seen,
//! - a blank line is seen, or
//! - a new line starts with a statement head such as `CREATE` or
//!   `ALTER TABLE`, which lets semicolon-free scripts split correctly.
//!
//! An unterminated literal or dollar body swallows the rest of the input.

use std::ops::Range;

/// A statement cut from a script, with its source position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitStatement<'a> {
    /// Trimmed statement text without the terminating semicolon.
    /// Leading comments are kept so the block extractor can claim them.
    pub content: &'a str,
    /// Byte offset of `content` within the script
    pub offset: usize,
    /// 1-based line of the first character of `content`
    pub start_line: usize,
    /// 1-based line of the last character of `content`
    pub end_line: usize,
    /// Byte span of a comment following the terminating semicolon on the same line
    pub trailing_comment: Option<Range<usize>>,
}

/// Object words that make `ALTER`/`DROP` at the start of a line a new statement.
/// `ALTER COLUMN` or `DROP CONSTRAINT` inside an `ALTER TABLE` must not split.
const ALTER_DROP_OBJECTS: &[&str] = &[
    "AGGREGATE",
    "DATABASE",
    "DOMAIN",
    "EXTENSION",
    "FOREIGN",
    "FUNCTION",
    "INDEX",
    "MATERIALIZED",
    "OPERATOR",
    "POLICY",
    "PROCEDURE",
    "ROLE",
    "RULE",
    "SCHEMA",
    "SEQUENCE",
    "TABLE",
    "TRIGGER",
    "TYPE",
    "VIEW",
];

/// Words that follow `UPDATE`/`TRUNCATE` inside a trigger event list.
const TRIGGER_EVENT_FOLLOWERS: &[&str] = &["OF", "ON", "OR"];

/// Split a script into its top-level statement strings.
pub fn split_statements(sql: &str) -> Vec<String> {
    split_statements_with_lines(sql)
        .into_iter()
        .map(|stmt| stmt.content.to_string())
        .collect()
}

/// Split a script into statements, keeping offsets and line spans.
pub fn split_statements_with_lines(sql: &str) -> Vec<SplitStatement<'_>> {
    let mut splitter = Splitter::new(sql);
    splitter.run();
    splitter.statements
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Mode {
    Normal,
    SingleQuote { backslash_escapes: bool },
    DoubleQuote,
    LineComment,
    BlockComment(usize),
    Dollar(String),
}

/// Maps byte offsets to 1-based line numbers.
#[derive(Debug, Clone)]
pub(crate) struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    pub(crate) fn new(text: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(
            text.bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self { starts }
    }

    pub(crate) fn line_of(&self, offset: usize) -> usize {
        match self.starts.binary_search(&offset) {
            Ok(index) => index + 1,
            Err(index) => index,
        }
    }
}

struct Splitter<'a> {
    sql: &'a str,
    lines: LineIndex,
    statements: Vec<SplitStatement<'a>>,
    mode: Mode,
    depth: usize,
    chunk_start: usize,
    /// The current chunk holds something other than whitespace and comments
    has_code: bool,
    /// Only whitespace has been seen on the current physical line
    at_line_start: bool,
    line_start: usize,
    /// Start of the run of comment-only lines directly above the current line
    comment_run_start: Option<usize>,
    newline_run: usize,
    /// Open `BEGIN ATOMIC` bodies and the `CASE` expressions inside them
    atomic_depth: usize,
    case_depth: usize,
    last_word_was_begin: bool,
}

impl<'a> Splitter<'a> {
    fn new(sql: &'a str) -> Self {
        Self {
            sql,
            lines: LineIndex::new(sql),
            statements: Vec::new(),
            mode: Mode::Normal,
            depth: 0,
            chunk_start: 0,
            has_code: false,
            at_line_start: true,
            line_start: 0,
            comment_run_start: None,
            newline_run: 0,
            atomic_depth: 0,
            case_depth: 0,
            last_word_was_begin: false,
        }
    }

    fn run(&mut self) {
        let mut pos = 0;
        while pos < self.sql.len() {
            pos = match self.mode.clone() {
                Mode::Normal => self.step_normal(pos),
                Mode::SingleQuote { backslash_escapes } => {
                    self.step_single_quote(pos, backslash_escapes)
                }
                Mode::DoubleQuote => self.step_double_quote(pos),
                Mode::LineComment => self.step_line_comment(pos),
                Mode::BlockComment(depth) => self.step_block_comment(pos, depth),
                Mode::Dollar(delimiter) => self.step_dollar(pos, &delimiter),
            };
        }
        // Whatever is left, terminated or not, is the last candidate
        self.finish_chunk(self.sql.len(), self.sql.len());
    }

    fn step_normal(&mut self, pos: usize) -> usize {
        let rest = &self.sql[pos..];
        let c = match rest.chars().next() {
            Some(c) => c,
            None => return self.sql.len(),
        };

        if c == '\n' {
            self.newline_run += 1;
            if self.newline_run >= 2 && self.at_top_level() {
                self.finish_chunk(pos, pos + 1);
            }
            self.at_line_start = true;
            self.line_start = pos + 1;
            return pos + 1;
        }
        if c.is_whitespace() {
            return pos + c.len_utf8();
        }

        self.newline_run = 0;
        let first_on_line = std::mem::replace(&mut self.at_line_start, false);

        if rest.starts_with("--") || rest.starts_with("/*") {
            if first_on_line && self.comment_run_start.is_none() {
                self.comment_run_start = Some(self.line_start);
            }
            self.mode = if rest.starts_with("--") {
                Mode::LineComment
            } else {
                Mode::BlockComment(1)
            };
            return pos + 2;
        }

        if first_on_line {
            if self.at_top_level() && self.has_code && starts_with_statement_head(rest) {
                let cut = self.comment_run_start.unwrap_or(self.line_start);
                self.finish_chunk(cut, cut);
            }
            self.comment_run_start = None;
        }
        self.has_code = true;

        match c {
            '\'' => {
                self.mode = Mode::SingleQuote {
                    backslash_escapes: has_escape_prefix(self.sql, pos),
                };
            }
            '"' => self.mode = Mode::DoubleQuote,
            '$' => {
                if let Some(delimiter) = dollar_delimiter(rest) {
                    let len = delimiter.len();
                    self.mode = Mode::Dollar(delimiter);
                    return pos + len;
                }
            }
            '(' => self.depth += 1,
            ')' => self.depth = self.depth.saturating_sub(1),
            ';' if self.at_top_level() => {
                let sql = self.sql;
                let after = pos + 1;
                let line_end = sql[after..].find('\n').map_or(sql.len(), |n| after + n);
                let rest_of_line = &sql[after..line_end];
                if is_closed_comment_line(rest_of_line) {
                    let count = self.statements.len();
                    self.finish_chunk(pos, line_end);
                    if self.statements.len() > count {
                        if let Some(statement) = self.statements.last_mut() {
                            let lead = rest_of_line.len() - rest_of_line.trim_start().len();
                            statement.trailing_comment =
                                Some(after + lead..after + rest_of_line.trim_end().len());
                        }
                    }
                } else {
                    self.finish_chunk(pos, after);
                }
            }
            c if c.is_alphabetic() || c == '_' => return self.step_word(pos),
            _ => {}
        }
        self.last_word_was_begin = false;
        pos + c.len_utf8()
    }

    fn at_top_level(&self) -> bool {
        self.depth == 0 && self.atomic_depth == 0
    }

    /// Consume a bare word, tracking `BEGIN ATOMIC ... END` bodies.
    fn step_word(&mut self, pos: usize) -> usize {
        let rest = &self.sql[pos..];
        let len = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        let word = &rest[..len];

        if word.eq_ignore_ascii_case("ATOMIC") && self.last_word_was_begin {
            self.atomic_depth += 1;
        } else if self.atomic_depth > 0 {
            if word.eq_ignore_ascii_case("CASE") {
                self.case_depth += 1;
            } else if word.eq_ignore_ascii_case("END") {
                if self.case_depth > 0 {
                    self.case_depth -= 1;
                } else {
                    self.atomic_depth -= 1;
                }
            }
        }
        self.last_word_was_begin = word.eq_ignore_ascii_case("BEGIN");
        pos + len
    }

    fn step_single_quote(&mut self, pos: usize, backslash_escapes: bool) -> usize {
        let rest = &self.sql[pos..];
        let mut chars = rest.chars();
        let c = match chars.next() {
            Some(c) => c,
            None => return self.sql.len(),
        };
        match c {
            '\\' if backslash_escapes => {
                let escaped = chars.next().map_or(0, char::len_utf8);
                pos + 1 + escaped
            }
            '\'' if rest[1..].starts_with('\'') => pos + 2,
            '\'' => {
                self.mode = Mode::Normal;
                pos + 1
            }
            _ => self.consume_quoted_char(pos, c),
        }
    }

    fn step_double_quote(&mut self, pos: usize) -> usize {
        let rest = &self.sql[pos..];
        let c = match rest.chars().next() {
            Some(c) => c,
            None => return self.sql.len(),
        };
        if c == '"' {
            if rest[1..].starts_with('"') {
                return pos + 2;
            }
            self.mode = Mode::Normal;
            return pos + 1;
        }
        self.consume_quoted_char(pos, c)
    }

    fn step_line_comment(&mut self, pos: usize) -> usize {
        match self.sql[pos..].find('\n') {
            Some(newline) => {
                // The newline itself is handled in normal mode so it counts
                // toward blank-line detection.
                self.mode = Mode::Normal;
                pos + newline
            }
            None => self.sql.len(),
        }
    }

    fn step_block_comment(&mut self, pos: usize, depth: usize) -> usize {
        let rest = &self.sql[pos..];
        if rest.starts_with("/*") {
            self.mode = Mode::BlockComment(depth + 1);
            return pos + 2;
        }
        if rest.starts_with("*/") {
            self.mode = if depth <= 1 {
                Mode::Normal
            } else {
                Mode::BlockComment(depth - 1)
            };
            return pos + 2;
        }
        let c = rest.chars().next().unwrap_or('\0');
        self.consume_quoted_char(pos, c)
    }

    fn step_dollar(&mut self, pos: usize, delimiter: &str) -> usize {
        let rest = &self.sql[pos..];
        if rest.starts_with(delimiter) {
            self.mode = Mode::Normal;
            return pos + delimiter.len();
        }
        let c = rest.chars().next().unwrap_or('\0');
        self.consume_quoted_char(pos, c)
    }

    /// Advance over one character inside an opaque construct.
    fn consume_quoted_char(&mut self, pos: usize, c: char) -> usize {
        if c == '\n' {
            self.line_start = pos + 1;
            self.newline_run = 0;
        }
        pos + c.len_utf8()
    }

    /// Close the current chunk at `end` and start the next one at `next_start`.
    fn finish_chunk(&mut self, end: usize, next_start: usize) {
        let start = self.chunk_start.min(end);
        let raw = &self.sql[start..end];
        let content = raw.trim();
        if !content.is_empty() && !is_blank_sql(content) {
            let offset = start + (raw.len() - raw.trim_start().len());
            self.statements.push(SplitStatement {
                content,
                offset,
                start_line: self.lines.line_of(offset),
                end_line: self.lines.line_of(offset + content.len() - 1),
                trailing_comment: None,
            });
        }
        self.chunk_start = next_start;
        self.has_code = false;
        self.comment_run_start = None;
    }
}

/// Whether `text` (positioned at the first code character of a line) begins a new statement.
fn starts_with_statement_head(text: &str) -> bool {
    if !text.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return false;
    }
    let mut words = text
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|word| !word.is_empty());
    let first = words.next().unwrap_or_default().to_ascii_uppercase();
    let second = words.next().unwrap_or_default().to_ascii_uppercase();

    match first.as_str() {
        "CREATE" | "GRANT" | "REVOKE" => true,
        "ALTER" | "DROP" => ALTER_DROP_OBJECTS.contains(&second.as_str()),
        "COMMENT" => second == "ON",
        "INSERT" => second == "INTO",
        "DELETE" => second == "FROM",
        "UPDATE" | "TRUNCATE" => {
            !second.is_empty() && !TRIGGER_EVENT_FOLLOWERS.contains(&second.as_str())
        }
        _ => false,
    }
}

/// Whether `line` holds only comments, none of them left open.
fn is_closed_comment_line(line: &str) -> bool {
    !line.trim().is_empty()
        && is_blank_sql(line)
        && comment_spans(line)
            .iter()
            .all(|c| !line[c.span.clone()].starts_with("/*") || c.body.end + 2 == c.span.end)
}

/// `E'...'` literals honor backslash escapes.
fn has_escape_prefix(sql: &str, quote_pos: usize) -> bool {
    let bytes = sql.as_bytes();
    if quote_pos == 0 || !matches!(bytes[quote_pos - 1], b'E' | b'e') {
        return false;
    }
    quote_pos == 1 || !(bytes[quote_pos - 2].is_ascii_alphanumeric() || bytes[quote_pos - 2] == b'_')
}

/// Return the `$tag$` delimiter that starts `text`, if any.
/// `$1` style placeholders are not delimiters.
pub(crate) fn dollar_delimiter(text: &str) -> Option<String> {
    let body = text.strip_prefix('$')?;
    for (i, c) in body.char_indices() {
        if c == '$' {
            return Some(text[..i + 2].to_string());
        }
        let valid = if i == 0 {
            c.is_alphabetic() || c == '_'
        } else {
            c.is_alphanumeric() || c == '_'
        };
        if !valid {
            return None;
        }
    }
    None
}

/// A comment found outside literals
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CommentSpan {
    /// Full span including markers (a line comment excludes its newline)
    pub span: Range<usize>,
    /// Span of the comment text without `--`, `/*` or `*/`
    pub body: Range<usize>,
}

/// Locate every comment in `sql` that is not inside a literal or dollar body.
pub(crate) fn comment_spans(sql: &str) -> Vec<CommentSpan> {
    let mut spans = Vec::new();
    let mut pos = 0;
    while pos < sql.len() {
        let rest = &sql[pos..];
        let c = match rest.chars().next() {
            Some(c) => c,
            None => break,
        };
        if rest.starts_with("--") {
            let end = rest.find('\n').map_or(sql.len(), |n| pos + n);
            spans.push(CommentSpan {
                span: pos..end,
                body: pos + 2..end,
            });
            pos = end;
        } else if rest.starts_with("/*") {
            let mut depth = 0usize;
            let mut cursor = pos;
            let mut closed = None;
            while cursor < sql.len() {
                let tail = &sql[cursor..];
                if tail.starts_with("/*") {
                    depth += 1;
                    cursor += 2;
                } else if tail.starts_with("*/") {
                    depth -= 1;
                    cursor += 2;
                    if depth == 0 {
                        closed = Some(cursor);
                        break;
                    }
                } else {
                    cursor += tail.chars().next().map_or(1, char::len_utf8);
                }
            }
            let (end, body_end) = match closed {
                Some(end) => (end, end - 2),
                None => (sql.len(), sql.len()),
            };
            spans.push(CommentSpan {
                span: pos..end,
                body: pos + 2..body_end,
            });
            pos = end;
        } else if c == '\'' || c == '"' {
            pos = skip_quoted(sql, pos, c);
        } else if c == '$' {
            match dollar_delimiter(rest) {
                Some(delimiter) => {
                    let body_start = pos + delimiter.len();
                    pos = sql[body_start..]
                        .find(delimiter.as_str())
                        .map_or(sql.len(), |n| body_start + n + delimiter.len());
                }
                None => pos += 1,
            }
        } else {
            pos += c.len_utf8();
        }
    }
    spans
}

/// Skip a quoted literal or identifier starting at `start`; returns the offset after it.
pub(crate) fn skip_quoted(sql: &str, start: usize, quote: char) -> usize {
    let backslash_escapes = quote == '\'' && has_escape_prefix(sql, start);
    let mut pos = start + 1;
    while pos < sql.len() {
        let rest = &sql[pos..];
        let c = rest.chars().next().unwrap_or('\0');
        if backslash_escapes && c == '\\' {
            pos += 1 + rest[1..].chars().next().map_or(0, char::len_utf8);
        } else if c == quote {
            if rest[1..].starts_with(quote) {
                pos += 2;
            } else {
                return pos + 1;
            }
        } else {
            pos += c.len_utf8();
        }
    }
    sql.len()
}

/// Remove comments outside literals, replacing each with a single space.
pub fn strip_comments(sql: &str) -> String {
    let mut stripped = String::with_capacity(sql.len());
    let mut last = 0;
    for comment in comment_spans(sql) {
        stripped.push_str(&sql[last..comment.span.start]);
        stripped.push(' ');
        last = comment.span.end;
    }
    stripped.push_str(&sql[last..]);
    stripped
}

/// Whether `sql` holds nothing but whitespace and comments.
pub fn is_blank_sql(sql: &str) -> bool {
    strip_comments(sql).trim().is_empty()
}
