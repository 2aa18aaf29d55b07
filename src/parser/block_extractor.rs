//! Statement blocks: split statements paired with their comments and positions

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::annotations::Annotations;
use super::splitter::{comment_spans, split_statements_with_lines, LineIndex};
use crate::model::SourceLocation;

/// A comment that appears after the first code token of a statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineComment {
    /// 1-based line in the source document
    pub line: usize,
    /// Comment text without markers
    pub text: String,
    pub annotations: Annotations,
}

/// One top-level statement with its surrounding context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementBlock {
    /// Statement without header comments or terminating semicolon
    pub content: String,
    /// Source chunk including header comments
    pub raw_content: String,
    /// Leading comments, markers stripped and lines joined with `\n`
    pub header_comment: Option<String>,
    pub inline_comments: Vec<InlineComment>,
    /// 1-based line of the first line of `content`
    pub start_line: usize,
    /// 1-based line of the last line of `content`
    pub end_line: usize,
    pub source_path: Option<PathBuf>,
}

impl StatementBlock {
    /// Build a block straight from a single statement.
    pub fn from_sql(sql: &str) -> Option<Self> {
        extract_blocks(sql, None).into_iter().next()
    }

    pub fn source_location(&self) -> SourceLocation {
        SourceLocation {
            source_path: self.source_path.clone(),
            start_line: self.start_line,
            end_line: self.end_line,
        }
    }

    /// Document line of a 1-based line within `content`.
    pub fn absolute_line(&self, content_line: usize) -> usize {
        self.start_line + content_line.saturating_sub(1)
    }

    /// First inline comment whose line falls in `first..=last`.
    pub fn inline_comment_between(&self, first: usize, last: usize) -> Option<&InlineComment> {
        self.inline_comments
            .iter()
            .find(|c| c.line >= first && c.line <= last)
    }

    /// Annotations parsed from the header comment.
    pub fn header_annotations(&self) -> Annotations {
        self.header_comment
            .as_deref()
            .map(Annotations::parse)
            .unwrap_or_default()
    }
}

/// Split `sql` into statement blocks, attaching comments and line spans.
pub fn extract_blocks(sql: &str, source_path: Option<&Path>) -> Vec<StatementBlock> {
    let lines = LineIndex::new(sql);

    split_statements_with_lines(sql)
        .into_iter()
        .map(|stmt| {
            let raw = stmt.content;
            let spans = comment_spans(raw);

            let mut header_parts = Vec::new();
            let mut content_start = 0;
            for span in &spans {
                let gap = &raw[content_start..span.span.start];
                if !gap.trim().is_empty() {
                    break;
                }
                header_parts.push(&raw[span.body.clone()]);
                content_start = span.span.end;
            }
            content_start += raw[content_start..].len() - raw[content_start..].trim_start().len();

            let content = raw[content_start..].trim_end();
            let mut inline_comments: Vec<InlineComment> = spans
                .iter()
                .filter(|span| span.span.start >= content_start)
                .map(|span| {
                    inline_comment(&raw[span.body.clone()], lines.line_of(stmt.offset + span.span.start))
                })
                .collect();
            if let Some(trailing) = stmt.trailing_comment.clone() {
                let line = lines.line_of(trailing.start);
                let text = &sql[trailing];
                inline_comments.extend(
                    comment_spans(text)
                        .into_iter()
                        .map(|span| inline_comment(&text[span.body], line)),
                );
            }

            StatementBlock {
                content: content.to_string(),
                raw_content: raw.to_string(),
                header_comment: header_text(&header_parts),
                inline_comments,
                start_line: lines.line_of(stmt.offset + content_start),
                end_line: stmt.end_line,
                source_path: source_path.map(Path::to_path_buf),
            }
        })
        .collect()
}

fn header_text(parts: &[&str]) -> Option<String> {
    let lines: Vec<&str> = parts
        .iter()
        .flat_map(|part| part.lines())
        .map(|line| line.trim().trim_start_matches('*').trim())
        .filter(|line| !line.is_empty())
        .collect();
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

fn inline_comment(body: &str, line: usize) -> InlineComment {
    let text = comment_text(body);
    InlineComment {
        line,
        annotations: Annotations::parse(&text),
        text,
    }
}

fn comment_text(body: &str) -> String {
    body.lines()
        .map(|line| line.trim().trim_start_matches('*').trim())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_comment_and_lines() {
        let sql = "-- Users of the system\n-- comment: people;\nCREATE TABLE users (\n  id INT\n);";
        let blocks = extract_blocks(sql, None);
        assert_eq!(blocks.len(), 1);
        let block = &blocks[0];
        assert_eq!(
            block.header_comment.as_deref(),
            Some("Users of the system\ncomment: people;")
        );
        assert!(block.content.starts_with("CREATE TABLE users"));
        assert!(block.raw_content.starts_with("-- Users"));
        assert_eq!(block.start_line, 3);
        assert_eq!(block.end_line, 5);
    }

    #[test]
    fn test_block_comment_header() {
        let sql = "/*\n * Orders table\n */\nCREATE TABLE orders (id INT);";
        let block = StatementBlock::from_sql(sql).unwrap();
        assert_eq!(block.header_comment.as_deref(), Some("Orders table"));
        assert_eq!(block.start_line, 4);
    }

    #[test]
    fn test_inline_comments_with_annotations() {
        let sql = "CREATE TABLE t (\n  id INT, -- comment: key; rename: Id;\n  name TEXT /* display name */\n);";
        let block = StatementBlock::from_sql(sql).unwrap();
        assert_eq!(block.header_comment, None);
        assert_eq!(block.inline_comments.len(), 2);
        assert_eq!(block.inline_comments[0].line, 2);
        assert_eq!(block.inline_comments[0].annotations.rename.as_deref(), Some("Id"));
        assert_eq!(block.inline_comments[1].line, 3);
        assert_eq!(block.inline_comments[1].text, "display name");
        assert_eq!(
            block.inline_comment_between(3, 3).map(|c| c.text.as_str()),
            Some("display name")
        );
    }

    #[test]
    fn test_comment_inside_literal_is_not_inline() {
        let block = StatementBlock::from_sql("SELECT '-- not a comment'").unwrap();
        assert!(block.inline_comments.is_empty());
    }

    #[test]
    fn test_source_path_and_location() {
        let sql = "\n\nCREATE TABLE a (id INT);\nCREATE TABLE b (id INT);";
        let blocks = extract_blocks(sql, Some(Path::new("schema/a.sql")));
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].start_line, 4);
        let location = blocks[0].source_location();
        assert_eq!(location.start_line, 3);
        assert_eq!(location.source_path, Some(PathBuf::from("schema/a.sql")));
        assert_eq!(blocks[0].absolute_line(1), 3);
    }

    #[test]
    fn test_same_line_trailing_comment_belongs_to_previous_block() {
        let sql = "CREATE TABLE a (id INT); -- comment: Table a\nCREATE TABLE b (id INT);";
        let blocks = extract_blocks(sql, None);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].header_comment, None);
        assert_eq!(blocks[1].start_line, 2);
        assert_eq!(blocks[0].inline_comments.len(), 1);
        assert_eq!(blocks[0].inline_comments[0].line, 1);
        assert_eq!(blocks[0].inline_comments[0].text, "comment: Table a");
    }

    #[test]
    fn test_never_drops_statements() {
        let sql = "SELECT 1;\nSELECT 2;\n-- trailing note\nSELECT 3";
        let blocks = extract_blocks(sql, None);
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[2].content, "SELECT 3");
        assert_eq!(blocks[2].header_comment.as_deref(), Some("trailing note"));
    }
}
