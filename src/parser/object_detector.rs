//! Object kind detection for statement blocks
//!
//! Classification looks only at the statement head, so it works on statements
//! the extractors would reject and never fails: anything unrecognized is
//! [`ObjectKind::None`].

use std::fmt;

use serde::{Deserialize, Serialize};

use super::splitter::{dollar_delimiter, skip_quoted, strip_comments};
use crate::model::CommentObjectType;

/// Kinds of user-defined types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    Enum,
    Composite,
    Domain,
}

/// What a statement defines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    None,
    Tables,
    Columns,
    Views,
    Types(TypeKind),
    Functions,
    Indexes,
    Triggers,
    Constraints,
    Partitions,
    Comments(CommentObjectType),
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKind::None => write!(f, "none"),
            ObjectKind::Tables => write!(f, "tables"),
            ObjectKind::Columns => write!(f, "columns"),
            ObjectKind::Views => write!(f, "views"),
            ObjectKind::Types(TypeKind::Enum) => write!(f, "enum types"),
            ObjectKind::Types(TypeKind::Composite) => write!(f, "composite types"),
            ObjectKind::Types(TypeKind::Domain) => write!(f, "domain types"),
            ObjectKind::Functions => write!(f, "functions"),
            ObjectKind::Indexes => write!(f, "indexes"),
            ObjectKind::Triggers => write!(f, "triggers"),
            ObjectKind::Constraints => write!(f, "constraints"),
            ObjectKind::Partitions => write!(f, "partitions"),
            ObjectKind::Comments(target) => write!(f, "comments on {:?}", target),
        }
    }
}

/// Words that start a constraint in `ALTER TABLE ... ADD`
const CONSTRAINT_HEADS: &[&str] = &["CONSTRAINT", "PRIMARY", "UNIQUE", "FOREIGN", "CHECK", "EXCLUDE"];

/// `COMMENT ON` object words and the target kind they map to
const COMMENT_TARGETS: &[(&str, CommentObjectType)] = &[
    ("TABLE", CommentObjectType::Table),
    ("COLUMN", CommentObjectType::Column),
    ("INDEX", CommentObjectType::Index),
    ("VIEW", CommentObjectType::View),
    ("MATERIALIZED", CommentObjectType::View),
    ("FUNCTION", CommentObjectType::Function),
    ("PROCEDURE", CommentObjectType::Function),
    ("TRIGGER", CommentObjectType::Trigger),
    ("CONSTRAINT", CommentObjectType::Constraint),
    ("TYPE", CommentObjectType::Type),
    ("DOMAIN", CommentObjectType::Type),
];

/// Lexemes needed to classify any supported statement head
const HEAD_LEXEMES: usize = 48;

/// Classify a statement by its head.
pub fn detect_object_kind(sql: &str) -> ObjectKind {
    let lexemes = lex_head(sql, HEAD_LEXEMES);
    let mut head = Head { lexemes: &lexemes, pos: 0 };

    if head.eat("CREATE") {
        detect_create(&mut head)
    } else if head.eat_all(&["ALTER", "TABLE"]) {
        detect_alter_table(&mut head)
    } else if head.eat_all(&["COMMENT", "ON"]) {
        COMMENT_TARGETS
            .iter()
            .find(|(word, _)| head.is(word))
            .map_or(ObjectKind::None, |(_, target)| ObjectKind::Comments(*target))
    } else {
        ObjectKind::None
    }
}

fn detect_create(head: &mut Head<'_>) -> ObjectKind {
    head.eat_all(&["OR", "REPLACE"]);
    head.eat_any(&["GLOBAL", "LOCAL"]);
    head.eat_any(&["TEMP", "TEMPORARY", "UNLOGGED"]);

    if head.eat("TABLE") {
        head.eat_all(&["IF", "NOT", "EXISTS"]);
        head.skip_name();
        return if head.is("PARTITION") && head.peek_is(1, "OF") {
            ObjectKind::Partitions
        } else {
            ObjectKind::Tables
        };
    }

    head.eat("UNIQUE");
    if head.eat("INDEX") {
        return ObjectKind::Indexes;
    }

    head.eat("RECURSIVE");
    head.eat("MATERIALIZED");
    if head.eat("VIEW") {
        return ObjectKind::Views;
    }

    if head.eat_any(&["FUNCTION", "PROCEDURE"]) {
        return ObjectKind::Functions;
    }

    head.eat("CONSTRAINT");
    if head.eat("TRIGGER") {
        return ObjectKind::Triggers;
    }

    if head.eat("DOMAIN") {
        return ObjectKind::Types(TypeKind::Domain);
    }

    if head.eat("TYPE") {
        head.skip_name();
        if head.eat("AS") {
            if head.is("ENUM") {
                return ObjectKind::Types(TypeKind::Enum);
            }
            if head.is_symbol('(') {
                return ObjectKind::Types(TypeKind::Composite);
            }
        }
    }

    ObjectKind::None
}

fn detect_alter_table(head: &mut Head<'_>) -> ObjectKind {
    head.eat_all(&["IF", "EXISTS"]);
    head.eat("ONLY");
    head.skip_name();
    head.eat_symbol('*');
    if !head.eat("ADD") {
        return ObjectKind::None;
    }
    if CONSTRAINT_HEADS.iter().any(|word| head.is(word)) {
        ObjectKind::Constraints
    } else if head.at_end() {
        ObjectKind::None
    } else {
        ObjectKind::Columns
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Lexeme {
    /// Unquoted word, upper-cased
    Word(String),
    /// Double-quoted identifier
    Quoted,
    /// String, dollar or numeric literal
    Literal,
    Symbol(char),
}

struct Head<'a> {
    lexemes: &'a [Lexeme],
    pos: usize,
}

impl Head<'_> {
    fn at_end(&self) -> bool {
        self.pos >= self.lexemes.len()
    }

    fn peek_is(&self, offset: usize, word: &str) -> bool {
        matches!(self.lexemes.get(self.pos + offset), Some(Lexeme::Word(w)) if w == word)
    }

    fn is(&self, word: &str) -> bool {
        self.peek_is(0, word)
    }

    fn is_symbol(&self, symbol: char) -> bool {
        self.lexemes.get(self.pos) == Some(&Lexeme::Symbol(symbol))
    }

    fn eat(&mut self, word: &str) -> bool {
        let matched = self.is(word);
        if matched {
            self.pos += 1;
        }
        matched
    }

    fn eat_any(&mut self, words: &[&str]) -> bool {
        words.iter().any(|word| self.eat(word))
    }

    fn eat_all(&mut self, words: &[&str]) -> bool {
        let matched = words.iter().enumerate().all(|(i, word)| self.peek_is(i, word));
        if matched {
            self.pos += words.len();
        }
        matched
    }

    fn eat_symbol(&mut self, symbol: char) -> bool {
        let matched = self.is_symbol(symbol);
        if matched {
            self.pos += 1;
        }
        matched
    }

    /// Skip a possibly qualified name: `name`, `"Name"`, `schema.name`.
    fn skip_name(&mut self) {
        loop {
            match self.lexemes.get(self.pos) {
                Some(Lexeme::Word(_)) | Some(Lexeme::Quoted) => self.pos += 1,
                _ => return,
            }
            if !self.eat_symbol('.') {
                return;
            }
        }
    }
}

/// Lex up to `limit` lexemes from the start of `sql`, ignoring comments.
fn lex_head(sql: &str, limit: usize) -> Vec<Lexeme> {
    let text = strip_comments(sql);
    let mut lexemes = Vec::new();
    let mut pos = 0;

    while pos < text.len() && lexemes.len() < limit {
        let rest = &text[pos..];
        let c = match rest.chars().next() {
            Some(c) => c,
            None => break,
        };

        if c.is_whitespace() {
            pos += c.len_utf8();
        } else if c.is_alphabetic() || c == '_' {
            let len = rest
                .find(|ch: char| !(ch.is_alphanumeric() || ch == '_' || ch == '$'))
                .unwrap_or(rest.len());
            lexemes.push(Lexeme::Word(rest[..len].to_uppercase()));
            pos += len;
        } else if c.is_ascii_digit() {
            let len = rest
                .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '.'))
                .unwrap_or(rest.len());
            lexemes.push(Lexeme::Literal);
            pos += len;
        } else if c == '"' {
            lexemes.push(Lexeme::Quoted);
            pos = skip_quoted(&text, pos, '"');
        } else if c == '\'' {
            lexemes.push(Lexeme::Literal);
            pos = skip_quoted(&text, pos, '\'');
        } else if let Some(delimiter) = (c == '$').then(|| dollar_delimiter(rest)).flatten() {
            let body_start = pos + delimiter.len();
            lexemes.push(Lexeme::Literal);
            pos = text[body_start..]
                .find(delimiter.as_str())
                .map_or(text.len(), |n| body_start + n + delimiter.len());
        } else {
            lexemes.push(Lexeme::Symbol(c));
            pos += c.len_utf8();
        }
    }

    lexemes
}
