//! Base token parser providing common helper methods for PostgreSQL DDL parsing.
//!
//! Each specialized parser (e.g. `TableTokenParser`, `TriggerTokenParser`) uses
//! composition to include a `TokenParser` and delegates navigation to it:
//!
//! ```ignore
//! pub struct TriggerTokenParser<'a> {
//!     base: TokenParser<'a>,
//! }
//!
//! impl<'a> TriggerTokenParser<'a> {
//!     pub fn parse_create_trigger(&mut self) -> Option<...> {
//!         self.base.skip_whitespace();
//!         self.base.expect_word_ci("CREATE")?;
//!         // ...
//!     }
//! }
//! ```
//!
//! Unlike a plain token stream, the parser remembers the byte offset of every
//! token, so expressions (CHECK bodies, defaults, WHERE predicates) can be
//! returned exactly as written in the source.

use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::tokenizer::{Token, TokenWithSpan, Tokenizer, TokenizerError};

use super::identifier_utils::format_token;

/// Base token parser over the PostgreSQL tokenizer.
///
/// Whitespace and comments are kept in the stream as `Token::Whitespace` so
/// that source positions stay exact; `skip_whitespace` steps over both.
#[derive(Debug, Clone)]
pub struct TokenParser<'a> {
    source: &'a str,
    tokens: Vec<TokenWithSpan>,
    /// Byte offset of each token start, plus one trailing entry for the end
    offsets: Vec<usize>,
    pos: usize,
}

impl<'a> TokenParser<'a> {
    /// Tokenize `sql` with the PostgreSQL dialect.
    pub fn new(sql: &'a str) -> Result<Self, TokenizerError> {
        let dialect = PostgreSqlDialect {};
        let tokens = Tokenizer::new(&dialect, sql).tokenize_with_location()?;
        let offsets = token_offsets(sql, &tokens);
        Ok(Self {
            source: sql,
            tokens,
            offsets,
            pos: 0,
        })
    }

    /// A parser over the token range `start..end` of this one.
    ///
    /// Text and line lookups keep referring to the original source.
    pub fn slice(&self, start: usize, end: usize) -> TokenParser<'a> {
        let end = end.min(self.tokens.len());
        let start = start.min(end);
        let mut offsets = self.offsets[start..end].to_vec();
        offsets.push(self.offsets[end]);
        TokenParser {
            source: self.source,
            tokens: self.tokens[start..end].to_vec(),
            offsets,
            pos: 0,
        }
    }

    // ========================================================================
    // Position and state
    // ========================================================================

    #[inline]
    pub fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    #[inline]
    pub fn pos(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos.min(self.tokens.len());
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    // ========================================================================
    // Token access
    // ========================================================================

    /// Get current token without consuming.
    #[inline]
    pub fn current_token(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|t| &t.token)
    }

    /// Token at an absolute position.
    #[inline]
    pub fn token_at(&self, pos: usize) -> Option<&Token> {
        self.tokens.get(pos).map(|t| &t.token)
    }

    /// Position of the `n`th non-whitespace token at or after the current one.
    pub fn peek_position(&self, n: usize) -> Option<usize> {
        self.tokens
            .iter()
            .enumerate()
            .skip(self.pos)
            .filter(|(_, t)| !matches!(t.token, Token::Whitespace(_)))
            .nth(n)
            .map(|(i, _)| i)
    }

    /// The `n`th non-whitespace token at or after the current one.
    pub fn peek(&self, n: usize) -> Option<&Token> {
        self.peek_position(n).and_then(|i| self.token_at(i))
    }

    #[inline]
    pub fn advance(&mut self) {
        if !self.is_at_end() {
            self.pos += 1;
        }
    }

    // ========================================================================
    // Whitespace handling
    // ========================================================================

    /// Skip whitespace and comment tokens.
    pub fn skip_whitespace(&mut self) {
        while matches!(self.current_token(), Some(Token::Whitespace(_))) {
            self.advance();
        }
    }

    /// Advance past the current token and any whitespace after it.
    pub fn bump(&mut self) {
        self.advance();
        self.skip_whitespace();
    }

    // ========================================================================
    // Token type checks
    // ========================================================================

    /// Check if current token is an unquoted word matching (case-insensitive).
    ///
    /// Quoted identifiers never match, so `"table"` stays an identifier.
    #[inline]
    pub fn check_word_ci(&self, word: &str) -> bool {
        is_word_ci(self.current_token(), word)
    }

    /// Check if current token is any of the given unquoted words.
    pub fn check_any_word_ci(&self, words: &[&str]) -> bool {
        words.iter().any(|w| self.check_word_ci(w))
    }

    /// Whether the `n`th non-whitespace token ahead is the given unquoted word.
    pub fn peek_word_ci(&self, n: usize, word: &str) -> bool {
        is_word_ci(self.peek(n), word)
    }

    /// The current unquoted word in upper case.
    pub fn current_keyword(&self) -> Option<String> {
        match self.current_token() {
            Some(Token::Word(w)) if w.quote_style.is_none() => Some(w.value.to_uppercase()),
            _ => None,
        }
    }

    /// Check if current token matches a specific token type (by discriminant).
    #[inline]
    pub fn check_token(&self, expected: &Token) -> bool {
        self.current_token()
            .is_some_and(|t| std::mem::discriminant(t) == std::mem::discriminant(expected))
    }

    // ========================================================================
    // Expect methods (check and advance)
    // ========================================================================

    /// Expect a word (case-insensitive), advancing past it and trailing whitespace.
    pub fn expect_word_ci(&mut self, word: &str) -> Option<()> {
        if self.check_word_ci(word) {
            self.bump();
            Some(())
        } else {
            None
        }
    }

    /// Consume a whole word sequence such as `IF NOT EXISTS`.
    ///
    /// On a partial match the position is left unchanged.
    pub fn consume_words_ci(&mut self, words: &[&str]) -> bool {
        let start = self.pos;
        for word in words {
            if self.expect_word_ci(word).is_none() {
                self.pos = start;
                return false;
            }
        }
        true
    }

    /// Expect a specific token type, advancing past it and trailing whitespace.
    pub fn expect_token(&mut self, expected: &Token) -> Option<()> {
        if self.check_token(expected) {
            self.bump();
            Some(())
        } else {
            None
        }
    }

    // ========================================================================
    // Identifier parsing
    // ========================================================================

    /// Parse an identifier (quoted or unquoted), returning it without quotes.
    pub fn parse_identifier(&mut self) -> Option<String> {
        match self.current_token()? {
            Token::Word(w) => {
                let name = w.value.clone();
                self.advance();
                Some(name)
            }
            _ => None,
        }
    }

    /// Parse a dotted name such as `catalog.schema.name` into its parts.
    pub fn parse_name_parts(&mut self) -> Option<Vec<String>> {
        let mut parts = vec![self.parse_identifier()?];
        loop {
            let save = self.pos;
            self.skip_whitespace();
            if !self.check_token(&Token::Period) {
                self.pos = save;
                break;
            }
            self.bump();
            match self.parse_identifier() {
                Some(part) => parts.push(part),
                None => {
                    self.pos = save;
                    break;
                }
            }
        }
        Some(parts)
    }

    /// Parse an optionally schema-qualified name.
    ///
    /// Returns `(schema, name)`; the schema is `None` when unqualified.
    pub fn parse_qualified_name(&mut self) -> Option<(Option<String>, String)> {
        let mut parts = self.parse_name_parts()?;
        let name = parts.pop()?;
        Some((parts.pop(), name))
    }

    // ========================================================================
    // Literals
    // ========================================================================

    /// Parse a string literal of any quoting style, returning its value.
    pub fn parse_string_literal(&mut self) -> Option<String> {
        let value = string_literal_value(self.current_token()?)?;
        self.advance();
        Some(value)
    }

    /// Parse a signed integer (positive or negative).
    pub fn parse_signed_integer(&mut self) -> Option<i64> {
        let start = self.pos;
        let negative = if self.check_token(&Token::Minus) {
            self.bump();
            true
        } else {
            false
        };
        match self.current_token() {
            Some(Token::Number(n, _)) => match n.parse::<i64>() {
                Ok(value) => {
                    self.advance();
                    Some(if negative { -value } else { value })
                }
                Err(_) => {
                    self.pos = start;
                    None
                }
            },
            _ => {
                self.pos = start;
                None
            }
        }
    }

    // ========================================================================
    // Source text
    // ========================================================================

    /// Verbatim source text of tokens `start..end`, trimmed.
    pub fn text(&self, start: usize, end: usize) -> &'a str {
        let end = end.min(self.tokens.len());
        let start = start.min(end);
        self.source[self.offsets[start]..self.offsets[end]].trim()
    }

    /// Verbatim text from the current position to the end.
    pub fn rest_text(&self) -> &'a str {
        self.text(self.pos, self.tokens.len())
    }

    /// Concatenated token rendering of `start..end`, independent of the source.
    pub fn tokens_to_string(&self, start: usize, end: usize) -> String {
        self.tokens[start.min(self.tokens.len())..end.min(self.tokens.len())]
            .iter()
            .map(|t| format_token(&t.token))
            .collect()
    }

    /// 1-based line (relative to the tokenized text) of the token at `pos`.
    pub fn line_at(&self, pos: usize) -> usize {
        self.tokens
            .get(pos)
            .map_or(1, |t| t.span.start.line.max(1) as usize)
    }

    /// Line on which the last non-whitespace token ends.
    pub fn last_code_line(&self) -> usize {
        self.tokens
            .iter()
            .rev()
            .find(|t| !matches!(t.token, Token::Whitespace(_)))
            .map_or(1, |t| t.span.end.line.max(1) as usize)
    }

    // ========================================================================
    // Utility methods
    // ========================================================================

    /// Skip a parenthesized (or bracketed) group, handling nesting.
    ///
    /// Position should be at the opening token; afterwards it is past the
    /// matching close. Returns the token range strictly inside the group.
    pub fn skip_group(&mut self) -> Option<(usize, usize)> {
        let (open, close) = match self.current_token()? {
            Token::LParen => (Token::LParen, Token::RParen),
            Token::LBracket => (Token::LBracket, Token::RBracket),
            _ => return None,
        };
        let start = self.pos;
        let mut depth = 0usize;
        while !self.is_at_end() {
            if self.check_token(&open) {
                depth += 1;
            } else if self.check_token(&close) {
                depth -= 1;
                if depth == 0 {
                    let inner = (start + 1, self.pos);
                    self.advance();
                    return Some(inner);
                }
            }
            self.advance();
        }
        self.pos = start;
        None
    }

    /// Consume a parenthesized group and return its inner text verbatim.
    pub fn consume_parenthesized(&mut self) -> Option<&'a str> {
        let (start, end) = self.skip_group()?;
        Some(self.text(start, end))
    }

    /// Split the token range `start..end` on commas outside any nesting.
    ///
    /// Empty items (only whitespace) are returned too, so callers can flag them.
    pub fn split_top_level(&self, start: usize, end: usize) -> Vec<(usize, usize)> {
        let end = end.min(self.tokens.len());
        let mut items = Vec::new();
        let mut depth = 0usize;
        let mut item_start = start;
        for pos in start..end {
            match &self.tokens[pos].token {
                Token::LParen | Token::LBracket => depth += 1,
                Token::RParen | Token::RBracket => depth = depth.saturating_sub(1),
                Token::Comma if depth == 0 => {
                    items.push((item_start, pos));
                    item_start = pos + 1;
                }
                _ => {}
            }
        }
        if item_start < end || !items.is_empty() {
            items.push((item_start, end));
        }
        items
    }

    /// Advance until one of `words` is the current token outside any nesting.
    ///
    /// Returns the matched word, or `None` at end of input.
    pub fn skip_to_top_level_word(&mut self, words: &[&str]) -> Option<String> {
        let mut depth = 0usize;
        while let Some(token) = self.current_token() {
            match token {
                Token::LParen | Token::LBracket => depth += 1,
                Token::RParen | Token::RBracket => depth = depth.saturating_sub(1),
                _ if depth == 0 => {
                    if let Some(word) = words.iter().find(|w| self.check_word_ci(w)) {
                        return Some(word.to_string());
                    }
                }
                _ => {}
            }
            self.advance();
        }
        None
    }
}

fn is_word_ci(token: Option<&Token>, word: &str) -> bool {
    matches!(token, Some(Token::Word(w)) if w.quote_style.is_none() && w.value.eq_ignore_ascii_case(word))
}

/// The value of a string literal token of any PostgreSQL quoting style.
pub fn string_literal_value(token: &Token) -> Option<String> {
    match token {
        Token::SingleQuotedString(s)
        | Token::EscapedStringLiteral(s)
        | Token::NationalStringLiteral(s)
        | Token::UnicodeStringLiteral(s) => Some(s.clone()),
        Token::DollarQuotedString(s) => Some(s.value.clone()),
        _ => None,
    }
}

/// Byte offsets of every token start, walking the source once.
///
/// The tokenizer reports 1-based line/column positions counted in characters.
fn token_offsets(source: &str, tokens: &[TokenWithSpan]) -> Vec<usize> {
    let mut offsets = Vec::with_capacity(tokens.len() + 1);
    let mut chars = source.char_indices().peekable();
    let (mut line, mut column) = (1u64, 1u64);
    for token in tokens {
        let target = (token.span.start.line, token.span.start.column);
        while (line, column) < target {
            match chars.next() {
                Some((_, '\n')) => {
                    line += 1;
                    column = 1;
                }
                Some(_) => column += 1,
                None => break,
            }
        }
        offsets.push(chars.peek().map_or(source.len(), |(i, _)| *i));
    }
    offsets.push(source.len());
    offsets
}
