//! Token-based view parsing
//!
//! ```sql
//! CREATE [OR REPLACE] [TEMP | TEMPORARY] [RECURSIVE] [MATERIALIZED] VIEW [IF NOT EXISTS] name
//!     [(column, ...)] [USING method] [WITH (option = value, ...)] [TABLESPACE name]
//!     AS query
//!     [WITH [CASCADED | LOCAL] CHECK OPTION] [WITH [NO] DATA]
//! ```

use std::sync::LazyLock;

use regex::Regex;
use sqlparser::tokenizer::Token;

use super::block_extractor::StatementBlock;
use super::extractor::{check_identifier_length, tokenize, Extractor};
use super::identifier_utils::normalize_identifier;
use super::object_detector::ObjectKind;
use super::token_parser_base::TokenParser;
use crate::model::{codes, CheckOption, ExtractionOutcome, ValidationIssue, ViewDefinition};

static CHECK_OPTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)\s*\bWITH\s+(?:(CASCADED|LOCAL)\s+)?CHECK\s+OPTION\s*$").unwrap()
});

static WITH_DATA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)\s*\bWITH\s+(NO\s+)?DATA\s*$").unwrap());

/// Words that end a FROM item's alias position
const CLAUSE_WORDS: &[&str] = &[
    "WHERE", "GROUP", "ORDER", "HAVING", "LIMIT", "OFFSET", "UNION", "INTERSECT", "EXCEPT",
    "JOIN", "INNER", "LEFT", "RIGHT", "FULL", "CROSS", "NATURAL", "ON", "USING", "WINDOW",
    "FETCH", "FOR", "WITH", "RETURNING", "LATERAL",
];

/// Token-based view parser
pub struct ViewTokenParser<'a> {
    base: TokenParser<'a>,
}

impl<'a> ViewTokenParser<'a> {
    pub fn new(base: TokenParser<'a>) -> Self {
        Self { base }
    }

    pub fn parse(mut self, block: &StatementBlock) -> ExtractionOutcome<ViewDefinition> {
        let mut issues = Vec::new();
        let mut view = ViewDefinition {
            annotations: block.header_annotations(),
            original_sql: block.content.clone(),
            source: block.source_location(),
            ..Default::default()
        };

        self.base.skip_whitespace();
        self.base.expect_word_ci("CREATE");
        view.is_or_replace = self.base.consume_words_ci(&["OR", "REPLACE"]);
        view.is_temporary =
            self.base.expect_word_ci("TEMP").is_some() || self.base.expect_word_ci("TEMPORARY").is_some();
        view.is_recursive = self.base.expect_word_ci("RECURSIVE").is_some();
        view.is_materialized = self.base.expect_word_ci("MATERIALIZED").is_some();
        self.base.expect_word_ci("VIEW");
        view.if_not_exists = self.base.consume_words_ci(&["IF", "NOT", "EXISTS"]);

        let name = if self.base.check_any_word_ci(&["AS", "WITH"]) {
            None
        } else {
            self.base.parse_qualified_name()
        };
        let Some((schema, name)) = name else {
            return ExtractionOutcome::failure(ValidationIssue::error(
                codes::VIEW_MISSING_NAME,
                "CREATE VIEW statement has no view name",
            ));
        };
        check_identifier_length("View", &name, &mut issues);
        view.name = name;
        view.schema = schema;

        self.parse_options(&mut view);

        if self.base.expect_word_ci("AS").is_none() {
            return ExtractionOutcome::failure(ValidationIssue::error(
                codes::VIEW_MISSING_QUERY,
                format!("View {} has no AS query", view.name),
            ));
        }

        let query_start = self.base.pos();
        let mut query = self.base.rest_text();
        if let Some(captures) = CHECK_OPTION_RE.captures(query) {
            view.check_option = Some(match captures.get(1) {
                Some(level) if level.as_str().eq_ignore_ascii_case("LOCAL") => CheckOption::Local,
                _ => CheckOption::Cascaded,
            });
            query = &query[..captures.get(0).map_or(query.len(), |m| m.start())];
        }
        if let Some(captures) = WITH_DATA_RE.captures(query) {
            view.with_data = Some(captures.get(1).is_none());
            query = &query[..captures.get(0).map_or(query.len(), |m| m.start())];
        } else if view.is_materialized {
            view.with_data = Some(true);
        }

        let query = query.trim();
        if query.is_empty() {
            return ExtractionOutcome::failure(ValidationIssue::error(
                codes::VIEW_MISSING_QUERY,
                format!("View {} has an empty query", view.name),
            ));
        }
        view.query = query.to_string();
        view.referenced_tables = referenced_relations(&self.base, query_start, self.base.len());

        ExtractionOutcome::success(view, issues)
    }

    /// Column list, `USING`, `WITH (...)` and `TABLESPACE` before `AS`.
    fn parse_options(&mut self, view: &mut ViewDefinition) {
        loop {
            self.base.skip_whitespace();
            if self.base.check_token(&Token::LParen) {
                let Some((start, end)) = self.base.skip_group() else {
                    return;
                };
                view.columns = self
                    .base
                    .split_top_level(start, end)
                    .into_iter()
                    .map(|(s, e)| normalize_identifier(self.base.text(s, e)))
                    .filter(|c| !c.is_empty())
                    .collect();
            } else if self.base.expect_word_ci("USING").is_some() {
                self.base.parse_identifier();
            } else if self.base.check_word_ci("WITH") && self.base.peek(1) == Some(&Token::LParen) {
                self.base.bump();
                let Some((start, end)) = self.base.skip_group() else {
                    return;
                };
                view.storage_parameters = self
                    .base
                    .split_top_level(start, end)
                    .into_iter()
                    .map(|(s, e)| self.base.text(s, e).to_string())
                    .filter(|p| !p.is_empty())
                    .collect();
            } else if self.base.expect_word_ci("TABLESPACE").is_some() {
                view.tablespace = self.base.parse_identifier();
            } else {
                return;
            }
        }
    }
}

/// Relations named after `FROM` or `JOIN` in the query tokens `start..end`,
/// in first-seen order. CTE names and function-argument `FROM`s are skipped.
fn referenced_relations(base: &TokenParser<'_>, start: usize, end: usize) -> Vec<String> {
    let mut parser = base.slice(start, end);
    let mut relations: Vec<String> = Vec::new();
    let mut cte_names: Vec<String> = Vec::new();
    // One entry per open parenthesis: whether it holds a subquery
    let mut groups: Vec<bool> = Vec::new();

    while !parser.is_at_end() {
        let in_query = groups.last().copied().unwrap_or(true);
        match parser.current_token() {
            Some(Token::LParen) => {
                parser.advance();
                parser.skip_whitespace();
                groups.push(parser.check_any_word_ci(&["SELECT", "WITH", "VALUES"]));
                continue;
            }
            Some(Token::RParen) => {
                groups.pop();
            }
            Some(Token::Word(_)) if parser.peek_word_ci(1, "AS") && parser.peek(2) == Some(&Token::LParen) => {
                if let Some(name) = parser.parse_identifier() {
                    cte_names.push(name.to_lowercase());
                }
                continue;
            }
            Some(Token::Word(_)) if in_query && parser.check_any_word_ci(&["FROM", "JOIN"]) => {
                parser.bump();
                collect_from_items(&mut parser, &mut relations);
                continue;
            }
            _ => {}
        }
        parser.advance();
    }

    relations.retain(|r| !cte_names.contains(&r.to_lowercase()));
    relations
}

/// `name [[AS] alias] [, name [[AS] alias] ...]` after FROM or JOIN
fn collect_from_items(parser: &mut TokenParser<'_>, relations: &mut Vec<String>) {
    loop {
        parser.expect_word_ci("ONLY");
        if parser.check_word_ci("LATERAL") || !matches!(parser.current_token(), Some(Token::Word(_))) {
            return;
        }
        let start = parser.pos();
        let Some(parts) = parser.parse_name_parts() else {
            return;
        };
        parser.skip_whitespace();
        if parser.check_token(&Token::LParen) {
            // Set-returning function call
            parser.set_pos(start);
            return;
        }
        let relation = parts.join(".");
        if !relations.contains(&relation) {
            relations.push(relation);
        }

        parser.expect_word_ci("AS");
        if matches!(parser.current_token(), Some(Token::Word(_)))
            && !parser.check_any_word_ci(CLAUSE_WORDS)
        {
            parser.bump();
        }
        if parser.expect_token(&Token::Comma).is_none() {
            return;
        }
    }
}

/// Extracts `CREATE [MATERIALIZED] VIEW` statements
#[derive(Debug, Clone, Copy, Default)]
pub struct ViewExtractor;

impl Extractor for ViewExtractor {
    type Definition = ViewDefinition;

    fn accepts(&self, kind: ObjectKind) -> bool {
        kind == ObjectKind::Views
    }

    fn extract_block(&self, block: &StatementBlock) -> ExtractionOutcome<ViewDefinition> {
        match tokenize(block) {
            Ok(base) => ViewTokenParser::new(base).parse(block),
            Err(issue) => ExtractionOutcome::failure(issue),
        }
    }
}
