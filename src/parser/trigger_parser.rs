//! Token-based trigger definition parsing for PostgreSQL
//!
//! ## Supported Syntax
//!
//! ```sql
//! CREATE [OR REPLACE] [CONSTRAINT] TRIGGER name
//!     { BEFORE | AFTER | INSTEAD OF } { event [OR ...] }
//!     ON table
//!     [FROM referenced_table]
//!     [NOT DEFERRABLE | [DEFERRABLE] [INITIALLY IMMEDIATE | INITIALLY DEFERRED]]
//!     [REFERENCING { { OLD | NEW } TABLE [AS] transition_name } [...]]
//!     [FOR [EACH] { ROW | STATEMENT }]
//!     [WHEN (condition)]
//!     EXECUTE { FUNCTION | PROCEDURE } function_name (arguments)
//!
//! -- event is one of
//! INSERT | UPDATE [OF column [, ...]] | DELETE | TRUNCATE
//! ```

use sqlparser::tokenizer::Token;

use super::block_extractor::StatementBlock;
use super::extractor::{check_identifier_length, tokenize, Extractor};
use super::identifier_utils::normalize_identifier;
use super::object_detector::ObjectKind;
use super::token_parser_base::{string_literal_value, TokenParser};
use crate::model::{
    codes, ExtractionOutcome, TriggerDefinition, TriggerEvent, TriggerLevel, TriggerTiming,
    ValidationIssue,
};

/// Token-based trigger definition parser
pub struct TriggerTokenParser<'a> {
    base: TokenParser<'a>,
}

impl<'a> TriggerTokenParser<'a> {
    pub fn new(base: TokenParser<'a>) -> Self {
        Self { base }
    }

    pub fn parse(mut self, block: &StatementBlock) -> ExtractionOutcome<TriggerDefinition> {
        let mut issues = Vec::new();

        self.base.skip_whitespace();
        self.base.expect_word_ci("CREATE");
        let is_or_replace = self.base.consume_words_ci(&["OR", "REPLACE"]);
        let is_constraint = self.base.expect_word_ci("CONSTRAINT").is_some();
        self.base.expect_word_ci("TRIGGER");

        let name = if self.base.check_any_word_ci(&["BEFORE", "AFTER", "INSTEAD"]) {
            None
        } else {
            self.base.parse_identifier()
        };
        let Some(name) = name else {
            return ExtractionOutcome::failure(ValidationIssue::error(
                codes::TRIGGER_MISSING_NAME,
                "CREATE TRIGGER statement has no trigger name",
            ));
        };
        check_identifier_length("Trigger", &name, &mut issues);
        self.base.skip_whitespace();

        let timing = if self.base.expect_word_ci("BEFORE").is_some() {
            TriggerTiming::Before
        } else if self.base.expect_word_ci("AFTER").is_some() {
            TriggerTiming::After
        } else if self.base.consume_words_ci(&["INSTEAD", "OF"]) {
            TriggerTiming::InsteadOf
        } else {
            return ExtractionOutcome::failure(ValidationIssue::error(
                codes::TRIGGER_MISSING_TIMING,
                format!("Trigger {} has no BEFORE, AFTER or INSTEAD OF timing", name),
            ));
        };

        let (events, update_columns) = self.parse_events();
        if events.is_empty() {
            return ExtractionOutcome::failure(ValidationIssue::error(
                codes::TRIGGER_MISSING_EVENTS,
                format!("Trigger {} has no events", name),
            ));
        }

        let table = if self.base.expect_word_ci("ON").is_some() {
            self.base.parse_qualified_name()
        } else {
            None
        };
        let Some((schema, table_name)) = table else {
            return ExtractionOutcome::failure(ValidationIssue::error(
                codes::TRIGGER_MISSING_TABLE,
                format!("Trigger {} has no ON table", name),
            ));
        };

        let mut definition = TriggerDefinition {
            name,
            schema,
            table_name,
            timing,
            events,
            update_columns,
            level: TriggerLevel::Statement,
            when_condition: None,
            function_name: String::new(),
            function_schema: None,
            function_arguments: Vec::new(),
            is_constraint,
            is_or_replace,
            is_deferrable: false,
            initially_deferred: false,
            referencing: Vec::new(),
            original_sql: block.content.clone(),
            source: block.source_location(),
        };

        self.parse_clauses(&mut definition);

        let function = if self.base.expect_word_ci("EXECUTE").is_some()
            && (self.base.expect_word_ci("FUNCTION").is_some()
                || self.base.expect_word_ci("PROCEDURE").is_some())
        {
            self.base.parse_qualified_name()
        } else {
            None
        };
        let Some((function_schema, function_name)) = function else {
            return ExtractionOutcome::failure(ValidationIssue::error(
                codes::TRIGGER_MISSING_FUNCTION,
                format!("Trigger {} has no EXECUTE FUNCTION clause", definition.name),
            ));
        };
        definition.function_schema = function_schema;
        definition.function_name = function_name;
        self.base.skip_whitespace();
        if let Some((start, end)) = self.base.skip_group() {
            definition.function_arguments = self
                .base
                .split_top_level(start, end)
                .into_iter()
                .filter(|(s, e)| !self.base.text(*s, *e).is_empty())
                .map(|(s, e)| self.trigger_argument(s, e))
                .collect();
        }

        if definition.timing == TriggerTiming::InsteadOf && definition.level == TriggerLevel::Statement {
            issues.push(ValidationIssue::warning(
                codes::TRIGGER_INSTEAD_OF_STATEMENT,
                format!(
                    "INSTEAD OF trigger {} must be FOR EACH ROW; PostgreSQL rejects statement-level INSTEAD OF triggers",
                    definition.name
                ),
            ));
        }

        ExtractionOutcome::success(definition, issues)
    }

    /// `event [OR event ...]`, collecting `UPDATE OF` columns
    fn parse_events(&mut self) -> (Vec<TriggerEvent>, Vec<String>) {
        let mut events = Vec::new();
        let mut update_columns = Vec::new();
        loop {
            let event = if self.base.expect_word_ci("INSERT").is_some() {
                TriggerEvent::Insert
            } else if self.base.expect_word_ci("UPDATE").is_some() {
                if self.base.expect_word_ci("OF").is_some() {
                    while let Some(column) = self.base.parse_identifier() {
                        update_columns.push(column);
                        self.base.skip_whitespace();
                        if self.base.expect_token(&Token::Comma).is_none() {
                            break;
                        }
                    }
                }
                TriggerEvent::Update
            } else if self.base.expect_word_ci("DELETE").is_some() {
                TriggerEvent::Delete
            } else if self.base.expect_word_ci("TRUNCATE").is_some() {
                TriggerEvent::Truncate
            } else {
                break;
            };
            if !events.contains(&event) {
                events.push(event);
            }
            if self.base.expect_word_ci("OR").is_none() {
                break;
            }
        }
        (events, update_columns)
    }

    /// Clauses between `ON table` and `EXECUTE`, in any order.
    fn parse_clauses(&mut self, definition: &mut TriggerDefinition) {
        loop {
            self.base.skip_whitespace();
            if self.base.expect_word_ci("FROM").is_some() {
                self.base.parse_qualified_name();
            } else if self.base.consume_words_ci(&["NOT", "DEFERRABLE"]) {
                definition.is_deferrable = false;
            } else if self.base.expect_word_ci("DEFERRABLE").is_some() {
                definition.is_deferrable = true;
            } else if self.base.consume_words_ci(&["INITIALLY", "DEFERRED"]) {
                definition.initially_deferred = true;
            } else if self.base.consume_words_ci(&["INITIALLY", "IMMEDIATE"]) {
                definition.initially_deferred = false;
            } else if self.base.expect_word_ci("REFERENCING").is_some() {
                while self.base.check_any_word_ci(&["OLD", "NEW"]) {
                    let start = self.base.pos();
                    self.base.bump();
                    self.base.expect_word_ci("TABLE");
                    self.base.expect_word_ci("AS");
                    self.base.parse_identifier();
                    definition.referencing.push(self.base.text(start, self.base.pos()).to_string());
                    self.base.skip_whitespace();
                }
            } else if self.base.expect_word_ci("FOR").is_some() {
                self.base.expect_word_ci("EACH");
                if self.base.expect_word_ci("ROW").is_some() {
                    definition.level = TriggerLevel::Row;
                } else if self.base.expect_word_ci("STATEMENT").is_some() {
                    definition.level = TriggerLevel::Statement;
                }
            } else if self.base.expect_word_ci("WHEN").is_some() {
                if let Some(condition) = self.base.consume_parenthesized() {
                    definition.when_condition = Some(condition.to_string());
                }
            } else {
                return;
            }
        }
    }

    /// Literal arguments yield their value; anything else is kept as written.
    fn trigger_argument(&self, start: usize, end: usize) -> String {
        let mut item = self.base.slice(start, end);
        item.skip_whitespace();
        let literal = item.current_token().and_then(string_literal_value);
        match literal {
            Some(value) => value,
            None => normalize_identifier(self.base.text(start, end)),
        }
    }
}

/// Extracts `CREATE [CONSTRAINT] TRIGGER` statements
#[derive(Debug, Clone, Copy, Default)]
pub struct TriggerExtractor;

impl Extractor for TriggerExtractor {
    type Definition = TriggerDefinition;

    fn accepts(&self, kind: ObjectKind) -> bool {
        kind == ObjectKind::Triggers
    }

    fn extract_block(&self, block: &StatementBlock) -> ExtractionOutcome<TriggerDefinition> {
        match tokenize(block) {
            Ok(base) => TriggerTokenParser::new(base).parse(block),
            Err(issue) => ExtractionOutcome::failure(issue),
        }
    }
}
