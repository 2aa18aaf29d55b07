//! Token-based `CREATE TABLE` parsing
//!
//! ```sql
//! CREATE [GLOBAL | LOCAL] [TEMP | TEMPORARY | UNLOGGED] TABLE [IF NOT EXISTS] name
//!     ( { column_definition | table_constraint | LIKE source [options] } [, ...] )
//!     | OF type_name [( ... )]
//!     | PARTITION OF parent [( ... )] { FOR VALUES ... | DEFAULT }
//!     [INHERITS (parent, ...)]
//!     [PARTITION BY { RANGE | LIST | HASH } (key, ...)]
//!     [USING method] [WITH (param = value, ...) | WITHOUT OIDS]
//!     [ON COMMIT { PRESERVE ROWS | DELETE ROWS | DROP }] [TABLESPACE name]
//! ```

use std::collections::HashSet;

use super::block_extractor::StatementBlock;
use super::column_parser::ColumnTokenParser;
use super::constraint_parser::ConstraintTokenParser;
use super::extractor::{check_identifier_length, tokenize, Extractor};
use super::identifier_utils::{normalize_identifier, qualified_display};
use super::object_detector::ObjectKind;
use super::partition_parser::{parse_partition_bound, parse_partition_scheme};
use super::token_parser_base::TokenParser;
use crate::model::{
    codes, ConstraintType, ExtractionOutcome, TableDefinition, ValidationIssue,
};

/// Words that open a table-level constraint inside the element list
const TABLE_CONSTRAINT_WORDS: &[&str] =
    &["CONSTRAINT", "PRIMARY", "UNIQUE", "FOREIGN", "CHECK", "EXCLUDE"];

/// Everything between `CREATE` and the table name
#[derive(Debug, Default)]
pub(crate) struct TableHead {
    pub is_temporary: bool,
    pub is_unlogged: bool,
    pub if_not_exists: bool,
    pub name: Option<(Option<String>, String)>,
}

/// Parse `CREATE [GLOBAL|LOCAL] [TEMP|UNLOGGED] TABLE [IF NOT EXISTS] name`.
///
/// `name` is `None` when the statement stops before a usable name.
pub(crate) fn parse_create_table_head(base: &mut TokenParser<'_>) -> TableHead {
    let mut head = TableHead::default();
    base.skip_whitespace();
    if base.expect_word_ci("CREATE").is_none() {
        return head;
    }
    base.consume_words_ci(&["OR", "REPLACE"]);
    if base.expect_word_ci("GLOBAL").is_none() {
        base.expect_word_ci("LOCAL");
    }
    if base.expect_word_ci("TEMP").is_some() || base.expect_word_ci("TEMPORARY").is_some() {
        head.is_temporary = true;
    } else if base.expect_word_ci("UNLOGGED").is_some() {
        head.is_unlogged = true;
    }
    if base.expect_word_ci("TABLE").is_none() {
        return head;
    }
    head.if_not_exists = base.consume_words_ci(&["IF", "NOT", "EXISTS"]);
    // `PARTITION` right after TABLE means the name is missing
    if base.check_any_word_ci(&["PARTITION", "OF", "AS"]) {
        return head;
    }
    head.name = base.parse_qualified_name();
    head
}

/// Token-based `CREATE TABLE` parser
pub struct TableTokenParser<'a, 'b> {
    base: TokenParser<'a>,
    block: &'b StatementBlock,
    issues: Vec<ValidationIssue>,
}

impl<'a, 'b> TableTokenParser<'a, 'b> {
    pub fn new(base: TokenParser<'a>, block: &'b StatementBlock) -> Self {
        Self {
            base,
            block,
            issues: Vec::new(),
        }
    }

    pub fn parse(mut self) -> ExtractionOutcome<TableDefinition> {
        let head = parse_create_table_head(&mut self.base);
        let Some((schema, name)) = head.name else {
            return ExtractionOutcome::failure(ValidationIssue::error(
                codes::TABLE_MISSING_NAME,
                "CREATE TABLE statement has no table name",
            ));
        };
        check_identifier_length("Table", &name, &mut self.issues);

        let mut table = TableDefinition {
            name,
            schema,
            is_temporary: head.is_temporary,
            is_unlogged: head.is_unlogged,
            if_not_exists: head.if_not_exists,
            annotations: self.block.header_annotations(),
            original_sql: self.block.content.clone(),
            source: self.block.source_location(),
            ..Default::default()
        };

        self.base.skip_whitespace();
        if self.base.consume_words_ci(&["PARTITION", "OF"]) {
            if let Err(issue) = self.parse_partition_of(&mut table) {
                return ExtractionOutcome::failure(issue);
            }
        } else if self.base.expect_word_ci("OF").is_some() {
            table.of_type = self
                .base
                .parse_qualified_name()
                .map(|(schema, name)| qualified_display(schema.as_deref(), &name));
            self.base.skip_whitespace();
            if let Some((start, end)) = self.base.skip_group() {
                self.parse_elements(&mut table, start, end);
            }
        } else {
            let Some((start, end)) = self.base.skip_group() else {
                return ExtractionOutcome::failure(ValidationIssue::error(
                    codes::TABLE_MISSING_COLUMN_LIST,
                    format!("Table {} has no column list", table.name),
                ));
            };
            self.parse_elements(&mut table, start, end);
            if table.columns.is_empty() && !self.issues.iter().any(ValidationIssue::is_error) {
                self.issues.push(ValidationIssue::warning(
                    codes::TABLE_NO_COLUMNS,
                    format!("Table {} declares no columns", table.name),
                ));
            }
        }

        if self.issues.iter().any(ValidationIssue::is_error) {
            return ExtractionOutcome::failure_with(self.issues);
        }

        self.parse_trailing_options(&mut table);
        self.apply_table_constraints(&mut table);
        self.check_duplicate_columns(&table);
        ExtractionOutcome::success(table, self.issues)
    }

    fn parse_partition_of(&mut self, table: &mut TableDefinition) -> Result<(), ValidationIssue> {
        let (parent_schema, parent) = self.base.parse_qualified_name().ok_or_else(|| {
            ValidationIssue::error(
                codes::PARTITION_MISSING_PARENT,
                format!("Partition {} has no PARTITION OF parent", table.name),
            )
        })?;
        table.is_partition = true;
        table.partition_of = Some(qualified_display(parent_schema.as_deref(), &parent));
        self.base.skip_whitespace();
        if let Some((start, end)) = self.base.skip_group() {
            self.parse_elements(table, start, end);
        }
        let (bound, issues) = parse_partition_bound(&mut self.base)?;
        table.partition_bound = Some(bound);
        self.issues.extend(issues);
        Ok(())
    }

    /// Columns, table constraints and `LIKE` clauses inside the parentheses.
    fn parse_elements(&mut self, table: &mut TableDefinition, start: usize, end: usize) {
        for (item_start, item_end) in self.base.split_top_level(start, end) {
            let item_text = self.base.text(item_start, item_end);
            if item_text.is_empty() {
                continue;
            }
            let mut element = self.base.slice(item_start, item_end);
            element.skip_whitespace();

            if element.check_word_ci("LIKE") {
                continue;
            }
            if element.check_any_word_ci(TABLE_CONSTRAINT_WORDS) {
                match ConstraintTokenParser::new(&mut element).parse() {
                    Ok(parsed) => {
                        let definition = parsed.into_definition(
                            table.schema.clone(),
                            &table.name,
                            self.block.source_location(),
                            &mut self.issues,
                        );
                        table.constraints.push(definition);
                    }
                    Err(issue) => self.issues.push(issue),
                }
                continue;
            }

            // Partition and typed tables list `name WITH OPTIONS ...` overrides
            if table.is_partition || table.of_type.is_some() {
                continue;
            }

            match ColumnTokenParser::from_parser(element).parse() {
                Some(parsed) => {
                    check_identifier_length("Column", &parsed.name, &mut self.issues);
                    let column = parsed.into_definition(
                        self.block,
                        table.schema.clone(),
                        Some(table.name.clone()),
                    );
                    table.columns.push(column);
                }
                None => self.issues.push(ValidationIssue::error(
                    codes::TABLE_INVALID_COLUMN,
                    format!("Invalid column definition '{}' in table {}", item_text, table.name),
                )),
            }
        }
    }

    fn parse_trailing_options(&mut self, table: &mut TableDefinition) {
        loop {
            self.base.skip_whitespace();
            if self.base.expect_word_ci("INHERITS").is_some() {
                let Some((start, end)) = self.base.skip_group() else {
                    return;
                };
                table.inherits_from = self
                    .base
                    .split_top_level(start, end)
                    .into_iter()
                    .map(|(s, e)| normalize_identifier(self.base.text(s, e)))
                    .filter(|p| !p.is_empty())
                    .collect();
            } else if self.base.check_word_ci("PARTITION") {
                match parse_partition_scheme(&mut self.base) {
                    Some(scheme) => {
                        table.is_partitioned = true;
                        table.partition_info = Some(scheme);
                    }
                    None => return,
                }
            } else if self.base.expect_word_ci("USING").is_some() {
                self.base.parse_identifier();
            } else if self.base.expect_word_ci("WITH").is_some() {
                let Some((start, end)) = self.base.skip_group() else {
                    return;
                };
                table.storage_parameters = self
                    .base
                    .split_top_level(start, end)
                    .into_iter()
                    .map(|(s, e)| self.base.text(s, e).to_string())
                    .filter(|p| !p.is_empty())
                    .collect();
            } else if self.base.consume_words_ci(&["WITHOUT", "OIDS"]) {
                continue;
            } else if self.base.consume_words_ci(&["ON", "COMMIT"]) {
                if !self.base.consume_words_ci(&["PRESERVE", "ROWS"])
                    && !self.base.consume_words_ci(&["DELETE", "ROWS"])
                {
                    self.base.expect_word_ci("DROP");
                }
            } else if self.base.expect_word_ci("TABLESPACE").is_some() {
                table.tablespace = self.base.parse_identifier();
            } else {
                return;
            }
        }
    }

    /// Table-level PRIMARY KEY and single-column UNIQUE mark their columns.
    fn apply_table_constraints(&self, table: &mut TableDefinition) {
        let TableDefinition {
            columns,
            constraints,
            ..
        } = table;
        for constraint in constraints.iter() {
            match constraint.constraint_type {
                ConstraintType::PrimaryKey => {
                    for name in &constraint.columns {
                        if let Some(column) = columns.iter_mut().find(|c| c.name.eq_ignore_ascii_case(name)) {
                            column.is_primary_key = true;
                            column.is_nullable = false;
                        }
                    }
                }
                ConstraintType::Unique if constraint.columns.len() == 1 => {
                    let name = &constraint.columns[0];
                    if let Some(column) = columns.iter_mut().find(|c| c.name.eq_ignore_ascii_case(name)) {
                        column.is_unique = true;
                    }
                }
                _ => {}
            }
        }
    }

    fn check_duplicate_columns(&mut self, table: &TableDefinition) {
        let mut seen = HashSet::new();
        let mut reported = HashSet::new();
        for column in &table.columns {
            let key = column.name.to_lowercase();
            if !seen.insert(key.clone()) && reported.insert(key) {
                self.issues.push(ValidationIssue::warning(
                    codes::TABLE_DUPLICATE_COLUMN,
                    format!("Column '{}' appears more than once in table {}", column.name, table.name),
                ));
            }
        }
    }
}

/// Extracts `CREATE TABLE` statements
#[derive(Debug, Clone, Copy, Default)]
pub struct TableExtractor;

impl Extractor for TableExtractor {
    type Definition = TableDefinition;

    fn accepts(&self, kind: ObjectKind) -> bool {
        kind == ObjectKind::Tables
    }

    fn extract_block(&self, block: &StatementBlock) -> ExtractionOutcome<TableDefinition> {
        match tokenize(block) {
            Ok(base) => TableTokenParser::new(base, block).parse(),
            Err(issue) => ExtractionOutcome::failure(issue),
        }
    }
}
