//! Partition bound grammar and `CREATE TABLE ... PARTITION OF` extraction
//!
//! ```sql
//! CREATE TABLE [IF NOT EXISTS] name PARTITION OF parent [( ... )]
//!     { FOR VALUES FROM (...) TO (...)
//!     | FOR VALUES IN (...)
//!     | FOR VALUES WITH (MODULUS m, REMAINDER r)
//!     | DEFAULT }
//!     [PARTITION BY { RANGE | LIST | HASH } (key, ...)]
//! ```

use super::block_extractor::StatementBlock;
use super::extractor::{check_identifier_length, tokenize, Extractor};
use super::object_detector::ObjectKind;
use super::table_parser::parse_create_table_head;
use super::token_parser_base::TokenParser;
use crate::model::{
    codes, ExtractionOutcome, PartitionBound, PartitionDefinition, PartitionMethod,
    PartitionScheme, PartitionStrategy, ValidationIssue,
};

/// List partitions with more values than this get a warning
pub const MAX_LIST_VALUES: usize = 100;

/// Parse a partition bound at the current position (`FOR VALUES ...` or `DEFAULT`).
///
/// Structural problems are returned as the error; quality warnings and the
/// `DEFAULT` info are returned next to the bound.
pub fn parse_partition_bound(
    base: &mut TokenParser<'_>,
) -> Result<(PartitionBound, Vec<ValidationIssue>), ValidationIssue> {
    base.skip_whitespace();
    if base.expect_word_ci("DEFAULT").is_some() {
        let info = ValidationIssue::info(
            codes::PARTITION_DEFAULT,
            "Default partition receives rows matching no other partition",
        );
        return Ok((PartitionBound::Default, vec![info]));
    }
    if !base.consume_words_ci(&["FOR", "VALUES"]) {
        return Err(missing_bounds());
    }

    if base.expect_word_ci("FROM").is_some() {
        parse_range_bound(base)
    } else if base.expect_word_ci("IN").is_some() {
        parse_list_bound(base)
    } else if base.expect_word_ci("WITH").is_some() {
        parse_hash_bound(base)
    } else {
        Err(missing_bounds())
    }
}

fn missing_bounds() -> ValidationIssue {
    ValidationIssue::error(
        codes::PARTITION_MISSING_BOUNDS,
        "Partition has no FOR VALUES clause or DEFAULT",
    )
}

fn parse_range_bound(
    base: &mut TokenParser<'_>,
) -> Result<(PartitionBound, Vec<ValidationIssue>), ValidationIssue> {
    let from = base.consume_parenthesized().ok_or_else(missing_bounds)?;
    base.skip_whitespace();
    base.expect_word_ci("TO").ok_or_else(missing_bounds)?;
    let to = base.consume_parenthesized().ok_or_else(missing_bounds)?;
    base.skip_whitespace();

    let mut issues = Vec::new();
    if from == to {
        issues.push(ValidationIssue::warning(
            codes::PARTITION_RANGE_EQUAL_BOUNDS,
            format!("Range partition FROM ({}) TO ({}) is empty", from, to),
        ));
    }
    let bound = PartitionBound::Range {
        from: from.to_string(),
        to: to.to_string(),
    };
    Ok((bound, issues))
}

fn parse_list_bound(
    base: &mut TokenParser<'_>,
) -> Result<(PartitionBound, Vec<ValidationIssue>), ValidationIssue> {
    let (start, end) = base.skip_group().ok_or_else(missing_bounds)?;
    base.skip_whitespace();

    let values: Vec<String> = base
        .split_top_level(start, end)
        .into_iter()
        .map(|(s, e)| base.text(s, e).to_string())
        .collect();
    if values.iter().all(|v| v.is_empty()) {
        return Err(ValidationIssue::error(
            codes::PARTITION_LIST_EMPTY,
            "List partition has no values",
        ));
    }

    let mut issues = Vec::new();
    if values.iter().any(|v| v.is_empty() || v == "''") {
        issues.push(ValidationIssue::warning(
            codes::PARTITION_LIST_EMPTY_VALUE,
            "List partition contains an empty value",
        ));
    }
    let mut duplicates: Vec<&str> = Vec::new();
    for (i, value) in values.iter().enumerate() {
        if !value.is_empty()
            && values[..i].contains(value)
            && !duplicates.contains(&value.as_str())
        {
            duplicates.push(value);
        }
    }
    if !duplicates.is_empty() {
        issues.push(ValidationIssue::warning(
            codes::PARTITION_LIST_DUPLICATE_VALUES,
            format!("List partition repeats values: {}", duplicates.join(", ")),
        ));
    }
    if values.len() > MAX_LIST_VALUES {
        issues.push(ValidationIssue::warning(
            codes::PARTITION_LIST_TOO_MANY_VALUES,
            format!(
                "List partition has {} values (more than {})",
                values.len(),
                MAX_LIST_VALUES
            ),
        ));
    }
    Ok((PartitionBound::List { values }, issues))
}

fn parse_hash_bound(
    base: &mut TokenParser<'_>,
) -> Result<(PartitionBound, Vec<ValidationIssue>), ValidationIssue> {
    let (start, end) = base.skip_group().ok_or_else(missing_bounds)?;
    base.skip_whitespace();

    let mut modulus = None;
    let mut remainder = None;
    for (s, e) in base.split_top_level(start, end) {
        let mut item = base.slice(s, e);
        item.skip_whitespace();
        if item.expect_word_ci("MODULUS").is_some() {
            modulus = item.parse_signed_integer();
        } else if item.expect_word_ci("REMAINDER").is_some() {
            remainder = item.parse_signed_integer();
        }
    }

    let (Some(modulus), Some(remainder)) = (modulus, remainder) else {
        return Err(ValidationIssue::error(
            codes::PARTITION_HASH_MISSING_PARAMS,
            "Hash partition needs both MODULUS and REMAINDER",
        ));
    };
    if modulus < 1 {
        return Err(ValidationIssue::error(
            codes::PARTITION_HASH_INVALID_MODULUS,
            format!("Hash partition modulus {} must be a positive integer", modulus),
        ));
    }
    if remainder < 0 || remainder >= modulus {
        return Err(ValidationIssue::error(
            codes::PARTITION_HASH_INVALID_REMAINDER,
            format!(
                "Hash partition remainder {} must be between 0 and {}",
                remainder,
                modulus - 1
            ),
        ));
    }
    Ok((PartitionBound::Hash { modulus, remainder }, Vec::new()))
}

/// Parse `PARTITION BY {RANGE | LIST | HASH} (key, ...)` at the current position.
pub fn parse_partition_scheme(base: &mut TokenParser<'_>) -> Option<PartitionScheme> {
    let start = base.pos();
    base.skip_whitespace();
    if !base.consume_words_ci(&["PARTITION", "BY"]) {
        base.set_pos(start);
        return None;
    }
    let method = if base.expect_word_ci("RANGE").is_some() {
        PartitionMethod::Range
    } else if base.expect_word_ci("LIST").is_some() {
        PartitionMethod::List
    } else if base.expect_word_ci("HASH").is_some() {
        PartitionMethod::Hash
    } else {
        base.set_pos(start);
        return None;
    };
    let Some((inner_start, inner_end)) = base.skip_group() else {
        base.set_pos(start);
        return None;
    };
    base.skip_whitespace();
    let keys = base
        .split_top_level(inner_start, inner_end)
        .into_iter()
        .map(|(s, e)| base.text(s, e).to_string())
        .filter(|k| !k.is_empty())
        .collect();
    Some(PartitionScheme { method, keys })
}

/// Extracts `CREATE TABLE ... PARTITION OF` statements
#[derive(Debug, Clone, Copy, Default)]
pub struct PartitionExtractor;

impl Extractor for PartitionExtractor {
    type Definition = PartitionDefinition;

    fn accepts(&self, kind: ObjectKind) -> bool {
        kind == ObjectKind::Partitions
    }

    fn extract_block(&self, block: &StatementBlock) -> ExtractionOutcome<PartitionDefinition> {
        let mut base = match tokenize(block) {
            Ok(base) => base,
            Err(issue) => return ExtractionOutcome::failure(issue),
        };

        let head = parse_create_table_head(&mut base);
        let Some((schema, name)) = head.name else {
            return ExtractionOutcome::failure(ValidationIssue::error(
                codes::PARTITION_MISSING_NAME,
                "Partition has no table name",
            ));
        };
        let mut issues = Vec::new();
        check_identifier_length("Partition", &name, &mut issues);

        base.skip_whitespace();
        let parent = if base.consume_words_ci(&["PARTITION", "OF"]) {
            base.parse_qualified_name()
        } else {
            None
        };
        let Some((parent_schema, parent_table)) = parent else {
            return ExtractionOutcome::failure(ValidationIssue::error(
                codes::PARTITION_MISSING_PARENT,
                format!("Partition {} has no PARTITION OF parent", name),
            ));
        };

        // Optional column overrides
        base.skip_whitespace();
        if base.skip_group().is_some() {
            base.skip_whitespace();
        }

        let (bound, bound_issues) = match parse_partition_bound(&mut base) {
            Ok(parsed) => parsed,
            Err(issue) => return ExtractionOutcome::failure(issue),
        };
        issues.extend(bound_issues);
        let partition_by = parse_partition_scheme(&mut base);

        let mut definition = PartitionDefinition {
            name,
            schema,
            parent_table,
            parent_schema,
            strategy: PartitionStrategy::Default,
            from_value: None,
            to_value: None,
            in_values: Vec::new(),
            modulus: None,
            remainder: None,
            is_default: false,
            partition_by,
            original_sql: block.content.clone(),
            source: block.source_location(),
        };
        match bound {
            PartitionBound::Range { from, to } => {
                definition.strategy = PartitionStrategy::Range;
                definition.from_value = Some(from);
                definition.to_value = Some(to);
            }
            PartitionBound::List { values } => {
                definition.strategy = PartitionStrategy::List;
                definition.in_values = values;
            }
            PartitionBound::Hash { modulus, remainder } => {
                definition.strategy = PartitionStrategy::Hash;
                definition.modulus = Some(modulus);
                definition.remainder = Some(remainder);
            }
            PartitionBound::Default => {
                definition.is_default = true;
            }
        }
        ExtractionOutcome::success(definition, issues)
    }
}
