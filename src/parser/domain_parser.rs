//! Domain type parsing
//!
//! ```sql
//! CREATE DOMAIN name [AS] data_type
//!     [COLLATE collation]
//!     [DEFAULT expression]
//!     [[CONSTRAINT constraint_name] {NOT NULL | NULL | CHECK (expression)}] ...
//! ```

use super::block_extractor::StatementBlock;
use super::extractor::{check_identifier_length, tokenize, Extractor};
use super::object_detector::{ObjectKind, TypeKind};
use super::token_parser_base::TokenParser;
use super::type_expression::{parse_type_expression, TypeExpression};
use crate::model::{codes, DomainCheck, DomainTypeDefinition, ExtractionOutcome, ValidationIssue};
use crate::util::collapse_whitespace;

/// Largest length PostgreSQL accepts for `varchar(n)` and friends
pub const MAX_TYPE_LENGTH: u32 = 10_485_760;

/// Largest precision PostgreSQL accepts for `numeric(p, s)`
pub const MAX_NUMERIC_PRECISION: u32 = 1000;

/// Domains with more CHECK constraints than this get a warning
pub const MAX_DOMAIN_CHECKS: usize = 10;

const CLAUSE_WORDS: &[&str] = &["COLLATE", "DEFAULT", "CONSTRAINT", "NOT", "NULL", "CHECK"];

const NUMERIC_TYPES: &[&str] = &["NUMERIC", "DECIMAL"];

/// Token parser for CREATE DOMAIN
pub struct DomainTokenParser<'a> {
    base: TokenParser<'a>,
}

impl<'a> DomainTokenParser<'a> {
    pub fn new(base: TokenParser<'a>) -> Self {
        Self { base }
    }

    pub fn parse(mut self, block: &StatementBlock) -> ExtractionOutcome<DomainTypeDefinition> {
        self.base.skip_whitespace();
        if self.base.expect_word_ci("CREATE").is_none()
            || self.base.expect_word_ci("DOMAIN").is_none()
        {
            return missing_name();
        }
        let Some((schema, name)) = self.base.parse_qualified_name() else {
            return missing_name();
        };
        self.base.skip_whitespace();
        self.base.expect_word_ci("AS");

        let type_start = self.base.pos();
        self.base.skip_to_top_level_word(CLAUSE_WORDS);
        let base_type = self.base.text(type_start, self.base.pos()).to_string();
        let Some(type_expression) = parse_type_expression(&base_type) else {
            return ExtractionOutcome::failure(ValidationIssue::error(
                codes::DOMAIN_MISSING_BASE_TYPE,
                format!("Domain {} has no base type", name),
            ));
        };
        if let Some(issue) = invalid_numeric_params(&name, &type_expression) {
            return ExtractionOutcome::failure(issue);
        }

        let mut domain = DomainTypeDefinition {
            name,
            schema,
            base_type,
            type_expression: Some(type_expression),
            annotations: block.header_annotations(),
            original_sql: block.content.clone(),
            source: block.source_location(),
            ..Default::default()
        };
        self.parse_clauses(&mut domain);

        let mut issues = Vec::new();
        check_identifier_length("Domain", &domain.name, &mut issues);
        issues.extend(domain_warnings(&domain));
        ExtractionOutcome::success(domain, issues)
    }

    /// Clauses in any order; unknown text ends the scan.
    fn parse_clauses(&mut self, domain: &mut DomainTypeDefinition) {
        let mut constraint_name = None;
        loop {
            self.base.skip_whitespace();
            if self.base.is_at_end() {
                return;
            }
            if self.base.expect_word_ci("COLLATE").is_some() {
                domain.collation = self.base.parse_name_parts().map(|parts| parts.join("."));
            } else if self.base.expect_word_ci("DEFAULT").is_some() {
                let start = self.base.pos();
                self.base.bump();
                self.base.skip_to_top_level_word(&[
                    "COLLATE",
                    "CONSTRAINT",
                    "NOT",
                    "NULL",
                    "CHECK",
                ]);
                domain.default_value =
                    Some(collapse_whitespace(self.base.text(start, self.base.pos())));
            } else if self.base.expect_word_ci("CONSTRAINT").is_some() {
                constraint_name = self.base.parse_identifier();
                continue;
            } else if self.base.consume_words_ci(&["NOT", "NULL"]) {
                domain.is_not_null = true;
            } else if self.base.expect_word_ci("NULL").is_some() {
                domain.is_not_null = false;
            } else if self.base.expect_word_ci("CHECK").is_some() {
                let Some(expression) = self.base.consume_parenthesized() else {
                    return;
                };
                domain.check_constraints.push(DomainCheck {
                    name: constraint_name.take(),
                    expression: collapse_whitespace(expression),
                });
                continue;
            } else {
                return;
            }
            constraint_name = None;
        }
    }
}

fn missing_name() -> ExtractionOutcome<DomainTypeDefinition> {
    ExtractionOutcome::failure(ValidationIssue::error(
        codes::DOMAIN_MISSING_NAME,
        "CREATE DOMAIN statement has no domain name",
    ))
}

fn invalid_numeric_params(name: &str, expr: &TypeExpression) -> Option<ValidationIssue> {
    if !NUMERIC_TYPES.contains(&expr.base_type.as_str()) {
        return None;
    }
    let precision = expr.precision?;
    let message = if precision == 0 {
        format!("Domain {} declares {} with precision 0", name, expr.original)
    } else if expr.scale.is_some_and(|scale| scale > precision) {
        format!(
            "Domain {} declares {} with a scale larger than its precision",
            name, expr.original
        )
    } else {
        return None;
    };
    Some(ValidationIssue::error(codes::DOMAIN_INVALID_NUMERIC_PARAMS, message))
}

fn domain_warnings(domain: &DomainTypeDefinition) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    if let Some(expr) = &domain.type_expression {
        if let Some(length) = expr.length.filter(|l| *l > MAX_TYPE_LENGTH) {
            issues.push(ValidationIssue::warning(
                codes::DOMAIN_EXCESSIVE_LENGTH,
                format!(
                    "Domain {} length {} exceeds the maximum of {}",
                    domain.name, length, MAX_TYPE_LENGTH
                ),
            ));
        }
        if let Some(precision) = expr.precision.filter(|p| *p > MAX_NUMERIC_PRECISION) {
            issues.push(ValidationIssue::warning(
                codes::DOMAIN_EXCESSIVE_PRECISION,
                format!(
                    "Domain {} precision {} exceeds the maximum of {}",
                    domain.name, precision, MAX_NUMERIC_PRECISION
                ),
            ));
        }
    }
    if domain.check_constraints.len() > MAX_DOMAIN_CHECKS {
        issues.push(ValidationIssue::warning(
            codes::DOMAIN_TOO_MANY_CHECKS,
            format!(
                "Domain {} has {} CHECK constraints (more than {})",
                domain.name,
                domain.check_constraints.len(),
                MAX_DOMAIN_CHECKS
            ),
        ));
    }
    issues
}

/// Extracts `CREATE DOMAIN`
#[derive(Debug, Clone, Copy, Default)]
pub struct DomainTypeExtractor;

impl Extractor for DomainTypeExtractor {
    type Definition = DomainTypeDefinition;

    fn accepts(&self, kind: ObjectKind) -> bool {
        kind == ObjectKind::Types(TypeKind::Domain)
    }

    fn extract_block(&self, block: &StatementBlock) -> ExtractionOutcome<DomainTypeDefinition> {
        match tokenize(block) {
            Ok(base) => DomainTokenParser::new(base).parse(block),
            Err(issue) => ExtractionOutcome::failure(issue),
        }
    }
}
