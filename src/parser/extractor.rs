//! The contract every per-kind extractor implements

use sqlparser::tokenizer::TokenizerError;

use super::block_extractor::{extract_blocks, StatementBlock};
use super::object_detector::{detect_object_kind, ObjectKind};
use super::token_parser_base::TokenParser;
use crate::model::{codes, ExtractionOutcome, ValidationIssue};

/// Turns statement blocks of one object kind into definitions.
///
/// Implementors supply [`accepts`](Extractor::accepts) and
/// [`extract_block`](Extractor::extract_block); the remaining methods are
/// shared.
pub trait Extractor {
    type Definition;

    /// Which detector classifications this extractor handles.
    fn accepts(&self, kind: ObjectKind) -> bool;

    /// Extract a definition from one block.
    fn extract_block(&self, block: &StatementBlock) -> ExtractionOutcome<Self::Definition>;

    fn can_extract_block(&self, block: &StatementBlock) -> bool {
        self.accepts(detect_object_kind(&block.content))
    }

    fn can_extract(&self, blocks: &[StatementBlock]) -> bool {
        blocks.iter().any(|block| self.can_extract_block(block))
    }

    /// Extract from the first accepted block.
    fn extract(&self, blocks: &[StatementBlock]) -> ExtractionOutcome<Self::Definition> {
        if blocks.is_empty() {
            return ExtractionOutcome::failure(ValidationIssue::error(
                codes::EMPTY_INPUT,
                "No statements to extract from",
            ));
        }
        match blocks.iter().find(|block| self.can_extract_block(block)) {
            Some(block) => self.extract_block(block),
            None => ExtractionOutcome::failure(ValidationIssue::error(
                codes::NO_MATCHING_STATEMENT,
                format!("None of the {} statement(s) is supported here", blocks.len()),
            )),
        }
    }

    /// Convenience over [`extract_blocks`] for a raw SQL string.
    fn extract_sql(&self, sql: &str) -> ExtractionOutcome<Self::Definition> {
        self.extract(&extract_blocks(sql, None))
    }
}

/// Tokenize a block's content, turning tokenizer failures into an issue.
pub(crate) fn tokenize(block: &StatementBlock) -> Result<TokenParser<'_>, ValidationIssue> {
    TokenParser::new(&block.content).map_err(|e| tokenize_failed(&e))
}

fn tokenize_failed(error: &TokenizerError) -> ValidationIssue {
    ValidationIssue::error(
        codes::TOKENIZE_FAILED,
        format!("Statement could not be tokenized: {}", error),
    )
}

/// Warning for names PostgreSQL would truncate.
pub(crate) fn check_identifier_length(kind: &str, name: &str, issues: &mut Vec<ValidationIssue>) {
    if super::identifier_utils::is_identifier_too_long(name) {
        issues.push(ValidationIssue::warning(
            codes::IDENTIFIER_TOO_LONG,
            format!(
                "{} name '{}' is {} bytes; PostgreSQL truncates identifiers to {} bytes",
                kind,
                name,
                name.len(),
                super::identifier_utils::MAX_IDENTIFIER_BYTES
            ),
        ));
    }
}
