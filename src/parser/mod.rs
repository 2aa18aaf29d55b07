//! PostgreSQL DDL parsing
//!
//! Scripts flow through the [`splitter`] and [`block_extractor`], are
//! classified by [`object_detector`], and handed to one per-kind
//! [`Extractor`].

pub mod annotations;
pub mod block_extractor;
pub mod column_parser;
pub mod comment_parser;
pub mod constraint_parser;
pub mod domain_parser;
pub mod extractor;
pub mod function_parser;
pub mod identifier_utils;
pub mod index_parser;
pub mod object_detector;
pub mod partition_parser;
pub mod splitter;
pub mod table_parser;
pub mod token_parser_base;
pub mod trigger_parser;
pub mod type_expression;
pub mod type_parser;
pub mod view_parser;

pub use annotations::Annotations;
pub use block_extractor::{extract_blocks, InlineComment, StatementBlock};
pub use column_parser::ColumnExtractor;
pub use comment_parser::CommentExtractor;
pub use constraint_parser::ConstraintExtractor;
pub use domain_parser::DomainTypeExtractor;
pub use extractor::Extractor;
pub use function_parser::FunctionExtractor;
pub use index_parser::IndexExtractor;
pub use object_detector::{detect_object_kind, ObjectKind, TypeKind};
pub use partition_parser::PartitionExtractor;
pub use splitter::{split_statements, split_statements_with_lines};
pub use table_parser::TableExtractor;
pub use trigger_parser::TriggerExtractor;
pub use type_expression::{parse_type_expression, TypeExpression};
pub use type_parser::{CompositeTypeExtractor, EnumTypeExtractor};
pub use view_parser::ViewExtractor;
