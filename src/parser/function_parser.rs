//! Token-based function and procedure definition parsing for PostgreSQL
//!
//! ## Supported Syntax
//!
//! ```sql
//! CREATE [OR REPLACE] FUNCTION name ([[IN | OUT | INOUT | VARIADIC] [arg_name] type [{DEFAULT | =} expr], ...])
//!     [RETURNS type | RETURNS SETOF type | RETURNS TABLE (column type, ...)]
//!     { LANGUAGE name
//!     | IMMUTABLE | STABLE | VOLATILE | [NOT] LEAKPROOF
//!     | CALLED ON NULL INPUT | RETURNS NULL ON NULL INPUT | STRICT
//!     | [EXTERNAL] SECURITY { INVOKER | DEFINER }
//!     | PARALLEL { UNSAFE | RESTRICTED | SAFE }
//!     | COST n | ROWS n | SUPPORT fn | WINDOW
//!     | SET param { TO value | = value | FROM CURRENT }
//!     | AS 'definition' | AS 'obj_file', 'link_symbol'
//!     | RETURN expr | BEGIN ATOMIC ... END
//!     } ...
//! CREATE [OR REPLACE] PROCEDURE name (...) { ... } ...
//! ```

use sqlparser::tokenizer::Token;

use super::block_extractor::StatementBlock;
use super::extractor::{check_identifier_length, tokenize, Extractor};
use super::object_detector::ObjectKind;
use super::token_parser_base::{string_literal_value, TokenParser};
use super::type_expression::parse_type_expression;
use crate::model::{
    codes, ExtractionOutcome, FunctionDefinition, FunctionParameter, ParameterMode, ReturnColumn,
    ValidationIssue, Volatility,
};

/// Functions with more parameters than this get a warning
pub const MAX_PARAMETERS: usize = 100;

/// Words that end a `RETURNS type` clause or a `SET` value
const OPTION_WORDS: &[&str] = &[
    "LANGUAGE", "AS", "IMMUTABLE", "STABLE", "VOLATILE", "STRICT", "CALLED", "RETURNS", "SECURITY",
    "EXTERNAL", "LEAKPROOF", "NOT", "PARALLEL", "COST", "ROWS", "SUPPORT", "SET", "WINDOW",
    "TRANSFORM", "BEGIN", "RETURN",
];

/// Token-based function definition parser
pub struct FunctionTokenParser<'a> {
    base: TokenParser<'a>,
    issues: Vec<ValidationIssue>,
}

impl<'a> FunctionTokenParser<'a> {
    pub fn new(base: TokenParser<'a>) -> Self {
        Self {
            base,
            issues: Vec::new(),
        }
    }

    pub fn parse(mut self, block: &StatementBlock) -> ExtractionOutcome<FunctionDefinition> {
        let mut function = FunctionDefinition {
            original_sql: block.content.clone(),
            source: block.source_location(),
            ..Default::default()
        };

        self.base.skip_whitespace();
        self.base.expect_word_ci("CREATE");
        function.is_or_replace = self.base.consume_words_ci(&["OR", "REPLACE"]);
        if self.base.expect_word_ci("PROCEDURE").is_some() {
            function.is_procedure = true;
        } else {
            self.base.expect_word_ci("FUNCTION");
        }
        let kind = if function.is_procedure { "Procedure" } else { "Function" };

        let Some((schema, name)) = self.base.parse_qualified_name() else {
            return ExtractionOutcome::failure(ValidationIssue::error(
                codes::FUNCTION_MISSING_NAME,
                format!("CREATE {} statement has no name", kind.to_uppercase()),
            ));
        };
        check_identifier_length(kind, &name, &mut self.issues);
        function.schema = schema;
        function.name = name;

        self.base.skip_whitespace();
        if let Some((start, end)) = self.base.skip_group() {
            match self.parse_parameters(start, end) {
                Ok(parameters) => function.parameters = parameters,
                Err(issue) => return ExtractionOutcome::failure(issue),
            }
        }
        if function.parameters.len() > MAX_PARAMETERS {
            self.issues.push(ValidationIssue::warning(
                codes::FUNCTION_TOO_MANY_PARAMETERS,
                format!(
                    "{} {} has {} parameters (more than {})",
                    kind,
                    function.name,
                    function.parameters.len(),
                    MAX_PARAMETERS
                ),
            ));
        }

        self.parse_options(&mut function);

        if function.body.is_empty() {
            return ExtractionOutcome::failure(ValidationIssue::error(
                codes::FUNCTION_NO_BODY,
                format!("{} {} has no body", kind, function.name),
            ));
        }
        if function.language.is_none() {
            self.issues.push(ValidationIssue::warning(
                codes::FUNCTION_MISSING_LANGUAGE,
                format!("{} {} does not declare a LANGUAGE", kind, function.name),
            ));
        }
        let has_out_parameters = function
            .parameters
            .iter()
            .any(|p| matches!(p.mode, ParameterMode::Out | ParameterMode::InOut));
        if !function.is_procedure && function.return_type.is_none() && !has_out_parameters {
            self.issues.push(ValidationIssue::warning(
                codes::FUNCTION_MISSING_RETURN_TYPE,
                format!("Function {} has no RETURNS clause", function.name),
            ));
        }

        ExtractionOutcome::success(function, self.issues)
    }

    fn parse_parameters(&self, start: usize, end: usize) -> Result<Vec<FunctionParameter>, ValidationIssue> {
        let items = self.base.split_top_level(start, end);
        let mut parameters = Vec::with_capacity(items.len());
        let single = items.len() == 1;
        for (item_start, item_end) in items {
            let text = self.base.text(item_start, item_end);
            // `f( )` declares no parameters; a blank item beside others is still invalid
            if text.is_empty() && single {
                continue;
            }
            let parameter = parse_parameter(self.base.slice(item_start, item_end)).ok_or_else(|| {
                ValidationIssue::error(
                    codes::FUNCTION_INVALID_PARAMETER,
                    format!("Invalid parameter '{}'", text),
                )
            })?;
            parameters.push(parameter);
        }
        Ok(parameters)
    }

    fn parse_options(&mut self, function: &mut FunctionDefinition) {
        loop {
            self.base.skip_whitespace();
            if self.base.is_at_end() {
                return;
            }

            if self.base.consume_words_ci(&["RETURNS", "NULL", "ON", "NULL", "INPUT"]) {
                function.is_strict = true;
            } else if self.base.expect_word_ci("RETURNS").is_some() {
                self.parse_returns(function);
            } else if self.base.expect_word_ci("LANGUAGE").is_some() {
                let language = match self.base.current_token() {
                    Some(Token::Word(w)) => Some(w.value.to_lowercase()),
                    Some(token) => string_literal_value(token).map(|s| s.to_lowercase()),
                    None => None,
                };
                function.language = language;
                self.base.advance();
            } else if self.base.expect_word_ci("IMMUTABLE").is_some() {
                function.volatility = Volatility::Immutable;
            } else if self.base.expect_word_ci("STABLE").is_some() {
                function.volatility = Volatility::Stable;
            } else if self.base.expect_word_ci("VOLATILE").is_some() {
                function.volatility = Volatility::Volatile;
            } else if self.base.expect_word_ci("STRICT").is_some() {
                function.is_strict = true;
            } else if self.base.consume_words_ci(&["CALLED", "ON", "NULL", "INPUT"]) {
                function.is_strict = false;
            } else if self.base.check_any_word_ci(&["EXTERNAL", "SECURITY"]) {
                self.base.expect_word_ci("EXTERNAL");
                self.base.expect_word_ci("SECURITY");
                if self.base.expect_word_ci("DEFINER").is_some() {
                    function.security_definer = true;
                } else if self.base.expect_word_ci("INVOKER").is_some() {
                    function.security_definer = false;
                } else {
                    return;
                }
            } else if self.base.consume_words_ci(&["NOT", "LEAKPROOF"]) {
                function.is_leakproof = false;
            } else if self.base.expect_word_ci("LEAKPROOF").is_some() {
                function.is_leakproof = true;
            } else if self.base.expect_word_ci("PARALLEL").is_some() {
                function.parallel = self.base.current_keyword();
                self.base.advance();
            } else if self.base.expect_word_ci("COST").is_some()
                || self.base.expect_word_ci("ROWS").is_some()
                || self.base.expect_word_ci("SUPPORT").is_some()
            {
                self.base.advance();
            } else if self.base.expect_word_ci("WINDOW").is_some() {
                continue;
            } else if self.base.expect_word_ci("SET").is_some()
                || self.base.expect_word_ci("TRANSFORM").is_some()
            {
                self.base.advance();
                self.skip_to_option();
            } else if self.base.expect_word_ci("AS").is_some() {
                self.parse_as_body(function);
            } else if self.base.check_word_ci("RETURN") {
                self.base.bump();
                function.body = self.base.rest_text().to_string();
                function.language.get_or_insert_with(|| "sql".to_string());
                return;
            } else if self.base.check_word_ci("BEGIN") && self.base.peek_word_ci(1, "ATOMIC") {
                function.body = self.base.rest_text().to_string();
                function.language.get_or_insert_with(|| "sql".to_string());
                return;
            } else {
                return;
            }
        }
    }

    /// `type`, `SETOF type` or `TABLE (column type, ...)`
    fn parse_returns(&mut self, function: &mut FunctionDefinition) {
        if self.base.expect_word_ci("TABLE").is_some() {
            function.returns_set = true;
            function.return_type = Some("TABLE".to_string());
            if let Some((start, end)) = self.base.skip_group() {
                function.returns_table = self
                    .base
                    .split_top_level(start, end)
                    .into_iter()
                    .filter_map(|(s, e)| parse_return_column(self.base.slice(s, e)))
                    .collect();
            }
            return;
        }
        if self.base.expect_word_ci("SETOF").is_some() {
            function.returns_set = true;
        }
        let start = self.base.pos();
        self.skip_to_option();
        let return_type = self.base.text(start, self.base.pos());
        if !return_type.is_empty() {
            function.return_type = Some(return_type.to_string());
        }
    }

    /// `AS 'definition'` or `AS 'obj_file', 'link_symbol'`
    fn parse_as_body(&mut self, function: &mut FunctionDefinition) {
        let Some(body) = self.base.current_token().and_then(string_literal_value) else {
            return;
        };
        function.body = body;
        self.base.bump();
        if self.base.expect_token(&Token::Comma).is_some() {
            self.base.advance();
        }
    }

    fn skip_to_option(&mut self) {
        self.base.skip_to_top_level_word(OPTION_WORDS);
    }
}

/// `[mode] [name] type [{DEFAULT | =} expr]`
fn parse_parameter(mut item: TokenParser<'_>) -> Option<FunctionParameter> {
    item.skip_whitespace();
    let mode = if item.expect_word_ci("INOUT").is_some() {
        ParameterMode::InOut
    } else if item.expect_word_ci("IN").is_some() {
        ParameterMode::In
    } else if item.expect_word_ci("OUT").is_some() {
        ParameterMode::Out
    } else if item.expect_word_ci("VARIADIC").is_some() {
        ParameterMode::Variadic
    } else {
        ParameterMode::In
    };

    let decl_start = item.pos();
    let default_at = find_default(&item, decl_start);
    let decl_end = default_at.map_or(item.len(), |(pos, _)| pos);
    let declaration = item.text(decl_start, decl_end);
    if declaration.is_empty() {
        return None;
    }

    let default_value = match default_at {
        Some((_, value_start)) => {
            let value = item.text(value_start, item.len());
            if value.is_empty() {
                return None;
            }
            Some(value.to_string())
        }
        None => None,
    };

    let (name, data_type) = split_parameter_name(&mut item, decl_start, decl_end)?;
    parse_type_expression(&data_type)?;
    Some(FunctionParameter {
        name,
        mode,
        data_type,
        default_value,
    })
}

/// Position of a top-level `DEFAULT` or `=` and of the expression after it.
fn find_default(item: &TokenParser<'_>, from: usize) -> Option<(usize, usize)> {
    let mut depth = 0usize;
    for pos in from..item.len() {
        match item.token_at(pos)? {
            Token::LParen | Token::LBracket => depth += 1,
            Token::RParen | Token::RBracket => depth = depth.saturating_sub(1),
            Token::Eq if depth == 0 => return Some((pos, pos + 1)),
            Token::Word(w)
                if depth == 0 && w.quote_style.is_none() && w.value.eq_ignore_ascii_case("DEFAULT") =>
            {
                return Some((pos, pos + 1))
            }
            _ => {}
        }
    }
    None
}

/// Decide whether the declaration starts with a parameter name.
///
/// A lone type (`integer`, `varchar(10)`, `public.money[]`) or a built-in
/// multi-word type (`double precision`) has no name.
fn split_parameter_name(
    item: &mut TokenParser<'_>,
    start: usize,
    end: usize,
) -> Option<(Option<String>, String)> {
    let declaration = item.text(start, end).to_string();
    item.set_pos(start);
    let first = item.parse_name_parts()?;
    let after_first = item.pos();
    item.skip_whitespace();

    let lone_type = item.pos() >= end
        || item.check_token(&Token::LParen)
        || item.check_token(&Token::LBracket)
        || item.check_word_ci("ARRAY");
    let builtin = parse_type_expression(&declaration).is_some_and(|t| t.is_builtin());
    if lone_type || builtin || first.len() > 1 {
        return Some((None, declaration));
    }

    let data_type = item.text(after_first, end).to_string();
    if data_type.is_empty() {
        return None;
    }
    Some((first.into_iter().next(), data_type))
}

fn parse_return_column(mut item: TokenParser<'_>) -> Option<ReturnColumn> {
    item.skip_whitespace();
    let name = item.parse_identifier()?;
    let data_type = item.rest_text();
    if data_type.is_empty() {
        return None;
    }
    Some(ReturnColumn {
        name,
        data_type: data_type.to_string(),
    })
}

/// Extracts `CREATE FUNCTION` and `CREATE PROCEDURE` statements
#[derive(Debug, Clone, Copy, Default)]
pub struct FunctionExtractor;

impl Extractor for FunctionExtractor {
    type Definition = FunctionDefinition;

    fn accepts(&self, kind: ObjectKind) -> bool {
        kind == ObjectKind::Functions
    }

    fn extract_block(&self, block: &StatementBlock) -> ExtractionOutcome<FunctionDefinition> {
        match tokenize(block) {
            Ok(base) => FunctionTokenParser::new(base).parse(block),
            Err(issue) => ExtractionOutcome::failure(issue),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(sql: &str) -> ExtractionOutcome<FunctionDefinition> {
        FunctionExtractor.extract_sql(sql)
    }

    #[test]
    fn test_plpgsql_function() {
        let outcome = extract(
            "CREATE OR REPLACE FUNCTION public.add_points(p_user_id bigint, p_points integer DEFAULT 10)\nRETURNS integer\nLANGUAGE plpgsql\nSECURITY DEFINER\nAS $$\nBEGIN\n    UPDATE users SET points = points + p_points WHERE id = p_user_id;\n    RETURN p_points;\nEND;\n$$",
        );
        assert!(outcome.is_success(), "{:?}", outcome.issues);
        let f = outcome.definition.unwrap();
        assert_eq!(f.name, "add_points");
        assert_eq!(f.schema.as_deref(), Some("public"));
        assert!(f.is_or_replace);
        assert!(!f.is_procedure);
        assert_eq!(f.parameters.len(), 2);
        assert_eq!(f.parameters[0].name.as_deref(), Some("p_user_id"));
        assert_eq!(f.parameters[0].data_type, "bigint");
        assert_eq!(f.parameters[1].default_value.as_deref(), Some("10"));
        assert_eq!(f.return_type.as_deref(), Some("integer"));
        assert_eq!(f.language.as_deref(), Some("plpgsql"));
        assert!(f.security_definer);
        assert!(f.body.contains("RETURN p_points;"));
        assert!(f.body.contains(';'));
    }

    #[test]
    fn test_parameter_modes_and_unnamed_types() {
        let f = extract(
            "CREATE FUNCTION f(IN a int, OUT b text, INOUT c numeric(10,2), VARIADIC d int[], double precision, varchar(20) = 'x') RETURNS record AS 'select 1' LANGUAGE sql",
        )
        .definition
        .unwrap();
        let modes: Vec<ParameterMode> = f.parameters.iter().map(|p| p.mode).collect();
        assert_eq!(
            modes,
            vec![
                ParameterMode::In,
                ParameterMode::Out,
                ParameterMode::InOut,
                ParameterMode::Variadic,
                ParameterMode::In,
                ParameterMode::In
            ]
        );
        assert_eq!(f.parameters[2].data_type, "numeric(10,2)");
        assert_eq!(f.parameters[3].data_type, "int[]");
        assert_eq!(f.parameters[4].name, None);
        assert_eq!(f.parameters[4].data_type, "double precision");
        assert_eq!(f.parameters[5].name, None);
        assert_eq!(f.parameters[5].default_value.as_deref(), Some("'x'"));
        assert_eq!(f.body, "select 1");
    }

    #[test]
    fn test_returns_table_and_setof() {
        let f = extract(
            "CREATE FUNCTION recent_orders(since date) RETURNS TABLE (id bigint, total numeric(12,2)) LANGUAGE sql STABLE AS $body$ SELECT id, total FROM orders WHERE created_at > since $body$",
        )
        .definition
        .unwrap();
        assert!(f.returns_set);
        assert_eq!(f.returns_table.len(), 2);
        assert_eq!(f.returns_table[1].name, "total");
        assert_eq!(f.returns_table[1].data_type, "numeric(12,2)");
        assert_eq!(f.volatility, Volatility::Stable);

        let f = extract("CREATE FUNCTION all_users() RETURNS SETOF users AS $$ SELECT * FROM users $$ LANGUAGE sql")
            .definition
            .unwrap();
        assert!(f.returns_set);
        assert_eq!(f.return_type.as_deref(), Some("users"));
    }

    #[test]
    fn test_options_in_any_order() {
        let f = extract(
            "CREATE FUNCTION f(x int) RETURNS int IMMUTABLE STRICT LEAKPROOF PARALLEL SAFE COST 10 SET search_path = public, pg_temp LANGUAGE sql AS 'SELECT x'",
        )
        .definition
        .unwrap();
        assert_eq!(f.volatility, Volatility::Immutable);
        assert!(f.is_strict);
        assert!(f.is_leakproof);
        assert_eq!(f.parallel.as_deref(), Some("SAFE"));
        assert_eq!(f.language.as_deref(), Some("sql"));
        assert_eq!(f.body, "SELECT x");
    }

    #[test]
    fn test_sql_standard_bodies() {
        let f = extract("CREATE FUNCTION add(a integer, b integer) RETURNS integer RETURN a + b")
            .definition
            .unwrap();
        assert_eq!(f.body, "a + b");
        assert_eq!(f.language.as_deref(), Some("sql"));

        let outcome = extract(
            "CREATE PROCEDURE insert_data(a integer, b integer)\nBEGIN ATOMIC\n  INSERT INTO tbl VALUES (a);\n  INSERT INTO tbl VALUES (b);\nEND",
        );
        assert!(outcome.is_success(), "{:?}", outcome.issues);
        assert!(!outcome.has_code(codes::FUNCTION_MISSING_RETURN_TYPE));
        let p = outcome.definition.unwrap();
        assert!(p.is_procedure);
        assert!(p.body.starts_with("BEGIN ATOMIC"));
    }

    #[test]
    fn test_blank_parameter_list() {
        let outcome = extract("CREATE FUNCTION f( ) RETURNS int LANGUAGE sql AS 'select 1'");
        assert!(outcome.is_success(), "{:?}", outcome.issues);
        assert!(outcome.definition.unwrap().parameters.is_empty());

        let outcome = extract("CREATE FUNCTION f(a int, ) RETURNS int LANGUAGE sql AS 'select 1'");
        assert!(outcome.has_code(codes::FUNCTION_INVALID_PARAMETER));
    }

    #[test]
    fn test_warnings() {
        let outcome = extract("CREATE FUNCTION f() AS $$ SELECT 1 $$");
        assert!(outcome.is_success());
        assert!(outcome.has_code(codes::FUNCTION_MISSING_LANGUAGE));
        assert!(outcome.has_code(codes::FUNCTION_MISSING_RETURN_TYPE));

        let params: Vec<String> = (0..101).map(|i| format!("p{} int", i)).collect();
        let sql = format!(
            "CREATE FUNCTION wide({}) RETURNS void LANGUAGE sql AS 'SELECT'",
            params.join(", ")
        );
        assert!(extract(&sql).has_code(codes::FUNCTION_TOO_MANY_PARAMETERS));
    }

    #[test]
    fn test_errors() {
        assert!(extract("CREATE FUNCTION (a int) RETURNS int AS 'x'").has_code(codes::FUNCTION_MISSING_NAME));
        assert!(extract("CREATE FUNCTION f(a int) RETURNS int LANGUAGE sql").has_code(codes::FUNCTION_NO_BODY));
        assert!(extract("CREATE FUNCTION f(a int DEFAULT) RETURNS int AS 'x'")
            .has_code(codes::FUNCTION_INVALID_PARAMETER));
    }
}
