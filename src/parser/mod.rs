//! PEST-based parser for the Flow language
//!
//! Produces the span-annotated AST the executor runs.

use pest::iterators::{Pair, Pairs};
use pest::Parser;
use pest_derive::Parser;
use serde::{Deserialize, Serialize};

use crate::executor::types::ast::{
    BinaryOp, Expr, ForLoopKind, MemberAccess, Span, Stmt, UnaryOp, VarKind,
};

pub mod semantic_validator;

#[cfg(test)]
mod tests;

/* ===================== Program ===================== */

/// A parsed unit of Flow source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    /// Top-level statements in source order
    pub body: Vec<Stmt>,
    /// Span of the entire source
    #[serde(default, skip_serializing_if = "is_default_span")]
    pub span: Span,
}

impl Program {
    /// The body wrapped in a single block statement, ready for the VM
    pub fn into_block(self) -> Stmt {
        Stmt::Block {
            body: self.body,
            span: self.span,
        }
    }
}

fn is_default_span(span: &Span) -> bool {
    *span == Span::default()
}

/* ===================== PEST Parser ===================== */

#[derive(Parser)]
#[grammar = "parser/flow.pest"]
struct FlowParser;

/* ===================== Error Types ===================== */

#[derive(Debug, Clone, thiserror::Error)]
pub enum ParseError {
    #[error("{0}")]
    PestError(String, Option<Span>),
    #[error("{0}")]
    BuildError(String, Option<Span>),
}

impl ParseError {
    pub fn span(&self) -> Option<Span> {
        match self {
            ParseError::PestError(_, span) => *span,
            ParseError::BuildError(_, span) => *span,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ParseError::PestError(msg, _) => msg,
            ParseError::BuildError(msg, _) => msg,
        }
    }
}

impl From<pest::error::Error<Rule>> for ParseError {
    fn from(err: pest::error::Error<Rule>) -> Self {
        let span = match err.line_col {
            pest::error::LineColLocation::Pos((line, col)) => Some(Span {
                start: 0,
                end: 0,
                start_line: line.saturating_sub(1),
                start_col: col.saturating_sub(1),
                end_line: line.saturating_sub(1),
                end_col: col,
            }),
            pest::error::LineColLocation::Span((start_line, start_col), (end_line, end_col)) => {
                Some(Span {
                    start: 0,
                    end: 0,
                    start_line: start_line.saturating_sub(1),
                    start_col: start_col.saturating_sub(1),
                    end_line: end_line.saturating_sub(1),
                    end_col: end_col.saturating_sub(1),
                })
            }
        };
        ParseError::PestError(err.to_string(), span)
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

/* ===================== Span Helpers ===================== */

/// Convert a PEST pair's span to our Span type
fn pair_to_span(pair: &Pair<Rule>, source: &str) -> Span {
    let pest_span = pair.as_span();
    let start = pest_span.start();
    let end = pest_span.end();

    let (start_line, start_col) = offset_to_line_col(source, start);
    let (end_line, end_col) = offset_to_line_col(source, end);

    Span::new(start, end, start_line, start_col, end_line, end_col)
}

/// Convert byte offset to (line, column) - 0-indexed
fn offset_to_line_col(source: &str, offset: usize) -> (usize, usize) {
    let mut line = 0;
    let mut col = 0;
    let mut current_offset = 0;

    for ch in source.chars() {
        if current_offset >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 0;
        } else {
            col += 1;
        }
        current_offset += ch.len_utf8();
    }

    (line, col)
}

/// Take the next inner pair or fail with a build error
fn next_pair<'i>(inner: &mut Pairs<'i, Rule>, what: &str, span: Span) -> ParseResult<Pair<'i, Rule>> {
    inner
        .next()
        .ok_or_else(|| ParseError::BuildError(format!("Expected {}", what), Some(span)))
}

fn first_inner<'i>(pair: Pair<'i, Rule>, what: &str, source: &str) -> ParseResult<Pair<'i, Rule>> {
    let span = pair_to_span(&pair, source);
    next_pair(&mut pair.into_inner(), what, span)
}

/* ===================== Public API ===================== */

/// Parse a Flow source string into a program
pub fn parse_program(source: &str) -> ParseResult<Program> {
    let mut pairs = FlowParser::parse(Rule::program, source)?;
    let program = next_pair(&mut pairs, "program", Span::default())?;
    let span = pair_to_span(&program, source);

    let mut body = Vec::new();
    for pair in program.into_inner() {
        match pair.as_rule() {
            Rule::statement => body.push(build_statement(pair, source)?),
            Rule::EOI => {}
            other => {
                return Err(ParseError::BuildError(
                    format!("Unexpected program content: {:?}", other),
                    Some(pair_to_span(&pair, source)),
                ))
            }
        }
    }

    Ok(Program { body, span })
}

/// Parse a Flow source string into a single block statement (testing API)
pub fn parse(source: &str) -> ParseResult<Stmt> {
    parse_program(source).map(Program::into_block)
}

/* ===================== Statement Builders ===================== */

fn build_statement(pair: Pair<Rule>, source: &str) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair, source);

    match pair.as_rule() {
        Rule::statement => {
            let inner = first_inner(pair, "statement", source)?;
            build_statement(inner, source)
        }
        Rule::block => build_block(pair, source),
        Rule::declare_stmt => build_declare_stmt(pair, source),
        Rule::assign_stmt => build_assign_stmt(pair, source),
        Rule::if_stmt => build_if_stmt(pair, source),
        Rule::while_stmt => build_while_stmt(pair, source),
        Rule::for_loop_stmt => build_for_loop_stmt(pair, source),
        Rule::try_stmt => build_try_stmt(pair, source),
        Rule::return_stmt => {
            // Skip the keyword
            let value = match pair.into_inner().nth(1) {
                Some(expr_pair) => Some(build_expression(expr_pair, source)?),
                None => None,
            };
            Ok(Stmt::Return { value, span })
        }
        Rule::throw_stmt => {
            let expr_pair = pair.into_inner().nth(1).ok_or_else(|| {
                ParseError::BuildError("Expected an expression after throw".to_string(), Some(span))
            })?;
            Ok(Stmt::Throw {
                value: build_expression(expr_pair, source)?,
                span,
            })
        }
        Rule::break_stmt => Ok(Stmt::Break { span }),
        Rule::continue_stmt => Ok(Stmt::Continue { span }),
        Rule::expr_stmt => {
            let expr_pair = first_inner(pair, "expression", source)?;
            let expr = build_expression(expr_pair, source)?;
            Ok(Stmt::Expr { expr, span })
        }
        _ => Err(ParseError::BuildError(
            format!("Unexpected statement rule: {:?}", pair.as_rule()),
            Some(span),
        )),
    }
}

fn build_block(pair: Pair<Rule>, source: &str) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair, source);
    let statements: Result<Vec<Stmt>, ParseError> = pair
        .into_inner()
        .map(|stmt_pair| build_statement(stmt_pair, source))
        .collect();

    Ok(Stmt::Block {
        body: statements?,
        span,
    })
}

fn build_var_kind(pair: &Pair<Rule>, source: &str) -> ParseResult<VarKind> {
    match pair.as_rule() {
        Rule::kw_let => Ok(VarKind::Let),
        Rule::kw_const => Ok(VarKind::Const),
        _ => Err(ParseError::BuildError(
            format!("Expected 'let' or 'const', got: {}", pair.as_str()),
            Some(pair_to_span(pair, source)),
        )),
    }
}

fn build_declare_stmt(pair: Pair<Rule>, source: &str) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair, source);
    let mut inner = pair.into_inner();

    let kind_pair = next_pair(&mut inner, "'let' or 'const'", span)?;
    let var_kind = build_var_kind(&kind_pair, source)?;

    let name = next_pair(&mut inner, "identifier", span)?.as_str().to_string();

    let init = match inner.next() {
        Some(expr_pair) => Some(build_expression(expr_pair, source)?),
        None => None,
    };

    Ok(Stmt::Declare {
        var_kind,
        name,
        init,
        span,
    })
}

fn build_assign_stmt(pair: Pair<Rule>, source: &str) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair, source);
    let mut inner = pair.into_inner();

    let var_pair = next_pair(&mut inner, "identifier", span)?;
    let var_span = pair_to_span(&var_pair, source);
    let var = var_pair.as_str().to_string();

    let mut path = Vec::new();
    let mut op = None;
    let mut value = None;

    for pair in inner {
        match pair.as_rule() {
            Rule::assign_path_segment => {
                let segment_span = pair_to_span(&pair, source);
                let segment_inner = first_inner(pair, "path segment", source)?;
                match segment_inner.as_rule() {
                    Rule::identifier_name => path.push(MemberAccess::Prop {
                        property: segment_inner.as_str().to_string(),
                        span: segment_span,
                    }),
                    _ => path.push(MemberAccess::Index {
                        expr: build_expression(segment_inner, source)?,
                        span: segment_span,
                    }),
                }
            }
            Rule::assign_op => op = Some(pair.as_str().trim().to_string()),
            Rule::expression => value = Some(build_expression(pair, source)?),
            _ => {}
        }
    }

    let value = value.ok_or_else(|| {
        ParseError::BuildError("Expected a value to assign".to_string(), Some(span))
    })?;

    // `x op= v` is sugar for `x = x op v`
    let compound = match op.as_deref() {
        Some("+=") => Some(BinaryOp::Add),
        Some("-=") => Some(BinaryOp::Sub),
        Some("*=") => Some(BinaryOp::Mul),
        Some("/=") => Some(BinaryOp::Div),
        Some("%=") => Some(BinaryOp::Mod),
        _ => None,
    };
    let value = match compound {
        Some(op) => Expr::BinaryOp {
            op,
            left: Box::new(target_expr(&var, var_span, &path)),
            right: Box::new(value),
            span,
        },
        None => value,
    };

    Ok(Stmt::Assign {
        var,
        var_span,
        path,
        value,
        span,
    })
}

/// Read-back expression for an assignment target
fn target_expr(var: &str, var_span: Span, path: &[MemberAccess]) -> Expr {
    let mut expr = Expr::Ident {
        name: var.to_string(),
        span: var_span,
    };
    for segment in path {
        expr = match segment {
            MemberAccess::Prop { property, span } => Expr::Member {
                object: Box::new(expr),
                property: property.clone(),
                property_span: *span,
                optional: false,
                span: var_span.merge(span),
            },
            MemberAccess::Index { expr: index, span } => Expr::Index {
                object: Box::new(expr),
                index: Box::new(index.clone()),
                span: var_span.merge(span),
            },
        };
    }
    expr
}

fn build_if_stmt(pair: Pair<Rule>, source: &str) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair, source);
    let mut inner = pair.into_inner().filter(|p| p.as_rule() != Rule::kw_if);

    let test_pair = inner.next().ok_or_else(|| missing("condition", span))?;
    let test = build_expression(test_pair, source)?;

    let then_pair = inner.next().ok_or_else(|| missing("statement", span))?;
    let then_s = build_statement(then_pair, source)?;

    let else_s = match inner.next() {
        Some(else_clause_pair) => {
            let else_inner = else_clause_pair
                .into_inner()
                .find(|p| p.as_rule() == Rule::statement)
                .ok_or_else(|| missing("else branch", span))?;
            Some(Box::new(build_statement(else_inner, source)?))
        }
        None => None,
    };

    Ok(Stmt::If {
        test,
        then_s: Box::new(then_s),
        else_s,
        span,
    })
}

fn build_while_stmt(pair: Pair<Rule>, source: &str) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair, source);
    let mut inner = pair.into_inner().skip(1);

    let test_pair = inner.next().ok_or_else(|| missing("condition", span))?;
    let test = build_expression(test_pair, source)?;

    let body_pair = inner.next().ok_or_else(|| missing("loop body", span))?;
    let body = build_statement(body_pair, source)?;

    Ok(Stmt::While {
        test,
        body: Box::new(body),
        span,
    })
}

fn build_for_loop_stmt(pair: Pair<Rule>, source: &str) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair, source);
    let mut inner = pair.into_inner().skip(1);

    // let/const is accepted but the binding always lands in the Scope
    let kind_pair = inner.next().ok_or_else(|| missing("'let' or 'const'", span))?;
    build_var_kind(&kind_pair, source)?;

    let binding_pair = inner.next().ok_or_else(|| missing("loop variable", span))?;
    let binding_span = pair_to_span(&binding_pair, source);
    let binding = binding_pair.as_str().to_string();

    let kind_pair = inner.next().ok_or_else(|| missing("'of' or 'in'", span))?;
    let kind = match kind_pair.as_rule() {
        Rule::kw_of => ForLoopKind::Of,
        Rule::kw_in => ForLoopKind::In,
        _ => {
            return Err(ParseError::BuildError(
                format!("Expected 'of' or 'in', got: {}", kind_pair.as_str()),
                Some(pair_to_span(&kind_pair, source)),
            ))
        }
    };

    let iterable_pair = inner.next().ok_or_else(|| missing("iterable", span))?;
    let iterable = build_expression(iterable_pair, source)?;

    let body_pair = inner.next().ok_or_else(|| missing("loop body", span))?;
    let body = build_statement(body_pair, source)?;

    Ok(Stmt::ForLoop {
        kind,
        binding,
        binding_span,
        iterable,
        body: Box::new(body),
        span,
    })
}

fn build_try_stmt(pair: Pair<Rule>, source: &str) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair, source);
    let mut inner = pair
        .into_inner()
        .filter(|p| !matches!(p.as_rule(), Rule::kw_try | Rule::kw_catch));

    let try_body_pair = inner.next().ok_or_else(|| missing("try block", span))?;
    let body = build_statement(try_body_pair, source)?;

    let catch_var_pair = inner.next().ok_or_else(|| missing("catch variable", span))?;
    let catch_var_span = pair_to_span(&catch_var_pair, source);
    let catch_var = catch_var_pair.as_str().to_string();

    let catch_body_pair = inner.next().ok_or_else(|| missing("catch block", span))?;
    let catch_body = build_statement(catch_body_pair, source)?;

    Ok(Stmt::Try {
        body: Box::new(body),
        catch_var,
        catch_var_span,
        catch_body: Box::new(catch_body),
        span,
    })
}

fn missing(what: &str, span: Span) -> ParseError {
    ParseError::BuildError(format!("Expected {}", what), Some(span))
}

/* ===================== Expression Builders ===================== */

fn build_binary_expr(pair: Pair<Rule>, source: &str) -> ParseResult<Expr> {
    let span = pair_to_span(&pair, source);
    let inner_pairs: Vec<_> = pair.into_inner().collect();

    let Some(first) = inner_pairs.first() else {
        return Err(ParseError::BuildError(
            "Empty binary expression".to_string(),
            Some(span),
        ));
    };

    let mut left = build_expression(first.clone(), source)?;

    for chunk in inner_pairs[1..].chunks(2) {
        let [op_pair, right_pair] = chunk else {
            return Err(ParseError::BuildError(
                "Missing right operand after operator".to_string(),
                Some(span),
            ));
        };

        let op = match op_pair.as_rule() {
            Rule::op_and => BinaryOp::And,
            Rule::op_or => BinaryOp::Or,
            Rule::op_nullish => BinaryOp::Nullish,
            Rule::op_eq => BinaryOp::Eq,
            Rule::op_ne => BinaryOp::Ne,
            Rule::op_lt => BinaryOp::Lt,
            Rule::op_lte => BinaryOp::Lte,
            Rule::op_gt => BinaryOp::Gt,
            Rule::op_gte => BinaryOp::Gte,
            Rule::op_add => BinaryOp::Add,
            Rule::op_sub => BinaryOp::Sub,
            Rule::op_mul => BinaryOp::Mul,
            Rule::op_div => BinaryOp::Div,
            Rule::op_mod => BinaryOp::Mod,
            other => {
                return Err(ParseError::BuildError(
                    format!("Expected operator, got {:?}", other),
                    Some(span),
                ))
            }
        };

        let right = build_expression(right_pair.clone(), source)?;
        let new_span = left.span().merge(&right.span());
        left = Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
            span: new_span,
        };
    }

    Ok(left)
}

fn build_expression(pair: Pair<Rule>, source: &str) -> ParseResult<Expr> {
    let span = pair_to_span(&pair, source);

    match pair.as_rule() {
        Rule::expression | Rule::primary | Rule::literal => {
            let inner = first_inner(pair, "expression", source)?;
            build_expression(inner, source)
        }
        Rule::yield_expr => {
            let inner = match pair.into_inner().nth(1) {
                Some(expr_pair) => Some(Box::new(build_expression(expr_pair, source)?)),
                None => None,
            };
            Ok(Expr::Yield { inner, span })
        }
        Rule::ternary_expr => {
            let mut inner = pair.into_inner();
            let condition_pair = next_pair(&mut inner, "condition", span)?;
            let condition = build_expression(condition_pair, source)?;

            match inner.next() {
                Some(consequent_pair) => {
                    let consequent = build_expression(consequent_pair, source)?;
                    let alternate_pair = next_pair(&mut inner, "alternate", span)?;
                    let alternate = build_expression(alternate_pair, source)?;
                    Ok(Expr::Ternary {
                        condition: Box::new(condition),
                        consequent: Box::new(consequent),
                        alternate: Box::new(alternate),
                        span,
                    })
                }
                None => Ok(condition),
            }
        }
        Rule::nullish_expr
        | Rule::logical_or_expr
        | Rule::logical_and_expr
        | Rule::equality_expr
        | Rule::comparison_expr
        | Rule::additive_expr
        | Rule::multiplicative_expr => build_binary_expr(pair, source),
        Rule::unary_expr => {
            let mut inner = pair.into_inner();
            let first = next_pair(&mut inner, "operand", span)?;

            let op = match first.as_rule() {
                Rule::op_not => UnaryOp::Not,
                Rule::op_neg => UnaryOp::Neg,
                _ => return build_expression(first, source),
            };
            let operand_pair = next_pair(&mut inner, "operand", span)?;
            let operand = build_expression(operand_pair, source)?;
            Ok(Expr::Unary {
                op,
                operand: Box::new(operand),
                span,
            })
        }
        Rule::await_expr => {
            let expr_pair = pair
                .into_inner()
                .nth(1)
                .ok_or_else(|| missing("expression after await", span))?;
            let inner_expr = build_expression(expr_pair, source)?;
            Ok(Expr::Await {
                inner: Box::new(inner_expr),
                span,
            })
        }
        Rule::call_expr => build_call_expr(pair, source),
        Rule::identifier => Ok(Expr::Ident {
            name: pair.as_str().to_string(),
            span,
        }),
        Rule::number => {
            let num_str = pair.as_str();
            let value = num_str.parse::<f64>().map_err(|e| {
                ParseError::BuildError(
                    format!("Failed to parse number '{}': {}", num_str, e),
                    Some(span),
                )
            })?;
            Ok(Expr::LitNum { v: value, span })
        }
        Rule::boolean => Ok(Expr::LitBool {
            v: pair.as_str() == "true",
            span,
        }),
        Rule::string => Ok(Expr::LitStr {
            v: build_string(pair, source)?,
            span,
        }),
        Rule::null_lit => Ok(Expr::LitNull { span }),
        Rule::object_lit => build_object_literal(pair, source),
        Rule::array_lit => build_array_literal(pair, source),
        _ => Err(ParseError::BuildError(
            format!("Unexpected expression rule: {:?}", pair.as_rule()),
            Some(span),
        )),
    }
}

fn build_call_expr(pair: Pair<Rule>, source: &str) -> ParseResult<Expr> {
    let span = pair_to_span(&pair, source);
    let mut inner = pair.into_inner();
    let primary_pair = next_pair(&mut inner, "expression", span)?;
    let mut expr = build_expression(primary_pair, source)?;

    for postfix_pair in inner {
        let postfix_span = pair_to_span(&postfix_pair, source);
        let postfix_inner = first_inner(postfix_pair, "postfix", source)?;
        let new_span = expr.span().merge(&postfix_span);

        expr = match postfix_inner.as_rule() {
            Rule::call_suffix => {
                let args = match postfix_inner.into_inner().next() {
                    Some(arg_list_pair) => build_expr_list(arg_list_pair, source)?,
                    None => vec![],
                };
                Expr::Call {
                    callee: Box::new(expr),
                    args,
                    span: new_span,
                }
            }
            Rule::optional_access | Rule::regular_access => {
                let optional = postfix_inner.as_rule() == Rule::optional_access;
                let prop_pair = first_inner(postfix_inner, "property name", source)?;
                Expr::Member {
                    object: Box::new(expr),
                    property: prop_pair.as_str().to_string(),
                    property_span: pair_to_span(&prop_pair, source),
                    optional,
                    span: new_span,
                }
            }
            Rule::index_suffix => {
                let index_pair = first_inner(postfix_inner, "index", source)?;
                Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(build_expression(index_pair, source)?),
                    span: new_span,
                }
            }
            other => {
                return Err(ParseError::BuildError(
                    format!("Unexpected postfix rule: {:?}", other),
                    Some(postfix_span),
                ))
            }
        };
    }

    Ok(expr)
}

fn build_expr_list(pair: Pair<Rule>, source: &str) -> ParseResult<Vec<Expr>> {
    pair.into_inner()
        .map(|expr_pair| build_expression(expr_pair, source))
        .collect()
}

/// Decode a string literal's escapes
fn build_string(pair: Pair<Rule>, source: &str) -> ParseResult<String> {
    let content = first_inner(pair, "string content", source)?;
    let mut out = String::with_capacity(content.as_str().len());
    let mut chars = content.as_str().chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    Ok(out)
}

fn build_object_literal(pair: Pair<Rule>, source: &str) -> ParseResult<Expr> {
    let span = pair_to_span(&pair, source);

    let properties = match pair.into_inner().next() {
        Some(property_list_pair) => property_list_pair
            .into_inner()
            .map(|property_pair| build_property(property_pair, source))
            .collect::<ParseResult<Vec<_>>>()?,
        None => vec![],
    };

    Ok(Expr::LitObj { properties, span })
}

fn build_property(pair: Pair<Rule>, source: &str) -> ParseResult<(String, Span, Expr)> {
    let inner = first_inner(pair, "property", source)?;
    let inner_span = pair_to_span(&inner, source);

    match inner.as_rule() {
        Rule::property_pair => {
            let mut inner_pairs = inner.into_inner();
            let key_pair = next_pair(&mut inner_pairs, "property key", inner_span)?;
            let key_span = pair_to_span(&key_pair, source);
            let key = match key_pair.as_rule() {
                Rule::string => build_string(key_pair, source)?,
                _ => key_pair.as_str().to_string(),
            };
            let value_pair = next_pair(&mut inner_pairs, "property value", inner_span)?;
            let value = build_expression(value_pair, source)?;
            Ok((key, key_span, value))
        }
        Rule::property_shorthand => {
            let key = inner.as_str().to_string();
            let value = Expr::Ident {
                name: key.clone(),
                span: inner_span,
            };
            Ok((key, inner_span, value))
        }
        _ => Err(ParseError::BuildError(
            format!("Unexpected property rule: {:?}", inner.as_rule()),
            Some(inner_span),
        )),
    }
}

fn build_array_literal(pair: Pair<Rule>, source: &str) -> ParseResult<Expr> {
    let span = pair_to_span(&pair, source);

    let elements = match pair.into_inner().next() {
        Some(element_list_pair) => build_expr_list(element_list_pair, source)?,
        None => vec![],
    };

    Ok(Expr::LitList { elements, span })
}
