//! Rule: Suspension Placement
//!
//! Reports an error when `await` or `yield` appears inside an expression
//! rather than as the outermost expression of a statement. The VM resumes a
//! paused statement by evaluating it again, which is only sound when nothing
//! was evaluated around the suspension point.
//!
//! # Valid
//!
//! ```text
//! await sleep(10)
//! let x = await host("fetch", 1)
//! x = yield x
//! return await sleep(1)
//! ```
//!
//! # Invalid
//!
//! ```text
//! let x = (await sleep(1)) + 1   // await inside binary op
//! foo(yield 1)                   // yield inside call args
//! [await foo]                    // await inside array
//! if (await ready) { }           // await in condition
//! ```

use crate::executor::types::ast::{Expr, MemberAccess, Stmt};
use crate::parser::Program;

use super::super::{ValidationError, ValidationRule};

/// Rule that checks for suspension points nested inside other expressions.
pub struct SuspensionPlacementRule;

impl ValidationRule for SuspensionPlacementRule {
    fn id(&self) -> &'static str {
        "suspension-placement"
    }

    fn description(&self) -> &'static str {
        "await and yield must be the outermost expression of a statement"
    }

    fn validate(&self, program: &Program, _source: &str) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        for stmt in &program.body {
            check_stmt(stmt, &mut errors, self.id());
        }
        errors
    }
}

// ============================================================================
// AST Traversal
// ============================================================================

/// Check a statement, allowing a suspension at "top level" positions
fn check_stmt(stmt: &Stmt, errors: &mut Vec<ValidationError>, rule_id: &'static str) {
    match stmt {
        // These ALLOW a suspension as the outermost expression
        Stmt::Expr { expr, .. } | Stmt::Emit { expr, .. } => {
            check_top_level_expr(expr, errors, rule_id);
        }

        Stmt::Declare { init, .. } => {
            if let Some(init_expr) = init {
                check_top_level_expr(init_expr, errors, rule_id);
            }
        }

        Stmt::Assign { value, path, .. } => {
            check_top_level_expr(value, errors, rule_id);
            for segment in path {
                if let MemberAccess::Index { expr, .. } = segment {
                    check_nested_expr(expr, errors, rule_id);
                }
            }
        }

        Stmt::Return { value, .. } => {
            if let Some(expr) = value {
                check_top_level_expr(expr, errors, rule_id);
            }
        }

        // These DON'T allow suspensions in their expressions
        Stmt::Throw { value, .. } => {
            check_nested_expr(value, errors, rule_id);
        }

        Stmt::If {
            test,
            then_s,
            else_s,
            ..
        } => {
            check_nested_expr(test, errors, rule_id);
            check_stmt(then_s, errors, rule_id);
            if let Some(else_stmt) = else_s {
                check_stmt(else_stmt, errors, rule_id);
            }
        }

        Stmt::While { test, body, .. } => {
            check_nested_expr(test, errors, rule_id);
            check_stmt(body, errors, rule_id);
        }

        Stmt::ForLoop { iterable, body, .. } => {
            check_nested_expr(iterable, errors, rule_id);
            check_stmt(body, errors, rule_id);
        }

        Stmt::Try {
            body, catch_body, ..
        } => {
            check_stmt(body, errors, rule_id);
            check_stmt(catch_body, errors, rule_id);
        }

        Stmt::Block { body, .. } => {
            for stmt in body {
                check_stmt(stmt, errors, rule_id);
            }
        }

        // These don't contain expressions
        Stmt::Break { .. } | Stmt::Continue { .. } => {}
    }
}

/// Check a "top level" expression where a suspension IS allowed as the
/// outermost expression. Its operand is still checked.
fn check_top_level_expr(expr: &Expr, errors: &mut Vec<ValidationError>, rule_id: &'static str) {
    match expr {
        Expr::Await { inner, .. } => check_nested_expr(inner, errors, rule_id),
        Expr::Yield { inner, .. } => {
            if let Some(inner) = inner {
                check_nested_expr(inner, errors, rule_id);
            }
        }
        _ => check_nested_expr(expr, errors, rule_id),
    }
}

/// Check an expression where suspensions are NOT allowed.
fn check_nested_expr(expr: &Expr, errors: &mut Vec<ValidationError>, rule_id: &'static str) {
    match expr {
        Expr::Await { span, inner } => {
            errors.push(ValidationError::error(
                *span,
                "await must be the outermost expression of a statement",
                rule_id,
            ));
            // Keep going to report every nested suspension
            check_nested_expr(inner, errors, rule_id);
        }

        Expr::Yield { span, inner } => {
            errors.push(ValidationError::error(
                *span,
                "yield must be the outermost expression of a statement",
                rule_id,
            ));
            if let Some(inner) = inner {
                check_nested_expr(inner, errors, rule_id);
            }
        }

        Expr::BinaryOp { left, right, .. } => {
            check_nested_expr(left, errors, rule_id);
            check_nested_expr(right, errors, rule_id);
        }

        Expr::Unary { operand, .. } => {
            check_nested_expr(operand, errors, rule_id);
        }

        Expr::Ternary {
            condition,
            consequent,
            alternate,
            ..
        } => {
            check_nested_expr(condition, errors, rule_id);
            check_nested_expr(consequent, errors, rule_id);
            check_nested_expr(alternate, errors, rule_id);
        }

        Expr::Call { callee, args, .. } => {
            check_nested_expr(callee, errors, rule_id);
            for arg in args {
                check_nested_expr(arg, errors, rule_id);
            }
        }

        Expr::Member { object, .. } => {
            check_nested_expr(object, errors, rule_id);
        }

        Expr::Index { object, index, .. } => {
            check_nested_expr(object, errors, rule_id);
            check_nested_expr(index, errors, rule_id);
        }

        Expr::LitList { elements, .. } => {
            for element in elements {
                check_nested_expr(element, errors, rule_id);
            }
        }

        Expr::LitObj { properties, .. } => {
            for (_, _, value) in properties {
                check_nested_expr(value, errors, rule_id);
            }
        }

        // These can't contain suspensions
        Expr::Ident { .. }
        | Expr::LitBool { .. }
        | Expr::LitNum { .. }
        | Expr::LitStr { .. }
        | Expr::LitNull { .. } => {}
    }
}
