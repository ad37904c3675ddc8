//! Rule: Unreachable Code
//!
//! Warns about statements that follow a `return`, `throw`, `break` or
//! `continue` in the same block.

use crate::executor::types::ast::Stmt;
use crate::parser::Program;

use super::super::{ValidationError, ValidationRule};

pub struct UnreachableCodeRule;

impl ValidationRule for UnreachableCodeRule {
    fn id(&self) -> &'static str {
        "unreachable-code"
    }

    fn description(&self) -> &'static str {
        "code after return, throw, break or continue never runs"
    }

    fn validate(&self, program: &Program, _source: &str) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        check_sequence(&program.body, &mut errors, self.id());
        errors
    }
}

fn is_terminator(stmt: &Stmt) -> bool {
    matches!(
        stmt,
        Stmt::Return { .. } | Stmt::Throw { .. } | Stmt::Break { .. } | Stmt::Continue { .. }
    )
}

/// Report the first statement after a terminator, then descend
fn check_sequence(body: &[Stmt], errors: &mut Vec<ValidationError>, rule_id: &'static str) {
    if let Some(pos) = body.iter().position(is_terminator) {
        if let Some(next) = body.get(pos + 1) {
            errors.push(ValidationError::warning(
                next.span(),
                "unreachable code",
                rule_id,
            ));
        }
    }
    for stmt in body {
        check_nested(stmt, errors, rule_id);
    }
}

fn check_nested(stmt: &Stmt, errors: &mut Vec<ValidationError>, rule_id: &'static str) {
    match stmt {
        Stmt::Block { body, .. } => check_sequence(body, errors, rule_id),
        Stmt::If { then_s, else_s, .. } => {
            check_nested(then_s, errors, rule_id);
            if let Some(else_stmt) = else_s {
                check_nested(else_stmt, errors, rule_id);
            }
        }
        Stmt::While { body, .. } | Stmt::ForLoop { body, .. } => {
            check_nested(body, errors, rule_id)
        }
        Stmt::Try {
            body, catch_body, ..
        } => {
            check_nested(body, errors, rule_id);
            check_nested(catch_body, errors, rule_id);
        }
        _ => {}
    }
}
