//! Conversions and type inspection

use super::{expect_arity, throw};
use crate::executor::errors;
use crate::executor::expressions::EvalResult;
use crate::executor::types::Val;

pub fn str(args: &[Val]) -> EvalResult {
    if let Err(e) = expect_arity(args, 1, "str") {
        return e;
    }
    EvalResult::Value {
        v: Val::Str(args[0].display_string()),
    }
}

pub fn repr(args: &[Val]) -> EvalResult {
    if let Err(e) = expect_arity(args, 1, "repr") {
        return e;
    }
    EvalResult::Value {
        v: Val::Str(args[0].repr()),
    }
}

/// num(x) - parse a string or coerce a bool into a number
pub fn num(args: &[Val]) -> EvalResult {
    if let Err(e) = expect_arity(args, 1, "num") {
        return e;
    }
    match &args[0] {
        Val::Num(n) => EvalResult::Value { v: Val::Num(*n) },
        Val::Bool(b) => EvalResult::Value {
            v: Val::Num(if *b { 1.0 } else { 0.0 }),
        },
        Val::Str(s) => match s.trim().parse::<f64>() {
            Ok(n) => EvalResult::Value { v: Val::Num(n) },
            Err(_) => throw(
                errors::TYPE_ERROR,
                format!("Cannot convert {} to a number", args[0].repr()),
            ),
        },
        other => throw(
            errors::WRONG_ARG_TYPE,
            format!("num() cannot convert {}", other.type_name()),
        ),
    }
}

pub fn type_of(args: &[Val]) -> EvalResult {
    if let Err(e) = expect_arity(args, 1, "typeOf") {
        return e;
    }
    EvalResult::Value {
        v: Val::Str(args[0].type_name().to_string()),
    }
}
