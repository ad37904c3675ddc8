//! Math.* functions

use super::{expect_arity, expect_num, throw};
use crate::executor::errors;
use crate::executor::expressions::EvalResult;
use crate::executor::types::Val;

fn unary(args: &[Val], name: &str, f: impl Fn(f64) -> f64) -> EvalResult {
    if let Err(e) = expect_arity(args, 1, name) {
        return e;
    }
    match expect_num(&args[0], name, 0) {
        Ok(n) => EvalResult::Value { v: Val::Num(f(n)) },
        Err(e) => e,
    }
}

pub fn floor(args: &[Val]) -> EvalResult {
    unary(args, "Math.floor", f64::floor)
}

pub fn ceil(args: &[Val]) -> EvalResult {
    unary(args, "Math.ceil", f64::ceil)
}

pub fn abs(args: &[Val]) -> EvalResult {
    unary(args, "Math.abs", f64::abs)
}

/// Rounds half up, like JavaScript's Math.round
pub fn round(args: &[Val]) -> EvalResult {
    unary(args, "Math.round", |n| (n + 0.5).floor())
}

pub fn sqrt(args: &[Val]) -> EvalResult {
    unary(args, "Math.sqrt", f64::sqrt)
}

pub fn min(args: &[Val]) -> EvalResult {
    fold(args, "Math.min", f64::min)
}

pub fn max(args: &[Val]) -> EvalResult {
    fold(args, "Math.max", f64::max)
}

fn fold(args: &[Val], name: &str, f: impl Fn(f64, f64) -> f64) -> EvalResult {
    if args.is_empty() {
        return throw(
            errors::WRONG_ARG_COUNT,
            format!("{}() expected at least 1 argument, got 0", name),
        );
    }
    let mut acc: Option<f64> = None;
    for (i, arg) in args.iter().enumerate() {
        let n = match expect_num(arg, name, i) {
            Ok(n) => n,
            Err(e) => return e,
        };
        acc = Some(match acc {
            Some(a) => f(a, n),
            None => n,
        });
    }
    EvalResult::Value {
        v: Val::Num(acc.unwrap_or(f64::NAN)),
    }
}
