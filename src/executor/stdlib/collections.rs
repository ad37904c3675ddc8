//! List and object helpers
//!
//! Values are immutable copies, so `push` returns a new list instead of
//! mutating its argument.

use super::{expect_arity, expect_num, throw};
use crate::executor::errors;
use crate::executor::expressions::EvalResult;
use crate::executor::types::Val;

/// Longest list `range` builds
pub const MAX_RANGE_LEN: usize = 10_000_000;

/// range(n) / range(start, end) / range(start, end, step)
pub fn range(args: &[Val]) -> EvalResult {
    let (start, end, step) = match args.len() {
        1 => match expect_num(&args[0], "range", 0) {
            Ok(end) => (0.0, end, 1.0),
            Err(e) => return e,
        },
        2 | 3 => {
            let start = match expect_num(&args[0], "range", 0) {
                Ok(n) => n,
                Err(e) => return e,
            };
            let end = match expect_num(&args[1], "range", 1) {
                Ok(n) => n,
                Err(e) => return e,
            };
            let step = match args.get(2) {
                Some(arg) => match expect_num(arg, "range", 2) {
                    Ok(n) => n,
                    Err(e) => return e,
                },
                None => 1.0,
            };
            (start, end, step)
        }
        n => {
            return throw(
                errors::WRONG_ARG_COUNT,
                format!("range() expected 1 to 3 arguments, got {}", n),
            )
        }
    };

    if !(start.is_finite() && end.is_finite() && step.is_finite()) {
        return throw(errors::WRONG_ARG_TYPE, "range() arguments must be finite numbers");
    }
    if step == 0.0 {
        return throw(errors::WRONG_ARG_TYPE, "range() step must not be zero");
    }

    // One call runs inside a single VM step, where cancellation cannot reach
    let count = ((end - start) / step).ceil().max(0.0);
    if count > MAX_RANGE_LEN as f64 {
        return throw(
            errors::WRONG_ARG_TYPE,
            format!("range() would produce more than {} items", MAX_RANGE_LEN),
        );
    }

    let mut items = Vec::with_capacity(count as usize);
    let mut current = start;
    while (step > 0.0 && current < end) || (step < 0.0 && current > end) {
        items.push(Val::Num(current));
        current += step;
    }

    EvalResult::Value { v: Val::List(items) }
}

/// len(x) - length of a list, string (in characters) or object
pub fn len(args: &[Val]) -> EvalResult {
    if let Err(e) = expect_arity(args, 1, "len") {
        return e;
    }
    let n = match &args[0] {
        Val::List(items) => items.len(),
        Val::Str(s) => s.chars().count(),
        Val::Obj(map) => map.len(),
        other => {
            return throw(
                errors::WRONG_ARG_TYPE,
                format!("len() is not defined for {}", other.type_name()),
            )
        }
    };
    EvalResult::Value { v: Val::Num(n as f64) }
}

/// keys(o) - sorted keys of an object
pub fn keys(args: &[Val]) -> EvalResult {
    if let Err(e) = expect_arity(args, 1, "keys") {
        return e;
    }
    match &args[0] {
        Val::Obj(map) => EvalResult::Value {
            v: Val::List(map.keys().map(|k| Val::Str(k.clone())).collect()),
        },
        other => throw(
            errors::WRONG_ARG_TYPE,
            format!("keys() expects an object, got {}", other.type_name()),
        ),
    }
}

/// values(o) - values of an object, in key order
pub fn values(args: &[Val]) -> EvalResult {
    if let Err(e) = expect_arity(args, 1, "values") {
        return e;
    }
    match &args[0] {
        Val::Obj(map) => EvalResult::Value {
            v: Val::List(map.values().cloned().collect()),
        },
        other => throw(
            errors::WRONG_ARG_TYPE,
            format!("values() expects an object, got {}", other.type_name()),
        ),
    }
}

/// push(list, v) - a copy of `list` with `v` appended
pub fn push(args: &[Val]) -> EvalResult {
    if let Err(e) = expect_arity(args, 2, "push") {
        return e;
    }
    match &args[0] {
        Val::List(items) => {
            let mut items = items.clone();
            items.push(args[1].clone());
            EvalResult::Value { v: Val::List(items) }
        }
        other => throw(
            errors::WRONG_ARG_TYPE,
            format!("push() expects a list, got {}", other.type_name()),
        ),
    }
}
