//! Standard library
//!
//! Built-in functions are looked up by name when an identifier is not bound in
//! the Scope, so user code can shadow them. They are plain values
//! (`Val::NativeFunc`) and are dispatched through [`call_function`].

pub mod collections;
pub mod convert;
pub mod host;
pub mod math;
pub mod time;

use super::errors::{self, ErrorInfo};
use super::expressions::EvalResult;
use super::types::Val;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Standard library function identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StdlibFunc {
    Range,
    Len,
    Keys,
    Values,
    Push,
    Str,
    Repr,
    Num,
    TypeOf,
    Sleep,
    Host,
    MathFloor,
    MathCeil,
    MathAbs,
    MathRound,
    MathMin,
    MathMax,
    MathSqrt,
}

impl StdlibFunc {
    pub fn name(&self) -> &'static str {
        match self {
            StdlibFunc::Range => "range",
            StdlibFunc::Len => "len",
            StdlibFunc::Keys => "keys",
            StdlibFunc::Values => "values",
            StdlibFunc::Push => "push",
            StdlibFunc::Str => "str",
            StdlibFunc::Repr => "repr",
            StdlibFunc::Num => "num",
            StdlibFunc::TypeOf => "typeOf",
            StdlibFunc::Sleep => "sleep",
            StdlibFunc::Host => "host",
            StdlibFunc::MathFloor => "Math.floor",
            StdlibFunc::MathCeil => "Math.ceil",
            StdlibFunc::MathAbs => "Math.abs",
            StdlibFunc::MathRound => "Math.round",
            StdlibFunc::MathMin => "Math.min",
            StdlibFunc::MathMax => "Math.max",
            StdlibFunc::MathSqrt => "Math.sqrt",
        }
    }
}

/// Resolve a global built-in by name
pub fn lookup_global(name: &str) -> Option<Val> {
    let func = match name {
        "range" => StdlibFunc::Range,
        "len" => StdlibFunc::Len,
        "keys" => StdlibFunc::Keys,
        "values" => StdlibFunc::Values,
        "push" => StdlibFunc::Push,
        "str" => StdlibFunc::Str,
        "repr" => StdlibFunc::Repr,
        "num" => StdlibFunc::Num,
        "typeOf" => StdlibFunc::TypeOf,
        "sleep" => StdlibFunc::Sleep,
        "host" => StdlibFunc::Host,
        "Math" => return Some(math_object()),
        _ => return None,
    };
    Some(Val::NativeFunc(func))
}

fn math_object() -> Val {
    let mut obj = BTreeMap::new();
    for func in [
        StdlibFunc::MathFloor,
        StdlibFunc::MathCeil,
        StdlibFunc::MathAbs,
        StdlibFunc::MathRound,
        StdlibFunc::MathMin,
        StdlibFunc::MathMax,
        StdlibFunc::MathSqrt,
    ] {
        let short = func.name().trim_start_matches("Math.");
        obj.insert(short.to_string(), Val::NativeFunc(func));
    }
    Val::Obj(obj)
}

/// Call a standard library function
pub fn call_function(func: StdlibFunc, args: &[Val]) -> EvalResult {
    match func {
        StdlibFunc::Range => collections::range(args),
        StdlibFunc::Len => collections::len(args),
        StdlibFunc::Keys => collections::keys(args),
        StdlibFunc::Values => collections::values(args),
        StdlibFunc::Push => collections::push(args),
        StdlibFunc::Str => convert::str(args),
        StdlibFunc::Repr => convert::repr(args),
        StdlibFunc::Num => convert::num(args),
        StdlibFunc::TypeOf => convert::type_of(args),
        StdlibFunc::Sleep => time::sleep(args),
        StdlibFunc::Host => host::host(args),
        StdlibFunc::MathFloor => math::floor(args),
        StdlibFunc::MathCeil => math::ceil(args),
        StdlibFunc::MathAbs => math::abs(args),
        StdlibFunc::MathRound => math::round(args),
        StdlibFunc::MathMin => math::min(args),
        StdlibFunc::MathMax => math::max(args),
        StdlibFunc::MathSqrt => math::sqrt(args),
    }
}

/* ===================== Argument Helpers ===================== */

pub(crate) fn throw(code: &str, message: impl Into<String>) -> EvalResult {
    EvalResult::Throw {
        error: Val::Error(ErrorInfo::new(code, message)),
    }
}

/// Check the argument count, producing a WrongArgCount throw on mismatch
pub(crate) fn expect_arity(args: &[Val], expected: usize, name: &str) -> Result<(), EvalResult> {
    if args.len() != expected {
        return Err(throw(
            errors::WRONG_ARG_COUNT,
            format!(
                "{}() expected {} argument{}, got {}",
                name,
                expected,
                if expected == 1 { "" } else { "s" },
                args.len()
            ),
        ));
    }
    Ok(())
}

pub(crate) fn expect_num(arg: &Val, name: &str, position: usize) -> Result<f64, EvalResult> {
    match arg {
        Val::Num(n) => Ok(*n),
        other => Err(throw(
            errors::WRONG_ARG_TYPE,
            format!(
                "{}() argument {} must be a number, got {}",
                name,
                position + 1,
                other.type_name()
            ),
        )),
    }
}
