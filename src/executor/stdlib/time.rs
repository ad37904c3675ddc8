//! sleep(ms)

use super::{expect_arity, expect_num, throw};
use crate::executor::errors;
use crate::executor::expressions::EvalResult;
use crate::executor::types::{Awaitable, Val};

/// sleep(ms) - returns an awaitable; nothing happens until it is awaited
pub fn sleep(args: &[Val]) -> EvalResult {
    if let Err(e) = expect_arity(args, 1, "sleep") {
        return e;
    }
    let ms = match expect_num(&args[0], "sleep", 0) {
        Ok(n) => n,
        Err(e) => return e,
    };
    if ms < 0.0 || ms.is_nan() {
        return throw(
            errors::WRONG_ARG_TYPE,
            "sleep() duration must be a non-negative number",
        );
    }
    EvalResult::Value {
        v: Val::Awaitable(Awaitable::Sleep { ms: ms as u64 }),
    }
}
