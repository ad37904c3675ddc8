//! host(name, ...args) - calls into the embedding application

use super::throw;
use crate::executor::errors;
use crate::executor::expressions::EvalResult;
use crate::executor::types::{Awaitable, Val};

/// Package a host call as an awaitable; the executor's resolver performs it.
pub fn host(args: &[Val]) -> EvalResult {
    let Some((first, rest)) = args.split_first() else {
        return throw(
            errors::WRONG_ARG_COUNT,
            "host() expected at least 1 argument, got 0",
        );
    };
    let name = match first {
        Val::Str(s) => s.clone(),
        other => {
            return throw(
                errors::WRONG_ARG_TYPE,
                format!("host() name must be a string, got {}", other.type_name()),
            )
        }
    };
    EvalResult::Value {
        v: Val::Awaitable(Awaitable::Host {
            name,
            args: rest.to_vec(),
        }),
    }
}
