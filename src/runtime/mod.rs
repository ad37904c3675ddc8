//! # Runtime - driving compiled units asynchronously
//!
//! The executor layer is pure: it steps a VM until the program pauses. This
//! module puts it on tokio:
//!
//! - [`AsyncCodeExecutor`] owns the VM for one invocation, resolves the
//!   awaitables the program suspends on and surfaces every produced value.
//! - [`AsyncSender`] wraps the executor in a one-shot continuation protocol
//!   so a consumer can answer each produced value.
//! - [`AwaitResolver`] is the seam to the embedding application.

pub mod awaitable;
pub mod executor;
pub mod sender;

#[cfg(test)]
mod tests;

pub use awaitable::{AwaitResolver, DefaultResolver};
pub use executor::{Advance, AsyncCodeExecutor, DEFAULT_YIELD_INTERVAL};
pub use sender::{AsyncSender, Continuation};

use crate::compiler::CompileError;
use crate::executor::{Span, Val};
use serde::{Deserialize, Serialize};

/* ===================== Produced Results ===================== */

/// Whether the consumer's reply to a result reaches the program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultKind {
    /// An emitted expression or `yield`; a reply becomes the continuation value
    Intermediate,
    /// The trailing expression or the `return` value; a reply is ignored
    Final,
}

/// One value handed out by a running program
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProducedResult {
    pub value: Val,
    pub kind: ResultKind,
}

impl ProducedResult {
    pub fn intermediate(value: Val) -> Self {
        Self {
            value,
            kind: ResultKind::Intermediate,
        }
    }

    pub fn final_value(value: Val) -> Self {
        Self {
            value,
            kind: ResultKind::Final,
        }
    }

    pub fn is_final(&self) -> bool {
        self.kind == ResultKind::Final
    }
}

/* ===================== Errors ===================== */

/// A value thrown by the program that nothing caught
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{}", describe_throw(.value, .span))]
pub struct RuntimeError {
    /// The thrown value, unchanged
    pub value: Val,
    /// Statement the throw escaped from
    pub span: Option<Span>,
}

fn describe_throw(value: &Val, span: &Option<Span>) -> String {
    let what = match value {
        Val::Error(info) => info.to_string(),
        other => format!("Uncaught {}", other.repr()),
    };
    match span {
        Some(span) => format!("{} (at {})", what, span),
        None => what,
    }
}

/// Why an invocation ended without completing
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExecError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl ExecError {
    /// The thrown value for runtime failures
    pub fn thrown(&self) -> Option<&Val> {
        match self {
            ExecError::Runtime(e) => Some(&e.value),
            ExecError::Compile(_) => None,
        }
    }
}
