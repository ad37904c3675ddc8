//! # Executor - Resumable Stack-Driven Interpreter
//!
//! Runs compiled Flow programs against a [`Scope`](crate::scope::Scope).
//!
//! ## Core Principles
//!
//! 1. **Stack-driven execution**: All state in `frames: Vec<Frame>`, no recursion across statements
//! 2. **Statement-level execution**: Each frame has a phase tracking micro-steps
//! 3. **Centralized control flow**: `Control` enum manages break/continue/return/throw
//! 4. **Pause points**: `Control::Suspend` (the code awaits something) and
//!    `Control::Yield` (the code hands out a value) stop the loop until `resume()`
//! 5. **Pure executor**: No I/O, no async - the runtime layer resolves awaitables

pub mod errors;
pub mod exec_loop;
pub mod expressions;
pub mod statements;
pub mod stdlib;
pub mod types;
pub mod vm;

#[cfg(test)]
mod tests;

// Re-export commonly used items
pub use errors::ErrorInfo;
pub use exec_loop::{run_until_paused, step};
pub use expressions::EvalResult;
pub use types::{Awaitable, Control, Expr, Span, Stmt, Val};
pub use vm::{Step, VM};
