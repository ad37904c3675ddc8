//! Flowrepl core
//!
//! Interactive execution of Flow code: the language ([`parser`],
//! [`executor`]), compilation of user snippets ([`compiler`]), async
//! driving with continuations ([`runtime`]) and the command glue on top
//! ([`session`]).

pub mod cli;
pub mod compiler;
pub mod config;
pub mod executor;
pub mod parser;
pub mod runtime;
pub mod scope;
pub mod session;
pub mod tasks;

// Re-export main types
pub use compiler::{compile, CompileError, CompiledUnit, Substitutions};
pub use config::Config;
pub use executor::Val;
pub use runtime::{AsyncCodeExecutor, AsyncSender, ExecError, ProducedResult, ResultKind};
pub use scope::{Retention, Scope};
pub use session::{InvocationContext, RetainStatus, RunOutcome, Session};
pub use tasks::TaskRegistry;
