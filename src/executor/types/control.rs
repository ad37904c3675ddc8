//! Control flow and execution frame types

use super::ast::Stmt;
use super::phase::{
    BlockPhase, EmitPhase, EvalPhase, ForLoopPhase, IfPhase, JumpPhase, TryPhase, WhilePhase,
};
use super::values::{Awaitable, Val};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/* ===================== Control Flow ===================== */

/// Control flow state
///
/// This represents active control flow (return, break, continue, throw) and
/// the two pause points (suspend, yield).
/// When control is Break/Continue/Return/Throw, the VM unwinds the stack to
/// find the appropriate handler. For Suspend and Yield the VM stops and waits
/// for `resume()`; it is serializable at that point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum Control {
    None,
    Break,
    Continue,
    Return(Val),
    Throw(Val),
    /// The program awaits something the executor must resolve
    Suspend(Awaitable),
    /// The program hands a value to its consumer
    Yield { value: Val, last: bool },
}

impl Control {
    /// Suspend and Yield leave the VM waiting for `resume()`
    pub fn is_pause(&self) -> bool {
        matches!(self, Control::Suspend(_) | Control::Yield { .. })
    }
}

/* ===================== Frames ===================== */

/// Frame kind - the type and state of a statement being executed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum FrameKind {
    Block { phase: BlockPhase, idx: usize },
    Declare { phase: EvalPhase },
    Assign { phase: EvalPhase },
    Expr { phase: EvalPhase },
    Emit { phase: EmitPhase },
    Return { phase: EvalPhase },
    Throw { phase: EvalPhase },
    If { phase: IfPhase },
    While { phase: WhilePhase },
    ForLoop { phase: ForLoopPhase, idx: usize },
    Try { phase: TryPhase },
    Break { phase: JumpPhase },
    Continue { phase: JumpPhase },
}

impl FrameKind {
    pub fn is_loop(&self) -> bool {
        matches!(self, FrameKind::While { .. } | FrameKind::ForLoop { .. })
    }
}

/// Execution frame - one per active statement
///
/// The frame stack replaces the system call stack, making execution serializable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    /// The kind and state of this frame
    #[serde(flatten)]
    pub kind: FrameKind,

    /// The AST node (statement) this frame represents
    pub node: Arc<Stmt>,

    /// Snapshot of the iterable for `for` loops
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<Val>,
}
