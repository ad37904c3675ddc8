//! Virtual Machine state
//!
//! The VM holds all execution state:
//! - frames: Stack of active statements
//! - control: Current control flow state (return, break, suspend, yield, etc.)
//! - resume_value: What the pending suspension point evaluates to on resume
//!
//! Variables are not part of the VM. They live in the [`Scope`](crate::scope::Scope)
//! passed to every `step`, which outlives the VM when retention is on.

use super::types::{
    BlockPhase, Control, EmitPhase, EvalPhase, ForLoopPhase, Frame, FrameKind, IfPhase, JumpPhase,
    Span, Stmt, TryPhase, Val, WhilePhase,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/* ===================== VM ===================== */

/// Virtual Machine state
///
/// This contains everything needed to execute (and serialize/resume) a program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VM {
    /// Stack of execution frames
    pub frames: Vec<Frame>,

    /// Current control flow state
    pub control: Control,

    /// Value the paused `await`/`yield` evaluates to when execution continues
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_value: Option<Val>,

    /// Span of the statement the active throw was raised from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throw_span: Option<Span>,

    /// Number of steps executed so far
    #[serde(default)]
    pub steps: u64,
}

impl VM {
    /// Create a new VM with a program
    ///
    /// The program is wrapped in a root frame; nothing runs until `step`.
    pub fn new(program: Stmt) -> Self {
        let mut vm = VM {
            frames: vec![],
            control: Control::None,
            resume_value: None,
            throw_span: None,
            steps: 0,
        };

        // Push initial frame for the program
        push_stmt(&mut vm, Arc::new(program));

        vm
    }

    /// True while a Suspend or Yield is waiting for `resume`
    pub fn is_paused(&self) -> bool {
        self.control.is_pause()
    }

    /// True once no more steps can make progress
    pub fn is_finished(&self) -> bool {
        self.frames.is_empty() && !self.control.is_pause()
    }

    /// Continue after a Suspend or Yield
    ///
    /// `value` becomes the result of the paused `await`/`yield` expression;
    /// `None` resumes with null. Returns false when the VM was not paused.
    pub fn resume(&mut self, value: Option<Val>) -> bool {
        if !self.control.is_pause() {
            return false;
        }
        self.control = Control::None;
        self.resume_value = Some(value.unwrap_or(Val::Null));
        true
    }

    /// Continue after a Suspend by throwing `error` from the paused statement
    ///
    /// The error unwinds like any other throw, so an enclosing `try` catches
    /// it. Returns false when the VM was not suspended.
    pub fn throw_into(&mut self, error: Val) -> bool {
        if !matches!(self.control, Control::Suspend(_)) {
            return false;
        }
        self.resume_value = None;
        self.throw_span = self.frames.last().map(|frame| frame.node.span());
        self.control = Control::Throw(error);
        true
    }
}

/* ===================== Frame Management ===================== */

/// Push a new frame for a statement onto the stack
///
/// This determines the initial phase based on the statement type.
pub fn push_stmt(vm: &mut VM, stmt: Arc<Stmt>) {
    let kind = match stmt.as_ref() {
        Stmt::Block { .. } => FrameKind::Block {
            phase: BlockPhase::Execute,
            idx: 0,
        },
        Stmt::Declare { .. } => FrameKind::Declare {
            phase: EvalPhase::Eval,
        },
        Stmt::Assign { .. } => FrameKind::Assign {
            phase: EvalPhase::Eval,
        },
        Stmt::Expr { .. } => FrameKind::Expr {
            phase: EvalPhase::Eval,
        },
        Stmt::Emit { .. } => FrameKind::Emit {
            phase: EmitPhase::Eval,
        },
        Stmt::Return { .. } => FrameKind::Return {
            phase: EvalPhase::Eval,
        },
        Stmt::Throw { .. } => FrameKind::Throw {
            phase: EvalPhase::Eval,
        },
        Stmt::If { .. } => FrameKind::If {
            phase: IfPhase::Eval,
        },
        Stmt::While { .. } => FrameKind::While {
            phase: WhilePhase::Eval,
        },
        Stmt::ForLoop { .. } => FrameKind::ForLoop {
            phase: ForLoopPhase::Init,
            idx: 0,
        },
        Stmt::Try { .. } => FrameKind::Try {
            phase: TryPhase::Enter,
        },
        Stmt::Break { .. } => FrameKind::Break {
            phase: JumpPhase::Signal,
        },
        Stmt::Continue { .. } => FrameKind::Continue {
            phase: JumpPhase::Signal,
        },
    };

    vm.frames.push(Frame {
        kind,
        node: stmt,
        items: Vec::new(),
    });
}

/// Push a child statement, cloning it out of its parent node
pub fn push_child(vm: &mut VM, stmt: &Stmt) {
    push_stmt(vm, Arc::new(stmt.clone()));
}

/* ===================== Step Result ===================== */

/// Result of executing one step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Continue to next step
    Continue,
    /// Execution complete or paused; inspect `vm.control`
    Done,
}
