//! Execution phase enums for each statement type
//!
//! Each statement type has its own Phase enum that tracks which execution step
//! it's currently at. These are serialized as u8 for efficiency.

use serde::{Deserialize, Serialize};

/// Execution phase for Block statements
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[repr(u8)]
pub enum BlockPhase {
    Execute = 0,
}

/// Execution phase for statements that evaluate a single expression
/// (Expr, Declare, Assign, Return, Throw)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EvalPhase {
    Eval = 0,
}

/// Execution phase for Emit statements
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EmitPhase {
    /// Evaluate the expression and hand its value out
    Eval = 0,
    /// The value was taken; discard whatever was sent back and move on
    Resume = 1,
}

/// Execution phase for If statements
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[repr(u8)]
pub enum IfPhase {
    Eval = 0,
}

/// Execution phase for While statements
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[repr(u8)]
pub enum WhilePhase {
    /// Evaluate the test and either push the body or finish
    Eval = 0,
}

/// Execution phase for For loops
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ForLoopPhase {
    /// Evaluate the iterable and snapshot its items
    Init = 0,
    /// Bind the next item and push the body
    Next = 1,
}

/// Execution phase for Try statements
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[repr(u8)]
pub enum TryPhase {
    /// Push the try block
    Enter = 0,
    /// Executing the try block
    ExecuteTry = 1,
    /// Executing the catch block (error was caught)
    ExecuteCatch = 2,
}

/// Execution phase for Break and Continue statements
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[repr(u8)]
pub enum JumpPhase {
    Signal = 0,
}
