//! Validation Rules
//!
//! Each file in this module contains one validation rule:
//!
//! - `suspension_placement.rs` - `await`/`yield` nested inside other expressions
//! - `loop_control.rs` - `break`/`continue` outside of a loop
//! - `unreachable_code.rs` - Code that can never execute

mod loop_control;
mod suspension_placement;
mod unreachable_code;

pub use loop_control::LoopControlRule;
pub use suspension_placement::SuspensionPlacementRule;
pub use unreachable_code::UnreachableCodeRule;
