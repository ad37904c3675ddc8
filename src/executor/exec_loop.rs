//! Core execution loop
//!
//! This module contains the step() function - the heart of the interpreter.
//! It processes one frame at a time, advancing execution phases and managing the frame stack.
//!
//! ## Function Organization
//! Functions are ordered by importance/call hierarchy:
//! 1. run_until_paused() - Top-level driver (calls step repeatedly)
//! 2. step() - Main execution loop (dispatches to statement handlers)
//! 3. unwind() - Break/continue/return/throw propagation

use super::errors;
use super::statements::{
    execute_assign, execute_block, execute_break, execute_continue, execute_declare,
    execute_emit, execute_expr, execute_for_loop, execute_if, execute_return, execute_throw,
    execute_try, execute_while, raise,
};
use super::types::{Control, FrameKind, Stmt, TryPhase};
use super::vm::{push_child, Step, VM};
use crate::scope::Scope;
use std::sync::Arc;

/* ===================== Public API ===================== */

/// Run the VM until it completes or pauses
///
/// After this returns, inspect `vm.control`:
/// - `None` / `Return(_)`: finished normally
/// - `Throw(_)`: finished with an uncaught error
/// - `Suspend(_)` / `Yield { .. }`: paused, call `vm.resume(..)` to go on
pub fn run_until_paused(vm: &mut VM, env: &mut Scope) {
    loop {
        match step(vm, env) {
            Step::Continue => continue,
            Step::Done => break,
        }
    }
}

/// Execute one step of the VM
///
/// This is the core interpreter loop. It:
/// 1. Checks for active control flow and unwinds if needed
/// 2. Gets the top frame
/// 3. Matches on frame kind and execution phase
/// 4. Executes the appropriate logic
/// 5. Either continues or signals done
pub fn step(vm: &mut VM, env: &mut Scope) -> Step {
    if !matches!(vm.control, Control::None) {
        return unwind(vm, env);
    }

    let Some(frame) = vm.frames.last() else {
        return Step::Done;
    };
    let kind = frame.kind;
    let node = Arc::clone(&frame.node);
    vm.steps += 1;

    match (kind, node.as_ref()) {
        (FrameKind::Block { phase, idx }, Stmt::Block { body, .. }) => {
            execute_block(vm, phase, idx, body)
        }

        (
            FrameKind::Declare { .. },
            Stmt::Declare {
                var_kind,
                name,
                init,
                span,
            },
        ) => execute_declare(vm, env, *var_kind, name, init.as_ref(), *span),

        (
            FrameKind::Assign { .. },
            Stmt::Assign {
                var,
                path,
                value,
                span,
                ..
            },
        ) => execute_assign(vm, env, var, path, value, *span),

        (FrameKind::Expr { .. }, Stmt::Expr { expr, span }) => execute_expr(vm, env, expr, *span),

        (FrameKind::Emit { phase }, Stmt::Emit { expr, last, span }) => {
            execute_emit(vm, env, phase, expr, *last, *span)
        }

        (FrameKind::Return { .. }, Stmt::Return { value, span }) => {
            execute_return(vm, env, value.as_ref(), *span)
        }

        (FrameKind::Throw { .. }, Stmt::Throw { value, span }) => {
            execute_throw(vm, env, value, *span)
        }

        (
            FrameKind::If { .. },
            Stmt::If {
                test,
                then_s,
                else_s,
                span,
            },
        ) => execute_if(vm, env, test, then_s, else_s.as_deref(), *span),

        (FrameKind::While { .. }, Stmt::While { test, body, span }) => {
            execute_while(vm, env, test, body, *span)
        }

        (
            FrameKind::ForLoop { phase, idx },
            Stmt::ForLoop {
                kind,
                binding,
                iterable,
                body,
                span,
                ..
            },
        ) => execute_for_loop(vm, env, phase, idx, *kind, binding, iterable, body, *span),

        (FrameKind::Try { phase }, Stmt::Try { body, .. }) => execute_try(vm, phase, body),

        (FrameKind::Break { .. }, Stmt::Break { .. }) => execute_break(vm),

        (FrameKind::Continue { .. }, Stmt::Continue { .. }) => execute_continue(vm),

        // Frame kind doesn't match node; only possible with a hand-edited VM
        (_, stmt) => {
            vm.frames.clear();
            raise(
                vm,
                errors::error_val(
                    errors::INTERNAL_ERROR,
                    "Frame kind does not match statement node",
                ),
                stmt.span(),
            );
            Step::Done
        }
    }
}

/* ===================== Control Flow ===================== */

/// Unwind the stack when control flow is active
///
/// Pops frames until an appropriate handler is found or the stack is empty.
fn unwind(vm: &mut VM, env: &mut Scope) -> Step {
    match &vm.control {
        // Paused: nothing to do until resume()
        Control::Suspend(_) | Control::Yield { .. } => Step::Done,

        Control::Return(_) => {
            // Return exits the entire program
            vm.frames.clear();
            Step::Done
        }

        Control::Break => {
            while let Some(frame) = vm.frames.pop() {
                if frame.kind.is_loop() {
                    vm.control = Control::None;
                    return Step::Continue;
                }
            }
            vm.control = Control::Throw(errors::error_val(
                errors::SYNTAX_ERROR,
                "break outside of a loop",
            ));
            Step::Done
        }

        Control::Continue => {
            while let Some(frame) = vm.frames.last() {
                if frame.kind.is_loop() {
                    vm.control = Control::None;
                    return Step::Continue;
                }
                vm.frames.pop();
            }
            vm.control = Control::Throw(errors::error_val(
                errors::SYNTAX_ERROR,
                "continue outside of a loop",
            ));
            Step::Done
        }

        Control::Throw(error) => {
            let error = error.clone();
            while let Some(frame) = vm.frames.last_mut() {
                if frame.kind
                    == (FrameKind::Try {
                        phase: TryPhase::ExecuteTry,
                    })
                {
                    frame.kind = FrameKind::Try {
                        phase: TryPhase::ExecuteCatch,
                    };
                    let node = Arc::clone(&frame.node);
                    if let Stmt::Try {
                        catch_var,
                        catch_body,
                        ..
                    } = node.as_ref()
                    {
                        env.set(catch_var.as_str(), error);
                        vm.control = Control::None;
                        vm.throw_span = None;
                        push_child(vm, catch_body);
                        return Step::Continue;
                    }
                }
                vm.frames.pop();
            }
            // Uncaught: control stays Throw for the driver to report
            Step::Done
        }

        Control::None => Step::Continue,
    }
}
