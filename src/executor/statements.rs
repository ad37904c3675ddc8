//! Statement execution handlers
//!
//! Each statement type has its own handler function that processes
//! the statement based on its current execution phase.

use super::errors;
use super::expressions::{eval_expr, list_index, EvalResult};
use super::types::{
    BlockPhase, Control, EmitPhase, Expr, ForLoopKind, ForLoopPhase, FrameKind, MemberAccess,
    Span, Stmt, TryPhase, Val, VarKind,
};
use super::vm::{push_child, Step, VM};
use crate::scope::Scope;

/* ===================== Shared Helpers ===================== */

/// Evaluate the expression a statement needs
///
/// On anything but a value the VM control is set accordingly and the step
/// to return is handed back in `Err`. The frame stays on the stack so a
/// paused statement is evaluated again on resume.
fn eval_in_stmt(vm: &mut VM, env: &Scope, expr: &Expr, span: Span) -> Result<Val, Step> {
    match eval_expr(expr, env, &mut vm.resume_value) {
        EvalResult::Value { v } => Ok(v),
        EvalResult::Suspend { awaitable } => {
            vm.control = Control::Suspend(awaitable);
            Err(Step::Done)
        }
        EvalResult::Yield { value } => {
            vm.control = Control::Yield { value, last: false };
            Err(Step::Done)
        }
        EvalResult::Throw { error } => {
            raise(vm, error, span);
            Err(Step::Continue)
        }
    }
}

/// Start unwinding with a thrown value
pub fn raise(vm: &mut VM, error: Val, span: Span) {
    vm.control = Control::Throw(error);
    vm.throw_span = Some(span);
}

fn set_kind(vm: &mut VM, kind: FrameKind) {
    if let Some(frame) = vm.frames.last_mut() {
        frame.kind = kind;
    }
}

/* ===================== Statement Handlers ===================== */

/// Execute Block statement
pub fn execute_block(vm: &mut VM, phase: BlockPhase, idx: usize, body: &[Stmt]) -> Step {
    match phase {
        BlockPhase::Execute => {
            // Check if we've finished all statements in the block
            let Some(child_stmt) = body.get(idx) else {
                vm.frames.pop();
                return Step::Continue;
            };

            // Update our frame to point to the next statement
            set_kind(
                vm,
                FrameKind::Block {
                    phase: BlockPhase::Execute,
                    idx: idx + 1,
                },
            );

            push_child(vm, child_stmt);
            Step::Continue
        }
    }
}

/// Execute Declare statement (`let x = ...` / `const x = ...`)
pub fn execute_declare(
    vm: &mut VM,
    env: &mut Scope,
    var_kind: VarKind,
    name: &str,
    init: Option<&Expr>,
    span: Span,
) -> Step {
    let value = match init {
        Some(expr) => match eval_in_stmt(vm, env, expr, span) {
            Ok(v) => v,
            Err(step) => return step,
        },
        None => Val::Null,
    };

    env.declare(name, value, var_kind);
    vm.frames.pop();
    Step::Continue
}

/// Execute Assign statement, with an optional `.prop` / `[index]` path
pub fn execute_assign(
    vm: &mut VM,
    env: &mut Scope,
    var: &str,
    path: &[MemberAccess],
    value_expr: &Expr,
    span: Span,
) -> Step {
    let value = match eval_in_stmt(vm, env, value_expr, span) {
        Ok(v) => v,
        Err(step) => return step,
    };

    if path.is_empty() {
        if env.is_const(var) {
            raise(
                vm,
                errors::error_val(
                    errors::TYPE_ERROR,
                    format!("Assignment to constant variable '{}'", var),
                ),
                span,
            );
            return Step::Continue;
        }
        env.set(var, value);
        vm.frames.pop();
        return Step::Continue;
    }

    let Some(mut root) = env.get(var).cloned() else {
        raise(
            vm,
            errors::error_val(errors::REFERENCE_ERROR, format!("{} is not defined", var)),
            span,
        );
        return Step::Continue;
    };

    let mut keys = Vec::with_capacity(path.len());
    for segment in path {
        match segment {
            MemberAccess::Prop { property, .. } => keys.push(PathKey::Prop(property.clone())),
            MemberAccess::Index { expr, .. } => match eval_in_stmt(vm, env, expr, span) {
                Ok(v) => keys.push(PathKey::Index(v)),
                Err(step) => return step,
            },
        }
    }

    if let Err(error) = assign_into(&mut root, &keys, value) {
        raise(vm, error, span);
        return Step::Continue;
    }

    env.set(var, root);
    vm.frames.pop();
    Step::Continue
}

enum PathKey {
    Prop(String),
    Index(Val),
}

/// Write `value` at `path` inside `target`
fn assign_into(target: &mut Val, path: &[PathKey], value: Val) -> Result<(), Val> {
    let Some((first, rest)) = path.split_first() else {
        *target = value;
        return Ok(());
    };

    match (target, first) {
        (Val::Obj(map), PathKey::Prop(key)) | (Val::Obj(map), PathKey::Index(Val::Str(key))) => {
            if rest.is_empty() {
                map.insert(key.clone(), value);
                return Ok(());
            }
            match map.get_mut(key) {
                Some(child) => assign_into(child, rest, value),
                None => Err(errors::error_val(
                    errors::TYPE_ERROR,
                    format!("Cannot set a property of '{}', it is not defined", key),
                )),
            }
        }
        (Val::List(items), PathKey::Index(Val::Num(n))) => {
            let len = items.len();
            let slot = list_index(*n).and_then(|i| items.get_mut(i));
            match slot {
                Some(child) => assign_into(child, rest, value),
                None => Err(errors::error_val(
                    errors::INDEX_OUT_OF_BOUNDS,
                    format!("Index {} is out of bounds for a list of length {}", n, len),
                )),
            }
        }
        (other, _) => Err(errors::error_val(
            errors::TYPE_ERROR,
            format!("Cannot assign into {}", other.type_name()),
        )),
    }
}

/// Execute Expr statement - the value is discarded
pub fn execute_expr(vm: &mut VM, env: &mut Scope, expr: &Expr, span: Span) -> Step {
    match eval_in_stmt(vm, env, expr, span) {
        Ok(_) => {
            vm.frames.pop();
            Step::Continue
        }
        Err(step) => step,
    }
}

/// Execute Emit statement - the value goes to the consumer
pub fn execute_emit(
    vm: &mut VM,
    env: &mut Scope,
    phase: EmitPhase,
    expr: &Expr,
    last: bool,
    span: Span,
) -> Step {
    match phase {
        EmitPhase::Eval => {
            let value = match eval_in_stmt(vm, env, expr, span) {
                Ok(v) => v,
                Err(step) => return step,
            };
            set_kind(
                vm,
                FrameKind::Emit {
                    phase: EmitPhase::Resume,
                },
            );
            vm.control = Control::Yield { value, last };
            Step::Done
        }
        EmitPhase::Resume => {
            // Whatever was sent back is not part of the program's data flow
            vm.resume_value = None;
            vm.frames.pop();
            Step::Continue
        }
    }
}

/// Execute Return statement
pub fn execute_return(vm: &mut VM, env: &mut Scope, value: Option<&Expr>, span: Span) -> Step {
    let val = match value {
        Some(expr) => match eval_in_stmt(vm, env, expr, span) {
            Ok(v) => v,
            Err(step) => return step,
        },
        None => Val::Null,
    };

    vm.control = Control::Return(val);
    vm.frames.pop();
    Step::Continue
}

/// Execute Throw statement
pub fn execute_throw(vm: &mut VM, env: &mut Scope, value: &Expr, span: Span) -> Step {
    match eval_in_stmt(vm, env, value, span) {
        Ok(v) => {
            raise(vm, v, span);
            Step::Continue
        }
        Err(step) => step,
    }
}

/// Execute If statement - replaces itself with the chosen branch
pub fn execute_if(
    vm: &mut VM,
    env: &mut Scope,
    test: &Expr,
    then_s: &Stmt,
    else_s: Option<&Stmt>,
    span: Span,
) -> Step {
    let test = match eval_in_stmt(vm, env, test, span) {
        Ok(v) => v,
        Err(step) => return step,
    };

    vm.frames.pop();
    if test.is_truthy() {
        push_child(vm, then_s);
    } else if let Some(else_stmt) = else_s {
        push_child(vm, else_stmt);
    }
    Step::Continue
}

/// Execute While statement - the frame stays while the loop runs
pub fn execute_while(vm: &mut VM, env: &mut Scope, test: &Expr, body: &Stmt, span: Span) -> Step {
    let test = match eval_in_stmt(vm, env, test, span) {
        Ok(v) => v,
        Err(step) => return step,
    };

    if test.is_truthy() {
        push_child(vm, body);
    } else {
        vm.frames.pop();
    }
    Step::Continue
}

/// Execute For loop (`for (let x of xs)` / `for (let k in obj)`)
#[allow(clippy::too_many_arguments)]
pub fn execute_for_loop(
    vm: &mut VM,
    env: &mut Scope,
    phase: ForLoopPhase,
    idx: usize,
    kind: ForLoopKind,
    binding: &str,
    iterable: &Expr,
    body: &Stmt,
    span: Span,
) -> Step {
    match phase {
        ForLoopPhase::Init => {
            let iterable = match eval_in_stmt(vm, env, iterable, span) {
                Ok(v) => v,
                Err(step) => return step,
            };
            let items = match iteration_items(kind, iterable) {
                Ok(items) => items,
                Err(error) => {
                    raise(vm, error, span);
                    return Step::Continue;
                }
            };
            if let Some(frame) = vm.frames.last_mut() {
                frame.items = items;
                frame.kind = FrameKind::ForLoop {
                    phase: ForLoopPhase::Next,
                    idx: 0,
                };
            }
            Step::Continue
        }
        ForLoopPhase::Next => {
            let item = vm
                .frames
                .last()
                .and_then(|frame| frame.items.get(idx))
                .cloned();
            let Some(item) = item else {
                vm.frames.pop();
                return Step::Continue;
            };

            env.set(binding, item);
            set_kind(
                vm,
                FrameKind::ForLoop {
                    phase: ForLoopPhase::Next,
                    idx: idx + 1,
                },
            );
            push_child(vm, body);
            Step::Continue
        }
    }
}

/// Snapshot what a for loop iterates over
fn iteration_items(kind: ForLoopKind, iterable: Val) -> Result<Vec<Val>, Val> {
    match (kind, iterable) {
        (ForLoopKind::Of, Val::List(items)) => Ok(items),
        (ForLoopKind::Of, Val::Str(s)) => Ok(s.chars().map(|c| Val::Str(c.to_string())).collect()),
        (ForLoopKind::In, Val::Obj(map)) => Ok(map.into_keys().map(Val::Str).collect()),
        (ForLoopKind::In, Val::List(items)) => {
            Ok((0..items.len()).map(|i| Val::Num(i as f64)).collect())
        }
        (ForLoopKind::In, Val::Str(s)) => {
            Ok((0..s.chars().count()).map(|i| Val::Num(i as f64)).collect())
        }
        (ForLoopKind::Of, Val::Obj(_)) => Err(errors::error_val(
            errors::TYPE_ERROR,
            "object is not iterable, use for-in to iterate over its keys",
        )),
        (_, other) => Err(errors::error_val(
            errors::TYPE_ERROR,
            format!("{} is not iterable", other.type_name()),
        )),
    }
}

/// Execute Try statement
///
/// Catching happens during unwinding; here the frame only pushes the try
/// block and pops itself once the active block has finished.
pub fn execute_try(vm: &mut VM, phase: TryPhase, body: &Stmt) -> Step {
    match phase {
        TryPhase::Enter => {
            set_kind(
                vm,
                FrameKind::Try {
                    phase: TryPhase::ExecuteTry,
                },
            );
            push_child(vm, body);
            Step::Continue
        }
        TryPhase::ExecuteTry | TryPhase::ExecuteCatch => {
            vm.frames.pop();
            Step::Continue
        }
    }
}

/// Execute Break statement
pub fn execute_break(vm: &mut VM) -> Step {
    vm.frames.pop();
    vm.control = Control::Break;
    Step::Continue
}

/// Execute Continue statement
pub fn execute_continue(vm: &mut VM) -> Step {
    vm.frames.pop();
    vm.control = Control::Continue;
    Step::Continue
}
