//! Expression evaluation
//!
//! Expressions are evaluated recursively in one go. The only ways an
//! expression can stop early are the two suspension forms: `await` (the
//! executor must resolve an awaitable) and `yield` (the consumer receives a
//! value). Both sit outermost in their statement, so after a pause the
//! statement is simply evaluated again and the suspension node picks up the
//! resume value instead of suspending a second time.

use super::errors;
use super::stdlib;
use super::types::{Awaitable, BinaryOp, Expr, UnaryOp, Val};
use crate::scope::Scope;
use std::collections::BTreeMap;

/* ===================== Eval Result ===================== */

/// Result of evaluating an expression
#[derive(Debug, Clone, PartialEq)]
pub enum EvalResult {
    /// Expression produced a value
    Value { v: Val },
    /// Expression awaits something the executor must resolve
    Suspend { awaitable: Awaitable },
    /// Expression hands a value to the consumer
    Yield { value: Val },
    /// Expression threw an error
    Throw { error: Val },
}

/// Unwrap a `Value`, returning any other result from the enclosing function
macro_rules! value_or_return {
    ($result:expr) => {
        match $result {
            EvalResult::Value { v } => v,
            other => return other,
        }
    };
}

fn throw(code: &str, message: impl Into<String>) -> EvalResult {
    EvalResult::Throw {
        error: errors::error_val(code, message),
    }
}

/* ===================== Expression Evaluation ===================== */

/// Evaluate an expression against the Scope
///
/// `resume_value` holds the value a paused suspension point is resumed with;
/// the first `await`/`yield` reached takes it.
pub fn eval_expr(expr: &Expr, env: &Scope, resume_value: &mut Option<Val>) -> EvalResult {
    match expr {
        Expr::LitBool { v, .. } => EvalResult::Value { v: Val::Bool(*v) },
        Expr::LitNum { v, .. } => EvalResult::Value { v: Val::Num(*v) },
        Expr::LitStr { v, .. } => EvalResult::Value { v: Val::Str(v.clone()) },
        Expr::LitNull { .. } => EvalResult::Value { v: Val::Null },

        Expr::LitList { elements, .. } => {
            let mut items = Vec::with_capacity(elements.len());
            for element in elements {
                items.push(value_or_return!(eval_expr(element, env, resume_value)));
            }
            EvalResult::Value { v: Val::List(items) }
        }

        Expr::LitObj { properties, .. } => {
            let mut map = BTreeMap::new();
            for (key, _, value_expr) in properties {
                let value = value_or_return!(eval_expr(value_expr, env, resume_value));
                map.insert(key.clone(), value);
            }
            EvalResult::Value { v: Val::Obj(map) }
        }

        Expr::Ident { name, .. } => lookup(name, env),

        Expr::Member {
            object,
            property,
            optional,
            ..
        } => {
            let object = value_or_return!(eval_expr(object, env, resume_value));
            if *optional && object.is_null() {
                return EvalResult::Value { v: Val::Null };
            }
            member(&object, property)
        }

        Expr::Index { object, index, .. } => {
            let object = value_or_return!(eval_expr(object, env, resume_value));
            let index = value_or_return!(eval_expr(index, env, resume_value));
            index_value(&object, &index)
        }

        Expr::Call { callee, args, .. } => {
            let callee_val = value_or_return!(eval_expr(callee, env, resume_value));
            let mut arg_vals = Vec::with_capacity(args.len());
            for arg in args {
                arg_vals.push(value_or_return!(eval_expr(arg, env, resume_value)));
            }
            match callee_val {
                Val::NativeFunc(func) => stdlib::call_function(func, &arg_vals),
                other => throw(
                    errors::TYPE_ERROR,
                    format!("{} is not a function", other.repr()),
                ),
            }
        }

        Expr::Await { inner, .. } => {
            if let Some(v) = resume_value.take() {
                return EvalResult::Value { v };
            }
            match value_or_return!(eval_expr(inner, env, resume_value)) {
                Val::Awaitable(awaitable) => EvalResult::Suspend { awaitable },
                // Awaiting a plain value is a no-op
                other => EvalResult::Value { v: other },
            }
        }

        Expr::Yield { inner, .. } => {
            if let Some(v) = resume_value.take() {
                return EvalResult::Value { v };
            }
            let value = match inner {
                Some(inner) => value_or_return!(eval_expr(inner, env, resume_value)),
                None => Val::Null,
            };
            EvalResult::Yield { value }
        }

        Expr::BinaryOp {
            op, left, right, ..
        } => {
            let left = value_or_return!(eval_expr(left, env, resume_value));
            match op {
                BinaryOp::And => {
                    if !left.is_truthy() {
                        return EvalResult::Value { v: left };
                    }
                    eval_expr(right, env, resume_value)
                }
                BinaryOp::Or => {
                    if left.is_truthy() {
                        return EvalResult::Value { v: left };
                    }
                    eval_expr(right, env, resume_value)
                }
                BinaryOp::Nullish => {
                    if !left.is_null() {
                        return EvalResult::Value { v: left };
                    }
                    eval_expr(right, env, resume_value)
                }
                _ => {
                    let right = value_or_return!(eval_expr(right, env, resume_value));
                    binary(*op, left, right)
                }
            }
        }

        Expr::Unary { op, operand, .. } => {
            let operand = value_or_return!(eval_expr(operand, env, resume_value));
            match op {
                UnaryOp::Not => EvalResult::Value {
                    v: Val::Bool(!operand.is_truthy()),
                },
                UnaryOp::Neg => match operand {
                    Val::Num(n) => EvalResult::Value { v: Val::Num(-n) },
                    other => throw(
                        errors::TYPE_ERROR,
                        format!("Cannot negate {}", other.type_name()),
                    ),
                },
            }
        }

        Expr::Ternary {
            condition,
            consequent,
            alternate,
            ..
        } => {
            let condition = value_or_return!(eval_expr(condition, env, resume_value));
            if condition.is_truthy() {
                eval_expr(consequent, env, resume_value)
            } else {
                eval_expr(alternate, env, resume_value)
            }
        }
    }
}

/* ===================== Helpers ===================== */

fn lookup(name: &str, env: &Scope) -> EvalResult {
    if let Some(v) = env.get(name) {
        return EvalResult::Value { v: v.clone() };
    }
    match stdlib::lookup_global(name) {
        Some(v) => EvalResult::Value { v },
        None => throw(errors::REFERENCE_ERROR, format!("{} is not defined", name)),
    }
}

/// Property access on an already evaluated object
pub fn member(object: &Val, property: &str) -> EvalResult {
    match object {
        Val::Obj(map) => EvalResult::Value {
            v: map.get(property).cloned().unwrap_or(Val::Null),
        },
        Val::List(items) if property == "length" => EvalResult::Value {
            v: Val::Num(items.len() as f64),
        },
        Val::Str(s) if property == "length" => EvalResult::Value {
            v: Val::Num(s.chars().count() as f64),
        },
        Val::Error(info) => match property {
            "code" => EvalResult::Value {
                v: Val::Str(info.code.clone()),
            },
            "message" => EvalResult::Value {
                v: Val::Str(info.message.clone()),
            },
            _ => EvalResult::Value { v: Val::Null },
        },
        Val::Null => throw(
            errors::TYPE_ERROR,
            format!("Cannot read property '{}' of null", property),
        ),
        other => throw(
            errors::PROPERTY_NOT_FOUND,
            format!("Property '{}' not found on {}", property, other.type_name()),
        ),
    }
}

/// Index access: `list[n]`, `obj["key"]`, `str[n]`
pub fn index_value(object: &Val, index: &Val) -> EvalResult {
    match (object, index) {
        (Val::List(items), Val::Num(n)) => match list_index(*n) {
            Some(i) => EvalResult::Value {
                v: items.get(i).cloned().unwrap_or(Val::Null),
            },
            None => throw(
                errors::TYPE_ERROR,
                format!("List index must be a non-negative integer, got {}", index.repr()),
            ),
        },
        (Val::Str(s), Val::Num(n)) => match list_index(*n) {
            Some(i) => EvalResult::Value {
                v: s
                    .chars()
                    .nth(i)
                    .map(|c| Val::Str(c.to_string()))
                    .unwrap_or(Val::Null),
            },
            None => throw(
                errors::TYPE_ERROR,
                format!("String index must be a non-negative integer, got {}", index.repr()),
            ),
        },
        (Val::Obj(_), Val::Str(key)) => member(object, key),
        (Val::Null, _) => throw(
            errors::TYPE_ERROR,
            format!("Cannot index null with {}", index.repr()),
        ),
        _ => throw(
            errors::TYPE_ERROR,
            format!(
                "Cannot index {} with {}",
                object.type_name(),
                index.type_name()
            ),
        ),
    }
}

pub(crate) fn list_index(n: f64) -> Option<usize> {
    if n >= 0.0 && n.fract() == 0.0 && n.is_finite() {
        Some(n as usize)
    } else {
        None
    }
}

/// Non short-circuiting binary operators
fn binary(op: BinaryOp, left: Val, right: Val) -> EvalResult {
    let v = match (op, &left, &right) {
        (BinaryOp::Eq, _, _) => Val::Bool(left == right),
        (BinaryOp::Ne, _, _) => Val::Bool(left != right),

        (BinaryOp::Add, Val::Num(a), Val::Num(b)) => Val::Num(a + b),
        (BinaryOp::Add, Val::Str(a), _) => Val::Str(format!("{}{}", a, right.display_string())),
        (BinaryOp::Add, _, Val::Str(b)) => Val::Str(format!("{}{}", left.display_string(), b)),
        (BinaryOp::Add, Val::List(a), Val::List(b)) => {
            Val::List(a.iter().chain(b.iter()).cloned().collect())
        }
        (BinaryOp::Sub, Val::Num(a), Val::Num(b)) => Val::Num(a - b),
        (BinaryOp::Mul, Val::Num(a), Val::Num(b)) => Val::Num(a * b),
        (BinaryOp::Div, Val::Num(_), Val::Num(b)) if *b == 0.0 => {
            return throw(errors::DIVISION_BY_ZERO, "Division by zero");
        }
        (BinaryOp::Div, Val::Num(a), Val::Num(b)) => Val::Num(a / b),
        (BinaryOp::Mod, Val::Num(_), Val::Num(b)) if *b == 0.0 => {
            return throw(errors::DIVISION_BY_ZERO, "Modulo by zero");
        }
        (BinaryOp::Mod, Val::Num(a), Val::Num(b)) => Val::Num(a % b),

        (BinaryOp::Lt, Val::Num(a), Val::Num(b)) => Val::Bool(a < b),
        (BinaryOp::Lte, Val::Num(a), Val::Num(b)) => Val::Bool(a <= b),
        (BinaryOp::Gt, Val::Num(a), Val::Num(b)) => Val::Bool(a > b),
        (BinaryOp::Gte, Val::Num(a), Val::Num(b)) => Val::Bool(a >= b),
        (BinaryOp::Lt, Val::Str(a), Val::Str(b)) => Val::Bool(a < b),
        (BinaryOp::Lte, Val::Str(a), Val::Str(b)) => Val::Bool(a <= b),
        (BinaryOp::Gt, Val::Str(a), Val::Str(b)) => Val::Bool(a > b),
        (BinaryOp::Gte, Val::Str(a), Val::Str(b)) => Val::Bool(a >= b),

        _ => {
            return throw(
                errors::TYPE_ERROR,
                format!(
                    "Unsupported operand types for {}: {} and {}",
                    op.symbol(),
                    left.type_name(),
                    right.type_name()
                ),
            )
        }
    };
    EvalResult::Value { v }
}
