//! Runtime value types

use super::super::errors::ErrorInfo;
use super::super::stdlib::StdlibFunc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Runtime value type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum Val {
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    List(Vec<Val>),
    Obj(BTreeMap<String, Val>),
    /// Built-in function reference
    NativeFunc(StdlibFunc),
    /// Something the executor has to resolve before the program can go on
    Awaitable(Awaitable),
    /// Error value with code and message
    Error(ErrorInfo),
}

/// A suspension request produced by `sleep(..)` or `host(..)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum Awaitable {
    /// Wait for the given number of milliseconds
    Sleep { ms: u64 },
    /// A call into the embedding application, resolved by an `AwaitResolver`
    Host { name: String, args: Vec<Val> },
}

impl Val {
    /// Check if value is truthy (for conditionals)
    pub fn is_truthy(&self) -> bool {
        match self {
            Val::Null => false,
            Val::Bool(b) => *b,
            Val::Num(n) => *n != 0.0 && !n.is_nan(),
            Val::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Val::Null)
    }

    /// Name of the value's type as reported by `typeOf`
    pub fn type_name(&self) -> &'static str {
        match self {
            Val::Null => "null",
            Val::Bool(_) => "bool",
            Val::Num(_) => "number",
            Val::Str(_) => "string",
            Val::List(_) => "list",
            Val::Obj(_) => "object",
            Val::NativeFunc(_) => "function",
            Val::Awaitable(_) => "awaitable",
            Val::Error(_) => "error",
        }
    }

    /// Developer-facing representation; strings are quoted.
    pub fn repr(&self) -> String {
        match self {
            Val::Null => "null".to_string(),
            Val::Bool(b) => b.to_string(),
            Val::Num(n) => format_num(*n),
            Val::Str(s) => quote(s),
            Val::List(items) => {
                let parts: Vec<String> = items.iter().map(Val::repr).collect();
                format!("[{}]", parts.join(", "))
            }
            Val::Obj(map) => {
                if map.is_empty() {
                    return "{}".to_string();
                }
                let parts: Vec<String> = map
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v.repr()))
                    .collect();
                format!("{{ {} }}", parts.join(", "))
            }
            Val::NativeFunc(f) => format!("<function {}>", f.name()),
            Val::Awaitable(Awaitable::Sleep { ms }) => format!("<awaitable sleep({})>", ms),
            Val::Awaitable(Awaitable::Host { name, .. }) => format!("<awaitable host({})>", quote(name)),
            Val::Error(e) => format!("{}: {}", e.code, e.message),
        }
    }

    /// User-facing text; strings are shown as-is, everything else uses `repr`.
    pub fn display_string(&self) -> String {
        match self {
            Val::Str(s) => s.clone(),
            other => other.repr(),
        }
    }
}

impl std::fmt::Display for Val {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display_string())
    }
}

impl From<bool> for Val {
    fn from(b: bool) -> Self {
        Val::Bool(b)
    }
}

impl From<f64> for Val {
    fn from(n: f64) -> Self {
        Val::Num(n)
    }
}

impl From<&str> for Val {
    fn from(s: &str) -> Self {
        Val::Str(s.to_string())
    }
}

impl From<String> for Val {
    fn from(s: String) -> Self {
        Val::Str(s)
    }
}

/// Integral numbers print without a fractional part
fn format_num(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

fn quote(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s))
}
