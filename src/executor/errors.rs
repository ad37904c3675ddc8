//! Runtime error values
//!
//! Errors raised while evaluating Flow code are ordinary values
//! (`Val::Error(ErrorInfo)`) so that `try`/`catch` can bind and inspect them.

use serde::{Deserialize, Serialize};

/* ===================== Error Codes ===================== */

pub const REFERENCE_ERROR: &str = "ReferenceError";
pub const TYPE_ERROR: &str = "TypeError";
pub const PROPERTY_NOT_FOUND: &str = "PropertyNotFound";
pub const WRONG_ARG_COUNT: &str = "WrongArgCount";
pub const WRONG_ARG_TYPE: &str = "WrongArgType";
pub const DIVISION_BY_ZERO: &str = "DivisionByZero";
pub const INDEX_OUT_OF_BOUNDS: &str = "IndexOutOfBounds";
pub const SYNTAX_ERROR: &str = "SyntaxError";
pub const HOST_ERROR: &str = "HostError";
pub const INTERNAL_ERROR: &str = "InternalError";

/// Error payload carried by `Val::Error`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Build a `Val::Error` in one call
pub fn error_val(code: &str, message: impl Into<String>) -> super::types::Val {
    super::types::Val::Error(ErrorInfo::new(code, message))
}
