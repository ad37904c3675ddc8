//! Code compiler / wrapper
//!
//! Turns raw source text into a [`CompiledUnit`] the executor can run:
//!
//! 1. Parse. If the raw text does not parse, the invocation's
//!    [`Substitutions`] are applied one after another (cumulatively) and
//!    parsing is retried after each; the first success wins.
//! 2. Validate with the semantic validator; errors refuse the unit,
//!    warnings are kept on it.
//! 3. Wrap: every top-level bare expression becomes a `Stmt::Emit` so its
//!    value reaches the consumer, and a trailing one is marked final.

use crate::executor::types::{Expr, Stmt};
use crate::parser::semantic_validator::{validate_program, ValidationError};
use crate::parser::{parse_program, ParseError, Program};
use serde::{Deserialize, Serialize};
use tracing::debug;


/* ===================== Substitutions ===================== */

/// Ordered `(literal, identifier)` replacements tried when parsing fails
///
/// Used so code can refer to chat entities by their display form, e.g.
/// `<@123>` is rewritten to `__user_mention_0`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Substitutions(Vec<(String, String)>);

impl Substitutions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, literal: impl Into<String>, identifier: impl Into<String>) {
        self.0.push((literal.into(), identifier.into()));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(l, i)| (l.as_str(), i.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<L: Into<String>, I: Into<String>> FromIterator<(L, I)> for Substitutions {
    fn from_iter<T: IntoIterator<Item = (L, I)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(l, i)| (l.into(), i.into()))
                .collect(),
        )
    }
}

/* ===================== Compiled Unit ===================== */

/// A parsed, validated and wrapped piece of source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompiledUnit {
    /// Wrapped top-level statements
    pub body: Vec<Stmt>,
    /// The text that actually parsed (after substitutions)
    pub source: String,
    /// How many substitutions had to be applied
    #[serde(default)]
    pub substitutions_applied: usize,
    /// Validator warnings; they do not stop execution
    #[serde(skip)]
    pub warnings: Vec<ValidationError>,
}

impl CompiledUnit {
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// The unit as a single block, the VM's entry point
    pub fn to_program(&self) -> Stmt {
        Stmt::Block {
            body: self.body.clone(),
            span: Default::default(),
        }
    }
}

/* ===================== Errors ===================== */

/// Why a piece of source could not be turned into a unit; the code never ran
#[derive(Debug, Clone, thiserror::Error)]
pub enum CompileError {
    /// Neither the raw text nor any substituted variant parsed
    #[error("syntax error: {original}")]
    Syntax {
        /// Error for the text as the user wrote it
        #[source]
        original: ParseError,
        /// Error after the last substitution attempt
        last: ParseError,
        /// Number of substituted variants tried
        attempts: usize,
    },

    /// The text parsed but the validator refused it
    #[error("syntax error: {}", describe(.0))]
    Invalid(Vec<ValidationError>),
}

fn describe(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/* ===================== Public API ===================== */

/// Compile source text, falling back to substitutions on parse failure
pub fn compile(source: &str, substitutions: &Substitutions) -> Result<CompiledUnit, CompileError> {
    let (program, parsed_source, applied) = parse_with_substitutions(source, substitutions)?;

    let (errors, warnings): (Vec<_>, Vec<_>) = validate_program(&program, &parsed_source)
        .into_iter()
        .partition(ValidationError::is_error);
    if !errors.is_empty() {
        return Err(CompileError::Invalid(errors));
    }

    Ok(CompiledUnit {
        body: wrap(program.body),
        source: parsed_source,
        substitutions_applied: applied,
        warnings,
    })
}

fn parse_with_substitutions(
    source: &str,
    substitutions: &Substitutions,
) -> Result<(Program, String, usize), CompileError> {
    let original = match parse_program(source) {
        Ok(program) => return Ok((program, source.to_string(), 0)),
        Err(e) => e,
    };

    let mut current = source.to_string();
    let mut last = original.clone();
    let mut attempts = 0;

    for (applied, (literal, identifier)) in substitutions.iter().enumerate() {
        if literal.is_empty() || !current.contains(literal) {
            continue;
        }
        current = current.replace(literal, identifier);
        attempts += 1;

        match parse_program(&current) {
            Ok(program) => {
                debug!(
                    substitutions = applied + 1,
                    "source parsed after substituting {} -> {}", literal, identifier
                );
                return Ok((program, current, applied + 1));
            }
            Err(e) => last = e,
        }
    }

    Err(CompileError::Syntax {
        original,
        last,
        attempts,
    })
}

/// Turn top-level bare expressions into `Emit` statements
///
/// `yield` expressions already hand their value out and are left alone.
/// Only an `Emit` that is the very last statement is final.
fn wrap(body: Vec<Stmt>) -> Vec<Stmt> {
    let mut wrapped: Vec<Stmt> = body
        .into_iter()
        .map(|stmt| match stmt {
            Stmt::Expr { expr, span } if !matches!(expr, Expr::Yield { .. }) => Stmt::Emit {
                expr,
                last: false,
                span,
            },
            other => other,
        })
        .collect();

    if let Some(Stmt::Emit { last, .. }) = wrapped.last_mut() {
        *last = true;
    }
    wrapped
}
