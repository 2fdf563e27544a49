//! All error-related Class types. Every failure is surfaced to the caller as
//! a tagged value; there are no retries and no local recovery.

use crate::{
    consts::NIL_DISPLAY,
    store::Value,
    util::{self, Span},
};
use serde::Serialize;
use std::fmt::{self, Display, Formatter};
use thiserror::Error;

/// An error that occurs while parsing a program. The error is due to a flaw
/// in the program text, _not_ an internal parser error. Parser bugs will
/// always cause a panic.
#[derive(Clone, Debug, PartialEq, Error, Serialize)]
pub struct ParseError {
    /// The name of the type of element that was expected where the parser
    /// gave up, e.g. `"statement"` or `"identifier"`.
    expected: &'static str,
    /// The position at which the parser gave up
    span: Span,
    /// The full text of the offending source line
    excerpt: String,
}

impl ParseError {
    pub(crate) fn new(
        expected: &'static str,
        span: Span,
        source: &str,
    ) -> Self {
        Self {
            expected,
            span,
            excerpt: util::source_line(source, &span),
        }
    }

    pub fn line(&self) -> usize {
        self.span.start_line
    }

    pub fn column(&self) -> usize {
        self.span.start_col
    }

    pub fn excerpt(&self) -> &str {
        &self.excerpt
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Syntax error at {}:{}: expected {}",
            self.span.start_line, self.span.start_col, self.expected,
        )?;
        // The alternate form renders the offending line with a caret under
        // the position, for hosts that show errors to humans
        if f.alternate() {
            write!(
                f,
                "\n>>> {}\n    {}^",
                self.excerpt,
                " ".repeat(self.span.start_col.saturating_sub(1)),
            )?;
        }
        Ok(())
    }
}

fn fmt_value(value: &Value) -> String {
    match value {
        Some(reference) => reference.to_string(),
        None => NIL_DISPLAY.to_string(),
    }
}

/// An error that occurs during execution of a program. The error is due to a
/// flaw in the program; interpreter bugs will always panic. The configuration
/// that produced the error is left in place for inspection.
#[derive(Clone, Debug, PartialEq, Error, Serialize)]
pub enum RuntimeError {
    /// Dereferenced a variable with no binding in the current scope
    #[error("undefined name `{0}`")]
    UndefinedName(String),
    /// Instantiated a class that was never declared
    #[error("undefined class `{0}`")]
    UndefinedClass(String),
    /// Called a method the target object does not have
    #[error("object {target} has no method `{method}`")]
    NoSuchMethod { target: String, method: String },
    /// Called a method or constructor with the wrong number of arguments
    #[error("`{callee}` takes {expected} arguments but {actual} were given")]
    ArityMismatch {
        callee: String,
        expected: usize,
        actual: usize,
    },
    /// Followed a reference that does not resolve to a stored object
    #[error("missing reference `{}`", fmt_value(.0))]
    MissingReference(Value),
    /// Execution attempted after the program hit the step limit
    #[error("maximum number of steps reached")]
    TooManySteps,
}

/// A wrapper around a [RuntimeError] that records the step in which it
/// occurred. Failed steps count, so a deterministic fault raised twice is
/// reported with two different step numbers.
#[derive(Clone, Debug, PartialEq, Error, Serialize)]
#[error("Runtime error in step {step}: {error}")]
pub struct WithStep {
    step: usize,
    error: RuntimeError,
}

impl WithStep {
    pub(crate) fn new(error: RuntimeError, step: usize) -> Self {
        Self { step, error }
    }

    /// The step number in which the error occurred.
    pub fn step(&self) -> usize {
        self.step
    }

    /// The underlying error.
    pub fn error(&self) -> &RuntimeError {
        &self.error
    }
}

/// An error that occurs while resolving an object path in the inspector.
#[derive(Clone, Debug, PartialEq, Error, Serialize)]
pub enum PathError {
    /// The path text itself could not be parsed
    #[error("malformed object path `{0}`")]
    Malformed(String),
    /// A segment did not resolve to a stored reference
    #[error("cannot resolve object path at segment `{0}`")]
    UnresolvedSegment(String),
    /// A `label:` segment named a label that was never assigned
    #[error("unknown label `{0}`")]
    UnknownLabel(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let span = Span {
            offset: 10,
            length: 0,
            start_line: 2,
            start_col: 3,
        };
        let error = ParseError::new("statement", span, "line one\n  oops");
        assert_eq!(
            error.to_string(),
            "Syntax error at 2:3: expected statement"
        );
        assert_eq!(
            format!("{:#}", error),
            "Syntax error at 2:3: expected statement\n\
             >>>   oops\n      ^"
        );
    }

    #[test]
    fn test_with_step_display() {
        let error =
            WithStep::new(RuntimeError::UndefinedName("y".to_string()), 1);
        assert_eq!(
            error.to_string(),
            "Runtime error in step 1: undefined name `y`"
        );
    }

    #[test]
    fn test_missing_reference_display() {
        assert_eq!(
            RuntimeError::MissingReference(None).to_string(),
            "missing reference `NIL`"
        );
    }
}
