//! Error types for JSONPath query processing
//!
//! Core error kinds for path compilation, tracing, and expression evaluation.

use std::error::Error;
use std::fmt;

/// JSONPath processing error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid configuration (unknown result type, unknown backend, missing input)
    Configuration,
    /// Filter or script step attempted while the expression backend is disabled
    Policy,
    /// `@other()` used without a configured classifier
    Classifier,
    /// Expression backend compile or run failure
    Expression,
}

/// Main JSONPath error type
#[derive(Debug, Clone)]
pub struct JsonPathError {
    pub kind: ErrorKind,
    pub message: String,
}

impl fmt::Display for JsonPathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JSONPath error: {}", self.message)
    }
}

impl Error for JsonPathError {}

/// Result type for JSONPath operations
pub type JsonPathResult<T> = Result<T, JsonPathError>;

impl JsonPathError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: String) -> Self {
        Self { kind, message }
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, msg.into())
    }

    pub fn policy(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Policy, msg.into())
    }

    pub fn classifier(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Classifier, msg.into())
    }

    /// Backend failure, preserving the underlying message and the offending source
    #[must_use]
    pub fn expression(msg: impl Into<String>, source: &str) -> Self {
        let message: String = msg.into();
        Self::new(ErrorKind::Expression, format!("{message}: {source}"))
    }

    #[must_use]
    pub fn eval_disabled(step: &str) -> Self {
        Self::new(
            ErrorKind::Policy,
            format!("eval {step} prevented in JSONPath expression"),
        )
    }
}
