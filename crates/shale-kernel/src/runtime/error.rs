//! Runtime error taxonomy.
//!
//! Every error is raised as soon as detected and unwinds through the
//! evaluator via `Result`; the driver catches it once, reports it, and
//! keeps accepting input. Each message carries a source-span string
//! produced by the evaluator (`line L, columns C1:C2`, optionally
//! prefixed with a file path).

use thiserror::Error;

use crate::parser::SyntaxError;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("undefined {expected} `{name}` ({at})")]
    UndefinedIdentifier { name: String, expected: &'static str, at: String },

    #[error("unexpected {actual} where {expected} was required ({at})")]
    UnexpectedType { expected: String, actual: String, at: String },

    #[error("index {index} is out of range; valid indices: {valid:?} ({at})")]
    IndexOutOfRange { index: String, valid: Vec<String>, at: String },

    #[error("operator `{op}` is not supported for {operands} ({at})")]
    InvalidOperation { op: String, operands: String, at: String },

    #[error("division by zero ({at})")]
    DivisionByZero { at: String },

    #[error("`{name}` is already defined as a {existing} ({at})")]
    InvalidDefinition { name: String, existing: &'static str, at: String },

    #[error("definition of `{name}` conflicts with existing signatures {signatures:?} ({at})")]
    InvalidFunctionDefinition { name: String, signatures: Vec<String>, at: String },

    #[error(
        "no overload of `{name}` accepts ({arguments}); known signatures: {signatures:?} ({at})"
    )]
    InvalidFunctionCall { name: String, arguments: String, signatures: Vec<String>, at: String },

    #[error("return is only allowed inside a function body ({at})")]
    InvalidReturn { at: String },

    #[error("`{segment}` is not defined in namespace `{namespace}`; available names: {siblings:?} ({at})")]
    InvalidNamespacedIdentifier {
        segment: String,
        namespace: String,
        siblings: Vec<String>,
        at: String,
    },

    #[error("failed to load namespace from `{path}`: {message} ({at})")]
    LoadFailed { path: String, message: String, at: String },
}

/// Either of the two failure categories an input unit can produce:
/// a pre-evaluation syntax error or a runtime error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ShaleError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}
