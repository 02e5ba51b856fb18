//! shale-kernel: the core of the shale scripting language.
//!
//! This crate provides:
//!
//! - **Lexer**: Tokenizes shale source code using logos
//! - **Parser**: Builds the syntax tree by recursive descent
//! - **AST**: Type definitions for the syntax tree
//! - **Runtime**: Values, scope frames, namespaces, overload
//!   resolution, and the tree-walking evaluator
//! - **Builtins**: The `string`/`array`/`shell`/`env` library
//! - **Exec**: The blocking process-execution seam
//! - **Loader**: Namespace file loading for `using` declarations

pub mod ast;
pub mod builtins;
pub mod exec;
pub mod lexer;
pub mod loader;
pub mod parser;
pub mod runtime;

pub use exec::{NoOpExecutor, ProcessExecutor, StdExecutor};
pub use loader::{LoadError, NamespaceLoader, ScriptLoader};
pub use parser::SyntaxError;
pub use runtime::{RuntimeError, Session, ShaleError, Value};
