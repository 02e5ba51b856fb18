//! Namespace file loading.
//!
//! `using "path" [as name]` reads and parses an external file of
//! declarations through a [`NamespaceLoader`]; the evaluator folds the
//! parsed declarations into a freshly created namespace. Paths are
//! resolved relative to the defining file's directory unless absolute.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::ast::Program;
use crate::parser::{self, SyntaxError};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read `{path}`: {source}")]
    Io { path: String, source: std::io::Error },
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
}

/// Trait for turning a path into parsed namespace declarations.
pub trait NamespaceLoader {
    fn load(&mut self, path: &Path) -> Result<Program, LoadError>;
}

/// Default loader: reads the file from disk and parses it.
pub struct ScriptLoader;

impl NamespaceLoader for ScriptLoader {
    fn load(&mut self, path: &Path) -> Result<Program, LoadError> {
        let source = fs::read_to_string(path)
            .map_err(|source| LoadError::Io { path: path.display().to_string(), source })?;
        Ok(parser::parse(&source)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_an_io_error() {
        let mut loader = ScriptLoader;
        let err = loader.load(Path::new("/nonexistent/lib.shale")).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }
}
