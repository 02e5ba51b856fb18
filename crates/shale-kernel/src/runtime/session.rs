//! The interpreter session.
//!
//! A `Session` owns everything a running interpreter needs: the scope
//! stack, the global namespace registry, the process executor, and the
//! namespace loader. All state is explicit — there are no globals, so a
//! host can run any number of independent sessions (serializing calls
//! into each; the runtime is single-threaded by design).

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::ast::Program;
use crate::builtins;
use crate::exec::{ProcessExecutor, StdExecutor};
use crate::loader::{NamespaceLoader, ScriptLoader};
use crate::parser;
use crate::runtime::error::{RuntimeResult, ShaleError};
use crate::runtime::eval::Evaluator;
use crate::runtime::namespace::NamespaceTree;
use crate::runtime::scope::ScopeStack;
use crate::runtime::value::Value;

pub struct Session {
    pub(crate) scopes: ScopeStack,
    pub(crate) namespaces: NamespaceTree,
    pub(crate) executor: Box<dyn ProcessExecutor>,
    pub(crate) loader: Box<dyn NamespaceLoader>,
    /// File shown in diagnostic spans, when known.
    pub(crate) source_name: Option<String>,
    /// Directory `using` paths resolve against.
    pub(crate) source_dir: Option<PathBuf>,
}

impl Session {
    /// A session with the standard builtin library, process executor,
    /// and file loader.
    pub fn new() -> RuntimeResult<Session> {
        Self::with_executor(Box::new(StdExecutor))
    }

    /// A session with a custom process executor (tests and embeddings
    /// that restrict subprocess execution).
    pub fn with_executor(executor: Box<dyn ProcessExecutor>) -> RuntimeResult<Session> {
        let mut session = Session {
            scopes: ScopeStack::new(),
            namespaces: NamespaceTree::new(),
            executor,
            loader: Box::new(ScriptLoader),
            source_name: None,
            source_dir: None,
        };
        builtins::register(&mut session)?;
        Ok(session)
    }

    pub fn set_loader(&mut self, loader: Box<dyn NamespaceLoader>) {
        self.loader = loader;
    }

    /// Record the script file being run: its name prefixes diagnostic
    /// spans and its directory anchors relative `using` paths.
    pub fn set_source_path(&mut self, path: &Path) {
        self.source_name = Some(path.display().to_string());
        self.source_dir = path.parent().map(Path::to_path_buf);
    }

    /// Evaluate a parsed tree fragment: a whole program, or a single
    /// standalone statement from the REPL. Returns the last produced
    /// value.
    pub fn evaluate(&mut self, program: &Program, whole_program: bool) -> RuntimeResult<Value> {
        debug!(whole_program, statements = program.statements.len(), "evaluating");
        Evaluator::new(self).eval_program(program)
    }

    /// Parse and evaluate one unit of input (the REPL path). Syntax
    /// errors abort the unit before any of it runs.
    pub fn eval_source(&mut self, source: &str) -> Result<Value, ShaleError> {
        let program = parser::parse(source)?;
        Ok(self.evaluate(&program, false)?)
    }

    /// Parse and evaluate a whole script.
    pub fn run_script(&mut self, source: &str) -> Result<Value, ShaleError> {
        let program = parser::parse(source)?;
        Ok(self.evaluate(&program, true)?)
    }

    /// A name is available for definition only when it is absent from
    /// the top frame's variable and function tables and from the
    /// global namespace registry.
    pub fn available(&self, name: &str) -> bool {
        !self.scopes.exists(name) && !self.namespaces.has_root(name)
    }

    /// Top-frame variable names, for REPL introspection.
    pub fn variable_names(&self) -> Vec<String> {
        self.scopes.variable_names()
    }

    /// Every fully dotted name reachable from the registered
    /// namespaces.
    pub fn namespace_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for root in self.namespaces.root_names() {
            let id = self.namespaces.root(&root).expect("listed root exists");
            names.extend(self.namespaces.list_names(id));
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::NoOpExecutor;

    fn session() -> Session {
        Session::with_executor(Box::new(NoOpExecutor)).expect("session should build")
    }

    #[test]
    fn eval_source_returns_last_value() {
        let mut s = session();
        assert_eq!(s.eval_source("1 + 1; 2 + 2").unwrap(), Value::Int(4));
    }

    #[test]
    fn syntax_error_aborts_the_whole_unit() {
        let mut s = session();
        let err = s.eval_source("x = 1; y = ").unwrap_err();
        assert!(matches!(err, ShaleError::Syntax(_)));
        // Nothing of the malformed unit ran.
        assert!(s.eval_source("x").is_err());
    }

    #[test]
    fn state_persists_across_inputs() {
        let mut s = session();
        s.eval_source("x = 41").unwrap();
        assert_eq!(s.eval_source("x + 1").unwrap(), Value::Int(42));
    }

    #[test]
    fn session_recovers_after_runtime_error() {
        let mut s = session();
        assert!(s.eval_source("1 / 0").is_err());
        assert_eq!(s.eval_source("2 + 2").unwrap(), Value::Int(4));
    }

    #[test]
    fn builtin_namespaces_are_registered() {
        let s = session();
        let names = s.namespace_names();
        assert!(names.iter().any(|n| n == "string.upper"));
        assert!(names.iter().any(|n| n == "array.count"));
        assert!(names.iter().any(|n| n == "env.path"));
    }

    #[test]
    fn available_consults_all_three_categories() {
        let mut s = session();
        assert!(s.available("fresh"));
        s.eval_source("v = 1").unwrap();
        s.eval_source("function f() { return 1 }").unwrap();
        assert!(!s.available("v"));
        assert!(!s.available("f"));
        assert!(!s.available("string"));
    }

    #[test]
    fn variable_names_lists_top_frame() {
        let mut s = session();
        s.eval_source("alpha = 1").unwrap();
        s.eval_source("beta = 2").unwrap();
        assert_eq!(s.variable_names(), vec!["alpha", "beta"]);
    }
}
