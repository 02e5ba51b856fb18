//! Scope frames and the return flag.
//!
//! The stack starts with a single root frame that can never be popped.
//! A frame holds two name tables — variables and functions — plus a
//! diagnostic label. Entering a function pushes an empty frame: callees
//! do not see the caller's bindings, and name resolution always works
//! against the current top frame. Namespaces are global and live
//! outside this stack.
//!
//! `return` is not an unwinding mechanism: it sets a session-wide flag
//! that block executors check after every statement, stopping early and
//! carrying the last produced value upward. Only the function-call
//! protocol pops the frame and clears the flag.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::runtime::function::Function;
use crate::runtime::value::Value;

/// One entry of the scope stack.
#[derive(Debug, Default)]
pub struct Frame {
    label: String,
    variables: HashMap<String, Value>,
    functions: HashMap<String, Rc<RefCell<Function>>>,
}

impl Frame {
    fn new(label: impl Into<String>) -> Self {
        Self { label: label.into(), variables: HashMap::new(), functions: HashMap::new() }
    }
}

#[derive(Debug)]
pub struct ScopeStack {
    frames: Vec<Frame>,
    returning: bool,
}

impl ScopeStack {
    /// A new stack with the root frame.
    pub fn new() -> Self {
        Self { frames: vec![Frame::new("global")], returning: false }
    }

    /// Push an empty frame for a function call. The label is purely
    /// diagnostic.
    pub fn enter_context(&mut self, label: impl Into<String>) {
        self.frames.push(Frame::new(label));
    }

    /// Pop the top frame.
    ///
    /// Panics if only the root frame remains — that is an interpreter
    /// bug, not a language error.
    pub fn exit_context(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        } else {
            panic!("cannot exit the root scope frame");
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn current_label(&self) -> &str {
        &self.top().label
    }

    /// `return` is only legal while a non-root frame is on top.
    pub fn can_return(&self) -> bool {
        self.frames.len() > 1
    }

    pub fn start_return(&mut self) {
        self.returning = true;
    }

    pub fn has_returned(&self) -> bool {
        self.returning
    }

    pub fn end_return(&mut self) {
        self.returning = false;
    }

    fn top(&self) -> &Frame {
        self.frames.last().expect("scope stack always has a root frame")
    }

    fn top_mut(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("scope stack always has a root frame")
    }

    // ───── name tables, always against the top frame ─────

    pub fn set_variable(&mut self, name: impl Into<String>, value: Value) {
        self.top_mut().variables.insert(name.into(), value);
    }

    pub fn set_function(&mut self, name: impl Into<String>, func: Rc<RefCell<Function>>) {
        self.top_mut().functions.insert(name.into(), func);
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.top().variables.get(name)
    }

    pub fn variable_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.top_mut().variables.get_mut(name)
    }

    pub fn function(&self, name: &str) -> Option<Rc<RefCell<Function>>> {
        self.top().functions.get(name).cloned()
    }

    pub fn defined_as_variable(&self, name: &str) -> bool {
        self.top().variables.contains_key(name)
    }

    pub fn defined_as_function(&self, name: &str) -> bool {
        self.top().functions.contains_key(name)
    }

    /// Variable holding an array or object in the top frame.
    pub fn defined_as_indexable(&self, name: &str) -> bool {
        self.variable(name).is_some_and(Value::is_indexable)
    }

    /// Bound in the top frame, in either table.
    pub fn exists(&self, name: &str) -> bool {
        self.defined_as_variable(name) || self.defined_as_function(name)
    }

    /// The binding as a value, whichever table holds it.
    pub fn definition_of(&self, name: &str) -> Option<Value> {
        if let Some(v) = self.variable(name) {
            return Some(v.clone());
        }
        self.function(name).map(Value::Function)
    }

    /// Remove a binding from the top frame. Returns what was removed.
    pub fn clear(&mut self, name: &str) -> Option<Value> {
        let frame = self.top_mut();
        if let Some(v) = frame.variables.remove(name) {
            return Some(v);
        }
        frame.functions.remove(name).map(Value::Function)
    }

    pub fn take_variable(&mut self, name: &str) -> Option<Value> {
        self.top_mut().variables.remove(name)
    }

    pub fn take_function(&mut self, name: &str) -> Option<Rc<RefCell<Function>>> {
        self.top_mut().functions.remove(name)
    }

    /// Variable names in the top frame, sorted (REPL introspection).
    pub fn variable_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.top().variables.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_stack_has_root_frame_only() {
        let scopes = ScopeStack::new();
        assert_eq!(scopes.depth(), 1);
        assert!(!scopes.can_return());
    }

    #[test]
    fn set_and_get_variable() {
        let mut scopes = ScopeStack::new();
        scopes.set_variable("x", Value::Int(42));
        assert_eq!(scopes.variable("x"), Some(&Value::Int(42)));
    }

    #[test]
    fn new_frame_starts_empty() {
        let mut scopes = ScopeStack::new();
        scopes.set_variable("x", Value::Int(1));
        scopes.enter_context("f(1)");
        // Callees do not see the caller's bindings.
        assert_eq!(scopes.variable("x"), None);
        scopes.exit_context();
        assert_eq!(scopes.variable("x"), Some(&Value::Int(1)));
    }

    #[test]
    fn can_return_only_inside_a_frame() {
        let mut scopes = ScopeStack::new();
        assert!(!scopes.can_return());
        scopes.enter_context("f()");
        assert!(scopes.can_return());
        scopes.exit_context();
        assert!(!scopes.can_return());
    }

    #[test]
    #[should_panic(expected = "cannot exit the root scope frame")]
    fn exiting_root_frame_panics() {
        let mut scopes = ScopeStack::new();
        scopes.exit_context();
    }

    #[test]
    fn return_flag_round_trip() {
        let mut scopes = ScopeStack::new();
        assert!(!scopes.has_returned());
        scopes.start_return();
        assert!(scopes.has_returned());
        scopes.end_return();
        assert!(!scopes.has_returned());
    }

    #[test]
    fn variables_and_functions_are_separate_tables() {
        let mut scopes = ScopeStack::new();
        scopes.set_variable("x", Value::Int(1));
        scopes.set_function("f", Rc::new(RefCell::new(Function::new("f"))));
        assert!(scopes.defined_as_variable("x"));
        assert!(!scopes.defined_as_function("x"));
        assert!(scopes.defined_as_function("f"));
        assert!(scopes.exists("x"));
        assert!(scopes.exists("f"));
        assert!(!scopes.exists("g"));
    }

    #[test]
    fn defined_as_indexable() {
        let mut scopes = ScopeStack::new();
        scopes.set_variable("a", Value::Array(vec![]));
        scopes.set_variable("n", Value::Int(1));
        assert!(scopes.defined_as_indexable("a"));
        assert!(!scopes.defined_as_indexable("n"));
        assert!(!scopes.defined_as_indexable("missing"));
    }

    #[test]
    fn clear_removes_from_either_table() {
        let mut scopes = ScopeStack::new();
        scopes.set_variable("x", Value::Int(1));
        scopes.set_function("f", Rc::new(RefCell::new(Function::new("f"))));
        assert_eq!(scopes.clear("x"), Some(Value::Int(1)));
        assert!(matches!(scopes.clear("f"), Some(Value::Function(_))));
        assert_eq!(scopes.clear("x"), None);
    }

    #[test]
    fn definition_of_prefers_variables() {
        let mut scopes = ScopeStack::new();
        scopes.set_variable("x", Value::Int(5));
        assert_eq!(scopes.definition_of("x"), Some(Value::Int(5)));
        assert_eq!(scopes.definition_of("missing"), None);
    }

    #[test]
    fn labels_are_kept_per_frame() {
        let mut scopes = ScopeStack::new();
        assert_eq!(scopes.current_label(), "global");
        scopes.enter_context("add(1, 2)");
        assert_eq!(scopes.current_label(), "add(1, 2)");
    }
}
