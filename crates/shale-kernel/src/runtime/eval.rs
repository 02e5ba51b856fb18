//! The tree-walking evaluator.
//!
//! Expressions evaluate along the precedence chain the parser encoded;
//! each binary level checks its operand kinds (`bool` for logical,
//! `number` for relational/additive/multiplicative) before applying the
//! operator. Statement blocks check the return flag after every
//! statement and stop early without popping frames — only the
//! function-call protocol pops the frame and clears the flag it
//! observed.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::debug;

use crate::ast::{
    Assign, BinaryOp, Expr, ForStmt, FunctionDef, IfStmt, Literal, NamespaceDef, Program,
    ReturnStmt, Span, Stmt, Term, UnaryOp, UsingDecl,
};
use crate::parser;
use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::function::{self, BuiltinCall, Function, LambdaBody, Param};
use crate::runtime::index::{self, Indexable};
use crate::runtime::namespace::NamespaceId;
use crate::runtime::ops;
use crate::runtime::session::Session;
use crate::runtime::value::Value;

pub struct Evaluator<'a> {
    session: &'a mut Session,
}

impl<'a> Evaluator<'a> {
    pub fn new(session: &'a mut Session) -> Self {
        Self { session }
    }

    /// Render a source span for diagnostics, prefixed with the current
    /// file when one is known.
    fn at(&self, span: Span) -> String {
        match &self.session.source_name {
            Some(file) => format!("{file}: {span}"),
            None => span.to_string(),
        }
    }

    /// Evaluate a program (or a single REPL statement parsed as one).
    /// Produces the last statement's value.
    pub fn eval_program(&mut self, program: &Program) -> RuntimeResult<Value> {
        self.exec_block(&program.statements)
    }

    /// Run statements in order. After each one, check the return flag
    /// and stop early, carrying the last produced value upward. No
    /// frame is popped here.
    fn exec_block(&mut self, stmts: &[Stmt]) -> RuntimeResult<Value> {
        let mut last = Value::None;
        for stmt in stmts {
            last = self.exec_stmt(stmt)?;
            if self.session.scopes.has_returned() {
                break;
            }
        }
        Ok(last)
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> RuntimeResult<Value> {
        match stmt {
            Stmt::Expr(e) => self.eval_expr(e),
            Stmt::Assign(a) => self.exec_assign(a),
            Stmt::If(s) => self.exec_if(s),
            Stmt::For(s) => self.exec_for(s),
            Stmt::Return(s) => self.exec_return(s),
            Stmt::FunctionDef(def) => {
                self.exec_function_def(def)?;
                Ok(Value::None)
            }
            Stmt::NamespaceDef(def) => {
                self.exec_namespace_def(def, None)?;
                Ok(Value::None)
            }
            Stmt::Using(decl) => {
                self.exec_using(decl, None)?;
                Ok(Value::None)
            }
        }
    }

    // ───── declarations ─────

    fn exec_function_def(&mut self, def: &FunctionDef) -> RuntimeResult<()> {
        let at = self.at(def.span);
        if self.session.scopes.defined_as_variable(&def.name) {
            return Err(RuntimeError::InvalidDefinition {
                name: def.name.clone(),
                existing: "variable",
                at,
            });
        }
        if self.session.namespaces.has_root(&def.name) {
            return Err(RuntimeError::InvalidDefinition {
                name: def.name.clone(),
                existing: "namespace",
                at,
            });
        }
        let params: Vec<Param> =
            def.params.iter().map(|p| Param::new(p.name.clone(), p.spec)).collect();
        match self.session.scopes.function(&def.name) {
            Some(existing) => {
                existing.borrow_mut().add_user_lambda(params, def.body.clone(), &at)?;
            }
            None => {
                let mut func = Function::new(def.name.clone());
                func.add_user_lambda(params, def.body.clone(), &at)?;
                self.session.scopes.set_function(def.name.clone(), Rc::new(RefCell::new(func)));
            }
        }
        Ok(())
    }

    fn exec_namespace_def(
        &mut self,
        def: &NamespaceDef,
        parent: Option<NamespaceId>,
    ) -> RuntimeResult<NamespaceId> {
        let at = self.at(def.span);
        let id = match parent {
            None => {
                if self.session.scopes.exists(&def.name) {
                    let existing = if self.session.scopes.defined_as_variable(&def.name) {
                        "variable"
                    } else {
                        "function"
                    };
                    return Err(RuntimeError::InvalidDefinition {
                        name: def.name.clone(),
                        existing,
                        at,
                    });
                }
                match self.session.namespaces.root(&def.name) {
                    // Re-declaring a namespace re-opens it; bindings are
                    // added through Set.
                    Some(id) => id,
                    None => {
                        let id = self.session.namespaces.create(def.name.clone(), None);
                        self.session.namespaces.register_root(id);
                        id
                    }
                }
            }
            Some(parent_id) => match self.session.namespaces.entry(parent_id, &def.name) {
                Some(Value::Namespace(existing)) => existing.id,
                Some(other) => {
                    return Err(RuntimeError::InvalidDefinition {
                        name: def.name.clone(),
                        existing: other.kind(),
                        at,
                    })
                }
                None => {
                    let id = self.session.namespaces.create(def.name.clone(), Some(parent_id));
                    let value = self.session.namespaces.value_of(id);
                    self.session.namespaces.set(parent_id, def.name.clone(), value);
                    id
                }
            },
        };
        self.fold_namespace_body(&def.body, id)?;
        Ok(id)
    }

    /// Fold declarations into a namespace: function definitions,
    /// nested namespaces, `using` imports, and simple assignments.
    fn fold_namespace_body(&mut self, stmts: &[Stmt], id: NamespaceId) -> RuntimeResult<()> {
        for stmt in stmts {
            match stmt {
                Stmt::FunctionDef(def) => {
                    let at = self.at(def.span);
                    let params: Vec<Param> =
                        def.params.iter().map(|p| Param::new(p.name.clone(), p.spec)).collect();
                    match self.session.namespaces.entry(id, &def.name) {
                        Some(Value::Function(existing)) => {
                            let existing = existing.clone();
                            existing.borrow_mut().add_user_lambda(params, def.body.clone(), &at)?;
                        }
                        Some(other) => {
                            return Err(RuntimeError::InvalidDefinition {
                                name: def.name.clone(),
                                existing: other.kind(),
                                at,
                            })
                        }
                        None => {
                            let mut func = Function::new(def.name.clone());
                            func.add_user_lambda(params, def.body.clone(), &at)?;
                            self.session.namespaces.set(id, def.name.clone(), func.into_value());
                        }
                    }
                }
                Stmt::NamespaceDef(def) => {
                    self.exec_namespace_def(def, Some(id))?;
                }
                Stmt::Using(decl) => {
                    self.exec_using(decl, Some(id))?;
                }
                Stmt::Assign(assign) => {
                    let value = self.eval_expr(&assign.value)?;
                    if value.is_none() {
                        return Err(self.none_error(assign.value.span()));
                    }
                    self.session.namespaces.set(id, assign.target.path[0].clone(), value);
                }
                other => {
                    return Err(RuntimeError::UnexpectedType {
                        expected: "a declaration".into(),
                        actual: "statement".into(),
                        at: self.at(other.span()),
                    })
                }
            }
        }
        Ok(())
    }

    fn exec_using(&mut self, decl: &UsingDecl, parent: Option<NamespaceId>) -> RuntimeResult<()> {
        let at = self.at(decl.span);
        let raw = Path::new(&decl.path);
        let path: PathBuf = if raw.is_absolute() {
            raw.to_path_buf()
        } else {
            match &self.session.source_dir {
                Some(dir) => dir.join(raw),
                None => raw.to_path_buf(),
            }
        };
        let program = self.session.loader.load(&path).map_err(|e| RuntimeError::LoadFailed {
            path: decl.path.clone(),
            message: e.to_string(),
            at: at.clone(),
        })?;
        let name = match &decl.alias {
            Some(alias) => alias.clone(),
            None => path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("lib")
                .to_string(),
        };
        let id = match parent {
            None => {
                if self.session.scopes.exists(&name) {
                    let existing = if self.session.scopes.defined_as_variable(&name) {
                        "variable"
                    } else {
                        "function"
                    };
                    return Err(RuntimeError::InvalidDefinition { name, existing, at });
                }
                let id = self.session.namespaces.create(name, None);
                // Overwriting a previous registration is logged, not fatal.
                self.session.namespaces.register_root(id);
                id
            }
            Some(parent_id) => {
                let id = self.session.namespaces.create(name.clone(), Some(parent_id));
                let value = self.session.namespaces.value_of(id);
                self.session.namespaces.set(parent_id, name, value);
                id
            }
        };
        // Nested `using` inside the loaded file resolves relative to
        // that file.
        let saved_dir = self.session.source_dir.take();
        let saved_name = self.session.source_name.take();
        self.session.source_dir = path.parent().map(Path::to_path_buf);
        self.session.source_name = Some(path.display().to_string());
        let outcome = self.fold_namespace_body(&program.statements, id);
        self.session.source_dir = saved_dir;
        self.session.source_name = saved_name;
        outcome
    }

    // ───── statements ─────

    fn exec_assign(&mut self, assign: &Assign) -> RuntimeResult<Value> {
        let value = self.eval_expr(&assign.value)?;
        if value.is_none() {
            return Err(self.none_error(assign.value.span()));
        }
        let target = &assign.target;
        let at = self.at(target.span);

        if target.indices.is_empty() {
            if target.path.len() == 1 {
                let name = &target.path[0];
                if self.session.scopes.defined_as_function(name) {
                    return Err(RuntimeError::InvalidDefinition {
                        name: name.clone(),
                        existing: "function",
                        at,
                    });
                }
                if self.session.namespaces.has_root(name) {
                    return Err(RuntimeError::InvalidDefinition {
                        name: name.clone(),
                        existing: "namespace",
                        at,
                    });
                }
                self.session.scopes.set_variable(name.clone(), value.clone());
            } else {
                let prefix = &target.path[..target.path.len() - 1];
                let id = self.resolve_namespace_prefix(prefix, target.span)?;
                let last = target.path.last().expect("dotted path has a final segment");
                self.session.namespaces.set(id, last.clone(), value.clone());
            }
            return Ok(value);
        }

        // Indexed target: evaluate the index chain first, then walk a
        // mutable path into the container.
        let mut indices = Vec::with_capacity(target.indices.len());
        for ix in &target.indices {
            let idx = self.eval_expr(ix)?.unwrap_property();
            if idx.is_none() {
                return Err(self.none_error(ix.span()));
            }
            indices.push((idx, self.at(ix.span())));
        }

        let base: &mut Value = if target.path.len() == 1 {
            let name = &target.path[0];
            if !self.session.scopes.defined_as_variable(name) {
                return Err(RuntimeError::UndefinedIdentifier {
                    name: name.clone(),
                    expected: "variable",
                    at,
                });
            }
            self.session.scopes.variable_mut(name).expect("checked variable")
        } else {
            let prefix = &target.path[..target.path.len() - 1];
            let id = self.resolve_namespace_prefix(prefix, target.span)?;
            let last = target.path.last().expect("dotted path has a final segment");
            if !self.session.namespaces.exists(id, last) {
                return Err(RuntimeError::InvalidNamespacedIdentifier {
                    segment: last.clone(),
                    namespace: self.session.namespaces.full_name(id),
                    siblings: self.session.namespaces.local_names(id),
                    at,
                });
            }
            self.session.namespaces.entry_mut(id, last).expect("checked entry")
        };

        let mut slot = base;
        for (idx, idx_at) in &indices[..indices.len() - 1] {
            slot = index::get_mut(slot, idx, idx_at)?;
        }
        let (last_idx, last_at) = indices.last().expect("indexed target has an index");
        if !slot.is_indexable() {
            return Err(RuntimeError::UnexpectedType {
                expected: "an indexable value".into(),
                actual: slot.kind().into(),
                at: last_at.clone(),
            });
        }
        let mut view = Indexable::of(slot).expect("checked indexable");
        if view.contains_index(last_idx) {
            view.replace(last_idx, value.clone(), last_at)?;
        } else {
            view.insert(last_idx, value.clone(), last_at)?;
        }
        Ok(value)
    }

    fn exec_if(&mut self, stmt: &IfStmt) -> RuntimeResult<Value> {
        for (condition, body) in &stmt.arms {
            if self.expect_bool(condition)? {
                let value = self.exec_block(body)?;
                return Ok(self.block_result(value));
            }
        }
        if let Some(body) = &stmt.else_branch {
            let value = self.exec_block(body)?;
            return Ok(self.block_result(value));
        }
        Ok(Value::None)
    }

    /// Control statements only produce a value while a `return` is
    /// propagating through them.
    fn block_result(&self, value: Value) -> Value {
        if self.session.scopes.has_returned() {
            value
        } else {
            Value::None
        }
    }

    fn exec_for(&mut self, stmt: &ForStmt) -> RuntimeResult<Value> {
        let iterable = self.eval_expr(&stmt.iterable)?.unwrap_property();
        let items = match iterable {
            Value::Array(items) => items,
            other => {
                return Err(RuntimeError::UnexpectedType {
                    expected: "an array".into(),
                    actual: other.kind().into(),
                    at: self.at(stmt.iterable.span()),
                })
            }
        };

        // The loop variable shadows any existing binding of the name:
        // capture and remove it now, restore it precisely afterwards no
        // matter how many iterations ran.
        let name = &stmt.variable;
        let shadowed_variable = self.session.scopes.take_variable(name);
        let shadowed_function = self.session.scopes.take_function(name);
        let shadowed_namespace = self.session.namespaces.remove_root(name);

        let outcome = self.run_for_iterations(name, &items, &stmt.body);

        self.session.scopes.take_variable(name);
        if let Some(value) = shadowed_variable {
            self.session.scopes.set_variable(name.clone(), value);
        }
        if let Some(func) = shadowed_function {
            self.session.scopes.set_function(name.clone(), func);
        }
        if let Some(id) = shadowed_namespace {
            self.session.namespaces.restore_root(name.clone(), id);
        }
        outcome
    }

    fn run_for_iterations(
        &mut self,
        name: &str,
        items: &[Value],
        body: &[Stmt],
    ) -> RuntimeResult<Value> {
        for item in items {
            self.session.scopes.set_variable(name.to_string(), item.clone());
            let value = self.exec_block(body)?;
            if self.session.scopes.has_returned() {
                return Ok(value);
            }
        }
        Ok(Value::None)
    }

    fn exec_return(&mut self, stmt: &ReturnStmt) -> RuntimeResult<Value> {
        if !self.session.scopes.can_return() {
            return Err(RuntimeError::InvalidReturn { at: self.at(stmt.span) });
        }
        let value = match &stmt.value {
            Some(expr) => self.eval_expr(expr)?.unwrap_property(),
            None => Value::Null,
        };
        self.session.scopes.start_return();
        Ok(value)
    }

    // ───── expressions ─────

    fn eval_expr(&mut self, expr: &Expr) -> RuntimeResult<Value> {
        match expr {
            Expr::Literal { value: Literal::Str(s), .. } => self.interpolate(s),
            Expr::Literal { value, .. } => Ok(Value::from_literal(value)),
            Expr::Array { items, .. } => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    let value = self.eval_expr(item)?;
                    if value.is_none() {
                        return Err(self.none_error(item.span()));
                    }
                    out.push(value);
                }
                Ok(Value::Array(out))
            }
            Expr::Object { entries, .. } => {
                let mut out = std::collections::BTreeMap::new();
                for (key, expr) in entries {
                    let value = self.eval_expr(expr)?;
                    if value.is_none() {
                        return Err(self.none_error(expr.span()));
                    }
                    out.insert(key.clone(), value);
                }
                Ok(Value::Object(out))
            }
            Expr::Unary { op, operand, span } => {
                let value = self.eval_expr(operand)?.unwrap_property();
                let ok = match op {
                    UnaryOp::Not => matches!(value, Value::Bool(_)),
                    UnaryOp::Neg => value.is_number(),
                };
                if !ok {
                    let expected = match op {
                        UnaryOp::Not => "a bool",
                        UnaryOp::Neg => "a number",
                    };
                    return Err(RuntimeError::UnexpectedType {
                        expected: expected.into(),
                        actual: value.kind().into(),
                        at: self.at(operand.span()),
                    });
                }
                ops::unary(*op, &value, &self.at(*span))
            }
            Expr::Binary { op, lhs, rhs, span } => self.eval_binary(*op, lhs, rhs, *span),
            Expr::Term(term) => self.eval_term(term),
        }
    }

    fn eval_binary(
        &mut self,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
        span: Span,
    ) -> RuntimeResult<Value> {
        match op {
            // Short-circuit: the right operand is untouched when the
            // left decides.
            BinaryOp::Or => {
                if self.expect_bool(lhs)? {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(self.expect_bool(rhs)?))
            }
            BinaryOp::And => {
                if !self.expect_bool(lhs)? {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(self.expect_bool(rhs)?))
            }
            BinaryOp::Eq | BinaryOp::NotEq => {
                let a = self.eval_operand(lhs)?.unwrap_property();
                let b = self.eval_operand(rhs)?.unwrap_property();
                ops::binary(op, &a, &b, &self.at(span))
            }
            _ => {
                // Relational, additive, and multiplicative levels all
                // require numbers on both sides.
                let a = self.expect_number(lhs)?;
                let b = self.expect_number(rhs)?;
                ops::binary(op, &a, &b, &self.at(span))
            }
        }
    }

    fn eval_operand(&mut self, expr: &Expr) -> RuntimeResult<Value> {
        let value = self.eval_expr(expr)?;
        if value.is_none() {
            return Err(self.none_error(expr.span()));
        }
        Ok(value)
    }

    fn expect_bool(&mut self, expr: &Expr) -> RuntimeResult<bool> {
        match self.eval_expr(expr)?.unwrap_property() {
            Value::Bool(b) => Ok(b),
            other => Err(RuntimeError::UnexpectedType {
                expected: "a bool".into(),
                actual: other.kind().into(),
                at: self.at(expr.span()),
            }),
        }
    }

    fn expect_number(&mut self, expr: &Expr) -> RuntimeResult<Value> {
        let value = self.eval_expr(expr)?.unwrap_property();
        if !value.is_number() {
            return Err(RuntimeError::UnexpectedType {
                expected: "a number".into(),
                actual: value.kind().into(),
                at: self.at(expr.span()),
            });
        }
        Ok(value)
    }

    fn none_error(&self, span: Span) -> RuntimeError {
        RuntimeError::UnexpectedType {
            expected: "a value".into(),
            actual: "none".into(),
            at: self.at(span),
        }
    }

    // ───── terms, calls, indexing ─────

    fn eval_term(&mut self, term: &Term) -> RuntimeResult<Value> {
        let at = self.at(term.span);
        let mut current = if term.path.len() == 1 {
            let name = &term.path[0];
            if let Some(func) = self.session.scopes.function(name) {
                Value::Function(func)
            } else if let Some(value) = self.session.scopes.variable(name) {
                value.clone()
            } else if let Some(id) = self.session.namespaces.root(name) {
                self.session.namespaces.value_of(id)
            } else {
                return Err(RuntimeError::UndefinedIdentifier {
                    name: name.clone(),
                    expected: "identifier",
                    at,
                });
            }
        } else {
            self.resolve_dotted(&term.path, term.span)?
        };

        if let Some(arg_exprs) = &term.args {
            let func = match current {
                Value::Function(func) => func,
                other => {
                    return Err(RuntimeError::UnexpectedType {
                        expected: "a callable function".into(),
                        actual: other.kind().into(),
                        at,
                    })
                }
            };
            let mut args = Vec::with_capacity(arg_exprs.len());
            for expr in arg_exprs {
                args.push(self.eval_operand(expr)?);
            }
            current = self.call_function(&func, args, term.span)?;
        }

        for index_expr in &term.indices {
            let idx = self.eval_operand(index_expr)?.unwrap_property();
            current = self.index_value(current, &idx, index_expr.span())?;
        }
        Ok(current)
    }

    /// Walk a dotted path through the global namespace tree to its
    /// final value.
    fn resolve_dotted(&self, path: &[String], span: Span) -> RuntimeResult<Value> {
        let id = self.resolve_namespace_prefix(&path[..path.len() - 1], span)?;
        let last = path.last().expect("dotted path has a final segment");
        match self.session.namespaces.entry(id, last) {
            Some(value) => Ok(value.clone()),
            None => Err(RuntimeError::InvalidNamespacedIdentifier {
                segment: last.clone(),
                namespace: self.session.namespaces.full_name(id),
                siblings: self.session.namespaces.local_names(id),
                at: self.at(span),
            }),
        }
    }

    /// Resolve every segment of a dotted prefix: the root must be a
    /// registered top-level namespace and each step must stay inside
    /// the tree.
    fn resolve_namespace_prefix(&self, segments: &[String], span: Span) -> RuntimeResult<NamespaceId> {
        let at = self.at(span);
        let root_name = &segments[0];
        let mut id = match self.session.namespaces.root(root_name) {
            Some(id) => id,
            None if self.session.scopes.exists(root_name) => {
                let actual = self
                    .session
                    .scopes
                    .definition_of(root_name)
                    .map(|v| v.kind())
                    .unwrap_or("identifier");
                return Err(RuntimeError::UnexpectedType {
                    expected: "a namespace".into(),
                    actual: actual.into(),
                    at,
                });
            }
            None => {
                return Err(RuntimeError::UndefinedIdentifier {
                    name: root_name.clone(),
                    expected: "namespace",
                    at,
                })
            }
        };
        for segment in &segments[1..] {
            match self.session.namespaces.entry(id, segment) {
                Some(Value::Namespace(inner)) => id = inner.id,
                Some(other) => {
                    return Err(RuntimeError::UnexpectedType {
                        expected: "a namespace".into(),
                        actual: other.kind().into(),
                        at,
                    })
                }
                None => {
                    return Err(RuntimeError::InvalidNamespacedIdentifier {
                        segment: segment.clone(),
                        namespace: self.session.namespaces.full_name(id),
                        siblings: self.session.namespaces.local_names(id),
                        at,
                    })
                }
            }
        }
        Ok(id)
    }

    /// The function-call protocol.
    pub(crate) fn call_function(
        &mut self,
        func: &Rc<RefCell<Function>>,
        args: Vec<Value>,
        span: Span,
    ) -> RuntimeResult<Value> {
        let at = self.at(span);
        let (name, lambda) = {
            let f = func.borrow();
            match f.select_lambda(&args) {
                Some(lambda) => (f.name().to_string(), lambda),
                None => {
                    return Err(RuntimeError::InvalidFunctionCall {
                        name: f.name().to_string(),
                        arguments: render_arguments(&args),
                        signatures: f.signatures(),
                        at,
                    })
                }
            }
        };

        let label = format!(
            "{name}({})",
            args.iter()
                .map(|a| a.unwrap_property().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
        debug!(call = %label, "entering function");
        self.session.scopes.enter_context(label);
        // The callee's own name is visible inside the new frame, so
        // recursion works even when the name is shadowed elsewhere.
        self.session.scopes.set_function(name.clone(), func.clone());

        let named = function::name_arguments(&lambda, args);
        let is_builtin = matches!(lambda.body, LambdaBody::Builtin(_));
        for (param, value) in &named {
            // Builtins receive live property cells; user-defined
            // functions only ever see the current content.
            let bound = if is_builtin { value.clone() } else { value.unwrap_property() };
            self.session.scopes.set_variable(param.clone(), bound);
        }

        let result = match &lambda.body {
            LambdaBody::Block(stmts) => self.exec_block(stmts),
            LambdaBody::Builtin(native) => {
                let native = native.clone();
                let mut call =
                    BuiltinCall { args: named, executor: self.session.executor.as_mut(), at };
                native(&mut call)
            }
        };

        // This frame consumed the return; pop it whether the body
        // succeeded or failed, so the driver can keep the session.
        if self.session.scopes.has_returned() {
            self.session.scopes.end_return();
        }
        self.session.scopes.exit_context();
        result
    }

    /// Indexed-term readings, in order: a zero-arg-callable function is
    /// called and its result indexed; a one-`any`/`array`-parameter
    /// function receives the index wrapped in a single-element array; a
    /// directly indexable value is indexed.
    fn index_value(&mut self, container: Value, idx: &Value, span: Span) -> RuntimeResult<Value> {
        let at = self.at(span);
        match container {
            Value::Function(func) => {
                if func.borrow().select_lambda(&[]).is_some() {
                    let produced = self.call_function(&func, vec![], span)?;
                    return self.index_value(produced, idx, span);
                }
                if func.borrow().select_index_accessor().is_some() {
                    let wrapped = Value::Array(vec![idx.clone()]);
                    return self.call_function(&func, vec![wrapped], span);
                }
                Err(RuntimeError::UnexpectedType {
                    expected: "an indexable value or accessor function".into(),
                    actual: "function".into(),
                    at,
                })
            }
            other => {
                let mut unwrapped = other.unwrap_property();
                if !unwrapped.is_indexable() {
                    return Err(RuntimeError::UnexpectedType {
                        expected: "an indexable value".into(),
                        actual: unwrapped.kind().into(),
                        at,
                    });
                }
                let view = Indexable::of(&mut unwrapped).expect("checked indexable");
                view.get(idx, &at)
            }
        }
    }

    // ───── string interpolation ─────

    /// Substitute every `${...}` span: the content is re-lexed and
    /// re-parsed as an expression and evaluated against the current
    /// scope stack and namespace registry. String results substitute
    /// their raw contents, other values their display form, failures
    /// the empty string — interpolation never propagates an error.
    fn interpolate(&mut self, text: &str) -> RuntimeResult<Value> {
        if !text.contains("${") {
            return Ok(Value::Str(text.to_string()));
        }
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let mut depth = 1usize;
            let mut close = None;
            for (i, c) in after.char_indices() {
                match c {
                    '{' => depth += 1,
                    '}' => {
                        depth -= 1;
                        if depth == 0 {
                            close = Some(i);
                            break;
                        }
                    }
                    _ => {}
                }
            }
            let Some(end) = close else {
                // Unterminated `${` stays literal.
                out.push_str("${");
                rest = after;
                continue;
            };
            if let Ok(expr) = parser::parse_expression(&after[..end]) {
                if let Ok(value) = self.eval_expr(&expr) {
                    match value.unwrap_property() {
                        Value::Str(s) => out.push_str(&s),
                        Value::None => {}
                        other => out.push_str(&other.to_string()),
                    }
                }
            }
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        Ok(Value::Str(out))
    }
}

fn render_arguments(args: &[Value]) -> String {
    args.iter()
        .map(|a| {
            let v = a.unwrap_property();
            format!("{} `{}`", v.kind(), v)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::TypeSpec;
    use crate::builtins;
    use crate::exec::NoOpExecutor;
    use crate::loader::{LoadError, NamespaceLoader};
    use crate::runtime::property::Property;

    fn session() -> Session {
        Session::with_executor(Box::new(NoOpExecutor)).expect("session should build")
    }

    fn eval(src: &str) -> Value {
        session().eval_source(src).expect("evaluation should succeed")
    }

    fn eval_err(src: &str) -> RuntimeError {
        match session().eval_source(src) {
            Err(crate::runtime::error::ShaleError::Runtime(e)) => e,
            Err(other) => panic!("expected runtime error, got {other:?}"),
            Ok(v) => panic!("expected an error, got {v:?}"),
        }
    }

    // ── numeric coercion ──

    #[test]
    fn even_int_division_stays_int() {
        assert_eq!(eval("8 / 2"), Value::Int(4));
    }

    #[test]
    fn uneven_int_division_promotes() {
        assert_eq!(eval("7 / 2"), Value::Dec(3.5));
    }

    #[test]
    fn arithmetic_precedence() {
        assert_eq!(eval("2 + 3 * 4"), Value::Int(14));
        assert_eq!(eval("(2 + 3) * 4"), Value::Int(20));
        assert_eq!(eval("17 % 5"), Value::Int(2));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        assert!(matches!(eval_err("1 / 0"), RuntimeError::DivisionByZero { .. }));
    }

    // ── short-circuit ──

    #[test]
    fn and_short_circuits_on_false() {
        // The right side would divide by zero if evaluated.
        assert_eq!(eval("false && 1 / 0 == 1"), Value::Bool(false));
    }

    #[test]
    fn or_short_circuits_on_true() {
        assert_eq!(eval("true || 1 / 0 == 1"), Value::Bool(true));
    }

    #[test]
    fn logical_operands_must_be_bools() {
        assert!(matches!(eval_err("1 && true"), RuntimeError::UnexpectedType { .. }));
        assert!(matches!(eval_err("true || 0"), RuntimeError::UnexpectedType { .. }));
    }

    #[test]
    fn relational_operands_must_be_numbers() {
        let err = eval_err("\"a\" < \"b\"");
        assert!(matches!(err, RuntimeError::UnexpectedType { .. }));
    }

    #[test]
    fn equality_is_structural() {
        assert_eq!(eval("[1, 2] == [1, 2]"), Value::Bool(true));
        assert_eq!(eval("5 == 5.0"), Value::Bool(true));
        assert_eq!(eval("{ a: 1 } != { a: 2 }"), Value::Bool(true));
    }

    #[test]
    fn unary_operators() {
        assert_eq!(eval("!true"), Value::Bool(false));
        assert_eq!(eval("-(2 + 3)"), Value::Int(-5));
        assert!(matches!(eval_err("!1"), RuntimeError::UnexpectedType { .. }));
        assert!(matches!(eval_err("-\"x\""), RuntimeError::UnexpectedType { .. }));
    }

    // ── overload resolution ──

    #[test]
    fn overload_selection_is_order_stable_and_exclusive() {
        let mut s = session();
        s.eval_source(
            "function f(number n) { return \"num\" } function f(string v) { return \"str\" }",
        )
        .unwrap();
        assert_eq!(s.eval_source("f(\"x\")").unwrap(), Value::Str("str".into()));
        assert_eq!(s.eval_source("f(3)").unwrap(), Value::Str("num".into()));
        match s.eval_source("f(true)") {
            Err(crate::runtime::error::ShaleError::Runtime(
                RuntimeError::InvalidFunctionCall { signatures, .. },
            )) => assert_eq!(signatures.len(), 2),
            other => panic!("expected InvalidFunctionCall, got {other:?}"),
        }
    }

    #[test]
    fn conflicting_definition_is_rejected() {
        let err = eval_err("function g(number n) { } function g(any m) { }");
        assert!(matches!(err, RuntimeError::InvalidFunctionDefinition { .. }));
    }

    #[test]
    fn exact_duplicate_signature_is_rejected() {
        let err = eval_err("function g(number n) { } function g(number m) { }");
        assert!(matches!(err, RuntimeError::InvalidFunctionDefinition { .. }));
    }

    // ── scope and call protocol ──

    #[test]
    fn callee_frames_start_empty() {
        let mut s = session();
        s.eval_source("x = 1; function f() { return x }").unwrap();
        assert!(matches!(
            s.eval_source("f()"),
            Err(crate::runtime::error::ShaleError::Runtime(
                RuntimeError::UndefinedIdentifier { .. }
            ))
        ));
    }

    #[test]
    fn recursion_through_rebound_name() {
        let mut s = session();
        s.eval_source(
            "function fact(number n) { if n <= 1 { return 1 } return n * fact(n - 1) }",
        )
        .unwrap();
        assert_eq!(s.eval_source("fact(5)").unwrap(), Value::Int(120));
    }

    #[test]
    fn arguments_bind_by_declared_name() {
        let mut s = session();
        s.eval_source("function sub(number a, number b) { return a - b }").unwrap();
        assert_eq!(s.eval_source("sub(10, 4)").unwrap(), Value::Int(6));
    }

    #[test]
    fn return_propagates_through_nested_blocks() {
        let mut s = session();
        s.eval_source(
            "function h() { if true { if true { return 5 } } return 10 }",
        )
        .unwrap();
        assert_eq!(s.eval_source("h()").unwrap(), Value::Int(5));
    }

    #[test]
    fn return_stops_loop_iteration() {
        let mut s = session();
        s.eval_source(
            "function first(array items) { for x in items { return x } return null }",
        )
        .unwrap();
        assert_eq!(s.eval_source("first([7, 8, 9])").unwrap(), Value::Int(7));
    }

    #[test]
    fn bare_return_yields_null() {
        let mut s = session();
        s.eval_source("function nothing() { return }").unwrap();
        assert_eq!(s.eval_source("nothing()").unwrap(), Value::Null);
    }

    #[test]
    fn return_outside_function_is_invalid() {
        assert!(matches!(eval_err("return 5"), RuntimeError::InvalidReturn { .. }));
    }

    #[test]
    fn empty_body_produces_none_which_cannot_be_stored() {
        let mut s = session();
        s.eval_source("function f() { }").unwrap();
        assert!(matches!(
            s.eval_source("x = f()"),
            Err(crate::runtime::error::ShaleError::Runtime(RuntimeError::UnexpectedType { .. }))
        ));
    }

    // ── control flow ──

    #[test]
    fn if_elif_else_runs_exactly_one_branch() {
        let mut s = session();
        s.eval_source(
            "function pick(number n) { if n < 0 { return \"neg\" } elif n == 0 { return \"zero\" } else { return \"pos\" } }",
        )
        .unwrap();
        assert_eq!(s.eval_source("pick(-1)").unwrap(), Value::Str("neg".into()));
        assert_eq!(s.eval_source("pick(0)").unwrap(), Value::Str("zero".into()));
        assert_eq!(s.eval_source("pick(3)").unwrap(), Value::Str("pos".into()));
    }

    #[test]
    fn condition_must_be_bool() {
        assert!(matches!(eval_err("if 1 { }"), RuntimeError::UnexpectedType { .. }));
    }

    #[test]
    fn for_requires_an_array() {
        assert!(matches!(eval_err("for x in 5 { }"), RuntimeError::UnexpectedType { .. }));
    }

    #[test]
    fn for_loop_iterates_in_order() {
        let mut s = session();
        s.eval_source("total = 0; for n in [1, 2, 3] { total = total + n }").unwrap();
        assert_eq!(s.eval_source("total").unwrap(), Value::Int(6));
    }

    #[test]
    fn loop_variable_shadows_and_restores_a_namespace() {
        let mut s = session();
        s.eval_source("namespace x { v = 1 }").unwrap();
        s.eval_source("for x in [1, 2, 3] { y = x }").unwrap();
        // After the loop, `x` resolves to the namespace again...
        assert_eq!(s.eval_source("x.v").unwrap(), Value::Int(1));
        // ...and the loop variable binding is gone.
        match s.eval_source("x") {
            Ok(Value::Namespace(ns)) => assert_eq!(ns.name, "x"),
            other => panic!("expected the namespace back, got {other:?}"),
        }
    }

    #[test]
    fn loop_variable_shadows_and_restores_a_variable() {
        let mut s = session();
        s.eval_source("x = \"kept\"").unwrap();
        s.eval_source("for x in [1, 2] { }").unwrap();
        assert_eq!(s.eval_source("x").unwrap(), Value::Str("kept".into()));
    }

    // ── indexing ──

    #[test]
    fn array_indexing_and_append_at_count() {
        let mut s = session();
        s.eval_source("a = [1, 2, 3]").unwrap();
        assert_eq!(s.eval_source("a[0]").unwrap(), Value::Int(1));
        s.eval_source("a[3] = 4").unwrap();
        assert_eq!(s.eval_source("a[3]").unwrap(), Value::Int(4));
        match s.eval_source("a[9]") {
            Err(crate::runtime::error::ShaleError::Runtime(RuntimeError::IndexOutOfRange {
                valid,
                ..
            })) => assert_eq!(valid, vec!["0", "1", "2", "3"]),
            other => panic!("expected IndexOutOfRange, got {other:?}"),
        }
    }

    #[test]
    fn object_indexing_by_key() {
        let mut s = session();
        s.eval_source("o = { a: 1, b: 2 }").unwrap();
        assert_eq!(s.eval_source("o[\"b\"]").unwrap(), Value::Int(2));
        s.eval_source("o[\"c\"] = 3").unwrap();
        assert_eq!(s.eval_source("o[\"c\"]").unwrap(), Value::Int(3));
    }

    #[test]
    fn nested_index_assignment() {
        let mut s = session();
        s.eval_source("m = [[1, 2], [3, 4]]").unwrap();
        s.eval_source("m[1][0] = 9").unwrap();
        assert_eq!(s.eval_source("m[1][0]").unwrap(), Value::Int(9));
    }

    #[test]
    fn indexing_a_scalar_is_a_type_error() {
        assert!(matches!(eval_err("x = 5; x[0]"), RuntimeError::UnexpectedType { .. }));
    }

    #[test]
    fn zero_arg_callable_is_called_then_indexed() {
        let mut s = session();
        s.eval_source("function rows() { return [10, 20] }").unwrap();
        assert_eq!(s.eval_source("rows[1]").unwrap(), Value::Int(20));
    }

    #[test]
    fn accessor_function_receives_wrapped_index() {
        let mut s = session();
        s.eval_source("function table(array key) { return key[0] + 1 }").unwrap();
        assert_eq!(s.eval_source("table[41]").unwrap(), Value::Int(42));
    }

    // ── namespaces ──

    #[test]
    fn namespace_declaration_and_resolution() {
        let mut s = session();
        s.eval_source("namespace math { function square(number x) { return x * x } pi = 3.14 }")
            .unwrap();
        assert_eq!(s.eval_source("math.square(6)").unwrap(), Value::Int(36));
        assert_eq!(s.eval_source("math.pi").unwrap(), Value::Dec(3.14));
    }

    #[test]
    fn nested_namespace_resolution() {
        let mut s = session();
        s.eval_source("namespace outer { namespace inner { v = 7 } }").unwrap();
        assert_eq!(s.eval_source("outer.inner.v").unwrap(), Value::Int(7));
    }

    #[test]
    fn dotted_resolution_failure_lists_siblings() {
        let mut s = session();
        s.eval_source("namespace a { b = 1 }").unwrap();
        match s.eval_source("a.c") {
            Err(crate::runtime::error::ShaleError::Runtime(
                RuntimeError::InvalidNamespacedIdentifier { segment, siblings, .. },
            )) => {
                assert_eq!(segment, "c");
                assert_eq!(siblings, vec!["b"]);
            }
            other => panic!("expected InvalidNamespacedIdentifier, got {other:?}"),
        }
    }

    #[test]
    fn intermediate_segment_must_be_a_namespace() {
        let mut s = session();
        s.eval_source("namespace a { b = 1 }").unwrap();
        assert!(matches!(
            s.eval_source("a.b.c"),
            Err(crate::runtime::error::ShaleError::Runtime(RuntimeError::UnexpectedType { .. }))
        ));
    }

    #[test]
    fn namespace_member_assignment() {
        let mut s = session();
        s.eval_source("namespace cfg { retries = 3 }").unwrap();
        s.eval_source("cfg.retries = 4").unwrap();
        assert_eq!(s.eval_source("cfg.retries").unwrap(), Value::Int(4));
    }

    #[test]
    fn assigning_over_a_function_or_namespace_name_is_invalid() {
        let mut s = session();
        s.eval_source("function dup() { return 1 }").unwrap();
        assert!(matches!(
            s.eval_source("dup = 5"),
            Err(crate::runtime::error::ShaleError::Runtime(RuntimeError::InvalidDefinition {
                ..
            }))
        ));
        s.eval_source("namespace n2 { }").unwrap();
        assert!(matches!(
            s.eval_source("n2 = 1"),
            Err(crate::runtime::error::ShaleError::Runtime(RuntimeError::InvalidDefinition {
                ..
            }))
        ));
    }

    #[test]
    fn undefined_identifier_reports_name() {
        match eval_err("missing") {
            RuntimeError::UndefinedIdentifier { name, .. } => assert_eq!(name, "missing"),
            other => panic!("expected UndefinedIdentifier, got {other:?}"),
        }
    }

    // ── using / loader ──

    struct FixedLoader(&'static str);

    impl NamespaceLoader for FixedLoader {
        fn load(&mut self, _path: &std::path::Path) -> Result<Program, LoadError> {
            Ok(crate::parser::parse(self.0).expect("fixture parses"))
        }
    }

    #[test]
    fn using_registers_a_loaded_namespace() {
        let mut s = session();
        s.set_loader(Box::new(FixedLoader("function twice(number n) { return n * 2 }")));
        s.eval_source("using \"lib/twice.shale\" as lib").unwrap();
        assert_eq!(s.eval_source("lib.twice(21)").unwrap(), Value::Int(42));
    }

    #[test]
    fn using_default_name_is_the_file_stem() {
        let mut s = session();
        s.set_loader(Box::new(FixedLoader("v = 1")));
        s.eval_source("using \"dir/tools.shale\"").unwrap();
        assert_eq!(s.eval_source("tools.v").unwrap(), Value::Int(1));
    }

    #[test]
    fn failed_load_is_reported() {
        let mut s = session();
        // Default ScriptLoader; the path does not exist.
        assert!(matches!(
            s.eval_source("using \"/no/such/file.shale\""),
            Err(crate::runtime::error::ShaleError::Runtime(RuntimeError::LoadFailed { .. }))
        ));
    }

    // ── properties ──

    #[test]
    fn builtins_receive_live_property_cells() {
        let mut s = session();
        let ns = s.namespaces.create("t", None);
        s.namespaces.register_root(ns);
        let cell = Property::cell("p", Value::Int(0), None);
        s.namespaces.set(ns, "p", Value::Property(cell.clone()));
        builtins::add_lambda(
            &mut s,
            ns,
            "bump",
            vec![Param::new("p", TypeSpec::Any)],
            |call| match call.property("p") {
                Some(cell) => {
                    let next = match cell.borrow().get() {
                        Value::Int(i) => Value::Int(i + 1),
                        other => other,
                    };
                    cell.borrow_mut().set(next);
                    Ok(Value::Null)
                }
                None => Ok(Value::Bool(false)),
            },
        )
        .unwrap();
        s.eval_source("t.bump(t.p)").unwrap();
        assert_eq!(cell.borrow().get(), Value::Int(1));
    }

    #[test]
    fn user_functions_see_property_contents_only() {
        let mut s = session();
        let ns = s.namespaces.create("t", None);
        s.namespaces.register_root(ns);
        let cell = Property::cell("p", Value::Int(5), None);
        s.namespaces.set(ns, "p", Value::Property(cell));
        s.eval_source("function id(x) { return x }").unwrap();
        assert_eq!(s.eval_source("id(t.p)").unwrap(), Value::Int(5));
    }

    #[test]
    fn properties_read_transparently_in_expressions() {
        let mut s = session();
        let ns = s.namespaces.create("t", None);
        s.namespaces.register_root(ns);
        let cell = Property::cell("p", Value::Int(40), None);
        s.namespaces.set(ns, "p", Value::Property(cell));
        assert_eq!(s.eval_source("t.p + 2").unwrap(), Value::Int(42));
    }

    // ── string interpolation ──

    #[test]
    fn interpolation_round_trip() {
        assert_eq!(eval("\"a${1+1}b\""), Value::Str("a2b".into()));
    }

    #[test]
    fn interpolation_sees_current_scope() {
        let mut s = session();
        s.eval_source("name = \"world\"").unwrap();
        assert_eq!(s.eval_source("\"hello ${name}\"").unwrap(), Value::Str("hello world".into()));
    }

    #[test]
    fn interpolation_of_string_results_is_raw() {
        assert_eq!(
            eval(r#""${string.upper(\"ab\")}!""#),
            Value::Str("AB!".into())
        );
    }

    #[test]
    fn interpolation_failures_substitute_empty() {
        assert_eq!(eval("\"x${nope}y\""), Value::Str("xy".into()));
        assert_eq!(eval("\"x${1 +}y\""), Value::Str("xy".into()));
    }

    #[test]
    fn unterminated_interpolation_stays_literal() {
        assert_eq!(eval("\"a${1\""), Value::Str("a${1".into()));
    }

    #[test]
    fn interpolation_renders_non_strings_via_display() {
        assert_eq!(eval("\"${[1, 2]}\""), Value::Str("[1, 2]".into()));
        assert_eq!(eval("\"${null}\""), Value::Str("null".into()));
    }

    // ── builtins ──

    #[test]
    fn string_builtins() {
        assert_eq!(eval("string.length(\"héllo\")"), Value::Int(5));
        assert_eq!(eval("string.substring(\"abcdef\", 1, 3)"), Value::Str("bc".into()));
        assert_eq!(eval("string.upper(\"ab\")"), Value::Str("AB".into()));
        assert_eq!(eval("string.concat(\"ab\", \"cd\")"), Value::Str("abcd".into()));
        assert_eq!(eval("string.matches(\"abc123\", \"[0-9]+\")"), Value::Bool(true));
    }

    #[test]
    fn substring_bounds_are_checked() {
        assert!(matches!(
            eval_err("string.substring(\"ab\", 0, 5)"),
            RuntimeError::IndexOutOfRange { .. }
        ));
    }

    #[test]
    fn json_bridge_round_trip() {
        assert_eq!(eval("string.fromJson(\"[1, 2]\")[1]"), Value::Int(2));
        assert_eq!(eval("string.toJson([1, 2])"), Value::Str("[1,2]".into()));
    }

    #[test]
    fn array_builtins() {
        assert_eq!(eval("array.count([1, 2, 3])"), Value::Int(3));
        assert_eq!(eval("array.indexOf([5, 7], 7)"), Value::Int(1));
        assert_eq!(eval("array.indexOf([5], 9)"), Value::None);
        assert_eq!(eval("array.contains([5], 5)"), Value::Bool(true));
        assert_eq!(
            eval("array.insert([1, 2], 2, 3)"),
            Value::Array(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
        );
        assert_eq!(eval("array.delete([1, 2], 0)"), Value::Array(vec![Value::Int(2)]));
    }

    #[test]
    fn exec_reports_failure_code_without_an_executor() {
        // NoOpExecutor refuses to spawn; the builtin reports 127.
        assert_eq!(eval("shell.exec(\"true\")"), Value::Int(127));
    }

    #[test]
    fn statement_values() {
        // Assignment produces the assigned value; declarations produce
        // nothing.
        assert_eq!(eval("x = 3"), Value::Int(3));
        assert_eq!(eval("function f() { return 0 }"), Value::None);
        assert_eq!(eval("if false { 1 }"), Value::None);
    }
}
