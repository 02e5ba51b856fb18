//! Functions and overload resolution.
//!
//! A `Function` is a name plus an ordered list of lambdas. Each lambda
//! is either user-defined (typed parameter list + statement block) or
//! builtin (typed parameter list + native callable). Adding a lambda
//! whose signature conflicts with an existing one — equal arity and
//! every parameter pair type-compatible — is an
//! `InvalidFunctionDefinition`. Selection scans lambdas in declaration
//! order and returns the first whose arity and per-position argument
//! kinds match.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::ast::{Stmt, TypeSpec};
use crate::exec::ProcessExecutor;
use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::value::Value;

/// A declared parameter: name plus type specifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub spec: TypeSpec,
}

impl Param {
    pub fn new(name: impl Into<String>, spec: TypeSpec) -> Self {
        Self { name: name.into(), spec }
    }
}

/// Context handed to a builtin lambda: the bound named arguments and
/// the session's process executor. Arguments that were `Property`
/// cells arrive live — mutating them runs their write hooks.
pub struct BuiltinCall<'a> {
    pub args: Vec<(String, Value)>,
    pub executor: &'a mut dyn ProcessExecutor,
    /// Rendered source span of the call site, for diagnostics.
    pub at: String,
}

impl BuiltinCall<'_> {
    /// The bound argument with the given name. Selection guarantees
    /// every declared parameter is bound, so a miss is a programming
    /// error in the builtin itself.
    pub fn raw(&self, name: &str) -> &Value {
        self.args
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
            .unwrap_or_else(|| panic!("builtin argument `{name}` was not bound"))
    }

    /// The argument as a plain value, seeing through properties.
    pub fn value(&self, name: &str) -> Value {
        self.raw(name).unwrap_property()
    }

    pub fn string(&self, name: &str) -> RuntimeResult<String> {
        match self.value(name) {
            Value::Str(s) => Ok(s),
            other => Err(self.kind_error(name, "a string", &other)),
        }
    }

    pub fn int(&self, name: &str) -> RuntimeResult<i64> {
        match self.value(name) {
            Value::Int(i) => Ok(i),
            Value::Dec(d) if d.fract() == 0.0 => Ok(d as i64),
            other => Err(self.kind_error(name, "an integer", &other)),
        }
    }

    pub fn array(&self, name: &str) -> RuntimeResult<Vec<Value>> {
        match self.value(name) {
            Value::Array(items) => Ok(items),
            other => Err(self.kind_error(name, "an array", &other)),
        }
    }

    /// The live property cell behind an argument, if it is one.
    pub fn property(&self, name: &str) -> Option<Rc<RefCell<crate::runtime::property::Property>>> {
        match self.raw(name) {
            Value::Property(cell) => Some(cell.clone()),
            _ => None,
        }
    }

    fn kind_error(&self, name: &str, expected: &str, got: &Value) -> RuntimeError {
        RuntimeError::UnexpectedType {
            expected: format!("{expected} for `{name}`"),
            actual: got.kind().into(),
            at: self.at.clone(),
        }
    }
}

pub type BuiltinFn = dyn Fn(&mut BuiltinCall) -> RuntimeResult<Value>;

/// One concrete callable signature and body.
pub struct Lambda {
    pub params: Vec<Param>,
    pub body: LambdaBody,
}

pub enum LambdaBody {
    /// User-defined statement block, executed by the evaluator.
    Block(Vec<Stmt>),
    /// Native callable.
    Builtin(Rc<BuiltinFn>),
}

impl Lambda {
    pub fn signature(&self, name: &str) -> String {
        let params: Vec<String> =
            self.params.iter().map(|p| format!("{} {}", p.spec, p.name)).collect();
        format!("{name}({})", params.join(", "))
    }

    /// Whether the given positional arguments satisfy this signature.
    pub fn accepts(&self, args: &[Value]) -> bool {
        self.params.len() == args.len()
            && self.params.iter().zip(args).all(|(p, a)| spec_matches(p.spec, a))
    }
}

impl fmt::Debug for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.body {
            LambdaBody::Block(_) => "user",
            LambdaBody::Builtin(_) => "builtin",
        };
        write!(f, "Lambda[{kind}]({})", self.signature(""))
    }
}

/// Does a runtime value satisfy a parameter specifier? Properties are
/// matched by their current content.
pub fn spec_matches(spec: TypeSpec, value: &Value) -> bool {
    if spec == TypeSpec::Any {
        return true;
    }
    let value = value.unwrap_property();
    match spec {
        TypeSpec::Any => true,
        TypeSpec::Bool => matches!(value, Value::Bool(_)),
        TypeSpec::Number => value.is_number(),
        TypeSpec::String => matches!(value, Value::Str(_)),
        TypeSpec::Object => matches!(value, Value::Object(_)),
        TypeSpec::Array => matches!(value, Value::Array(_)),
    }
}

/// A named overload set.
#[derive(Debug)]
pub struct Function {
    name: String,
    lambdas: Vec<Rc<Lambda>>,
}

impl Function {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), lambdas: Vec::new() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn into_value(self) -> Value {
        Value::Function(Rc::new(RefCell::new(self)))
    }

    /// Register a user-defined overload.
    pub fn add_user_lambda(
        &mut self,
        params: Vec<Param>,
        body: Vec<Stmt>,
        at: &str,
    ) -> RuntimeResult<()> {
        self.check_conflict(&params, at)?;
        self.lambdas.push(Rc::new(Lambda { params, body: LambdaBody::Block(body) }));
        Ok(())
    }

    /// Register a builtin overload.
    pub fn add_builtin_lambda(
        &mut self,
        params: Vec<Param>,
        body: impl Fn(&mut BuiltinCall) -> RuntimeResult<Value> + 'static,
    ) -> RuntimeResult<()> {
        self.check_conflict(&params, "builtin registration")?;
        self.lambdas.push(Rc::new(Lambda { params, body: LambdaBody::Builtin(Rc::new(body)) }));
        Ok(())
    }

    /// Two signatures conflict when they have equal arity and every
    /// parameter pair is type-compatible (equal specifier, or either
    /// side is `any`).
    fn check_conflict(&self, params: &[Param], at: &str) -> RuntimeResult<()> {
        let conflicting = self.lambdas.iter().any(|existing| {
            existing.params.len() == params.len()
                && existing.params.iter().zip(params).all(|(a, b)| {
                    a.spec == b.spec || a.spec == TypeSpec::Any || b.spec == TypeSpec::Any
                })
        });
        if conflicting {
            return Err(RuntimeError::InvalidFunctionDefinition {
                name: self.name.clone(),
                signatures: self.signatures(),
                at: at.to_string(),
            });
        }
        Ok(())
    }

    /// First definition, in declaration order, whose arity and
    /// per-position argument kinds match. `None` means no overload
    /// matches — callers decide between probing and raising
    /// `InvalidFunctionCall`.
    pub fn select_lambda(&self, args: &[Value]) -> Option<Rc<Lambda>> {
        self.lambdas.iter().find(|l| l.accepts(args)).cloned()
    }

    /// A lambda taking exactly one `any`/`array` parameter, used by the
    /// indexed-term reading that feeds the index through a call.
    pub fn select_index_accessor(&self) -> Option<Rc<Lambda>> {
        self.lambdas
            .iter()
            .find(|l| {
                l.params.len() == 1
                    && matches!(l.params[0].spec, TypeSpec::Any | TypeSpec::Array)
            })
            .cloned()
    }

    pub fn signatures(&self) -> Vec<String> {
        self.lambdas.iter().map(|l| l.signature(&self.name)).collect()
    }
}

/// Zip positional arguments with the selected lambda's parameter names.
pub fn name_arguments(lambda: &Lambda, args: Vec<Value>) -> Vec<(String, Value)> {
    lambda.params.iter().map(|p| p.name.clone()).zip(args).collect()
}
