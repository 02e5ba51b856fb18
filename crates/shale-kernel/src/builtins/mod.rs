//! The builtin library.
//!
//! Builtins are ordinary `Function` values with builtin lambdas,
//! registered under global namespaces when a session is created:
//!
//! - `string` — text utilities and the JSON bridge
//! - `array`  — indexable helpers
//! - `shell`  — printing and external process execution
//! - `env`    — host-environment mirroring through `Property` cells

mod arrays;
mod env;
pub mod json;
mod shell;
mod strings;

use crate::runtime::error::RuntimeResult;
use crate::runtime::function::{BuiltinCall, Function, Param};
use crate::runtime::namespace::NamespaceId;
use crate::runtime::session::Session;
use crate::runtime::value::Value;

pub(crate) fn register(session: &mut Session) -> RuntimeResult<()> {
    strings::install(session)?;
    arrays::install(session)?;
    shell::install(session)?;
    env::install(session)?;
    Ok(())
}

/// Add one builtin overload to a namespace function, creating the
/// function on first use.
pub(crate) fn add_lambda(
    session: &mut Session,
    ns: NamespaceId,
    name: &str,
    params: Vec<Param>,
    body: impl Fn(&mut BuiltinCall) -> RuntimeResult<Value> + 'static,
) -> RuntimeResult<()> {
    match session.namespaces.entry(ns, name) {
        Some(Value::Function(existing)) => {
            let existing = existing.clone();
            existing.borrow_mut().add_builtin_lambda(params, body)?;
        }
        _ => {
            let mut func = Function::new(name);
            func.add_builtin_lambda(params, body)?;
            session.namespaces.set(ns, name, func.into_value());
        }
    }
    Ok(())
}
