//! `env` — host-environment mirroring.
//!
//! `env.cwd` and `env.path` are `Property` cells: every write runs a
//! hook that pushes the new value into the process environment, so the
//! host and any spawned children observe it immediately. The PATH
//! companions (`addToPath`, `removeFromPath`, `setPath`) all mutate the
//! same live cell.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

use crate::ast::TypeSpec;
use crate::builtins::add_lambda;
use crate::runtime::error::RuntimeResult;
use crate::runtime::function::Param;
use crate::runtime::property::Property;
use crate::runtime::session::Session;
use crate::runtime::value::Value;

const PATH_SEP: char = ':';

fn current_path_entries() -> Vec<Value> {
    std::env::var("PATH")
        .unwrap_or_default()
        .split(PATH_SEP)
        .filter(|s| !s.is_empty())
        .map(|s| Value::Str(s.to_string()))
        .collect()
}

fn write_path_to_env(value: &Value) {
    if let Value::Array(entries) = value {
        let joined = entries
            .iter()
            .map(|v| v.unwrap_property().to_string())
            .collect::<Vec<_>>()
            .join(&PATH_SEP.to_string());
        std::env::set_var("PATH", joined);
    }
}

pub(crate) fn install(session: &mut Session) -> RuntimeResult<()> {
    let ns = session.namespaces.create("env", None);
    session.namespaces.register_root(ns);

    let cwd = std::env::current_dir()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| "/".to_string());
    let cwd_cell = Property::cell(
        "cwd",
        Value::Str(cwd),
        Some(Box::new(|value| {
            if let Value::Str(dir) = value {
                if let Err(e) = std::env::set_current_dir(dir) {
                    debug!(dir, error = %e, "could not change working directory");
                }
            }
        })),
    );
    session.namespaces.set(ns, "cwd", Value::Property(cwd_cell));

    let path_cell = Property::cell(
        "path",
        Value::Array(current_path_entries()),
        Some(Box::new(write_path_to_env)),
    );
    session.namespaces.set(ns, "path", Value::Property(path_cell.clone()));

    add_lambda(session, ns, "get", vec![Param::new("name", TypeSpec::String)], |call| {
        let name = call.string("name")?;
        Ok(match std::env::var(&name) {
            Ok(value) => Value::Str(value),
            Err(_) => Value::Null,
        })
    })?;

    add_lambda(
        session,
        ns,
        "set",
        vec![Param::new("name", TypeSpec::String), Param::new("value", TypeSpec::String)],
        |call| {
            std::env::set_var(call.string("name")?, call.string("value")?);
            Ok(Value::Null)
        },
    )?;

    let cell = path_cell.clone();
    add_lambda(session, ns, "addToPath", vec![Param::new("entry", TypeSpec::String)], move |call| {
        let entry = call.string("entry")?;
        let mut entries = as_entries(&cell);
        entries.push(Value::Str(entry));
        cell.borrow_mut().set(Value::Array(entries));
        Ok(Value::Null)
    })?;

    let cell = path_cell.clone();
    add_lambda(
        session,
        ns,
        "removeFromPath",
        vec![Param::new("entry", TypeSpec::String)],
        move |call| {
            let entry = Value::Str(call.string("entry")?);
            let entries: Vec<Value> =
                as_entries(&cell).into_iter().filter(|v| *v != entry).collect();
            cell.borrow_mut().set(Value::Array(entries));
            Ok(Value::Null)
        },
    )?;

    let cell = path_cell;
    add_lambda(session, ns, "setPath", vec![Param::new("entries", TypeSpec::Array)], move |call| {
        cell.borrow_mut().set(Value::Array(call.array("entries")?));
        Ok(Value::Null)
    })?;

    Ok(())
}

fn as_entries(cell: &Rc<RefCell<Property>>) -> Vec<Value> {
    match cell.borrow().get() {
        Value::Array(entries) => entries,
        _ => Vec::new(),
    }
}
