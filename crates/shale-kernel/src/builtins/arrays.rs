//! `array` — indexable helpers.
//!
//! Arguments arrive by value (assignment copies), so the mutating
//! helpers return the updated array rather than editing in place.

use crate::ast::TypeSpec;
use crate::builtins::add_lambda;
use crate::runtime::error::RuntimeResult;
use crate::runtime::function::Param;
use crate::runtime::index::Indexable;
use crate::runtime::session::Session;
use crate::runtime::value::Value;

pub(crate) fn install(session: &mut Session) -> RuntimeResult<()> {
    let ns = session.namespaces.create("array", None);
    session.namespaces.register_root(ns);

    add_lambda(session, ns, "count", vec![Param::new("items", TypeSpec::Array)], |call| {
        let mut items = Value::Array(call.array("items")?);
        let view = Indexable::of(&mut items).expect("argument is an array");
        Ok(Value::Int(view.count() as i64))
    })?;

    add_lambda(
        session,
        ns,
        "indexOf",
        vec![Param::new("items", TypeSpec::Array), Param::new("value", TypeSpec::Any)],
        |call| {
            let mut items = Value::Array(call.array("items")?);
            let view = Indexable::of(&mut items).expect("argument is an array");
            Ok(view.index_of(&call.value("value")))
        },
    )?;

    add_lambda(
        session,
        ns,
        "contains",
        vec![Param::new("items", TypeSpec::Array), Param::new("value", TypeSpec::Any)],
        |call| {
            let mut items = Value::Array(call.array("items")?);
            let view = Indexable::of(&mut items).expect("argument is an array");
            Ok(Value::Bool(!view.index_of(&call.value("value")).is_none()))
        },
    )?;

    add_lambda(
        session,
        ns,
        "insert",
        vec![
            Param::new("items", TypeSpec::Array),
            Param::new("index", TypeSpec::Number),
            Param::new("value", TypeSpec::Any),
        ],
        |call| {
            let mut items = Value::Array(call.array("items")?);
            let index = Value::Int(call.int("index")?);
            let mut view = Indexable::of(&mut items).expect("argument is an array");
            view.insert(&index, call.value("value"), &call.at)?;
            Ok(items)
        },
    )?;

    add_lambda(
        session,
        ns,
        "delete",
        vec![Param::new("items", TypeSpec::Array), Param::new("index", TypeSpec::Number)],
        |call| {
            let mut items = Value::Array(call.array("items")?);
            let index = Value::Int(call.int("index")?);
            let mut view = Indexable::of(&mut items).expect("argument is an array");
            view.delete(&index, &call.at)?;
            Ok(items)
        },
    )?;

    Ok(())
}
