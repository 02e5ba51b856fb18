//! `string` — text utilities.

use crate::ast::TypeSpec;
use crate::builtins::{add_lambda, json};
use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::function::Param;
use crate::runtime::ops;
use crate::runtime::session::Session;
use crate::runtime::value::Value;

pub(crate) fn install(session: &mut Session) -> RuntimeResult<()> {
    let ns = session.namespaces.create("string", None);
    session.namespaces.register_root(ns);

    add_lambda(
        session,
        ns,
        "length",
        vec![Param::new("value", TypeSpec::String)],
        |call| {
            let value = call.string("value")?;
            Ok(Value::Int(value.chars().count() as i64))
        },
    )?;

    // Half-open interval: substring("abcdef", 1, 3) is "bc".
    add_lambda(
        session,
        ns,
        "substring",
        vec![
            Param::new("value", TypeSpec::String),
            Param::new("start", TypeSpec::Number),
            Param::new("end", TypeSpec::Number),
        ],
        |call| {
            let value = call.string("value")?;
            let start = call.int("start")?;
            let end = call.int("end")?;
            let chars: Vec<char> = value.chars().collect();
            let len = chars.len() as i64;
            let valid: Vec<String> = (0..=len).map(|i| i.to_string()).collect();
            for bound in [start, end] {
                if bound < 0 || bound > len {
                    return Err(RuntimeError::IndexOutOfRange {
                        index: bound.to_string(),
                        valid: valid.clone(),
                        at: call.at.clone(),
                    });
                }
            }
            if start > end {
                return Err(RuntimeError::IndexOutOfRange {
                    index: start.to_string(),
                    valid,
                    at: call.at.clone(),
                });
            }
            Ok(Value::Str(chars[start as usize..end as usize].iter().collect()))
        },
    )?;

    add_lambda(session, ns, "upper", vec![Param::new("value", TypeSpec::String)], |call| {
        Ok(Value::Str(call.string("value")?.to_uppercase()))
    })?;

    add_lambda(session, ns, "lower", vec![Param::new("value", TypeSpec::String)], |call| {
        Ok(Value::Str(call.string("value")?.to_lowercase()))
    })?;

    add_lambda(
        session,
        ns,
        "concat",
        vec![Param::new("left", TypeSpec::String), Param::new("right", TypeSpec::String)],
        |call| {
            ops::binary(
                crate::ast::BinaryOp::Add,
                &Value::Str(call.string("left")?),
                &Value::Str(call.string("right")?),
                &call.at,
            )
        },
    )?;

    add_lambda(
        session,
        ns,
        "matches",
        vec![Param::new("value", TypeSpec::String), Param::new("pattern", TypeSpec::String)],
        |call| {
            let value = call.string("value")?;
            let pattern = call.string("pattern")?;
            let re = regex::Regex::new(&pattern).map_err(|e| RuntimeError::UnexpectedType {
                expected: "a valid regular expression".into(),
                actual: format!("{e}"),
                at: call.at.clone(),
            })?;
            Ok(Value::Bool(re.is_match(&value)))
        },
    )?;

    add_lambda(session, ns, "toJson", vec![Param::new("value", TypeSpec::Any)], |call| {
        Ok(Value::Str(json::value_to_json(&call.value("value")).to_string()))
    })?;

    add_lambda(session, ns, "fromJson", vec![Param::new("text", TypeSpec::String)], |call| {
        let text = call.string("text")?;
        let parsed: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| RuntimeError::UnexpectedType {
                expected: "valid JSON".into(),
                actual: format!("{e}"),
                at: call.at.clone(),
            })?;
        Ok(json::json_to_value(parsed))
    })?;

    Ok(())
}
