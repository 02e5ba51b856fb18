//! `shell` — printing and external process execution.

use tracing::warn;

use crate::ast::TypeSpec;
use crate::builtins::add_lambda;
use crate::runtime::error::RuntimeResult;
use crate::runtime::function::Param;
use crate::runtime::session::Session;
use crate::runtime::value::Value;

pub(crate) fn install(session: &mut Session) -> RuntimeResult<()> {
    let ns = session.namespaces.create("shell", None);
    session.namespaces.register_root(ns);

    add_lambda(session, ns, "print", vec![Param::new("value", TypeSpec::Any)], |call| {
        println!("{}", call.value("value"));
        Ok(Value::Null)
    })?;

    // Blocking passthrough execution. The exit code comes back as a
    // number; a spawn failure reports 127, shell-style.
    add_lambda(session, ns, "exec", vec![Param::new("program", TypeSpec::String)], |call| {
        let program = call.string("program")?;
        Ok(run(call, &program, &[]))
    })?;

    add_lambda(
        session,
        ns,
        "exec",
        vec![Param::new("program", TypeSpec::String), Param::new("args", TypeSpec::Array)],
        |call| {
            let program = call.string("program")?;
            let args: Vec<String> =
                call.array("args")?.iter().map(|v| v.unwrap_property().to_string()).collect();
            Ok(run(call, &program, &args))
        },
    )?;

    Ok(())
}

fn run(call: &mut crate::runtime::function::BuiltinCall, program: &str, args: &[String]) -> Value {
    match call.executor.run(program, args) {
        Ok(code) => Value::Int(code as i64),
        Err(e) => {
            warn!(program, error = %e, "failed to spawn process");
            Value::Int(127)
        }
    }
}
