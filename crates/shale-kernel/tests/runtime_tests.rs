//! Crate-level tests for the public runtime surface: a session driven
//! through `evaluate` with a pre-parsed tree, plus span reporting.

use rstest::rstest;

use shale_kernel::parser;
use shale_kernel::{NoOpExecutor, RuntimeError, Session, ShaleError, Value};

fn session() -> Session {
    Session::with_executor(Box::new(NoOpExecutor)).expect("session should build")
}

#[test]
fn evaluate_accepts_a_pre_parsed_tree() {
    let program = parser::parse("1 + 2 * 3").expect("parses");
    let mut s = session();
    assert_eq!(s.evaluate(&program, true).unwrap(), Value::Int(7));
}

#[test]
fn evaluate_single_statement_shares_session_state() {
    let mut s = session();
    let assign = parser::parse("x = 10").expect("parses");
    s.evaluate(&assign, false).unwrap();
    let read = parser::parse("x * x").expect("parses");
    assert_eq!(s.evaluate(&read, false).unwrap(), Value::Int(100));
}

#[rstest]
#[case("8 / 2", Value::Int(4))]
#[case("7 / 2", Value::Dec(3.5))]
#[case("9 % 4", Value::Int(1))]
#[case("1.5 + 1", Value::Dec(2.5))]
#[case("2 < 3", Value::Bool(true))]
#[case("\"a${2 * 2}b\"", Value::Str("a4b".into()))]
fn expression_results(#[case] src: &str, #[case] expected: Value) {
    assert_eq!(session().eval_source(src).unwrap(), expected);
}

#[test]
fn type_errors_name_the_offending_span() {
    let mut s = session();
    let err = s.eval_source("true && 3").unwrap_err();
    let ShaleError::Runtime(RuntimeError::UnexpectedType { actual, at, .. }) = err else {
        panic!("expected UnexpectedType");
    };
    assert_eq!(actual, "number");
    // The span points at the right operand, column 9.
    assert!(at.contains("columns 9:9"), "unexpected span: {at}");
}

#[test]
fn script_file_name_prefixes_diagnostics() {
    let mut s = session();
    s.set_source_path(std::path::Path::new("boot.shale"));
    let err = s.eval_source("1 / 0").unwrap_err();
    assert!(err.to_string().contains("boot.shale"), "missing file prefix: {err}");
}

#[test]
fn multi_line_spans_render_as_a_range() {
    let mut s = session();
    let err = s.eval_source("[1,\n2] < [3,\n4]").unwrap_err();
    let text = err.to_string();
    // Relational operands must be numbers; the offender spans lines.
    assert!(text.contains("lines 1:1 to 2:2"), "unexpected span: {text}");
}
