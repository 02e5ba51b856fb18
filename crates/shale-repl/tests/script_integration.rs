//! End-to-end script tests: full shale programs through a session.

use shale_kernel::{NoOpExecutor, Session, ShaleError, Value};

fn run(source: &str) -> Value {
    let mut session =
        Session::with_executor(Box::new(NoOpExecutor)).expect("session should build");
    session.run_script(source).expect("script should run")
}

fn run_err(source: &str) -> ShaleError {
    let mut session =
        Session::with_executor(Box::new(NoOpExecutor)).expect("session should build");
    session.run_script(source).expect_err("script should fail")
}

#[test]
fn fizzbuzz_style_program() {
    let value = run(
        r#"
        function label(number n) {
            if n % 15 == 0 { return "fizzbuzz" }
            elif n % 3 == 0 { return "fizz" }
            elif n % 5 == 0 { return "buzz" }
            return "${n}"
        }

        out = []
        for n in [1, 3, 5, 15] {
            out[array.count(out)] = label(n)
        }
        out
        "#,
    );
    assert_eq!(
        value,
        Value::Array(vec![
            Value::Str("1".into()),
            Value::Str("fizz".into()),
            Value::Str("buzz".into()),
            Value::Str("fizzbuzz".into()),
        ])
    );
}

#[test]
fn overloads_dispatch_by_signature_in_scripts() {
    let value = run(
        r#"
        function describe(number n) { return "number ${n}" }
        function describe(string v) { return "string ${v}" }
        function describe(array items) { return "array of ${array.count(items)}" }

        "${describe(2)}; ${describe(\"hi\")}; ${describe([1, 2, 3])}"
        "#,
    );
    assert_eq!(value, Value::Str("number 2; string hi; array of 3".into()));
}

#[test]
fn namespaces_organize_functions_and_state() {
    let value = run(
        r#"
        namespace stack {
            items = []

            function depth() { return array.count(stack.items) }
        }

        stack.items = array.insert(stack.items, 0, "bottom")
        stack.items = array.insert(stack.items, 1, "top")
        stack.depth()
        "#,
    );
    assert_eq!(value, Value::Int(2));
}

#[test]
fn recursion_and_accumulation() {
    let value = run(
        r#"
        function fib(number n) {
            if n < 2 { return n }
            return fib(n - 1) + fib(n - 2)
        }
        fib(10)
        "#,
    );
    assert_eq!(value, Value::Int(55));
}

#[test]
fn deeply_nested_return_unwinds_the_whole_function() {
    let value = run(
        r#"
        function find(array items, any wanted) {
            i = 0
            for item in items {
                if item == wanted {
                    return i
                }
                i = i + 1
            }
            return null
        }
        find(["a", "b", "c"], "c")
        "#,
    );
    assert_eq!(value, Value::Int(2));
}

#[test]
fn objects_and_nested_indexing() {
    let value = run(
        r#"
        config = { name: "shale", limits: { depth: 8 } }
        config["limits"]["depth"] = 16
        config["limits"]["depth"]
        "#,
    );
    assert_eq!(value, Value::Int(16));
}

#[test]
fn interpolation_composes_with_everything() {
    let value = run(
        r#"
        function greet(string who) { return "hello ${who}" }
        target = "interpolation"
        "${greet(target)} at depth ${1 + 1}"
        "#,
    );
    assert_eq!(value, Value::Str("hello interpolation at depth 2".into()));
}

#[test]
fn runtime_errors_carry_source_positions() {
    let err = run_err("x = 1\ny = x / 0\n");
    let message = err.to_string();
    assert!(message.contains("division by zero"), "unexpected message: {message}");
    assert!(message.contains("line 2"), "unexpected message: {message}");
}

#[test]
fn syntax_errors_abort_before_any_evaluation() {
    let err = run_err("x = (1 + \n");
    assert!(matches!(err, ShaleError::Syntax(_)));
}

#[test]
fn virtual_indexable_accessor_pattern() {
    let value = run(
        r#"
        function squares(array key) {
            n = key[0]
            return n * n
        }
        squares[12]
        "#,
    );
    assert_eq!(value, Value::Int(144));
}
