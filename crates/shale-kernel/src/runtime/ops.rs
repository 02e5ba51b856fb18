//! Operator semantics on values.
//!
//! Numbers promote int⊕decimal → decimal; division of two integers that
//! divides evenly stays integer. Integer operations that would overflow
//! promote to the decimal representation instead of wrapping. Strings
//! and arrays support `+` (concatenation); strings also order
//! lexicographically for the builtins that sort or compare them. Any
//! other operator/operand pairing is an `InvalidOperation`.

use std::cmp::Ordering;

use crate::ast::{BinaryOp, UnaryOp};
use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::value::Value;

fn invalid(op: impl ToString, lhs: &Value, rhs: Option<&Value>, at: &str) -> RuntimeError {
    let operands = match rhs {
        Some(r) => format!("{} and {}", lhs.kind(), r.kind()),
        None => lhs.kind().to_string(),
    };
    RuntimeError::InvalidOperation { op: op.to_string(), operands, at: at.to_string() }
}

/// Apply a binary operator. `Or`/`And` short-circuit in the evaluator
/// and never reach this function.
pub fn binary(op: BinaryOp, lhs: &Value, rhs: &Value, at: &str) -> RuntimeResult<Value> {
    match op {
        BinaryOp::Add => add(lhs, rhs, at),
        BinaryOp::Sub => arith(op, lhs, rhs, at, i64::checked_sub, |a, b| a - b),
        BinaryOp::Mul => arith(op, lhs, rhs, at, i64::checked_mul, |a, b| a * b),
        BinaryOp::Div => div(lhs, rhs, at),
        BinaryOp::Mod => rem(lhs, rhs, at),
        BinaryOp::Eq => Ok(Value::Bool(lhs == rhs)),
        BinaryOp::NotEq => Ok(Value::Bool(lhs != rhs)),
        BinaryOp::Gt => ordered(op, lhs, rhs, at).map(|ord| Value::Bool(ord.is_gt())),
        BinaryOp::GtEq => ordered(op, lhs, rhs, at).map(|ord| Value::Bool(ord.is_ge())),
        BinaryOp::Lt => ordered(op, lhs, rhs, at).map(|ord| Value::Bool(ord.is_lt())),
        BinaryOp::LtEq => ordered(op, lhs, rhs, at).map(|ord| Value::Bool(ord.is_le())),
        BinaryOp::Or | BinaryOp::And => Err(invalid(op, lhs, Some(rhs), at)),
    }
}

/// Apply a unary operator: `!` on booleans, `-` on numbers.
pub fn unary(op: UnaryOp, value: &Value, at: &str) -> RuntimeResult<Value> {
    match (op, value) {
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOp::Neg, Value::Int(i)) => Ok(match i.checked_neg() {
            Some(n) => Value::Int(n),
            None => Value::Dec(-(*i as f64)),
        }),
        (UnaryOp::Neg, Value::Dec(d)) => Ok(Value::Dec(-d)),
        _ => Err(invalid(op, value, None, at)),
    }
}

/// Order two values: numbers numerically (across representations),
/// strings lexicographically.
pub fn compare(lhs: &Value, rhs: &Value, at: &str) -> RuntimeResult<Ordering> {
    ordered(BinaryOp::Lt, lhs, rhs, at)
}

fn ordered(op: BinaryOp, lhs: &Value, rhs: &Value, at: &str) -> RuntimeResult<Ordering> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
        (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
        _ if lhs.is_number() && rhs.is_number() => {
            let a = lhs.as_dec().expect("checked number");
            let b = rhs.as_dec().expect("checked number");
            a.partial_cmp(&b).ok_or_else(|| invalid(op, lhs, Some(rhs), at))
        }
        _ => Err(invalid(op, lhs, Some(rhs), at)),
    }
}

fn add(lhs: &Value, rhs: &Value, at: &str) -> RuntimeResult<Value> {
    match (lhs, rhs) {
        (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
        (Value::Array(a), Value::Array(b)) => {
            let mut out = a.clone();
            out.extend(b.iter().cloned());
            Ok(Value::Array(out))
        }
        _ => arith(BinaryOp::Add, lhs, rhs, at, i64::checked_add, |a, b| a + b),
    }
}

fn arith(
    op: BinaryOp,
    lhs: &Value,
    rhs: &Value,
    at: &str,
    int_op: fn(i64, i64) -> Option<i64>,
    dec_op: fn(f64, f64) -> f64,
) -> RuntimeResult<Value> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Ok(match int_op(*a, *b) {
            Some(n) => Value::Int(n),
            None => Value::Dec(dec_op(*a as f64, *b as f64)),
        }),
        _ if lhs.is_number() && rhs.is_number() => {
            let a = lhs.as_dec().expect("checked number");
            let b = rhs.as_dec().expect("checked number");
            Ok(Value::Dec(dec_op(a, b)))
        }
        _ => Err(invalid(op, lhs, Some(rhs), at)),
    }
}

fn div(lhs: &Value, rhs: &Value, at: &str) -> RuntimeResult<Value> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => {
            if *b == 0 {
                return Err(RuntimeError::DivisionByZero { at: at.to_string() });
            }
            if a % b == 0 {
                Ok(Value::Int(a / b))
            } else {
                Ok(Value::Dec(*a as f64 / *b as f64))
            }
        }
        _ if lhs.is_number() && rhs.is_number() => {
            let a = lhs.as_dec().expect("checked number");
            let b = rhs.as_dec().expect("checked number");
            if b == 0.0 {
                return Err(RuntimeError::DivisionByZero { at: at.to_string() });
            }
            Ok(Value::Dec(a / b))
        }
        _ => Err(invalid(BinaryOp::Div, lhs, Some(rhs), at)),
    }
}

fn rem(lhs: &Value, rhs: &Value, at: &str) -> RuntimeResult<Value> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => {
            if *b == 0 {
                return Err(RuntimeError::DivisionByZero { at: at.to_string() });
            }
            Ok(Value::Int(a % b))
        }
        _ if lhs.is_number() && rhs.is_number() => {
            let a = lhs.as_dec().expect("checked number");
            let b = rhs.as_dec().expect("checked number");
            if b == 0.0 {
                return Err(RuntimeError::DivisionByZero { at: at.to_string() });
            }
            Ok(Value::Dec(a % b))
        }
        _ => Err(invalid(BinaryOp::Mod, lhs, Some(rhs), at)),
    }
}
