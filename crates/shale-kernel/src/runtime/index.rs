//! The Indexable capability: ordered (array) and keyed (object) member
//! access, insertion, deletion, and lookup.
//!
//! Array indices are the consecutive integers `0..count`; inserting at
//! `count` appends and deleting shifts. Object indices are string keys.
//! A wrong index kind is an `UnexpectedType`; an index outside the
//! current valid set is an `IndexOutOfRange` whose payload carries the
//! full valid-index list.

use std::collections::BTreeMap;

use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::value::Value;

/// Mutable view over an indexable value.
pub enum Indexable<'a> {
    Array(&'a mut Vec<Value>),
    Object(&'a mut BTreeMap<String, Value>),
}

impl<'a> Indexable<'a> {
    /// View a value as indexable, if it is an array or object.
    pub fn of(value: &'a mut Value) -> Option<Indexable<'a>> {
        match value {
            Value::Array(items) => Some(Indexable::Array(items)),
            Value::Object(entries) => Some(Indexable::Object(entries)),
            _ => None,
        }
    }

    pub fn count(&self) -> usize {
        match self {
            Indexable::Array(items) => items.len(),
            Indexable::Object(entries) => entries.len(),
        }
    }

    /// The currently valid indices, as values.
    pub fn indices(&self) -> Vec<Value> {
        match self {
            Indexable::Array(items) => (0..items.len() as i64).map(Value::Int).collect(),
            Indexable::Object(entries) => {
                entries.keys().map(|k| Value::Str(k.clone())).collect()
            }
        }
    }

    pub fn values(&self) -> Vec<Value> {
        match self {
            Indexable::Array(items) => items.to_vec(),
            Indexable::Object(entries) => entries.values().cloned().collect(),
        }
    }

    pub fn contains_index(&self, index: &Value) -> bool {
        match (self, index) {
            (Indexable::Array(items), Value::Int(i)) => *i >= 0 && (*i as usize) < items.len(),
            (Indexable::Object(entries), Value::Str(key)) => entries.contains_key(key),
            _ => false,
        }
    }

    pub fn get(&self, index: &Value, at: &str) -> RuntimeResult<Value> {
        match self {
            Indexable::Array(items) => {
                let i = self.array_index(index, at)?;
                Ok(items[i].clone())
            }
            Indexable::Object(entries) => {
                let key = self.object_key(index, at)?;
                match entries.get(&key) {
                    Some(v) => Ok(v.clone()),
                    None => Err(self.out_of_range(index, at)),
                }
            }
        }
    }

    /// Replace the value at an existing index.
    pub fn replace(&mut self, index: &Value, value: Value, at: &str) -> RuntimeResult<()> {
        match self {
            Indexable::Array(_) => {
                let i = self.array_index(index, at)?;
                let Indexable::Array(items) = self else { unreachable!() };
                items[i] = value;
                Ok(())
            }
            Indexable::Object(_) => {
                let key = self.object_key(index, at)?;
                if !self.contains_index(index) {
                    return Err(self.out_of_range(index, at));
                }
                let Indexable::Object(entries) = self else { unreachable!() };
                entries.insert(key, value);
                Ok(())
            }
        }
    }

    /// Insert a value. Arrays accept any index in `0..=count` — `count`
    /// appends, anything lower shifts. Objects accept a new or existing
    /// key.
    pub fn insert(&mut self, index: &Value, value: Value, at: &str) -> RuntimeResult<()> {
        match self {
            Indexable::Array(items) => {
                let i = match index {
                    Value::Int(i) if *i >= 0 && (*i as usize) <= items.len() => *i as usize,
                    Value::Int(_) => {
                        let valid: Vec<String> =
                            (0..=items.len() as i64).map(|i| i.to_string()).collect();
                        return Err(RuntimeError::IndexOutOfRange {
                            index: index.to_string(),
                            valid,
                            at: at.to_string(),
                        });
                    }
                    other => {
                        return Err(RuntimeError::UnexpectedType {
                            expected: "an integer index".into(),
                            actual: other.kind().into(),
                            at: at.to_string(),
                        })
                    }
                };
                items.insert(i, value);
                Ok(())
            }
            Indexable::Object(entries) => {
                let key = match index {
                    Value::Str(k) => k.clone(),
                    other => {
                        return Err(RuntimeError::UnexpectedType {
                            expected: "a string key".into(),
                            actual: other.kind().into(),
                            at: at.to_string(),
                        })
                    }
                };
                entries.insert(key, value);
                Ok(())
            }
        }
    }

    /// Delete the value at an existing index. Array deletion shifts
    /// later elements down.
    pub fn delete(&mut self, index: &Value, at: &str) -> RuntimeResult<()> {
        match self {
            Indexable::Array(_) => {
                let i = self.array_index(index, at)?;
                let Indexable::Array(items) = self else { unreachable!() };
                items.remove(i);
                Ok(())
            }
            Indexable::Object(_) => {
                let key = self.object_key(index, at)?;
                if !self.contains_index(index) {
                    return Err(self.out_of_range(index, at));
                }
                let Indexable::Object(entries) = self else { unreachable!() };
                entries.remove(&key);
                Ok(())
            }
        }
    }

    /// First index holding the given value: linear scan, `Value::None`
    /// when absent.
    pub fn index_of(&self, value: &Value) -> Value {
        match self {
            Indexable::Array(items) => items
                .iter()
                .position(|v| v == value)
                .map(|i| Value::Int(i as i64))
                .unwrap_or(Value::None),
            Indexable::Object(entries) => entries
                .iter()
                .find(|(_, v)| *v == value)
                .map(|(k, _)| Value::Str(k.clone()))
                .unwrap_or(Value::None),
        }
    }

    fn array_index(&self, index: &Value, at: &str) -> RuntimeResult<usize> {
        let Indexable::Array(items) = self else {
            unreachable!("array_index called on object view");
        };
        match index {
            Value::Int(i) if *i >= 0 && (*i as usize) < items.len() => Ok(*i as usize),
            Value::Int(_) => Err(self.out_of_range(index, at)),
            other => Err(RuntimeError::UnexpectedType {
                expected: "an integer index".into(),
                actual: other.kind().into(),
                at: at.to_string(),
            }),
        }
    }

    fn object_key(&self, index: &Value, at: &str) -> RuntimeResult<String> {
        match index {
            Value::Str(key) => Ok(key.clone()),
            other => Err(RuntimeError::UnexpectedType {
                expected: "a string key".into(),
                actual: other.kind().into(),
                at: at.to_string(),
            }),
        }
    }

    fn out_of_range(&self, index: &Value, at: &str) -> RuntimeError {
        RuntimeError::IndexOutOfRange {
            index: index.to_string(),
            valid: self.indices().iter().map(Value::to_string).collect(),
            at: at.to_string(),
        }
    }
}

/// Mutable element access for chained index assignment
/// (`a[0][1] = v` walks through this).
pub fn get_mut<'v>(
    container: &'v mut Value,
    index: &Value,
    at: &str,
) -> RuntimeResult<&'v mut Value> {
    match container {
        Value::Array(items) => {
            let len = items.len();
            match index {
                Value::Int(i) if *i >= 0 && (*i as usize) < len => Ok(&mut items[*i as usize]),
                Value::Int(_) => Err(RuntimeError::IndexOutOfRange {
                    index: index.to_string(),
                    valid: (0..len as i64).map(|i| i.to_string()).collect(),
                    at: at.to_string(),
                }),
                other => Err(RuntimeError::UnexpectedType {
                    expected: "an integer index".into(),
                    actual: other.kind().into(),
                    at: at.to_string(),
                }),
            }
        }
        Value::Object(entries) => match index {
            Value::Str(key) => {
                if !entries.contains_key(key) {
                    return Err(RuntimeError::IndexOutOfRange {
                        index: index.to_string(),
                        valid: entries.keys().cloned().collect(),
                        at: at.to_string(),
                    });
                }
                Ok(entries.get_mut(key).expect("checked key"))
            }
            other => Err(RuntimeError::UnexpectedType {
                expected: "a string key".into(),
                actual: other.kind().into(),
                at: at.to_string(),
            }),
        },
        other => Err(RuntimeError::UnexpectedType {
            expected: "an indexable value".into(),
            actual: other.kind().into(),
            at: at.to_string(),
        }),
    }
}
