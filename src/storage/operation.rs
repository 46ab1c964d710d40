// Copyright (c) 2025 - Cowboy AI, Inc.
//! Atomic storage operators
//!
//! Operators address the storage blob with dotted paths (`"stats.count"`,
//! `"history.0"`). Numeric segments index into arrays. Semantics follow the
//! document-store update operators:
//!
//! - `set`, `inc`, `mul`, `push`, `unshift`, `slice` create missing parents
//! - `inc` on a missing field sets it, `mul` on a missing field sets zero
//! - `unset`, `rename`, `pop`, `shift` on a missing field do nothing
//! - `slice(0)` empties, `slice(n)` keeps the first n, `slice(-n)` the last n
//!
//! An operator either applies completely or leaves the blob untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use super::{StorageError, StorageResult};

/// One atomic mutation of a storage blob
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum StorageOperation {
    Rename { from: String, to: String },
    Inc { path: String, by: Number },
    Mul { path: String, by: Number },
    Set { path: String, value: Value },
    Unset { path: String },
    Slice { path: String, size: i64 },
    Shift { path: String },
    Unshift { path: String, value: Value },
    Pop { path: String },
    Push { path: String, values: Vec<Value> },
}

impl StorageOperation {
    pub fn rename(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::Rename {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn inc(path: impl Into<String>, by: impl Into<Number>) -> Self {
        Self::Inc {
            path: path.into(),
            by: by.into(),
        }
    }

    pub fn mul(path: impl Into<String>, by: impl Into<Number>) -> Self {
        Self::Mul {
            path: path.into(),
            by: by.into(),
        }
    }

    pub fn set(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Set {
            path: path.into(),
            value: value.into(),
        }
    }

    pub fn unset(path: impl Into<String>) -> Self {
        Self::Unset { path: path.into() }
    }

    pub fn slice(path: impl Into<String>, size: i64) -> Self {
        Self::Slice {
            path: path.into(),
            size,
        }
    }

    pub fn shift(path: impl Into<String>) -> Self {
        Self::Shift { path: path.into() }
    }

    pub fn unshift(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Unshift {
            path: path.into(),
            value: value.into(),
        }
    }

    pub fn pop(path: impl Into<String>) -> Self {
        Self::Pop { path: path.into() }
    }

    pub fn push<I>(path: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        Self::Push {
            path: path.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Operator name, for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Rename { .. } => "rename",
            Self::Inc { .. } => "inc",
            Self::Mul { .. } => "mul",
            Self::Set { .. } => "set",
            Self::Unset { .. } => "unset",
            Self::Slice { .. } => "slice",
            Self::Shift { .. } => "shift",
            Self::Unshift { .. } => "unshift",
            Self::Pop { .. } => "pop",
            Self::Push { .. } => "push",
        }
    }
}

/// Apply `operation` to `storage`; on error `storage` is unchanged
pub fn apply_operation(storage: &mut Value, operation: &StorageOperation) -> StorageResult<()> {
    let mut working = storage.clone();
    apply_in_place(&mut working, operation)?;
    *storage = working;
    Ok(())
}

fn apply_in_place(root: &mut Value, operation: &StorageOperation) -> StorageResult<()> {
    match operation {
        StorageOperation::Rename { from, to } => {
            let source = segments(from)?;
            let target = segments(to)?;
            if source == target {
                return Ok(());
            }
            if let Some(value) = take(root, &source) {
                *slot_mut(root, &target, to)? = value;
            }
        }
        StorageOperation::Inc { path, by } => {
            let slot = slot_mut(root, &segments(path)?, path)?;
            let next = match &*slot {
                Value::Null => by.clone(),
                Value::Number(current) => combine(current, by, i64::checked_add, |a, b| a + b, path)?,
                _ => return Err(mismatch(path, "a number")),
            };
            *slot = Value::Number(next);
        }
        StorageOperation::Mul { path, by } => {
            let slot = slot_mut(root, &segments(path)?, path)?;
            let next = match &*slot {
                Value::Null if by.is_f64() => Number::from_f64(0.0).unwrap_or_else(|| 0.into()),
                Value::Null => Number::from(0),
                Value::Number(current) => combine(current, by, i64::checked_mul, |a, b| a * b, path)?,
                _ => return Err(mismatch(path, "a number")),
            };
            *slot = Value::Number(next);
        }
        StorageOperation::Set { path, value } => {
            *slot_mut(root, &segments(path)?, path)? = value.clone();
        }
        StorageOperation::Unset { path } => {
            take(root, &segments(path)?);
        }
        StorageOperation::Slice { path, size } => {
            let items = array_slot(root, path)?;
            let size = *size;
            if size == 0 {
                items.clear();
            } else if size > 0 {
                items.truncate(size.unsigned_abs() as usize);
            } else {
                let keep = size.unsigned_abs() as usize;
                if items.len() > keep {
                    let drop = items.len() - keep;
                    items.drain(..drop);
                }
            }
        }
        StorageOperation::Shift { path } => {
            if let Some(items) = existing_array(root, path)? {
                if !items.is_empty() {
                    items.remove(0);
                }
            }
        }
        StorageOperation::Pop { path } => {
            if let Some(items) = existing_array(root, path)? {
                items.pop();
            }
        }
        StorageOperation::Unshift { path, value } => {
            array_slot(root, path)?.insert(0, value.clone());
        }
        StorageOperation::Push { path, values } => {
            array_slot(root, path)?.extend(values.iter().cloned());
        }
    }
    Ok(())
}

fn segments(path: &str) -> StorageResult<Vec<&str>> {
    let parts: Vec<&str> = path.split('.').collect();
    if parts.iter().any(|part| part.is_empty()) {
        return Err(StorageError::InvalidPath(path.to_string()));
    }
    Ok(parts)
}

fn mismatch(path: &str, expected: &'static str) -> StorageError {
    StorageError::TypeMismatch {
        path: path.to_string(),
        expected,
    }
}

/// Walk to `segments`, creating missing objects; the leaf is `Null` if new
fn slot_mut<'a>(
    root: &'a mut Value,
    segments: &[&str],
    path: &str,
) -> StorageResult<&'a mut Value> {
    let mut current = root;
    for segment in segments {
        if current.is_null() {
            *current = Value::Object(Map::new());
        }
        current = match current {
            Value::Object(map) => map.entry(segment.to_string()).or_insert(Value::Null),
            Value::Array(items) => {
                let index = segment
                    .parse::<usize>()
                    .map_err(|_| StorageError::InvalidPath(path.to_string()))?;
                items
                    .get_mut(index)
                    .ok_or_else(|| StorageError::InvalidPath(path.to_string()))?
            }
            _ => return Err(mismatch(path, "an object or array")),
        };
    }
    Ok(current)
}

fn find_mut<'a>(root: &'a mut Value, segments: &[&str]) -> Option<&'a mut Value> {
    let mut current = root;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get_mut(*segment)?,
            Value::Array(items) => items.get_mut(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Remove the value at `segments`; array elements are nulled, not removed
fn take(root: &mut Value, segments: &[&str]) -> Option<Value> {
    let (last, parents) = segments.split_last()?;
    match find_mut(root, parents)? {
        Value::Object(map) => map.remove(*last),
        Value::Array(items) => {
            let index = last.parse::<usize>().ok()?;
            items
                .get_mut(index)
                .map(|value| std::mem::replace(value, Value::Null))
        }
        _ => None,
    }
}

fn array_slot<'a>(root: &'a mut Value, path: &str) -> StorageResult<&'a mut Vec<Value>> {
    let slot = slot_mut(root, &segments(path)?, path)?;
    if slot.is_null() {
        *slot = Value::Array(Vec::new());
    }
    match slot {
        Value::Array(items) => Ok(items),
        _ => Err(mismatch(path, "an array")),
    }
}

fn existing_array<'a>(root: &'a mut Value, path: &str) -> StorageResult<Option<&'a mut Vec<Value>>> {
    match find_mut(root, &segments(path)?) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => Ok(Some(items)),
        Some(_) => Err(mismatch(path, "an array")),
    }
}

fn combine(
    current: &Number,
    by: &Number,
    integer: fn(i64, i64) -> Option<i64>,
    float: fn(f64, f64) -> f64,
    path: &str,
) -> StorageResult<Number> {
    if let (Some(a), Some(b)) = (current.as_i64(), by.as_i64()) {
        if let Some(result) = integer(a, b) {
            return Ok(Number::from(result));
        }
    }
    match (current.as_f64(), by.as_f64()) {
        (Some(a), Some(b)) => {
            Number::from_f64(float(a, b)).ok_or_else(|| mismatch(path, "a finite number"))
        }
        _ => Err(mismatch(path, "a number")),
    }
}
