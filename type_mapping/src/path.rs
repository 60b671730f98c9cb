//! Dotted field paths into JSON documents
//!
//! Paths look like `profile.address.city`. Numeric segments index into
//! existing arrays; missing object segments are created by writes.

use crate::types::ValueError;
use serde_json::{Map, Value};
use std::fmt;

/// A validated dotted path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    pub fn parse(path: &str) -> Result<Self, ValueError> {
        let path = path.trim();
        if path.is_empty() {
            return Err(ValueError::InvalidPath("path cannot be empty".to_string()));
        }

        let segments: Vec<String> = path.split('.').map(str::to_string).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(ValueError::InvalidPath(format!(
                "'{}' contains an empty segment",
                path
            )));
        }

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    fn split_last(&self) -> (&[String], &str) {
        match self.segments.split_last() {
            Some((last, parents)) => (parents, last.as_str()),
            None => (&[], ""),
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

fn descend<'a>(
    mut current: &'a mut Value,
    segments: &[String],
    create: bool,
) -> Result<&'a mut Value, ValueError> {
    for segment in segments {
        let node = current;
        current = match node {
            Value::Object(map) => {
                if create {
                    map.entry(segment.clone())
                        .or_insert_with(|| Value::Object(Map::new()))
                } else {
                    map.get_mut(segment)
                        .ok_or_else(|| ValueError::PathNotFound(segment.clone()))?
                }
            }
            Value::Array(items) => {
                let index = segment.parse::<usize>().map_err(|_| {
                    ValueError::InvalidPath(format!("'{}' is not an array index", segment))
                })?;
                items
                    .get_mut(index)
                    .ok_or_else(|| ValueError::PathNotFound(segment.clone()))?
            }
            _ => {
                return Err(ValueError::InvalidPath(format!(
                    "cannot descend into '{}': parent is not an object",
                    segment
                )))
            }
        };
    }
    Ok(current)
}

fn child_mut<'a>(parent: &'a mut Value, last: &str) -> Result<Option<&'a mut Value>, ValueError> {
    match parent {
        Value::Object(map) => Ok(map.get_mut(last)),
        Value::Array(items) => {
            let index = last.parse::<usize>().map_err(|_| {
                ValueError::InvalidPath(format!("'{}' is not an array index", last))
            })?;
            Ok(items.get_mut(index))
        }
        _ => Err(ValueError::InvalidPath(format!(
            "cannot address '{}': parent is not an object",
            last
        ))),
    }
}

/// Set the value at `path`, creating intermediate objects as needed
pub fn set_field(doc: &mut Value, path: &FieldPath, value: Value) -> Result<(), ValueError> {
    let (parents, last) = path.split_last();
    let parent = descend(doc, parents, true)?;

    if let Value::Object(map) = &mut *parent {
        map.insert(last.to_string(), value);
        return Ok(());
    }

    match child_mut(parent, last)? {
        Some(slot) => {
            *slot = value;
            Ok(())
        }
        None => Err(ValueError::PathNotFound(path.to_string())),
    }
}

/// Append to the array at `path`; a missing field becomes a new array
pub fn append_to_array(doc: &mut Value, path: &FieldPath, value: Value) -> Result<(), ValueError> {
    let (parents, last) = path.split_last();
    let parent = descend(doc, parents, true)?;

    if let Value::Object(map) = &mut *parent {
        if !map.contains_key(last) {
            map.insert(last.to_string(), Value::Array(vec![value]));
            return Ok(());
        }
    }

    match child_mut(parent, last)? {
        Some(Value::Array(items)) => {
            items.push(value);
            Ok(())
        }
        Some(_) => Err(ValueError::NotAnArray(path.to_string())),
        None => Err(ValueError::PathNotFound(path.to_string())),
    }
}

/// Remove and return the last element of the array at `path`
pub fn pop_from_array(doc: &mut Value, path: &FieldPath) -> Result<Option<Value>, ValueError> {
    let (parents, last) = path.split_last();
    let parent = descend(doc, parents, false)?;

    match child_mut(parent, last)? {
        Some(Value::Array(items)) => Ok(items.pop()),
        Some(_) => Err(ValueError::NotAnArray(path.to_string())),
        None => Err(ValueError::PathNotFound(path.to_string())),
    }
}
