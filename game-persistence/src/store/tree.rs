//! Path operations on a `serde_json::Value` tree.

use serde_json::{Map, Value};

use super::StoreError;

pub fn get_at<'a, S: AsRef<str>>(root: &'a Value, segments: &[S]) -> Option<&'a Value> {
    let mut node = root;
    for segment in segments {
        node = child(node, segment.as_ref())?;
    }
    match node {
        Value::Null => None,
        value => Some(value),
    }
}

/// Writes `value` at `segments`, creating intermediate objects. A numeric
/// segment indexes into an existing array; the index equal to its length
/// appends. Writing `null` deletes.
pub fn set_at<S: AsRef<str>>(root: &mut Value, segments: &[S], value: Value) -> Result<(), StoreError> {
    if value.is_null() {
        delete_at(root, segments);
        return Ok(());
    }

    let Some((last, parents)) = segments.split_last() else {
        *root = value;
        return Ok(());
    };

    let mut node = root;
    for segment in parents {
        node = child_or_insert(node, segment.as_ref())?;
    }
    put_child(node, last.as_ref(), value)
}

/// Pushes `value` onto the array at `segments`, creating the array when
/// absent. Returns the index written.
pub fn append_at<S: AsRef<str>>(root: &mut Value, segments: &[S], value: Value) -> Result<usize, StoreError> {
    let mut target: Vec<String> = segments.iter().map(|segment| segment.as_ref().to_string()).collect();
    match get_at(root, &target) {
        None => {
            set_at(root, &target, Value::Array(vec![value]))?;
            Ok(0)
        }
        Some(Value::Array(items)) => {
            let index = items.len();
            target.push(index.to_string());
            set_at(root, &target, value)?;
            Ok(index)
        }
        Some(_) => Err(StoreError::InvalidPath(target.join("/"))),
    }
}

/// Removes the subtree at `segments` and prunes parents left empty.
/// Returns whether anything was removed.
pub fn delete_at<S: AsRef<str>>(root: &mut Value, segments: &[S]) -> bool {
    if segments.is_empty() {
        let removed = !is_empty(root);
        *root = Value::Object(Map::new());
        return removed;
    }
    delete_in(root, segments)
}

/// Sorted child names of an object, or indices of an array.
pub fn child_keys_of(node: Option<&Value>) -> Vec<String> {
    let mut keys: Vec<String> = match node {
        Some(Value::Object(map)) => map.keys().cloned().collect(),
        Some(Value::Array(items)) => (0..items.len()).map(|index| index.to_string()).collect(),
        _ => Vec::new(),
    };
    keys.sort();
    keys
}

pub fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn delete_in<S: AsRef<str>>(node: &mut Value, segments: &[S]) -> bool {
    let Some((head, rest)) = segments.split_first() else {
        return false;
    };
    let head = head.as_ref();

    if rest.is_empty() {
        return remove_child(node, head);
    }

    let Some(next) = child_mut(node, head) else {
        return false;
    };
    let removed = delete_in(next, rest);
    if removed && is_empty(next) {
        remove_child(node, head);
    }
    removed
}

fn child<'a>(node: &'a Value, segment: &str) -> Option<&'a Value> {
    match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => items.get(segment.parse::<usize>().ok()?),
        _ => None,
    }
}

fn child_mut<'a>(node: &'a mut Value, segment: &str) -> Option<&'a mut Value> {
    match node {
        Value::Object(map) => map.get_mut(segment),
        Value::Array(items) => items.get_mut(segment.parse::<usize>().ok()?),
        _ => None,
    }
}

fn child_or_insert<'a>(node: &'a mut Value, segment: &str) -> Result<&'a mut Value, StoreError> {
    if !matches!(node, Value::Object(_) | Value::Array(_)) {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Array(items) => {
            let index = array_index(items, segment)?;
            if index == items.len() {
                items.push(Value::Object(Map::new()));
            }
            Ok(&mut items[index])
        }
        Value::Object(map) => Ok(map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()))),
        _ => Err(StoreError::InvalidPath(segment.to_string())),
    }
}

fn put_child(node: &mut Value, segment: &str, value: Value) -> Result<(), StoreError> {
    if !matches!(node, Value::Object(_) | Value::Array(_)) {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Array(items) => {
            let index = array_index(items, segment)?;
            if index == items.len() {
                items.push(value);
            } else {
                items[index] = value;
            }
            Ok(())
        }
        Value::Object(map) => {
            map.insert(segment.to_string(), value);
            Ok(())
        }
        _ => Err(StoreError::InvalidPath(segment.to_string())),
    }
}

fn remove_child(node: &mut Value, segment: &str) -> bool {
    match node {
        Value::Object(map) => map.remove(segment).is_some(),
        Value::Array(items) => match segment.parse::<usize>() {
            Ok(index) if index < items.len() => {
                items.remove(index);
                true
            }
            _ => false,
        },
        _ => false,
    }
}

fn array_index(items: &[Value], segment: &str) -> Result<usize, StoreError> {
    match segment.parse::<usize>() {
        Ok(index) if index <= items.len() => Ok(index),
        _ => Err(StoreError::InvalidPath(segment.to_string())),
    }
}
