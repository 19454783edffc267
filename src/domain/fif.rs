//! Bridge between nested values and flat dotted-path maps ("fif").
//!
//! `flatten` walks a nested value and emits one entry per scalar leaf, keyed
//! by its dotted path; `unflatten` reverses this. Round-tripping is exact for
//! values without empty containers: empty maps and sequences own no leaves,
//! flatten to nothing, and so do not survive the trip.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::domain::error::{FifError, FifResult};

/// Flat fif representation: dotted leaf path to scalar value.
pub type FlatMap = BTreeMap<String, Value>;

/// Flattens a nested value into leaf entries.
pub fn flatten(value: &Value) -> FlatMap {
    let mut out = FlatMap::new();
    collect(value, "", &mut out);
    out
}

fn collect(value: &Value, prefix: &str, out: &mut FlatMap) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                collect(child, &join(prefix, key), out);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                collect(child, &join(prefix, &index.to_string()), out);
            }
        }
        scalar => {
            if !prefix.is_empty() {
                out.insert(prefix.to_string(), scalar.clone());
            }
        }
    }
}

/// Rebuilds a nested value from flat entries.
///
/// Each sibling segment set must be homogeneous: all numeric (a sequence,
/// positions in numeric order, gaps closed by omission) or all names (a map).
/// A key cannot be both a scalar and a container prefix.
pub fn unflatten(map: &FlatMap) -> FifResult<Value> {
    for key in map.keys() {
        if key.is_empty() || key.split('.').any(|segment| segment.is_empty()) {
            return Err(FifError::EmptySegment { key: key.clone() });
        }
    }
    let paths: Vec<(Vec<&str>, &Value)> = map
        .iter()
        .map(|(key, value)| (key.split('.').collect(), value))
        .collect();
    let entries: Vec<(&[&str], &Value)> = paths
        .iter()
        .map(|(segments, value)| (segments.as_slice(), *value))
        .collect();
    assemble(&entries, "")
}

fn assemble<'a>(entries: &[(&'a [&'a str], &'a Value)], path: &str) -> FifResult<Value> {
    let exhausted = entries
        .iter()
        .filter(|(segments, _)| segments.is_empty())
        .count();
    if exhausted > 0 {
        if exhausted == entries.len() && entries.len() == 1 {
            return Ok(entries[0].1.clone());
        }
        return Err(FifError::ScalarContainerConflict {
            path: path.to_string(),
        });
    }
    if entries.is_empty() {
        return Ok(Value::Object(Map::new()));
    }

    let mut numeric_groups: BTreeMap<usize, Vec<(&[&str], &Value)>> = BTreeMap::new();
    let mut named_groups: BTreeMap<&str, Vec<(&[&str], &Value)>> = BTreeMap::new();
    for &(segments, value) in entries {
        let head = segments[0];
        let tail = &segments[1..];
        match head.parse::<usize>() {
            Ok(index) => numeric_groups.entry(index).or_default().push((tail, value)),
            Err(_) => named_groups.entry(head).or_default().push((tail, value)),
        }
    }

    if !numeric_groups.is_empty() && !named_groups.is_empty() {
        return Err(FifError::MixedSegments {
            path: path.to_string(),
        });
    }

    if !numeric_groups.is_empty() {
        let mut items = Vec::new();
        for (index, group) in numeric_groups {
            items.push(assemble(&group, &join(path, &index.to_string()))?);
        }
        Ok(Value::Array(items))
    } else {
        let mut object = Map::new();
        for (name, group) in named_groups {
            object.insert(name.to_string(), assemble(&group, &join(path, name))?);
        }
        Ok(Value::Object(object))
    }
}

pub(crate) fn join(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{}.{}", prefix, segment)
    }
}
