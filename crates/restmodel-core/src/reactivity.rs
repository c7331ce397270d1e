// ── Reactivity ──
//
// Every write the engine makes to a model record or its meta record goes
// through this trait, so a host can observe or intercept property sets.

use serde_json::{Map, Value};

use crate::record::Record;

/// Observable property writes.
pub trait Reactivity: Send + Sync {
    /// Set a top-level key, replacing any previous value.
    fn set_property(&self, record: &mut Record, key: &str, value: Value);

    /// Set a value at a dot/bracket path (`http.errors`, `items[0].name`),
    /// creating intermediate records as needed.
    fn set_nested_property(&self, record: &mut Record, path: &str, value: Value);
}

/// Plain in-place mutation.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectReactivity;

impl Reactivity for DirectReactivity {
    fn set_property(&self, record: &mut Record, key: &str, value: Value) {
        record.insert(key.to_owned(), value);
    }

    fn set_nested_property(&self, record: &mut Record, path: &str, value: Value) {
        let parts = split_path(path);
        let Some((head, rest)) = parts.split_first() else {
            return;
        };
        let slot = record.entry(head.clone()).or_insert(Value::Null);
        set_at(slot, rest, value);
    }
}

/// Split `a.b[0].c` into `["a", "b", "0", "c"]`.
fn split_path(path: &str) -> Vec<String> {
    path.split(['.', '[', ']'])
        .filter(|part| !part.is_empty())
        .map(|part| part.trim_matches(|c| c == '"' || c == '\'').to_owned())
        .collect()
}

fn set_at(target: &mut Value, parts: &[String], value: Value) {
    let Some((head, rest)) = parts.split_first() else {
        *target = value;
        return;
    };

    if let Value::Array(items) = target {
        if let Ok(idx) = head.parse::<usize>() {
            if idx == items.len() {
                items.push(Value::Null);
            }
            if let Some(slot) = items.get_mut(idx) {
                set_at(slot, rest, value);
                return;
            }
        }
    }

    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(map) = target {
        let slot = map.entry(head.clone()).or_insert(Value::Null);
        set_at(slot, rest, value);
    }
}
