// ── Record helpers ──
//
// JSON-object primitives shared by the cascade, the pipeline and the
// payload builder.

use serde_json::{Map, Value};

/// One entity instance: field name → value, insertion ordered.
pub type Record = Map<String, Value>;

/// Coerce any value into a record. Non-objects become an empty record.
pub fn into_record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}

/// Build a record from a `json!` literal. Non-objects become empty.
#[macro_export]
macro_rules! record {
    ($($json:tt)+) => {
        $crate::record::into_record($crate::serde_json::json!($($json)+))
    };
}

/// Fill gaps in `high` from `low`, recursively.
///
/// Keys present in `high` always win; nested records are merged key by
/// key; arrays and scalars are never combined. A key absent from `high`
/// takes `low`'s value.
pub fn defaults_deep(high: &mut Record, low: &Record) {
    for (key, low_value) in low {
        match high.get_mut(key) {
            Some(Value::Object(high_nested)) => {
                if let Value::Object(low_nested) = low_value {
                    defaults_deep(high_nested, low_nested);
                }
            }
            Some(_) => {}
            None => {
                high.insert(key.clone(), low_value.clone());
            }
        }
    }
}

/// JavaScript-style truthiness: `null`, `false`, `0` and `""` are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Drop every falsy top-level entry.
pub fn pick_truthy(record: Record) -> Record {
    record.into_iter().filter(|(_, v)| is_truthy(v)).collect()
}

/// Interpret a value as a list of keys: a string is one key, an array
/// contributes its string items. Anything else is not a key list.
pub fn as_keys(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::String(s) => Some(vec![s.clone()]),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect(),
        ),
        _ => None,
    }
}

/// Render a scalar for use in routes and headers. Strings are unquoted.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
