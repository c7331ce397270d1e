// ── Validation error store ──
//
// Field → messages map populated from server-reported validation
// failures. Every field always holds a sequence, possibly empty.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;
use crate::record::display_value;

/// One flattened `(field, message)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Ordered per-field validation messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorStore {
    errors: IndexMap<String, Vec<String>>,
}

impl ErrorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a server payload. See [`ErrorStore::set`].
    pub fn from_value(value: Value) -> Result<Self, CoreError> {
        let mut store = Self::new();
        store.set(value)?;
        Ok(store)
    }

    /// Replace the whole store.
    ///
    /// `null`, `{}`, `[]` and `""` empty it. Any other non-object is
    /// rejected. Scalar messages are wrapped into one-element sequences.
    pub fn set(&mut self, value: Value) -> Result<(), CoreError> {
        let fields = match value {
            Value::Object(fields) => fields,
            Value::Null => serde_json::Map::new(),
            Value::Array(items) if items.is_empty() => serde_json::Map::new(),
            Value::String(s) if s.is_empty() => serde_json::Map::new(),
            other => {
                return Err(CoreError::InvalidErrors {
                    found: kind_of(&other).into(),
                });
            }
        };

        self.errors = fields
            .into_iter()
            .map(|(field, messages)| (field, cast_messages(messages)))
            .collect();
        Ok(())
    }

    pub fn all(&self) -> &IndexMap<String, Vec<String>> {
        &self.errors
    }

    /// Every message paired with its field, in field then message order.
    pub fn flat(&self) -> Vec<FieldError> {
        self.errors
            .iter()
            .flat_map(|(field, messages)| {
                messages.iter().map(move |message| FieldError {
                    field: field.clone(),
                    message: message.clone(),
                })
            })
            .collect()
    }

    /// At least one message exists anywhere.
    pub fn any(&self) -> bool {
        self.errors.values().any(|messages| !messages.is_empty())
    }

    pub fn has(&self, field: &str) -> bool {
        self.errors.get(field).is_some_and(|m| !m.is_empty())
    }

    /// Messages for `field`; empty when it has none.
    pub fn get(&self, field: &str) -> &[String] {
        self.errors.get(field).map_or(&[], Vec::as_slice)
    }

    pub fn first(&self, field: &str) -> Option<&str> {
        self.get(field).first().map(String::as_str)
    }

    /// Clear one field (keeping it as an empty sequence) or everything.
    pub fn clear(&mut self, field: Option<&str>) {
        match field {
            Some(field) => {
                self.errors.insert(field.to_owned(), Vec::new());
            }
            None => self.errors.clear(),
        }
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    pub fn to_value(&self) -> Value {
        Value::Object(
            self.errors
                .iter()
                .map(|(field, messages)| {
                    let messages = messages.iter().cloned().map(Value::String).collect();
                    (field.clone(), Value::Array(messages))
                })
                .collect(),
        )
    }
}

fn cast_messages(value: Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().map(display_value).collect(),
        other => vec![display_value(&other)],
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn set_wraps_scalar_messages() {
        let store = ErrorStore::from_value(json!({
            "email": "is taken",
            "name": ["is required", "is too short"]
        }))
        .unwrap();

        assert_eq!(store.get("email"), ["is taken"]);
        assert_eq!(store.get("name").len(), 2);
        assert_eq!(store.first("name"), Some("is required"));
    }

    #[test]
    fn empty_values_clear_the_store() {
        let mut store = ErrorStore::from_value(json!({ "a": "x" })).unwrap();
        store.set(Value::Null).unwrap();
        assert!(!store.any());
        assert!(store.all().is_empty());

        store.set(json!([])).unwrap();
        assert!(store.all().is_empty());
    }

    #[test]
    fn non_objects_are_rejected() {
        let mut store = ErrorStore::new();
        let err = store.set(json!(["a"])).unwrap_err();
        assert!(matches!(err, CoreError::InvalidErrors { .. }));

        assert!(store.set(json!(3)).is_err());
    }

    #[test]
    fn flat_preserves_field_and_message_order() {
        let store = ErrorStore::from_value(json!({ "b": ["1", "2"], "a": "3" })).unwrap();
        let flat: Vec<(String, String)> = store
            .flat()
            .into_iter()
            .map(|e| (e.field, e.message))
            .collect();

        assert_eq!(
            flat,
            vec![
                ("b".into(), "1".into()),
                ("b".into(), "2".into()),
                ("a".into(), "3".into()),
            ]
        );
    }

    #[test]
    fn clear_one_field_keeps_an_empty_sequence() {
        let mut store = ErrorStore::from_value(json!({ "a": "x", "b": "y" })).unwrap();
        store.clear(Some("a"));

        assert!(!store.has("a"));
        assert!(store.all().contains_key("a"));
        assert!(store.any());

        store.clear(None);
        assert!(store.all().is_empty());
    }

    #[test]
    fn unknown_fields_read_as_empty() {
        let store = ErrorStore::new();
        assert!(store.get("nope").is_empty());
        assert_eq!(store.first("nope"), None);
        assert!(!store.has("nope"));
    }

    #[test]
    fn push_appends_or_creates() {
        let mut store = ErrorStore::new();
        store.push("email", "is invalid");
        store.push("email", "is taken");
        assert_eq!(store.get("email"), ["is invalid", "is taken"]);
        assert_eq!(store.to_value(), json!({ "email": ["is invalid", "is taken"] }));
    }
}
