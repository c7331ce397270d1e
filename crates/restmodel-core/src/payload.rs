// ── Payload builder ──
//
// Computes the outgoing payload from an action's `data` rules and the
// model record. Rules always apply in the order only → without → with,
// whatever order they were declared in.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::action::ActionDefinition;
use crate::cascade::{Layered, Setting};
use crate::record::Record;

/// Final payload transform: `(payload, definition) -> payload`.
pub type CustomFn = Arc<dyn Fn(Record, &ActionDefinition) -> Record + Send + Sync>;

/// Lazily computed model field, evaluated when a payload is projected.
pub type ComputedField = Arc<dyn Fn(&Record) -> Value + Send + Sync>;

/// Declarative shorthand for what an action sends.
#[derive(Clone, Debug)]
pub enum DataSpec {
    /// Send nothing (`false`).
    Nothing,
    /// Send only these keys (a bare sequence).
    Keys(Vec<String>),
    /// Full rule set.
    Rules(DataRules),
}

impl DataSpec {
    /// Canonical rule form: `Nothing → {only: []}`, `Keys(k) → {only: k}`.
    pub fn normalize(self) -> DataRules {
        match self {
            Self::Nothing => DataRules {
                only: Some(Setting::Literal(Vec::new())),
                ..DataRules::default()
            },
            Self::Keys(keys) => DataRules {
                only: Some(Setting::Literal(keys)),
                ..DataRules::default()
            },
            Self::Rules(rules) => rules,
        }
    }
}

impl From<DataRules> for DataSpec {
    fn from(rules: DataRules) -> Self {
        Self::Rules(rules)
    }
}

impl Layered for DataSpec {
    fn layer(self, lower: Self) -> Self {
        Self::Rules(self.normalize().layer(lower.normalize()))
    }
}

/// Canonical `data` configuration.
#[derive(Clone, Default)]
pub struct DataRules {
    /// Replaces the candidate key set.
    pub only: Option<Setting<Vec<String>>>,
    /// Adds keys back after `only`/`without`.
    pub with: Option<Setting<Vec<String>>>,
    /// Subtracts keys.
    pub without: Option<Setting<Vec<String>>>,
    pub custom: Option<CustomFn>,
}

impl DataRules {
    pub fn only(mut self, keys: impl Into<Setting<Vec<String>>>) -> Self {
        self.only = Some(keys.into());
        self
    }

    pub fn with(mut self, keys: impl Into<Setting<Vec<String>>>) -> Self {
        self.with = Some(keys.into());
        self
    }

    pub fn without(mut self, keys: impl Into<Setting<Vec<String>>>) -> Self {
        self.without = Some(keys.into());
        self
    }

    pub fn custom<F>(mut self, f: F) -> Self
    where
        F: Fn(Record, &ActionDefinition) -> Record + Send + Sync + 'static,
    {
        self.custom = Some(Arc::new(f));
        self
    }
}

impl Layered for DataRules {
    fn layer(self, lower: Self) -> Self {
        Self {
            only: self.only.layer(lower.only),
            with: self.with.layer(lower.with),
            without: self.without.layer(lower.without),
            custom: self.custom.or(lower.custom),
        }
    }
}

impl fmt::Debug for DataRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataRules")
            .field("only", &self.only)
            .field("with", &self.with)
            .field("without", &self.without)
            .field("custom", &self.custom.as_ref().map(|_| ".."))
            .finish()
    }
}

/// Build the payload for one invocation.
///
/// `attributes` is the starting key set; `computed` holds lazily
/// evaluated fields that take precedence over stored values.
pub fn build(
    definition: &ActionDefinition,
    attributes: &[String],
    record: &Record,
    computed: &IndexMap<String, ComputedField>,
) -> Record {
    let rules = &definition.data;
    let mut keys = attributes.to_vec();

    if let Some(only) = &rules.only {
        keys = only.evaluate(record, definition);
    }

    if let Some(without) = &rules.without {
        let without = without.evaluate(record, definition);
        keys.retain(|key| !without.contains(key));
    }

    if let Some(with) = &rules.with {
        for key in with.evaluate(record, definition) {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
    }

    let payload: Record = keys
        .into_iter()
        .filter_map(|key| {
            let value = match computed.get(&key) {
                Some(field) => field(record),
                None => record.get(&key)?.clone(),
            };
            Some((key, value))
        })
        .collect();

    match &rules.custom {
        Some(custom) => custom(payload, definition),
        None => payload,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn keys(list: &[&str]) -> Vec<String> {
        list.iter().map(|k| (*k).to_owned()).collect()
    }

    fn definition(spec: DataSpec) -> ActionDefinition {
        let mut def = ActionDefinition::named("update");
        def.data = spec.normalize();
        def
    }

    fn user() -> Record {
        record!({ "id": 1, "name": "Ada", "email": "ada@example.com", "role": "admin" })
    }

    fn attributes() -> Vec<String> {
        keys(&["id", "name", "email", "role"])
    }

    #[test]
    fn no_rules_sends_every_attribute() {
        let def = definition(DataSpec::Rules(DataRules::default()));
        let payload = build(&def, &attributes(), &user(), &IndexMap::new());
        assert_eq!(Value::Object(payload), Value::Object(user()));
    }

    #[test]
    fn nothing_sends_an_empty_payload() {
        let def = definition(DataSpec::Nothing);
        let payload = build(&def, &attributes(), &user(), &IndexMap::new());
        assert!(payload.is_empty());
    }

    #[test]
    fn bare_keys_behave_like_only() {
        let def = definition(DataSpec::Keys(keys(&["name"])));
        let payload = build(&def, &attributes(), &user(), &IndexMap::new());
        assert_eq!(Value::Object(payload), json!({ "name": "Ada" }));
    }

    #[test]
    fn rules_apply_only_then_without_then_with() {
        // Declared in reverse order on purpose.
        let rules = DataRules::default()
            .with(keys(&["role"]))
            .without(keys(&["email", "role"]))
            .only(keys(&["id", "email", "name"]));
        let def = definition(rules.into());

        let payload = build(&def, &attributes(), &user(), &IndexMap::new());

        assert_eq!(
            Value::Object(payload),
            json!({ "id": 1, "name": "Ada", "role": "admin" })
        );
    }

    #[test]
    fn everything_except_x_plus_y() {
        let rules = DataRules::default()
            .without(keys(&["email"]))
            .with(keys(&["display_name"]));
        let def = definition(rules.into());

        let mut computed: IndexMap<String, ComputedField> = IndexMap::new();
        computed.insert(
            "display_name".into(),
            Arc::new(|record: &Record| json!(format!("{} <{}>", record["name"].as_str().unwrap_or(""), record["role"].as_str().unwrap_or("")))),
        );

        let payload = build(&def, &attributes(), &user(), &computed);

        assert_eq!(
            Value::Object(payload),
            json!({ "id": 1, "name": "Ada", "role": "admin", "display_name": "Ada <admin>" })
        );
    }

    #[test]
    fn computed_rules_see_the_record_and_definition() {
        let rules = DataRules::default().only(Setting::computed(|record, def| {
            if def.name == "update" && record["role"] == "admin" {
                vec!["role".to_owned()]
            } else {
                Vec::new()
            }
        }));
        let def = definition(rules.into());

        let payload = build(&def, &attributes(), &user(), &IndexMap::new());
        assert_eq!(Value::Object(payload), json!({ "role": "admin" }));
    }

    #[test]
    fn custom_transform_runs_last() {
        let rules = DataRules::default()
            .only(keys(&["name"]))
            .custom(|mut payload, def| {
                payload.insert("action".into(), json!(def.name));
                payload
            });
        let def = definition(rules.into());

        let payload = build(&def, &attributes(), &user(), &IndexMap::new());
        assert_eq!(
            Value::Object(payload),
            json!({ "name": "Ada", "action": "update" })
        );
    }

    #[test]
    fn missing_keys_are_skipped() {
        let def = definition(DataSpec::Keys(keys(&["name", "nickname"])));
        let payload = build(&def, &attributes(), &user(), &IndexMap::new());
        assert_eq!(Value::Object(payload), json!({ "name": "Ada" }));
    }

    #[test]
    fn layering_normalizes_both_sides() {
        let high = DataSpec::Nothing;
        let low = DataSpec::Rules(DataRules::default().without(keys(&["email"])));

        let merged = high.layer(low).normalize();
        assert!(merged.only.is_some());
        assert!(merged.without.is_some());
    }
}
