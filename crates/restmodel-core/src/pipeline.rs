//! Data pipeline: an ordered list of payload transformation steps.
//!
//! Steps are queued by name with stored arguments and folded left to
//! right over the outgoing payload by [`DataPipeline::process`]. Unknown
//! step names are kept in the list but pass the payload through
//! untouched, so a typo'd step never fails the whole pipeline.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::record::{Record, as_keys, defaults_deep, into_record};

/// Callback step body: receives the running payload and the step's
/// remaining arguments. The return value is coerced to a record.
pub type StepFn = Arc<dyn Fn(Record, &[Value]) -> Value + Send + Sync>;

/// The closed set of step kinds. Anything unrecognized is `Unknown`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepKind {
    None,
    Only,
    With,
    Without,
    Callback,
    Unknown(String),
}

impl StepKind {
    pub fn name(&self) -> &str {
        match self {
            Self::None => "none",
            Self::Only => "only",
            Self::With => "with",
            Self::Without => "without",
            Self::Callback => "callback",
            Self::Unknown(name) => name,
        }
    }
}

impl From<&str> for StepKind {
    fn from(name: &str) -> Self {
        match name {
            "none" => Self::None,
            "only" => Self::Only,
            "with" => Self::With,
            "without" => Self::Without,
            "callback" => Self::Callback,
            other => Self::Unknown(other.to_owned()),
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A stored step argument.
#[derive(Clone)]
pub enum StepArg {
    Value(Value),
    Callback(StepFn),
}

impl StepArg {
    fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            Self::Callback(_) => None,
        }
    }
}

impl From<Value> for StepArg {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl fmt::Debug for StepArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

/// One queued transformation.
#[derive(Debug, Clone)]
pub struct Step {
    pub kind: StepKind,
    pub args: Vec<StepArg>,
}

impl Step {
    pub fn new(kind: impl Into<StepKind>, args: Vec<StepArg>) -> Self {
        Self {
            kind: kind.into(),
            args,
        }
    }

    fn first_value(&self) -> Option<&Value> {
        self.args.first().and_then(StepArg::as_value)
    }

    /// Run this step over the payload.
    pub fn apply(&self, payload: Record) -> Record {
        match &self.kind {
            StepKind::None => Record::new(),
            StepKind::Only => match self.first_value() {
                Some(arg) => match as_keys(arg) {
                    Some(keys) => pick(&payload, &keys),
                    None => into_record(arg.clone()),
                },
                None => Record::new(),
            },
            StepKind::With => match self.first_value() {
                Some(Value::Object(partial)) => {
                    let mut payload = payload;
                    defaults_deep(&mut payload, partial);
                    payload
                }
                _ => payload,
            },
            StepKind::Without => match self.first_value().and_then(as_keys) {
                Some(keys) => omit(payload, &keys),
                None => payload,
            },
            StepKind::Callback => match self.args.split_first() {
                Some((StepArg::Callback(f), rest)) => {
                    let rest: Vec<Value> = rest
                        .iter()
                        .map(|arg| arg.as_value().cloned().unwrap_or(Value::Null))
                        .collect();
                    into_record(f(payload, &rest))
                }
                _ => payload,
            },
            StepKind::Unknown(_) => payload,
        }
    }
}

fn pick(payload: &Record, keys: &[String]) -> Record {
    keys.iter()
        .filter_map(|key| payload.get(key).map(|v| (key.clone(), v.clone())))
        .collect()
}

fn omit(mut payload: Record, keys: &[String]) -> Record {
    for key in keys {
        payload.shift_remove(key);
    }
    payload
}

// ── DataPipeline ─────────────────────────────────────────────────────

/// Ordered, mutable list of steps.
///
/// Builder methods append and return `&mut Self` so steps can be chained:
///
/// ```
/// use restmodel_core::DataPipeline;
/// use serde_json::json;
///
/// let mut pipeline = DataPipeline::new();
/// pipeline.only(json!(["a", "b"])).without(json!("b"));
///
/// let payload = pipeline.process(restmodel_core::record!({ "a": 1, "b": 2, "c": 3 }));
/// assert_eq!(serde_json::Value::Object(payload), json!({ "a": 1 }));
/// ```
#[derive(Debug, Clone, Default)]
pub struct DataPipeline {
    steps: Vec<Step>,
}

impl DataPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_step(&mut self, kind: impl Into<StepKind>, args: Vec<StepArg>) -> &mut Self {
        self.steps.push(Step::new(kind, args));
        self
    }

    pub fn prepend_step(&mut self, kind: impl Into<StepKind>, args: Vec<StepArg>) -> &mut Self {
        self.steps.insert(0, Step::new(kind, args));
        self
    }

    /// Fold every step over `initial`, left to right.
    pub fn process(&self, initial: Record) -> Record {
        self.steps
            .iter()
            .fold(initial, |payload, step| step.apply(payload))
    }

    pub fn clear(&mut self) -> &mut Self {
        self.steps.clear();
        self
    }

    /// Snapshot of the current steps.
    pub fn get(&self) -> Vec<Step> {
        self.steps.clone()
    }

    /// Replace the steps wholesale (restore a snapshot).
    pub fn set(&mut self, steps: Vec<Step>) -> &mut Self {
        self.steps = steps;
        self
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    // ── Built-in steps ───────────────────────────────────────────────

    /// Send nothing.
    pub fn none(&mut self) -> &mut Self {
        self.append_step(StepKind::None, Vec::new())
    }

    /// Keep only the given key(s), or replace the payload with a record.
    pub fn only(&mut self, keys_or_record: impl Into<Value>) -> &mut Self {
        self.append_step(StepKind::Only, vec![StepArg::Value(keys_or_record.into())])
    }

    /// Fill gaps in the payload from `partial`; existing values win.
    pub fn with(&mut self, partial: impl Into<Value>) -> &mut Self {
        self.append_step(StepKind::With, vec![StepArg::Value(partial.into())])
    }

    /// Remove the given key(s).
    pub fn without(&mut self, keys: impl Into<Value>) -> &mut Self {
        self.append_step(StepKind::Without, vec![StepArg::Value(keys.into())])
    }

    /// Replace the payload with `f(payload, rest)`.
    pub fn callback<F>(&mut self, f: F, rest: Vec<Value>) -> &mut Self
    where
        F: Fn(Record, &[Value]) -> Value + Send + Sync + 'static,
    {
        let mut args = vec![StepArg::Callback(Arc::new(f))];
        args.extend(rest.into_iter().map(StepArg::Value));
        self.append_step(StepKind::Callback, args)
    }
}
