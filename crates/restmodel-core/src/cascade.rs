// ── Configuration cascade ──
//
// Precedence-ordered deep merge of configuration layers. Sources are
// always given highest precedence first; `None` never overrides a value
// from a lower layer.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use restmodel_api::Method;

use crate::action::ActionDefinition;
use crate::record::{Record, defaults_deep};

/// Merge a layer over a lower-precedence one.
pub trait Layered: Sized {
    /// Combine `self` (higher precedence) with `lower`.
    fn layer(self, lower: Self) -> Self;
}

/// Merge `sources`, highest precedence first, into one effective layer.
///
/// Returns `None` only when `sources` is empty.
pub fn resolve<L: Layered>(sources: impl IntoIterator<Item = L>) -> Option<L> {
    sources.into_iter().reduce(L::layer)
}

impl<T: Layered> Layered for Option<T> {
    fn layer(self, lower: Self) -> Self {
        match (self, lower) {
            (Some(high), Some(low)) => Some(high.layer(low)),
            (high, low) => high.or(low),
        }
    }
}

impl Layered for Record {
    fn layer(mut self, lower: Self) -> Self {
        defaults_deep(&mut self, &lower);
        self
    }
}

impl<V: Layered> Layered for IndexMap<String, V> {
    /// Union of both maps; shared keys merge. Lower-layer ordering is
    /// kept, new keys are appended.
    fn layer(self, mut lower: Self) -> Self {
        for (key, high) in self {
            match lower.shift_remove_full(&key) {
                Some((idx, _, low)) => {
                    lower.shift_insert(idx, key, high.layer(low));
                }
                None => {
                    lower.insert(key, high);
                }
            }
        }
        lower
    }
}

/// Scalars and sequences: the higher layer replaces the lower wholesale.
macro_rules! layered_by_replacement {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Layered for $ty {
                fn layer(self, _lower: Self) -> Self {
                    self
                }
            }
        )*
    };
}

layered_by_replacement!(bool, String, Method, Duration, Vec<String>, Setting<Vec<String>>);

// ── Setting ──────────────────────────────────────────────────────────

/// Function computing a configuration value from the model record and
/// the action being resolved.
pub type ComputeFn<T> = Arc<dyn Fn(&Record, &ActionDefinition) -> T + Send + Sync>;

/// A configuration value that is either given literally or computed from
/// context when the action is resolved.
pub enum Setting<T> {
    Literal(T),
    Computed(ComputeFn<T>),
}

impl<T: Clone> Setting<T> {
    pub fn computed<F>(f: F) -> Self
    where
        F: Fn(&Record, &ActionDefinition) -> T + Send + Sync + 'static,
    {
        Self::Computed(Arc::new(f))
    }

    /// Produce the effective value for one action invocation.
    pub fn evaluate(&self, record: &Record, action: &ActionDefinition) -> T {
        match self {
            Self::Literal(value) => value.clone(),
            Self::Computed(f) => f(record, action),
        }
    }
}

impl<T> From<T> for Setting<T> {
    fn from(value: T) -> Self {
        Self::Literal(value)
    }
}

impl<T: Clone> Clone for Setting<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Literal(value) => Self::Literal(value.clone()),
            Self::Computed(f) => Self::Computed(Arc::clone(f)),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Setting<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

impl Layered for Setting<Record> {
    /// Literal records merge immediately. If either side is computed the
    /// result defers: both sides are evaluated against the invocation
    /// context first, then merged.
    fn layer(self, lower: Self) -> Self {
        match (self, lower) {
            (Self::Literal(high), Self::Literal(low)) => Self::Literal(high.layer(low)),
            (high, low) => Self::computed(move |record, action| {
                high.evaluate(record, action)
                    .layer(low.evaluate(record, action))
            }),
        }
    }
}
