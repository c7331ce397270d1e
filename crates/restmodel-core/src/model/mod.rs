// ── Model ──
//
// A record plus the machinery to act on it: resolved settings, the staged
// data pipeline, request flags, the validation error store and the meta
// record that mirrors all of that state for observers.

mod lifecycle;
mod stream;

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;
use serde_json::Value;
use tokio::sync::watch;
use tracing::debug;

pub use lifecycle::{ActionHandle, ActionOutcome};
pub use stream::{RecordStream, RecordWatchStream};

use crate::action::ActionDefinition;
use crate::error::CoreError;
use crate::errors::ErrorStore;
use crate::payload::{self, ComputedField};
use crate::pipeline::{DataPipeline, Step};
use crate::record::Record;
use crate::runtime::Runtime;
use crate::settings::Settings;

/// Meta key of the aggregate in-progress flag.
pub const IN_PROGRESS: &str = "in_progress";

/// Meta key of the editing flag.
pub const EDITING: &str = "editing";

/// Meta key of the per-action in-progress flag.
pub fn progress_key(action: &str) -> String {
    format!("{action}_in_progress")
}

#[derive(Default)]
struct ModelState {
    meta: Record,
    in_flight: HashSet<String>,
    errors: ErrorStore,
    pipeline: DataPipeline,
    editing: bool,
    cache: Option<Record>,
    computed: IndexMap<String, ComputedField>,
}

struct ModelInner {
    model_type: Option<String>,
    settings: Settings,
    record: watch::Sender<Record>,
    state: Mutex<ModelState>,
    runtime: Runtime,
}

/// A live model instance. Cloning yields another handle to the same model.
#[derive(Clone)]
pub struct Model {
    inner: Arc<ModelInner>,
}

impl Model {
    /// Wrap `data` with resolved `settings`.
    ///
    /// A top-level key named like the reserved namespace is dropped from
    /// `data`; engine state lives in [`Model::meta`] instead.
    pub fn new(data: Record, settings: Settings, runtime: Runtime) -> Self {
        Self::build(None, data, settings, runtime)
    }

    pub(crate) fn build(
        model_type: Option<String>,
        mut data: Record,
        settings: Settings,
        runtime: Runtime,
    ) -> Self {
        data.shift_remove(&settings.api_key);

        let mut state = ModelState::default();
        let reactivity = &runtime.reactivity;
        reactivity.set_property(&mut state.meta, IN_PROGRESS, Value::Bool(false));
        for name in settings.action_names() {
            reactivity.set_property(&mut state.meta, &progress_key(name), Value::Bool(false));
        }
        reactivity.set_property(&mut state.meta, EDITING, Value::Bool(false));
        reactivity.set_nested_property(
            &mut state.meta,
            &settings.http.error_key,
            state.errors.to_value(),
        );

        let (record, _) = watch::channel(data);

        Self {
            inner: Arc::new(ModelInner {
                model_type,
                settings,
                record,
                state: Mutex::new(state),
                runtime,
            }),
        }
    }

    /// Registered type this model was created from, if any.
    pub fn model_type(&self) -> Option<&str> {
        self.inner.model_type.as_deref()
    }

    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    // ── Record access ────────────────────────────────────────────────

    /// Snapshot of the record.
    pub fn record(&self) -> Record {
        self.inner.record.borrow().clone()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.record.borrow().get(key).cloned()
    }

    /// Subscribe to record changes.
    pub fn subscribe(&self) -> RecordStream {
        RecordStream::new(self.inner.record.subscribe())
    }

    /// The record without the reserved namespace or excluded keys.
    pub fn copy(&self) -> Record {
        let settings = &self.inner.settings;
        self.inner
            .record
            .borrow()
            .iter()
            .filter(|(key, _)| !settings.is_excluded(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Apply a response body: extract the model data with
    /// `http.get_data_from_response`, then [`Model::assign`] it.
    /// Non-record data is ignored.
    pub fn apply(&self, body: &Value) {
        match (self.inner.settings.http.get_data_from_response)(body) {
            Value::Object(data) => self.assign(&data),
            other => debug!(kind = ?other, "response data is not a record; nothing applied"),
        }
    }

    /// Write every changed key of `data` into the record, skipping the
    /// reserved namespace and excluded keys. Each key is replaced whole.
    pub fn assign(&self, data: &Record) {
        let settings = &self.inner.settings;
        let reactivity = &self.inner.runtime.reactivity;

        self.inner.record.send_if_modified(|record| {
            let mut modified = false;
            for (key, value) in data {
                if settings.is_excluded(key) || record.get(key) == Some(value) {
                    continue;
                }
                reactivity.set_property(record, key, value.clone());
                modified = true;
            }
            modified
        });
    }

    // ── Editing ──────────────────────────────────────────────────────

    /// Start editing: remember the current record for [`Model::cancel`].
    pub fn edit(&self) {
        let cache = self.copy();
        let mut state = self.state();
        state.cache = Some(cache);
        self.set_editing_locked(&mut state, true);
    }

    /// Restore the record remembered by [`Model::edit`].
    pub fn cancel(&self) {
        let cache = {
            let mut state = self.state();
            self.set_editing_locked(&mut state, false);
            state.cache.take()
        };
        if let Some(cache) = cache {
            self.assign(&cache);
        }
    }

    pub fn is_editing(&self) -> bool {
        self.state().editing
    }

    // ── Payload ──────────────────────────────────────────────────────

    /// Queue pipeline steps for the next action.
    pub fn stage<F>(&self, f: F)
    where
        F: FnOnce(&mut DataPipeline),
    {
        let mut pipeline = self.state().pipeline.clone();
        f(&mut pipeline);
        self.state().pipeline = pipeline;
    }

    /// Steps currently staged for the next action.
    pub fn staged(&self) -> Vec<Step> {
        self.state().pipeline.get()
    }

    /// Register a lazily computed field, usable as a payload key.
    pub fn computed<F>(&self, key: impl Into<String>, f: F)
    where
        F: Fn(&Record) -> Value + Send + Sync + 'static,
    {
        self.state().computed.insert(key.into(), Arc::new(f));
    }

    /// The payload `name` would send now. Staged steps are left in place.
    pub fn data_for_action(&self, name: &str) -> Result<Record, CoreError> {
        let record = self.record();
        let definition = self.inner.settings.resolve_action(name, None, &record)?;
        Ok(self.payload_for(&definition, &record, false))
    }

    /// Build the payload for `definition`: the payload builder output run
    /// through the action's pipeline function followed by the staged
    /// steps. The action's own steps never reach the staged list; the
    /// staged steps are taken out of the model when `consume` is set.
    fn payload_for(&self, definition: &ActionDefinition, record: &Record, consume: bool) -> Record {
        let settings = &self.inner.settings;
        let attributes: Vec<String> = settings.attributes.as_ref().map_or_else(
            || record.keys().cloned().collect(),
            Vec::clone,
        );
        let attributes: Vec<String> = attributes
            .into_iter()
            .filter(|key| !settings.is_excluded(key))
            .collect();

        let computed = self.state().computed.clone();
        let built = payload::build(definition, &attributes, record, &computed);

        // User steps may call back into the model, so they run unlocked.
        let staged = {
            let mut state = self.state();
            if consume {
                std::mem::take(&mut state.pipeline).get()
            } else {
                state.pipeline.get()
            }
        };
        let mut pipeline = DataPipeline::new();
        if let Some(configure) = &definition.pipeline {
            configure(&mut pipeline);
        }
        for step in staged {
            pipeline.append_step(step.kind, step.args);
        }

        pipeline.process(built)
    }

    // ── Meta state ───────────────────────────────────────────────────

    /// Snapshot of the reserved namespace: progress flags, `editing` and
    /// the error store at `http.error_key`.
    pub fn meta(&self) -> Record {
        self.state().meta.clone()
    }

    pub fn in_progress(&self, action: &str) -> bool {
        self.state().in_flight.contains(action)
    }

    pub fn any_in_progress(&self) -> bool {
        !self.state().in_flight.is_empty()
    }

    // ── Errors ───────────────────────────────────────────────────────

    pub fn errors(&self) -> ErrorStore {
        self.state().errors.clone()
    }

    /// Replace the error store. See [`ErrorStore::set`].
    pub fn set_errors(&self, errors: Value) -> Result<(), CoreError> {
        let store = ErrorStore::from_value(errors)?;
        self.replace_errors(store);
        Ok(())
    }

    pub fn clear_errors(&self, field: Option<&str>) {
        let mut state = self.state();
        state.errors.clear(field);
        self.mirror_errors_locked(&mut state);
    }

    /// Append `message` to the live error store under `field`.
    pub fn push_error(&self, field: impl Into<String>, message: impl Into<String>) {
        let mut state = self.state();
        state.errors.push(field, message);
        self.mirror_errors_locked(&mut state);
    }

    pub(crate) fn replace_errors(&self, store: ErrorStore) {
        let mut state = self.state();
        state.errors = store;
        self.mirror_errors_locked(&mut state);
    }

    // ── Internals ────────────────────────────────────────────────────

    fn state(&self) -> MutexGuard<'_, ModelState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn mirror_errors_locked(&self, state: &mut ModelState) {
        let value = state.errors.to_value();
        self.inner.runtime.reactivity.set_nested_property(
            &mut state.meta,
            &self.inner.settings.http.error_key,
            value,
        );
    }

    fn set_editing_locked(&self, state: &mut ModelState, editing: bool) {
        state.editing = editing;
        self.inner
            .runtime
            .reactivity
            .set_property(&mut state.meta, EDITING, Value::Bool(editing));
    }

    /// Mark `action` in flight or settled, keeping the meta flags in step.
    fn set_in_flight_locked(&self, state: &mut ModelState, action: &str, in_flight: bool) {
        if in_flight {
            state.in_flight.insert(action.to_owned());
        } else {
            state.in_flight.remove(action);
        }
        let any = !state.in_flight.is_empty();
        let reactivity = &self.inner.runtime.reactivity;
        reactivity.set_property(&mut state.meta, &progress_key(action), Value::Bool(in_flight));
        reactivity.set_property(&mut state.meta, IN_PROGRESS, Value::Bool(any));
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("model_type", &self.inner.model_type)
            .field("record", &*self.inner.record.borrow())
            .finish_non_exhaustive()
    }
}
