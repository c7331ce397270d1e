// ── Action configuration ──
//
// `ActionConfig` is one layer of an action's configuration; every field
// is optional so layers can be stacked by the cascade. Resolving the
// stack against a model record yields an immutable `ActionDefinition`.

use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;

use restmodel_api::Method;

use crate::cascade::{Layered, Setting};
use crate::events::Received;
use crate::model::Model;
use crate::payload::{DataRules, DataSpec};
use crate::pipeline::DataPipeline;
use crate::record::{Record, pick_truthy};

/// Runs before dispatch. `ControlFlow::Break` cancels the invocation.
pub type BeforeHook = Arc<dyn Fn(&Model) -> ControlFlow<()> + Send + Sync>;

/// Runs after settlement with whatever was received, success or failure.
pub type AfterHook = Arc<dyn Fn(&Model, &Received) + Send + Sync>;

/// Queues the action's own pipeline steps ahead of caller-staged ones.
pub type PipelineFn = Arc<dyn Fn(&mut DataPipeline) + Send + Sync>;

/// One configuration layer for an action.
#[derive(Clone, Default)]
pub struct ActionConfig {
    pub method: Option<Method>,
    pub route: Option<String>,
    pub base_route: Option<String>,
    pub apply: Option<bool>,
    pub validation: Option<bool>,
    pub content_type: Option<String>,
    pub data: Option<DataSpec>,
    pub pipeline: Option<PipelineFn>,
    pub before: Option<BeforeHook>,
    pub after: Option<AfterHook>,
    pub headers: Option<Setting<Record>>,
    pub params: Option<Setting<Record>>,
}

impl ActionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }

    pub fn base_route(mut self, base_route: impl Into<String>) -> Self {
        self.base_route = Some(base_route.into());
        self
    }

    pub fn apply(mut self, apply: bool) -> Self {
        self.apply = Some(apply);
        self
    }

    pub fn validation(mut self, validation: bool) -> Self {
        self.validation = Some(validation);
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn data(mut self, data: impl Into<DataSpec>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn pipeline<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut DataPipeline) + Send + Sync + 'static,
    {
        self.pipeline = Some(Arc::new(f));
        self
    }

    /// Share an existing pipeline function between actions.
    pub fn pipeline_fn(mut self, f: PipelineFn) -> Self {
        self.pipeline = Some(f);
        self
    }

    pub fn before<F>(mut self, f: F) -> Self
    where
        F: Fn(&Model) -> ControlFlow<()> + Send + Sync + 'static,
    {
        self.before = Some(Arc::new(f));
        self
    }

    pub fn after<F>(mut self, f: F) -> Self
    where
        F: Fn(&Model, &Received) + Send + Sync + 'static,
    {
        self.after = Some(Arc::new(f));
        self
    }

    pub fn headers(mut self, headers: impl Into<Setting<Record>>) -> Self {
        self.headers = Some(headers.into());
        self
    }

    pub fn params(mut self, params: impl Into<Setting<Record>>) -> Self {
        self.params = Some(params.into());
        self
    }

    /// Resolve a merged layer into a definition.
    ///
    /// Model-wide `headers`/`params` sit below the action's own. Computed
    /// values see `record` and the definition resolved so far (without
    /// headers and params); falsy header/param values are dropped.
    pub(crate) fn into_definition(
        self,
        name: &str,
        record: &Record,
        model_headers: Option<&Setting<Record>>,
        model_params: Option<&Setting<Record>>,
    ) -> ActionDefinition {
        let mut definition = ActionDefinition {
            name: name.to_owned(),
            method: self.method.unwrap_or_default(),
            route: self.route.unwrap_or_default(),
            base_route: self.base_route,
            apply: self.apply.unwrap_or(false),
            validation: self.validation.unwrap_or(true),
            content_type: self.content_type,
            data: self.data.map(DataSpec::normalize).unwrap_or_default(),
            pipeline: self.pipeline,
            before: self.before,
            after: self.after,
            headers: Record::new(),
            params: Record::new(),
        };

        let headers = self.headers.layer(model_headers.cloned());
        let params = self.params.layer(model_params.cloned());

        definition.headers = headers
            .map(|h| pick_truthy(h.evaluate(record, &definition)))
            .unwrap_or_default();
        definition.params = params
            .map(|p| pick_truthy(p.evaluate(record, &definition)))
            .unwrap_or_default();

        definition
    }
}

impl Layered for ActionConfig {
    fn layer(self, lower: Self) -> Self {
        Self {
            method: self.method.layer(lower.method),
            route: self.route.layer(lower.route),
            base_route: self.base_route.layer(lower.base_route),
            apply: self.apply.layer(lower.apply),
            validation: self.validation.layer(lower.validation),
            content_type: self.content_type.layer(lower.content_type),
            data: self.data.layer(lower.data),
            pipeline: self.pipeline.or(lower.pipeline),
            before: self.before.or(lower.before),
            after: self.after.or(lower.after),
            headers: self.headers.layer(lower.headers),
            params: self.params.layer(lower.params),
        }
    }
}

impl fmt::Debug for ActionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionConfig")
            .field("method", &self.method)
            .field("route", &self.route)
            .field("base_route", &self.base_route)
            .field("apply", &self.apply)
            .field("validation", &self.validation)
            .field("content_type", &self.content_type)
            .field("data", &self.data)
            .field("pipeline", &self.pipeline.is_some())
            .field("before", &self.before.is_some())
            .field("after", &self.after.is_some())
            .field("headers", &self.headers)
            .field("params", &self.params)
            .finish()
    }
}

/// An action registered on a model, or the `false` sentinel that removes it.
#[derive(Clone, Debug)]
pub enum ActionEntry {
    Enabled(ActionConfig),
    Disabled,
}

impl From<ActionConfig> for ActionEntry {
    fn from(config: ActionConfig) -> Self {
        Self::Enabled(config)
    }
}

impl Layered for ActionEntry {
    fn layer(self, lower: Self) -> Self {
        match (self, lower) {
            (Self::Disabled, _) => Self::Disabled,
            (Self::Enabled(high), Self::Enabled(low)) => Self::Enabled(high.layer(low)),
            (enabled, Self::Disabled) => enabled,
        }
    }
}

/// Fully resolved action, immutable for one invocation.
#[derive(Clone)]
pub struct ActionDefinition {
    pub name: String,
    pub method: Method,
    pub route: String,
    pub base_route: Option<String>,
    pub apply: bool,
    pub validation: bool,
    pub content_type: Option<String>,
    pub data: DataRules,
    pub pipeline: Option<PipelineFn>,
    pub before: Option<BeforeHook>,
    pub after: Option<AfterHook>,
    pub headers: Record,
    pub params: Record,
}

impl ActionDefinition {
    /// A bare definition with library defaults: `GET`, empty route,
    /// validation on, apply off.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            method: Method::Get,
            route: String::new(),
            base_route: None,
            apply: false,
            validation: true,
            content_type: None,
            data: DataRules::default(),
            pipeline: None,
            before: None,
            after: None,
            headers: Record::new(),
            params: Record::new(),
        }
    }
}

impl fmt::Debug for ActionDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDefinition")
            .field("name", &self.name)
            .field("method", &self.method)
            .field("route", &self.route)
            .field("base_route", &self.base_route)
            .field("apply", &self.apply)
            .field("validation", &self.validation)
            .field("content_type", &self.content_type)
            .field("data", &self.data)
            .field("headers", &self.headers)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascade::resolve;
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};

    #[test]
    fn override_beats_action_beats_defaults() {
        let overrides = ActionConfig::new().route("/{id}/force");
        let action = ActionConfig::new().method(Method::Put).route("/{id}").apply(true);
        let defaults = ActionConfig::new()
            .method(Method::Get)
            .apply(false)
            .validation(true)
            .content_type("application/json");

        let merged = resolve([overrides, action, defaults]).unwrap_or_default();
        let def = merged.into_definition("update", &Record::new(), None, None);

        assert_eq!(def.method, Method::Put);
        assert_eq!(def.route, "/{id}/force");
        assert!(def.apply);
        assert!(def.validation);
        assert_eq!(def.content_type.as_deref(), Some("application/json"));
    }

    #[test]
    fn headers_merge_over_model_headers_and_drop_falsy() {
        let action = ActionConfig::new().headers(record!({
            "X-Action": "update",
            "X-Trace": null
        }));
        let model_headers: Setting<Record> = record!({
            "X-Action": "model",
            "X-Model": "users",
            "X-Debug": false
        })
        .into();

        let def = action.into_definition("update", &Record::new(), Some(&model_headers), None);

        assert_eq!(
            Value::Object(def.headers),
            json!({ "X-Action": "update", "X-Model": "users" })
        );
    }

    #[test]
    fn computed_headers_see_record_and_definition() {
        let action = ActionConfig::new()
            .method(Method::Delete)
            .headers(Setting::computed(|record, def| {
                record!({ "X-Target": format!("{}:{}", def.method, record["id"]) })
            }));

        let def = action.into_definition("destroy", &record!({ "id": 3 }), None, None);
        assert_eq!(def.headers["X-Target"], json!("DELETE:3"));
    }

    #[test]
    fn disabled_entry_wins_over_lower_layers() {
        let merged = ActionEntry::Disabled.layer(ActionConfig::new().route("/x").into());
        assert!(matches!(merged, ActionEntry::Disabled));

        let revived = ActionEntry::from(ActionConfig::new().route("/y")).layer(ActionEntry::Disabled);
        assert!(matches!(revived, ActionEntry::Enabled(c) if c.route.as_deref() == Some("/y")));
    }
}
