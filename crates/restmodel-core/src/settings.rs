// ── Model settings ──
//
// `SettingsLayer` is one partial configuration source (library defaults,
// registry-wide options, a registered model type, per-instance options).
// Layers cascade into a resolved `Settings`, from which each action
// invocation resolves its own `ActionDefinition`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use restmodel_api::HttpRequest;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

use crate::action::{ActionConfig, ActionDefinition, ActionEntry};
use crate::cascade::{Layered, Setting, resolve};
use crate::defaults;
use crate::error::CoreError;
use crate::record::Record;

/// Decides whether a failed request carries field validation errors.
pub type ValidationCheck = Arc<dyn Fn(&restmodel_api::Error) -> bool + Send + Sync>;

/// Extracts the field → messages payload from a validation failure.
pub type ErrorsTransform = Arc<dyn Fn(&restmodel_api::Error) -> Value + Send + Sync>;

/// Extracts model data from a successful response body.
pub type ResponseExtractor = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// Last chance to rewrite a request before dispatch.
pub type RequestCustomizer =
    Arc<dyn Fn(HttpRequest, &ActionDefinition) -> HttpRequest + Send + Sync>;

/// What `prevent_simultaneous_actions` blocks.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum GuardScope {
    /// An action cannot be re-entered while it is in flight; other
    /// actions on the same model may run.
    #[default]
    Action,
    /// No action may start while any action on the model is in flight.
    Model,
}

impl Layered for GuardScope {
    fn layer(self, _lower: Self) -> Self {
        self
    }
}

// ── Layers ───────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct ValidationErrorsLayer {
    pub is_validation_error: Option<ValidationCheck>,
    pub transform_response: Option<ErrorsTransform>,
}

impl Layered for ValidationErrorsLayer {
    fn layer(self, lower: Self) -> Self {
        Self {
            is_validation_error: self.is_validation_error.or(lower.is_validation_error),
            transform_response: self.transform_response.or(lower.transform_response),
        }
    }
}

#[derive(Clone, Default)]
pub struct HttpLayer {
    pub take_at_least: Option<Duration>,
    pub error_key: Option<String>,
    pub get_data_from_response: Option<ResponseExtractor>,
    pub customize_request: Option<RequestCustomizer>,
}

impl Layered for HttpLayer {
    fn layer(self, lower: Self) -> Self {
        Self {
            take_at_least: self.take_at_least.layer(lower.take_at_least),
            error_key: self.error_key.layer(lower.error_key),
            get_data_from_response: self.get_data_from_response.or(lower.get_data_from_response),
            customize_request: self.customize_request.or(lower.customize_request),
        }
    }
}

/// One partial settings source. Unset fields defer to lower layers.
#[derive(Clone, Default)]
pub struct SettingsLayer {
    /// Reserved namespace name; never treated as record data.
    pub api_key: Option<String>,
    /// Keys neither sent nor applied from responses.
    pub exclude_keys: Option<Vec<String>>,
    pub base_route: Option<String>,
    pub event_prefix: Option<String>,
    pub headers: Option<Setting<Record>>,
    pub params: Option<Setting<Record>>,
    pub content_type: Option<String>,
    pub prevent_simultaneous_actions: Option<bool>,
    pub guard_scope: Option<GuardScope>,
    pub actions: IndexMap<String, ActionEntry>,
    pub action_defaults: Option<ActionConfig>,
    pub validation_errors: ValidationErrorsLayer,
    /// Starting key set for payloads. Defaults to every record key.
    pub attributes: Option<Vec<String>>,
    pub http: HttpLayer,
}

impl SettingsLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn exclude_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_keys = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    pub fn base_route(mut self, route: impl Into<String>) -> Self {
        self.base_route = Some(route.into());
        self
    }

    pub fn event_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.event_prefix = Some(prefix.into());
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

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn prevent_simultaneous_actions(mut self, prevent: bool) -> Self {
        self.prevent_simultaneous_actions = Some(prevent);
        self
    }

    pub fn guard_scope(mut self, scope: GuardScope) -> Self {
        self.guard_scope = Some(scope);
        self
    }

    /// Add or extend an action.
    pub fn action(mut self, name: impl Into<String>, config: ActionConfig) -> Self {
        self.actions.insert(name.into(), ActionEntry::Enabled(config));
        self
    }

    /// Remove an action inherited from a lower layer.
    pub fn disable_action(mut self, name: impl Into<String>) -> Self {
        self.actions.insert(name.into(), ActionEntry::Disabled);
        self
    }

    pub fn action_defaults(mut self, defaults: ActionConfig) -> Self {
        self.action_defaults = Some(defaults);
        self
    }

    pub fn attributes<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    pub fn take_at_least(mut self, floor: Duration) -> Self {
        self.http.take_at_least = Some(floor);
        self
    }

    pub fn error_key(mut self, path: impl Into<String>) -> Self {
        self.http.error_key = Some(path.into());
        self
    }

    pub fn get_data_from_response<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.http.get_data_from_response = Some(Arc::new(f));
        self
    }

    pub fn customize_request<F>(mut self, f: F) -> Self
    where
        F: Fn(HttpRequest, &ActionDefinition) -> HttpRequest + Send + Sync + 'static,
    {
        self.http.customize_request = Some(Arc::new(f));
        self
    }

    pub fn is_validation_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&restmodel_api::Error) -> bool + Send + Sync + 'static,
    {
        self.validation_errors.is_validation_error = Some(Arc::new(f));
        self
    }

    pub fn transform_validation_errors<F>(mut self, f: F) -> Self
    where
        F: Fn(&restmodel_api::Error) -> Value + Send + Sync + 'static,
    {
        self.validation_errors.transform_response = Some(Arc::new(f));
        self
    }
}

impl Layered for SettingsLayer {
    fn layer(self, lower: Self) -> Self {
        Self {
            api_key: self.api_key.layer(lower.api_key),
            exclude_keys: self.exclude_keys.layer(lower.exclude_keys),
            base_route: self.base_route.layer(lower.base_route),
            event_prefix: self.event_prefix.layer(lower.event_prefix),
            headers: self.headers.layer(lower.headers),
            params: self.params.layer(lower.params),
            content_type: self.content_type.layer(lower.content_type),
            prevent_simultaneous_actions: self
                .prevent_simultaneous_actions
                .layer(lower.prevent_simultaneous_actions),
            guard_scope: self.guard_scope.layer(lower.guard_scope),
            actions: self.actions.layer(lower.actions),
            action_defaults: self.action_defaults.layer(lower.action_defaults),
            validation_errors: self.validation_errors.layer(lower.validation_errors),
            attributes: self.attributes.layer(lower.attributes),
            http: self.http.layer(lower.http),
        }
    }
}

impl fmt::Debug for SettingsLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingsLayer")
            .field("api_key", &self.api_key)
            .field("exclude_keys", &self.exclude_keys)
            .field("base_route", &self.base_route)
            .field("event_prefix", &self.event_prefix)
            .field("content_type", &self.content_type)
            .field("prevent_simultaneous_actions", &self.prevent_simultaneous_actions)
            .field("guard_scope", &self.guard_scope)
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .field("attributes", &self.attributes)
            .finish_non_exhaustive()
    }
}

// ── Resolved settings ────────────────────────────────────────────────

#[derive(Clone)]
pub struct ValidationErrors {
    pub is_validation_error: ValidationCheck,
    pub transform_response: ErrorsTransform,
}

#[derive(Clone)]
pub struct HttpSettings {
    /// Minimum latency of a successful request.
    pub take_at_least: Duration,
    /// Meta-record path the error store is mirrored to.
    pub error_key: String,
    pub get_data_from_response: ResponseExtractor,
    pub customize_request: Option<RequestCustomizer>,
}

/// Effective configuration of one model instance.
#[derive(Clone)]
pub struct Settings {
    pub api_key: String,
    pub exclude_keys: Vec<String>,
    pub base_route: String,
    pub event_prefix: Option<String>,
    pub headers: Option<Setting<Record>>,
    pub params: Option<Setting<Record>>,
    pub content_type: Option<String>,
    pub prevent_simultaneous_actions: bool,
    pub guard_scope: GuardScope,
    /// Enabled actions only, in registration order.
    pub actions: IndexMap<String, ActionConfig>,
    pub action_defaults: ActionConfig,
    pub validation_errors: ValidationErrors,
    pub attributes: Option<Vec<String>>,
    pub http: HttpSettings,
}

impl Settings {
    /// Cascade `layers` (highest precedence first) over the library
    /// defaults. Disabled actions are dropped.
    pub fn resolve(layers: impl IntoIterator<Item = SettingsLayer>) -> Result<Self, CoreError> {
        let merged = resolve(
            layers
                .into_iter()
                .chain(std::iter::once(defaults::library())),
        )
        .unwrap_or_default();

        let actions = merged
            .actions
            .into_iter()
            .filter_map(|(name, entry)| match entry {
                ActionEntry::Enabled(config) => Some((name, config)),
                ActionEntry::Disabled => None,
            })
            .collect();

        Ok(Self {
            api_key: merged
                .api_key
                .unwrap_or_else(|| defaults::API_KEY.to_owned()),
            exclude_keys: merged.exclude_keys.unwrap_or_default(),
            base_route: merged.base_route.unwrap_or_default(),
            event_prefix: merged.event_prefix.filter(|p| !p.is_empty()),
            headers: merged.headers,
            params: merged.params,
            content_type: merged.content_type,
            prevent_simultaneous_actions: merged.prevent_simultaneous_actions.unwrap_or(true),
            guard_scope: merged.guard_scope.unwrap_or_default(),
            actions,
            action_defaults: merged.action_defaults.unwrap_or_default(),
            validation_errors: ValidationErrors {
                is_validation_error: required(
                    merged.validation_errors.is_validation_error,
                    "validation_errors.is_validation_error",
                )?,
                transform_response: required(
                    merged.validation_errors.transform_response,
                    "validation_errors.transform_response",
                )?,
            },
            attributes: merged.attributes,
            http: HttpSettings {
                take_at_least: merged.http.take_at_least.unwrap_or(defaults::TAKE_AT_LEAST),
                error_key: merged
                    .http
                    .error_key
                    .unwrap_or_else(|| defaults::ERROR_KEY.to_owned()),
                get_data_from_response: required(
                    merged.http.get_data_from_response,
                    "http.get_data_from_response",
                )?,
                customize_request: merged.http.customize_request,
            },
        })
    }

    pub fn action_names(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }

    pub fn has_action(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    /// Whether `key` belongs to the engine rather than the record.
    pub fn is_excluded(&self, key: &str) -> bool {
        key == self.api_key || self.exclude_keys.iter().any(|k| k == key)
    }

    /// Resolve one invocation: `overrides` > the action's own entry >
    /// `action_defaults` > library action defaults.
    pub fn resolve_action(
        &self,
        name: &str,
        overrides: Option<ActionConfig>,
        record: &Record,
    ) -> Result<ActionDefinition, CoreError> {
        let config = self
            .actions
            .get(name)
            .cloned()
            .ok_or_else(|| CoreError::UnknownAction {
                action: name.to_owned(),
            })?;

        let merged = resolve([
            overrides.unwrap_or_default(),
            config,
            self.action_defaults.clone(),
        ])
        .unwrap_or_default();

        Ok(merged.into_definition(name, record, self.headers.as_ref(), self.params.as_ref()))
    }

    /// Base route of `definition`, falling back to the model's.
    pub fn base_route_for<'a>(&'a self, definition: &'a ActionDefinition) -> &'a str {
        definition
            .base_route
            .as_deref()
            .unwrap_or(&self.base_route)
    }

    pub fn content_type_for<'a>(&'a self, definition: &'a ActionDefinition) -> Option<&'a str> {
        definition
            .content_type
            .as_deref()
            .or(self.content_type.as_deref())
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("api_key", &self.api_key)
            .field("exclude_keys", &self.exclude_keys)
            .field("base_route", &self.base_route)
            .field("event_prefix", &self.event_prefix)
            .field("content_type", &self.content_type)
            .field("prevent_simultaneous_actions", &self.prevent_simultaneous_actions)
            .field("guard_scope", &self.guard_scope)
            .field("actions", &self.actions)
            .field("attributes", &self.attributes)
            .field("take_at_least", &self.http.take_at_least)
            .field("error_key", &self.http.error_key)
            .finish_non_exhaustive()
    }
}

fn required<T>(value: Option<T>, name: &str) -> Result<T, CoreError> {
    value.ok_or_else(|| CoreError::Config {
        message: format!("{name} is not set in any settings layer"),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use restmodel_api::Method;
    use serde_json::json;

    #[test]
    fn library_defaults_alone_resolve() {
        let settings = Settings::resolve([]).unwrap();

        assert_eq!(settings.api_key, "$");
        assert!(settings.prevent_simultaneous_actions);
        assert_eq!(settings.guard_scope, GuardScope::Action);
        assert_eq!(settings.http.take_at_least, Duration::from_millis(100));
        assert_eq!(settings.http.error_key, "http.errors");
        assert_eq!(
            settings.action_names().collect::<Vec<_>>(),
            vec!["list", "create", "fetch", "update", "destroy"]
        );
    }

    #[test]
    fn instance_beats_model_beats_user_options() {
        let user = SettingsLayer::new().base_route("/api").event_prefix("app");
        let model = SettingsLayer::new().base_route("/api/users");
        let instance = SettingsLayer::new().event_prefix("admin");

        let settings = Settings::resolve([instance, model, user]).unwrap();

        assert_eq!(settings.base_route, "/api/users");
        assert_eq!(settings.event_prefix.as_deref(), Some("admin"));
    }

    #[test]
    fn disabled_actions_are_unknown() {
        let model = SettingsLayer::new().disable_action("destroy");
        let settings = Settings::resolve([model]).unwrap();

        assert!(!settings.has_action("destroy"));
        let err = settings
            .resolve_action("destroy", None, &Record::new())
            .unwrap_err();
        assert!(matches!(err, CoreError::UnknownAction { action } if action == "destroy"));
    }

    #[test]
    fn model_layer_extends_a_library_action() {
        let model = SettingsLayer::new().action("update", ActionConfig::new().method(Method::Patch));
        let settings = Settings::resolve([model]).unwrap();

        let def = settings
            .resolve_action("update", None, &Record::new())
            .unwrap();
        assert_eq!(def.method, Method::Patch);
        assert_eq!(def.route, "/{id}");
        assert!(def.apply);
    }

    #[test]
    fn action_defaults_fill_gaps_below_the_action() {
        let model = SettingsLayer::new()
            .action_defaults(ActionConfig::new().apply(true).content_type("application/json"))
            .action("search", ActionConfig::new().route("/search"));
        let settings = Settings::resolve([model]).unwrap();

        let def = settings
            .resolve_action("search", None, &Record::new())
            .unwrap();
        assert!(def.apply);
        assert!(def.validation);
        assert_eq!(def.method, Method::Get);
        assert_eq!(settings.content_type_for(&def), Some("application/json"));
    }

    #[test]
    fn runtime_overrides_win() {
        let settings = Settings::resolve([]).unwrap();
        let def = settings
            .resolve_action(
                "fetch",
                Some(ActionConfig::new().route("/{id}/full").apply(false)),
                &record!({ "id": 1 }),
            )
            .unwrap();

        assert_eq!(def.route, "/{id}/full");
        assert!(!def.apply);
    }

    #[test]
    fn model_headers_sit_under_action_headers() {
        let model = SettingsLayer::new()
            .headers(record!({ "Accept": "application/json", "X-Scope": "model" }))
            .action(
                "update",
                ActionConfig::new().headers(record!({ "X-Scope": "update" })),
            );
        let settings = Settings::resolve([model]).unwrap();

        let def = settings
            .resolve_action("update", None, &Record::new())
            .unwrap();
        assert_eq!(
            Value::Object(def.headers),
            json!({ "X-Scope": "update", "Accept": "application/json" })
        );
    }

    #[test]
    fn api_key_and_exclude_keys_are_excluded() {
        let settings = Settings::resolve([SettingsLayer::new().exclude_keys(["team"])]).unwrap();
        assert!(settings.is_excluded("$"));
        assert!(settings.is_excluded("team"));
        assert!(!settings.is_excluded("name"));
    }

    #[test]
    fn empty_event_prefix_means_none() {
        let settings = Settings::resolve([SettingsLayer::new().event_prefix("")]).unwrap();
        assert_eq!(settings.event_prefix, None);
    }
}
