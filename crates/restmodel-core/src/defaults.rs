// ── Library defaults ──
//
// The lowest settings layer. Everything here can be overridden by
// registry-wide options, a registered model type, or a single instance.

use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use restmodel_api::Method;
use serde_json::Value;

use crate::action::{ActionConfig, ActionEntry, PipelineFn};
use crate::pipeline::DataPipeline;
use crate::settings::{GuardScope, HttpLayer, SettingsLayer, ValidationErrorsLayer};

/// Reserved namespace for engine state.
pub const API_KEY: &str = "$";

/// Minimum latency of a successful request.
pub const TAKE_AT_LEAST: Duration = Duration::from_millis(100);

/// Meta-record path the error store is mirrored to.
pub const ERROR_KEY: &str = "http.errors";

/// Status that marks a response as a validation failure.
pub const VALIDATION_STATUS: u16 = 422;

fn send_nothing(pipeline: &mut DataPipeline) {
    pipeline.none();
}

/// The stock CRUD actions every model starts with.
pub fn actions() -> IndexMap<String, ActionEntry> {
    let none: PipelineFn = Arc::new(send_nothing);

    [
        (
            "list",
            ActionConfig::new()
                .method(Method::Get)
                .route("")
                .pipeline_fn(Arc::clone(&none)),
        ),
        ("create", ActionConfig::new().method(Method::Post).route("")),
        (
            "fetch",
            ActionConfig::new()
                .method(Method::Get)
                .route("/{id}")
                .apply(true)
                .pipeline_fn(Arc::clone(&none)),
        ),
        (
            "update",
            ActionConfig::new()
                .method(Method::Put)
                .route("/{id}")
                .apply(true),
        ),
        (
            "destroy",
            ActionConfig::new()
                .method(Method::Delete)
                .route("/{id}")
                .pipeline_fn(none),
        ),
    ]
    .into_iter()
    .map(|(name, config)| (name.to_owned(), ActionEntry::Enabled(config)))
    .collect()
}

/// Base configuration under every action.
pub fn action_defaults() -> ActionConfig {
    ActionConfig::new().apply(false).validation(true)
}

/// Model data lives under `data` when the body has it, else the body is
/// the data.
pub fn data_from_response(body: &Value) -> Value {
    match body.get("data") {
        Some(data) => data.clone(),
        None => body.clone(),
    }
}

pub fn is_validation_error(err: &restmodel_api::Error) -> bool {
    err.status() == Some(VALIDATION_STATUS)
}

/// Field errors live under `errors` when the body has it, else the body
/// is the error map.
pub fn errors_from_response(err: &restmodel_api::Error) -> Value {
    match err.body() {
        Some(body) => body.get("errors").unwrap_or(body).clone(),
        None => Value::Null,
    }
}

/// The full library layer.
pub fn library() -> SettingsLayer {
    SettingsLayer {
        api_key: Some(API_KEY.to_owned()),
        exclude_keys: Some(Vec::new()),
        base_route: Some(String::new()),
        event_prefix: None,
        headers: None,
        params: None,
        content_type: None,
        prevent_simultaneous_actions: Some(true),
        guard_scope: Some(GuardScope::Action),
        actions: actions(),
        action_defaults: Some(action_defaults()),
        validation_errors: ValidationErrorsLayer {
            is_validation_error: Some(Arc::new(is_validation_error)),
            transform_response: Some(Arc::new(errors_from_response)),
        },
        attributes: None,
        http: HttpLayer {
            take_at_least: Some(TAKE_AT_LEAST),
            error_key: Some(ERROR_KEY.to_owned()),
            get_data_from_response: Some(Arc::new(data_from_response)),
            customize_request: None,
        },
    }
}
