//! Configuration for restmodel tools.
//!
//! A TOML file (plus `RESTMODEL_`-prefixed environment overrides) that
//! declares the HTTP defaults and the model types, and its translation
//! into `restmodel_api::TransportConfig` and a `restmodel_core::Registry`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use indexmap::IndexMap;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use restmodel_api::{Method, TlsMode, TransportConfig};
use restmodel_core::{
    ActionConfig, CoreError, DataRules, GuardScope, Record, Registry, Runtime, SettingsLayer,
};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("bearer token variable '{var}' is not set")]
    MissingToken { var: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("failed to build runtime: {0}")]
    Runtime(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Settings shared by every model.
    #[serde(default)]
    pub defaults: Defaults,

    /// Model types by name.
    #[serde(default)]
    pub models: IndexMap<String, ModelConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    /// Base URL relative routes are joined onto.
    pub base_url: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Accept any TLS certificate.
    #[serde(default)]
    pub insecure: bool,

    /// Path to a custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Bearer token (plaintext; prefer `bearer_token_env`).
    pub bearer_token: Option<String>,

    /// Environment variable holding the bearer token.
    pub bearer_token_env: Option<String>,

    pub prevent_simultaneous_actions: Option<bool>,

    pub guard_scope: Option<GuardScope>,

    pub content_type: Option<String>,

    /// Minimum latency of a successful request, in milliseconds.
    pub take_at_least_ms: Option<u64>,

    /// Headers sent with every action.
    #[serde(default)]
    pub headers: IndexMap<String, String>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: default_timeout(),
            insecure: false,
            ca_cert: None,
            bearer_token: None,
            bearer_token_env: None,
            prevent_simultaneous_actions: None,
            guard_scope: None,
            content_type: None,
            take_at_least_ms: None,
            headers: IndexMap::new(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

/// One registered model type.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ModelConfig {
    pub base_route: Option<String>,
    pub event_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_keys: Vec<String>,
    pub attributes: Option<Vec<String>>,
    pub content_type: Option<String>,
    pub prevent_simultaneous_actions: Option<bool>,
    pub guard_scope: Option<GuardScope>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub headers: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub params: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub actions: IndexMap<String, ActionToml>,
}

/// An action table, or a bare boolean: `false` removes an inherited
/// action, `true` keeps it unchanged.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ActionToml {
    Enabled(bool),
    Config(ActionSection),
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ActionSection {
    /// HTTP method, case-insensitive.
    pub method: Option<String>,
    pub route: Option<String>,
    pub base_route: Option<String>,
    pub apply: Option<bool>,
    pub validation: Option<bool>,
    pub content_type: Option<String>,
    pub only: Option<Vec<String>>,
    pub without: Option<Vec<String>>,
    pub with: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub headers: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub params: IndexMap<String, String>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "restmodel", "restmodel").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("restmodel");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the config from the platform path plus the environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the config from `path` plus the environment.
///
/// A missing file is not an error. Environment variables use `__` as the
/// nesting separator: `RESTMODEL_DEFAULTS__BASE_URL`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");

    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("RESTMODEL_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

impl Config {
    /// Pretty TOML with the plaintext bearer token masked.
    pub fn to_redacted_toml(&self) -> Result<String, ConfigError> {
        let mut shown = self.clone();
        if shown.defaults.bearer_token.is_some() {
            shown.defaults.bearer_token = Some("********".into());
        }
        Ok(toml::to_string_pretty(&shown)?)
    }
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the bearer token: the named env var first, then plaintext.
///
/// Returns `Ok(None)` when no token is configured at all; a configured
/// but unset env var with no plaintext fallback is an error.
pub fn resolve_bearer_token(defaults: &Defaults) -> Result<Option<SecretString>, ConfigError> {
    // 1. Env var
    if let Some(ref var) = defaults.bearer_token_env {
        if let Ok(token) = std::env::var(var) {
            return Ok(Some(SecretString::from(token)));
        }
    }

    // 2. Plaintext in config
    if let Some(ref token) = defaults.bearer_token {
        return Ok(Some(SecretString::from(token.clone())));
    }

    match &defaults.bearer_token_env {
        Some(var) => Err(ConfigError::MissingToken { var: var.clone() }),
        None => Ok(None),
    }
}

// ── Translation ─────────────────────────────────────────────────────

impl Config {
    /// Transport settings from `[defaults]`.
    pub fn transport_config(&self) -> Result<TransportConfig, ConfigError> {
        let defaults = &self.defaults;
        let mut transport = TransportConfig {
            timeout: Duration::from_secs(defaults.timeout),
            ..TransportConfig::default()
        };

        if let Some(ref base) = defaults.base_url {
            let url: url::Url = base.parse().map_err(|_| ConfigError::Validation {
                field: "defaults.base_url".into(),
                reason: format!("invalid URL: {base}"),
            })?;
            transport = transport.with_base_url(url);
        }

        transport.tls = if defaults.insecure {
            TlsMode::DangerAcceptInvalid
        } else if let Some(ref ca_path) = defaults.ca_cert {
            TlsMode::CustomCa(ca_path.clone())
        } else {
            TlsMode::System
        };

        if let Some(token) = resolve_bearer_token(defaults)? {
            transport.default_headers.push((
                "Authorization".into(),
                format!("Bearer {}", token.expose_secret()),
            ));
        }

        Ok(transport)
    }

    /// Registry-wide options from `[defaults]`.
    pub fn user_options(&self) -> SettingsLayer {
        let defaults = &self.defaults;
        let mut layer = SettingsLayer::new();
        if let Some(prevent) = defaults.prevent_simultaneous_actions {
            layer = layer.prevent_simultaneous_actions(prevent);
        }
        if let Some(scope) = defaults.guard_scope {
            layer = layer.guard_scope(scope);
        }
        if let Some(ref content_type) = defaults.content_type {
            layer = layer.content_type(content_type.clone());
        }
        if let Some(ms) = defaults.take_at_least_ms {
            layer = layer.take_at_least(Duration::from_millis(ms));
        }
        if !defaults.headers.is_empty() {
            layer = layer.headers(string_record(&defaults.headers));
        }
        layer
    }

    /// Registry over `runtime` with every configured model registered.
    pub fn registry(&self, runtime: Runtime) -> Result<Registry, ConfigError> {
        let mut registry = Registry::new(self.user_options(), runtime);
        for (name, model) in &self.models {
            registry.register(name.clone(), model.to_layer(name)?);
        }
        Ok(registry)
    }

    /// Registry over an HTTP runtime built from `[defaults]`.
    pub fn http_registry(&self) -> Result<Registry, ConfigError> {
        let runtime = Runtime::http(self.transport_config()?)?;
        self.registry(runtime)
    }
}

impl ModelConfig {
    /// Settings layer for the model type `name`.
    pub fn to_layer(&self, name: &str) -> Result<SettingsLayer, ConfigError> {
        let mut layer = SettingsLayer::new();
        if let Some(ref route) = self.base_route {
            layer = layer.base_route(route.clone());
        }
        if let Some(ref prefix) = self.event_prefix {
            layer = layer.event_prefix(prefix.clone());
        }
        if !self.exclude_keys.is_empty() {
            layer = layer.exclude_keys(self.exclude_keys.iter().cloned());
        }
        if let Some(ref attributes) = self.attributes {
            layer = layer.attributes(attributes.iter().cloned());
        }
        if let Some(ref content_type) = self.content_type {
            layer = layer.content_type(content_type.clone());
        }
        if let Some(prevent) = self.prevent_simultaneous_actions {
            layer = layer.prevent_simultaneous_actions(prevent);
        }
        if let Some(scope) = self.guard_scope {
            layer = layer.guard_scope(scope);
        }
        if !self.headers.is_empty() {
            layer = layer.headers(string_record(&self.headers));
        }
        if !self.params.is_empty() {
            layer = layer.params(string_record(&self.params));
        }

        for (action, entry) in &self.actions {
            layer = match entry {
                ActionToml::Enabled(false) => layer.disable_action(action.clone()),
                ActionToml::Enabled(true) => layer.action(action.clone(), ActionConfig::new()),
                ActionToml::Config(section) => {
                    let field = format!("models.{name}.actions.{action}.method");
                    layer.action(action.clone(), section.to_action(&field)?)
                }
            };
        }
        Ok(layer)
    }
}

impl ActionSection {
    fn to_action(&self, method_field: &str) -> Result<ActionConfig, ConfigError> {
        let mut config = ActionConfig::new();
        if let Some(ref method) = self.method {
            let method: Method = method.parse().map_err(|_| ConfigError::Validation {
                field: method_field.to_owned(),
                reason: format!("unknown HTTP method '{method}'"),
            })?;
            config = config.method(method);
        }
        if let Some(ref route) = self.route {
            config = config.route(route.clone());
        }
        if let Some(ref base_route) = self.base_route {
            config = config.base_route(base_route.clone());
        }
        if let Some(apply) = self.apply {
            config = config.apply(apply);
        }
        if let Some(validation) = self.validation {
            config = config.validation(validation);
        }
        if let Some(ref content_type) = self.content_type {
            config = config.content_type(content_type.clone());
        }
        if let Some(rules) = self.data_rules() {
            config = config.data(rules);
        }
        if !self.headers.is_empty() {
            config = config.headers(string_record(&self.headers));
        }
        if !self.params.is_empty() {
            config = config.params(string_record(&self.params));
        }
        Ok(config)
    }

    fn data_rules(&self) -> Option<DataRules> {
        if self.only.is_none() && self.without.is_none() && self.with.is_none() {
            return None;
        }
        let mut rules = DataRules::default();
        if let Some(ref only) = self.only {
            rules = rules.only(only.clone());
        }
        if let Some(ref without) = self.without {
            rules = rules.without(without.clone());
        }
        if let Some(ref with) = self.with {
            rules = rules.with(with.clone());
        }
        Some(rules)
    }
}

fn string_record(map: &IndexMap<String, String>) -> Record {
    map.iter()
        .map(|(k, v)| (k.clone(), v.clone().into()))
        .collect()
}
