//! Shared helpers for command handlers.

use std::io::Read;
use std::path::{Path, PathBuf};

use serde_json::Value;

use restmodel_config::Config;
use restmodel_core::{EventBus, Model, Record, Registry, Runtime, SettingsLayer};

use crate::cli::{GlobalOpts, TargetArgs};
use crate::error::CliError;

/// Config file in effect: `--config`, else the platform default.
pub fn config_file(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(restmodel_config::config_path)
}

/// Load the config and apply global flag overrides.
pub fn load_config(global: &GlobalOpts) -> Result<Config, CliError> {
    let mut cfg = restmodel_config::load_config_from(&config_file(global))?;
    if let Some(ref url) = global.base_url {
        cfg.defaults.base_url = Some(url.clone());
    }
    Ok(cfg)
}

/// Registry over an HTTP runtime that reports to `bus`.
pub fn registry(cfg: &Config, bus: &EventBus) -> Result<Registry, CliError> {
    let runtime = Runtime::http(cfg.transport_config()?)?.with_event_bus(bus);
    Ok(cfg.registry(runtime)?)
}

/// Read a JSON record from a file, or stdin for `-`.
pub fn read_record(path: Option<&Path>) -> Result<Record, CliError> {
    let contents = match path {
        None => return Ok(Record::new()),
        Some(p) if p.as_os_str() == "-" => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
        Some(p) => std::fs::read_to_string(p)?,
    };

    match serde_json::from_str(&contents)? {
        Value::Object(record) => Ok(record),
        other => Err(CliError::Validation {
            field: "record".into(),
            reason: format!("expected a JSON object, got {}", kind(&other)),
        }),
    }
}

/// Create the target model and stage the requested pipeline steps.
pub fn build_model(registry: &Registry, target: &TargetArgs) -> Result<Model, CliError> {
    let with = target.with.as_deref().map(parse_object).transpose()?;
    let record = read_record(target.record.as_deref())?;
    let model = registry.create(&target.model, record, SettingsLayer::new())?;

    model.stage(|pipeline| {
        if !target.only.is_empty() {
            pipeline.only(target.only.clone());
        }
        if !target.without.is_empty() {
            pipeline.without(target.without.clone());
        }
        if let Some(with) = with {
            pipeline.with(with);
        }
    });
    Ok(model)
}

fn parse_object(raw: &str) -> Result<Value, CliError> {
    let value: Value = serde_json::from_str(raw).map_err(|e| CliError::Validation {
        field: "--with".into(),
        reason: format!("invalid JSON: {e}"),
    })?;
    if value.is_object() {
        Ok(value)
    } else {
        Err(CliError::Validation {
            field: "--with".into(),
            reason: format!("expected a JSON object, got {}", kind(&value)),
        })
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
