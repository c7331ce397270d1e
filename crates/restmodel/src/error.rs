//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use restmodel_config::ConfigError;
use restmodel_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const VALIDATION: i32 = 5;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to {url}")]
    #[diagnostic(
        code(restmodel::connection_failed),
        help(
            "Check that the server is running and reachable.\n\
             Reason: {reason}"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(restmodel::timeout),
        help("Increase `defaults.timeout` in the config file.")
    )]
    Timeout { seconds: u64 },

    // ── Models ───────────────────────────────────────────────────────
    #[error("Model type '{model_type}' is not configured")]
    #[diagnostic(
        code(restmodel::unknown_model),
        help("Run: restmodel models  to see configured model types")
    )]
    UnknownModel { model_type: String },

    #[error("Action '{action}' is not defined on this model")]
    #[diagnostic(
        code(restmodel::unknown_action),
        help("Run: restmodel models  to see each model's actions")
    )]
    UnknownAction { action: String },

    // ── Server responses ─────────────────────────────────────────────
    #[error("Server rejected the payload (HTTP {status})")]
    #[diagnostic(
        code(restmodel::validation_failed),
        help("Field errors:\n{details}")
    )]
    Rejected { status: u16, details: String },

    #[error("API error ({code}): {message}")]
    #[diagnostic(code(restmodel::api_error))]
    ApiError { code: String, message: String },

    // ── Input ────────────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(restmodel::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    #[diagnostic(
        code(restmodel::config),
        help("Check the config file at: {path}")
    )]
    Config { message: String, path: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    #[diagnostic(code(restmodel::json), help("Check the JSON input and try again."))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::UnknownModel { .. } | Self::UnknownAction { .. } => exit_code::NOT_FOUND,
            Self::Rejected { .. } => exit_code::VALIDATION,
            Self::Validation { .. } | Self::Json(_) => exit_code::USAGE,
            Self::Config { .. } => exit_code::CONFIG,
            Self::ApiError { .. } | Self::Io(_) => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::UnknownModel { model_type } => CliError::UnknownModel { model_type },

            CoreError::UnknownAction { action } => CliError::UnknownAction { action },

            CoreError::InvalidErrors { found } => CliError::Validation {
                field: "errors".into(),
                reason: format!("expected a map of field to messages, got {found}"),
            },

            CoreError::Config { message } => CliError::Config {
                message,
                path: restmodel_config::config_path().display().to_string(),
            },

            CoreError::Validation { status, errors } => CliError::Rejected {
                status,
                details: errors
                    .flat()
                    .iter()
                    .map(|e| format!("  {}: {}", e.field, e.message))
                    .collect::<Vec<_>>()
                    .join("\n"),
            },

            CoreError::ConnectionFailed { url, reason } => {
                CliError::ConnectionFailed { url, reason }
            }

            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },

            CoreError::Api {
                message,
                code,
                status: _,
            } => CliError::ApiError {
                code: code.unwrap_or_else(|| "unknown".into()),
                message,
            },

            CoreError::Internal(message) => CliError::ApiError {
                code: "internal".into(),
                message,
            },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Runtime(core) => core.into(),
            ConfigError::Io(io) => CliError::Io(io),
            ConfigError::Validation { field, reason } => CliError::Config {
                message: format!("invalid {field}: {reason}"),
                path: restmodel_config::config_path().display().to_string(),
            },
            other => CliError::Config {
                message: other.to_string(),
                path: restmodel_config::config_path().display().to_string(),
            },
        }
    }
}
