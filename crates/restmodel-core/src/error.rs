// ── Core error types ──
//
// Errors surfaced by restmodel-core. Configuration mistakes fail
// synchronously; request failures resolve through the action handle.
// The `From<restmodel_api::Error>` impl classifies transport-layer
// failures into domain variants.

use thiserror::Error;

use crate::errors::ErrorStore;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Configuration errors ─────────────────────────────────────────
    #[error("Model type not registered: {model_type}")]
    UnknownModel { model_type: String },

    #[error("Action not defined on model: {action}")]
    UnknownAction { action: String },

    #[error("Validation errors must be a map of field to messages, got {found}")]
    InvalidErrors { found: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Request errors ───────────────────────────────────────────────
    /// The server rejected the payload with field-level errors. The same
    /// errors are also in the model's error store.
    #[error("Validation failed (HTTP {status}): {} field(s) rejected", errors.all().len())]
    Validation { status: u16, errors: ErrorStore },

    #[error("Cannot connect to {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// Machine-readable code, when one can be derived.
        code: Option<String>,
        /// HTTP status code (if the server answered).
        status: Option<u16>,
    },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// HTTP status associated with this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Validation { status, .. } => Some(*status),
            Self::Api { status, .. } => *status,
            _ => None,
        }
    }

    /// Configuration errors are raised before anything is dispatched.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::UnknownModel { .. }
                | Self::UnknownAction { .. }
                | Self::InvalidErrors { .. }
                | Self::Config { .. }
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<restmodel_api::Error> for CoreError {
    fn from(err: restmodel_api::Error) -> Self {
        Self::from(&err)
    }
}

/// Settled requests share the transport error with event subscribers, so
/// classification works from a borrow.
impl From<&restmodel_api::Error> for CoreError {
    fn from(err: &restmodel_api::Error) -> Self {
        use restmodel_api::Error as Api;

        match err {
            Api::Status { status, body } => CoreError::Api {
                message: status_message(*status, body),
                code: Some(status.to_string()),
                status: Some(*status),
            },
            Api::Transport(e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        code: None,
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            Api::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            Api::RelativeRoute { route } => CoreError::Config {
                message: format!("route '{route}' is relative and no base URL is configured"),
            },
            Api::Timeout { timeout_secs } => CoreError::Timeout {
                timeout_secs: *timeout_secs,
            },
            Api::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            Api::InvalidHeader { name, message } => CoreError::Config {
                message: format!("invalid header '{name}': {message}"),
            },
            Api::Encoding(msg) => CoreError::Internal(format!("body encoding failed: {msg}")),
        }
    }
}

/// Best human-readable message for an error response: a `message` or
/// `error` string in the body, else the body text itself.
fn status_message(status: u16, body: &serde_json::Value) -> String {
    let detail = body
        .get("message")
        .or_else(|| body.get("error"))
        .and_then(serde_json::Value::as_str)
        .or_else(|| body.as_str().filter(|s| !s.is_empty()));

    match detail {
        Some(detail) => format!("HTTP {status}: {detail}"),
        None => format!("HTTP {status}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn status_errors_keep_status_and_message() {
        let err = CoreError::from(restmodel_api::Error::Status {
            status: 409,
            body: json!({ "message": "version conflict" }),
        });

        assert_eq!(err.status(), Some(409));
        assert_eq!(err.to_string(), "API error: HTTP 409: version conflict");
        assert!(!err.is_config());
    }

    #[test]
    fn plain_text_bodies_become_the_message() {
        let err = CoreError::from(restmodel_api::Error::Status {
            status: 404,
            body: json!("no such user"),
        });
        assert_eq!(err.to_string(), "API error: HTTP 404: no such user");
    }

    #[test]
    fn relative_route_is_a_configuration_error() {
        let err = CoreError::from(restmodel_api::Error::RelativeRoute {
            route: "/users".into(),
        });
        assert!(err.is_config());
    }

    #[test]
    fn timeouts_keep_their_duration() {
        let err = CoreError::from(restmodel_api::Error::Timeout { timeout_secs: 5 });
        assert!(matches!(err, CoreError::Timeout { timeout_secs: 5 }));
    }
}
