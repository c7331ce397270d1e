use thiserror::Error;

/// Top-level error type for the `restmodel-api` crate.
///
/// Covers every failure mode a transport can surface: HTTP error
/// responses, connection-level failures, URL resolution and body
/// encoding. `restmodel-core` classifies these into validation
/// failures and generic errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Responses ───────────────────────────────────────────────────
    /// The server answered with a non-success status code.
    ///
    /// `body` holds the decoded response body (JSON when parseable,
    /// otherwise the raw text as a JSON string) so validation
    /// classifiers can inspect it.
    #[error("HTTP {status}: request failed")]
    Status { status: u16, body: serde_json::Value },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A relative route was dispatched without a base URL to resolve it.
    #[error("Cannot resolve relative route '{route}' without a base URL")]
    RelativeRoute { route: String },

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Data ────────────────────────────────────────────────────────
    /// A header name or value could not be encoded.
    #[error("Invalid header '{name}': {message}")]
    InvalidHeader { name: String, message: String },

    /// The request body could not be serialized.
    #[error("Encoding error: {0}")]
    Encoding(String),
}

impl Error {
    /// HTTP status of the failed response, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Decoded body of the failed response, if one was received.
    pub fn body(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Status { body, .. } => Some(body),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_error_exposes_status_and_body() {
        let err = Error::Status {
            status: 422,
            body: json!({ "errors": { "email": ["taken"] } }),
        };

        assert_eq!(err.status(), Some(422));
        assert!(err.body().and_then(|b| b.get("errors")).is_some());
    }

    #[test]
    fn non_response_errors_have_no_status() {
        let err = Error::RelativeRoute {
            route: "/users".into(),
        };
        assert_eq!(err.status(), None);
        assert!(err.body().is_none());
    }
}
