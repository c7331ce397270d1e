// Transport contract and shared reqwest client configuration.
//
// The engine only sees `Transport`; `TransportConfig` carries the TLS,
// timeout and base-URL settings that `HttpTransport` builds its
// `reqwest::Client` from.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::error::Error;
use crate::request::{HttpRequest, HttpResponse};

/// An injectable HTTP client.
///
/// Settles exactly once per request: `Ok` for 2xx responses, `Err` for
/// everything else. Error responses must be reported as
/// [`Error::Status`] so validation classifiers can read them.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, request: HttpRequest) -> Result<HttpResponse, Error>;
}

/// TLS verification mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsMode {
    /// Use the system certificate store.
    #[default]
    System,
    /// Use a custom CA certificate from the given PEM file.
    CustomCa(PathBuf),
    /// Accept any certificate (local development servers).
    DangerAcceptInvalid,
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Base URL relative routes are joined onto.
    pub base_url: Option<Url>,
    pub tls: TlsMode,
    pub timeout: Duration,
    pub user_agent: String,
    /// Headers sent with every request, below any action headers.
    pub default_headers: Vec<(String, String)>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            tls: TlsMode::default(),
            timeout: Duration::from_secs(30),
            user_agent: concat!("restmodel/", env!("CARGO_PKG_VERSION")).into(),
            default_headers: Vec::new(),
        }
    }
}

impl TransportConfig {
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut headers = reqwest::header::HeaderMap::new();
        for (name, value) in &self.default_headers {
            let name = reqwest::header::HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                Error::InvalidHeader {
                    name: name.clone(),
                    message: e.to_string(),
                }
            })?;
            let value = reqwest::header::HeaderValue::from_str(value).map_err(|e| {
                Error::InvalidHeader {
                    name: name.to_string(),
                    message: e.to_string(),
                }
            })?;
            headers.insert(name, value);
        }

        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent.as_str())
            .default_headers(headers);

        match &self.tls {
            TlsMode::System => {}
            TlsMode::CustomCa(path) => {
                let cert_pem = std::fs::read(path)
                    .map_err(|e| Error::Tls(format!("failed to read CA cert: {e}")))?;
                let cert = reqwest::Certificate::from_pem(&cert_pem)
                    .map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
                builder = builder.add_root_certificate(cert);
            }
            TlsMode::DangerAcceptInvalid => {
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        builder
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }

    /// Resolve a request URL: absolute URLs pass through, relative routes
    /// are joined onto `base_url`.
    pub fn resolve_url(&self, route: &str) -> Result<Url, Error> {
        match Url::parse(route) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let base = self.base_url.as_ref().ok_or_else(|| Error::RelativeRoute {
                    route: route.to_owned(),
                })?;
                Ok(join_route(base, route))
            }
            Err(e) => Err(Error::InvalidUrl(e)),
        }
    }
}

/// Append a route to a base URL, keeping the base path intact.
///
/// `Url::join` would drop the last base segment for `"users"` and the whole
/// base path for `"/users"`; routes here are always appended.
fn join_route(base: &Url, route: &str) -> Url {
    let (path, query) = match route.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (route, None),
    };

    let mut url = base.clone();
    let joined = format!(
        "{}/{}",
        base.path().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    url.set_path(&joined);
    if let Some(query) = query {
        url.set_query(Some(query));
    }
    url
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config(base: &str) -> TransportConfig {
        TransportConfig::default().with_base_url(Url::parse(base).unwrap())
    }

    #[test]
    fn absolute_urls_pass_through() {
        let url = config("https://api.test/v1")
            .resolve_url("https://other.test/users/1")
            .unwrap();
        assert_eq!(url.as_str(), "https://other.test/users/1");
    }

    #[test]
    fn relative_routes_keep_base_path() {
        let cfg = config("https://api.test/v1/");
        assert_eq!(
            cfg.resolve_url("/users/1").unwrap().as_str(),
            "https://api.test/v1/users/1"
        );
        assert_eq!(
            cfg.resolve_url("users?page=2").unwrap().as_str(),
            "https://api.test/v1/users?page=2"
        );
    }

    #[test]
    fn relative_route_without_base_is_an_error() {
        let result = TransportConfig::default().resolve_url("/users");
        assert!(matches!(result, Err(Error::RelativeRoute { .. })));
    }

    #[test]
    fn invalid_default_header_is_rejected() {
        let cfg = TransportConfig {
            default_headers: vec![("bad header".into(), "x".into())],
            ..TransportConfig::default()
        };
        assert!(matches!(
            cfg.build_client(),
            Err(Error::InvalidHeader { .. })
        ));
    }
}
