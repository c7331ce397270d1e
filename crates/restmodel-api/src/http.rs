// reqwest-backed transport
//
// Resolves routes against the configured base URL, places query/body
// according to the request, and decodes every response body into JSON so
// the engine never handles raw bytes.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use tracing::debug;

use crate::error::Error;
use crate::request::{Body, HttpRequest, HttpResponse};
use crate::transport::{Transport, TransportConfig};

/// Default [`Transport`] implementation over `reqwest::Client`.
pub struct HttpTransport {
    http: reqwest::Client,
    config: TransportConfig,
}

impl HttpTransport {
    /// Create a transport from a `TransportConfig`.
    pub fn new(config: TransportConfig) -> Result<Self, Error> {
        let http = config.build_client()?;
        Ok(Self { http, config })
    }

    /// The transport configuration.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Decode a response body: empty → `Null`, JSON → parsed value,
    /// anything else → the raw text as a JSON string.
    async fn decode(resp: reqwest::Response) -> Result<(u16, Vec<(String, String)>, Value), Error> {
        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_owned())))
            .collect();

        let text = resp.text().await.map_err(Error::Transport)?;
        let data = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        Ok((status, headers, data))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, request: HttpRequest) -> Result<HttpResponse, Error> {
        let url = self.config.resolve_url(&request.url)?;
        debug!(method = %request.method, %url, "dispatching request");

        let mut builder = self.http.request(request.method.into(), url);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder = match request.body {
            Some(Body::Json(value)) => {
                let bytes =
                    serde_json::to_vec(&value).map_err(|e| Error::Encoding(e.to_string()))?;
                let content_type = request
                    .content_type
                    .unwrap_or_else(|| "application/json".to_owned());
                builder.header(CONTENT_TYPE, content_type).body(bytes)
            }
            Some(Body::Form(pairs)) => {
                let builder = builder.form(&pairs);
                match request.content_type {
                    Some(content_type) => builder.header(CONTENT_TYPE, content_type),
                    None => builder,
                }
            }
            None => builder,
        };

        let resp = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout {
                    timeout_secs: self.config.timeout.as_secs(),
                }
            } else {
                Error::Transport(e)
            }
        })?;

        let (status, headers, data) = Self::decode(resp).await?;
        debug!(status, "response received");

        if !(200..300).contains(&status) {
            return Err(Error::Status { status, body: data });
        }

        Ok(HttpResponse {
            status,
            headers,
            data,
        })
    }
}
