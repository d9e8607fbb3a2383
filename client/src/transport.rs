//! The network capability the client is built on.
//!
//! A [`Transport`] sends one fully prepared [`HttpRequest`] and hands back
//! whatever the server answered, whatever the status. Only failures to get
//! an answer at all are errors, classified so the client can tell timeouts
//! and connectivity problems apart. Cancellation is dropping the returned
//! future.

use futures::future::LocalBoxFuture;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

pub const AUTHORIZATION: &str = "Authorization";

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Value>,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            body,
            ..Self::new(Method::POST, url)
        }
    }

    /// Attach a serializable JSON body.
    pub fn json(
        mut self,
        body: &impl Serialize,
    ) -> Result<Self, serde_json::Error> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.set_header(name, value);
        self
    }

    /// Set a header, replacing any existing value regardless of case.
    pub fn set_header(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) {
        let name = name.into();
        self.headers.retain(|key, _| !key.eq_ignore_ascii_case(&name));
        self.headers.insert(name, value.into());
    }

    /// Case-insensitive header lookup.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// The bearer token attached to this request, if any.
    pub fn bearer_token(&self) -> Option<&str> {
        self.header_value(AUTHORIZATION)?.strip_prefix("Bearer ")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: StatusCode,
    /// Parsed JSON body; `Null` when the body was empty.
    pub body: Value,
}

impl HttpResponse {
    pub fn new(status: StatusCode, body: Value) -> Self {
        Self { status, body }
    }

    pub fn ok(body: Value) -> Self {
        Self::new(StatusCode::OK, body)
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Failure to obtain any response.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("Request timed out")]
    Timeout,
    #[error("Could not reach the server: {0}")]
    Network(String),
    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        #[cfg(not(target_arch = "wasm32"))]
        let unreachable = error.is_connect();
        #[cfg(target_arch = "wasm32")]
        let unreachable = error.is_request();

        if error.is_timeout() {
            Self::Timeout
        } else if unreachable {
            Self::Network(error.to_string())
        } else {
            Self::Other(error.to_string())
        }
    }
}

pub trait Transport {
    fn send(
        &self,
        request: HttpRequest,
    ) -> LocalBoxFuture<'_, Result<HttpResponse, TransportError>>;
}

/// A transport backed by a reqwest client.
#[derive(Clone, Default)]
pub struct ReqwestTransport {
    pub inner_client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(inner_client: reqwest::Client) -> Self {
        Self { inner_client }
    }
}

impl Transport for ReqwestTransport {
    fn send(
        &self,
        request: HttpRequest,
    ) -> LocalBoxFuture<'_, Result<HttpResponse, TransportError>> {
        Box::pin(async move {
            let mut builder =
                self.inner_client.request(request.method, &request.url);
            for (name, value) in &request.headers {
                builder = builder.header(name, value);
            }
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }

            #[cfg(not(target_arch = "wasm32"))]
            let builder = match request.timeout {
                Some(timeout) => builder.timeout(timeout),
                None => builder,
            };

            let response = builder.send().await?;
            let status = response.status();
            let text = response.text().await?;
            let body = if text.trim().is_empty() {
                Value::Null
            } else {
                // Non-JSON bodies are kept as plain text.
                serde_json::from_str(&text).unwrap_or(Value::String(text))
            };

            Ok(HttpResponse { status, body })
        })
    }
}
