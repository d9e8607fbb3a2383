//! The success/error contract shared by every call in the client.
//!
//! A call settles into an [`ApiResult`]: either the decoded success value or
//! a [`ResultError`] describing what went wrong. Errors are values; nothing
//! in the request pipeline panics or unwinds to report a failed call.
//!
//! On the wire, an error body is a JSON object carrying the `isError` marker
//! field (servers using the older `__error` marker are also understood):
//!
//! ```json
//! { "isError": true, "code": "UNAUTHORIZED", "message": "Token expired" }
//! ```
//!
//! Any other JSON value is a success payload.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::sync::Arc;

use crate::codes;

/// Marker field identifying an error body.
pub const ERROR_MARKER: &str = "isError";
/// Marker field used by older servers.
pub const LEGACY_ERROR_MARKER: &str = "__error";

/// The original transport-level failure behind an error, if any.
pub type Cause = Arc<dyn std::error::Error + Send + Sync>;

/// Result of a call: the success value or a structured error.
pub type ApiResult<T, P = Value> = Result<T, ResultError<P>>;

/// A structured error describing a failed call.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ResultError<P = Value> {
    /// Short machine readable category, see [`codes`].
    pub code: String,
    /// Human readable description.
    pub message: String,
    /// Server supplied error detail.
    pub payload: Option<P>,
    /// The transport error this was created from. Never serialized.
    pub cause: Option<Cause>,
}

/// Optional parts of a [`ResultError`].
#[derive(Debug)]
pub struct ErrorDetails<P = Value> {
    pub payload: Option<P>,
    pub cause: Option<Cause>,
}

impl<P> Default for ErrorDetails<P> {
    fn default() -> Self {
        Self {
            payload: None,
            cause: None,
        }
    }
}

impl<P> ErrorDetails<P> {
    pub fn payload(payload: P) -> Self {
        Self {
            payload: Some(payload),
            cause: None,
        }
    }

    pub fn cause(
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            payload: None,
            cause: Some(Arc::new(cause)),
        }
    }
}

impl<P> ResultError<P> {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        make_error(code, message, ErrorDetails::default())
    }

    pub fn with_payload(mut self, payload: P) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_cause(mut self, cause: Cause) -> Self {
        self.cause = Some(cause);
        self
    }

    pub fn is_code(&self, code: &str) -> bool {
        self.code == code
    }

    /// Whether this error means the caller's credentials were refused.
    pub fn is_unauthorized(&self) -> bool {
        self.is_code(codes::UNAUTHORIZED)
    }
}

// The cause is diagnostic only and is left out of comparisons.
impl<P: PartialEq> PartialEq for ResultError<P> {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
            && self.message == other.message
            && self.payload == other.payload
    }
}

#[derive(Serialize)]
struct WireErrorRef<'a, P> {
    #[serde(rename = "isError")]
    is_error: bool,
    code: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<&'a P>,
}

#[derive(Deserialize)]
struct WireError<P> {
    #[serde(rename = "isError", alias = "__error")]
    #[allow(dead_code)]
    is_error: Value,
    code: String,
    message: String,
    payload: Option<P>,
}

impl<P: Serialize> Serialize for ResultError<P> {
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        WireErrorRef {
            is_error: true,
            code: &self.code,
            message: &self.message,
            payload: self.payload.as_ref(),
        }
        .serialize(serializer)
    }
}

impl<'de, P: Deserialize<'de>> Deserialize<'de> for ResultError<P> {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Self, D::Error> {
        let wire = WireError::<P>::deserialize(deserializer)?;
        Ok(Self {
            code: wire.code,
            message: wire.message,
            payload: wire.payload,
            cause: None,
        })
    }
}

pub fn make_error<P>(
    code: impl Into<String>,
    message: impl Into<String>,
    details: ErrorDetails<P>,
) -> ResultError<P> {
    ResultError {
        code: code.into(),
        message: message.into(),
        payload: details.payload,
        cause: details.cause,
    }
}

pub fn is_error<T, P>(result: &ApiResult<T, P>) -> bool {
    result.is_err()
}

pub fn is_success<T, P>(result: &ApiResult<T, P>) -> bool {
    !is_error(result)
}

/// Returns a function applying `map` to a success value. Errors pass
/// through unchanged.
pub fn if_success<T, U, P, F>(
    map: F,
) -> impl FnOnce(ApiResult<T, P>) -> ApiResult<U, P>
where
    F: FnOnce(T) -> U,
{
    move |result| match result {
        Ok(value) => Ok(map(value)),
        Err(error) => Err(error),
    }
}

/// Returns a function applying `map` to an error. `map` may recover with a
/// success value or replace the error. Successes pass through unchanged.
pub fn if_error<T, P, Q, F>(
    map: F,
) -> impl FnOnce(ApiResult<T, P>) -> ApiResult<T, Q>
where
    F: FnOnce(ResultError<P>) -> ApiResult<T, Q>,
{
    move |result| match result {
        Ok(value) => Ok(value),
        Err(error) => map(error),
    }
}

/// Whether a JSON body is an error body.
pub fn is_error_body(body: &Value) -> bool {
    body.as_object().is_some_and(|object| {
        object.contains_key(ERROR_MARKER)
            || object.contains_key(LEGACY_ERROR_MARKER)
    })
}

/// Classify a JSON body into a result, deserializing success bodies into
/// `T`.
pub fn decode_body<T: DeserializeOwned>(body: Value) -> ApiResult<T> {
    if is_error_body(&body) {
        return match serde_json::from_value::<ResultError>(body.clone()) {
            Ok(error) => Err(error),
            Err(e) => Err(make_error(
                codes::UNKNOWN,
                format!("Malformed error body: {e}"),
                ErrorDetails::payload(body),
            )),
        };
    }

    serde_json::from_value::<T>(body.clone()).map_err(|e| {
        make_error(
            codes::UNKNOWN,
            format!("Unexpected response body: {e}"),
            ErrorDetails::payload(body),
        )
    })
}
