use futures::future::LocalBoxFuture;
use payloads::{
    ApiResult, ErrorDetails, ResultError, codes, decode_body, is_error_body,
    make_error,
};
use reqwest::StatusCode;
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;

use crate::config::ClientConfig;
use crate::transport::{
    AUTHORIZATION, HttpRequest, HttpResponse, Transport, TransportError,
};

/// Receives every normalized error except UNAUTHORIZED.
pub type ErrorSink = Rc<dyn Fn(&ResultError)>;
/// Modifies a request just before it is sent.
pub type RequestInterceptor = Rc<dyn Fn(&mut HttpRequest)>;

/// Outcome of a credential renewal: the new access token if one was issued,
/// or the error that ends the request.
pub type RenewalOutcome = Result<Option<String>, ResultError>;

/// Renews credentials after a request was refused as unauthorized.
pub trait RenewCredentials {
    fn renew(&self) -> LocalBoxFuture<'_, RenewalOutcome>;

    /// The renewal currently in flight, if any.
    fn in_flight(&self) -> Option<LocalBoxFuture<'static, RenewalOutcome>>;
}

/// Why a request did not produce a success body.
#[derive(Debug, thiserror::Error)]
pub(crate) enum Failure {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("Request failed with status code {}", .0.status.as_u16())]
    Status(HttpResponse),
    /// Renewal refused the credentials. Carries the error to hand back
    /// to the caller unchanged.
    #[error("{0}")]
    Rejected(ResultError),
}

/// A transport together with default configuration and interceptors.
pub struct HttpClient {
    transport: Rc<dyn Transport>,
    config: ClientConfig,
    request_interceptors: RefCell<Vec<RequestInterceptor>>,
    error_sink: RefCell<Option<ErrorSink>>,
    renewer: RefCell<Option<Rc<dyn RenewCredentials>>>,
}

impl HttpClient {
    pub fn new(transport: Rc<dyn Transport>, config: ClientConfig) -> Self {
        Self {
            transport,
            config,
            request_interceptors: RefCell::new(Vec::new()),
            error_sink: RefCell::new(None),
            renewer: RefCell::new(None),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Interceptors run in registration order, after the configured
    /// defaults are applied.
    pub fn add_request_interceptor(
        &self,
        interceptor: impl Fn(&mut HttpRequest) + 'static,
    ) {
        self.request_interceptors
            .borrow_mut()
            .push(Rc::new(interceptor));
    }

    pub fn set_error_sink(&self, sink: Option<ErrorSink>) {
        *self.error_sink.borrow_mut() = sink;
    }

    /// Enable renew-and-retry for requests refused as unauthorized.
    pub fn set_renewer(&self, renewer: Rc<dyn RenewCredentials>) {
        *self.renewer.borrow_mut() = Some(renewer);
    }

    /// The credential renewal in flight, if renew-and-retry is enabled and
    /// a renewal is running.
    pub fn renewal_in_flight(
        &self,
    ) -> Option<LocalBoxFuture<'static, RenewalOutcome>> {
        let renewer = self.renewer.borrow().clone();
        renewer?.in_flight()
    }

    /// Send a request and normalize the outcome.
    pub async fn request(&self, request: HttpRequest) -> ApiResult<Value> {
        self.execute(request)
            .await
            .map_err(|failure| self.report(normalize(failure)))
    }

    async fn execute(&self, request: HttpRequest) -> Result<Value, Failure> {
        let request = self.prepare(request);
        let failure = match self.dispatch(request.clone()).await {
            Ok(response) => return Ok(response.body),
            Err(failure) => failure,
        };

        let unauthorized = matches!(
            &failure,
            Failure::Status(response) if is_unauthorized(response)
        );
        let renewer = self.renewer.borrow().clone();
        let renewer = match renewer {
            Some(renewer) if unauthorized => renewer,
            _ => return Err(failure),
        };

        tracing::debug!(url = %request.url, "Unauthorized, renewing credentials");
        let mut retry = request;
        match renewer.renew().await {
            Ok(Some(token)) => {
                retry.set_header(AUTHORIZATION, format!("Bearer {token}"))
            }
            // Nothing new to attach. The request is retried as it was.
            Ok(None) => {}
            Err(error) => return Err(Failure::Rejected(error)),
        }

        // A retried request never triggers another renewal.
        self.dispatch(retry).await.map(|response| response.body)
    }

    fn prepare(&self, mut request: HttpRequest) -> HttpRequest {
        request.url = self.config.resolve_url(&request.url);
        for (name, value) in &self.config.headers {
            if request.header_value(name).is_none() {
                request.set_header(name, value);
            }
        }
        if request.timeout.is_none() {
            request.timeout = self.config.timeout;
        }

        let interceptors = self.request_interceptors.borrow().clone();
        for interceptor in &interceptors {
            interceptor(&mut request);
        }
        request
    }

    async fn dispatch(
        &self,
        request: HttpRequest,
    ) -> Result<HttpResponse, Failure> {
        tracing::debug!(method = %request.method, url = %request.url, "Sending request");
        let response = self.transport.send(request).await?;
        // An error body is a failure whatever the status.
        if response.is_success() && !is_error_body(&response.body) {
            Ok(response)
        } else {
            Err(Failure::Status(response))
        }
    }

    fn report(&self, error: ResultError) -> ResultError {
        tracing::debug!(code = %error.code, "Request failed: {}", error.message);
        if !error.is_unauthorized() {
            let sink = self.error_sink.borrow().clone();
            if let Some(sink) = sink {
                sink(&error);
            }
        }
        error
    }
}

fn is_unauthorized(response: &HttpResponse) -> bool {
    response.status == StatusCode::UNAUTHORIZED
        || response
            .body
            .get("code")
            .and_then(Value::as_str)
            .is_some_and(|code| {
                code == codes::UNAUTHORIZED && is_error_body(&response.body)
            })
}

/// Map a failure onto the error taxonomy.
fn normalize(failure: Failure) -> ResultError {
    match failure {
        Failure::Transport(error) => {
            let (code, message) = match &error {
                TransportError::Timeout => (codes::TIMEOUT, "Timeout error"),
                TransportError::Network(_) => {
                    (codes::NETWORK, "Network error")
                }
                TransportError::Other(message) => {
                    (codes::UNKNOWN, message.as_str())
                }
            };
            let message = message.to_string();
            make_error(code, message, ErrorDetails::cause(error))
        }
        Failure::Status(response) => {
            let message = format!(
                "Request failed with status code {}",
                response.status.as_u16()
            );
            let code = if response.status == StatusCode::UNAUTHORIZED {
                codes::UNAUTHORIZED
            } else {
                codes::UNKNOWN
            };

            if response.body.is_null() {
                return make_error(code, message, ErrorDetails::default());
            }
            // Error bodies from the server are passed through verbatim.
            match decode_body::<Value>(response.body) {
                Err(error) => error,
                Ok(body) => {
                    make_error(code, message, ErrorDetails::payload(body))
                }
            }
        }
        Failure::Rejected(error) => error,
    }
}
