pub mod mock;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use client::payloads::{ApiResult, ResultError, codes};
use client::{
    ApiContext, AuthConfig, AuthSession, ClientConfig, ProviderOptions,
    telemetry,
};
use mock::MockTransport;
use reqwest::{Method, StatusCode};
use serde_json::{Value, json};
use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;
use tracing_log::LogTracer;
use tracing_subscriber::util::SubscriberInitExt;

pub const BASE_URL: &str = "http://api.test";
pub const REFRESH_URL: &str = "/auth/refresh";

pub struct TestApp {
    pub transport: Rc<MockTransport>,
    pub context: ApiContext,
    /// Every error handed to `on_error`.
    pub errors: Rc<RefCell<Vec<ResultError>>>,
    /// Backing storage for the refresh token callbacks.
    pub stored_refresh_token: Rc<RefCell<Option<String>>>,
}

impl TestApp {
    /// Absolute url of `path` as the transport sees it.
    pub fn url(&self, path: &str) -> String {
        format!("{BASE_URL}{path}")
    }

    pub fn session(&self) -> &AuthSession {
        self.context
            .session()
            .expect("Test app was spawned without auth")
    }

    pub fn reported_codes(&self) -> Vec<String> {
        self.errors
            .borrow()
            .iter()
            .map(|error| error.code.clone())
            .collect()
    }

    /// Answer the renewal endpoint with a new token pair.
    pub fn on_refresh(&self, access_token: &str, refresh_token: &str) {
        self.transport.on_status(
            Method::POST,
            &self.url(REFRESH_URL),
            StatusCode::OK,
            json!({
                "accessToken": access_token,
                "refreshToken": refresh_token,
            }),
        );
    }

    /// Refuse renewals as unauthorized.
    pub fn on_refresh_rejected(&self) {
        self.transport.on_status(
            Method::POST,
            &self.url(REFRESH_URL),
            StatusCode::UNAUTHORIZED,
            error_body(codes::UNAUTHORIZED, "Refresh token expired"),
        );
    }

    /// Answer `GET path` with 200 only when the request carries `token`,
    /// and 401 otherwise.
    pub fn on_protected_get(&self, path: &str, token: &str, body: Value) {
        let expected = token.to_string();
        self.transport.on(Method::GET, &self.url(path), move |request| {
            Ok(if request.bearer_token() == Some(expected.as_str()) {
                client::HttpResponse::ok(body.clone())
            } else {
                client::HttpResponse::new(StatusCode::UNAUTHORIZED, Value::Null)
            })
        });
    }

    /// Requests sent to the renewal endpoint so far.
    pub fn renewal_count(&self) -> usize {
        self.transport.requests_to(&self.url(REFRESH_URL)).len()
    }
}

fn init_logging() {
    let subscriber = telemetry::get_subscriber("error".into());
    let _ = LogTracer::init();
    let _ = subscriber.try_init();
}

fn spawn(
    options: ProviderOptions,
    stored_refresh_token: Rc<RefCell<Option<String>>>,
) -> TestApp {
    init_logging();

    let transport = MockTransport::new();
    let errors = Rc::new(RefCell::new(Vec::new()));

    let sink = errors.clone();
    let options = options.on_error(move |error: &ResultError| {
        sink.borrow_mut().push(error.clone())
    });
    let options = ProviderOptions {
        config: options.config.base_url(BASE_URL),
        ..options
    };

    TestApp {
        context: ApiContext::new(transport.clone(), options),
        transport,
        errors,
        stored_refresh_token,
    }
}

/// A context without auth.
pub fn spawn_app() -> TestApp {
    spawn_app_with(ProviderOptions::default())
}

pub fn spawn_app_with(options: ProviderOptions) -> TestApp {
    spawn(options, Rc::default())
}

/// A context with auth, its refresh token storage holding `stored`.
pub fn spawn_auth_app(stored: Option<&str>) -> TestApp {
    spawn_auth_app_with(ProviderOptions::default(), stored)
}

pub fn spawn_auth_app_with(
    options: ProviderOptions,
    stored: Option<&str>,
) -> TestApp {
    let storage = Rc::new(RefCell::new(stored.map(str::to_string)));

    let load = storage.clone();
    let save = storage.clone();
    let auth = AuthConfig::new(REFRESH_URL)
        .get_refresh_token(move || {
            let token = load.borrow().clone();
            async move {
                token.ok_or_else(|| anyhow::anyhow!("No refresh token stored"))
            }
        })
        .set_refresh_token(move |token| {
            *save.borrow_mut() = token;
            async {}
        });

    spawn(options.auth(auth), storage)
}

/// An unsigned JWT whose `sub` claim is `sub`.
pub fn make_jwt(sub: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none","typ":"JWT"}"#);
    let claims = URL_SAFE_NO_PAD.encode(json!({ "sub": sub }).to_string());
    format!("{header}.{claims}.signature")
}

/// An error body as the server sends it.
pub fn error_body(code: &str, message: &str) -> Value {
    json!({ "isError": true, "code": code, "message": message })
}

pub fn assert_error_code<T: Debug>(result: &ApiResult<T>, expected: &str) {
    match result {
        Err(error) => assert_eq!(error.code, expected, "{error:?}"),
        Ok(value) => panic!("Expected {expected} error, got {value:?}"),
    }
}

/// A client config pointing at nothing, for transport level tests.
pub fn unreachable_config() -> ClientConfig {
    ClientConfig::new().base_url("http://127.0.0.1:1")
}
