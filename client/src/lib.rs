//! Data fetching and authentication sessions on top of an HTTP transport.
//!
//! - [`RequestScope`]: issues requests, one live request per consumer,
//!   outcomes normalized to [`ApiResult`](payloads::ApiResult)
//! - [`Fetch`]: reactive loading/data/error state for one call site
//! - [`AuthSession`]: bearer tokens and single-flight token renewal
//! - [`ApiContext`]: the clients and session shared by an application

pub mod api;
pub mod auth;
pub mod config;
pub mod fetch;
pub mod http_client;
mod notify;
pub mod provider;
pub mod scope;
pub mod telemetry;
pub mod token;
pub mod transport;

pub use api::{Caller, bind, caller};
pub use auth::{AuthConfig, AuthSession, SessionSnapshot, SessionStatus};
pub use config::ClientConfig;
pub use fetch::{Fetch, FetchOptions, FetchState};
pub use http_client::{ErrorSink, HttpClient};
pub use notify::Subscription;
pub use payloads;
pub use provider::{ApiContext, ProviderOptions};
pub use scope::{CancelRef, RequestOptions, RequestScope};
pub use transport::{
    HttpRequest, HttpResponse, ReqwestTransport, Transport, TransportError,
};
