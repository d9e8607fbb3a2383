mod use_api;
mod use_auth;
mod use_fetch;
mod use_request;

pub use use_api::use_api;
pub use use_auth::{use_auth, use_session};
pub use use_fetch::{FetchHookReturn, use_fetch};
pub use use_request::{use_api_request, use_client, use_request};
