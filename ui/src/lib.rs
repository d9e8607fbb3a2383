//! Yew bindings for the `client` crate.
//!
//! Wrap the application in an [`ApiProvider`], then reach the clients
//! through the hooks:
//!
//! ```rust,ignore
//! async fn get_user(scope: Rc<RequestScope>, id: u64) -> ApiResult<User> {
//!     scope.get(&format!("/users/{id}")).await
//! }
//!
//! #[function_component]
//! fn Profile(props: &ProfileProps) -> Html {
//!     let get_user = use_api(true, get_user);
//!     let user = use_fetch(get_user, FetchOptions::new(props.id));
//!     user.render("profile", |user, _, _| html! { <h1>{&user.name}</h1> })
//! }
//! ```

pub mod contexts;
pub mod hooks;
mod logs;

pub use contexts::{ApiProvider, use_api_context};
pub use hooks::{
    FetchHookReturn, use_api, use_api_request, use_auth, use_client,
    use_fetch, use_request, use_session,
};
pub use logs::{init_logging, init_logging_with};
