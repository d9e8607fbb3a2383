use futures::future::LocalBoxFuture;
use payloads::ApiResult;
use serde_json::Value;
use std::future::Future;
use std::rc::Rc;

use crate::scope::RequestScope;

/// An async call taking its arguments as one value.
///
/// Callers are compared by identity: cloning the `Rc` keeps it the same
/// caller, wrapping a new closure makes a new one.
pub type Caller<A, R, P = Value> =
    Rc<dyn Fn(A) -> LocalBoxFuture<'static, ApiResult<R, P>>>;

pub fn caller<A, R, P, F, Fut>(call: F) -> Caller<A, R, P>
where
    F: Fn(A) -> Fut + 'static,
    Fut: Future<Output = ApiResult<R, P>> + 'static,
{
    Rc::new(move |args| Box::pin(call(args)))
}

/// Bind an endpoint function to a request scope.
///
/// # Example
///
/// ```rust,ignore
/// async fn get_user(
///     scope: Rc<RequestScope>,
///     user_id: String,
/// ) -> ApiResult<User> {
///     scope.get(&format!("/users/{user_id}")).await
/// }
///
/// let get_user = bind(scope, get_user);
/// ```
pub fn bind<A, R, F, Fut>(scope: Rc<RequestScope>, endpoint: F) -> Caller<A, R>
where
    F: Fn(Rc<RequestScope>, A) -> Fut + 'static,
    Fut: Future<Output = ApiResult<R>> + 'static,
{
    caller(move |args| endpoint(scope.clone(), args))
}
