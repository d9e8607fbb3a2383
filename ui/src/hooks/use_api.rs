use client::payloads::ApiResult;
use client::{Caller, RequestOptions, RequestScope, bind};
use std::future::Future;
use std::rc::Rc;
use yew::prelude::*;

use super::use_request::use_scope;
use crate::contexts::use_api_context;

/// Bind `endpoint` to a request scope owned by the component.
///
/// The returned caller keeps its identity across renders, so handing it
/// to [`use_fetch`](super::use_fetch) doesn't re-issue the call on every
/// render.
#[hook]
pub fn use_api<A, R, F, Fut>(auth: bool, endpoint: F) -> Caller<A, R>
where
    A: 'static,
    R: 'static,
    F: Fn(Rc<RequestScope>, A) -> Fut + 'static,
    Fut: Future<Output = ApiResult<R>> + 'static,
{
    let context = use_api_context();
    let scope = use_scope(auth, RequestOptions::default());
    let caller = use_memo((context, auth), move |_| bind(scope, endpoint));
    (*caller).clone()
}
