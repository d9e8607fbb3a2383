use client::{HttpClient, RequestOptions, RequestScope};
use std::rc::Rc;
use yew::prelude::*;

use crate::contexts::use_api_context;

/// A request scope over the plain client, disposed when the component
/// unmounts or `options` change.
#[hook]
pub fn use_request(options: RequestOptions) -> Rc<RequestScope> {
    use_scope(false, options)
}

/// Like [`use_request`], over the authenticated client.
#[hook]
pub fn use_api_request(options: RequestOptions) -> Rc<RequestScope> {
    use_scope(true, options)
}

/// The authenticated client if `auth`, otherwise the plain one.
#[hook]
pub fn use_client(auth: bool) -> Rc<HttpClient> {
    use_api_context().client(auth)
}

#[hook]
pub(super) fn use_scope(
    auth: bool,
    options: RequestOptions,
) -> Rc<RequestScope> {
    let context = use_api_context();
    let deps = (context, auth, options);

    let scope = use_memo(deps.clone(), |(context, auth, options)| {
        RequestScope::new(context.client(*auth), options.clone())
    });

    {
        let scope = scope.clone();
        use_effect_with(deps, move |_| move || scope.dispose());
    }

    scope
}
