use client::payloads::ResultError;
use client::{Caller, Fetch, FetchOptions};
use yew::prelude::*;

/// What a component renders from a [`Fetch`].
pub struct FetchHookReturn<S> {
    pub data: Option<S>,
    pub error: Option<ResultError>,
    /// True until the first call settles.
    pub loading: bool,
    /// True while the latest call is outstanding.
    pub refetching: bool,
    pub version: u64,
    pub refetch: Callback<()>,
    /// Overwrite the data, e.g. after a mutation.
    pub set_data: Callback<Option<S>>,
}

impl<S> FetchHookReturn<S> {
    /// Render based on fetch state with contextual loading/error messages.
    ///
    /// - No data + loading: "Loading {context}..."
    /// - No data + error: "Error loading {context}: ..."
    /// - Has data: `render_fn(data, refetching, error)`, where `error` is
    ///   from a failed refetch and the previous data is still shown
    pub fn render<F>(&self, context: &str, render_fn: F) -> Html
    where
        F: Fn(&S, bool, Option<&ResultError>) -> Html,
    {
        match self.data.as_ref() {
            Some(data) => render_fn(data, self.refetching, self.error.as_ref()),
            None if self.loading => html! {
                <div class="text-center py-12">
                    <p class="text-neutral-600 dark:text-neutral-400">
                        {format!("Loading {}...", context)}
                    </p>
                </div>
            },
            None => match &self.error {
                Some(error) => html! {
                    <div class="p-4 rounded-md bg-red-50 \
                               dark:bg-red-900/20 border \
                               border-red-200 dark:border-red-800">
                        <p class="text-sm text-red-700 \
                                  dark:text-red-400">
                            {format!("Error loading {}: {}", context, error.message)}
                        </p>
                    </div>
                },
                None => html! {
                    <div class="text-center py-12">
                        <p class="text-neutral-600 dark:text-neutral-400">
                            {format!("No {} found", context)}
                        </p>
                    </div>
                },
            },
        }
    }
}

/// Fetch state for `caller`, re-issuing the call whenever the caller, the
/// args, `skip` or `refresh_version` change.
///
/// # Example
///
/// ```rust,ignore
/// #[hook]
/// pub fn use_user(user_id: UserId) -> FetchHookReturn<User> {
///     let get_user = use_api(true, endpoints::get_user);
///     use_fetch(get_user, FetchOptions::new(user_id))
/// }
/// ```
#[hook]
pub fn use_fetch<A, R, S>(
    caller: Caller<A, R>,
    options: FetchOptions<A, R, S>,
) -> FetchHookReturn<S>
where
    A: Clone + PartialEq + 'static,
    R: Clone + 'static,
    S: Clone + 'static,
{
    let fetch = {
        let caller = caller.clone();
        let options = options.clone();
        use_memo((), move |_| Fetch::new(caller, options))
    };
    fetch.set_caller(caller);
    fetch.set_options(options);

    let trigger = use_force_update();
    {
        let fetch = (*fetch).clone();
        use_effect_with((), move |_| {
            let subscription =
                fetch.subscribe(move |_| trigger.force_update());
            move || drop(subscription)
        });
    }

    // Runs after every render; only issues a call when an input changed.
    {
        let fetch = (*fetch).clone();
        use_effect(move || {
            if let Some(call) = fetch.sync() {
                yew::platform::spawn_local(async move {
                    let _ = call.await;
                });
            }
        });
    }

    let refetch = {
        let fetch = (*fetch).clone();
        Callback::from(move |_| {
            let call = fetch.refetch();
            yew::platform::spawn_local(async move {
                let _ = call.await;
            });
        })
    };
    let set_data = {
        let fetch = (*fetch).clone();
        Callback::from(move |data: Option<S>| fetch.set_data(|_| data))
    };

    let state = fetch.state();
    FetchHookReturn {
        data: state.data,
        error: state.error,
        loading: state.loading,
        refetching: state.refetching,
        version: state.version,
        refetch,
        set_data,
    }
}
