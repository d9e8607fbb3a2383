use client::{ApiContext, AuthSession, SessionSnapshot};
use yew::prelude::*;

#[derive(Properties, PartialEq)]
pub struct ApiProviderProps {
    pub context: ApiContext,
    pub children: Children,
}

/// Shares an [`ApiContext`] with every descendant. When the context has
/// auth configured, the current [`SessionSnapshot`] is shared as well and
/// descendants re-render as the session changes.
#[function_component]
pub fn ApiProvider(props: &ApiProviderProps) -> Html {
    let snapshot =
        use_state(|| props.context.session().map(AuthSession::snapshot));

    {
        let snapshot = snapshot.clone();
        use_effect_with(props.context.clone(), move |context| {
            let subscription = context.session().map(|session| {
                snapshot.set(Some(session.snapshot()));
                let snapshot = snapshot.clone();
                session.subscribe(move |next| snapshot.set(Some(next.clone())))
            });
            move || drop(subscription)
        });
    }

    let content = html! {
        <ContextProvider<ApiContext> context={props.context.clone()}>
            {props.children.clone()}
        </ContextProvider<ApiContext>>
    };

    match (*snapshot).clone() {
        Some(snapshot) => html! {
            <ContextProvider<SessionSnapshot> context={snapshot}>
                {content}
            </ContextProvider<SessionSnapshot>>
        },
        None => content,
    }
}

#[hook]
pub fn use_api_context() -> ApiContext {
    use_context::<ApiContext>()
        .expect("use_api_context must be used within an ApiProvider")
}
