use client::payloads::{ApiResult, codes};
use client::{Caller, Fetch, FetchOptions, RequestOptions, RequestScope, bind};
use reqwest::{Method, StatusCode};
use serde_json::{Value, json};
use std::rc::Rc;
use test_helpers::{TestApp, error_body, spawn_app};

fn get_item(app: &TestApp) -> Caller<u32, Value> {
    let scope = Rc::new(app.context.request(RequestOptions::default()));
    bind(scope, |scope: Rc<RequestScope>, id: u32| async move {
        scope.get::<Value>(&format!("/items/{id}")).await
    })
}

async fn drive(call: Option<impl Future<Output = ApiResult<Value>>>) {
    if let Some(call) = call {
        let _ = call.await;
    }
}

#[tokio::test]
async fn first_fetch_loads_data() -> anyhow::Result<()> {
    let app = spawn_app();
    app.transport
        .on_get_json(&app.url("/items/1"), json!({"foo": "bar"}));
    let fetch = Fetch::new(get_item(&app), FetchOptions::new(1));

    assert!(fetch.loading());
    assert_eq!(fetch.data(), None);

    drive(fetch.sync()).await;

    let state = fetch.state();
    assert_eq!(state.data, Some(json!({"foo": "bar"})));
    assert_eq!(state.error, None);
    assert_eq!(state.version, 1);
    assert!(!state.loading);
    assert!(!state.refetching);
    Ok(())
}

#[tokio::test]
async fn failed_fetch_sets_error() -> anyhow::Result<()> {
    let app = spawn_app();
    app.transport.on_status(
        Method::GET,
        &app.url("/items/1"),
        StatusCode::INTERNAL_SERVER_ERROR,
        error_body(codes::UNKNOWN, "Internal server error"),
    );
    let fetch = Fetch::new(get_item(&app), FetchOptions::new(1));

    drive(fetch.sync()).await;

    let state = fetch.state();
    assert_eq!(state.data, None);
    let error = state.error.expect("fetch should record the error");
    assert_eq!(error.code, codes::UNKNOWN);
    assert_eq!(error.message, "Internal server error");
    assert_eq!(state.version, 0);
    assert!(!state.loading);
    Ok(())
}

#[tokio::test]
async fn skipped_fetch_waits_for_refetch() -> anyhow::Result<()> {
    let app = spawn_app();
    app.transport.on_get_json(&app.url("/items/1"), json!("one"));
    let fetch = Fetch::new(get_item(&app), FetchOptions::new(1).skip(true));

    assert!(!fetch.loading());
    assert!(fetch.sync().is_none());
    assert!(app.transport.requests().is_empty());

    fetch.refetch().await?;

    assert_eq!(fetch.data(), Some(json!("one")));
    assert_eq!(app.transport.requests().len(), 1);
    Ok(())
}

#[tokio::test]
async fn changing_args_refetches() -> anyhow::Result<()> {
    let app = spawn_app();
    app.transport.on_get_json(&app.url("/items/1"), json!("one"));
    app.transport.on_get_json(&app.url("/items/2"), json!("two"));
    let fetch = Fetch::new(get_item(&app), FetchOptions::new(1));

    drive(fetch.sync()).await;
    fetch.set_args(1);
    assert!(fetch.sync().is_none());

    fetch.set_args(2);
    drive(fetch.sync()).await;

    assert_eq!(fetch.data(), Some(json!("two")));
    assert_eq!(fetch.version(), 2);
    Ok(())
}

#[tokio::test]
async fn superseded_fetch_is_ignored() -> anyhow::Result<()> {
    let app = spawn_app();
    app.transport.on_get_json(&app.url("/items/1"), json!("one"));
    let fetch = Fetch::new(get_item(&app), FetchOptions::new(1));

    // Both calls go through one scope, so the second cancels the first.
    let (first, second) = futures::join!(fetch.refetch(), fetch.refetch());

    assert_eq!(first.unwrap_err().code, codes::CANCELED);
    assert_eq!(second?, json!("one"));
    let state = fetch.state();
    assert_eq!(state.error, None);
    assert_eq!(state.version, 1);
    assert!(!state.loading);
    assert!(!state.refetching);
    Ok(())
}
