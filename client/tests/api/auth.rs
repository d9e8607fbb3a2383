use client::payloads::codes;
use client::{ProviderOptions, RequestOptions, SessionStatus};
use reqwest::{Method, StatusCode};
use serde_json::{Value, json};
use std::cell::RefCell;
use std::rc::Rc;
use test_helpers::{
    REFRESH_URL, assert_error_code, make_jwt, spawn_auth_app,
    spawn_auth_app_with,
};

#[tokio::test]
async fn access_token_is_attached_and_decoded() -> anyhow::Result<()> {
    let app = spawn_auth_app(None);
    let token = make_jwt("user-1");
    app.on_protected_get("/me", &token, json!({"name": "Alice"}));

    app.session().set_access_token(Some(token.clone()))?;
    assert_eq!(app.session().user_id().as_deref(), Some("user-1"));
    assert_eq!(app.session().status(), SessionStatus::Authenticated);

    let scope = app.context.api_request(RequestOptions::default());
    let me: Value = scope.get("/me").await?;

    assert_eq!(me, json!({"name": "Alice"}));
    assert_eq!(app.renewal_count(), 0);
    Ok(())
}

#[tokio::test]
async fn plain_requests_carry_no_token() -> anyhow::Result<()> {
    let app = spawn_auth_app(None);
    app.transport.on_get_json(&app.url("/public"), json!("ok"));
    app.session().set_access_token(Some(make_jwt("user-1")))?;

    let scope = app.context.request(RequestOptions::default());
    scope.get::<Value>("/public").await?;

    assert_eq!(app.transport.requests()[0].bearer_token(), None);
    Ok(())
}

#[tokio::test]
async fn malformed_access_token_is_refused() -> anyhow::Result<()> {
    let app = spawn_auth_app(None);
    app.session().set_access_token(Some(make_jwt("user-1")))?;

    assert!(app.session().set_access_token(Some("opaque".into())).is_err());

    assert_eq!(app.session().user_id().as_deref(), Some("user-1"));
    Ok(())
}

#[tokio::test]
async fn unauthorized_request_renews_and_retries() -> anyhow::Result<()> {
    let app = spawn_auth_app(Some("refresh-1"));
    let token = make_jwt("user-7");
    app.on_refresh(&token, "refresh-2");
    app.on_protected_get("/me", &token, json!("me"));

    let scope = app.context.api_request(RequestOptions::default());
    let me: Value = scope.get("/me").await?;

    assert_eq!(me, json!("me"));
    assert_eq!(app.renewal_count(), 1);
    let renewal = &app.transport.requests_to(&app.url(REFRESH_URL))[0];
    assert_eq!(renewal.body, Some(json!({"refreshToken": "refresh-1"})));
    assert_eq!(app.session().access_token(), Some(token));
    assert_eq!(app.session().user_id().as_deref(), Some("user-7"));
    assert_eq!(
        app.stored_refresh_token.borrow().as_deref(),
        Some("refresh-2")
    );
    assert!(app.reported_codes().is_empty());
    Ok(())
}

#[tokio::test]
async fn concurrent_unauthorized_requests_share_one_renewal()
-> anyhow::Result<()> {
    let app = spawn_auth_app(Some("refresh-1"));
    let token = make_jwt("user-7");
    app.on_refresh(&token, "refresh-2");
    app.on_protected_get("/me", &token, json!("me"));
    app.on_protected_get("/settings", &token, json!("settings"));

    let first = app.context.api_request(RequestOptions::default());
    let second = app.context.api_request(RequestOptions::default());
    let (me, settings) = futures::join!(
        first.get::<Value>("/me"),
        second.get::<Value>("/settings"),
    );

    assert_eq!(me?, json!("me"));
    assert_eq!(settings?, json!("settings"));
    assert_eq!(app.renewal_count(), 1);

    let retries: Vec<_> = app
        .transport
        .requests()
        .into_iter()
        .filter(|request| request.bearer_token().is_some())
        .collect();
    assert_eq!(retries.len(), 2);
    assert!(
        retries
            .iter()
            .all(|request| request.bearer_token() == Some(token.as_str()))
    );
    Ok(())
}

#[tokio::test]
async fn retried_request_is_not_renewed_again() -> anyhow::Result<()> {
    let app = spawn_auth_app(Some("refresh-1"));
    app.on_refresh(&make_jwt("user-7"), "refresh-2");
    app.on_protected_get("/admin", "a-token-nobody-has", json!("secret"));

    let scope = app.context.api_request(RequestOptions::default());
    let result = scope.get::<Value>("/admin").await;

    assert_error_code(&result, codes::UNAUTHORIZED);
    assert_eq!(app.renewal_count(), 1);
    assert_eq!(app.transport.requests_to(&app.url("/admin")).len(), 2);
    // UNAUTHORIZED is never handed to on_error.
    assert!(app.reported_codes().is_empty());
    Ok(())
}

#[tokio::test]
async fn rejected_renewal_clears_session() -> anyhow::Result<()> {
    let app = spawn_auth_app(Some("refresh-1"));
    app.session().set_access_token(Some(make_jwt("user-7")))?;
    app.on_refresh_rejected();
    app.on_protected_get("/me", "never", json!("me"));

    let scope = app.context.api_request(RequestOptions::default());
    let result = scope.get::<Value>("/me").await;

    assert_error_code(&result, codes::UNAUTHORIZED);
    assert_eq!(result.unwrap_err().message, "Refresh token expired");
    assert_eq!(app.session().access_token(), None);
    assert_eq!(app.session().user_id(), None);
    assert!(!app.session().has_refresh_token());
    assert_eq!(*app.stored_refresh_token.borrow(), None);
    assert_eq!(app.session().status(), SessionStatus::Anonymous);
    // The original request is not retried.
    assert_eq!(app.transport.requests_to(&app.url("/me")).len(), 1);
    Ok(())
}

#[tokio::test]
async fn failed_renewal_retries_once_unchanged() -> anyhow::Result<()> {
    let app = spawn_auth_app(Some("refresh-1"));
    app.transport.on_status(
        Method::POST,
        &app.url(REFRESH_URL),
        StatusCode::SERVICE_UNAVAILABLE,
        Value::Null,
    );
    app.on_protected_get("/me", "never", json!("me"));

    let scope = app.context.api_request(RequestOptions::default());
    let result = scope.get::<Value>("/me").await;

    assert_error_code(&result, codes::UNAUTHORIZED);
    assert_eq!(app.transport.requests_to(&app.url("/me")).len(), 2);
    // The refresh token survives a renewal that failed for other reasons.
    assert!(app.session().has_refresh_token());
    assert_eq!(app.reported_codes(), vec![codes::UNKNOWN.to_string()]);
    Ok(())
}

#[tokio::test]
async fn renewal_without_stored_token_sends_no_body() -> anyhow::Result<()> {
    let app = spawn_auth_app(None);
    let token = make_jwt("cookie-user");
    app.on_refresh(&token, "refresh-2");

    let renewed = app.session().renew_tokens().await?;

    assert_eq!(renewed, Some(token));
    let renewal = &app.transport.requests_to(&app.url(REFRESH_URL))[0];
    assert_eq!(renewal.body, None);
    Ok(())
}

#[tokio::test]
async fn subscribers_observe_renewal() -> anyhow::Result<()> {
    let app = spawn_auth_app(Some("refresh-1"));
    let token = make_jwt("user-7");
    app.on_refresh(&token, "refresh-2");

    let statuses = Rc::new(RefCell::new(Vec::new()));
    let _subscription = {
        let statuses = statuses.clone();
        app.session()
            .subscribe(move |snapshot| statuses.borrow_mut().push(snapshot.status))
    };

    let renewed_with = Rc::new(RefCell::new(None));
    let seen = renewed_with.clone();
    app.session()
        .renew_tokens_with(move |token| *seen.borrow_mut() = Some(token.to_string()))
        .await?;

    let statuses = statuses.borrow();
    assert_eq!(statuses.first(), Some(&SessionStatus::Authenticating));
    assert_eq!(statuses.last(), Some(&SessionStatus::Authenticated));
    assert_eq!(*renewed_with.borrow(), Some(token));
    assert_eq!(app.session().snapshot().user_id.as_deref(), Some("user-7"));
    Ok(())
}

#[tokio::test]
async fn renewal_outlives_canceled_request() -> anyhow::Result<()> {
    let app = spawn_auth_app(Some("refresh-1"));
    let token = make_jwt("user-7");
    app.on_refresh(&token, "refresh-2");
    app.on_protected_get("/me", &token, json!("me"));

    let scope = app.context.api_request(RequestOptions::default());
    let mut call = Box::pin(scope.get::<Value>("/me"));
    while app.renewal_count() == 0 {
        assert!(futures::poll!(&mut call).is_pending());
    }
    assert_eq!(app.session().status(), SessionStatus::Authenticating);

    scope.dispose();

    assert_error_code(&call.await, codes::CANCELED);
    assert_eq!(app.session().status(), SessionStatus::Authenticated);
    assert_eq!(app.session().access_token(), Some(token));
    assert_eq!(
        app.stored_refresh_token.borrow().as_deref(),
        Some("refresh-2")
    );
    // Canceled, so the refused request is not retried.
    assert_eq!(app.transport.requests_to(&app.url("/me")).len(), 1);
    Ok(())
}

#[tokio::test]
async fn abandoned_renewal_does_not_block_the_next_one() -> anyhow::Result<()> {
    let app = spawn_auth_app(Some("refresh-1"));
    let token = make_jwt("user-7");
    app.on_refresh(&token, "refresh-2");
    app.on_protected_get("/me", &token, json!("me"));

    let scope = app.context.api_request(RequestOptions::default());
    let mut call = Box::pin(scope.get::<Value>("/me"));
    while app.renewal_count() == 0 {
        assert!(futures::poll!(&mut call).is_pending());
    }
    // Nothing awaits the renewal any more.
    drop(call);
    assert_eq!(app.session().status(), SessionStatus::Anonymous);

    let me: Value = scope.get("/me").await?;

    assert_eq!(me, json!("me"));
    assert_eq!(app.renewal_count(), 2);
    assert_eq!(app.session().status(), SessionStatus::Authenticated);
    Ok(())
}

#[tokio::test]
async fn post_initialize_interceptors_see_the_bearer_header()
-> anyhow::Result<()> {
    let options = ProviderOptions::default().post_initialize(|client| {
        client.add_request_interceptor(|request| {
            if request.bearer_token().is_some() {
                request.set_header("Authorization", "Custom override");
            }
        })
    });
    let app = spawn_auth_app_with(options, None);
    app.transport.on_get_json(&app.url("/me"), json!("me"));
    app.session().set_access_token(Some(make_jwt("user-1")))?;

    let scope = app.context.api_request(RequestOptions::default());
    scope.get::<Value>("/me").await?;

    assert_eq!(
        app.transport.requests()[0].header_value("authorization"),
        Some("Custom override")
    );
    Ok(())
}
