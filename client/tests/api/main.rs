mod auth;
mod fetch;
mod transport;

use client::RequestOptions;
use serde_json::{Value, json};
use test_helpers::spawn_app;

#[tokio::test]
async fn get_json() -> anyhow::Result<()> {
    let app = spawn_app();
    app.transport
        .on_get_json(&app.url("/foo"), json!({"foo": "bar"}));

    let scope = app.context.request(RequestOptions::default());
    let body: Value = scope.get("/foo").await?;

    assert_eq!(body, json!({"foo": "bar"}));
    Ok(())
}
