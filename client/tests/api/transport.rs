use client::payloads::codes;
use client::{HttpClient, HttpRequest, ReqwestTransport};
use std::rc::Rc;
use test_helpers::{assert_error_code, unreachable_config};

#[tokio::test]
async fn refused_connection_is_a_network_error() -> anyhow::Result<()> {
    let client = HttpClient::new(
        Rc::new(ReqwestTransport::default()),
        unreachable_config(),
    );

    let result = client.request(HttpRequest::get("/anything")).await;

    assert_error_code(&result, codes::NETWORK);
    assert_eq!(result.unwrap_err().message, "Network error");
    Ok(())
}
