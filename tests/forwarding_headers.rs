//! Header contract between clients, the proxy and upstreams.

use axum::http::StatusCode;

mod common;

async fn echo(request: reqwest::RequestBuilder) -> String {
    let res = request.send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    res.text().await.unwrap()
}

#[tokio::test]
async fn test_user_id_is_propagated() {
    let upstream = common::start_echo_backend().await;
    let proxy = common::start_proxy(common::proxy_config(&[upstream])).await;

    let head = echo(common::client().get(proxy.url("/products")).header("X-User-ID", "abc123")).await;
    assert_eq!(common::echoed_header(&head, "x-user-id"), vec!["abc123"]);
}

#[tokio::test]
async fn test_missing_user_id_is_not_synthesized() {
    let upstream = common::start_echo_backend().await;
    let proxy = common::start_proxy(common::proxy_config(&[upstream])).await;

    let head = echo(common::client().get(proxy.url("/products"))).await;
    assert!(common::echoed_header(&head, "x-user-id").is_empty());
}

#[tokio::test]
async fn test_real_ip_overrides_client_value() {
    let upstream = common::start_echo_backend().await;
    let proxy = common::start_proxy(common::proxy_config(&[upstream])).await;

    let head = echo(common::client().get(proxy.url("/")).header("X-Real-IP", "6.6.6.6")).await;
    assert_eq!(common::echoed_header(&head, "x-real-ip"), vec!["127.0.0.1"]);
}

#[tokio::test]
async fn test_host_and_other_headers_pass_through() {
    let upstream = common::start_echo_backend().await;
    let proxy = common::start_proxy(common::proxy_config(&[upstream])).await;

    let head = echo(
        common::client()
            .get(proxy.url("/"))
            .header("Host", "shop.local")
            .header("Accept", "application/json")
            .header("X-Custom", "kept"),
    )
    .await;

    assert_eq!(common::echoed_header(&head, "host"), vec!["shop.local"]);
    assert_eq!(common::echoed_header(&head, "accept"), vec!["application/json"]);
    assert_eq!(common::echoed_header(&head, "x-custom"), vec!["kept"]);
}

#[tokio::test]
async fn test_method_path_and_body_are_forwarded_verbatim() {
    let upstream = common::start_echo_backend().await;
    let proxy = common::start_proxy(common::proxy_config(&[upstream])).await;

    let echoed = echo(
        common::client()
            .post(proxy.url("/cart?item=test"))
            .header("Content-Type", "application/json")
            .body(r#"{"item":"test"}"#),
    )
    .await;

    assert!(echoed.starts_with("POST /cart?item=test HTTP/1.1\r\n"), "got: {echoed}");
    assert!(echoed.ends_with(r#"{"item":"test"}"#));
    assert_eq!(common::echoed_header(&echoed, "content-length"), vec!["15"]);
}
