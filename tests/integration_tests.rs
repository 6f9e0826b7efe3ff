//! Integration tests using wiremock to simulate HTTP servers.

use hookfetch::hooks::from_fn;
use hookfetch::query::{QueryMap, QuerySerializer};
use hookfetch::{
    AbortController, ErrorKind, Fetch, FetchContext, FetchOptions, RequestBody, ResponseData,
    ResponseType, RetryDelay,
};
use http::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::matchers::{body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct TestData {
    id: u32,
    name: String,
}

fn client(server: &MockServer) -> Fetch {
    Fetch::new().create(FetchOptions::new().base_url(server.uri()))
}

fn echo_body(req: &Request) -> ResponseTemplate {
    let content_type = req
        .headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    ResponseTemplate::new(200).set_body_raw(req.body.clone(), content_type.as_str())
}

#[tokio::test]
async fn test_ok_text() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&mock_server)
        .await;

    let data = client(&mock_server)
        .fetch("/ok", FetchOptions::new())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(data.as_text(), Some("ok"));
}

#[tokio::test]
async fn test_json_body_round_trip() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/echo"))
        .and(header("content-type", "application/json"))
        .and(header("accept", "application/json"))
        .respond_with(echo_body)
        .mount(&mock_server)
        .await;

    let sent = TestData {
        id: 7,
        name: "Alice".to_string(),
    };
    let received: TestData = client(&mock_server)
        .json(
            "/echo",
            FetchOptions::new().method(Method::POST).json(&sent).unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(received, sent);
}

#[tokio::test]
async fn test_typed_json_mismatch_is_parse_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "unexpected": true })))
        .mount(&mock_server)
        .await;

    let err = client(&mock_server)
        .json::<TestData>("/user", FetchOptions::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Parse);
    assert_eq!(err.status().map(|s| s.as_u16()), Some(200));
}

#[tokio::test]
async fn test_invalid_json_falls_back_to_text() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("{not json", "application/json"))
        .mount(&mock_server)
        .await;

    let data = client(&mock_server)
        .fetch("/broken", FetchOptions::new())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(data.as_text(), Some("{not json"));
}

#[tokio::test]
async fn test_binary_response_is_blob() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/binary"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0u8, 1, 2, 255], "application/octet-stream"))
        .mount(&mock_server)
        .await;

    let fetch = client(&mock_server);
    match fetch.fetch("/binary", FetchOptions::new()).await.unwrap() {
        Some(ResponseData::Blob(blob)) => {
            assert_eq!(blob.bytes.as_ref(), &[0u8, 1, 2, 255]);
            assert_eq!(blob.content_type.as_deref(), Some("application/octet-stream"));
        }
        other => panic!("Expected Blob, got {:?}", other),
    }

    let data = fetch
        .fetch("/binary", FetchOptions::new().response_type(ResponseType::ArrayBuffer))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(data.as_bytes(), Some(&[0u8, 1, 2, 255][..]));
}

#[tokio::test]
async fn test_binary_and_form_request_bodies() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/form"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string("name=Alice&tags=a&tags=b"))
        .respond_with(ResponseTemplate::new(200).set_body_string("form"))
        .mount(&mock_server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/upload"))
        .respond_with(echo_body)
        .mount(&mock_server)
        .await;

    let fetch = client(&mock_server);

    let form = RequestBody::form([("name", json!("Alice")), ("tags", json!(["a", "b"]))]);
    let data = fetch
        .fetch("/form", FetchOptions::new().method(Method::POST).body(form))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(data.as_text(), Some("form"));

    let data = fetch
        .fetch(
            "/upload",
            FetchOptions::new()
                .method(Method::PUT)
                .header("content-type", "application/octet-stream")
                .unwrap()
                .body(vec![1u8, 2, 3])
                .response_type(ResponseType::ArrayBuffer),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(data.as_bytes(), Some(&[1u8, 2, 3][..]));
}

#[tokio::test]
async fn test_query_merge_order() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/echo"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&mock_server)
        .await;

    client(&mock_server)
        .fetch(
            "/echo?z=0",
            FetchOptions::new().param("b", 2).param("c", 3).query("a", 1),
        )
        .await
        .unwrap();

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests[0].url.query(), Some("z=0&b=2&c=3&a=1"));
}

#[tokio::test]
async fn test_query_overrides_params_and_existing_keys() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/echo"))
        .and(query_param("a", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&mock_server)
        .await;

    client(&mock_server)
        .fetch(
            "/echo?a=1",
            FetchOptions::new().param("a", 2).query("a", 3),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_custom_query_serializer() {
    struct Semicolons;

    impl QuerySerializer for Semicolons {
        fn stringify(&self, query: &QueryMap) -> String {
            query
                .iter()
                .map(|(k, v)| format!("{}:{}", k, v))
                .collect::<Vec<_>>()
                .join(";")
        }

        fn parse(&self, _query: &str) -> QueryMap {
            QueryMap::new()
        }
    }

    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/echo"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&mock_server)
        .await;

    client(&mock_server)
        .fetch(
            "/echo",
            FetchOptions::new()
                .query("a", 1)
                .query("b", 2)
                .query_serializer(Semicolons),
        )
        .await
        .unwrap();

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests[0].url.query(), Some("a:1;b:2"));
}

#[tokio::test]
async fn test_http_error_carries_parsed_data() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/404"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "error": "not found" })))
        .mount(&mock_server)
        .await;

    let err = client(&mock_server)
        .fetch("/404", FetchOptions::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Http);
    assert_eq!(err.status().map(|s| s.as_u16()), Some(404));
    assert_eq!(err.status_text(), Some("Not Found"));
    assert_eq!(
        err.data().and_then(|d| d.as_json()),
        Some(&json!({ "error": "not found" }))
    );
    assert_eq!(
        err.to_string(),
        format!("[GET] \"{}/404\": 404 Not Found", mock_server.uri())
    );
    assert_eq!(err.response().map(|r| r.attempts), Some(1));
}

#[tokio::test]
async fn test_ignore_response_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/403"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden"))
        .mount(&mock_server)
        .await;

    let response = client(&mock_server)
        .raw("/403", FetchOptions::new().ignore_response_error(true))
        .await
        .unwrap();

    assert_eq!(response.status.as_u16(), 403);
    assert!(!response.ok());
    assert_eq!(response.data.as_ref().and_then(|d| d.as_text()), Some("Forbidden"));
}

#[tokio::test]
async fn test_no_content_returns_none() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/204"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;

    Mock::given(method("HEAD"))
        .and(path("/head"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-type", "application/json"))
        .mount(&mock_server)
        .await;

    let fetch = client(&mock_server);

    assert!(fetch.fetch("/204", FetchOptions::new()).await.unwrap().is_none());
    assert!(fetch
        .fetch("/head", FetchOptions::new().method(Method::HEAD))
        .await
        .unwrap()
        .is_none());

    let unit: Option<TestData> = fetch.json("/204", FetchOptions::new()).await.unwrap();
    assert!(unit.is_none());
}

#[tokio::test]
async fn test_no_content_ignores_forced_response_type() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/204"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/205"))
        .respond_with(ResponseTemplate::new(205))
        .mount(&mock_server)
        .await;

    Mock::given(method("HEAD"))
        .and(path("/head"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-type", "text/plain"))
        .mount(&mock_server)
        .await;

    let fetch = client(&mock_server);

    assert!(fetch
        .fetch("/204", FetchOptions::new().response_type(ResponseType::Text))
        .await
        .unwrap()
        .is_none());
    assert!(fetch
        .fetch("/205", FetchOptions::new().response_type(ResponseType::Text))
        .await
        .unwrap()
        .is_none());
    assert!(fetch
        .fetch(
            "/head",
            FetchOptions::new()
                .method(Method::HEAD)
                .response_type(ResponseType::ArrayBuffer),
        )
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_has_body_override() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/text"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ignored"))
        .mount(&mock_server)
        .await;

    let data = client(&mock_server)
        .fetch("/text", FetchOptions::new().has_body(|_: &FetchContext| false))
        .await
        .unwrap();

    assert!(data.is_none());
}

#[tokio::test]
async fn test_retry_on_retryable_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/408"))
        .respond_with(ResponseTemplate::new(408).set_body_string("Request Timeout"))
        .mount(&mock_server)
        .await;

    let err = client(&mock_server)
        .fetch("/408", FetchOptions::new().retry(2))
        .await
        .unwrap_err();

    assert_eq!(err.status().map(|s| s.as_u16()), Some(408));
    assert_eq!(err.response().map(|r| r.attempts), Some(3));
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_retry_until_success() {
    let mock_server = MockServer::start().await;
    let attempt_count = Arc::new(AtomicUsize::new(0));
    let attempt_count_clone = attempt_count.clone();

    // First two requests fail with 503, third succeeds
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(move |_req: &Request| {
            let count = attempt_count_clone.fetch_add(1, Ordering::SeqCst);
            if count < 2 {
                ResponseTemplate::new(503).set_body_string("Unavailable")
            } else {
                ResponseTemplate::new(200).set_body_json(json!({ "id": 1, "name": "Test" }))
            }
        })
        .mount(&mock_server)
        .await;

    let response = client(&mock_server)
        .raw(
            "/flaky",
            FetchOptions::new()
                .retry(3)
                .retry_delay(Duration::from_millis(10)),
        )
        .await
        .unwrap();

    assert_eq!(response.attempts, 3);
    assert!(response.was_retried());
    assert_eq!(attempt_count.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_non_retryable_status_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/404"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let err = client(&mock_server)
        .fetch("/404", FetchOptions::new().retry(3))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Http);
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_default_retry_budget_by_method() {
    let mock_server = MockServer::start().await;

    Mock::given(path("/500"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let fetch = client(&mock_server);

    fetch.fetch("/500", FetchOptions::new()).await.unwrap_err();
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 2);

    fetch
        .fetch("/500", FetchOptions::new().method(Method::POST))
        .await
        .unwrap_err();
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_custom_retry_status_codes() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/404"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    client(&mock_server)
        .fetch(
            "/404",
            FetchOptions::new().retry(1).retry_status_codes([404]).unwrap(),
        )
        .await
        .unwrap_err();

    assert_eq!(mock_server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_retry_delay_is_applied() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/408"))
        .respond_with(ResponseTemplate::new(408))
        .mount(&mock_server)
        .await;

    let fetch = client(&mock_server);

    let slow = fetch.fetch(
        "/408",
        FetchOptions::new()
            .retry(2)
            .retry_delay(Duration::from_millis(100)),
    );
    let fast = fetch.fetch(
        "/408",
        FetchOptions::new()
            .retry(2)
            .retry_delay(Duration::from_millis(1)),
    );

    let winner = tokio::select! {
        _ = slow => "slow",
        _ = fast => "fast",
    };
    assert_eq!(winner, "fast");
}

#[tokio::test]
async fn test_retry_after_header_delays_retry() {
    let mock_server = MockServer::start().await;
    let attempt_count = Arc::new(AtomicUsize::new(0));
    let attempt_count_clone = attempt_count.clone();

    // First request returns 429 with Retry-After, second succeeds
    Mock::given(method("GET"))
        .and(path("/limited"))
        .respond_with(move |_req: &Request| {
            let count = attempt_count_clone.fetch_add(1, Ordering::SeqCst);
            if count == 0 {
                ResponseTemplate::new(429)
                    .insert_header("retry-after", "1")
                    .set_body_string("Rate limited")
            } else {
                ResponseTemplate::new(200).set_body_string("ok")
            }
        })
        .mount(&mock_server)
        .await;

    let start = Instant::now();
    let response = client(&mock_server)
        .raw(
            "/limited",
            FetchOptions::new().retry(1).retry_delay(RetryDelay::RetryAfter {
                fallback: Duration::from_millis(10),
                max_wait: Duration::from_secs(5),
            }),
        )
        .await
        .unwrap();

    assert_eq!(response.attempts, 2);
    // Should have waited approximately 1 second
    assert!(start.elapsed() >= Duration::from_millis(900));
}

#[tokio::test]
async fn test_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&mock_server)
        .await;

    let err = client(&mock_server)
        .fetch(
            "/slow",
            FetchOptions::new()
                .timeout(Duration::from_millis(50))
                .no_retry(),
        )
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    assert!(err.response().is_none());
    assert!(err
        .to_string()
        .ends_with("<no response> The operation was aborted due to timeout"));
}

#[tokio::test]
async fn test_caller_abort_before_send() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let controller = AbortController::new();
    controller.abort();

    let err = client(&mock_server)
        .fetch("/ok", FetchOptions::new().signal(controller.signal()).retry(3))
        .await
        .unwrap_err();

    assert!(err.is_aborted());
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_nested_create_merges_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/headers"))
        .and(header("x-header-a", "1"))
        .and(header("x-header-b", "2"))
        .and(header("x-header-c", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_string("merged"))
        .mount(&mock_server)
        .await;

    let parent = Fetch::new().create(
        FetchOptions::new()
            .base_url(mock_server.uri())
            .header("x-header-a", "0")
            .unwrap()
            .header("x-header-b", "2")
            .unwrap(),
    );
    let child = parent.create(FetchOptions::new().header("X-Header-A", "1").unwrap());

    let data = child
        .fetch("/headers", FetchOptions::new().header("x-header-c", "3").unwrap())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(data.as_text(), Some("merged"));
    assert_eq!(child.defaults().get_base_url(), Some(mock_server.uri().as_str()));
}

#[tokio::test]
async fn test_merged_hooks_run_call_site_first() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&mock_server)
        .await;

    let order = Arc::new(std::sync::Mutex::new(Vec::new()));
    let record = |label: &'static str| {
        let order = order.clone();
        from_fn(move |_: &mut FetchContext| order.lock().unwrap().push(label))
    };

    let fetch = Fetch::new().create(
        FetchOptions::new()
            .base_url(mock_server.uri())
            .on_request(record("default request"))
            .on_response(record("default response")),
    );
    fetch
        .fetch(
            "/ok",
            FetchOptions::new()
                .on_request(record("call request"))
                .on_response(record("call response")),
        )
        .await
        .unwrap();

    assert_eq!(
        *order.lock().unwrap(),
        vec![
            "call request",
            "default request",
            "call response",
            "default response"
        ]
    );
}

#[tokio::test]
async fn test_request_hook_can_rewrite_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/auth"))
        .and(header("authorization", "Bearer token"))
        .respond_with(ResponseTemplate::new(200).set_body_string("authorized"))
        .mount(&mock_server)
        .await;

    let data = client(&mock_server)
        .fetch(
            "/auth",
            FetchOptions::new().on_request(from_fn(|ctx: &mut FetchContext| {
                ctx.options
                    .headers_mut()
                    .insert("authorization", "Bearer token".parse().unwrap());
            })),
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(data.as_text(), Some("authorized"));
}

#[tokio::test]
async fn test_hook_error_after_success_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&mock_server)
        .await;

    let err = client(&mock_server)
        .fetch(
            "/ok",
            FetchOptions::new()
                .retry(3)
                .on_response(from_fn(|ctx: &mut FetchContext| ctx.set_error("custom error"))),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Hook);
    assert!(err.to_string().ends_with(": 200 OK custom error"));
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_response_error_hook_sees_each_attempt() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/503"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let seen = Arc::new(AtomicUsize::new(0));
    let seen_clone = seen.clone();

    client(&mock_server)
        .fetch(
            "/503",
            FetchOptions::new()
                .retry(2)
                .on_response_error(from_fn(move |ctx: &mut FetchContext| {
                    assert_eq!(ctx.response.as_ref().map(|r| r.status.as_u16()), Some(503));
                    seen_clone.fetch_add(1, Ordering::SeqCst);
                })),
        )
        .await
        .unwrap_err();

    assert_eq!(seen.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_custom_parse_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "n": 1 })))
        .mount(&mock_server)
        .await;

    let data = client(&mock_server)
        .fetch(
            "/json",
            FetchOptions::new().parse_response(|text: &str| Ok(ResponseData::Text(text.to_uppercase()))),
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(data.as_text(), Some("{\"N\":1}"));
}
