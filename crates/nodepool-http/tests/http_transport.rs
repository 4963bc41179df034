//! Integration tests for the HTTP transport and failover dispatch against
//! Wiremock servers.

use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use nodepool_core::{
    Client, ClientConfig, Connection, DispatchError, Method, Request, Transport, TransportError,
};
use nodepool_http::{default_registry, HttpTransport};

// ─── Helpers ──────────────────────────────────────────────────────────────────

/// A local address with nothing listening on it.
fn closed_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}

/// A node that accepts TCP connections and closes them without answering.
async fn hang_up_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            drop(socket);
        }
    });
    format!("http://127.0.0.1:{port}")
}

fn url_connection(url: &str) -> Connection {
    Connection::default().with_config("url", json!(url))
}

// ─── Transport ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn get_with_path_and_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/_cluster/health"))
        .and(query_param("level", "indices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "green" })))
        .expect(1)
        .mount(&server)
        .await;

    let transport = HttpTransport::http();
    let req = Request::new("_cluster/health", Method::Get).with_query("level", "indices");
    let resp = transport
        .execute(&url_connection(&server.uri()), &req)
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.data()["status"], "green");
    assert!(resp.query_time().is_some());
    assert_eq!(resp.transfer_info().method, Some(Method::Get));
    assert_eq!(resp.transfer_info().http_code, 200);
}

#[tokio::test]
async fn get_with_body_is_sent_as_post() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/idx/_search"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({ "query": { "match_all": {} } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "hits": { "total": 0 } })))
        .expect(1)
        .mount(&server)
        .await;

    let req = Request::new("/idx/_search", Method::Get)
        .with_json(json!({ "query": { "match_all": {} } }));
    let resp = HttpTransport::http()
        .execute(&url_connection(&server.uri()), &req)
        .await
        .unwrap();
    assert_eq!(resp.transfer_info().method, Some(Method::Post));
}

#[tokio::test]
async fn configured_headers_are_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("authorization", "Basic dXNlcjpwYXNz"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(1)
        .mount(&server)
        .await;

    let conn = url_connection(&server.uri())
        .with_config("headers", json!({ "Authorization": "Basic dXNlcjpwYXNz" }));
    let resp = HttpTransport::http()
        .execute(&conn, &Request::new("/", Method::Get))
        .await
        .unwrap();
    assert!(resp.is_ok());
}

#[tokio::test]
async fn error_status_is_a_response_not_a_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": { "type": "index_not_found_exception", "reason": "no such index [x]" },
            "status": 404
        })))
        .mount(&server)
        .await;

    let resp = HttpTransport::http()
        .execute(&url_connection(&server.uri()), &Request::new("/x", Method::Get))
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    assert!(resp.has_error());
}

#[tokio::test]
async fn refused_connection_is_a_node_failure() {
    let err = HttpTransport::http()
        .execute(&url_connection(&closed_url()), &Request::new("/", Method::Get))
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Connect(_)), "got {err:?}");
    assert!(err.is_node_failure());
}

#[tokio::test]
async fn dropped_exchange_is_a_node_failure() {
    let err = HttpTransport::http()
        .execute(&url_connection(&hang_up_url().await), &Request::new("/", Method::Get))
        .await
        .unwrap_err();
    assert!(err.is_node_failure(), "got {err:?}");
}

#[tokio::test]
async fn fails_over_from_node_that_hangs_up() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&server)
        .await;

    let config = ClientConfig::from_urls([hang_up_url().await, server.uri()]);
    let failures = Arc::new(AtomicUsize::new(0));
    let seen = failures.clone();
    let client = Client::new(config, default_registry())
        .unwrap()
        .with_failure_observer(move |_, _| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

    let resp = client.request("/", Method::Get, None, &[]).await.unwrap();
    assert_eq!(resp.data()["ok"], true);
    assert_eq!(failures.load(Ordering::SeqCst), 1);
    assert!(!client.connections()[0].is_enabled());
}

#[tokio::test]
async fn slow_node_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let conn = url_connection(&server.uri()).with_timeout(Some(Duration::from_millis(200)));
    let err = HttpTransport::http()
        .execute(&conn, &Request::new("/", Method::Get))
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Timeout { ms: 200 }), "got {err:?}");
}

// ─── Failover through the client ──────────────────────────────────────────────

#[tokio::test]
async fn fails_over_from_dead_node_to_live_node() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/_aliases"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let config = ClientConfig::from_value(json!({
        "connectionStrategy": "RoundRobin",
        "connections": [{ "url": closed_url() }, { "url": server.uri() }]
    }))
    .unwrap();
    let failures = Arc::new(AtomicUsize::new(0));
    let seen = failures.clone();
    let client = Client::new(config, default_registry())
        .unwrap()
        .with_failure_observer(move |_, _| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

    let resp = client.request("/_aliases", Method::Get, None, &[]).await.unwrap();
    assert!(resp.is_ok());
    assert_eq!(failures.load(Ordering::SeqCst), 1);
    assert!(client.has_connection());
}

#[tokio::test]
async fn no_valid_connection_reports_every_attempt() {
    let config = ClientConfig::from_value(json!({
        "roundRobin": true,
        "connections": [{ "url": closed_url() }, { "url": closed_url() }, { "url": closed_url() }]
    }))
    .unwrap();
    let failures = Arc::new(AtomicUsize::new(0));
    let seen = failures.clone();
    let client = Client::new(config, default_registry())
        .unwrap()
        .with_failure_observer(move |_, _| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

    let err = client.request("/_aliases", Method::Get, None, &[]).await.unwrap_err();
    match err {
        DispatchError::ConnectionFailed { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("expected ConnectionFailed, got {other:?}"),
    }
    assert_eq!(failures.load(Ordering::SeqCst), 3);
    assert_eq!(client.connection_strategy().name(), "RoundRobin");
}

#[tokio::test]
async fn error_response_is_not_retried_on_other_nodes() {
    let first = MockServer::start().await;
    let second = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "type": "parsing_exception", "reason": "unknown query [foo]" }
        })))
        .expect(1)
        .mount(&first)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&second)
        .await;

    let config = ClientConfig::from_urls([first.uri(), second.uri()]);
    let client = Client::new(config, default_registry()).unwrap();
    let err = client
        .request("/idx/_search", Method::Post, Some(json!({ "query": { "foo": {} } })), &[])
        .await
        .unwrap_err();

    match err {
        DispatchError::Response { status, reason, .. } => {
            assert_eq!(status, 400);
            assert_eq!(reason, "parsing_exception: unknown query [foo]");
        }
        other => panic!("expected Response error, got {other:?}"),
    }
    assert!(client.connections().iter().all(|c| c.is_enabled()));
}

#[tokio::test]
async fn partial_shard_failure_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_shards": { "total": 5, "successful": 4, "failed": 1 },
            "hits": { "total": 10 }
        })))
        .mount(&server)
        .await;

    let client = Client::new(ClientConfig::from_urls([server.uri()]), default_registry()).unwrap();
    let err = client.request("/idx/_search", Method::Get, None, &[]).await.unwrap_err();
    assert!(matches!(err, DispatchError::PartialShardFailure { failed: 1, .. }));
    assert_eq!(err.response().map(|r| r.status()), Some(200));
}
