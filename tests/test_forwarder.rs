//! Tests for building the request sent upstream

use waypoint::http::request::{Method, RequestBuilder, RequestHead};
use waypoint::proxy::body::BodyBuffer;
use waypoint::proxy::forwarder::Forwarder;
use waypoint::proxy::upstream::Upstream;

fn forwarder(base_url: &str, prefix: &str) -> Forwarder {
    let url = url::Url::parse(base_url).unwrap();
    Forwarder::new(prefix, Upstream::from_url(&url).unwrap())
}

fn body(bytes: &[u8]) -> BodyBuffer {
    let mut body = BodyBuffer::new();
    body.push(bytes);
    body
}

fn post(path: &str) -> RequestHead {
    RequestBuilder::new()
        .method(Method::POST)
        .path(path)
        .header("Host", "localhost:4000")
        .header("User-Agent", "Test")
        .header("Content-Type", "text/plain")
        .header("Content-Length", "15")
        .build()
        .unwrap()
}

#[test]
fn test_run_request_is_rewritten_for_upstream() {
    let fwd = forwarder("http://localhost:5050", "/api");
    let head = post("/api/run");
    let path = fwd.rewrite(&head.path).unwrap();

    let request = fwd.build_upstream_request(&head, path, body(br#"{"cmd":"build"}"#));
    let wire = String::from_utf8(request.to_bytes()).unwrap();

    assert!(wire.starts_with("POST /run HTTP/1.1\r\n"));
    assert!(wire.contains("Host: localhost:5050\r\n"));
    assert!(wire.contains("Content-Length: 15\r\n"));
    assert!(wire.contains("Content-Type: application/json\r\n"));
    assert!(wire.contains("User-Agent: Test\r\n"));
    assert!(wire.ends_with("\r\n\r\n{\"cmd\":\"build\"}"));
}

#[test]
fn test_content_length_matches_received_bytes() {
    let fwd = forwarder("http://localhost:5050", "/api");
    let payload = "{\"msg\":\"héllo wörld\"}";

    let request = fwd.build_upstream_request(&post("/api/echo"), "/echo".to_string(), body(payload.as_bytes()));

    assert_eq!(
        request.headers.get("Content-Length"),
        Some(payload.len().to_string().as_str())
    );
    assert_eq!(request.body.as_deref(), Some(payload.as_bytes()));
}

#[test]
fn test_empty_body_leaves_content_headers_alone() {
    let fwd = forwarder("http://localhost:5050", "/api");
    let head = RequestBuilder::new()
        .method(Method::GET)
        .path("/api/status")
        .header("Accept", "text/html")
        .build()
        .unwrap();

    let request = fwd.build_upstream_request(&head, "/status".to_string(), BodyBuffer::new());

    assert!(request.body.is_none());
    assert_eq!(request.headers.get("Content-Length"), None);
    assert_eq!(request.headers.get("Content-Type"), None);
    assert!(request.to_bytes().ends_with(b"\r\n\r\n"));
}

#[test]
fn test_empty_body_keeps_client_content_type() {
    let fwd = forwarder("http://localhost:5050", "/api");
    let head = RequestBuilder::new()
        .method(Method::POST)
        .path("/api/run")
        .header("Content-Type", "text/plain")
        .header("Content-Length", "0")
        .build()
        .unwrap();

    let request = fwd.build_upstream_request(&head, "/run".to_string(), BodyBuffer::new());

    assert_eq!(request.headers.get("Content-Type"), Some("text/plain"));
    assert_eq!(request.headers.get("Content-Length"), Some("0"));
}

#[test]
fn test_connection_headers_are_not_forwarded() {
    let fwd = forwarder("http://localhost:5050", "/api");
    let head = RequestBuilder::new()
        .method(Method::POST)
        .path("/api/run")
        .header("Connection", "keep-alive, X-Hop")
        .header("X-Hop", "1")
        .header("Transfer-Encoding", "chunked")
        .header("Expect", "100-continue")
        .header("Upgrade", "websocket")
        .header("X-End-To-End", "kept")
        .build()
        .unwrap();

    let request = fwd.build_upstream_request(&head, "/run".to_string(), body(b"{}"));

    assert_eq!(request.headers.get("Connection"), Some("close"));
    assert_eq!(request.headers.get("X-Hop"), None);
    assert_eq!(request.headers.get("Transfer-Encoding"), None);
    assert_eq!(request.headers.get("Expect"), None);
    assert_eq!(request.headers.get("Upgrade"), None);
    assert_eq!(request.headers.get("X-End-To-End"), Some("kept"));
}

#[test]
fn test_host_header_omits_default_port() {
    let fwd = forwarder("http://backend.internal", "/api");
    let request = fwd.build_upstream_request(&post("/api/run"), "/run".to_string(), BodyBuffer::new());

    assert_eq!(request.headers.get("Host"), Some("backend.internal"));
    assert_eq!(fwd.upstream().addr(), "backend.internal:80");
}

#[test]
fn test_rewrite_prepends_upstream_base_path() {
    let fwd = forwarder("http://localhost:5050/v1/", "/api");

    assert_eq!(fwd.rewrite("/api/run?x=1").as_deref(), Some("/v1/run?x=1"));
    assert_eq!(fwd.rewrite("/health"), None);
}

#[test]
fn test_method_is_preserved() {
    let fwd = forwarder("http://localhost:5050", "/api");
    for method in [Method::GET, Method::PUT, Method::DELETE, Method::PATCH, Method::OPTIONS] {
        let head = RequestBuilder::new().method(method.clone()).path("/api/x").build().unwrap();
        let request = fwd.build_upstream_request(&head, "/x".to_string(), BodyBuffer::new());
        let wire = request.to_bytes();
        assert!(wire.starts_with(format!("{} /x HTTP/1.1\r\n", method).as_bytes()));
    }
}

#[test]
fn test_chunked_request_drops_client_content_length() {
    let fwd = forwarder("http://localhost:5050", "/api");
    let head = RequestBuilder::new()
        .method(Method::POST)
        .path("/api/run")
        .header("Transfer-Encoding", "chunked")
        .header("Content-Length", "5")
        .build()
        .unwrap();

    let empty = fwd.build_upstream_request(&head, "/run".to_string(), BodyBuffer::new());
    assert_eq!(empty.headers.get("Content-Length"), None);
    assert_eq!(empty.headers.get("Transfer-Encoding"), None);
    assert!(empty.to_bytes().ends_with(b"Connection: close\r\n\r\n"));

    let sized = fwd.build_upstream_request(&head, "/run".to_string(), body(b"{}"));
    assert_eq!(sized.headers.get("Content-Length"), Some("2"));
    assert_eq!(sized.body.as_deref(), Some(&b"{}"[..]));
}

#[test]
fn test_extension_method_is_preserved() {
    let fwd = forwarder("http://localhost:5050", "/api");
    let head = RequestBuilder::new()
        .method(Method::Extension("PROPFIND".to_string()))
        .path("/api/dav/")
        .build()
        .unwrap();

    let request = fwd.build_upstream_request(&head, "/dav/".to_string(), BodyBuffer::new());
    assert!(request.to_bytes().starts_with(b"PROPFIND /dav/ HTTP/1.1\r\n"));
}
