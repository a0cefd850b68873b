use waypoint::http::parser::{
    BodyFraming, MAX_HEAD_SIZE, ParseError, parse_request_head, parse_response_head, request_framing,
    response_framing,
};
use waypoint::http::request::Method;

#[test]
fn test_parse_simple_get_request() {
    let req = b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n";
    let (parsed, consumed) = parse_request_head(req).unwrap();

    assert_eq!(parsed.method, Method::GET);
    assert_eq!(parsed.path, "/");
    assert_eq!(parsed.version, "HTTP/1.1");
    assert_eq!(parsed.header("Host"), Some("example.com"));
    assert_eq!(consumed, req.len());
}

#[test]
fn test_parse_leaves_body_bytes_unconsumed() {
    let req = b"POST /api/run HTTP/1.1\r\nHost: localhost\r\nContent-Length: 5\r\n\r\nhello";
    let (parsed, consumed) = parse_request_head(req).unwrap();

    assert_eq!(parsed.method, Method::POST);
    assert_eq!(parsed.path, "/api/run");
    assert_eq!(&req[consumed..], b"hello");
}

#[test]
fn test_parse_request_with_path_and_query_string() {
    let req = b"GET /search?q=rust HTTP/1.1\r\nHost: example.com\r\n\r\n";
    let (parsed, _) = parse_request_head(req).unwrap();

    assert_eq!(parsed.path, "/search?q=rust");
    assert_eq!(parsed.path_only(), "/search");
}

#[test]
fn test_parse_incomplete_request_missing_blank_line() {
    let req = b"GET / HTTP/1.1\r\nHost: example.com\r\n";
    let result = parse_request_head(req);

    assert!(matches!(result, Err(ParseError::Incomplete)));
}

#[test]
fn test_parse_head_too_large() {
    let mut req = b"GET / HTTP/1.1\r\nX-Big: ".to_vec();
    req.extend(std::iter::repeat_n(b'a', MAX_HEAD_SIZE + 1));
    let result = parse_request_head(&req);

    assert!(matches!(result, Err(ParseError::HeadTooLarge)));
}

#[test]
fn test_parse_invalid_http_method() {
    let req = b"GE(T / HTTP/1.1\r\n\r\n";
    let result = parse_request_head(req);

    assert!(matches!(result, Err(ParseError::InvalidMethod)));
}

#[test]
fn test_parse_malformed_header() {
    let req = b"GET / HTTP/1.1\r\nBrokenHeader\r\n\r\n";
    let result = parse_request_head(req);

    assert!(matches!(result, Err(ParseError::InvalidHeader)));
}

#[test]
fn test_parse_rejects_non_http1_version() {
    let req = b"GET / HTTP/2.0\r\n\r\n";
    let result = parse_request_head(req);

    assert!(matches!(result, Err(ParseError::InvalidRequest)));
}

#[test]
fn test_parse_various_http_methods() {
    let methods = vec![
        ("GET", Method::GET),
        ("POST", Method::POST),
        ("PUT", Method::PUT),
        ("DELETE", Method::DELETE),
        ("HEAD", Method::HEAD),
        ("OPTIONS", Method::OPTIONS),
        ("PATCH", Method::PATCH),
        ("TRACE", Method::TRACE),
    ];

    for (method_str, expected_method) in methods {
        let req = format!("{} /api HTTP/1.1\r\n\r\n", method_str);
        let (parsed, _) = parse_request_head(req.as_bytes()).unwrap();
        assert_eq!(parsed.method, expected_method);
    }
}

#[test]
fn test_parse_extension_methods() {
    for name in ["PURGE", "PROPFIND", "MKCOL", "REPORT", "M-SEARCH"] {
        let req = format!("{} /api/x HTTP/1.1\r\n\r\n", name);
        let (parsed, _) = parse_request_head(req.as_bytes()).unwrap();
        assert_eq!(parsed.method, Method::Extension(name.to_string()));
        assert_eq!(parsed.method.as_str(), name);
    }
}

#[test]
fn test_parse_keeps_duplicate_headers_in_order() {
    let req = b"GET / HTTP/1.1\r\nX-A: 1\r\nx-a: 2\r\nHost: h\r\n\r\n";
    let (parsed, _) = parse_request_head(req).unwrap();

    let values: Vec<_> = parsed.headers.get_all("X-A").collect();
    assert_eq!(values, vec!["1", "2"]);
    assert_eq!(parsed.headers.iter().count(), 3);
}

#[test]
fn test_request_framing() {
    let (no_body, _) = parse_request_head(b"GET / HTTP/1.1\r\n\r\n").unwrap();
    assert_eq!(request_framing(&no_body), Ok(BodyFraming::Empty));

    let (zero, _) = parse_request_head(b"POST / HTTP/1.1\r\nContent-Length: 0\r\n\r\n").unwrap();
    assert_eq!(request_framing(&zero), Ok(BodyFraming::Empty));

    let (sized, _) = parse_request_head(b"POST / HTTP/1.1\r\nContent-Length: 15\r\n\r\n").unwrap();
    assert_eq!(request_framing(&sized), Ok(BodyFraming::Length(15)));

    let (chunked, _) =
        parse_request_head(b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\nContent-Length: 3\r\n\r\n").unwrap();
    assert_eq!(request_framing(&chunked), Ok(BodyFraming::Chunked));
}

#[test]
fn test_request_framing_rejects_bad_lengths() {
    let (invalid, _) = parse_request_head(b"POST / HTTP/1.1\r\nContent-Length: abc\r\n\r\n").unwrap();
    assert_eq!(request_framing(&invalid), Err(ParseError::InvalidContentLength));

    let (conflicting, _) =
        parse_request_head(b"POST / HTTP/1.1\r\nContent-Length: 3\r\nContent-Length: 4\r\n\r\n").unwrap();
    assert_eq!(request_framing(&conflicting), Err(ParseError::InvalidContentLength));

    let (gzip_only, _) = parse_request_head(b"POST / HTTP/1.1\r\nTransfer-Encoding: gzip\r\n\r\n").unwrap();
    assert_eq!(request_framing(&gzip_only), Err(ParseError::InvalidTransferEncoding));
}

#[test]
fn test_parse_response_head() {
    let resp = b"HTTP/1.1 200 OK\r\nX-Test: 1\r\nContent-Length: 11\r\n\r\n{\"ok\":true}";
    let (head, consumed) = parse_response_head(resp).unwrap();

    assert_eq!(head.status, 200);
    assert_eq!(head.reason, "OK");
    assert_eq!(head.header("x-test"), Some("1"));
    assert_eq!(&resp[consumed..], b"{\"ok\":true}");
}

#[test]
fn test_parse_response_head_keeps_multi_word_reason() {
    let resp = b"HTTP/1.0 408 Request Time-out\r\n\r\n";
    let (head, _) = parse_response_head(resp).unwrap();

    assert_eq!(head.version, "HTTP/1.0");
    assert_eq!(head.status, 408);
    assert_eq!(head.reason, "Request Time-out");
}

#[test]
fn test_parse_response_head_invalid_status() {
    assert!(matches!(
        parse_response_head(b"HTTP/1.1 OK\r\n\r\n"),
        Err(ParseError::InvalidStatus)
    ));
    assert!(matches!(
        parse_response_head(b"SPDY/3 200 OK\r\n\r\n"),
        Err(ParseError::InvalidStatus)
    ));
}

#[test]
fn test_response_framing() {
    let (sized, _) = parse_response_head(b"HTTP/1.1 200 OK\r\nContent-Length: 11\r\n\r\n").unwrap();
    assert_eq!(response_framing(&Method::GET, &sized), Ok(BodyFraming::Length(11)));
    assert_eq!(response_framing(&Method::HEAD, &sized), Ok(BodyFraming::Empty));

    let (no_content, _) = parse_response_head(b"HTTP/1.1 204 No Content\r\n\r\n").unwrap();
    assert_eq!(response_framing(&Method::POST, &no_content), Ok(BodyFraming::Empty));

    let (chunked, _) = parse_response_head(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n").unwrap();
    assert_eq!(response_framing(&Method::GET, &chunked), Ok(BodyFraming::Chunked));

    let (unframed, _) = parse_response_head(b"HTTP/1.1 200 OK\r\n\r\n").unwrap();
    assert_eq!(response_framing(&Method::GET, &unframed), Ok(BodyFraming::UntilClose));
}
