use crate::http::headers::Headers;

/// HTTP status codes the proxy generates itself.
///
/// Responses relayed from the upstream keep their own numeric status
/// (see [`ResponseHead`]); this enum only covers locally built replies:
/// - `BadRequest` (400): Malformed request
/// - `NotFound` (404): Path outside the proxied prefix
/// - `InternalServerError` (500): Forwarding failed for a non-network reason
/// - `GatewayTimeout` (504): Upstream unreachable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 400 Bad Request
    BadRequest,
    /// 404 Not Found
    NotFound,
    /// 500 Internal Server Error
    InternalServerError,
    /// 504 Gateway Timeout
    GatewayTimeout,
}

impl StatusCode {
    /// Returns the numeric HTTP status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use waypoint::http::response::StatusCode;
    /// assert_eq!(StatusCode::NotFound.as_u16(), 404);
    /// assert_eq!(StatusCode::GatewayTimeout.as_u16(), 504);
    /// ```
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::BadRequest => 400,
            StatusCode::NotFound => 404,
            StatusCode::InternalServerError => 500,
            StatusCode::GatewayTimeout => 504,
        }
    }

    /// Returns the standard HTTP reason phrase for this status code.
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::BadRequest => "Bad Request",
            StatusCode::NotFound => "Not Found",
            StatusCode::InternalServerError => "Internal Server Error",
            StatusCode::GatewayTimeout => "Gateway Timeout",
        }
    }
}

/// A complete, locally generated HTTP response.
#[derive(Debug)]
pub struct Response {
    /// The HTTP status code
    pub status: StatusCode,
    /// HTTP headers in wire order
    pub headers: Headers,
    /// Response body as bytes
    pub body: Vec<u8>,
}

/// Builder for constructing HTTP responses in a fluent style.
///
/// # Example
///
/// ```ignore
/// let response = ResponseBuilder::new(StatusCode::NotFound)
///     .header("Content-Type", "text/plain")
///     .body(b"nope".to_vec())
///     .build();
/// ```
pub struct ResponseBuilder {
    status: StatusCode,
    headers: Headers,
    body: Vec<u8>,
}

impl ResponseBuilder {
    /// Creates a new response builder with the specified status code.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    /// Adds or replaces a header.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(key, value);
        self
    }

    /// Sets the response body.
    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Builds the final Response.
    ///
    /// Adds the Content-Length header based on body size if not already present.
    pub fn build(mut self) -> Response {
        if !self.headers.contains("Content-Length") {
            self.headers.set("Content-Length", self.body.len().to_string());
        }

        Response {
            status: self.status,
            headers: self.headers,
            body: self.body,
        }
    }
}

impl Response {
    /// Default reply for requests outside the proxied prefix, shaped like
    /// a bare web framework's fallback: `Cannot GET /path`.
    pub fn not_found(method: &str, path: &str) -> Self {
        ResponseBuilder::new(StatusCode::NotFound)
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(format!("Cannot {} {}", method, path).into_bytes())
            .build()
    }

    /// Creates a 400 Bad Request response.
    pub fn bad_request() -> Self {
        ResponseBuilder::new(StatusCode::BadRequest)
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(b"400 Bad Request".to_vec())
            .build()
    }

    /// Plain-text error for a failed forwarding attempt.
    pub fn proxy_error(status: StatusCode, message: impl Into<String>) -> Self {
        ResponseBuilder::new(status)
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(message.into().into_bytes())
            .build()
    }
}

/// Status line and headers received from the upstream.
///
/// Status and reason are kept exactly as received so they can be relayed
/// without modification.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    /// HTTP version from the status line
    pub version: String,
    /// Numeric status code
    pub status: u16,
    /// Reason phrase, possibly empty
    pub reason: String,
    /// Response headers in wire order
    pub headers: Headers,
}

impl ResponseHead {
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key)
    }

    /// Interim (1xx) responses precede the final response.
    pub fn is_informational(&self) -> bool {
        (100..200).contains(&self.status)
    }
}
