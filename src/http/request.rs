use crate::http::headers::Headers;

/// HTTP request methods.
///
/// The proxy forwards every method it can parse; nothing is rejected
/// based on the verb. Names outside the registered set (`PURGE`,
/// `PROPFIND`, ...) are kept verbatim as [`Method::Extension`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    /// GET - Retrieve a resource
    GET,
    /// POST - Create or submit data
    POST,
    /// PUT - Replace a resource
    PUT,
    /// DELETE - Delete a resource
    DELETE,
    /// HEAD - Like GET but without the response body
    HEAD,
    /// OPTIONS - Describe communication options
    OPTIONS,
    /// PATCH - Partial modification of a resource
    PATCH,
    /// CONNECT - Establish a tunnel
    CONNECT,
    /// TRACE - Message loop-back test
    TRACE,
    /// Any other method token, e.g. WebDAV verbs or cache `PURGE`
    Extension(String),
}

impl Method {
    /// Parses an HTTP method from a string.
    ///
    /// # Arguments
    ///
    /// * `s` - String representation of the method (case-sensitive)
    ///
    /// # Returns
    ///
    /// The matching variant for a registered name, `Extension` for any
    /// other token, `None` when `s` is not a valid token.
    ///
    /// # Example
    ///
    /// ```
    /// # use waypoint::http::request::Method;
    /// assert_eq!(Method::from_str("GET"), Some(Method::GET));
    /// assert_eq!(Method::from_str("PURGE"), Some(Method::Extension("PURGE".into())));
    /// assert_eq!(Method::from_str("GE(T"), None);
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        let method = match s {
            "GET" => Method::GET,
            "POST" => Method::POST,
            "PUT" => Method::PUT,
            "DELETE" => Method::DELETE,
            "HEAD" => Method::HEAD,
            "OPTIONS" => Method::OPTIONS,
            "PATCH" => Method::PATCH,
            "CONNECT" => Method::CONNECT,
            "TRACE" => Method::TRACE,
            _ if is_token(s) => Method::Extension(s.to_string()),
            _ => return None,
        };
        Some(method)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::HEAD => "HEAD",
            Method::OPTIONS => "OPTIONS",
            Method::PATCH => "PATCH",
            Method::CONNECT => "CONNECT",
            Method::TRACE => "TRACE",
            Method::Extension(name) => name,
        }
    }
}

/// `token = 1*tchar` (RFC 9110 section 5.6.2)
fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes().all(|b| {
            b.is_ascii_alphanumeric()
                || matches!(
                    b,
                    b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' | b'^' | b'_' | b'`' | b'|' | b'~'
                )
        })
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request line and headers of a client request.
///
/// The body is not part of the head: it stays on the socket and is read
/// chunk by chunk by whoever handles the request.
#[derive(Debug, Clone)]
pub struct RequestHead {
    /// The HTTP method (GET, POST, etc.)
    pub method: Method,
    /// The request target, path plus optional query (e.g. "/api/run?x=1")
    pub path: String,
    /// HTTP version (typically "HTTP/1.1")
    pub version: String,
    /// Request headers in wire order
    pub headers: Headers,
}

/// Builder for constructing RequestHead objects.
pub struct RequestBuilder {
    method: Option<Method>,
    path: Option<String>,
    version: Option<String>,
    headers: Headers,
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self {
            method: None,
            path: None,
            version: None,
            headers: Headers::new(),
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(key, value);
        self
    }

    pub fn build(self) -> Result<RequestHead, &'static str> {
        Ok(RequestHead {
            method: self.method.ok_or("method missing")?,
            path: self.path.ok_or("path missing")?,
            version: self.version.unwrap_or_else(|| "HTTP/1.1".to_string()),
            headers: self.headers,
        })
    }
}

impl RequestHead {
    /// Retrieves a header value by name (case-insensitive).
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key)
    }

    /// Path without the query string.
    pub fn path_only(&self) -> &str {
        self.path.split_once('?').map(|(p, _)| p).unwrap_or(&self.path)
    }

    /// Determines whether the connection should remain open after the response.
    ///
    /// HTTP/1.1 defaults to keep-alive unless `Connection: close` is sent;
    /// HTTP/1.0 defaults to close unless `Connection: keep-alive` is sent.
    pub fn keep_alive(&self) -> bool {
        if self.headers.has_token("Connection", "close") {
            return false;
        }
        if self.version == "HTTP/1.0" {
            return self.headers.has_token("Connection", "keep-alive");
        }
        true
    }

    /// True when the client waits for `100 Continue` before sending its body.
    pub fn expects_continue(&self) -> bool {
        self.header("Expect")
            .map(|v| v.trim().eq_ignore_ascii_case("100-continue"))
            .unwrap_or(false)
    }
}
