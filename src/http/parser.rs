use crate::http::headers::Headers;
use crate::http::request::{Method, RequestHead};
use crate::http::response::ResponseHead;

/// Upper bound on a request or response head, in bytes
pub const MAX_HEAD_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    InvalidRequest,
    InvalidMethod,
    InvalidHeader,
    InvalidStatus,
    InvalidContentLength,
    InvalidTransferEncoding,
    InvalidChunk,
    HeadTooLarge,
    Incomplete,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            ParseError::InvalidRequest => "invalid request line",
            ParseError::InvalidMethod => "invalid method token",
            ParseError::InvalidHeader => "malformed header line",
            ParseError::InvalidStatus => "invalid status line",
            ParseError::InvalidContentLength => "invalid Content-Length",
            ParseError::InvalidTransferEncoding => "unsupported Transfer-Encoding",
            ParseError::InvalidChunk => "malformed chunked encoding",
            ParseError::HeadTooLarge => "message head too large",
            ParseError::Incomplete => "incomplete message",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for ParseError {}

/// How the body following a message head is delimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFraming {
    /// No body follows the head
    Empty,
    /// Exactly this many bytes follow
    Length(u64),
    /// `Transfer-Encoding: chunked`
    Chunked,
    /// Body runs until the peer closes the connection (responses only)
    UntilClose,
}

/// Parses a request head from the start of `buf`.
///
/// Returns the head and the number of bytes it occupied (including the
/// blank line). Body bytes, if any, are left for the caller.
pub fn parse_request_head(buf: &[u8]) -> Result<(RequestHead, usize), ParseError> {
    let (start_line, headers, consumed) = split_head(buf)?;

    let mut parts = start_line.split_whitespace();
    let method_str = parts.next().ok_or(ParseError::InvalidRequest)?;
    let path = parts.next().ok_or(ParseError::InvalidRequest)?;
    let version = parts.next().ok_or(ParseError::InvalidRequest)?;

    if parts.next().is_some() || !version.starts_with("HTTP/1.") {
        return Err(ParseError::InvalidRequest);
    }

    let method = Method::from_str(method_str).ok_or(ParseError::InvalidMethod)?;

    let request = RequestHead {
        method,
        path: path.to_string(),
        version: version.to_string(),
        headers,
    };

    Ok((request, consumed))
}

/// Parses a response head (status line and headers) from the start of `buf`.
pub fn parse_response_head(buf: &[u8]) -> Result<(ResponseHead, usize), ParseError> {
    let (status_line, headers, consumed) = split_head(buf)?;

    let mut parts = status_line.splitn(3, ' ');
    let version = parts.next().ok_or(ParseError::InvalidStatus)?;
    let code = parts.next().ok_or(ParseError::InvalidStatus)?;
    let reason = parts.next().unwrap_or("");

    if !version.starts_with("HTTP/1.") || code.len() != 3 {
        return Err(ParseError::InvalidStatus);
    }
    let status: u16 = code.parse().map_err(|_| ParseError::InvalidStatus)?;

    let response = ResponseHead {
        version: version.to_string(),
        status,
        reason: reason.to_string(),
        headers,
    };

    Ok((response, consumed))
}

/// Determines how a client request body is framed.
///
/// A request without `Content-Length` or `Transfer-Encoding` has no body.
pub fn request_framing(head: &RequestHead) -> Result<BodyFraming, ParseError> {
    if head.headers.contains("Transfer-Encoding") {
        return if is_chunked(&head.headers) {
            Ok(BodyFraming::Chunked)
        } else {
            Err(ParseError::InvalidTransferEncoding)
        };
    }

    match content_length(&head.headers)? {
        Some(0) | None => Ok(BodyFraming::Empty),
        Some(n) => Ok(BodyFraming::Length(n)),
    }
}

/// Determines how an upstream response body is framed, given the method
/// of the request it answers.
pub fn response_framing(method: &Method, head: &ResponseHead) -> Result<BodyFraming, ParseError> {
    if *method == Method::HEAD
        || head.is_informational()
        || head.status == 204
        || head.status == 304
    {
        return Ok(BodyFraming::Empty);
    }

    if head.headers.contains("Transfer-Encoding") {
        return if is_chunked(&head.headers) {
            Ok(BodyFraming::Chunked)
        } else {
            Ok(BodyFraming::UntilClose)
        };
    }

    match content_length(&head.headers)? {
        Some(0) => Ok(BodyFraming::Empty),
        Some(n) => Ok(BodyFraming::Length(n)),
        None => Ok(BodyFraming::UntilClose),
    }
}

/// `chunked` must be the final transfer coding.
fn is_chunked(headers: &Headers) -> bool {
    headers
        .get_all("Transfer-Encoding")
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .last()
        .map(|t| t.eq_ignore_ascii_case("chunked"))
        .unwrap_or(false)
}

/// Parses `Content-Length`, rejecting conflicting duplicate values.
fn content_length(headers: &Headers) -> Result<Option<u64>, ParseError> {
    let mut length = None;

    for value in headers.get_all("Content-Length").flat_map(|v| v.split(',')) {
        let value = value.trim();
        if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseError::InvalidContentLength);
        }
        let n: u64 = value.parse().map_err(|_| ParseError::InvalidContentLength)?;

        match length {
            Some(prev) if prev != n => return Err(ParseError::InvalidContentLength),
            _ => length = Some(n),
        }
    }

    Ok(length)
}

/// Splits a head into its start line and headers.
fn split_head(buf: &[u8]) -> Result<(&str, Headers, usize), ParseError> {
    let headers_end = match find_headers_end(buf) {
        Some(pos) => pos,
        None if buf.len() > MAX_HEAD_SIZE => return Err(ParseError::HeadTooLarge),
        None => return Err(ParseError::Incomplete),
    };

    let head_str = std::str::from_utf8(&buf[..headers_end])
        .map_err(|_| ParseError::InvalidHeader)?;

    let mut lines = head_str.split("\r\n");
    let start_line = lines.next().ok_or(ParseError::InvalidRequest)?;

    let mut headers = Headers::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }

        let (key, value) = line.split_once(':').ok_or(ParseError::InvalidHeader)?;
        let key = key.trim();
        if key.is_empty() || key.contains(char::is_whitespace) {
            return Err(ParseError::InvalidHeader);
        }

        headers.append(key, value.trim());
    }

    Ok((start_line, headers, headers_end + 4))
}

fn find_headers_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}
