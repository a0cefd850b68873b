//! Per-request forwarding flow
//!
//! A matched request moves through a fixed sequence of states:
//!
//! ```text
//!   AwaitingBody ──end of body──▶ Forwarding ──response head──▶ RelayingResponse ──▶ Done
//!        │                            │                               │
//!        └────────────── transport error ─────────────────────────────┴──▶ Failed
//! ```
//!
//! Nothing is sent upstream until the whole client body is buffered, and
//! an error response can only be produced while no byte of the upstream
//! response has reached the client.

use crate::config::Config;
use crate::http::headers::Headers;
use crate::http::parser::{BodyFraming, request_framing, response_framing};
use crate::http::request::{Method, RequestHead};
use crate::http::response::Response;
use crate::http::writer::{CONTINUE, ResponseWriter};
use crate::proxy::body::{BodyBuffer, read_body};
use crate::proxy::error::ProxyError;
use crate::proxy::rewrite::{join_base_path, strip_prefix};
use crate::proxy::upstream::{Upstream, read_response_head, relay_body, relayed_head};
use anyhow::Result;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::proxy::body::BUFFER_SIZE;

/// Headers that describe the client connection and are never forwarded.
/// The body is always re-framed, so `Transfer-Encoding` goes too.
const CONNECTION_HEADERS: &[&str] = &[
    "Connection",
    "Keep-Alive",
    "Proxy-Connection",
    "Transfer-Encoding",
    "TE",
    "Trailer",
    "Upgrade",
    "Expect",
];

/// Content type announced for every forwarded non-empty body
pub const FORWARDED_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardState {
    /// Collecting the client body
    AwaitingBody,
    /// Request sent or being sent upstream, no response relayed yet
    Forwarding,
    /// Response head written to the client, copying the body
    RelayingResponse,
    Done,
    Failed,
}

/// What the connection does after an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    KeepAlive,
    Close,
}

/// The request as it is sent to the upstream.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: Method,
    pub path: String,
    pub headers: Headers,
    pub body: Option<Bytes>,
}

impl UpstreamRequest {
    /// Serialize request line, headers and body
    pub fn to_bytes(&self) -> Vec<u8> {
        let body_len = self.body.as_ref().map(|b| b.len()).unwrap_or(0);
        let mut buf = Vec::with_capacity(256 + body_len);

        buf.extend_from_slice(format!("{} {} HTTP/1.1\r\n", self.method, self.path).as_bytes());
        self.headers.write_to(&mut buf);
        buf.extend_from_slice(b"\r\n");

        if let Some(body) = &self.body {
            buf.extend_from_slice(body);
        }

        buf
    }
}

/// Forwards requests under one prefix to one upstream.
#[derive(Debug, Clone)]
pub struct Forwarder {
    prefix: String,
    upstream: Upstream,
}

impl Forwarder {
    pub fn new(prefix: impl Into<String>, upstream: Upstream) -> Self {
        Self {
            prefix: prefix.into().trim_end_matches('/').to_string(),
            upstream,
        }
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        let upstream = Upstream::from_url(&cfg.upstream_url()?)?;
        Ok(Self::new(cfg.upstream.prefix.clone(), upstream))
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn upstream(&self) -> &Upstream {
        &self.upstream
    }

    /// Upstream path for a client request target, or `None` when the
    /// target is outside the prefix.
    pub fn rewrite(&self, target: &str) -> Option<String> {
        strip_prefix(target, &self.prefix).map(|path| join_base_path(self.upstream.base_path(), &path))
    }

    /// Build the outgoing request from the client head and its complete body.
    ///
    /// A non-empty body gets `Content-Type: application/json` and its exact
    /// `Content-Length`; an empty body leaves the content headers alone.
    pub fn build_upstream_request(&self, head: &RequestHead, path: String, body: BodyBuffer) -> UpstreamRequest {
        let mut headers = head.headers.clone();

        // Headers listed in Connection are connection-specific as well.
        let listed: Vec<String> = headers
            .get_all("Connection")
            .flat_map(|v| v.split(','))
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        for name in &listed {
            headers.remove(name);
        }
        for name in CONNECTION_HEADERS {
            headers.remove(name);
        }

        headers.set("Host", self.upstream.authority());
        headers.set("Connection", "close");

        // A chunked body overrides any Content-Length sent alongside it, so
        // the client's value says nothing about the bytes actually received.
        if head.headers.contains("Transfer-Encoding") {
            headers.remove("Content-Length");
        }

        let body = body.finish();
        if let Some(bytes) = &body {
            headers.set("Content-Type", FORWARDED_CONTENT_TYPE);
            headers.set("Content-Length", bytes.len().to_string());
        }

        UpstreamRequest {
            method: head.method.clone(),
            path,
            headers,
            body,
        }
    }

    /// Run one request/response exchange.
    ///
    /// Reads the body of `head` from `client` (starting with the bytes in
    /// `pending`), forwards it to `path` on the upstream and relays the
    /// response. Failures are answered or logged here; the returned outcome
    /// tells the connection whether it can read another request.
    pub async fn forward<C>(
        &self,
        head: &RequestHead,
        path: String,
        client: &mut C,
        pending: &mut BytesMut,
    ) -> Outcome
    where
        C: AsyncRead + AsyncWrite + Unpin,
    {
        let mut state = ForwardState::AwaitingBody;
        let target = path.clone();

        match self.exchange(head, path, client, pending, &mut state).await {
            Ok(outcome) => {
                advance(&mut state, ForwardState::Done);
                outcome
            }
            Err(err) => {
                let failed_in = state;
                advance(&mut state, ForwardState::Failed);
                self.report_failure(failed_in, err, head, &target, client).await;
                Outcome::Close
            }
        }
    }

    async fn exchange<C>(
        &self,
        head: &RequestHead,
        path: String,
        client: &mut C,
        pending: &mut BytesMut,
        state: &mut ForwardState,
    ) -> Result<Outcome, ProxyError>
    where
        C: AsyncRead + AsyncWrite + Unpin,
    {
        let framing = request_framing(head).map_err(ProxyError::Body)?;

        if head.expects_continue() && framing != BodyFraming::Empty {
            client.write_all(CONTINUE).await.map_err(ProxyError::ClientIo)?;
        }

        let body = read_body(client, pending, framing).await?;
        tracing::debug!(
            method = %head.method,
            bytes = body.len(),
            chunks = body.chunk_count(),
            "Request body buffered"
        );

        let request = self.build_upstream_request(head, path, body);
        advance(state, ForwardState::Forwarding);

        let mut upstream = self.upstream.connect().await?;
        upstream
            .write_all(&request.to_bytes())
            .await
            .map_err(ProxyError::UpstreamIo)?;
        upstream.flush().await.map_err(ProxyError::UpstreamIo)?;

        let mut buf = BytesMut::with_capacity(BUFFER_SIZE);
        let response = loop {
            let response = read_response_head(&mut upstream, &mut buf).await?;
            // Interim responses are dropped; Expect is never forwarded and
            // Upgrade is stripped, so only the final response matters.
            if response.is_informational() && response.status != 101 {
                tracing::debug!(status = response.status, "Skipping interim upstream response");
                continue;
            }
            break response;
        };

        let framing = response_framing(&request.method, &response).map_err(ProxyError::UpstreamProtocol)?;
        let keep_alive = head.keep_alive() && framing != BodyFraming::UntilClose && response.status != 101;

        client
            .write_all(&relayed_head(&response, keep_alive))
            .await
            .map_err(ProxyError::ClientIo)?;
        advance(state, ForwardState::RelayingResponse);

        let relayed = relay_body(&mut upstream, &mut buf, client, framing).await?;

        tracing::info!(
            method = %request.method,
            path = %request.path,
            upstream = %self.upstream.addr(),
            status = response.status,
            bytes = relayed,
            "Request forwarded"
        );

        Ok(if keep_alive { Outcome::KeepAlive } else { Outcome::Close })
    }

    async fn report_failure<C>(
        &self,
        failed_in: ForwardState,
        err: ProxyError,
        head: &RequestHead,
        target: &str,
        client: &mut C,
    ) where
        C: AsyncWrite + Unpin,
    {
        if err.is_client_side() {
            tracing::debug!(error = %err, path = %head.path, "Client went away during forwarding");
            return;
        }

        if failed_in == ForwardState::RelayingResponse {
            tracing::error!(
                error = %err,
                method = %head.method,
                path = %head.path,
                upstream = %self.upstream.addr(),
                "Upstream failed mid-response, closing connection"
            );
            return;
        }

        let response = match &err {
            ProxyError::Body(_) => {
                tracing::warn!(error = %err, path = %head.path, "Rejecting request with malformed body");
                Response::bad_request()
            }
            _ => {
                tracing::error!(
                    error = %err,
                    method = %head.method,
                    path = %head.path,
                    upstream = %self.upstream.addr(),
                    "Failed to proxy request"
                );
                let host = head.header("Host").unwrap_or("");
                Response::proxy_error(
                    err.gateway_status(),
                    format!("Error occurred while trying to proxy: {}{}", host, target),
                )
            }
        };

        let mut writer = ResponseWriter::new(&response);
        if let Err(e) = writer.write_to_stream(client).await {
            tracing::debug!(error = %e, "Failed to send error response");
        }
    }
}

fn advance(state: &mut ForwardState, next: ForwardState) {
    tracing::trace!(from = ?state, to = ?next, "Forward state transition");
    *state = next;
}
