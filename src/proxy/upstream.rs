//! Upstream connection and response relay
//!
//! This module knows where the backend lives, opens one connection per
//! forwarded request, and copies the backend's response back to the
//! client without altering status, headers or body.

use crate::http::chunked::{ChunkEvent, ChunkedDecoder};
use crate::http::parser::{BodyFraming, ParseError, parse_response_head};
use crate::http::response::ResponseHead;
use crate::proxy::body::BUFFER_SIZE;
use crate::proxy::error::ProxyError;
use anyhow::{Context, Result};
use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use url::Url;

/// The backend every matching request is forwarded to.
#[derive(Debug, Clone)]
pub struct Upstream {
    /// Backend URL as configured, e.g. "http://localhost:5050"
    url: Url,

    /// `host:port` to connect to
    addr: String,

    /// Value for the forwarded `Host` header
    authority: String,

    /// Path component of the base URL, prepended to forwarded paths
    base_path: String,
}

impl Upstream {
    /// Create an upstream from an `http://host[:port][/base]` URL
    pub fn from_url(url: &Url) -> Result<Self> {
        let host = url.host_str().context("Upstream URL missing host")?;
        let port = url
            .port_or_known_default()
            .context("Upstream URL missing port")?;

        let authority = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        Ok(Self {
            url: url.clone(),
            addr: format!("{}:{}", host, port),
            authority,
            base_path: url.path().trim_end_matches('/').to_string(),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Host header value sent upstream (`changeOrigin` behaviour)
    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Open a fresh connection to the backend
    pub async fn connect(&self) -> Result<TcpStream, ProxyError> {
        let stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|source| ProxyError::Connect {
                addr: self.addr.clone(),
                source,
            })?;

        tracing::trace!(upstream = %self.addr, "Connected to upstream");
        Ok(stream)
    }
}

/// Read the next response head from the upstream
///
/// Bytes read past the head stay in `buf` for the body relay.
pub async fn read_response_head<U>(upstream: &mut U, buf: &mut BytesMut) -> Result<ResponseHead, ProxyError>
where
    U: AsyncRead + Unpin,
{
    loop {
        match parse_response_head(&buf[..]) {
            Ok((head, consumed)) => {
                buf.advance(consumed);
                return Ok(head);
            }
            Err(ParseError::Incomplete) => {}
            Err(e) => return Err(ProxyError::UpstreamProtocol(e)),
        }

        buf.reserve(BUFFER_SIZE);
        let n = upstream.read_buf(buf).await.map_err(ProxyError::UpstreamIo)?;
        if n == 0 {
            return Err(ProxyError::UpstreamClosed);
        }
    }
}

/// Serialize a response head for the client
///
/// Status, reason and headers are kept as received. Only the hop-by-hop
/// `Connection` and `Keep-Alive` headers are replaced, since they describe
/// the client connection rather than the upstream one.
pub fn relayed_head(head: &ResponseHead, keep_alive: bool) -> Vec<u8> {
    let mut headers = head.headers.clone();
    headers.remove("Keep-Alive");
    headers.set("Connection", if keep_alive { "keep-alive" } else { "close" });

    let mut buf = Vec::with_capacity(256);
    buf.extend_from_slice(format!("{} {} {}\r\n", head.version, head.status, head.reason).as_bytes());
    headers.write_to(&mut buf);
    buf.extend_from_slice(b"\r\n");
    buf
}

/// Copy the response body from upstream to client
///
/// `buf` holds body bytes already read together with the head. Chunked
/// bodies are copied with their framing intact; the decoder only tracks
/// where the body ends.
pub async fn relay_body<U, C>(
    upstream: &mut U,
    buf: &mut BytesMut,
    client: &mut C,
    framing: BodyFraming,
) -> Result<u64, ProxyError>
where
    U: AsyncRead + Unpin,
    C: AsyncWrite + Unpin,
{
    let mut relayed = 0u64;

    match framing {
        BodyFraming::Empty => {}

        BodyFraming::Length(length) => {
            let mut remaining = length;
            loop {
                if !buf.is_empty() {
                    let take = remaining.min(buf.len() as u64) as usize;
                    send(client, &buf[..take]).await?;
                    buf.advance(take);
                    remaining -= take as u64;
                    relayed += take as u64;
                }

                if remaining == 0 {
                    break;
                }
                if fill(upstream, buf).await? == 0 {
                    return Err(ProxyError::UpstreamClosed);
                }
            }
        }

        BodyFraming::Chunked => {
            let mut decoder = ChunkedDecoder::new();
            loop {
                let (consumed, event) = decoder
                    .decode(&buf[..])
                    .map_err(ProxyError::UpstreamProtocol)?;

                if consumed > 0 {
                    send(client, &buf[..consumed]).await?;
                    buf.advance(consumed);
                    relayed += consumed as u64;
                }

                match event {
                    ChunkEvent::Data(_) => {}
                    ChunkEvent::Done => break,
                    ChunkEvent::NeedMore => {
                        if fill(upstream, buf).await? == 0 {
                            return Err(ProxyError::UpstreamClosed);
                        }
                    }
                }
            }
        }

        BodyFraming::UntilClose => loop {
            if !buf.is_empty() {
                send(client, &buf[..]).await?;
                relayed += buf.len() as u64;
                buf.clear();
            }
            if fill(upstream, buf).await? == 0 {
                break;
            }
        },
    }

    client.flush().await.map_err(ProxyError::ClientIo)?;
    Ok(relayed)
}

async fn send<C>(client: &mut C, bytes: &[u8]) -> Result<(), ProxyError>
where
    C: AsyncWrite + Unpin,
{
    client.write_all(bytes).await.map_err(ProxyError::ClientIo)
}

async fn fill<U>(upstream: &mut U, buf: &mut BytesMut) -> Result<usize, ProxyError>
where
    U: AsyncRead + Unpin,
{
    buf.reserve(BUFFER_SIZE);
    upstream.read_buf(buf).await.map_err(ProxyError::UpstreamIo)
}
