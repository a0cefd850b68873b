use std::net::SocketAddr;
use std::sync::Arc;

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};

use crate::http::parser::{ParseError, parse_request_head, request_framing};
use crate::http::request::RequestHead;
use crate::http::response::Response;
use crate::http::writer::ResponseWriter;
use crate::proxy::body::read_body;
use crate::proxy::forwarder::{Forwarder, Outcome};

const READ_CHUNK: usize = 4096;

pub struct Connection<S> {
    stream: S,
    peer: SocketAddr,
    buffer: BytesMut,
    forwarder: Arc<Forwarder>,
    state: ConnectionState,
}

pub enum ConnectionState {
    Reading,
    Processing(RequestHead),
    Writing(ResponseWriter, bool), // bool = keep_alive?
    Closed,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, peer: SocketAddr, forwarder: Arc<Forwarder>) -> Self {
        Self {
            stream,
            peer,
            buffer: BytesMut::with_capacity(READ_CHUNK),
            forwarder,
            state: ConnectionState::Reading,
        }
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        loop {
            match &mut self.state {
                ConnectionState::Reading => match self.read_request().await {
                    Ok(Some(req)) => {
                        self.state = ConnectionState::Processing(req);
                    }
                    Ok(None) => {
                        self.state = ConnectionState::Closed;
                    }
                    Err(ReadError::Parse(e)) => {
                        tracing::warn!(peer = %self.peer, error = %e, "Malformed request");
                        let writer = ResponseWriter::new(&Response::bad_request());
                        self.state = ConnectionState::Writing(writer, false);
                    }
                    Err(ReadError::Io(e)) => return Err(e.into()),
                },

                ConnectionState::Processing(req) => {
                    let req = req.clone();
                    self.state = self.handle_request(req).await;
                }

                ConnectionState::Writing(writer, keep_alive) => {
                    writer.write_to_stream(&mut self.stream).await?;

                    if *keep_alive {
                        self.state = ConnectionState::Reading; // go back for next request
                    } else {
                        self.state = ConnectionState::Closed;
                    }
                }

                ConnectionState::Closed => {
                    break;
                }
            }
        }

        Ok(())
    }

    /// Reads the next request head. Body bytes that arrived with it stay
    /// buffered for whoever consumes the body.
    pub async fn read_request(&mut self) -> Result<Option<RequestHead>, ReadError> {
        loop {
            match parse_request_head(&self.buffer[..]) {
                Ok((request, consumed)) => {
                    self.buffer.advance(consumed);
                    return Ok(Some(request));
                }

                Err(ParseError::Incomplete) => {
                    // Need more data
                }

                Err(e) => return Err(ReadError::Parse(e)),
            }

            self.buffer.reserve(READ_CHUNK);
            let n = self.stream.read_buf(&mut self.buffer).await.map_err(ReadError::Io)?;

            if n == 0 {
                if !self.buffer.is_empty() {
                    tracing::debug!(peer = %self.peer, "Client closed mid-request");
                }
                return Ok(None);
            }
        }
    }

    async fn handle_request(&mut self, req: RequestHead) -> ConnectionState {
        tracing::info!(peer = %self.peer, method = %req.method, path = %req.path, "Request received");

        let Some(path) = self.forwarder.rewrite(&req.path) else {
            return self.not_found(req).await;
        };

        tracing::debug!(from = %req.path, to = %path, "Path rewritten");

        match self
            .forwarder
            .forward(&req, path, &mut self.stream, &mut self.buffer)
            .await
        {
            Outcome::KeepAlive => ConnectionState::Reading,
            Outcome::Close => ConnectionState::Closed,
        }
    }

    /// Fall-through for paths outside the prefix. The body is drained so the
    /// connection stays usable for the next request.
    async fn not_found(&mut self, req: RequestHead) -> ConnectionState {
        tracing::debug!(path = %req.path, prefix = %self.forwarder.prefix(), "No route for request");

        let keep_alive = match request_framing(&req) {
            Ok(framing) => match read_body(&mut self.stream, &mut self.buffer, framing).await {
                Ok(_) => req.keep_alive(),
                Err(e) => {
                    tracing::debug!(peer = %self.peer, error = %e, "Failed to drain request body");
                    return ConnectionState::Closed;
                }
            },
            Err(_) => false,
        };

        let response = Response::not_found(req.method.as_str(), req.path_only());
        ConnectionState::Writing(ResponseWriter::new(&response), keep_alive)
    }
}

#[derive(Debug)]
pub enum ReadError {
    Parse(ParseError),
    Io(std::io::Error),
}
