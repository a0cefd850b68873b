//! Per-request body accumulation
//!
//! The body is collected completely before anything is sent upstream,
//! because the forwarded request announces its exact `Content-Length`.

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::http::chunked::{ChunkEvent, ChunkedDecoder};
use crate::http::parser::BodyFraming;
use crate::proxy::error::ProxyError;

/// Read size for socket reads
pub(crate) const BUFFER_SIZE: usize = 8192;

/// Body bytes of one request, appended in arrival order.
///
/// Each request owns its own buffer; it is moved into the forwarded
/// request once the client has finished sending.
#[derive(Debug, Default)]
pub struct BodyBuffer {
    data: BytesMut,
    chunks: usize,
}

impl BodyBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity),
            chunks: 0,
        }
    }

    /// Appends one received chunk.
    pub fn push(&mut self, chunk: &[u8]) {
        if chunk.is_empty() {
            return;
        }
        self.data.extend_from_slice(chunk);
        self.chunks += 1;
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of non-empty chunks received so far.
    pub fn chunk_count(&self) -> usize {
        self.chunks
    }

    /// Ends accumulation. An empty body yields `None`.
    pub fn finish(self) -> Option<Bytes> {
        if self.data.is_empty() {
            None
        } else {
            Some(self.data.freeze())
        }
    }
}

/// Reads a complete request body from `stream`.
///
/// `pending` holds bytes already read past the request head; it is
/// consumed first. Bytes beyond the end of the body (a pipelined next
/// request) are left in `pending`.
pub async fn read_body<R>(
    stream: &mut R,
    pending: &mut BytesMut,
    framing: BodyFraming,
) -> Result<BodyBuffer, ProxyError>
where
    R: AsyncRead + Unpin,
{
    match framing {
        BodyFraming::Empty | BodyFraming::UntilClose => Ok(BodyBuffer::new()),
        BodyFraming::Length(length) => read_length(stream, pending, length).await,
        BodyFraming::Chunked => read_chunked(stream, pending).await,
    }
}

async fn read_length<R>(
    stream: &mut R,
    pending: &mut BytesMut,
    length: u64,
) -> Result<BodyBuffer, ProxyError>
where
    R: AsyncRead + Unpin,
{
    let mut body = BodyBuffer::with_capacity(length.min(BUFFER_SIZE as u64 * 8) as usize);
    let mut remaining = length;

    loop {
        if !pending.is_empty() {
            let take = remaining.min(pending.len() as u64) as usize;
            body.push(&pending[..take]);
            pending.advance(take);
            remaining -= take as u64;
        }

        if remaining == 0 {
            return Ok(body);
        }

        fill(stream, pending).await?;
        tracing::trace!(received = body.len(), remaining, "Waiting for request body");
    }
}

async fn read_chunked<R>(stream: &mut R, pending: &mut BytesMut) -> Result<BodyBuffer, ProxyError>
where
    R: AsyncRead + Unpin,
{
    let mut body = BodyBuffer::new();
    let mut decoder = ChunkedDecoder::new();

    loop {
        let (consumed, event) = decoder.decode(&pending[..]).map_err(ProxyError::Body)?;

        match event {
            ChunkEvent::Data(range) => {
                body.push(&pending[range]);
                pending.advance(consumed);
            }
            ChunkEvent::NeedMore => {
                pending.advance(consumed);
                fill(stream, pending).await?;
            }
            ChunkEvent::Done => {
                pending.advance(consumed);
                return Ok(body);
            }
        }
    }
}

async fn fill<R>(stream: &mut R, pending: &mut BytesMut) -> Result<(), ProxyError>
where
    R: AsyncRead + Unpin,
{
    pending.reserve(BUFFER_SIZE);
    let n = stream.read_buf(pending).await.map_err(ProxyError::ClientIo)?;
    if n == 0 {
        return Err(ProxyError::ClientClosed);
    }
    Ok(())
}
