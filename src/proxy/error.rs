//! Forwarding failures
//!
//! Every error ends the request it happened in; nothing is retried. The
//! variant decides what, if anything, the client still receives.

use std::io;

use thiserror::Error;

use crate::http::parser::ParseError;
use crate::http::response::StatusCode;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("client closed the connection before the body was complete")]
    ClientClosed,

    #[error("client I/O error: {0}")]
    ClientIo(#[source] io::Error),

    #[error("malformed request body: {0}")]
    Body(#[source] ParseError),

    #[error("failed to connect to upstream {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("upstream I/O error: {0}")]
    UpstreamIo(#[source] io::Error),

    #[error("upstream closed the connection before the response was complete")]
    UpstreamClosed,

    #[error("malformed upstream response: {0}")]
    UpstreamProtocol(#[source] ParseError),
}

impl ProxyError {
    /// The client side of the exchange broke; there is nobody left to answer.
    pub fn is_client_side(&self) -> bool {
        matches!(self, ProxyError::ClientClosed | ProxyError::ClientIo(_))
    }

    /// Status reported to the client when forwarding fails before any part
    /// of the upstream response was relayed.
    ///
    /// Network-level failures (refused, reset, unresolvable, timed out,
    /// hung up) map to 504; anything else is a 500.
    pub fn gateway_status(&self) -> StatusCode {
        match self {
            ProxyError::Connect { .. } | ProxyError::UpstreamClosed => StatusCode::GatewayTimeout,
            ProxyError::UpstreamIo(e) if is_network_error(e) => StatusCode::GatewayTimeout,
            ProxyError::Body(_) => StatusCode::BadRequest,
            _ => StatusCode::InternalServerError,
        }
    }
}

fn is_network_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::TimedOut
            | io::ErrorKind::NotFound
    )
}
