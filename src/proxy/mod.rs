//! Reverse proxy functionality
//!
//! This module implements the request forwarding core: prefix matching,
//! body buffering, the upstream exchange and the response relay.

pub mod body;
pub mod error;
pub mod forwarder;
pub mod rewrite;
pub mod upstream;

pub use body::BodyBuffer;
pub use error::ProxyError;
pub use forwarder::{ForwardState, Forwarder, Outcome};
pub use upstream::Upstream;
