//! HTTP/1.1 protocol implementation.
//!
//! Just enough of HTTP/1.1 to sit between a client and one backend with
//! keep-alive connections on the client side.
//!
//! # Architecture
//!
//! - **`connection`**: The per-client connection loop
//! - **`parser`**: Parses request and response heads, decides body framing
//! - **`chunked`**: Incremental `Transfer-Encoding: chunked` decoder
//! - **`headers`**: Ordered, case-insensitive header list
//! - **`request`**: Request head representation
//! - **`response`**: Locally generated responses and upstream response heads
//! - **`writer`**: Serializes and writes local responses to the client
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌─────────────┐
//!        │   Reading   │ ← Wait for a request head
//!        └──────┬──────┘
//!               │ Head received
//!               ▼
//!        ┌──────────────────┐
//!        │   Processing     │ ← Forward upstream, or fall through
//!        └──────┬───────────┘
//!               │ Local response (404 / 400)
//!               ▼
//!        ┌──────────────────┐
//!        │    Writing       │ ← Send it to the client
//!        └──────┬───────────┘
//!               │
//!               ├─ Keep-Alive → Reading (same connection)
//!               └─ Close → Closed
//! ```
//!
//! Forwarded requests go from `Processing` straight back to `Reading` (or
//! `Closed`): the forwarder writes the relayed response itself.

pub mod chunked;
pub mod connection;
pub mod headers;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;
