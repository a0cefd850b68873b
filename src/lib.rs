//! Waypoint - prefix-stripping reverse proxy
//!
//! Core library for HTTP and proxy functionality.

pub mod config;
pub mod http;
pub mod proxy;
pub mod server;
