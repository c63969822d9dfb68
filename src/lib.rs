//! line-relay
//!
//! A line-oriented TCP broadcast relay: bytes sent by one connected client,
//! up to a configurable delimiter, are forwarded verbatim to every
//! registered connection (the sender included). Delivery is best-effort; a
//! recipient that errors, stalls past the write deadline, or accepts a
//! short write is evicted rather than throttled.

pub mod config;
pub mod error;
pub mod registry;
pub mod relay;
pub mod server;

pub use config::RelayConfig;
pub use error::RelayError;
pub use registry::{ConnectionHandle, ConnectionId, ConnectionRegistry};
pub use server::Server;
