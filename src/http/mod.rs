//! HTTP subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (tower-http layers: request id, trace, timeout, body limit)
//!     → api (operator auth, route handlers, snapshot, health)
//!     → gateway::session (WebSocket upgrade)
//! ```

pub mod server;

pub use server::{AppState, HttpServer};
