//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → plain: tokio TcpListener handed to axum::serve
//!     → tls.rs: rustls acceptor via axum-server
//!     → HTTP layer
//! ```

pub mod tls;
