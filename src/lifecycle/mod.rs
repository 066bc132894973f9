//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → HTTP server stops accepting → gateway channels closed → store closed
//! ```
//!
//! # Design Decisions
//! - One broadcast channel fans the shutdown out to every long-running task
//! - Gateways reconnect on their own; nothing is persisted for them

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
