//! Gateway push-channel subsystem.
//!
//! # Data Flow
//! ```text
//! GET /gateway/ws (upgrade)
//!     → session.rs (split socket, own the write loop)
//!     → manager.rs register (queue connection_success, join broadcast set)
//!
//! committed mutation
//!     → ChangeNotifier
//!     → manager.rs broadcast (timed send into every channel queue)
//!     → session.rs write loop (JSON text frame)
//!     → gateway pulls /gateway/config
//! ```
//!
//! # Design Decisions
//! - Best-effort delivery: a lost notification is repaired by the next snapshot pull
//! - Each channel has a bounded queue; a full queue past the deadline drops the channel
//! - Channel failures stay inside this module and never fail a mutation

pub mod channel;
pub mod manager;
pub mod protocol;
pub mod session;

use std::time::Duration;

use thiserror::Error;

pub use channel::{ChannelId, ChannelInfo, ChannelState, GatewayChannel, Transport};
pub use manager::{BroadcastReport, ChannelManager};
pub use protocol::{GatewayMessage, GatewayRequest};

/// Failure delivering to one gateway channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("channel {0} is disconnected")]
    Disconnected(ChannelId),

    #[error("send to channel {id} timed out after {after:?}")]
    Timeout { id: ChannelId, after: Duration },

    #[error("transport error on channel {id}: {reason}")]
    Transport { id: ChannelId, reason: String },

    #[error("failed to encode gateway message: {0}")]
    Encode(String),
}

impl ChannelError {
    /// Short label used as a metrics dimension.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Disconnected(_) => "disconnected",
            Self::Timeout { .. } => "timeout",
            Self::Transport { .. } => "transport",
            Self::Encode(_) => "encode",
        }
    }
}
