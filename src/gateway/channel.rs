//! Per-gateway channel state and identity.
//!
//! # Responsibilities
//! - Generate unique channel IDs for tracing
//! - Track channel state (Connecting → Connected → Closing → Closed)
//! - Deliver one message into the channel's bounded send queue under a deadline

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::gateway::protocol::GatewayMessage;
use crate::gateway::ChannelError;

/// Global atomic counter for channel IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CHANNEL_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Sending half of a channel's send queue. Whoever holds the receiving half writes
/// queued messages to the actual transport.
pub type Transport = mpsc::Sender<GatewayMessage>;

/// Unique identifier for a gateway channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ChannelId(u64);

impl ChannelId {
    /// Generate a new unique channel ID.
    pub fn new() -> Self {
        Self(CHANNEL_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ChannelId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "gw-{}", self.0)
    }
}

/// Channel lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ChannelState {
    /// Admitted, acknowledgment not yet delivered.
    Connecting = 0,
    /// In the broadcast set.
    Connected = 1,
    /// Being torn down.
    Closing = 2,
    /// Gone; never sent to again.
    Closed = 3,
}

impl ChannelState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Connected,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

/// One connected gateway.
#[derive(Debug)]
pub struct GatewayChannel {
    id: ChannelId,
    peer: Option<SocketAddr>,
    connected_at: DateTime<Utc>,
    state: AtomicU8,
    transport: Transport,
}

impl GatewayChannel {
    pub(crate) fn new(transport: Transport, peer: Option<SocketAddr>) -> Self {
        Self {
            id: ChannelId::new(),
            peer,
            connected_at: Utc::now(),
            state: AtomicU8::new(ChannelState::Connecting as u8),
            transport,
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn state(&self) -> ChannelState {
        ChannelState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, state: ChannelState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Queue `message`, waiting at most `deadline` for space.
    pub(crate) async fn send(&self, message: GatewayMessage, deadline: Duration) -> Result<(), ChannelError> {
        match tokio::time::timeout(deadline, self.transport.send(message)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(ChannelError::Disconnected(self.id)),
            Err(_) => Err(ChannelError::Timeout {
                id: self.id,
                after: deadline,
            }),
        }
    }

    pub fn info(&self) -> ChannelInfo {
        ChannelInfo {
            id: self.id,
            peer: self.peer.map(|p| p.to_string()),
            state: self.state(),
            connected_at: self.connected_at,
        }
    }
}

/// Read-only view of a channel for status output.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelInfo {
    pub id: ChannelId,
    pub peer: Option<String>,
    pub state: ChannelState,
    pub connected_at: DateTime<Utc>,
}
