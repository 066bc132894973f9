//! Gateway channel registry and broadcast.
//!
//! # Responsibilities
//! - Admit channels: send `connection_success`, then add to the broadcast set
//! - Fan a change event out to every connected channel under a per-channel deadline
//! - Drop channels that fail or stall; never retry or buffer for them
//!
//! # Design Decisions
//! - One mutex guards the id → channel map; it is never held across an await
//! - Broadcast iterates a point-in-time copy, so concurrent register/unregister is safe
//! - The acknowledgment is queued before the channel joins the set, so it is always
//!   the first frame a gateway sees

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::mpsc;

use crate::config::GatewayConfig;
use crate::gateway::channel::{ChannelId, ChannelInfo, ChannelState, GatewayChannel, Transport};
use crate::gateway::protocol::GatewayMessage;
use crate::gateway::ChannelError;
use crate::model::ChangeEvent;
use crate::observability::metrics;

/// Outcome of one broadcast call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Owns every live gateway channel.
#[derive(Debug)]
pub struct ChannelManager {
    channels: Mutex<HashMap<ChannelId, Arc<GatewayChannel>>>,
    send_timeout: Duration,
    queue_capacity: usize,
}

impl ChannelManager {
    /// Create a manager from configuration.
    pub fn new(config: &GatewayConfig) -> Self {
        Self::with_limits(Duration::from_millis(config.send_timeout_ms), config.queue_capacity)
    }

    /// Create a manager with explicit limits.
    pub fn with_limits(send_timeout: Duration, queue_capacity: usize) -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            send_timeout,
            queue_capacity: queue_capacity.max(1),
        }
    }

    pub fn send_timeout(&self) -> Duration {
        self.send_timeout
    }

    /// A fresh send queue sized for this manager.
    pub fn transport(&self) -> (Transport, mpsc::Receiver<GatewayMessage>) {
        mpsc::channel(self.queue_capacity)
    }

    /// Admit a channel: acknowledge it, then add it to the broadcast set.
    pub async fn register(&self, transport: Transport, peer: Option<SocketAddr>) -> Result<ChannelId, ChannelError> {
        let channel = Arc::new(GatewayChannel::new(transport, peer));
        let id = channel.id();

        if let Err(e) = channel.send(GatewayMessage::ConnectionSuccess, self.send_timeout).await {
            channel.set_state(ChannelState::Closed);
            metrics::record_channel_failure(e.reason());
            tracing::warn!(channel_id = %id, error = %e, "Gateway failed before acknowledgment");
            return Err(e);
        }

        channel.set_state(ChannelState::Connected);
        let count = {
            let mut channels = self.lock();
            channels.insert(id, channel);
            channels.len()
        };
        metrics::set_gateway_channels(count);

        tracing::info!(
            channel_id = %id,
            peer = ?peer,
            connected = count,
            "Gateway connected"
        );
        Ok(id)
    }

    /// Deliver `event` to every connected channel.
    ///
    /// Channels that error or exceed the send deadline are closed and removed. A failure
    /// on one channel never affects delivery to the others.
    pub async fn broadcast(&self, event: &ChangeEvent) -> BroadcastReport {
        let targets: Vec<Arc<GatewayChannel>> = self
            .lock()
            .values()
            .filter(|c| c.state() == ChannelState::Connected)
            .cloned()
            .collect();

        if targets.is_empty() {
            return BroadcastReport::default();
        }

        let message = GatewayMessage::from(event);
        let deadline = self.send_timeout;
        let results = join_all(targets.iter().map(|channel| {
            let message = message.clone();
            async move { channel.send(message, deadline).await }
        }))
        .await;

        let mut report = BroadcastReport::default();
        for (channel, result) in targets.iter().zip(results) {
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    metrics::record_channel_failure(e.reason());
                    tracing::warn!(
                        channel_id = %channel.id(),
                        sequence = event.sequence,
                        error = %e,
                        "Dropping gateway channel after failed send"
                    );
                    self.unregister(channel.id());
                }
            }
        }
        report
    }

    /// Close and remove a channel. Returns whether it was still registered.
    pub fn unregister(&self, id: ChannelId) -> bool {
        let (removed, count) = {
            let mut channels = self.lock();
            let removed = channels.remove(&id);
            (removed, channels.len())
        };

        let Some(channel) = removed else {
            return false;
        };

        channel.set_state(ChannelState::Closing);
        channel.set_state(ChannelState::Closed);
        metrics::set_gateway_channels(count);
        tracing::info!(channel_id = %id, connected = count, "Gateway disconnected");
        true
    }

    /// Close every channel. Used on shutdown.
    pub fn close_all(&self) -> usize {
        let drained: Vec<Arc<GatewayChannel>> = {
            let mut channels = self.lock();
            for channel in channels.values() {
                channel.set_state(ChannelState::Closing);
            }
            channels.drain().map(|(_, c)| c).collect()
        };

        for channel in &drained {
            channel.set_state(ChannelState::Closed);
        }
        metrics::set_gateway_channels(0);
        if !drained.is_empty() {
            tracing::info!(closed = drained.len(), "Closed all gateway channels");
        }
        drained.len()
    }

    pub fn connected_count(&self) -> usize {
        self.lock()
            .values()
            .filter(|c| c.state() == ChannelState::Connected)
            .count()
    }

    pub fn is_registered(&self, id: ChannelId) -> bool {
        self.lock().contains_key(&id)
    }

    /// Status of every registered channel, ordered by id.
    pub fn channels(&self) -> Vec<ChannelInfo> {
        let mut infos: Vec<ChannelInfo> = self.lock().values().map(|c| c.info()).collect();
        infos.sort_by_key(|i| i.id);
        infos
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ChannelId, Arc<GatewayChannel>>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
