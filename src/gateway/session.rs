//! WebSocket session for one gateway.
//!
//! # Responsibilities
//! - Complete the upgrade and register the channel
//! - Drain the channel's send queue onto the socket as JSON text frames
//! - Read (and mostly ignore) gateway frames until the peer goes away
//! - Unregister on any exit path
//!
//! # Data Flow
//! ```text
//! ChannelManager ──mpsc──→ write loop ──text frames──→ Gateway
//!                          read loop  ←──frames──────── Gateway
//! ```
//!
//! # Design Decisions
//! - The queue closes when the manager drops the channel; the write loop then sends
//!   a Close frame, which is how eviction and shutdown reach the socket
//! - Ping/pong is answered by axum; the read loop only watches for Close

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::Response;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::gateway::channel::ChannelId;
use crate::gateway::protocol::{GatewayMessage, GatewayRequest};
use crate::gateway::{ChannelError, ChannelManager};
use crate::http::server::AppState;

/// `GET /gateway/ws`
pub async fn gateway_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
) -> Response {
    let channels = state.channels.clone();
    ws.on_upgrade(move |socket| run_session(socket, channels, Some(peer)))
}

/// Drive one gateway connection to completion.
pub async fn run_session(socket: WebSocket, channels: Arc<ChannelManager>, peer: Option<SocketAddr>) {
    let (transport, mut queue) = channels.transport();
    let id = match channels.register(transport, peer).await {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!(peer = ?peer, error = %e, "Gateway registration failed");
            return;
        }
    };

    let (mut sink, mut stream) = socket.split();
    let write_timeout = channels.send_timeout();

    tokio::select! {
        result = write_loop(id, &mut sink, &mut queue, write_timeout) => {
            if let Err(e) = result {
                tracing::warn!(channel_id = %id, error = %e, "Gateway write failed");
            }
        }
        _ = read_loop(id, &mut stream) => {
            tracing::debug!(channel_id = %id, "Gateway closed the connection");
        }
    }

    channels.unregister(id);
}

async fn write_loop(
    id: ChannelId,
    sink: &mut SplitSink<WebSocket, Message>,
    queue: &mut mpsc::Receiver<GatewayMessage>,
    write_timeout: Duration,
) -> Result<(), ChannelError> {
    while let Some(message) = queue.recv().await {
        let text = serde_json::to_string(&message).map_err(|e| ChannelError::Encode(e.to_string()))?;

        match tokio::time::timeout(write_timeout, sink.send(Message::Text(text.into()))).await {
            Ok(Ok(())) => {
                if let GatewayMessage::ConfigUpdate { sequence, .. } = message {
                    tracing::trace!(channel_id = %id, sequence, "Frame written");
                }
            }
            Ok(Err(e)) => {
                return Err(ChannelError::Transport {
                    id,
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                return Err(ChannelError::Timeout {
                    id,
                    after: write_timeout,
                })
            }
        }
    }

    // Queue closed: the manager evicted this channel or is shutting down.
    let _ = sink.send(Message::Close(None)).await;
    Ok(())
}

async fn read_loop(id: ChannelId, stream: &mut SplitStream<WebSocket>) {
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<GatewayRequest>(text.as_str()) {
                Ok(GatewayRequest::Subscribe) => {
                    tracing::debug!(channel_id = %id, "Gateway subscribed");
                }
                Err(_) => {
                    tracing::debug!(channel_id = %id, "Ignoring unrecognized gateway frame");
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(channel_id = %id, error = %e, "Gateway read error");
                break;
            }
        }
    }
}
