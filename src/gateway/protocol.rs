//! Push-channel wire format.
//!
//! Server → gateway frames are JSON text:
//! ```text
//! {"type":"connection_success"}
//! {"type":"config_update","operation":"delete","apiId":5,"sequence":12}
//! ```
//! A `config_update` never carries route state; the receiver must pull a snapshot.

use serde::{Deserialize, Serialize};

use crate::model::{ChangeEvent, ChangeKind};

/// Messages sent to gateways.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayMessage {
    /// Sent exactly once, first, on every new channel.
    ConnectionSuccess,

    /// A route changed; reconcile via snapshot pull.
    ConfigUpdate {
        operation: ChangeKind,
        #[serde(rename = "apiId")]
        api_id: i64,
        sequence: u64,
    },
}

impl From<&ChangeEvent> for GatewayMessage {
    fn from(event: &ChangeEvent) -> Self {
        Self::ConfigUpdate {
            operation: event.operation,
            api_id: event.api_id,
            sequence: event.sequence,
        }
    }
}

/// Messages a gateway may send. Correctness never depends on them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayRequest {
    Subscribe,
}
