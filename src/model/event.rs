//! Ephemeral change notifications.

use serde::{Deserialize, Serialize};

use crate::model::route::ChangeKind;

/// "Something changed, reconcile." Created right after a commit, broadcast once, dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub operation: ChangeKind,
    pub api_id: i64,
    /// Process-scoped ordering hint; not usable for gap detection.
    pub sequence: u64,
}
