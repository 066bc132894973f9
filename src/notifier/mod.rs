//! Change notifier: turns committed mutations into gateway broadcasts.
//!
//! # Responsibilities
//! - Stamp each change with a process-wide, strictly increasing sequence number
//! - Hand the event to the channel manager
//! - Log the outcome; never report failure back to the mutation
//!
//! Gateways may use gaps in `sequence` as a hint to pull a snapshot. Sequence numbers
//! restart at 1 with the process.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::gateway::{BroadcastReport, ChannelManager};
use crate::model::{ChangeEvent, ChangeKind};
use crate::observability::metrics;
use crate::repository::CommitHook;

/// Broadcasts one [`ChangeEvent`] per committed mutation.
#[derive(Debug)]
pub struct ChangeNotifier {
    channels: Arc<ChannelManager>,
    sequence: AtomicU64,
}

impl ChangeNotifier {
    pub fn new(channels: Arc<ChannelManager>) -> Self {
        Self {
            channels,
            sequence: AtomicU64::new(0),
        }
    }

    /// Broadcast a change to every connected gateway.
    pub async fn notify(&self, operation: ChangeKind, api_id: i64) -> BroadcastReport {
        let event = ChangeEvent {
            operation,
            api_id,
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst) + 1,
        };

        let report = self.channels.broadcast(&event).await;
        metrics::record_notification();

        tracing::info!(
            operation = %event.operation,
            api_id = event.api_id,
            sequence = event.sequence,
            delivered = report.delivered,
            failed = report.failed,
            "Change notification broadcast"
        );
        report
    }

    /// Sequence number of the most recent event, 0 if none yet.
    pub fn last_sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommitHook for ChangeNotifier {
    async fn after_commit(&self, operation: ChangeKind, route_id: i64) {
        self.notify(operation, route_id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::gateway::GatewayMessage;
    use crate::model::RouteDefinition;
    use crate::repository::RouteRepository;
    use crate::store::ConfigStore;

    fn channels() -> Arc<ChannelManager> {
        Arc::new(ChannelManager::with_limits(Duration::from_millis(50), 8))
    }

    #[tokio::test]
    async fn test_sequence_increases() {
        let notifier = ChangeNotifier::new(channels());
        assert_eq!(notifier.last_sequence(), 0);

        notifier.notify(ChangeKind::Create, 1).await;
        notifier.notify(ChangeKind::Delete, 1).await;

        assert_eq!(notifier.last_sequence(), 2);
    }

    #[tokio::test]
    async fn test_notify_without_gateways_is_noop() {
        let notifier = ChangeNotifier::new(channels());
        let report = notifier.notify(ChangeKind::Update, 9).await;
        assert_eq!(report, BroadcastReport::default());
    }

    #[tokio::test]
    async fn test_committed_mutations_reach_gateways() {
        let channels = channels();
        let notifier = Arc::new(ChangeNotifier::new(channels.clone()));
        let store = ConfigStore::in_memory().await.unwrap();
        let repo = RouteRepository::new(store).with_commit_hook(notifier.clone());

        let (tx, mut rx) = channels.transport();
        channels.register(tx, None).await.unwrap();
        assert_eq!(rx.recv().await, Some(GatewayMessage::ConnectionSuccess));

        let def = RouteDefinition {
            name: "svc".into(),
            exposed_url: "/svc".into(),
            target_url: "http://a".into(),
            method: "GET".into(),
            ..Default::default()
        };
        let route = repo.create_route(1, def.clone()).await.unwrap();
        repo.update_route(route.id, 1, def).await.unwrap();
        repo.delete_route(route.id, 1).await.unwrap();

        let mut seen: Vec<(ChangeKind, u64)> = Vec::new();
        for _ in 0..3 {
            match rx.recv().await {
                Some(GatewayMessage::ConfigUpdate {
                    operation,
                    api_id,
                    sequence,
                }) => {
                    assert_eq!(api_id, route.id);
                    seen.push((operation, sequence));
                }
                other => panic!("unexpected message: {other:?}"),
            }
        }
        assert_eq!(
            seen,
            vec![(ChangeKind::Create, 1), (ChangeKind::Update, 2), (ChangeKind::Delete, 3)]
        );
    }

    #[tokio::test]
    async fn test_failed_mutation_is_not_notified() {
        let channels = channels();
        let notifier = Arc::new(ChangeNotifier::new(channels.clone()));
        let store = ConfigStore::in_memory().await.unwrap();
        let repo = RouteRepository::new(store).with_commit_hook(notifier.clone());

        let (tx, mut rx) = channels.transport();
        channels.register(tx, None).await.unwrap();
        rx.recv().await;

        assert!(repo.delete_route(404, 1).await.is_err());
        assert!(repo.create_route(1, RouteDefinition::default()).await.is_err());

        assert_eq!(notifier.last_sequence(), 0);
        assert!(rx.try_recv().is_err());
    }
}
