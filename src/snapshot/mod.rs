//! Snapshot provider: the authoritative set of servable routes.
//!
//! Gateways call this after connecting, after every `config_update`, and whenever they
//! suspect they missed one. The result reflects committed state only: both reads run in
//! one read transaction, so a route row and its target list always come from the same
//! commit.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{map_sqlx_err, ControlPlaneResult};
use crate::model::RouteConfig;
use crate::store::{row_to_route, ConfigStore, ROUTE_COLUMNS};

/// One servable route as seen by a gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRoute {
    #[serde(flatten)]
    pub route: RouteConfig,

    /// Present only when load balancing is enabled, in insertion order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_balancing_targets: Option<Vec<String>>,
}

/// Builds full snapshots from the route store.
#[derive(Debug, Clone)]
pub struct SnapshotProvider {
    store: ConfigStore,
}

impl SnapshotProvider {
    pub fn new(store: ConfigStore) -> Self {
        Self { store }
    }

    /// Every active, servable route ordered by id ascending.
    ///
    /// Load-balanced routes without a single target are left out.
    pub async fn active_snapshot(&self) -> ControlPlaneResult<Vec<SnapshotRoute>> {
        let mut tx = self.store.pool().begin().await.map_err(map_sqlx_err)?;

        let rows = sqlx::query(&format!(
            "SELECT {ROUTE_COLUMNS} FROM routes WHERE status = 'active' ORDER BY id ASC"
        ))
        .fetch_all(&mut *tx)
        .await
        .map_err(map_sqlx_err)?;

        let target_rows = sqlx::query_as::<_, (i64, String)>(
            "SELECT t.route_id, t.target_url
             FROM route_targets t
             JOIN routes r ON r.id = t.route_id
             WHERE r.status = 'active' AND r.load_balancing_enabled
             ORDER BY t.route_id ASC, t.id ASC",
        )
        .fetch_all(&mut *tx)
        .await
        .map_err(map_sqlx_err)?;

        tx.commit().await.map_err(map_sqlx_err)?;

        let mut targets: HashMap<i64, Vec<String>> = HashMap::new();
        for (route_id, url) in target_rows {
            targets.entry(route_id).or_default().push(url);
        }

        let mut snapshot = Vec::with_capacity(rows.len());
        for row in &rows {
            let route = row_to_route(row)?;
            let load_balancing_targets = if route.load_balancing_enabled {
                match targets.remove(&route.id) {
                    Some(list) if !list.is_empty() => Some(list),
                    _ => {
                        tracing::debug!(api_id = route.id, "Skipping load-balanced route without targets");
                        continue;
                    }
                }
            } else {
                None
            };
            snapshot.push(SnapshotRoute {
                route,
                load_balancing_targets,
            });
        }

        tracing::debug!(routes = snapshot.len(), "Snapshot built");
        Ok(snapshot)
    }
}
