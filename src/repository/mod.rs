//! Route repository: atomic create/update/delete of a route plus its targets.
//!
//! # Data Flow
//! ```text
//! RouteDefinition
//!     → validated() (required fields, normalization)
//!     → one SQLite transaction (route row + every target row)
//!     → commit
//!     → CommitHook::after_commit (change notification)
//!     → RouteConfig returned to the caller
//! ```
//!
//! # Design Decisions
//! - A failed statement rolls the whole transaction back before the error surfaces
//! - Target lists are replaced wholesale on load-balanced updates, never diffed
//! - Every owner-scoped statement uses the same ownership predicate
//! - The hook runs only after a durable commit and cannot change the outcome
//! - Commit and hook run on a spawned task, so cancelling the caller never splits them

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Sqlite, SqliteConnection, Transaction};

use crate::error::{map_sqlx_err, ControlPlaneError, ControlPlaneResult};
use crate::model::{ChangeKind, LoadBalancingTarget, RouteConfig, RouteDefinition, RouteWithTargets};
use crate::observability::metrics;
use crate::store::{row_to_route, ConfigStore, ROUTE_COLUMNS};

/// Ownership predicate shared by every owner-scoped statement.
/// Binds the route id, then the owner id.
const OWNED_ROUTE: &str = "id = ? AND owner_id = ?";

/// Side effect run once per committed mutation.
#[async_trait]
pub trait CommitHook: Send + Sync {
    async fn after_commit(&self, operation: ChangeKind, route_id: i64);
}

/// Transactional operations over route definitions.
#[derive(Clone)]
pub struct RouteRepository {
    store: ConfigStore,
    hook: Option<Arc<dyn CommitHook>>,
}

impl RouteRepository {
    /// Create a repository without a commit hook.
    pub fn new(store: ConfigStore) -> Self {
        Self { store, hook: None }
    }

    /// Attach the hook invoked after every committed mutation.
    pub fn with_commit_hook(mut self, hook: Arc<dyn CommitHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Create a route and its targets in one transaction.
    pub async fn create_route(
        &self,
        owner_id: i64,
        definition: RouteDefinition,
    ) -> ControlPlaneResult<RouteConfig> {
        let definition = definition.validated()?;
        let repo = self.clone();
        detached(async move { repo.commit_create(owner_id, definition).await }).await
    }

    /// Update a route owned by `owner_id`.
    ///
    /// With load balancing enabled the stored target list is replaced by
    /// `definition.load_balancing.targets`; with it disabled the stored list is left as is
    /// and ignored by readers.
    pub async fn update_route(
        &self,
        id: i64,
        owner_id: i64,
        definition: RouteDefinition,
    ) -> ControlPlaneResult<RouteConfig> {
        let definition = definition.validated()?;
        let repo = self.clone();
        detached(async move { repo.commit_update(id, owner_id, definition).await }).await
    }

    /// Delete a route owned by `owner_id`. Its targets go with it.
    pub async fn delete_route(&self, id: i64, owner_id: i64) -> ControlPlaneResult<()> {
        let repo = self.clone();
        detached(async move { repo.commit_delete(id, owner_id).await }).await
    }

    async fn commit_create(
        &self,
        owner_id: i64,
        definition: RouteDefinition,
    ) -> ControlPlaneResult<RouteConfig> {
        let mut tx = self.begin().await?;
        let result = insert_route(&mut tx, owner_id, &definition).await;
        let route = finish(tx, result).await?;

        tracing::info!(
            api_id = route.id,
            owner_id,
            exposed_url = %route.exposed_url,
            targets = definition.load_balancing.targets.len(),
            "Route created"
        );
        self.after_commit(ChangeKind::Create, route.id).await;
        Ok(route)
    }

    async fn commit_update(
        &self,
        id: i64,
        owner_id: i64,
        definition: RouteDefinition,
    ) -> ControlPlaneResult<RouteConfig> {
        let mut tx = self.begin().await?;
        let result = update_route_row(&mut tx, id, owner_id, &definition).await;
        let route = finish(tx, result).await?;

        tracing::info!(api_id = id, owner_id, status = %route.status, "Route updated");
        self.after_commit(ChangeKind::Update, id).await;
        Ok(route)
    }

    async fn commit_delete(&self, id: i64, owner_id: i64) -> ControlPlaneResult<()> {
        let mut tx = self.begin().await?;
        let result = delete_route_row(&mut tx, id, owner_id).await;
        finish(tx, result).await?;

        tracing::info!(api_id = id, owner_id, "Route deleted");
        self.after_commit(ChangeKind::Delete, id).await;
        Ok(())
    }

    /// All routes owned by `owner_id`, newest first.
    pub async fn list_routes(&self, owner_id: i64) -> ControlPlaneResult<Vec<RouteConfig>> {
        let rows = sqlx::query(&format!(
            "SELECT {ROUTE_COLUMNS} FROM routes WHERE owner_id = ? ORDER BY created_at DESC, id DESC"
        ))
        .bind(owner_id)
        .fetch_all(self.store.pool())
        .await
        .map_err(map_sqlx_err)?;

        rows.iter().map(row_to_route).collect()
    }

    /// A single route owned by `owner_id`, with its stored target list.
    pub async fn get_route(&self, id: i64, owner_id: i64) -> ControlPlaneResult<RouteWithTargets> {
        let mut tx = self.begin().await?;
        let result = fetch_owned_route(&mut tx, id, owner_id).await;
        finish(tx, result).await
    }

    async fn begin(&self) -> ControlPlaneResult<Transaction<'static, Sqlite>> {
        self.store.pool().begin().await.map_err(map_sqlx_err)
    }

    async fn after_commit(&self, operation: ChangeKind, route_id: i64) {
        metrics::record_mutation(operation);
        if let Some(hook) = &self.hook {
            hook.after_commit(operation, route_id).await;
        }
    }
}

impl std::fmt::Debug for RouteRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteRepository")
            .field("store", &self.store)
            .field("has_hook", &self.hook.is_some())
            .finish()
    }
}

/// Run a mutation (transaction, commit and hook) on its own task.
///
/// The caller may be cancelled (client disconnect, request timeout) at any await point;
/// the spawned task still carries a commit through to its notification.
async fn detached<T, F>(work: F) -> ControlPlaneResult<T>
where
    F: Future<Output = ControlPlaneResult<T>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(work)
        .await
        .map_err(|e| ControlPlaneError::Storage(format!("mutation task failed: {e}")))?
}

/// Commit on success, roll back on failure. The original error wins over a rollback error.
async fn finish<T>(
    tx: Transaction<'static, Sqlite>,
    result: ControlPlaneResult<T>,
) -> ControlPlaneResult<T> {
    match result {
        Ok(value) => {
            tx.commit().await.map_err(map_sqlx_err)?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::error!(error = %rollback_err, "Rollback failed");
            }
            Err(err)
        }
    }
}

async fn insert_route(
    conn: &mut SqliteConnection,
    owner_id: i64,
    def: &RouteDefinition,
) -> ControlPlaneResult<RouteConfig> {
    let now = Utc::now();
    let allow_list = allow_list_json(def)?;

    let row = sqlx::query(&format!(
        "INSERT INTO routes
            (owner_id, name, exposed_url, target_url, method, authentication_type, rate_limit,
             status, load_balancing_enabled, load_balancing_algorithm, security_cors, security_ssl,
             security_ip_allow_list, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         RETURNING {ROUTE_COLUMNS}"
    ))
    .bind(owner_id)
    .bind(&def.name)
    .bind(&def.exposed_url)
    .bind(&def.target_url)
    .bind(&def.method)
    .bind(def.auth_type.as_str())
    .bind(def.rate_limit)
    .bind(def.status.unwrap_or_default().as_str())
    .bind(def.load_balancing.enabled)
    .bind(def.load_balancing.algorithm.map(|a| a.as_str()))
    .bind(def.security.cors)
    .bind(def.security.ssl)
    .bind(allow_list)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *conn)
    .await
    .map_err(map_sqlx_err)?;

    let route = row_to_route(&row)?;

    if def.load_balancing.enabled {
        insert_targets(conn, route.id, &def.load_balancing.targets).await?;
    }

    Ok(route)
}

async fn update_route_row(
    conn: &mut SqliteConnection,
    id: i64,
    owner_id: i64,
    def: &RouteDefinition,
) -> ControlPlaneResult<RouteConfig> {
    let allow_list = allow_list_json(def)?;

    let row = sqlx::query(&format!(
        "UPDATE routes
         SET name = ?, exposed_url = ?, target_url = ?, method = ?, authentication_type = ?,
             rate_limit = ?, status = COALESCE(?, status), load_balancing_enabled = ?,
             load_balancing_algorithm = ?, security_cors = ?, security_ssl = ?,
             security_ip_allow_list = ?, updated_at = ?
         WHERE {OWNED_ROUTE}
         RETURNING {ROUTE_COLUMNS}"
    ))
    .bind(&def.name)
    .bind(&def.exposed_url)
    .bind(&def.target_url)
    .bind(&def.method)
    .bind(def.auth_type.as_str())
    .bind(def.rate_limit)
    .bind(def.status.map(|s| s.as_str()))
    .bind(def.load_balancing.enabled)
    .bind(def.load_balancing.algorithm.map(|a| a.as_str()))
    .bind(def.security.cors)
    .bind(def.security.ssl)
    .bind(allow_list)
    .bind(Utc::now())
    .bind(id)
    .bind(owner_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(map_sqlx_err)?
    .ok_or(ControlPlaneError::NotFound(id))?;

    let route = row_to_route(&row)?;

    if def.load_balancing.enabled {
        sqlx::query("DELETE FROM route_targets WHERE route_id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await
            .map_err(map_sqlx_err)?;
        insert_targets(conn, id, &def.load_balancing.targets).await?;
    }

    Ok(route)
}

async fn delete_route_row(conn: &mut SqliteConnection, id: i64, owner_id: i64) -> ControlPlaneResult<()> {
    let deleted = sqlx::query(&format!("DELETE FROM routes WHERE {OWNED_ROUTE}"))
        .bind(id)
        .bind(owner_id)
        .execute(&mut *conn)
        .await
        .map_err(map_sqlx_err)?
        .rows_affected();

    if deleted == 0 {
        return Err(ControlPlaneError::NotFound(id));
    }
    Ok(())
}

async fn fetch_owned_route(
    conn: &mut SqliteConnection,
    id: i64,
    owner_id: i64,
) -> ControlPlaneResult<RouteWithTargets> {
    let row = sqlx::query(&format!("SELECT {ROUTE_COLUMNS} FROM routes WHERE {OWNED_ROUTE}"))
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(map_sqlx_err)?
        .ok_or(ControlPlaneError::NotFound(id))?;

    let route = row_to_route(&row)?;
    let targets = fetch_targets(conn, id).await?;

    Ok(RouteWithTargets {
        route,
        load_balancing_targets: targets.into_iter().map(|t| t.target_url).collect(),
    })
}

async fn insert_targets(conn: &mut SqliteConnection, route_id: i64, targets: &[String]) -> ControlPlaneResult<()> {
    let now = Utc::now();
    for target in targets {
        sqlx::query("INSERT INTO route_targets (route_id, target_url, created_at) VALUES (?, ?, ?)")
            .bind(route_id)
            .bind(target)
            .bind(now)
            .execute(&mut *conn)
            .await
            .map_err(map_sqlx_err)?;
    }
    Ok(())
}

/// Targets of one route in insertion order.
pub(crate) async fn fetch_targets(
    conn: &mut SqliteConnection,
    route_id: i64,
) -> ControlPlaneResult<Vec<LoadBalancingTarget>> {
    let targets = sqlx::query_as::<_, (i64, i64, String)>(
        "SELECT id, route_id, target_url FROM route_targets WHERE route_id = ? ORDER BY id ASC",
    )
    .bind(route_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(map_sqlx_err)?
    .into_iter()
    .map(|(id, route_id, target_url)| LoadBalancingTarget { id, route_id, target_url })
    .collect();

    Ok(targets)
}

fn allow_list_json(def: &RouteDefinition) -> ControlPlaneResult<String> {
    serde_json::to_string(&def.security.ip_allow_list)
        .map_err(|e| ControlPlaneError::Storage(format!("failed to encode allow list: {e}")))
}
