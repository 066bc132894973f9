//! Durable route store.
//!
//! # Responsibilities
//! - Open the SQLite pool the repository and snapshot provider share
//! - Create the `routes` / `route_targets` schema
//! - Map rows back into [`RouteConfig`] records
//!
//! # Design Decisions
//! - SQLite transactions are the only serialization point for conflicting writes
//! - Targets reference routes with `ON DELETE CASCADE`; foreign keys are enabled per connection
//! - Length limits live in CHECK constraints so the store rejects oversize rows itself

pub mod schema;

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;

use crate::config::DatabaseConfig;
use crate::error::{map_sqlx_err, ControlPlaneError, ControlPlaneResult};
use crate::model::route::UnknownVariant;
use crate::model::RouteConfig;

/// Handle to the route database. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    pool: SqlitePool,
}

impl ConfigStore {
    /// Open (creating if needed) the database described by `config` and apply the schema.
    pub async fn connect(config: &DatabaseConfig) -> ControlPlaneResult<Self> {
        let in_memory = config.url.contains(":memory:");
        let mut options = SqliteConnectOptions::from_str(&config.url)
            .map_err(map_sqlx_err)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_millis(config.busy_timeout_ms));
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        // Every in-memory connection is its own database, so pin the pool to one
        // connection that never idles out.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(config.max_connections)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(map_sqlx_err)?;

        let store = Self { pool };
        store.migrate().await?;

        tracing::info!(
            url = %config.url,
            max_connections = config.max_connections,
            "Route store ready"
        );
        Ok(store)
    }

    /// Open a private in-memory store. Used by tests and local experiments.
    pub async fn in_memory() -> ControlPlaneResult<Self> {
        Self::connect(&DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            busy_timeout_ms: 5_000,
        })
        .await
    }

    /// Apply the schema. Idempotent.
    pub async fn migrate(&self) -> ControlPlaneResult<()> {
        for statement in schema::STATEMENTS {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_err)?;
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Round-trip a trivial query. Used by the health endpoint.
    pub async fn ping(&self) -> ControlPlaneResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(())
    }

    /// Close every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Columns selected for every route read; [`row_to_route`] reads them by name.
pub(crate) const ROUTE_COLUMNS: &str = "id, owner_id, name, exposed_url, target_url, method, \
     authentication_type, rate_limit, status, load_balancing_enabled, load_balancing_algorithm, \
     security_cors, security_ssl, security_ip_allow_list, created_at, updated_at";

/// Convert a `routes` row into a [`RouteConfig`].
pub(crate) fn row_to_route(row: &SqliteRow) -> ControlPlaneResult<RouteConfig> {
    let auth: String = row.try_get("authentication_type").map_err(map_sqlx_err)?;
    let status: String = row.try_get("status").map_err(map_sqlx_err)?;
    let algorithm: Option<String> = row.try_get("load_balancing_algorithm").map_err(map_sqlx_err)?;
    let allow_list: String = row.try_get("security_ip_allow_list").map_err(map_sqlx_err)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(map_sqlx_err)?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(map_sqlx_err)?;

    Ok(RouteConfig {
        id: row.try_get("id").map_err(map_sqlx_err)?,
        owner_id: row.try_get("owner_id").map_err(map_sqlx_err)?,
        name: row.try_get("name").map_err(map_sqlx_err)?,
        exposed_url: row.try_get("exposed_url").map_err(map_sqlx_err)?,
        target_url: row.try_get("target_url").map_err(map_sqlx_err)?,
        method: row.try_get("method").map_err(map_sqlx_err)?,
        authentication_type: parse_column("authentication_type", &auth)?,
        rate_limit: row.try_get("rate_limit").map_err(map_sqlx_err)?,
        status: parse_column("status", &status)?,
        load_balancing_enabled: row.try_get("load_balancing_enabled").map_err(map_sqlx_err)?,
        load_balancing_algorithm: algorithm
            .as_deref()
            .map(|a| parse_column("load_balancing_algorithm", a))
            .transpose()?,
        security_cors: row.try_get("security_cors").map_err(map_sqlx_err)?,
        security_ssl: row.try_get("security_ssl").map_err(map_sqlx_err)?,
        security_ip_allow_list: serde_json::from_str(&allow_list)
            .map_err(|e| corrupt("security_ip_allow_list", e))?,
        created_at,
        updated_at,
    })
}

fn parse_column<T>(column: &str, value: &str) -> ControlPlaneResult<T>
where
    T: FromStr<Err = UnknownVariant>,
{
    value.parse().map_err(|e| corrupt(column, e))
}

fn corrupt(column: &str, detail: impl std::fmt::Display) -> ControlPlaneError {
    ControlPlaneError::Storage(format!("corrupt column '{column}': {detail}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrate_is_idempotent() {
        let store = ConfigStore::in_memory().await.unwrap();
        store.migrate().await.unwrap();

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name IN ('routes', 'route_targets') ORDER BY name",
        )
        .fetch_all(store.pool())
        .await
        .unwrap();
        assert_eq!(tables, vec!["route_targets", "routes"]);
    }

    #[tokio::test]
    async fn test_foreign_keys_enforced() {
        let store = ConfigStore::in_memory().await.unwrap();
        let err = sqlx::query("INSERT INTO route_targets (route_id, target_url, created_at) VALUES (999, 'http://x', ?)")
            .bind(Utc::now())
            .execute(store.pool())
            .await
            .unwrap_err();
        assert!(matches!(map_sqlx_err(err), ControlPlaneError::Conflict(_)));
    }
}
