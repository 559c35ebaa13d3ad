//! Database state reporting.
//!
//! Read-only companion to the maintenance executor: fetches size, state,
//! and recovery-model information for a target database without mutating
//! anything on the server.

use crate::db::connector::DbPool;
use crate::db::registry::{PooledConnection, PoolRegistry};
use crate::error::{MaintenanceError, MaintenanceResult, is_connection_fault};
use crate::models::{DatabaseStateRow, StatusResponse, TargetProfile};
use std::sync::Arc;
use tokio::time::timeout;
use tracing::debug;

/// Queries the current state of a target database.
#[derive(Debug, Default)]
pub struct StatusQuery;

impl StatusQuery {
    pub fn new() -> Self {
        Self
    }

    /// Fetch the state report for the profile's database and wrap it in the
    /// response envelope. Acquires a pooled connection from the registry.
    pub async fn report(
        &self,
        registry: &PoolRegistry,
        profile: &TargetProfile,
    ) -> MaintenanceResult<StatusResponse> {
        let conn = registry.acquire(profile).await?;
        let rows = self.fetch(&conn, profile).await?;
        Ok(StatusResponse {
            success: true,
            data: rows,
            server_info: profile.server_info(),
        })
    }

    /// Run the per-engine state query, bounded by the profile's request
    /// timeout. Query failures are reported as [`MaintenanceError::Query`].
    pub async fn fetch(
        &self,
        conn: &Arc<PooledConnection>,
        profile: &TargetProfile,
    ) -> MaintenanceResult<Vec<DatabaseStateRow>> {
        debug!(database = %profile.database, "Fetching database status");

        let fetch = async {
            match conn.pool() {
                DbPool::MySql(pool) => mysql::fetch_state(pool, &profile.database).await,
                DbPool::Postgres(pool) => postgres::fetch_state(pool, &profile.database).await,
            }
        };

        match timeout(profile.request_timeout, fetch).await {
            Ok(Ok(rows)) => Ok(rows),
            Ok(Err(e)) => {
                if is_connection_fault(&e) {
                    conn.signal_fault();
                }
                Err(MaintenanceError::query(e.to_string()))
            }
            Err(_) => Err(MaintenanceError::timeout(
                "status query",
                profile.request_timeout.as_millis() as u64,
            )),
        }
    }
}

mod mysql {
    use crate::models::DatabaseStateRow;
    use sqlx::{MySqlPool, Row};

    /// MySQL has no per-database recovery model, so the binary log setting
    /// stands in: binlog on maps to FULL, off to SIMPLE.
    pub(super) async fn fetch_state(
        pool: &MySqlPool,
        database: &str,
    ) -> Result<Vec<DatabaseStateRow>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT CAST(0 AS SIGNED) AS db_id,
                   s.SCHEMA_NAME AS database_name,
                   CAST(COALESCE(SUM(t.DATA_LENGTH + t.INDEX_LENGTH), 0) / 1048576 AS DOUBLE)
                       AS total_size_mb,
                   'ONLINE' AS state,
                   IF(@@log_bin = 1, 'FULL', 'SIMPLE') AS recovery_model
            FROM information_schema.SCHEMATA s
            LEFT JOIN information_schema.TABLES t ON t.TABLE_SCHEMA = s.SCHEMA_NAME
            WHERE s.SCHEMA_NAME = ?
            GROUP BY s.SCHEMA_NAME
            "#,
        )
        .bind(database)
        .fetch_all(pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(DatabaseStateRow {
                    db_id: row.try_get("db_id")?,
                    database_name: row.try_get("database_name")?,
                    total_size_mb: row.try_get("total_size_mb")?,
                    state: row.try_get("state")?,
                    recovery_model: row.try_get("recovery_model")?,
                })
            })
            .collect()
    }
}

mod postgres {
    use crate::models::DatabaseStateRow;
    use sqlx::{PgPool, Row};

    /// `wal_level = minimal` is the closest analogue of a SIMPLE recovery
    /// model; anything higher supports full recovery.
    pub(super) async fn fetch_state(
        pool: &PgPool,
        database: &str,
    ) -> Result<Vec<DatabaseStateRow>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT d.oid::BIGINT AS db_id,
                   d.datname AS database_name,
                   ROUND(pg_database_size(d.datname) / 1048576.0, 2)::FLOAT8 AS total_size_mb,
                   CASE WHEN pg_is_in_recovery() THEN 'RECOVERING' ELSE 'ONLINE' END AS state,
                   CASE WHEN current_setting('wal_level') = 'minimal' THEN 'SIMPLE' ELSE 'FULL' END
                       AS recovery_model
            FROM pg_catalog.pg_database d
            WHERE d.datname = $1
            "#,
        )
        .bind(database)
        .fetch_all(pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(DatabaseStateRow {
                    db_id: row.try_get("db_id")?,
                    database_name: row.try_get("database_name")?,
                    total_size_mb: row.try_get("total_size_mb")?,
                    state: row.try_get("state")?,
                    recovery_model: row.try_get("recovery_model")?,
                })
            })
            .collect()
    }
}
