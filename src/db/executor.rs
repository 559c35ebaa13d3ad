//! Maintenance execution engine.
//!
//! Runs an ordered batch of maintenance tasks against a target database and
//! gathers post-execution telemetry. `run` never returns an error: every
//! outcome, including pool-acquisition failure, becomes an
//! [`ExecutionRecord`] with status `completed` or `failed` and the elapsed
//! duration measured to the point of completion or failure.
//!
//! # Batch semantics
//!
//! The task list is rendered as one multi-statement unit built entirely from
//! the [`MaintenanceTask`] allow-list; caller input never reaches SQL text.
//! The database context comes from the pool's own connect options. A failure
//! anywhere in the batch aborts the remaining statements, so on failure no
//! task is reported as individually completed. Callers that need independent
//! task outcomes submit tasks as separate `run` calls.

use crate::db::connector::DbPool;
use crate::db::registry::{PooledConnection, PoolRegistry};
use crate::error::{MaintenanceError, MaintenanceResult, is_connection_fault};
use crate::models::{ExecutionRecord, MaintenanceTask, TargetProfile, TelemetryRow};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::timeout;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Executes maintenance batches and collects telemetry.
#[derive(Debug, Default)]
pub struct MaintenanceExecutor;

impl MaintenanceExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Run `tasks` as one atomic batch against the profile's target.
    ///
    /// On batch success a telemetry query returns one row per data file in
    /// the target database; a telemetry failure still fails the execution
    /// because the contract requires telemetry to be attached on success.
    pub async fn run(
        &self,
        registry: &PoolRegistry,
        profile: &TargetProfile,
        tasks: &[MaintenanceTask],
    ) -> ExecutionRecord {
        let execution_id = Uuid::new_v4();
        let start = Instant::now();
        let server_info = profile.server_info();

        info!(
            execution_id = %execution_id,
            database = %profile.database,
            task_count = tasks.len(),
            "Starting maintenance process"
        );

        let outcome = self.run_inner(registry, profile, tasks).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(db_info) => {
                info!(
                    execution_id = %execution_id,
                    duration_ms,
                    db_info_count = db_info.len(),
                    "Maintenance process completed"
                );
                ExecutionRecord::completed(execution_id, &server_info, tasks, duration_ms, db_info)
            }
            Err(e) => {
                error!(
                    execution_id = %execution_id,
                    duration_ms,
                    error = %e,
                    "Maintenance process failed"
                );
                ExecutionRecord::failed(execution_id, &server_info, tasks, duration_ms, &e)
            }
        }
    }

    async fn run_inner(
        &self,
        registry: &PoolRegistry,
        profile: &TargetProfile,
        tasks: &[MaintenanceTask],
    ) -> MaintenanceResult<Vec<TelemetryRow>> {
        let conn = registry.acquire(profile).await?;

        self.execute_batch(&conn, profile, tasks).await?;

        self.fetch_telemetry(&conn, profile)
            .await
            .map_err(|e| match e {
                MaintenanceError::Timeout { .. } => e,
                other => MaintenanceError::telemetry(other.to_string()),
            })
    }

    /// Render the task sequence as one multi-statement batch. Built only
    /// from the closed enum, so no request input is ever interpolated.
    fn batch_sql(tasks: &[MaintenanceTask]) -> String {
        tasks
            .iter()
            .map(|t| format!("CALL {}();", t.procedure()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    async fn execute_batch(
        &self,
        conn: &Arc<PooledConnection>,
        profile: &TargetProfile,
        tasks: &[MaintenanceTask],
    ) -> MaintenanceResult<()> {
        let batch = Self::batch_sql(tasks);
        debug!(database = %profile.database, statements = tasks.len(), "Executing maintenance batch");

        let execute = async {
            match conn.pool() {
                DbPool::MySql(pool) => sqlx::raw_sql(&batch).execute(pool).await.map(|_| ()),
                DbPool::Postgres(pool) => sqlx::raw_sql(&batch).execute(pool).await.map(|_| ()),
            }
        };

        match timeout(profile.request_timeout, execute).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                if is_connection_fault(&e) {
                    conn.signal_fault();
                }
                Err(MaintenanceError::execution(e.to_string()))
            }
            Err(_) => Err(MaintenanceError::timeout(
                "maintenance batch",
                profile.request_timeout.as_millis() as u64,
            )),
        }
    }

    async fn fetch_telemetry(
        &self,
        conn: &Arc<PooledConnection>,
        profile: &TargetProfile,
    ) -> MaintenanceResult<Vec<TelemetryRow>> {
        let fetch = async {
            match conn.pool() {
                DbPool::MySql(pool) => mysql::fetch_file_telemetry(pool, &profile.database).await,
                DbPool::Postgres(pool) => {
                    postgres::fetch_file_telemetry(pool, &profile.database).await
                }
            }
        };

        match timeout(profile.request_timeout, fetch).await {
            Ok(Ok(rows)) => Ok(rows),
            Ok(Err(e)) => {
                if is_connection_fault(&e) {
                    conn.signal_fault();
                }
                Err(e.into())
            }
            Err(_) => Err(MaintenanceError::timeout(
                "telemetry query",
                profile.request_timeout.as_millis() as u64,
            )),
        }
    }
}

mod mysql {
    use crate::models::TelemetryRow;
    use sqlx::{MySqlPool, Row};

    /// Per-tablespace size snapshot for every file backing `database`.
    /// Sizes are reported in 16 KiB InnoDB pages.
    pub(super) async fn fetch_file_telemetry(
        pool: &MySqlPool,
        database: &str,
    ) -> Result<Vec<TelemetryRow>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT CAST(0 AS SIGNED) AS db_id,
                   CAST(t.SPACE AS SIGNED) AS file_id,
                   CAST(t.FILE_SIZE DIV 16384 AS SIGNED) AS current_size,
                   CAST(t.ALLOCATED_SIZE DIV 16384 AS SIGNED) AS used_pages,
                   CAST(t.ALLOCATED_SIZE DIV 16384 AS SIGNED) AS estimated_pages
            FROM information_schema.INNODB_TABLESPACES t
            WHERE t.NAME LIKE CONCAT(?, '/%')
            ORDER BY t.SPACE
            "#,
        )
        .bind(database)
        .fetch_all(pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(TelemetryRow {
                    db_id: row.try_get("db_id")?,
                    file_id: row.try_get("file_id")?,
                    current_size: row.try_get("current_size")?,
                    used_pages: row.try_get("used_pages")?,
                    estimated_pages: row.try_get("estimated_pages")?,
                })
            })
            .collect()
    }
}

mod postgres {
    use crate::models::TelemetryRow;
    use sqlx::{PgPool, Row};

    /// Per-tablespace size snapshot for `database`, in 8 KiB pages.
    pub(super) async fn fetch_file_telemetry(
        pool: &PgPool,
        database: &str,
    ) -> Result<Vec<TelemetryRow>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT d.oid::BIGINT AS db_id,
                   ts.oid::BIGINT AS file_id,
                   (pg_tablespace_size(ts.oid) / 8192)::BIGINT AS current_size,
                   (pg_tablespace_size(ts.oid) / 8192)::BIGINT AS used_pages,
                   (pg_tablespace_size(ts.oid) / 8192)::BIGINT AS estimated_pages
            FROM pg_catalog.pg_database d
            CROSS JOIN pg_catalog.pg_tablespace ts
            WHERE d.datname = $1
            ORDER BY ts.oid
            "#,
        )
        .bind(database)
        .fetch_all(pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(TelemetryRow {
                    db_id: row.try_get("db_id")?,
                    file_id: row.try_get("file_id")?,
                    current_size: row.try_get("current_size")?,
                    used_pages: row.try_get("used_pages")?,
                    estimated_pages: row.try_get("estimated_pages")?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_sql_contains_every_task_in_order() {
        let batch = MaintenanceExecutor::batch_sql(&MaintenanceTask::DEFAULT_SEQUENCE);
        let cleanup = batch.find("CALL maint_packet_cleanup();").unwrap();
        let log = batch.find("CALL maint_log_maintenance();").unwrap();
        let index = batch.find("CALL maint_index_maintenance();").unwrap();
        let stats = batch.find("CALL maint_statistics_update();").unwrap();
        assert!(cleanup < log && log < index && index < stats);
    }

    #[test]
    fn test_batch_sql_single_task() {
        let batch = MaintenanceExecutor::batch_sql(&[MaintenanceTask::IndexMaintenance]);
        assert_eq!(batch, "CALL maint_index_maintenance();");
    }
}
