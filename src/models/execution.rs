//! Maintenance task, execution record, and telemetry models.

use crate::models::ServerInfo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Named maintenance routines the service is willing to run.
///
/// A closed enum is the allow-list: request-supplied task names must parse
/// into one of these variants before any SQL is built, so caller input never
/// reaches executable text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MaintenanceTask {
    PacketCleanup,
    LogMaintenance,
    IndexMaintenance,
    StatisticsUpdate,
}

impl MaintenanceTask {
    /// The default sequence when a request omits the task list.
    pub const DEFAULT_SEQUENCE: [MaintenanceTask; 4] = [
        MaintenanceTask::PacketCleanup,
        MaintenanceTask::LogMaintenance,
        MaintenanceTask::IndexMaintenance,
        MaintenanceTask::StatisticsUpdate,
    ];

    /// Wire name of this task.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::PacketCleanup => "packet-cleanup",
            Self::LogMaintenance => "log-maintenance",
            Self::IndexMaintenance => "index-maintenance",
            Self::StatisticsUpdate => "statistics-update",
        }
    }

    /// Server-side procedure invoked for this task.
    pub fn procedure(&self) -> &'static str {
        match self {
            Self::PacketCleanup => "maint_packet_cleanup",
            Self::LogMaintenance => "maint_log_maintenance",
            Self::IndexMaintenance => "maint_index_maintenance",
            Self::StatisticsUpdate => "maint_statistics_update",
        }
    }

    /// Parse a request-supplied list of task names, rejecting anything
    /// outside the allow-list. `None` yields the default sequence; an
    /// explicit empty list is a validation error, not an empty batch.
    pub fn parse_sequence(
        names: Option<&[String]>,
    ) -> Result<Vec<MaintenanceTask>, crate::error::MaintenanceError> {
        match names {
            None => Ok(Self::DEFAULT_SEQUENCE.to_vec()),
            Some([]) => Err(crate::error::MaintenanceError::invalid_profile(
                "task list must not be empty",
            )),
            Some(names) => names.iter().map(|n| n.parse()).collect(),
        }
    }
}

impl FromStr for MaintenanceTask {
    type Err = crate::error::MaintenanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "packet-cleanup" => Ok(Self::PacketCleanup),
            "log-maintenance" => Ok(Self::LogMaintenance),
            "index-maintenance" => Ok(Self::IndexMaintenance),
            "statistics-update" => Ok(Self::StatisticsUpdate),
            other => Err(crate::error::MaintenanceError::invalid_task(other)),
        }
    }
}

impl std::fmt::Display for MaintenanceTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.wire_name())
    }
}

/// Outcome of one task within a batch.
///
/// The batch is one atomic unit, so `Completed` only ever appears when the
/// whole batch succeeded. On failure every task is `Aborted`: earlier tasks
/// may have run, but their individual outcomes were never confirmed and are
/// not reported as success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskOutcome {
    Completed,
    Aborted,
}

/// Per-task entry in an execution record, in submission order. Serialized
/// as one entry of the `maintenanceTasks` map, keyed by wire name.
#[derive(Debug, Clone)]
pub struct TaskReport {
    pub task: MaintenanceTask,
    pub outcome: TaskOutcome,
}

/// Render the task reports as a map of wire name to outcome, preserving
/// submission order.
fn serialize_task_map<S>(reports: &[TaskReport], serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    use serde::ser::SerializeMap;

    let mut map = serializer.serialize_map(Some(reports.len()))?;
    for report in reports {
        map.serialize_entry(report.task.wire_name(), &report.outcome)?;
    }
    map.end()
}

/// Terminal status of one maintenance run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Completed,
    Failed,
}

/// Per-database-file size snapshot taken after a successful batch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TelemetryRow {
    pub db_id: i64,
    pub file_id: i64,
    pub current_size: i64,
    pub used_pages: i64,
    pub estimated_pages: i64,
}

/// Structured outcome of one maintenance run.
///
/// Created when the run starts, mutated only by the executing call, immutable
/// once returned. Not persisted anywhere; the caller gets the only copy.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    pub success: bool,
    pub execution_id: Uuid,
    pub status: ExecutionStatus,
    pub message: String,
    pub database: String,
    pub server_host: String,
    pub server_port: u16,
    /// Human-readable duration, e.g. "2.50 minutes".
    pub duration: String,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(serialize_with = "serialize_task_map")]
    pub maintenance_tasks: Vec<TaskReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub db_info: Vec<TelemetryRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionRecord {
    /// Record a completed run: every task in the batch confirmed as a unit.
    pub fn completed(
        execution_id: Uuid,
        server_info: &ServerInfo,
        tasks: &[MaintenanceTask],
        duration_ms: u64,
        db_info: Vec<TelemetryRow>,
    ) -> Self {
        Self {
            success: true,
            execution_id,
            status: ExecutionStatus::Completed,
            message: "Maintenance process completed successfully".to_string(),
            database: server_info.database.clone(),
            server_host: server_info.host.clone(),
            server_port: server_info.port,
            duration: format_duration(duration_ms),
            duration_ms,
            timestamp: Utc::now(),
            maintenance_tasks: tasks
                .iter()
                .map(|&task| TaskReport {
                    task,
                    outcome: TaskOutcome::Completed,
                })
                .collect(),
            db_info,
            error: None,
        }
    }

    /// Record a failed run. No task is reported completed and no telemetry
    /// is attached; the duration is measured to the failure point.
    pub fn failed(
        execution_id: Uuid,
        server_info: &ServerInfo,
        tasks: &[MaintenanceTask],
        duration_ms: u64,
        error: &crate::error::MaintenanceError,
    ) -> Self {
        Self {
            success: false,
            execution_id,
            status: ExecutionStatus::Failed,
            message: format!("Maintenance process failed: {}", error),
            database: server_info.database.clone(),
            server_host: server_info.host.clone(),
            server_port: server_info.port,
            duration: format_duration(duration_ms),
            duration_ms,
            timestamp: Utc::now(),
            maintenance_tasks: tasks
                .iter()
                .map(|&task| TaskReport {
                    task,
                    outcome: TaskOutcome::Aborted,
                })
                .collect(),
            db_info: Vec::new(),
            error: Some(error.to_string()),
        }
    }
}

/// Aggregate database-state row returned by the status query.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DatabaseStateRow {
    pub db_id: i64,
    pub database_name: String,
    pub total_size_mb: f64,
    pub state: String,
    pub recovery_model: String,
}

/// Response envelope for the status endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub success: bool,
    pub data: Vec<DatabaseStateRow>,
    pub server_info: ServerInfo,
}

/// Format a millisecond duration as fractional minutes.
pub fn format_duration(duration_ms: u64) -> String {
    format!("{:.2} minutes", duration_ms as f64 / 60_000.0)
}
