//! Data models for the maintenance service.
//!
//! This module re-exports all model types used throughout the application.

pub mod execution;
pub mod target;

// Re-export commonly used types
pub use execution::{
    DatabaseStateRow, ExecutionRecord, ExecutionStatus, MaintenanceTask, StatusResponse,
    TaskOutcome, TaskReport, TelemetryRow, format_duration,
};
pub use target::{
    DatabaseEngine, ServerInfo, TargetProfile, TargetSelector, validate_database_name,
};
