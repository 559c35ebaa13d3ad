//! DB Maintenance Service Library
//!
//! HTTP microservice that runs maintenance routines (cleanup, log and index
//! maintenance, statistics refresh) against a fleet of SQL database targets,
//! with per-target connection pooling and fault-driven pool eviction.

pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod models;

pub use catalog::TargetCatalog;
pub use config::Config;
pub use db::{MaintenanceExecutor, PoolRegistry, SqlxConnector, StatusQuery};
pub use error::{MaintenanceError, MaintenanceResult};
