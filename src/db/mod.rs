//! Database layer: connection pooling, maintenance execution, and status
//! reporting.

pub mod connector;
pub mod executor;
pub mod registry;
pub mod status;

pub use connector::{Connector, DbPool, SqlxConnector};
pub use executor::MaintenanceExecutor;
pub use registry::{PoolKey, PoolRegistry, PooledConnection};
pub use status::StatusQuery;
