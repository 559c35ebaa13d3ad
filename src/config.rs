//! Configuration handling for the maintenance service.
//!
//! Service-level settings come from CLI arguments and environment variables.
//! Per-target connection settings come from the catalog or from inline
//! request profiles, not from here.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_HTTP_HOST: &str = "0.0.0.0";
pub const DEFAULT_HTTP_PORT: u16 = 3000;

/// Default port for target databases when the selector omits one.
pub const DEFAULT_TARGET_PORT: u16 = 1433;
/// Default per-operation request timeout (15 minutes) for maintenance
/// batches and telemetry queries.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 900_000;

// Pool configuration defaults
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 45;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_MIN_CONNECTIONS: u32 = 1;

/// Grace period for closing cached pools at shutdown, enforced by main.
pub const SHUTDOWN_GRACE_SECS: u64 = 30;

/// Connection pool sizing and timeouts applied to every created pool.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub acquire_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: DEFAULT_MIN_CONNECTIONS,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            acquire_timeout: Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS),
        }
    }
}

/// Configuration for the maintenance service.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "db-maintenance-service",
    about = "HTTP microservice for running maintenance routines against SQL database targets",
    version,
    author
)]
pub struct Config {
    /// Path to the JSON catalog of registered targets.
    /// When omitted, only inline target profiles are accepted.
    #[arg(short = 'c', long = "catalog", value_name = "PATH", env = "MAINT_CATALOG")]
    pub catalog: Option<PathBuf>,

    /// HTTP host to bind to
    #[arg(long, default_value = DEFAULT_HTTP_HOST, env = "MAINT_HTTP_HOST")]
    pub http_host: String,

    /// HTTP port to bind to
    #[arg(long, default_value_t = DEFAULT_HTTP_PORT, env = "MAINT_HTTP_PORT")]
    pub http_port: u16,

    /// Connection timeout in seconds for pool creation
    #[arg(
        long,
        default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS,
        env = "MAINT_CONNECT_TIMEOUT"
    )]
    pub connect_timeout: u64,

    /// Maximum connections per target pool
    #[arg(
        long,
        default_value_t = DEFAULT_MAX_CONNECTIONS,
        env = "MAINT_MAX_CONNECTIONS"
    )]
    pub max_connections: u32,

    /// Minimum connections per target pool
    #[arg(
        long,
        default_value_t = DEFAULT_MIN_CONNECTIONS,
        env = "MAINT_MIN_CONNECTIONS"
    )]
    pub min_connections: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "MAINT_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "MAINT_JSON_LOGS")]
    pub json_logs: bool,
}

impl Config {
    /// Create a default configuration (useful for testing).
    pub fn default_config() -> Self {
        Self {
            catalog: None,
            http_host: DEFAULT_HTTP_HOST.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT_SECS,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: DEFAULT_MIN_CONNECTIONS,
            log_level: "info".to_string(),
            json_logs: false,
        }
    }

    /// Get the HTTP bind address.
    pub fn http_bind_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }

    /// Pool settings derived from this configuration.
    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_connections: self.max_connections,
            min_connections: self.min_connections,
            connect_timeout: Duration::from_secs(self.connect_timeout),
            acquire_timeout: Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS),
        }
    }

    /// Validate pool sizing.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_connections == 0 {
            return Err("max_connections must be greater than 0".to_string());
        }
        if self.min_connections > self.max_connections {
            return Err(format!(
                "min_connections ({}) cannot exceed max_connections ({})",
                self.min_connections, self.max_connections
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.http_host, DEFAULT_HTTP_HOST);
        assert_eq!(config.http_port, DEFAULT_HTTP_PORT);
        assert!(config.catalog.is_none());
    }

    #[test]
    fn test_http_bind_addr() {
        let config = Config {
            http_host: "127.0.0.1".to_string(),
            http_port: 8080,
            ..Config::default()
        };
        assert_eq!(config.http_bind_addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_pool_settings_from_config() {
        let config = Config {
            connect_timeout: 10,
            max_connections: 4,
            ..Config::default()
        };
        let settings = config.pool_settings();
        assert_eq!(settings.connect_timeout, Duration::from_secs(10));
        assert_eq!(settings.max_connections, 4);
        assert_eq!(settings.min_connections, DEFAULT_MIN_CONNECTIONS);
    }

    #[test]
    fn test_validate_pool_sizing() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.max_connections = 0;
        assert!(config.validate().is_err());

        config.max_connections = 2;
        config.min_connections = 5;
        let err = config.validate().unwrap_err();
        assert!(err.contains("cannot exceed"));
    }
}
