//! Pool creation against target databases.
//!
//! [`Connector`] is the seam between the registry and the network: the
//! registry decides *when* to connect, a connector decides *how*. Tests
//! substitute a counting double; production uses [`SqlxConnector`], which
//! builds engine-specific connect options field by field from the resolved
//! profile (no connection-string interpolation).

use crate::config::PoolSettings;
use crate::error::{MaintenanceError, MaintenanceResult};
use crate::models::{DatabaseEngine, TargetProfile};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions, MySqlSslMode};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::{MySqlPool, PgPool};
use tokio::time::timeout;
use tracing::debug;

/// Engine-specific connection pool.
#[derive(Debug, Clone)]
pub enum DbPool {
    MySql(MySqlPool),
    Postgres(PgPool),
}

impl DbPool {
    /// Close the connection pool. In-flight operations are allowed to
    /// complete; new acquires fail.
    pub async fn close(&self) {
        match self {
            DbPool::MySql(pool) => pool.close().await,
            DbPool::Postgres(pool) => pool.close().await,
        }
    }

    /// Get the engine for this pool.
    pub fn engine(&self) -> DatabaseEngine {
        match self {
            DbPool::MySql(_) => DatabaseEngine::MySql,
            DbPool::Postgres(_) => DatabaseEngine::Postgres,
        }
    }
}

/// Creates a live pool for a target profile.
pub trait Connector: Send + Sync + 'static {
    /// Open a pool against the profile's target. One call per registry
    /// creation attempt; the registry never retries on its own.
    fn connect(&self, profile: &TargetProfile) -> BoxFuture<'static, MaintenanceResult<DbPool>>;
}

/// Production connector backed by sqlx pools.
#[derive(Debug, Clone)]
pub struct SqlxConnector {
    settings: PoolSettings,
}

impl SqlxConnector {
    pub fn new(settings: PoolSettings) -> Self {
        Self { settings }
    }

    fn mysql_ssl_mode(profile: &TargetProfile) -> MySqlSslMode {
        match (profile.encrypt, profile.trust_certificate) {
            (false, _) => MySqlSslMode::Preferred,
            (true, true) => MySqlSslMode::Required,
            (true, false) => MySqlSslMode::VerifyIdentity,
        }
    }

    fn postgres_ssl_mode(profile: &TargetProfile) -> PgSslMode {
        match (profile.encrypt, profile.trust_certificate) {
            (false, _) => PgSslMode::Prefer,
            (true, true) => PgSslMode::Require,
            (true, false) => PgSslMode::VerifyFull,
        }
    }

    fn mysql_options(profile: &TargetProfile) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&profile.host)
            .port(profile.port)
            .username(&profile.username)
            .password(&profile.password)
            .database(&profile.database)
            .charset("utf8mb4")
            .ssl_mode(Self::mysql_ssl_mode(profile))
    }

    fn postgres_options(profile: &TargetProfile) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&profile.host)
            .port(profile.port)
            .username(&profile.username)
            .password(&profile.password)
            .database(&profile.database)
            .ssl_mode(Self::postgres_ssl_mode(profile))
    }

    async fn connect_inner(
        settings: PoolSettings,
        profile: TargetProfile,
    ) -> MaintenanceResult<DbPool> {
        debug!(
            host = %profile.host,
            port = profile.port,
            database = %profile.database,
            engine = %profile.engine,
            "Connecting to target"
        );

        let connect = async {
            match profile.engine {
                DatabaseEngine::MySql => {
                    let pool = MySqlPoolOptions::new()
                        .min_connections(settings.min_connections)
                        .max_connections(settings.max_connections)
                        .acquire_timeout(settings.acquire_timeout)
                        .connect_with(Self::mysql_options(&profile))
                        .await?;
                    Ok::<_, MaintenanceError>(DbPool::MySql(pool))
                }
                DatabaseEngine::Postgres => {
                    let pool = PgPoolOptions::new()
                        .min_connections(settings.min_connections)
                        .max_connections(settings.max_connections)
                        .acquire_timeout(settings.acquire_timeout)
                        .connect_with(Self::postgres_options(&profile))
                        .await?;
                    Ok(DbPool::Postgres(pool))
                }
            }
        };

        match timeout(settings.connect_timeout, connect).await {
            Ok(result) => result,
            Err(_) => Err(MaintenanceError::timeout(
                format!("connect to {}:{}", profile.host, profile.port),
                settings.connect_timeout.as_millis() as u64,
            )),
        }
    }
}

impl Connector for SqlxConnector {
    fn connect(&self, profile: &TargetProfile) -> BoxFuture<'static, MaintenanceResult<DbPool>> {
        let settings = self.settings.clone();
        let profile = profile.clone();
        Self::connect_inner(settings, profile).boxed()
    }
}
