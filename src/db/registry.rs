//! Connection pool registry.
//!
//! Owns the cache of live connection pools keyed by target identity, creates
//! pools on demand, and evicts them on fault. This is the only shared mutable
//! state in the service.
//!
//! # Concurrency
//!
//! - The slot map lives behind a `std::sync::Mutex` that is never held across
//!   an await point; pool creation and teardown happen outside the lock.
//! - **Single-flight creation**: the first `acquire` for an absent key
//!   installs a shared creation future; concurrent callers for the same key
//!   await that same future, so exactly one connect attempt is made and every
//!   caller observes its outcome. A failed attempt clears the pending slot,
//!   so the next `acquire` connects fresh. No retry happens inside `acquire`;
//!   retry policy belongs to the caller.
//! - **Fault eviction**: every pooled connection carries a handle to the
//!   registry's fault channel. The first `signal_fault` on a connection sends
//!   its key and instance id; a background listener removes that entry and
//!   closes the pool. The instance check means a stale fault can never evict
//!   a newer pool for the same key. Holders of the evicted instance may
//!   finish in-flight work; nothing is force-disconnected.

use crate::db::connector::{Connector, DbPool};
use crate::error::{MaintenanceError, MaintenanceResult};
use crate::models::TargetProfile;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Cache key identifying a reusable connection pool.
///
/// Keyed by host, port, database, and username: the pool's connect options
/// embed database and credentials, so two profiles differing only in those
/// fields must not share a pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolKey {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
}

impl PoolKey {
    pub fn from_profile(profile: &TargetProfile) -> Self {
        Self {
            host: profile.host.clone(),
            port: profile.port,
            database: profile.database.clone(),
            username: profile.username.clone(),
        }
    }
}

impl std::fmt::Display for PoolKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}/{}", self.host, self.port, self.database)
    }
}

/// Fault notification sent by a pooled connection to the registry.
#[derive(Debug, Clone)]
struct FaultSignal {
    key: PoolKey,
    instance: Uuid,
}

/// A live pool owned by the registry entry for its key.
pub struct PooledConnection {
    instance: Uuid,
    key: PoolKey,
    pool: DbPool,
    healthy: AtomicBool,
    fault_tx: mpsc::UnboundedSender<FaultSignal>,
}

impl PooledConnection {
    fn new(key: PoolKey, pool: DbPool, fault_tx: mpsc::UnboundedSender<FaultSignal>) -> Self {
        Self {
            instance: Uuid::new_v4(),
            key,
            pool,
            healthy: AtomicBool::new(true),
            fault_tx,
        }
    }

    /// The underlying engine pool.
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn key(&self) -> &PoolKey {
        &self.key
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    /// Mark this connection unusable and notify the registry. Only the first
    /// call fires the notification; the registry evicts the entry so the
    /// next `acquire` for this key connects fresh.
    pub fn signal_fault(&self) {
        if self.healthy.swap(false, Ordering::AcqRel) {
            let _ = self.fault_tx.send(FaultSignal {
                key: self.key.clone(),
                instance: self.instance,
            });
        }
    }
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("key", &self.key)
            .field("instance", &self.instance)
            .field("healthy", &self.healthy.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Outcome shared between all callers awaiting the same creation attempt.
/// Errors travel as plain text so the result stays cheaply cloneable.
type CreationResult = Result<Arc<PooledConnection>, Arc<str>>;
type CreationFuture = Shared<BoxFuture<'static, CreationResult>>;

enum PoolSlot {
    Ready(Arc<PooledConnection>),
    Pending { seq: u64, fut: CreationFuture },
}

/// Registry of connection pools, one per [`PoolKey`].
///
/// Explicitly constructed and injectable; no ambient singleton. Tests build a
/// fresh registry per case with a counting connector double.
pub struct PoolRegistry {
    connector: Arc<dyn Connector>,
    slots: Mutex<HashMap<PoolKey, PoolSlot>>,
    fault_tx: mpsc::UnboundedSender<FaultSignal>,
    next_seq: AtomicU64,
}

impl PoolRegistry {
    /// Create a registry and start its fault listener.
    pub fn new(connector: Arc<dyn Connector>) -> Arc<Self> {
        let (fault_tx, fault_rx) = mpsc::unbounded_channel();
        let registry = Arc::new(Self {
            connector,
            slots: Mutex::new(HashMap::new()),
            fault_tx,
            next_seq: AtomicU64::new(0),
        });

        // Weak reference so the listener exits once the registry is dropped.
        let weak = Arc::downgrade(&registry);
        tokio::spawn(Self::fault_listener(weak, fault_rx));

        registry
    }

    /// Get the cached pool for the profile's key, creating it if absent.
    ///
    /// Connect failures surface as `Connection` errors carrying the
    /// underlying cause and are never silently retried here.
    pub async fn acquire(
        &self,
        profile: &TargetProfile,
    ) -> MaintenanceResult<Arc<PooledConnection>> {
        let key = PoolKey::from_profile(profile);

        let mut replaced = None;
        let (fut, seq) = {
            let mut slots = self.slots.lock().expect("registry lock poisoned");
            match slots.get(&key) {
                Some(PoolSlot::Ready(conn)) if conn.is_healthy() => {
                    debug!(key = %key, "Reusing cached connection pool");
                    return Ok(Arc::clone(conn));
                }
                Some(PoolSlot::Pending { seq, fut }) => (fut.clone(), *seq),
                // Absent, or a faulted entry the listener has not reaped yet.
                // A replaced entry is captured and closed below; its instance
                // id no longer matches anything, so the listener skips it.
                _ => {
                    let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                    let fut = self.creation_future(&key, profile);
                    replaced = slots.insert(
                        key.clone(),
                        PoolSlot::Pending {
                            seq,
                            fut: fut.clone(),
                        },
                    );
                    (fut, seq)
                }
            }
        }; // Lock released before awaiting

        if let Some(PoolSlot::Ready(old)) = replaced {
            debug!(key = %key, "Closing replaced faulted pool");
            old.pool().close().await;
        }

        let result = fut.await;

        // Settle the slot: Ready on success, removed on failure so a later
        // acquire retries fresh. Every awaiting caller settles idempotently;
        // the seq check stops an old attempt from clobbering a newer slot.
        {
            let mut slots = self.slots.lock().expect("registry lock poisoned");
            if let Some(PoolSlot::Pending { seq: current, .. }) = slots.get(&key) {
                if *current == seq {
                    match &result {
                        Ok(conn) => {
                            slots.insert(key.clone(), PoolSlot::Ready(Arc::clone(conn)));
                        }
                        Err(_) => {
                            slots.remove(&key);
                        }
                    }
                }
            }
        }

        result.map_err(|cause| MaintenanceError::connection(cause.to_string()))
    }

    /// Remove the entry for `key` and close its pool if one was cached.
    pub async fn invalidate(&self, key: &PoolKey) {
        let removed = {
            let mut slots = self.slots.lock().expect("registry lock poisoned");
            slots.remove(key)
        };
        if let Some(PoolSlot::Ready(conn)) = removed {
            info!(key = %key, "Invalidating connection pool");
            conn.pool().close().await;
        }
    }

    /// Close every cached pool. Invoked once at process shutdown; the
    /// bounded grace period is enforced by the caller, not here.
    pub async fn shutdown_all(&self) {
        let conns: Vec<Arc<PooledConnection>> = {
            let mut slots = self.slots.lock().expect("registry lock poisoned");
            slots
                .drain()
                .filter_map(|(_, slot)| match slot {
                    PoolSlot::Ready(conn) => Some(conn),
                    PoolSlot::Pending { .. } => None,
                })
                .collect()
        };

        for conn in conns {
            info!(key = %conn.key(), "Closing connection pool");
            conn.pool().close().await;
        }
        info!("All connection pools closed");
    }

    /// Number of ready pools currently cached.
    pub fn pool_count(&self) -> usize {
        let slots = self.slots.lock().expect("registry lock poisoned");
        slots
            .values()
            .filter(|slot| matches!(slot, PoolSlot::Ready(_)))
            .count()
    }

    fn creation_future(&self, key: &PoolKey, profile: &TargetProfile) -> CreationFuture {
        let connector = Arc::clone(&self.connector);
        let profile = profile.clone();
        let key = key.clone();
        let fault_tx = self.fault_tx.clone();

        async move {
            debug!(key = %key, "Creating connection pool");
            match connector.connect(&profile).await {
                Ok(pool) => {
                    info!(key = %key, engine = %pool.engine(), "Connection pool created");
                    Ok(Arc::new(PooledConnection::new(key, pool, fault_tx)))
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Connection pool creation failed");
                    Err(Arc::<str>::from(e.to_string()))
                }
            }
        }
        .boxed()
        .shared()
    }

    /// Evict the entry for a fault signal if it still refers to the same
    /// pool instance. Returns the evicted connection for closing.
    fn evict(&self, signal: &FaultSignal) -> Option<Arc<PooledConnection>> {
        let mut slots = self.slots.lock().expect("registry lock poisoned");
        match slots.get(&signal.key) {
            Some(PoolSlot::Ready(conn)) if conn.instance == signal.instance => {
                match slots.remove(&signal.key) {
                    Some(PoolSlot::Ready(conn)) => Some(conn),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    async fn fault_listener(
        weak: Weak<Self>,
        mut fault_rx: mpsc::UnboundedReceiver<FaultSignal>,
    ) {
        while let Some(signal) = fault_rx.recv().await {
            let Some(registry) = weak.upgrade() else {
                debug!("Registry dropped, fault listener exiting");
                return;
            };

            if let Some(conn) = registry.evict(&signal) {
                warn!(key = %signal.key, "Evicting faulted connection pool");
                conn.pool().close().await;
            }

            drop(registry);
        }
    }
}

impl std::fmt::Debug for PoolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolRegistry")
            .field("pool_count", &self.pool_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TargetSelector;

    fn test_profile(host: &str, database: &str) -> TargetProfile {
        TargetProfile::from_inline(&TargetSelector {
            host: Some(host.to_string()),
            username: Some("maint".to_string()),
            password: Some("secret".to_string()),
            database: Some(database.to_string()),
            ..TargetSelector::default()
        })
        .unwrap()
    }

    #[test]
    fn test_pool_key_derivation() {
        let profile = test_profile("192.168.25.10", "RP207");
        let key = PoolKey::from_profile(&profile);
        assert_eq!(key.host, "192.168.25.10");
        assert_eq!(key.port, 1433);
        assert_eq!(key.database, "RP207");
        assert_eq!(key.to_string(), "192.168.25.10:1433/RP207");
    }

    #[test]
    fn test_pool_key_distinguishes_databases() {
        let a = PoolKey::from_profile(&test_profile("10.0.0.1", "db_a"));
        let b = PoolKey::from_profile(&test_profile("10.0.0.1", "db_b"));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_pooled_connection_fault_flag() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let pool = DbPool::MySql(sqlx::Pool::connect_lazy("mysql://localhost").unwrap());
        let conn = PooledConnection::new(
            PoolKey::from_profile(&test_profile("10.0.0.1", "db_a")),
            pool,
            tx,
        );

        assert!(conn.is_healthy());
        conn.signal_fault();
        assert!(!conn.is_healthy());
        // Repeated faults do not produce duplicate signals.
        conn.signal_fault();

        let signal = rx.recv().await.unwrap();
        assert_eq!(signal.instance, conn.instance);
        assert!(rx.try_recv().is_err());
    }
}
