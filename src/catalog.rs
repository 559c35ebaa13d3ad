//! Static catalog of registered targets and the target profile resolver.
//!
//! The catalog is a read-only lookup table loaded once at startup from a
//! JSON file. The resolver turns a request's selector into a canonical
//! [`TargetProfile`], either by catalog lookup or from inline fields. It is a
//! pure mapping with no side effects.

use crate::config::{DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_TARGET_PORT};
use crate::error::{MaintenanceError, MaintenanceResult};
use crate::models::{DatabaseEngine, TargetProfile, TargetSelector, validate_database_name};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// One predefined target entry as it appears in the catalog file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredTarget {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub engine: DatabaseEngine,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    /// Sensitive - never serialized back out.
    pub password: String,
    pub database: String,
    #[serde(default)]
    pub trust_certificate: bool,
    #[serde(default)]
    pub encrypt: bool,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_port() -> u16 {
    DEFAULT_TARGET_PORT
}

fn default_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

/// Catalog entry exposed over HTTP (no credentials).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetSummary {
    pub id: u32,
    pub name: String,
    pub engine: DatabaseEngine,
    pub host: String,
    pub port: u16,
    pub database: String,
}

/// Read-only collection of registered targets.
#[derive(Debug, Default)]
pub struct TargetCatalog {
    targets: Vec<RegisteredTarget>,
}

impl TargetCatalog {
    /// An empty catalog; only inline profiles resolve against it.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a catalog from already-parsed entries.
    pub fn new(targets: Vec<RegisteredTarget>) -> Self {
        Self { targets }
    }

    /// Load the catalog from a JSON file containing an array of entries.
    pub fn load(path: &Path) -> MaintenanceResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            MaintenanceError::internal(format!("Failed to read catalog {}: {}", path.display(), e))
        })?;
        let targets: Vec<RegisteredTarget> = serde_json::from_str(&raw).map_err(|e| {
            MaintenanceError::internal(format!("Invalid catalog {}: {}", path.display(), e))
        })?;
        info!(count = targets.len(), path = %path.display(), "Loaded target catalog");
        Ok(Self { targets })
    }

    /// Look up a registered target by id.
    pub fn get(&self, id: u32) -> Option<&RegisteredTarget> {
        self.targets.iter().find(|t| t.id == id)
    }

    /// Number of registered targets.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Whether the catalog has no entries.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Catalog listing without credentials.
    pub fn summaries(&self) -> Vec<TargetSummary> {
        self.targets
            .iter()
            .map(|t| TargetSummary {
                id: t.id,
                name: t.name.clone(),
                engine: t.engine,
                host: t.host.clone(),
                port: t.port,
                database: t.database.clone(),
            })
            .collect()
    }

    /// Resolve a selector into a canonical target profile.
    ///
    /// A selector carrying `registered_id` resolves through the catalog and
    /// fails with `NotFound` when absent; anything else must be a complete
    /// inline profile.
    pub fn resolve(&self, selector: &TargetSelector) -> MaintenanceResult<TargetProfile> {
        match selector.registered_id {
            Some(id) => {
                let target = self.get(id).ok_or_else(|| MaintenanceError::not_found(id))?;
                validate_database_name(&target.database)?;
                Ok(TargetProfile {
                    engine: target.engine,
                    host: target.host.clone(),
                    port: target.port,
                    username: target.username.clone(),
                    password: target.password.clone(),
                    database: target.database.clone(),
                    trust_certificate: target.trust_certificate,
                    encrypt: target.encrypt,
                    request_timeout: Duration::from_millis(target.timeout_ms),
                })
            }
            None => TargetProfile::from_inline(selector),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_target(id: u32) -> RegisteredTarget {
        RegisteredTarget {
            id,
            name: format!("Server RP{:03}", 200 + id),
            engine: DatabaseEngine::MySql,
            host: format!("192.168.25.{}", 9 + id),
            port: 1433,
            username: "maint".to_string(),
            password: "secret".to_string(),
            database: format!("RP{:03}", 200 + id),
            trust_certificate: false,
            encrypt: false,
            timeout_ms: 900_000,
        }
    }

    #[test]
    fn test_resolve_registered_id() {
        let catalog = TargetCatalog::new(vec![sample_target(1), sample_target(2)]);
        let selector = TargetSelector {
            registered_id: Some(2),
            ..TargetSelector::default()
        };
        let profile = catalog.resolve(&selector).unwrap();
        assert_eq!(profile.host, "192.168.25.11");
        assert_eq!(profile.database, "RP202");
        assert_eq!(profile.request_timeout, Duration::from_millis(900_000));
    }

    #[test]
    fn test_resolve_unknown_id_is_not_found() {
        let catalog = TargetCatalog::new(vec![sample_target(1)]);
        let selector = TargetSelector {
            registered_id: Some(999),
            ..TargetSelector::default()
        };
        let err = catalog.resolve(&selector).unwrap_err();
        assert!(matches!(err, MaintenanceError::NotFound { server_id: 999 }));
    }

    #[test]
    fn test_resolve_inline_when_no_id() {
        let catalog = TargetCatalog::empty();
        let selector = TargetSelector {
            host: Some("10.0.0.5".to_string()),
            username: Some("sa".to_string()),
            password: Some("pw".to_string()),
            database: Some("inventory".to_string()),
            ..TargetSelector::default()
        };
        let profile = catalog.resolve(&selector).unwrap();
        assert_eq!(profile.host, "10.0.0.5");
        assert_eq!(profile.port, DEFAULT_TARGET_PORT);
    }

    #[test]
    fn test_resolve_empty_selector_is_invalid_profile() {
        let catalog = TargetCatalog::empty();
        let err = catalog.resolve(&TargetSelector::default()).unwrap_err();
        assert!(matches!(err, MaintenanceError::InvalidProfile { .. }));
    }

    #[test]
    fn test_summaries_omit_credentials() {
        let catalog = TargetCatalog::new(vec![sample_target(1)]);
        let json = serde_json::to_value(catalog.summaries()).unwrap();
        let entry = &json[0];
        assert_eq!(entry["id"], 1);
        assert_eq!(entry["host"], "192.168.25.10");
        assert!(entry.get("username").is_none());
        assert!(entry.get("password").is_none());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{
                "id": 1,
                "name": "Server RP207",
                "host": "192.168.25.10",
                "username": "maint",
                "password": "secret",
                "database": "RP207"
            }}]"#
        )
        .unwrap();

        let catalog = TargetCatalog::load(file.path()).unwrap();
        assert_eq!(catalog.len(), 1);
        let target = catalog.get(1).unwrap();
        assert_eq!(target.port, DEFAULT_TARGET_PORT);
        assert_eq!(target.timeout_ms, DEFAULT_REQUEST_TIMEOUT_MS);
        assert_eq!(target.engine, DatabaseEngine::MySql);
    }

    #[test]
    fn test_load_rejects_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(TargetCatalog::load(file.path()).is_err());
    }
}
