//! Target selection and connection profile models.

use crate::config::{DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_TARGET_PORT};
use crate::error::{MaintenanceError, MaintenanceResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Supported database engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseEngine {
    #[default]
    MySql,
    Postgres,
}

impl DatabaseEngine {
    /// Get the display name for this engine.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::MySql => "MySQL",
            Self::Postgres => "PostgreSQL",
        }
    }
}

impl std::fmt::Display for DatabaseEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Target selector as supplied by the request layer.
///
/// Either `registered_id` alone, or a complete inline profile. Defaulting for
/// the optional inline fields happens in the resolver, not here.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetSelector {
    /// Identity of a predefined target in the static catalog.
    pub registered_id: Option<u32>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub engine: Option<DatabaseEngine>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    pub trust_certificate: Option<bool>,
    pub encrypt: Option<bool>,
    pub timeout_ms: Option<u64>,
}

/// Resolved connection identity for one database target.
///
/// Immutable once resolved; constructed per request from the catalog or from
/// inline selector fields. Credentials are never serialized or logged.
#[derive(Debug, Clone)]
pub struct TargetProfile {
    pub engine: DatabaseEngine,
    pub host: String,
    pub port: u16,
    pub username: String,
    /// Sensitive - never log.
    pub password: String,
    pub database: String,
    pub trust_certificate: bool,
    pub encrypt: bool,
    /// Per-operation request timeout.
    pub request_timeout: Duration,
}

impl TargetProfile {
    /// Build a profile from inline selector fields, applying the documented
    /// defaults: port 1433, TLS trust disabled, encrypt disabled, 900 000 ms
    /// request timeout. Missing required fields are an `InvalidProfile` error.
    pub fn from_inline(selector: &TargetSelector) -> MaintenanceResult<Self> {
        let host = selector
            .host
            .clone()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| MaintenanceError::invalid_profile("missing required field 'host'"))?;
        let username = selector.username.clone().filter(|u| !u.is_empty()).ok_or_else(|| {
            MaintenanceError::invalid_profile("missing required field 'username'")
        })?;
        let password = selector.password.clone().ok_or_else(|| {
            MaintenanceError::invalid_profile("missing required field 'password'")
        })?;
        let database = selector.database.clone().ok_or_else(|| {
            MaintenanceError::invalid_profile("missing required field 'database'")
        })?;
        validate_database_name(&database)?;

        Ok(Self {
            engine: selector.engine.unwrap_or_default(),
            host,
            port: selector.port.unwrap_or(DEFAULT_TARGET_PORT),
            username,
            password,
            database,
            trust_certificate: selector.trust_certificate.unwrap_or(false),
            encrypt: selector.encrypt.unwrap_or(false),
            request_timeout: Duration::from_millis(
                selector.timeout_ms.unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS),
            ),
        })
    }

    /// Host/port/database context for response payloads.
    pub fn server_info(&self) -> ServerInfo {
        ServerInfo {
            host: self.host.clone(),
            port: self.port,
            database: self.database.clone(),
        }
    }
}

/// Strict identifier check for database names. Task names and the database
/// context never reach SQL text as raw strings; this check is the last line
/// in case a driver-level surface ever does.
pub fn validate_database_name(name: &str) -> MaintenanceResult<()> {
    if name.is_empty() || name.len() > 128 {
        return Err(MaintenanceError::invalid_profile(
            "database name must be 1-128 characters",
        ));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(MaintenanceError::invalid_profile(
            "database name may only contain alphanumeric characters and '_'",
        ));
    }
    Ok(())
}

/// Resolved target context echoed back to the caller.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    pub host: String,
    pub port: u16,
    pub database: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inline_selector() -> TargetSelector {
        TargetSelector {
            host: Some("192.168.25.10".to_string()),
            username: Some("maint".to_string()),
            password: Some("secret".to_string()),
            database: Some("RP207".to_string()),
            ..TargetSelector::default()
        }
    }

    #[test]
    fn test_inline_profile_defaults() {
        let profile = TargetProfile::from_inline(&inline_selector()).unwrap();
        assert_eq!(profile.port, 1433);
        assert_eq!(profile.engine, DatabaseEngine::MySql);
        assert!(!profile.trust_certificate);
        assert!(!profile.encrypt);
        assert_eq!(profile.request_timeout, Duration::from_millis(900_000));
    }

    #[test]
    fn test_inline_profile_overrides() {
        let selector = TargetSelector {
            port: Some(5432),
            engine: Some(DatabaseEngine::Postgres),
            encrypt: Some(true),
            timeout_ms: Some(60_000),
            ..inline_selector()
        };
        let profile = TargetProfile::from_inline(&selector).unwrap();
        assert_eq!(profile.port, 5432);
        assert_eq!(profile.engine, DatabaseEngine::Postgres);
        assert!(profile.encrypt);
        assert_eq!(profile.request_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_inline_profile_missing_fields() {
        for field in ["host", "username", "password", "database"] {
            let mut selector = inline_selector();
            match field {
                "host" => selector.host = None,
                "username" => selector.username = None,
                "password" => selector.password = None,
                _ => selector.database = None,
            }
            let err = TargetProfile::from_inline(&selector).unwrap_err();
            assert!(
                matches!(err, MaintenanceError::InvalidProfile { .. }),
                "expected InvalidProfile for missing {field}"
            );
            assert!(err.to_string().contains(field));
        }
    }

    #[test]
    fn test_validate_database_name() {
        assert!(validate_database_name("RP207").is_ok());
        assert!(validate_database_name("prod_db_01").is_ok());
        assert!(validate_database_name("").is_err());
        assert!(validate_database_name("db; DROP TABLE x").is_err());
        assert!(validate_database_name("db-name").is_err());
        assert!(validate_database_name(&"x".repeat(129)).is_err());
    }

    #[test]
    fn test_selector_deserializes_camel_case() {
        let selector: TargetSelector = serde_json::from_str(
            r#"{"host":"10.0.0.1","port":1433,"username":"sa","password":"pw",
                "database":"RP207","trustCertificate":true,"timeoutMs":1000}"#,
        )
        .unwrap();
        assert_eq!(selector.trust_certificate, Some(true));
        assert_eq!(selector.timeout_ms, Some(1000));
    }
}
