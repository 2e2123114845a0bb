//! Health checks
//!
//! Diagnostics behind `brandforge doctor`.

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::storage::Database;

/// Health check result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: HealthStatus,
    pub message: Option<String>,
}

impl HealthCheck {
    fn new(name: &str, status: HealthStatus, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Warning,
    Error,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Ok => "ok",
            HealthStatus::Warning => "warning",
            HealthStatus::Error => "error",
        }
    }
}

/// Overall system health report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub overall_status: HealthStatus,
    pub checks: Vec<HealthCheck>,
    pub timestamp: String,
}

impl HealthReport {
    fn from_checks(checks: Vec<HealthCheck>) -> Self {
        let overall_status = checks
            .iter()
            .map(|c| c.status)
            .max()
            .unwrap_or(HealthStatus::Ok);
        Self {
            overall_status,
            checks,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Run all health checks
pub async fn doctor(config: &Config) -> HealthReport {
    HealthReport::from_checks(vec![
        check_config(config),
        check_api_key(config, |name| std::env::var(name).ok()),
        check_database(config).await,
    ])
}

/// Config file presence and validity
pub fn check_config(config: &Config) -> HealthCheck {
    const NAME: &str = "Configuration";

    if let Err(e) = config.validate() {
        return HealthCheck::new(NAME, HealthStatus::Error, e.to_string());
    }
    match Config::config_path() {
        Ok(path) if path.exists() => {
            HealthCheck::new(NAME, HealthStatus::Ok, format!("Found at {}", path.display()))
        }
        Ok(path) => HealthCheck::new(
            NAME,
            HealthStatus::Ok,
            format!("Not found at {} (using defaults)", path.display()),
        ),
        Err(e) => HealthCheck::new(NAME, HealthStatus::Warning, e.to_string()),
    }
}

/// Gemini key from the environment; generation is unavailable without one
pub fn check_api_key<F>(config: &Config, lookup: F) -> HealthCheck
where
    F: Fn(&str) -> Option<String>,
{
    const NAME: &str = "Gemini API key";

    match config.gemini.resolve_api_key_with(lookup) {
        Ok(Some(_)) => HealthCheck::new(
            NAME,
            HealthStatus::Ok,
            format!(
                "Found (text model {}, image model {})",
                config.gemini.text_model, config.gemini.image_model
            ),
        ),
        Ok(None) => HealthCheck::new(
            NAME,
            HealthStatus::Warning,
            "Not set; export GEMINI_API_KEY to enable generation",
        ),
        Err(e) => HealthCheck::new(NAME, HealthStatus::Error, e.to_string()),
    }
}

/// Database opens, answers queries and is fully migrated
pub async fn check_database(config: &Config) -> HealthCheck {
    const NAME: &str = "Database";

    let path = match config.database_path() {
        Ok(path) => path,
        Err(e) => return HealthCheck::new(NAME, HealthStatus::Error, e.to_string()),
    };

    let db = match Database::open(&path).await {
        Ok(db) => db,
        Err(e) => {
            return HealthCheck::new(NAME, HealthStatus::Error, format!("Connection failed: {}", e));
        }
    };

    let check = match (db.health_check().await, db.migration_status().await) {
        (Ok(()), Ok(status)) if !status.needs_migration => HealthCheck::new(
            NAME,
            HealthStatus::Ok,
            format!("Schema v{} at {}", status.current_version, path.display()),
        ),
        (Ok(()), Ok(status)) => HealthCheck::new(
            NAME,
            HealthStatus::Warning,
            format!(
                "Schema v{} behind v{}",
                status.current_version, status.target_version
            ),
        ),
        (Err(e), _) | (_, Err(e)) => {
            HealthCheck::new(NAME, HealthStatus::Error, format!("Query failed: {}", e))
        }
    };
    db.close().await;
    check
}

/// Version and resolved paths
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub version: String,
    pub config_path: Option<String>,
    pub database_path: Option<String>,
}

pub fn system_info(config: &Config) -> SystemInfo {
    SystemInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        config_path: Config::config_path().ok().map(|p| p.display().to_string()),
        database_path: config.database_path().ok().map(|p| p.display().to_string()),
    }
}
