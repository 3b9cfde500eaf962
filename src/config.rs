use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::RoleId;

/// Main configuration structure for the committee service
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CommitteeConfig {
    /// HTTP listener settings
    pub server: ServerConfig,
    /// Observability settings
    pub observability: ObservabilityConfig,
    /// Attachment and directory storage
    pub storage: StorageConfig,
    /// Database settings (optional, in-memory store when absent)
    pub database: Option<DatabaseConfig>,
    /// Outbox relay settings
    pub notifications: NotificationConfig,
    /// Blob reconciliation settings
    pub reconciliation: ReconciliationConfig,
    /// Principal resolution settings
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Address the API binds to
    pub bind_address: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Default log level when RUST_LOG is unset
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Root directory of the local object store
    pub blob_root: PathBuf,
    /// JSON file with the user directory loaded at startup
    pub users_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Database URL (SQLite file path or connection string)
    pub url: String,
    /// Maximum connections in pool
    pub max_connections: u32,
    /// Enable automatic migrations
    pub auto_migrate: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotificationConfig {
    /// Buffer of the live push channel
    pub channel_capacity: usize,
    /// Delay between outbox relay passes
    pub relay_interval_ms: u64,
    /// Attempts before a notification stays undelivered
    pub max_attempts: u32,
    /// Notifications relayed per pass
    pub batch_size: usize,
    /// Roles that process budget sufficiency requests
    pub sufficiency_roles: Vec<RoleId>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReconciliationConfig {
    pub interval_seconds: u64,
    pub batch_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub cache_ttl_seconds: u64,
    pub cache_capacity: u64,
}

impl NotificationConfig {
    pub fn relay_interval(&self) -> Duration {
        Duration::from_millis(self.relay_interval_ms)
    }
}

impl ReconciliationConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

impl AuthConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }
}

impl Default for CommitteeConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind_address: "127.0.0.1:8080".to_string(),
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
            },
            storage: StorageConfig {
                blob_root: PathBuf::from(".procurement-committee/blobs"),
                users_file: None,
            },
            database: None,
            notifications: NotificationConfig {
                channel_capacity: 256,
                relay_interval_ms: 500,
                max_attempts: 5,
                batch_size: 100,
                sufficiency_roles: vec![3],
            },
            reconciliation: ReconciliationConfig {
                interval_seconds: 60,
                batch_size: 50,
            },
            auth: AuthConfig {
                cache_ttl_seconds: 300,
                cache_capacity: 1_000,
            },
        }
    }
}

impl CommitteeConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration file (procurement-committee.toml)
    /// 3. Environment variables (prefixed with PROCUREMENT_, nested keys split on `__`)
    pub fn load() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if Path::new("procurement-committee.toml").exists() {
            builder = builder.add_source(File::with_name("procurement-committee"));
        }

        builder = builder.add_source(
            Environment::with_prefix("PROCUREMENT")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("notifications.sufficiency_roles")
                .try_parsing(true),
        );

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<CommitteeConfig, anyhow::Error>> = std::sync::LazyLock::new(|| {
    let _ = CommitteeConfig::load_env_file();
    CommitteeConfig::load()
});

/// Get the global configuration
pub fn config() -> Result<&'static CommitteeConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

/// Initialize configuration (called at startup)
pub fn init_config() -> Result<()> {
    let config = config()?;
    tracing::info!(bind_address = %config.server.bind_address, "Configuration loaded successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_survive_toml_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("procurement-committee.toml");
        CommitteeConfig::default().save_to_file(&path).unwrap();

        let loaded: CommitteeConfig = Config::builder()
            .add_source(File::from(path.as_path()))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(loaded.server.bind_address, "127.0.0.1:8080");
        assert_eq!(loaded.notifications.sufficiency_roles, vec![3]);
        assert!(loaded.database.is_none());
    }

    #[test]
    fn test_durations() {
        let config = CommitteeConfig::default();
        assert_eq!(config.notifications.relay_interval(), Duration::from_millis(500));
        assert_eq!(config.reconciliation.interval(), Duration::from_secs(60));
        assert_eq!(config.auth.cache_ttl(), Duration::from_secs(300));
    }
}
