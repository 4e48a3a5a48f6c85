use anyhow::bail;
use common::postgres::PostgresConfig;
use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Record store backend (memory, postgres)
    #[serde(default = "default_store_backend")]
    pub store_backend: String,

    // PostgreSQL configuration
    /// PostgreSQL host
    #[serde(default = "default_postgres_host")]
    pub postgres_host: String,

    /// PostgreSQL port
    #[serde(default = "default_postgres_port")]
    pub postgres_port: u16,

    /// PostgreSQL database name
    #[serde(default = "default_postgres_database")]
    pub postgres_database: String,

    /// PostgreSQL username
    #[serde(default = "default_postgres_username")]
    pub postgres_username: String,

    /// PostgreSQL password
    #[serde(default = "default_postgres_password")]
    pub postgres_password: String,

    /// Maximum pooled PostgreSQL connections
    #[serde(default = "default_postgres_max_pool_size")]
    pub postgres_max_pool_size: usize,

    /// Create the employees and devices tables at startup when missing
    #[serde(default = "default_postgres_apply_schema")]
    pub postgres_apply_schema: bool,

    /// Approve every delete without prompting
    #[serde(default)]
    pub assume_yes: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_store_backend() -> String {
    "memory".to_string()
}

// PostgreSQL defaults
fn default_postgres_host() -> String {
    "localhost".to_string()
}

fn default_postgres_port() -> u16 {
    5432
}

fn default_postgres_database() -> String {
    "device_manager".to_string()
}

fn default_postgres_username() -> String {
    "device_manager".to_string()
}

fn default_postgres_password() -> String {
    "device_manager".to_string()
}

fn default_postgres_max_pool_size() -> usize {
    5
}

fn default_postgres_apply_schema() -> bool {
    true
}

/// Where employee and device records live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Postgres,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            other => bail!("unknown store backend '{}' (expected memory or postgres)", other),
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("DEVICE_MANAGER"))
            .build()?
            .try_deserialize()
    }

    pub fn backend(&self) -> anyhow::Result<StoreBackend> {
        self.store_backend.parse()
    }

    pub fn postgres_config(&self) -> PostgresConfig {
        PostgresConfig {
            host: self.postgres_host.clone(),
            port: self.postgres_port,
            database: self.postgres_database.clone(),
            username: self.postgres_username.clone(),
            password: self.postgres_password.clone(),
            max_pool_size: self.postgres_max_pool_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // env vars are process wide; tests touching them run one at a time
    static TEST_LOCK: Mutex<()> = Mutex::new(());

    const VARS: [&str; 4] = [
        "DEVICE_MANAGER_LOG_LEVEL",
        "DEVICE_MANAGER_STORE_BACKEND",
        "DEVICE_MANAGER_POSTGRES_PORT",
        "DEVICE_MANAGER_ASSUME_YES",
    ];

    fn clear_vars() {
        for var in VARS {
            // SAFETY: Test runs with mutex lock to prevent concurrent env access
            unsafe {
                std::env::remove_var(var);
            }
        }
    }

    #[test]
    fn test_default_config() {
        let _lock = TEST_LOCK.lock().unwrap();
        clear_vars();

        let config = ServiceConfig::from_env().unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.backend().unwrap(), StoreBackend::Memory);
        assert_eq!(config.postgres_port, 5432);
        assert!(config.postgres_apply_schema);
        assert!(!config.assume_yes);
    }

    #[test]
    fn test_custom_config() {
        let _lock = TEST_LOCK.lock().unwrap();
        clear_vars();

        // SAFETY: Test runs with mutex lock to prevent concurrent env access
        unsafe {
            std::env::set_var("DEVICE_MANAGER_LOG_LEVEL", "debug");
            std::env::set_var("DEVICE_MANAGER_STORE_BACKEND", "postgres");
            std::env::set_var("DEVICE_MANAGER_POSTGRES_PORT", "6543");
            std::env::set_var("DEVICE_MANAGER_ASSUME_YES", "true");
        }

        let config = ServiceConfig::from_env().unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.backend().unwrap(), StoreBackend::Postgres);
        assert!(config.assume_yes);

        let postgres = config.postgres_config();
        assert_eq!(postgres.port, 6543);
        assert_eq!(postgres.database, "device_manager");
        assert_eq!(postgres.max_pool_size, 5);

        clear_vars();
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        assert!("sqlite".parse::<StoreBackend>().is_err());
        assert_eq!(
            " Postgres ".parse::<StoreBackend>().unwrap(),
            StoreBackend::Postgres
        );
    }
}
