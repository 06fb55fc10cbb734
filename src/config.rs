// ============================================================================
// Configuration
// ============================================================================
//
// Read once at startup from the environment (a `.env` file is loaded first by
// `main`) and passed explicitly to the components that need it.
//
//   DATABASE_URL          postgres://...      required when ORDER_STORE=postgres
//   DB_MAX_CONNECTIONS    10
//   ORDER_STORE           postgres | memory   (postgres)
//   CUSTOMER_ROOT_API     http://localhost:3211/api
//   CUSTOMER_TIMEOUT_MS   2000
//   ADMISSION_TIMEOUT_MS  5000
//   METRICS_PORT          9090
//
// ============================================================================

use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key}={value:?} is invalid: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub store_backend: StoreBackend,
    pub customer_root_api: String,
    pub customer_timeout: Duration,
    /// Longest a creation may queue for the admission gate.
    pub admission_timeout: Duration,
    pub metrics_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let store_backend = match get("ORDER_STORE").as_deref().map(str::trim) {
            None | Some("postgres") => StoreBackend::Postgres,
            Some("memory") => StoreBackend::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "ORDER_STORE",
                    value: other.to_string(),
                    reason: "expected `postgres` or `memory`".into(),
                })
            }
        };

        let database_url = get("DATABASE_URL");
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        Ok(Self {
            database_url,
            db_max_connections: parse_or(get("DB_MAX_CONNECTIONS"), "DB_MAX_CONNECTIONS", 10)?,
            store_backend,
            customer_root_api: get("CUSTOMER_ROOT_API")
                .unwrap_or_else(|| "http://localhost:3211/api".to_string()),
            customer_timeout: Duration::from_millis(parse_or(
                get("CUSTOMER_TIMEOUT_MS"),
                "CUSTOMER_TIMEOUT_MS",
                2000,
            )?),
            admission_timeout: Duration::from_millis(parse_or(
                get("ADMISSION_TIMEOUT_MS"),
                "ADMISSION_TIMEOUT_MS",
                5000,
            )?),
            metrics_port: parse_or(get("METRICS_PORT"), "METRICS_PORT", 9090)?,
        })
    }
}

fn parse_or<T>(raw: Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
    }
}
