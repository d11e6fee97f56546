//! Process configuration read from environment variables.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use crate::reservation_service::RetryPolicy;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} is not valid: {value:?} ({reason})")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0} must be set when USE_PERSISTENT_STORES=true")]
    Missing(&'static str),
}

/// Storage backend selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    InMemory,
    Postgres {
        database_url: String,
        max_connections: u32,
    },
}

/// Registry service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    pub bind_addr: SocketAddr,
    pub storage: StorageConfig,
    /// Upper bound for one ledger attempt, including waiting for a connection.
    pub claim_timeout: Duration,
    pub retry_attempts: u32,
    pub retry_base: Duration,
    pub retry_max: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            storage: StorageConfig::InMemory,
            claim_timeout: Duration::from_millis(5_000),
            retry_attempts: 3,
            retry_base: Duration::from_millis(50),
            retry_max: Duration::from_millis(1_000),
        }
    }
}

impl RegistryConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable lookup (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let bind_addr = parse_or("BIND_ADDR", &lookup, defaults.bind_addr)?;

        let persistent = match lookup("USE_PERSISTENT_STORES") {
            None => false,
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "" | "0" | "false" | "no" => false,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "USE_PERSISTENT_STORES",
                        value: raw,
                        reason: "expected true or false".to_string(),
                    });
                }
            },
        };

        let storage = if persistent {
            let database_url = lookup("DATABASE_URL")
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing("DATABASE_URL"))?;
            let max_connections = parse_or("DATABASE_MAX_CONNECTIONS", &lookup, 10u32)?;
            if max_connections == 0 {
                return Err(ConfigError::Invalid {
                    name: "DATABASE_MAX_CONNECTIONS",
                    value: "0".to_string(),
                    reason: "must be at least 1".to_string(),
                });
            }
            StorageConfig::Postgres {
                database_url,
                max_connections,
            }
        } else {
            StorageConfig::InMemory
        };

        let claim_timeout_ms = parse_or("CLAIM_TIMEOUT_MS", &lookup, 5_000u64)?;
        if claim_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                name: "CLAIM_TIMEOUT_MS",
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }

        let retry_attempts = parse_or("STORAGE_RETRY_ATTEMPTS", &lookup, defaults.retry_attempts)?;
        if retry_attempts == 0 {
            return Err(ConfigError::Invalid {
                name: "STORAGE_RETRY_ATTEMPTS",
                value: "0".to_string(),
                reason: "must be at least 1 (the first attempt counts)".to_string(),
            });
        }
        let retry_base_ms = parse_or("STORAGE_RETRY_BASE_MS", &lookup, 50u64)?;
        let retry_max_ms = parse_or("STORAGE_RETRY_MAX_MS", &lookup, 1_000u64)?;

        Ok(Self {
            bind_addr,
            storage,
            claim_timeout: Duration::from_millis(claim_timeout_ms),
            retry_attempts,
            retry_base: Duration::from_millis(retry_base_ms),
            retry_max: Duration::from_millis(retry_max_ms.max(retry_base_ms)),
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_attempts,
            base_delay: self.retry_base,
            max_delay: self.retry_max,
        }
    }

    pub fn is_persistent(&self) -> bool {
        matches!(self.storage, StorageConfig::Postgres { .. })
    }
}

fn parse_or<T, F>(name: &'static str, lookup: &F, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = RegistryConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, RegistryConfig::default());
        assert!(!config.is_persistent());
        assert_eq!(config.retry_policy().max_attempts, 3);
    }

    #[test]
    fn persistent_mode_requires_database_url() {
        let err = RegistryConfig::from_lookup(lookup(&[("USE_PERSISTENT_STORES", "true")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("DATABASE_URL"));
    }

    #[test]
    fn persistent_mode_reads_pool_settings() {
        let config = RegistryConfig::from_lookup(lookup(&[
            ("USE_PERSISTENT_STORES", "true"),
            ("DATABASE_URL", "postgres://localhost/partyplan"),
            ("DATABASE_MAX_CONNECTIONS", "4"),
            ("CLAIM_TIMEOUT_MS", "250"),
        ]))
        .unwrap();

        assert_eq!(
            config.storage,
            StorageConfig::Postgres {
                database_url: "postgres://localhost/partyplan".to_string(),
                max_connections: 4,
            }
        );
        assert_eq!(config.claim_timeout, Duration::from_millis(250));
    }

    #[test]
    fn malformed_values_are_rejected() {
        let err = RegistryConfig::from_lookup(lookup(&[("CLAIM_TIMEOUT_MS", "soon")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "CLAIM_TIMEOUT_MS", .. }));

        let err = RegistryConfig::from_lookup(lookup(&[("BIND_ADDR", "localhost")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "BIND_ADDR", .. }));

        let err = RegistryConfig::from_lookup(lookup(&[("STORAGE_RETRY_ATTEMPTS", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "STORAGE_RETRY_ATTEMPTS", .. }));
    }

    #[test]
    fn retry_cap_is_never_below_base() {
        let config = RegistryConfig::from_lookup(lookup(&[
            ("STORAGE_RETRY_BASE_MS", "200"),
            ("STORAGE_RETRY_MAX_MS", "100"),
        ]))
        .unwrap();
        assert_eq!(config.retry_max, Duration::from_millis(200));
    }
}
