// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration loading from environment variables.

/// Repository configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite connection URL
    pub database_url: String,
    /// Maximum pool connections
    pub max_connections: u32,
    /// Whether lifecycle events are published to observers
    pub event_dispatch_enabled: bool,
    /// Capacity of the lifecycle event broadcast channel
    pub event_channel_capacity: usize,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `RUNTARA_REPOSITORY_DATABASE_URL` (or `RUNTARA_DATABASE_URL`)
    ///
    /// Optional (with defaults):
    /// - `RUNTARA_REPOSITORY_MAX_CONNECTIONS`: pool size (default: 5)
    /// - `RUNTARA_EVENT_DISPATCH_ENABLED`: publish lifecycle events (default: true)
    /// - `RUNTARA_EVENT_CHANNEL_CAPACITY`: broadcast capacity (default: 256)
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("RUNTARA_REPOSITORY_DATABASE_URL")
            .or_else(|_| std::env::var("RUNTARA_DATABASE_URL"))
            .map_err(|_| {
                ConfigError::MissingEnvVar(
                    "RUNTARA_REPOSITORY_DATABASE_URL or RUNTARA_DATABASE_URL",
                )
            })?;

        let max_connections: u32 = std::env::var("RUNTARA_REPOSITORY_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .ok()
            .filter(|n| *n > 0)
            .ok_or(ConfigError::Invalid(
                "RUNTARA_REPOSITORY_MAX_CONNECTIONS",
                "must be a positive integer",
            ))?;

        let event_dispatch_enabled = std::env::var("RUNTARA_EVENT_DISPATCH_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let event_channel_capacity: usize = std::env::var("RUNTARA_EVENT_CHANNEL_CAPACITY")
            .unwrap_or_else(|_| "256".to_string())
            .parse()
            .ok()
            .filter(|n| *n > 0)
            .ok_or(ConfigError::Invalid(
                "RUNTARA_EVENT_CHANNEL_CAPACITY",
                "must be a positive integer",
            ))?;

        Ok(Self {
            database_url,
            max_connections,
            event_dispatch_enabled,
            event_channel_capacity,
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// An environment variable has an invalid value.
    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to serialize tests that modify environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    struct EnvGuard {
        vars: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new() -> Self {
            Self { vars: Vec::new() }
        }

        fn set(&mut self, key: &str, value: &str) {
            let old = env::var(key).ok();
            self.vars.push((key.to_string(), old));
            // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
            unsafe { env::set_var(key, value) };
        }

        fn remove(&mut self, key: &str) {
            let old = env::var(key).ok();
            self.vars.push((key.to_string(), old));
            // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
            unsafe { env::remove_var(key) };
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in self.vars.drain(..).rev() {
                // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
                unsafe {
                    match value {
                        Some(v) => env::set_var(&key, v),
                        None => env::remove_var(&key),
                    }
                }
            }
        }
    }

    fn clear_optional(guard: &mut EnvGuard) {
        guard.remove("RUNTARA_REPOSITORY_MAX_CONNECTIONS");
        guard.remove("RUNTARA_EVENT_DISPATCH_ENABLED");
        guard.remove("RUNTARA_EVENT_CHANNEL_CAPACITY");
    }

    #[test]
    fn test_config_from_env_with_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();

        guard.set("RUNTARA_REPOSITORY_DATABASE_URL", "sqlite::memory:");
        clear_optional(&mut guard);

        let config = Config::from_env().unwrap();

        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.max_connections, 5);
        assert!(config.event_dispatch_enabled);
        assert_eq!(config.event_channel_capacity, 256);
    }

    #[test]
    fn test_config_falls_back_to_shared_database_url() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();

        guard.remove("RUNTARA_REPOSITORY_DATABASE_URL");
        guard.set("RUNTARA_DATABASE_URL", "sqlite:shared.db");
        clear_optional(&mut guard);

        let config = Config::from_env().unwrap();
        assert_eq!(config.database_url, "sqlite:shared.db");
    }

    #[test]
    fn test_config_missing_database_url() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();

        guard.remove("RUNTARA_REPOSITORY_DATABASE_URL");
        guard.remove("RUNTARA_DATABASE_URL");

        let result = Config::from_env();
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(_))));
    }

    #[test]
    fn test_config_event_dispatch_disabled() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();

        guard.set("RUNTARA_REPOSITORY_DATABASE_URL", "sqlite::memory:");
        clear_optional(&mut guard);
        guard.set("RUNTARA_EVENT_DISPATCH_ENABLED", "false");

        let config = Config::from_env().unwrap();
        assert!(!config.event_dispatch_enabled);
    }

    #[test]
    fn test_config_invalid_max_connections() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();

        guard.set("RUNTARA_REPOSITORY_DATABASE_URL", "sqlite::memory:");
        clear_optional(&mut guard);
        guard.set("RUNTARA_REPOSITORY_MAX_CONNECTIONS", "0");

        let result = Config::from_env();
        assert!(matches!(
            result,
            Err(ConfigError::Invalid("RUNTARA_REPOSITORY_MAX_CONNECTIONS", _))
        ));
    }
}
