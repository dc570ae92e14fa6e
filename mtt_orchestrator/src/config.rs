//! Orchestrator configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use std::str::FromStr;

/// Orchestrator configuration loaded from environment variables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Bound of the request queue
    pub request_queue_capacity: usize,
    /// Per-subscriber event channel size
    pub event_buffer: usize,
    /// Re-buy wait used when a competition leaves it at zero
    pub default_rebuy_waiting_secs: u32,
    /// Action time used when a competition leaves it at zero
    pub default_action_time_secs: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            request_queue_capacity: 1024,
            event_buffer: 256,
            default_rebuy_waiting_secs: 30,
            default_action_time_secs: 15,
        }
    }
}

impl OrchestratorConfig {
    /// Load configuration from environment variables
    ///
    /// Unset variables fall back to defaults.
    ///
    /// # Errors
    ///
    /// Returns error if a variable is set but cannot be parsed
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            request_queue_capacity: parse_env_or(
                "MTT_REQUEST_QUEUE_CAPACITY",
                defaults.request_queue_capacity,
            )?,
            event_buffer: parse_env_or("MTT_EVENT_BUFFER", defaults.event_buffer)?,
            default_rebuy_waiting_secs: parse_env_or(
                "MTT_DEFAULT_REBUY_WAITING_SECS",
                defaults.default_rebuy_waiting_secs,
            )?,
            default_action_time_secs: parse_env_or(
                "MTT_DEFAULT_ACTION_TIME_SECS",
                defaults.default_action_time_secs,
            )?,
        })
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_queue_capacity == 0 {
            return Err(ConfigError::Invalid {
                var: "MTT_REQUEST_QUEUE_CAPACITY".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.event_buffer == 0 {
            return Err(ConfigError::Invalid {
                var: "MTT_EVENT_BUFFER".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.default_action_time_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "MTT_DEFAULT_ACTION_TIME_SECS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Helper to parse environment variable with default fallback
fn parse_env_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var: key.to_string(),
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}
