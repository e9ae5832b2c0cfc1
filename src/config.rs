//! Environment-driven settings.
//!
//! | Variable | Default |
//! |---|---|
//! | `STOREFRONT_API_URL` | unset: in-process backend |
//! | `STOREFRONT_EVENTS_URL` | required when `STOREFRONT_API_URL` is set |
//! | `STOREFRONT_CHANNEL_BUFFER` | `32` |
//! | `STOREFRONT_REQUEST_TIMEOUT_SECS` | `10` |

use std::{env, fmt::Display, str::FromStr, time::Duration};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid {key} value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0} must be set")]
    Missing(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_url: Option<String>,
    pub events_url: Option<String>,
    pub channel_buffer: usize,
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: None,
            events_url: None,
            channel_buffer: 32,
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup; `load` uses the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_url = optional(&lookup, "STOREFRONT_API_URL");
        let events_url = optional(&lookup, "STOREFRONT_EVENTS_URL");
        if api_url.is_some() && events_url.is_none() {
            return Err(ConfigError::Missing("STOREFRONT_EVENTS_URL"));
        }

        let channel_buffer: usize = try_load(&lookup, "STOREFRONT_CHANNEL_BUFFER", "32")?;
        if channel_buffer == 0 {
            return Err(ConfigError::Invalid {
                key: "STOREFRONT_CHANNEL_BUFFER",
                value: "0".into(),
                reason: "must be positive".into(),
            });
        }
        let timeout_secs: u64 = try_load(&lookup, "STOREFRONT_REQUEST_TIMEOUT_SECS", "10")?;

        Ok(Self {
            api_url,
            events_url,
            channel_buffer,
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

fn optional(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    let value = lookup(key).filter(|v| !v.trim().is_empty());
    if value.is_none() {
        info!("{key} not set");
    }
    value
}

fn try_load<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: &str,
) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    let value = lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    value.parse().map_err(|e: T::Err| {
        warn!("Invalid {key} value: {e}");
        ConfigError::Invalid {
            key,
            value: value.clone(),
            reason: e.to_string(),
        }
    })
}
