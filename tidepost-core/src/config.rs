// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Client Configuration
//!
//! Environment-backed configuration for relay transport and backup.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `TIDEPOST_RELAY_URL` | none (required for network use) |
//! | `TIDEPOST_CONNECT_TIMEOUT_MS` | 10000 |
//! | `TIDEPOST_OPEN_TIMEOUT_MS` | 10000 |
//! | `TIDEPOST_FETCH_TIMEOUT_MS` | 1500 |
//! | `TIDEPOST_RECONNECT_BASE_MS` | 250 |
//! | `TIDEPOST_RECONNECT_MAX_MS` | 30000 |
//! | `TIDEPOST_BACKUP_ACK_TIMEOUT_MS` | 5000 |
//! | `TIDEPOST_BACKUP_DOWNLOAD_TIMEOUT_MS` | 2000 |

use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::backup::BackupConfig;
use crate::network::{ReconnectPolicy, TransportConfig};

pub const ENV_RELAY_URL: &str = "TIDEPOST_RELAY_URL";
pub const ENV_CONNECT_TIMEOUT_MS: &str = "TIDEPOST_CONNECT_TIMEOUT_MS";
pub const ENV_OPEN_TIMEOUT_MS: &str = "TIDEPOST_OPEN_TIMEOUT_MS";
pub const ENV_FETCH_TIMEOUT_MS: &str = "TIDEPOST_FETCH_TIMEOUT_MS";
pub const ENV_RECONNECT_BASE_MS: &str = "TIDEPOST_RECONNECT_BASE_MS";
pub const ENV_RECONNECT_MAX_MS: &str = "TIDEPOST_RECONNECT_MAX_MS";
pub const ENV_BACKUP_ACK_TIMEOUT_MS: &str = "TIDEPOST_BACKUP_ACK_TIMEOUT_MS";
pub const ENV_BACKUP_DOWNLOAD_TIMEOUT_MS: &str = "TIDEPOST_BACKUP_DOWNLOAD_TIMEOUT_MS";

/// Errors produced while reading configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {key}='{value}': {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Complete client configuration.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub transport: TransportConfig,
    pub backup: BackupConfig,
}

impl ClientConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads configuration through `lookup`; unset keys keep their defaults.
    pub fn from_lookup<F>(mut lookup: F) -> Result<Self, ConfigError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut config = ClientConfig::default();

        if let Some(url) = optional_trimmed(ENV_RELAY_URL, &mut lookup) {
            if !(url.starts_with("ws://") || url.starts_with("wss://")) {
                return Err(ConfigError::InvalidValue {
                    key: ENV_RELAY_URL,
                    value: url,
                    reason: "expected ws:// or wss:// URL".to_owned(),
                });
            }
            config.transport.relay_url = url;
        }

        let transport = &mut config.transport;
        if let Some(timeout) = parse_millis(ENV_CONNECT_TIMEOUT_MS, &mut lookup)? {
            transport.connect_timeout = timeout;
        }
        if let Some(timeout) = parse_millis(ENV_OPEN_TIMEOUT_MS, &mut lookup)? {
            transport.open_timeout = timeout;
            config.backup.open_timeout = timeout;
        }
        if let Some(timeout) = parse_millis(ENV_FETCH_TIMEOUT_MS, &mut lookup)? {
            transport.fetch_timeout = timeout;
        }

        let base = parse_millis(ENV_RECONNECT_BASE_MS, &mut lookup)?
            .unwrap_or(transport.reconnect.base_delay);
        let max = parse_millis(ENV_RECONNECT_MAX_MS, &mut lookup)?
            .unwrap_or(transport.reconnect.max_delay);
        if max < base {
            return Err(ConfigError::InvalidValue {
                key: ENV_RECONNECT_MAX_MS,
                value: max.as_millis().to_string(),
                reason: format!("must not be below {ENV_RECONNECT_BASE_MS}"),
            });
        }
        transport.reconnect = ReconnectPolicy::new(base, max);
        config.backup.reconnect = transport.reconnect;

        if let Some(timeout) = parse_millis(ENV_BACKUP_ACK_TIMEOUT_MS, &mut lookup)? {
            config.backup.ack_timeout = timeout;
        }
        if let Some(timeout) = parse_millis(ENV_BACKUP_DOWNLOAD_TIMEOUT_MS, &mut lookup)? {
            config.backup.download_timeout = timeout;
        }

        Ok(config)
    }
}

fn optional_trimmed<F>(key: &'static str, lookup: &mut F) -> Option<String>
where
    F: FnMut(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

/// Parses a positive millisecond count.
fn parse_millis<F>(key: &'static str, lookup: &mut F) -> Result<Option<Duration>, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    let Some(value) = optional_trimmed(key, lookup) else {
        return Ok(None);
    };
    match value.parse::<u64>() {
        Ok(0) => Err(ConfigError::InvalidValue {
            key,
            value,
            reason: "must be at least 1".to_owned(),
        }),
        Ok(ms) => Ok(Some(Duration::from_millis(ms))),
        Err(err) => Err(ConfigError::InvalidValue {
            key,
            value,
            reason: err.to_string(),
        }),
    }
}
