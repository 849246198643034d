// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! CLI Configuration

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tidepost_core::{ClientConfig, Connector, RecoveryKey, WebSocketConnector};

/// CLI configuration.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Transport and backup settings (environment plus flag overrides).
    pub client: ClientConfig,
}

impl CliConfig {
    /// Loads settings from the environment; `relay` overrides `TIDEPOST_RELAY_URL`.
    pub fn load(relay: Option<String>) -> Result<Self> {
        let mut client = ClientConfig::from_env().context("Invalid environment configuration")?;
        if let Some(relay) = relay {
            client.transport.relay_url = relay;
        }
        Ok(CliConfig { client })
    }

    /// Relay URL, required by every network command.
    pub fn relay_url(&self) -> Result<&str> {
        let url = self.client.transport.relay_url.as_str();
        if url.is_empty() {
            bail!("No relay configured. Pass --relay or set TIDEPOST_RELAY_URL.");
        }
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            bail!("Relay URL must start with ws:// or wss://, got {}", url);
        }
        Ok(url)
    }

    /// WebSocket connector honoring the configured connect timeout.
    pub fn connector(&self) -> Arc<dyn Connector> {
        Arc::new(WebSocketConnector::new(&self.client.transport))
    }
}

/// Parses a hex-encoded 32-byte recovery key.
pub fn parse_recovery_key(hex_key: &str) -> Result<RecoveryKey> {
    let bytes = hex::decode(hex_key.trim()).context("Recovery key must be hex")?;
    match RecoveryKey::from_slice(&bytes) {
        Some(key) => Ok(key),
        None => bail!(
            "Recovery key must be 32 bytes (64 hex characters), got {} bytes",
            bytes.len()
        ),
    }
}
