// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Client Configuration Tests

use std::collections::HashMap;
use std::time::Duration;

use tidepost_core::config::{ClientConfig, ConfigError};

fn lookup(pairs: &[(&str, &str)]) -> impl FnMut(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn test_defaults_when_unset() {
    let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
    assert_eq!(config.transport.relay_url, "");
    assert_eq!(config.transport.connect_timeout, Duration::from_secs(10));
    assert_eq!(config.transport.fetch_timeout, Duration::from_millis(1_500));
    assert_eq!(config.transport.reconnect.base_delay, Duration::from_millis(250));
    assert_eq!(config.transport.reconnect.max_delay, Duration::from_millis(30_000));
    assert_eq!(config.backup.ack_timeout, Duration::from_secs(5));
    assert_eq!(config.backup.download_timeout, Duration::from_millis(2_000));
}

#[test]
fn test_overrides() {
    let config = ClientConfig::from_lookup(lookup(&[
        ("TIDEPOST_RELAY_URL", " wss://relay.example.com "),
        ("TIDEPOST_OPEN_TIMEOUT_MS", "3000"),
        ("TIDEPOST_FETCH_TIMEOUT_MS", "800"),
        ("TIDEPOST_RECONNECT_BASE_MS", "100"),
        ("TIDEPOST_RECONNECT_MAX_MS", "1000"),
        ("TIDEPOST_BACKUP_ACK_TIMEOUT_MS", "7000"),
        ("TIDEPOST_BACKUP_DOWNLOAD_TIMEOUT_MS", "2500"),
    ]))
    .unwrap();

    assert_eq!(config.transport.relay_url, "wss://relay.example.com");
    assert_eq!(config.transport.open_timeout, Duration::from_secs(3));
    assert_eq!(config.backup.open_timeout, Duration::from_secs(3));
    assert_eq!(config.transport.fetch_timeout, Duration::from_millis(800));
    assert_eq!(
        config.transport.reconnect.delay_for_attempt(5),
        Duration::from_millis(1_000)
    );
    assert_eq!(config.backup.reconnect, config.transport.reconnect);
    assert_eq!(config.backup.ack_timeout, Duration::from_secs(7));
    assert_eq!(config.backup.download_timeout, Duration::from_millis(2_500));
}

#[test]
fn test_rejects_non_numeric_and_zero() {
    let err = ClientConfig::from_lookup(lookup(&[("TIDEPOST_FETCH_TIMEOUT_MS", "soon")]))
        .unwrap_err();
    assert!(matches!(
        err,
        ConfigError::InvalidValue { key: "TIDEPOST_FETCH_TIMEOUT_MS", .. }
    ));

    let err = ClientConfig::from_lookup(lookup(&[("TIDEPOST_BACKUP_ACK_TIMEOUT_MS", "0")]))
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "invalid TIDEPOST_BACKUP_ACK_TIMEOUT_MS='0': must be at least 1"
    );
}

#[test]
fn test_rejects_non_websocket_url() {
    let err = ClientConfig::from_lookup(lookup(&[("TIDEPOST_RELAY_URL", "https://x.test")]))
        .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { key: "TIDEPOST_RELAY_URL", .. }));
}

#[test]
fn test_rejects_max_below_base() {
    let err = ClientConfig::from_lookup(lookup(&[
        ("TIDEPOST_RECONNECT_BASE_MS", "500"),
        ("TIDEPOST_RECONNECT_MAX_MS", "100"),
    ]))
    .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { key: "TIDEPOST_RECONNECT_MAX_MS", .. }));
}

#[test]
fn test_blank_values_are_unset() {
    let config = ClientConfig::from_lookup(lookup(&[
        ("TIDEPOST_RELAY_URL", "   "),
        ("TIDEPOST_FETCH_TIMEOUT_MS", ""),
    ]))
    .unwrap();
    assert_eq!(config.transport.relay_url, "");
    assert_eq!(config.transport.fetch_timeout, Duration::from_millis(1_500));
}
