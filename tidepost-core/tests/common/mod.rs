// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Common Test Utilities
//!
//! Shared fixtures for socket, delivery and backup tests.

#![allow(dead_code)]

pub mod strategies;

use std::sync::Arc;
use std::time::Duration;

use tidepost_core::network::{
    MemoryRelay, MockConnector, MockServer, ReconnectPolicy, ReconnectingSocket,
};
use tracing_subscriber::EnvFilter;

pub const RELAY_URL: &str = "ws://relay.test";

/// Routes library events to the test harness output, filtered by `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs the subscriber.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Socket over a fresh mock connector with the default backoff.
pub fn mock_socket() -> (ReconnectingSocket, MockConnector, MockServer) {
    init_tracing();
    let (connector, server) = MockConnector::new();
    let socket = ReconnectingSocket::new(
        Arc::new(connector.clone()),
        RELAY_URL,
        ReconnectPolicy::default(),
    );
    (socket, connector, server)
}

/// Open socket talking to an in-memory relay.
pub async fn open_relay_socket() -> (ReconnectingSocket, MockConnector, MemoryRelay) {
    let (socket, connector, server) = mock_socket();
    let relay = MemoryRelay::spawn(server);
    socket
        .connect_and_wait_open(Duration::from_secs(1))
        .await
        .expect("mock socket should open");
    (socket, connector, relay)
}

/// Lets spawned tasks run until they block.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
