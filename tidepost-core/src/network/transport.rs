// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Transport Trait
//!
//! Platform-agnostic abstraction for opening relay connections, plus the
//! configuration shared by everything that talks to the relay.

use std::fmt;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Sink, Stream};

use super::error::NetworkError;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, NetworkError>;

/// Lifecycle of a [`ReconnectingSocket`](super::ReconnectingSocket).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    /// Created, never connected.
    Idle,
    /// Connection attempt in progress.
    Connecting,
    /// Connected and ready.
    Open,
    /// Connection lost (a reconnect may be scheduled) or closed by the owner.
    Closed,
}

/// A single message on a relay link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkMessage {
    /// Binary envelope frame.
    Binary(Vec<u8>),
    /// Text frame (used by the invite channel only).
    Text(String),
}

/// Outbound half of an open link.
pub type LinkSink = Pin<Box<dyn Sink<LinkMessage, Error = NetworkError> + Send>>;

/// Inbound half of an open link. The stream ends when the peer closes.
pub type LinkStream = Pin<Box<dyn Stream<Item = TransportResult<LinkMessage>> + Send>>;

/// An open bidirectional connection to the relay.
pub struct Link {
    pub sink: LinkSink,
    pub stream: LinkStream,
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link").finish_non_exhaustive()
    }
}

/// Opens relay connections.
///
/// This trait abstracts the underlying transport (WebSocket in production,
/// in-memory channels in tests) so sockets and protocols can be exercised
/// without a network.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens a new connection to `url`.
    async fn connect(&self, url: &str) -> TransportResult<Link>;
}

/// Exponential reconnect backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnect attempt.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl ReconnectPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        ReconnectPolicy {
            base_delay,
            max_delay,
        }
    }

    /// Delay before reconnect attempt number `attempt` (starting at 0):
    /// `min(max_delay, base_delay * 2^attempt)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let multiplier = 1u32.checked_shl(attempt.min(31)).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(multiplier)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy {
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_millis(30_000),
        }
    }
}

/// Configuration for relay connections.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Relay WebSocket URL (`ws://` or `wss://`).
    pub relay_url: String,
    /// Timeout for a single transport-level connection attempt.
    pub connect_timeout: Duration,
    /// Default deadline for `connect_and_wait_open`.
    pub open_timeout: Duration,
    /// Default time box for mailbox fetches.
    pub fetch_timeout: Duration,
    /// Reconnect backoff.
    pub reconnect: ReconnectPolicy,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            relay_url: String::new(),
            connect_timeout: Duration::from_secs(10),
            open_timeout: Duration::from_secs(10),
            fetch_timeout: Duration::from_millis(1_500),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl TransportConfig {
    /// Creates a config for `relay_url` with default timeouts.
    pub fn with_relay(relay_url: &str) -> Self {
        TransportConfig {
            relay_url: relay_url.to_string(),
            ..Default::default()
        }
    }
}
