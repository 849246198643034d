// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! WebSocket Transport
//!
//! Real connector implementation using tokio-tungstenite.
//! The TLS backend is selected by the `network-native-tls` / `network-rustls`
//! features.

use std::time::Duration;

use async_trait::async_trait;
use futures::{future, SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::debug;

use super::error::NetworkError;
use super::transport::{Connector, Link, LinkMessage, TransportConfig, TransportResult};

/// Opens WebSocket connections to the relay.
///
/// Supports both ws:// (plaintext) and wss:// (TLS) URLs.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use tidepost_core::network::{ReconnectingSocket, TransportConfig, WebSocketConnector};
///
/// let config = TransportConfig::with_relay("wss://relay.example.com");
/// let connector = Arc::new(WebSocketConnector::new(&config));
/// let socket = ReconnectingSocket::from_config(connector, &config);
/// socket.connect_and_wait_open(config.open_timeout).await?;
/// ```
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    connect_timeout: Duration,
}

impl WebSocketConnector {
    pub fn new(config: &TransportConfig) -> Self {
        WebSocketConnector {
            connect_timeout: config.connect_timeout,
        }
    }

    /// Validates the URL scheme before any network I/O happens.
    fn check_url(url: &str) -> TransportResult<()> {
        if url.starts_with("wss://") || url.starts_with("ws://") {
            Ok(())
        } else {
            Err(NetworkError::InvalidUrl(
                "expected ws:// or wss:// scheme".into(),
            ))
        }
    }
}

impl Default for WebSocketConnector {
    fn default() -> Self {
        Self::new(&TransportConfig::default())
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, url: &str) -> TransportResult<Link> {
        Self::check_url(url)?;

        let (socket, _response) =
            tokio::time::timeout(self.connect_timeout, tokio_tungstenite::connect_async(url))
                .await
                .map_err(|_| NetworkError::ConnectionFailed("connect timed out".into()))?
                .map_err(|e| NetworkError::ConnectionFailed(e.to_string()))?;

        let (write, read) = socket.split();

        let sink = write
            .sink_map_err(|e| NetworkError::SendFailed(e.to_string()))
            .with(|message: LinkMessage| future::ready(Ok::<_, NetworkError>(into_ws(message))));

        let stream = read.filter_map(|message| future::ready(from_ws(message)));

        Ok(Link {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        })
    }
}

fn into_ws(message: LinkMessage) -> Message {
    match message {
        LinkMessage::Binary(data) => Message::Binary(data),
        LinkMessage::Text(text) => Message::Text(text),
    }
}

/// Maps a WebSocket message onto a link message. Control frames are handled
/// by tungstenite itself and are filtered out here.
fn from_ws(
    message: Result<Message, tungstenite::Error>,
) -> Option<TransportResult<LinkMessage>> {
    match message {
        Ok(Message::Binary(data)) => Some(Ok(LinkMessage::Binary(data))),
        Ok(Message::Text(text)) => Some(Ok(LinkMessage::Text(text))),
        Ok(Message::Close(frame)) => {
            debug!(?frame, "relay sent close frame");
            None
        }
        Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => None,
        Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
            Some(Err(NetworkError::ConnectionClosed))
        }
        Err(e) => Some(Err(NetworkError::ReceiveFailed(e.to_string()))),
    }
}
