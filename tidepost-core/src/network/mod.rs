// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Network + Transport Layer
//!
//! Moves opaque ciphertext between the client and an untrusted relay.
//!
//! # Architecture
//!
//! The network layer consists of:
//! - **Envelope codec**: the `[opcode][length][payload]` binary frame
//! - **Mailbox utilities**: current/previous mailbox addresses
//! - **Connector trait**: platform-agnostic interface for opening links
//! - **Reconnecting socket**: backoff, open waiters and filtered frame dispatch
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tidepost_core::network::{MockConnector, MemoryRelay, ReconnectingSocket, TransportConfig};
//!
//! // In-memory relay (for testing)
//! let (connector, server) = MockConnector::new();
//! let relay = MemoryRelay::spawn(server);
//! let config = TransportConfig::with_relay("ws://relay.test");
//! let socket = ReconnectingSocket::from_config(Arc::new(connector), &config);
//!
//! socket.connect_and_wait_open(config.open_timeout).await?;
//! socket.send_put(&mailbox, b"ciphertext")?;
//! ```

pub mod envelope;
pub mod error;
pub mod listener;
pub mod mailbox;
pub mod mock;
pub mod socket;
pub mod transport;
pub mod websocket;

// Error types
pub use error::NetworkError;

// Wire format
pub use envelope::{
    decode, encode, Envelope, FrameError, Opcode, FRAME_HEADER_SIZE, MAX_PAYLOAD_SIZE,
};

// Mailbox addressing
pub use mailbox::{
    split_active, ActiveMailboxes, ConnectionId, MailboxAddress, MailboxError, ACTIVE_MAILBOX_LEN,
    CONNECTION_ID_LEN, MAILBOX_ADDRESS_LEN,
};

// Transport abstraction
pub use transport::{
    Connector, Link, LinkMessage, LinkSink, LinkStream, ReconnectPolicy, SocketState,
    TransportConfig, TransportResult,
};

// Mock transport for testing
pub use mock::{MemoryRelay, MockConnector, MockPeer, MockServer};

// WebSocket transport for production
pub use websocket::WebSocketConnector;

// Socket and listeners
pub use listener::{FrameCallback, FrameFilter, FrameSubscription, ListenerHandle};
pub use socket::ReconnectingSocket;
