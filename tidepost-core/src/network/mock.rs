// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Mock Transport
//!
//! In-memory implementation of the [`Connector`] trait for testing, plus a
//! small store-and-forward relay running on top of it.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use super::envelope::{self, Opcode};
use super::error::NetworkError;
use super::mailbox::MAILBOX_ADDRESS_LEN;
use super::transport::{Connector, Link, LinkMessage, TransportResult};

#[derive(Debug, Default)]
struct MockConnectorState {
    attempts: u32,
    urls: Vec<String>,
    scripted_failures: VecDeque<NetworkError>,
    attempt_times: Vec<tokio::time::Instant>,
}

/// Mock connector for testing.
///
/// Every successful `connect` hands the server side of the link to the
/// paired [`MockServer`]. Failures can be scripted per attempt.
///
/// # Example
///
/// ```ignore
/// use tidepost_core::network::MockConnector;
///
/// let (connector, mut server) = MockConnector::new();
/// connector.fail_next(NetworkError::ConnectionFailed("refused".into()));
///
/// // ... socket.connect() ...
/// let mut peer = server.accept().await.unwrap();
/// peer.send_frame(frame);
/// ```
#[derive(Clone)]
pub struct MockConnector {
    state: Arc<Mutex<MockConnectorState>>,
    accepted: mpsc::UnboundedSender<MockPeer>,
}

impl MockConnector {
    /// Creates a connector and the server that receives its connections.
    pub fn new() -> (Self, MockServer) {
        let (accepted, incoming) = mpsc::unbounded();
        let connector = MockConnector {
            state: Arc::new(Mutex::new(MockConnectorState::default())),
            accepted,
        };
        (connector, MockServer { incoming })
    }

    /// Makes the next connection attempt fail with `error`.
    ///
    /// Calls queue up: each one fails exactly one future attempt.
    pub fn fail_next(&self, error: NetworkError) {
        self.state.lock().scripted_failures.push_back(error);
    }

    /// Number of connection attempts made so far.
    pub fn attempts(&self) -> u32 {
        self.state.lock().attempts
    }

    /// URLs of all connection attempts, in order.
    pub fn urls(&self) -> Vec<String> {
        self.state.lock().urls.clone()
    }

    /// Instants (tokio clock) at which attempts were made.
    pub fn attempt_times(&self) -> Vec<tokio::time::Instant> {
        self.state.lock().attempt_times.clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, url: &str) -> TransportResult<Link> {
        let scripted = {
            let mut state = self.state.lock();
            state.attempts += 1;
            state.urls.push(url.to_string());
            state.attempt_times.push(tokio::time::Instant::now());
            state.scripted_failures.pop_front()
        };
        if let Some(error) = scripted {
            return Err(error);
        }

        let (to_client, client_rx) = mpsc::unbounded();
        let (client_tx, from_client) = mpsc::unbounded();

        let peer = MockPeer {
            url: url.to_string(),
            to_client,
            from_client,
        };
        self.accepted
            .unbounded_send(peer)
            .map_err(|_| NetworkError::ConnectionFailed("mock server dropped".into()))?;

        let sink = client_tx.sink_map_err(|e| NetworkError::SendFailed(e.to_string()));
        Ok(Link {
            sink: Box::pin(sink),
            stream: Box::pin(client_rx),
        })
    }
}

/// Server side of a [`MockConnector`].
pub struct MockServer {
    incoming: mpsc::UnboundedReceiver<MockPeer>,
}

impl MockServer {
    /// Waits for the next client connection.
    pub async fn accept(&mut self) -> Option<MockPeer> {
        self.incoming.next().await
    }
}

/// Server end of one mock connection.
///
/// Dropping the peer closes the connection from the server side.
pub struct MockPeer {
    url: String,
    to_client: mpsc::UnboundedSender<TransportResult<LinkMessage>>,
    from_client: mpsc::UnboundedReceiver<LinkMessage>,
}

impl MockPeer {
    /// URL the client connected to.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Delivers a binary frame to the client. Returns false if the client is gone.
    pub fn send_frame(&self, frame: Vec<u8>) -> bool {
        self.to_client
            .unbounded_send(Ok(LinkMessage::Binary(frame)))
            .is_ok()
    }

    /// Delivers a text frame to the client.
    pub fn send_text(&self, text: &str) -> bool {
        self.to_client
            .unbounded_send(Ok(LinkMessage::Text(text.to_string())))
            .is_ok()
    }

    /// Delivers a transport error to the client.
    pub fn fail(&self, error: NetworkError) -> bool {
        self.to_client.unbounded_send(Err(error)).is_ok()
    }

    /// Next message sent by the client, or `None` once it closed its side.
    pub async fn recv(&mut self) -> Option<LinkMessage> {
        self.from_client.next().await
    }

    /// Closes the connection from the server side.
    pub fn disconnect(self) {}
}

impl fmt::Debug for MockConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockConnector")
            .field("attempts", &self.attempts())
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for MockServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockServer").finish_non_exhaustive()
    }
}

impl fmt::Debug for MockPeer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockPeer")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

/// Blobs stored under one mailbox.
type MailboxStore = HashMap<[u8; MAILBOX_ADDRESS_LEN], Vec<Vec<u8>>>;

#[derive(Debug, Default)]
struct MemoryRelayState {
    mailboxes: MailboxStore,
    deletes: Vec<([u8; MAILBOX_ADDRESS_LEN], Vec<Vec<u8>>)>,
    silent: bool,
}

/// In-memory store-and-forward relay serving a [`MockServer`].
///
/// - PUT stores the blob under its mailbox and answers with an empty PUT
///   frame as acknowledgement.
/// - FETCH replays every blob stored under the mailbox as FETCH frames.
/// - DELETE is recorded and removes blobs equal to one of the ids.
///
/// Mailbox contents outlive individual connections.
#[derive(Debug, Clone)]
pub struct MemoryRelay {
    state: Arc<Mutex<MemoryRelayState>>,
    task: Arc<JoinHandle<()>>,
}

impl MemoryRelay {
    /// Starts serving every connection accepted by `server`.
    pub fn spawn(mut server: MockServer) -> Self {
        let state = Arc::new(Mutex::new(MemoryRelayState::default()));
        let accept_state = state.clone();
        let task = tokio::spawn(async move {
            while let Some(peer) = server.accept().await {
                tokio::spawn(serve_peer(peer, accept_state.clone()));
            }
        });
        MemoryRelay {
            state,
            task: Arc::new(task),
        }
    }

    /// Stores `blob` under `mailbox` as if a client had PUT it.
    pub fn insert(&self, mailbox: &[u8; MAILBOX_ADDRESS_LEN], blob: Vec<u8>) {
        self.state
            .lock()
            .mailboxes
            .entry(*mailbox)
            .or_default()
            .push(blob);
    }

    /// Blobs currently stored under `mailbox`.
    pub fn stored(&self, mailbox: &[u8; MAILBOX_ADDRESS_LEN]) -> Vec<Vec<u8>> {
        self.state
            .lock()
            .mailboxes
            .get(mailbox)
            .cloned()
            .unwrap_or_default()
    }

    /// DELETE requests received so far.
    pub fn delete_requests(&self) -> Vec<([u8; MAILBOX_ADDRESS_LEN], Vec<Vec<u8>>)> {
        self.state.lock().deletes.clone()
    }

    /// When silent, the relay stores and replays but never acknowledges a PUT.
    pub fn set_silent(&self, silent: bool) {
        self.state.lock().silent = silent;
    }

    /// Stops accepting new connections.
    pub fn shutdown(&self) {
        self.task.abort();
    }
}

async fn serve_peer(mut peer: MockPeer, state: Arc<Mutex<MemoryRelayState>>) {
    while let Some(message) = peer.recv().await {
        let LinkMessage::Binary(frame) = message else {
            continue;
        };
        let Ok(envelope) = envelope::decode(&frame) else {
            continue;
        };
        if envelope.payload.len() < MAILBOX_ADDRESS_LEN {
            continue;
        }

        let mut mailbox = [0u8; MAILBOX_ADDRESS_LEN];
        mailbox.copy_from_slice(&envelope.payload[..MAILBOX_ADDRESS_LEN]);
        let body = &envelope.payload[MAILBOX_ADDRESS_LEN..];

        let replies = {
            let mut state = state.lock();
            match envelope.opcode {
                Opcode::Put => {
                    state.mailboxes.entry(mailbox).or_default().push(body.to_vec());
                    if state.silent {
                        Vec::new()
                    } else {
                        vec![(Opcode::Put, Vec::new())]
                    }
                }
                Opcode::Fetch => state
                    .mailboxes
                    .get(&mailbox)
                    .map(|blobs| {
                        blobs
                            .iter()
                            .map(|blob| (Opcode::Fetch, blob.clone()))
                            .collect()
                    })
                    .unwrap_or_default(),
                Opcode::Delete => {
                    let ids = parse_delete_ids(body);
                    if let Some(blobs) = state.mailboxes.get_mut(&mailbox) {
                        blobs.retain(|blob| !ids.contains(blob));
                    }
                    state.deletes.push((mailbox, ids));
                    Vec::new()
                }
            }
        };

        for (opcode, payload) in replies {
            let Ok(frame) = envelope::encode(opcode, &payload) else {
                continue;
            };
            if !peer.send_frame(frame) {
                return;
            }
        }
    }
}

/// Parses the `repeated(len:4LE, id)` tail of a DELETE payload.
fn parse_delete_ids(mut body: &[u8]) -> Vec<Vec<u8>> {
    let mut ids = Vec::new();
    while body.len() >= 4 {
        let mut len = [0u8; 4];
        len.copy_from_slice(&body[..4]);
        let len = u32::from_le_bytes(len) as usize;
        body = &body[4..];
        if body.len() < len {
            break;
        }
        ids.push(body[..len].to_vec());
        body = &body[len..];
    }
    ids
}
