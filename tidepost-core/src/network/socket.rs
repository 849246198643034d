// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Reconnecting Socket
//!
//! Owns one relay connection and keeps it alive with exponential backoff.
//!
//! State machine:
//!
//! ```text
//! Idle ──connect()──▶ Connecting ──open──▶ Open
//!                        ▲  │                │
//!          reconnect     │  │ error/close    │ error/close
//!          timer fires   │  ▼                ▼
//!                        └─ Closed ◀─────────┘
//! ```
//!
//! `close()` moves to `Closed` and stops the cycle until `connect()` is
//! called again.
//!
//! All background work runs as tokio tasks; the socket must be used from
//! within a tokio runtime.

use std::future;
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::envelope::{self, Opcode};
use super::error::NetworkError;
use super::listener::{FrameCallback, FrameFilter, FrameSubscription, ListenerHandle, ListenerRegistry};
use super::mailbox::MailboxAddress;
use super::transport::{
    Connector, LinkMessage, LinkSink, ReconnectPolicy, SocketState, TransportConfig,
    TransportResult,
};

/// Upper bound on the close handshake of a dropped link.
const SINK_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

enum Outbound {
    Frame(Vec<u8>),
    Close,
}

struct SocketInner {
    state: SocketState,
    /// Reconnect attempts since the last successful open.
    attempt: u32,
    /// Bumped on every connection attempt and on explicit close; events from
    /// an older epoch are ignored.
    epoch: u64,
    explicitly_closed: bool,
    waiters: Vec<oneshot::Sender<()>>,
    outbound: Option<mpsc::UnboundedSender<Outbound>>,
    driver: Option<JoinHandle<()>>,
    reconnect_timer: Option<JoinHandle<()>>,
}

struct Shared {
    url: String,
    connector: Arc<dyn Connector>,
    policy: ReconnectPolicy,
    inner: Mutex<SocketInner>,
    listeners: Arc<ListenerRegistry>,
}

/// Relay socket with automatic reconnection and frame demultiplexing.
///
/// Cloning yields another handle to the same connection. Background tasks
/// only hold weak references, so dropping every handle tears the
/// connection down.
///
/// # Example
///
/// ```ignore
/// use tidepost_core::network::{ReconnectingSocket, FrameFilter, Opcode};
///
/// let socket = ReconnectingSocket::new(connector, "wss://relay.example.com", Default::default());
/// socket.connect_and_wait_open(Duration::from_secs(5)).await?;
///
/// let _listener = socket.add_frame_listener(FrameFilter::Opcode(Opcode::Fetch), |frame| {
///     println!("{} bytes", frame.len());
/// });
/// socket.send_fetch(&mailbox)?;
/// ```
#[derive(Clone)]
pub struct ReconnectingSocket {
    shared: Arc<Shared>,
}

impl ReconnectingSocket {
    /// Creates an idle socket for `url`. Nothing happens until `connect()`.
    pub fn new(connector: Arc<dyn Connector>, url: &str, policy: ReconnectPolicy) -> Self {
        ReconnectingSocket {
            shared: Arc::new(Shared {
                url: url.to_string(),
                connector,
                policy,
                inner: Mutex::new(SocketInner {
                    state: SocketState::Idle,
                    attempt: 0,
                    epoch: 0,
                    explicitly_closed: false,
                    waiters: Vec::new(),
                    outbound: None,
                    driver: None,
                    reconnect_timer: None,
                }),
                listeners: Arc::new(ListenerRegistry::default()),
            }),
        }
    }

    /// Creates an idle socket from a transport config.
    pub fn from_config(connector: Arc<dyn Connector>, config: &TransportConfig) -> Self {
        Self::new(connector, &config.relay_url, config.reconnect)
    }

    /// Relay URL this socket connects to.
    pub fn url(&self) -> &str {
        &self.shared.url
    }

    /// Current connection state.
    pub fn state(&self) -> SocketState {
        self.shared.inner.lock().state
    }

    /// Returns true if connected and ready.
    pub fn is_open(&self) -> bool {
        self.state() == SocketState::Open
    }

    /// Reconnect attempts scheduled since the last successful open.
    pub fn reconnect_attempt(&self) -> u32 {
        self.shared.inner.lock().attempt
    }

    /// Starts connecting. No-op while `Open` or `Connecting`; otherwise any
    /// pending reconnect timer is superseded by this attempt.
    pub fn connect(&self) {
        Shared::connect(&self.shared);
    }

    /// Connects (if needed) and waits until the socket is open.
    ///
    /// Failed attempts before the first open do not fail the wait: the
    /// reconnect cycle keeps running and any later open satisfies it. After
    /// an explicit `close()` the wait can only end in `OpenTimeout`.
    pub async fn connect_and_wait_open(&self, timeout: Duration) -> TransportResult<()> {
        let opened = {
            let mut inner = self.shared.inner.lock();
            if inner.state == SocketState::Open {
                return Ok(());
            }
            let (tx, rx) = oneshot::channel();
            inner.waiters.retain(|waiter| !waiter.is_closed());
            inner.waiters.push(tx);
            rx
        };
        self.connect();

        let wait = async {
            if opened.await.is_err() {
                // Waiter discarded by close(): never resolves on its own.
                future::pending::<()>().await;
            }
        };
        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| NetworkError::OpenTimeout(timeout))
    }

    /// Closes the socket and stops reconnecting.
    ///
    /// Pending open waiters are dropped without being resolved.
    pub fn close(&self) {
        let mut inner = self.shared.inner.lock();
        inner.explicitly_closed = true;
        inner.epoch += 1;
        inner.state = SocketState::Closed;
        inner.waiters.clear();
        if let Some(timer) = inner.reconnect_timer.take() {
            timer.abort();
        }
        let driver = inner.driver.take();
        match inner.outbound.take() {
            Some(outbound) => {
                // Driver closes the link gracefully and exits.
                let _ = outbound.send(Outbound::Close);
            }
            None => {
                if let Some(driver) = driver {
                    driver.abort();
                }
            }
        }
        info!(url = %self.shared.url, "relay socket closed by owner");
    }

    /// Registers a raw-frame listener for frames matching `filter`.
    pub fn add_frame_listener<F>(&self, filter: FrameFilter, callback: F) -> ListenerHandle
    where
        F: Fn(&[u8]) + Send + Sync + 'static,
    {
        let callback: FrameCallback = Arc::new(callback);
        self.shared.listeners.add(filter, callback)
    }

    /// Queues frames matching `filter` on a channel.
    pub fn subscribe(&self, filter: FrameFilter) -> FrameSubscription {
        FrameSubscription::new(&self.shared.listeners, filter)
    }

    /// Number of registered frame listeners.
    pub fn listener_count(&self) -> usize {
        self.shared.listeners.len()
    }

    /// Sends `PUT mailbox ‖ blob`.
    pub fn send_put(&self, mailbox: &MailboxAddress, blob: &[u8]) -> TransportResult<()> {
        let mut payload = Vec::with_capacity(mailbox.as_ref().len() + blob.len());
        payload.extend_from_slice(mailbox.as_ref());
        payload.extend_from_slice(blob);
        self.send_frame(Opcode::Put, &payload)
    }

    /// Sends `FETCH mailbox`.
    pub fn send_fetch(&self, mailbox: &MailboxAddress) -> TransportResult<()> {
        self.send_frame(Opcode::Fetch, mailbox.as_ref())
    }

    /// Sends `DELETE mailbox ‖ repeated(len:4LE, id)`.
    pub fn send_delete<I>(&self, mailbox: &MailboxAddress, ids: &[I]) -> TransportResult<()>
    where
        I: AsRef<[u8]>,
    {
        let mut payload = mailbox.as_ref().to_vec();
        for id in ids {
            let id = id.as_ref();
            let len = u32::try_from(id.len())
                .map_err(|_| envelope::FrameError::PayloadTooLarge(id.len()))?;
            payload.extend_from_slice(&len.to_le_bytes());
            payload.extend_from_slice(id);
        }
        self.send_frame(Opcode::Delete, &payload)
    }

    fn send_frame(&self, opcode: Opcode, payload: &[u8]) -> TransportResult<()> {
        let inner = self.shared.inner.lock();
        if inner.state != SocketState::Open {
            return Err(NetworkError::NotConnected);
        }
        let outbound = inner.outbound.as_ref().ok_or(NetworkError::NotConnected)?;
        let frame = envelope::encode(opcode, payload)?;
        outbound
            .send(Outbound::Frame(frame))
            .map_err(|_| NetworkError::NotConnected)
    }
}

impl std::fmt::Debug for ReconnectingSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.shared.inner.lock();
        f.debug_struct("ReconnectingSocket")
            .field("url", &self.shared.url)
            .field("state", &inner.state)
            .field("attempt", &inner.attempt)
            .finish_non_exhaustive()
    }
}

impl Shared {
    fn connect(this: &Arc<Self>) {
        let mut inner = this.inner.lock();
        if matches!(inner.state, SocketState::Open | SocketState::Connecting) {
            return;
        }
        inner.explicitly_closed = false;
        if let Some(timer) = inner.reconnect_timer.take() {
            timer.abort();
        }
        Shared::start_attempt(this, &mut inner);
    }

    /// Reconnect timer fired. The closed check and the move to `Connecting`
    /// happen under one lock so a concurrent `close()` always wins.
    fn reconnect_due(this: &Arc<Self>) {
        let mut inner = this.inner.lock();
        inner.reconnect_timer = None;
        if inner.explicitly_closed
            || matches!(inner.state, SocketState::Open | SocketState::Connecting)
        {
            return;
        }
        Shared::start_attempt(this, &mut inner);
    }

    fn start_attempt(this: &Arc<Self>, inner: &mut SocketInner) {
        inner.state = SocketState::Connecting;
        inner.epoch += 1;
        let epoch = inner.epoch;

        debug!(url = %this.url, epoch, "connecting to relay");
        inner.driver = Some(tokio::spawn(drive(
            Arc::downgrade(this),
            this.connector.clone(),
            this.url.clone(),
            epoch,
        )));
    }

    /// Transport is up: mark open, reset backoff and release open waiters.
    /// Returns the outbound queue, or `None` if this attempt is stale.
    fn on_open(&self, epoch: u64) -> Option<mpsc::UnboundedReceiver<Outbound>> {
        let mut inner = self.inner.lock();
        if inner.epoch != epoch {
            return None;
        }
        let (tx, rx) = mpsc::unbounded_channel();
        inner.state = SocketState::Open;
        inner.attempt = 0;
        inner.outbound = Some(tx);
        for waiter in inner.waiters.drain(..) {
            let _ = waiter.send(());
        }
        info!(url = %self.url, "relay socket open");
        Some(rx)
    }

    /// Transport is gone: mark closed and schedule a reconnect unless the
    /// owner closed the socket.
    fn on_close(this: &Arc<Self>, epoch: u64) {
        let mut inner = this.inner.lock();
        if inner.epoch != epoch {
            return;
        }
        inner.state = SocketState::Closed;
        inner.outbound = None;
        inner.driver = None;
        if inner.explicitly_closed || inner.reconnect_timer.is_some() {
            return;
        }

        let delay = this.policy.delay_for_attempt(inner.attempt);
        inner.attempt += 1;
        info!(url = %this.url, attempt = inner.attempt, ?delay, "relay socket lost, reconnecting");

        let weak = Arc::downgrade(this);
        inner.reconnect_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(shared) = weak.upgrade() {
                Shared::reconnect_due(&shared);
            }
        }));
    }
}

/// Runs one connection attempt from connect to close.
async fn drive(shared: Weak<Shared>, connector: Arc<dyn Connector>, url: String, epoch: u64) {
    let link = match connector.connect(&url).await {
        Ok(link) => link,
        Err(e) => {
            warn!(url = %url, error = %e, "relay connection failed");
            if let Some(shared) = shared.upgrade() {
                Shared::on_close(&shared, epoch);
            }
            return;
        }
    };

    let Some(mut outbound) = shared.upgrade().and_then(|shared| shared.on_open(epoch)) else {
        return;
    };

    let mut sink = link.sink;
    let mut stream = link.stream;

    loop {
        tokio::select! {
            command = outbound.recv() => match command {
                Some(Outbound::Frame(frame)) => {
                    if let Err(e) = sink.send(LinkMessage::Binary(frame)).await {
                        warn!(url = %url, error = %e, "relay send failed");
                        break;
                    }
                }
                Some(Outbound::Close) | None => {
                    close_sink(&mut sink, &url).await;
                    return;
                }
            },
            incoming = stream.next() => match incoming {
                Some(Ok(LinkMessage::Binary(frame))) => {
                    let Some(shared) = shared.upgrade() else {
                        return;
                    };
                    shared.listeners.dispatch(&frame);
                }
                Some(Ok(LinkMessage::Text(_))) => {
                    debug!(url = %url, "ignoring text frame on binary socket");
                }
                Some(Err(e)) => {
                    warn!(url = %url, error = %e, "relay connection error");
                    break;
                }
                None => {
                    debug!(url = %url, "relay closed the connection");
                    break;
                }
            },
        }
    }

    // Report the loss before the close handshake, which may never finish
    // on a half-dead link.
    if let Some(shared) = shared.upgrade() {
        Shared::on_close(&shared, epoch);
    }
    close_sink(&mut sink, &url).await;
}

async fn close_sink(sink: &mut LinkSink, url: &str) {
    match tokio::time::timeout(SINK_CLOSE_TIMEOUT, sink.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(url = %url, error = %e, "relay link close failed"),
        Err(_) => debug!(url = %url, "relay link close timed out"),
    }
}

// INLINE_TEST_REQUIRED: Tests epoch bookkeeping on private state
#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::mock::MockConnector;

    #[tokio::test(start_paused = true)]
    async fn test_stale_attempt_is_ignored_after_close() {
        let (connector, _server) = MockConnector::new();
        let socket = ReconnectingSocket::new(
            Arc::new(connector),
            "ws://relay.test",
            ReconnectPolicy::default(),
        );

        socket.connect();
        let epoch = socket.shared.inner.lock().epoch;
        socket.close();

        assert!(socket.shared.on_open(epoch).is_none());
        Shared::on_close(&socket.shared, epoch);
        let inner = socket.shared.inner.lock();
        assert_eq!(inner.state, SocketState::Closed);
        assert!(inner.reconnect_timer.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_one_reconnect_timer_pending() {
        let (connector, _server) = MockConnector::new();
        let socket = ReconnectingSocket::new(
            Arc::new(connector),
            "ws://relay.test",
            ReconnectPolicy::default(),
        );

        let epoch = {
            let mut inner = socket.shared.inner.lock();
            inner.state = SocketState::Connecting;
            inner.epoch += 1;
            inner.epoch
        };
        Shared::on_close(&socket.shared, epoch);
        Shared::on_close(&socket.shared, epoch);

        let inner = socket.shared.inner.lock();
        assert_eq!(inner.attempt, 1);
        assert!(inner.reconnect_timer.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_due_reconnect_respects_close() {
        let (connector, _server) = MockConnector::new();
        let connector = Arc::new(connector);
        let socket = ReconnectingSocket::new(
            connector.clone(),
            "ws://relay.test",
            ReconnectPolicy::default(),
        );

        // Timer already fired and detached itself when close() lands.
        socket.close();
        Shared::reconnect_due(&socket.shared);
        tokio::task::yield_now().await;

        let inner = socket.shared.inner.lock();
        assert_eq!(inner.state, SocketState::Closed);
        assert!(inner.explicitly_closed);
        assert!(inner.driver.is_none());
        assert_eq!(connector.attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_due_reconnect_starts_attempt_after_loss() {
        let (connector, _server) = MockConnector::new();
        let socket = ReconnectingSocket::new(
            Arc::new(connector),
            "ws://relay.test",
            ReconnectPolicy::default(),
        );
        socket.shared.inner.lock().state = SocketState::Closed;

        Shared::reconnect_due(&socket.shared);

        let inner = socket.shared.inner.lock();
        assert_eq!(inner.state, SocketState::Connecting);
        assert!(inner.driver.is_some());
        assert!(inner.reconnect_timer.is_none());
    }
}
