// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Invite Signaling Channel
//!
//! Ephemeral JSON control channel on `{base}/invite/{room}` used to tell an
//! inviter that their invite was accepted. It carries newline-delimited JSON
//! text frames and never touches the binary envelope protocol.
//!
//! ```text
//! {"type":"invite_accepted","by":"<participant>"}
//! ```
//!
//! Unknown message types and malformed lines are ignored so older clients
//! keep working when the relay adds new signals.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crate::network::{Connector, LinkMessage, LinkStream, NetworkError};

/// Invite channel error types.
#[derive(Error, Debug)]
pub enum InviteError {
    #[error("Invalid invite URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid participant limit: {0}")]
    InvalidLimit(f64),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invite channel closed")]
    Closed,
}

/// Where and how to join an invite room.
#[derive(Debug, Clone, PartialEq)]
pub struct InviteChannelOptions {
    /// Relay base URL (`ws://` or `wss://`).
    pub base_url: String,
    /// Invite room identifier.
    pub room: String,
    /// Maximum participants; fractional values are truncated.
    pub limit: Option<f64>,
    /// Whether this participant created the invite.
    pub creator: bool,
}

impl InviteChannelOptions {
    pub fn new(base_url: &str, room: &str) -> Self {
        InviteChannelOptions {
            base_url: base_url.to_string(),
            room: room.to_string(),
            limit: None,
            creator: false,
        }
    }

    pub fn with_limit(mut self, limit: f64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn as_creator(mut self) -> Self {
        self.creator = true;
        self
    }

    /// Builds `{base}/invite/{room}?limit=N&creator=1`.
    pub fn url(&self) -> Result<Url, InviteError> {
        let mut url =
            Url::parse(&self.base_url).map_err(|e| InviteError::InvalidUrl(e.to_string()))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(InviteError::InvalidUrl(format!(
                "unsupported scheme: {}",
                url.scheme()
            )));
        }

        url.path_segments_mut()
            .map_err(|_| InviteError::InvalidUrl("base URL cannot have a path".into()))?
            .pop_if_empty()
            .extend(["invite", self.room.as_str()]);

        let limit = match self.limit {
            Some(limit) if !limit.is_finite() || limit < 0.0 => {
                return Err(InviteError::InvalidLimit(limit))
            }
            Some(limit) => Some(limit.trunc() as u64),
            None => None,
        };

        {
            let mut query = url.query_pairs_mut();
            query.clear();
            if let Some(limit) = limit {
                query.append_pair("limit", &limit.to_string());
            }
            if self.creator {
                query.append_pair("creator", "1");
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }
        Ok(url)
    }
}

/// Messages exchanged on the invite channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InviteSignal {
    InviteAccepted { by: String },
}

impl InviteSignal {
    /// Parses one line. Returns `None` for blank lines, unknown types and
    /// malformed JSON.
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        match serde_json::from_str(line) {
            Ok(signal) => Some(signal),
            Err(e) => {
                debug!(error = %e, "ignoring invite channel line");
                None
            }
        }
    }
}

type AcceptedHook = Box<dyn Fn(&str) + Send + Sync>;
type CloseHook = Box<dyn Fn() + Send + Sync>;
type ErrorHook = Box<dyn Fn(&NetworkError) + Send + Sync>;

/// Observers for an invite channel.
#[derive(Default)]
pub struct InviteHooks {
    on_invite_accepted: Option<AcceptedHook>,
    on_close: Option<CloseHook>,
    on_error: Option<ErrorHook>,
}

impl InviteHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with the `by` field of every `invite_accepted` signal.
    pub fn on_invite_accepted(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_invite_accepted = Some(Box::new(hook));
        self
    }

    /// Called once when the channel ends, whatever the reason.
    pub fn on_close(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_close = Some(Box::new(hook));
        self
    }

    /// Called when the transport reports an error.
    pub fn on_error(mut self, hook: impl Fn(&NetworkError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(hook));
        self
    }
}

impl std::fmt::Debug for InviteHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InviteHooks")
            .field("on_invite_accepted", &self.on_invite_accepted.is_some())
            .field("on_close", &self.on_close.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

enum Command {
    Send(String),
    Close,
}

/// Open invite channel.
///
/// Single connection, no reconnect: the room is ephemeral and a lost
/// channel is reported through `on_close`.
#[derive(Debug)]
pub struct InviteChannel {
    url: Url,
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl InviteChannel {
    /// Connects to the invite room and starts delivering signals to `hooks`.
    pub async fn open(
        connector: Arc<dyn Connector>,
        options: &InviteChannelOptions,
        hooks: InviteHooks,
    ) -> Result<Self, InviteError> {
        let url = options.url()?;
        let link = connector.connect(url.as_str()).await?;
        info!(room = %options.room, "invite channel open");

        let (commands, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_channel(link.sink, link.stream, rx, hooks));
        Ok(InviteChannel {
            url,
            commands,
            task,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// True until the channel has ended.
    pub fn is_open(&self) -> bool {
        !self.task.is_finished()
    }

    /// Announces that `by` accepted the invite.
    pub fn notify_accepted(&self, by: &str) -> Result<(), InviteError> {
        let line = serde_json::to_string(&InviteSignal::InviteAccepted { by: by.to_string() })?;
        self.commands
            .send(Command::Send(line))
            .map_err(|_| InviteError::Closed)
    }

    /// Closes the channel. `on_close` fires once the link is shut down.
    pub fn close(&self) {
        let _ = self.commands.send(Command::Close);
    }

    /// Waits until the channel has ended.
    pub async fn closed(self) {
        let _ = self.task.await;
    }
}

async fn run_channel(
    mut sink: crate::network::LinkSink,
    mut stream: LinkStream,
    mut commands: mpsc::UnboundedReceiver<Command>,
    hooks: InviteHooks,
) {
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Send(line)) => {
                    if let Err(e) = sink.send(LinkMessage::Text(line)).await {
                        warn!(error = %e, "invite channel send failed");
                        if let Some(hook) = &hooks.on_error {
                            hook(&e);
                        }
                        break;
                    }
                }
                Some(Command::Close) | None => break,
            },
            incoming = stream.next() => match incoming {
                Some(Ok(LinkMessage::Text(text))) => {
                    for signal in text.lines().filter_map(InviteSignal::parse_line) {
                        let InviteSignal::InviteAccepted { by } = signal;
                        if let Some(hook) = &hooks.on_invite_accepted {
                            hook(&by);
                        }
                    }
                }
                Some(Ok(LinkMessage::Binary(_))) => {
                    debug!("ignoring binary frame on invite channel");
                }
                Some(Err(e)) => {
                    warn!(error = %e, "invite channel error");
                    if let Some(hook) = &hooks.on_error {
                        hook(&e);
                    }
                    break;
                }
                None => break,
            },
        }
    }

    let _ = sink.close().await;
    info!("invite channel closed");
    if let Some(hook) = &hooks.on_close {
        hook();
    }
}
