// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Store-and-Forward Delivery
//!
//! Moves ciphertext for one connection through the relay:
//!
//! - send: one PUT of the blob to the connection's current mailbox
//! - fetch: FETCH on the current (and previous, during rollover) mailbox,
//!   collecting every FETCH response that arrives inside a fixed time box
//!
//! Mailbox addresses are requested from the crypto engine on every call and
//! dropped (zeroized) when the call returns. Delivery is at-least-once; the
//! relay may hand out the same blob again on a later fetch.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;
use zeroize::Zeroizing;

use crate::crypto::{CryptoEngine, CryptoError};
use crate::network::envelope::{self, Opcode};
use crate::network::mailbox::{self, ActiveMailboxes, ConnectionId, MailboxAddress, MailboxError};
use crate::network::{FrameFilter, NetworkError, ReconnectingSocket};

/// Default fetch time box.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_millis(1_500);

/// Delivery error types.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Mailbox error: {0}")]
    Mailbox(#[from] MailboxError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

/// Options for [`fetch_ciphertext_blobs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    /// How long to collect responses. The call always waits this long.
    pub timeout: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        FetchOptions {
            timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

impl FetchOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        FetchOptions { timeout }
    }
}

fn active_mailboxes(
    crypto: &dyn CryptoEngine,
    connection: &ConnectionId,
) -> Result<ActiveMailboxes, DeliveryError> {
    let buffer = Zeroizing::new(crypto.active_mailbox_ids(connection)?);
    Ok(mailbox::split_active(&buffer)?)
}

/// Sends FETCH for each mailbox and collects the responses for `timeout`.
///
/// Returns non-empty FETCH payloads in arrival order. Frames with another
/// opcode or a broken header are skipped. An empty result means nothing
/// arrived within the time box, not that the mailboxes are empty.
pub async fn fetch_mailbox_blobs(
    socket: &ReconnectingSocket,
    mailboxes: &[&MailboxAddress],
    timeout: Duration,
) -> Result<Vec<Vec<u8>>, NetworkError> {
    let collected: Arc<Mutex<Vec<Vec<u8>>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = collected.clone();
    let listener = socket.add_frame_listener(FrameFilter::Opcode(Opcode::Fetch), move |frame| {
        match envelope::decode(frame) {
            Ok(envelope) if !envelope.payload.is_empty() => sink.lock().push(envelope.payload),
            Ok(_) => {}
            Err(e) => debug!(error = %e, "skipping malformed fetch response"),
        }
    });

    for mailbox in mailboxes {
        socket.send_fetch(mailbox)?;
    }

    tokio::time::sleep(timeout).await;
    listener.unsubscribe();

    let blobs = std::mem::take(&mut *collected.lock());
    debug!(count = blobs.len(), "fetch window closed");
    Ok(blobs)
}

/// Fetches every blob the relay holds for the connection, polling the
/// previous mailbox too while a rollover is in progress.
pub async fn fetch_ciphertext_blobs(
    socket: &ReconnectingSocket,
    crypto: &dyn CryptoEngine,
    connection: &ConnectionId,
    options: FetchOptions,
) -> Result<Vec<Vec<u8>>, DeliveryError> {
    let mailboxes = active_mailboxes(crypto, connection)?;
    let targets: Vec<&MailboxAddress> = mailboxes.iter().collect();
    Ok(fetch_mailbox_blobs(socket, &targets, options.timeout).await?)
}

/// Sends one ciphertext blob to the connection's current mailbox.
///
/// Fire-and-forget: the relay does not acknowledge live messages.
pub fn send_ciphertext_blob(
    socket: &ReconnectingSocket,
    crypto: &dyn CryptoEngine,
    connection: &ConnectionId,
    blob: &[u8],
) -> Result<(), DeliveryError> {
    let mailboxes = active_mailboxes(crypto, connection)?;
    socket.send_put(&mailboxes.current, blob)?;
    Ok(())
}

/// Asks the relay to drop blobs from the connection's current mailbox.
pub fn delete_ciphertext_blobs<I>(
    socket: &ReconnectingSocket,
    crypto: &dyn CryptoEngine,
    connection: &ConnectionId,
    ids: &[I],
) -> Result<(), DeliveryError>
where
    I: AsRef<[u8]>,
{
    let mailboxes = active_mailboxes(crypto, connection)?;
    socket.send_delete(&mailboxes.current, ids)?;
    Ok(())
}

/// Encrypts `plaintext` for the connection and sends it.
pub fn send_message(
    socket: &ReconnectingSocket,
    crypto: &dyn CryptoEngine,
    connection: &ConnectionId,
    plaintext: &[u8],
) -> Result<(), DeliveryError> {
    let ciphertext = crypto.encrypt_message(connection, plaintext)?;
    send_ciphertext_blob(socket, crypto, connection, &ciphertext)
}

/// Fetches and decrypts pending messages.
///
/// Blobs the engine cannot decrypt (redeliveries of already consumed
/// messages, foreign traffic) are skipped.
pub async fn fetch_messages(
    socket: &ReconnectingSocket,
    crypto: &dyn CryptoEngine,
    connection: &ConnectionId,
    options: FetchOptions,
) -> Result<Vec<Vec<u8>>, DeliveryError> {
    let blobs = fetch_ciphertext_blobs(socket, crypto, connection, options).await?;
    let mut messages = Vec::with_capacity(blobs.len());
    for blob in blobs {
        match crypto.decrypt_message(connection, &blob) {
            Ok(plaintext) => messages.push(plaintext),
            Err(e) => debug!(error = %e, "skipping undecryptable blob"),
        }
    }
    Ok(messages)
}
