// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Relay Cloud Backup
//!
//! Stores an encrypted account backup on the relay under a mailbox derived
//! from the recovery key, so a fresh install holding only the key can find
//! it again.
//!
//! Mailbox derivation:
//!
//! ```text
//! mailbox = SHA-256("tidepost/relay-backup/v1" || recovery_key)
//! ```
//!
//! Every upload appends a new JSON envelope to that mailbox; downloads pick
//! the envelope with the greatest `uploadedAtMs`. Each operation opens its
//! own short-lived socket and closes it before returning.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use ring::digest;
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info};

use crate::crypto::{CryptoEngine, CryptoError, RecoveryKey, RECOVERY_KEY_LEN};
use crate::delivery;
use crate::network::mailbox::{MailboxAddress, MAILBOX_ADDRESS_LEN};
use crate::network::{
    Connector, FrameFilter, NetworkError, ReconnectPolicy, ReconnectingSocket,
};

/// Domain separation tag for backup mailbox derivation.
pub const BACKUP_DOMAIN_TAG: &[u8] = b"tidepost/relay-backup/v1";

/// Only envelope version understood by this client.
pub const BACKUP_ENVELOPE_VERSION: u32 = 1;

/// Largest serialized envelope accepted for upload (60 KiB).
pub const MAX_BACKUP_ENVELOPE_SIZE: usize = 60 * 1024;

/// URL-safe base64; padding is omitted on encode and optional on decode.
const B64U: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Backup error types.
#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Recovery key must be {expected} bytes, got {0}", expected = RECOVERY_KEY_LEN)]
    InvalidKeyLength(usize),

    #[error("Backup envelope too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Relay did not acknowledge the upload within {0:?}")]
    AckTimeout(Duration),

    #[error("No backup found for this recovery key")]
    BackupNotFound,

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Timeouts and limits for backup operations.
#[derive(Debug, Clone)]
pub struct BackupConfig {
    /// Deadline for the backup socket to open.
    pub open_timeout: Duration,
    /// How long to wait for the relay to acknowledge an upload.
    pub ack_timeout: Duration,
    /// Fetch time box for downloads.
    pub download_timeout: Duration,
    /// Upper bound on the serialized envelope.
    pub max_envelope_size: usize,
    /// Backoff used while the backup socket is trying to open.
    pub reconnect: ReconnectPolicy,
}

impl Default for BackupConfig {
    fn default() -> Self {
        BackupConfig {
            open_timeout: Duration::from_secs(10),
            ack_timeout: Duration::from_secs(5),
            download_timeout: Duration::from_millis(2_000),
            max_envelope_size: MAX_BACKUP_ENVELOPE_SIZE,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

/// Versioned JSON envelope stored in the backup mailbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayBackupEnvelope {
    pub v: u32,
    pub backup_blob_b64u: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Map<String, Value>>,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub uploaded_at_ms: u64,
}

/// Accepts any non-negative JSON number; fractional values are truncated.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let number = serde_json::Number::deserialize(deserializer)?;
    if let Some(ms) = number.as_u64() {
        return Ok(ms);
    }
    match number.as_f64() {
        Some(ms) if ms.is_finite() && ms >= 0.0 && ms <= u64::MAX as f64 => Ok(ms.trunc() as u64),
        _ => Err(de::Error::custom(format!("invalid uploadedAtMs: {number}"))),
    }
}

impl RelayBackupEnvelope {
    pub fn new(backup_blob: &[u8], meta: Option<Map<String, Value>>, uploaded_at_ms: u64) -> Self {
        RelayBackupEnvelope {
            v: BACKUP_ENVELOPE_VERSION,
            backup_blob_b64u: B64U.encode(backup_blob),
            meta,
            uploaded_at_ms,
        }
    }

    /// Parses a FETCH payload. Returns `None` for anything that is not a
    /// well-formed v1 envelope with a decodable blob.
    pub fn parse(payload: &[u8]) -> Option<(Self, Vec<u8>)> {
        let envelope: RelayBackupEnvelope = serde_json::from_slice(payload).ok()?;
        if envelope.v != BACKUP_ENVELOPE_VERSION {
            return None;
        }
        let blob = B64U.decode(&envelope.backup_blob_b64u).ok()?;
        Some((envelope, blob))
    }
}

/// Result of a successful download.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadedBackup {
    pub backup_blob: Vec<u8>,
    pub meta: Option<Map<String, Value>>,
    pub uploaded_at_ms: u64,
}

/// Derives the backup mailbox for a recovery key.
pub fn derive_backup_mailbox(recovery_key: &[u8]) -> Result<MailboxAddress, BackupError> {
    if recovery_key.len() != RECOVERY_KEY_LEN {
        return Err(BackupError::InvalidKeyLength(recovery_key.len()));
    }

    let mut context = digest::Context::new(&digest::SHA256);
    context.update(BACKUP_DOMAIN_TAG);
    context.update(recovery_key);
    let digest = context.finish();

    let mut address = [0u8; MAILBOX_ADDRESS_LEN];
    address.copy_from_slice(digest.as_ref());
    Ok(MailboxAddress::from_bytes(address))
}

/// Picks the envelope with the greatest `uploadedAtMs` among parsable
/// payloads. On a tie the later payload wins.
pub fn select_latest<I>(payloads: I) -> Option<DownloadedBackup>
where
    I: IntoIterator,
    I::Item: AsRef<[u8]>,
{
    let mut latest: Option<DownloadedBackup> = None;
    for payload in payloads {
        let Some((envelope, backup_blob)) = RelayBackupEnvelope::parse(payload.as_ref()) else {
            debug!("discarding unparsable backup envelope");
            continue;
        };
        if latest
            .as_ref()
            .map_or(true, |current| envelope.uploaded_at_ms >= current.uploaded_at_ms)
        {
            latest = Some(DownloadedBackup {
                backup_blob,
                meta: envelope.meta,
                uploaded_at_ms: envelope.uploaded_at_ms,
            });
        }
    }
    latest
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Backup client bound to one relay.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use tidepost_core::backup::{BackupConfig, RelayBackup};
/// use tidepost_core::network::WebSocketConnector;
///
/// let backup = RelayBackup::new(
///     Arc::new(WebSocketConnector::default()),
///     "wss://relay.example.com",
///     BackupConfig::default(),
/// );
/// backup.upload(&recovery_key, &blob, None).await?;
/// let restored = backup.download(&recovery_key).await?;
/// ```
#[derive(Clone)]
pub struct RelayBackup {
    connector: Arc<dyn Connector>,
    relay_url: String,
    config: BackupConfig,
}

impl RelayBackup {
    pub fn new(connector: Arc<dyn Connector>, relay_url: &str, config: BackupConfig) -> Self {
        RelayBackup {
            connector,
            relay_url: relay_url.to_string(),
            config,
        }
    }

    pub fn config(&self) -> &BackupConfig {
        &self.config
    }

    fn open_socket(&self) -> ReconnectingSocket {
        ReconnectingSocket::new(self.connector.clone(), &self.relay_url, self.config.reconnect)
    }

    /// Uploads `backup_blob` and waits for the relay's acknowledgement.
    ///
    /// Returns the `uploadedAtMs` stamped on the envelope.
    pub async fn upload(
        &self,
        recovery_key: &[u8],
        backup_blob: &[u8],
        meta: Option<Map<String, Value>>,
    ) -> Result<u64, BackupError> {
        let mailbox = derive_backup_mailbox(recovery_key)?;
        let envelope = RelayBackupEnvelope::new(backup_blob, meta, now_ms());
        let payload = serde_json::to_vec(&envelope)?;
        if payload.len() > self.config.max_envelope_size {
            return Err(BackupError::PayloadTooLarge {
                size: payload.len(),
                max: self.config.max_envelope_size,
            });
        }

        let socket = self.open_socket();
        let result = self.put_and_wait_ack(&socket, &mailbox, &payload).await;
        socket.close();

        result?;
        info!(size = payload.len(), "backup uploaded");
        Ok(envelope.uploaded_at_ms)
    }

    async fn put_and_wait_ack(
        &self,
        socket: &ReconnectingSocket,
        mailbox: &MailboxAddress,
        payload: &[u8],
    ) -> Result<(), BackupError> {
        socket.connect_and_wait_open(self.config.open_timeout).await?;

        let mut ack = socket.subscribe(FrameFilter::Any);
        socket.send_put(mailbox, payload)?;

        match tokio::time::timeout(self.config.ack_timeout, ack.recv()).await {
            Ok(Some(_)) => Ok(()),
            Ok(None) | Err(_) => Err(BackupError::AckTimeout(self.config.ack_timeout)),
        }
    }

    /// Downloads the most recent backup stored under `recovery_key`.
    pub async fn download(&self, recovery_key: &[u8]) -> Result<DownloadedBackup, BackupError> {
        let mailbox = derive_backup_mailbox(recovery_key)?;

        let socket = self.open_socket();
        let result = self.fetch_envelopes(&socket, &mailbox).await;
        socket.close();

        let payloads = result?;
        debug!(candidates = payloads.len(), "backup envelopes fetched");
        select_latest(payloads).ok_or(BackupError::BackupNotFound)
    }

    async fn fetch_envelopes(
        &self,
        socket: &ReconnectingSocket,
        mailbox: &MailboxAddress,
    ) -> Result<Vec<Vec<u8>>, BackupError> {
        socket.connect_and_wait_open(self.config.open_timeout).await?;
        let payloads =
            delivery::fetch_mailbox_blobs(socket, &[mailbox], self.config.download_timeout).await?;
        Ok(payloads)
    }

    /// Exports the account from the crypto engine and uploads it.
    pub async fn upload_account(
        &self,
        crypto: &dyn CryptoEngine,
        recovery_key: &RecoveryKey,
        meta: Option<Map<String, Value>>,
    ) -> Result<u64, BackupError> {
        let blob = zeroize::Zeroizing::new(crypto.export_backup(recovery_key)?);
        self.upload(recovery_key.as_bytes(), &blob, meta).await
    }

    /// Downloads the latest backup and imports it into the crypto engine.
    pub async fn restore_account(
        &self,
        crypto: &dyn CryptoEngine,
        recovery_key: &RecoveryKey,
    ) -> Result<DownloadedBackup, BackupError> {
        let downloaded = self.download(recovery_key.as_bytes()).await?;
        crypto.import_backup(&downloaded.backup_blob, recovery_key)?;
        Ok(downloaded)
    }
}

impl std::fmt::Debug for RelayBackup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayBackup")
            .field("relay_url", &self.relay_url)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
