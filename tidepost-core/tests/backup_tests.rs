// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Relay Backup Tests
//!
//! Upload and download against the in-memory relay.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::RELAY_URL;
use serde_json::{json, Map, Value};
use tidepost_core::backup::{
    derive_backup_mailbox, BackupConfig, BackupError, RelayBackup, RelayBackupEnvelope,
    MAX_BACKUP_ENVELOPE_SIZE,
};
use tidepost_core::crypto::{MockCryptoEngine, RecoveryKey};
use tidepost_core::network::envelope::{self, Opcode};
use tidepost_core::network::{LinkMessage, MemoryRelay, MockConnector, MockServer, NetworkError};

const KEY: [u8; 32] = [0x2A; 32];

fn backup_client() -> (RelayBackup, MockConnector, MockServer) {
    let (connector, server) = MockConnector::new();
    let backup = RelayBackup::new(
        Arc::new(connector.clone()),
        RELAY_URL,
        BackupConfig::default(),
    );
    (backup, connector, server)
}

fn with_relay() -> (RelayBackup, MockConnector, MemoryRelay) {
    let (backup, connector, server) = backup_client();
    (backup, connector, MemoryRelay::spawn(server))
}

fn stored_envelope(blob: &[u8], uploaded_at_ms: u64) -> Vec<u8> {
    serde_json::to_vec(&RelayBackupEnvelope::new(blob, None, uploaded_at_ms)).unwrap()
}

#[test]
fn test_default_config() {
    let config = BackupConfig::default();
    assert_eq!(config.ack_timeout, Duration::from_secs(5));
    assert_eq!(config.download_timeout, Duration::from_millis(2_000));
    assert_eq!(config.max_envelope_size, 60 * 1024);
}

#[tokio::test(start_paused = true)]
async fn test_roundtrip() {
    let (backup, _connector, _relay) = with_relay();
    let blob: Vec<u8> = (0..=255u8).cycle().take(4_000).collect();

    let uploaded_at = backup.upload(&KEY, &blob, None).await.unwrap();
    let restored = backup.download(&KEY).await.unwrap();

    assert_eq!(restored.backup_blob, blob);
    assert_eq!(restored.uploaded_at_ms, uploaded_at);
    assert!(restored.meta.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_meta_roundtrip() {
    let (backup, _connector, _relay) = with_relay();
    let mut meta = Map::new();
    meta.insert("device".into(), json!("laptop"));
    meta.insert("contacts".into(), json!(12));

    backup.upload(&KEY, b"blob", Some(meta.clone())).await.unwrap();
    let restored = backup.download(&KEY).await.unwrap();
    assert_eq!(restored.meta, Some(meta));
}

#[tokio::test(start_paused = true)]
async fn test_different_key_finds_nothing() {
    let (backup, _connector, _relay) = with_relay();
    backup.upload(&KEY, b"secret", None).await.unwrap();

    let result = backup.download(&[0x2B; 32]).await;
    assert!(matches!(result, Err(BackupError::BackupNotFound)));
}

#[tokio::test(start_paused = true)]
async fn test_latest_upload_wins() {
    let (backup, _connector, relay) = with_relay();
    let mailbox = derive_backup_mailbox(&KEY).unwrap();
    relay.insert(mailbox.as_bytes(), stored_envelope(b"newer", 200));
    relay.insert(mailbox.as_bytes(), stored_envelope(b"older", 100));

    let restored = backup.download(&KEY).await.unwrap();
    assert_eq!(restored.backup_blob, b"newer");
    assert_eq!(restored.uploaded_at_ms, 200);
}

#[tokio::test(start_paused = true)]
async fn test_unparsable_envelopes_are_discarded() {
    let (backup, _connector, relay) = with_relay();
    let mailbox = derive_backup_mailbox(&KEY).unwrap();
    relay.insert(mailbox.as_bytes(), b"not json".to_vec());
    relay.insert(
        mailbox.as_bytes(),
        br#"{"v":2,"backupBlobB64u":"AAAA","uploadedAtMs":999}"#.to_vec(),
    );
    relay.insert(
        mailbox.as_bytes(),
        br#"{"v":1,"backupBlobB64u":"***","uploadedAtMs":999}"#.to_vec(),
    );
    relay.insert(mailbox.as_bytes(), stored_envelope(b"good", 1));

    let restored = backup.download(&KEY).await.unwrap();
    assert_eq!(restored.backup_blob, b"good");
}

#[tokio::test(start_paused = true)]
async fn test_only_unparsable_envelopes_is_not_found() {
    let (backup, _connector, relay) = with_relay();
    let mailbox = derive_backup_mailbox(&KEY).unwrap();
    relay.insert(mailbox.as_bytes(), br#"{"v":1,"uploadedAtMs":5}"#.to_vec());

    assert!(matches!(
        backup.download(&KEY).await,
        Err(BackupError::BackupNotFound)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_invalid_key_length_fails_before_connecting() {
    let (backup, connector, _relay) = with_relay();

    assert!(matches!(
        backup.upload(&[1u8; 31], b"blob", None).await,
        Err(BackupError::InvalidKeyLength(31))
    ));
    assert!(matches!(
        backup.download(&[1u8; 33]).await,
        Err(BackupError::InvalidKeyLength(33))
    ));
    assert_eq!(connector.attempts(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_payload_too_large_fails_before_connecting() {
    let (backup, connector, _relay) = with_relay();
    let blob = vec![0u8; MAX_BACKUP_ENVELOPE_SIZE];

    let result = backup.upload(&KEY, &blob, None).await;
    assert!(matches!(
        result,
        Err(BackupError::PayloadTooLarge { max, .. }) if max == MAX_BACKUP_ENVELOPE_SIZE
    ));
    assert_eq!(connector.attempts(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_ack_timeout() {
    let (backup, _connector, relay) = with_relay();
    relay.set_silent(true);

    let start = tokio::time::Instant::now();
    let result = backup.upload(&KEY, b"blob", None).await;

    assert!(matches!(result, Err(BackupError::AckTimeout(t)) if t == Duration::from_secs(5)));
    assert!(start.elapsed() >= Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_open_timeout_is_reported() {
    let (backup, connector, _relay) = with_relay();
    for _ in 0..20 {
        connector.fail_next(NetworkError::ConnectionFailed("refused".into()));
    }

    let result = backup.download(&KEY).await;
    assert!(matches!(
        result,
        Err(BackupError::Network(NetworkError::OpenTimeout(_)))
    ));

    // The socket was closed: no reconnects after the operation returned
    let attempts = connector.attempts();
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(connector.attempts(), attempts);
}

#[tokio::test(start_paused = true)]
async fn test_upload_wire_format_and_socket_closed() {
    let (backup, _connector, mut server) = backup_client();

    let relay = tokio::spawn(async move {
        let mut peer = server.accept().await.unwrap();
        let Some(LinkMessage::Binary(frame)) = peer.recv().await else {
            panic!("expected PUT");
        };
        // Any frame counts as the acknowledgement
        peer.send_frame(envelope::encode(Opcode::Fetch, b"ack").unwrap());
        let closed = peer.recv().await.is_none();
        (frame, closed)
    });

    backup.upload(&KEY, &[0xfb, 0xff], None).await.unwrap();
    let (frame, closed) = relay.await.unwrap();
    assert!(closed);

    let put = envelope::decode(&frame).unwrap();
    assert_eq!(put.opcode, Opcode::Put);
    let mailbox = derive_backup_mailbox(&KEY).unwrap();
    assert_eq!(&put.payload[..32], mailbox.as_bytes());

    let json: Value = serde_json::from_slice(&put.payload[32..]).unwrap();
    assert_eq!(json["v"], 1);
    assert_eq!(json["backupBlobB64u"], "-_8");
    assert!(json["uploadedAtMs"].is_u64());
    assert!(json.get("meta").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_account_upload_and_restore() {
    let (backup, _connector, _relay) = with_relay();
    let key = RecoveryKey::from_bytes(KEY);

    let device_a = MockCryptoEngine::default();
    device_a.set_account_state(b"identity+contacts");
    backup.upload_account(&device_a, &key, None).await.unwrap();

    let device_b = MockCryptoEngine::default();
    let restored = backup.restore_account(&device_b, &key).await.unwrap();
    assert_eq!(device_b.imported().unwrap(), b"identity+contacts");
    assert!(!restored.backup_blob.is_empty());
}
