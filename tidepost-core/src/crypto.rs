// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Crypto Engine Boundary
//!
//! The end-to-end engine (identity, ratchets, mailbox derivation) lives
//! outside this crate. Transport code only talks to it through
//! [`CryptoEngine`] and treats everything it returns as opaque bytes.

use parking_lot::Mutex;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::network::mailbox::{ConnectionId, ACTIVE_MAILBOX_LEN, MAILBOX_ADDRESS_LEN};

/// Size of a recovery key in bytes.
pub const RECOVERY_KEY_LEN: usize = 32;

/// Error reported by the crypto engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Unknown connection")]
    UnknownConnection,

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Backup import failed: {0}")]
    ImportFailed(String),
}

/// 32-byte secret from which the backup mailbox is derived.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct RecoveryKey {
    bytes: [u8; RECOVERY_KEY_LEN],
}

impl RecoveryKey {
    pub fn from_bytes(bytes: [u8; RECOVERY_KEY_LEN]) -> Self {
        RecoveryKey { bytes }
    }

    /// Returns `None` unless `bytes` is exactly 32 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let bytes: [u8; RECOVERY_KEY_LEN] = bytes.try_into().ok()?;
        Some(RecoveryKey { bytes })
    }

    pub fn as_bytes(&self) -> &[u8; RECOVERY_KEY_LEN] {
        &self.bytes
    }
}

impl std::fmt::Debug for RecoveryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Don't expose key bytes in debug output
        f.debug_struct("RecoveryKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Operations the transport needs from the end-to-end crypto engine.
pub trait CryptoEngine: Send + Sync {
    /// Returns `current ‖ previous` (64 bytes) for the connection. An
    /// all-zero `previous` half means there is no rollover in progress.
    fn active_mailbox_ids(&self, connection: &ConnectionId) -> Result<Vec<u8>, CryptoError>;

    /// Encrypts a plaintext message for the connection's peer.
    fn encrypt_message(
        &self,
        connection: &ConnectionId,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, CryptoError>;

    /// Decrypts a ciphertext blob received on the connection.
    fn decrypt_message(
        &self,
        connection: &ConnectionId,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, CryptoError>;

    /// Serializes and encrypts the full account state under `key`.
    fn export_backup(&self, key: &RecoveryKey) -> Result<Vec<u8>, CryptoError>;

    /// Restores account state from an exported backup blob.
    fn import_backup(&self, blob: &[u8], key: &RecoveryKey) -> Result<(), CryptoError>;
}

const MOCK_CIPHERTEXT_PREFIX: &[u8] = b"mock:";

#[derive(Debug, Default)]
struct MockCryptoState {
    active: Vec<u8>,
    account: Vec<u8>,
    imported: Option<Vec<u8>>,
}

/// Test double for [`CryptoEngine`].
///
/// Every connection shares one active mailbox buffer. "Encryption" prefixes
/// the plaintext with `mock:`; decryption rejects anything without it.
/// Backups are the account bytes prefixed with the recovery key, so a blob
/// only imports under the key it was exported with.
#[derive(Debug, Default)]
pub struct MockCryptoEngine {
    state: Mutex<MockCryptoState>,
}

impl MockCryptoEngine {
    /// Engine whose active buffer is `current ‖ previous`.
    pub fn with_mailboxes(
        current: [u8; MAILBOX_ADDRESS_LEN],
        previous: Option<[u8; MAILBOX_ADDRESS_LEN]>,
    ) -> Self {
        let mut active = Vec::with_capacity(ACTIVE_MAILBOX_LEN);
        active.extend_from_slice(&current);
        active.extend_from_slice(&previous.unwrap_or([0u8; MAILBOX_ADDRESS_LEN]));
        Self::with_active_buffer(active)
    }

    /// Engine that returns `buffer` verbatim, whatever its length.
    pub fn with_active_buffer(buffer: Vec<u8>) -> Self {
        MockCryptoEngine {
            state: Mutex::new(MockCryptoState {
                active: buffer,
                ..Default::default()
            }),
        }
    }

    /// Sets the account bytes `export_backup` wraps.
    pub fn set_account_state(&self, account: &[u8]) {
        self.state.lock().account = account.to_vec();
    }

    /// Account bytes restored by the last successful `import_backup`.
    pub fn imported(&self) -> Option<Vec<u8>> {
        self.state.lock().imported.clone()
    }

    /// Mock ciphertext for `plaintext`, as the peer's engine would produce it.
    pub fn seal(plaintext: &[u8]) -> Vec<u8> {
        [MOCK_CIPHERTEXT_PREFIX, plaintext].concat()
    }
}

impl CryptoEngine for MockCryptoEngine {
    fn active_mailbox_ids(&self, _connection: &ConnectionId) -> Result<Vec<u8>, CryptoError> {
        let state = self.state.lock();
        if state.active.is_empty() {
            return Err(CryptoError::UnknownConnection);
        }
        Ok(state.active.clone())
    }

    fn encrypt_message(
        &self,
        _connection: &ConnectionId,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        Ok(Self::seal(plaintext))
    }

    fn decrypt_message(
        &self,
        _connection: &ConnectionId,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        ciphertext
            .strip_prefix(MOCK_CIPHERTEXT_PREFIX)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| CryptoError::DecryptionFailed("not a mock ciphertext".into()))
    }

    fn export_backup(&self, key: &RecoveryKey) -> Result<Vec<u8>, CryptoError> {
        let state = self.state.lock();
        Ok([key.as_bytes().as_slice(), &state.account].concat())
    }

    fn import_backup(&self, blob: &[u8], key: &RecoveryKey) -> Result<(), CryptoError> {
        let account = blob
            .strip_prefix(key.as_bytes().as_slice())
            .ok_or_else(|| CryptoError::ImportFailed("wrong recovery key".into()))?;
        self.state.lock().imported = Some(account.to_vec());
        Ok(())
    }
}
