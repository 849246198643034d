// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Tidepost Core Library
//!
//! Client-side relay transport for an end-to-end encrypted messenger.
//! The relay only ever sees opaque ciphertext addressed to 32-byte mailboxes;
//! encryption and mailbox derivation belong to the crypto engine behind
//! [`CryptoEngine`].

pub mod backup;
pub mod config;
pub mod crypto;
pub mod delivery;
pub mod invite;
pub mod network;

pub use backup::{
    derive_backup_mailbox, BackupConfig, BackupError, DownloadedBackup, RelayBackup,
    RelayBackupEnvelope,
};
pub use config::{ClientConfig, ConfigError};
pub use crypto::{CryptoEngine, CryptoError, MockCryptoEngine, RecoveryKey};
pub use delivery::{
    delete_ciphertext_blobs, fetch_ciphertext_blobs, fetch_messages, send_ciphertext_blob,
    send_message, DeliveryError, FetchOptions,
};
pub use invite::{InviteChannel, InviteChannelOptions, InviteError, InviteHooks, InviteSignal};
pub use network::{
    ConnectionId, Connector, Envelope, FrameError, FrameFilter, MailboxAddress, NetworkError,
    Opcode, ReconnectingSocket, SocketState, TransportConfig, WebSocketConnector,
};
