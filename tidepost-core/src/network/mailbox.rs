// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Mailbox Addresses
//!
//! Fixed-size identifiers handed out by the crypto engine. Mailbox material
//! is zeroized on drop and never shows up in `Debug` output.

use std::fmt;

use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of a mailbox address in bytes.
pub const MAILBOX_ADDRESS_LEN: usize = 32;

/// Size of the active mailbox buffer (current ‖ previous).
pub const ACTIVE_MAILBOX_LEN: usize = 2 * MAILBOX_ADDRESS_LEN;

/// Size of a connection identifier in bytes.
pub const CONNECTION_ID_LEN: usize = 16;

/// Fixed-size input of the wrong length.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MailboxError {
    #[error("Invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// A 32-byte relay mailbox address.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct MailboxAddress([u8; MAILBOX_ADDRESS_LEN]);

impl MailboxAddress {
    pub fn from_bytes(bytes: [u8; MAILBOX_ADDRESS_LEN]) -> Self {
        MailboxAddress(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, MailboxError> {
        let array: [u8; MAILBOX_ADDRESS_LEN] =
            bytes.try_into().map_err(|_| MailboxError::InvalidLength {
                expected: MAILBOX_ADDRESS_LEN,
                actual: bytes.len(),
            })?;
        Ok(MailboxAddress(array))
    }

    pub fn as_bytes(&self) -> &[u8; MAILBOX_ADDRESS_LEN] {
        &self.0
    }

    /// True when every byte is zero (the "absent" sentinel).
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl AsRef<[u8]> for MailboxAddress {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for MailboxAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MailboxAddress(..)")
    }
}

/// Current and (during a ratchet rollover) previous mailbox of a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveMailboxes {
    pub current: MailboxAddress,
    pub previous: Option<MailboxAddress>,
}

impl ActiveMailboxes {
    /// Mailboxes to poll, current first.
    pub fn iter(&self) -> impl Iterator<Item = &MailboxAddress> {
        std::iter::once(&self.current).chain(self.previous.as_ref())
    }
}

/// Splits a 64-byte active buffer into current and previous addresses.
///
/// An all-zero trailing half means there is no previous mailbox; the crypto
/// engine guarantees a real address is never all zero.
pub fn split_active(buffer: &[u8]) -> Result<ActiveMailboxes, MailboxError> {
    if buffer.len() != ACTIVE_MAILBOX_LEN {
        return Err(MailboxError::InvalidLength {
            expected: ACTIVE_MAILBOX_LEN,
            actual: buffer.len(),
        });
    }

    let current = MailboxAddress::from_slice(&buffer[..MAILBOX_ADDRESS_LEN])?;
    let previous = MailboxAddress::from_slice(&buffer[MAILBOX_ADDRESS_LEN..])?;
    Ok(ActiveMailboxes {
        current,
        previous: (!previous.is_zero()).then_some(previous),
    })
}

/// Opaque 16-byte identifier of a peer relationship.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId([u8; CONNECTION_ID_LEN]);

impl ConnectionId {
    pub fn from_bytes(bytes: [u8; CONNECTION_ID_LEN]) -> Self {
        ConnectionId(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, MailboxError> {
        let array: [u8; CONNECTION_ID_LEN] =
            bytes.try_into().map_err(|_| MailboxError::InvalidLength {
                expected: CONNECTION_ID_LEN,
                actual: bytes.len(),
            })?;
        Ok(ConnectionId(array))
    }

    pub fn as_bytes(&self) -> &[u8; CONNECTION_ID_LEN] {
        &self.0
    }
}

impl fmt::Debug for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ConnectionId(..)")
    }
}
