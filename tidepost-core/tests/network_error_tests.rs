// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Tests for error display and conversions across modules

use std::time::Duration;

use tidepost_core::backup::BackupError;
use tidepost_core::delivery::DeliveryError;
use tidepost_core::network::*;

#[test]
fn test_error_display_messages() {
    let errors = vec![
        (
            NetworkError::ConnectionFailed("refused".into()),
            "Connection failed: refused",
        ),
        (NetworkError::ConnectionClosed, "Connection closed"),
        (NetworkError::NotConnected, "Transport not connected"),
        (
            NetworkError::OpenTimeout(Duration::from_millis(1500)),
            "Socket did not open within 1.5s",
        ),
        (
            NetworkError::Frame(FrameError::UnknownOpcode(7)),
            "Frame error: Unknown opcode: 7",
        ),
    ];

    for (error, expected) in errors {
        assert_eq!(error.to_string(), expected);
    }
}

#[test]
fn test_frame_error_display() {
    assert_eq!(
        FrameError::FrameTooShort { len: 2 }.to_string(),
        "Frame too short: 2 bytes (need at least 5)"
    );
    assert_eq!(
        FrameError::LengthMismatch {
            declared: 4,
            actual: 3
        }
        .to_string(),
        "Length mismatch: header declares 4 bytes, frame carries 3"
    );
}

#[test]
fn test_error_clone() {
    let error = NetworkError::ConnectionFailed("test".into());
    let cloned = error.clone();
    assert_eq!(error.to_string(), cloned.to_string());
}

#[test]
fn test_conversions() {
    let network: NetworkError = FrameError::PayloadTooLarge(1).into();
    assert!(matches!(network, NetworkError::Frame(_)));

    let delivery: DeliveryError = NetworkError::NotConnected.into();
    assert_eq!(delivery.to_string(), "Network error: Transport not connected");

    let delivery: DeliveryError = MailboxError::InvalidLength {
        expected: 64,
        actual: 3,
    }
    .into();
    assert!(matches!(delivery, DeliveryError::Mailbox(_)));

    let backup: BackupError = NetworkError::OpenTimeout(Duration::from_secs(1)).into();
    assert!(matches!(backup, BackupError::Network(NetworkError::OpenTimeout(_))));
    assert_eq!(
        BackupError::InvalidKeyLength(3).to_string(),
        "Recovery key must be 32 bytes, got 3"
    );
}
