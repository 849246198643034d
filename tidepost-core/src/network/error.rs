// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Network Error Types
//!
//! Error types for socket and transport operations.

use std::time::Duration;

use thiserror::Error;

use super::envelope::FrameError;

/// Network and transport error types.
#[derive(Error, Debug, Clone)]
pub enum NetworkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Socket did not open within {0:?}")]
    OpenTimeout(Duration),

    #[error("Message send failed: {0}")]
    SendFailed(String),

    #[error("Message receive failed: {0}")]
    ReceiveFailed(String),

    #[error("Invalid relay URL: {0}")]
    InvalidUrl(String),

    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("Transport not connected")]
    NotConnected,
}
