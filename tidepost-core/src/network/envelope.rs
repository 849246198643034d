// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Envelope Codec
//!
//! Fixed binary frame used on the relay socket:
//!
//! ```text
//! [opcode: 1 byte] [length: 4 bytes little-endian] [payload: length bytes]
//! ```
//!
//! The payload is never inspected. Integrity of the bytes in transit is the
//! transport's job (TCP/TLS); authenticity of the payload is the caller's job.

use thiserror::Error;

/// Frame header size (1 byte opcode + 4 bytes length).
pub const FRAME_HEADER_SIZE: usize = 5;

/// Largest payload the 4-byte length field can describe.
pub const MAX_PAYLOAD_SIZE: usize = u32::MAX as usize;

/// Errors produced while encoding or decoding a frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("Frame too short: {len} bytes (need at least {min})", min = FRAME_HEADER_SIZE)]
    FrameTooShort { len: usize },

    #[error("Length mismatch: header declares {declared} bytes, frame carries {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("Unknown opcode: {0}")]
    UnknownOpcode(u8),

    #[error("Payload too large: {0} bytes")]
    PayloadTooLarge(usize),
}

/// Relay operation carried by a frame.
///
/// `Fetch` is used for both the request (client to relay) and the response
/// (relay to client); the direction tells them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Put = 1,
    Fetch = 2,
    Delete = 3,
}

impl Opcode {
    /// Wire value of this opcode.
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Opcode {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Opcode::Put),
            2 => Ok(Opcode::Fetch),
            3 => Ok(Opcode::Delete),
            other => Err(FrameError::UnknownOpcode(other)),
        }
    }
}

/// A decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub opcode: Opcode,
    pub payload: Vec<u8>,
}

impl Envelope {
    pub fn new(opcode: Opcode, payload: impl Into<Vec<u8>>) -> Self {
        Envelope {
            opcode,
            payload: payload.into(),
        }
    }

    /// Encodes this envelope into a wire frame.
    pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
        encode(self.opcode, &self.payload)
    }

    /// Decodes a wire frame.
    pub fn decode(frame: &[u8]) -> Result<Self, FrameError> {
        decode(frame)
    }
}

/// Encodes `payload` under `opcode`.
///
/// The output is always exactly `FRAME_HEADER_SIZE + payload.len()` bytes.
pub fn encode(opcode: Opcode, payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    let len = u32::try_from(payload.len()).map_err(|_| FrameError::PayloadTooLarge(payload.len()))?;

    let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
    frame.push(opcode.as_byte());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Decodes a complete wire frame.
pub fn decode(frame: &[u8]) -> Result<Envelope, FrameError> {
    let declared = read_frame_length(frame)?;
    let actual = frame.len() - FRAME_HEADER_SIZE;
    if declared != actual {
        return Err(FrameError::LengthMismatch { declared, actual });
    }

    let opcode = Opcode::try_from(frame[0])?;
    Ok(Envelope {
        opcode,
        payload: frame[FRAME_HEADER_SIZE..].to_vec(),
    })
}

/// Reads the declared payload length from a frame header.
pub fn read_frame_length(frame: &[u8]) -> Result<usize, FrameError> {
    if frame.len() < FRAME_HEADER_SIZE {
        return Err(FrameError::FrameTooShort { len: frame.len() });
    }
    let mut len = [0u8; 4];
    len.copy_from_slice(&frame[1..FRAME_HEADER_SIZE]);
    Ok(u32::from_le_bytes(len) as usize)
}

/// Returns the opcode byte of a raw frame without validating the rest.
pub fn peek_opcode(frame: &[u8]) -> Option<u8> {
    frame.first().copied()
}

/// Returns the payload slice of a raw frame if its header is consistent.
pub fn payload_of(frame: &[u8]) -> Option<&[u8]> {
    match read_frame_length(frame) {
        Ok(declared) if declared == frame.len() - FRAME_HEADER_SIZE => {
            Some(&frame[FRAME_HEADER_SIZE..])
        }
        _ => None,
    }
}
