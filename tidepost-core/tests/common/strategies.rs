// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Proptest Strategies
//!
//! Reusable proptest strategies for property-based testing.

use proptest::prelude::*;
use tidepost_core::network::Opcode;

/// Any of the three wire opcodes.
pub fn opcode_strategy() -> impl Strategy<Value = Opcode> {
    prop_oneof![Just(Opcode::Put), Just(Opcode::Fetch), Just(Opcode::Delete)]
}

/// Arbitrary payload bytes, including empty.
pub fn payload_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..512)
}

/// Byte values that are not a known opcode.
pub fn unknown_opcode_strategy() -> impl Strategy<Value = u8> {
    any::<u8>().prop_filter("not a known opcode", |b| !(1..=3).contains(b))
}

/// Non-zero 32-byte mailbox material.
pub fn mailbox_bytes_strategy() -> impl Strategy<Value = [u8; 32]> {
    any::<[u8; 32]>().prop_filter("not all zero", |m| m.iter().any(|b| *b != 0))
}
