// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Packet-specific error types

use core::fmt;
use core::num::NonZeroUsize;

/// Packet serialization/deserialization errors
///
/// No error leaves a partially emitted packet behind: serialization writes
/// into the caller's buffer but reports no bits on failure, deserialization
/// consumes nothing.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// The bit alignment is not below 8
    BadAlignment(u8),
    /// The branches field exceeds the branch map capacity
    TooManyBranches(u8),
    /// A branch packet carries no branches
    EmptyBranchMap,
    /// The payload does not fit the four bit byte-length field
    PayloadTooBig(u32),
    /// The message type is not known to us
    UnknownMsgType(u8),
    /// The sync subformat is reserved
    UnknownSubformat(u8),
    /// A differential branch packet under full address configuration
    BranchDiffWithFullAddress,
    /// The context subformat is declared but not implemented
    ContextUnimplemented,
    /// Some more bytes of data are required for the operation to succeed
    InsufficientData(NonZeroUsize),
    /// The target buffer is too small for the encoded data
    BufferTooSmall,
}

impl core::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadAlignment(a) => write!(f, "bad alignment value: {a}"),
            Self::TooManyBranches(b) => write!(f, "branches field too large: {b}"),
            Self::EmptyBranchMap => write!(f, "branch packet without branches"),
            Self::PayloadTooBig(bits) => write!(f, "payload of {bits} bits overflows length field"),
            Self::UnknownMsgType(t) => write!(f, "unknown message type {t}"),
            Self::UnknownSubformat(s) => write!(f, "reserved sync subformat {s}"),
            Self::BranchDiffWithFullAddress => {
                write!(f, "differential branch packet but full_address set")
            }
            Self::ContextUnimplemented => write!(f, "context subformat not implemented"),
            Self::InsufficientData(n) => write!(f, "at least {n} more bytes of data required"),
            Self::BufferTooSmall => write!(f, "reached end of buffer while encoding"),
        }
    }
}
