// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Synchronisation packets
//!
//! Synchronisation packets re-establish absolute decoder context: the
//! privilege level and the program counter, plus trap information for
//! [`Exception`] packets.

use crate::types::Privilege;

/// A synchronisation packet, tagged by subformat
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Sync {
    Start(Start),
    Exception(Exception),
    Context(Context),
}

impl Sync {
    /// Retrieve the wire subformat code
    pub(crate) fn subformat(&self) -> u8 {
        match self {
            Self::Start(_) => 0,
            Self::Exception(_) => 1,
            Self::Context(_) => 2,
        }
    }
}

impl From<Start> for Sync {
    fn from(start: Start) -> Self {
        Self::Start(start)
    }
}

impl From<Exception> for Sync {
    fn from(exception: Exception) -> Self {
        Self::Exception(exception)
    }
}

impl From<Context> for Sync {
    fn from(context: Context) -> Self {
        Self::Context(context)
    }
}

/// Start of a trace, or periodic resynchronisation
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Start {
    /// Privilege level at the reported address
    pub privilege: Privilege,
    /// The instruction at the reported address is a branch that is not taken
    ///
    /// Set so that a branch at the synchronisation point is not missed when
    /// no branch-map packet follows.
    pub branch: bool,
    /// Absolute address of the next traced instruction
    pub address: u64,
}

/// Synchronisation after a trap
///
/// Reports the first instruction of the trap handler along with the cause of
/// the trap taken by the previously retired instruction.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Exception {
    /// Privilege level at the reported address
    pub privilege: Privilege,
    /// The instruction at the reported address is a branch that is not taken
    pub branch: bool,
    /// Absolute address of the trap handler's first instruction
    pub address: u64,
    /// Trap cause, five transported bits
    pub cause: u8,
    /// The trap was an interrupt rather than a synchronous exception
    pub interrupt: bool,
    /// Trap value
    ///
    /// Carried in the model but not serialized in the current profile; it
    /// deserializes as zero.
    pub tval: u64,
}

/// Context change synchronisation
///
/// Reserved; the context body is not transported and both serialization and
/// the encoder trigger report it as unimplemented.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Context {
    /// Privilege level
    pub privilege: Privilege,
}
