// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0

use core::fmt;

/// Replay specific errors
///
/// A failed packet leaves no partially appended instructions beyond those
/// already replayed; higher level drivers may recover by rebuilding the
/// tracer state from the next sync packet.
#[derive(Debug, PartialEq, Eq)]
pub enum Error<B> {
    /// We could not fetch an instruction from a given address
    CannotGetInstruction(B, u64),
    /// An unpredictable discontinuity without address information
    UnexpectedDiscontinuity(u64),
    /// A conditional branch on a path that must not contain any
    UnexpectedBranch(u64),
    /// A conditional branch with no branch information left
    UnresolvableBranch(u64),
    /// A return with an empty return-address stack
    EmptyReturnStack(u64),
    /// A context sync packet, which the profile reserves
    ContextUnimplemented,
    /// A differential branch packet under full address configuration
    BranchDiffWithFullAddress,
}

impl<B> core::error::Error for Error<B>
where
    B: fmt::Debug + core::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::CannotGetInstruction(inner, _) => Some(inner),
            _ => None,
        }
    }
}

impl<B> fmt::Display for Error<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CannotGetInstruction(_, addr) => {
                write!(f, "cannot get the instruction at {addr:#x}")
            }
            Self::UnexpectedDiscontinuity(pc) => {
                write!(f, "unpredictable discontinuity at {pc:#x} without address")
            }
            Self::UnexpectedBranch(pc) => {
                write!(f, "conditional branch at {pc:#x} on an address-only path")
            }
            Self::UnresolvableBranch(pc) => {
                write!(f, "no branch information left for branch at {pc:#x}")
            }
            Self::EmptyReturnStack(pc) => {
                write!(f, "return at {pc:#x} with an empty return-address stack")
            }
            Self::ContextUnimplemented => write!(f, "context sync packets not implemented"),
            Self::BranchDiffWithFullAddress => {
                write!(f, "differential branch packet but full_address set")
            }
        }
    }
}
