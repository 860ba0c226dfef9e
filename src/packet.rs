// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Packet definitions and their wire formats
//!
//! This module defines the [`Payload`]s exchanged between the trace
//! [`Encoder`][crate::encoder::Encoder] and the
//! [`Tracer`][crate::tracer::Tracer], together with their serialized forms:
//! the PULP stream format carrying a length nibble in front of every packet
//! ([`encoder`], [`decoder`]) and the legacy packing without one
//! ([`Payload::write_raw`]), which the hardware testbenches compare against.

pub mod decoder;
pub mod encoder;
pub mod error;
pub mod sync;


pub use error::Error;

use crate::config::Parameters;
use crate::types::addr;
use crate::types::branch::{self, branch_map_len};

/// Width of the packet length field in bits
pub const PULPPKTLEN: u32 = 4;
/// Width of the message type field in bits
pub const MSGTYPELEN: u32 = 2;
/// Width of the format (and subformat) field in bits
pub const FORMATLEN: u32 = 2;
/// Width of the branch count field in bits
pub const BRANCHLEN: u32 = 5;
/// Width of the privilege field in bits
pub const PRIVLEN: u32 = 3;
/// Width of the exception cause field in bits
pub const CAUSELEN: u32 = 5;
/// Width of the timer payload in bits
pub const TIMELEN: u32 = 64;

/// Message type of timer packets
pub(crate) const W_TIMER: u8 = 1;
/// Message type of instruction trace packets
pub(crate) const W_TRACE: u8 = 2;
/// Message type of user defined packets
pub(crate) const W_SOFTWARE: u8 = 3;

/// A packet payload
///
/// Payloads are produced by the [`Encoder`][crate::encoder::Encoder] (or
/// injected by other trace sources) and transferred to the caller, who owns
/// the resulting sequence. The [`Tracer`][crate::tracer::Tracer] reads them
/// by reference.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Payload {
    /// An instruction trace packet
    Trace(Trace),
    /// User defined data, written through the APB
    Software { userdata: u32 },
    /// Timer data
    Timer { time: u64 },
}

impl Payload {
    /// Retrieve the encapsulated instruction trace packet
    ///
    /// Returns [None] if this payload is not an instruction trace packet.
    pub fn as_trace(&self) -> Option<&Trace> {
        match self {
            Self::Trace(trace) => Some(trace),
            _ => None,
        }
    }

    /// Compute this payload's exact length in the PULP stream format
    ///
    /// The count includes the [`PULPPKTLEN`] length nibble. The serialized
    /// packet occupies the count rounded up to whole bytes.
    pub fn bit_count(&self, params: &Parameters) -> Result<u32, Error> {
        let xlen = params.xlen();
        let header = PULPPKTLEN + MSGTYPELEN;
        match self {
            Self::Trace(trace) => {
                let header = header + FORMATLEN;
                match trace {
                    Trace::BranchFull { map, address } => {
                        let branches = branch_field(map, address.is_some())?;
                        let base = header + BRANCHLEN;
                        match address {
                            Some(address) => {
                                let keep = if params.full_address {
                                    xlen
                                } else {
                                    addr::keep_bits(*address, params)
                                };
                                Ok(base + branch_map_len(branches) + keep)
                            }
                            None => Ok(base + full_map_len(map, params)),
                        }
                    }
                    Trace::BranchDiff { map, address } => {
                        if params.full_address {
                            return Err(Error::BranchDiffWithFullAddress);
                        }
                        let branches = branch_field(map, true)?;
                        Ok(header
                            + BRANCHLEN
                            + branch_map_len(branches)
                            + addr::keep_bits(*address, params))
                    }
                    Trace::AddrOnly { address } => {
                        let keep = if params.full_address {
                            xlen
                        } else {
                            addr::keep_bits(*address, params)
                        };
                        Ok(header + keep)
                    }
                    Trace::Sync(sync) => {
                        let header = header + FORMATLEN + PRIVLEN;
                        match sync {
                            sync::Sync::Start(_) => Ok(header + 1 + xlen),
                            sync::Sync::Exception(_) => Ok(header + 1 + xlen + CAUSELEN + 1),
                            sync::Sync::Context(_) => Err(Error::ContextUnimplemented),
                        }
                    }
                }
            }
            Self::Software { .. } => Ok(header + xlen),
            Self::Timer { .. } => Ok(header + TIMELEN),
        }
    }
}

impl From<Trace> for Payload {
    fn from(trace: Trace) -> Self {
        Self::Trace(trace)
    }
}

impl From<sync::Sync> for Payload {
    fn from(sync: sync::Sync) -> Self {
        Trace::Sync(sync).into()
    }
}

impl From<sync::Start> for Payload {
    fn from(start: sync::Start) -> Self {
        sync::Sync::from(start).into()
    }
}

impl From<sync::Exception> for Payload {
    fn from(exception: sync::Exception) -> Self {
        sync::Sync::from(exception).into()
    }
}

impl From<sync::Context> for Payload {
    fn from(context: sync::Context) -> Self {
        sync::Sync::from(context).into()
    }
}

/// An instruction trace packet
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Trace {
    /// Branch information with an absolute address
    ///
    /// The address is absent if the packet reports a full branch map that
    /// does not coincide with an unpredictable discontinuity; the `branches`
    /// field is serialized as `0` to mark that case.
    BranchFull {
        map: branch::Map,
        address: Option<u64>,
    },
    /// Branch information with a differential address
    ///
    /// The address is the difference of the previously transmitted address
    /// and the reported one.
    BranchDiff { map: branch::Map, address: u64 },
    /// A lone address, absolute or differential per
    /// [`full_address`][Parameters::full_address]
    AddrOnly { address: u64 },
    /// Synchronisation information
    Sync(sync::Sync),
}

impl Trace {
    /// Retrieve the wire format code
    pub(crate) fn format(&self) -> u8 {
        match self {
            Self::BranchFull { .. } => 0,
            Self::BranchDiff { .. } => 1,
            Self::AddrOnly { .. } => 2,
            Self::Sync(_) => 3,
        }
    }
}

/// Compute the value of the `branches` field for a branch packet
///
/// Address-less packets encode a full map with a `branches` field of zero.
fn branch_field(map: &branch::Map, with_address: bool) -> Result<u8, Error> {
    let count = map.count();
    if count > branch::Map::MAX_BRANCHES {
        Err(Error::TooManyBranches(count))
    } else if with_address {
        if count == 0 {
            Err(Error::EmptyBranchMap)
        } else {
            Ok(count)
        }
    } else if !map.is_full() {
        Err(Error::EmptyBranchMap)
    } else {
        Ok(0)
    }
}

/// Compute the serialized width of a full branch map without an address
fn full_map_len(map: &branch::Map, params: &Parameters) -> u32 {
    if params.compress_full_branch_map {
        let sext = addr::sign_extendable_bits((map.raw_bits() << 1).into(), 32).min(31);
        31 - sext + 1
    } else {
        31
    }
}
