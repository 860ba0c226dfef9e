// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Trace compression
//!
//! This module provides the [`Encoder`], the software model of the hardware
//! trace encoder. It consumes retired [`Instr`] records one at a time and
//! decides, over a sliding window of three records, when to emit which
//! [`Payload`].

pub mod stats;


use core::fmt;

use crate::config::Parameters;
use crate::instruction::{Instruction, Kind};
use crate::packet::{self, sync, Payload, Trace};
use crate::types::branch;
use crate::types::{addr, Instr};

use stats::Stats;

/// Trace encoder
///
/// For every retired instruction fed through [`step`][Self::step], the
/// encoder shifts its window and applies the emit decision to the middle
/// record, looking one record ahead. Emission thus lags one instruction
/// behind; [`finish`][Self::finish] flushes the final record once the stream
/// ends.
///
/// Emitted payloads are returned to the caller, who owns the resulting
/// sequence; the encoder itself only retains its window.
#[derive(Clone, Debug)]
pub struct Encoder {
    params: Parameters,
    lastc: Slot,
    thisc: Slot,
    nextc: Slot,
    branch_map: branch::Map,
    resync_cnt: u64,
    resync_pend: bool,
    last_iaddr: u64,
    stats: Stats,
}

impl Encoder {
    /// Create a new encoder
    pub fn new(params: Parameters) -> Self {
        Self {
            params,
            lastc: Default::default(),
            thisc: Default::default(),
            nextc: Default::default(),
            branch_map: Default::default(),
            resync_cnt: 0,
            resync_pend: false,
            last_iaddr: 0,
            stats: Default::default(),
        }
    }

    /// Retrieve the configuration this encoder runs with
    pub fn params(&self) -> &Parameters {
        &self.params
    }

    /// Retrieve the statistics gathered so far
    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Feed one retired instruction, potentially producing a payload
    ///
    /// Records not marked valid freeze the state and produce nothing. No
    /// partial payload escapes on error; the caller may discard the encoder
    /// and rebuild it.
    pub fn step(&mut self, record: Instr) -> Result<Option<Payload>, Error> {
        if !record.valid {
            return Ok(None);
        }
        self.shift(Slot::new(record, &self.params));
        self.decide()
    }

    /// Flush the encoder at the end of the instruction stream
    ///
    /// Shifts an unqualified slot into the window so that the final record
    /// receives its flush packet. Calling it again afterwards produces
    /// nothing.
    pub fn finish(&mut self) -> Result<Option<Payload>, Error> {
        self.shift(Default::default());
        self.decide()
    }

    /// Shift the window by one slot
    fn shift(&mut self, next: Slot) {
        self.lastc = self.thisc;
        self.thisc = self.nextc;
        self.nextc = next;
        self.thisc.privilege_change = self.thisc.record.privilege != self.lastc.record.privilege;
        self.nextc.privilege_change =
            self.nextc.qualified && self.thisc.record.privilege != self.nextc.record.privilege;
    }

    /// Apply the emit decision to the middle window slot
    fn decide(&mut self) -> Result<Option<Payload>, Error> {
        if !self.thisc.qualified {
            return Ok(None);
        }
        let this = self.thisc.record;

        if self.thisc.kind.map(Kind::is_unsupported).unwrap_or(false) {
            return Err(Error::UnsupportedInstruction {
                iaddr: this.iaddr,
                instr: this.instr,
            });
        }

        self.stats.instrs += 1;

        if self.resync_cnt == self.params.resync_max {
            self.resync_pend = true;
            self.resync_cnt = 0;
        } else {
            self.resync_cnt += 1;
        }

        // Record the branch outcome. Trapped branches never retire into the
        // map; their successor is the trap handler.
        let is_branch = self.thisc.kind.map(Kind::is_branch).unwrap_or(false);
        let pushed = is_branch && !self.thisc.exception;
        if pushed {
            self.branch_map.push_taken(self.branch_taken());
        }

        let payload = if self.lastc.exception {
            // the packet after the trapped instruction reports the handler
            // entry together with the trap information
            let last = self.lastc.record;
            self.thisc.emitted_exception_sync = true;
            self.resync_pend = false;
            self.last_iaddr = this.iaddr & self.params.address_mask();
            Some(
                sync::Exception {
                    privilege: this.privilege,
                    branch: self.sync_branch_bit(pushed),
                    address: this.iaddr,
                    cause: last.cause & 0x1f,
                    interrupt: last.interrupt,
                    tval: last.tval,
                }
                .into(),
            )
        } else if self.lastc.emitted_exception_sync && self.params.pulp_vector_table_packet {
            // the vector table entry may change at runtime, re-sync right
            // after it
            log::debug!("bridging vector table jump at {:#x}", this.iaddr);
            Some(self.sync_start(pushed))
        } else if (!self.lastc.qualified && self.thisc.qualified)
            || self.thisc.unhalted
            || self.thisc.privilege_change
            || (self.resync_pend && self.branch_map.is_empty())
        {
            self.resync_pend = false;
            Some(self.sync_start(pushed))
        } else if self.lastc.unpred_disc {
            Some(self.flush(true))
        } else if self.resync_pend && !self.branch_map.is_empty() {
            Some(self.flush(false))
        } else if self.nextc.halt
            || self.nextc.exception
            || self.nextc.privilege_change
            || !self.nextc.qualified
        {
            Some(self.flush(false))
        } else if self.branch_map.is_full() {
            Some(self.flush(false))
        } else if self.thisc.context_change {
            return Err(Error::ContextUnimplemented);
        } else {
            None
        };

        if let Some(payload) = &payload {
            self.note_emission(payload)?;
        }
        Ok(payload)
    }

    /// Build a sync start packet for the middle slot
    fn sync_start(&mut self, pushed_branch: bool) -> Payload {
        let this = self.thisc.record;
        let branch = self.sync_branch_bit(pushed_branch);
        self.last_iaddr = this.iaddr & self.params.address_mask();
        sync::Start {
            privilege: this.privilege,
            branch,
            address: this.iaddr,
        }
        .into()
    }

    /// Compute the sync packet branch bit, superseding the map entry
    ///
    /// The bit is set iff the reported instruction is a branch that is not
    /// taken. The outcome just recorded in the accumulator is retracted; the
    /// sync packet carries it instead.
    fn sync_branch_bit(&mut self, pushed_branch: bool) -> bool {
        if pushed_branch {
            self.branch_map.retract();
            !self.branch_taken()
        } else {
            false
        }
    }

    /// Determine whether the middle slot's branch is taken
    ///
    /// A branch is taken when the observed successor disagrees with the
    /// fall-through address. Without a successor the outcome counts as not
    /// taken.
    fn branch_taken(&self) -> bool {
        self.nextc.qualified && self.thisc.record.next_iaddr() != self.nextc.record.iaddr
    }

    /// Flush the branch map into an address-carrying packet
    ///
    /// A saturated map flushed for any reason other than an unpredictable
    /// discontinuity does not need the address; the branches field marks that
    /// case on the wire. The differential base only advances when an address
    /// is actually emitted, keeping it in sync with the decoder's.
    fn flush(&mut self, discontinuity: bool) -> Payload {
        let mask = self.params.address_mask();
        let this_addr = self.thisc.record.iaddr & mask;
        let map = self.branch_map.flush();

        let trace = if map.is_empty() {
            let address = if self.params.full_address {
                this_addr
            } else {
                self.last_iaddr.wrapping_sub(this_addr) & mask
            };
            self.last_iaddr = this_addr;
            Trace::AddrOnly { address }
        } else if map.is_full() && !discontinuity {
            Trace::BranchFull { map, address: None }
        } else if self.params.full_address {
            self.last_iaddr = this_addr;
            Trace::BranchFull {
                map,
                address: Some(this_addr),
            }
        } else {
            let chosen = addr::differential(this_addr, self.last_iaddr, &self.params);
            self.last_iaddr = this_addr;
            if chosen.differential {
                Trace::BranchDiff {
                    map,
                    address: chosen.value,
                }
            } else {
                Trace::BranchFull {
                    map,
                    address: Some(chosen.value),
                }
            }
        };
        trace.into()
    }

    /// Account an emitted payload
    fn note_emission(&mut self, payload: &Payload) -> Result<(), Error> {
        let bits = payload.bit_count(&self.params).map_err(Error::Packet)?;
        // dry serialization; the stream rounds every packet to whole bytes
        let mut scratch = [0u8; 32];
        payload.write(&self.params, 0, &mut scratch).map_err(Error::Packet)?;

        self.stats.packets += 1;
        self.stats.payload_bits += u64::from(bits - packet::PULPPKTLEN);
        self.stats.pulp_bits += u64::from(bits.div_ceil(8) * 8);

        let address = match payload {
            Payload::Trace(Trace::BranchFull { address, .. }) => {
                if address.is_some() {
                    self.stats.branch_full_packets += 1;
                } else {
                    self.stats.full_map_packets += 1;
                }
                *address
            }
            Payload::Trace(Trace::BranchDiff { address, .. }) => {
                self.stats.branch_diff_packets += 1;
                Some(*address)
            }
            Payload::Trace(Trace::AddrOnly { address }) => {
                self.stats.addr_only_packets += 1;
                Some(*address)
            }
            Payload::Trace(Trace::Sync(sync::Sync::Start(start))) => {
                self.stats.start_packets += 1;
                Some(start.address)
            }
            Payload::Trace(Trace::Sync(sync::Sync::Exception(exc))) => {
                self.stats.exception_packets += 1;
                Some(exc.address)
            }
            _ => None,
        };
        if let Some(address) = address {
            let mask = self.params.address_mask();
            let address = address & mask;
            if address == 0 {
                self.stats.zero_addresses += 1;
            } else if address == mask {
                self.stats.ones_addresses += 1;
            }
            let sext = addr::sign_extendable_bits(address, self.params.xlen());
            self.stats.sext_bits[(sext - 1) as usize] += 1;
        }

        log::debug!("emitting {payload:?}");
        Ok(())
    }
}

/// One slot of the encoder's sliding window
#[derive(Copy, Clone, Default, Debug)]
struct Slot {
    /// The slot holds a record that passed qualification
    qualified: bool,
    exception: bool,
    unpred_disc: bool,
    privilege_change: bool,
    emitted_exception_sync: bool,
    /// Reserved, the current profile never halts tracing
    halt: bool,
    /// Reserved, the current profile never halts tracing
    unhalted: bool,
    /// Reserved, context changes are not detected
    context_change: bool,
    kind: Option<Kind>,
    record: Instr,
}

impl Slot {
    fn new(record: Instr, params: &Parameters) -> Self {
        let kind = Instruction::from_word(record.instr as u32, record.compressed).kind;
        Self {
            qualified: true,
            exception: record.exception,
            unpred_disc: kind
                .map(|k| k.is_unpredictable(params.implicit_ret))
                .unwrap_or(false),
            privilege_change: false,
            emitted_exception_sync: false,
            halt: false,
            unhalted: false,
            context_change: false,
            kind,
            record,
        }
    }
}

/// Errors that may occur during trace compression
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// An instruction without packet representation was encountered
    UnsupportedInstruction { iaddr: u64, instr: u64 },
    /// A context change was flagged, which the profile reserves
    ContextUnimplemented,
    /// A payload could not be sized or serialized
    Packet(packet::Error),
}

impl core::error::Error for Error {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Packet(inner) => Some(inner),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedInstruction { iaddr, instr } => {
                write!(f, "unsupported instruction {instr:#x} at {iaddr:#x}")
            }
            Self::ContextUnimplemented => write!(f, "context change trigger not implemented"),
            Self::Packet(_) => write!(f, "cannot serialize payload"),
        }
    }
}
