// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Trace replay
//!
//! This module provides the [`Tracer`], which consumes
//! [`Payload`][crate::packet::Payload]s and, armed with the traced program in
//! the form of a [`Binary`], statically replays the executed instruction
//! trail. Every replayed instruction is appended to a caller-owned sequence
//! of [`Instr`] records.

pub mod error;

#[cfg(test)]
mod tests;

pub use error::Error;

use alloc::vec::Vec;

use crate::binary::Binary;
use crate::config::Parameters;
use crate::instruction::{Instruction, Kind, RasKind};
use crate::packet::{sync, Payload, Trace};
use crate::types::branch;
use crate::types::stack::{ReturnStack, VecStack};
use crate::types::{Instr, Privilege};

/// Trace replay engine
///
/// A tracer holds the replay state for a single hart: the program counter,
/// the current privilege level, the last transmitted address for
/// differential decoding, the queue of pending branch outcomes and the
/// return-address stack used when implicit returns are enabled.
///
/// Packets must be fed in the order the encoder emitted them. Each
/// [`process`][Self::process] call runs to completion, appending the
/// instructions covered by the packet. A failing packet leaves the state
/// where the failure occurred; recovery is possible at the next sync packet.
///
/// Tracers are constructed using a [`Builder`].
pub struct Tracer<B: Binary, S: ReturnStack = VecStack> {
    binary: B,
    params: Parameters,
    pc: u64,
    privilege: Privilege,
    last_packet_addr: u64,
    branch_map: branch::Map,
    ras: S,
}

impl<B: Binary, S: ReturnStack> Tracer<B, S> {
    /// Get a reference to the [`Binary`] used by this tracer
    pub fn binary(&self) -> &B {
        &self.binary
    }

    /// Retrieve the current program counter
    pub fn pc(&self) -> u64 {
        self.pc
    }

    /// Retrieve the current privilege level
    pub fn privilege(&self) -> Privilege {
        self.privilege
    }

    /// Process one payload, appending the replayed instructions to `out`
    ///
    /// Software and timer payloads are informational and replay nothing.
    pub fn process(&mut self, payload: &Payload, out: &mut Vec<Instr>) -> Result<(), Error<B::Error>> {
        let Payload::Trace(trace) = payload else {
            return Ok(());
        };
        match trace {
            Trace::Sync(sync::Sync::Start(start)) => {
                self.privilege = start.privilege;
                self.sync_to(start.address, start.branch, out)
            }
            Trace::Sync(sync::Sync::Exception(exc)) => {
                self.privilege = exc.privilege;
                self.sync_to(exc.address, exc.branch, out)
            }
            Trace::Sync(sync::Sync::Context(_)) => Err(Error::ContextUnimplemented),
            Trace::AddrOnly { address } => {
                let abs = self.absolute(*address);
                self.last_packet_addr = abs;
                log::debug!("replaying up to address {abs:#x}");
                self.walk_addr_only(abs, out)
            }
            Trace::BranchFull { map, address } => {
                let abs = (*address).map(|a| a & self.params.address_mask());
                self.walk_branches(*map, abs, out)
            }
            Trace::BranchDiff { map, address } => {
                if self.params.full_address {
                    return Err(Error::BranchDiffWithFullAddress);
                }
                let abs = self.absolute(*address);
                self.walk_branches(*map, Some(abs), out)
            }
        }
    }

    /// Resolve a transmitted address field to an absolute address
    fn absolute(&self, value: u64) -> u64 {
        let mask = self.params.address_mask();
        if self.params.full_address {
            value & mask
        } else {
            self.last_packet_addr.wrapping_sub(value) & mask
        }
    }

    /// Re-establish absolute context from a sync packet
    ///
    /// Replays the single instruction at the reported address. A branch at
    /// that address is resolved through the packet's branch bit rather than
    /// the branch map.
    fn sync_to(
        &mut self,
        address: u64,
        branch: bool,
        out: &mut Vec<Instr>,
    ) -> Result<(), Error<B::Error>> {
        let mask = self.params.address_mask();
        let pc = address & mask;
        self.pc = pc;
        self.last_packet_addr = pc;

        let insn = self.fetch(pc)?;
        self.emit(out, pc, &insn);
        let fall = pc.wrapping_add(insn.size()) & mask;
        self.pc = fall;

        let Some(kind) = insn.kind else {
            return Ok(());
        };
        if let Some(offset) = kind.branch_target() {
            if !branch {
                self.pc = pc.wrapping_add_signed(offset.into()) & mask;
            }
        } else if let Some(target) = self.resolve_jump(pc, fall, kind)? {
            self.pc = target;
        } else if kind.is_unpredictable(self.params.implicit_ret) {
            return Err(Error::UnexpectedDiscontinuity(pc));
        }
        Ok(())
    }

    /// Replay instructions according to a branch packet
    ///
    /// Walks until all branch outcomes are consumed and either the reported
    /// address or the unpredictable discontinuity the packet was emitted for
    /// is reached. A packet without an address reports a full branch map and
    /// no discontinuity.
    fn walk_branches(
        &mut self,
        map: branch::Map,
        abs: Option<u64>,
        out: &mut Vec<Instr>,
    ) -> Result<(), Error<B::Error>> {
        let mask = self.params.address_mask();
        self.branch_map = map;
        if let Some(abs) = abs {
            self.last_packet_addr = abs;
            log::debug!("replaying {} branches up to {abs:#x}", map.count());
        } else {
            log::debug!("replaying a full branch map");
        }

        let mut hit_address = false;
        let mut hit_discontinuity = abs.is_none();

        while !(self.branch_map.is_empty() && (hit_discontinuity || hit_address)) {
            let pc = self.pc;
            let insn = self.fetch(pc)?;
            if self.branch_map.is_empty() && abs == Some(pc) {
                hit_address = true;
            }
            self.emit(out, pc, &insn);
            let fall = pc.wrapping_add(insn.size()) & mask;
            self.pc = fall;

            let Some(kind) = insn.kind else {
                continue;
            };
            if let Some(offset) = kind.branch_target() {
                let taken = self
                    .branch_map
                    .pop_taken()
                    .ok_or(Error::UnresolvableBranch(pc))?;
                if taken {
                    self.pc = pc.wrapping_add_signed(offset.into()) & mask;
                }
                if self.branch_map.is_empty() && abs == Some(pc) {
                    // the reported address is the last branch itself
                    hit_address = true;
                }
                continue;
            }
            if kind.is_return_from_trap() {
                log::debug!("return from trap at {pc:#x}");
            }
            if let Some(target) = self.resolve_jump(pc, fall, kind)? {
                self.pc = target;
            } else if kind.is_unpredictable(self.params.implicit_ret) {
                // the jump this packet reports; a single outcome may remain
                // for a branch that follows the discontinuity
                if self.branch_map.count() > 1 {
                    return Err(Error::UnexpectedDiscontinuity(pc));
                }
                self.pc = abs.ok_or(Error::UnexpectedDiscontinuity(pc))?;
                hit_discontinuity = true;
                log::debug!("found the discontinuity at {pc:#x}");
            }
        }
        Ok(())
    }

    /// Replay instructions up to a lone reported address
    ///
    /// Conditional branches cannot occur on such a path; their outcomes
    /// would have been transported in a branch packet.
    fn walk_addr_only(&mut self, abs: u64, out: &mut Vec<Instr>) -> Result<(), Error<B::Error>> {
        let mask = self.params.address_mask();
        let mut hit = false;
        while !hit {
            let pc = self.pc;
            let insn = self.fetch(pc)?;
            if pc == abs {
                hit = true;
            }
            self.emit(out, pc, &insn);
            let fall = pc.wrapping_add(insn.size()) & mask;
            self.pc = fall;

            let Some(kind) = insn.kind else {
                continue;
            };
            if kind.is_branch() {
                return Err(Error::UnexpectedBranch(pc));
            }
            if kind.is_return_from_trap() {
                log::debug!("return from trap at {pc:#x}");
            }
            if let Some(target) = self.resolve_jump(pc, fall, kind)? {
                self.pc = target;
            } else if kind.is_unpredictable(self.params.implicit_ret) {
                self.pc = abs;
                hit = true;
                log::debug!("found the discontinuity at {pc:#x}");
            }
        }
        Ok(())
    }

    /// Resolve a jump statically or through the return-address stack
    ///
    /// Returns the jump target if the instruction determines it, or [`None`]
    /// if it must come from the packet stream. The return-address stack is
    /// only maintained under implicit returns; without them, return targets
    /// are transported in packets like any other indirect jump.
    fn resolve_jump(
        &mut self,
        pc: u64,
        fall: u64,
        kind: Kind,
    ) -> Result<Option<u64>, Error<B::Error>> {
        let mask = self.params.address_mask();
        let target = kind
            .inferable_jump_target()
            .map(|t| pc.wrapping_add_signed(t.into()) & mask);
        if !self.params.implicit_ret {
            return Ok(target);
        }
        match kind.ras_kind() {
            RasKind::Call => {
                self.ras.push(fall);
                Ok(target)
            }
            RasKind::Return => {
                let target = self.ras.pop().ok_or(Error::EmptyReturnStack(pc))?;
                Ok(Some(target & mask))
            }
            RasKind::CoRet => {
                let target = self.ras.pop().ok_or(Error::EmptyReturnStack(pc))?;
                self.ras.push(fall);
                Ok(Some(target & mask))
            }
            RasKind::None => Ok(target),
        }
    }

    /// Fetch the instruction at the given address
    fn fetch(&mut self, pc: u64) -> Result<Instruction, Error<B::Error>> {
        self.binary
            .get_insn(pc)
            .map_err(|e| Error::CannotGetInstruction(e, pc))
    }

    /// Append a replayed instruction to the output sequence
    fn emit(&self, out: &mut Vec<Instr>, pc: u64, insn: &Instruction) {
        out.push(Instr {
            valid: true,
            iaddr: pc,
            instr: insn.raw().into(),
            compressed: insn.is_compressed(),
            privilege: self.privilege,
            ..Default::default()
        });
    }
}

/// Create a new [`Builder`] for [`Tracer`]s
pub fn builder() -> Builder<()> {
    Builder::new()
}

/// Builder for [`Tracer`]s
///
/// A builder will build a single [`Tracer`] for a single RISC-V hart. If
/// multiple harts are to be traced, each needs its own tracer.
#[derive(Copy, Clone, Debug)]
pub struct Builder<B> {
    binary: B,
    params: Parameters,
    entry: u64,
}

impl Builder<()> {
    /// Create a new builder for a [`Tracer`]
    pub fn new() -> Self {
        Builder {
            binary: (),
            params: Default::default(),
            entry: 0,
        }
    }
}

impl Default for Builder<()> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B> Builder<B> {
    /// Build the [`Tracer`] with the given [`Binary`]
    pub fn with_binary<C: Binary>(self, binary: C) -> Builder<C> {
        Builder {
            binary,
            params: self.params,
            entry: self.entry,
        }
    }

    /// Build the [`Tracer`] with the given [`Parameters`]
    ///
    /// New builders assume [`Default`] parameters. Encoder and tracer must
    /// agree on them.
    pub fn with_params(self, params: &Parameters) -> Self {
        Self {
            params: *params,
            ..self
        }
    }

    /// Build the [`Tracer`] with the given entry address
    ///
    /// The entry address serves as the initial program counter. It is
    /// usually taken from the traced binary and only matters when the packet
    /// stream does not begin with a sync packet.
    pub fn with_entry(self, entry: u64) -> Self {
        Self { entry, ..self }
    }

    /// Build the [`Tracer`]
    pub fn build<S: ReturnStack>(self) -> Tracer<B, S>
    where
        B: Binary,
    {
        Tracer {
            binary: self.binary,
            params: self.params,
            pc: self.entry,
            privilege: Default::default(),
            last_packet_addr: self.entry,
            branch_map: Default::default(),
            ras: Default::default(),
        }
    }
}
