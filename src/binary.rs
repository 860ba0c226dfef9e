// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Binaries containing [`Instruction`]s
//!
//! Replaying a trace requires knowledge about the program being traced. This
//! module defines the [`Binary`] trait used by the
//! [`Tracer`][crate::tracer::Tracer] for retrieving [`Instruction`]s as well
//! as a number of types implementing it:
//!
//! * adapters such as [`from_fn`] that allow defining a [`Binary`] from a
//!   wide range of instruction sources,
//! * [`Segment`], a flat buffer of executable bytes mapped at a virtual
//!   address, corresponding to one loadable section of an object file,
//! * [`Sections`], an ordered list of [`Segment`]s with the
//!   currently-resident one cached, mirroring how a debugger walks in and out
//!   of the sections of an executable,
//! * [`SortedMap`], a sparse address map handy for tests, and
//! * a [`Binary`] for static ELF files behind the `elf` feature.

#[cfg(feature = "elf")]
pub mod elf;

#[cfg(test)]
mod tests;

use core::fmt;

use crate::instruction::Instruction;

/// A binary of some sort that contains [`Instruction`]s
///
/// Implementations may mutate internal state when fetching an
/// [`Instruction`], e.g. for caching the section an address resolved to.
pub trait Binary {
    /// Error type returned by [`get_insn`][Self::get_insn]
    type Error;

    /// Retrieve the [`Instruction`] at the given address
    fn get_insn(&mut self, address: u64) -> Result<Instruction, Self::Error>;
}

/// Create a [`Binary`] from a closure
pub fn from_fn<F, E>(f: F) -> FromFn<F>
where
    F: FnMut(u64) -> Result<Instruction, E>,
{
    FromFn(f)
}

/// [`Binary`] backed by a closure
pub struct FromFn<F>(F);

impl<F, E> Binary for FromFn<F>
where
    F: FnMut(u64) -> Result<Instruction, E>,
{
    type Error = E;

    fn get_insn(&mut self, address: u64) -> Result<Instruction, Self::Error> {
        (self.0)(address)
    }
}

/// Create a [`Segment`] from a buffer and the virtual address it is mapped at
pub fn from_segment<D: AsRef<[u8]>>(data: D, vma: u64) -> Segment<D> {
    Segment { data, vma }
}

/// A flat buffer of executable bytes mapped at a virtual address
///
/// This corresponds to a single loadable section of an object file: a base
/// VMA and the section's bytes.
#[derive(Copy, Clone, Debug)]
pub struct Segment<D> {
    data: D,
    vma: u64,
}

impl<D: AsRef<[u8]>> Segment<D> {
    /// Retrieve the virtual address this segment is mapped at
    pub fn vma(&self) -> u64 {
        self.vma
    }

    /// Retrieve the segment's size in octets
    pub fn size(&self) -> u64 {
        self.data.as_ref().len() as u64
    }

    /// Check whether the given address lies within this segment
    pub fn contains(&self, address: u64) -> bool {
        address
            .checked_sub(self.vma)
            .map(|o| o < self.size())
            .unwrap_or(false)
    }
}

impl<D: AsRef<[u8]>> Binary for Segment<D> {
    type Error = Error;

    fn get_insn(&mut self, address: u64) -> Result<Instruction, Self::Error> {
        let data = self.data.as_ref();
        if data.is_empty() {
            return Err(Error::EmptySection(self.vma));
        }
        let offset = address
            .checked_sub(self.vma)
            .filter(|o| *o < data.len() as u64)
            .ok_or(Error::NoSection(address))?;
        Instruction::extract(&data[offset as usize..])
            .map(|(insn, _)| insn)
            .ok_or(Error::NoInstruction(address))
    }
}

/// An ordered list of [`Segment`]s
///
/// Fetches are served from the section the previous fetch resolved to; when
/// execution leaves it, the list is searched for the section containing the
/// new address.
#[cfg(feature = "alloc")]
#[derive(Clone, Debug, Default)]
pub struct Sections<D> {
    sections: alloc::vec::Vec<Segment<D>>,
    current: usize,
}

#[cfg(feature = "alloc")]
impl<D: AsRef<[u8]>> Sections<D> {
    /// Create a new section list
    pub fn new(sections: impl IntoIterator<Item = Segment<D>>) -> Self {
        Self {
            sections: sections.into_iter().collect(),
            current: 0,
        }
    }

    /// Locate the section containing the given address
    fn locate(&mut self, address: u64) -> Option<usize> {
        if !self
            .sections
            .get(self.current)
            .map(|s| s.contains(address))
            .unwrap_or(false)
        {
            self.current = self.sections.iter().position(|s| s.contains(address))?;
            log::debug!(
                "switched to section at {:#x}",
                self.sections[self.current].vma(),
            );
        }
        Some(self.current)
    }
}

#[cfg(feature = "alloc")]
impl<D: AsRef<[u8]>> Binary for Sections<D> {
    type Error = Error;

    fn get_insn(&mut self, address: u64) -> Result<Instruction, Self::Error> {
        let idx = self.locate(address).ok_or(Error::NoSection(address))?;
        self.sections[idx].get_insn(address)
    }
}

/// Create a [`SortedMap`] [`Binary`] from address/bytes pairs
///
/// The pairs must be sorted by address. Compressed instructions may be
/// padded to the entry width; extraction only considers the leading bytes.
pub fn from_sorted_map<T: AsRef<[u8]>, const N: usize>(entries: [(u64, T); N]) -> SortedMap<T, N> {
    debug_assert!(entries.windows(2).all(|w| w[0].0 < w[1].0));
    SortedMap { entries }
}

/// Sparse address map [`Binary`]
///
/// Holds individual instructions at discrete addresses. Mostly useful for
/// tests and hand-written programs.
#[derive(Copy, Clone, Debug)]
pub struct SortedMap<T, const N: usize> {
    entries: [(u64, T); N],
}

impl<T: AsRef<[u8]>, const N: usize> Binary for SortedMap<T, N> {
    type Error = Error;

    fn get_insn(&mut self, address: u64) -> Result<Instruction, Self::Error> {
        let idx = self
            .entries
            .binary_search_by_key(&address, |(a, _)| *a)
            .map_err(|_| Error::NoSection(address))?;
        Instruction::extract(self.entries[idx].1.as_ref())
            .map(|(insn, _)| insn)
            .ok_or(Error::NoInstruction(address))
    }
}

/// Errors of the bundled [`Binary`] implementations
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// The address lies outside every known section
    NoSection(u64),
    /// The section containing the address holds no data
    EmptySection(u64),
    /// The data at the address is not a valid instruction
    NoInstruction(u64),
}

impl core::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSection(a) => write!(f, "no section contains address {a:#x}"),
            Self::EmptySection(v) => write!(f, "section at {v:#x} holds no data"),
            Self::NoInstruction(a) => write!(f, "no valid instruction at {a:#x}"),
        }
    }
}
