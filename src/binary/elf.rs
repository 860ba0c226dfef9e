// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! ELF backed [`Binary`]

use core::borrow::Borrow;
use core::fmt;

use elf::endian::EndianParse;
use elf::ElfBytes;

use crate::instruction::Instruction;

use super::Binary;

/// Static ELF [`Binary`]
///
/// Serves [`Instruction`]s from the executable `LOAD` segments of an
/// [`ElfBytes`]. Like [`Sections`][super::Sections], the segment execution
/// currently resides in stays loaded until an address outside of it is
/// requested; only then are the program headers scanned again. Neither
/// decompression nor dynamic linking are supported.
#[derive(Copy, Clone)]
pub struct Elf<'d, E, P>
where
    E: Borrow<ElfBytes<'d, P>>,
    P: EndianParse,
{
    elf: E,
    resident: Option<Resident<'d>>,
    phantom: core::marker::PhantomData<P>,
}

impl<'d, E, P> Elf<'d, E, P>
where
    E: Borrow<ElfBytes<'d, P>>,
    P: EndianParse,
{
    /// Create a new ELF [`Binary`]
    ///
    /// Only little endian RISC-V executables are accepted.
    pub fn new(elf: E) -> Result<Self, Error> {
        let hdr = &elf.borrow().ehdr;
        if hdr.e_machine != elf::abi::EM_RISCV {
            Err(Error::WrongArchitecture)
        } else if !hdr.endianness.is_little() {
            Err(Error::WrongEndianness)
        } else {
            Ok(Self {
                elf,
                resident: None,
                phantom: Default::default(),
            })
        }
    }

    /// Retrieve the inner [`ElfBytes`]
    pub fn inner(&self) -> &ElfBytes<'d, P> {
        self.elf.borrow()
    }

    /// Retrieve the program's entry address
    pub fn entry(&self) -> u64 {
        self.elf.borrow().ehdr.e_entry
    }

    /// Scan the program headers for the segment containing the address
    fn load(&self, address: u64) -> Result<Resident<'d>, Error> {
        let elf = self.elf.borrow();
        let headers = elf.segments().ok_or(Error::NoSegment(address))?;
        for header in headers.iter() {
            if header.p_type != elf::abi::PT_LOAD || header.p_flags & elf::abi::PF_X == 0 {
                continue;
            }
            let covered = address
                .checked_sub(header.p_vaddr)
                .map(|offset| offset < header.p_filesz)
                .unwrap_or(false);
            if !covered {
                continue;
            }
            let data = elf.segment_data(&header).map_err(Error::SegmentData)?;
            if data.is_empty() {
                return Err(Error::EmptySegment(header.p_vaddr));
            }
            return Ok(Resident {
                vma: header.p_vaddr,
                data,
            });
        }
        Err(Error::NoSegment(address))
    }
}

impl<'d, E, P> Binary for Elf<'d, E, P>
where
    E: Borrow<ElfBytes<'d, P>>,
    P: EndianParse,
{
    type Error = Error;

    fn get_insn(&mut self, address: u64) -> Result<Instruction, Self::Error> {
        let resident = match self.resident.filter(|r| r.contains(address)) {
            Some(resident) => resident,
            None => {
                let resident = self.load(address)?;
                log::debug!("switched to segment at {:#x}", resident.vma);
                self.resident = Some(resident);
                resident
            }
        };

        let insn_data = address
            .checked_sub(resident.vma)
            .and_then(|offset| usize::try_from(offset).ok())
            .and_then(|offset| resident.data.get(offset..))
            .ok_or(Error::NoSegment(address))?;
        Instruction::extract(insn_data)
            .map(|(insn, _)| insn)
            .ok_or(Error::NoInstruction(address))
    }
}

/// The executable segment execution currently resides in
#[derive(Copy, Clone)]
struct Resident<'d> {
    vma: u64,
    data: &'d [u8],
}

impl Resident<'_> {
    /// Check whether the given address lies within this segment
    fn contains(&self, address: u64) -> bool {
        address
            .checked_sub(self.vma)
            .map(|offset| offset < self.data.len() as u64)
            .unwrap_or(false)
    }
}

/// ELF specific error type
///
/// The first three variants correspond to the [`Error`][super::Error]s of the
/// bundled in-memory [`Binary`]s.
#[derive(Debug)]
pub enum Error {
    /// No executable segment contains the address
    NoSegment(u64),
    /// The segment containing the address is not backed by file data
    EmptySegment(u64),
    /// The data at the address is not a valid instruction
    NoInstruction(u64),
    /// A segment's data could not be retrieved from the file
    SegmentData(elf::parse::ParseError),
    /// The file is not a RISC-V ELF
    WrongArchitecture,
    /// The file is not little endian
    WrongEndianness,
}

impl core::error::Error for Error {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            #[cfg(feature = "std")]
            Self::SegmentData(inner) => Some(inner),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSegment(a) => write!(f, "no executable segment contains address {a:#x}"),
            Self::EmptySegment(v) => write!(f, "segment at {v:#x} holds no file data"),
            Self::NoInstruction(a) => write!(f, "no valid instruction at {a:#x}"),
            Self::SegmentData(_) => write!(f, "cannot retrieve segment data"),
            Self::WrongArchitecture => write!(f, "not a RISC-V ELF"),
            Self::WrongEndianness => write!(f, "not a little endian ELF"),
        }
    }
}
