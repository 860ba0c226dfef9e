// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! # Codec and tracer for PULP RISC-V instruction traces
//!
//! This library provides a software model of the PULP trace debugger, a
//! hardware instruction-trace encoder for RISC-V cores. Given the stream of
//! retired-instruction records produced by a core (or a functional
//! simulator), the [`Encoder`][encoder::Encoder] emits a compact stream of
//! [`Payload`][packet::Payload]s. Given those payloads and the traced
//! program, the [`Tracer`][tracer::Tracer] reconstructs the exact executed
//! instruction trail, including exception points and privilege transitions.
//!
//! # Tracing flow
//!
//! Retired instructions are fed one by one to an
//! [`Encoder`][encoder::Encoder] as [`Instr`][types::Instr] records. Each
//! step may produce a payload, which can be serialized into the PULP packet
//! stream format via [`packet::encoder`] and recovered via a
//! [`packet::decoder::Decoder`].
//!
//! A [`Tracer`][tracer::Tracer] processes payloads and appends reconstructed
//! [`Instr`][types::Instr] records to a caller-owned sequence. It is
//! constructed via a [`tracer::Builder`], which is configured with the traced
//! program (in the form of a [`Binary`][binary::Binary]) and the same
//! [`config::Parameters`] the encoder ran with.
//!
//! [`Binary`][binary::Binary] is a trait abstracting access to
//! [`Instruction`][instruction::Instruction]s. This library provides a number
//! of implementations, including one for static ELF files behind the `elf`
//! feature. The bundled instruction database covers the control-transfer set
//! of RV32/RV64 IC plus the PULP custom branches; instructions that do not
//! influence control flow need not be known to the tracer.
//!
//! # Crate features
//!
//! * `alloc` (default): the [`tracer`], the stream writer and the [`stimuli`]
//!   parsers, all of which need dynamic allocation
//! * `elf`: the [`binary::elf`] module backed by the [`elf`] crate
//! * `serde`: (de)serialization of [`config::Parameters`] via [`serde`]
//!
//! # no_std
//!
//! This crate does not depend on `std` and is thus suitable for `no_std`
//! environments.
//!
//! # Example
//!
//! The following round-trips a three-instruction trace through the codec.
//!
//! ```
//! use riscv_pulptrace::{binary, config, encoder, tracer, types};
//!
//! let params = config::Parameters::default();
//!
//! // jal ra, 0x100; addi a0, a0, 1; ret
//! let code = binary::from_sorted_map([
//!     (0x100, [0xef, 0x00, 0x00, 0x10]),
//!     (0x200, [0x13, 0x05, 0x15, 0x00]),
//!     (0x204, [0x67, 0x80, 0x00, 0x00]),
//! ]);
//!
//! let record = |iaddr, instr| types::Instr {
//!     valid: true,
//!     iaddr,
//!     instr,
//!     privilege: types::Privilege::MACHINE,
//!     ..Default::default()
//! };
//!
//! let mut enc = encoder::Encoder::new(params);
//! let mut packets = Vec::new();
//! for (iaddr, instr) in [(0x100, 0x100000ef), (0x200, 0x00150513), (0x204, 0x00008067)] {
//!     packets.extend(enc.step(record(iaddr, instr)).unwrap());
//! }
//! packets.extend(enc.finish().unwrap());
//!
//! let mut tracer: tracer::Tracer<_> = tracer::builder()
//!     .with_binary(code)
//!     .with_params(&params)
//!     .with_entry(0x100)
//!     .build();
//! let mut replayed = Vec::new();
//! for packet in &packets {
//!     tracer.process(packet, &mut replayed).unwrap();
//! }
//! let pcs: Vec<u64> = replayed.iter().map(|i| i.iaddr).collect();
//! assert_eq!(pcs, [0x100, 0x200, 0x204]);
//! ```
#![no_std]

#[cfg(feature = "alloc")]
extern crate alloc;
#[cfg(test)]
extern crate std;

pub mod binary;
pub mod config;
pub mod encoder;
pub mod instruction;
pub mod packet;
#[cfg(feature = "alloc")]
pub mod stimuli;
#[cfg(feature = "alloc")]
pub mod tracer;
pub mod types;
