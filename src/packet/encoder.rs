// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Packet serialization
//!
//! Packets are packed little-endian, least-significant bit first within each
//! field, assembled with explicit shifts so the result never depends on host
//! endianness. Address fields are written in full; the
//! [`bit count`][Payload::bit_count] determines how many of those bits end up
//! in the stream, the remainder being recovered by the reader through sign
//! extension.

use super::error::Error;
use super::sync::Sync;
use super::{Payload, Trace};
use super::{BRANCHLEN, CAUSELEN, FORMATLEN, MSGTYPELEN, PRIVLEN, PULPPKTLEN, TIMELEN};
use super::{W_SOFTWARE, W_TIMER, W_TRACE};

use crate::config::Parameters;
use crate::types::branch::branch_map_len;

impl Payload {
    /// Serialize this payload in the PULP stream format
    ///
    /// Writes the packet into `buf`, starting `align` bits into the first
    /// byte; bits below the alignment are left untouched. Returns the
    /// payload's exact bit count. The serialized packet occupies
    /// `(align + count)` bits rounded up to whole bytes.
    pub fn write(&self, params: &Parameters, align: u8, buf: &mut [u8]) -> Result<u32, Error> {
        let bits = self.bit_count(params)?;
        let pktlen = bits.div_ceil(8) - 1;
        if pktlen >= 1 << PULPPKTLEN {
            return Err(Error::PayloadTooBig(bits));
        }

        let xlen = params.xlen();
        let mut writer = Writer::with_alignment(buf, align)?;
        writer.put(pktlen.into(), PULPPKTLEN)?;
        match self {
            Self::Trace(trace) => {
                writer.put(W_TRACE.into(), MSGTYPELEN)?;
                writer.put(trace.format().into(), FORMATLEN)?;
                match trace {
                    Trace::BranchFull { map, address: None } => {
                        writer.put(0, BRANCHLEN)?;
                        writer.put(map.raw_bits().into(), 31)?;
                    }
                    Trace::BranchFull {
                        map,
                        address: Some(address),
                    }
                    | Trace::BranchDiff { map, address } => {
                        writer.put(map.count().into(), BRANCHLEN)?;
                        writer.put(map.raw_bits().into(), branch_map_len(map.count()))?;
                        writer.put(address & params.address_mask(), xlen)?;
                    }
                    Trace::AddrOnly { address } => {
                        writer.put(address & params.address_mask(), xlen)?;
                    }
                    Trace::Sync(sync) => {
                        writer.put(sync.subformat().into(), FORMATLEN)?;
                        match sync {
                            Sync::Start(start) => {
                                writer.put(start.privilege.raw().into(), PRIVLEN)?;
                                writer.put(start.branch.into(), 1)?;
                                writer.put(start.address & params.address_mask(), xlen)?;
                            }
                            Sync::Exception(exc) => {
                                writer.put(exc.privilege.raw().into(), PRIVLEN)?;
                                writer.put(exc.branch.into(), 1)?;
                                writer.put(exc.address & params.address_mask(), xlen)?;
                                writer.put(exc.cause.into(), CAUSELEN)?;
                                writer.put(exc.interrupt.into(), 1)?;
                                // tval is not part of the current profile
                            }
                            // bit_count rejects context packets
                            Sync::Context(_) => unreachable!(),
                        }
                    }
                }
            }
            Self::Software { userdata } => {
                writer.put(W_SOFTWARE.into(), MSGTYPELEN)?;
                writer.put((*userdata).into(), xlen)?;
            }
            Self::Timer { time } => {
                writer.put(W_TIMER.into(), MSGTYPELEN)?;
                writer.put(*time, TIMELEN)?;
            }
        }
        Ok(bits)
    }

    /// Serialize this payload in the legacy packing
    ///
    /// The legacy packing carries no length nibble and always transmits full
    /// width addresses; it is the layout the hardware testbenches compare
    /// against. Only trace packets have a legacy form. Returns the exact bit
    /// count of the packed data.
    pub fn write_raw(&self, params: &Parameters, align: u8, buf: &mut [u8]) -> Result<u32, Error> {
        let Self::Trace(trace) = self else {
            return Err(Error::UnknownMsgType(match self {
                Self::Software { .. } => W_SOFTWARE,
                _ => W_TIMER,
            }));
        };

        let xlen = params.xlen();
        let mut writer = Writer::with_alignment(buf, align)?;
        writer.put(W_TRACE.into(), MSGTYPELEN)?;
        writer.put(trace.format().into(), FORMATLEN)?;
        match trace {
            Trace::BranchFull { map, address } => {
                writer.put(map.count().into(), BRANCHLEN)?;
                let map_len = branch_map_len(map.count());
                writer.put(map.raw_bits().into(), map_len)?;
                writer.put(address.unwrap_or(0) & params.address_mask(), xlen)?;
                Ok(MSGTYPELEN + FORMATLEN + BRANCHLEN + map_len + xlen)
            }
            Trace::BranchDiff { map, address } => {
                writer.put(map.count().into(), BRANCHLEN)?;
                let map_len = branch_map_len(map.count());
                writer.put(map.raw_bits().into(), map_len)?;
                writer.put(address & params.address_mask(), xlen)?;
                Ok(MSGTYPELEN + FORMATLEN + BRANCHLEN + map_len + xlen)
            }
            Trace::AddrOnly { address } => {
                writer.put(address & params.address_mask(), xlen)?;
                Ok(MSGTYPELEN + FORMATLEN + xlen)
            }
            Trace::Sync(sync) => {
                writer.put(sync.subformat().into(), FORMATLEN)?;
                let header = MSGTYPELEN + 2 * FORMATLEN + RAW_PRIVLEN;
                match sync {
                    Sync::Start(start) => {
                        writer.put(start.privilege.raw().into(), RAW_PRIVLEN)?;
                        writer.put(start.branch.into(), 1)?;
                        writer.put(start.address & params.address_mask(), xlen)?;
                        Ok(header + 1 + xlen)
                    }
                    Sync::Exception(exc) => {
                        writer.put(exc.privilege.raw().into(), RAW_PRIVLEN)?;
                        writer.put(exc.branch.into(), 1)?;
                        writer.put(exc.address & params.address_mask(), xlen)?;
                        writer.put(exc.cause.into(), CAUSELEN)?;
                        writer.put(exc.interrupt.into(), 1)?;
                        writer.put(exc.tval & params.address_mask(), xlen)?;
                        Ok(header + 1 + xlen + CAUSELEN + 1 + xlen)
                    }
                    Sync::Context(ctx) => {
                        writer.put(ctx.privilege.raw().into(), RAW_PRIVLEN)?;
                        Ok(header)
                    }
                }
            }
        }
    }
}

/// Privilege slot width in the legacy packing
const RAW_PRIVLEN: u32 = PRIVLEN + 2;

/// Serialize a payload as a stand-alone, byte-aligned packet
///
/// This is the form consumed by the [`Decoder`][super::decoder::Decoder].
#[cfg(feature = "alloc")]
pub fn write_single(
    payload: &Payload,
    params: &Parameters,
    out: &mut alloc::vec::Vec<u8>,
) -> Result<u32, Error> {
    let mut buf = [0u8; PACKET_BUF];
    let bits = payload.write(params, 0, &mut buf)?;
    out.extend_from_slice(&buf[..bits.div_ceil(8) as usize]);
    Ok(bits)
}

/// A bit-packing stream writer
///
/// Stitches consecutive packets together at the bit level: the fractional
/// byte of each packet is carried over into the next one. The stream is
/// completed by [`finish`][Self::finish], which emits a pending fractional
/// byte.
#[cfg(feature = "alloc")]
#[derive(Clone, Debug)]
pub struct Encoder {
    params: Parameters,
    align: u8,
    carry: u8,
}

#[cfg(feature = "alloc")]
impl Encoder {
    /// Create a new stream writer
    pub fn new(params: &Parameters) -> Self {
        Self {
            params: *params,
            align: 0,
            carry: 0,
        }
    }

    /// Append one packet to the stream
    ///
    /// Returns the packet's bit count. Nothing is appended on error.
    pub fn append(
        &mut self,
        payload: &Payload,
        out: &mut alloc::vec::Vec<u8>,
    ) -> Result<u32, Error> {
        let mut buf = [0u8; PACKET_BUF];
        let bits = payload.write(&self.params, self.align, &mut buf)?;

        buf[0] |= self.carry;
        let total = bits as usize + self.align as usize;
        let good = total / 8;
        let rest = (total % 8) as u8;
        out.extend_from_slice(&buf[..good]);
        self.carry = buf[good] & ((1u16 << rest) - 1) as u8;
        self.align = rest;
        Ok(bits)
    }

    /// Complete the stream, emitting a pending fractional byte
    pub fn finish(&mut self, out: &mut alloc::vec::Vec<u8>) {
        if self.align > 0 {
            out.push(self.carry);
            self.align = 0;
            self.carry = 0;
        }
    }
}

/// Scratch size covering the largest packet at any alignment
#[cfg(feature = "alloc")]
const PACKET_BUF: usize = 32;

/// A cursor writing little-endian bit fields into a byte buffer
pub(super) struct Writer<'b> {
    buf: &'b mut [u8],
    bit_pos: usize,
}

impl<'b> Writer<'b> {
    /// Create a writer starting `align` bits into the buffer
    pub(super) fn with_alignment(buf: &'b mut [u8], align: u8) -> Result<Self, Error> {
        if align >= 8 {
            return Err(Error::BadAlignment(align));
        }
        Ok(Self {
            buf,
            bit_pos: align.into(),
        })
    }

    /// Write an integer field of the given width
    ///
    /// Bits of `value` above `count` are ignored; bits of the buffer outside
    /// the written range are left untouched.
    pub(super) fn put(&mut self, value: u64, count: u32) -> Result<(), Error> {
        let mut value = if count >= 64 {
            value
        } else {
            value & ((1u64 << count) - 1)
        };
        let mut left = count as usize;
        while left > 0 {
            let byte = self.bit_pos >> 3;
            let bit = self.bit_pos & 0x7;
            let chunk = (8 - bit).min(left);
            let mask = (((1u16 << chunk) - 1) as u8) << bit;
            let slot = self.buf.get_mut(byte).ok_or(Error::BufferTooSmall)?;
            *slot = (*slot & !mask) | (((value as u8) << bit) & mask);
            value >>= chunk;
            left -= chunk;
            self.bit_pos += chunk;
        }
        Ok(())
    }
}
