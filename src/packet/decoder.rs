// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Packet deserialization
//!
//! Packets in the PULP stream format start on byte boundaries with the
//! length nibble. The reader pulls `length × 8 + 8` bits and sign-extends
//! everything past the last transported bit, which transparently recovers
//! compressed address fields and compressed full branch maps.

use core::num::NonZeroUsize;

use super::error::Error;
use super::sync;
use super::{Payload, Trace};
use super::{BRANCHLEN, CAUSELEN, FORMATLEN, MSGTYPELEN, PRIVLEN, PULPPKTLEN, TIMELEN};
use super::{W_SOFTWARE, W_TIMER, W_TRACE};

use crate::config::Parameters;
use crate::types::branch::{branch_map_len, Map};
use crate::types::Privilege;

impl Payload {
    /// Deserialize a single payload from the beginning of the given data
    ///
    /// On success, returns the payload and the number of bytes consumed.
    /// Nothing is consumed on error.
    pub fn read(params: &Parameters, data: &[u8]) -> Result<(Self, usize), Error> {
        let header = *data
            .first()
            .ok_or(Error::InsufficientData(NonZeroUsize::MIN))?;
        let total = usize::from(header & 0x0f) + 1;
        if let Some(need) = NonZeroUsize::new(total.saturating_sub(data.len())) {
            return Err(Error::InsufficientData(need));
        }

        let xlen = params.xlen();
        let mask = params.address_mask();
        let mut reader = Reader::new(&data[..total]);
        reader.read_bits(PULPPKTLEN);

        let payload = match reader.read_bits(MSGTYPELEN) as u8 {
            W_TRACE => match reader.read_bits(FORMATLEN) {
                0 => {
                    let branches = reader.read_bits(BRANCHLEN) as u8;
                    let trace = if branches == 0 {
                        let bits = reader.read_bits(31) as u32;
                        Trace::BranchFull {
                            map: Map::from_wire(0, bits),
                            address: None,
                        }
                    } else {
                        let bits = reader.read_bits(branch_map_len(branches)) as u32;
                        Trace::BranchFull {
                            map: Map::from_wire(branches, bits),
                            address: Some(reader.read_bits(xlen) & mask),
                        }
                    };
                    trace.into()
                }
                1 => {
                    if params.full_address {
                        return Err(Error::BranchDiffWithFullAddress);
                    }
                    let branches = reader.read_bits(BRANCHLEN) as u8;
                    if branches == 0 {
                        return Err(Error::EmptyBranchMap);
                    }
                    let bits = reader.read_bits(branch_map_len(branches)) as u32;
                    Trace::BranchDiff {
                        map: Map::from_wire(branches, bits),
                        address: reader.read_bits(xlen) & mask,
                    }
                    .into()
                }
                2 => Trace::AddrOnly {
                    address: reader.read_bits(xlen) & mask,
                }
                .into(),
                _ => {
                    let subformat = reader.read_bits(FORMATLEN) as u8;
                    let privilege = Privilege::new(reader.read_bits(PRIVLEN) as u8);
                    match subformat {
                        2 => return Err(Error::ContextUnimplemented),
                        3 => return Err(Error::UnknownSubformat(subformat)),
                        _ => {}
                    }
                    let branch = reader.read_bit();
                    let address = reader.read_bits(xlen) & mask;
                    if subformat == 0 {
                        sync::Start {
                            privilege,
                            branch,
                            address,
                        }
                        .into()
                    } else {
                        sync::Exception {
                            privilege,
                            branch,
                            address,
                            cause: reader.read_bits(CAUSELEN) as u8,
                            interrupt: reader.read_bit(),
                            tval: 0,
                        }
                        .into()
                    }
                }
            },
            W_SOFTWARE => Payload::Software {
                userdata: (reader.read_bits(xlen) & mask) as u32,
            },
            W_TIMER => Payload::Timer {
                time: reader.read_bits(TIMELEN),
            },
            unknown => return Err(Error::UnknownMsgType(unknown)),
        };
        Ok((payload, total))
    }
}

/// A decoder for a stream of byte-aligned packets
///
/// Packets are decoded front to back; [`bytes_left`][Self::bytes_left]
/// reports the undecoded remainder. The decoder also implements
/// [`Iterator`].
#[derive(Clone)]
pub struct Decoder<'d> {
    params: Parameters,
    data: &'d [u8],
}

impl<'d> Decoder<'d> {
    /// Create a decoder over the given stream data
    pub fn new(params: &Parameters, data: &'d [u8]) -> Self {
        Self {
            params: *params,
            data,
        }
    }

    /// Retrieve the number of bytes left in this decoder's data
    pub fn bytes_left(&self) -> usize {
        self.data.len()
    }

    /// Decode the next packet, if any data is left
    ///
    /// A failure leaves the decoder at the offending packet.
    pub fn next_payload(&mut self) -> Result<Option<Payload>, Error> {
        if self.data.is_empty() {
            return Ok(None);
        }
        let (payload, consumed) = Payload::read(&self.params, self.data)?;
        self.data = &self.data[consumed..];
        Ok(Some(payload))
    }
}

impl Iterator for Decoder<'_> {
    type Item = Result<Payload, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_payload().transpose()
    }
}

/// A cursor reading little-endian bit fields from a byte buffer
///
/// Reads past the end of the buffer yield the sign extension of the last
/// byte's most significant bit.
pub(super) struct Reader<'d> {
    data: &'d [u8],
    bit_pos: usize,
}

impl<'d> Reader<'d> {
    pub(super) fn new(data: &'d [u8]) -> Self {
        Self { data, bit_pos: 0 }
    }

    /// Read an integer field of the given width
    pub(super) fn read_bits(&mut self, count: u32) -> u64 {
        let mut out = 0u64;
        let mut got = 0usize;
        while got < count as usize {
            let byte = self.bit_pos >> 3;
            let bit = self.bit_pos & 0x7;
            let chunk = (8 - bit).min(count as usize - got);
            let bits = (self.get_byte(byte) >> bit) as u64 & ((1u64 << chunk) - 1);
            out |= bits << got;
            got += chunk;
            self.bit_pos += chunk;
        }
        out
    }

    /// Read a single bit
    pub(super) fn read_bit(&mut self) -> bool {
        self.read_bits(1) != 0
    }

    /// Get the byte at the given byte position
    ///
    /// Past the end of the data, the result of sign-extending the last byte
    /// is returned.
    fn get_byte(&self, pos: usize) -> u8 {
        if let Some(byte) = self.data.get(pos) {
            *byte
        } else if self.data.last().map(|b| b & 0x80 != 0).unwrap_or(false) {
            0xff
        } else {
            0x00
        }
    }
}
