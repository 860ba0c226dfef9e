// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Compression statistics

/// Statistics gathered while encoding
///
/// Updated on every packet emission and never rolled back, also not when a
/// later step fails.
#[derive(Copy, Clone, Debug)]
pub struct Stats {
    /// Instructions fed through the decision logic
    pub instrs: u64,
    /// Packets emitted
    pub packets: u64,
    /// Exact payload bits over all packets, excluding the length nibbles
    pub payload_bits: u64,
    /// Bits the packets occupy in the byte-aligned PULP stream
    pub pulp_bits: u64,
    /// Sync start packets
    pub start_packets: u64,
    /// Sync exception packets
    pub exception_packets: u64,
    /// Lone address packets
    pub addr_only_packets: u64,
    /// Branch packets with an absolute address
    pub branch_full_packets: u64,
    /// Branch packets with a differential address
    pub branch_diff_packets: u64,
    /// Full branch maps without an address
    pub full_map_packets: u64,
    /// Emitted address fields equal to zero
    pub zero_addresses: u64,
    /// Emitted address fields with all bits set
    pub ones_addresses: u64,
    /// Histogram over the sign-extendable bit count of emitted addresses
    ///
    /// Bucket `n` counts addresses with `n + 1` sign-extendable bits.
    pub sext_bits: [u64; 64],
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            instrs: 0,
            packets: 0,
            payload_bits: 0,
            pulp_bits: 0,
            start_packets: 0,
            exception_packets: 0,
            addr_only_packets: 0,
            branch_full_packets: 0,
            branch_diff_packets: 0,
            full_map_packets: 0,
            zero_addresses: 0,
            ones_addresses: 0,
            sext_bits: [0; 64],
        }
    }
}
