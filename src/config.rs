// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Codec configuration

/// Codec configuration
///
/// A configuration selects the address width and the optional protocol
/// features of the trace stream. Encoder and decoder must run with identical
/// parameters; mismatches surface as [`bad
/// config`][crate::packet::Error::BranchDiffWithFullAddress] errors or as
/// diverging replay. There are no hidden defaults, see [`PARAMETERS`] for the
/// value [`Default`] resolves to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Parameters {
    /// Trace a 64 bit core, widening all address fields to 64 bit
    pub arch64: bool,
    /// Always emit absolute addresses, disabling differential packets
    pub full_address: bool,
    /// Quantize compressed address widths down to byte boundaries
    pub use_pulp_sext: bool,
    /// Treat `ret`/`c.ret` as predictable via a return-address stack
    pub implicit_ret: bool,
    /// Emit an extra sync packet after an exception sync, bridging the
    /// vector-table jump
    pub pulp_vector_table_packet: bool,
    /// Drop sign-extendable high bits from the full-branch-map encoding
    pub compress_full_branch_map: bool,
    /// Force a resynchronisation packet at least every N instructions
    ///
    /// [`u64::MAX`] disables periodic resynchronisation.
    pub resync_max: u64,
}

impl Parameters {
    /// Retrieve the configured address width in bits
    pub const fn xlen(&self) -> u32 {
        if self.arch64 {
            64
        } else {
            32
        }
    }

    /// Retrieve the mask covering all valid address bits
    pub const fn address_mask(&self) -> u64 {
        if self.arch64 {
            u64::MAX
        } else {
            u32::MAX as u64
        }
    }
}

/// See [PARAMETERS] for default values of individual fields
impl Default for Parameters {
    fn default() -> Self {
        PARAMETERS
    }
}

/// Default [Parameters]
pub const PARAMETERS: Parameters = Parameters {
    arch64: false,
    full_address: true,
    use_pulp_sext: false,
    implicit_ret: false,
    pulp_vector_table_packet: false,
    compress_full_branch_map: false,
    resync_max: u64::MAX,
};
