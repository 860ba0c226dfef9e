// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Address compression utilities
//!
//! Addresses dominate packet payloads. Instead of transmitting all `XLEN`
//! bits, the codec drops leading bits equal to the sign bit and lets the
//! receiving end recover them through sign extension. For differential
//! packets, the encoder picks whichever of the absolute address and the
//! difference to the last transmitted address compresses better.

use crate::config::Parameters;

/// Count the leading bits of `value` equal to its sign bit
///
/// The count is taken at the given `width`; bits above it are ignored. Both
/// `0` and the all-ones value yield `width`.
pub fn sign_extendable_bits(value: u64, width: u32) -> u32 {
    debug_assert!((1..=64).contains(&width));
    let aligned = value << (64 - width);
    let leading = if aligned >> 63 == 0 {
        aligned.leading_zeros()
    } else {
        (!aligned).leading_zeros()
    };
    leading.min(width)
}

/// Quantize a leading-bit count down to a byte boundary
///
/// Used under [`use_pulp_sext`][Parameters::use_pulp_sext] so that
/// compressed address fields keep packet payloads byte-aligned.
pub fn quantize_clz(count: u32) -> u32 {
    match count {
        0..=8 => 0,
        9..=16 => 9,
        17..=24 => 17,
        _ => 25,
    }
}

/// A compressed address field
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Compressed {
    /// The value to transmit
    pub value: u64,
    /// The number of low bits that must be serialized
    pub keep: u32,
    /// The value is the difference to the last transmitted address
    pub differential: bool,
}

/// Compute the number of address bits to serialize
///
/// Returns `width − lead + 1` so that the topmost transmitted bit always
/// duplicates the sign, with `lead` quantized under
/// [`use_pulp_sext`][Parameters::use_pulp_sext].
pub fn keep_bits(value: u64, params: &Parameters) -> u32 {
    let mut lead = sign_extendable_bits(value, params.xlen());
    if params.use_pulp_sext {
        lead = quantize_clz(lead);
    }
    params.xlen() - lead + 1
}

/// Choose between the absolute and the differential address form
///
/// Picks whichever of `full` and `last − full` has more sign-extendable
/// bits; a tie prefers the absolute form.
pub fn differential(full: u64, last: u64, params: &Parameters) -> Compressed {
    let width = params.xlen();
    let diff = last.wrapping_sub(full) & params.address_mask();
    let use_diff = sign_extendable_bits(diff, width) > sign_extendable_bits(full, width);
    let value = if use_diff { diff } else { full };
    Compressed {
        value,
        keep: keep_bits(value, params),
        differential: use_diff,
    }
}
