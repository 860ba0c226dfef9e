// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Branch map utilities

/// A record of branches that are taken or not taken
///
/// The encoder accumulates the outcome of each conditional branch in a map of
/// up to [`MAX_BRANCHES`][Self::MAX_BRANCHES] bits until it is flushed into a
/// packet; the decoder consumes the bits of such a packet one branch at a
/// time. The lowest valued bit corresponds to the oldest branch. Set bits
/// represent branches not taken, unset bits represent taken branches.
#[derive(Copy, Clone, Default, Debug, Eq, PartialEq)]
pub struct Map {
    count: u8,
    bits: u32,
}

impl Map {
    /// Maximum number of branches a branch map can hold
    pub const MAX_BRANCHES: u8 = 31;

    /// Create a branch map from wire values
    ///
    /// A `branches` field of `0` denotes a full map without an address;
    /// the map then holds [`MAX_BRANCHES`][Self::MAX_BRANCHES] entries.
    pub fn from_wire(branches: u8, bits: u32) -> Self {
        let count = if branches == 0 {
            Self::MAX_BRANCHES
        } else {
            branches.min(Self::MAX_BRANCHES)
        };
        Self {
            count,
            bits: bits & mask(count),
        }
    }

    /// Record the outcome of a conditional branch
    ///
    /// A full map silently drops further outcomes; callers must flush before
    /// that happens.
    pub fn push_taken(&mut self, taken: bool) {
        if self.count >= Self::MAX_BRANCHES {
            return;
        }
        if !taken {
            self.bits |= 1 << self.count;
        }
        self.count += 1;
    }

    /// Remove the oldest branch outcome and return whether it was taken
    pub fn pop_taken(&mut self) -> Option<bool> {
        let count = self.count.checked_sub(1)?;
        let taken = self.bits & 1 == 0;
        self.bits >>= 1;
        self.count = count;
        Some(taken)
    }

    /// Remove the newest branch outcome
    ///
    /// Used when a sync packet reports the branch at its address through the
    /// dedicated `branch` bit, which supersedes the map entry.
    pub fn retract(&mut self) {
        if let Some(count) = self.count.checked_sub(1) {
            self.count = count;
            self.bits &= mask(count);
        }
    }

    /// Retrieve the number of branches in the map
    pub fn count(&self) -> u8 {
        self.count
    }

    /// Retrieve the raw contents of the map
    pub fn raw_bits(&self) -> u32 {
        self.bits
    }

    /// Check whether the map holds no branches
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Check whether the map is saturated
    pub fn is_full(&self) -> bool {
        self.count == Self::MAX_BRANCHES
    }

    /// Flush the map, returning its previous state
    pub fn flush(&mut self) -> Self {
        core::mem::take(self)
    }
}

/// Compute the serialized width of a branch map in bits
///
/// A `branches` field of `0` denotes a full map and occupies the full 31
/// bits; any other count is rounded up to the next rung of the
/// {1, 9, 17, 25, 31} ladder.
pub fn branch_map_len(branches: u8) -> u32 {
    match branches {
        0 => 31,
        1 => 1,
        2..=9 => 9,
        10..=17 => 17,
        18..=25 => 25,
        _ => 31,
    }
}

fn mask(count: u8) -> u32 {
    1u32.checked_shl(count.into())
        .map(|b| b - 1)
        .unwrap_or(u32::MAX)
}
