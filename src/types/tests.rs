// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0

use super::addr::{differential, keep_bits, quantize_clz, sign_extendable_bits};
use super::branch::{branch_map_len, Map};
use super::stack::{ReturnStack, VecStack};
use super::Privilege;

use crate::config::Parameters;

#[test]
fn privilege_roundtrip() {
    for raw in 0..8 {
        assert_eq!(Privilege::new(raw).raw(), raw);
    }
    assert_eq!(Privilege::new(0b1011), Privilege::MACHINE);
}

#[test]
fn branch_map_invariants() {
    let mut map = Map::default();
    assert!(map.is_empty());
    for i in 0..31 {
        map.push_taken(i % 3 == 0);
        assert_eq!(map.count(), i + 1);
        // no bits beyond the count
        assert_eq!(map.raw_bits() >> map.count(), 0);
    }
    assert!(map.is_full());
    // saturated maps drop further outcomes
    map.push_taken(true);
    assert_eq!(map.count(), 31);
}

#[test]
fn branch_map_fifo_order() {
    let mut map = Map::default();
    let outcomes = [true, false, false, true, false];
    for taken in outcomes {
        map.push_taken(taken);
    }
    for taken in outcomes {
        assert_eq!(map.pop_taken(), Some(taken));
        assert_eq!(map.raw_bits() >> map.count(), 0);
    }
    assert_eq!(map.pop_taken(), None);
}

#[test]
fn branch_map_not_taken_sets_bit() {
    let mut map = Map::default();
    map.push_taken(false);
    assert_eq!(map.raw_bits(), 1);
    map.push_taken(true);
    assert_eq!(map.raw_bits(), 1);
    map.push_taken(false);
    assert_eq!(map.raw_bits(), 0b101);
}

#[test]
fn branch_map_retract() {
    let mut map = Map::default();
    map.push_taken(true);
    map.push_taken(false);
    map.retract();
    assert_eq!(map.count(), 1);
    assert_eq!(map.raw_bits(), 0);
    map.retract();
    assert!(map.is_empty());
    map.retract();
    assert!(map.is_empty());
}

#[test]
fn branch_map_flush_resets() {
    let mut map = Map::default();
    map.push_taken(false);
    map.push_taken(true);
    let old = map.flush();
    assert_eq!(old.count(), 2);
    assert_eq!(map, Map::default());
}

#[test]
fn branch_map_wire_full() {
    let map = Map::from_wire(0, 0x7fff_ffff);
    assert_eq!(map.count(), 31);
    assert!(map.is_full());
    assert_eq!(map.raw_bits(), 0x7fff_ffff);
    // stray bits above the count are discarded
    assert_eq!(Map::from_wire(3, 0xff).raw_bits(), 0b111);
}

#[test]
fn branch_map_len_ladder() {
    assert_eq!(branch_map_len(0), 31);
    assert_eq!(branch_map_len(1), 1);
    assert_eq!(branch_map_len(2), 9);
    assert_eq!(branch_map_len(9), 9);
    assert_eq!(branch_map_len(10), 17);
    assert_eq!(branch_map_len(17), 17);
    assert_eq!(branch_map_len(18), 25);
    assert_eq!(branch_map_len(25), 25);
    assert_eq!(branch_map_len(26), 31);
    assert_eq!(branch_map_len(31), 31);
}

#[test]
fn sign_extendable_boundaries() {
    for width in [32, 64] {
        assert_eq!(sign_extendable_bits(0, width), width);
        let ones = if width == 64 {
            u64::MAX
        } else {
            (1 << width) - 1
        };
        assert_eq!(sign_extendable_bits(ones, width), width);
    }
}

#[test]
fn sign_extendable_complement_symmetry() {
    for value in [0u64, 1, 0x8000, 0xdead_beef, 0xaade_adbe, 0x7fff_ffff] {
        let x = value & 0xffff_ffff;
        assert_eq!(
            sign_extendable_bits(x, 32),
            sign_extendable_bits(!x & 0xffff_ffff, 32),
        );
    }
}

#[test]
fn sign_extendable_counts() {
    assert_eq!(sign_extendable_bits(0xaade_adbe, 32), 1);
    assert_eq!(sign_extendable_bits(0xdead_beef, 32), 1);
    assert_eq!(sign_extendable_bits(0x0000_8000, 32), 16);
    assert_eq!(sign_extendable_bits(0xffff_8000, 32), 17);
    assert_eq!(sign_extendable_bits(1, 32), 31);
    assert_eq!(sign_extendable_bits(0xffff_ffff_ffff_8000, 64), 49);
}

#[test]
fn quantize_rungs() {
    assert_eq!(quantize_clz(0), 0);
    assert_eq!(quantize_clz(8), 0);
    assert_eq!(quantize_clz(9), 9);
    assert_eq!(quantize_clz(16), 9);
    assert_eq!(quantize_clz(17), 17);
    assert_eq!(quantize_clz(24), 17);
    assert_eq!(quantize_clz(25), 25);
    assert_eq!(quantize_clz(32), 25);
}

#[test]
fn differential_prefers_shorter_form() {
    let params = Parameters {
        full_address: false,
        ..Default::default()
    };
    // nearby addresses compress well differentially
    let chosen = differential(0x1c00_80a0, 0x1c00_809c, &params);
    assert!(chosen.differential);
    assert_eq!(chosen.value, 0x1c00_809cu64.wrapping_sub(0x1c00_80a0) & 0xffff_ffff);
    assert_eq!(chosen.keep, 32 - sign_extendable_bits(chosen.value, 32) + 1);

    // a tie prefers the absolute form
    let tied = differential(0x8000_0000, 0, &params);
    assert!(!tied.differential);
    assert_eq!(tied.value, 0x8000_0000);
}

#[test]
fn keep_bits_quantized() {
    let plain = Parameters {
        full_address: false,
        ..Default::default()
    };
    let pulp = Parameters {
        use_pulp_sext: true,
        ..plain
    };
    // 16 sign-extendable bits quantize down to the 9 rung
    assert_eq!(keep_bits(0x0000_8000, &plain), 17);
    assert_eq!(keep_bits(0x0000_8000, &pulp), 24);
}

#[test]
fn vec_stack_grows_on_demand() {
    let mut stack = VecStack::default();
    assert_eq!(stack.pop(), None);
    for addr in 0..100u64 {
        stack.push(addr);
    }
    assert_eq!(stack.depth(), 100);
    for addr in (0..100u64).rev() {
        assert_eq!(stack.pop(), Some(addr));
    }
    assert_eq!(stack.pop(), None);
}
