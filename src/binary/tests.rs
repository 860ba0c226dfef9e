// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0

use super::{from_fn, from_segment, from_sorted_map, Binary, Error, Sections};

use crate::instruction::{Instruction, Kind};

// jal ra, +8; addi a0, a0, 1; ret
const CODE: [u8; 12] = [
    0xef, 0x00, 0x80, 0x00, 0x13, 0x05, 0x15, 0x00, 0x67, 0x80, 0x00, 0x00,
];

#[test]
fn segment_lookup() {
    let mut seg = from_segment(CODE, 0x8000_0000);
    assert!(seg.contains(0x8000_0000));
    assert!(seg.contains(0x8000_000b));
    assert!(!seg.contains(0x8000_000c));
    assert!(!seg.contains(0x7fff_ffff));

    let insn = seg.get_insn(0x8000_0000).unwrap();
    assert!(matches!(insn.kind, Some(Kind::jal(_))));
    let insn = seg.get_insn(0x8000_0008).unwrap();
    assert!(insn.kind.unwrap().is_return());

    assert_eq!(seg.get_insn(0x4000).unwrap_err(), Error::NoSection(0x4000));
}

#[test]
fn empty_segment_reported() {
    let mut seg = from_segment([], 0x1000);
    assert_eq!(seg.get_insn(0x1000).unwrap_err(), Error::EmptySection(0x1000));
}

#[test]
fn sections_switch_on_miss() {
    let mut sections = Sections::new([
        from_segment(CODE, 0x1000),
        from_segment(CODE, 0x8000_0000),
    ]);
    assert!(sections.get_insn(0x1000).is_ok());
    // leaving the resident section finds the other one
    assert!(sections.get_insn(0x8000_0004).is_ok());
    // and back
    assert!(sections.get_insn(0x1008).is_ok());
    assert_eq!(
        sections.get_insn(0x2000).unwrap_err(),
        Error::NoSection(0x2000),
    );
}

#[test]
fn sorted_map_lookup() {
    let mut map = from_sorted_map([
        (0x100, [0xef, 0x00, 0x00, 0x10]),
        (0x200, [0x13, 0x05, 0x15, 0x00]),
    ]);
    assert!(matches!(map.get_insn(0x100).unwrap().kind, Some(Kind::jal(_))));
    assert_eq!(map.get_insn(0x104).unwrap_err(), Error::NoSection(0x104));
}

#[test]
fn closure_binary() {
    let mut binary = from_fn(|addr| {
        Instruction::extract(&CODE[(addr - 0x100) as usize..])
            .map(|(i, _)| i)
            .ok_or(Error::NoInstruction(addr))
    });
    assert_eq!(binary.get_insn(0x104).unwrap().raw(), 0x0015_0513);
}
