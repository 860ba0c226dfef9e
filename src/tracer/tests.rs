// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0

use std::vec::Vec;

use super::{builder, Error, Tracer};

use crate::binary::{self, Segment};
use crate::config::Parameters;
use crate::packet::{sync, Payload, Trace};
use crate::types::branch::Map;
use crate::types::{Instr, Privilege};

// 0x1000: addi a0, a0, 1
// 0x1004: bne a0, zero, -4
// 0x1008: addi a0, a0, 1
// 0x100c: jalr zero, a0, 0
const LOOP: [u8; 16] = [
    0x13, 0x05, 0x15, 0x00, 0xe3, 0x1e, 0x05, 0xfe, 0x13, 0x05, 0x15, 0x00, 0x67, 0x00, 0x05,
    0x00,
];

// 0x100: jal ra, +0x100
// 0x104: addi a0, a0, 1
const CALLER: [u8; 8] = [0xef, 0x00, 0x00, 0x10, 0x13, 0x05, 0x15, 0x00];

// 0x200: addi a0, a0, 1
// 0x204: ret
const CALLEE: [u8; 8] = [0x13, 0x05, 0x15, 0x00, 0x67, 0x80, 0x00, 0x00];

fn loop_tracer(params: &Parameters) -> Tracer<Segment<[u8; 16]>> {
    builder()
        .with_binary(binary::from_segment(LOOP, 0x1000))
        .with_params(params)
        .with_entry(0x1000)
        .build()
}

fn start(address: u64) -> Payload {
    sync::Start {
        privilege: Privilege::MACHINE,
        branch: false,
        address,
    }
    .into()
}

fn pcs(out: &[Instr]) -> Vec<u64> {
    out.iter().map(|i| i.iaddr).collect()
}

#[test]
fn sync_start_replays_one_instruction() {
    let mut tracer = loop_tracer(&Default::default());
    let mut out = Vec::new();
    tracer.process(&start(0x1000), &mut out).unwrap();
    assert_eq!(pcs(&out), [0x1000]);
    assert_eq!(tracer.pc(), 0x1004);
    assert_eq!(tracer.privilege(), Privilege::MACHINE);
    assert!(out[0].valid);
    assert_eq!(out[0].instr, 0x0015_0513);
    assert!(!out[0].compressed);
}

#[test]
fn sync_at_taken_branch_follows_target() {
    let mut tracer = loop_tracer(&Default::default());
    let mut out = Vec::new();
    tracer
        .process(
            &sync::Start {
                privilege: Privilege::MACHINE,
                branch: false,
                address: 0x1004,
            }
            .into(),
            &mut out,
        )
        .unwrap();
    assert_eq!(tracer.pc(), 0x1000);

    // a set branch bit means not taken
    tracer
        .process(
            &sync::Start {
                privilege: Privilege::MACHINE,
                branch: true,
                address: 0x1004,
            }
            .into(),
            &mut out,
        )
        .unwrap();
    assert_eq!(tracer.pc(), 0x1008);
}

#[test]
fn branch_walk_consumes_outcomes() {
    let mut tracer = loop_tracer(&Default::default());
    let mut out = Vec::new();
    tracer.process(&start(0x1000), &mut out).unwrap();

    // taken, then not taken, address points past the loop
    let mut map = Map::default();
    map.push_taken(true);
    map.push_taken(false);
    tracer
        .process(
            &Trace::BranchFull {
                map,
                address: Some(0x1008),
            }
            .into(),
            &mut out,
        )
        .unwrap();
    assert_eq!(
        pcs(&out),
        [0x1000, 0x1004, 0x1000, 0x1004, 0x1008],
    );
    assert_eq!(tracer.pc(), 0x100c);
}

#[test]
fn branch_walk_ends_at_discontinuity() {
    let mut tracer = loop_tracer(&Default::default());
    let mut out = Vec::new();
    tracer.process(&start(0x1000), &mut out).unwrap();

    let mut map = Map::default();
    map.push_taken(false);
    tracer
        .process(
            &Trace::BranchFull {
                map,
                address: Some(0x2000),
            }
            .into(),
            &mut out,
        )
        .unwrap();
    // not taken at 0x1004, then the jalr at 0x100c jumps to the reported
    // address, whose instruction belongs to the next packet
    assert_eq!(pcs(&out), [0x1000, 0x1004, 0x1008, 0x100c]);
    assert_eq!(tracer.pc(), 0x2000);
}

#[test]
fn full_map_without_address_drains() {
    let mut tracer = loop_tracer(&Default::default());
    let mut out = Vec::new();
    tracer.process(&start(0x1000), &mut out).unwrap();

    // 31 taken branches around the loop
    tracer
        .process(
            &Trace::BranchFull {
                map: Map::from_wire(0, 0),
                address: None,
            }
            .into(),
            &mut out,
        )
        .unwrap();
    // 31 branch visits interleaved with 30 loop bodies, plus the initial addi
    assert_eq!(out.len(), 1 + 61);
    assert_eq!(tracer.pc(), 0x1000);
}

#[test]
fn addr_only_stops_at_address() {
    let params = Parameters::default();
    let mut tracer: Tracer<_> = builder()
        .with_binary(binary::Sections::new([
            binary::from_segment(CALLER, 0x100),
            binary::from_segment(CALLEE, 0x200),
        ]))
        .with_params(&params)
        .with_entry(0x100)
        .build();
    let mut out = Vec::new();
    tracer.process(&start(0x100), &mut out).unwrap();
    // the jal was followed statically; replay the callee up to the ret.
    // Without implicit returns the reported address resolves the ret, and
    // the instruction there belongs to the next packet.
    tracer
        .process(&Trace::AddrOnly { address: 0x104 }.into(), &mut out)
        .unwrap();
    assert_eq!(pcs(&out), [0x100, 0x200, 0x204]);
    assert_eq!(tracer.pc(), 0x104);
}

#[test]
fn addr_only_rejects_branches() {
    let mut tracer = loop_tracer(&Default::default());
    let mut out = Vec::new();
    tracer.process(&start(0x1000), &mut out).unwrap();
    assert_eq!(
        tracer.process(&Trace::AddrOnly { address: 0x1008 }.into(), &mut out),
        Err(Error::UnexpectedBranch(0x1004)),
    );
}

#[test]
fn implicit_ret_resolves_returns() {
    let params = Parameters {
        implicit_ret: true,
        ..Default::default()
    };
    let mut tracer: Tracer<_> = builder()
        .with_binary(binary::Sections::new([
            binary::from_segment(CALLER, 0x100),
            binary::from_segment(CALLEE, 0x200),
        ]))
        .with_params(&params)
        .with_entry(0x100)
        .build();
    let mut out = Vec::new();
    // the jal pushes the return address
    tracer.process(&start(0x100), &mut out).unwrap();
    // the ret pops it; the walk continues to the reported address behind it
    tracer
        .process(&Trace::AddrOnly { address: 0x104 }.into(), &mut out)
        .unwrap();
    assert_eq!(pcs(&out), [0x100, 0x200, 0x204, 0x104]);
}

#[test]
fn pop_from_empty_stack_is_fatal() {
    let params = Parameters {
        implicit_ret: true,
        ..Default::default()
    };
    let mut tracer: Tracer<_> = builder()
        .with_binary(binary::from_segment(CALLEE, 0x200))
        .with_params(&params)
        .with_entry(0x200)
        .build();
    let mut out = Vec::new();
    tracer.process(&start(0x200), &mut out).unwrap();
    assert_eq!(
        tracer.process(&Trace::AddrOnly { address: 0x300 }.into(), &mut out),
        Err(Error::EmptyReturnStack(0x204)),
    );
}

#[test]
fn differential_addresses_resolve_against_last() {
    let params = Parameters {
        full_address: false,
        ..Default::default()
    };
    let mut tracer = loop_tracer(&params);
    let mut out = Vec::new();
    tracer.process(&start(0x1000), &mut out).unwrap();

    // reported address 0x1008 as difference 0x1000 - 0x1008
    let mut map = Map::default();
    map.push_taken(false);
    tracer
        .process(
            &Trace::BranchDiff {
                map,
                address: 0x1000u64.wrapping_sub(0x1008) & 0xffff_ffff,
            }
            .into(),
            &mut out,
        )
        .unwrap();
    assert_eq!(pcs(&out), [0x1000, 0x1004, 0x1008]);
}

#[test]
fn branch_diff_requires_differential_config() {
    let mut tracer = loop_tracer(&Default::default());
    let mut out = Vec::new();
    assert_eq!(
        tracer.process(
            &Trace::BranchDiff {
                map: Map::from_wire(1, 0),
                address: 0x8,
            }
            .into(),
            &mut out,
        ),
        Err(Error::BranchDiffWithFullAddress),
    );
}

#[test]
fn informational_payloads_are_skipped() {
    let mut tracer = loop_tracer(&Default::default());
    let mut out = Vec::new();
    tracer
        .process(&Payload::Software { userdata: 42 }, &mut out)
        .unwrap();
    tracer.process(&Payload::Timer { time: 1234 }, &mut out).unwrap();
    assert!(out.is_empty());
}

#[test]
fn context_packets_are_reserved() {
    let mut tracer = loop_tracer(&Default::default());
    let mut out = Vec::new();
    assert_eq!(
        tracer.process(
            &Payload::from(sync::Context {
                privilege: Privilege::MACHINE,
            }),
            &mut out,
        ),
        Err(Error::ContextUnimplemented),
    );
}

#[test]
fn leaving_all_sections_is_fatal() {
    let mut tracer = loop_tracer(&Default::default());
    let mut out = Vec::new();
    assert_eq!(
        tracer.process(&start(0x8000), &mut out),
        Err(Error::CannotGetInstruction(
            binary::Error::NoSection(0x8000),
            0x8000,
        )),
    );
}
