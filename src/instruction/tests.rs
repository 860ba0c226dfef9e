// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0

use super::format::{TypeB, TypeI, TypeJ, TypeR};
use super::{Bits, Instruction, Kind, RasKind};

#[test]
fn extract_lengths() {
    // c.nop followed by addi a0, a0, 1
    let data = [0x01, 0x00, 0x13, 0x05, 0x15, 0x00];
    let (insn, rest) = Instruction::extract(&data).unwrap();
    assert_eq!(insn.size(), 2);
    assert!(insn.is_compressed());
    let (insn, rest) = Instruction::extract(rest).unwrap();
    assert_eq!(insn.size(), 4);
    assert_eq!(insn.raw(), 0x0015_0513);
    assert!(rest.is_empty());
    // truncated 32 bit instruction
    assert_eq!(Instruction::extract(&[0x13, 0x05]), None);
}

#[test]
fn decode_branches() {
    // beq a0, a1, +16
    let beq = Kind::decode_32(0x00b5_0863).unwrap();
    assert_eq!(beq, Kind::beq(TypeB { rs1: 10, rs2: 11, imm: 16 }));
    assert!(beq.is_branch());
    assert_eq!(beq.branch_target(), Some(16));

    // bne a0, zero, -4
    let bne = Kind::decode_32(0xfe05_1ee3).unwrap();
    assert_eq!(bne.branch_target(), Some(-4));

    // bltu a1, a2, -8
    let bltu = Kind::decode_32(0xfec5_ece3).unwrap();
    assert_eq!(bltu, Kind::bltu(TypeB { rs1: 11, rs2: 12, imm: -8 }));

    // c.beqz a0, +6
    let cbeqz = Kind::decode_16(0xc119).unwrap();
    assert_eq!(cbeqz, Kind::c_beqz(TypeB { rs1: 10, rs2: 0, imm: 6 }));

    // c.bnez a0, -6
    let cbnez = Kind::decode_16(0xfd6d).unwrap();
    assert_eq!(cbnez.branch_target(), Some(-6));
}

#[test]
fn decode_pulp_branches() {
    // p.beqimm a0, 3, +8: B layout, funct3 010, rs2 carries the operand
    let word = (3 << 20) | (10 << 15) | (0b010 << 12) | (8 << 7) | 0x63;
    let beqimm = Kind::decode_32(word).unwrap();
    assert_eq!(beqimm, Kind::p_beqimm(TypeB { rs1: 10, rs2: 3, imm: 8 }));
    assert!(beqimm.is_branch());

    let word = (3 << 20) | (10 << 15) | (0b011 << 12) | (8 << 7) | 0x63;
    assert!(Kind::decode_32(word).unwrap().is_branch());
}

#[test]
fn decode_jumps() {
    // jal ra, +0x100
    let jal = Kind::decode_32(0x1000_00ef).unwrap();
    assert_eq!(jal, Kind::jal(TypeJ { rd: 1, imm: 0x100 }));
    assert_eq!(jal.inferable_jump_target(), Some(0x100));
    assert!(!jal.is_unpredictable(false));

    // jal zero, -16
    let j = Kind::decode_32(0xff1f_f06f).unwrap();
    assert_eq!(j, Kind::jal(TypeJ { rd: 0, imm: -16 }));

    // c.j -4
    let cj = Kind::decode_16(0xbff5).unwrap();
    assert_eq!(cj.inferable_jump_target(), Some(-4));

    // c.jal +32
    let cjal = Kind::decode_16(0x2005).unwrap();
    assert_eq!(cjal, Kind::c_jal(TypeJ { rd: 0, imm: 32 }));
}

#[test]
fn decode_indirect_jumps() {
    // jalr ra, a0, 0
    let jalr = Kind::decode_32(0x0005_00e7).unwrap();
    assert_eq!(jalr, Kind::jalr(TypeI { rd: 1, rs1: 10, imm: 0 }));
    assert!(jalr.is_indirect_jump());
    assert!(jalr.is_unpredictable(true));
    assert_eq!(jalr.inferable_jump_target(), None);

    // ret
    let ret = Kind::decode_32(0x0000_8067).unwrap();
    assert!(ret.is_return());
    assert!(ret.is_unpredictable(false));
    assert!(!ret.is_unpredictable(true));

    // c.jr ra
    let cret = Kind::decode_16(0x8082).unwrap();
    assert_eq!(cret, Kind::c_jr(TypeR { rs1: 1, rs2: 0 }));
    assert!(cret.is_return());
    assert!(!cret.is_unpredictable(true));

    // c.jalr a0
    let cjalr = Kind::decode_16(0x9502).unwrap();
    assert_eq!(cjalr, Kind::c_jalr(TypeR { rs1: 10, rs2: 0 }));
    assert!(cjalr.is_unpredictable(true));
}

#[test]
fn decode_trap_returns() {
    assert_eq!(Kind::decode_32(0x3020_0073), Some(Kind::mret));
    assert_eq!(Kind::decode_32(0x1020_0073), Some(Kind::sret));
    assert_eq!(Kind::decode_32(0x0020_0073), Some(Kind::uret));
    assert!(Kind::mret.is_unpredictable(true));
    assert_eq!(Kind::mret.ras_kind(), RasKind::None);
}

#[test]
fn ras_classification() {
    // jal ra, ... pushes
    assert_eq!(Kind::decode_32(0x1000_00ef).unwrap().ras_kind(), RasKind::Call);
    // jal zero, ... does not
    assert_eq!(Kind::decode_32(0xff1f_f06f).unwrap().ras_kind(), RasKind::None);
    // jalr ra, a0 pushes
    assert_eq!(Kind::decode_32(0x0005_00e7).unwrap().ras_kind(), RasKind::Call);
    // ret pops
    assert_eq!(Kind::decode_32(0x0000_8067).unwrap().ras_kind(), RasKind::Return);
    assert_eq!(Kind::decode_16(0x8082).unwrap().ras_kind(), RasKind::Return);
    // jalr ra, ra pops then pushes
    assert_eq!(Kind::decode_32(0x0000_80e7).unwrap().ras_kind(), RasKind::CoRet);
    // c.jalr ra pops then pushes
    assert_eq!(Kind::decode_16(0x9082).unwrap().ras_kind(), RasKind::CoRet);
    // c.jalr a0 pushes
    assert_eq!(Kind::decode_16(0x9502).unwrap().ras_kind(), RasKind::Call);
}

#[test]
fn hardware_loops_unsupported() {
    // opcode 0x7b, funct3 ladder
    for (funct3, kind) in [
        (0b000, Kind::lp_starti),
        (0b001, Kind::lp_endi),
        (0b010, Kind::lp_count),
        (0b011, Kind::lp_counti),
        (0b100, Kind::lp_setup),
        (0b101, Kind::lp_setupi),
    ] {
        let word = (funct3 << 12) | 0x7b;
        let decoded = Kind::decode_32(word).unwrap();
        assert_eq!(decoded, kind);
        assert!(decoded.is_unsupported());
    }
}

#[test]
fn unknown_words_are_anonymous() {
    // addi a0, a0, 1 is not a control transfer
    let insn = Instruction::from(Bits::Bit32(0x0015_0513));
    assert_eq!(insn.kind, None);
    assert_eq!(insn.size(), 4);
    // c.addi a0, 1
    let insn = Instruction::from(Bits::Bit16(0x0505));
    assert_eq!(insn.kind, None);
    assert_eq!(insn.size(), 2);
}
