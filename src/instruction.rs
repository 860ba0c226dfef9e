// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Instruction database
//!
//! The codec only needs to understand instructions that influence control
//! flow: conditional branches (including the PULP immediate branches),
//! jumps, trap returns and the unsupported hardware-loop setup forms. All
//! other instructions pass through as anonymous words of known length.

pub mod format;

#[cfg(test)]
mod tests;

/// The bits from which instructions can be disassembled.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Bits {
    Bit32(u32),
    Bit16(u16),
}

impl Bits {
    /// Extract [Bits] from a raw byte slice
    ///
    /// Try to extract [Bits] from the beginning of the given slice, honoring
    /// the Base Instruction-Length Encoding specified in Section 1.5 of The
    /// RISC-V Instruction Set Manual Volume I.
    ///
    /// Returns a tuple containing the [Bits] and the remaining part of the
    /// slice if successful. Returns `None` if the beginning does not appear to
    /// be either a 16 or 32 bit instruction, or if the slice does not contain
    /// enough bytes.
    pub fn extract(data: &[u8]) -> Option<(Self, &[u8])> {
        match data {
            [a, b, r @ ..] if a & 0b11 != 0b11 => {
                Some((Self::Bit16(u16::from_le_bytes([*a, *b])), r))
            }
            [a, b, c, d, r @ ..] if a & 0b11100 != 0b11100 => {
                Some((Self::Bit32(u32::from_le_bytes([*a, *b, *c, *d])), r))
            }
            _ => None,
        }
    }

    /// Retrieve the raw instruction word, zero-extended
    pub fn raw(self) -> u32 {
        match self {
            Self::Bit32(bits) => bits,
            Self::Bit16(bits) => bits.into(),
        }
    }
}

/// Return-address-stack effect of an instruction
///
/// Calls push the address of the following instruction, returns pop the
/// predicted target, call-and-returns (a linking jump through the link
/// register) pop and then push.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RasKind {
    None,
    Call,
    Return,
    CoRet,
}

/// The control flow changing instructions the codec needs to know
#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Kind {
    // B
    beq(format::TypeB),
    bne(format::TypeB),
    blt(format::TypeB),
    bge(format::TypeB),
    bltu(format::TypeB),
    bgeu(format::TypeB),
    // PULP immediate branches, B layout with rs2 acting as the operand
    p_beqimm(format::TypeB),
    p_bneimm(format::TypeB),
    // CB
    c_beqz(format::TypeB),
    c_bnez(format::TypeB),
    // J
    jal(format::TypeJ),
    // CJ
    c_j(format::TypeJ),
    c_jal(format::TypeJ),
    // I
    jalr(format::TypeI),
    // CR
    c_jr(format::TypeR),
    c_jalr(format::TypeR),
    // SYS
    mret,
    sret,
    uret,
    // PULP hardware loops, rejected by the encoder
    lp_starti,
    lp_endi,
    lp_count,
    lp_counti,
    lp_setup,
    lp_setupi,
}

impl Kind {
    /// Determine whether this is a conditional branch
    pub fn is_branch(self) -> bool {
        self.branch_target().is_some()
    }

    /// Determine the branch target
    ///
    /// If [Self] refers to a conditional branch, this fn returns the
    /// immediate, which is the branch target relative to this instruction.
    /// Jump instructions are not considered branch instructions.
    pub fn branch_target(self) -> Option<i16> {
        match self {
            Self::beq(d) => Some(d.imm),
            Self::bne(d) => Some(d.imm),
            Self::blt(d) => Some(d.imm),
            Self::bge(d) => Some(d.imm),
            Self::bltu(d) => Some(d.imm),
            Self::bgeu(d) => Some(d.imm),
            Self::p_beqimm(d) => Some(d.imm),
            Self::p_bneimm(d) => Some(d.imm),
            Self::c_beqz(d) => Some(d.imm),
            Self::c_bnez(d) => Some(d.imm),
            _ => None,
        }
    }

    /// Determine the inferable jump target
    ///
    /// If [Self] refers to a jump instruction whose target is encoded in the
    /// instruction itself, this fn returns that target relative to this
    /// instruction. All register-indirect jumps are considered uninferable,
    /// as the hardware encoder treats them.
    pub fn inferable_jump_target(self) -> Option<i32> {
        match self {
            Self::jal(d) => Some(d.imm),
            Self::c_jal(d) => Some(d.imm),
            Self::c_j(d) => Some(d.imm),
            _ => None,
        }
    }

    /// Determine whether this instruction is a register-indirect jump
    pub fn is_indirect_jump(self) -> bool {
        matches!(self, Self::jalr(_) | Self::c_jr(_) | Self::c_jalr(_))
    }

    /// Determine whether this instruction returns from a trap
    pub fn is_return_from_trap(self) -> bool {
        matches!(self, Self::mret | Self::sret | Self::uret)
    }

    /// Determine whether this instruction is a function return
    ///
    /// Returns true for `ret` and `c.ret`, that is a non-linking jump through
    /// the return address register.
    pub fn is_return(self) -> bool {
        matches!(
            self,
            Self::jalr(format::TypeI { rd: 0, rs1: 1, .. }) | Self::c_jr(format::TypeR { rs1: 1, .. })
        )
    }

    /// Determine whether this instruction causes an unpredictable discontinuity
    ///
    /// Returns true if the instruction's successor cannot be derived from the
    /// instruction bytes: register-indirect jumps and trap returns. Under
    /// `implicit_ret`, `ret`/`c.ret` are excluded since a return-address
    /// stack predicts their targets.
    pub fn is_unpredictable(self, implicit_ret: bool) -> bool {
        if implicit_ret && self.is_return() {
            return false;
        }
        self.is_indirect_jump() || self.is_return_from_trap()
    }

    /// Determine this instruction's effect on the return-address stack
    pub fn ras_kind(self) -> RasKind {
        match self {
            Self::jalr(format::TypeI { rd: 1, rs1: 1, .. }) => RasKind::CoRet,
            Self::c_jalr(format::TypeR { rs1: 1, .. }) => RasKind::CoRet,
            _ if self.is_return() => RasKind::Return,
            Self::jal(format::TypeJ { rd: 1, .. }) => RasKind::Call,
            Self::jalr(format::TypeI { rd: 1, .. }) => RasKind::Call,
            Self::c_jal(_) => RasKind::Call,
            Self::c_jalr(_) => RasKind::Call,
            _ => RasKind::None,
        }
    }

    /// Determine whether this instruction cannot be traced
    ///
    /// The hardware-loop setup instructions have no representation in the
    /// packet stream; the encoder aborts when it encounters one.
    pub fn is_unsupported(self) -> bool {
        matches!(
            self,
            Self::lp_starti
                | Self::lp_endi
                | Self::lp_count
                | Self::lp_counti
                | Self::lp_setup
                | Self::lp_setupi
        )
    }

    /// Decode a 32bit ("normal") instruction
    ///
    /// Returns an instruction if it is one the codec knows. As only control
    /// transfer instructions are relevant, unknown instructions are not an
    /// error.
    pub fn decode_32(insn: u32) -> Option<Self> {
        let funct3 = (insn >> 12) & 0x7;

        match insn & 0x7f {
            OPC_BRANCH => match funct3 {
                0b000 => Some(Self::beq(insn.into())),
                0b001 => Some(Self::bne(insn.into())),
                0b010 => Some(Self::p_beqimm(insn.into())),
                0b011 => Some(Self::p_bneimm(insn.into())),
                0b100 => Some(Self::blt(insn.into())),
                0b101 => Some(Self::bge(insn.into())),
                0b110 => Some(Self::bltu(insn.into())),
                0b111 => Some(Self::bgeu(insn.into())),
                _ => unreachable!(),
            },
            OPC_JAL => Some(Self::jal(insn.into())),
            OPC_JALR if funct3 == 0 => Some(Self::jalr(insn.into())),
            OPC_SYSTEM => match insn >> 7 {
                0b000000000010_00000_000_00000 => Some(Self::uret),
                0b000100000010_00000_000_00000 => Some(Self::sret),
                0b001100000010_00000_000_00000 => Some(Self::mret),
                _ => None,
            },
            OPC_HWLOOP => match funct3 {
                0b000 => Some(Self::lp_starti),
                0b001 => Some(Self::lp_endi),
                0b010 => Some(Self::lp_count),
                0b011 => Some(Self::lp_counti),
                0b100 => Some(Self::lp_setup),
                0b101 => Some(Self::lp_setupi),
                _ => None,
            },
            _ => None,
        }
    }

    /// Decode a 16bit ("compressed") instruction
    ///
    /// Returns an instruction if it is one the codec knows. As only control
    /// transfer instructions are relevant, unknown instructions are not an
    /// error.
    pub fn decode_16(insn: u16) -> Option<Self> {
        let op = insn & 0x3;
        let funct3 = insn >> 13;
        match (op, funct3) {
            (0b01, 0b001) => Some(Self::c_jal(insn.into())),
            (0b01, 0b101) => Some(Self::c_j(insn.into())),
            (0b01, 0b110) => Some(Self::c_beqz(insn.into())),
            (0b01, 0b111) => Some(Self::c_bnez(insn.into())),
            (0b10, 0b100) => {
                let data = format::TypeR::from(insn);
                let bit12 = (insn >> 12) & 0x1;
                match (bit12, data.rs1, data.rs2) {
                    (0, r, 0) if r != 0 => Some(Self::c_jr(data)),
                    (1, r, 0) if r != 0 => Some(Self::c_jalr(data)),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

/// A single RISC-V instruction of known length
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Instruction {
    bits: Bits,
    /// The classification, if the instruction is a known control transfer
    pub kind: Option<Kind>,
}

impl Instruction {
    /// Extract an [Instruction] from the beginning of a raw byte slice
    ///
    /// Returns the instruction and the remaining part of the slice, or
    /// `None` if the data does not start with a 16 or 32 bit instruction.
    pub fn extract(data: &[u8]) -> Option<(Self, &[u8])> {
        Bits::extract(data).map(|(bits, rest)| (bits.into(), rest))
    }

    /// Construct an [Instruction] from a retired instruction word
    pub fn from_word(word: u32, compressed: bool) -> Self {
        if compressed {
            Bits::Bit16(word as u16).into()
        } else {
            Bits::Bit32(word).into()
        }
    }

    /// Retrieve the instruction's length in bytes
    pub fn size(&self) -> u64 {
        match self.bits {
            Bits::Bit16(_) => 2,
            Bits::Bit32(_) => 4,
        }
    }

    /// Determine whether this is a compressed instruction
    pub fn is_compressed(&self) -> bool {
        matches!(self.bits, Bits::Bit16(_))
    }

    /// Retrieve the raw instruction word, zero-extended
    pub fn raw(&self) -> u32 {
        self.bits.raw()
    }
}

impl From<Bits> for Instruction {
    fn from(bits: Bits) -> Self {
        let kind = match bits {
            Bits::Bit32(word) => Kind::decode_32(word),
            Bits::Bit16(word) => Kind::decode_16(word),
        };
        Self { bits, kind }
    }
}

const OPC_BRANCH: u32 = 0b1100011;
const OPC_JALR: u32 = 0b1100111;
const OPC_JAL: u32 = 0b1101111;
const OPC_SYSTEM: u32 = 0b1110011;
const OPC_HWLOOP: u32 = 0b1111011;
