//! Static decode metadata for the 256 unprefixed and 256 CB-prefixed opcodes.
//!
//! Tables are generated at compile time from the usual `x/y/z/p/q` split of
//! the opcode byte (`x = op >> 6`, `y = (op >> 3) & 7`, `z = op & 7`,
//! `p = y >> 1`, `q = y & 1`). Cycle counts are in T-cycles. Conditional
//! branches carry both the not-taken and the taken cost.

use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Mnemonic {
    Nop,
    Ld,
    Ldh,
    Inc,
    Dec,
    Add,
    Adc,
    Sub,
    Sbc,
    And,
    Xor,
    Or,
    Cp,
    Rlca,
    Rrca,
    Rla,
    Rra,
    Daa,
    Cpl,
    Scf,
    Ccf,
    Jr,
    Jp,
    Call,
    Ret,
    Reti,
    Rst,
    Push,
    Pop,
    Halt,
    Stop,
    Di,
    Ei,
    Prefix,
    Rlc,
    Rrc,
    Rl,
    Rr,
    Sla,
    Sra,
    Swap,
    Srl,
    Bit,
    Res,
    Set,
    Illegal,
}

impl Mnemonic {
    pub const fn as_str(self) -> &'static str {
        match self {
            Mnemonic::Nop => "NOP",
            Mnemonic::Ld => "LD",
            Mnemonic::Ldh => "LDH",
            Mnemonic::Inc => "INC",
            Mnemonic::Dec => "DEC",
            Mnemonic::Add => "ADD",
            Mnemonic::Adc => "ADC",
            Mnemonic::Sub => "SUB",
            Mnemonic::Sbc => "SBC",
            Mnemonic::And => "AND",
            Mnemonic::Xor => "XOR",
            Mnemonic::Or => "OR",
            Mnemonic::Cp => "CP",
            Mnemonic::Rlca => "RLCA",
            Mnemonic::Rrca => "RRCA",
            Mnemonic::Rla => "RLA",
            Mnemonic::Rra => "RRA",
            Mnemonic::Daa => "DAA",
            Mnemonic::Cpl => "CPL",
            Mnemonic::Scf => "SCF",
            Mnemonic::Ccf => "CCF",
            Mnemonic::Jr => "JR",
            Mnemonic::Jp => "JP",
            Mnemonic::Call => "CALL",
            Mnemonic::Ret => "RET",
            Mnemonic::Reti => "RETI",
            Mnemonic::Rst => "RST",
            Mnemonic::Push => "PUSH",
            Mnemonic::Pop => "POP",
            Mnemonic::Halt => "HALT",
            Mnemonic::Stop => "STOP",
            Mnemonic::Di => "DI",
            Mnemonic::Ei => "EI",
            Mnemonic::Prefix => "PREFIX",
            Mnemonic::Rlc => "RLC",
            Mnemonic::Rrc => "RRC",
            Mnemonic::Rl => "RL",
            Mnemonic::Rr => "RR",
            Mnemonic::Sla => "SLA",
            Mnemonic::Sra => "SRA",
            Mnemonic::Swap => "SWAP",
            Mnemonic::Srl => "SRL",
            Mnemonic::Bit => "BIT",
            Mnemonic::Res => "RES",
            Mnemonic::Set => "SET",
            Mnemonic::Illegal => "ILLEGAL",
        }
    }
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Reg8 {
    B,
    C,
    D,
    E,
    H,
    L,
    A,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Reg16 {
    BC,
    DE,
    HL,
    SP,
    AF,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Condition {
    NZ,
    Z,
    NC,
    C,
}

/// Operand descriptor. Immediate-bearing variants are resolved against the
/// instruction bytes by the decoder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operand {
    None,
    Reg8(Reg8),
    Reg16(Reg16),
    /// `(BC)`, `(DE)` or `(HL)`.
    Indirect(Reg16),
    /// `(HL+)`
    IndirectInc,
    /// `(HL-)`
    IndirectDec,
    /// `(C)`, i.e. `0xFF00 + C`.
    HighC,
    Imm8,
    Imm16,
    /// `(a16)`
    Addr16,
    /// `(a8)`, i.e. `0xFF00 + a8`.
    HighAddr8,
    /// Signed displacement of `JR`.
    Rel8,
    /// `SP+e8` of `LD HL,SP+e8`.
    SpOffset,
    /// Signed immediate of `ADD SP,e8`.
    Signed8,
    Condition(Condition),
    /// `RST` target.
    Vector(u8),
    /// Bit index of `BIT`/`RES`/`SET`.
    Bit(u8),
}

impl Operand {
    /// Whether the operand reads or writes memory through `(HL)`.
    pub const fn is_hl_memory(self) -> bool {
        matches!(
            self,
            Operand::Indirect(Reg16::HL) | Operand::IndirectInc | Operand::IndirectDec
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpcodeInfo {
    pub mnemonic: Mnemonic,
    /// Encoded length in bytes, including the `0xCB` prefix where present.
    pub length: u8,
    pub cycles: u8,
    /// Cost when a conditional branch is taken. Equals `cycles` otherwise.
    pub cycles_taken: u8,
    operands: [Operand; 2],
    operand_count: u8,
}

impl OpcodeInfo {
    pub fn operands(&self) -> &[Operand] {
        &self.operands[..self.operand_count as usize]
    }

    pub const fn is_illegal(&self) -> bool {
        matches!(self.mnemonic, Mnemonic::Illegal)
    }
}

const fn info0(mnemonic: Mnemonic, length: u8, cycles: u8) -> OpcodeInfo {
    OpcodeInfo {
        mnemonic,
        length,
        cycles,
        cycles_taken: cycles,
        operands: [Operand::None, Operand::None],
        operand_count: 0,
    }
}

const fn info1(mnemonic: Mnemonic, length: u8, cycles: u8, a: Operand) -> OpcodeInfo {
    OpcodeInfo {
        mnemonic,
        length,
        cycles,
        cycles_taken: cycles,
        operands: [a, Operand::None],
        operand_count: 1,
    }
}

const fn info2(mnemonic: Mnemonic, length: u8, cycles: u8, a: Operand, b: Operand) -> OpcodeInfo {
    OpcodeInfo {
        mnemonic,
        length,
        cycles,
        cycles_taken: cycles,
        operands: [a, b],
        operand_count: 2,
    }
}

const fn taken(mut info: OpcodeInfo, cycles_taken: u8) -> OpcodeInfo {
    info.cycles_taken = cycles_taken;
    info
}

const ILLEGAL: OpcodeInfo = info0(Mnemonic::Illegal, 1, 4);

const fn r(idx: u8) -> Operand {
    match idx & 7 {
        0 => Operand::Reg8(Reg8::B),
        1 => Operand::Reg8(Reg8::C),
        2 => Operand::Reg8(Reg8::D),
        3 => Operand::Reg8(Reg8::E),
        4 => Operand::Reg8(Reg8::H),
        5 => Operand::Reg8(Reg8::L),
        6 => Operand::Indirect(Reg16::HL),
        _ => Operand::Reg8(Reg8::A),
    }
}

const fn rp(p: u8) -> Reg16 {
    match p & 3 {
        0 => Reg16::BC,
        1 => Reg16::DE,
        2 => Reg16::HL,
        _ => Reg16::SP,
    }
}

const fn rp2(p: u8) -> Reg16 {
    match p & 3 {
        0 => Reg16::BC,
        1 => Reg16::DE,
        2 => Reg16::HL,
        _ => Reg16::AF,
    }
}

const fn cc(idx: u8) -> Operand {
    Operand::Condition(match idx & 3 {
        0 => Condition::NZ,
        1 => Condition::Z,
        2 => Condition::NC,
        _ => Condition::C,
    })
}

const fn alu(y: u8) -> Mnemonic {
    match y & 7 {
        0 => Mnemonic::Add,
        1 => Mnemonic::Adc,
        2 => Mnemonic::Sub,
        3 => Mnemonic::Sbc,
        4 => Mnemonic::And,
        5 => Mnemonic::Xor,
        6 => Mnemonic::Or,
        _ => Mnemonic::Cp,
    }
}

const fn unprefixed(op: u8) -> OpcodeInfo {
    use Mnemonic::*;
    use Operand::{
        Addr16, HighAddr8, HighC, Imm8, Imm16, Indirect, IndirectDec, IndirectInc, Rel8,
        Signed8, SpOffset, Vector,
    };
    const A: Operand = Operand::Reg8(Reg8::A);
    const HL: Operand = Operand::Reg16(Reg16::HL);
    const SP: Operand = Operand::Reg16(Reg16::SP);

    let x = op >> 6;
    let y = (op >> 3) & 7;
    let z = op & 7;
    let p = y >> 1;
    let q = y & 1;

    match x {
        0 => match z {
            0 => match y {
                0 => info0(Nop, 1, 4),
                1 => info2(Ld, 3, 20, Addr16, SP),
                2 => info0(Stop, 2, 4),
                3 => info1(Jr, 2, 12, Rel8),
                _ => taken(info2(Jr, 2, 8, cc(y - 4), Rel8), 12),
            },
            1 => {
                if q == 0 {
                    info2(Ld, 3, 12, Operand::Reg16(rp(p)), Imm16)
                } else {
                    info2(Add, 1, 8, HL, Operand::Reg16(rp(p)))
                }
            }
            2 => {
                let mem = match p {
                    0 => Indirect(Reg16::BC),
                    1 => Indirect(Reg16::DE),
                    2 => IndirectInc,
                    _ => IndirectDec,
                };
                if q == 0 {
                    info2(Ld, 1, 8, mem, A)
                } else {
                    info2(Ld, 1, 8, A, mem)
                }
            }
            3 => info1(if q == 0 { Inc } else { Dec }, 1, 8, Operand::Reg16(rp(p))),
            4 => info1(Inc, 1, if y == 6 { 12 } else { 4 }, r(y)),
            5 => info1(Dec, 1, if y == 6 { 12 } else { 4 }, r(y)),
            6 => info2(Ld, 2, if y == 6 { 12 } else { 8 }, r(y), Imm8),
            _ => {
                let m = match y {
                    0 => Rlca,
                    1 => Rrca,
                    2 => Rla,
                    3 => Rra,
                    4 => Daa,
                    5 => Cpl,
                    6 => Scf,
                    _ => Ccf,
                };
                info0(m, 1, 4)
            }
        },
        1 => {
            if op == 0x76 {
                info0(Halt, 1, 4)
            } else {
                let cycles = if y == 6 || z == 6 { 8 } else { 4 };
                info2(Ld, 1, cycles, r(y), r(z))
            }
        }
        2 => info2(alu(y), 1, if z == 6 { 8 } else { 4 }, A, r(z)),
        _ => match z {
            0 => match y {
                0..=3 => taken(info1(Ret, 1, 8, cc(y)), 20),
                4 => info2(Ldh, 2, 12, HighAddr8, A),
                5 => info2(Add, 2, 16, SP, Signed8),
                6 => info2(Ldh, 2, 12, A, HighAddr8),
                _ => info2(Ld, 2, 12, HL, SpOffset),
            },
            1 => {
                if q == 0 {
                    info1(Pop, 1, 12, Operand::Reg16(rp2(p)))
                } else {
                    match p {
                        0 => info0(Ret, 1, 16),
                        1 => info0(Reti, 1, 16),
                        2 => info1(Jp, 1, 4, HL),
                        _ => info2(Ld, 1, 8, SP, HL),
                    }
                }
            }
            2 => match y {
                0..=3 => taken(info2(Jp, 3, 12, cc(y), Imm16), 16),
                4 => info2(Ld, 1, 8, HighC, A),
                5 => info2(Ld, 3, 16, Addr16, A),
                6 => info2(Ld, 1, 8, A, HighC),
                _ => info2(Ld, 3, 16, A, Addr16),
            },
            3 => match y {
                0 => info1(Jp, 3, 16, Imm16),
                1 => info0(Prefix, 1, 4),
                6 => info0(Di, 1, 4),
                7 => info0(Ei, 1, 4),
                _ => ILLEGAL,
            },
            4 => {
                if y < 4 {
                    taken(info2(Call, 3, 12, cc(y), Imm16), 24)
                } else {
                    ILLEGAL
                }
            }
            5 => {
                if q == 0 {
                    info1(Push, 1, 16, Operand::Reg16(rp2(p)))
                } else if p == 0 {
                    info1(Call, 3, 24, Imm16)
                } else {
                    ILLEGAL
                }
            }
            6 => info2(alu(y), 2, 8, A, Imm8),
            _ => info1(Rst, 1, 16, Vector(y * 8)),
        },
    }
}

const fn cb_prefixed(op: u8) -> OpcodeInfo {
    use Mnemonic::*;

    let x = op >> 6;
    let y = (op >> 3) & 7;
    let z = op & 7;
    let mem = z == 6;

    match x {
        0 => {
            let m = match y {
                0 => Rlc,
                1 => Rrc,
                2 => Rl,
                3 => Rr,
                4 => Sla,
                5 => Sra,
                6 => Swap,
                _ => Srl,
            };
            info1(m, 2, if mem { 16 } else { 8 }, r(z))
        }
        1 => info2(Bit, 2, if mem { 12 } else { 8 }, Operand::Bit(y), r(z)),
        2 => info2(Res, 2, if mem { 16 } else { 8 }, Operand::Bit(y), r(z)),
        _ => info2(Set, 2, if mem { 16 } else { 8 }, Operand::Bit(y), r(z)),
    }
}

const fn build_table(prefixed: bool) -> [OpcodeInfo; 256] {
    let mut table = [ILLEGAL; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = if prefixed {
            cb_prefixed(i as u8)
        } else {
            unprefixed(i as u8)
        };
        i += 1;
    }
    table
}

pub static UNPREFIXED: [OpcodeInfo; 256] = build_table(false);
pub static CB_PREFIXED: [OpcodeInfo; 256] = build_table(true);

#[cfg(test)]
mod tests {
    use super::*;

    const ILLEGAL_OPCODES: [u8; 11] = [
        0xD3, 0xDB, 0xDD, 0xE3, 0xE4, 0xEB, 0xEC, 0xED, 0xF4, 0xFC, 0xFD,
    ];

    #[test]
    fn exactly_the_documented_opcodes_are_illegal() {
        for op in 0..=255u8 {
            assert_eq!(
                UNPREFIXED[op as usize].is_illegal(),
                ILLEGAL_OPCODES.contains(&op),
                "opcode {op:#04X}"
            );
        }
        assert!(CB_PREFIXED.iter().all(|i| !i.is_illegal()));
    }

    #[test]
    fn spot_check_lengths_and_cycles() {
        let ld_a16_sp = UNPREFIXED[0x08];
        assert_eq!((ld_a16_sp.length, ld_a16_sp.cycles), (3, 20));

        let jr_nz = UNPREFIXED[0x20];
        assert_eq!(jr_nz.mnemonic, Mnemonic::Jr);
        assert_eq!((jr_nz.cycles, jr_nz.cycles_taken), (8, 12));

        let call_z = UNPREFIXED[0xCC];
        assert_eq!((call_z.length, call_z.cycles, call_z.cycles_taken), (3, 12, 24));

        let ld_hl_d8 = UNPREFIXED[0x36];
        assert_eq!((ld_hl_d8.length, ld_hl_d8.cycles), (2, 12));

        assert_eq!(UNPREFIXED[0x10].length, 2);
        assert_eq!(UNPREFIXED[0x76].mnemonic, Mnemonic::Halt);
        assert_eq!(UNPREFIXED[0xE9].cycles, 4);
        assert_eq!(UNPREFIXED[0xFF].operands(), &[Operand::Vector(0x38)]);
    }

    #[test]
    fn cb_memory_forms_cost_more() {
        assert_eq!(CB_PREFIXED[0x00].cycles, 8);
        assert_eq!(CB_PREFIXED[0x06].cycles, 16);
        assert_eq!(CB_PREFIXED[0x46].cycles, 12);
        assert_eq!(CB_PREFIXED[0x86].cycles, 16);
        assert_eq!(CB_PREFIXED[0xFE].cycles, 16);
        assert!(CB_PREFIXED.iter().all(|i| i.length == 2));

        let bit7_h = CB_PREFIXED[0x7C];
        assert_eq!(bit7_h.mnemonic, Mnemonic::Bit);
        assert_eq!(
            bit7_h.operands(),
            &[Operand::Bit(7), Operand::Reg8(Reg8::H)]
        );
    }

    #[test]
    fn alu_block_targets_accumulator() {
        for op in 0x80..=0xBFu8 {
            let info = UNPREFIXED[op as usize];
            assert_eq!(info.operands()[0], Operand::Reg8(Reg8::A));
            let expected = if op & 7 == 6 { 8 } else { 4 };
            assert_eq!(info.cycles, expected, "opcode {op:#04X}");
        }
    }
}
