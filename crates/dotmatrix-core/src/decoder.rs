//! Decodes a byte window into a structured [`Instruction`] without executing
//! it. The interpreter and the disassembler both go through [`decode`], so
//! operand values and relative jump targets are computed in exactly one
//! place.

use std::fmt;

use crate::opcodes::{CB_PREFIXED, Condition, Mnemonic, OpcodeInfo, Operand, Reg8, Reg16, UNPREFIXED};

/// Longest encoding of any instruction.
pub const MAX_INSTRUCTION_LEN: usize = 3;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    Opcode(Decoded),
    /// A byte that does not start a valid instruction (illegal opcode or an
    /// encoding cut short by the end of the buffer).
    Data { byte: u8 },
    /// A cartridge header field, produced by the disassembler.
    Header { field: &'static str, len: u16 },
    /// Free-form listing note, produced by the disassembler.
    Annotation(String),
}

impl Instruction {
    /// Bytes consumed by this record. Annotations occupy no address space.
    pub fn length(&self) -> u16 {
        match self {
            Instruction::Opcode(d) => d.length as u16,
            Instruction::Data { .. } => 1,
            Instruction::Header { len, .. } => *len,
            Instruction::Annotation(_) => 0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedOperand {
    pub operand: Operand,
    /// Raw immediate (byte or little-endian word) for immediate-bearing operands.
    pub value: Option<u16>,
    /// Sign-extended view of an 8-bit displacement.
    pub signed: Option<i8>,
    /// Absolute destination of a relative jump.
    pub target: Option<u16>,
}

impl ResolvedOperand {
    const fn bare(operand: Operand) -> Self {
        Self {
            operand,
            value: None,
            signed: None,
            target: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Decoded {
    pub mnemonic: Mnemonic,
    /// Opcode byte. For CB-prefixed instructions this is the byte after 0xCB.
    pub opcode: u8,
    pub prefixed: bool,
    pub length: u8,
    pub cycles: u8,
    pub cycles_taken: u8,
    operands: [ResolvedOperand; 2],
    operand_count: u8,
}

impl Decoded {
    pub fn operands(&self) -> &[ResolvedOperand] {
        &self.operands[..self.operand_count as usize]
    }

    pub fn operand(&self, idx: usize) -> Option<&ResolvedOperand> {
        self.operands().get(idx)
    }

    /// Branch condition, if the instruction has one.
    pub fn condition(&self) -> Option<Condition> {
        self.operands().iter().find_map(|o| match o.operand {
            Operand::Condition(c) => Some(c),
            _ => None,
        })
    }

    /// Precomputed destination of a `JR`.
    pub fn relative_target(&self) -> Option<u16> {
        self.operands().iter().find_map(|o| o.target)
    }

    /// Address following this instruction.
    pub fn next_pc(&self, pc: u16) -> u16 {
        pc.wrapping_add(self.length as u16)
    }
}

/// Decodes the instruction whose first byte is `bytes[0]`, located at `pc`.
///
/// Never fails: illegal opcodes and truncated encodings come back as a
/// one-byte [`Instruction::Data`]. An empty window reads as open bus (0xFF).
pub fn decode(bytes: &[u8], pc: u16) -> Instruction {
    let Some(&first) = bytes.first() else {
        return Instruction::Data { byte: 0xFF };
    };

    let (info, opcode, prefixed, imm) = if first == 0xCB {
        match bytes.get(1) {
            Some(&op) => (&CB_PREFIXED[op as usize], op, true, &bytes[2..]),
            None => return Instruction::Data { byte: first },
        }
    } else {
        (&UNPREFIXED[first as usize], first, false, &bytes[1..])
    };

    if info.is_illegal() || bytes.len() < info.length as usize {
        return Instruction::Data { byte: first };
    }

    Instruction::Opcode(resolve(info, opcode, prefixed, imm, pc))
}

fn resolve(info: &OpcodeInfo, opcode: u8, prefixed: bool, imm: &[u8], pc: u16) -> Decoded {
    let byte = imm.first().copied().unwrap_or(0);
    let word = u16::from_le_bytes([byte, imm.get(1).copied().unwrap_or(0)]);
    let end = pc.wrapping_add(info.length as u16);

    let mut operands = [ResolvedOperand::bare(Operand::None); 2];
    for (slot, &operand) in operands.iter_mut().zip(info.operands()) {
        *slot = match operand {
            Operand::Imm8 | Operand::HighAddr8 => ResolvedOperand {
                value: Some(byte as u16),
                ..ResolvedOperand::bare(operand)
            },
            Operand::Imm16 | Operand::Addr16 => ResolvedOperand {
                value: Some(word),
                ..ResolvedOperand::bare(operand)
            },
            Operand::Rel8 => ResolvedOperand {
                value: Some(byte as u16),
                signed: Some(byte as i8),
                target: Some(end.wrapping_add(byte as i8 as u16)),
                ..ResolvedOperand::bare(operand)
            },
            Operand::Signed8 | Operand::SpOffset => ResolvedOperand {
                value: Some(byte as u16),
                signed: Some(byte as i8),
                ..ResolvedOperand::bare(operand)
            },
            _ => ResolvedOperand::bare(operand),
        };
    }

    Decoded {
        mnemonic: info.mnemonic,
        opcode,
        prefixed,
        length: info.length,
        cycles: info.cycles,
        cycles_taken: info.cycles_taken,
        operands,
        operand_count: info.operands().len() as u8,
    }
}

fn reg8_name(r: Reg8) -> &'static str {
    match r {
        Reg8::A => "A",
        Reg8::B => "B",
        Reg8::C => "C",
        Reg8::D => "D",
        Reg8::E => "E",
        Reg8::H => "H",
        Reg8::L => "L",
    }
}

fn reg16_name(r: Reg16) -> &'static str {
    match r {
        Reg16::BC => "BC",
        Reg16::DE => "DE",
        Reg16::HL => "HL",
        Reg16::SP => "SP",
        Reg16::AF => "AF",
    }
}

fn signed_hex(v: i8) -> String {
    if v < 0 {
        format!("-${:02X}", (v as i16).unsigned_abs())
    } else {
        format!("+${v:02X}")
    }
}

impl fmt::Display for ResolvedOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = self.value.unwrap_or(0);
        let signed = self.signed.unwrap_or(0);
        match self.operand {
            Operand::None => Ok(()),
            Operand::Reg8(r) => f.write_str(reg8_name(r)),
            Operand::Reg16(r) => f.write_str(reg16_name(r)),
            Operand::Indirect(r) => write!(f, "({})", reg16_name(r)),
            Operand::IndirectInc => f.write_str("(HL+)"),
            Operand::IndirectDec => f.write_str("(HL-)"),
            Operand::HighC => f.write_str("($FF00+C)"),
            Operand::Imm8 => write!(f, "${value:02X}"),
            Operand::Imm16 => write!(f, "${value:04X}"),
            Operand::Addr16 => write!(f, "(${value:04X})"),
            Operand::HighAddr8 => write!(f, "($FF{value:02X})"),
            Operand::Rel8 => write!(f, "${:04X}", self.target.unwrap_or(0)),
            Operand::SpOffset => write!(f, "SP{}", signed_hex(signed)),
            Operand::Signed8 => f.write_str(&signed_hex(signed)),
            Operand::Condition(c) => f.write_str(match c {
                Condition::NZ => "NZ",
                Condition::Z => "Z",
                Condition::NC => "NC",
                Condition::C => "C",
            }),
            Operand::Vector(v) => write!(f, "${v:02X}"),
            Operand::Bit(b) => write!(f, "{b}"),
        }
    }
}

impl fmt::Display for Decoded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic.as_str())?;
        for (i, operand) in self.operands().iter().enumerate() {
            f.write_str(if i == 0 { " " } else { "," })?;
            write!(f, "{operand}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Opcode(d) => write!(f, "{d}"),
            Instruction::Data { byte } => write!(f, "DB ${byte:02X}"),
            Instruction::Header { field, len } => write!(f, "; header: {field} ({len} bytes)"),
            Instruction::Annotation(text) => write!(f, "; {text}"),
        }
    }
}
