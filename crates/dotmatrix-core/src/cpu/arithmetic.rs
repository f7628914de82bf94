use super::{CpuState, Flags, MemoryBus, malformed, modify8, operand, read8, reg16_operand};
use crate::decoder::Decoded;
use crate::error::CpuError;
use crate::opcodes::{Mnemonic, Operand, Reg8, Reg16};

pub(super) fn add8(s: &mut CpuState, a: u8, b: u8, carry_in: bool) -> u8 {
    let c = carry_in as u8;
    let res = a.wrapping_add(b).wrapping_add(c);
    s.flags = Flags {
        zero: res == 0,
        subtract: false,
        half_carry: (a & 0x0F) + (b & 0x0F) + c > 0x0F,
        carry: a as u16 + b as u16 + c as u16 > 0xFF,
    };
    res
}

pub(super) fn sub8(s: &mut CpuState, a: u8, b: u8, carry_in: bool) -> u8 {
    let c = carry_in as u8;
    let res = a.wrapping_sub(b).wrapping_sub(c);
    s.flags = Flags {
        zero: res == 0,
        subtract: true,
        half_carry: (a & 0x0F) < (b & 0x0F) + c,
        carry: (a as u16) < b as u16 + c as u16,
    };
    res
}

fn add_hl(s: &mut CpuState, rr: u16) {
    let hl = s.regs.hl();
    s.flags.subtract = false;
    s.flags.half_carry = (hl & 0x0FFF) + (rr & 0x0FFF) > 0x0FFF;
    s.flags.carry = hl as u32 + rr as u32 > 0xFFFF;
    s.regs.set_hl(hl.wrapping_add(rr));
}

/// `SP + e8` with H and C taken from the unsigned low byte of the offset.
pub(super) fn sp_plus_offset(s: &mut CpuState, offset: u8) -> u16 {
    let sp = s.regs.sp;
    let unsigned = offset as u16;
    s.flags = Flags {
        zero: false,
        subtract: false,
        half_carry: (sp & 0x0F) + (unsigned & 0x0F) > 0x0F,
        carry: (sp & 0xFF) + unsigned > 0xFF,
    };
    sp.wrapping_add(offset as i8 as u16)
}

pub(super) fn inc<B: MemoryBus>(s: &mut CpuState, bus: &mut B, d: &Decoded) -> Result<(), CpuError> {
    if let Operand::Reg16(r) = operand(s, d, 0)?.operand {
        s.set_reg16(r, s.reg16(r).wrapping_add(1));
        return Ok(());
    }
    modify8(s, bus, d, 0, |s, v| {
        let res = v.wrapping_add(1);
        s.flags.zero = res == 0;
        s.flags.subtract = false;
        s.flags.half_carry = v & 0x0F == 0x0F;
        res
    })
}

pub(super) fn dec<B: MemoryBus>(s: &mut CpuState, bus: &mut B, d: &Decoded) -> Result<(), CpuError> {
    if let Operand::Reg16(r) = operand(s, d, 0)?.operand {
        s.set_reg16(r, s.reg16(r).wrapping_sub(1));
        return Ok(());
    }
    modify8(s, bus, d, 0, |s, v| {
        let res = v.wrapping_sub(1);
        s.flags.zero = res == 0;
        s.flags.subtract = true;
        s.flags.half_carry = v & 0x0F == 0;
        res
    })
}

/// `ADD`/`ADC`/`SUB`/`SBC`/`CP` in their 8-bit forms, plus `ADD HL,rr` and
/// `ADD SP,e8`.
pub(super) fn alu<B: MemoryBus>(s: &mut CpuState, bus: &mut B, d: &Decoded) -> Result<(), CpuError> {
    match operand(s, d, 0)?.operand {
        Operand::Reg16(Reg16::HL) => {
            let rr = s.reg16(reg16_operand(s, d, 1)?);
            add_hl(s, rr);
            return Ok(());
        }
        Operand::Reg16(Reg16::SP) => {
            let offset = operand(s, d, 1)?.value.ok_or_else(|| malformed(s, d))? as u8;
            s.regs.sp = sp_plus_offset(s, offset);
            return Ok(());
        }
        Operand::Reg8(Reg8::A) => {}
        _ => return Err(malformed(s, d)),
    }

    let a = s.regs.a;
    let b = read8(s, bus, d, 1)?;
    let carry = s.flags.carry;
    match d.mnemonic {
        Mnemonic::Add => s.regs.a = add8(s, a, b, false),
        Mnemonic::Adc => s.regs.a = add8(s, a, b, carry),
        Mnemonic::Sub => s.regs.a = sub8(s, a, b, false),
        Mnemonic::Sbc => s.regs.a = sub8(s, a, b, carry),
        Mnemonic::Cp => {
            sub8(s, a, b, false);
        }
        _ => return Err(malformed(s, d)),
    }
    Ok(())
}

pub(super) fn daa(s: &mut CpuState) {
    let mut a = s.regs.a;
    let mut correction = 0u8;
    let mut carry = false;
    if s.flags.half_carry || (!s.flags.subtract && (a & 0x0F) > 9) {
        correction |= 0x06;
    }
    if s.flags.carry || (!s.flags.subtract && a > 0x99) {
        correction |= 0x60;
        carry = true;
    }
    a = if s.flags.subtract {
        a.wrapping_sub(correction)
    } else {
        a.wrapping_add(correction)
    };
    s.regs.a = a;
    s.flags.zero = a == 0;
    s.flags.half_carry = false;
    s.flags.carry = carry;
}
