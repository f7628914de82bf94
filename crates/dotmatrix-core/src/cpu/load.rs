use super::arithmetic::sp_plus_offset;
use super::{CpuState, MemoryBus, malformed, operand, pop_word, push_word, read8, reg16_operand, write8};
use crate::decoder::Decoded;
use crate::error::CpuError;
use crate::opcodes::{Operand, Reg16};

pub(super) fn ld<B: MemoryBus>(s: &mut CpuState, bus: &mut B, d: &Decoded) -> Result<(), CpuError> {
    let dst = *operand(s, d, 0)?;
    let src = *operand(s, d, 1)?;
    match (dst.operand, src.operand) {
        (Operand::Reg16(r), Operand::Imm16) => {
            let val = src.value.ok_or_else(|| malformed(s, d))?;
            s.set_reg16(r, val);
        }
        (Operand::Reg16(r), Operand::Reg16(from)) => s.set_reg16(r, s.reg16(from)),
        (Operand::Reg16(r), Operand::SpOffset) => {
            let offset = src.value.ok_or_else(|| malformed(s, d))? as u8;
            let val = sp_plus_offset(s, offset);
            s.set_reg16(r, val);
        }
        (Operand::Addr16, Operand::Reg16(Reg16::SP)) => {
            let addr = dst.value.ok_or_else(|| malformed(s, d))?;
            bus.write_word(addr, s.regs.sp);
        }
        _ => {
            let val = read8(s, bus, d, 1)?;
            write8(s, bus, d, 0, val)?;
        }
    }
    Ok(())
}

pub(super) fn push<B: MemoryBus>(s: &mut CpuState, bus: &mut B, d: &Decoded) -> Result<(), CpuError> {
    let val = s.reg16(reg16_operand(s, d, 0)?);
    push_word(s, bus, val);
    Ok(())
}

/// `POP AF` goes through the flag booleans, so F's low nibble stays clear.
pub(super) fn pop<B: MemoryBus>(s: &mut CpuState, bus: &mut B, d: &Decoded) -> Result<(), CpuError> {
    let r = reg16_operand(s, d, 0)?;
    let val = pop_word(s, bus);
    s.set_reg16(r, val);
    Ok(())
}
