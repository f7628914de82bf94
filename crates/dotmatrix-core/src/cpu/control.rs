use super::{CpuState, MemoryBus, malformed, operand, pop_word, push_word};
use crate::decoder::Decoded;
use crate::error::CpuError;
use crate::opcodes::{Condition, Mnemonic, Operand, Reg16};

fn condition_met(s: &CpuState, cond: Condition) -> bool {
    match cond {
        Condition::NZ => !s.flags.zero,
        Condition::Z => s.flags.zero,
        Condition::NC => !s.flags.carry,
        Condition::C => s.flags.carry,
    }
}

/// `JR`, `JP`, `CALL` and `RET`, conditional or not. Returns whether the
/// branch was taken.
pub(super) fn branch<B: MemoryBus>(s: &mut CpuState, bus: &mut B, d: &Decoded) -> Result<bool, CpuError> {
    if let Some(cond) = d.condition()
        && !condition_met(s, cond)
    {
        return Ok(false);
    }

    match d.mnemonic {
        Mnemonic::Jr => {
            s.regs.pc = d.relative_target().ok_or_else(|| malformed(s, d))?;
        }
        Mnemonic::Jp => {
            let target = operand(s, d, d.operands().len().saturating_sub(1))?;
            s.regs.pc = match target.operand {
                Operand::Reg16(Reg16::HL) => s.regs.hl(),
                Operand::Imm16 => target.value.ok_or_else(|| malformed(s, d))?,
                _ => return Err(malformed(s, d)),
            };
        }
        Mnemonic::Call => {
            let target = operand(s, d, d.operands().len().saturating_sub(1))?
                .value
                .ok_or_else(|| malformed(s, d))?;
            let ret = s.regs.pc;
            push_word(s, bus, ret);
            s.regs.pc = target;
        }
        Mnemonic::Ret => {
            s.regs.pc = pop_word(s, bus);
        }
        _ => return Err(malformed(s, d)),
    }
    Ok(true)
}

pub(super) fn reti<B: MemoryBus>(s: &mut CpuState, bus: &mut B) {
    s.regs.pc = pop_word(s, bus);
    s.ime = true;
    s.ime_enable_delay = 0;
}

pub(super) fn rst<B: MemoryBus>(s: &mut CpuState, bus: &mut B, d: &Decoded) -> Result<(), CpuError> {
    let Operand::Vector(vector) = operand(s, d, 0)?.operand else {
        return Err(malformed(s, d));
    };
    let ret = s.regs.pc;
    push_word(s, bus, ret);
    s.regs.pc = vector as u16;
    Ok(())
}

/// With IME clear and a request already pending the CPU does not halt and
/// the following opcode byte is fetched twice.
pub(super) fn halt<B: MemoryBus>(s: &mut CpuState, bus: &mut B) {
    let pending = bus.interrupt_enable() & bus.interrupt_flags() & 0x1F;
    if s.ime || s.ime_enable_delay > 0 || pending == 0 {
        s.halted = true;
    } else {
        s.halt_bug = true;
    }
}

pub(super) fn stop<B: MemoryBus>(s: &mut CpuState, bus: &mut B) {
    if !bus.try_speed_switch() {
        s.stopped = true;
    }
}

pub(super) fn di(s: &mut CpuState) {
    s.ime = false;
    s.ime_enable_delay = 0;
}

pub(super) fn ei(s: &mut CpuState) {
    if !s.ime {
        s.ime_enable_delay = 2;
    }
}
