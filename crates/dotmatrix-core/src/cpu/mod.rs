//! SM83 interpreter.
//!
//! One instruction (or one interrupt dispatch, or one idle slot) per
//! [`Cpu::step`]. Instruction semantics live in free functions grouped by
//! category, each taking the [`CpuState`] and the bus explicitly.

mod arithmetic;
mod bitwise;
mod control;
mod load;
mod rotate;
mod state;

pub use state::{CpuState, FLAG_C, FLAG_H, FLAG_N, FLAG_Z, Flags, Registers};

#[cfg(feature = "cpu-trace")]
use log::trace;

use crate::decoder::{self, Decoded, Instruction, MAX_INSTRUCTION_LEN, ResolvedOperand};
use crate::error::CpuError;
use crate::hardware::Model;
use crate::interrupts::Interrupt;
use crate::opcodes::{Mnemonic, Operand, Reg16};

/// T-cycles spent dispatching an interrupt.
pub const INTERRUPT_DISPATCH_CYCLES: u32 = 20;
/// T-cycles that elapse per step while halted or stopped.
pub const IDLE_CYCLES: u32 = 4;

/// The CPU's view of the address space and interrupt controller.
pub trait MemoryBus {
    fn read_byte(&mut self, addr: u16) -> u8;
    fn write_byte(&mut self, addr: u16, val: u8);

    fn read_word(&mut self, addr: u16) -> u16 {
        let lo = self.read_byte(addr);
        let hi = self.read_byte(addr.wrapping_add(1));
        u16::from_le_bytes([lo, hi])
    }

    fn write_word(&mut self, addr: u16, val: u16) {
        let [lo, hi] = val.to_le_bytes();
        self.write_byte(addr, lo);
        self.write_byte(addr.wrapping_add(1), hi);
    }

    /// IE (0xFFFF).
    fn interrupt_enable(&self) -> u8;
    /// Pending requests, the low five bits of IF.
    fn interrupt_flags(&self) -> u8;
    fn request_interrupt(&mut self, interrupt: Interrupt);
    fn acknowledge_interrupt(&mut self, interrupt: Interrupt);

    /// Performs a prepared CGB speed switch. Returns `false` when none is
    /// armed, in which case `STOP` stops the CPU.
    fn try_speed_switch(&mut self) -> bool {
        false
    }
}

pub struct Cpu {
    pub state: CpuState,
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu {
    pub fn new() -> Self {
        Self {
            state: CpuState::new(),
        }
    }

    pub fn post_boot(model: Model) -> Self {
        Self {
            state: CpuState::post_boot(model),
        }
    }

    /// Runs one step and returns the T-cycles it took.
    pub fn step<B: MemoryBus>(&mut self, bus: &mut B) -> Result<u32, CpuError> {
        let s = &mut self.state;

        let requested = bus.interrupt_flags() & 0x1F;
        let pending = bus.interrupt_enable() & requested;
        if s.halted && pending != 0 {
            s.halted = false;
        }
        if s.stopped && requested & Interrupt::Joypad.bit() != 0 {
            s.stopped = false;
        }

        if s.ime
            && let Some(interrupt) = Interrupt::highest(pending)
        {
            dispatch_interrupt(s, bus, interrupt);
            s.cycles += INTERRUPT_DISPATCH_CYCLES as u64;
            return Ok(INTERRUPT_DISPATCH_CYCLES);
        }

        if s.halted || s.stopped {
            s.cycles += IDLE_CYCLES as u64;
            return Ok(IDLE_CYCLES);
        }

        let pc = s.regs.pc;
        let mut window = [0u8; MAX_INSTRUCTION_LEN];
        // A HALT bug replays the opcode byte, so decode as if it started one
        // byte earlier.
        let decode_pc = if s.halt_bug {
            s.halt_bug = false;
            window[0] = bus.read_byte(pc);
            window[1] = window[0];
            window[2] = bus.read_byte(pc.wrapping_add(1));
            pc.wrapping_sub(1)
        } else {
            for (i, byte) in window.iter_mut().enumerate() {
                *byte = bus.read_byte(pc.wrapping_add(i as u16));
            }
            pc
        };

        let decoded = match decoder::decode(&window, decode_pc) {
            Instruction::Opcode(d) => d,
            Instruction::Data { byte } => {
                return Err(CpuError::IllegalOpcode {
                    opcode: byte,
                    pc,
                });
            }
            Instruction::Header { .. } | Instruction::Annotation(_) => {
                return Err(CpuError::IllegalOpcode {
                    opcode: window[0],
                    pc,
                });
            }
        };

        #[cfg(feature = "cpu-trace")]
        trace!("{pc:04X}: {decoded}  {s}");

        let enable_after = s.ime_enable_delay == 1;
        s.opcode_pc = pc;
        s.regs.pc = decoded.next_pc(decode_pc);

        let taken = execute(s, bus, &decoded)?;

        if enable_after && s.ime_enable_delay > 0 {
            s.ime = true;
        }
        if s.ime_enable_delay > 0 {
            s.ime_enable_delay -= 1;
        }

        let cycles = if taken {
            decoded.cycles_taken
        } else {
            decoded.cycles
        } as u32;
        s.cycles += cycles as u64;
        Ok(cycles)
    }
}

fn dispatch_interrupt<B: MemoryBus>(s: &mut CpuState, bus: &mut B, interrupt: Interrupt) {
    s.ime = false;
    s.ime_enable_delay = 0;
    s.halted = false;
    let return_pc = s.regs.pc;
    push_word(s, bus, return_pc);
    bus.acknowledge_interrupt(interrupt);
    s.regs.pc = interrupt.vector();
}

/// Executes a decoded instruction. `regs.pc` already points past it.
/// Returns whether a conditional branch was taken.
fn execute<B: MemoryBus>(s: &mut CpuState, bus: &mut B, d: &Decoded) -> Result<bool, CpuError> {
    use Mnemonic::*;

    match d.mnemonic {
        Nop => {}
        Ld | Ldh => load::ld(s, bus, d)?,
        Push => load::push(s, bus, d)?,
        Pop => load::pop(s, bus, d)?,
        Inc => arithmetic::inc(s, bus, d)?,
        Dec => arithmetic::dec(s, bus, d)?,
        Add | Adc | Sub | Sbc | Cp => arithmetic::alu(s, bus, d)?,
        Daa => arithmetic::daa(s),
        And | Xor | Or => bitwise::logic(s, bus, d)?,
        Cpl => bitwise::cpl(s),
        Scf => bitwise::scf(s),
        Ccf => bitwise::ccf(s),
        Bit | Res | Set => bitwise::bit_op(s, bus, d)?,
        Rlca | Rrca | Rla | Rra => rotate::accumulator(s, d.mnemonic),
        Rlc | Rrc | Rl | Rr | Sla | Sra | Swap | Srl => rotate::shift(s, bus, d)?,
        Jr | Jp | Call | Ret => return control::branch(s, bus, d),
        Reti => control::reti(s, bus),
        Rst => control::rst(s, bus, d)?,
        Halt => control::halt(s, bus),
        Stop => control::stop(s, bus),
        Di => control::di(s),
        Ei => control::ei(s),
        Prefix | Illegal => return Err(malformed(s, d)),
    }
    Ok(false)
}

pub(crate) fn malformed(s: &CpuState, d: &Decoded) -> CpuError {
    CpuError::MalformedOperand {
        mnemonic: d.mnemonic,
        pc: s.opcode_pc,
    }
}

pub(crate) fn operand<'d>(
    s: &CpuState,
    d: &'d Decoded,
    idx: usize,
) -> Result<&'d ResolvedOperand, CpuError> {
    d.operand(idx).ok_or_else(|| malformed(s, d))
}

fn value(s: &CpuState, d: &Decoded, op: &ResolvedOperand) -> Result<u16, CpuError> {
    op.value.ok_or_else(|| malformed(s, d))
}

/// Address referenced by a memory operand. `(HL+)`/`(HL-)` adjust HL.
fn effective_address(
    s: &mut CpuState,
    d: &Decoded,
    op: &ResolvedOperand,
) -> Result<Option<u16>, CpuError> {
    Ok(Some(match op.operand {
        Operand::Indirect(r) => s.reg16(r),
        Operand::IndirectInc => {
            let hl = s.regs.hl();
            s.regs.set_hl(hl.wrapping_add(1));
            hl
        }
        Operand::IndirectDec => {
            let hl = s.regs.hl();
            s.regs.set_hl(hl.wrapping_sub(1));
            hl
        }
        Operand::HighC => 0xFF00 | s.regs.c as u16,
        Operand::HighAddr8 => 0xFF00 | value(s, d, op)?,
        Operand::Addr16 => value(s, d, op)?,
        _ => return Ok(None),
    }))
}

/// Reads the 8-bit value of operand `idx`.
pub(crate) fn read8<B: MemoryBus>(
    s: &mut CpuState,
    bus: &mut B,
    d: &Decoded,
    idx: usize,
) -> Result<u8, CpuError> {
    let op = operand(s, d, idx)?;
    match op.operand {
        Operand::Reg8(r) => Ok(s.reg8(r)),
        Operand::Imm8 => Ok(value(s, d, op)? as u8),
        _ => match effective_address(s, d, op)? {
            Some(addr) => Ok(bus.read_byte(addr)),
            None => Err(malformed(s, d)),
        },
    }
}

/// Writes an 8-bit value to operand `idx`.
pub(crate) fn write8<B: MemoryBus>(
    s: &mut CpuState,
    bus: &mut B,
    d: &Decoded,
    idx: usize,
    val: u8,
) -> Result<(), CpuError> {
    let op = operand(s, d, idx)?;
    match op.operand {
        Operand::Reg8(r) => {
            s.set_reg8(r, val);
            Ok(())
        }
        _ => match effective_address(s, d, op)? {
            Some(addr) => {
                bus.write_byte(addr, val);
                Ok(())
            }
            None => Err(malformed(s, d)),
        },
    }
}

/// Read-modify-write on an 8-bit operand. `(HL)` is only addressed once.
pub(crate) fn modify8<B: MemoryBus>(
    s: &mut CpuState,
    bus: &mut B,
    d: &Decoded,
    idx: usize,
    f: impl FnOnce(&mut CpuState, u8) -> u8,
) -> Result<(), CpuError> {
    let op = operand(s, d, idx)?;
    match op.operand {
        Operand::Reg8(r) => {
            let val = s.reg8(r);
            let res = f(s, val);
            s.set_reg8(r, res);
        }
        Operand::Indirect(Reg16::HL) => {
            let addr = s.regs.hl();
            let val = bus.read_byte(addr);
            let res = f(s, val);
            bus.write_byte(addr, res);
        }
        _ => return Err(malformed(s, d)),
    }
    Ok(())
}

pub(crate) fn reg16_operand(
    s: &CpuState,
    d: &Decoded,
    idx: usize,
) -> Result<Reg16, CpuError> {
    match operand(s, d, idx)?.operand {
        Operand::Reg16(r) => Ok(r),
        _ => Err(malformed(s, d)),
    }
}

/// High byte goes to SP-1, low byte to SP-2.
pub(crate) fn push_word<B: MemoryBus>(s: &mut CpuState, bus: &mut B, val: u16) {
    let [lo, hi] = val.to_le_bytes();
    s.regs.sp = s.regs.sp.wrapping_sub(1);
    bus.write_byte(s.regs.sp, hi);
    s.regs.sp = s.regs.sp.wrapping_sub(1);
    bus.write_byte(s.regs.sp, lo);
}

pub(crate) fn pop_word<B: MemoryBus>(s: &mut CpuState, bus: &mut B) -> u16 {
    let lo = bus.read_byte(s.regs.sp);
    s.regs.sp = s.regs.sp.wrapping_add(1);
    let hi = bus.read_byte(s.regs.sp);
    s.regs.sp = s.regs.sp.wrapping_add(1);
    u16::from_le_bytes([lo, hi])
}
