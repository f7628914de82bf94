use std::fmt;

use crate::hardware::Model;
use crate::opcodes::{Reg8, Reg16};

// Flag bits as documented in gbdev.io/pandocs/The_CPU_Flags.html
pub const FLAG_Z: u8 = 0x80;
pub const FLAG_N: u8 = 0x40;
pub const FLAG_H: u8 = 0x20;
pub const FLAG_C: u8 = 0x10;

// Post-boot CPU state from gbdev.io/pandocs/Power_Up_State.html
const BOOT_PC: u16 = 0x0100;
const BOOT_SP: u16 = 0xFFFE;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Registers {
    pub a: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub sp: u16,
    pub pc: u16,
}

impl Registers {
    pub fn hl(&self) -> u16 {
        u16::from_be_bytes([self.h, self.l])
    }

    pub fn set_hl(&mut self, val: u16) {
        [self.h, self.l] = val.to_be_bytes();
    }
}

/// The four flags held in the upper nibble of F. Keeping them as booleans
/// means F can never carry stray low-nibble bits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Flags {
    pub zero: bool,
    pub subtract: bool,
    pub half_carry: bool,
    pub carry: bool,
}

impl Flags {
    pub const fn from_bits(f: u8) -> Self {
        Self {
            zero: f & FLAG_Z != 0,
            subtract: f & FLAG_N != 0,
            half_carry: f & FLAG_H != 0,
            carry: f & FLAG_C != 0,
        }
    }

    pub const fn bits(self) -> u8 {
        (if self.zero { FLAG_Z } else { 0 })
            | (if self.subtract { FLAG_N } else { 0 })
            | (if self.half_carry { FLAG_H } else { 0 })
            | (if self.carry { FLAG_C } else { 0 })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CpuState {
    pub regs: Registers,
    pub flags: Flags,
    pub ime: bool,
    pub halted: bool,
    pub stopped: bool,
    pub cycles: u64,
    /// Countdown that turns IME on one instruction after `EI`.
    pub(crate) ime_enable_delay: u8,
    /// Set when `HALT` failed to halt: the next opcode byte is read twice.
    pub(crate) halt_bug: bool,
    /// Address of the instruction currently being executed.
    pub(crate) opcode_pc: u16,
}

impl Default for CpuState {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuState {
    /// Reset state: PC=0x0100, SP=0xFFFE, everything else cleared.
    pub fn new() -> Self {
        Self {
            regs: Registers {
                sp: BOOT_SP,
                pc: BOOT_PC,
                ..Registers::default()
            },
            flags: Flags::default(),
            ime: false,
            halted: false,
            stopped: false,
            cycles: 0,
            ime_enable_delay: 0,
            halt_bug: false,
            opcode_pc: BOOT_PC,
        }
    }

    /// Register contents left behind by the boot ROM of `model`.
    pub fn post_boot(model: Model) -> Self {
        let mut state = Self::new();
        let (af, bc, de, hl) = match model {
            Model::Dmg => (0x01B0, 0x0013, 0x00D8, 0x014D),
            Model::Cgb => (0x1180, 0x0000, 0x0008, 0x007C),
        };
        state.set_reg16(Reg16::AF, af);
        state.set_reg16(Reg16::BC, bc);
        state.set_reg16(Reg16::DE, de);
        state.set_reg16(Reg16::HL, hl);
        state
    }

    pub fn f(&self) -> u8 {
        self.flags.bits()
    }

    pub fn set_f(&mut self, val: u8) {
        self.flags = Flags::from_bits(val);
    }

    pub fn reg8(&self, r: Reg8) -> u8 {
        match r {
            Reg8::A => self.regs.a,
            Reg8::B => self.regs.b,
            Reg8::C => self.regs.c,
            Reg8::D => self.regs.d,
            Reg8::E => self.regs.e,
            Reg8::H => self.regs.h,
            Reg8::L => self.regs.l,
        }
    }

    pub fn set_reg8(&mut self, r: Reg8, val: u8) {
        match r {
            Reg8::A => self.regs.a = val,
            Reg8::B => self.regs.b = val,
            Reg8::C => self.regs.c = val,
            Reg8::D => self.regs.d = val,
            Reg8::E => self.regs.e = val,
            Reg8::H => self.regs.h = val,
            Reg8::L => self.regs.l = val,
        }
    }

    pub fn reg16(&self, r: Reg16) -> u16 {
        match r {
            Reg16::AF => u16::from_be_bytes([self.regs.a, self.f()]),
            Reg16::BC => u16::from_be_bytes([self.regs.b, self.regs.c]),
            Reg16::DE => u16::from_be_bytes([self.regs.d, self.regs.e]),
            Reg16::HL => self.regs.hl(),
            Reg16::SP => self.regs.sp,
        }
    }

    pub fn set_reg16(&mut self, r: Reg16, val: u16) {
        let [hi, lo] = val.to_be_bytes();
        match r {
            Reg16::AF => {
                self.regs.a = hi;
                self.set_f(lo);
            }
            Reg16::BC => [self.regs.b, self.regs.c] = [hi, lo],
            Reg16::DE => [self.regs.d, self.regs.e] = [hi, lo],
            Reg16::HL => self.regs.set_hl(val),
            Reg16::SP => self.regs.sp = val,
        }
    }
}

impl fmt::Display for CpuState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AF:{:04X} BC:{:04X} DE:{:04X} HL:{:04X} PC:{:04X} SP:{:04X} IME:{} HALT:{} STOP:{} CY:{}",
            self.reg16(Reg16::AF),
            self.reg16(Reg16::BC),
            self.reg16(Reg16::DE),
            self.reg16(Reg16::HL),
            self.regs.pc,
            self.regs.sp,
            self.ime as u8,
            self.halted as u8,
            self.stopped as u8,
            self.cycles
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn f_low_nibble_is_always_clear() {
        let mut state = CpuState::new();
        for value in 0..=255u8 {
            state.set_f(value);
            assert_eq!(state.f(), value & 0xF0);
            assert_eq!(Flags::from_bits(state.flags.bits()), state.flags);
        }
    }

    #[test]
    fn af_round_trip_masks_flags() {
        let mut state = CpuState::new();
        state.set_reg16(Reg16::AF, 0x12FF);
        assert_eq!(state.reg16(Reg16::AF), 0x12F0);
        assert!(state.flags.zero && state.flags.carry);
    }

    #[test]
    fn post_boot_registers() {
        let dmg = CpuState::post_boot(Model::Dmg);
        assert_eq!(dmg.reg16(Reg16::AF), 0x01B0);
        assert_eq!(dmg.reg16(Reg16::HL), 0x014D);
        assert_eq!(dmg.regs.pc, 0x0100);
        assert_eq!(dmg.regs.sp, 0xFFFE);
        assert!(!dmg.ime);

        let cgb = CpuState::post_boot(Model::Cgb);
        assert_eq!(cgb.regs.a, 0x11);
    }
}
