use super::{CpuState, Flags, MemoryBus, malformed, modify8, operand, read8};
use crate::decoder::Decoded;
use crate::error::CpuError;
use crate::opcodes::{Mnemonic, Operand};

pub(super) fn logic<B: MemoryBus>(s: &mut CpuState, bus: &mut B, d: &Decoded) -> Result<(), CpuError> {
    let val = read8(s, bus, d, 1)?;
    let (res, half_carry) = match d.mnemonic {
        Mnemonic::And => (s.regs.a & val, true),
        Mnemonic::Xor => (s.regs.a ^ val, false),
        Mnemonic::Or => (s.regs.a | val, false),
        _ => return Err(malformed(s, d)),
    };
    s.regs.a = res;
    s.flags = Flags {
        zero: res == 0,
        subtract: false,
        half_carry,
        carry: false,
    };
    Ok(())
}

pub(super) fn cpl(s: &mut CpuState) {
    s.regs.a = !s.regs.a;
    s.flags.subtract = true;
    s.flags.half_carry = true;
}

pub(super) fn scf(s: &mut CpuState) {
    s.flags.subtract = false;
    s.flags.half_carry = false;
    s.flags.carry = true;
}

pub(super) fn ccf(s: &mut CpuState) {
    s.flags.subtract = false;
    s.flags.half_carry = false;
    s.flags.carry = !s.flags.carry;
}

/// `BIT`, `RES` and `SET`.
pub(super) fn bit_op<B: MemoryBus>(s: &mut CpuState, bus: &mut B, d: &Decoded) -> Result<(), CpuError> {
    let Operand::Bit(bit) = operand(s, d, 0)?.operand else {
        return Err(malformed(s, d));
    };
    let mask = 1u8 << (bit & 7);
    match d.mnemonic {
        Mnemonic::Bit => {
            let val = read8(s, bus, d, 1)?;
            s.flags.zero = val & mask == 0;
            s.flags.subtract = false;
            s.flags.half_carry = true;
            Ok(())
        }
        Mnemonic::Res => modify8(s, bus, d, 1, |_, v| v & !mask),
        Mnemonic::Set => modify8(s, bus, d, 1, |_, v| v | mask),
        _ => Err(malformed(s, d)),
    }
}
