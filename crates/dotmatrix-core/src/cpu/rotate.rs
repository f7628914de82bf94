use super::{CpuState, Flags, MemoryBus, malformed, modify8};
use crate::decoder::Decoded;
use crate::error::CpuError;
use crate::opcodes::Mnemonic;

/// Shared shifter. Returns the result and the bit shifted out.
fn shift_value(mnemonic: Mnemonic, val: u8, carry_in: bool) -> Option<(u8, bool)> {
    let cin = carry_in as u8;
    Some(match mnemonic {
        Mnemonic::Rlc | Mnemonic::Rlca => (val.rotate_left(1), val & 0x80 != 0),
        Mnemonic::Rrc | Mnemonic::Rrca => (val.rotate_right(1), val & 0x01 != 0),
        Mnemonic::Rl | Mnemonic::Rla => ((val << 1) | cin, val & 0x80 != 0),
        Mnemonic::Rr | Mnemonic::Rra => ((val >> 1) | (cin << 7), val & 0x01 != 0),
        Mnemonic::Sla => (val << 1, val & 0x80 != 0),
        Mnemonic::Sra => ((val >> 1) | (val & 0x80), val & 0x01 != 0),
        Mnemonic::Srl => (val >> 1, val & 0x01 != 0),
        Mnemonic::Swap => (val.rotate_left(4), false),
        _ => return None,
    })
}

/// `RLCA`/`RRCA`/`RLA`/`RRA`. Unlike the CB forms these always clear Z.
pub(super) fn accumulator(s: &mut CpuState, mnemonic: Mnemonic) {
    if let Some((res, carry)) = shift_value(mnemonic, s.regs.a, s.flags.carry) {
        s.regs.a = res;
        s.flags = Flags {
            zero: false,
            subtract: false,
            half_carry: false,
            carry,
        };
    }
}

pub(super) fn shift<B: MemoryBus>(s: &mut CpuState, bus: &mut B, d: &Decoded) -> Result<(), CpuError> {
    if shift_value(d.mnemonic, 0, false).is_none() {
        return Err(malformed(s, d));
    }
    let mnemonic = d.mnemonic;
    modify8(s, bus, d, 0, |s, v| {
        let (res, carry) = shift_value(mnemonic, v, s.flags.carry).unwrap_or((v, false));
        s.flags = Flags {
            zero: res == 0,
            subtract: false,
            half_carry: false,
            carry,
        };
        res
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotates_through_carry() {
        assert_eq!(shift_value(Mnemonic::Rl, 0x80, false), Some((0x00, true)));
        assert_eq!(shift_value(Mnemonic::Rl, 0x01, true), Some((0x03, false)));
        assert_eq!(shift_value(Mnemonic::Rr, 0x01, true), Some((0x80, true)));
    }

    #[test]
    fn arithmetic_shift_keeps_sign() {
        assert_eq!(shift_value(Mnemonic::Sra, 0x81, false), Some((0xC0, true)));
        assert_eq!(shift_value(Mnemonic::Srl, 0x81, false), Some((0x40, true)));
        assert_eq!(shift_value(Mnemonic::Swap, 0xF1, true), Some((0x1F, false)));
    }

    #[test]
    fn accumulator_rotate_clears_zero() {
        let mut s = CpuState::new();
        s.regs.a = 0x80;
        accumulator(&mut s, Mnemonic::Rla);
        assert_eq!(s.regs.a, 0x00);
        assert!(!s.flags.zero);
        assert!(s.flags.carry);
    }
}
