use thiserror::Error;

use crate::opcodes::Mnemonic;

/// Fatal interpreter failures. These indicate a guest that executed
/// something the interpreter cannot honor, and stop the current run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CpuError {
    #[error("illegal opcode {opcode:#04X} at {pc:#06X}")]
    IllegalOpcode { opcode: u8, pc: u16 },

    #[error("malformed operands for {mnemonic:?} at {pc:#06X}")]
    MalformedOperand { mnemonic: Mnemonic, pc: u16 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CartridgeError {
    #[error("ROM image is too short ({len} bytes, need at least 0x150)")]
    RomTooShort { len: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RtcError {
    #[error("RTC payload has unsupported length {len} (expected 48, 13 or 5)")]
    InvalidLength { len: usize },
}
