//! Deterministic Game Boy / Game Boy Color emulation core.
//!
//! This crate contains the platform-agnostic emulator logic (CPU, system bus,
//! cartridge controllers, APU). Hosts drive it through the [`gameboy`] facade
//! and own everything that touches files, threads or audio devices.

/// Audio Processing Unit (APU) emulation.
pub mod apu;

/// System bus: memory map, OAM DMA and interrupt flag plumbing.
pub mod bus;

/// Cartridge mappers (MBC), header parsing and save payloads.
pub mod cartridge;

/// Injectable wall-clock sources used by the cartridge RTC.
pub mod clock;

/// SM83 CPU interpreter.
pub mod cpu;

/// Instruction decoder shared by the interpreter and the disassembler.
pub mod decoder;

/// ROM disassembly listing.
pub mod disasm;

/// Error types surfaced by the core.
pub mod error;

/// High-level facade that wires the CPU and bus into a single machine.
pub mod gameboy;

/// Hardware models and emulation mode selection.
pub mod hardware;

/// Interrupt sources, vectors and priority.
pub mod interrupts;

/// Joypad input register and interrupt behavior.
pub mod joypad;

/// Static opcode metadata tables.
pub mod opcodes;

/// LCD register and timing model.
pub mod ppu;

/// Serial port without a link partner.
pub mod serial;

/// Divider/timer unit.
pub mod timer;
