use std::collections::BTreeMap;

use log::{info, warn};

use crate::apu::{DEFAULT_MAX_BUFFER_SECONDS, DEFAULT_SAMPLE_RATE};
use crate::bus::SystemBus;
use crate::cartridge::{Cartridge, CartridgeHeader, SavePayload};
use crate::clock::{Clock, SystemClock};
use crate::cpu::{Cpu, CpuState};
use crate::disasm;
use crate::error::{CartridgeError, CpuError};
use crate::hardware::{CYCLES_PER_FRAME, EmulationMode, Model};
use crate::joypad::Button;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmulatorConfig {
    pub mode: EmulationMode,
    /// Internal mixing rate of the APU.
    pub sample_rate: u32,
    /// Audio kept buffered when nobody drains it.
    pub max_buffer_seconds: f32,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            mode: EmulationMode::Auto,
            sample_rate: DEFAULT_SAMPLE_RATE,
            max_buffer_seconds: DEFAULT_MAX_BUFFER_SECONDS,
        }
    }
}

pub struct GameBoy {
    pub cpu: Cpu,
    pub bus: SystemBus,
    config: EmulatorConfig,
    model: Model,
    running: bool,
}

impl GameBoy {
    pub fn new(config: EmulatorConfig) -> Self {
        let model = config.mode.resolve(false);
        Self {
            cpu: Cpu::post_boot(model),
            bus: SystemBus::new(model, config.sample_rate, config.max_buffer_seconds),
            config,
            model,
            running: false,
        }
    }

    pub fn config(&self) -> &EmulatorConfig {
        &self.config
    }

    pub fn model(&self) -> Model {
        self.model
    }

    /// Loads a ROM whose RTC, if any, follows the host clock.
    pub fn load_rom(&mut self, rom: Vec<u8>) -> Result<(), CartridgeError> {
        self.load_rom_with_clock(rom, Box::new(SystemClock))
    }

    pub fn load_rom_with_clock(
        &mut self,
        rom: Vec<u8>,
        clock: Box<dyn Clock>,
    ) -> Result<(), CartridgeError> {
        let cart = Cartridge::from_rom(rom, clock)?;
        self.model = self.config.mode.resolve(cart.header().cgb());
        self.power_on(Some(cart));
        self.running = false;
        Ok(())
    }

    /// Rebuilds CPU and bus in their post-boot state around `cart`.
    fn power_on(&mut self, cart: Option<Cartridge>) {
        self.cpu = Cpu::post_boot(self.model);
        self.bus = SystemBus::new(
            self.model,
            self.config.sample_rate,
            self.config.max_buffer_seconds,
        );
        match cart {
            Some(cart) => self.bus.load_cartridge(cart),
            None => self.bus.apply_power_on_defaults(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.bus.cartridge().is_some()
    }

    /// Header of the loaded ROM.
    pub fn rom_info(&self) -> Option<&CartridgeHeader> {
        self.bus.cartridge().map(Cartridge::header)
    }

    /// Resets the machine, keeping the cartridge. A hard reset also clears
    /// cartridge RAM that has no battery.
    pub fn reset(&mut self, hard: bool) {
        let mut cart = self.bus.take_cartridge();
        if let Some(cart) = cart.as_mut() {
            cart.reset(hard);
        }
        self.power_on(cart);
        info!("Reset ({})", if hard { "hard" } else { "soft" });
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    pub fn pause(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Executes one CPU step and advances the rest of the machine by the
    /// same time. Returns the cycles taken and whether a frame completed.
    fn step(&mut self) -> Result<(u32, bool), CpuError> {
        match self.cpu.step(&mut self.bus) {
            Ok(cycles) => {
                let frame = self.bus.tick(cycles);
                Ok((cycles, frame))
            }
            Err(e) => {
                self.running = false;
                warn!("Execution stopped: {e}");
                Err(e)
            }
        }
    }

    /// Runs a single instruction (or interrupt dispatch, or idle slot).
    pub fn step_instruction(&mut self) -> Result<u32, CpuError> {
        self.step().map(|(cycles, _)| cycles)
    }

    /// Runs until the LCD completes a frame. Returns the CPU cycles spent.
    pub fn step_frame(&mut self) -> Result<u32, CpuError> {
        // The PPU reports frames even with the LCD off; the bound only
        // guards against a stalled tick source.
        let limit = CYCLES_PER_FRAME * 4;
        let mut total = 0;
        while total < limit {
            let (cycles, frame) = self.step()?;
            total += cycles;
            if frame {
                break;
            }
        }
        Ok(total)
    }

    /// Runs for at least `cycles` CPU cycles.
    pub fn run_cycles(&mut self, cycles: u64) -> Result<u64, CpuError> {
        let mut total = 0u64;
        while total < cycles {
            total += self.step_instruction()? as u64;
        }
        Ok(total)
    }

    pub fn cpu_state(&self) -> CpuState {
        self.cpu.state.clone()
    }

    pub fn memory_snapshot(&mut self) -> Vec<u8> {
        self.bus.memory_snapshot()
    }

    pub fn frames(&self) -> u64 {
        self.bus.ppu.frames()
    }

    pub fn set_button(&mut self, button: Button, pressed: bool) {
        self.bus.set_button(button, pressed);
    }

    pub fn take_serial_output(&mut self) -> Vec<u8> {
        self.bus.serial.take_output()
    }

    /// Interleaved stereo samples resampled to `sample_rate`.
    pub fn flush_samples(&mut self, sample_rate: u32, frames: usize) -> Vec<f32> {
        self.bus.apu.flush_samples(sample_rate, frames)
    }

    /// Battery RAM and RTC state, or `None` when the cartridge keeps none.
    pub fn save(&mut self) -> Option<SavePayload> {
        self.bus.cartridge_mut().and_then(Cartridge::save)
    }

    pub fn load_save(&mut self, payload: &SavePayload) {
        match self.bus.cartridge_mut() {
            Some(cart) => cart.load_save(payload),
            None => warn!("Ignoring save data: no cartridge loaded"),
        }
    }

    /// Whether cartridge RAM changed since the last [`GameBoy::clear_save_dirty`].
    pub fn is_save_dirty(&self) -> bool {
        self.bus.cartridge().is_some_and(Cartridge::is_dirty)
    }

    pub fn clear_save_dirty(&mut self) {
        if let Some(cart) = self.bus.cartridge_mut() {
            cart.clear_dirty();
        }
    }

    /// Listing of the loaded ROM keyed by file offset.
    pub fn disassemble_rom(&self) -> BTreeMap<u32, String> {
        self.bus
            .cartridge()
            .map(|cart| disasm::listing(cart.rom()))
            .unwrap_or_default()
    }
}

impl Default for GameBoy {
    fn default() -> Self {
        Self::new(EmulatorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn rom(cart_type: u8, ram_code: u8, program: &[u8]) -> Vec<u8> {
        let mut rom = vec![0u8; 0x8000];
        rom[0x147] = cart_type;
        rom[0x149] = ram_code;
        rom[0x100..0x100 + program.len()].copy_from_slice(program);
        rom
    }

    #[test]
    fn load_applies_post_boot_state() {
        let mut gb = GameBoy::default();
        gb.load_rom(rom(0x00, 0, &[0x00])).unwrap();
        let cpu = gb.cpu_state();
        assert_eq!(cpu.regs.pc, 0x0100);
        assert_eq!(cpu.regs.a, 0x01);
        assert_eq!(gb.model(), Model::Dmg);
        assert!(!gb.is_running());
    }

    #[test]
    fn illegal_opcode_pauses() {
        let mut gb = GameBoy::default();
        gb.load_rom(rom(0x00, 0, &[0xD3])).unwrap();
        gb.start();
        assert!(gb.step_frame().is_err());
        assert!(!gb.is_running());
    }

    #[test]
    fn step_frame_runs_one_frame() {
        let mut gb = GameBoy::default();
        // JR -2
        gb.load_rom(rom(0x00, 0, &[0x18, 0xFE])).unwrap();
        let before = gb.frames();
        let cycles = gb.step_frame().unwrap();
        assert_eq!(gb.frames(), before + 1);
        assert!(cycles <= CYCLES_PER_FRAME);
    }

    #[test]
    fn soft_reset_keeps_battery_ram() {
        let mut gb = GameBoy::default();
        // LD A,$0A; LD ($0000),A; LD A,$42; LD ($A000),A
        let program = [0x3E, 0x0A, 0xEA, 0x00, 0x00, 0x3E, 0x42, 0xEA, 0x00, 0xA0];
        gb.load_rom_with_clock(rom(0x03, 0x02, &program), Box::new(ManualClock::new(0)))
            .unwrap();
        for _ in 0..4 {
            gb.step_instruction().unwrap();
        }
        assert!(gb.is_save_dirty());
        gb.reset(true);
        let save = gb.save().unwrap();
        assert_eq!(save.battery[0], 0x42);
        assert_eq!(save.rtc, None);
    }

    #[test]
    fn disassembles_loaded_rom() {
        let mut gb = GameBoy::default();
        assert!(gb.disassemble_rom().is_empty());
        gb.load_rom(rom(0x00, 0, &[0xC3, 0x50, 0x01])).unwrap();
        assert_eq!(gb.disassemble_rom()[&0x100], "JP $0150  ; entry point");
    }
}
