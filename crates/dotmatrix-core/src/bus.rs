use log::debug;

use crate::apu::Apu;
use crate::cartridge::Cartridge;
use crate::cpu::MemoryBus;
use crate::hardware::Model;
use crate::interrupts::{Interrupt, InterruptFlags};
use crate::joypad::{Button, Joypad};
use crate::ppu::Ppu;
use crate::serial::Serial;
use crate::timer::Timer;

const WRAM_BANK_SIZE: usize = 0x1000;
const WRAM_BANKS: usize = 8;
const OAM_START: u16 = 0xFE00;
const OAM_LEN: u16 = 0xA0;

/// Internal divider left behind by the DMG boot ROM.
pub const POST_BOOT_DIVIDER: u16 = 0xABCC;

/// Hardware registers as the DMG boot ROM leaves them.
const POWER_ON_REGISTERS: [(u16, u8); 43] = [
    (0xFF00, 0xCF),
    (0xFF01, 0x00),
    (0xFF02, 0x7E),
    (0xFF04, 0xAB),
    (0xFF05, 0x00),
    (0xFF06, 0x00),
    (0xFF07, 0xF8),
    (0xFF0F, 0xE1),
    (0xFF10, 0x80),
    (0xFF11, 0xBF),
    (0xFF12, 0xF3),
    (0xFF13, 0xFF),
    (0xFF14, 0xBF),
    (0xFF16, 0x3F),
    (0xFF17, 0x00),
    (0xFF18, 0xFF),
    (0xFF19, 0xBF),
    (0xFF1A, 0x7F),
    (0xFF1B, 0xFF),
    (0xFF1C, 0x9F),
    (0xFF1D, 0xFF),
    (0xFF1E, 0xBF),
    (0xFF20, 0xFF),
    (0xFF21, 0x00),
    (0xFF22, 0x00),
    (0xFF23, 0xBF),
    (0xFF24, 0x77),
    (0xFF25, 0xF3),
    (0xFF26, 0xF1),
    (0xFF40, 0x91),
    (0xFF41, 0x85),
    (0xFF42, 0x00),
    (0xFF43, 0x00),
    (0xFF44, 0x00),
    (0xFF45, 0x00),
    (0xFF46, 0xFF),
    (0xFF47, 0xFC),
    (0xFF48, 0xFF),
    (0xFF49, 0xFF),
    (0xFF4A, 0x00),
    (0xFF4B, 0x00),
    (0xFF4D, 0x7E),
    (0xFFFF, 0x00),
];

/// Address decoding for the whole machine. Cartridge windows go to the
/// mapper first; anything it declines lands in the flat backing memory.
pub struct SystemBus {
    memory: Vec<u8>,
    wram: Vec<u8>,
    wram_bank: usize,
    cart: Option<Cartridge>,
    pub timer: Timer,
    pub ppu: Ppu,
    pub apu: Apu,
    pub joypad: Joypad,
    pub serial: Serial,
    if_reg: InterruptFlags,
    ie_reg: u8,
    /// KEY1 bit 0: a speed switch is armed for the next STOP.
    speed_switch_armed: bool,
    double_speed: bool,
    model: Model,
}

impl SystemBus {
    pub fn new(model: Model, sample_rate: u32, max_buffer_seconds: f32) -> Self {
        Self {
            memory: vec![0; 0x10000],
            wram: vec![0; WRAM_BANK_SIZE * WRAM_BANKS],
            wram_bank: 1,
            cart: None,
            timer: Timer::new(),
            ppu: Ppu::new(),
            apu: Apu::new(model, sample_rate, max_buffer_seconds),
            joypad: Joypad::new(),
            serial: Serial::new(model.is_cgb()),
            if_reg: InterruptFlags::default(),
            ie_reg: 0,
            speed_switch_armed: false,
            double_speed: false,
            model,
        }
    }

    /// Inserts a cartridge and brings the hardware registers to their
    /// post-boot state.
    pub fn load_cartridge(&mut self, cart: Cartridge) {
        self.apply_power_on_defaults();
        self.cart = Some(cart);
    }

    pub fn cartridge(&self) -> Option<&Cartridge> {
        self.cart.as_ref()
    }

    pub fn cartridge_mut(&mut self) -> Option<&mut Cartridge> {
        self.cart.as_mut()
    }

    pub fn take_cartridge(&mut self) -> Option<Cartridge> {
        self.cart.take()
    }

    pub fn model(&self) -> Model {
        self.model
    }

    pub fn is_double_speed(&self) -> bool {
        self.double_speed
    }

    pub fn apply_power_on_defaults(&mut self) {
        for &(addr, val) in POWER_ON_REGISTERS.iter() {
            match addr {
                // Writing DIV would clear it.
                0xFF04 => {
                    self.timer.set_divider(POST_BOOT_DIVIDER);
                    self.apu.set_divider_phase(POST_BOOT_DIVIDER);
                }
                // NR14 = 0xBF would retrigger channel 1.
                0xFF10..=0xFF3F => {}
                // Seed the register without starting a transfer.
                0xFF46 => self.memory[addr as usize] = val,
                0xFF4D => {
                    self.speed_switch_armed = false;
                    self.double_speed = false;
                }
                _ => self.write_byte(addr, val),
            }
        }
        self.apu.apply_power_on_defaults();
        self.wram_bank = 1;
    }

    fn wram_index(&self, addr: u16) -> usize {
        // Echo RAM at 0xE000-0xFDFF folds back onto 0xC000-0xDDFF.
        let offset = (addr as usize - 0xC000) & 0x1FFF;
        if offset < WRAM_BANK_SIZE {
            offset
        } else {
            self.wram_bank * WRAM_BANK_SIZE + (offset - WRAM_BANK_SIZE)
        }
    }

    /// Copies 160 bytes from `source_page << 8` into OAM at once.
    pub fn dma_transfer(&mut self, source_page: u8) {
        let src = (source_page as u16) << 8;
        for i in 0..OAM_LEN {
            let byte = self.read_byte(src.wrapping_add(i));
            self.memory[(OAM_START + i) as usize] = byte;
        }
    }

    /// Advances the peripherals by `cycles` CPU cycles. Returns `true` when
    /// the PPU finished a frame.
    pub fn tick(&mut self, cycles: u32) -> bool {
        self.timer.tick(cycles, &mut self.if_reg);
        self.serial.tick(cycles, &mut self.if_reg);

        // The LCD and APU run from the master clock, which does not double.
        let master = if self.double_speed {
            cycles / 2
        } else {
            cycles
        };
        self.apu.tick(master);
        self.ppu.step(master, &mut self.if_reg)
    }

    pub fn set_button(&mut self, button: Button, pressed: bool) {
        self.joypad.set_button(button, pressed, &mut self.if_reg);
    }

    /// Copy of the full address space as the CPU would see it.
    pub fn memory_snapshot(&mut self) -> Vec<u8> {
        (0..=0xFFFFu16).map(|addr| self.read_byte(addr)).collect()
    }
}

impl MemoryBus for SystemBus {
    fn read_byte(&mut self, addr: u16) -> u8 {
        let cgb = self.model.is_cgb();
        match addr {
            0x0000..=0x7FFF | 0xA000..=0xBFFF => self
                .cart
                .as_mut()
                .and_then(|c| c.read(addr))
                .unwrap_or(self.memory[addr as usize]),
            0xC000..=0xFDFF => self.wram[self.wram_index(addr)],
            0xFEA0..=0xFEFF => 0xFF,
            0xFF00 => self.joypad.read(),
            0xFF01 | 0xFF02 => self.serial.read(addr),
            0xFF04..=0xFF07 => self.timer.read(addr),
            0xFF0F => self.if_reg.register(),
            0xFF10..=0xFF3F => self.apu.read_register(addr).unwrap_or(0xFF),
            0xFF40..=0xFF45 | 0xFF47..=0xFF4B => self.ppu.read_reg(addr),
            0xFF4D if cgb => {
                let speed = if self.double_speed { 0x80 } else { 0x00 };
                0x7E | speed | self.speed_switch_armed as u8
            }
            0xFF70 if cgb => 0xF8 | self.wram_bank as u8,
            0xFF76 if cgb => self.apu.read_pcm12(),
            0xFF77 if cgb => self.apu.read_pcm34(),
            0xFF4D | 0xFF70 | 0xFF76 | 0xFF77 => 0xFF,
            0xFFFF => self.ie_reg,
            _ => self.memory[addr as usize],
        }
    }

    fn write_byte(&mut self, addr: u16, val: u8) {
        let cgb = self.model.is_cgb();
        match addr {
            0x0000..=0x7FFF | 0xA000..=0xBFFF => {
                let handled = self.cart.as_mut().is_some_and(|c| c.write(addr, val));
                if !handled {
                    self.memory[addr as usize] = val;
                }
            }
            0xC000..=0xFDFF => {
                let idx = self.wram_index(addr);
                self.wram[idx] = val;
            }
            0xFEA0..=0xFEFF => {}
            0xFF00 => self.joypad.write(val),
            0xFF01 | 0xFF02 => self.serial.write(addr, val),
            0xFF04 => {
                self.timer.reset_div(&mut self.if_reg);
                self.apu.handle_divider_reset();
            }
            0xFF05..=0xFF07 => self.timer.write(addr, val, &mut self.if_reg),
            0xFF0F => self.if_reg = InterruptFlags::from_bits(val),
            0xFF10..=0xFF3F => self.apu.write_register(addr, val),
            0xFF46 => {
                self.memory[addr as usize] = val;
                self.dma_transfer(val);
            }
            0xFF40..=0xFF45 | 0xFF47..=0xFF4B => self.ppu.write_reg(addr, val),
            0xFF4D if cgb => self.speed_switch_armed = val & 0x01 != 0,
            0xFF70 if cgb => {
                let bank = (val & 0x07) as usize;
                self.wram_bank = bank.max(1);
            }
            0xFF4D | 0xFF70 | 0xFF76 | 0xFF77 => {}
            0xFFFF => self.ie_reg = val,
            _ => self.memory[addr as usize] = val,
        }
    }

    fn interrupt_enable(&self) -> u8 {
        self.ie_reg
    }

    fn interrupt_flags(&self) -> u8 {
        self.if_reg.bits()
    }

    fn request_interrupt(&mut self, interrupt: Interrupt) {
        self.if_reg.request(interrupt);
    }

    fn acknowledge_interrupt(&mut self, interrupt: Interrupt) {
        self.if_reg.acknowledge(interrupt);
    }

    fn try_speed_switch(&mut self) -> bool {
        if !self.model.is_cgb() || !self.speed_switch_armed {
            return false;
        }
        self.speed_switch_armed = false;
        self.double_speed = !self.double_speed;
        self.timer.reset_div(&mut self.if_reg);
        self.apu.handle_divider_reset();
        debug!(
            "Speed switch: {} speed",
            if self.double_speed { "double" } else { "normal" }
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apu::DEFAULT_SAMPLE_RATE;

    fn bus(model: Model) -> SystemBus {
        let mut bus = SystemBus::new(model, DEFAULT_SAMPLE_RATE, 0.25);
        bus.apply_power_on_defaults();
        bus
    }

    #[test]
    fn power_on_registers() {
        let mut bus = bus(Model::Dmg);
        assert_eq!(bus.read_byte(0xFF04), 0xAB);
        assert_eq!(bus.read_byte(0xFF0F), 0xE1);
        assert_eq!(bus.read_byte(0xFF26), 0xF1);
        assert_eq!(bus.read_byte(0xFF40), 0x91);
        assert_eq!(bus.read_byte(0xFF47), 0xFC);
        assert_eq!(bus.read_byte(0xFF07), 0xF8);
        assert_eq!(bus.read_byte(0xFFFF), 0x00);
    }

    #[test]
    fn if_write_resyncs_pending_set() {
        let mut bus = bus(Model::Dmg);
        bus.write_byte(0xFF0F, 0x14);
        assert_eq!(bus.interrupt_flags(), 0x14);
        bus.acknowledge_interrupt(Interrupt::Timer);
        assert_eq!(bus.read_byte(0xFF0F), 0xF0);
        bus.request_interrupt(Interrupt::VBlank);
        assert_eq!(bus.read_byte(0xFF0F), 0xF1);
    }

    #[test]
    fn dma_copies_into_oam() {
        let mut bus = bus(Model::Dmg);
        for i in 0..0xA0u16 {
            bus.write_byte(0xC100 + i, i as u8);
        }
        bus.write_byte(0xFF46, 0xC1);
        assert_eq!(bus.read_byte(0xFE00), 0x00);
        assert_eq!(bus.read_byte(0xFE9F), 0x9F);
        assert_eq!(bus.read_byte(0xFF46), 0xC1);
    }

    #[test]
    fn unmapped_cartridge_space_falls_back_to_memory() {
        let mut bus = bus(Model::Dmg);
        bus.write_byte(0x0150, 0x3C);
        assert_eq!(bus.read_byte(0x0150), 0x3C);
    }

    #[test]
    fn echo_ram_and_cgb_wram_banks() {
        let mut bus = bus(Model::Cgb);
        bus.write_byte(0xC010, 0x11);
        assert_eq!(bus.read_byte(0xE010), 0x11);

        bus.write_byte(0xFF70, 0x02);
        bus.write_byte(0xD000, 0x22);
        bus.write_byte(0xFF70, 0x00);
        assert_eq!(bus.read_byte(0xFF70), 0xF9);
        assert_eq!(bus.read_byte(0xD000), 0x00);
        bus.write_byte(0xFF70, 0x02);
        assert_eq!(bus.read_byte(0xF000), 0x22);
    }

    #[test]
    fn div_write_resets_timer() {
        let mut bus = bus(Model::Dmg);
        bus.tick(1024);
        bus.write_byte(0xFF04, 0x55);
        assert_eq!(bus.read_byte(0xFF04), 0x00);
    }

    #[test]
    fn speed_switch_needs_cgb_and_key1() {
        let mut dmg = bus(Model::Dmg);
        dmg.write_byte(0xFF4D, 0x01);
        assert!(!dmg.try_speed_switch());
        assert_eq!(dmg.read_byte(0xFF4D), 0xFF);

        let mut cgb = bus(Model::Cgb);
        assert!(!cgb.try_speed_switch());
        cgb.write_byte(0xFF4D, 0x01);
        assert_eq!(cgb.read_byte(0xFF4D), 0x7F);
        assert!(cgb.try_speed_switch());
        assert!(cgb.is_double_speed());
        assert_eq!(cgb.read_byte(0xFF4D), 0xFE);
        assert_eq!(cgb.read_byte(0xFF04), 0x00);
    }

    #[test]
    fn double_speed_halves_lcd_time() {
        let mut cgb = bus(Model::Cgb);
        cgb.write_byte(0xFF4D, 0x01);
        cgb.try_speed_switch();
        let mut frames = 0;
        for _ in 0..(70_224 * 2) / 4 {
            if cgb.tick(4) {
                frames += 1;
            }
        }
        assert_eq!(frames, 1);
    }

    #[test]
    fn pcm_registers_are_cgb_only() {
        let mut dmg = bus(Model::Dmg);
        assert_eq!(dmg.read_byte(0xFF76), 0xFF);
        let mut cgb = bus(Model::Cgb);
        assert_eq!(cgb.read_byte(0xFF77), 0x00);
    }
}
