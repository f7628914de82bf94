use log::debug;

use super::header::is_mbc1_multicart;
use super::{CartRam, Mbc, ram_offset, rom_byte};

#[derive(Debug, Clone)]
pub struct Mbc1 {
    rom: Vec<u8>,
    ram: CartRam,
    ram_enable: bool,
    /// 5-bit BANK1 register, never zero.
    rom_bank: u8,
    /// 2-bit BANK2 register.
    bank2: u8,
    mode: u8,
    /// Multicart wiring: BANK1 contributes four bits instead of five.
    multicart: bool,
}

impl Mbc1 {
    pub fn new(rom: Vec<u8>, ram_size: usize) -> Self {
        let multicart = is_mbc1_multicart(&rom);
        if multicart {
            debug!("MBC1 multicart wiring detected");
        }
        Self {
            rom,
            ram: CartRam::new(ram_size),
            ram_enable: false,
            rom_bank: 1,
            bank2: 0,
            mode: 0,
            multicart,
        }
    }

    pub fn is_multicart(&self) -> bool {
        self.multicart
    }

    fn bank2_shift(&self) -> u32 {
        if self.multicart { 4 } else { 5 }
    }
}

impl Mbc for Mbc1 {
    fn read(&mut self, addr: u16) -> Option<u8> {
        match addr {
            0x0000..=0x3FFF => Some(rom_byte(&self.rom, self.rom_banks().0, addr)),
            0x4000..=0x7FFF => Some(rom_byte(&self.rom, self.rom_banks().1, addr)),
            0xA000..=0xBFFF => Some(match self.ram_bank() {
                Some(bank) => self.ram.get(ram_offset(&self.ram, bank, addr)).unwrap_or(0xFF),
                None => 0xFF,
            }),
            _ => None,
        }
    }

    fn write(&mut self, addr: u16, val: u8) -> bool {
        match addr {
            0x0000..=0x1FFF => {
                self.ram_enable = val & 0x0F == 0x0A;
                true
            }
            0x2000..=0x3FFF => {
                self.rom_bank = val & 0x1F;
                if self.rom_bank == 0 {
                    self.rom_bank = 1;
                }
                true
            }
            0x4000..=0x5FFF => {
                let bank2 = val & 0x03;
                if bank2 != self.bank2 && self.mode == 1 && self.ram_enable {
                    self.ram.mark_dirty();
                }
                self.bank2 = bank2;
                true
            }
            0x6000..=0x7FFF => {
                let mode = val & 0x01;
                if mode != self.mode {
                    debug!("MBC1 banking mode {mode}");
                    if self.ram_enable {
                        self.ram.mark_dirty();
                    }
                }
                self.mode = mode;
                true
            }
            0xA000..=0xBFFF => {
                if let Some(bank) = self.ram_bank() {
                    let idx = ram_offset(&self.ram, bank, addr);
                    self.ram.set(idx, val);
                }
                true
            }
            _ => false,
        }
    }

    fn reset(&mut self) {
        self.ram_enable = false;
        self.rom_bank = 1;
        self.bank2 = 0;
        self.mode = 0;
    }

    fn ram(&self) -> &CartRam {
        &self.ram
    }

    fn ram_mut(&mut self) -> &mut CartRam {
        &mut self.ram
    }

    fn rom(&self) -> &[u8] {
        &self.rom
    }

    fn rom_banks(&self) -> (usize, usize) {
        let high = (self.bank2 as usize) << self.bank2_shift();
        let low = if self.mode == 0 { 0 } else { high };
        let bank1 = if self.multicart {
            self.rom_bank as usize & 0x0F
        } else {
            self.rom_bank as usize
        };
        (low, high | bank1)
    }

    fn ram_bank(&self) -> Option<usize> {
        if !self.ram_enable || self.ram.is_empty() {
            return None;
        }
        Some(if self.mode == 0 { 0 } else { self.bank2 as usize })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn banked_rom(banks: usize) -> Vec<u8> {
        let mut rom = vec![0u8; banks * 0x4000];
        for bank in 0..banks {
            rom[bank * 0x4000] = bank as u8;
        }
        rom
    }

    fn multicart_rom() -> Vec<u8> {
        let mut rom = banked_rom(64);
        for game in 0..4 {
            let base = game * 0x10 * 0x4000 + 0x104;
            rom[base..base + 4].copy_from_slice(&[0xCE, 0xED, 0x66, 0x66]);
        }
        rom
    }

    #[test]
    fn bank_zero_aliases_to_one() {
        let mut mbc = Mbc1::new(banked_rom(64), 0);
        mbc.write(0x2000, 0x00);
        assert_eq!(mbc.read(0x4000), Some(1));
        mbc.write(0x2000, 0x20);
        assert_eq!(mbc.read(0x4000), Some(1));
        mbc.write(0x2000, 0x05);
        assert_eq!(mbc.read(0x4000), Some(5));
    }

    #[test]
    fn upper_bits_extend_rom_bank() {
        let mut mbc = Mbc1::new(banked_rom(128), 0);
        mbc.write(0x4000, 0x01);
        mbc.write(0x2000, 0x00);
        assert_eq!(mbc.read(0x4000), Some(0x21));
        assert_eq!(mbc.read(0x0000), Some(0));

        mbc.write(0x6000, 0x01);
        assert_eq!(mbc.read(0x0000), Some(0x20));
    }

    #[test]
    fn multicart_uses_four_bit_low_bank() {
        let mut mbc = Mbc1::new(multicart_rom(), 0);
        assert!(mbc.is_multicart());
        mbc.write(0x2000, 0x00);
        assert_eq!(mbc.read(0x4000), Some(1));

        mbc.write(0x4000, 0x01);
        mbc.write(0x2000, 0x12);
        assert_eq!(mbc.read(0x4000), Some(0x12));

        mbc.write(0x6000, 0x01);
        assert_eq!(mbc.read(0x0000), Some(0x10));
    }

    #[test]
    fn ram_gated_and_banked_in_mode_one() {
        let mut mbc = Mbc1::new(banked_rom(4), 0x8000);
        assert_eq!(mbc.read(0xA000), Some(0xFF));
        mbc.write(0xA000, 0x11);
        assert!(!mbc.ram().is_dirty());

        mbc.write(0x0000, 0x0A);
        mbc.write(0xA000, 0x11);
        mbc.write(0x6000, 0x01);
        mbc.write(0x4000, 0x02);
        assert_eq!(mbc.read(0xA000), Some(0x00));
        mbc.write(0xA000, 0x22);
        assert_eq!(mbc.ram().get(0x4000), Some(0x22));

        mbc.write(0x6000, 0x00);
        assert_eq!(mbc.read(0xA000), Some(0x11));
        assert!(mbc.ram().is_dirty());
    }
}
