use super::{CartRam, Mbc, ram_offset, rom_byte};

/// MBC5: 9-bit ROM bank where bank 0 is selectable, 4-bit RAM bank.
#[derive(Debug, Clone)]
pub struct Mbc5 {
    rom: Vec<u8>,
    ram: CartRam,
    ram_enable: bool,
    rom_bank: u16,
    ram_bank: u8,
}

impl Mbc5 {
    pub fn new(rom: Vec<u8>, ram_size: usize) -> Self {
        Self {
            rom,
            ram: CartRam::new(ram_size),
            ram_enable: false,
            rom_bank: 1,
            ram_bank: 0,
        }
    }
}

impl Mbc for Mbc5 {
    fn read(&mut self, addr: u16) -> Option<u8> {
        match addr {
            0x0000..=0x3FFF => Some(rom_byte(&self.rom, 0, addr)),
            0x4000..=0x7FFF => Some(rom_byte(&self.rom, self.rom_bank as usize, addr)),
            0xA000..=0xBFFF => Some(match self.ram_bank() {
                Some(bank) => self.ram.get(ram_offset(&self.ram, bank, addr)).unwrap_or(0xFF),
                None => 0xFF,
            }),
            _ => None,
        }
    }

    fn write(&mut self, addr: u16, val: u8) -> bool {
        match addr {
            0x0000..=0x1FFF => self.ram_enable = val & 0x0F == 0x0A,
            0x2000..=0x2FFF => self.rom_bank = (self.rom_bank & 0x100) | val as u16,
            0x3000..=0x3FFF => {
                self.rom_bank = (self.rom_bank & 0xFF) | (((val & 0x01) as u16) << 8)
            }
            0x4000..=0x5FFF => {
                let bank = val & 0x0F;
                if bank != self.ram_bank && self.ram_enable {
                    self.ram.mark_dirty();
                }
                self.ram_bank = bank;
            }
            0x6000..=0x7FFF => {}
            0xA000..=0xBFFF => {
                if let Some(bank) = self.ram_bank() {
                    let idx = ram_offset(&self.ram, bank, addr);
                    self.ram.set(idx, val);
                }
            }
            _ => return false,
        }
        true
    }

    fn reset(&mut self) {
        self.ram_enable = false;
        self.rom_bank = 1;
        self.ram_bank = 0;
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
        (0, self.rom_bank as usize)
    }

    fn ram_bank(&self) -> Option<usize> {
        (self.ram_enable && !self.ram.is_empty()).then_some(self.ram_bank as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nine_bit_bank_and_bank_zero() {
        let mut rom = vec![0u8; 512 * 0x4000];
        rom[0x100 * 0x4000] = 0xAA;
        rom[0x4000 + 1] = 0x00;
        rom[1] = 0x5A;
        let mut mbc = Mbc5::new(rom, 0);

        mbc.write(0x2000, 0x00);
        assert_eq!(mbc.read(0x4001), Some(0x5A));
        mbc.write(0x3000, 0x01);
        assert_eq!(mbc.read(0x4000), Some(0xAA));
        assert_eq!(mbc.rom_banks(), (0, 0x100));
    }

    #[test]
    fn sixteen_ram_banks() {
        let mut mbc = Mbc5::new(vec![0u8; 0x8000], 0x20000);
        mbc.write(0x0000, 0x0A);
        mbc.write(0x4000, 0x1F);
        mbc.write(0xBFFF, 0x42);
        assert_eq!(mbc.ram().get(15 * 0x2000 + 0x1FFF), Some(0x42));
        assert_eq!(mbc.ram_bank(), Some(15));
    }
}
