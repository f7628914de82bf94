use super::{CartRam, Mbc, rom_byte};

const MBC2_RAM_SIZE: usize = 0x200;

/// MBC2: 4-bit ROM bank and 512 x 4-bit built-in RAM.
#[derive(Debug, Clone)]
pub struct Mbc2 {
    rom: Vec<u8>,
    ram: CartRam,
    ram_enable: bool,
    rom_bank: u8,
}

impl Mbc2 {
    pub fn new(rom: Vec<u8>) -> Self {
        Self {
            rom,
            ram: CartRam::new(MBC2_RAM_SIZE),
            ram_enable: false,
            rom_bank: 1,
        }
    }
}

impl Mbc for Mbc2 {
    fn read(&mut self, addr: u16) -> Option<u8> {
        match addr {
            0x0000..=0x3FFF => Some(rom_byte(&self.rom, 0, addr)),
            0x4000..=0x7FFF => Some(rom_byte(&self.rom, self.rom_bank as usize, addr)),
            0xA000..=0xBFFF => Some(if self.ram_enable {
                // Mirrored across the whole window; the upper nibble is open bus.
                let idx = (addr as usize - 0xA000) & (MBC2_RAM_SIZE - 1);
                0xF0 | (self.ram.get(idx).unwrap_or(0x0F) & 0x0F)
            } else {
                0xFF
            }),
            _ => None,
        }
    }

    fn write(&mut self, addr: u16, val: u8) -> bool {
        match addr {
            // Address bit 8 picks RAMG (clear) or ROMB (set).
            0x0000..=0x3FFF => {
                if addr & 0x0100 == 0 {
                    self.ram_enable = val & 0x0F == 0x0A;
                } else {
                    self.rom_bank = val & 0x0F;
                    if self.rom_bank == 0 {
                        self.rom_bank = 1;
                    }
                }
                true
            }
            0x4000..=0x7FFF => true,
            0xA000..=0xBFFF => {
                if self.ram_enable {
                    let idx = (addr as usize - 0xA000) & (MBC2_RAM_SIZE - 1);
                    self.ram.set(idx, val & 0x0F);
                }
                true
            }
            _ => false,
        }
    }

    fn reset(&mut self) {
        self.ram_enable = false;
        self.rom_bank = 1;
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
        self.ram_enable.then_some(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_bit_eight_selects_register() {
        let mut rom = vec![0u8; 16 * 0x4000];
        rom[3 * 0x4000] = 0x33;
        let mut mbc = Mbc2::new(rom);

        mbc.write(0x0100, 0x03);
        assert_eq!(mbc.read(0x4000), Some(0x33));
        assert_eq!(mbc.read(0xA000), Some(0xFF));

        mbc.write(0x0000, 0x0A);
        mbc.write(0xA001, 0xAB);
        assert_eq!(mbc.read(0xA001), Some(0xFB));
        assert_eq!(mbc.read(0xA201), Some(0xFB));
        assert_eq!(mbc.ram().get(1), Some(0x0B));
    }
}
