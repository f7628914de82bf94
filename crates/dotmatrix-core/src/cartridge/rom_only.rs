use super::{CartRam, Mbc};

/// 32 KiB carts without a mapper, optionally with one fixed RAM window.
#[derive(Debug, Clone)]
pub struct RomOnly {
    rom: Vec<u8>,
    ram: CartRam,
}

impl RomOnly {
    pub fn new(rom: Vec<u8>, ram_size: usize) -> Self {
        Self {
            rom,
            ram: CartRam::new(ram_size.min(0x2000)),
        }
    }
}

impl Mbc for RomOnly {
    fn read(&mut self, addr: u16) -> Option<u8> {
        match addr {
            0x0000..=0x7FFF => Some(self.rom.get(addr as usize).copied().unwrap_or(0xFF)),
            0xA000..=0xBFFF if !self.ram.is_empty() => {
                let idx = (addr as usize - 0xA000) % self.ram.len();
                self.ram.get(idx)
            }
            _ => None,
        }
    }

    fn write(&mut self, addr: u16, val: u8) -> bool {
        match addr {
            0x0000..=0x7FFF => true,
            0xA000..=0xBFFF if !self.ram.is_empty() => {
                let idx = (addr as usize - 0xA000) % self.ram.len();
                self.ram.set(idx, val);
                true
            }
            _ => false,
        }
    }

    fn reset(&mut self) {}

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
        (0, 1)
    }

    fn ram_bank(&self) -> Option<usize> {
        (!self.ram.is_empty()).then_some(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ram_window_only_when_present() {
        let mut rom = vec![0u8; 0x8000];
        rom[0x4000] = 0x42;

        let mut bare = RomOnly::new(rom.clone(), 0);
        assert_eq!(bare.read(0x4000), Some(0x42));
        assert_eq!(bare.read(0xA000), None);
        assert!(!bare.write(0xA000, 1));
        assert!(bare.write(0x2000, 5));
        assert_eq!(bare.read(0x4000), Some(0x42));

        let mut with_ram = RomOnly::new(rom, 0x2000);
        assert!(with_ram.write(0xA123, 0x99));
        assert_eq!(with_ram.read(0xA123), Some(0x99));
        assert!(with_ram.ram().is_dirty());
    }
}
