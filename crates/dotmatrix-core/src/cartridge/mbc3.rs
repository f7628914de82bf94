use log::debug;

use super::rtc::{RTC_CONTROL, RTC_SECONDS, Rtc};
use super::{CartRam, Mbc, ram_offset, rom_byte};
use crate::clock::Clock;
use crate::error::RtcError;

/// MBC3 and MBC30, with the optional real-time clock.
#[derive(Debug)]
pub struct Mbc3 {
    rom: Vec<u8>,
    ram: CartRam,
    ram_enable: bool,
    rom_bank: u8,
    /// RAM bank, or 0x08-0x0C for an RTC register.
    select: u8,
    latch_pending: bool,
    /// 8-bit ROM bank register and eight RAM banks.
    mbc30: bool,
    rtc: Option<Rtc>,
}

impl Mbc3 {
    pub fn new(rom: Vec<u8>, ram_size: usize, mbc30: bool, clock: Option<Box<dyn Clock>>) -> Self {
        Self {
            rom,
            ram: CartRam::new(ram_size),
            ram_enable: false,
            rom_bank: 1,
            select: 0,
            latch_pending: false,
            mbc30,
            rtc: clock.map(Rtc::new),
        }
    }

    pub fn rtc(&self) -> Option<&Rtc> {
        self.rtc.as_ref()
    }

    fn max_ram_bank(&self) -> u8 {
        if self.mbc30 { 0x07 } else { 0x03 }
    }

    fn rtc_selected(&self) -> Option<u8> {
        (self.rtc.is_some() && (RTC_SECONDS..=RTC_CONTROL).contains(&self.select))
            .then_some(self.select)
    }
}

impl Mbc for Mbc3 {
    fn read(&mut self, addr: u16) -> Option<u8> {
        match addr {
            0x0000..=0x3FFF => Some(rom_byte(&self.rom, 0, addr)),
            0x4000..=0x7FFF => Some(rom_byte(&self.rom, self.rom_bank as usize, addr)),
            0xA000..=0xBFFF => {
                if !self.ram_enable {
                    return Some(0xFF);
                }
                if let Some(reg) = self.rtc_selected() {
                    return self.rtc.as_ref().map(|rtc| rtc.read(reg));
                }
                Some(match self.ram_bank() {
                    Some(bank) => self.ram.get(ram_offset(&self.ram, bank, addr)).unwrap_or(0xFF),
                    None => 0xFF,
                })
            }
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
                self.rom_bank = if self.mbc30 { val } else { val & 0x7F };
                if self.rom_bank == 0 {
                    self.rom_bank = 1;
                }
                true
            }
            0x4000..=0x5FFF => {
                let select = val & 0x0F;
                if select != self.select && self.ram_enable {
                    self.ram.mark_dirty();
                }
                self.select = select;
                true
            }
            0x6000..=0x7FFF => {
                if val == 0 {
                    self.latch_pending = true;
                } else {
                    if val == 1
                        && self.latch_pending
                        && let Some(rtc) = self.rtc.as_mut()
                    {
                        rtc.latch();
                        self.ram.mark_dirty();
                    }
                    self.latch_pending = false;
                }
                true
            }
            0xA000..=0xBFFF => {
                if !self.ram_enable {
                    return true;
                }
                if let Some(reg) = self.rtc_selected() {
                    if let Some(rtc) = self.rtc.as_mut() {
                        rtc.write(reg, val);
                        self.ram.mark_dirty();
                    }
                } else if let Some(bank) = self.ram_bank() {
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
        self.select = 0;
        self.latch_pending = false;
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
        (self.ram_enable && !self.ram.is_empty() && self.select <= self.max_ram_bank())
            .then_some(self.select as usize)
    }

    fn has_rtc(&self) -> bool {
        self.rtc.is_some()
    }

    fn rtc_snapshot(&mut self) -> Option<Vec<u8>> {
        self.rtc.as_mut().map(Rtc::snapshot)
    }

    fn load_rtc_snapshot(&mut self, data: &[u8]) -> Result<(), RtcError> {
        match self.rtc.as_mut() {
            Some(rtc) => rtc.load_snapshot(data),
            None => {
                debug!("Cartridge has no RTC, snapshot ignored");
                Ok(())
            }
        }
    }
}
