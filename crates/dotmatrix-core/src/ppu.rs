//! LCD controller registers and mode timing. Pixels are not rendered; VRAM
//! and OAM contents live in the bus memory and are left untouched.

use crate::hardware::CYCLES_PER_FRAME;
use crate::interrupts::{Interrupt, InterruptFlags};

// Timing constants per LCD mode in T-cycles
const MODE0_CYCLES: u32 = 204; // HBlank
const MODE1_CYCLES: u32 = 456; // One line during VBlank
const MODE2_CYCLES: u32 = 80; // OAM scan
const MODE3_CYCLES: u32 = 172; // Pixel transfer

const SCREEN_HEIGHT: u8 = 144;
const VBLANK_LINES: u8 = 10;

// LCD modes used in the `mode` field
const MODE_HBLANK: u8 = 0;
const MODE_VBLANK: u8 = 1;
const MODE_OAM: u8 = 2;
const MODE_TRANSFER: u8 = 3;

#[derive(Debug, Clone)]
pub struct Ppu {
    lcdc: u8,
    stat: u8,
    scy: u8,
    scx: u8,
    ly: u8,
    lyc: u8,
    bgp: u8,
    obp0: u8,
    obp1: u8,
    wy: u8,
    wx: u8,
    lyc_eq_ly: bool,
    mode: u8,
    mode_clock: u32,
    /// Cycles counted while the LCD is off, so hosts still see frames.
    off_clock: u32,
    stat_irq_line: bool,
    frames: u64,
}

impl Default for Ppu {
    fn default() -> Self {
        Self::new()
    }
}

impl Ppu {
    pub fn new() -> Self {
        Self {
            lcdc: 0,
            stat: 0,
            scy: 0,
            scx: 0,
            ly: 0,
            lyc: 0,
            bgp: 0,
            obp0: 0,
            obp1: 0,
            wy: 0,
            wx: 0,
            lyc_eq_ly: false,
            mode: MODE_OAM,
            mode_clock: 0,
            off_clock: 0,
            stat_irq_line: false,
            frames: 0,
        }
    }

    pub fn mode(&self) -> u8 {
        self.mode
    }

    pub fn ly(&self) -> u8 {
        self.ly
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn lcd_enabled(&self) -> bool {
        self.lcdc & 0x80 != 0
    }

    pub fn read_reg(&self, addr: u16) -> u8 {
        match addr {
            0xFF40 => self.lcdc,
            0xFF41 => {
                0x80 | (self.stat & 0x78) | if self.lyc_eq_ly { 0x04 } else { 0 } | self.mode
            }
            0xFF42 => self.scy,
            0xFF43 => self.scx,
            0xFF44 => self.ly,
            0xFF45 => self.lyc,
            0xFF47 => self.bgp,
            0xFF48 => self.obp0,
            0xFF49 => self.obp1,
            0xFF4A => self.wy,
            0xFF4B => self.wx,
            _ => 0xFF,
        }
    }

    pub fn write_reg(&mut self, addr: u16, val: u8) {
        match addr {
            0xFF40 => {
                let was_on = self.lcd_enabled();
                self.lcdc = val;
                if was_on && !self.lcd_enabled() {
                    self.mode = MODE_HBLANK;
                    self.mode_clock = 0;
                    self.ly = 0;
                } else if !was_on && self.lcd_enabled() {
                    self.mode = MODE_OAM;
                    self.mode_clock = 0;
                    self.off_clock = 0;
                    self.update_lyc_compare();
                }
            }
            0xFF41 => self.stat = val & 0x78,
            0xFF42 => self.scy = val,
            0xFF43 => self.scx = val,
            0xFF44 => {}
            0xFF45 => {
                self.lyc = val;
                self.update_lyc_compare();
            }
            0xFF47 => self.bgp = val,
            0xFF48 => self.obp0 = val,
            0xFF49 => self.obp1 = val,
            0xFF4A => self.wy = val,
            0xFF4B => self.wx = val,
            _ => {}
        }
    }

    /// Advances by `cycles` dot clocks. Returns `true` when a frame
    /// completed (entry to VBlank, or a frame's worth of time with the LCD
    /// off).
    pub fn step(&mut self, cycles: u32, flags: &mut InterruptFlags) -> bool {
        if !self.lcd_enabled() {
            self.off_clock += cycles;
            if self.off_clock >= CYCLES_PER_FRAME {
                self.off_clock -= CYCLES_PER_FRAME;
                self.frames += 1;
                return true;
            }
            return false;
        }

        let mut frame_done = false;
        let mut remaining = cycles;
        while remaining > 0 {
            let increment = remaining.min(4);
            remaining -= increment;
            self.mode_clock += increment;

            match self.mode {
                MODE_HBLANK => {
                    if self.mode_clock >= MODE0_CYCLES {
                        self.mode_clock -= MODE0_CYCLES;
                        self.ly += 1;
                        if self.ly == SCREEN_HEIGHT {
                            self.mode = MODE_VBLANK;
                            flags.request(Interrupt::VBlank);
                            self.frames += 1;
                            frame_done = true;
                        } else {
                            self.mode = MODE_OAM;
                        }
                        self.update_lyc_compare();
                    }
                }
                MODE_VBLANK => {
                    if self.mode_clock >= MODE1_CYCLES {
                        self.mode_clock -= MODE1_CYCLES;
                        self.ly += 1;
                        if self.ly >= SCREEN_HEIGHT + VBLANK_LINES {
                            self.ly = 0;
                            self.mode = MODE_OAM;
                        }
                        self.update_lyc_compare();
                    }
                }
                MODE_OAM => {
                    if self.mode_clock >= MODE2_CYCLES {
                        self.mode_clock -= MODE2_CYCLES;
                        self.mode = MODE_TRANSFER;
                    }
                }
                _ => {
                    if self.mode_clock >= MODE3_CYCLES {
                        self.mode_clock -= MODE3_CYCLES;
                        self.mode = MODE_HBLANK;
                    }
                }
            }

            self.update_stat_irq(flags);
        }
        frame_done
    }

    fn update_lyc_compare(&mut self) {
        self.lyc_eq_ly = self.ly == self.lyc;
    }

    /// STAT fires on the rising edge of the OR of all enabled sources.
    fn update_stat_irq(&mut self, flags: &mut InterruptFlags) {
        let coincidence = self.lyc_eq_ly && self.stat & 0x40 != 0;
        let mode_signal = match self.mode {
            MODE_HBLANK => self.stat & 0x08 != 0,
            MODE_VBLANK => self.stat & 0x10 != 0,
            MODE_OAM => self.stat & 0x20 != 0,
            _ => false,
        };
        let current = coincidence || mode_signal;
        if current && !self.stat_irq_line {
            flags.request(Interrupt::LcdStat);
        }
        self.stat_irq_line = current;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lcd_on() -> Ppu {
        let mut ppu = Ppu::new();
        ppu.write_reg(0xFF40, 0x91);
        ppu
    }

    #[test]
    fn one_frame_per_70224_cycles() {
        let mut ppu = lcd_on();
        let mut flags = InterruptFlags::default();
        let mut frames = 0;
        for _ in 0..(CYCLES_PER_FRAME / 4) * 3 {
            if ppu.step(4, &mut flags) {
                frames += 1;
            }
        }
        assert_eq!(frames, 3);
        assert_eq!(ppu.ly(), 0);
        assert!(flags.contains(Interrupt::VBlank));
    }

    #[test]
    fn lyc_match_raises_stat() {
        let mut ppu = lcd_on();
        let mut flags = InterruptFlags::default();
        ppu.write_reg(0xFF45, 2);
        ppu.write_reg(0xFF41, 0x40);
        ppu.step(456 * 2, &mut flags);
        assert!(flags.contains(Interrupt::LcdStat));
        assert_eq!(ppu.read_reg(0xFF41) & 0x04, 0x04);
    }

    #[test]
    fn lcd_off_still_paces_frames() {
        let mut ppu = Ppu::new();
        let mut flags = InterruptFlags::default();
        assert!(!ppu.step(CYCLES_PER_FRAME - 1, &mut flags));
        assert!(ppu.step(1, &mut flags));
        assert_eq!(ppu.read_reg(0xFF44), 0);
        assert!(!flags.contains(Interrupt::VBlank));
    }
}
