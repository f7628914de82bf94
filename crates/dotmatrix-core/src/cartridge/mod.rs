//! Cartridge controllers.
//!
//! Every controller answers `read`/`write` for the addresses it owns and
//! returns `None`/`false` for the rest, so the bus can fall back to its own
//! memory. RAM mutations go through [`CartRam`], which tracks whether a save
//! flush is due.

mod header;
mod mbc1;
mod mbc2;
mod mbc3;
mod mbc5;
mod rom_only;
mod rtc;
mod save;

pub use header::{CartridgeHeader, HEADER_END, MbcKind};
pub use mbc1::Mbc1;
pub use mbc2::Mbc2;
pub use mbc3::Mbc3;
pub use mbc5::Mbc5;
pub use rom_only::RomOnly;
pub use rtc::{RTC_SNAPSHOT_LEN, Rtc, RtcRegisters};
pub use save::SavePayload;

use log::{info, warn};

use crate::clock::Clock;
use crate::error::{CartridgeError, RtcError};

pub const ROM_BANK_SIZE: usize = 0x4000;
pub const RAM_BANK_SIZE: usize = 0x2000;

/// Uniform controller contract.
pub trait Mbc: Send {
    /// Byte at `addr`, or `None` when the address is not cartridge-owned.
    fn read(&mut self, addr: u16) -> Option<u8>;
    /// Returns `false` when the address is not cartridge-owned.
    fn write(&mut self, addr: u16, val: u8) -> bool;
    /// Restores power-on register state. RAM and RTC are kept.
    fn reset(&mut self);

    fn ram(&self) -> &CartRam;
    fn ram_mut(&mut self) -> &mut CartRam;

    fn rom(&self) -> &[u8];

    /// ROM banks currently mapped at 0x0000 and 0x4000.
    fn rom_banks(&self) -> (usize, usize);
    /// RAM bank mapped at 0xA000, or `None` while RAM is disabled.
    fn ram_bank(&self) -> Option<usize>;

    fn has_rtc(&self) -> bool {
        false
    }

    fn rtc_snapshot(&mut self) -> Option<Vec<u8>> {
        None
    }

    fn load_rtc_snapshot(&mut self, _data: &[u8]) -> Result<(), RtcError> {
        Ok(())
    }
}

/// Cartridge RAM with a dirty flag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CartRam {
    bytes: Vec<u8>,
    dirty: bool,
}

impl CartRam {
    pub fn new(size: usize) -> Self {
        Self {
            bytes: vec![0; size],
            dirty: false,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn get(&self, idx: usize) -> Option<u8> {
        self.bytes.get(idx).copied()
    }

    /// Stores `val` and marks the RAM dirty. Out-of-range writes are dropped.
    pub fn set(&mut self, idx: usize, val: u8) {
        if let Some(b) = self.bytes.get_mut(idx) {
            *b = val;
            self.mark_dirty();
        }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Copies a saved image in. Size mismatches are truncated or zero-padded.
    pub fn load(&mut self, data: &[u8]) {
        let n = data.len().min(self.bytes.len());
        self.bytes[..n].copy_from_slice(&data[..n]);
        self.bytes[n..].fill(0);
        self.dirty = false;
    }

    pub fn clear(&mut self) {
        self.bytes.fill(0);
    }

    pub(crate) fn bank_count(&self) -> usize {
        self.bytes.len().div_ceil(RAM_BANK_SIZE)
    }
}

/// Reads `addr` (any address in a 16 KiB window) from `bank`, wrapping the
/// bank number to the ROM size. Missing bytes read as 0xFF.
pub(crate) fn rom_byte(rom: &[u8], bank: usize, addr: u16) -> u8 {
    let banks = (rom.len() / ROM_BANK_SIZE).max(1);
    let offset = (bank % banks) * ROM_BANK_SIZE + (addr as usize & (ROM_BANK_SIZE - 1));
    rom.get(offset).copied().unwrap_or(0xFF)
}

/// Offset into cartridge RAM for an 0xA000-0xBFFF access in `bank`.
pub(crate) fn ram_offset(ram: &CartRam, bank: usize, addr: u16) -> usize {
    let banks = ram.bank_count().max(1);
    (bank % banks) * RAM_BANK_SIZE + (addr as usize - 0xA000)
}

/// A loaded cartridge: header plus the matching controller.
pub struct Cartridge {
    header: CartridgeHeader,
    mbc: Box<dyn Mbc>,
}

impl std::fmt::Debug for Cartridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cartridge")
            .field("header", &self.header)
            .finish_non_exhaustive()
    }
}

impl Cartridge {
    /// Parses the header and instantiates the controller. Unknown cartridge
    /// types run as ROM-only.
    pub fn from_rom(rom: Vec<u8>, clock: Box<dyn Clock>) -> Result<Self, CartridgeError> {
        let header = CartridgeHeader::parse(&rom).ok_or(CartridgeError::RomTooShort { len: rom.len() })?;

        if rom.len() < header.rom_size {
            warn!(
                "ROM image is {} bytes but the header declares {}",
                rom.len(),
                header.rom_size
            );
        }

        let ram_size = header.ram_size;
        let mbc: Box<dyn Mbc> = match header.kind {
            MbcKind::RomOnly => Box::new(RomOnly::new(rom, ram_size)),
            MbcKind::Mbc1 => Box::new(Mbc1::new(rom, ram_size)),
            MbcKind::Mbc2 => Box::new(Mbc2::new(rom)),
            MbcKind::Mbc3 => Box::new(Mbc3::new(rom, ram_size, false, header.rtc.then_some(clock))),
            MbcKind::Mbc30 => Box::new(Mbc3::new(rom, ram_size, true, header.rtc.then_some(clock))),
            MbcKind::Mbc5 => Box::new(Mbc5::new(rom, ram_size)),
            MbcKind::Unknown(t) => {
                warn!("Unsupported cartridge type {t:#04X}, running as ROM only");
                Box::new(RomOnly::new(rom, ram_size))
            }
        };

        info!(
            "Loaded ROM: {} ({}, ROM {} KiB, RAM {} KiB, CGB: {})",
            header.title,
            header.kind,
            header.rom_size / 1024,
            header.ram_size / 1024,
            if header.cgb() { "yes" } else { "no" }
        );

        Ok(Self { header, mbc })
    }

    pub fn header(&self) -> &CartridgeHeader {
        &self.header
    }

    pub fn read(&mut self, addr: u16) -> Option<u8> {
        self.mbc.read(addr)
    }

    pub fn write(&mut self, addr: u16, val: u8) -> bool {
        self.mbc.write(addr, val)
    }

    pub fn rom(&self) -> &[u8] {
        self.mbc.rom()
    }

    pub fn mbc(&self) -> &dyn Mbc {
        self.mbc.as_ref()
    }

    /// Resets mapper registers. A hard reset also wipes RAM that has no
    /// battery behind it.
    pub fn reset(&mut self, hard: bool) {
        self.mbc.reset();
        if hard && !self.header.battery {
            self.mbc.ram_mut().clear();
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.mbc.ram().is_dirty()
    }

    pub fn clear_dirty(&mut self) {
        self.mbc.ram_mut().clear_dirty();
    }

    /// Battery image plus RTC snapshot. `None` for carts without a battery.
    pub fn save(&mut self) -> Option<SavePayload> {
        if !self.header.battery {
            return None;
        }
        Some(SavePayload {
            battery: self.mbc.ram().as_slice().to_vec(),
            rtc: self.mbc.rtc_snapshot(),
        })
    }

    /// Restores a save. Size mismatches and bad RTC blobs are logged and
    /// tolerated.
    pub fn load_save(&mut self, payload: &SavePayload) {
        let expected = self.mbc.ram().len();
        if payload.battery.len() != expected {
            warn!(
                "Save RAM is {} bytes, cartridge expects {}; loading what fits",
                payload.battery.len(),
                expected
            );
        }
        self.mbc.ram_mut().load(&payload.battery);

        if let Some(rtc) = &payload.rtc {
            if !self.mbc.has_rtc() {
                warn!("Ignoring RTC data for a cartridge without a clock");
            } else if let Err(e) = self.mbc.load_rtc_snapshot(rtc) {
                warn!("Failed to parse RTC data: {e}");
            }
        }
    }
}
