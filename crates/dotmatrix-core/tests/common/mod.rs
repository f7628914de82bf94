use once_cell::sync::OnceCell;
use std::fs;
use std::path::{Path, PathBuf};

use dotmatrix_core::cpu::MemoryBus;
use dotmatrix_core::interrupts::Interrupt;

static INIT: OnceCell<()> = OnceCell::new();

const TEST_ROM_BUNDLE: &str =
    "https://github.com/c-sp/game-boy-test-roms/releases/download/v7.0/game-boy-test-roms-v7.0.zip";

fn ensure_test_roms() {
    INIT.get_or_init(|| {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("test_roms");
        fs::create_dir_all(&dir).expect("failed to create test_roms directory");
        if dir.join("mooneye-test-suite").exists() {
            return;
        }

        let resp = reqwest::blocking::get(TEST_ROM_BUNDLE).expect("failed to download test roms");
        let status = resp.status();
        if !status.is_success() {
            panic!("failed to download test roms: {status}");
        }
        let bytes = resp.bytes().expect("failed to read rom bytes");
        let reader = std::io::Cursor::new(bytes);
        let mut archive = zip::ZipArchive::new(reader).expect("failed to open zip archive");
        archive.extract(&dir).expect("failed to extract test roms");
    });
}

#[allow(dead_code)]
pub fn rom_path<P: AsRef<Path>>(relative: P) -> PathBuf {
    ensure_test_roms();
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("test_roms")
        .join(relative)
}

/// Builds a 32 KiB image (or larger, for `rom_code` > 0) with `program`
/// at 0x0150 and a `JP $0150` at the entry point.
#[allow(dead_code)]
pub fn build_rom(cart_type: u8, rom_code: u8, ram_code: u8, program: &[u8]) -> Vec<u8> {
    let mut rom = vec![0u8; 0x8000 << rom_code];
    rom[0x100..0x104].copy_from_slice(&[0x00, 0xC3, 0x50, 0x01]);
    rom[0x134..0x13C].copy_from_slice(b"DOTTESTS");
    rom[0x147] = cart_type;
    rom[0x148] = rom_code;
    rom[0x149] = ram_code;
    let checksum = rom[0x134..0x14D]
        .iter()
        .fold(0u8, |acc, &b| acc.wrapping_sub(b).wrapping_sub(1));
    rom[0x14D] = checksum;
    rom[0x150..0x150 + program.len()].copy_from_slice(program);
    rom
}

/// Flat 64 KiB address space for driving the CPU directly.
#[allow(dead_code)]
pub struct FlatBus {
    pub mem: Vec<u8>,
    pub ie: u8,
    pub iflag: u8,
}

#[allow(dead_code)]
impl FlatBus {
    pub fn with_program(at: u16, program: &[u8]) -> Self {
        let mut mem = vec![0; 0x10000];
        mem[at as usize..at as usize + program.len()].copy_from_slice(program);
        Self {
            mem,
            ie: 0,
            iflag: 0,
        }
    }
}

impl MemoryBus for FlatBus {
    fn read_byte(&mut self, addr: u16) -> u8 {
        self.mem[addr as usize]
    }

    fn write_byte(&mut self, addr: u16, val: u8) {
        self.mem[addr as usize] = val;
    }

    fn interrupt_enable(&self) -> u8 {
        self.ie
    }

    fn interrupt_flags(&self) -> u8 {
        self.iflag
    }

    fn request_interrupt(&mut self, interrupt: Interrupt) {
        self.iflag |= interrupt.bit();
    }

    fn acknowledge_interrupt(&mut self, interrupt: Interrupt) {
        self.iflag &= !interrupt.bit();
    }
}
