use std::fmt;

/// Smallest image that carries a complete header.
pub const HEADER_END: usize = 0x0150;

const TITLE: std::ops::Range<usize> = 0x0134..0x0144;
const LOGO: std::ops::Range<usize> = 0x0104..0x0134;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MbcKind {
    RomOnly,
    Mbc1,
    Mbc2,
    Mbc3,
    /// MBC3 variant with 64 KiB RAM and an 8-bit ROM bank register.
    Mbc30,
    Mbc5,
    Unknown(u8),
}

impl fmt::Display for MbcKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MbcKind::RomOnly => f.write_str("ROM only"),
            MbcKind::Mbc1 => f.write_str("MBC1"),
            MbcKind::Mbc2 => f.write_str("MBC2"),
            MbcKind::Mbc3 => f.write_str("MBC3"),
            MbcKind::Mbc30 => f.write_str("MBC30"),
            MbcKind::Mbc5 => f.write_str("MBC5"),
            MbcKind::Unknown(t) => write!(f, "unknown ({t:#04X})"),
        }
    }
}

/// Decoded cartridge header (0x0100-0x014F).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartridgeHeader {
    pub title: String,
    /// Raw byte at 0x0143.
    pub cgb_flag: u8,
    pub sgb: bool,
    pub cartridge_type: u8,
    pub kind: MbcKind,
    pub rom_size_code: u8,
    pub rom_size: usize,
    pub rom_banks: usize,
    pub ram_size_code: u8,
    pub ram_size: usize,
    pub destination: u8,
    pub licensee: String,
    pub version: u8,
    pub header_checksum: u8,
    pub checksum_valid: bool,
    pub battery: bool,
    pub rtc: bool,
    pub rumble: bool,
}

impl CartridgeHeader {
    /// Returns `None` when the image is too short to hold a header.
    pub fn parse(rom: &[u8]) -> Option<Self> {
        if rom.len() < HEADER_END {
            return None;
        }

        let cartridge_type = rom[0x0147];
        let rom_size_code = rom[0x0148];
        let ram_size_code = rom[0x0149];
        let kind = mbc_kind(cartridge_type, ram_size_code);
        let rom_banks = rom_bank_count(rom_size_code);

        let ram_size = if kind == MbcKind::Mbc2 {
            // 512 x 4-bit built-in RAM regardless of the header.
            0x200
        } else {
            ram_size_bytes(ram_size_code)
        };

        let computed = rom[0x0134..=0x014C]
            .iter()
            .fold(0u8, |acc, &b| acc.wrapping_sub(b).wrapping_sub(1));

        Some(Self {
            title: title(&rom[TITLE]),
            cgb_flag: rom[0x0143],
            sgb: rom[0x0146] == 0x03,
            cartridge_type,
            kind,
            rom_size_code,
            rom_size: rom_banks * 0x4000,
            rom_banks,
            ram_size_code,
            ram_size,
            destination: rom[0x014A],
            licensee: licensee(rom),
            version: rom[0x014C],
            header_checksum: rom[0x014D],
            checksum_valid: computed == rom[0x014D],
            battery: matches!(
                cartridge_type,
                0x03 | 0x06 | 0x09 | 0x0F | 0x10 | 0x13 | 0x1B | 0x1E
            ),
            rtc: matches!(cartridge_type, 0x0F | 0x10),
            rumble: matches!(cartridge_type, 0x1C..=0x1E),
        })
    }

    /// Header asks for CGB mode (0x80 compatible, 0xC0 CGB only).
    pub fn cgb(&self) -> bool {
        matches!(self.cgb_flag, 0x80 | 0xC0)
    }
}

fn title(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    // The last byte doubles as the CGB flag on newer carts.
    let end = if end == bytes.len() && bytes[end - 1] & 0x80 != 0 {
        end - 1
    } else {
        end
    };
    String::from_utf8_lossy(&bytes[..end]).trim().to_string()
}

fn licensee(rom: &[u8]) -> String {
    match rom[0x014B] {
        0x33 => String::from_utf8_lossy(&rom[0x0144..0x0146]).into_owned(),
        code => format!("{code:02X}"),
    }
}

pub fn mbc_kind(cartridge_type: u8, ram_size_code: u8) -> MbcKind {
    match cartridge_type {
        0x00 | 0x08 | 0x09 => MbcKind::RomOnly,
        0x01..=0x03 => MbcKind::Mbc1,
        0x05 | 0x06 => MbcKind::Mbc2,
        0x0F..=0x13 if ram_size_code == 0x05 => MbcKind::Mbc30,
        0x0F..=0x13 => MbcKind::Mbc3,
        0x19..=0x1E => MbcKind::Mbc5,
        other => MbcKind::Unknown(other),
    }
}

/// Banks of 16 KiB for a ROM size code. Unknown codes fall back to two.
pub fn rom_bank_count(code: u8) -> usize {
    match code {
        0x00..=0x08 => 2 << code,
        0x52 => 72,
        0x53 => 80,
        0x54 => 96,
        _ => 2,
    }
}

/// RAM size table. Not monotonic: code 4 is 128 KiB, code 5 is 64 KiB.
pub fn ram_size_bytes(code: u8) -> usize {
    match code {
        0x01 => 0x800,
        0x02 => 0x2000,
        0x03 => 0x8000,
        0x04 => 0x20000,
        0x05 => 0x10000,
        _ => 0,
    }
}

/// MBC1 multicarts (64 banks or more) repeat the boot logo at the start of
/// each 16-bank game. Their wiring cannot be read from the header.
pub fn is_mbc1_multicart(rom: &[u8]) -> bool {
    if rom.len() / 0x4000 < 64 {
        return false;
    }
    let logo = match rom.get(LOGO) {
        Some(s) if !s.iter().all(|&b| b == 0) => s,
        _ => return false,
    };
    (1..=2).all(|game| {
        let start = game * 0x10 * 0x4000 + LOGO.start;
        rom.get(start..start + LOGO.len()) == Some(logo)
    })
}
