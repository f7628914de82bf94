//! Linear-sweep ROM listing.
//!
//! Every 16 KiB bank is decoded on its own, at the address it would be
//! mapped to (bank 0 at 0x0000, the others at 0x4000), so an encoding never
//! straddles two banks. The cartridge header is listed as header fields
//! rather than code.

use std::collections::BTreeMap;

use crate::cartridge::{HEADER_END, ROM_BANK_SIZE};
use crate::decoder::{self, Instruction, MAX_INSTRUCTION_LEN};

/// Header fields from 0x0104, in order.
const HEADER_FIELDS: [(&str, u16); 12] = [
    ("logo", 48),
    ("title", 16),
    ("new licensee", 2),
    ("SGB flag", 1),
    ("cartridge type", 1),
    ("ROM size", 1),
    ("RAM size", 1),
    ("destination", 1),
    ("old licensee", 1),
    ("version", 1),
    ("header checksum", 1),
    ("global checksum", 2),
];
const HEADER_START: usize = 0x0104;

/// Fixed entry points worth labelling.
const LABELS: [(u16, &str); 14] = [
    (0x0000, "RST $00"),
    (0x0008, "RST $08"),
    (0x0010, "RST $10"),
    (0x0018, "RST $18"),
    (0x0020, "RST $20"),
    (0x0028, "RST $28"),
    (0x0030, "RST $30"),
    (0x0038, "RST $38"),
    (0x0040, "VBlank interrupt"),
    (0x0048, "STAT interrupt"),
    (0x0050, "Timer interrupt"),
    (0x0058, "Serial interrupt"),
    (0x0060, "Joypad interrupt"),
    (0x0100, "entry point"),
];

/// One listing record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// Offset into the ROM image.
    pub offset: u32,
    pub bank: u16,
    /// CPU address the record is mapped at.
    pub addr: u16,
    pub instruction: Instruction,
}

/// Decodes the whole image. Annotations carry the offset of the record
/// they precede.
pub fn disassemble(rom: &[u8]) -> Vec<Line> {
    let mut lines = Vec::new();
    for (bank, chunk) in rom.chunks(ROM_BANK_SIZE).enumerate() {
        let base = bank * ROM_BANK_SIZE;
        let map_base: u16 = if bank == 0 { 0x0000 } else { 0x4000 };
        let mut pos = 0usize;
        while pos < chunk.len() {
            let addr = map_base + pos as u16;
            let line = |instruction| Line {
                offset: (base + pos) as u32,
                bank: bank as u16,
                addr,
                instruction,
            };

            if bank == 0 {
                if let Some(&(_, label)) = LABELS.iter().find(|&&(a, _)| a == addr) {
                    lines.push(line(Instruction::Annotation(label.to_string())));
                }
                if pos == HEADER_START && chunk.len() >= HEADER_END {
                    for (field, len) in HEADER_FIELDS {
                        lines.push(Line {
                            offset: (base + pos) as u32,
                            bank: 0,
                            addr: pos as u16,
                            instruction: Instruction::Header { field, len },
                        });
                        pos += len as usize;
                    }
                    continue;
                }
            } else if pos == 0 {
                lines.push(line(Instruction::Annotation(format!("ROM bank {bank:02X}"))));
            }

            let end = (pos + MAX_INSTRUCTION_LEN).min(chunk.len());
            let instruction = decoder::decode(&chunk[pos..end], addr);
            let len = instruction.length().max(1) as usize;
            lines.push(line(instruction));
            pos += len;
        }
    }
    lines
}

/// Rendered listing keyed by ROM offset. Annotations are folded into the
/// following record as a trailing comment.
pub fn listing(rom: &[u8]) -> BTreeMap<u32, String> {
    let mut out = BTreeMap::new();
    let mut notes: Vec<String> = Vec::new();
    for line in disassemble(rom) {
        match line.instruction {
            Instruction::Annotation(text) => notes.push(text),
            instruction => {
                let mut text = instruction.to_string();
                if !notes.is_empty() {
                    text.push_str("  ; ");
                    text.push_str(&notes.join(", "));
                    notes.clear();
                }
                out.insert(line.offset, text);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rom_with(code: &[(usize, &[u8])]) -> Vec<u8> {
        let mut rom = vec![0u8; 2 * ROM_BANK_SIZE];
        for &(at, bytes) in code {
            rom[at..at + bytes.len()].copy_from_slice(bytes);
        }
        rom
    }

    #[test]
    fn header_is_not_decoded_as_code() {
        let rom = rom_with(&[(0x100, &[0x00, 0xC3, 0x50, 0x01])]);
        let map = listing(&rom);
        assert_eq!(map[&0x100], "NOP  ; entry point");
        assert_eq!(map[&0x101], "JP $0150");
        assert_eq!(map[&0x104], "; header: logo (48 bytes)");
        assert_eq!(map[&0x134], "; header: title (16 bytes)");
        assert_eq!(map[&0x14E], "; header: global checksum (2 bytes)");
        assert_eq!(map[&0x150], "NOP");
        assert!(!map.contains_key(&0x105));
    }

    #[test]
    fn switchable_banks_map_at_4000() {
        let rom = rom_with(&[(0x4000, &[0x18, 0xFE])]);
        let lines = disassemble(&rom);
        let jr = lines
            .iter()
            .find(|l| l.offset == 0x4000 && matches!(l.instruction, Instruction::Opcode(_)))
            .map(|l| l.instruction.to_string());
        assert_eq!(jr.as_deref(), Some("JR $4000"));
        assert_eq!(listing(&rom)[&0x4000], "JR $4000  ; ROM bank 01");
    }

    #[test]
    fn encodings_do_not_cross_banks() {
        let rom = rom_with(&[(0x3FFF, &[0xC3])]);
        assert_eq!(listing(&rom)[&0x3FFF], "DB $C3");
    }
}
