use crate::interrupts::{Interrupt, InterruptFlags};

/// CPU cycles per shifted bit with the normal internal clock (8192 Hz).
const CYCLES_PER_BIT: u32 = 512;
/// CGB fast clock (262144 Hz).
const CYCLES_PER_BIT_FAST: u32 = 16;

/// SB/SC with no cable attached: the line reads high, so every completed
/// transfer receives 0xFF. Bytes sent with the internal clock are captured
/// for hosts and test harnesses.
#[derive(Debug, Clone)]
pub struct Serial {
    sb: u8,
    sc: u8,
    out_buf: Vec<u8>,
    /// Cycles left in an internally clocked transfer.
    remaining: Option<u32>,
    cgb_mode: bool,
}

impl Serial {
    pub fn new(cgb: bool) -> Self {
        Self {
            sb: 0,
            sc: if cgb { 0x7F } else { 0x7E },
            out_buf: Vec::new(),
            remaining: None,
            cgb_mode: cgb,
        }
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            0xFF01 => self.sb,
            0xFF02 if self.cgb_mode => self.sc | 0x7C,
            0xFF02 => self.sc | 0x7E,
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, addr: u16, val: u8) {
        match addr {
            0xFF01 => self.sb = val,
            0xFF02 => {
                self.sc = val;
                self.remaining = None;
                // External-clock transfers wait for a partner that never comes.
                if val & 0x81 == 0x81 {
                    let per_bit = if self.cgb_mode && val & 0x02 != 0 {
                        CYCLES_PER_BIT_FAST
                    } else {
                        CYCLES_PER_BIT
                    };
                    self.remaining = Some(per_bit * 8);
                }
            }
            _ => {}
        }
    }

    /// Advances by `cycles` CPU cycles.
    pub fn tick(&mut self, cycles: u32, flags: &mut InterruptFlags) {
        let Some(remaining) = self.remaining else {
            return;
        };
        if remaining > cycles {
            self.remaining = Some(remaining - cycles);
            return;
        }
        self.remaining = None;
        self.out_buf.push(self.sb);
        self.sb = 0xFF;
        self.sc &= 0x7F;
        flags.request(Interrupt::Serial);
    }

    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.out_buf)
    }

    pub fn peek_output(&self) -> &[u8] {
        &self.out_buf
    }
}
