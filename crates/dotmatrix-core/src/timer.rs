use crate::interrupts::{Interrupt, InterruptFlags};

/// DIV/TIMA/TMA/TAC.
///
/// TIMA counts falling edges of one divider bit (selected by TAC) ANDed with
/// the enable bit, so writes to DIV or TAC can produce extra increments.
#[derive(Debug, Clone, Default)]
pub struct Timer {
    /// 16-bit internal divider. DIV is the upper byte.
    pub div: u16,
    pub tima: u8,
    pub tma: u8,
    pub tac: u8,
    last_signal: bool,
    /// TMA before a write in the current cycle, used by a same-cycle reload.
    tma_latch: Option<u8>,
    pending_reload: Option<u8>,
    reload_delay: u8,
    /// Whether TIMA was reloaded this cycle. Writes to TIMA are dropped then.
    reloading: bool,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            0xFF04 => (self.div >> 8) as u8,
            0xFF05 => self.tima,
            0xFF06 => self.tma,
            0xFF07 => self.tac | 0xF8,
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, addr: u16, val: u8, flags: &mut InterruptFlags) {
        match addr {
            0xFF04 => self.reset_div(flags),
            0xFF05 => {
                if self.reloading || (self.pending_reload.is_some() && self.reload_delay == 0) {
                    return;
                }
                self.tima = val;
                // A write while the reload is still counting down cancels it.
                if self.pending_reload.is_some() {
                    self.pending_reload = None;
                    self.reload_delay = 0;
                }
            }
            0xFF06 => {
                self.tma_latch = Some(self.tma);
                self.tma = val;
                if self.pending_reload.is_some() {
                    self.pending_reload = Some(val);
                }
                if self.reloading {
                    self.tima = val;
                }
            }
            0xFF07 => {
                let before = self.signal();
                self.tac = val & 0x07;
                self.edge(before);
            }
            _ => {}
        }
    }

    /// Seeds the divider, e.g. with the value left behind by the boot ROM.
    pub fn set_divider(&mut self, div: u16) {
        self.div = div;
        self.last_signal = self.signal();
    }

    /// Advances by `cycles` CPU cycles.
    pub fn tick(&mut self, cycles: u32, flags: &mut InterruptFlags) {
        for _ in 0..cycles {
            self.apply_reload(flags);
            let before = self.last_signal;
            self.div = self.div.wrapping_add(1);
            self.edge(before);
        }
    }

    /// DIV write. Clearing the divider can itself clock TIMA.
    pub fn reset_div(&mut self, flags: &mut InterruptFlags) {
        self.apply_reload(flags);
        let before = self.signal();
        self.div = 0;
        self.edge(before);
    }

    fn apply_reload(&mut self, flags: &mut InterruptFlags) {
        self.reloading = false;
        if let Some(val) = self.pending_reload {
            if self.reload_delay == 0 {
                self.tima = val;
                flags.request(Interrupt::Timer);
                self.pending_reload = None;
                self.reloading = true;
            } else {
                self.reload_delay -= 1;
            }
        }
    }

    fn edge(&mut self, before: bool) {
        let after = self.signal();
        let tma_old = self.tma_latch.take();
        if before && !after {
            self.increment(tma_old);
        }
        self.last_signal = after;
    }

    fn increment(&mut self, tma_old: Option<u8>) {
        if self.tima == 0xFF {
            self.tima = 0;
            self.pending_reload = Some(tma_old.unwrap_or(self.tma));
            self.reload_delay = 3;
        } else {
            self.tima += 1;
        }
    }

    fn signal(&self) -> bool {
        if self.tac & 0x04 == 0 {
            return false;
        }
        let bit = match self.tac & 0x03 {
            0x00 => 9,
            0x01 => 3,
            0x02 => 5,
            _ => 7,
        };
        (self.div >> bit) & 1 != 0
    }
}
