use super::channel::{Channel, LengthCounter, SequencerPhase};
use super::envelope::Envelope;

#[derive(Debug, Clone)]
pub(crate) struct NoiseChannel {
    enabled: bool,
    length: LengthCounter,
    envelope: Envelope,
    clock_shift: u8,
    divisor: u8,
    width7: bool,
    lfsr: u16,
    timer: u32,
}

impl Default for NoiseChannel {
    fn default() -> Self {
        Self {
            enabled: false,
            length: LengthCounter::new(64),
            envelope: Envelope::default(),
            clock_shift: 0,
            divisor: 0,
            width7: false,
            lfsr: 0,
            timer: 0,
        }
    }
}

impl NoiseChannel {
    fn period(&self) -> u32 {
        let r = match self.divisor {
            0 => 8,
            d => d as u32 * 16,
        };
        r << self.clock_shift
    }

    pub fn lfsr(&self) -> u16 {
        self.lfsr
    }

    fn trigger(&mut self, phase: SequencerPhase) {
        self.enabled = self.envelope.dac_enabled();
        self.length.trigger(phase);
        self.lfsr = 0;
        self.timer = self.period();
        self.envelope.trigger(phase);
    }
}

impl Channel for NoiseChannel {
    fn tick(&mut self, cycles: u32) {
        // Shifts 14 and 15 stop the LFSR.
        if !self.enabled || self.clock_shift >= 14 {
            return;
        }
        let mut cycles = cycles;
        while self.timer <= cycles {
            cycles -= self.timer;
            self.timer = self.period();
            // Stored inverted: feedback is XNOR and a cleared register is
            // the all-ones hardware state.
            let bit = !(self.lfsr ^ (self.lfsr >> 1)) & 1;
            self.lfsr = (self.lfsr >> 1) | (bit << 14);
            if self.width7 {
                self.lfsr = (self.lfsr & !0x40) | (bit << 6);
            }
        }
        self.timer -= cycles;
    }

    fn clock_length(&mut self) {
        if self.length.clock() {
            self.enabled = false;
        }
    }

    fn clock_envelope(&mut self) {
        if self.enabled {
            self.envelope.clock();
        }
    }

    fn sample(&self) -> u8 {
        if !self.enabled || !self.envelope.dac_enabled() || self.lfsr & 1 != 0 {
            return 0;
        }
        self.envelope.volume()
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn dac_enabled(&self) -> bool {
        self.envelope.dac_enabled()
    }

    fn write(&mut self, reg: u8, val: u8, phase: SequencerPhase) {
        match reg {
            1 => self.length.load(val & 0x3F),
            2 => {
                self.envelope.write(val, self.enabled);
                if !self.envelope.dac_enabled() {
                    self.enabled = false;
                }
            }
            3 => {
                self.clock_shift = val >> 4;
                self.width7 = val & 0x08 != 0;
                self.divisor = val & 0x07;
            }
            4 => {
                if self.length.write_enable(val & 0x40 != 0, phase) {
                    self.enabled = false;
                }
                if val & 0x80 != 0 {
                    self.trigger(phase);
                }
            }
            _ => {}
        }
    }

    fn write_length(&mut self, val: u8) {
        self.length.load(val & 0x3F);
    }

    fn power_off(&mut self, keep_length: bool) {
        let mut length = self.length;
        length.reset(keep_length);
        *self = Self::default();
        self.length = length;
    }
}
