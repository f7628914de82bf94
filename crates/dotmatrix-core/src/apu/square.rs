use super::channel::{Channel, LengthCounter, SequencerPhase};
use super::envelope::Envelope;

// Duty table for pulse channels (CH1, CH2), indexed by NRx1 bits 6-7.
const DUTY_TABLE: [[u8; 8]; 4] = [
    [0, 0, 0, 0, 0, 0, 0, 1], // 12.5%
    [1, 0, 0, 0, 0, 0, 0, 1], // 25%
    [1, 0, 0, 0, 0, 1, 1, 1], // 50%
    [0, 1, 1, 1, 1, 1, 1, 0], // 75%
];

/// Channel 1 frequency sweep.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Sweep {
    period: u8,
    negate: bool,
    shift: u8,
    timer: u8,
    shadow: u16,
    enabled: bool,
    /// A subtraction has been calculated since the last trigger.
    neg_used: bool,
}

impl Sweep {
    fn calculate(&mut self) -> u16 {
        let delta = self.shadow >> self.shift;
        if self.negate {
            self.neg_used = true;
            self.shadow.wrapping_sub(delta)
        } else {
            self.shadow.wrapping_add(delta)
        }
    }

    /// NR10 write. Returns `true` when clearing negate after a subtraction
    /// disables the channel.
    fn set_params(&mut self, val: u8) -> bool {
        let new_period = (val >> 4) & 0x07;
        let old_negate = self.negate;
        self.negate = val & 0x08 != 0;
        self.shift = val & 0x07;

        // Period 0 only pauses clocking; the unit stays armed.
        if new_period != 0 && self.period == 0 {
            self.timer = new_period;
        }
        self.period = new_period;

        if old_negate && !self.negate && self.neg_used {
            self.enabled = false;
            return true;
        }
        false
    }

    fn reload(&mut self, freq: u16) {
        self.shadow = freq;
        self.timer = if self.period == 0 { 8 } else { self.period };
        self.enabled = self.period != 0 || self.shift != 0;
        self.neg_used = false;
    }
}

#[derive(Debug, Clone)]
pub(crate) struct SquareChannel {
    enabled: bool,
    length: LengthCounter,
    duty: u8,
    duty_pos: u8,
    frequency: u16,
    timer: u32,
    envelope: Envelope,
    sweep: Option<Sweep>,
}

impl SquareChannel {
    pub fn new(with_sweep: bool) -> Self {
        Self {
            enabled: false,
            length: LengthCounter::new(64),
            duty: 0,
            duty_pos: 0,
            frequency: 0,
            timer: 0,
            envelope: Envelope::default(),
            sweep: with_sweep.then(Sweep::default),
        }
    }

    /// Post-boot state: channel 1 is left running at zero volume after the
    /// boot chime.
    pub fn post_boot(&mut self, nrx1: u8, nrx2: u8, frequency: u16, running: bool) {
        self.duty = nrx1 >> 6;
        self.envelope.write(nrx2, false);
        self.frequency = frequency;
        self.timer = self.period();
        self.enabled = running && self.envelope.dac_enabled();
        if self.enabled {
            self.envelope.silence();
        }
    }

    pub fn frequency(&self) -> u16 {
        self.frequency
    }

    pub fn length(&self) -> u16 {
        self.length.value()
    }

    pub fn volume(&self) -> u8 {
        self.envelope.volume()
    }

    fn period(&self) -> u32 {
        (2048 - self.frequency as u32) * 4
    }

    fn trigger(&mut self, phase: SequencerPhase) {
        self.enabled = self.envelope.dac_enabled();
        self.length.trigger(phase);
        self.timer = self.period();
        self.envelope.trigger(phase);

        if let Some(sweep) = self.sweep.as_mut() {
            sweep.reload(self.frequency);
            if sweep.shift != 0 && sweep.calculate() > 2047 {
                self.enabled = false;
                sweep.enabled = false;
            }
        }
    }
}

impl Channel for SquareChannel {
    fn tick(&mut self, cycles: u32) {
        if !self.enabled {
            return;
        }
        let mut cycles = cycles;
        while self.timer <= cycles {
            cycles -= self.timer;
            self.timer = self.period();
            self.duty_pos = (self.duty_pos + 1) & 7;
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

    fn clock_sweep(&mut self) {
        let Some(sweep) = self.sweep.as_mut() else {
            return;
        };
        if !sweep.enabled {
            return;
        }
        if sweep.timer > 0 {
            sweep.timer -= 1;
        }
        if sweep.timer != 0 {
            return;
        }
        sweep.timer = if sweep.period == 0 { 8 } else { sweep.period };
        if sweep.period == 0 {
            return;
        }

        let new_freq = sweep.calculate();
        if new_freq > 2047 {
            self.enabled = false;
            sweep.enabled = false;
        } else if sweep.shift != 0 {
            sweep.shadow = new_freq;
            self.frequency = new_freq;
            if sweep.calculate() > 2047 {
                self.enabled = false;
                sweep.enabled = false;
            }
        }
    }

    fn sample(&self) -> u8 {
        if !self.enabled || !self.envelope.dac_enabled() {
            return 0;
        }
        DUTY_TABLE[self.duty as usize][self.duty_pos as usize] * self.envelope.volume()
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn dac_enabled(&self) -> bool {
        self.envelope.dac_enabled()
    }

    fn write(&mut self, reg: u8, val: u8, phase: SequencerPhase) {
        match reg {
            0 => {
                if let Some(sweep) = self.sweep.as_mut()
                    && sweep.set_params(val)
                {
                    self.enabled = false;
                }
            }
            1 => {
                self.duty = val >> 6;
                self.length.load(val & 0x3F);
            }
            2 => {
                self.envelope.write(val, self.enabled);
                if !self.envelope.dac_enabled() {
                    self.enabled = false;
                }
            }
            3 => self.frequency = (self.frequency & 0x700) | val as u16,
            4 => {
                self.frequency = (self.frequency & 0xFF) | (((val & 0x07) as u16) << 8);
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
        *self = Self::new(self.sweep.is_some());
        self.length = length;
    }
}
