use super::channel::{Channel, LengthCounter, SequencerPhase};

/// Cycles between a wave trigger and the first sample fetch.
const TRIGGER_DELAY: u32 = 6;

#[derive(Debug, Clone)]
pub(crate) struct WaveChannel {
    enabled: bool,
    dac_enabled: bool,
    length: LengthCounter,
    /// NR32 bits 5-6.
    volume_code: u8,
    frequency: u16,
    timer: u32,
    position: u8,
    sample_buffer: u8,
    ram: [u8; 0x10],
}

impl Default for WaveChannel {
    fn default() -> Self {
        Self {
            enabled: false,
            dac_enabled: false,
            length: LengthCounter::new(256),
            volume_code: 0,
            frequency: 0,
            timer: 0,
            position: 0,
            sample_buffer: 0,
            ram: [0; 0x10],
        }
    }
}

impl WaveChannel {
    fn period(&self) -> u32 {
        (2048 - self.frequency as u32) * 2
    }

    pub fn position(&self) -> u8 {
        self.position
    }

    pub fn length(&self) -> u16 {
        self.length.value()
    }

    pub fn read_ram(&self, idx: usize) -> u8 {
        self.ram[idx & 0x0F]
    }

    pub fn write_ram(&mut self, idx: usize, val: u8) {
        self.ram[idx & 0x0F] = val;
    }

    fn trigger(&mut self, phase: SequencerPhase) {
        self.enabled = self.dac_enabled;
        self.length.trigger(phase);
        self.position = 0;
        self.timer = self.period() + TRIGGER_DELAY;
    }
}

impl Channel for WaveChannel {
    fn tick(&mut self, cycles: u32) {
        if !self.enabled {
            return;
        }
        let mut cycles = cycles;
        while self.timer <= cycles {
            cycles -= self.timer;
            self.timer = self.period();
            self.position = (self.position + 1) & 0x1F;
            let byte = self.ram[(self.position / 2) as usize];
            self.sample_buffer = if self.position & 1 == 0 {
                byte >> 4
            } else {
                byte & 0x0F
            };
        }
        self.timer -= cycles;
    }

    fn clock_length(&mut self) {
        if self.length.clock() {
            self.enabled = false;
        }
    }

    fn sample(&self) -> u8 {
        if !self.enabled || !self.dac_enabled {
            return 0;
        }
        match self.volume_code {
            1 => self.sample_buffer,
            2 => self.sample_buffer >> 1,
            3 => self.sample_buffer >> 2,
            _ => 0,
        }
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn dac_enabled(&self) -> bool {
        self.dac_enabled
    }

    fn write(&mut self, reg: u8, val: u8, phase: SequencerPhase) {
        match reg {
            0 => {
                self.dac_enabled = val & 0x80 != 0;
                if !self.dac_enabled {
                    self.enabled = false;
                }
            }
            1 => self.length.load(val),
            2 => self.volume_code = (val >> 5) & 0x03,
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
        self.length.load(val);
    }

    fn power_off(&mut self, keep_length: bool) {
        let mut length = self.length;
        length.reset(keep_length);
        let ram = self.ram;
        *self = Self::default();
        self.length = length;
        self.ram = ram;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PHASE: SequencerPhase = SequencerPhase { next_step: 0 };

    #[test]
    fn plays_nibbles_in_order() {
        let mut ch = WaveChannel::default();
        ch.write_ram(0, 0xA5);
        ch.write(0, 0x80, PHASE);
        ch.write(2, 0x20, PHASE);
        ch.write(3, 0xFF, PHASE);
        ch.write(4, 0x87, PHASE);
        assert!(ch.enabled());

        // Period is 2 cycles; the first fetch waits out the trigger delay.
        ch.tick(2 + TRIGGER_DELAY);
        assert_eq!(ch.position(), 1);
        assert_eq!(ch.sample(), 0x05);
        ch.tick(2 * 31);
        assert_eq!(ch.position(), 0);
        assert_eq!(ch.sample(), 0x0A);
    }

    #[test]
    fn power_off_keeps_wave_ram() {
        let mut ch = WaveChannel::default();
        ch.write_ram(3, 0x12);
        ch.power_off(false);
        assert_eq!(ch.read_ram(3), 0x12);
    }
}
