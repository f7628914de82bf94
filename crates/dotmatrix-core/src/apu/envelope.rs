use super::channel::SequencerPhase;

/// NRx2 volume envelope shared by the pulse and noise channels.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Envelope {
    raw: u8,
    initial: u8,
    period: u8,
    add: bool,
    volume: u8,
    timer: u8,
}

impl Envelope {
    pub fn volume(&self) -> u8 {
        self.volume
    }

    /// The DAC is powered while any of NRx2 bits 3-7 are set.
    pub fn dac_enabled(&self) -> bool {
        self.raw & 0xF8 != 0
    }

    pub fn write(&mut self, val: u8, channel_enabled: bool) {
        if channel_enabled {
            self.zombie_update(val);
        } else {
            self.reset(val);
        }
        self.raw = val;
    }

    pub fn trigger(&mut self, phase: SequencerPhase) {
        self.volume = self.initial;
        self.timer = if self.period == 0 { 8 } else { self.period };
        if phase.next_clocks_envelope() {
            self.timer = self.timer.wrapping_add(1);
        }
    }

    pub fn clock(&mut self) {
        if self.period == 0 {
            return;
        }
        if self.timer > 0 {
            self.timer -= 1;
        }
        if self.timer == 0 {
            self.timer = self.period;
            if self.add && self.volume < 15 {
                self.volume += 1;
            } else if !self.add && self.volume > 0 {
                self.volume -= 1;
            }
        }
    }

    /// Envelope that has already run down to zero.
    pub fn silence(&mut self) {
        self.volume = 0;
    }

    fn reset(&mut self, val: u8) {
        self.initial = val >> 4;
        self.volume = self.initial;
        self.period = val & 0x07;
        self.add = val & 0x08 != 0;
        self.timer = if self.period == 0 { 8 } else { self.period };
    }

    /// NRx2 written while the channel plays ("zombie mode").
    fn zombie_update(&mut self, new_val: u8) {
        let old_period = self.raw & 0x07;
        let old_add = self.raw & 0x08 != 0;
        let new_add = new_val & 0x08 != 0;
        let mut vol = self.volume;
        if old_period == 0 {
            let automatic = if old_add { vol < 15 } else { vol > 0 };
            if automatic {
                vol = vol.wrapping_add(1);
            } else if !old_add {
                vol = vol.wrapping_add(2);
            }
        }
        if old_add != new_add {
            vol = 16u8.wrapping_sub(vol);
        }
        self.volume = vol & 0x0F;
        self.initial = new_val >> 4;
        self.period = new_val & 0x07;
        self.add = new_add;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decays_once_per_period() {
        let mut env = Envelope::default();
        env.write(0xF2, false);
        env.trigger(SequencerPhase { next_step: 0 });
        assert_eq!(env.volume(), 15);
        env.clock();
        assert_eq!(env.volume(), 15);
        env.clock();
        assert_eq!(env.volume(), 14);
    }

    #[test]
    fn period_zero_holds_volume() {
        let mut env = Envelope::default();
        env.write(0x80, false);
        env.trigger(SequencerPhase { next_step: 0 });
        for _ in 0..16 {
            env.clock();
        }
        assert_eq!(env.volume(), 8);
        assert!(env.dac_enabled());
    }

    #[test]
    fn dac_follows_upper_bits() {
        let mut env = Envelope::default();
        env.write(0x08, false);
        assert!(env.dac_enabled());
        env.write(0x07, false);
        assert!(!env.dac_enabled());
    }
}
