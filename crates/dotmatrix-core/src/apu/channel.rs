/// Position of the frame sequencer as seen by a register write.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SequencerPhase {
    /// Step the sequencer runs next (0-7).
    pub next_step: u8,
}

impl SequencerPhase {
    pub fn next_clocks_length(self) -> bool {
        self.next_step & 1 == 0
    }

    pub fn next_clocks_envelope(self) -> bool {
        self.next_step == 7
    }
}

/// Operations the frame sequencer, the mixer and the register file perform
/// on every voice.
pub(crate) trait Channel {
    /// Advances the period timer by `cycles` master cycles.
    fn tick(&mut self, cycles: u32);
    fn clock_length(&mut self);
    fn clock_envelope(&mut self) {}
    fn clock_sweep(&mut self) {}
    /// Current digital output, 0-15.
    fn sample(&self) -> u8;
    fn enabled(&self) -> bool;
    fn dac_enabled(&self) -> bool;
    /// Writes NRx0-NRx4 (`reg` 0-4).
    fn write(&mut self, reg: u8, val: u8, phase: SequencerPhase);
    /// Length-only write used by DMG while the APU is powered off.
    fn write_length(&mut self, val: u8);
    /// Clears operating state on APU power-off. DMG keeps length counters.
    fn power_off(&mut self, keep_length: bool);
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct LengthCounter {
    value: u16,
    max: u16,
    enabled: bool,
}

impl LengthCounter {
    pub fn new(max: u16) -> Self {
        Self {
            value: 0,
            max,
            enabled: false,
        }
    }

    pub fn value(&self) -> u16 {
        self.value
    }

    pub fn load(&mut self, raw: u8) {
        self.value = self.max - (raw as u16 & (self.max - 1));
    }

    /// Returns `true` when the counter just expired.
    pub fn clock(&mut self) -> bool {
        if self.enabled && self.value > 0 {
            self.value -= 1;
            return self.value == 0;
        }
        false
    }

    /// NRx4 bit 6. Enabling while the next step skips length clocks the
    /// counter once more; returns `true` if that expired it.
    pub fn write_enable(&mut self, enable: bool, phase: SequencerPhase) -> bool {
        let was = self.enabled;
        self.enabled = enable;
        if !was && enable && !phase.next_clocks_length() {
            return self.clock();
        }
        false
    }

    pub fn trigger(&mut self, phase: SequencerPhase) {
        if self.value == 0 {
            self.value = self.max;
            if self.enabled && !phase.next_clocks_length() {
                self.value -= 1;
            }
        }
    }

    pub fn reset(&mut self, keep_value: bool) {
        self.enabled = false;
        if !keep_value {
            self.value = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LENGTH_STEP: SequencerPhase = SequencerPhase { next_step: 2 };
    const OTHER_STEP: SequencerPhase = SequencerPhase { next_step: 3 };

    #[test]
    fn expires_after_loaded_count() {
        let mut len = LengthCounter::new(64);
        len.load(60);
        len.write_enable(true, LENGTH_STEP);
        assert!(!len.clock());
        assert!(!len.clock());
        assert!(!len.clock());
        assert!(len.clock());
        assert!(!len.clock());
    }

    #[test]
    fn enabling_on_odd_step_clocks_extra() {
        let mut len = LengthCounter::new(64);
        len.load(63);
        assert!(len.write_enable(true, OTHER_STEP));
    }

    #[test]
    fn trigger_reloads_zero_counter() {
        let mut len = LengthCounter::new(256);
        len.trigger(LENGTH_STEP);
        assert_eq!(len.value(), 256);

        let mut len = LengthCounter::new(256);
        len.write_enable(true, LENGTH_STEP);
        len.trigger(OTHER_STEP);
        assert_eq!(len.value(), 255);
    }
}
