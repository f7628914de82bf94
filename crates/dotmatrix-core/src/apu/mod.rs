//! Audio processing unit.
//!
//! `tick` receives master cycles (4 194 304 Hz regardless of CPU speed) and
//! interleaves three cadences: channel period timers, the 512 Hz frame
//! sequencer and sample mixing at the configured output rate. Each inner
//! step advances to whichever of those fires first.

mod channel;
mod envelope;
mod mixer;
mod noise;
mod output;
mod square;
mod wave;

use channel::{Channel, SequencerPhase};
use mixer::Mixer;
use noise::NoiseChannel;
use output::SampleQueue;
use square::SquareChannel;
use wave::WaveChannel;

use crate::hardware::{CPU_CLOCK_HZ, Model};

#[cfg(feature = "apu-trace")]
macro_rules! apu_trace {
    ($($arg:tt)*) => {
        log::trace!($($arg)*);
    };
}
#[cfg(not(feature = "apu-trace"))]
macro_rules! apu_trace {
    ($($arg:tt)*) => {};
}

/// Master cycles between frame sequencer steps (512 Hz).
pub const FRAME_SEQUENCER_PERIOD: u32 = 8192;
pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;
pub const DEFAULT_MAX_BUFFER_SECONDS: f32 = 0.25;

/// NR10-NR51 after the boot ROM.
const POWER_ON_REGS: [u8; 0x16] = [
    0x80, 0xBF, 0xF3, 0xFF, 0xBF, 0xFF, 0x3F, 0x00, 0xFF, 0xBF, 0x7F, 0xFF, 0x9F, 0xFF, 0xBF, 0xFF,
    0xFF, 0x00, 0x00, 0xBF, 0x77, 0xF3,
];

pub struct Apu {
    model: Model,
    ch1: SquareChannel,
    ch2: SquareChannel,
    ch3: WaveChannel,
    ch4: NoiseChannel,
    /// Raw NR10-NR51 as last written.
    regs: [u8; 0x16],
    powered: bool,
    /// Next frame sequencer step.
    sequencer_step: u8,
    sequencer_clocks: u64,
    /// Copy of the system divider in master cycles; bit 12 falling clocks
    /// the frame sequencer.
    div_phase: u16,
    /// Sample clock accumulator in units of 1 / (CPU_CLOCK_HZ * rate).
    sample_phase: u64,
    max_buffer_seconds: f32,
    mixer: Mixer,
    output: SampleQueue,
}

impl Apu {
    pub fn new(model: Model, sample_rate: u32, max_buffer_seconds: f32) -> Self {
        let sample_rate = sample_rate.max(1);
        let mut apu = Self {
            model,
            ch1: SquareChannel::new(true),
            ch2: SquareChannel::new(false),
            ch3: WaveChannel::default(),
            ch4: NoiseChannel::default(),
            regs: [0; 0x16],
            powered: true,
            sequencer_step: 0,
            sequencer_clocks: 0,
            div_phase: 0,
            sample_phase: 0,
            max_buffer_seconds,
            mixer: Mixer::new(model, sample_rate),
            output: SampleQueue::new(sample_rate, max_buffer_seconds),
        };
        apu.apply_power_on_defaults();
        apu
    }

    /// Register state left behind by the boot ROM.
    pub fn apply_power_on_defaults(&mut self) {
        self.powered = true;
        self.ch1.power_off(false);
        self.ch2.power_off(false);
        self.ch3.power_off(false);
        self.ch4.power_off(false);
        self.regs = POWER_ON_REGS;
        self.sequencer_step = 0;
        self.ch1.post_boot(0xBF, 0xF3, 0x3FF, true);
        self.ch2.post_boot(0x3F, 0x00, 0x3FF, false);
        let phase = self.phase();
        self.ch3.write(0, 0x7F, phase);
        self.mixer.reset_filter();
        self.output.clear();
    }

    pub fn model(&self) -> Model {
        self.model
    }

    pub fn sample_rate(&self) -> u32 {
        self.output.rate()
    }

    pub fn set_sample_rate(&mut self, rate: u32) {
        let rate = rate.max(1);
        self.mixer.set_sample_rate(rate);
        self.output.set_rate(rate, self.max_buffer_seconds);
        self.sample_phase = 0;
    }

    pub fn is_powered(&self) -> bool {
        self.powered
    }

    pub fn sequencer_step(&self) -> u8 {
        self.sequencer_step
    }

    /// Frame sequencer steps executed since creation.
    pub fn sequencer_clocks(&self) -> u64 {
        self.sequencer_clocks
    }

    pub fn buffered_frames(&self) -> usize {
        self.output.len()
    }

    fn phase(&self) -> SequencerPhase {
        SequencerPhase {
            next_step: self.sequencer_step,
        }
    }

    fn channels(&self) -> [&dyn Channel; 4] {
        [&self.ch1, &self.ch2, &self.ch3, &self.ch4]
    }

    fn channels_mut(&mut self) -> [&mut dyn Channel; 4] {
        [&mut self.ch1, &mut self.ch2, &mut self.ch3, &mut self.ch4]
    }

    /// Advances by `cycles` master cycles.
    pub fn tick(&mut self, cycles: u32) {
        let rate = self.output.rate() as u64;
        let mut remaining = cycles;
        while remaining > 0 {
            let until_sequencer = FRAME_SEQUENCER_PERIOD - (self.div_phase as u32 & 0x1FFF);
            let until_sample = (CPU_CLOCK_HZ as u64 - self.sample_phase).div_ceil(rate) as u32;
            let step = remaining.min(until_sequencer).min(until_sample.max(1));

            if self.powered {
                for ch in self.channels_mut() {
                    ch.tick(step);
                }
            }

            self.div_phase = self.div_phase.wrapping_add(step as u16);
            if self.div_phase & 0x1FFF == 0 && self.powered {
                self.clock_frame_sequencer();
            }

            self.sample_phase += step as u64 * rate;
            if self.sample_phase >= CPU_CLOCK_HZ as u64 {
                self.sample_phase -= CPU_CLOCK_HZ as u64;
                self.mix_sample();
            }

            remaining -= step;
        }
    }

    fn clock_frame_sequencer(&mut self) {
        let step = self.sequencer_step;
        self.sequencer_step = (step + 1) & 7;
        self.sequencer_clocks += 1;

        if step & 1 == 0 {
            for ch in self.channels_mut() {
                ch.clock_length();
            }
        }
        if step == 2 || step == 6 {
            self.ch1.clock_sweep();
        }
        if step == 7 {
            self.ch1.clock_envelope();
            self.ch2.clock_envelope();
            self.ch4.clock_envelope();
        }
    }

    fn mix_sample(&mut self) {
        let channels = self.channels();
        let samples = channels.map(|ch| ch.sample());
        let dacs = channels.map(|ch| ch.dac_enabled());
        let (left, right) = self
            .mixer
            .mix(samples, dacs, self.regs[0x14], self.regs[0x15]);
        self.output.push(left, right);
    }

    /// DIV was written. A high watched bit falls, which clocks the
    /// sequencer once, and the phase restarts from zero.
    pub fn handle_divider_reset(&mut self) {
        if self.powered && self.div_phase & 0x1000 != 0 {
            self.clock_frame_sequencer();
        }
        self.div_phase = 0;
    }

    /// Aligns the sequencer phase with the system divider.
    pub fn set_divider_phase(&mut self, phase: u16) {
        self.div_phase = phase;
    }

    fn read_mask(addr: u16) -> u8 {
        match addr {
            0xFF10 => 0x80,
            0xFF11 | 0xFF16 => 0x3F,
            0xFF12 | 0xFF17 | 0xFF21 | 0xFF22 | 0xFF24 | 0xFF25 => 0x00,
            0xFF14 | 0xFF19 | 0xFF1E | 0xFF23 => 0xBF,
            0xFF1A => 0x7F,
            0xFF1C => 0x9F,
            0xFF26 => 0x70,
            _ => 0xFF,
        }
    }

    fn wave_ram_blocked(&self) -> bool {
        self.model.blocks_wave_ram_while_playing() && self.ch3.enabled()
    }

    /// Reads 0xFF10-0xFF3F. `None` for addresses outside the APU.
    pub fn read_register(&self, addr: u16) -> Option<u8> {
        match addr {
            0xFF10..=0xFF25 => Some(self.regs[(addr - 0xFF10) as usize] | Self::read_mask(addr)),
            0xFF26 => {
                let mut val = Self::read_mask(addr);
                if self.powered {
                    val |= 0x80;
                }
                for (bit, ch) in self.channels().iter().enumerate() {
                    if ch.enabled() {
                        val |= 1 << bit;
                    }
                }
                Some(val)
            }
            0xFF27..=0xFF2F => Some(0xFF),
            0xFF30..=0xFF3F => Some(if self.wave_ram_blocked() {
                0xFF
            } else {
                self.ch3.read_ram((addr - 0xFF30) as usize)
            }),
            _ => None,
        }
    }

    pub fn write_register(&mut self, addr: u16, val: u8) {
        match addr {
            0xFF30..=0xFF3F => {
                if !self.wave_ram_blocked() {
                    self.ch3.write_ram((addr - 0xFF30) as usize, val);
                }
            }
            0xFF26 => self.write_power(val & 0x80 != 0),
            0xFF10..=0xFF25 if !self.powered => {
                if self.model.length_writable_while_off() {
                    match addr {
                        0xFF11 => self.ch1.write_length(val),
                        0xFF16 => self.ch2.write_length(val),
                        0xFF1B => self.ch3.write_length(val),
                        0xFF20 => self.ch4.write_length(val),
                        _ => {}
                    }
                }
            }
            0xFF10..=0xFF25 => {
                self.regs[(addr - 0xFF10) as usize] = val;
                let phase = self.phase();
                let offset = (addr - 0xFF10) as u8;
                let reg = offset % 5;
                match offset / 5 {
                    0 => self.ch1.write(reg, val, phase),
                    1 => self.ch2.write(reg, val, phase),
                    2 => self.ch3.write(reg, val, phase),
                    3 => self.ch4.write(reg, val, phase),
                    _ => {}
                }
                if reg == 4 && val & 0x80 != 0 {
                    apu_trace!("ch{} trigger NRx4={val:#04X}", offset / 5 + 1);
                }
            }
            _ => {}
        }
    }

    fn write_power(&mut self, on: bool) {
        if on == self.powered {
            return;
        }
        if on {
            // The sequencer restarts at step 0 but stays locked to the
            // divider phase.
            self.sequencer_step = 0;
            self.powered = true;
        } else {
            let keep_length = self.model.length_writable_while_off();
            for ch in self.channels_mut() {
                ch.power_off(keep_length);
            }
            self.regs.fill(0);
            self.powered = false;
        }
        apu_trace!("APU power {}", if on { "on" } else { "off" });
    }

    /// PCM12 (0xFF76): channel 2 output in the high nibble, channel 1 low.
    pub fn read_pcm12(&self) -> u8 {
        (self.ch2.sample() << 4) | self.ch1.sample()
    }

    /// PCM34 (0xFF77).
    pub fn read_pcm34(&self) -> u8 {
        (self.ch4.sample() << 4) | self.ch3.sample()
    }

    /// Resamples buffered audio to `sample_rate` and returns `frames`
    /// interleaved stereo frames.
    pub fn flush_samples(&mut self, sample_rate: u32, frames: usize) -> Vec<f32> {
        self.output.flush(sample_rate, frames)
    }

    pub fn ch1_frequency(&self) -> u16 {
        self.ch1.frequency()
    }

    pub fn ch1_volume(&self) -> u8 {
        self.ch1.volume()
    }

    pub fn ch1_length(&self) -> u16 {
        self.ch1.length()
    }

    pub fn ch2_length(&self) -> u16 {
        self.ch2.length()
    }

    pub fn ch3_length(&self) -> u16 {
        self.ch3.length()
    }

    pub fn ch3_position(&self) -> u8 {
        self.ch3.position()
    }

    pub fn ch4_lfsr(&self) -> u16 {
        self.ch4.lfsr()
    }
}

impl Default for Apu {
    fn default() -> Self {
        Self::new(Model::Dmg, DEFAULT_SAMPLE_RATE, DEFAULT_MAX_BUFFER_SECONDS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn silent_apu(model: Model) -> Apu {
        let mut apu = Apu::new(model, DEFAULT_SAMPLE_RATE, 1.0);
        apu.write_register(0xFF26, 0x00);
        apu.write_register(0xFF26, 0x80);
        apu
    }

    #[test]
    fn power_on_state() {
        let apu = Apu::default();
        assert_eq!(apu.read_register(0xFF26), Some(0xF1));
        assert_eq!(apu.read_register(0xFF24), Some(0x77));
        assert_eq!(apu.read_register(0xFF11), Some(0xBF));
        assert_eq!(apu.read_register(0xFF40), None);
    }

    #[test]
    fn sequencer_runs_at_512_hz() {
        let mut apu = silent_apu(Model::Dmg);
        for _ in 0..CPU_CLOCK_HZ / 1024 {
            apu.tick(1024);
        }
        assert_eq!(apu.sequencer_clocks(), 512);
        assert_eq!(apu.sequencer_step(), 0);
    }

    #[test]
    fn produces_samples_at_output_rate() {
        let mut apu = silent_apu(Model::Dmg);
        apu.tick(CPU_CLOCK_HZ);
        assert_eq!(apu.buffered_frames(), DEFAULT_SAMPLE_RATE as usize);
    }

    #[test]
    fn power_off_clears_registers_but_not_wave_ram() {
        let mut apu = silent_apu(Model::Cgb);
        apu.write_register(0xFF30, 0x12);
        apu.write_register(0xFF24, 0x55);
        apu.write_register(0xFF26, 0x00);
        assert_eq!(apu.read_register(0xFF24), Some(0x00));
        assert_eq!(apu.read_register(0xFF26), Some(0x70));
        assert_eq!(apu.read_register(0xFF30), Some(0x12));

        apu.write_register(0xFF24, 0x77);
        assert_eq!(apu.read_register(0xFF24), Some(0x00));
    }

    #[test]
    fn dmg_blocks_wave_ram_while_playing() {
        let mut apu = silent_apu(Model::Dmg);
        apu.write_register(0xFF30, 0xAB);
        apu.write_register(0xFF1A, 0x80);
        apu.write_register(0xFF1E, 0x80);
        assert_eq!(apu.read_register(0xFF26), Some(0xF4));
        assert_eq!(apu.read_register(0xFF30), Some(0xFF));
        apu.write_register(0xFF30, 0x00);

        apu.write_register(0xFF1A, 0x00);
        assert_eq!(apu.read_register(0xFF30), Some(0xAB));

        let mut cgb = silent_apu(Model::Cgb);
        cgb.write_register(0xFF30, 0xAB);
        cgb.write_register(0xFF1A, 0x80);
        cgb.write_register(0xFF1E, 0x80);
        assert_eq!(cgb.read_register(0xFF30), Some(0xAB));
    }

    #[test]
    fn divider_reset_clocks_sequencer_when_bit_high() {
        let mut apu = silent_apu(Model::Dmg);
        apu.tick(0x1000);
        apu.handle_divider_reset();
        assert_eq!(apu.sequencer_clocks(), 1);
        apu.handle_divider_reset();
        assert_eq!(apu.sequencer_clocks(), 1);
        apu.tick(FRAME_SEQUENCER_PERIOD - 1);
        assert_eq!(apu.sequencer_clocks(), 1);
        apu.tick(1);
        assert_eq!(apu.sequencer_clocks(), 2);
    }

    #[test]
    fn pcm_taps_report_channel_output() {
        let mut apu = silent_apu(Model::Cgb);
        apu.write_register(0xFF12, 0xF0);
        apu.write_register(0xFF11, 0xC0);
        apu.write_register(0xFF14, 0x80);
        assert_eq!(apu.read_pcm12() & 0x0F, 0x00);
        apu.tick(4 * 2048);
        assert_eq!(apu.read_pcm12() & 0x0F, 0x0F);
        assert_eq!(apu.read_pcm34(), 0x00);
    }
}
