use crate::hardware::{CPU_CLOCK_HZ, Model};

/// Full-scale magnitude: four voices, DAC swing of 8, master volume 8.
const FULL_SCALE: f32 = 4.0 * 8.0 * 8.0;

/// NR50/NR51 routing followed by the output high-pass capacitor.
#[derive(Debug, Clone)]
pub(crate) struct Mixer {
    base: f64,
    hp_coef: f32,
    prev_input: [f32; 2],
    prev_output: [f32; 2],
}

impl Mixer {
    pub fn new(model: Model, sample_rate: u32) -> Self {
        let base = model.high_pass_base();
        Self {
            base,
            hp_coef: Self::calc_hp_coef(base, sample_rate),
            prev_input: [0.0; 2],
            prev_output: [0.0; 2],
        }
    }

    fn calc_hp_coef(base: f64, rate: u32) -> f32 {
        base.powf(CPU_CLOCK_HZ as f64 / rate.max(1) as f64) as f32
    }

    pub fn set_sample_rate(&mut self, rate: u32) {
        self.hp_coef = Self::calc_hp_coef(self.base, rate);
    }

    pub fn reset_filter(&mut self) {
        self.prev_input = [0.0; 2];
        self.prev_output = [0.0; 2];
    }

    /// Mixes the four digital outputs into a stereo frame in [-1, 1].
    pub fn mix(&mut self, samples: [u8; 4], dacs: [bool; 4], nr50: u8, nr51: u8) -> (f32, f32) {
        if !dacs.iter().any(|&on| on) {
            self.reset_filter();
            return (0.0, 0.0);
        }

        let mut left = 0i16;
        let mut right = 0i16;
        for ch in 0..4 {
            if !dacs[ch] {
                continue;
            }
            let analog = 8 - samples[ch] as i16;
            if nr51 & (0x10 << ch) != 0 {
                left += analog;
            }
            if nr51 & (0x01 << ch) != 0 {
                right += analog;
            }
        }

        let left_vol = ((nr50 >> 4) & 0x07) as i16 + 1;
        let right_vol = (nr50 & 0x07) as i16 + 1;
        let left = (left * left_vol) as f32 / FULL_SCALE;
        let right = (right * right_vol) as f32 / FULL_SCALE;
        (self.dc_block(0, left), self.dc_block(1, right))
    }

    fn dc_block(&mut self, side: usize, input: f32) -> f32 {
        let out = input - self.prev_input[side] + self.hp_coef * self.prev_output[side];
        self.prev_input[side] = input;
        self.prev_output[side] = out;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_ON: [bool; 4] = [true; 4];

    #[test]
    fn dc_filter_converges_to_zero() {
        let mut mixer = Mixer::new(Model::Dmg, 48_000);
        let first = mixer.mix([15, 0, 0, 0], ALL_ON, 0x77, 0xFF);
        let mut out = first;
        for _ in 0..48_000 {
            out = mixer.mix([15, 0, 0, 0], ALL_ON, 0x77, 0xFF);
        }
        assert!(first.0.abs() > 0.1);
        assert!(out.0.abs() < 0.001);
    }

    #[test]
    fn panning_routes_channels() {
        let mut mixer = Mixer::new(Model::Cgb, 48_000);
        let (l, r) = mixer.mix([0, 0, 0, 0], ALL_ON, 0x77, 0x01);
        assert_eq!(l, 0.0);
        assert!(r > 0.0);
    }

    #[test]
    fn filter_resets_when_all_dacs_off() {
        let mut mixer = Mixer::new(Model::Dmg, 48_000);
        mixer.mix([15, 15, 15, 15], ALL_ON, 0x77, 0xFF);
        assert_eq!(mixer.mix([0; 4], [false; 4], 0x77, 0xFF), (0.0, 0.0));
        assert_eq!(mixer.prev_output, [0.0; 2]);
    }

    #[test]
    fn cgb_filter_decays_faster() {
        let dmg = Mixer::new(Model::Dmg, 48_000);
        let cgb = Mixer::new(Model::Cgb, 48_000);
        assert!(cgb.hp_coef < dmg.hp_coef);
    }
}
