#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
/// Console model being emulated.
///
/// Used to model model-specific behavior that affects timing and observable
/// register state.
pub enum Model {
    #[default]
    Dmg,
    Cgb,
}

impl Model {
    #[inline]
    pub const fn is_cgb(self) -> bool {
        matches!(self, Model::Cgb)
    }

    #[inline]
    /// Per-master-cycle charge factor of the output high-pass capacitor.
    pub const fn high_pass_base(self) -> f64 {
        match self {
            Model::Dmg => 0.999958,
            Model::Cgb => 0.998943,
        }
    }

    #[inline]
    /// Returns whether wave RAM is blocked while channel 3 is playing.
    pub const fn blocks_wave_ram_while_playing(self) -> bool {
        matches!(self, Model::Dmg)
    }

    #[inline]
    /// Returns whether length registers accept writes while the APU is off.
    pub const fn length_writable_while_off(self) -> bool {
        matches!(self, Model::Dmg)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
/// How the emulated model is chosen when a ROM is loaded.
pub enum EmulationMode {
    /// CGB when the header declares CGB support, DMG otherwise.
    #[default]
    Auto,
    ForceDmg,
    ForceCgb,
}

impl EmulationMode {
    pub const fn resolve(self, cgb_flag: bool) -> Model {
        match self {
            EmulationMode::Auto if cgb_flag => Model::Cgb,
            EmulationMode::Auto | EmulationMode::ForceDmg => Model::Dmg,
            EmulationMode::ForceCgb => Model::Cgb,
        }
    }
}

/// Base CPU clock in T-cycles per second.
pub const CPU_CLOCK_HZ: u32 = 4_194_304;

/// T-cycles in one complete LCD frame.
pub const CYCLES_PER_FRAME: u32 = 70_224;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_mode_follows_header_flag() {
        assert_eq!(EmulationMode::Auto.resolve(true), Model::Cgb);
        assert_eq!(EmulationMode::Auto.resolve(false), Model::Dmg);
        assert_eq!(EmulationMode::ForceDmg.resolve(true), Model::Dmg);
        assert_eq!(EmulationMode::ForceCgb.resolve(false), Model::Cgb);
    }
}
