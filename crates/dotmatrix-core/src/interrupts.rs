#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Interrupt {
    VBlank,
    LcdStat,
    Timer,
    Serial,
    Joypad,
}

impl Interrupt {
    /// Service order. When several requests are pending the lowest bit wins.
    pub const PRIORITY: [Interrupt; 5] = [
        Interrupt::VBlank,
        Interrupt::LcdStat,
        Interrupt::Timer,
        Interrupt::Serial,
        Interrupt::Joypad,
    ];

    #[inline]
    pub const fn bit(self) -> u8 {
        match self {
            Interrupt::VBlank => 0x01,
            Interrupt::LcdStat => 0x02,
            Interrupt::Timer => 0x04,
            Interrupt::Serial => 0x08,
            Interrupt::Joypad => 0x10,
        }
    }

    #[inline]
    pub const fn vector(self) -> u16 {
        match self {
            Interrupt::VBlank => 0x0040,
            Interrupt::LcdStat => 0x0048,
            Interrupt::Timer => 0x0050,
            Interrupt::Serial => 0x0058,
            Interrupt::Joypad => 0x0060,
        }
    }

    /// Highest-priority interrupt present in `mask`.
    pub fn highest(mask: u8) -> Option<Interrupt> {
        Self::PRIORITY.into_iter().find(|i| mask & i.bit() != 0)
    }
}

/// The five-bit pending set mirrored into IF (0xFF0F).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InterruptFlags(u8);

impl InterruptFlags {
    pub const MASK: u8 = 0x1F;

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & Self::MASK)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Value visible on the bus. The unused upper bits read as 1.
    pub const fn register(self) -> u8 {
        self.0 | 0xE0
    }

    pub fn request(&mut self, interrupt: Interrupt) {
        self.0 |= interrupt.bit();
    }

    pub fn acknowledge(&mut self, interrupt: Interrupt) {
        self.0 &= !interrupt.bit();
    }

    pub const fn contains(self, interrupt: Interrupt) -> bool {
        self.0 & interrupt.bit() != 0
    }
}
