use crate::interrupts::{Interrupt, InterruptFlags};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Button {
    Right,
    Left,
    Up,
    Down,
    A,
    B,
    Select,
    Start,
}

impl Button {
    pub const ALL: [Button; 8] = [
        Button::Right,
        Button::Left,
        Button::Up,
        Button::Down,
        Button::A,
        Button::B,
        Button::Select,
        Button::Start,
    ];

    /// Bit in the combined state byte: directions in the low nibble, actions
    /// in the high nibble.
    const fn mask(self) -> u8 {
        match self {
            Button::Right => 0x01,
            Button::Left => 0x02,
            Button::Up => 0x04,
            Button::Down => 0x08,
            Button::A => 0x10,
            Button::B => 0x20,
            Button::Select => 0x40,
            Button::Start => 0x80,
        }
    }
}

/// P1 (0xFF00). Reads are active-low.
#[derive(Debug, Clone)]
pub struct Joypad {
    /// Bits 4-5 as last written.
    select: u8,
    /// Pressed buttons, active-high.
    pressed: u8,
}

impl Default for Joypad {
    fn default() -> Self {
        Self::new()
    }
}

impl Joypad {
    pub fn new() -> Self {
        Self {
            select: 0x30,
            pressed: 0,
        }
    }

    pub fn read(&self) -> u8 {
        let mut low = 0x0F;
        if self.select & 0x10 == 0 {
            low &= !(self.pressed & 0x0F);
        }
        if self.select & 0x20 == 0 {
            low &= !(self.pressed >> 4);
        }
        0xC0 | self.select | low
    }

    pub fn write(&mut self, val: u8) {
        self.select = val & 0x30;
    }

    /// Updates a button. A new press requests the joypad interrupt, which
    /// also wakes the CPU from `STOP`.
    pub fn set_button(&mut self, button: Button, pressed: bool, flags: &mut InterruptFlags) {
        let was = self.pressed & button.mask() != 0;
        if pressed {
            self.pressed |= button.mask();
            if !was {
                flags.request(Interrupt::Joypad);
            }
        } else {
            self.pressed &= !button.mask();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_selection_filters_buttons() {
        let mut pad = Joypad::new();
        let mut flags = InterruptFlags::default();
        pad.set_button(Button::Start, true, &mut flags);
        pad.set_button(Button::Left, true, &mut flags);
        assert!(flags.contains(Interrupt::Joypad));

        assert_eq!(pad.read(), 0xFF);
        pad.write(0x20);
        assert_eq!(pad.read(), 0xE0 | 0x0D);
        pad.write(0x10);
        assert_eq!(pad.read(), 0xD0 | 0x07);
    }

    #[test]
    fn holding_a_button_requests_once() {
        let mut pad = Joypad::new();
        let mut flags = InterruptFlags::default();
        pad.set_button(Button::A, true, &mut flags);
        flags.acknowledge(Interrupt::Joypad);
        pad.set_button(Button::A, true, &mut flags);
        assert!(!flags.contains(Interrupt::Joypad));
    }
}
