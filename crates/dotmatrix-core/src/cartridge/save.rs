/// Persistent cartridge state handed to and from the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SavePayload {
    /// Cartridge RAM image, sized to the header's RAM size.
    pub battery: Vec<u8>,
    /// RTC snapshot for MBC3 carts with a clock.
    pub rtc: Option<Vec<u8>>,
}

impl SavePayload {
    pub fn new(battery: Vec<u8>, rtc: Option<Vec<u8>>) -> Self {
        Self { battery, rtc }
    }

    pub fn is_empty(&self) -> bool {
        self.battery.is_empty() && self.rtc.is_none()
    }
}
