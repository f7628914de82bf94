//! MBC3 real-time clock.
//!
//! Time advances lazily from the injected [`Clock`]: every access first
//! folds whole elapsed seconds into the running registers. Reads see the
//! latched copy only.

use log::debug;

use crate::clock::Clock;
use crate::error::RtcError;

/// Size of the current snapshot format.
pub const RTC_SNAPSHOT_LEN: usize = 48;
const LEGACY_REGS_LEN: usize = 5;
const LEGACY_TIMESTAMP_LEN: usize = 13;

pub const RTC_SECONDS: u8 = 0x08;
pub const RTC_MINUTES: u8 = 0x09;
pub const RTC_HOURS: u8 = 0x0A;
pub const RTC_DAY_LOW: u8 = 0x0B;
pub const RTC_CONTROL: u8 = 0x0C;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RtcRegisters {
    pub seconds: u8,
    pub minutes: u8,
    pub hours: u8,
    /// 9-bit day counter.
    pub days: u16,
    pub halt: bool,
    pub carry: bool,
}

impl RtcRegisters {
    /// Day bit 8, halt (bit 6) and day carry (bit 7).
    pub fn control_byte(&self) -> u8 {
        let mut out = ((self.days >> 8) as u8) & 0x01;
        if self.halt {
            out |= 0x40;
        }
        if self.carry {
            out |= 0x80;
        }
        out
    }

    fn read(&self, reg: u8) -> u8 {
        match reg {
            RTC_SECONDS => self.seconds & 0x3F,
            RTC_MINUTES => self.minutes & 0x3F,
            RTC_HOURS => self.hours & 0x1F,
            RTC_DAY_LOW => (self.days & 0x00FF) as u8,
            RTC_CONTROL => self.control_byte(),
            _ => 0xFF,
        }
    }

    fn write(&mut self, reg: u8, value: u8) {
        match reg {
            RTC_SECONDS => self.seconds = value & 0x3F,
            RTC_MINUTES => self.minutes = value & 0x3F,
            RTC_HOURS => self.hours = value & 0x1F,
            RTC_DAY_LOW => self.days = (self.days & 0x0100) | value as u16,
            RTC_CONTROL => {
                self.days = (self.days & 0x00FF) | (((value & 0x01) as u16) << 8);
                self.halt = value & 0x40 != 0;
                self.carry = value & 0x80 != 0;
            }
            _ => {}
        }
    }

    fn encode(&self, out: &mut Vec<u8>) {
        for reg in RTC_SECONDS..=RTC_CONTROL {
            out.extend_from_slice(&(self.read(reg) as i32).to_le_bytes());
        }
    }

    fn decode(words: &[u8]) -> Self {
        let mut regs = Self::default();
        for (reg, chunk) in (RTC_SECONDS..=RTC_CONTROL).zip(words.chunks_exact(4)) {
            let word = i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            regs.write(reg, word as u8);
        }
        regs
    }

    fn from_bytes(bytes: &[u8]) -> Self {
        let mut regs = Self::default();
        for (reg, &b) in (RTC_SECONDS..=RTC_CONTROL).zip(bytes) {
            regs.write(reg, b);
        }
        regs
    }

    fn advance_seconds(&mut self, mut seconds: u64) {
        while seconds > 0 {
            if self.in_range() {
                self.fold_seconds(seconds);
                return;
            }

            let until_minute_tick = self.seconds_until_minute_tick();
            if seconds < until_minute_tick {
                self.seconds = ((self.seconds as u64 + seconds) & 0x3F) as u8;
                return;
            }

            seconds -= until_minute_tick;
            self.seconds = 0;
            self.minute_tick();
        }
    }

    fn in_range(&self) -> bool {
        self.seconds < 60 && self.minutes < 60 && self.hours < 24
    }

    /// Adds `seconds` to registers that are all in range, without ticking.
    fn fold_seconds(&mut self, seconds: u64) {
        let total = seconds
            + self.seconds as u64
            + self.minutes as u64 * 60
            + self.hours as u64 * 3600;
        let time_of_day = total % 86_400;
        self.seconds = (time_of_day % 60) as u8;
        self.minutes = (time_of_day / 60 % 60) as u8;
        self.hours = (time_of_day / 3600) as u8;

        let days = self.days as u64 + total / 86_400;
        if days > 0x01FF {
            self.carry = true;
        }
        self.days = (days % 0x0200) as u16;
    }

    // Out-of-range values written by the game count up to 63 and wrap to 0
    // without carrying.
    fn seconds_until_minute_tick(&self) -> u64 {
        let sec = self.seconds as u64;
        if sec <= 59 {
            60 - sec
        } else {
            (63 - sec + 1) + 60
        }
    }

    fn minute_tick(&mut self) {
        let overflow = self.minutes == 59;
        self.minutes = ((self.minutes as u16 + 1) & 0x3F) as u8;
        if overflow {
            self.minutes = 0;
            self.hour_tick();
        }
    }

    fn hour_tick(&mut self) {
        let overflow = self.hours == 23;
        self.hours = ((self.hours as u16 + 1) & 0x1F) as u8;
        if overflow {
            self.hours = 0;
            self.day_tick();
        }
    }

    fn day_tick(&mut self) {
        if self.days >= 0x01FF {
            self.days = 0;
            self.carry = true;
        } else {
            self.days = (self.days + 1) & 0x01FF;
        }
    }
}

pub struct Rtc {
    regs: RtcRegisters,
    latched: RtcRegisters,
    /// Wall-clock time the running registers are current as of.
    last_ms: u64,
    clock: Box<dyn Clock>,
}

impl std::fmt::Debug for Rtc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rtc")
            .field("regs", &self.regs)
            .field("latched", &self.latched)
            .field("last_ms", &self.last_ms)
            .finish()
    }
}

impl Rtc {
    pub fn new(clock: Box<dyn Clock>) -> Self {
        let regs = RtcRegisters::default();
        Self {
            regs,
            latched: regs,
            last_ms: clock.now_ms(),
            clock,
        }
    }

    /// Running registers as of the last sync.
    pub fn registers(&self) -> RtcRegisters {
        self.regs
    }

    pub fn latched(&self) -> RtcRegisters {
        self.latched
    }

    /// Folds whole elapsed seconds into the running registers. The
    /// sub-second remainder carries over to the next sync.
    pub fn sync(&mut self) {
        let now = self.clock.now_ms();
        if self.regs.halt || now < self.last_ms {
            self.last_ms = now;
            return;
        }
        let secs = (now - self.last_ms) / 1000;
        if secs > 0 {
            self.regs.advance_seconds(secs);
            self.last_ms += secs * 1000;
        }
    }

    pub fn latch(&mut self) {
        self.sync();
        self.latched = self.regs;
    }

    pub fn read(&self, reg: u8) -> u8 {
        self.latched.read(reg)
    }

    pub fn write(&mut self, reg: u8, value: u8) {
        self.sync();
        self.regs.write(reg, value);
        if reg == RTC_SECONDS {
            self.last_ms = self.clock.now_ms();
        }
        self.latched = self.regs;
    }

    /// 48-byte snapshot: running then latched registers as five LE i32
    /// words each, followed by the LE u64 Unix-seconds save time.
    pub fn snapshot(&mut self) -> Vec<u8> {
        self.sync();
        let mut out = Vec::with_capacity(RTC_SNAPSHOT_LEN);
        self.regs.encode(&mut out);
        self.latched.encode(&mut out);
        out.extend_from_slice(&(self.clock.now_ms() / 1000).to_le_bytes());
        out
    }

    /// Accepts the 48-byte format plus the legacy 5-byte (registers only)
    /// and 13-byte (registers plus f64 millisecond timestamp) layouts. Time
    /// elapsed since the save is applied unless the clock was halted.
    pub fn load_snapshot(&mut self, data: &[u8]) -> Result<(), RtcError> {
        let now = self.clock.now_ms();
        let elapsed_secs = match data.len() {
            RTC_SNAPSHOT_LEN => {
                self.regs = RtcRegisters::decode(&data[0..20]);
                self.latched = RtcRegisters::decode(&data[20..40]);
                let mut ts = [0u8; 8];
                ts.copy_from_slice(&data[40..48]);
                (now / 1000).saturating_sub(u64::from_le_bytes(ts))
            }
            LEGACY_TIMESTAMP_LEN => {
                self.regs = RtcRegisters::from_bytes(&data[..LEGACY_REGS_LEN]);
                self.latched = self.regs;
                let mut ts = [0u8; 8];
                ts.copy_from_slice(&data[5..13]);
                let saved_ms = f64::from_le_bytes(ts);
                if saved_ms.is_finite() && saved_ms >= 0.0 {
                    now.saturating_sub(saved_ms as u64) / 1000
                } else {
                    0
                }
            }
            LEGACY_REGS_LEN => {
                self.regs = RtcRegisters::from_bytes(data);
                self.latched = self.regs;
                0
            }
            len => return Err(RtcError::InvalidLength { len }),
        };

        if !self.regs.halt {
            self.regs.advance_seconds(elapsed_secs);
        }
        self.last_ms = now;
        debug!(
            "Restored RTC ({} bytes), {elapsed_secs}s elapsed since save",
            data.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    const START_MS: u64 = 1_700_000_000_000;

    fn rtc() -> (Rtc, ManualClock) {
        let clock = ManualClock::new(START_MS);
        (Rtc::new(Box::new(clock.clone())), clock)
    }

    #[test]
    fn ticks_through_invalid_values() {
        let mut regs = RtcRegisters {
            seconds: 59,
            minutes: 60,
            ..Default::default()
        };
        regs.advance_seconds(1);
        assert_eq!((regs.seconds, regs.minutes), (0, 61));

        regs.seconds = 63;
        regs.minutes = 5;
        regs.advance_seconds(1);
        assert_eq!((regs.seconds, regs.minutes), (0, 5));

        regs.seconds = 59;
        regs.minutes = 59;
        regs.hours = 24;
        regs.advance_seconds(1);
        assert_eq!((regs.seconds, regs.minutes, regs.hours), (0, 0, 25));
    }

    #[test]
    fn long_gaps_fold_without_ticking() {
        let mut regs = RtcRegisters::default();
        regs.advance_seconds(600 * 86_400 + 3661);
        assert_eq!((regs.hours, regs.minutes, regs.seconds), (1, 1, 1));
        assert_eq!(regs.days, 600 - 512);
        assert!(regs.carry);

        // Invalid hours still wrap to 0 without a day carry before folding.
        let mut regs = RtcRegisters {
            hours: 31,
            minutes: 59,
            seconds: 59,
            ..Default::default()
        };
        regs.advance_seconds(1 + 86_400);
        assert_eq!((regs.hours, regs.minutes, regs.seconds), (0, 0, 0));
        assert_eq!(regs.days, 1);
        assert!(!regs.carry);
    }

    #[test]
    fn zero_timestamp_in_legacy_blob_loads_quickly() {
        let (mut rtc, _clock) = rtc();
        let mut blob = vec![0, 0, 0, 0, 0];
        blob.extend_from_slice(&0f64.to_le_bytes());
        rtc.load_snapshot(&blob).unwrap();
        let expected_days = START_MS / 1000 / 86_400;
        assert_eq!(rtc.registers().days as u64, expected_days % 0x200);
        assert!(rtc.registers().carry);
    }

    #[test]
    fn lazy_advance_carries_into_days() {
        let (mut rtc, clock) = rtc();
        rtc.write(RTC_DAY_LOW, 10);
        clock.advance_secs(90_000);
        assert_eq!(rtc.read(RTC_DAY_LOW), 10);

        rtc.latch();
        assert_eq!(rtc.read(RTC_DAY_LOW), 11);
        assert_eq!(rtc.read(RTC_HOURS), 1);
        assert_eq!(rtc.read(RTC_MINUTES), 0);
        assert_eq!(rtc.read(RTC_SECONDS), 0);
    }

    #[test]
    fn day_overflow_sets_carry() {
        let (mut rtc, clock) = rtc();
        rtc.write(RTC_DAY_LOW, 0xFF);
        rtc.write(RTC_CONTROL, 0x01);
        rtc.write(RTC_HOURS, 23);
        rtc.write(RTC_MINUTES, 59);
        rtc.write(RTC_SECONDS, 59);
        clock.advance_secs(1);
        rtc.latch();
        assert_eq!(rtc.read(RTC_DAY_LOW), 0);
        assert_eq!(rtc.read(RTC_CONTROL), 0x80);
    }

    #[test]
    fn halted_clock_does_not_advance() {
        let (mut rtc, clock) = rtc();
        rtc.write(RTC_CONTROL, 0x40);
        clock.advance_secs(3600);
        rtc.write(RTC_CONTROL, 0x00);
        clock.advance_ms(999);
        rtc.latch();
        assert_eq!(rtc.read(RTC_SECONDS), 0);
        clock.advance_ms(1);
        rtc.latch();
        assert_eq!(rtc.read(RTC_SECONDS), 1);
    }

    #[test]
    fn sub_second_remainder_carries_over() {
        let (mut rtc, clock) = rtc();
        clock.advance_ms(1500);
        rtc.latch();
        assert_eq!(rtc.read(RTC_SECONDS), 1);
        clock.advance_ms(500);
        rtc.latch();
        assert_eq!(rtc.read(RTC_SECONDS), 2);
    }

    #[test]
    fn snapshot_round_trip_with_frozen_clock() {
        let (mut rtc, clock) = rtc();
        rtc.write(RTC_HOURS, 5);
        rtc.write(RTC_MINUTES, 42);
        clock.advance_secs(7);
        let blob = rtc.snapshot();
        assert_eq!(blob.len(), RTC_SNAPSHOT_LEN);

        let mut restored = Rtc::new(Box::new(clock.clone()));
        restored.load_snapshot(&blob).unwrap();
        assert_eq!(restored.registers(), rtc.registers());
        assert_eq!(restored.latched(), rtc.latched());
    }

    #[test]
    fn snapshot_applies_time_since_save() {
        let (mut rtc, clock) = rtc();
        let blob = rtc.snapshot();
        clock.advance_secs(125);
        let mut restored = Rtc::new(Box::new(clock.clone()));
        restored.load_snapshot(&blob).unwrap();
        restored.latch();
        assert_eq!(restored.read(RTC_MINUTES), 2);
        assert_eq!(restored.read(RTC_SECONDS), 5);
    }

    #[test]
    fn legacy_formats() {
        let (mut rtc, clock) = rtc();
        rtc.load_snapshot(&[10, 20, 3, 4, 0x01]).unwrap();
        assert_eq!(rtc.read(RTC_SECONDS), 10);
        assert_eq!(rtc.registers().days, 0x104);

        let mut blob = vec![0, 0, 0, 0, 0];
        blob.extend_from_slice(&((START_MS - 61_000) as f64).to_le_bytes());
        let mut legacy = Rtc::new(Box::new(clock.clone()));
        legacy.load_snapshot(&blob).unwrap();
        assert_eq!(legacy.registers().minutes, 1);
        assert_eq!(legacy.registers().seconds, 1);

        assert_eq!(
            rtc.load_snapshot(&[0; 12]),
            Err(RtcError::InvalidLength { len: 12 })
        );
    }
}
