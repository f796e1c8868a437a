//! Record log flags

/// Log flags (1 byte)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LogFlags(pub u8);

impl LogFlags {
    pub const NONE: LogFlags = LogFlags(0);

    // Flag bits
    pub const AUTO_SEEDED: u8 = 0b0000_0001;
    pub const HAS_DRIFT: u8 = 0b0000_0010;

    /// Bits this version understands
    pub const KNOWN: u8 = Self::AUTO_SEEDED | Self::HAS_DRIFT;

    #[inline]
    pub fn new(bits: u8) -> Self {
        LogFlags(bits)
    }

    /// Seed was chosen by the session rather than configured
    #[inline]
    pub fn is_auto_seeded(self) -> bool {
        self.0 & Self::AUTO_SEEDED != 0
    }

    /// Log contains computed (time-drift) decisions
    #[inline]
    pub fn has_drift(self) -> bool {
        self.0 & Self::HAS_DRIFT != 0
    }

    #[inline]
    pub fn set_auto_seeded(&mut self, value: bool) {
        if value {
            self.0 |= Self::AUTO_SEEDED;
        } else {
            self.0 &= !Self::AUTO_SEEDED;
        }
    }

    #[inline]
    pub fn set_drift(&mut self, value: bool) {
        if value {
            self.0 |= Self::HAS_DRIFT;
        } else {
            self.0 &= !Self::HAS_DRIFT;
        }
    }

    /// True if any bit is set that this version does not know
    #[inline]
    pub fn has_unknown(self) -> bool {
        self.0 & !Self::KNOWN != 0
    }
}
