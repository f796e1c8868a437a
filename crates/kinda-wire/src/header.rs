//! Fixed header for the record log
//!
//! Fixed header is 24 bytes, followed by the personality name:
//! - Bytes 0-3: Magic `KNDA`
//! - Byte 4: Format version
//! - Byte 5: Flags
//! - Byte 6: Chaos level
//! - Byte 7: Personality name length (N)
//! - Bytes 8-15: Seed (LE)
//! - Bytes 16-23: Decision count (LE)
//! - Bytes 24..24+N: Personality name (UTF-8)

use bytes::{Buf, BufMut};
use kinda_core::{ChaosLevel, KindaError, KindaResult};

use crate::LogFlags;

/// Fixed header size in bytes (without the personality name)
pub const FIXED_HEADER_SIZE: usize = 24;

/// Magic bytes opening every record log
pub const LOG_MAGIC: [u8; 4] = *b"KNDA";

/// Current format version
pub const LOG_VERSION: u8 = 1;

/// Longest personality name the header can carry
pub const MAX_PERSONALITY_LEN: usize = u8::MAX as usize;

/// Record log header
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogHeader {
    /// Format version
    pub version: u8,
    /// Log flags
    pub flags: LogFlags,
    /// Chaos level at recording start
    pub chaos_level: ChaosLevel,
    /// Seed of the recorded session
    pub seed: u64,
    /// Number of decision records that follow
    pub decision_count: u64,
    /// Personality name at recording start
    pub personality: String,
}

impl LogHeader {
    /// Create a header for a fresh log
    pub fn new(personality: &str, chaos_level: ChaosLevel, seed: u64) -> Self {
        LogHeader {
            version: LOG_VERSION,
            flags: LogFlags::NONE,
            chaos_level,
            seed,
            decision_count: 0,
            personality: personality.to_string(),
        }
    }

    /// Encoded size including the personality name
    #[inline]
    pub fn encoded_len(&self) -> usize {
        FIXED_HEADER_SIZE + self.personality.len()
    }

    /// Parse a header, advancing `buf` past it
    pub fn parse(buf: &mut &[u8]) -> KindaResult<Self> {
        if buf.len() < FIXED_HEADER_SIZE {
            return Err(KindaError::BufferTooShort {
                expected: FIXED_HEADER_SIZE,
                actual: buf.len(),
            });
        }

        // Bytes 0-3: Magic
        let mut magic = [0u8; 4];
        buf.copy_to_slice(&mut magic);
        if magic != LOG_MAGIC {
            return Err(KindaError::InvalidLogFormat("bad magic".into()));
        }

        // Byte 4: Version
        let version = buf.get_u8();
        if version != LOG_VERSION {
            return Err(KindaError::InvalidLogFormat(format!(
                "unsupported version {version}"
            )));
        }

        // Byte 5: Flags
        let flags = LogFlags::new(buf.get_u8());
        if flags.has_unknown() {
            return Err(KindaError::InvalidLogFormat(format!(
                "unknown flags {:#010b}",
                flags.0
            )));
        }

        // Byte 6: Chaos level
        let chaos_level = ChaosLevel::new(buf.get_u8())?;

        // Byte 7: Name length
        let name_len = buf.get_u8() as usize;

        // Bytes 8-15: Seed
        let seed = buf.get_u64_le();

        // Bytes 16-23: Decision count
        let decision_count = buf.get_u64_le();

        if buf.len() < name_len {
            return Err(KindaError::BufferTooShort {
                expected: FIXED_HEADER_SIZE + name_len,
                actual: FIXED_HEADER_SIZE + buf.len(),
            });
        }
        let personality = std::str::from_utf8(&buf[..name_len])
            .map_err(|_| KindaError::InvalidLogFormat("personality is not UTF-8".into()))?
            .to_string();
        buf.advance(name_len);

        Ok(LogHeader {
            version,
            flags,
            chaos_level,
            seed,
            decision_count,
            personality,
        })
    }

    /// Serialize the header
    pub fn serialize(&self, buf: &mut impl BufMut) -> KindaResult<()> {
        if self.personality.len() > MAX_PERSONALITY_LEN {
            return Err(KindaError::InvalidLogFormat(format!(
                "personality name longer than {MAX_PERSONALITY_LEN} bytes"
            )));
        }

        buf.put_slice(&LOG_MAGIC);
        buf.put_u8(self.version);
        buf.put_u8(self.flags.0);
        buf.put_u8(self.chaos_level.get());
        buf.put_u8(self.personality.len() as u8);
        buf.put_u64_le(self.seed);
        buf.put_u64_le(self.decision_count);
        buf.put_slice(self.personality.as_bytes());

        Ok(())
    }
}
