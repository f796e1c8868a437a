//! Record log container
//!
//! Owns the decisions captured by a recording session together with the
//! parameters needed to reinitialize an equivalent session for replay.

use std::io::{Read, Write};

use bytes::{BufMut, BytesMut};
use kinda_core::{ChaosLevel, Construct, Decision, KindaError, KindaResult};
use sha2::{Digest, Sha256};

use crate::{decode_decision, encode_decision, LogFlags, LogHeader, RECORD_SIZE};

/// Digest trailer size in bytes
pub const DIGEST_SIZE: usize = 8;

/// Ordered sequence of decisions plus the session parameters they came from
#[derive(Clone, Debug, PartialEq)]
pub struct RecordLog {
    /// Seed the recording session ran with
    pub seed: u64,
    /// Personality at recording start
    pub personality: String,
    /// Chaos level at recording start
    pub chaos_level: ChaosLevel,
    /// Seed was chosen automatically
    pub auto_seeded: bool,
    /// Decisions in program order
    pub decisions: Vec<Decision>,
}

impl RecordLog {
    pub fn new(personality: &str, chaos_level: ChaosLevel, seed: u64, auto_seeded: bool) -> Self {
        RecordLog {
            seed,
            personality: personality.to_string(),
            chaos_level,
            auto_seeded,
            decisions: Vec::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }

    pub fn push(&mut self, decision: Decision) {
        self.decisions.push(decision);
    }

    /// True if any decision was computed by time drift
    pub fn has_drift(&self) -> bool {
        self.decisions
            .iter()
            .any(|d| d.construct == Construct::TimeDrift)
    }

    /// Bit-exact comparison of two logs
    pub fn bit_eq(&self, other: &RecordLog) -> bool {
        self.seed == other.seed
            && self.personality == other.personality
            && self.chaos_level == other.chaos_level
            && self.auto_seeded == other.auto_seeded
            && self.decisions.len() == other.decisions.len()
            && self
                .decisions
                .iter()
                .zip(&other.decisions)
                .all(|(a, b)| a.bit_eq(b))
    }

    fn header(&self) -> LogHeader {
        let mut header = LogHeader::new(&self.personality, self.chaos_level, self.seed);
        header.decision_count = self.decisions.len() as u64;
        let mut flags = LogFlags::NONE;
        flags.set_auto_seeded(self.auto_seeded);
        flags.set_drift(self.has_drift());
        header.flags = flags;
        header
    }

    /// Encoded size in bytes
    pub fn encoded_len(&self) -> usize {
        self.header().encoded_len() + self.decisions.len() * RECORD_SIZE + DIGEST_SIZE
    }

    /// Encode to the binary log format
    pub fn encode(&self) -> KindaResult<Vec<u8>> {
        let header = self.header();
        let mut buf = BytesMut::with_capacity(self.encoded_len());

        header.serialize(&mut buf)?;
        for decision in &self.decisions {
            encode_decision(decision, &mut buf);
        }

        let digest = digest(&buf);
        buf.put_slice(&digest);

        Ok(buf.to_vec())
    }

    /// Decode from the binary log format
    pub fn decode(data: &[u8]) -> KindaResult<Self> {
        if data.len() < DIGEST_SIZE {
            return Err(KindaError::BufferTooShort {
                expected: DIGEST_SIZE,
                actual: data.len(),
            });
        }

        let (body, trailer) = data.split_at(data.len() - DIGEST_SIZE);
        let mut cursor = body;
        let header = LogHeader::parse(&mut cursor)?;

        let count = usize::try_from(header.decision_count)
            .map_err(|_| KindaError::InvalidLogFormat("decision count overflows".into()))?;
        let expected = count
            .checked_mul(RECORD_SIZE)
            .ok_or_else(|| KindaError::InvalidLogFormat("decision count overflows".into()))?;
        if cursor.len() != expected {
            return Err(KindaError::InvalidLogFormat(format!(
                "header declares {count} decisions but {} record bytes follow",
                cursor.len()
            )));
        }

        if digest(body) != trailer {
            return Err(KindaError::InvalidLogFormat("digest mismatch".into()));
        }

        let mut decisions = Vec::with_capacity(count);
        let mut previous: Option<u64> = None;
        for _ in 0..count {
            let decision = decode_decision(&mut cursor)?;
            if previous.is_some_and(|p| decision.seq <= p) {
                return Err(KindaError::InvalidLogFormat(format!(
                    "sequence number {} out of order",
                    decision.seq
                )));
            }
            previous = Some(decision.seq);
            decisions.push(decision);
        }

        Ok(RecordLog {
            seed: header.seed,
            personality: header.personality,
            chaos_level: header.chaos_level,
            auto_seeded: header.flags.is_auto_seeded(),
            decisions,
        })
    }

    /// Write the encoded log to `writer`
    pub fn write_to<W: Write>(&self, mut writer: W) -> KindaResult<()> {
        writer.write_all(&self.encode()?)?;
        writer.flush()?;
        Ok(())
    }

    /// Read a whole encoded log from `reader`
    pub fn read_from<R: Read>(mut reader: R) -> KindaResult<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::decode(&data)
    }
}

fn digest(bytes: &[u8]) -> [u8; DIGEST_SIZE] {
    let full = Sha256::digest(bytes);
    let mut out = [0u8; DIGEST_SIZE];
    out.copy_from_slice(&full[..DIGEST_SIZE]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinda_core::{CallSiteId, Outcome};
    use proptest::prelude::*;

    fn sample_log() -> RecordLog {
        let mut log = RecordLog::new("chaotic", ChaosLevel::new(7).unwrap(), 42, false);
        let site = CallSiteId::from_source("demo.knda", 1, 1);
        log.push(Decision {
            seq: 0,
            site,
            construct: Construct::Maybe,
            probability: 0.5,
            outcome: Outcome::Bool(true),
        });
        log.push(Decision {
            seq: 1,
            site: site.child(0),
            construct: Construct::FuzzyFloat,
            probability: 0.2,
            outcome: Outcome::Float(3.14159),
        });
        log.push(Decision {
            seq: 2,
            site: site.child(1),
            construct: Construct::TimeDrift,
            probability: 0.5,
            outcome: Outcome::Float(-7.25),
        });
        log
    }

    #[test]
    fn test_log_roundtrip() {
        let log = sample_log();
        let bytes = log.encode().unwrap();
        assert_eq!(bytes.len(), log.encoded_len());

        let decoded = RecordLog::decode(&bytes).unwrap();
        assert!(decoded.bit_eq(&log));
        assert!(decoded.has_drift());
    }

    #[test]
    fn test_empty_log() {
        let log = RecordLog::new("reliable", ChaosLevel::MIN, 0, true);
        let decoded = RecordLog::decode(&log.encode().unwrap()).unwrap();
        assert!(decoded.is_empty());
        assert!(decoded.auto_seeded);
    }

    #[test]
    fn test_bit_eq_compares_auto_seeded() {
        let chosen = sample_log();
        let mut drawn = chosen.clone();
        drawn.auto_seeded = !chosen.auto_seeded;
        assert!(!chosen.bit_eq(&drawn));
        assert!(!drawn.bit_eq(&chosen));

        let decoded = RecordLog::decode(&drawn.encode().unwrap()).unwrap();
        assert!(decoded.bit_eq(&drawn));
        assert!(!decoded.bit_eq(&chosen));
    }

    #[test]
    fn test_corruption_detected() {
        let mut bytes = sample_log().encode().unwrap();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0x01;
        assert!(RecordLog::decode(&bytes).is_err());
    }

    #[test]
    fn test_truncation_detected() {
        let bytes = sample_log().encode().unwrap();
        for cut in [1, DIGEST_SIZE, RECORD_SIZE, bytes.len() - 1] {
            assert!(RecordLog::decode(&bytes[..bytes.len() - cut]).is_err(), "cut {cut}");
        }
    }

    #[test]
    fn test_out_of_order_sequence_rejected() {
        let mut log = sample_log();
        log.decisions.swap(0, 1);
        let bytes = log.encode().unwrap();
        assert!(matches!(
            RecordLog::decode(&bytes),
            Err(KindaError::InvalidLogFormat(_))
        ));
    }

    #[test]
    fn test_io_roundtrip() {
        let log = sample_log();
        let mut sink = Vec::new();
        log.write_to(&mut sink).unwrap();
        let back = RecordLog::read_from(sink.as_slice()).unwrap();
        assert!(back.bit_eq(&log));
    }

    fn outcome_strategy() -> impl Strategy<Value = Outcome> {
        prop_oneof![
            any::<bool>().prop_map(Outcome::Bool),
            any::<i64>().prop_map(Outcome::Int),
            any::<f64>().prop_map(Outcome::Float),
            (-1i8..=1).prop_map(Outcome::Ternary),
            any::<u64>().prop_map(Outcome::Count),
        ]
    }

    proptest! {
        #[test]
        fn decoded_log_is_bit_identical(
            seed in any::<u64>(),
            level in 1u8..=10,
            entries in prop::collection::vec(
                (any::<u64>(), prop::sample::select(Construct::ALL.to_vec()), 0.0f64..=1.0, outcome_strategy()),
                0..40,
            ),
        ) {
            let mut log = RecordLog::new("playful", ChaosLevel::new(level).unwrap(), seed, false);
            for (i, (site, construct, probability, outcome)) in entries.into_iter().enumerate() {
                log.push(Decision {
                    seq: i as u64,
                    site: CallSiteId::new(site),
                    construct,
                    probability,
                    outcome,
                });
            }
            let decoded = RecordLog::decode(&log.encode().unwrap()).unwrap();
            prop_assert!(decoded.bit_eq(&log));
        }
    }
}
