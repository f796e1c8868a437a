//! Decision record codec
//!
//! Each decision is a fixed 34-byte record:
//! - Bytes 0-7: Sequence number (LE)
//! - Bytes 8-15: Call site id (LE)
//! - Byte 16: Construct tag
//! - Byte 17: Outcome tag
//! - Bytes 18-25: Effective probability (f64 bits, LE)
//! - Bytes 26-33: Outcome payload (LE)

use bytes::{Buf, BufMut};
use kinda_core::{CallSiteId, Construct, Decision, KindaError, KindaResult, Outcome};

/// Encoded size of one decision
pub const RECORD_SIZE: usize = 34;

/// Outcome payload tag
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OutcomeTag {
    Bool = 0x00,
    Int = 0x01,
    Float = 0x02,
    Ternary = 0x03,
    Count = 0x04,
}

impl OutcomeTag {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x00 => Some(OutcomeTag::Bool),
            0x01 => Some(OutcomeTag::Int),
            0x02 => Some(OutcomeTag::Float),
            0x03 => Some(OutcomeTag::Ternary),
            0x04 => Some(OutcomeTag::Count),
            _ => None,
        }
    }

    #[inline]
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    pub fn of(outcome: &Outcome) -> Self {
        match outcome {
            Outcome::Bool(_) => OutcomeTag::Bool,
            Outcome::Int(_) => OutcomeTag::Int,
            Outcome::Float(_) => OutcomeTag::Float,
            Outcome::Ternary(_) => OutcomeTag::Ternary,
            Outcome::Count(_) => OutcomeTag::Count,
        }
    }
}

fn payload(outcome: &Outcome) -> u64 {
    match *outcome {
        Outcome::Bool(b) => b as u64,
        Outcome::Int(v) => v as u64,
        Outcome::Float(v) => v.to_bits(),
        Outcome::Ternary(v) => v as i64 as u64,
        Outcome::Count(v) => v,
    }
}

fn outcome_from(tag: OutcomeTag, raw: u64) -> KindaResult<Outcome> {
    Ok(match tag {
        OutcomeTag::Bool => match raw {
            0 => Outcome::Bool(false),
            1 => Outcome::Bool(true),
            _ => {
                return Err(KindaError::InvalidLogFormat(format!(
                    "bool payload {raw}"
                )))
            }
        },
        OutcomeTag::Int => Outcome::Int(raw as i64),
        OutcomeTag::Float => Outcome::Float(f64::from_bits(raw)),
        OutcomeTag::Ternary => match raw as i64 {
            v @ -1..=1 => Outcome::Ternary(v as i8),
            v => {
                return Err(KindaError::InvalidLogFormat(format!(
                    "ternary payload {v}"
                )))
            }
        },
        OutcomeTag::Count => Outcome::Count(raw),
    })
}

/// Append one decision to `buf`
pub fn encode_decision(decision: &Decision, buf: &mut impl BufMut) {
    buf.put_u64_le(decision.seq);
    buf.put_u64_le(decision.site.0);
    buf.put_u8(decision.construct.to_byte());
    buf.put_u8(OutcomeTag::of(&decision.outcome).to_byte());
    buf.put_u64_le(decision.probability.to_bits());
    buf.put_u64_le(payload(&decision.outcome));
}

/// Read one decision, advancing `buf` past it
pub fn decode_decision(buf: &mut &[u8]) -> KindaResult<Decision> {
    if buf.remaining() < RECORD_SIZE {
        return Err(KindaError::BufferTooShort {
            expected: RECORD_SIZE,
            actual: buf.remaining(),
        });
    }

    let seq = buf.get_u64_le();
    let site = CallSiteId::new(buf.get_u64_le());

    let construct_byte = buf.get_u8();
    let construct =
        Construct::from_byte(construct_byte).ok_or(KindaError::UnknownConstructTag(construct_byte))?;

    let tag_byte = buf.get_u8();
    let tag = OutcomeTag::from_byte(tag_byte).ok_or(KindaError::UnknownOutcomeTag(tag_byte))?;

    let probability = f64::from_bits(buf.get_u64_le());
    if !(0.0..=1.0).contains(&probability) {
        return Err(KindaError::InvalidLogFormat(format!(
            "probability {probability} at seq {seq}"
        )));
    }

    let outcome = outcome_from(tag, buf.get_u64_le())?;

    Ok(Decision {
        seq,
        site,
        construct,
        probability,
        outcome,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decision(construct: Construct, outcome: Outcome) -> Decision {
        Decision {
            seq: 9,
            site: CallSiteId::from_source("main.knda", 12, 4),
            construct,
            probability: 0.55,
            outcome,
        }
    }

    #[test]
    fn test_record_size() {
        let mut buf = Vec::new();
        encode_decision(&decision(Construct::Maybe, Outcome::Bool(true)), &mut buf);
        assert_eq!(buf.len(), RECORD_SIZE);
    }

    #[test]
    fn test_negative_values_survive() {
        for outcome in [Outcome::Int(-42), Outcome::Ternary(-1), Outcome::Float(-0.0)] {
            let original = decision(Construct::KindaBinary, outcome);
            let mut buf = Vec::new();
            encode_decision(&original, &mut buf);
            let decoded = decode_decision(&mut buf.as_slice()).unwrap();
            assert!(decoded.bit_eq(&original), "{outcome:?}");
        }
    }

    #[test]
    fn test_unknown_tags_rejected() {
        let mut buf = Vec::new();
        encode_decision(&decision(Construct::Maybe, Outcome::Bool(true)), &mut buf);

        let mut bad_construct = buf.clone();
        bad_construct[16] = 0xEE;
        assert!(matches!(
            decode_decision(&mut bad_construct.as_slice()),
            Err(KindaError::UnknownConstructTag(0xEE))
        ));

        let mut bad_outcome = buf.clone();
        bad_outcome[17] = 0x77;
        assert!(matches!(
            decode_decision(&mut bad_outcome.as_slice()),
            Err(KindaError::UnknownOutcomeTag(0x77))
        ));
    }

    #[test]
    fn test_out_of_range_payloads_rejected() {
        let mut buf = Vec::new();
        encode_decision(&decision(Construct::Maybe, Outcome::Bool(true)), &mut buf);
        buf[26] = 2;
        assert!(decode_decision(&mut buf.as_slice()).is_err());

        let mut buf = Vec::new();
        encode_decision(&decision(Construct::KindaBinary, Outcome::Ternary(1)), &mut buf);
        buf[26] = 5;
        assert!(decode_decision(&mut buf.as_slice()).is_err());
    }

    #[test]
    fn test_short_record() {
        let buf = [0u8; RECORD_SIZE - 1];
        assert!(matches!(
            decode_decision(&mut &buf[..]),
            Err(KindaError::BufferTooShort { .. })
        ));
    }
}
