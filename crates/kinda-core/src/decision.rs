//! Construct arguments, outcomes and decisions

use std::time::Duration;

use crate::{ArgShape, CallSiteId, Construct, KindaError, KindaResult};

/// Largest variance `v~ish` accepts
///
/// Chaos widens the sampling spread to at most four times the variance,
/// which must stay finite.
pub const MAX_ISH_VARIANCE: f64 = f64::MAX / 8.0;

/// Inputs to a time-drift read, captured by the variable binding
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DriftSample {
    /// Value the variable was declared with
    pub nominal: f64,
    /// Time since declaration
    pub age: Duration,
    /// Reads so far, including this one
    pub accesses: u64,
    /// Time since the previous read (zero on the first read)
    pub idle: Duration,
}

/// Static arguments supplied at a call site
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ConstructArgs {
    Unit,
    Condition(bool),
    Int(i64),
    Float(f64),
    IshValue {
        value: f64,
        variance: Option<f64>,
    },
    Compare {
        left: f64,
        right: f64,
        tolerance: Option<f64>,
    },
    Count(u64),
    Drift(DriftSample),
    Binary(Option<[f64; 3]>),
}

impl ConstructArgs {
    pub fn shape(&self) -> ArgShape {
        match self {
            ConstructArgs::Unit => ArgShape::Unit,
            ConstructArgs::Condition(_) => ArgShape::Condition,
            ConstructArgs::Int(_) => ArgShape::Int,
            ConstructArgs::Float(_) => ArgShape::Float,
            ConstructArgs::IshValue { .. } => ArgShape::IshValue,
            ConstructArgs::Compare { .. } => ArgShape::Compare,
            ConstructArgs::Count(_) => ArgShape::Count,
            ConstructArgs::Drift(_) => ArgShape::Drift,
            ConstructArgs::Binary(_) => ArgShape::Binary,
        }
    }

    /// Check shape and value sanity for `construct`
    pub fn validate_for(&self, construct: Construct) -> KindaResult<()> {
        let expected = construct.arg_shape();
        if self.shape() != expected {
            return Err(KindaError::ArgumentMismatch {
                construct,
                expected: expected.name(),
                actual: self.shape().name(),
            });
        }

        let invalid = |reason: &str| KindaError::InvalidArgument {
            construct,
            reason: reason.to_string(),
        };

        match *self {
            ConstructArgs::Float(v) if !v.is_finite() => Err(invalid("value is not finite")),
            ConstructArgs::IshValue { value, variance } => {
                if !value.is_finite() {
                    return Err(invalid("value is not finite"));
                }
                match variance {
                    Some(v) if !v.is_finite() || v < 0.0 => Err(invalid("variance must be >= 0")),
                    Some(v) if v > MAX_ISH_VARIANCE => Err(invalid("variance too large")),
                    _ => Ok(()),
                }
            }
            ConstructArgs::Compare {
                left,
                right,
                tolerance,
            } => {
                if !left.is_finite() || !right.is_finite() {
                    return Err(invalid("operands must be finite"));
                }
                match tolerance {
                    Some(t) if !t.is_finite() || t < 0.0 => Err(invalid("tolerance must be >= 0")),
                    _ => Ok(()),
                }
            }
            ConstructArgs::Drift(sample) if !sample.nominal.is_finite() => {
                Err(invalid("nominal value is not finite"))
            }
            ConstructArgs::Binary(Some(probs)) => {
                if probs.iter().any(|p| !p.is_finite() || *p < 0.0) {
                    return Err(invalid("probabilities must be finite and >= 0"));
                }
                if probs.iter().sum::<f64>() <= 0.0 {
                    return Err(invalid("probabilities sum to zero"));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// Typed result of a construct evaluation
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Outcome {
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Three-state result: -1, 0 or +1
    Ternary(i8),
    Count(u64),
}

impl Outcome {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Outcome::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Outcome::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Outcome::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_ternary(&self) -> Option<i8> {
        match self {
            Outcome::Ternary(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_count(&self) -> Option<u64> {
        match self {
            Outcome::Count(v) => Some(*v),
            _ => None,
        }
    }

    /// Bit-exact equality (distinguishes `-0.0` from `0.0`, equates NaNs)
    pub fn bit_eq(&self, other: &Outcome) -> bool {
        match (self, other) {
            (Outcome::Float(a), Outcome::Float(b)) => a.to_bits() == b.to_bits(),
            _ => self == other,
        }
    }
}

/// How an outcome moves the instability counter
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Luck {
    /// Matches what reliable mode would nominally do
    Favorable,
    /// Diverges from the reliable-mode nominal outcome
    Unfavorable,
    /// Has no nominal outcome to diverge from
    Neutral,
}

/// One probabilistic outcome, as recorded and replayed
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Decision {
    /// Monotonic sequence number within the session run
    pub seq: u64,
    /// Call site that produced it
    pub site: CallSiteId,
    /// Construct evaluated
    pub construct: Construct,
    /// Effective probability used
    pub probability: f64,
    /// Outcome handed back to the program
    pub outcome: Outcome,
}

impl Decision {
    /// Bit-exact equality, used by determinism checks
    pub fn bit_eq(&self, other: &Decision) -> bool {
        self.seq == other.seq
            && self.site == other.site
            && self.construct == other.construct
            && self.probability.to_bits() == other.probability.to_bits()
            && self.outcome.bit_eq(&other.outcome)
    }
}
