//! Per-construct outcome semantics
//!
//! `sample` turns an effective probability and the call-site arguments into
//! an outcome, consuming the session PRNG. `luck` classifies an outcome
//! against what reliable mode would nominally do; it looks only at the
//! outcome, so live runs and replays update instability identically.

use kinda_core::{
    ChaosLevel, Construct, ConstructArgs, Instability, Luck, Outcome, Personality, PersonalityProfile,
};
use kinda_time::{drifted_value, DriftConfig};
use rand::Rng;
use tracing::warn;

/// Width of the fuzzy boundary band of `~ish`, as a fraction of tolerance
pub const ISH_BOUNDARY_BAND: f64 = 0.25;

/// Binary probabilities summing this close to 1 are used as given
pub const BINARY_SUM_SLACK: f64 = 0.01;

/// Inputs shared by every construct evaluation
pub struct SampleParams<'a> {
    /// Effective probability of the nominal outcome
    pub probability: f64,
    pub profile: &'a PersonalityProfile,
    pub chaos: ChaosLevel,
    pub drift: &'a DriftConfig,
}

/// Float noise of the reliable personality, the band a favorable read stays in
fn reliable_float_noise() -> f64 {
    Personality::Reliable.profile().float_noise
}

#[inline]
fn magnitude(v: f64) -> f64 {
    v.abs().max(1.0)
}

/// Scale factor applied to spreads as chaos rises (1 at level 1, 2 at level 10)
#[inline]
fn chaos_scale(chaos: ChaosLevel) -> f64 {
    1.0 + chaos.intensity()
}

/// Draw an outcome for `construct`
///
/// `args` must already have been validated for `construct`.
pub fn sample<R: Rng + ?Sized>(
    construct: Construct,
    args: &ConstructArgs,
    params: &SampleParams<'_>,
    rng: &mut R,
) -> Outcome {
    let p = params.probability;

    match (construct, *args) {
        (
            Construct::Maybe | Construct::Sometimes | Construct::SortaWhile | Construct::Eventually,
            ConstructArgs::Condition(condition),
        ) => {
            let roll = rng.gen::<f64>() < p;
            Outcome::Bool(condition && roll)
        }

        (
            Construct::MaybeFor | Construct::SortaPrint | Construct::KindaImport | Construct::MaybeImport,
            _,
        ) => Outcome::Bool(rng.gen::<f64>() < p),

        (Construct::FuzzyBool, ConstructArgs::Condition(value)) => {
            let keep = rng.gen::<f64>() < p;
            Outcome::Bool(if keep { value } else { !value })
        }

        (Construct::FuzzyInt | Construct::FuzzyReassign, ConstructArgs::Int(value)) => {
            if rng.gen::<f64>() < p {
                return Outcome::Int(value);
            }
            let radius = int_radius(params.profile, params.chaos);
            Outcome::Int(value.saturating_add(nonzero_offset(rng, radius)))
        }

        (Construct::FuzzyFloat, ConstructArgs::Float(value)) => {
            let band = if rng.gen::<f64>() < p {
                reliable_float_noise()
            } else {
                params.profile.float_noise * chaos_scale(params.chaos)
            };
            let offset = unit_offset(rng) * band * magnitude(value);
            Outcome::Float(value + offset)
        }

        (Construct::IshValue, ConstructArgs::IshValue { value, variance }) => {
            let variance = variance.unwrap_or(params.profile.ish_variance);
            let spread = if rng.gen::<f64>() < p {
                variance
            } else {
                2.0 * variance * chaos_scale(params.chaos)
            };
            let offset = unit_offset(rng) * spread;
            Outcome::Float(value + offset)
        }

        (Construct::IshComparison, ConstructArgs::Compare { left, right, tolerance }) => {
            let tolerance = tolerance.unwrap_or(params.profile.default_tolerance);
            let p_true = ish_true_probability((left - right).abs(), tolerance, p);
            Outcome::Bool(rng.gen::<f64>() < p_true)
        }

        (Construct::Repeat, ConstructArgs::Count(n)) => {
            if rng.gen::<f64>() < p {
                return Outcome::Count(n);
            }
            let spread = repeat_spread(n, params.profile, params.chaos);
            let offset = nonzero_offset(rng, spread);
            let count = if offset < 0 {
                n.saturating_sub(offset.unsigned_abs())
            } else {
                n.saturating_add(offset as u64)
            };
            Outcome::Count(count)
        }

        (Construct::TimeDrift, ConstructArgs::Drift(sample)) => {
            let strength = drift_strength(params.profile, params.chaos);
            Outcome::Float(drifted_value(&sample, strength, params.drift))
        }

        (Construct::KindaBinary, ConstructArgs::Binary(given)) => {
            let [positive, negative, _] = binary_probabilities(given, p);
            let roll = rng.gen::<f64>();
            let value = if roll < positive {
                1
            } else if roll < positive + negative {
                -1
            } else {
                0
            };
            Outcome::Ternary(value)
        }

        // Unreachable after validation; fall back to the construct's
        // neutral outcome instead of panicking.
        (construct, _) => neutral_outcome(construct, args),
    }
}

/// Classify an outcome for instability bookkeeping
pub fn luck(construct: Construct, args: &ConstructArgs, outcome: &Outcome, profile: &PersonalityProfile) -> Luck {
    let favorable = |ok: bool| if ok { Luck::Favorable } else { Luck::Unfavorable };

    match (construct, *args, *outcome) {
        (
            Construct::Maybe | Construct::Sometimes | Construct::SortaWhile | Construct::Eventually,
            ConstructArgs::Condition(condition),
            Outcome::Bool(result),
        ) => {
            if condition {
                favorable(result)
            } else {
                Luck::Neutral
            }
        }
        (
            Construct::MaybeFor | Construct::SortaPrint | Construct::KindaImport | Construct::MaybeImport,
            _,
            Outcome::Bool(result),
        ) => favorable(result),
        (Construct::FuzzyBool, ConstructArgs::Condition(value), Outcome::Bool(result)) => {
            favorable(result == value)
        }
        (Construct::FuzzyInt | Construct::FuzzyReassign, ConstructArgs::Int(value), Outcome::Int(result)) => {
            favorable(result == value)
        }
        (Construct::FuzzyFloat, ConstructArgs::Float(value), Outcome::Float(result)) => {
            favorable((result - value).abs() <= reliable_float_noise() * magnitude(value))
        }
        (Construct::IshValue, ConstructArgs::IshValue { value, variance }, Outcome::Float(result)) => {
            let variance = variance.unwrap_or(profile.ish_variance);
            favorable((result - value).abs() <= variance)
        }
        (Construct::IshComparison, ConstructArgs::Compare { left, right, tolerance }, Outcome::Bool(result)) => {
            let tolerance = tolerance.unwrap_or(profile.default_tolerance);
            favorable(result == ((left - right).abs() <= tolerance))
        }
        (Construct::Repeat, ConstructArgs::Count(n), Outcome::Count(result)) => favorable(result == n),
        _ => Luck::Neutral,
    }
}

/// Probability that `~ish` reports "close enough"
///
/// Well inside the tolerance it holds with `p`, well outside it fails with
/// `p`, and inside the boundary band it interpolates linearly between the two.
pub fn ish_true_probability(difference: f64, tolerance: f64, p: f64) -> f64 {
    let band = tolerance * ISH_BOUNDARY_BAND;
    if band <= 0.0 {
        return if difference <= tolerance { p } else { 1.0 - p };
    }

    let lower = tolerance - band;
    let upper = tolerance + band;
    if difference <= lower {
        p
    } else if difference >= upper {
        1.0 - p
    } else {
        let t = (difference - lower) / (upper - lower);
        p + (1.0 - 2.0 * p) * t
    }
}

/// Positive, negative and neutral probabilities for `~kinda binary`
///
/// Without explicit probabilities the decisiveness `p` is split evenly
/// between positive and negative. Explicit probabilities that do not sum to
/// one are normalized.
pub fn binary_probabilities(given: Option<[f64; 3]>, p: f64) -> [f64; 3] {
    match given {
        None => [p / 2.0, p / 2.0, 1.0 - p],
        Some(probs) => {
            let total: f64 = probs.iter().sum();
            if (total - 1.0).abs() > BINARY_SUM_SLACK {
                warn!(
                    total,
                    positive = probs[0],
                    negative = probs[1],
                    neutral = probs[2],
                    "binary probabilities do not sum to 1, normalizing"
                );
                probs.map(|v| v / total)
            } else {
                probs
            }
        }
    }
}

/// Drift strength for time-aware reads: full drift rate at a coin flip
///
/// Depends on personality and chaos level only; the session's
/// instability never reaches a drifting value.
pub fn drift_strength(profile: &PersonalityProfile, chaos: ChaosLevel) -> f64 {
    let p = profile.effective_probability(Construct::TimeDrift, chaos, &Instability::default());
    profile.drift_rate * 2.0 * (1.0 - p)
}

/// Uniform draw in [-1, 1), scaled by the caller
///
/// Scaling a unit draw stays finite where `gen_range(-s..=s)` would
/// reject an overflowing width.
#[inline]
fn unit_offset<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    rng.gen::<f64>() * 2.0 - 1.0
}

fn int_radius(profile: &PersonalityProfile, chaos: ChaosLevel) -> i64 {
    let scaled = (profile.int_fuzz_radius as f64 * chaos_scale(chaos)).round() as i64;
    scaled.max(1)
}

fn repeat_spread(n: u64, profile: &PersonalityProfile, chaos: ChaosLevel) -> i64 {
    let scaled = (n as f64 * profile.repeat_spread * chaos_scale(chaos)).round();
    (scaled.min(i64::MAX as f64) as i64).max(1)
}

/// Uniform offset in `[-radius, radius] \ {0}`
fn nonzero_offset<R: Rng + ?Sized>(rng: &mut R, radius: i64) -> i64 {
    let magnitude = rng.gen_range(1..=radius.max(1));
    if rng.gen::<bool>() {
        magnitude
    } else {
        -magnitude
    }
}

fn neutral_outcome(construct: Construct, args: &ConstructArgs) -> Outcome {
    match *args {
        ConstructArgs::Condition(c) => Outcome::Bool(c),
        ConstructArgs::Int(v) => Outcome::Int(v),
        ConstructArgs::Float(v) => Outcome::Float(v),
        ConstructArgs::IshValue { value, .. } => Outcome::Float(value),
        ConstructArgs::Compare { left, right, tolerance } => {
            Outcome::Bool((left - right).abs() <= tolerance.unwrap_or(0.0))
        }
        ConstructArgs::Count(n) => Outcome::Count(n),
        ConstructArgs::Drift(sample) => Outcome::Float(sample.nominal),
        ConstructArgs::Binary(_) => Outcome::Ternary(0),
        ConstructArgs::Unit => Outcome::Bool(!construct.is_deterministic()),
    }
}
