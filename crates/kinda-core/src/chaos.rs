//! Chaos level and cascading instability

use std::fmt;

use crate::{KindaError, KindaResult, Luck};

/// Global chaos intensity, 1 (calm) to 10 (maximal deviation)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChaosLevel(u8);

impl ChaosLevel {
    pub const MIN: ChaosLevel = ChaosLevel(1);
    pub const MAX: ChaosLevel = ChaosLevel(10);

    /// Validate a raw level; out-of-range input is rejected, never clamped
    pub fn new(level: u8) -> KindaResult<Self> {
        if (Self::MIN.0..=Self::MAX.0).contains(&level) {
            Ok(ChaosLevel(level))
        } else {
            Err(KindaError::ChaosLevelOutOfRange(level))
        }
    }

    #[inline]
    pub fn get(self) -> u8 {
        self.0
    }

    /// Linear intensity: 0.0 at level 1, 1.0 at level 10
    #[inline]
    pub fn intensity(self) -> f64 {
        (self.0 - Self::MIN.0) as f64 / (Self::MAX.0 - Self::MIN.0) as f64
    }

    /// Every valid level, ascending
    pub fn all() -> impl Iterator<Item = ChaosLevel> {
        (Self::MIN.0..=Self::MAX.0).map(ChaosLevel)
    }
}

impl Default for ChaosLevel {
    fn default() -> Self {
        ChaosLevel(5)
    }
}

impl fmt::Display for ChaosLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Session-scoped cascading-failure counter
///
/// Every unfavorable outcome raises the level by one. Favorable outcomes
/// are counted in a run; each completed run of `DECAY_RUN` favorable
/// outcomes lowers the level by one. Neutral outcomes touch nothing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Instability {
    level: u32,
    favorable_run: u32,
}

impl Instability {
    /// Probability removed per instability point, before volatility scaling
    pub const STEP: f64 = 0.05;

    /// Favorable outcomes needed to shed one point
    pub const DECAY_RUN: u32 = 2;

    /// Instability at a given level with no favorable run in progress
    pub fn at(level: u32) -> Self {
        Instability {
            level,
            favorable_run: 0,
        }
    }

    #[inline]
    pub fn level(&self) -> u32 {
        self.level
    }

    /// Fold one outcome into the counter
    pub fn record(&mut self, luck: Luck) {
        match luck {
            Luck::Unfavorable => {
                self.level = self.level.saturating_add(1);
                self.favorable_run = 0;
            }
            Luck::Favorable => {
                self.favorable_run += 1;
                if self.favorable_run >= Self::DECAY_RUN {
                    self.level = self.level.saturating_sub(1);
                    self.favorable_run = 0;
                }
            }
            Luck::Neutral => {}
        }
    }

    pub fn reset(&mut self) {
        *self = Instability::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Construct, Personality};
    use proptest::prelude::*;

    #[test]
    fn test_level_bounds() {
        assert!(ChaosLevel::new(0).is_err());
        assert!(ChaosLevel::new(11).is_err());
        assert_eq!(ChaosLevel::new(1).unwrap(), ChaosLevel::MIN);
        assert_eq!(ChaosLevel::new(10).unwrap(), ChaosLevel::MAX);
        assert_eq!(ChaosLevel::all().count(), 10);
    }

    #[test]
    fn test_intensity_endpoints() {
        assert_eq!(ChaosLevel::MIN.intensity(), 0.0);
        assert_eq!(ChaosLevel::MAX.intensity(), 1.0);
    }

    #[test]
    fn test_instability_cascade_and_decay() {
        let mut inst = Instability::default();
        for _ in 0..5 {
            inst.record(Luck::Unfavorable);
        }
        assert_eq!(inst.level(), 5);

        inst.record(Luck::Favorable);
        assert_eq!(inst.level(), 5);
        inst.record(Luck::Favorable);
        assert_eq!(inst.level(), 4);

        inst.record(Luck::Neutral);
        assert_eq!(inst.level(), 4);

        for _ in 0..20 {
            inst.record(Luck::Favorable);
        }
        assert_eq!(inst.level(), 0);
    }

    #[test]
    fn test_unfavorable_breaks_favorable_run() {
        let mut inst = Instability::at(3);
        inst.record(Luck::Favorable);
        inst.record(Luck::Unfavorable);
        inst.record(Luck::Favorable);
        assert_eq!(inst.level(), 4);
    }

    #[test]
    fn test_cascade_raises_unfavorable_probability() {
        let profile = Personality::Chaotic.profile();
        let level = ChaosLevel::new(7).unwrap();

        for n in [1u32, 3, 10] {
            let mut bad = Instability::default();
            let mut good = Instability::default();
            for _ in 0..n {
                bad.record(Luck::Unfavorable);
                good.record(Luck::Favorable);
            }
            let p_bad = profile.effective_probability(Construct::Maybe, level, &bad);
            let p_good = profile.effective_probability(Construct::Maybe, level, &good);
            // Probability of the unfavorable outcome is 1 - p
            assert!(1.0 - p_bad > 1.0 - p_good, "n={n}");
        }
    }

    #[test]
    fn test_huge_instability_clamps() {
        let profile = Personality::Chaotic.profile();
        let p = profile.effective_probability(
            Construct::Maybe,
            ChaosLevel::MAX,
            &Instability::at(u32::MAX),
        );
        assert_eq!(p, 0.0);
    }

    fn personality_strategy() -> impl Strategy<Value = Personality> {
        prop::sample::select(Personality::ALL.to_vec())
    }

    fn construct_strategy() -> impl Strategy<Value = Construct> {
        prop::sample::select(Construct::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn chaos_moves_monotonically_away_from_reliable(
            personality in personality_strategy(),
            construct in construct_strategy(),
            instability in 0u32..40,
        ) {
            let profile = personality.profile();
            let reliable = Personality::Reliable.profile().base(construct);
            let inst = Instability::at(instability);

            let mut previous: Option<f64> = None;
            for level in ChaosLevel::all() {
                let p = profile.effective_probability(construct, level, &inst);
                prop_assert!((0.0..=1.0).contains(&p));
                let distance = (p - reliable).abs();
                if let Some(prev) = previous {
                    prop_assert!(distance + 1e-12 >= prev, "level {} distance {} < {}", level, distance, prev);
                }
                previous = Some(distance);
            }
        }
    }
}
