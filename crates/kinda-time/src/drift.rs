//! Drift model for time-aware variables
//!
//! Drift is a pure function of the variable's age, how often it has been
//! read, how long it sat idle, and a strength supplied by the caller (the
//! personality's drift rate scaled by the current chaos). No randomness is
//! involved: the same inputs always produce the same offset.

use std::time::Duration;

use kinda_core::DriftSample;
use serde::{Deserialize, Serialize};

use crate::Clock;

/// Drift tuning
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftConfig {
    /// Idle time after which half of the staleness bonus is reached
    #[serde(with = "duration_str")]
    pub recency_half_life: Duration,
    /// Age that counts as one unit of aging
    #[serde(with = "duration_str")]
    pub age_unit: Duration,
    /// Weight of log-scaled age
    pub age_weight: f64,
    /// Weight of log-scaled access count
    pub access_weight: f64,
    /// Weight of staleness since the previous read
    pub recency_weight: f64,
    /// Upper bound on drift as a fraction of magnitude
    pub max_fraction: f64,
}

impl Default for DriftConfig {
    fn default() -> Self {
        DriftConfig {
            recency_half_life: Duration::from_secs(30),
            age_unit: Duration::from_secs(1),
            age_weight: 1.0,
            access_weight: 0.5,
            recency_weight: 0.5,
            max_fraction: 0.5,
        }
    }
}

impl DriftConfig {
    /// Configuration where values rot quickly (useful in demos and tests)
    pub fn volatile() -> Self {
        DriftConfig {
            recency_half_life: Duration::from_secs(1),
            age_unit: Duration::from_millis(10),
            age_weight: 2.0,
            access_weight: 1.0,
            recency_weight: 1.0,
            max_fraction: 1.0,
        }
    }

    /// Unitless drift load for a sample
    pub fn load(&self, sample: &DriftSample) -> f64 {
        let age_units = ratio(sample.age, self.age_unit);
        let staleness = 1.0 - 0.5f64.powf(ratio(sample.idle, self.recency_half_life));

        self.age_weight * age_units.ln_1p()
            + self.access_weight * (sample.accesses as f64).ln_1p()
            + self.recency_weight * staleness
    }
}

fn ratio(value: Duration, unit: Duration) -> f64 {
    if unit.is_zero() {
        0.0
    } else {
        value.as_secs_f64() / unit.as_secs_f64()
    }
}

/// Offset a read should add to the nominal value
///
/// The offset always points away from zero and is scaled by
/// `max(|nominal|, 1)`, so small values still drift visibly.
pub fn drift_offset(sample: &DriftSample, strength: f64, config: &DriftConfig) -> f64 {
    let fraction = (strength.max(0.0) * config.load(sample)).min(config.max_fraction);
    let magnitude = sample.nominal.abs().max(1.0);
    let direction = if sample.nominal < 0.0 { -1.0 } else { 1.0 };

    direction * fraction * magnitude
}

/// Drifted value for a sample
pub fn drifted_value(sample: &DriftSample, strength: f64, config: &DriftConfig) -> f64 {
    sample.nominal + drift_offset(sample, strength, config)
}

/// Aging bookkeeping owned by a time-aware variable binding
#[derive(Clone, Debug, PartialEq)]
pub struct DriftState {
    nominal: f64,
    created: Duration,
    last_access: Option<Duration>,
    accesses: u64,
}

impl DriftState {
    /// Start tracking a value declared at `now`
    pub fn new(nominal: f64, now: Duration) -> Self {
        DriftState {
            nominal,
            created: now,
            last_access: None,
            accesses: 0,
        }
    }

    /// Start tracking a value declared now on `clock`
    pub fn declared(nominal: f64, clock: &dyn Clock) -> Self {
        Self::new(nominal, clock.now())
    }

    pub fn nominal(&self) -> f64 {
        self.nominal
    }

    pub fn created(&self) -> Duration {
        self.created
    }

    pub fn last_access(&self) -> Option<Duration> {
        self.last_access
    }

    pub fn accesses(&self) -> u64 {
        self.accesses
    }

    /// Register a read at `now` and return the inputs for the drift model
    ///
    /// This is the one mutation performed by a read: the access count and
    /// last-access timestamp move forward.
    pub fn touch(&mut self, now: Duration) -> DriftSample {
        let now = now.max(self.created);
        let idle = match self.last_access {
            Some(last) => now.saturating_sub(last),
            None => Duration::ZERO,
        };
        self.accesses = self.accesses.saturating_add(1);
        self.last_access = Some(now);

        DriftSample {
            nominal: self.nominal,
            age: now.saturating_sub(self.created),
            accesses: self.accesses,
            idle,
        }
    }

    /// Replace the nominal value and restart aging
    pub fn reset(&mut self, nominal: f64, now: Duration) {
        *self = DriftState::new(nominal, now);
    }
}

/// Serde adapter writing durations as humantime strings ("30s", "1m 5s")
mod duration_str {
    use std::time::Duration;

    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ManualClock;
    use proptest::prelude::*;

    fn sample(nominal: f64, age_secs: u64, accesses: u64, idle_secs: u64) -> DriftSample {
        DriftSample {
            nominal,
            age: Duration::from_secs(age_secs),
            accesses,
            idle: Duration::from_secs(idle_secs),
        }
    }

    #[test]
    fn test_fresh_value_does_not_drift() {
        let config = DriftConfig::default();
        let s = sample(100.0, 0, 0, 0);
        assert_eq!(drift_offset(&s, 0.05, &config), 0.0);
    }

    #[test]
    fn test_drift_grows_with_age_and_use() {
        let config = DriftConfig::default();
        let young = drift_offset(&sample(100.0, 1, 1, 0), 0.01, &config);
        let old = drift_offset(&sample(100.0, 600, 1, 0), 0.01, &config);
        let worn = drift_offset(&sample(100.0, 600, 50, 0), 0.01, &config);
        let stale = drift_offset(&sample(100.0, 600, 50, 120), 0.01, &config);

        assert!(young > 0.0);
        assert!(old > young);
        assert!(worn > old);
        assert!(stale > worn);
    }

    #[test]
    fn test_drift_moves_away_from_zero() {
        let config = DriftConfig::default();
        assert!(drifted_value(&sample(-5.0, 60, 3, 0), 0.05, &config) < -5.0);
        assert!(drifted_value(&sample(5.0, 60, 3, 0), 0.05, &config) > 5.0);
        assert!(drifted_value(&sample(0.0, 60, 3, 0), 0.05, &config) > 0.0);
    }

    #[test]
    fn test_drift_is_capped() {
        let config = DriftConfig::default();
        let s = sample(10.0, u32::MAX as u64, u64::MAX, 1_000_000);
        let offset = drift_offset(&s, 1.0, &config);
        assert!((offset - 10.0 * config.max_fraction).abs() < 1e-9);
    }

    #[test]
    fn test_drift_is_deterministic() {
        let config = DriftConfig::default();
        let s = sample(42.0, 90, 7, 3);
        assert_eq!(
            drift_offset(&s, 0.02, &config).to_bits(),
            drift_offset(&s, 0.02, &config).to_bits()
        );
    }

    #[test]
    fn test_touch_updates_bookkeeping() {
        let clock = ManualClock::new();
        let mut state = DriftState::declared(3.0, &clock);

        clock.advance(Duration::from_secs(5));
        let first = state.touch(clock.now());
        assert_eq!(first.accesses, 1);
        assert_eq!(first.age, Duration::from_secs(5));
        assert_eq!(first.idle, Duration::ZERO);

        clock.advance(Duration::from_secs(2));
        let second = state.touch(clock.now());
        assert_eq!(second.accesses, 2);
        assert_eq!(second.age, Duration::from_secs(7));
        assert_eq!(second.idle, Duration::from_secs(2));
        assert_eq!(state.last_access(), Some(Duration::from_secs(7)));
    }

    #[test]
    fn test_reset_restarts_aging() {
        let mut state = DriftState::new(1.0, Duration::ZERO);
        state.touch(Duration::from_secs(9));
        state.reset(2.0, Duration::from_secs(10));
        assert_eq!(state.accesses(), 0);
        assert_eq!(state.nominal(), 2.0);
        assert_eq!(state.created(), Duration::from_secs(10));
    }

    #[test]
    fn test_config_humantime_json() {
        let json = r#"{"recency_half_life":"2m","age_unit":"500ms","age_weight":1.5}"#;
        let config: DriftConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.recency_half_life, Duration::from_secs(120));
        assert_eq!(config.age_unit, Duration::from_millis(500));
        assert_eq!(config.age_weight, 1.5);
        assert_eq!(config.access_weight, DriftConfig::default().access_weight);

        let back = serde_json::to_string(&config).unwrap();
        assert!(back.contains("\"2m\""));
    }

    proptest! {
        #[test]
        fn drift_never_shrinks_with_age(
            nominal in -1e6f64..1e6,
            age in 0u64..100_000,
            extra in 0u64..100_000,
            accesses in 0u64..1_000,
            strength in 0.0f64..0.1,
        ) {
            let config = DriftConfig::default();
            let earlier = drift_offset(&sample(nominal, age, accesses, 0), strength, &config);
            let later = drift_offset(&sample(nominal, age + extra, accesses, 0), strength, &config);
            prop_assert!(later.abs() + 1e-12 >= earlier.abs());
            prop_assert!(earlier.abs() <= nominal.abs().max(1.0) * config.max_fraction + 1e-9);
        }
    }
}
