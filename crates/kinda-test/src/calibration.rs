//! Calibration of the assertion engine itself
//!
//! Runs many assertions against a Bernoulli source with a known rate and
//! counts how often the engine passes. A calibrated engine passes in at
//! least `confidence` of those meta-trials, give or take sampling noise.

use kinda_core::{substream_seed, KindaResult};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::assertion::{assert_eventually, TrialBudget, Verdict};

/// Calibration run parameters
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CalibrationConfig {
    pub rate: f64,
    pub trials: u64,
    pub meta_trials: u64,
    pub confidence: f64,
    pub seed: u64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            rate: 0.5,
            trials: 400,
            meta_trials: 200,
            confidence: 0.95,
            seed: 0,
        }
    }
}

impl CalibrationConfig {
    pub fn with_rate(mut self, rate: f64) -> Self {
        self.rate = rate;
        self
    }

    pub fn with_trials(mut self, trials: u64) -> Self {
        self.trials = trials;
        self
    }

    pub fn with_meta_trials(mut self, meta_trials: u64) -> Self {
        self.meta_trials = meta_trials;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Verdict counts across meta-trials
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CalibrationReport {
    pub passes: u64,
    pub fails: u64,
    pub inconclusive: u64,
}

impl CalibrationReport {
    pub fn total(&self) -> u64 {
        self.passes + self.fails + self.inconclusive
    }

    pub fn pass_rate(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            self.passes as f64 / self.total() as f64
        }
    }
}

/// Run the meta-trials
pub fn calibrate(config: &CalibrationConfig) -> KindaResult<CalibrationReport> {
    let mut report = CalibrationReport::default();
    for m in 0..config.meta_trials {
        let mut rng = StdRng::seed_from_u64(substream_seed(config.seed, m));
        let rate = config.rate;
        let result = assert_eventually(
            || rng.gen_bool(rate),
            rate,
            TrialBudget::Trials(config.trials),
            config.confidence,
        )?;
        match result.verdict {
            Verdict::Pass => report.passes += 1,
            Verdict::Fail => report.fails += 1,
            Verdict::Inconclusive => report.inconclusive += 1,
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_rate_near_confidence() {
        let report = calibrate(&CalibrationConfig::default().with_rate(0.3).with_seed(5)).unwrap();
        assert_eq!(report.total(), 200);
        assert_eq!(report.inconclusive, 0);
        assert!(report.pass_rate() >= 0.90, "{report:?}");
    }

    #[test]
    fn test_tiny_budget_is_inconclusive() {
        let config = CalibrationConfig::default().with_trials(3).with_meta_trials(10);
        let report = calibrate(&config).unwrap();
        assert_eq!(report.inconclusive, 10);
        assert_eq!(report.pass_rate(), 0.0);
    }
}
