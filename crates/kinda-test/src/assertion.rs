//! Statistical assertions
//!
//! `assert_eventually` runs a probabilistic predicate repeatedly and
//! checks its observed success rate against an expected probability.
//! The verdict is:
//! - `Pass` when the rate falls inside the acceptance interval
//! - `Fail` when it falls outside
//! - `Inconclusive` when the budget ran out before the normal
//!   approximation could be trusted

use std::fmt;
use std::time::{Duration, Instant};

use kinda_core::{KindaError, KindaResult};
use tracing::{debug, info};

use crate::stats::{self, AcceptanceInterval};

/// How many trials an assertion may spend
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrialBudget {
    /// Exactly this many trials
    Trials(u64),
    /// As many trials as fit in `duration`, never more than `max_trials`
    Timeout { duration: Duration, max_trials: u64 },
}

impl TrialBudget {
    pub fn trials(n: u64) -> Self {
        TrialBudget::Trials(n)
    }

    pub fn timeout(duration: Duration) -> Self {
        TrialBudget::Timeout {
            duration,
            max_trials: u64::MAX,
        }
    }

    /// Upper bound on trials
    pub fn max_trials(&self) -> u64 {
        match *self {
            TrialBudget::Trials(n) => n,
            TrialBudget::Timeout { max_trials, .. } => max_trials,
        }
    }

    fn validate(&self) -> KindaResult<()> {
        let empty = match *self {
            TrialBudget::Trials(n) => n == 0,
            TrialBudget::Timeout { duration, max_trials } => duration.is_zero() || max_trials == 0,
        };
        if empty {
            Err(KindaError::AssertionBudget)
        } else {
            Ok(())
        }
    }
}

/// Assertion verdict
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail,
    Inconclusive,
}

impl Verdict {
    pub fn is_pass(self) -> bool {
        self == Verdict::Pass
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => f.write_str("pass"),
            Verdict::Fail => f.write_str("fail"),
            Verdict::Inconclusive => f.write_str("inconclusive"),
        }
    }
}

/// One predicate evaluation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AssertionTrial {
    pub index: u64,
    pub outcome: bool,
}

/// Result of a statistical assertion
#[derive(Clone, Debug, PartialEq)]
pub struct AssertionReport {
    pub verdict: Verdict,
    pub observed_rate: f64,
    pub trials_run: u64,
    /// Smallest confidence level whose interval accepts the observed rate
    pub confidence_achieved: f64,
    pub expected: f64,
    pub confidence: f64,
    pub interval: AcceptanceInterval,
    pub trials: Vec<AssertionTrial>,
}

impl AssertionReport {
    pub fn successes(&self) -> u64 {
        self.trials.iter().filter(|t| t.outcome).count() as u64
    }
}

impl fmt::Display for AssertionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: observed {:.4} over {} trials, expected {:.4} in [{:.4}, {:.4}] at {:.3}",
            self.verdict,
            self.observed_rate,
            self.trials_run,
            self.expected,
            self.interval.lower(),
            self.interval.upper(),
            self.confidence
        )
    }
}

/// Reject parameters before any trial runs
pub fn check_parameters(expected: f64, budget: &TrialBudget, confidence: f64) -> KindaResult<()> {
    if !(expected.is_finite() && (0.0..=1.0).contains(&expected)) {
        return Err(KindaError::InvalidProbability {
            what: "expected rate",
            value: expected,
        });
    }
    if !(confidence > 0.0 && confidence < 1.0) {
        return Err(KindaError::InvalidConfidence(confidence));
    }
    budget.validate()
}

/// Assert that `predicate` holds with probability `expected`
pub fn assert_eventually<F>(
    mut predicate: F,
    expected: f64,
    budget: TrialBudget,
    confidence: f64,
) -> KindaResult<AssertionReport>
where
    F: FnMut() -> bool,
{
    try_assert_eventually(|| Ok(predicate()), expected, budget, confidence)
}

/// Like [`assert_eventually`], for predicates that can fail
///
/// The first predicate error aborts the assertion.
pub fn try_assert_eventually<F>(
    mut predicate: F,
    expected: f64,
    budget: TrialBudget,
    confidence: f64,
) -> KindaResult<AssertionReport>
where
    F: FnMut() -> KindaResult<bool>,
{
    check_parameters(expected, &budget, confidence)?;

    let started = Instant::now();
    let mut trials = Vec::new();
    let limit = budget.max_trials();
    let mut index = 0;

    while index < limit {
        if let TrialBudget::Timeout { duration, .. } = budget {
            if started.elapsed() >= duration {
                debug!(trials = index, "assertion timed out");
                break;
            }
        }
        trials.push(AssertionTrial {
            index,
            outcome: predicate()?,
        });
        index += 1;
    }

    Ok(evaluate_trials(trials, expected, confidence))
}

/// Judge a finished set of trials
///
/// Parameters are assumed valid; see [`check_parameters`].
pub fn evaluate_trials(trials: Vec<AssertionTrial>, expected: f64, confidence: f64) -> AssertionReport {
    let trials_run = trials.len() as u64;
    let successes = trials.iter().filter(|t| t.outcome).count() as u64;
    let observed_rate = if trials_run == 0 {
        0.0
    } else {
        successes as f64 / trials_run as f64
    };
    let interval = AcceptanceInterval::new(expected, trials_run, confidence);

    let verdict = if trials_run < stats::min_trials(expected) {
        Verdict::Inconclusive
    } else if interval.contains(observed_rate) {
        Verdict::Pass
    } else {
        Verdict::Fail
    };

    let report = AssertionReport {
        verdict,
        observed_rate,
        trials_run,
        confidence_achieved: stats::confidence_needed(expected, observed_rate, trials_run),
        expected,
        confidence,
        interval,
        trials,
    };
    info!(
        verdict = %report.verdict,
        observed = report.observed_rate,
        expected,
        trials = trials_run,
        "statistical assertion"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_always_true_fails_half() {
        let report = assert_eventually(|| true, 0.5, TrialBudget::trials(100), 0.95).unwrap();
        assert_eq!(report.verdict, Verdict::Fail);
        assert_eq!(report.observed_rate, 1.0);
        assert_eq!(report.trials_run, 100);
        assert!(report.confidence_achieved > 0.95);
    }

    #[test]
    fn test_fair_coin_passes() {
        let mut rng = StdRng::seed_from_u64(7);
        let report =
            assert_eventually(|| rng.gen_bool(0.5), 0.5, TrialBudget::trials(2_000), 0.999).unwrap();
        assert_eq!(report.verdict, Verdict::Pass);
        assert_eq!(report.trials.len(), 2_000);
        assert!(report.trials.iter().enumerate().all(|(i, t)| t.index == i as u64));
    }

    #[test]
    fn test_small_budget_inconclusive() {
        // 0.95 needs 100 trials before the approximation holds
        let report = assert_eventually(|| true, 0.95, TrialBudget::trials(20), 0.95).unwrap();
        assert_eq!(report.verdict, Verdict::Inconclusive);
        assert_eq!(report.trials_run, 20);
    }

    #[test]
    fn test_bad_parameters_run_nothing() {
        let mut calls = 0;
        let mut predicate = || {
            calls += 1;
            true
        };
        assert!(matches!(
            assert_eventually(&mut predicate, 0.5, TrialBudget::trials(0), 0.95),
            Err(KindaError::AssertionBudget)
        ));
        assert!(matches!(
            assert_eventually(&mut predicate, 0.5, TrialBudget::timeout(Duration::ZERO), 0.95),
            Err(KindaError::AssertionBudget)
        ));
        assert!(matches!(
            assert_eventually(&mut predicate, 0.5, TrialBudget::trials(10), 1.0),
            Err(KindaError::InvalidConfidence(_))
        ));
        assert!(matches!(
            assert_eventually(&mut predicate, 0.5, TrialBudget::trials(10), 0.0),
            Err(KindaError::InvalidConfidence(_))
        ));
        assert!(matches!(
            assert_eventually(&mut predicate, 1.5, TrialBudget::trials(10), 0.9),
            Err(KindaError::InvalidProbability { .. })
        ));
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_timeout_budget_bounded() {
        let budget = TrialBudget::Timeout {
            duration: Duration::from_secs(60),
            max_trials: 500,
        };
        let report = assert_eventually(|| false, 0.0, budget, 0.95).unwrap();
        assert_eq!(report.trials_run, 500);
        assert_eq!(report.verdict, Verdict::Pass);
    }

    #[test]
    fn test_timeout_budget_expires_on_wall_clock() {
        let budget = TrialBudget::Timeout {
            duration: Duration::from_millis(20),
            max_trials: 1_000,
        };
        let started = Instant::now();
        let report = assert_eventually(
            || {
                std::thread::sleep(Duration::from_millis(5));
                true
            },
            0.95,
            budget,
            0.95,
        )
        .unwrap();

        assert!(report.trials_run >= 1);
        assert!(report.trials_run < stats::min_trials(0.95), "{}", report.trials_run);
        assert_eq!(report.verdict, Verdict::Inconclusive);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_predicate_error_aborts() {
        let mut n = 0;
        let result = try_assert_eventually(
            || {
                n += 1;
                if n == 3 {
                    Err(KindaError::InvalidConfig("boom".into()))
                } else {
                    Ok(true)
                }
            },
            0.5,
            TrialBudget::trials(10),
            0.95,
        );
        assert!(result.is_err());
        assert_eq!(n, 3);
    }
}
