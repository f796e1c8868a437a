//! Session-isolated trial runners
//!
//! Each trial gets a fresh `RuntimeSession` seeded from its own
//! sub-stream of a base seed, so trial `i` sees the same outcomes no
//! matter how many trials run, in what order, or on which thread.

use kinda_core::{substream_seed, KindaError, KindaResult, PersonalityRegistry};
use kinda_runtime::{RuntimeSession, SessionConfig};
use rayon::prelude::*;
use tracing::debug;

use crate::assertion::{check_parameters, evaluate_trials, AssertionReport, AssertionTrial, TrialBudget};

/// Runs a predicate against independently seeded sessions
#[derive(Clone, Debug)]
pub struct TrialRunner {
    config: SessionConfig,
    registry: PersonalityRegistry,
    base_seed: u64,
}

impl TrialRunner {
    /// Runner for `personality` at `chaos_level`
    pub fn new(personality: &str, chaos_level: u8, base_seed: u64) -> Self {
        Self::from_config(
            SessionConfig::new(personality).with_chaos_level(chaos_level),
            base_seed,
        )
    }

    /// Runner using every setting of `config` except its seed
    pub fn from_config(config: SessionConfig, base_seed: u64) -> Self {
        Self {
            config: config.with_recording(false),
            registry: PersonalityRegistry::new(),
            base_seed,
        }
    }

    /// Resolve personalities through a custom registry
    pub fn with_registry(mut self, registry: PersonalityRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn base_seed(&self) -> u64 {
        self.base_seed
    }

    /// Fresh session for trial `index`
    pub fn session(&self, index: u64) -> KindaResult<RuntimeSession> {
        let config = self
            .config
            .clone()
            .with_seed(substream_seed(self.base_seed, index));
        RuntimeSession::with_registry(&config, self.registry.clone())
    }

    fn run_one<F>(&self, index: u64, predicate: &F) -> KindaResult<AssertionTrial>
    where
        F: Fn(&mut RuntimeSession) -> KindaResult<bool>,
    {
        let mut session = self.session(index)?;
        let outcome = predicate(&mut session)?;
        Ok(AssertionTrial { index, outcome })
    }

    /// Run `trials` trials one after another
    pub fn run_isolated<F>(&self, trials: u64, predicate: F) -> KindaResult<Vec<AssertionTrial>>
    where
        F: Fn(&mut RuntimeSession) -> KindaResult<bool>,
    {
        (0..trials).map(|i| self.run_one(i, &predicate)).collect()
    }

    /// Run `trials` trials on a pool of `threads` workers
    ///
    /// Results come back in trial order and equal those of
    /// [`run_isolated`](Self::run_isolated).
    pub fn run_parallel<F>(&self, trials: u64, threads: usize, predicate: F) -> KindaResult<Vec<AssertionTrial>>
    where
        F: Fn(&mut RuntimeSession) -> KindaResult<bool> + Sync,
    {
        let threads = threads.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| KindaError::InvalidConfig(format!("trial pool: {e}")))?;

        let merged = pool.install(|| {
            (0..trials)
                .into_par_iter()
                .map(|i| self.run_one(i, &predicate))
                .collect::<KindaResult<Vec<_>>>()
        })?;
        debug!(trials, threads, "parallel trials merged");
        Ok(merged)
    }

    /// Statistical assertion over isolated sessions
    pub fn assert_rate<F>(
        &self,
        predicate: F,
        expected: f64,
        budget: TrialBudget,
        confidence: f64,
    ) -> KindaResult<AssertionReport>
    where
        F: Fn(&mut RuntimeSession) -> KindaResult<bool>,
    {
        let mut index = 0;
        crate::assertion::try_assert_eventually(
            || {
                let trial = self.run_one(index, &predicate)?;
                index += 1;
                Ok(trial.outcome)
            },
            expected,
            budget,
            confidence,
        )
    }

    /// Statistical assertion with trials spread over threads
    pub fn assert_rate_parallel<F>(
        &self,
        predicate: F,
        expected: f64,
        trials: u64,
        threads: usize,
        confidence: f64,
    ) -> KindaResult<AssertionReport>
    where
        F: Fn(&mut RuntimeSession) -> KindaResult<bool> + Sync,
    {
        check_parameters(expected, &TrialBudget::Trials(trials), confidence)?;
        let results = self.run_parallel(trials, threads, predicate)?;
        Ok(evaluate_trials(results, expected, confidence))
    }
}
