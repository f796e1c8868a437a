//! Scenario Harness
//!
//! Runs a mixed kinda program under a sweep of personalities and chaos
//! levels and checks the runtime's guarantees for each run:
//! - Determinism under a fixed seed
//! - Replay fidelity from a recorded log
//! - Record log survives encode/decode
//! - Every recorded probability is a probability

use std::time::Duration;

use kinda_core::{CallSiteId, KindaError, KindaResult, Outcome, Personality};
use kinda_runtime::{MemorySink, RuntimeSession, SessionConfig};
use kinda_time::ManualClock;
use kinda_wire::RecordLog;
use tracing::{info, warn};

// ============================================================================
// MIXED PROGRAM
// ============================================================================

/// Time that passes between two statements of the mixed program
pub const STATEMENT_TICK: Duration = Duration::from_millis(250);

/// A program touching every construct family, `calls` statements long
///
/// The clock handle must be the one the session reads.
pub fn mixed_program(session: &mut RuntimeSession, clock: &ManualClock, calls: u64) -> KindaResult<Vec<Outcome>> {
    let base = CallSiteId::from_source("mixed.knda", 1, 1);
    let mut drifting = session.drift_var(base.child(u32::MAX), 40.0);
    let mut outcomes = Vec::with_capacity(calls as usize);

    for i in 0..calls {
        let site = base.child(i as u32);
        let outcome = match i % 13 {
            0 => Outcome::Bool(session.maybe(site, true)?),
            1 => Outcome::Int(session.kinda_int(site, i as i64 * 3)?),
            2 => Outcome::Float(session.kinda_float(site, 2.5 + i as f64)?),
            3 => Outcome::Bool(session.sometimes(site, i % 2 == 1)?),
            4 => Outcome::Bool(session.ish(site, i as f64, 5.0, None)?),
            5 => Outcome::Ternary(session.kinda_binary(site, None)?),
            6 => Outcome::Count(session.kinda_repeat(site, 4)?),
            7 => Outcome::Float(session.ish_value(site, 100.0, None)?),
            8 => Outcome::Bool(session.kinda_bool(site, true)?),
            9 => Outcome::Int(session.fuzzy_reassign(site, -(i as i64))?),
            10 => Outcome::Bool(session.sorta_print(site, "still here")?),
            11 => Outcome::Bool(
                session
                    .kinda_import(site, "mixed", || Ok::<_, KindaError>(i))?
                    .is_some(),
            ),
            _ => Outcome::Float(session.time_drift(&mut drifting)?),
        };
        outcomes.push(outcome);
        clock.advance(STATEMENT_TICK);
    }
    Ok(outcomes)
}

// ============================================================================
// SCENARIO DESCRIPTION
// ============================================================================

/// One scenario: personality, chaos level, seed and program length
#[derive(Debug, Clone)]
pub struct ScenarioSpec {
    pub name: String,
    pub personality: String,
    pub chaos_level: u8,
    pub seed: u64,
    /// Statements of the mixed program
    pub calls: u64,
}

impl ScenarioSpec {
    pub fn new(name: &str, personality: &str) -> Self {
        Self {
            name: name.to_string(),
            personality: personality.to_string(),
            chaos_level: 5,
            seed: 42,
            calls: 60,
        }
    }

    pub fn with_chaos_level(mut self, level: u8) -> Self {
        self.chaos_level = level;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_calls(mut self, calls: u64) -> Self {
        self.calls = calls;
        self
    }

    fn config(&self) -> SessionConfig {
        SessionConfig::new(&self.personality)
            .with_chaos_level(self.chaos_level)
            .with_seed(self.seed)
    }

    fn session(&self, clock: &ManualClock) -> KindaResult<RuntimeSession> {
        Ok(RuntimeSession::new(&self.config())?
            .with_clock(std::sync::Arc::new(clock.clone()))
            .with_output(Box::new(MemorySink::new())))
    }
}

// ============================================================================
// SCENARIO HARNESS
// ============================================================================

/// Result of a single scenario
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    pub spec: ScenarioSpec,
    pub passed: bool,
    pub decisions: u64,
    pub unfavorable: u64,
    pub violations: Vec<String>,
}

/// Runs scenarios and collects results
#[derive(Debug, Default)]
pub struct ScenarioHarness {
    specs: Vec<ScenarioSpec>,
    results: Vec<ScenarioResult>,
}

impl ScenarioHarness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_scenario(&mut self, spec: ScenarioSpec) {
        self.specs.push(spec);
    }

    /// Every built-in personality at chaos 1, 5 and 10
    pub fn add_standard_scenarios(&mut self) {
        for personality in Personality::ALL {
            for level in [1, 5, 10] {
                let name = format!("{}_chaos_{}", personality.name(), level);
                self.add_scenario(
                    ScenarioSpec::new(&name, personality.name())
                        .with_chaos_level(level)
                        .with_seed(u64::from(level) * 1_000 + 7),
                );
            }
        }
    }

    /// Run all scenarios
    pub fn run_all(&mut self) -> &[ScenarioResult] {
        self.results = self.specs.iter().map(run_scenario).collect();
        &self.results
    }

    pub fn results(&self) -> &[ScenarioResult] {
        &self.results
    }

    pub fn all_passed(&self) -> bool {
        !self.results.is_empty() && self.results.iter().all(|r| r.passed)
    }

    /// One line per scenario
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for r in &self.results {
            let status = if r.passed { "PASS" } else { "FAIL" };
            out.push_str(&format!(
                "[{}] {} ({} decisions, {} unfavorable)\n",
                status, r.spec.name, r.decisions, r.unfavorable
            ));
            for v in &r.violations {
                out.push_str(&format!("    - {v}\n"));
            }
        }
        out
    }
}

/// Run one scenario
pub fn run_scenario(spec: &ScenarioSpec) -> ScenarioResult {
    let mut violations = Vec::new();
    let (decisions, unfavorable) = match check_scenario(spec, &mut violations) {
        Ok(counts) => counts,
        Err(err) => {
            violations.push(format!("runtime error: {err}"));
            (0, 0)
        }
    };

    let passed = violations.is_empty();
    if passed {
        info!(scenario = %spec.name, decisions, "scenario passed");
    } else {
        warn!(scenario = %spec.name, violations = violations.len(), "scenario failed");
    }

    ScenarioResult {
        spec: spec.clone(),
        passed,
        decisions,
        unfavorable,
        violations,
    }
}

fn check_scenario(spec: &ScenarioSpec, violations: &mut Vec<String>) -> KindaResult<(u64, u64)> {
    // Stage 1: Recorded run
    let clock = ManualClock::new();
    let mut recorder = spec.session(&clock)?;
    recorder.start_recording()?;
    let live = mixed_program(&mut recorder, &clock, spec.calls)?;
    let stats = recorder.stats().clone();
    let log = recorder
        .stop_recording()
        .ok_or_else(|| KindaError::InvalidConfig("recording was not active".into()))?;

    if log.len() as u64 != stats.decisions {
        violations.push(format!("log holds {} decisions, session made {}", log.len(), stats.decisions));
    }
    for d in &log.decisions {
        if !(0.0..=1.0).contains(&d.probability) {
            violations.push(format!("seq {} recorded probability {}", d.seq, d.probability));
        }
    }

    // Stage 2: Same seed, fresh session
    let clock = ManualClock::new();
    let mut again = spec.session(&clock)?;
    let rerun = mixed_program(&mut again, &clock, spec.calls)?;
    if !same_outcomes(&live, &rerun) {
        violations.push("same seed produced different outcomes".to_string());
    }

    // Stage 3: Encode and decode the log
    let decoded = RecordLog::decode(&log.encode()?)?;
    if !decoded.bit_eq(&log) {
        violations.push("record log changed across encode/decode".to_string());
    }

    // Stage 4: Replay on a clock that runs differently
    let clock = ManualClock::starting_at(Duration::from_secs(3_600));
    let mut replay = RuntimeSession::start_replaying(decoded)?
        .with_clock(std::sync::Arc::new(clock.clone()))
        .with_output(Box::new(MemorySink::new()));
    let replayed = mixed_program(&mut replay, &clock, spec.calls)?;
    if !same_outcomes(&live, &replayed) {
        violations.push("replay returned different outcomes".to_string());
    }
    if let Err(err) = replay.finish_replay() {
        violations.push(format!("replay incomplete: {err}"));
    }

    Ok((stats.decisions, stats.unfavorable))
}

fn same_outcomes(a: &[Outcome], b: &[Outcome]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.bit_eq(y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinda_time::Clock;

    #[test]
    fn test_standard_scenarios_pass() {
        let mut harness = ScenarioHarness::new();
        harness.add_standard_scenarios();
        harness.run_all();
        assert_eq!(harness.results().len(), 12);
        assert!(harness.all_passed(), "{}", harness.summary());
    }

    #[test]
    fn test_bad_scenario_reports_violation() {
        let result = run_scenario(&ScenarioSpec::new("typo", "reliabel"));
        assert!(!result.passed);
        assert!(result.violations[0].contains("Unknown personality"));
    }

    #[test]
    fn test_mixed_program_one_decision_per_statement() {
        let clock = ManualClock::new();
        let mut session = ScenarioSpec::new("count", "chaotic")
            .with_chaos_level(9)
            .session(&clock)
            .unwrap();
        let outcomes = mixed_program(&mut session, &clock, 48).unwrap();
        assert_eq!(outcomes.len(), 48);
        assert_eq!(session.next_seq(), 48);
        assert_eq!(clock.now(), STATEMENT_TICK * 48);
    }
}
