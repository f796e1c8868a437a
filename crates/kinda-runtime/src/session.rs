//! Runtime session - owner of all probabilistic state
//!
//! A session holds the active personality, the chaos level, the single PRNG
//! stream, the instability counter and, optionally, a record log being
//! written or a log being replayed. Nothing outside the session consumes the
//! stream; one session serves one logical thread of control.

use std::fmt;
use std::sync::Arc;

use kinda_core::{
    ChaosLevel, Construct, Decision, Instability, KindaError, KindaResult, Luck,
    PersonalityProfile, PersonalityRegistry,
};
use kinda_time::{Clock, DriftConfig, SystemClock};
use kinda_wire::RecordLog;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

use crate::{OutputSink, SessionConfig, StdoutSink};

/// Session counters
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub decisions: u64,
    pub favorable: u64,
    pub unfavorable: u64,
    pub neutral: u64,
    pub fallbacks: u64,
}

impl SessionStats {
    pub(crate) fn record(&mut self, luck: Luck) {
        self.decisions += 1;
        match luck {
            Luck::Favorable => self.favorable += 1,
            Luck::Unfavorable => self.unfavorable += 1,
            Luck::Neutral => self.neutral += 1,
        }
    }
}

/// What a session reports when torn down
#[derive(Clone, Debug)]
pub struct SessionSummary {
    pub seed: u64,
    pub personality: String,
    pub chaos_level: ChaosLevel,
    pub instability: u32,
    pub stats: SessionStats,
    /// Log still being recorded at teardown, if any
    pub recording: Option<RecordLog>,
}

/// Position within a log being replayed
#[derive(Debug)]
pub(crate) struct ReplayCursor {
    pub(crate) log: RecordLog,
    pub(crate) next: usize,
}

impl ReplayCursor {
    /// Take the next recorded decision, checking it matches the live call
    pub(crate) fn advance(
        &mut self,
        seq: u64,
        site: kinda_core::CallSiteId,
        construct: Construct,
    ) -> KindaResult<Decision> {
        let Some(recorded) = self.log.decisions.get(self.next).copied() else {
            return Err(KindaError::ReplayExhausted {
                seq,
                site,
                construct,
            });
        };
        if recorded.construct != construct {
            return Err(KindaError::ReplayDivergence {
                seq,
                site,
                expected: recorded.construct,
                actual: construct,
            });
        }
        if recorded.site != site {
            return Err(KindaError::ReplaySiteMismatch {
                seq,
                construct,
                expected: recorded.site,
                actual: site,
            });
        }
        self.next += 1;
        Ok(recorded)
    }

    pub(crate) fn remaining(&self) -> usize {
        self.log.decisions.len() - self.next
    }
}

#[derive(Debug)]
pub(crate) enum Mode {
    Live,
    Recording(RecordLog),
    Replaying(ReplayCursor),
}

/// Explicit runtime session
pub struct RuntimeSession {
    pub(crate) registry: PersonalityRegistry,
    pub(crate) profile: PersonalityProfile,
    pub(crate) chaos: ChaosLevel,
    pub(crate) seed: u64,
    pub(crate) auto_seeded: bool,
    pub(crate) rng: StdRng,
    pub(crate) instability: Instability,
    pub(crate) seq: u64,
    pub(crate) mode: Mode,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) drift: DriftConfig,
    pub(crate) output: Box<dyn OutputSink>,
    pub(crate) stats: SessionStats,
}

impl fmt::Debug for RuntimeSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeSession")
            .field("personality", &self.profile.name)
            .field("chaos", &self.chaos)
            .field("seed", &self.seed)
            .field("seq", &self.seq)
            .field("instability", &self.instability.level())
            .field("mode", &self.mode_name())
            .finish()
    }
}

impl RuntimeSession {
    /// Create a session from configuration, using the built-in personalities
    pub fn new(config: &SessionConfig) -> KindaResult<Self> {
        Self::with_registry(config, PersonalityRegistry::new())
    }

    /// Create a session resolving the personality through `registry`
    pub fn with_registry(config: &SessionConfig, registry: PersonalityRegistry) -> KindaResult<Self> {
        let profile = registry.get(&config.personality)?.clone();
        let chaos = config.chaos()?;
        let (seed, auto_seeded) = match config.seed {
            Some(seed) => (seed, false),
            None => (rand::thread_rng().gen(), true),
        };

        let mut session = RuntimeSession {
            registry,
            profile,
            chaos,
            seed,
            auto_seeded,
            rng: StdRng::seed_from_u64(seed),
            instability: Instability::default(),
            seq: 0,
            mode: Mode::Live,
            clock: Arc::new(SystemClock::new()),
            drift: config.drift.clone(),
            output: Box::new(StdoutSink),
            stats: SessionStats::default(),
        };

        info!(
            personality = %session.profile.name,
            chaos = %session.chaos,
            seed = session.seed,
            auto_seeded,
            "session initialized"
        );

        if config.record {
            session.start_recording()?;
        }
        Ok(session)
    }

    /// Shorthand for a fixed-seed session
    pub fn seeded(personality: &str, chaos_level: u8, seed: u64) -> KindaResult<Self> {
        let config = SessionConfig::new(personality)
            .with_chaos_level(chaos_level)
            .with_seed(seed);
        Self::new(&config)
    }

    /// Replace the clock used by time-aware variables
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the sink used by `~sorta print`
    pub fn with_output(mut self, output: Box<dyn OutputSink>) -> Self {
        self.output = output;
        self
    }

    /// Reset every piece of state, as if freshly constructed from `config`
    ///
    /// Clock, output sink and registry are kept.
    pub fn reinitialize(&mut self, config: &SessionConfig) -> KindaResult<()> {
        let profile = self.registry.get(&config.personality)?.clone();
        let chaos = config.chaos()?;
        let (seed, auto_seeded) = match config.seed {
            Some(seed) => (seed, false),
            None => (rand::thread_rng().gen(), true),
        };

        self.profile = profile;
        self.chaos = chaos;
        self.drift = config.drift.clone();
        self.mode = Mode::Live;
        self.reseed_inner(seed, auto_seeded);

        info!(personality = %self.profile.name, chaos = %self.chaos, seed, "session reinitialized");

        if config.record {
            self.start_recording()?;
        }
        Ok(())
    }

    /// Restart the PRNG stream from `seed`, clearing instability and counters
    ///
    /// An active recording restarts too, since its earlier decisions belong
    /// to the old stream.
    pub fn reseed(&mut self, seed: u64) {
        self.reseed_inner(seed, false);
        if let Mode::Recording(log) = &mut self.mode {
            *log = RecordLog::new(&self.profile.name, self.chaos, seed, false);
        }
    }

    fn reseed_inner(&mut self, seed: u64, auto_seeded: bool) {
        self.seed = seed;
        self.auto_seeded = auto_seeded;
        self.rng = StdRng::seed_from_u64(seed);
        self.instability.reset();
        self.seq = 0;
        self.stats = SessionStats::default();
    }

    /// End the session and report what happened
    pub fn teardown(self) -> SessionSummary {
        let recording = match self.mode {
            Mode::Recording(log) => Some(log),
            _ => None,
        };
        info!(
            decisions = self.stats.decisions,
            instability = self.instability.level(),
            "session torn down"
        );
        SessionSummary {
            seed: self.seed,
            personality: self.profile.name,
            chaos_level: self.chaos,
            instability: self.instability.level(),
            stats: self.stats,
            recording,
        }
    }

    // Accessors

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn is_auto_seeded(&self) -> bool {
        self.auto_seeded
    }

    pub fn personality(&self) -> &PersonalityProfile {
        &self.profile
    }

    pub fn chaos_level(&self) -> ChaosLevel {
        self.chaos
    }

    pub fn instability(&self) -> &Instability {
        &self.instability
    }

    /// Sequence number the next decision will get
    pub fn next_seq(&self) -> u64 {
        self.seq
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn registry(&self) -> &PersonalityRegistry {
        &self.registry
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn drift_config(&self) -> &DriftConfig {
        &self.drift
    }

    pub fn is_recording(&self) -> bool {
        matches!(self.mode, Mode::Recording(_))
    }

    pub fn is_replaying(&self) -> bool {
        matches!(self.mode, Mode::Replaying(_))
    }

    fn mode_name(&self) -> &'static str {
        match self.mode {
            Mode::Live => "live",
            Mode::Recording(_) => "recording",
            Mode::Replaying(_) => "replaying",
        }
    }

    /// Switch personality; unknown names are rejected
    pub fn set_personality(&mut self, name: &str) -> KindaResult<()> {
        self.profile = self.registry.get(name)?.clone();
        info!(personality = name, "personality changed");
        Ok(())
    }

    /// Change chaos level; out-of-range levels are rejected
    pub fn set_chaos_level(&mut self, level: u8) -> KindaResult<()> {
        self.chaos = ChaosLevel::new(level)?;
        info!(chaos = level, "chaos level changed");
        Ok(())
    }

    /// Effective probability `construct` would use right now
    pub fn effective_probability(&self, construct: Construct) -> f64 {
        self.profile
            .effective_probability(construct, self.chaos, &self.instability)
    }

    // Record / replay

    /// Begin recording every decision
    ///
    /// The stream restarts from the session seed so that the log alone is
    /// enough to reproduce the run. Recording while replaying is rejected.
    pub fn start_recording(&mut self) -> KindaResult<()> {
        if self.is_replaying() {
            return Err(KindaError::ReplayActive);
        }
        self.reseed_inner(self.seed, self.auto_seeded);
        self.mode = Mode::Recording(RecordLog::new(
            &self.profile.name,
            self.chaos,
            self.seed,
            self.auto_seeded,
        ));
        info!(seed = self.seed, personality = %self.profile.name, chaos = %self.chaos, "recording started");
        Ok(())
    }

    /// Stop recording and hand back the log
    pub fn stop_recording(&mut self) -> Option<RecordLog> {
        match std::mem::replace(&mut self.mode, Mode::Live) {
            Mode::Recording(log) => {
                info!(decisions = log.len(), "recording stopped");
                Some(log)
            }
            other => {
                self.mode = other;
                None
            }
        }
    }

    /// Build a session that replays `log`, using the built-in personalities
    pub fn start_replaying(log: RecordLog) -> KindaResult<Self> {
        Self::replay_with_registry(log, PersonalityRegistry::new())
    }

    /// Build a session that replays `log`, resolving its personality through `registry`
    pub fn replay_with_registry(log: RecordLog, registry: PersonalityRegistry) -> KindaResult<Self> {
        let config = SessionConfig::new(&log.personality)
            .with_chaos_level(log.chaos_level.get())
            .with_seed(log.seed);
        let mut session = Self::with_registry(&config, registry)?;
        session.auto_seeded = log.auto_seeded;

        info!(
            decisions = log.len(),
            seed = log.seed,
            personality = %log.personality,
            "replay started"
        );
        session.mode = Mode::Replaying(ReplayCursor { log, next: 0 });
        Ok(session)
    }

    /// Recorded decisions not yet consumed by a replay
    pub fn replay_remaining(&self) -> Option<usize> {
        match &self.mode {
            Mode::Replaying(cursor) => Some(cursor.remaining()),
            _ => None,
        }
    }

    /// Finish a replay; fails if the program ended before the log did
    pub fn finish_replay(&mut self) -> KindaResult<()> {
        let Mode::Replaying(cursor) = &self.mode else {
            return Ok(());
        };
        let consumed = cursor.next as u64;
        let recorded = cursor.log.len() as u64;
        self.mode = Mode::Live;

        if consumed < recorded {
            warn!(consumed, recorded, "replay ended before the log was exhausted");
            return Err(KindaError::ReplayIncomplete { consumed, recorded });
        }
        info!(consumed, "replay finished");
        Ok(())
    }

    // Fallbacks

    /// `primary ~welp fallback`
    ///
    /// Not probabilistic. Taking the fallback counts as an unfavorable
    /// outcome and is reported in the personality's voice.
    pub fn welp<T: fmt::Display>(&mut self, primary: Option<T>, fallback: T) -> T {
        match primary {
            Some(value) => value,
            None => {
                let message = self.profile.style.fallback_message(&fallback.to_string());
                self.record_fallback(&message);
                fallback
            }
        }
    }

    /// Count a taken fallback against the session's luck
    pub(crate) fn record_fallback(&mut self, message: &str) {
        self.instability.record(Luck::Unfavorable);
        self.stats.fallbacks += 1;
        warn!(personality = %self.profile.name, "{message}");
    }

    /// `expr ~welp fallback` where `expr` may fail
    pub fn welp_result<T: fmt::Display, E: fmt::Display>(&mut self, primary: Result<T, E>, fallback: T) -> T {
        match primary {
            Ok(value) => value,
            Err(err) => {
                warn!(error = %err, "welp primary failed");
                self.welp(None, fallback)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinda_core::{CallSiteId, ConstructArgs, ErrorClass, Personality};

    fn site(n: u64) -> CallSiteId {
        CallSiteId::new(n)
    }

    #[test]
    fn test_unknown_personality_rejected() {
        let err = RuntimeSession::new(&SessionConfig::new("grumpy")).unwrap_err();
        assert!(matches!(err, KindaError::UnknownPersonality(_)));
        assert_eq!(err.class(), ErrorClass::Configuration);
    }

    #[test]
    fn test_chaos_out_of_range_rejected() {
        for level in [0u8, 11, 200] {
            let config = SessionConfig::default().with_chaos_level(level);
            assert!(matches!(
                RuntimeSession::new(&config),
                Err(KindaError::ChaosLevelOutOfRange(l)) if l == level
            ));
        }
    }

    #[test]
    fn test_auto_seed_is_retrievable() {
        let mut a = RuntimeSession::new(&SessionConfig::default()).unwrap();
        assert!(a.is_auto_seeded());
        let seed = a.seed();

        let mut b = RuntimeSession::new(&SessionConfig::default().with_seed(seed)).unwrap();
        for i in 0..50 {
            let x = a.evaluate(Construct::Maybe, site(i), ConstructArgs::Condition(true)).unwrap();
            let y = b.evaluate(Construct::Maybe, site(i), ConstructArgs::Condition(true)).unwrap();
            assert_eq!(x, y);
        }
    }

    #[test]
    fn test_reinitialize_resets_state() {
        let config = SessionConfig::new("chaotic").with_seed(9).with_chaos_level(9);
        let mut session = RuntimeSession::new(&config).unwrap();
        let first: Vec<_> = (0..20)
            .map(|i| session.evaluate(Construct::Sometimes, site(i), ConstructArgs::Condition(true)).unwrap())
            .collect();
        assert_eq!(session.next_seq(), 20);

        session.reinitialize(&config).unwrap();
        assert_eq!(session.next_seq(), 0);
        assert_eq!(session.instability().level(), 0);
        let second: Vec<_> = (0..20)
            .map(|i| session.evaluate(Construct::Sometimes, site(i), ConstructArgs::Condition(true)).unwrap())
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_set_personality_and_chaos() {
        let mut session = RuntimeSession::seeded("reliable", 1, 1).unwrap();
        session.set_personality("chaotic").unwrap();
        assert_eq!(session.personality().name, "chaotic");
        assert!(session.set_personality("grumpy").is_err());
        assert_eq!(session.personality().name, "chaotic");

        assert!(session.set_chaos_level(0).is_err());
        session.set_chaos_level(10).unwrap();
        assert_eq!(session.chaos_level(), ChaosLevel::MAX);
    }

    #[test]
    fn test_welp_counts_fallback_as_unlucky() {
        let mut session = RuntimeSession::seeded("playful", 5, 1).unwrap();
        assert_eq!(session.welp(Some(3), 7), 3);
        assert_eq!(session.instability().level(), 0);

        assert_eq!(session.welp(None, 7), 7);
        assert_eq!(session.instability().level(), 1);
        assert_eq!(session.stats().fallbacks, 1);

        let parsed: Result<i32, std::num::ParseIntError> = "nope".parse();
        assert_eq!(session.welp_result(parsed, 0), 0);
        assert_eq!(session.instability().level(), 2);
    }

    #[test]
    fn test_recording_while_replaying_rejected() {
        let mut recorder = RuntimeSession::seeded("playful", 3, 5).unwrap();
        recorder.start_recording().unwrap();
        recorder.evaluate(Construct::Maybe, site(1), ConstructArgs::Condition(true)).unwrap();
        let log = recorder.stop_recording().unwrap();

        let mut replay = RuntimeSession::start_replaying(log).unwrap();
        assert!(matches!(replay.start_recording(), Err(KindaError::ReplayActive)));
    }

    #[test]
    fn test_stop_recording_when_idle() {
        let mut session = RuntimeSession::seeded("reliable", 1, 5).unwrap();
        assert!(session.stop_recording().is_none());
        assert!(!session.is_recording());
    }

    #[test]
    fn test_replay_unknown_custom_personality() {
        let mut registry = PersonalityRegistry::new();
        let mut custom = Personality::Cautious.profile();
        custom.name = "sleepy".into();
        registry.register(custom).unwrap();

        let config = SessionConfig::new("sleepy").with_seed(3).with_recording(true);
        let mut session = RuntimeSession::with_registry(&config, registry.clone()).unwrap();
        session.evaluate(Construct::Maybe, site(0), ConstructArgs::Condition(true)).unwrap();
        let log = session.stop_recording().unwrap();

        assert!(matches!(
            RuntimeSession::start_replaying(log.clone()),
            Err(KindaError::UnknownPersonality(_))
        ));
        let mut replay = RuntimeSession::replay_with_registry(log, registry).unwrap();
        replay.evaluate(Construct::Maybe, site(0), ConstructArgs::Condition(true)).unwrap();
        replay.finish_replay().unwrap();
    }

    #[test]
    fn test_teardown_summary() {
        let config = SessionConfig::new("cautious").with_seed(11).with_recording(true);
        let mut session = RuntimeSession::new(&config).unwrap();
        for i in 0..5 {
            session.evaluate(Construct::FuzzyInt, site(i), ConstructArgs::Int(10)).unwrap();
        }
        let summary = session.teardown();
        assert_eq!(summary.seed, 11);
        assert_eq!(summary.stats.decisions, 5);
        assert_eq!(summary.recording.map(|log| log.len()), Some(5));
    }
}
