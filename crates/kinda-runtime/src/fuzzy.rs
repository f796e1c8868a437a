//! Typed construct helpers and fuzzy values
//!
//! Everything here is sugar over `RuntimeSession::evaluate`: each helper
//! builds the construct arguments, dispatches, and unwraps the outcome into
//! the host type.

use std::fmt;
use std::time::Duration;

use kinda_core::{CallSiteId, Construct, ConstructArgs, KindaError, KindaResult, Outcome};
use kinda_time::DriftState;
use tracing::info;

use crate::RuntimeSession;

macro_rules! outcome_as {
    ($session:expr, $outcome:expr, $construct:expr, $accessor:ident) => {{
        let outcome = $outcome;
        outcome
            .$accessor()
            .ok_or_else(|| $session.unexpected($construct, outcome))
    }};
}

impl RuntimeSession {
    /// Error for an outcome of the wrong type
    ///
    /// While replaying the outcome came from the log, so the log is at
    /// fault; otherwise the arguments were.
    fn unexpected(&self, construct: Construct, outcome: Outcome) -> KindaError {
        if self.is_replaying() {
            KindaError::InvalidLogFormat(format!("recorded outcome {outcome:?} does not fit {construct}"))
        } else {
            KindaError::InvalidArgument {
                construct,
                reason: format!("produced {outcome:?}"),
            }
        }
    }

    fn bool_construct(&mut self, construct: Construct, site: CallSiteId, args: ConstructArgs) -> KindaResult<bool> {
        let outcome = self.evaluate(construct, site, args)?;
        outcome_as!(self, outcome, construct, as_bool)
    }

    /// `~maybe (cond)`
    pub fn maybe(&mut self, site: CallSiteId, condition: bool) -> KindaResult<bool> {
        self.bool_construct(Construct::Maybe, site, ConstructArgs::Condition(condition))
    }

    /// `~sometimes (cond)`
    pub fn sometimes(&mut self, site: CallSiteId, condition: bool) -> KindaResult<bool> {
        self.bool_construct(Construct::Sometimes, site, ConstructArgs::Condition(condition))
    }

    /// One read of `~kinda int`
    pub fn kinda_int(&mut self, site: CallSiteId, value: i64) -> KindaResult<i64> {
        let outcome = self.evaluate(Construct::FuzzyInt, site, ConstructArgs::Int(value))?;
        outcome_as!(self, outcome, Construct::FuzzyInt, as_int)
    }

    /// One read of `~kinda float`
    pub fn kinda_float(&mut self, site: CallSiteId, value: f64) -> KindaResult<f64> {
        let outcome = self.evaluate(Construct::FuzzyFloat, site, ConstructArgs::Float(value))?;
        outcome_as!(self, outcome, Construct::FuzzyFloat, as_float)
    }

    /// One read of `~kinda bool`
    pub fn kinda_bool(&mut self, site: CallSiteId, value: bool) -> KindaResult<bool> {
        self.bool_construct(Construct::FuzzyBool, site, ConstructArgs::Condition(value))
    }

    /// `left ~ish right`, with the personality's tolerance when none is given
    pub fn ish(&mut self, site: CallSiteId, left: f64, right: f64, tolerance: Option<f64>) -> KindaResult<bool> {
        self.bool_construct(
            Construct::IshComparison,
            site,
            ConstructArgs::Compare {
                left,
                right,
                tolerance,
            },
        )
    }

    /// `value~ish`
    pub fn ish_value(&mut self, site: CallSiteId, value: f64, variance: Option<f64>) -> KindaResult<f64> {
        let outcome = self.evaluate(Construct::IshValue, site, ConstructArgs::IshValue { value, variance })?;
        outcome_as!(self, outcome, Construct::IshValue, as_float)
    }

    /// `value~ish` for integers; the fuzzed value is truncated back
    pub fn ish_value_int(&mut self, site: CallSiteId, value: i64, variance: Option<f64>) -> KindaResult<i64> {
        let fuzzed = self.ish_value(site, value as f64, variance)?;
        Ok(fuzzed.trunc() as i64)
    }

    /// `x ~= expr`
    pub fn fuzzy_reassign(&mut self, site: CallSiteId, value: i64) -> KindaResult<i64> {
        let outcome = self.evaluate(Construct::FuzzyReassign, site, ConstructArgs::Int(value))?;
        outcome_as!(self, outcome, Construct::FuzzyReassign, as_int)
    }

    /// Iteration count for `~kinda_repeat (n)`
    pub fn kinda_repeat(&mut self, site: CallSiteId, n: u64) -> KindaResult<u64> {
        let outcome = self.evaluate(Construct::Repeat, site, ConstructArgs::Count(n))?;
        outcome_as!(self, outcome, Construct::Repeat, as_count)
    }

    /// Run `body` roughly `n` times; returns how many times it ran
    pub fn kinda_repeat_with<F>(&mut self, site: CallSiteId, n: u64, mut body: F) -> KindaResult<u64>
    where
        F: FnMut(&mut Self, u64) -> KindaResult<()>,
    {
        let count = self.kinda_repeat(site, n)?;
        for i in 0..count {
            body(self, i)?;
        }
        Ok(count)
    }

    /// `~kinda binary`: +1, -1 or 0
    pub fn kinda_binary(&mut self, site: CallSiteId, probabilities: Option<[f64; 3]>) -> KindaResult<i8> {
        let outcome = self.evaluate(Construct::KindaBinary, site, ConstructArgs::Binary(probabilities))?;
        outcome_as!(self, outcome, Construct::KindaBinary, as_ternary)
    }

    /// Loop guard of `~sorta_while (cond)`: `while session.sorta_while(site, cond)? { .. }`
    pub fn sorta_while(&mut self, site: CallSiteId, condition: bool) -> KindaResult<bool> {
        self.bool_construct(Construct::SortaWhile, site, ConstructArgs::Condition(condition))
    }

    /// Whether `~maybe_for` visits the current item
    pub fn maybe_for(&mut self, site: CallSiteId) -> KindaResult<bool> {
        self.bool_construct(Construct::MaybeFor, site, ConstructArgs::Unit)
    }

    /// `~maybe_for x in items { body }`; returns how many items were visited
    pub fn maybe_for_each<I, F>(&mut self, site: CallSiteId, items: I, mut body: F) -> KindaResult<usize>
    where
        I: IntoIterator,
        F: FnMut(&mut Self, I::Item) -> KindaResult<()>,
    {
        let mut visited = 0;
        for item in items {
            if self.maybe_for(site)? {
                body(self, item)?;
                visited += 1;
            }
        }
        Ok(visited)
    }

    /// One check of `~eventually (cond)`
    pub fn eventually(&mut self, site: CallSiteId, condition: bool) -> KindaResult<bool> {
        self.bool_construct(Construct::Eventually, site, ConstructArgs::Condition(condition))
    }

    /// Poll `condition` through `~eventually` until it is confirmed or
    /// `max_attempts` checks have been spent
    pub fn eventually_within<F>(&mut self, site: CallSiteId, max_attempts: u32, mut condition: F) -> KindaResult<bool>
    where
        F: FnMut() -> bool,
    {
        for _ in 0..max_attempts {
            if self.eventually(site, condition())? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// `~sorta print (message)`
    ///
    /// Returns whether the message was printed. A skipped print emits a
    /// shrug in the personality's style, chosen by the decision's sequence
    /// number so it needs no extra randomness.
    pub fn sorta_print(&mut self, site: CallSiteId, message: &str) -> KindaResult<bool> {
        let seq = self.next_seq();
        let printed = self.bool_construct(Construct::SortaPrint, site, ConstructArgs::Unit)?;

        let line = if printed {
            format!("[print] {message}")
        } else {
            let shrugs = self.profile.style.shrugs();
            let shrug = shrugs[(seq % shrugs.len() as u64) as usize];
            if message.is_empty() {
                shrug.to_string()
            } else {
                format!("{shrug} {message}")
            }
        };
        self.output.emit(&line);
        Ok(printed)
    }

    /// `~kinda import module`
    ///
    /// The gate decides whether `loader` runs at all. `None` stands in for
    /// the module when the gate skips the load or the loader fails; a
    /// failed load counts as a fallback.
    pub fn kinda_import<T, E, F>(&mut self, site: CallSiteId, module: &str, loader: F) -> KindaResult<Option<T>>
    where
        E: fmt::Display,
        F: FnOnce() -> Result<T, E>,
    {
        self.gated_import(Construct::KindaImport, site, module, loader)
    }

    /// `~maybe import module`
    pub fn maybe_import<T, E, F>(&mut self, site: CallSiteId, module: &str, loader: F) -> KindaResult<Option<T>>
    where
        E: fmt::Display,
        F: FnOnce() -> Result<T, E>,
    {
        self.gated_import(Construct::MaybeImport, site, module, loader)
    }

    /// `~maybe import module ~welp fallback`
    ///
    /// `fallback` runs when the gate skips the primary load or the primary
    /// load fails. Only a failure of both loads after the gate let the
    /// primary through counts as an extra fallback; a skipped gate has
    /// already been counted as unfavorable.
    pub fn maybe_import_or<T, E, F, G>(
        &mut self,
        site: CallSiteId,
        module: &str,
        loader: F,
        fallback_module: &str,
        fallback: G,
    ) -> KindaResult<Option<T>>
    where
        E: fmt::Display,
        F: FnOnce() -> Result<T, E>,
        G: FnOnce() -> Result<T, E>,
    {
        let attempted = self.bool_construct(Construct::MaybeImport, site, ConstructArgs::Unit)?;
        if attempted {
            match loader() {
                Ok(loaded) => return Ok(Some(loaded)),
                Err(err) => {
                    info!(module, error = %err, "{}", self.profile.style.import_message(module, false));
                }
            }
        } else {
            info!(module, "{}", self.profile.style.import_message(module, true));
        }

        match fallback() {
            Ok(loaded) => {
                info!(module, fallback = fallback_module, "using fallback module");
                Ok(Some(loaded))
            }
            Err(err) => {
                let message = format!(
                    "{}: {err}",
                    self.profile.style.import_message(fallback_module, false)
                );
                if attempted {
                    self.record_fallback(&message);
                } else {
                    info!(module, "{message}");
                }
                Ok(None)
            }
        }
    }

    fn gated_import<T, E, F>(
        &mut self,
        construct: Construct,
        site: CallSiteId,
        module: &str,
        loader: F,
    ) -> KindaResult<Option<T>>
    where
        E: fmt::Display,
        F: FnOnce() -> Result<T, E>,
    {
        if !self.bool_construct(construct, site, ConstructArgs::Unit)? {
            info!(module, "{}", self.profile.style.import_message(module, true));
            return Ok(None);
        }
        match loader() {
            Ok(loaded) => Ok(Some(loaded)),
            Err(err) => {
                let message = format!("{}: {err}", self.profile.style.import_message(module, false));
                self.record_fallback(&message);
                Ok(None)
            }
        }
    }

    /// Declare a time-aware variable at the current clock reading
    pub fn drift_var(&self, site: CallSiteId, nominal: f64) -> DriftVar {
        DriftVar {
            site,
            state: DriftState::declared(nominal, self.clock()),
        }
    }

    /// Read a time-aware variable
    ///
    /// Reading mutates the variable's bookkeeping (access count and last
    /// access); the drifted value itself is computed, not sampled.
    pub fn time_drift(&mut self, var: &mut DriftVar) -> KindaResult<f64> {
        let sample = var.state.touch(self.clock.now());
        let outcome = self.evaluate(Construct::TimeDrift, var.site, ConstructArgs::Drift(sample))?;
        outcome_as!(self, outcome, Construct::TimeDrift, as_float)
    }
}

/// Binding of a `~time drift` variable
#[derive(Clone, Debug, PartialEq)]
pub struct DriftVar {
    site: CallSiteId,
    state: DriftState,
}

impl DriftVar {
    pub fn site(&self) -> CallSiteId {
        self.site
    }

    pub fn nominal(&self) -> f64 {
        self.state.nominal()
    }

    pub fn accesses(&self) -> u64 {
        self.state.accesses()
    }

    /// Age at clock reading `now`
    pub fn age(&self, now: Duration) -> Duration {
        now.saturating_sub(self.state.created())
    }

    pub fn state(&self) -> &DriftState {
        &self.state
    }

    /// Assign a new nominal value, restarting the aging
    pub fn assign(&mut self, nominal: f64, now: Duration) {
        self.state.reset(nominal, now);
    }
}
