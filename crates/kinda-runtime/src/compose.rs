//! Composed constructs
//!
//! A composed construct is a named boolean expression over existing
//! constructs. Evaluating it only ever goes through the dispatcher, so
//! record/replay and statistical assertions treat it like any other code.
//! Every constituent is evaluated on every invocation (no short-circuit),
//! which keeps the number of decisions per invocation fixed.
//!
//! Constituent call sites are derived from the invoking site: the i-th
//! constituent of a node gets `site.child(i)`, recursively.

use std::collections::BTreeMap;

use kinda_core::{CallSiteId, Construct, ConstructArgs, KindaError, KindaResult, Outcome};
use tracing::debug;

use crate::semantics::ish_true_probability;
use crate::RuntimeSession;

/// Boolean expression over constructs
#[derive(Clone, Debug, PartialEq)]
pub enum ComposedExpr {
    /// A single boolean-valued construct call
    Call {
        construct: Construct,
        args: ConstructArgs,
    },
    /// Another, previously declared composition
    Use(String),
    Not(Box<ComposedExpr>),
    All(Vec<ComposedExpr>),
    Any(Vec<ComposedExpr>),
    /// True when at least `k` constituents are true
    AtLeast(usize, Vec<ComposedExpr>),
}

impl ComposedExpr {
    pub fn call(construct: Construct, args: ConstructArgs) -> Self {
        ComposedExpr::Call { construct, args }
    }

    pub fn maybe() -> Self {
        Self::call(Construct::Maybe, ConstructArgs::Condition(true))
    }

    pub fn sometimes() -> Self {
        Self::call(Construct::Sometimes, ConstructArgs::Condition(true))
    }

    pub fn negate(self) -> Self {
        ComposedExpr::Not(Box::new(self))
    }

    /// Decisions one evaluation produces
    fn decision_count(&self, defs: &BTreeMap<String, ComposedExpr>) -> usize {
        match self {
            ComposedExpr::Call { .. } => 1,
            ComposedExpr::Use(name) => defs.get(name).map_or(0, |e| e.decision_count(defs)),
            ComposedExpr::Not(inner) => inner.decision_count(defs),
            ComposedExpr::All(parts) | ComposedExpr::Any(parts) | ComposedExpr::AtLeast(_, parts) => {
                parts.iter().map(|p| p.decision_count(defs)).sum()
            }
        }
    }
}

/// Registry of declared compositions
#[derive(Clone, Debug, Default)]
pub struct CompositionRegistry {
    defs: BTreeMap<String, ComposedExpr>,
}

impl CompositionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a composition
    ///
    /// Constituents must be boolean-valued constructs with well-formed
    /// arguments, and may only use compositions declared earlier, which
    /// rules out cycles.
    pub fn declare(&mut self, name: &str, expr: ComposedExpr) -> KindaResult<()> {
        if self.defs.contains_key(name) {
            return Err(KindaError::DuplicateComposition(name.to_string()));
        }
        self.check(&expr)?;
        debug!(name, decisions = expr.decision_count(&self.defs), "composition declared");
        self.defs.insert(name.to_string(), expr);
        Ok(())
    }

    fn check(&self, expr: &ComposedExpr) -> KindaResult<()> {
        match expr {
            ComposedExpr::Call { construct, args } => {
                if !construct.yields_bool() {
                    return Err(KindaError::InvalidArgument {
                        construct: *construct,
                        reason: "composed constituents must be boolean".into(),
                    });
                }
                args.validate_for(*construct)
            }
            ComposedExpr::Use(name) => {
                if self.defs.contains_key(name) {
                    Ok(())
                } else {
                    Err(KindaError::UnknownComposition(name.clone()))
                }
            }
            ComposedExpr::Not(inner) => self.check(inner),
            ComposedExpr::All(parts) | ComposedExpr::Any(parts) => {
                parts.iter().try_for_each(|p| self.check(p))
            }
            ComposedExpr::AtLeast(k, parts) => {
                if *k > parts.len() {
                    return Err(KindaError::InvalidConfig(format!(
                        "at-least {k} of {} constituents",
                        parts.len()
                    )));
                }
                parts.iter().try_for_each(|p| self.check(p))
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.defs.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.defs.keys().map(String::as_str)
    }

    fn get(&self, name: &str) -> KindaResult<&ComposedExpr> {
        self.defs
            .get(name)
            .ok_or_else(|| KindaError::UnknownComposition(name.to_string()))
    }

    /// Invoke a composition at `site`
    pub fn evaluate(&self, session: &mut RuntimeSession, name: &str, site: CallSiteId) -> KindaResult<bool> {
        let expr = self.get(name)?;
        let result = self.eval(expr, session, site)?;
        debug!(name, %site, result, "composition evaluated");
        Ok(result)
    }

    fn eval(&self, expr: &ComposedExpr, session: &mut RuntimeSession, site: CallSiteId) -> KindaResult<bool> {
        match expr {
            ComposedExpr::Call { construct, args } => {
                match session.evaluate(*construct, site, *args)? {
                    Outcome::Bool(b) => Ok(b),
                    other => Err(KindaError::InvalidArgument {
                        construct: *construct,
                        reason: format!("expected a boolean outcome, got {other:?}"),
                    }),
                }
            }
            ComposedExpr::Use(name) => self.eval(self.get(name)?, session, site),
            ComposedExpr::Not(inner) => Ok(!self.eval(inner, session, site.child(0))?),
            ComposedExpr::All(parts) => {
                let results = self.eval_parts(parts, session, site)?;
                Ok(results.iter().all(|&b| b))
            }
            ComposedExpr::Any(parts) => {
                let results = self.eval_parts(parts, session, site)?;
                Ok(results.iter().any(|&b| b))
            }
            ComposedExpr::AtLeast(k, parts) => {
                let results = self.eval_parts(parts, session, site)?;
                Ok(results.iter().filter(|&&b| b).count() >= *k)
            }
        }
    }

    fn eval_parts(
        &self,
        parts: &[ComposedExpr],
        session: &mut RuntimeSession,
        site: CallSiteId,
    ) -> KindaResult<Vec<bool>> {
        parts
            .iter()
            .enumerate()
            .map(|(i, part)| self.eval(part, session, site.child(i as u32)))
            .collect()
    }

    /// Analytic probability that a composition evaluates true
    ///
    /// Uses the session's current effective probabilities and treats
    /// constituents as independent. Exact when instability cannot move
    /// during the evaluation (zero volatility).
    pub fn predicted_probability(&self, session: &RuntimeSession, name: &str) -> KindaResult<f64> {
        self.predict(self.get(name)?, session)
    }

    fn predict(&self, expr: &ComposedExpr, session: &RuntimeSession) -> KindaResult<f64> {
        Ok(match expr {
            ComposedExpr::Call { construct, args } => leaf_probability(*construct, args, session),
            ComposedExpr::Use(name) => self.predict(self.get(name)?, session)?,
            ComposedExpr::Not(inner) => 1.0 - self.predict(inner, session)?,
            ComposedExpr::All(parts) => {
                let mut p = 1.0;
                for part in parts {
                    p *= self.predict(part, session)?;
                }
                p
            }
            ComposedExpr::Any(parts) => {
                let mut none = 1.0;
                for part in parts {
                    none *= 1.0 - self.predict(part, session)?;
                }
                1.0 - none
            }
            ComposedExpr::AtLeast(k, parts) => {
                // Poisson-binomial: dist[j] = P(exactly j true so far)
                let mut dist = vec![0.0; parts.len() + 1];
                dist[0] = 1.0;
                for (i, part) in parts.iter().enumerate() {
                    let p = self.predict(part, session)?;
                    for j in (0..=i + 1).rev() {
                        let stay = dist[j] * (1.0 - p);
                        let step = if j > 0 { dist[j - 1] * p } else { 0.0 };
                        dist[j] = stay + step;
                    }
                }
                dist[*k..].iter().sum()
            }
        })
    }
}

fn leaf_probability(construct: Construct, args: &ConstructArgs, session: &RuntimeSession) -> f64 {
    let p = session.effective_probability(construct);
    match *args {
        ConstructArgs::Condition(condition) => match construct {
            Construct::FuzzyBool => {
                if condition {
                    p
                } else {
                    1.0 - p
                }
            }
            _ if condition => p,
            _ => 0.0,
        },
        ConstructArgs::Compare { left, right, tolerance } => {
            let tolerance = tolerance.unwrap_or(session.personality().default_tolerance);
            ish_true_probability((left - right).abs(), tolerance, p)
        }
        _ => p,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declare_rejects_bad_definitions() {
        let mut reg = CompositionRegistry::new();
        reg.declare("both", ComposedExpr::All(vec![ComposedExpr::maybe(), ComposedExpr::maybe()]))
            .unwrap();

        assert!(matches!(
            reg.declare("both", ComposedExpr::maybe()),
            Err(KindaError::DuplicateComposition(_))
        ));
        assert!(matches!(
            reg.declare("numbers", ComposedExpr::call(Construct::FuzzyInt, ConstructArgs::Int(1))),
            Err(KindaError::InvalidArgument { .. })
        ));
        assert!(matches!(
            reg.declare("ghost", ComposedExpr::Use("nope".into())),
            Err(KindaError::UnknownComposition(_))
        ));
        assert!(matches!(
            reg.declare("greedy", ComposedExpr::AtLeast(3, vec![ComposedExpr::maybe()])),
            Err(KindaError::InvalidConfig(_))
        ));
        assert!(matches!(
            reg.declare("shape", ComposedExpr::call(Construct::Maybe, ConstructArgs::Unit)),
            Err(KindaError::ArgumentMismatch { .. })
        ));
    }

    #[test]
    fn test_decisions_per_invocation_fixed() {
        let mut reg = CompositionRegistry::new();
        reg.declare("pair", ComposedExpr::Any(vec![ComposedExpr::maybe(), ComposedExpr::sometimes()]))
            .unwrap();
        reg.declare(
            "nested",
            ComposedExpr::All(vec![ComposedExpr::Use("pair".into()), ComposedExpr::maybe().negate()]),
        )
        .unwrap();

        let mut s = RuntimeSession::seeded("chaotic", 9, 3).unwrap();
        for i in 0..20 {
            let before = s.next_seq();
            reg.evaluate(&mut s, "nested", CallSiteId::new(i)).unwrap();
            assert_eq!(s.next_seq() - before, 3);
        }
    }

    #[test]
    fn test_composition_records_and_replays() {
        let mut reg = CompositionRegistry::new();
        reg.declare("majority", ComposedExpr::AtLeast(2, vec![ComposedExpr::maybe(); 3]))
            .unwrap();

        let mut recorder = RuntimeSession::seeded("playful", 7, 21).unwrap();
        recorder.start_recording().unwrap();
        let live: Vec<bool> = (0..30)
            .map(|i| reg.evaluate(&mut recorder, "majority", CallSiteId::new(i)).unwrap())
            .collect();
        let log = recorder.stop_recording().unwrap();
        assert_eq!(log.len(), 90);

        let mut replay = RuntimeSession::start_replaying(log).unwrap();
        let replayed: Vec<bool> = (0..30)
            .map(|i| reg.evaluate(&mut replay, "majority", CallSiteId::new(i)).unwrap())
            .collect();
        replay.finish_replay().unwrap();
        assert_eq!(live, replayed);
    }

    #[test]
    fn test_predicted_probability_shapes() {
        let mut reg = CompositionRegistry::new();
        reg.declare("one", ComposedExpr::maybe()).unwrap();
        reg.declare("not_one", ComposedExpr::Use("one".into()).negate()).unwrap();
        reg.declare("two", ComposedExpr::All(vec![ComposedExpr::maybe(), ComposedExpr::maybe()]))
            .unwrap();
        reg.declare("either", ComposedExpr::Any(vec![ComposedExpr::maybe(), ComposedExpr::maybe()]))
            .unwrap();
        reg.declare("atleast1", ComposedExpr::AtLeast(1, vec![ComposedExpr::maybe(); 2]))
            .unwrap();
        reg.declare(
            "never",
            ComposedExpr::call(Construct::Maybe, ConstructArgs::Condition(false)),
        )
        .unwrap();

        let s = RuntimeSession::seeded("reliable", 1, 1).unwrap();
        let p = s.effective_probability(Construct::Maybe);
        let predict = |name| reg.predicted_probability(&s, name).unwrap();

        assert!((predict("one") - p).abs() < 1e-12);
        assert!((predict("not_one") - (1.0 - p)).abs() < 1e-12);
        assert!((predict("two") - p * p).abs() < 1e-12);
        assert!((predict("either") - (1.0 - (1.0 - p).powi(2))).abs() < 1e-12);
        assert!((predict("atleast1") - predict("either")).abs() < 1e-12);
        assert_eq!(predict("never"), 0.0);
    }
}
