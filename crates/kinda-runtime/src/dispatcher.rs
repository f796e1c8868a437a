//! Construct dispatcher - the single entry point for every call site

use kinda_core::{CallSiteId, Construct, ConstructArgs, Decision, KindaResult, Outcome};
use tracing::{debug, warn};

use crate::semantics::{self, SampleParams};
use crate::session::Mode;
use crate::RuntimeSession;

impl RuntimeSession {
    /// Evaluate one construct invocation
    ///
    /// Live sessions sample the outcome from the session stream; replaying
    /// sessions hand back the recorded outcome verbatim. Either way the
    /// instability counter is updated and the decision gets the next
    /// sequence number. Well-formed arguments never fail in a live session.
    pub fn evaluate(
        &mut self,
        construct: Construct,
        site: CallSiteId,
        args: ConstructArgs,
    ) -> KindaResult<Outcome> {
        args.validate_for(construct)?;
        let seq = self.seq;

        // Stage 1: Resolve probability and outcome
        let (probability, outcome) = match &mut self.mode {
            Mode::Replaying(cursor) => match cursor.advance(seq, site, construct) {
                Ok(recorded) => (recorded.probability, recorded.outcome),
                Err(err) => {
                    warn!(seq, %site, %construct, error = %err, "replay diverged");
                    return Err(err);
                }
            },
            Mode::Live | Mode::Recording(_) => {
                let probability = self
                    .profile
                    .effective_probability(construct, self.chaos, &self.instability);
                let params = SampleParams {
                    probability,
                    profile: &self.profile,
                    chaos: self.chaos,
                    drift: &self.drift,
                };
                let outcome = semantics::sample(construct, &args, &params, &mut self.rng);
                (probability, outcome)
            }
        };

        // Stage 2: Update instability
        let luck = semantics::luck(construct, &args, &outcome, &self.profile);
        self.instability.record(luck);
        self.stats.record(luck);
        self.seq += 1;

        debug!(
            seq,
            %site,
            %construct,
            probability,
            ?outcome,
            ?luck,
            instability = self.instability.level(),
            "decision"
        );

        // Stage 3: Record
        if let Mode::Recording(log) = &mut self.mode {
            log.push(Decision {
                seq,
                site,
                construct,
                probability,
                outcome,
            });
        }

        Ok(outcome)
    }

    /// Evaluate by transpiler-emitted construct name
    pub fn evaluate_named(
        &mut self,
        name: &str,
        site: CallSiteId,
        args: ConstructArgs,
    ) -> KindaResult<Outcome> {
        let construct = Construct::from_name(name).ok_or_else(|| {
            kinda_core::KindaError::InvalidConfig(format!("unknown construct {name:?}"))
        })?;
        self.evaluate(construct, site, args)
    }
}
