//! Error types for the kinda runtime

use thiserror::Error;

use crate::{CallSiteId, Construct};

/// Coarse error taxonomy surfaced to hosting layers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Invalid session, profile, argument or assertion parameters
    Configuration,
    /// Live program no longer matches a recorded log
    ReplayDivergence,
    /// Statistical assertion asked to run with an empty budget
    AssertionBudget,
    /// Record log could not be encoded, decoded or transferred
    Format,
}

/// Core kinda errors
#[derive(Error, Debug)]
pub enum KindaError {
    // Configuration errors
    #[error("Unknown personality: {0}")]
    UnknownPersonality(String),

    #[error("Chaos level {0} outside 1..=10")]
    ChaosLevelOutOfRange(u8),

    #[error("Invalid probability for {what}: {value}")]
    InvalidProbability { what: &'static str, value: f64 },

    #[error("Confidence {0} outside (0, 1)")]
    InvalidConfidence(f64),

    #[error("Construct {construct} expects {expected} arguments, got {actual}")]
    ArgumentMismatch {
        construct: Construct,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Invalid argument for {construct}: {reason}")]
    InvalidArgument {
        construct: Construct,
        reason: String,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid personality profile {profile}: {reason}")]
    InvalidProfile { profile: String, reason: String },

    #[error("Personality already registered: {0}")]
    DuplicatePersonality(String),

    #[error("Composed construct already declared: {0}")]
    DuplicateComposition(String),

    #[error("Unknown composed construct: {0}")]
    UnknownComposition(String),

    // Replay errors
    #[error("Replay diverged at seq {seq} (site {site}): expected {expected}, got {actual}")]
    ReplayDivergence {
        seq: u64,
        site: CallSiteId,
        expected: Construct,
        actual: Construct,
    },

    #[error("Replay diverged at seq {seq} ({construct}): expected site {expected}, got {actual}")]
    ReplaySiteMismatch {
        seq: u64,
        construct: Construct,
        expected: CallSiteId,
        actual: CallSiteId,
    },

    #[error("Replay log exhausted at seq {seq}: program called {construct} at site {site}")]
    ReplayExhausted {
        seq: u64,
        site: CallSiteId,
        construct: Construct,
    },

    #[error("Replay ended early: consumed {consumed} of {recorded} recorded decisions")]
    ReplayIncomplete { consumed: u64, recorded: u64 },

    #[error("Session is replaying; recording cannot start")]
    ReplayActive,

    // Assertion errors
    #[error("Assertion budget must allow at least one trial")]
    AssertionBudget,

    // Format errors
    #[error("Invalid log format: {0}")]
    InvalidLogFormat(String),

    #[error("Buffer too short: expected {expected}, got {actual}")]
    BufferTooShort { expected: usize, actual: usize },

    #[error("Unknown construct tag: {0}")]
    UnknownConstructTag(u8),

    #[error("Unknown outcome tag: {0}")]
    UnknownOutcomeTag(u8),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl KindaError {
    /// Map this error to its taxonomy class
    pub fn class(&self) -> ErrorClass {
        match self {
            KindaError::UnknownPersonality(_)
            | KindaError::ChaosLevelOutOfRange(_)
            | KindaError::InvalidProbability { .. }
            | KindaError::InvalidConfidence(_)
            | KindaError::ArgumentMismatch { .. }
            | KindaError::InvalidArgument { .. }
            | KindaError::InvalidConfig(_)
            | KindaError::InvalidProfile { .. }
            | KindaError::DuplicatePersonality(_)
            | KindaError::DuplicateComposition(_)
            | KindaError::UnknownComposition(_)
            | KindaError::ReplayActive => ErrorClass::Configuration,

            KindaError::ReplayDivergence { .. }
            | KindaError::ReplaySiteMismatch { .. }
            | KindaError::ReplayExhausted { .. }
            | KindaError::ReplayIncomplete { .. } => ErrorClass::ReplayDivergence,

            KindaError::AssertionBudget => ErrorClass::AssertionBudget,

            KindaError::InvalidLogFormat(_)
            | KindaError::BufferTooShort { .. }
            | KindaError::UnknownConstructTag(_)
            | KindaError::UnknownOutcomeTag(_)
            | KindaError::Io(_) => ErrorClass::Format,
        }
    }

    /// True for any replay divergence
    pub fn is_divergence(&self) -> bool {
        self.class() == ErrorClass::ReplayDivergence
    }
}

/// Result type for kinda operations
pub type KindaResult<T> = Result<T, KindaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        assert_eq!(
            KindaError::UnknownPersonality("grumpy".into()).class(),
            ErrorClass::Configuration
        );
        assert_eq!(
            KindaError::ChaosLevelOutOfRange(11).class(),
            ErrorClass::Configuration
        );
        assert_eq!(KindaError::AssertionBudget.class(), ErrorClass::AssertionBudget);

        let divergence = KindaError::ReplayDivergence {
            seq: 3,
            site: CallSiteId::new(7),
            expected: Construct::Maybe,
            actual: Construct::Sometimes,
        };
        assert!(divergence.is_divergence());
    }

    #[test]
    fn test_divergence_message_names_site_and_constructs() {
        let err = KindaError::ReplayDivergence {
            seq: 12,
            site: CallSiteId::new(0xABCD),
            expected: Construct::Maybe,
            actual: Construct::FuzzyInt,
        };
        let msg = err.to_string();
        assert!(msg.contains("seq 12"));
        assert!(msg.contains("000000000000abcd"));
        assert!(msg.contains("maybe"));
        assert!(msg.contains("kinda_int"));
    }
}
