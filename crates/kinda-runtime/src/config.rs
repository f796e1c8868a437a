//! Session configuration
//!
//! Loadable from JSON or from `KINDA_*` environment variables. Values are
//! validated when a session is built from them, never clamped.

use std::env;

use kinda_core::{ChaosLevel, KindaError, KindaResult, Personality};
use kinda_time::DriftConfig;
use serde::{Deserialize, Serialize};

/// Environment variable naming the personality
pub const ENV_PERSONALITY: &str = "KINDA_PERSONALITY";
/// Environment variable holding the chaos level
pub const ENV_CHAOS_LEVEL: &str = "KINDA_CHAOS_LEVEL";
/// Environment variable holding a fixed seed
pub const ENV_SEED: &str = "KINDA_SEED";
/// Environment variable enabling recording from the first decision
pub const ENV_RECORD: &str = "KINDA_RECORD";

/// Runtime session configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Personality name, resolved through the registry
    pub personality: String,
    /// Chaos level, 1..=10
    pub chaos_level: u8,
    /// Fixed seed; `None` picks one automatically
    pub seed: Option<u64>,
    /// Start recording immediately
    pub record: bool,
    /// Drift tuning for time-aware variables
    pub drift: DriftConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            personality: Personality::Playful.name().to_string(),
            chaos_level: ChaosLevel::default().get(),
            seed: None,
            record: false,
            drift: DriftConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Configuration for a named personality with default chaos
    pub fn new(personality: &str) -> Self {
        SessionConfig {
            personality: personality.to_string(),
            ..Self::default()
        }
    }

    /// Reliable personality at chaos 1 with a fixed seed
    pub fn deterministic(seed: u64) -> Self {
        SessionConfig {
            personality: Personality::Reliable.name().to_string(),
            chaos_level: ChaosLevel::MIN.get(),
            seed: Some(seed),
            ..Self::default()
        }
    }

    /// Chaotic personality at full chaos
    pub fn pandemonium() -> Self {
        SessionConfig {
            personality: Personality::Chaotic.name().to_string(),
            chaos_level: ChaosLevel::MAX.get(),
            ..Self::default()
        }
    }

    pub fn with_chaos_level(mut self, level: u8) -> Self {
        self.chaos_level = level;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_recording(mut self, record: bool) -> Self {
        self.record = record;
        self
    }

    pub fn with_drift(mut self, drift: DriftConfig) -> Self {
        self.drift = drift;
        self
    }

    /// Validated chaos level
    pub fn chaos(&self) -> KindaResult<ChaosLevel> {
        ChaosLevel::new(self.chaos_level)
    }

    /// Parse a JSON document; missing fields take their defaults
    pub fn from_json(json: &str) -> KindaResult<Self> {
        serde_json::from_str(json).map_err(|e| KindaError::InvalidConfig(e.to_string()))
    }

    pub fn to_json(&self) -> KindaResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| KindaError::InvalidConfig(e.to_string()))
    }

    /// Defaults overridden by any `KINDA_*` variables that are set
    pub fn from_env() -> KindaResult<Self> {
        Self::default().merge_env()
    }

    /// Override fields from `KINDA_*` variables that are set
    pub fn merge_env(mut self) -> KindaResult<Self> {
        if let Some(personality) = var(ENV_PERSONALITY) {
            self.personality = personality;
        }
        if let Some(raw) = var(ENV_CHAOS_LEVEL) {
            self.chaos_level = raw
                .parse()
                .map_err(|_| invalid(ENV_CHAOS_LEVEL, &raw))?;
        }
        if let Some(raw) = var(ENV_SEED) {
            self.seed = Some(raw.parse().map_err(|_| invalid(ENV_SEED, &raw))?);
        }
        if let Some(raw) = var(ENV_RECORD) {
            self.record = match raw.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => return Err(invalid(ENV_RECORD, &raw)),
            };
        }
        Ok(self)
    }
}

fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn invalid(name: &str, raw: &str) -> KindaError {
    KindaError::InvalidConfig(format!("{name}={raw:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for name in [ENV_PERSONALITY, ENV_CHAOS_LEVEL, ENV_SEED, ENV_RECORD] {
            env::remove_var(name);
        }
    }

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.personality, "playful");
        assert_eq!(config.chaos_level, 5);
        assert_eq!(config.seed, None);
        assert!(!config.record);
    }

    #[test]
    fn test_json_partial() {
        let config = SessionConfig::from_json(r#"{"personality":"chaotic","seed":42}"#).unwrap();
        assert_eq!(config.personality, "chaotic");
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.chaos_level, 5);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = SessionConfig::pandemonium().with_seed(7).with_recording(true);
        let json = config.to_json().unwrap();
        assert_eq!(SessionConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_bad_json_is_configuration_error() {
        let err = SessionConfig::from_json("{not json").unwrap_err();
        assert_eq!(err.class(), kinda_core::ErrorClass::Configuration);
    }

    #[test]
    fn test_out_of_range_chaos_not_clamped() {
        let config = SessionConfig::default().with_chaos_level(11);
        assert!(matches!(
            config.chaos(),
            Err(KindaError::ChaosLevelOutOfRange(11))
        ));
    }

    #[test]
    #[serial]
    fn test_from_env() {
        clear_env();
        env::set_var(ENV_PERSONALITY, "cautious");
        env::set_var(ENV_CHAOS_LEVEL, "8");
        env::set_var(ENV_SEED, "1234");
        env::set_var(ENV_RECORD, "true");

        let config = SessionConfig::from_env().unwrap();
        clear_env();

        assert_eq!(config.personality, "cautious");
        assert_eq!(config.chaos_level, 8);
        assert_eq!(config.seed, Some(1234));
        assert!(config.record);
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_garbage() {
        clear_env();
        env::set_var(ENV_CHAOS_LEVEL, "eleventy");
        let result = SessionConfig::from_env();
        clear_env();

        assert!(matches!(result, Err(KindaError::InvalidConfig(_))));
    }
}
