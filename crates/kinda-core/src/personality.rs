//! Personality profiles
//!
//! A personality decides how trustworthy every construct is before chaos and
//! instability are applied. The four built-in personalities form a closed set;
//! hosts can register additional profiles, which go through the same load-time
//! validation so an inconsistent table fails fast instead of silently skewing
//! probabilities.

use std::collections::BTreeMap;
use std::fmt;

use crate::{ChaosLevel, Construct, Instability, KindaError, KindaResult, MAX_ISH_VARIANCE};

/// Base probability of the nominal outcome for every construct
///
/// Lookup is an exhaustive match, so adding a construct without extending
/// the table does not compile.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProbabilityTable {
    pub maybe: f64,
    pub sometimes: f64,
    pub fuzzy_int: f64,
    pub fuzzy_float: f64,
    pub fuzzy_bool: f64,
    pub ish_comparison: f64,
    pub repeat: f64,
    pub sorta_while: f64,
    pub maybe_for: f64,
    pub eventually: f64,
    pub time_drift: f64,
    pub sorta_print: f64,
    pub kinda_binary: f64,
    pub ish_value: f64,
    pub fuzzy_reassign: f64,
    pub kinda_import: f64,
    pub maybe_import: f64,
}

impl ProbabilityTable {
    /// Reliable-mode baseline, the anchor every deviation is measured from
    pub const RELIABLE: ProbabilityTable = ProbabilityTable {
        maybe: 0.95,
        sometimes: 0.90,
        fuzzy_int: 0.90,
        fuzzy_float: 0.90,
        fuzzy_bool: 0.97,
        ish_comparison: 0.98,
        repeat: 0.90,
        sorta_while: 0.98,
        maybe_for: 0.95,
        eventually: 0.95,
        time_drift: 0.95,
        sorta_print: 0.95,
        kinda_binary: 0.90,
        ish_value: 0.90,
        fuzzy_reassign: 0.90,
        kinda_import: 0.98,
        maybe_import: 0.90,
    };

    pub const CAUTIOUS: ProbabilityTable = ProbabilityTable {
        maybe: 0.85,
        sometimes: 0.75,
        fuzzy_int: 0.75,
        fuzzy_float: 0.75,
        fuzzy_bool: 0.90,
        ish_comparison: 0.92,
        repeat: 0.70,
        sorta_while: 0.95,
        maybe_for: 0.85,
        eventually: 0.85,
        time_drift: 0.85,
        sorta_print: 0.85,
        kinda_binary: 0.80,
        ish_value: 0.75,
        fuzzy_reassign: 0.75,
        kinda_import: 0.92,
        maybe_import: 0.80,
    };

    pub const PLAYFUL: ProbabilityTable = ProbabilityTable {
        maybe: 0.70,
        sometimes: 0.60,
        fuzzy_int: 0.50,
        fuzzy_float: 0.50,
        fuzzy_bool: 0.80,
        ish_comparison: 0.85,
        repeat: 0.50,
        sorta_while: 0.90,
        maybe_for: 0.75,
        eventually: 0.70,
        time_drift: 0.70,
        sorta_print: 0.80,
        kinda_binary: 0.70,
        ish_value: 0.50,
        fuzzy_reassign: 0.50,
        kinda_import: 0.80,
        maybe_import: 0.65,
    };

    pub const CHAOTIC: ProbabilityTable = ProbabilityTable {
        maybe: 0.55,
        sometimes: 0.50,
        fuzzy_int: 0.30,
        fuzzy_float: 0.30,
        fuzzy_bool: 0.65,
        ish_comparison: 0.70,
        repeat: 0.30,
        sorta_while: 0.75,
        maybe_for: 0.60,
        eventually: 0.55,
        time_drift: 0.50,
        sorta_print: 0.60,
        kinda_binary: 0.55,
        ish_value: 0.30,
        fuzzy_reassign: 0.30,
        kinda_import: 0.65,
        maybe_import: 0.55,
    };

    pub fn get(&self, construct: Construct) -> f64 {
        match construct {
            Construct::Maybe => self.maybe,
            Construct::Sometimes => self.sometimes,
            Construct::FuzzyInt => self.fuzzy_int,
            Construct::FuzzyFloat => self.fuzzy_float,
            Construct::FuzzyBool => self.fuzzy_bool,
            Construct::IshComparison => self.ish_comparison,
            Construct::Repeat => self.repeat,
            Construct::SortaWhile => self.sorta_while,
            Construct::MaybeFor => self.maybe_for,
            Construct::Eventually => self.eventually,
            Construct::TimeDrift => self.time_drift,
            Construct::SortaPrint => self.sorta_print,
            Construct::KindaBinary => self.kinda_binary,
            Construct::IshValue => self.ish_value,
            Construct::FuzzyReassign => self.fuzzy_reassign,
            Construct::KindaImport => self.kinda_import,
            Construct::MaybeImport => self.maybe_import,
        }
    }
}

/// How a personality phrases fallbacks and shrugs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorStyle {
    Professional,
    Friendly,
    Snarky,
    Chaotic,
}

impl ErrorStyle {
    /// Message logged when a `~welp` fallback is taken
    pub fn fallback_message(self, fallback: &str) -> String {
        match self {
            ErrorStyle::Professional => {
                format!("Expression returned nothing, using fallback: {fallback}")
            }
            ErrorStyle::Friendly => format!("Got nothing there, trying fallback: {fallback}"),
            ErrorStyle::Snarky => format!("Well that was useless, falling back to: {fallback}"),
            ErrorStyle::Chaotic => format!("*shrugs* That didn't work, whatever: {fallback}"),
        }
    }

    /// Message logged when an import gate skips or a load fails
    pub fn import_message(self, module: &str, skipped: bool) -> String {
        match (self, skipped) {
            (ErrorStyle::Professional, true) => format!("Skipping import of '{module}'"),
            (ErrorStyle::Professional, false) => format!("Module '{module}' could not be loaded"),
            (ErrorStyle::Friendly, true) => format!("Not really feeling like importing '{module}' right now"),
            (ErrorStyle::Friendly, false) => format!("Couldn't find '{module}', that's okay though"),
            (ErrorStyle::Snarky, true) => format!("Nah, '{module}' can wait"),
            (ErrorStyle::Snarky, false) => format!("'{module}' doesn't exist, shocking"),
            (ErrorStyle::Chaotic, true) => format!("'{module}'? Maybe later!"),
            (ErrorStyle::Chaotic, false) => format!("'{module}' went poof!"),
        }
    }

    /// Lines printed when `~sorta print` decides not to
    pub fn shrugs(self) -> &'static [&'static str] {
        match self {
            ErrorStyle::Professional => &["[shrug] Output skipped", "[shrug] Deferred"],
            ErrorStyle::Friendly => &["[shrug] Maybe later?", "[shrug] Not feeling it right now"],
            ErrorStyle::Snarky => &["[shrug] Meh...", "[shrug] Kinda busy"],
            ErrorStyle::Chaotic => &[
                "[shrug] *waves hand dismissively*",
                "[shrug] Nope",
                "[shrug] Ask again never",
            ],
        }
    }
}

/// A full personality profile
#[derive(Clone, Debug, PartialEq)]
pub struct PersonalityProfile {
    /// Registry key
    pub name: String,
    /// Base probabilities
    pub table: ProbabilityTable,
    /// How strongly instability pushes probabilities down (0..=1)
    pub volatility: f64,
    /// Fraction of the way toward the chaotic extreme reached at chaos 10 (0..=1)
    pub chaos_amplifier: f64,
    /// Largest integer offset at chaos 1
    pub int_fuzz_radius: i64,
    /// Float noise as a fraction of magnitude, when noise misfires
    pub float_noise: f64,
    /// Repeat-count spread as a fraction of n
    pub repeat_spread: f64,
    /// Absolute tolerance when `~ish` gets none
    pub default_tolerance: f64,
    /// Absolute variance when `v~ish` gets none
    pub ish_variance: f64,
    /// Drift per unit of age/use, as a fraction of magnitude
    pub drift_rate: f64,
    /// Message style
    pub style: ErrorStyle,
}

impl PersonalityProfile {
    /// Base probability for `construct`
    #[inline]
    pub fn base(&self, construct: Construct) -> f64 {
        self.table.get(construct)
    }

    /// Effective probability of the nominal outcome
    ///
    /// `p = base - (base - target) * amplifier * intensity(level)`, then
    /// instability subtracts `volatility * instability * INSTABILITY_STEP`
    /// and the result is clamped into [0, 1].
    pub fn effective_probability(
        &self,
        construct: Construct,
        level: ChaosLevel,
        instability: &Instability,
    ) -> f64 {
        let reliable = ProbabilityTable::RELIABLE.get(construct);
        let target = construct.chaos_target().probability(reliable);
        let base = self.base(construct);

        let chaotic = base - (base - target) * self.chaos_amplifier * level.intensity();
        let shift = self.volatility * instability.level() as f64 * Instability::STEP;

        (chaotic - shift).clamp(0.0, 1.0)
    }

    /// Check the profile's internal consistency
    ///
    /// Every base probability must sit between its construct's chaotic
    /// target and the reliable baseline, so that chaos always moves away
    /// from reliable behavior.
    pub fn validate(&self) -> KindaResult<()> {
        let invalid = |reason: String| KindaError::InvalidProfile {
            profile: self.name.clone(),
            reason,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("empty name".into()));
        }
        for (what, v) in [
            ("volatility", self.volatility),
            ("chaos_amplifier", self.chaos_amplifier),
            ("float_noise", self.float_noise),
            ("repeat_spread", self.repeat_spread),
            ("drift_rate", self.drift_rate),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(invalid(format!("{what} {v} outside [0, 1]")));
            }
        }
        if self.int_fuzz_radius < 0 {
            return Err(invalid("int_fuzz_radius must be >= 0".into()));
        }
        for (what, v) in [
            ("default_tolerance", self.default_tolerance),
            ("ish_variance", self.ish_variance),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(invalid(format!("{what} must be finite and >= 0")));
            }
        }
        if self.ish_variance > MAX_ISH_VARIANCE {
            return Err(invalid(format!("ish_variance {} too large", self.ish_variance)));
        }

        for construct in Construct::ALL {
            let reliable = ProbabilityTable::RELIABLE.get(construct);
            let target = construct.chaos_target().probability(reliable);
            let base = self.base(construct);
            if !(target..=reliable).contains(&base) {
                return Err(invalid(format!(
                    "{construct} base {base} outside [{target}, {reliable}]"
                )));
            }
        }
        Ok(())
    }
}

/// Built-in personalities
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Personality {
    Reliable,
    Cautious,
    Playful,
    Chaotic,
}

impl Personality {
    pub const ALL: [Personality; 4] = [
        Personality::Reliable,
        Personality::Cautious,
        Personality::Playful,
        Personality::Chaotic,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Personality::Reliable => "reliable",
            Personality::Cautious => "cautious",
            Personality::Playful => "playful",
            Personality::Chaotic => "chaotic",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.name() == name)
    }

    /// Full profile for this personality
    pub fn profile(self) -> PersonalityProfile {
        match self {
            Personality::Reliable => PersonalityProfile {
                name: self.name().into(),
                table: ProbabilityTable::RELIABLE,
                volatility: 0.0,
                chaos_amplifier: 0.2,
                int_fuzz_radius: 1,
                float_noise: 0.001,
                repeat_spread: 0.1,
                default_tolerance: 0.5,
                ish_variance: 0.5,
                drift_rate: 0.001,
                style: ErrorStyle::Professional,
            },
            Personality::Cautious => PersonalityProfile {
                name: self.name().into(),
                table: ProbabilityTable::CAUTIOUS,
                volatility: 0.05,
                chaos_amplifier: 0.4,
                int_fuzz_radius: 1,
                float_noise: 0.005,
                repeat_spread: 0.2,
                default_tolerance: 1.0,
                ish_variance: 1.0,
                drift_rate: 0.005,
                style: ErrorStyle::Friendly,
            },
            Personality::Playful => PersonalityProfile {
                name: self.name().into(),
                table: ProbabilityTable::PLAYFUL,
                volatility: 0.1,
                chaos_amplifier: 0.7,
                int_fuzz_radius: 2,
                float_noise: 0.02,
                repeat_spread: 0.3,
                default_tolerance: 2.0,
                ish_variance: 2.0,
                drift_rate: 0.02,
                style: ErrorStyle::Snarky,
            },
            Personality::Chaotic => PersonalityProfile {
                name: self.name().into(),
                table: ProbabilityTable::CHAOTIC,
                volatility: 0.2,
                chaos_amplifier: 1.0,
                int_fuzz_radius: 3,
                float_noise: 0.05,
                repeat_spread: 0.5,
                default_tolerance: 5.0,
                ish_variance: 5.0,
                drift_rate: 0.05,
                style: ErrorStyle::Chaotic,
            },
        }
    }
}

impl fmt::Display for Personality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Registry of named personality profiles
#[derive(Clone, Debug)]
pub struct PersonalityRegistry {
    profiles: BTreeMap<String, PersonalityProfile>,
}

impl PersonalityRegistry {
    /// Registry holding the four built-in personalities
    pub fn new() -> Self {
        let profiles = Personality::ALL
            .iter()
            .map(|p| (p.name().to_string(), p.profile()))
            .collect();
        PersonalityRegistry { profiles }
    }

    /// Register a custom profile after validating it
    pub fn register(&mut self, profile: PersonalityProfile) -> KindaResult<()> {
        profile.validate()?;
        if self.profiles.contains_key(&profile.name) {
            return Err(KindaError::DuplicatePersonality(profile.name));
        }
        self.profiles.insert(profile.name.clone(), profile);
        Ok(())
    }

    /// Look up a profile by name
    pub fn get(&self, name: &str) -> KindaResult<&PersonalityProfile> {
        self.profiles
            .get(name)
            .ok_or_else(|| KindaError::UnknownPersonality(name.to_string()))
    }

    /// Registered names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    /// Effective probability from raw configuration values
    pub fn effective_probability(
        &self,
        construct: Construct,
        personality: &str,
        chaos_level: u8,
        instability: &Instability,
    ) -> KindaResult<f64> {
        let profile = self.get(personality)?;
        let level = ChaosLevel::new(chaos_level)?;
        Ok(profile.effective_probability(construct, level, instability))
    }
}

impl Default for PersonalityRegistry {
    fn default() -> Self {
        Self::new()
    }
}
