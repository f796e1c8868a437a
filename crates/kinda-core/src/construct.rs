//! Construct definitions
//!
//! Every probabilistic primitive of the language is a `Construct`. Each one
//! has a stable name (what the transpiler emits), a stable wire tag (what the
//! record log stores), an argument shape and a chaos target describing where
//! its probability heads as chaos rises.

use std::fmt;

/// A probabilistic language primitive
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Construct {
    /// `~maybe (cond)` - conditional, usually taken
    Maybe = 0x01,
    /// `~sometimes (cond)` - conditional, taken less often
    Sometimes = 0x02,
    /// `~kinda int x = v` - integer with bounded noise on every read
    FuzzyInt = 0x03,
    /// `~kinda float x = v` - float with relative noise on every read
    FuzzyFloat = 0x04,
    /// `~kinda bool x = v` - boolean that occasionally flips
    FuzzyBool = 0x05,
    /// `a ~ish b` - tolerance comparison with a fuzzy boundary
    IshComparison = 0x06,
    /// `~kinda_repeat (n)` - repeat roughly n times
    Repeat = 0x07,
    /// `~sorta_while (cond)` - loop that may bail out early
    SortaWhile = 0x08,
    /// `~maybe_for x in xs` - loop that may skip items
    MaybeFor = 0x09,
    /// `~eventually (cond)` - delayed assertion
    Eventually = 0x0A,
    /// `~time drift float x = v` - value drifting with age and use
    TimeDrift = 0x0B,
    /// `~sorta print (...)` - print that sometimes shrugs instead
    SortaPrint = 0x0C,
    /// `~kinda binary x` - three-state choice
    KindaBinary = 0x0D,
    /// `v~ish` - value with variance
    IshValue = 0x0E,
    /// `x ~= expr` - fuzzy reassignment
    FuzzyReassign = 0x0F,
    /// `~kinda import m` - load that is usually attempted
    KindaImport = 0x10,
    /// `~maybe import m ~welp f` - load that may be skipped for a fallback
    MaybeImport = 0x11,
}

impl Construct {
    /// Every construct, in wire-tag order
    pub const ALL: [Construct; 17] = [
        Construct::Maybe,
        Construct::Sometimes,
        Construct::FuzzyInt,
        Construct::FuzzyFloat,
        Construct::FuzzyBool,
        Construct::IshComparison,
        Construct::Repeat,
        Construct::SortaWhile,
        Construct::MaybeFor,
        Construct::Eventually,
        Construct::TimeDrift,
        Construct::SortaPrint,
        Construct::KindaBinary,
        Construct::IshValue,
        Construct::FuzzyReassign,
        Construct::KindaImport,
        Construct::MaybeImport,
    ];

    /// Parse from wire byte
    pub fn from_byte(b: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.to_byte() == b)
    }

    /// Convert to wire byte
    #[inline]
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Stable name used at the transpiler boundary
    pub fn name(self) -> &'static str {
        match self {
            Construct::Maybe => "maybe",
            Construct::Sometimes => "sometimes",
            Construct::FuzzyInt => "kinda_int",
            Construct::FuzzyFloat => "kinda_float",
            Construct::FuzzyBool => "kinda_bool",
            Construct::IshComparison => "ish_comparison",
            Construct::Repeat => "kinda_repeat",
            Construct::SortaWhile => "sorta_while",
            Construct::MaybeFor => "maybe_for",
            Construct::Eventually => "eventually",
            Construct::TimeDrift => "time_drift",
            Construct::SortaPrint => "sorta_print",
            Construct::KindaBinary => "kinda_binary",
            Construct::IshValue => "ish_value",
            Construct::FuzzyReassign => "fuzzy_reassign",
            Construct::KindaImport => "kinda_import",
            Construct::MaybeImport => "maybe_import",
        }
    }

    /// Resolve a transpiler-emitted name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.name() == name)
    }

    /// Argument shape the dispatcher expects for this construct
    pub fn arg_shape(self) -> ArgShape {
        match self {
            Construct::Maybe
            | Construct::Sometimes
            | Construct::SortaWhile
            | Construct::Eventually
            | Construct::FuzzyBool => ArgShape::Condition,
            Construct::MaybeFor
            | Construct::SortaPrint
            | Construct::KindaImport
            | Construct::MaybeImport => ArgShape::Unit,
            Construct::FuzzyInt | Construct::FuzzyReassign => ArgShape::Int,
            Construct::FuzzyFloat => ArgShape::Float,
            Construct::IshValue => ArgShape::IshValue,
            Construct::IshComparison => ArgShape::Compare,
            Construct::Repeat => ArgShape::Count,
            Construct::TimeDrift => ArgShape::Drift,
            Construct::KindaBinary => ArgShape::Binary,
        }
    }

    /// Where the effective probability heads as chaos rises
    pub fn chaos_target(self) -> ChaosTarget {
        match self {
            Construct::Maybe
            | Construct::Sometimes
            | Construct::SortaWhile
            | Construct::MaybeFor
            | Construct::Eventually
            | Construct::SortaPrint
            | Construct::KindaBinary
            | Construct::KindaImport
            | Construct::MaybeImport => ChaosTarget::Entropy,
            Construct::FuzzyInt
            | Construct::FuzzyFloat
            | Construct::FuzzyBool
            | Construct::IshComparison
            | Construct::Repeat
            | Construct::TimeDrift
            | Construct::IshValue
            | Construct::FuzzyReassign => ChaosTarget::Inversion,
        }
    }

    /// Constructs whose outcome is computed, not sampled
    ///
    /// They still produce decisions (so replay pins their value) but never
    /// consume the PRNG stream.
    pub fn is_deterministic(self) -> bool {
        matches!(self, Construct::TimeDrift)
    }

    /// Constructs whose outcome is a plain boolean
    pub fn yields_bool(self) -> bool {
        matches!(
            self,
            Construct::Maybe
                | Construct::Sometimes
                | Construct::FuzzyBool
                | Construct::IshComparison
                | Construct::SortaWhile
                | Construct::MaybeFor
                | Construct::Eventually
                | Construct::SortaPrint
                | Construct::KindaImport
                | Construct::MaybeImport
        )
    }
}

impl fmt::Display for Construct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Shape of the static arguments a construct accepts
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArgShape {
    Unit,
    Condition,
    Int,
    Float,
    IshValue,
    Compare,
    Count,
    Drift,
    Binary,
}

impl ArgShape {
    pub fn name(self) -> &'static str {
        match self {
            ArgShape::Unit => "unit",
            ArgShape::Condition => "condition",
            ArgShape::Int => "int",
            ArgShape::Float => "float",
            ArgShape::IshValue => "ish-value",
            ArgShape::Compare => "compare",
            ArgShape::Count => "count",
            ArgShape::Drift => "drift",
            ArgShape::Binary => "binary",
        }
    }
}

/// The chaotic extreme of a construct
///
/// Entropy constructs become coin flips at full chaos; inversion constructs
/// flip toward the opposite of their reliable behavior.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChaosTarget {
    Entropy,
    Inversion,
}

impl ChaosTarget {
    /// Probability of the nominal outcome at the chaotic extreme, given the
    /// reliable baseline
    #[inline]
    pub fn probability(self, reliable_baseline: f64) -> f64 {
        match self {
            ChaosTarget::Entropy => 0.5,
            ChaosTarget::Inversion => 1.0 - reliable_baseline,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_roundtrip_all() {
        for c in Construct::ALL {
            assert_eq!(Construct::from_byte(c.to_byte()), Some(c));
        }
        assert_eq!(Construct::from_byte(0x00), None);
        assert_eq!(Construct::from_byte(0x12), None);
        assert_eq!(Construct::from_byte(0xFF), None);
    }

    #[test]
    fn test_names_unique_and_resolvable() {
        for c in Construct::ALL {
            assert_eq!(Construct::from_name(c.name()), Some(c));
        }
        assert_eq!(Construct::from_name("definitely"), None);
    }

    #[test]
    fn test_import_gates_take_no_arguments() {
        for c in [Construct::KindaImport, Construct::MaybeImport] {
            assert_eq!(c.arg_shape(), ArgShape::Unit);
            assert_eq!(c.chaos_target(), ChaosTarget::Entropy);
            assert!(c.yields_bool());
        }
        assert_eq!(Construct::from_name("maybe_import"), Some(Construct::MaybeImport));
    }

    #[test]
    fn test_chaos_targets() {
        assert_eq!(ChaosTarget::Entropy.probability(0.95), 0.5);
        let inv = ChaosTarget::Inversion.probability(0.9);
        assert!((inv - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_only_drift_is_deterministic() {
        let deterministic: Vec<_> = Construct::ALL
            .iter()
            .filter(|c| c.is_deterministic())
            .collect();
        assert_eq!(deterministic, vec![&Construct::TimeDrift]);
    }
}
