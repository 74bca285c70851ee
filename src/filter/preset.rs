//! Comparison presets and their string aliases.

use crate::error::QueryError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// The family of values a preset compares against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PresetKind {
    Generic,
    Numeric,
    Datetime,
    String,
    List,
}

/// A comparison operator applied to a property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    EqualTo,
    NotEqualTo,
    AnyIn,
    NotAnyIn,
    GreaterThan,
    GreaterThanOrEqualTo,
    LessThan,
    LessThanOrEqualTo,
    OlderThan,
    OlderThanOrEqualTo,
    YoungerThan,
    YoungerThanOrEqualTo,
    MatchesRegex,
    NotMatchesRegex,
    Contains,
    NotContains,
}

impl Preset {
    pub const ALL: [Preset; 16] = [
        Preset::EqualTo,
        Preset::NotEqualTo,
        Preset::AnyIn,
        Preset::NotAnyIn,
        Preset::GreaterThan,
        Preset::GreaterThanOrEqualTo,
        Preset::LessThan,
        Preset::LessThanOrEqualTo,
        Preset::OlderThan,
        Preset::OlderThanOrEqualTo,
        Preset::YoungerThan,
        Preset::YoungerThanOrEqualTo,
        Preset::MatchesRegex,
        Preset::NotMatchesRegex,
        Preset::Contains,
        Preset::NotContains,
    ];

    /// Canonical snake_case name
    pub fn name(self) -> &'static str {
        match self {
            Preset::EqualTo => "equal_to",
            Preset::NotEqualTo => "not_equal_to",
            Preset::AnyIn => "any_in",
            Preset::NotAnyIn => "not_any_in",
            Preset::GreaterThan => "greater_than",
            Preset::GreaterThanOrEqualTo => "greater_than_or_equal_to",
            Preset::LessThan => "less_than",
            Preset::LessThanOrEqualTo => "less_than_or_equal_to",
            Preset::OlderThan => "older_than",
            Preset::OlderThanOrEqualTo => "older_than_or_equal_to",
            Preset::YoungerThan => "younger_than",
            Preset::YoungerThanOrEqualTo => "younger_than_or_equal_to",
            Preset::MatchesRegex => "matches_regex",
            Preset::NotMatchesRegex => "not_matches_regex",
            Preset::Contains => "contains",
            Preset::NotContains => "not_contains",
        }
    }

    pub fn kind(self) -> PresetKind {
        match self {
            Preset::EqualTo | Preset::NotEqualTo | Preset::AnyIn | Preset::NotAnyIn => {
                PresetKind::Generic
            }
            Preset::GreaterThan
            | Preset::GreaterThanOrEqualTo
            | Preset::LessThan
            | Preset::LessThanOrEqualTo => PresetKind::Numeric,
            Preset::OlderThan
            | Preset::OlderThanOrEqualTo
            | Preset::YoungerThan
            | Preset::YoungerThanOrEqualTo => PresetKind::Datetime,
            Preset::MatchesRegex | Preset::NotMatchesRegex => PresetKind::String,
            Preset::Contains | Preset::NotContains => PresetKind::List,
        }
    }

    /// Presets taking a `{days, hours, minutes, seconds}` offset from now
    pub fn is_relative_time(self) -> bool {
        self.kind() == PresetKind::Datetime
    }

    /// Presets whose remote form is one group per listed value
    pub fn fans_out(self) -> bool {
        self == Preset::AnyIn
    }

    /// Extra spellings accepted on input, besides the canonical name
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Preset::EqualTo => &["equal", "=="],
            Preset::NotEqualTo => &["not_equal", "!="],
            Preset::AnyIn => &["in"],
            Preset::NotAnyIn => &["not_in"],
            Preset::GreaterThan => &["greater", "more_than", "more", ">"],
            Preset::GreaterThanOrEqualTo => &[
                "greater_or_equal",
                "more_than_or_equal_to",
                "more_or_equal",
                ">=",
            ],
            Preset::LessThan => &["less", "<"],
            Preset::LessThanOrEqualTo => &["less_or_equal", "<="],
            Preset::OlderThan => &["older"],
            Preset::OlderThanOrEqualTo => &["older_or_equal"],
            Preset::YoungerThan => &["younger", "newer_than", "newer"],
            Preset::YoungerThanOrEqualTo => &[
                "younger_or_equal",
                "newer_than_or_equal_to",
                "newer_or_equal",
            ],
            Preset::MatchesRegex => &["match_regex", "regex", "re"],
            Preset::NotMatchesRegex => &["not_match_regex", "not_regex"],
            Preset::Contains => &["list_contains", "has"],
            Preset::NotContains => &["list_not_contains", "has_not"],
        }
    }

    /// Look up a preset by canonical name or alias (case-insensitive)
    pub fn from_alias(alias: &str) -> Result<Self, QueryError> {
        alias_table()
            .get(&normalize_alias(alias))
            .copied()
            .ok_or_else(|| QueryError::UnknownPreset(alias.to_string()))
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_alias(s)
    }
}

/// Lowercase, trim, and fold spaces and dashes to underscores
pub fn normalize_alias(alias: &str) -> String {
    alias
        .trim()
        .to_lowercase()
        .replace([' ', '-'], "_")
}

static ALIASES: OnceLock<HashMap<String, Preset>> = OnceLock::new();

fn alias_table() -> &'static HashMap<String, Preset> {
    ALIASES.get_or_init(|| {
        let mut table = HashMap::new();
        for preset in Preset::ALL {
            table.insert(preset.name().to_string(), preset);
            for alias in preset.aliases() {
                table.insert(normalize_alias(alias), preset);
            }
        }
        table
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_names_round_trip() {
        for preset in Preset::ALL {
            assert_eq!(Preset::from_alias(preset.name()).unwrap(), preset);
        }
    }

    #[test]
    fn test_aliases_are_case_insensitive() {
        assert_eq!(Preset::from_alias("EQUAL").unwrap(), Preset::EqualTo);
        assert_eq!(Preset::from_alias("Newer").unwrap(), Preset::YoungerThan);
        assert_eq!(Preset::from_alias(" in ").unwrap(), Preset::AnyIn);
        assert_eq!(Preset::from_alias(">=").unwrap(), Preset::GreaterThanOrEqualTo);
        assert_eq!(Preset::from_alias("Matches-Regex").unwrap(), Preset::MatchesRegex);
    }

    #[test]
    fn test_unknown_alias_is_error() {
        let err = Preset::from_alias("roughly").unwrap_err();
        assert!(matches!(err, QueryError::UnknownPreset(ref s) if s == "roughly"));
    }

    #[test]
    fn test_no_alias_is_shared() {
        let mut seen = HashMap::new();
        for preset in Preset::ALL {
            for alias in preset.aliases().iter().chain([preset.name()].iter()) {
                let previous = seen.insert(normalize_alias(alias), preset);
                assert!(previous.is_none(), "alias '{}' used twice", alias);
            }
        }
    }

    #[test]
    fn test_kinds() {
        assert_eq!(Preset::AnyIn.kind(), PresetKind::Generic);
        assert_eq!(Preset::LessThan.kind(), PresetKind::Numeric);
        assert!(Preset::OlderThanOrEqualTo.is_relative_time());
        assert!(!Preset::MatchesRegex.is_relative_time());
        assert!(Preset::AnyIn.fans_out());
        assert!(!Preset::NotAnyIn.fans_out());
    }
}
