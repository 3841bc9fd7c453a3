use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// A level of the cost-library hierarchy.
///
/// Each level is one step deeper and more specific than its parent. The
/// discriminant is the level number used on the wire and in codes: a code at
/// level `n` has exactly `n` two-digit groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Level {
    /// Top level, e.g. `02`.
    Division = 1,
    /// e.g. `02.10`
    Section = 2,
    /// e.g. `02.10.10`
    Assembly = 3,
    /// Terminal level, e.g. `02.10.10.01`.
    Item = 4,
}

impl Level {
    /// All levels, outermost first.
    pub const ALL: [Self; 4] = [Self::Division, Self::Section, Self::Assembly, Self::Item];

    /// Number of two-digit groups in a code at this level.
    #[must_use]
    pub const fn depth(self) -> usize {
        self as usize
    }

    /// Increment between consecutive sibling numbers.
    ///
    /// Sections and assemblies are numbered in tens to leave room for manual
    /// insertions.
    #[must_use]
    pub const fn step(self) -> u8 {
        match self {
            Self::Division | Self::Item => 1,
            Self::Section | Self::Assembly => 10,
        }
    }

    /// The enclosing level, if any.
    #[must_use]
    pub const fn parent(self) -> Option<Self> {
        match self {
            Self::Division => None,
            Self::Section => Some(Self::Division),
            Self::Assembly => Some(Self::Section),
            Self::Item => Some(Self::Assembly),
        }
    }

    /// The nested level, if any.
    #[must_use]
    pub const fn child(self) -> Option<Self> {
        match self {
            Self::Division => Some(Self::Section),
            Self::Section => Some(Self::Assembly),
            Self::Assembly => Some(Self::Item),
            Self::Item => None,
        }
    }

    /// Lowercase singular name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Division => "division",
            Self::Section => "section",
            Self::Assembly => "assembly",
            Self::Item => "item",
        }
    }

    /// Lowercase plural name. Doubles as the storage table and the API path.
    #[must_use]
    pub const fn plural(self) -> &'static str {
        match self {
            Self::Division => "divisions",
            Self::Section => "sections",
            Self::Assembly => "assemblies",
            Self::Item => "items",
        }
    }

    /// Name of the storage table holding rows of this level.
    #[must_use]
    pub const fn table(self) -> &'static str {
        self.plural()
    }

    /// Foreign key column pointing at the parent table.
    #[must_use]
    pub const fn parent_column(self) -> Option<&'static str> {
        match self {
            Self::Division => None,
            Self::Section => Some("division_id"),
            Self::Assembly => Some("section_id"),
            Self::Item => Some("assembly_id"),
        }
    }

    /// Human-readable code pattern, e.g. `DD.DD` for sections.
    #[must_use]
    pub const fn pattern(self) -> &'static str {
        match self {
            Self::Division => "DD",
            Self::Section => "DD.DD",
            Self::Assembly => "DD.DD.DD",
            Self::Item => "DD.DD.DD.DD",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned for a level number outside `1..=4`, or an unknown level name.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error(
    "unsupported level '{0}': expected 1 (division), 2 (section), 3 (assembly) or 4 (item)"
)]
pub struct UnsupportedLevel(pub String);

impl TryFrom<i64> for Level {
    type Error = UnsupportedLevel;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Division),
            2 => Ok(Self::Section),
            3 => Ok(Self::Assembly),
            4 => Ok(Self::Item),
            other => Err(UnsupportedLevel(other.to_string())),
        }
    }
}

impl From<Level> for i64 {
    fn from(level: Level) -> Self {
        level as Self
    }
}

impl FromStr for Level {
    type Err = UnsupportedLevel;

    /// Accepts the level number or its name, singular or plural, in any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(number) = trimmed.parse::<i64>() {
            return Self::try_from(number).map_err(|_| UnsupportedLevel(s.to_string()));
        }

        let lower = trimmed.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|level| lower == level.name() || lower == level.plural())
            .ok_or_else(|| UnsupportedLevel(s.to_string()))
    }
}
