use std::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
    str::FromStr,
    sync::LazyLock,
};

use nonempty::NonEmpty;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::Level;

/// Anchored pattern for each level, indexed by `depth - 1`.
static PATTERNS: LazyLock<[Regex; 4]> = LazyLock::new(|| {
    Level::ALL.map(|level| {
        let pattern = format!(r"^[0-9]{{2}}(?:\.[0-9]{{2}}){{{}}}$", level.depth() - 1);
        Regex::new(&pattern).expect("code patterns are valid regular expressions")
    })
});

fn pattern_for(level: Level) -> &'static Regex {
    &PATTERNS[level.depth() - 1]
}

/// One two-digit group of a [`Code`], in the range `00..=99`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Segment(u8);

impl Segment {
    /// Smallest value, `00`.
    pub const MIN: Self = Self(0);

    /// Largest value that fits the two-digit format.
    pub const MAX: Self = Self(99);

    /// Creates a segment, returning `None` if `value` needs more than two
    /// digits.
    #[must_use]
    pub fn new(value: u32) -> Option<Self> {
        u8::try_from(value)
            .ok()
            .filter(|v| *v <= Self::MAX.0)
            .map(Self)
    }

    /// Returns the numeric value.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Parses exactly two ASCII digits.
    fn from_digits(group: &str) -> Option<Self> {
        match group.as_bytes() {
            [tens @ b'0'..=b'9', ones @ b'0'..=b'9'] => {
                Some(Self((tens - b'0') * 10 + (ones - b'0')))
            }
            _ => None,
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

/// A hierarchical catalog code such as `02.10.10.01`.
///
/// Format: one to four two-digit groups joined by `.`. The number of groups is
/// the [`Level`] of the node the code belongs to:
///
/// - `02` is a division
/// - `02.10` is a section of division `02`
/// - `02.10.10` is an assembly of section `02.10`
/// - `02.10.10.01` is an item of assembly `02.10.10`
///
/// Codes order parent-first, then numerically within a level.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Code {
    segments: NonEmpty<Segment>,
}

/// Deepest supported nesting.
const MAX_DEPTH: usize = Level::Item.depth();

impl Code {
    /// Creates a division code from a single segment.
    #[must_use]
    pub fn division(segment: Segment) -> Self {
        Self {
            segments: NonEmpty::new(segment),
        }
    }

    /// Parses a code that must belong to `level`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Format`] unless `code` is exactly `level.depth()`
    /// groups of two ASCII digits joined by single dots, with nothing else
    /// around them.
    ///
    /// # Examples
    ///
    /// ```
    /// use costlib::{Code, Level};
    ///
    /// let code = Code::parse("02.10", Level::Section).unwrap();
    /// assert_eq!(code.to_string(), "02.10");
    ///
    /// assert!(Code::parse("02.10", Level::Division).is_err());
    /// assert!(Code::parse("2.10", Level::Section).is_err());
    /// ```
    pub fn parse(code: &str, level: Level) -> Result<Self, Error> {
        let format_error = || Error::Format {
            code: code.to_string(),
            level,
        };

        if !pattern_for(level).is_match(code) {
            return Err(format_error());
        }

        Self::from_groups(code).ok_or_else(format_error)
    }

    fn from_groups(code: &str) -> Option<Self> {
        let segments: Vec<Segment> = code
            .split('.')
            .map(Segment::from_digits)
            .collect::<Option<_>>()?;

        if segments.len() > MAX_DEPTH {
            return None;
        }

        NonEmpty::from_vec(segments).map(|segments| Self { segments })
    }

    /// The hierarchy level implied by the number of groups.
    #[must_use]
    pub fn level(&self) -> Level {
        match self.segments.len() {
            1 => Level::Division,
            2 => Level::Section,
            3 => Level::Assembly,
            _ => Level::Item,
        }
    }

    /// Iterates over the segments, outermost first.
    pub fn segments(&self) -> impl Iterator<Item = Segment> + '_ {
        self.segments.iter().copied()
    }

    /// The last (most specific) segment.
    #[must_use]
    pub fn last(&self) -> Segment {
        *self.segments.last()
    }

    /// The code of the enclosing node, or `None` for a division.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let mut segments: Vec<Segment> = self.segments().collect();
        segments.pop();
        NonEmpty::from_vec(segments).map(|segments| Self { segments })
    }

    /// Appends a segment, producing the code of a child node.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TooDeep`] if this is already an item code.
    pub fn child(&self, segment: Segment) -> Result<Self, Error> {
        if self.segments.len() >= MAX_DEPTH {
            return Err(Error::TooDeep(self.to_string()));
        }
        let mut segments = self.segments.clone();
        segments.push(segment);
        Ok(Self { segments })
    }

    /// Whether `child` sits exactly one level below this code.
    #[must_use]
    pub fn is_parent_of(&self, child: &Self) -> bool {
        child.segments.len() == self.segments.len() + 1
            && self.segments().zip(child.segments()).all(|(a, b)| a == b)
    }

    /// Whether this code is `ancestor` itself or lies anywhere beneath it.
    #[must_use]
    pub fn starts_with(&self, ancestor: &Self) -> bool {
        ancestor.segments.len() <= self.segments.len()
            && ancestor.segments().zip(self.segments()).all(|(a, b)| a == b)
    }

    /// Replaces the leading `old` segments with `new`.
    ///
    /// Returns `None` if this code does not start with `old`, or if the result
    /// would exceed four groups.
    #[must_use]
    pub fn rebase(&self, old: &Self, new: &Self) -> Option<Self> {
        if !self.starts_with(old) {
            return None;
        }
        let segments: Vec<Segment> = new
            .segments()
            .chain(self.segments().skip(old.segments.len()))
            .collect();
        if segments.len() > MAX_DEPTH {
            return None;
        }
        NonEmpty::from_vec(segments).map(|segments| Self { segments })
    }

    /// Composite integer key used for ordering.
    ///
    /// Each segment occupies a two-decimal-digit slot, outermost first:
    /// `02.10.10.01` becomes `2_10_10_01`. Ordering by this key places every
    /// node after its ancestors and before the next sibling of any ancestor.
    #[must_use]
    pub fn sort_key(&self) -> u64 {
        self.segments()
            .zip((0..MAX_DEPTH as u32).rev())
            .map(|(segment, power)| u64::from(segment.get()) * 100_u64.pow(power))
            .sum()
    }
}

impl PartialEq for Code {
    fn eq(&self, other: &Self) -> bool {
        self.segments().eq(other.segments())
    }
}

impl Eq for Code {}

impl Hash for Code {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for segment in self.segments() {
            segment.hash(state);
        }
        self.segments.len().hash(state);
    }
}

impl PartialOrd for Code {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Code {
    fn cmp(&self, other: &Self) -> Ordering {
        self.segments().cmp(other.segments())
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut segments = self.segments();
        if let Some(first) = segments.next() {
            write!(f, "{first}")?;
        }
        for segment in segments {
            write!(f, ".{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for Code {
    type Err = Error;

    /// Parses a code of any depth from one to four groups.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_groups(s).ok_or_else(|| Error::Syntax(s.to_string()))
    }
}

impl TryFrom<String> for Code {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_str(&value)
    }
}

impl TryFrom<&str> for Code {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::from_str(value)
    }
}

impl From<Code> for String {
    fn from(code: Code) -> Self {
        code.to_string()
    }
}

/// Errors that can occur while parsing or building codes.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    /// The code does not have the shape required for a particular level.
    #[error("invalid {} code '{}': expected {}", .level, .code, .level.pattern())]
    Format {
        /// The offending input.
        code: String,
        /// The level the code was checked against.
        level: Level,
    },

    /// The code is not one to four two-digit groups.
    #[error("invalid code '{0}': expected one to four two-digit groups joined by '.'")]
    Syntax(String),

    /// Attempted to nest below an item.
    #[error("cannot nest below item code '{0}'")]
    TooDeep(String),

    /// A child code whose last group is `00`, which would share its parent's
    /// sort key.
    #[error("invalid code '{0}': the last group of a child code cannot be 00")]
    ZeroChild(String),
}

/// Pure syntactic check: exactly `level.depth()` groups of exactly two digits
/// joined by single dots.
#[must_use]
pub fn validate_code(code: &str, level: Level) -> bool {
    pattern_for(level).is_match(code)
}

/// Whether `child` is a well-formed direct child code of `parent`.
///
/// True iff `child` starts with `parent` followed by `.`, has exactly one more
/// group than `parent`, and matches the format for its own level.
#[must_use]
pub fn validate_hierarchy(child: &str, parent: &str) -> bool {
    let Ok(parent_code) = parent.parse::<Code>() else {
        return false;
    };
    let Some(child_level) = parent_code.level().child() else {
        return false;
    };

    child
        .strip_prefix(parent)
        .is_some_and(|rest| rest.starts_with('.'))
        && validate_code(child, child_level)
}

/// All groups except the last, joined by `.`; empty for a single group.
#[must_use]
pub fn parent_code(code: &str) -> String {
    code.rsplit_once('.')
        .map_or_else(String::new, |(parent, _)| parent.to_string())
}

/// Sort key of a textual code. See [`Code::sort_key`].
///
/// # Errors
///
/// Returns [`Error::Syntax`] if `code` is not a valid code of any level.
pub fn sort_key(code: &str) -> Result<u64, Error> {
    Ok(code.parse::<Code>()?.sort_key())
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("00"; "zero")]
    #[test_case("02"; "typical")]
    #[test_case("99"; "upper bound")]
    fn division_codes_are_valid(code: &str) {
        assert!(validate_code(code, Level::Division));
    }

    #[test_case(""; "empty")]
    #[test_case("2"; "one digit")]
    #[test_case("002"; "three digits")]
    #[test_case("0a"; "letter")]
    #[test_case(" 02"; "leading space")]
    #[test_case("02\n"; "trailing newline")]
    #[test_case("02.10"; "section")]
    #[test_case("٠٢"; "non ascii digits")]
    fn malformed_division_codes_are_invalid(code: &str) {
        assert!(!validate_code(code, Level::Division));
    }

    #[test_case("02.10", Level::Section)]
    #[test_case("02.10.10", Level::Assembly)]
    #[test_case("02.10.10.01", Level::Item)]
    fn deeper_codes_are_valid_at_their_level(code: &str, level: Level) {
        assert!(validate_code(code, level));
        for other in Level::ALL.into_iter().filter(|l| *l != level) {
            assert!(!validate_code(code, other), "{code} should not be a {other}");
        }
    }

    #[test_case("02..10"; "double dot")]
    #[test_case("02.10."; "trailing dot")]
    #[test_case(".02.10"; "leading dot")]
    #[test_case("02-10"; "wrong separator")]
    fn malformed_section_codes_are_invalid(code: &str) {
        assert!(!validate_code(code, Level::Section));
    }

    #[test_case("02.10", "02"; "section")]
    #[test_case("02.10.10", "02.10"; "assembly")]
    #[test_case("02.10.10.01", "02.10.10"; "item")]
    fn valid_hierarchies(child: &str, parent: &str) {
        assert!(validate_hierarchy(child, parent));
    }

    #[test_case("03.10", "02"; "different parent")]
    #[test_case("02.10.10", "02"; "skips a level")]
    #[test_case("0210", "02"; "missing dot")]
    #[test_case("02.1", "02"; "short segment")]
    #[test_case("02", "02"; "same code")]
    #[test_case("02.10.10.01.01", "02.10.10.01"; "below item")]
    #[test_case("02.10", "2"; "malformed parent")]
    fn invalid_hierarchies(child: &str, parent: &str) {
        assert!(!validate_hierarchy(child, parent));
    }

    #[test]
    fn parent_code_drops_last_group() {
        assert_eq!(parent_code("02.10.10.01"), "02.10.10");
        assert_eq!(parent_code("02.10"), "02");
        assert_eq!(parent_code("02"), "");
    }

    #[test]
    fn sort_key_is_monotonic_along_hierarchy() {
        let ordered = ["02", "02.10", "02.10.10", "02.10.10.01", "02.10.20", "02.20", "03"];
        let keys: Vec<u64> = ordered.iter().map(|c| sort_key(c).unwrap()).collect();
        assert!(keys.windows(2).all(|w| w[0] < w[1]), "{keys:?}");
    }

    #[test_case("02", 2_000_000)]
    #[test_case("02.10", 2_100_000)]
    #[test_case("02.10.10", 2_101_000)]
    #[test_case("02.10.10.01", 2_101_001)]
    #[test_case("99.99.99.99", 99_999_999)]
    fn sort_key_values(code: &str, expected: u64) {
        assert_eq!(sort_key(code).unwrap(), expected);
    }

    #[test]
    fn sort_key_rejects_garbage() {
        assert_eq!(sort_key("AB"), Err(Error::Syntax("AB".to_string())));
    }

    #[test]
    fn ordering_matches_sort_key() {
        let mut codes: Vec<Code> = ["03", "02.10.10.01", "02.20", "02", "02.10"]
            .iter()
            .map(|c| c.parse().unwrap())
            .collect();
        codes.sort();
        let rendered: Vec<String> = codes.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, ["02", "02.10", "02.10.10.01", "02.20", "03"]);
    }

    #[test]
    fn parse_reports_expected_pattern() {
        let err = Code::parse("02.1", Level::Section).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid section code '02.1': expected DD.DD"
        );
    }

    #[test]
    fn parent_and_child_round_trip() {
        let item = Code::parse("02.10.10.01", Level::Item).unwrap();
        let assembly = item.parent().unwrap();
        assert_eq!(assembly.to_string(), "02.10.10");
        assert!(assembly.is_parent_of(&item));
        assert_eq!(assembly.child(item.last()).unwrap(), item);
        assert!(matches!(item.child(Segment::MAX), Err(Error::TooDeep(_))));
        assert_eq!(Code::division(Segment::MAX).parent(), None);
    }

    #[test]
    fn rebase_moves_subtree() {
        let code: Code = "02.10.10.01".parse().unwrap();
        let old: Code = "02.10".parse().unwrap();
        let new: Code = "05.30".parse().unwrap();
        assert_eq!(code.rebase(&old, &new).unwrap().to_string(), "05.30.10.01");
        assert_eq!(code.rebase(&new, &old), None);
    }

    #[test]
    fn segment_bounds() {
        assert_eq!(Segment::new(99), Some(Segment::MAX));
        assert_eq!(Segment::new(100), None);
        assert_eq!(Segment::new(7).unwrap().to_string(), "07");
    }

    #[test]
    fn serde_uses_string_form() {
        let code: Code = serde_json::from_str("\"02.10\"").unwrap();
        assert_eq!(code.level(), Level::Section);
        assert_eq!(serde_json::to_string(&code).unwrap(), "\"02.10\"");
        assert!(serde_json::from_str::<Code>("\"2.10\"").is_err());
    }
}
