//! Sibling-code allocation.
//!
//! [`next_code`] is a pure function over a snapshot of the codes already in
//! use under a parent. It reserves nothing: callers persist the returned code
//! and, if the store reports a uniqueness conflict because another writer got
//! there first, allocate again against a fresh snapshot.

use thiserror::Error;
use tracing::debug;

use crate::domain::{
    code::{Code, Segment},
    Level,
};

/// An existing sibling code that matched the expected shape under a parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sibling {
    /// The parent code followed by `.`, or empty for divisions.
    pub parent_prefix: String,
    /// The final two-digit group.
    pub suffix: Segment,
}

/// Errors produced while allocating a code.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AllocError {
    /// The parent code is missing, malformed, or at the wrong depth.
    #[error(
        "invalid parent code '{parent}' for a new {level}: expected {}",
        .level.parent().map_or("no parent", Level::pattern)
    )]
    InvalidParentFormat {
        /// The offending parent code (empty when missing).
        parent: String,
        /// The level being allocated.
        level: Level,
    },

    /// The next value does not fit in two digits.
    #[error("no free {level} codes under '{prefix}': last allocated value is {last}")]
    Exhausted {
        /// The parent code (empty for divisions).
        prefix: String,
        /// The level being allocated.
        level: Level,
        /// The highest sibling value in use.
        last: Segment,
    },
}

/// Filters raw sibling codes down to those that are well formed for `level`
/// and sit directly under `parent`.
///
/// Entries that do not match are dropped and reported at debug level rather
/// than treated as errors, so stray data in storage never blocks allocation.
pub fn siblings<'a, I>(level: Level, parent: Option<&Code>, codes: I) -> Vec<Sibling>
where
    I: IntoIterator<Item = &'a str>,
{
    let parent_prefix = parent.map_or_else(String::new, |p| format!("{p}."));

    codes
        .into_iter()
        .filter_map(|raw| {
            let parsed = Code::parse(raw, level)
                .ok()
                .filter(|code| raw.starts_with(&parent_prefix) && code.level() == level);

            match parsed {
                Some(code) => Some(Sibling {
                    parent_prefix: parent_prefix.clone(),
                    suffix: code.last(),
                }),
                None => {
                    debug!(
                        code = raw,
                        %level,
                        prefix = %parent_prefix,
                        "skipping malformed sibling code"
                    );
                    None
                }
            }
        })
        .collect()
}

/// Computes the next free code at `level` under `parent`.
///
/// The highest existing suffix among `existing` is advanced by the level's
/// [step](Level::step). With no siblings, numbering starts at the step itself:
/// `01` for divisions and items, `10` for sections and assemblies.
///
/// # Errors
///
/// - [`AllocError::InvalidParentFormat`] if `level` needs a parent and
///   `parent` is missing or not a code of the level above.
/// - [`AllocError::Exhausted`] if the next value would exceed `99`.
///
/// # Examples
///
/// ```
/// use costlib::{domain::allocator::next_code, Code, Level};
///
/// let parent: Code = "02".parse().unwrap();
/// let code = next_code(Level::Section, Some(&parent), ["02.10", "02.20"]).unwrap();
/// assert_eq!(code.to_string(), "02.30");
///
/// let first = next_code(Level::Division, None, Vec::<&str>::new()).unwrap();
/// assert_eq!(first.to_string(), "01");
/// ```
pub fn next_code<'a, I>(
    level: Level,
    parent: Option<&Code>,
    existing: I,
) -> Result<Code, AllocError>
where
    I: IntoIterator<Item = &'a str>,
{
    let parent = match (level.parent(), parent) {
        (None, None) => None,
        (None, Some(ignored)) => {
            debug!(parent = %ignored, "ignoring parent code supplied for a division");
            None
        }
        (Some(expected), Some(parent)) if parent.level() == expected => Some(parent),
        (Some(_), parent) => {
            return Err(AllocError::InvalidParentFormat {
                parent: parent.map(ToString::to_string).unwrap_or_default(),
                level,
            });
        }
    };

    let max = siblings(level, parent, existing)
        .into_iter()
        .map(|sibling| sibling.suffix)
        .max();

    let step = u32::from(level.step());
    let next = max.map_or(step, |max| u32::from(max.get()) + step);

    let exhausted = || AllocError::Exhausted {
        prefix: parent.map(ToString::to_string).unwrap_or_default(),
        level,
        last: max.unwrap_or(Segment::MAX),
    };

    let segment = Segment::new(next).ok_or_else(exhausted)?;

    match parent {
        None => Ok(Code::division(segment)),
        Some(parent) => parent.child(segment).map_err(|_| exhausted()),
    }
}

/// Textual front end to [`next_code`], validating the parent first.
///
/// # Errors
///
/// As [`next_code`]; a parent that fails to parse for the level above is
/// reported as [`AllocError::InvalidParentFormat`].
pub fn generate_code<'a, I>(
    level: Level,
    parent: Option<&str>,
    existing: I,
) -> Result<Code, AllocError>
where
    I: IntoIterator<Item = &'a str>,
{
    let parent = match (level.parent(), parent) {
        (Some(expected), Some(raw)) => Some(Code::parse(raw, expected).map_err(|_| {
            AllocError::InvalidParentFormat {
                parent: raw.to_string(),
                level,
            }
        })?),
        (Some(_), None) => {
            return Err(AllocError::InvalidParentFormat {
                parent: String::new(),
                level,
            });
        }
        (None, _) => None,
    };

    next_code(level, parent.as_ref(), existing)
}
