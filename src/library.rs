//! Request-level catalog operations.
//!
//! [`Library`] is what the HTTP handlers and the CLI call. It validates input,
//! resolves parent codes to rows, allocates codes, and owns the retry loop that
//! resolves two writers racing for the same sibling code.

use std::num::NonZeroU32;

use non_empty_string::NonEmptyString;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{
    domain::{
        allocator::{self, AllocError},
        reconcile::{self, Plan},
        Code, CodeError, Config, Level, NewNode, Node, Segment, UnsupportedLevel,
    },
    storage::{Store, StoreError},
};

/// Errors returned by [`Library`] operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A code does not have the format its level requires.
    #[error(transparent)]
    InvalidFormat(#[from] CodeError),

    /// A parent code is missing or malformed for the level being addressed.
    #[error(
        "invalid parent code '{parent}' for a {level}: expected {}",
        .level.parent().map_or("no parent", Level::pattern)
    )]
    InvalidParentFormat {
        /// The offending parent code (empty when missing).
        parent: String,
        /// The level being addressed.
        level: Level,
    },

    /// A level outside 1..=4.
    #[error(transparent)]
    UnsupportedLevel(#[from] UnsupportedLevel),

    /// The name is empty after trimming.
    #[error("name must not be empty")]
    InvalidName,

    /// A supplied code does not sit directly under the supplied parent.
    #[error("code '{code}' is not a direct child of '{parent}'")]
    HierarchyMismatch {
        /// The supplied code.
        code: Code,
        /// The supplied parent.
        parent: Code,
    },

    /// An active row of the level already holds the code.
    #[error("an active {} with code '{code}' already exists", .code.level())]
    DuplicateCode {
        /// The conflicting code.
        code: Code,
    },

    /// No free two-digit value is left under the parent.
    #[error("no free {level} codes under '{prefix}': last allocated value is {last}")]
    Exhausted {
        /// The parent code (empty for divisions).
        prefix: String,
        /// The level being allocated.
        level: Level,
        /// The highest value in use.
        last: String,
    },

    /// The row cannot be deactivated while active children reference it.
    #[error(
        "{} '{code}' still has {count} active {}",
        .code.level(),
        .code.level().child().map_or("children", Level::plural)
    )]
    HasActiveChildren {
        /// The row being deactivated.
        code: Code,
        /// How many active children it has.
        count: usize,
    },

    /// The addressed row does not exist or is inactive.
    #[error("{0} not found")]
    NotFound(String),

    /// A row could not be removed because other rows still point at it.
    #[error("{level} {id} is still referenced by other rows")]
    StillReferenced {
        /// Level of the row.
        level: Level,
        /// The row.
        id: Uuid,
    },

    /// The store failed.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[source] StoreError),
}

impl From<AllocError> for Error {
    fn from(err: AllocError) -> Self {
        match err {
            AllocError::InvalidParentFormat { parent, level } => {
                Self::InvalidParentFormat { parent, level }
            }
            AllocError::Exhausted {
                prefix,
                level,
                last,
            } => Self::Exhausted {
                prefix,
                level,
                last: last.to_string(),
            },
        }
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateCode { code } => Self::DuplicateCode { code },
            StoreError::ParentNotFound(id) => Self::NotFound(format!("parent {id}")),
            StoreError::NotFound { level, id } => Self::NotFound(format!("{level} {id}")),
            StoreError::StillReferenced { level, id } => Self::StillReferenced { level, id },
            other => Self::StorageUnavailable(other),
        }
    }
}

/// Input for creating a node at any level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateNode {
    /// Human-readable name. Trimmed before storing; must not be blank.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// An explicit code. When absent, the next free code is allocated.
    pub code: Option<String>,
    /// Code of the parent row. Required below division level.
    pub parent_code: Option<String>,
}

/// Outcome of a duplicate reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    /// Whether the plan was written to the store.
    pub applied: bool,
    /// The planned changes.
    #[serde(flatten)]
    pub plan: Plan,
}

/// Row counts for one level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LevelCount {
    /// The level counted.
    pub level: Level,
    /// Active rows.
    pub active: usize,
    /// Soft-deleted rows.
    pub inactive: usize,
}

/// Catalog operations over a [`Store`].
#[derive(Debug)]
pub struct Library<S> {
    store: S,
    attempts: NonZeroU32,
}

impl<S: Store> Library<S> {
    /// Wraps `store`, taking the allocation attempt count from `config`.
    pub const fn new(store: S, config: &Config) -> Self {
        Self::with_attempts(store, config.allocation_attempts())
    }

    /// Wraps `store` with an explicit allocation attempt count.
    pub const fn with_attempts(store: S, attempts: NonZeroU32) -> Self {
        Self { store, attempts }
    }

    /// The underlying store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Proposes the next free code at `level` under `parent_code`.
    ///
    /// Nothing is reserved; see [`Library::create`] for the persisting path.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidParentFormat`] if the parent is missing or malformed
    /// - [`Error::NotFound`] if no active row holds the parent code
    /// - [`Error::Exhausted`] if every two-digit value is taken
    #[instrument(skip(self))]
    pub fn generate_code(&self, level: Level, parent_code: Option<&str>) -> Result<Code, Error> {
        let parent = self.active_parent(level, parent_code)?;
        self.allocate(level, parent.as_ref())
    }

    /// Whether an active row at `level` holds `code`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFormat`] if `code` is malformed for `level`.
    pub fn code_exists(&self, code: &str, level: Level) -> Result<bool, Error> {
        let code = Code::parse(code, level)?;
        Ok(self.store.code_exists(&code)?)
    }

    /// Creates a node at `level`.
    ///
    /// With no explicit code, the next free code is allocated. If another
    /// writer claims that code between the sibling scan and the insert, the
    /// code is allocated again against the new siblings, up to the configured
    /// number of attempts.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidName`] if the name is blank
    /// - [`Error::InvalidFormat`] or [`Error::HierarchyMismatch`] for a bad
    ///   explicit code
    /// - [`Error::DuplicateCode`] if an explicit code is taken, or allocation
    ///   kept colliding until the attempts ran out
    /// - [`Error::Exhausted`] if the parent has no free codes left
    #[instrument(skip(self, request), fields(name = %request.name))]
    pub fn create(&mut self, level: Level, request: CreateNode) -> Result<Node, Error> {
        let name = NonEmptyString::new(request.name.trim().to_string())
            .map_err(|_| Error::InvalidName)?;
        let parent = self.active_parent(level, request.parent_code.as_deref())?;
        let description = request.description.filter(|d| !d.trim().is_empty());

        let new_node = |code: Code| NewNode {
            code,
            name: name.clone(),
            description: description.clone(),
            parent_id: parent.as_ref().map(|p| p.id),
        };

        if let Some(raw) = request.code {
            let code = Code::parse(&raw, level)?;
            if level.parent().is_some() && code.last() == Segment::MIN {
                return Err(CodeError::ZeroChild(code.to_string()).into());
            }
            if let Some(parent) = &parent {
                if !parent.code.is_parent_of(&code) {
                    return Err(Error::HierarchyMismatch {
                        code,
                        parent: parent.code.clone(),
                    });
                }
            }
            if self.store.code_exists(&code)? {
                return Err(Error::DuplicateCode { code });
            }
            let node = self.store.insert(new_node(code))?;
            info!(code = %node.code, id = %node.id, "Created {level}");
            return Ok(node);
        }

        let mut attempt = 1;
        loop {
            let code = self.allocate(level, parent.as_ref())?;
            match self.store.insert(new_node(code)) {
                Ok(node) => {
                    info!(code = %node.code, id = %node.id, attempt, "Created {level}");
                    return Ok(node);
                }
                Err(StoreError::DuplicateCode { code }) if attempt < self.attempts.get() => {
                    warn!(%code, attempt, "Allocated code was taken concurrently, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Creates a division. Shorthand for [`Library::create`].
    ///
    /// # Errors
    ///
    /// As [`Library::create`].
    pub fn create_division(
        &mut self,
        name: impl Into<String>,
        description: Option<String>,
        code: Option<String>,
    ) -> Result<Node, Error> {
        self.create(
            Level::Division,
            CreateNode {
                name: name.into(),
                description,
                code,
                parent_code: None,
            },
        )
    }

    /// Rows at `level`, optionally under one parent, in sort order.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidParentFormat`] if `parent_code` is malformed
    /// - [`Error::NotFound`] if the parent does not exist
    pub fn list(
        &self,
        level: Level,
        parent_code: Option<&str>,
        include_inactive: bool,
    ) -> Result<Vec<Node>, Error> {
        let parent = match parent_code {
            Some(_) => self.active_parent(level, parent_code)?,
            None => None,
        };
        Ok(self
            .store
            .list(level, parent.map(|p| p.id), include_inactive)?)
    }

    /// The active row holding `code`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no active row holds the code.
    pub fn get(&self, code: &Code) -> Result<Node, Error> {
        self.store
            .find(code)?
            .ok_or_else(|| Error::NotFound(format!("{} '{code}'", code.level())))
    }

    /// Soft-deletes the active row holding `code`.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if no active row holds the code
    /// - [`Error::HasActiveChildren`] if active rows still sit under it
    #[instrument(skip(self, code), fields(code = %code))]
    pub fn deactivate(&mut self, code: &Code) -> Result<Node, Error> {
        let node = self.get(code)?;
        let count = self.store.active_children(node.level, node.id)?;
        if count > 0 {
            return Err(Error::HasActiveChildren {
                code: code.clone(),
                count,
            });
        }
        let node = self.store.deactivate(node.level, node.id)?;
        info!(id = %node.id, "Deactivated {} {}", node.level, node.code);
        Ok(node)
    }

    /// Finds duplicate rows and, when `apply` is set, merges them.
    ///
    /// # Errors
    ///
    /// - [`Error::Exhausted`] if a surviving row cannot take the moved
    ///   children; nothing is written
    /// - [`Error::StillReferenced`] if a duplicate cannot be removed
    /// - [`Error::StorageUnavailable`] if the store fails
    ///
    /// On any error the store rolls the whole plan back.
    #[instrument(skip(self))]
    pub fn reconcile(&mut self, apply: bool) -> Result<Reconciliation, Error> {
        let plan = reconcile::plan(self.store.snapshot()?)?;

        if plan.is_empty() {
            debug!("No duplicate rows found");
            return Ok(Reconciliation {
                applied: false,
                plan,
            });
        }

        if !apply {
            return Ok(Reconciliation {
                applied: false,
                plan,
            });
        }

        self.store.apply(&plan)?;
        info!(
            groups = plan.groups.len(),
            moved = plan.reparent.len(),
            recoded = plan.recode.len(),
            deleted = plan.delete.len(),
            "Reconciled duplicate rows"
        );
        Ok(Reconciliation {
            applied: true,
            plan,
        })
    }

    /// Active and inactive row counts for every level.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StorageUnavailable`] if the store cannot be read.
    pub fn counts(&self) -> Result<Vec<LevelCount>, Error> {
        Level::ALL
            .into_iter()
            .map(|level| -> Result<LevelCount, Error> {
                let rows = self.store.list(level, None, true)?;
                let active = rows.iter().filter(|n| n.is_active).count();
                Ok(LevelCount {
                    level,
                    active,
                    inactive: rows.len() - active,
                })
            })
            .collect()
    }

    /// Resolves `parent_code` to the active parent row for a node at `level`.
    ///
    /// Divisions have no parent; a supplied one is ignored.
    fn active_parent(
        &self,
        level: Level,
        parent_code: Option<&str>,
    ) -> Result<Option<Node>, Error> {
        let Some(parent_level) = level.parent() else {
            if let Some(ignored) = parent_code {
                debug!(parent = ignored, "Ignoring parent code supplied for a division");
            }
            return Ok(None);
        };

        let invalid = || Error::InvalidParentFormat {
            parent: parent_code.unwrap_or_default().to_string(),
            level,
        };
        let raw = parent_code.ok_or_else(invalid)?;
        let code = Code::parse(raw, parent_level).map_err(|_| invalid())?;

        self.store
            .find(&code)?
            .map(Some)
            .ok_or_else(|| Error::NotFound(format!("{parent_level} '{code}'")))
    }

    fn allocate(&self, level: Level, parent: Option<&Node>) -> Result<Code, Error> {
        let parent_code = parent.map(|p| &p.code);
        let existing = self.store.sibling_codes(level, parent_code)?;
        Ok(allocator::next_code(
            level,
            parent_code,
            existing.iter().map(String::as_str),
        )?)
    }
}
