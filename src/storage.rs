//! Persistence for catalog nodes.
//!
//! The [`Store`] trait is the seam between the catalog logic and the backing
//! tables. [`SqliteStore`] is the production backend; [`MemoryStore`] keeps
//! everything in process and is used by tests and benchmarks.

use uuid::Uuid;

use crate::domain::{reconcile::Plan, Code, Level, NewNode, Node};

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Errors raised by a [`Store`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An active row of the level already carries the code.
    #[error("an active {} with code {code} already exists", code.level())]
    DuplicateCode {
        /// The conflicting code.
        code: Code,
    },

    /// The referenced parent row does not exist.
    #[error("parent {0} does not exist")]
    ParentNotFound(Uuid),

    /// The row's parent link does not match its level.
    #[error("a {0} must have exactly one parent of the level above")]
    ParentMismatch(Level),

    /// No row of the level has the given id.
    #[error("no {level} with id {id}")]
    NotFound {
        /// Table searched.
        level: Level,
        /// The missing id.
        id: Uuid,
    },

    /// The row cannot be deleted while rows of the level below reference it.
    #[error("{level} {id} is still referenced by child rows")]
    StillReferenced {
        /// Table of the referenced row.
        level: Level,
        /// The referenced row.
        id: Uuid,
    },

    /// A persisted row could not be decoded.
    #[error("corrupt {level} row {id}: {detail}")]
    Corrupt {
        /// Table the row lives in.
        level: Level,
        /// Raw id column.
        id: String,
        /// What failed to decode.
        detail: String,
    },

    /// The backend could not be reached or failed mid-operation.
    #[error("storage unavailable: {0}")]
    Unavailable(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    pub(crate) fn unavailable(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Unavailable(Box::new(err))
    }
}

/// Row-level access to the four catalog tables.
///
/// Every method addresses a single level. Codes are unique among the active
/// rows of a level; inactive rows keep their codes but no longer reserve them.
pub trait Store {
    /// Codes of the active rows at `level` whose code lies under `parent`.
    ///
    /// With no parent, every active code of the level is returned. The result
    /// is raw text so that malformed legacy codes reach the allocator, which
    /// skips them.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn sibling_codes(&self, level: Level, parent: Option<&Code>) -> Result<Vec<String>, StoreError>;

    /// Whether an active row of the code's level carries `code`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn code_exists(&self, code: &Code) -> Result<bool, StoreError> {
        Ok(self.find(code)?.is_some())
    }

    /// The active row carrying `code`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn find(&self, code: &Code) -> Result<Option<Node>, StoreError>;

    /// The row with the given id, active or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn find_by_id(&self, level: Level, id: Uuid) -> Result<Option<Node>, StoreError>;

    /// Inserts a new active row.
    ///
    /// # Errors
    ///
    /// - [`StoreError::DuplicateCode`] if an active row already holds the code
    /// - [`StoreError::ParentNotFound`] if the parent row does not exist
    /// - [`StoreError::ParentMismatch`] if the parent link does not fit the
    ///   level
    fn insert(&mut self, node: NewNode) -> Result<Node, StoreError>;

    /// Rows of `level`, optionally restricted to one parent, ordered by sort
    /// order then code.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn list(
        &self,
        level: Level,
        parent_id: Option<Uuid>,
        include_inactive: bool,
    ) -> Result<Vec<Node>, StoreError>;

    /// Number of active rows one level below `level` whose parent is `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn active_children(&self, level: Level, id: Uuid) -> Result<usize, StoreError>;

    /// Soft-deletes an active row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no active row has the id.
    fn deactivate(&mut self, level: Level, id: Uuid) -> Result<Node, StoreError>;

    /// Every row of every level.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn snapshot(&self) -> Result<Vec<Node>, StoreError> {
        let mut nodes = Vec::new();
        for level in Level::ALL {
            nodes.extend(self.list(level, None, true)?);
        }
        Ok(nodes)
    }

    /// Applies a reconciliation plan atomically: either every step lands or
    /// none does.
    ///
    /// # Errors
    ///
    /// Returns the first failing step's error; the store is left unchanged.
    fn apply(&mut self, plan: &Plan) -> Result<(), StoreError>;
}

/// Checks that a new row has a parent exactly when its level requires one.
fn check_parent(node: &NewNode) -> Result<(), StoreError> {
    let level = node.level();
    match (level.parent(), node.parent_id) {
        (None, None) | (Some(_), Some(_)) => Ok(()),
        _ => Err(StoreError::ParentMismatch(level)),
    }
}
