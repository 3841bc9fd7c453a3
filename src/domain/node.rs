use chrono::{DateTime, Utc};
use non_empty_string::NonEmptyString;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Code, Level};

/// A stored catalog node: one row of the division, section, assembly or item
/// table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Stable identifier.
    pub id: Uuid,
    /// Which table the row lives in.
    pub level: Level,
    /// Hierarchical code, unique among active rows of the level.
    pub code: Code,
    /// Human-readable name.
    pub name: String,
    /// Optional free-text description.
    pub description: Option<String>,
    /// The parent row. Absent for divisions.
    pub parent_id: Option<Uuid>,
    /// Derived from the code; see [`Code::sort_key`].
    pub sort_order: u64,
    /// `false` once soft-deleted.
    pub is_active: bool,
    /// When the row was inserted.
    pub created_at: DateTime<Utc>,
    /// When the row was last modified.
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for a new node.
///
/// The store assigns the id and timestamps and derives the sort order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNode {
    /// The code to persist.
    pub code: Code,
    /// Human-readable name.
    pub name: NonEmptyString,
    /// Optional free-text description.
    pub description: Option<String>,
    /// The parent row. Must be `None` for divisions and `Some` otherwise.
    pub parent_id: Option<Uuid>,
}

impl NewNode {
    /// The level implied by the code.
    #[must_use]
    pub fn level(&self) -> Level {
        self.code.level()
    }

    /// Builds the full row, stamping it with a fresh id and `now`.
    #[must_use]
    pub fn into_node(self, now: DateTime<Utc>) -> Node {
        Node {
            id: Uuid::new_v4(),
            level: self.code.level(),
            sort_order: self.code.sort_key(),
            code: self.code,
            name: self.name.as_str().to_string(),
            description: self.description,
            parent_id: self.parent_id,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}
