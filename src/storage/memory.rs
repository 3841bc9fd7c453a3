//! An in-memory catalog store.
//!
//! The [`MemoryStore`] keeps every row in a map and maintains an ordered index
//! of active codes per level, so sibling lookups are range scans rather than
//! full passes over the catalog.

use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;

use super::{check_parent, Store, StoreError};
use crate::domain::{reconcile::Plan, Code, Level, NewNode, Node, Segment};

/// An in-memory representation of the four catalog tables.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MemoryStore {
    /// Every row, active or not.
    rows: HashMap<Uuid, Node>,

    /// Active codes per level, indexed by `depth - 1`.
    active: [BTreeMap<Code, Uuid>; 4],
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows, active or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the store holds no rows at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Inserts a fully formed row, bypassing allocation.
    ///
    /// Useful for seeding legacy data such as duplicate rows that the normal
    /// create path would never produce.
    ///
    /// # Panics
    ///
    /// Panics if a row with the same id already exists.
    pub fn restore(&mut self, node: Node) {
        assert!(
            !self.rows.contains_key(&node.id),
            "Duplicate node id: {}",
            node.id
        );
        if node.is_active {
            self.index_mut(node.level).insert(node.code.clone(), node.id);
        }
        self.rows.insert(node.id, node);
    }

    fn index(&self, level: Level) -> &BTreeMap<Code, Uuid> {
        &self.active[level.depth() - 1]
    }

    fn index_mut(&mut self, level: Level) -> &mut BTreeMap<Code, Uuid> {
        &mut self.active[level.depth() - 1]
    }

    fn row_mut(&mut self, level: Level, id: Uuid) -> Result<&mut Node, StoreError> {
        self.rows
            .get_mut(&id)
            .filter(|n| n.level == level)
            .ok_or(StoreError::NotFound { level, id })
    }

    fn apply_in_place(&mut self, plan: &Plan) -> Result<(), StoreError> {
        let now = Utc::now();

        for step in &plan.reparent {
            let parent_level = step
                .level
                .parent()
                .ok_or(StoreError::ParentMismatch(step.level))?;
            if self.find_by_id(parent_level, step.parent_id)?.is_none() {
                return Err(StoreError::ParentNotFound(step.parent_id));
            }
            let row = self.row_mut(step.level, step.id)?;
            row.parent_id = Some(step.parent_id);
            row.updated_at = now;
        }

        // Release every old code before claiming new ones, so that a subtree
        // can shift onto codes its own members used to hold.
        for step in &plan.recode {
            let row = self.row_mut(step.level, step.id)?;
            let old = row.code.clone();
            if row.is_active {
                self.index_mut(step.level).remove(&old);
            }
        }
        for step in &plan.recode {
            let row = self.row_mut(step.level, step.id)?;
            row.code = step.to.clone();
            row.sort_order = step.to.sort_key();
            row.updated_at = now;
            let is_active = row.is_active;
            if is_active {
                let index = self.index_mut(step.level);
                if index.contains_key(&step.to) {
                    return Err(StoreError::DuplicateCode {
                        code: step.to.clone(),
                    });
                }
                index.insert(step.to.clone(), step.id);
            }
        }

        let mut removals: Vec<_> = plan.delete.iter().collect();
        removals.sort_by_key(|r| std::cmp::Reverse(r.level));
        for removal in removals {
            if let Some(child) = removal.level.child() {
                let leftovers: Vec<Uuid> = self
                    .rows
                    .values()
                    .filter(|n| n.level == child && n.parent_id == Some(removal.id))
                    .map(|n| n.id)
                    .collect();
                let survivor_missing = self.find_by_id(removal.level, removal.survivor)?.is_none();
                if !leftovers.is_empty() && survivor_missing {
                    return Err(StoreError::ParentNotFound(removal.survivor));
                }
                for id in leftovers {
                    let row = self.row_mut(child, id)?;
                    row.parent_id = Some(removal.survivor);
                    row.updated_at = now;
                }
            }
            let row = self
                .rows
                .remove(&removal.id)
                .filter(|n| n.level == removal.level)
                .ok_or(StoreError::NotFound {
                    level: removal.level,
                    id: removal.id,
                })?;
            if row.is_active {
                self.index_mut(row.level).remove(&row.code);
            }
        }

        Ok(())
    }
}

impl Store for MemoryStore {
    fn sibling_codes(
        &self,
        level: Level,
        parent: Option<&Code>,
    ) -> Result<Vec<String>, StoreError> {
        let index = self.index(level);
        let Some(parent) = parent else {
            return Ok(index.keys().map(ToString::to_string).collect());
        };
        let (Ok(start), Ok(end)) = (parent.child(Segment::MIN), parent.child(Segment::MAX)) else {
            return Ok(Vec::new());
        };
        if start.level() != level {
            return Ok(Vec::new());
        }
        Ok(index
            .range(start..=end)
            .map(|(code, _)| code.to_string())
            .collect())
    }

    fn code_exists(&self, code: &Code) -> Result<bool, StoreError> {
        Ok(self.index(code.level()).contains_key(code))
    }

    fn find(&self, code: &Code) -> Result<Option<Node>, StoreError> {
        Ok(self
            .index(code.level())
            .get(code)
            .and_then(|id| self.rows.get(id))
            .cloned())
    }

    fn find_by_id(&self, level: Level, id: Uuid) -> Result<Option<Node>, StoreError> {
        Ok(self.rows.get(&id).filter(|n| n.level == level).cloned())
    }

    #[instrument(level = "debug", skip(self, node), fields(code = %node.code))]
    fn insert(&mut self, node: NewNode) -> Result<Node, StoreError> {
        check_parent(&node)?;
        let level = node.level();

        if let (Some(parent_level), Some(parent_id)) = (level.parent(), node.parent_id) {
            if self.find_by_id(parent_level, parent_id)?.is_none() {
                return Err(StoreError::ParentNotFound(parent_id));
            }
        }
        if self.index(level).contains_key(&node.code) {
            return Err(StoreError::DuplicateCode { code: node.code });
        }

        let node = node.into_node(Utc::now());
        self.restore(node.clone());
        Ok(node)
    }

    fn list(
        &self,
        level: Level,
        parent_id: Option<Uuid>,
        include_inactive: bool,
    ) -> Result<Vec<Node>, StoreError> {
        let mut nodes: Vec<Node> = self
            .rows
            .values()
            .filter(|n| n.level == level)
            .filter(|n| include_inactive || n.is_active)
            .filter(|n| parent_id.is_none() || n.parent_id == parent_id)
            .cloned()
            .collect();
        nodes.sort_by(|a, b| {
            a.sort_order
                .cmp(&b.sort_order)
                .then_with(|| a.code.cmp(&b.code))
        });
        Ok(nodes)
    }

    fn active_children(&self, level: Level, id: Uuid) -> Result<usize, StoreError> {
        let Some(child) = level.child() else {
            return Ok(0);
        };
        Ok(self
            .rows
            .values()
            .filter(|n| n.level == child && n.is_active && n.parent_id == Some(id))
            .count())
    }

    fn deactivate(&mut self, level: Level, id: Uuid) -> Result<Node, StoreError> {
        let row = self
            .row_mut(level, id)
            .ok()
            .filter(|n| n.is_active)
            .ok_or(StoreError::NotFound { level, id })?;
        row.is_active = false;
        row.updated_at = Utc::now();
        let node = row.clone();
        self.index_mut(level).remove(&node.code);
        Ok(node)
    }

    #[instrument(
        level = "debug",
        skip_all,
        fields(steps = plan.reparent.len() + plan.recode.len() + plan.delete.len())
    )]
    fn apply(&mut self, plan: &Plan) -> Result<(), StoreError> {
        let mut staged = self.clone();
        staged.apply_in_place(plan)?;
        *self = staged;
        Ok(())
    }
}
