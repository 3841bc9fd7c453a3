//! Duplicate reconciliation planning.
//!
//! Rows at the same level that share a parent and a name are duplicates. The
//! earliest-created row of each group survives; the others are deleted after
//! their children have been moved under the survivor. Planning is pure: it
//! works on a snapshot of every row and produces a [`Plan`] that a store
//! applies in a single transaction.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::domain::{
    allocator::{next_code, AllocError},
    Code, Level, Node,
};

/// A set of rows considered to be the same node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    /// Level of every row in the group.
    pub level: Level,
    /// The shared (trimmed) name.
    pub name: String,
    /// The shared parent.
    pub parent_id: Option<Uuid>,
    /// The surviving row and its code.
    pub canonical: (Uuid, Code),
    /// The rows to be removed and their codes.
    pub duplicates: Vec<(Uuid, Code)>,
}

/// Move a row under a new parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reparent {
    /// Level of the row being moved.
    pub level: Level,
    /// The row being moved.
    pub id: Uuid,
    /// Its new parent.
    pub parent_id: Uuid,
}

/// Give an active row a new code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recode {
    /// Level of the row.
    pub level: Level,
    /// The row.
    pub id: Uuid,
    /// Code before reconciliation.
    pub from: Code,
    /// Code after reconciliation.
    pub to: Code,
}

/// Hard-delete a duplicate row.
///
/// Any child still pointing at the row when it is deleted, including rows the
/// snapshot could not decode, is moved under `survivor` first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Removal {
    /// Level of the row.
    pub level: Level,
    /// The row.
    pub id: Uuid,
    /// The canonical row that inherits leftover children.
    pub survivor: Uuid,
}

/// Everything a store must do, in order: re-parent, re-code, then delete.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Plan {
    /// Duplicate groups found, outermost level first.
    pub groups: Vec<DuplicateGroup>,
    /// Parent reassignments.
    pub reparent: Vec<Reparent>,
    /// Code changes for moved subtrees, outermost level first.
    pub recode: Vec<Recode>,
    /// Rows to delete once nothing references them.
    pub delete: Vec<Removal>,
}

impl Plan {
    /// Whether there is nothing to do.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Plans the reconciliation of every duplicate group in `nodes`.
///
/// Levels are processed outermost first, so merging two divisions can surface
/// duplicate sections which are then merged in turn. Active children moved to
/// a new parent receive a fresh code under it and their subtrees are re-coded
/// to match; inactive children keep their historical codes.
///
/// # Errors
///
/// Returns [`AllocError::Exhausted`] if a survivor has no room left for the
/// children moved under it. Nothing should be applied in that case.
pub fn plan(nodes: Vec<Node>) -> Result<Plan, AllocError> {
    let mut rows: HashMap<Uuid, Node> = nodes.into_iter().map(|n| (n.id, n)).collect();
    let mut plan = Plan::default();
    // first code -> final code, per row
    let mut recoded: BTreeMap<Uuid, (Level, Code, Code)> = BTreeMap::new();

    for level in Level::ALL {
        for group in duplicate_groups(&rows, level) {
            let (canonical_id, canonical_code) = group.canonical.clone();

            for (duplicate_id, _) in &group.duplicates {
                if let Some(child_level) = level.child() {
                    move_children(
                        &mut rows,
                        &mut plan,
                        &mut recoded,
                        child_level,
                        *duplicate_id,
                        canonical_id,
                        &canonical_code,
                    )?;
                }
                rows.remove(duplicate_id);
                plan.delete.push(Removal {
                    level,
                    id: *duplicate_id,
                    survivor: canonical_id,
                });
            }

            debug!(
                %level,
                name = %group.name,
                canonical = %canonical_code,
                duplicates = group.duplicates.len(),
                "planned duplicate merge"
            );
            plan.groups.push(group);
        }
    }

    let deleted: HashSet<Uuid> = plan.delete.iter().map(|r| r.id).collect();
    let mut recode: Vec<Recode> = recoded
        .into_iter()
        .filter(|(id, (_, from, to))| from != to && !deleted.contains(id))
        .map(|(id, (level, from, to))| Recode {
            level,
            id,
            from,
            to,
        })
        .collect();
    recode.sort_by(|a, b| a.level.cmp(&b.level).then_with(|| a.to.cmp(&b.to)));
    plan.recode = recode;

    Ok(plan)
}

fn duplicate_groups(rows: &HashMap<Uuid, Node>, level: Level) -> Vec<DuplicateGroup> {
    let mut by_key: BTreeMap<(Option<Uuid>, String), Vec<&Node>> = BTreeMap::new();
    for node in rows.values().filter(|n| n.level == level && n.is_active) {
        by_key
            .entry((node.parent_id, node.name.trim().to_string()))
            .or_default()
            .push(node);
    }

    by_key
        .into_iter()
        .filter(|(_, members)| members.len() > 1)
        .filter_map(|((parent_id, name), mut members)| {
            members.sort_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| a.code.cmp(&b.code))
                    .then_with(|| a.id.cmp(&b.id))
            });
            let (canonical, duplicates) = members.split_first()?;
            Some(DuplicateGroup {
                level,
                name,
                parent_id,
                canonical: (canonical.id, canonical.code.clone()),
                duplicates: duplicates.iter().map(|n| (n.id, n.code.clone())).collect(),
            })
        })
        .collect()
}

fn move_children(
    rows: &mut HashMap<Uuid, Node>,
    plan: &mut Plan,
    recoded: &mut BTreeMap<Uuid, (Level, Code, Code)>,
    child_level: Level,
    from_parent: Uuid,
    to_parent: Uuid,
    to_code: &Code,
) -> Result<(), AllocError> {
    let mut children: Vec<(Uuid, Code, bool)> = rows
        .values()
        .filter(|n| n.level == child_level && n.parent_id == Some(from_parent))
        .map(|n| (n.id, n.code.clone(), n.is_active))
        .collect();
    children.sort_by(|a, b| a.1.cmp(&b.1));

    for (child_id, old_code, is_active) in children {
        if let Some(row) = rows.get_mut(&child_id) {
            row.parent_id = Some(to_parent);
        }
        plan.reparent.push(Reparent {
            level: child_level,
            id: child_id,
            parent_id: to_parent,
        });

        if !is_active {
            continue;
        }

        let siblings: Vec<String> = rows
            .values()
            .filter(|n| n.level == child_level && n.is_active && n.parent_id == Some(to_parent))
            .filter(|n| n.id != child_id)
            .map(|n| n.code.to_string())
            .collect();
        let new_code = next_code(
            child_level,
            Some(to_code),
            siblings.iter().map(String::as_str),
        )?;

        for id in active_subtree(rows, child_id) {
            let Some(row) = rows.get_mut(&id) else {
                continue;
            };
            let Some(rebased) = row.code.rebase(&old_code, &new_code) else {
                continue;
            };
            recoded
                .entry(id)
                .or_insert_with(|| (row.level, row.code.clone(), rebased.clone()))
                .2 = rebased.clone();
            row.sort_order = rebased.sort_key();
            row.code = rebased;
        }
    }

    Ok(())
}

/// `root` and every active row beneath it, following parent links.
fn active_subtree(rows: &HashMap<Uuid, Node>, root: Uuid) -> Vec<Uuid> {
    let mut found = vec![root];
    let mut seen: HashSet<Uuid> = HashSet::from([root]);
    let mut index = 0;

    while let Some(&current) = found.get(index) {
        index += 1;
        for node in rows.values() {
            if node.is_active && node.parent_id == Some(current) && seen.insert(node.id) {
                found.push(node.id);
            }
        }
    }

    found
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;

    struct Builder {
        nodes: Vec<Node>,
        tick: i64,
    }

    impl Builder {
        fn new() -> Self {
            Self {
                nodes: Vec::new(),
                tick: 0,
            }
        }

        fn add(&mut self, code: &str, name: &str, parent: Option<Uuid>) -> Uuid {
            self.add_with(code, name, parent, true)
        }

        fn add_with(
            &mut self,
            code: &str,
            name: &str,
            parent: Option<Uuid>,
            active: bool,
        ) -> Uuid {
            self.tick += 1;
            let code: Code = code.parse().unwrap();
            let created =
                Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(self.tick);
            let id = Uuid::new_v4();
            self.nodes.push(Node {
                id,
                level: code.level(),
                sort_order: code.sort_key(),
                code,
                name: name.to_string(),
                description: None,
                parent_id: parent,
                is_active: active,
                created_at: created,
                updated_at: created,
            });
            id
        }
    }

    #[test]
    fn no_duplicates_yields_empty_plan() {
        let mut b = Builder::new();
        let d = b.add("01", "Concrete", None);
        b.add("02", "Masonry", None);
        b.add("01.10", "Formwork", Some(d));

        let plan = plan(b.nodes).unwrap();
        assert!(plan.is_empty());
        assert!(plan.reparent.is_empty());
        assert!(plan.delete.is_empty());
    }

    #[test]
    fn earliest_row_survives_and_children_move() {
        let mut b = Builder::new();
        let first = b.add("01", "Concrete", None);
        let second = b.add("05", " Concrete ", None);
        let moved = b.add("05.10", "Rebar", Some(second));
        b.add("01.10", "Formwork", Some(first));

        let plan = plan(b.nodes).unwrap();

        assert_eq!(plan.groups.len(), 1);
        assert_eq!(plan.groups[0].canonical.0, first);
        assert_eq!(
            plan.delete,
            vec![Removal {
                level: Level::Division,
                id: second,
                survivor: first,
            }]
        );
        assert_eq!(
            plan.reparent,
            vec![Reparent {
                level: Level::Section,
                id: moved,
                parent_id: first,
            }]
        );
        assert_eq!(plan.recode.len(), 1);
        assert_eq!(plan.recode[0].from.to_string(), "05.10");
        assert_eq!(plan.recode[0].to.to_string(), "01.20");
    }

    #[test]
    fn moved_subtrees_are_recoded() {
        let mut b = Builder::new();
        b.add("01", "Concrete", None);
        let second = b.add("02", "Concrete", None);
        let section = b.add("02.10", "Rebar", Some(second));
        let assembly = b.add("02.10.10", "Bars", Some(section));
        let item = b.add("02.10.10.01", "12mm bar", Some(assembly));

        let plan = plan(b.nodes).unwrap();
        let codes: Vec<(Uuid, String)> = plan
            .recode
            .iter()
            .map(|r| (r.id, r.to.to_string()))
            .collect();
        assert_eq!(
            codes,
            vec![
                (section, "01.10".to_string()),
                (assembly, "01.10.10".to_string()),
                (item, "01.10.10.01".to_string()),
            ]
        );
    }

    #[test]
    fn merged_children_are_merged_in_turn() {
        let mut b = Builder::new();
        let first = b.add("01", "Concrete", None);
        let kept_section = b.add("01.10", "Formwork", Some(first));
        let second = b.add("02", "Concrete", None);
        let dup_section = b.add("02.10", "Formwork", Some(second));
        let assembly = b.add("02.10.10", "Slab forms", Some(dup_section));

        let plan = plan(b.nodes).unwrap();

        assert_eq!(plan.groups.len(), 2);
        assert_eq!(plan.groups[1].level, Level::Section);
        assert_eq!(plan.groups[1].canonical.0, kept_section);
        assert!(plan.delete.contains(&Removal {
            level: Level::Division,
            id: second,
            survivor: first,
        }));
        assert!(plan.delete.contains(&Removal {
            level: Level::Section,
            id: dup_section,
            survivor: kept_section,
        }));

        let last_parent = plan
            .reparent
            .iter()
            .rev()
            .find(|r| r.id == assembly)
            .unwrap();
        assert_eq!(last_parent.parent_id, kept_section);

        let final_code = plan.recode.iter().find(|r| r.id == assembly).unwrap();
        assert_eq!(final_code.from.to_string(), "02.10.10");
        assert_eq!(final_code.to.to_string(), "01.10.10");
    }

    #[test]
    fn inactive_children_are_reparented_but_keep_codes() {
        let mut b = Builder::new();
        let first = b.add("01", "Concrete", None);
        let second = b.add("02", "Concrete", None);
        let retired = b.add_with("02.10", "Old", Some(second), false);

        let plan = plan(b.nodes).unwrap();
        assert_eq!(
            plan.reparent,
            vec![Reparent {
                level: Level::Section,
                id: retired,
                parent_id: first,
            }]
        );
        assert!(plan.recode.is_empty());
    }

    #[test]
    fn inactive_rows_are_not_duplicates() {
        let mut b = Builder::new();
        b.add("01", "Concrete", None);
        b.add_with("02", "Concrete", None, false);

        assert!(plan(b.nodes).unwrap().is_empty());
    }

    #[test]
    fn same_name_under_different_parents_is_not_duplicate() {
        let mut b = Builder::new();
        let a = b.add("01", "Concrete", None);
        let m = b.add("02", "Masonry", None);
        b.add("01.10", "General", Some(a));
        b.add("02.10", "General", Some(m));

        assert!(plan(b.nodes).unwrap().is_empty());
    }

    #[test]
    fn exhausted_survivor_aborts_plan() {
        let mut b = Builder::new();
        let first = b.add("01", "Concrete", None);
        b.add("01.90", "Full", Some(first));
        let second = b.add("02", "Concrete", None);
        b.add("02.10", "Rebar", Some(second));

        assert!(matches!(plan(b.nodes), Err(AllocError::Exhausted { .. })));
    }
}
