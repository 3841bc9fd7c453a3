//! `SQLite` persistence for the catalog.
//!
//! One table per hierarchy level. Active codes are kept unique by a partial
//! index, which is also what resolves two writers racing for the same freshly
//! allocated code: the second insert fails and surfaces as
//! [`StoreError::DuplicateCode`].

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::{DateTime, Utc};
use rusqlite::{ffi, params, Connection, ErrorCode, OptionalExtension, Row};
use tracing::{instrument, warn};
use uuid::Uuid;

use super::{check_parent, Store, StoreError};
use crate::domain::{reconcile::Plan, Code, Level, NewNode, Node};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = r"
    PRAGMA journal_mode=WAL;
    PRAGMA synchronous=NORMAL;
    PRAGMA foreign_keys=ON;

    CREATE TABLE IF NOT EXISTS divisions (
      id TEXT PRIMARY KEY NOT NULL,
      code TEXT NOT NULL,
      name TEXT NOT NULL,
      description TEXT,
      sort_order INTEGER NOT NULL,
      is_active INTEGER NOT NULL DEFAULT 1,
      created_at TEXT NOT NULL,
      updated_at TEXT NOT NULL
    );
    CREATE UNIQUE INDEX IF NOT EXISTS divisions_active_code
      ON divisions(code) WHERE is_active = 1;

    CREATE TABLE IF NOT EXISTS sections (
      id TEXT PRIMARY KEY NOT NULL,
      division_id TEXT NOT NULL REFERENCES divisions(id),
      code TEXT NOT NULL,
      name TEXT NOT NULL,
      description TEXT,
      sort_order INTEGER NOT NULL,
      is_active INTEGER NOT NULL DEFAULT 1,
      created_at TEXT NOT NULL,
      updated_at TEXT NOT NULL
    );
    CREATE UNIQUE INDEX IF NOT EXISTS sections_active_code
      ON sections(code) WHERE is_active = 1;
    CREATE INDEX IF NOT EXISTS sections_parent ON sections(division_id);

    CREATE TABLE IF NOT EXISTS assemblies (
      id TEXT PRIMARY KEY NOT NULL,
      section_id TEXT NOT NULL REFERENCES sections(id),
      code TEXT NOT NULL,
      name TEXT NOT NULL,
      description TEXT,
      sort_order INTEGER NOT NULL,
      is_active INTEGER NOT NULL DEFAULT 1,
      created_at TEXT NOT NULL,
      updated_at TEXT NOT NULL
    );
    CREATE UNIQUE INDEX IF NOT EXISTS assemblies_active_code
      ON assemblies(code) WHERE is_active = 1;
    CREATE INDEX IF NOT EXISTS assemblies_parent ON assemblies(section_id);

    CREATE TABLE IF NOT EXISTS items (
      id TEXT PRIMARY KEY NOT NULL,
      assembly_id TEXT NOT NULL REFERENCES assemblies(id),
      code TEXT NOT NULL,
      name TEXT NOT NULL,
      description TEXT,
      sort_order INTEGER NOT NULL,
      is_active INTEGER NOT NULL DEFAULT 1,
      created_at TEXT NOT NULL,
      updated_at TEXT NOT NULL
    );
    CREATE UNIQUE INDEX IF NOT EXISTS items_active_code
      ON items(code) WHERE is_active = 1;
    CREATE INDEX IF NOT EXISTS items_parent ON items(assembly_id);
";

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::unavailable(err)
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::unavailable(err)
    }
}

/// A catalog backed by a `SQLite` database.
#[derive(Debug)]
pub struct SqliteStore {
    path: Option<PathBuf>,
    conn: Connection,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `path` and brings its schema
    /// up to date.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the file cannot be opened or
    /// migrated.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let conn = Connection::open(&path)?;
        let store = Self {
            path: Some(path),
            conn,
        };
        store.migrate()?;
        Ok(store)
    }

    /// Opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the schema cannot be created.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let store = Self {
            path: None,
            conn: Connection::open_in_memory()?,
        };
        store.migrate()?;
        Ok(store)
    }

    /// The database file, or `None` for an in-memory database.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn migrate(&self) -> Result<(), StoreError> {
        self.conn.busy_timeout(BUSY_TIMEOUT)?;
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    fn select(level: Level) -> String {
        let parent = level.parent_column().unwrap_or("NULL");
        format!(
            "SELECT id, code, name, description, {parent} AS parent_id, sort_order, is_active, \
             created_at, updated_at FROM {}",
            level.table()
        )
    }
}

impl Store for SqliteStore {
    fn sibling_codes(
        &self,
        level: Level,
        parent: Option<&Code>,
    ) -> Result<Vec<String>, StoreError> {
        let table = level.table();
        let codes = match parent {
            None => {
                let mut stmt = self
                    .conn
                    .prepare(&format!("SELECT code FROM {table} WHERE is_active = 1"))?;
                stmt.query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?
            }
            Some(parent) => {
                let prefix = format!("{parent}.");
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT code FROM {table} \
                     WHERE is_active = 1 AND substr(code, 1, length(?1)) = ?1"
                ))?;
                stmt.query_map(params![prefix], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?
            }
        };
        Ok(codes)
    }

    fn code_exists(&self, code: &Code) -> Result<bool, StoreError> {
        let exists = self.conn.query_row(
            &format!(
                "SELECT EXISTS(SELECT 1 FROM {} WHERE code = ?1 AND is_active = 1)",
                code.level().table()
            ),
            params![code.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn find(&self, code: &Code) -> Result<Option<Node>, StoreError> {
        let level = code.level();
        let raw = self
            .conn
            .query_row(
                &format!("{} WHERE code = ?1 AND is_active = 1", Self::select(level)),
                params![code.to_string()],
                RawRow::from_row,
            )
            .optional()?;
        raw.map(|raw| raw.into_node(level)).transpose()
    }

    fn find_by_id(&self, level: Level, id: Uuid) -> Result<Option<Node>, StoreError> {
        let raw = self
            .conn
            .query_row(
                &format!("{} WHERE id = ?1", Self::select(level)),
                params![id.to_string()],
                RawRow::from_row,
            )
            .optional()?;
        raw.map(|raw| raw.into_node(level)).transpose()
    }

    #[instrument(level = "debug", skip(self, node), fields(code = %node.code))]
    fn insert(&mut self, node: NewNode) -> Result<Node, StoreError> {
        check_parent(&node)?;
        let node = node.into_node(Utc::now());
        let table = node.level.table();
        let sort_order = to_sql_sort_order(node.sort_order)?;

        let result = match (node.level.parent_column(), node.parent_id) {
            (Some(column), Some(parent_id)) => self.conn.execute(
                &format!(
                    "INSERT INTO {table} (id, {column}, code, name, description, sort_order, \
                     is_active, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?8)"
                ),
                params![
                    node.id.to_string(),
                    parent_id.to_string(),
                    node.code.to_string(),
                    node.name,
                    node.description,
                    sort_order,
                    node.created_at,
                    node.updated_at,
                ],
            ),
            _ => self.conn.execute(
                &format!(
                    "INSERT INTO {table} (id, code, name, description, sort_order, is_active, \
                     created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?7)"
                ),
                params![
                    node.id.to_string(),
                    node.code.to_string(),
                    node.name,
                    node.description,
                    sort_order,
                    node.created_at,
                    node.updated_at,
                ],
            ),
        };

        result.map_err(|err| match violation(&err) {
            Some(Violation::Unique) => StoreError::DuplicateCode {
                code: node.code.clone(),
            },
            Some(Violation::ForeignKey) => {
                StoreError::ParentNotFound(node.parent_id.unwrap_or_default())
            }
            None => err.into(),
        })?;
        Ok(node)
    }

    fn list(
        &self,
        level: Level,
        parent_id: Option<Uuid>,
        include_inactive: bool,
    ) -> Result<Vec<Node>, StoreError> {
        let parent = level.parent_column().unwrap_or("NULL");
        let mut stmt = self.conn.prepare(&format!(
            "{} WHERE (?1 IS NULL OR {parent} = ?1) AND (?2 OR is_active = 1) \
             ORDER BY sort_order, code",
            Self::select(level)
        ))?;
        let rows = stmt
            .query_map(
                params![parent_id.map(|id| id.to_string()), include_inactive],
                RawRow::from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows
            .into_iter()
            .filter_map(|raw| {
                raw.into_node(level)
                    .inspect_err(|e| warn!("Skipping unreadable row: {e}"))
                    .ok()
            })
            .collect())
    }

    fn active_children(&self, level: Level, id: Uuid) -> Result<usize, StoreError> {
        let Some(child) = level.child() else {
            return Ok(0);
        };
        let Some(column) = child.parent_column() else {
            return Ok(0);
        };
        let count: i64 = self.conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM {} WHERE {column} = ?1 AND is_active = 1",
                child.table()
            ),
            params![id.to_string()],
            |row| row.get(0),
        )?;
        usize::try_from(count).map_err(StoreError::unavailable)
    }

    fn deactivate(&mut self, level: Level, id: Uuid) -> Result<Node, StoreError> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE {} SET is_active = 0, updated_at = ?2 WHERE id = ?1 AND is_active = 1",
                level.table()
            ),
            params![id.to_string(), Utc::now()],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound { level, id });
        }
        self.find_by_id(level, id)?
            .ok_or(StoreError::NotFound { level, id })
    }

    #[instrument(
        level = "debug",
        skip_all,
        fields(steps = plan.reparent.len() + plan.recode.len() + plan.delete.len())
    )]
    fn apply(&mut self, plan: &Plan) -> Result<(), StoreError> {
        let now = Utc::now();
        let tx = self.conn.transaction()?;

        for step in &plan.reparent {
            let column = step
                .level
                .parent_column()
                .ok_or(StoreError::ParentMismatch(step.level))?;
            let changed = tx
                .execute(
                    &format!(
                        "UPDATE {} SET {column} = ?1, updated_at = ?2 WHERE id = ?3",
                        step.level.table()
                    ),
                    params![step.parent_id.to_string(), now, step.id.to_string()],
                )
                .map_err(|err| match violation(&err) {
                    Some(Violation::ForeignKey) => StoreError::ParentNotFound(step.parent_id),
                    _ => err.into(),
                })?;
            if changed == 0 {
                return Err(StoreError::NotFound {
                    level: step.level,
                    id: step.id,
                });
            }
        }

        // Park every moving row on a code no other row can hold, then assign
        // the final codes, so the active-code index never sees a transient
        // collision.
        for step in &plan.recode {
            let changed = tx.execute(
                &format!("UPDATE {} SET code = ?1 WHERE id = ?2", step.level.table()),
                params![format!("{}~{}", step.from, step.id), step.id.to_string()],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound {
                    level: step.level,
                    id: step.id,
                });
            }
        }
        for step in &plan.recode {
            tx.execute(
                &format!(
                    "UPDATE {} SET code = ?1, sort_order = ?2, updated_at = ?3 WHERE id = ?4",
                    step.level.table()
                ),
                params![
                    step.to.to_string(),
                    to_sql_sort_order(step.to.sort_key())?,
                    now,
                    step.id.to_string()
                ],
            )
            .map_err(|err| match violation(&err) {
                Some(Violation::Unique) => StoreError::DuplicateCode {
                    code: step.to.clone(),
                },
                _ => err.into(),
            })?;
        }

        let mut removals: Vec<_> = plan.delete.iter().collect();
        removals.sort_by_key(|r| std::cmp::Reverse(r.level));
        for removal in removals {
            // children the snapshot could not decode were never planned
            if let Some(child) = removal.level.child() {
                if let Some(column) = child.parent_column() {
                    let swept = tx
                        .execute(
                            &format!(
                                "UPDATE {} SET {column} = ?1, updated_at = ?2 \
                                 WHERE {column} = ?3",
                                child.table()
                            ),
                            params![removal.survivor.to_string(), now, removal.id.to_string()],
                        )
                        .map_err(|err| match violation(&err) {
                            Some(Violation::ForeignKey) => {
                                StoreError::ParentNotFound(removal.survivor)
                            }
                            _ => err.into(),
                        })?;
                    if swept > 0 {
                        warn!(
                            from = %removal.id,
                            to = %removal.survivor,
                            "Moved {swept} unplanned {} to the surviving {}",
                            child.plural(),
                            removal.level
                        );
                    }
                }
            }
            let changed = tx
                .execute(
                    &format!("DELETE FROM {} WHERE id = ?1", removal.level.table()),
                    params![removal.id.to_string()],
                )
                .map_err(|err| match violation(&err) {
                    Some(Violation::ForeignKey) => StoreError::StillReferenced {
                        level: removal.level,
                        id: removal.id,
                    },
                    _ => err.into(),
                })?;
            if changed == 0 {
                return Err(StoreError::NotFound {
                    level: removal.level,
                    id: removal.id,
                });
            }
        }

        tx.commit()?;
        Ok(())
    }
}

/// A row as stored, before its columns are checked.
struct RawRow {
    id: String,
    code: String,
    name: String,
    description: Option<String>,
    parent_id: Option<String>,
    sort_order: i64,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            code: row.get("code")?,
            name: row.get("name")?,
            description: row.get("description")?,
            parent_id: row.get("parent_id")?,
            sort_order: row.get("sort_order")?,
            is_active: row.get("is_active")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn into_node(self, level: Level) -> Result<Node, StoreError> {
        let corrupt = |detail: String| StoreError::Corrupt {
            level,
            id: self.id.clone(),
            detail,
        };

        let id = Uuid::parse_str(&self.id).map_err(|e| corrupt(format!("bad id: {e}")))?;
        let code = Code::parse(&self.code, level).map_err(|e| corrupt(e.to_string()))?;
        let parent_id = self
            .parent_id
            .as_deref()
            .map(Uuid::parse_str)
            .transpose()
            .map_err(|e| corrupt(format!("bad parent id: {e}")))?;
        let sort_order =
            u64::try_from(self.sort_order).map_err(|e| corrupt(format!("bad sort order: {e}")))?;

        Ok(Node {
            id,
            level,
            code,
            name: self.name,
            description: self.description,
            parent_id,
            sort_order,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

enum Violation {
    Unique,
    ForeignKey,
}

fn violation(err: &rusqlite::Error) -> Option<Violation> {
    let rusqlite::Error::SqliteFailure(failure, _) = err else {
        return None;
    };
    if failure.code != ErrorCode::ConstraintViolation {
        return None;
    }
    match failure.extended_code {
        ffi::SQLITE_CONSTRAINT_UNIQUE => Some(Violation::Unique),
        ffi::SQLITE_CONSTRAINT_FOREIGNKEY => Some(Violation::ForeignKey),
        _ => None,
    }
}

fn to_sql_sort_order(value: u64) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(StoreError::unavailable)
}

#[cfg(test)]
mod tests {
    use non_empty_string::NonEmptyString;

    use super::*;
    use crate::domain::reconcile::{Recode, Removal, Reparent};

    fn new_node(code: &str, name: &str, parent_id: Option<Uuid>) -> NewNode {
        NewNode {
            code: code.parse().unwrap(),
            name: NonEmptyString::new(name.to_string()).unwrap(),
            description: None,
            parent_id,
        }
    }

    #[test]
    fn open_creates_schema_on_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("catalog.db");

        let mut store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.path(), Some(path.as_path()));
        store.insert(new_node("03", "Concrete", None)).unwrap();
        drop(store);

        let reopened = SqliteStore::open(&path).unwrap();
        assert!(reopened.code_exists(&"03".parse().unwrap()).unwrap());
    }

    #[test]
    fn insert_round_trips_every_column() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let division = store.insert(new_node("03", "Concrete", None)).unwrap();
        let mut section = new_node("03.10", "Formwork", Some(division.id));
        section.description = Some("Forms for cast-in-place".to_string());
        let section = store.insert(section).unwrap();

        let found = store.find(&section.code).unwrap().unwrap();
        assert_eq!(found.id, section.id);
        assert_eq!(found.parent_id, Some(division.id));
        assert_eq!(found.description.as_deref(), Some("Forms for cast-in-place"));
        assert_eq!(found.sort_order, 3_100_000);
        assert!(found.is_active);
        assert_eq!(found.created_at, section.created_at);
    }

    #[test]
    fn duplicate_active_code_maps_to_duplicate_code() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.insert(new_node("03", "Concrete", None)).unwrap();

        let error = store.insert(new_node("03", "Again", None)).unwrap_err();
        assert!(matches!(error, StoreError::DuplicateCode { code } if code.to_string() == "03"));
    }

    #[test]
    fn missing_parent_maps_to_parent_not_found() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let parent = Uuid::new_v4();

        let error = store
            .insert(new_node("03.10", "Formwork", Some(parent)))
            .unwrap_err();
        assert!(matches!(error, StoreError::ParentNotFound(id) if id == parent));
    }

    #[test]
    fn deactivated_code_is_free_again() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let old = store.insert(new_node("03", "Concrete", None)).unwrap();
        let deactivated = store.deactivate(Level::Division, old.id).unwrap();
        assert!(!deactivated.is_active);

        store.insert(new_node("03", "Concrete", None)).unwrap();
        assert_eq!(store.list(Level::Division, None, true).unwrap().len(), 2);
        assert_eq!(store.list(Level::Division, None, false).unwrap().len(), 1);
        assert!(matches!(
            store.deactivate(Level::Division, old.id),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn sibling_codes_include_malformed_rows() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let d = store.insert(new_node("03", "Concrete", None)).unwrap();
        store.insert(new_node("03.10", "Forms", Some(d.id))).unwrap();
        store
            .conn
            .execute(
                "INSERT INTO sections (id, division_id, code, name, sort_order, created_at, \
                 updated_at) VALUES (?1, ?2, '03.7', 'Legacy', 0, ?3, ?3)",
                params![Uuid::new_v4().to_string(), d.id.to_string(), Utc::now()],
            )
            .unwrap();

        let mut codes = store.sibling_codes(Level::Section, Some(&d.code)).unwrap();
        codes.sort();
        assert_eq!(codes, vec!["03.10", "03.7"]);

        // listing skips the row it cannot decode
        assert_eq!(store.list(Level::Section, Some(d.id), false).unwrap().len(), 1);
    }

    #[test]
    fn list_filters_by_parent_and_orders() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let a = store.insert(new_node("03", "Concrete", None)).unwrap();
        let b = store.insert(new_node("04", "Masonry", None)).unwrap();
        store.insert(new_node("03.20", "Rebar", Some(a.id))).unwrap();
        store.insert(new_node("03.10", "Forms", Some(a.id))).unwrap();
        store.insert(new_node("04.10", "Brick", Some(b.id))).unwrap();

        let codes: Vec<String> = store
            .list(Level::Section, Some(a.id), false)
            .unwrap()
            .into_iter()
            .map(|n| n.code.to_string())
            .collect();
        assert_eq!(codes, vec!["03.10", "03.20"]);
        assert_eq!(store.list(Level::Section, None, false).unwrap().len(), 3);
        assert_eq!(store.active_children(Level::Division, a.id).unwrap(), 2);
    }

    #[test]
    fn apply_is_all_or_nothing() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let keep = store.insert(new_node("01", "Concrete", None)).unwrap();
        let dup = store.insert(new_node("02", "Concrete", None)).unwrap();
        let child = store.insert(new_node("02.10", "Rebar", Some(dup.id))).unwrap();

        let broken = Plan {
            recode: vec![Recode {
                level: Level::Division,
                id: keep.id,
                from: keep.code.clone(),
                to: "05".parse().unwrap(),
            }],
            delete: vec![Removal {
                level: Level::Division,
                id: Uuid::new_v4(),
                survivor: keep.id,
            }],
            ..Plan::default()
        };
        let error = store.apply(&broken).unwrap_err();
        assert!(matches!(error, StoreError::NotFound { .. }));
        assert!(store.code_exists(&"01".parse().unwrap()).unwrap());
        assert!(!store.code_exists(&"05".parse().unwrap()).unwrap());

        let plan = Plan {
            reparent: vec![Reparent {
                level: Level::Section,
                id: child.id,
                parent_id: keep.id,
            }],
            recode: vec![Recode {
                level: Level::Section,
                id: child.id,
                from: child.code.clone(),
                to: "01.10".parse().unwrap(),
            }],
            delete: vec![Removal {
                level: Level::Division,
                id: dup.id,
                survivor: keep.id,
            }],
            ..Plan::default()
        };
        store.apply(&plan).unwrap();

        let moved = store.find_by_id(Level::Section, child.id).unwrap().unwrap();
        assert_eq!(moved.code.to_string(), "01.10");
        assert_eq!(moved.parent_id, Some(keep.id));
        assert_eq!(store.find_by_id(Level::Division, dup.id).unwrap(), None);
    }

    #[test]
    fn reconcile_moves_undecodable_children_to_the_survivor() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let keep = store.insert(new_node("01", "Concrete", None)).unwrap();
        let dup = store.insert(new_node("02", "Concrete", None)).unwrap();
        let legacy = Uuid::new_v4();
        store
            .conn
            .execute(
                "INSERT INTO sections (id, division_id, code, name, sort_order, created_at, \
                 updated_at) VALUES (?1, ?2, '02.7', 'Legacy', 0, ?3, ?3)",
                params![legacy.to_string(), dup.id.to_string(), Utc::now()],
            )
            .unwrap();

        let mut library = crate::Library::new(store, &crate::Config::default());
        let report = library.reconcile(true).unwrap();
        assert!(report.applied);
        assert_eq!(report.plan.delete.len(), 1);

        let store = library.store();
        assert_eq!(store.find_by_id(Level::Division, dup.id).unwrap(), None);
        let parent: String = store
            .conn
            .query_row(
                "SELECT division_id FROM sections WHERE id = ?1",
                params![legacy.to_string()],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(parent, keep.id.to_string());
    }
}
