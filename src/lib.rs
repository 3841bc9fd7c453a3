//! Hierarchical codes for construction cost-library catalogs
//!
//! Catalog rows form a four-level tree (division, section, assembly, item)
//! addressed by dotted two-digit codes such as `03.10.20.01`. This crate
//! validates those codes, allocates the next free code under a parent, and
//! persists rows with a uniqueness guarantee on active codes.

pub mod domain;
pub use domain::{Code, Config, Level, NewNode, Node};

/// Persistence backends for catalog rows.
pub mod storage;
pub use storage::{MemoryStore, SqliteStore, Store, StoreError};

pub mod library;
pub use library::{CreateNode, Library};

/// HTTP API over a catalog.
pub mod server;
