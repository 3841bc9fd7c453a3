//! Domain models for the cost-library catalog.
//!
//! This module contains the core domain types: hierarchy levels, codes, the
//! code allocator, stored nodes, duplicate reconciliation and configuration.
//! Nothing in here touches storage.

/// Hierarchy levels.
pub mod level;
pub use level::{Level, UnsupportedLevel};

/// Hierarchical codes, their validation and sort keys.
pub mod code;
pub use code::{Code, Error as CodeError, Segment};

pub mod allocator;
pub use allocator::AllocError;

mod config;
pub use config::Config;

/// Stored catalog rows.
pub mod node;
pub use node::{NewNode, Node};

pub mod reconcile;
