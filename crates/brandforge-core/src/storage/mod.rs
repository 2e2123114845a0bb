//! Storage layer - SQLite via sqlx
//!
//! - `database`: connection pool management and initialization
//! - `migrations`: schema versioning and automatic migration
//! - `store`: the [`ProjectStore`] seam and its SQLite implementation
//!
//! ```ignore
//! use brandforge_core::storage::{Database, SqliteProjectStore};
//!
//! let store = SqliteProjectStore::new(Database::in_memory().await?);
//! ```

pub mod database;
pub mod migrations;
pub mod store;

pub use database::{Database, DatabaseConfig};
pub use migrations::{CURRENT_VERSION, MigrationStatus, migration_status, run_migrations};
pub use store::{ProjectStore, SqliteProjectStore};
