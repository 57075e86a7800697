mod batch;
mod memory;
mod repository;
pub mod sqlite;
mod store;

pub use batch::*;
pub use memory::*;
pub use repository::*;
pub use sqlite::SqliteStore;
pub use store::*;

/// SQL migration for the key/value table
pub const MIGRATION_001_INITIAL: &str = include_str!("migrations/001_initial.sql");
