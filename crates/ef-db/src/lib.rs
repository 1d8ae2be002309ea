//! ef-db: persistence ports and their storage backends.
//!
//! The executor only sees the repository traits in [`repository`]. Two
//! backends implement them: [`MemoryStore`] for tests and one-shot runs,
//! and [`SqliteStore`], an r2d2-pooled SQLite database with embedded
//! migrations. Both route every state change through the entity's own
//! transition table, so an illegal transition is rejected at the storage
//! boundary no matter who asks for it.

pub mod memory;
pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;
pub mod repository;
pub mod sqlite;

#[cfg(test)]
mod contract;

pub use memory::MemoryStore;
pub use repository::{JobRepository, ProfileRepository, ProgressRepository, Store, TaskRepository};
pub use sqlite::SqliteStore;
