//! Quota store backends.

pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::InMemoryQuotaStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteQuotaStore;
