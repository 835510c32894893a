//! Infrastructure adapters for quota record storage.

pub mod store;

pub use store::InMemoryQuotaStore;
#[cfg(feature = "sqlite")]
pub use store::SqliteQuotaStore;
