//! Builders that assemble ledgers from configuration.

pub mod ledger_builder;

pub use ledger_builder::{build_ledgers, build_store, QuotaLedgers, SharedStore};
