//! Configuration models for the ledger store and audit trail.

pub mod ledger;

pub use ledger::{
    LedgerConfig, StoreConfig, ENV_AUDIT_EVENTS, ENV_DATABASE_URL, ENV_MAX_CONNECTIONS,
};
