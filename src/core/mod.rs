//! Quota records, the ledger engine and its store abstraction.

pub mod audit;
pub mod classes;
pub mod error;
pub mod ledger;
pub mod record;
pub mod store;

pub use audit::{build_ledger_event, AuditSink, InMemoryAuditSink, LedgerEvent, TracingAuditSink};
pub use classes::{Private, PrivateQuotaLedger, QuotaKind, Share, ShareQuotaLedger};
pub use error::{AppResult, QuotaError, QuotaErrorKind, StoreError};
pub use ledger::QuotaLedger;
pub use record::{
    Dimension, QuotaClass, QuotaFilter, QuotaRecord, QuotaTotals, ResourceAmounts, ServiceRef,
    ServiceUnit,
};
pub use store::{Mutation, QuotaStore};
