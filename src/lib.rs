//! # Quota Ledger
//!
//! Per-service resource quota accounting for a cloud-resource brokering console.
//!
//! Every service unit owns two quota records, one per capacity pool:
//!
//! - **Private quota**: capacity reserved to the service unit's direct users
//! - **Share quota**: capacity drawn from the pool shared across its users
//!
//! Each record tracks a `total` and a `used` counter for five dimensions: vCPU,
//! RAM (GiB), disk (GB), public IPs and private IPs. A `total` of zero or less
//! leaves the dimension uncapped.
//!
//! ## Guarantees
//!
//! - **All-or-nothing**: `deduct` checks every requested dimension under one
//!   row lock and persists the whole batch or nothing
//! - **No overdraw**: `used` never exceeds a positive `total` through `deduct`
//! - **Floor at zero**: `release` and `decrease` never drive a counter negative
//! - **Monotonic resize**: `update` with `only_increase` refuses any shrink
//!
//! ## Usage
//!
//! ```rust,ignore
//! use quota_ledger::config::LedgerConfig;
//! use quota_ledger::builders::build_ledgers;
//! use quota_ledger::core::{ResourceAmounts, ServiceRef};
//!
//! let ledgers = build_ledgers(&LedgerConfig::from_env()?).await?;
//! let service = ServiceRef::new("svc-1");
//!
//! ledgers.private.increase(&service, ResourceAmounts::new().with_vcpus(16)).await?;
//! ledgers.private.deduct(&service, ResourceAmounts::new().with_vcpus(4).with_ram_gib(8)).await?;
//! ```
//!
//! `requires` is a cheap, lock-free preflight check against a snapshot from
//! `get`; it does not reserve anything. Use `deduct` as the admission gate.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Quota records, the ledger engine, errors and the store abstraction.
pub mod core;
/// Configuration models for the store backend and audit trail.
pub mod config;
/// Builders to construct ledgers from configuration.
pub mod builders;
/// Store backends.
pub mod infra;
/// Shared utilities.
pub mod util;

pub use crate::core::{
    Dimension, PrivateQuotaLedger, QuotaClass, QuotaError, QuotaErrorKind, QuotaLedger,
    QuotaRecord, QuotaTotals, ResourceAmounts, ServiceRef, ShareQuotaLedger,
};
