//! Error types for quota ledger operations.

use thiserror::Error;

use crate::core::{Dimension, QuotaClass, ServiceRef};

/// Failures reported by a [`QuotaStore`](crate::core::QuotaStore) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A record for the same (class, service) pair already exists.
    #[error("duplicate quota record")]
    Duplicate,
    /// Backend-specific failure with context.
    #[error("backend error: {0}")]
    Backend(String),
}

#[cfg(feature = "sqlite")]
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => Self::Duplicate,
            _ => Self::Backend(err.to_string()),
        }
    }
}

/// Errors produced by ledger operations.
#[derive(Debug, Error)]
pub enum QuotaError {
    /// A negative amount was passed for some dimension.
    #[error("invalid amount {amount} for {dimension}: quota amounts must not be negative")]
    InvalidAmount {
        /// First offending dimension.
        dimension: Dimension,
        /// Value supplied by the caller.
        amount: i64,
    },
    /// The record was missing and could not be created.
    #[error("{class}, failed to create quota record for service {service}")]
    RecordUnavailable {
        /// Quota class of the record.
        class: QuotaClass,
        /// Service the record belongs to.
        service: ServiceRef,
    },
    /// Reading or persisting the record failed.
    #[error("quota store failure: {0}")]
    Store(#[from] StoreError),
    /// Remaining capacity of a dimension is below the requested amount.
    #[error("{class}, {dimension} quota shortage (requested {requested}, available {available})")]
    Shortage {
        /// Quota class of the record.
        class: QuotaClass,
        /// Dimension lacking capacity.
        dimension: Dimension,
        /// Amount asked for.
        requested: i64,
        /// `total - used` at check time.
        available: i64,
    },
    /// `update` would shrink a total while only increases are allowed.
    #[error("{class}, {dimension} quota may only be increased (current {current}, requested {requested})")]
    OnlyIncrease {
        /// Quota class of the record.
        class: QuotaClass,
        /// Dimension that would shrink.
        dimension: Dimension,
        /// Current total.
        current: i64,
        /// Requested total.
        requested: i64,
    },
}

/// Coarse classification of [`QuotaError`] for callers that map errors onto
/// responses (invalid input or infrastructure, shortage, shrink refused).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaErrorKind {
    /// Invalid input or infrastructure failure.
    Quota,
    /// Insufficient remaining capacity.
    Shortage,
    /// Shrinking refused by the only-increase policy.
    OnlyIncrease,
}

impl QuotaError {
    /// Classify this error.
    pub const fn kind(&self) -> QuotaErrorKind {
        match self {
            Self::InvalidAmount { .. } | Self::RecordUnavailable { .. } | Self::Store(_) => {
                QuotaErrorKind::Quota
            }
            Self::Shortage { .. } => QuotaErrorKind::Shortage,
            Self::OnlyIncrease { .. } => QuotaErrorKind::OnlyIncrease,
        }
    }

    /// Dimension named by the error, if any.
    pub const fn dimension(&self) -> Option<Dimension> {
        match self {
            Self::InvalidAmount { dimension, .. }
            | Self::Shortage { dimension, .. }
            | Self::OnlyIncrease { dimension, .. } => Some(*dimension),
            Self::RecordUnavailable { .. } | Self::Store(_) => None,
        }
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
