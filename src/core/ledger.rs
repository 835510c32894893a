//! Quota ledger engine.
//!
//! One generic engine serves both quota classes. Every mutating operation runs
//! as a single staged mutation under the store's row lock for exactly one
//! record, so a call either applies all of its dimension changes or none.
//!
//! `get` and `requires` take no lock. A caller that runs `requires` and later
//! `deduct` has a check-to-use window between the two; only `deduct` is a
//! race-safe admission gate.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;

use crate::core::{
    build_ledger_event, AuditSink, Dimension, Mutation, QuotaClass, QuotaError, QuotaFilter,
    QuotaKind, QuotaRecord, QuotaStore, QuotaTotals, ResourceAmounts, ServiceRef, StoreError,
};
use crate::util::clock::now_ms;

/// Outcome of a lazy create attempt.
enum Created {
    /// This caller inserted the record.
    Inserted(QuotaRecord),
    /// Another caller created it first.
    Existing,
}

/// Quota ledger for one quota class, backed by a [`QuotaStore`].
pub struct QuotaLedger<K, S> {
    store: S,
    audit: Option<Arc<dyn AuditSink>>,
    _kind: PhantomData<fn() -> K>,
}

impl<K, S: Clone> Clone for QuotaLedger<K, S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            audit: self.audit.clone(),
            _kind: PhantomData,
        }
    }
}

impl<K, S> QuotaLedger<K, S>
where
    K: QuotaKind,
    S: QuotaStore,
{
    /// Create a ledger over `store`.
    pub const fn new(store: S) -> Self {
        Self {
            store,
            audit: None,
            _kind: PhantomData,
        }
    }

    /// Attach an audit sink receiving one event per applied mutation.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Quota class tracked by this ledger.
    pub const fn class(&self) -> QuotaClass {
        K::CLASS
    }

    /// Backing store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Current record of `service`, created with zero totals if absent.
    ///
    /// Returns `Ok(None)` when the record is absent and could not be created.
    /// Losing a creation race to another caller re-reads the winner's record.
    pub async fn get(&self, service: &ServiceRef) -> Result<Option<QuotaRecord>, QuotaError> {
        if let Some(record) = self.store.fetch(K::CLASS, service).await? {
            return Ok(Some(record));
        }

        match self.ensure_record(service).await {
            Ok(Created::Inserted(record)) => Ok(Some(record)),
            Ok(Created::Existing) => Ok(self.store.fetch(K::CLASS, service).await?),
            Err(e) => {
                tracing::error!("{}: failed to create quota record for service {}: {}", K::CLASS, service, e);
                Ok(None)
            }
        }
    }

    /// Consume capacity in every requested dimension, or in none.
    ///
    /// A dimension with `total <= 0` is uncapped and always accepts.
    ///
    /// # Errors
    /// [`QuotaError::InvalidAmount`] for a negative amount,
    /// [`QuotaError::Shortage`] naming the first dimension lacking capacity,
    /// or a store failure.
    pub async fn deduct(
        &self,
        service: &ServiceRef,
        amounts: ResourceAmounts,
    ) -> Result<QuotaRecord, QuotaError> {
        amounts.validate()?;

        let mutation = |record: &mut QuotaRecord| -> Result<bool, QuotaError> {
            for (dim, requested) in amounts.requested() {
                check_capacity(K::CLASS, record, dim, requested)?;
                record.set_used(dim, record.used(dim).saturating_add(requested));
            }
            Ok(!amounts.is_empty())
        };

        let record = self
            .apply(service, &mutation)
            .await
            .inspect_err(|e| tracing::warn!("{} deduct rejected for service {}: {}", K::CLASS, service, e))?;
        self.record_audit("deduct", service, &amounts, !amounts.is_empty());
        Ok(record)
    }

    /// Return consumed capacity. `used` is floored at zero, so releasing more
    /// than was deducted is tolerated.
    ///
    /// # Errors
    /// [`QuotaError::InvalidAmount`] for a negative amount, or a store failure.
    pub async fn release(
        &self,
        service: &ServiceRef,
        amounts: ResourceAmounts,
    ) -> Result<QuotaRecord, QuotaError> {
        amounts.validate()?;

        let mutation = |record: &mut QuotaRecord| -> Result<bool, QuotaError> {
            for (dim, amount) in amounts.requested() {
                record.set_used(dim, (record.used(dim) - amount).max(0));
            }
            Ok(!amounts.is_empty())
        };

        let record = self.apply(service, &mutation).await?;
        self.record_audit("release", service, &amounts, !amounts.is_empty());
        Ok(record)
    }

    /// Raise totals by the given amounts.
    ///
    /// # Errors
    /// [`QuotaError::InvalidAmount`] for a negative amount, or a store failure.
    pub async fn increase(
        &self,
        service: &ServiceRef,
        amounts: ResourceAmounts,
    ) -> Result<QuotaRecord, QuotaError> {
        amounts.validate()?;

        let mutation = |record: &mut QuotaRecord| -> Result<bool, QuotaError> {
            for (dim, amount) in amounts.requested() {
                record.set_total(dim, record.total(dim).saturating_add(amount));
            }
            Ok(!amounts.is_empty())
        };

        let record = self.apply(service, &mutation).await?;
        self.record_audit("increase", service, &amounts, !amounts.is_empty());
        Ok(record)
    }

    /// Lower totals by the given amounts, floored at zero. `used` is left
    /// alone and may end up above `total`.
    ///
    /// # Errors
    /// [`QuotaError::InvalidAmount`] for a negative amount, or a store failure.
    pub async fn decrease(
        &self,
        service: &ServiceRef,
        amounts: ResourceAmounts,
    ) -> Result<QuotaRecord, QuotaError> {
        amounts.validate()?;

        let mutation = |record: &mut QuotaRecord| -> Result<bool, QuotaError> {
            for (dim, amount) in amounts.requested() {
                record.set_total(dim, (record.total(dim) - amount).max(0));
            }
            Ok(!amounts.is_empty())
        };

        let record = self.apply(service, &mutation).await?;
        for (dim, _) in amounts.requested() {
            if !record.is_uncapped(dim) && record.used(dim) > record.total(dim) {
                tracing::warn!(
                    "{} of service {} overcommitted on {}: used {} > total {}",
                    K::CLASS,
                    service,
                    dim,
                    record.used(dim),
                    record.total(dim)
                );
            }
        }
        self.record_audit("decrease", service, &amounts, !amounts.is_empty());
        Ok(record)
    }

    /// Check a snapshot against a request without locking or writing.
    ///
    /// The snapshot may be stale by the time the caller acts on the answer.
    ///
    /// # Errors
    /// [`QuotaError::InvalidAmount`] or [`QuotaError::Shortage`].
    pub fn requires(&self, quota: &QuotaRecord, amounts: ResourceAmounts) -> Result<(), QuotaError> {
        amounts.validate()?;
        amounts
            .requested()
            .try_for_each(|(dim, requested)| check_capacity(K::CLASS, quota, dim, requested))
    }

    /// Set absolute totals for the provided dimensions, each floored at zero.
    ///
    /// With `only_increase`, any provided value below the current total
    /// rejects the whole call before any dimension changes.
    ///
    /// # Errors
    /// [`QuotaError::OnlyIncrease`] or a store failure.
    pub async fn update(
        &self,
        service: &ServiceRef,
        totals: QuotaTotals,
        only_increase: bool,
    ) -> Result<QuotaRecord, QuotaError> {
        let mutation = |record: &mut QuotaRecord| -> Result<bool, QuotaError> {
            if only_increase {
                if let Some((dim, requested)) =
                    totals.provided().find(|(dim, value)| record.total(*dim) > *value)
                {
                    return Err(QuotaError::OnlyIncrease {
                        class: K::CLASS,
                        dimension: dim,
                        current: record.total(dim),
                        requested,
                    });
                }
            }
            let mut changed = false;
            for (dim, value) in totals.provided() {
                record.set_total(dim, value.max(0));
                changed = true;
            }
            Ok(changed)
        };

        let record = self
            .apply(service, &mutation)
            .await
            .inspect_err(|e| tracing::warn!("{} update rejected for service {}: {}", K::CLASS, service, e))?;
        self.record_audit("update", service, &totals, totals.provided().next().is_some());
        Ok(record)
    }

    /// Records of this class matching `filter`, newest first.
    ///
    /// # Errors
    /// Store failure.
    pub async fn list(&self, filter: &QuotaFilter) -> Result<Vec<QuotaRecord>, QuotaError> {
        Ok(self.store.list(K::CLASS, filter).await?)
    }

    async fn ensure_record(&self, service: &ServiceRef) -> Result<Created, StoreError> {
        let record = QuotaRecord::new(K::CLASS, service.clone(), now_ms());
        match self.store.insert(&record).await {
            Ok(()) => {
                tracing::debug!("{} created for service {}", K::CLASS, service);
                Ok(Created::Inserted(record))
            }
            Err(StoreError::Duplicate) => {
                tracing::debug!("{} for service {} created concurrently, re-reading", K::CLASS, service);
                Ok(Created::Existing)
            }
            Err(e) => Err(e),
        }
    }

    /// Run `mutation` under the row lock, creating the record first if absent.
    async fn apply(
        &self,
        service: &ServiceRef,
        mutation: Mutation<'_>,
    ) -> Result<QuotaRecord, QuotaError> {
        if let Some(record) = self.store.update_locked(K::CLASS, service, mutation).await? {
            return Ok(record);
        }

        if let Err(e) = self.ensure_record(service).await {
            tracing::error!("{}: failed to create quota record for service {}: {}", K::CLASS, service, e);
            return Err(self.unavailable(service));
        }

        self.store
            .update_locked(K::CLASS, service, mutation)
            .await?
            .ok_or_else(|| self.unavailable(service))
    }

    fn unavailable(&self, service: &ServiceRef) -> QuotaError {
        QuotaError::RecordUnavailable {
            class: K::CLASS,
            service: service.clone(),
        }
    }

    fn record_audit<A: Serialize>(&self, action: &str, service: &ServiceRef, amounts: &A, changed: bool) {
        if !changed {
            tracing::debug!("{} {} for service {} requested nothing", K::CLASS, action, service);
            return;
        }
        tracing::info!("{} {} applied for service {}", K::CLASS, action, service);
        if let Some(sink) = &self.audit {
            sink.record(build_ledger_event(K::CLASS, service, action, amounts));
        }
    }
}

fn check_capacity(
    class: QuotaClass,
    record: &QuotaRecord,
    dim: Dimension,
    requested: i64,
) -> Result<(), QuotaError> {
    if record.can_take(dim, requested) {
        return Ok(());
    }
    Err(QuotaError::Shortage {
        class,
        dimension: dim,
        requested,
        available: record.remaining(dim).max(0),
    })
}
