//! Record repository abstraction backing the ledger.

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::{QuotaClass, QuotaError, QuotaFilter, QuotaRecord, ServiceRef, ServiceUnit, StoreError};

/// Staged mutation run against a locked record copy.
///
/// Returns `Ok(true)` when the copy changed and must be persisted, `Ok(false)`
/// when nothing needs writing. An `Err` discards the copy.
pub type Mutation<'a> = &'a (dyn Fn(&mut QuotaRecord) -> Result<bool, QuotaError> + Sync);

/// Transactional store of quota records, unique per (class, service).
#[async_trait]
pub trait QuotaStore: Send + Sync {
    /// Read a record without locking.
    async fn fetch(
        &self,
        class: QuotaClass,
        service: &ServiceRef,
    ) -> Result<Option<QuotaRecord>, StoreError>;

    /// Insert a new record. Fails with [`StoreError::Duplicate`] if one exists.
    async fn insert(&self, record: &QuotaRecord) -> Result<(), StoreError>;

    /// Lock the record exclusively, run `mutation` on a copy and persist the
    /// copy in one write if the mutation succeeds and reports a change.
    ///
    /// Returns `Ok(None)` if no record exists. The lock is held only for the
    /// duration of this call and covers exactly one record.
    async fn update_locked(
        &self,
        class: QuotaClass,
        service: &ServiceRef,
        mutation: Mutation<'_>,
    ) -> Result<Option<QuotaRecord>, QuotaError>;

    /// Records of a class matching `filter`, newest first.
    async fn list(
        &self,
        class: QuotaClass,
        filter: &QuotaFilter,
    ) -> Result<Vec<QuotaRecord>, StoreError>;

    /// Register or replace a service unit used by listings.
    async fn register_service(&self, unit: &ServiceUnit) -> Result<(), StoreError>;
}

#[async_trait]
impl<T> QuotaStore for Arc<T>
where
    T: QuotaStore + ?Sized,
{
    async fn fetch(
        &self,
        class: QuotaClass,
        service: &ServiceRef,
    ) -> Result<Option<QuotaRecord>, StoreError> {
        (**self).fetch(class, service).await
    }

    async fn insert(&self, record: &QuotaRecord) -> Result<(), StoreError> {
        (**self).insert(record).await
    }

    async fn update_locked(
        &self,
        class: QuotaClass,
        service: &ServiceRef,
        mutation: Mutation<'_>,
    ) -> Result<Option<QuotaRecord>, QuotaError> {
        (**self).update_locked(class, service, mutation).await
    }

    async fn list(
        &self,
        class: QuotaClass,
        filter: &QuotaFilter,
    ) -> Result<Vec<QuotaRecord>, StoreError> {
        (**self).list(class, filter).await
    }

    async fn register_service(&self, unit: &ServiceUnit) -> Result<(), StoreError> {
        (**self).register_service(unit).await
    }
}
