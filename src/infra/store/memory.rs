//! In-memory quota store with one `parking_lot` mutex per record.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use crate::core::{
    Mutation, QuotaClass, QuotaError, QuotaFilter, QuotaRecord, QuotaStore, ServiceRef,
    ServiceUnit, StoreError,
};

type RecordKey = (QuotaClass, ServiceRef);

/// In-memory store for development, tests and single-process deployments.
///
/// The per-record mutex is the row lock: writers on the same (class, service)
/// pair serialize on it, writers on different pairs never contend.
#[derive(Default)]
pub struct InMemoryQuotaStore {
    records: RwLock<HashMap<RecordKey, Arc<Mutex<QuotaRecord>>>>,
    services: RwLock<HashMap<ServiceRef, ServiceUnit>>,
    fail_inserts: AtomicBool,
    fail_writes: AtomicBool,
}

impl InMemoryQuotaStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent insert fail with a backend error.
    pub fn set_fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::Release);
    }

    /// Make every subsequent persist fail with a backend error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Release);
    }

    /// Number of stored records across both classes.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn row(&self, class: QuotaClass, service: &ServiceRef) -> Option<Arc<Mutex<QuotaRecord>>> {
        self.records.read().get(&(class, service.clone())).cloned()
    }
}

#[async_trait]
impl QuotaStore for InMemoryQuotaStore {
    async fn fetch(
        &self,
        class: QuotaClass,
        service: &ServiceRef,
    ) -> Result<Option<QuotaRecord>, StoreError> {
        Ok(self.row(class, service).map(|row| row.lock().clone()))
    }

    async fn insert(&self, record: &QuotaRecord) -> Result<(), StoreError> {
        if self.fail_inserts.load(Ordering::Acquire) {
            return Err(StoreError::Backend("insert rejected".into()));
        }
        let mut records = self.records.write();
        let key = (record.class, record.service_ref.clone());
        if records.contains_key(&key) {
            return Err(StoreError::Duplicate);
        }
        records.insert(key, Arc::new(Mutex::new(record.clone())));
        Ok(())
    }

    async fn update_locked(
        &self,
        class: QuotaClass,
        service: &ServiceRef,
        mutation: Mutation<'_>,
    ) -> Result<Option<QuotaRecord>, QuotaError> {
        let Some(row) = self.row(class, service) else {
            return Ok(None);
        };

        let mut guard = row.lock();
        let mut staged = guard.clone();
        if !mutation(&mut staged)? {
            return Ok(Some(staged));
        }
        if self.fail_writes.load(Ordering::Acquire) {
            return Err(StoreError::Backend("write rejected".into()).into());
        }
        *guard = staged.clone();
        Ok(Some(staged))
    }

    async fn list(
        &self,
        class: QuotaClass,
        filter: &QuotaFilter,
    ) -> Result<Vec<QuotaRecord>, StoreError> {
        let rows: Vec<_> = self
            .records
            .read()
            .iter()
            .filter(|((c, _), _)| *c == class)
            .map(|(_, row)| Arc::clone(row))
            .collect();
        let services = self.services.read();

        let mut out: Vec<QuotaRecord> = rows
            .iter()
            .map(|row| row.lock().clone())
            .filter(|r| filter.matches(&r.service_ref, services.get(&r.service_ref)))
            .collect();
        out.sort_by(|a, b| {
            b.creation_time_ms
                .cmp(&a.creation_time_ms)
                .then_with(|| a.service_ref.cmp(&b.service_ref))
        });
        Ok(out)
    }

    async fn register_service(&self, unit: &ServiceUnit) -> Result<(), StoreError> {
        self.services.write().insert(unit.id.clone(), unit.clone());
        Ok(())
    }
}
