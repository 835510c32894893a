//! Ledger behavior over the SQLite store.

#![cfg(feature = "sqlite")]

use std::sync::Arc;

use futures::future::join_all;
use sqlx::sqlite::SqlitePoolOptions;

use quota_ledger::core::{
    PrivateQuotaLedger, QuotaClass, QuotaErrorKind, QuotaRecord, QuotaStore, QuotaTotals,
    ResourceAmounts, ServiceRef, ServiceUnit, ShareQuotaLedger, StoreError,
};
use quota_ledger::infra::SqliteQuotaStore;

async fn memory_store() -> SqliteQuotaStore {
    // One connection: every `sqlite::memory:` connection is its own database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let store = SqliteQuotaStore::new(pool);
    store.init_db().await.unwrap();
    store
}

fn unit(id: &str, center: Option<&str>, deleted: bool) -> ServiceUnit {
    ServiceUnit {
        id: ServiceRef::new(id),
        center_id: center.map(str::to_owned),
        deleted,
    }
}

#[tokio::test]
async fn test_get_creates_and_persists_record() {
    let store = memory_store().await;
    let ledger = PrivateQuotaLedger::new(store.clone());
    let svc = ServiceRef::new("svc-1");

    let created = ledger.get(&svc).await.unwrap().expect("created");
    assert_eq!(created.vcpu_total, 0);
    assert!(created.enabled);

    let stored = store
        .fetch(QuotaClass::Private, &svc)
        .await
        .unwrap()
        .expect("persisted");
    assert_eq!(stored, created);
    assert_eq!(ledger.get(&svc).await.unwrap().unwrap(), created);
}

#[tokio::test]
async fn test_duplicate_insert_is_reported() {
    let store = memory_store().await;
    let record = QuotaRecord::new(QuotaClass::Share, ServiceRef::new("svc-1"), 10);
    store.insert(&record).await.unwrap();

    let err = store.insert(&record).await.unwrap_err();
    assert!(matches!(err, StoreError::Duplicate));

    // Same service under the other class is a different record.
    let private = QuotaRecord::new(QuotaClass::Private, ServiceRef::new("svc-1"), 10);
    store.insert(&private).await.unwrap();
}

#[tokio::test]
async fn test_operations_round_trip_through_sql() {
    let ledger = ShareQuotaLedger::new(memory_store().await);
    let svc = ServiceRef::new("svc-ops");

    ledger
        .increase(
            &svc,
            ResourceAmounts::new()
                .with_vcpus(16)
                .with_ram_gib(64)
                .with_disk_size(500)
                .with_public_ip(2)
                .with_private_ip(8),
        )
        .await
        .unwrap();
    ledger
        .deduct(&svc, ResourceAmounts::new().with_vcpus(4).with_public_ip(2))
        .await
        .unwrap();
    ledger
        .release(&svc, ResourceAmounts::new().with_vcpus(10))
        .await
        .unwrap();
    let record = ledger
        .decrease(&svc, ResourceAmounts::new().with_disk_size(100))
        .await
        .unwrap();

    let stored = ledger.get(&svc).await.unwrap().unwrap();
    assert_eq!(stored, record);
    assert_eq!(stored.vcpu_total, 16);
    assert_eq!(stored.vcpu_used, 0);
    assert_eq!(stored.ram_total, 64);
    assert_eq!(stored.disk_size_total, 400);
    assert_eq!(stored.public_ip_used, 2);
    assert_eq!(stored.private_ip_total, 8);
}

#[tokio::test]
async fn test_rejected_deduct_rolls_back() {
    let ledger = PrivateQuotaLedger::new(memory_store().await);
    let svc = ServiceRef::new("svc-atomic");
    ledger
        .increase(&svc, ResourceAmounts::new().with_vcpus(10).with_ram_gib(4))
        .await
        .unwrap();
    let before = ledger.get(&svc).await.unwrap().unwrap();

    let err = ledger
        .deduct(&svc, ResourceAmounts::new().with_vcpus(2).with_ram_gib(5))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), QuotaErrorKind::Shortage);
    assert_eq!(ledger.get(&svc).await.unwrap().unwrap(), before);

    // The connection is usable after the rollback.
    let record = ledger
        .deduct(&svc, ResourceAmounts::new().with_vcpus(2).with_ram_gib(4))
        .await
        .unwrap();
    assert_eq!(record.vcpu_used, 2);
    assert_eq!(record.ram_used, 4);
}

#[tokio::test]
async fn test_only_increase_update_leaves_row_untouched() {
    let ledger = PrivateQuotaLedger::new(memory_store().await);
    let svc = ServiceRef::new("svc-update");
    ledger
        .update(
            &svc,
            QuotaTotals::new().with_vcpus(8).with_ram_gib(16),
            false,
        )
        .await
        .unwrap();

    let err = ledger
        .update(&svc, QuotaTotals::new().with_vcpus(12).with_ram_gib(8), true)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), QuotaErrorKind::OnlyIncrease);

    let stored = ledger.get(&svc).await.unwrap().unwrap();
    assert_eq!(stored.vcpu_total, 8);
    assert_eq!(stored.ram_total, 16);
}

#[tokio::test]
async fn test_listing_filters_and_order() {
    let store = memory_store().await;
    for (name, created) in [("a", 1), ("b", 3), ("c", 2), ("gone", 4), ("loose", 5)] {
        let record = QuotaRecord::new(QuotaClass::Private, ServiceRef::new(name), created);
        store.insert(&record).await.unwrap();
    }
    store.register_service(&unit("a", Some("dc-1"), false)).await.unwrap();
    store.register_service(&unit("b", Some("dc-1"), false)).await.unwrap();
    store.register_service(&unit("c", Some("dc-2"), false)).await.unwrap();
    store.register_service(&unit("gone", Some("dc-1"), true)).await.unwrap();

    let ledger = PrivateQuotaLedger::new(store);
    let names = |records: Vec<QuotaRecord>| {
        records
            .into_iter()
            .map(|r| r.service_ref.as_str().to_owned())
            .collect::<Vec<_>>()
    };

    let all = ledger.list_private(None, None).await.unwrap();
    assert_eq!(names(all), ["loose", "b", "c", "a"]);

    let dc1 = ledger.list_private(Some("dc-1"), None).await.unwrap();
    assert_eq!(names(dc1), ["b", "a"]);

    // Service filter wins over the center filter.
    let svc_c = ServiceRef::new("c");
    let only_c = ledger.list_private(Some("dc-1"), Some(&svc_c)).await.unwrap();
    assert_eq!(names(only_c), ["c"]);

    let picked = ledger
        .list_for_services(&[ServiceRef::new("a"), ServiceRef::new("gone"), ServiceRef::new("c")])
        .await
        .unwrap();
    assert_eq!(names(picked), ["c", "a"]);
    assert!(ledger.list_for_services(&[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_register_service_upserts() {
    let store = memory_store().await;
    let record = QuotaRecord::new(QuotaClass::Share, ServiceRef::new("svc-1"), 1);
    store.insert(&record).await.unwrap();
    store.register_service(&unit("svc-1", Some("dc-1"), false)).await.unwrap();

    let ledger = ShareQuotaLedger::new(store.clone());
    assert_eq!(ledger.list_share(Some("dc-1"), None).await.unwrap().len(), 1);

    store.register_service(&unit("svc-1", Some("dc-1"), true)).await.unwrap();
    assert!(ledger.list_share(Some("dc-1"), None).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_deducts_serialize_on_file_database() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("quota.db").display());
    let store = SqliteQuotaStore::connect(&url, 4).await.unwrap();
    let ledger = Arc::new(PrivateQuotaLedger::new(store));
    let svc = ServiceRef::new("svc-hot");
    ledger
        .increase(&svc, ResourceAmounts::new().with_vcpus(5))
        .await
        .unwrap();

    let handles: Vec<_> = (0..12)
        .map(|_| {
            let ledger = Arc::clone(&ledger);
            let svc = svc.clone();
            tokio::spawn(async move {
                ledger
                    .deduct(&svc, ResourceAmounts::new().with_vcpus(1))
                    .await
            })
        })
        .collect();
    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.expect("task panicked"))
        .collect();

    let ok = results.iter().filter(|r| r.is_ok()).count();
    let short = results
        .iter()
        .filter(|r| matches!(r, Err(e) if e.kind() == QuotaErrorKind::Shortage))
        .count();
    assert_eq!(ok, 5);
    assert_eq!(short, 7);
    assert_eq!(ledger.get(&svc).await.unwrap().unwrap().vcpu_used, 5);
}
