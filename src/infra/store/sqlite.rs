//! SQLite-backed quota store using `sqlx`.
//!
//! Records live in `service_quota` with a unique (class, service) key. Mutations
//! run inside one transaction that claims the write lock with a no-op update on
//! the target row before reading it, so concurrent writers on the same record
//! serialize and each sees the previous writer's committed state.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;

use crate::core::{
    Mutation, QuotaClass, QuotaError, QuotaFilter, QuotaRecord, QuotaStore, ServiceRef,
    ServiceUnit, StoreError,
};

/// How long a writer waits for another writer's lock before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const RECORD_COLUMNS: &str = "q.quota_class AS quota_class, q.service_ref AS service_ref, \
    q.vcpu_total AS vcpu_total, q.vcpu_used AS vcpu_used, \
    q.ram_total AS ram_total, q.ram_used AS ram_used, \
    q.disk_size_total AS disk_size_total, q.disk_size_used AS disk_size_used, \
    q.public_ip_total AS public_ip_total, q.public_ip_used AS public_ip_used, \
    q.private_ip_total AS private_ip_total, q.private_ip_used AS private_ip_used, \
    q.creation_time AS creation_time, q.enabled AS enabled";

/// Quota store persisted in SQLite.
#[derive(Clone)]
pub struct SqliteQuotaStore {
    db: SqlitePool,
}

impl SqliteQuotaStore {
    /// Wrap an existing pool. Call [`SqliteQuotaStore::init_db`] before use.
    pub const fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Connect to `url` (creating the file if missing), create the schema and
    /// return the store.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .busy_timeout(BUSY_TIMEOUT);
        let db = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        let store = Self::new(db);
        store.init_db().await?;
        Ok(store)
    }

    /// Underlying pool.
    pub const fn pool(&self) -> &SqlitePool {
        &self.db
    }

    /// Create tables and indexes if missing.
    pub async fn init_db(&self) -> Result<(), StoreError> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS service_quota (
                quota_class TEXT NOT NULL,
                service_ref TEXT NOT NULL,
                vcpu_total INTEGER NOT NULL DEFAULT 0,
                vcpu_used INTEGER NOT NULL DEFAULT 0,
                ram_total INTEGER NOT NULL DEFAULT 0,
                ram_used INTEGER NOT NULL DEFAULT 0,
                disk_size_total INTEGER NOT NULL DEFAULT 0,
                disk_size_used INTEGER NOT NULL DEFAULT 0,
                public_ip_total INTEGER NOT NULL DEFAULT 0,
                public_ip_used INTEGER NOT NULL DEFAULT 0,
                private_ip_total INTEGER NOT NULL DEFAULT 0,
                private_ip_used INTEGER NOT NULL DEFAULT 0,
                creation_time INTEGER NOT NULL,
                enabled INTEGER NOT NULL DEFAULT 1,
                UNIQUE (quota_class, service_ref)
            )
            ",
        )
        .execute(&self.db)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS service_unit (
                id TEXT PRIMARY KEY,
                center_id TEXT,
                deleted INTEGER NOT NULL DEFAULT 0
            )
            ",
        )
        .execute(&self.db)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_service_quota_created ON service_quota(quota_class, creation_time)",
        )
        .execute(&self.db)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_service_unit_center ON service_unit(center_id)")
            .execute(&self.db)
            .await?;

        Ok(())
    }
}

fn record_from_row(row: &SqliteRow) -> Result<QuotaRecord, StoreError> {
    let tag: String = row.try_get("quota_class")?;
    let class = QuotaClass::from_tag(&tag)
        .ok_or_else(|| StoreError::Backend(format!("unknown quota class `{tag}`")))?;
    let service: String = row.try_get("service_ref")?;

    Ok(QuotaRecord {
        service_ref: ServiceRef::new(service),
        class,
        vcpu_total: row.try_get("vcpu_total")?,
        vcpu_used: row.try_get("vcpu_used")?,
        ram_total: row.try_get("ram_total")?,
        ram_used: row.try_get("ram_used")?,
        disk_size_total: row.try_get("disk_size_total")?,
        disk_size_used: row.try_get("disk_size_used")?,
        public_ip_total: row.try_get("public_ip_total")?,
        public_ip_used: row.try_get("public_ip_used")?,
        private_ip_total: row.try_get("private_ip_total")?,
        private_ip_used: row.try_get("private_ip_used")?,
        creation_time_ms: row.try_get("creation_time")?,
        enabled: row.try_get("enabled")?,
    })
}

#[async_trait]
impl QuotaStore for SqliteQuotaStore {
    async fn fetch(
        &self,
        class: QuotaClass,
        service: &ServiceRef,
    ) -> Result<Option<QuotaRecord>, StoreError> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM service_quota q WHERE q.quota_class = ? AND q.service_ref = ?"
        );
        let row = sqlx::query(&sql)
            .bind(class.as_str())
            .bind(service.as_str())
            .fetch_optional(&self.db)
            .await?;
        row.as_ref().map(record_from_row).transpose()
    }

    async fn insert(&self, record: &QuotaRecord) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO service_quota (
                quota_class, service_ref,
                vcpu_total, vcpu_used, ram_total, ram_used,
                disk_size_total, disk_size_used, public_ip_total, public_ip_used,
                private_ip_total, private_ip_used, creation_time, enabled
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(record.class.as_str())
        .bind(record.service_ref.as_str())
        .bind(record.vcpu_total)
        .bind(record.vcpu_used)
        .bind(record.ram_total)
        .bind(record.ram_used)
        .bind(record.disk_size_total)
        .bind(record.disk_size_used)
        .bind(record.public_ip_total)
        .bind(record.public_ip_used)
        .bind(record.private_ip_total)
        .bind(record.private_ip_used)
        .bind(record.creation_time_ms)
        .bind(record.enabled)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn update_locked(
        &self,
        class: QuotaClass,
        service: &ServiceRef,
        mutation: Mutation<'_>,
    ) -> Result<Option<QuotaRecord>, QuotaError> {
        let mut tx = self.db.begin().await.map_err(StoreError::from)?;

        // Write first: takes the database write lock before the row is read.
        let claimed = sqlx::query(
            "UPDATE service_quota SET enabled = enabled WHERE quota_class = ? AND service_ref = ?",
        )
        .bind(class.as_str())
        .bind(service.as_str())
        .execute(&mut *tx)
        .await
        .map_err(StoreError::from)?;
        if claimed.rows_affected() == 0 {
            return Ok(None);
        }

        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM service_quota q WHERE q.quota_class = ? AND q.service_ref = ?"
        );
        let row = sqlx::query(&sql)
            .bind(class.as_str())
            .bind(service.as_str())
            .fetch_one(&mut *tx)
            .await
            .map_err(StoreError::from)?;
        let mut staged = record_from_row(&row)?;

        // An error here drops `tx`, rolling the transaction back.
        if !mutation(&mut staged)? {
            tx.commit().await.map_err(StoreError::from)?;
            return Ok(Some(staged));
        }

        sqlx::query(
            r"
            UPDATE service_quota SET
                vcpu_total = ?, vcpu_used = ?, ram_total = ?, ram_used = ?,
                disk_size_total = ?, disk_size_used = ?,
                public_ip_total = ?, public_ip_used = ?,
                private_ip_total = ?, private_ip_used = ?
            WHERE quota_class = ? AND service_ref = ?
            ",
        )
        .bind(staged.vcpu_total)
        .bind(staged.vcpu_used)
        .bind(staged.ram_total)
        .bind(staged.ram_used)
        .bind(staged.disk_size_total)
        .bind(staged.disk_size_used)
        .bind(staged.public_ip_total)
        .bind(staged.public_ip_used)
        .bind(staged.private_ip_total)
        .bind(staged.private_ip_used)
        .bind(class.as_str())
        .bind(service.as_str())
        .execute(&mut *tx)
        .await
        .map_err(StoreError::from)?;

        tx.commit().await.map_err(StoreError::from)?;
        Ok(Some(staged))
    }

    async fn list(
        &self,
        class: QuotaClass,
        filter: &QuotaFilter,
    ) -> Result<Vec<QuotaRecord>, StoreError> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS}, s.id AS unit_id, s.center_id, s.deleted \
             FROM service_quota q LEFT JOIN service_unit s ON s.id = q.service_ref \
             WHERE q.quota_class = ? \
             ORDER BY q.creation_time DESC, q.service_ref ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(class.as_str())
            .fetch_all(&self.db)
            .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let record = record_from_row(row)?;
            let unit_id: Option<String> = row.try_get("unit_id")?;
            let unit = match unit_id {
                Some(id) => Some(ServiceUnit {
                    id: ServiceRef::new(id),
                    center_id: row.try_get("center_id")?,
                    deleted: row.try_get::<Option<bool>, _>("deleted")?.unwrap_or(false),
                }),
                None => None,
            };
            if filter.matches(&record.service_ref, unit.as_ref()) {
                out.push(record);
            }
        }
        Ok(out)
    }

    async fn register_service(&self, unit: &ServiceUnit) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO service_unit (id, center_id, deleted)
            VALUES (?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                center_id = excluded.center_id,
                deleted = excluded.deleted
            ",
        )
        .bind(unit.id.as_str())
        .bind(unit.center_id.as_deref())
        .bind(unit.deleted)
        .execute(&self.db)
        .await?;
        Ok(())
    }
}
