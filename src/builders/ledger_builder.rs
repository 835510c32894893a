//! Builds the private and share ledgers over one configured store.

use std::sync::Arc;

use crate::config::{LedgerConfig, StoreConfig};
use crate::core::{
    AuditSink, InMemoryAuditSink, PrivateQuotaLedger, QuotaError, QuotaStore, ShareQuotaLedger,
    StoreError,
};
use crate::infra::InMemoryQuotaStore;

/// Store handle shared by both ledgers.
pub type SharedStore = Arc<dyn QuotaStore>;

/// Both quota ledgers of a deployment.
#[derive(Clone)]
pub struct QuotaLedgers {
    /// Private-quota ledger.
    pub private: PrivateQuotaLedger<SharedStore>,
    /// Share-quota ledger.
    pub share: ShareQuotaLedger<SharedStore>,
    /// In-memory audit buffer, when configured.
    pub audit: Option<Arc<InMemoryAuditSink>>,
}

/// Open the configured store backend.
pub async fn build_store(cfg: &StoreConfig) -> Result<SharedStore, QuotaError> {
    match cfg {
        StoreConfig::InMemory => Ok(Arc::new(InMemoryQuotaStore::new())),
        #[cfg(feature = "sqlite")]
        StoreConfig::Sqlite { url, max_connections } => {
            let store = crate::infra::SqliteQuotaStore::connect(url, *max_connections).await?;
            tracing::info!("quota store opened at {}", url);
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "sqlite"))]
        StoreConfig::Sqlite { .. } => Err(StoreError::Backend(
            "sqlite backend requires the `sqlite` feature".into(),
        )
        .into()),
    }
}

/// Validate `cfg` and build both ledgers over one store.
pub async fn build_ledgers(cfg: &LedgerConfig) -> Result<QuotaLedgers, QuotaError> {
    cfg.validate()
        .map_err(|e| StoreError::Backend(format!("config invalid: {e}")))?;

    let store = build_store(&cfg.store).await?;
    let mut private = PrivateQuotaLedger::new(Arc::clone(&store));
    let mut share = ShareQuotaLedger::new(store);

    let audit = cfg
        .audit_max_events
        .map(|max| Arc::new(InMemoryAuditSink::new(max)));
    if let Some(sink) = &audit {
        let sink: Arc<dyn AuditSink> = sink.clone();
        private = private.with_audit(Arc::clone(&sink));
        share = share.with_audit(sink);
    }

    Ok(QuotaLedgers {
        private,
        share,
        audit,
    })
}
