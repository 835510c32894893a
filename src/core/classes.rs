//! Private and share quota ledgers.

use crate::core::{QuotaClass, QuotaError, QuotaFilter, QuotaLedger, QuotaRecord, QuotaStore, ServiceRef};

/// Binds a [`QuotaLedger`] to one quota class.
pub trait QuotaKind: Send + Sync + 'static {
    /// Class of every record the ledger touches.
    const CLASS: QuotaClass;
}

/// Marker for capacity reserved to a service unit's direct users.
#[derive(Debug, Clone, Copy)]
pub struct Private;

impl QuotaKind for Private {
    const CLASS: QuotaClass = QuotaClass::Private;
}

/// Marker for capacity drawn from the service unit's shared pool.
#[derive(Debug, Clone, Copy)]
pub struct Share;

impl QuotaKind for Share {
    const CLASS: QuotaClass = QuotaClass::Share;
}

/// Ledger of private quotas.
pub type PrivateQuotaLedger<S> = QuotaLedger<Private, S>;

/// Ledger of share quotas.
pub type ShareQuotaLedger<S> = QuotaLedger<Share, S>;

fn scoped_filter(center_id: Option<&str>, service: Option<&ServiceRef>) -> QuotaFilter {
    QuotaFilter {
        service: service.cloned(),
        center_id: center_id.map(str::to_owned),
        services: None,
    }
}

impl<S: QuotaStore> QuotaLedger<Private, S> {
    /// Private quotas of one service, or of every service in a data center.
    pub async fn list_private(
        &self,
        center_id: Option<&str>,
        service: Option<&ServiceRef>,
    ) -> Result<Vec<QuotaRecord>, QuotaError> {
        self.list(&scoped_filter(center_id, service)).await
    }

    /// Private quotas of the given services, e.g. those a user administers.
    pub async fn list_for_services(
        &self,
        services: &[ServiceRef],
    ) -> Result<Vec<QuotaRecord>, QuotaError> {
        if services.is_empty() {
            return Ok(Vec::new());
        }
        let filter = QuotaFilter {
            services: Some(services.to_vec()),
            ..QuotaFilter::default()
        };
        self.list(&filter).await
    }
}

impl<S: QuotaStore> QuotaLedger<Share, S> {
    /// Share quotas of one service, or of every service in a data center.
    pub async fn list_share(
        &self,
        center_id: Option<&str>,
        service: Option<&ServiceRef>,
    ) -> Result<Vec<QuotaRecord>, QuotaError> {
        self.list(&scoped_filter(center_id, service)).await
    }
}
