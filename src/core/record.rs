//! Quota record model, resource dimensions and request vectors.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::QuotaError;

/// Capacity pool a quota record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaClass {
    /// Capacity reserved for a service unit's direct users.
    Private,
    /// Capacity drawn from the pool shared across the service unit's users.
    Share,
}

impl QuotaClass {
    /// Stable storage tag.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Share => "share",
        }
    }

    /// Parse a storage tag produced by [`QuotaClass::as_str`].
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "private" => Some(Self::Private),
            "share" => Some(Self::Share),
            _ => None,
        }
    }

    /// Human-readable label used as the prefix of error messages.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Private => "service private quota",
            Self::Share => "service share quota",
        }
    }
}

impl fmt::Display for QuotaClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One of the five tracked resource dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    /// Virtual CPU cores.
    Vcpu,
    /// Memory in GiB.
    RamGib,
    /// Cloud disk size in GB.
    DiskSize,
    /// Public IP addresses.
    PublicIp,
    /// Private IP addresses.
    PrivateIp,
}

impl Dimension {
    /// All dimensions in check order.
    pub const ALL: [Self; 5] = [
        Self::Vcpu,
        Self::RamGib,
        Self::DiskSize,
        Self::PublicIp,
        Self::PrivateIp,
    ];

    /// Short name used in logs and error messages.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Vcpu => "vcpu",
            Self::RamGib => "ram",
            Self::DiskSize => "disk",
            Self::PublicIp => "public ip",
            Self::PrivateIp => "private ip",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Identifier of the service unit a quota record is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceRef(String);

impl ServiceRef {
    /// Wrap a service identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServiceRef {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ServiceRef {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Allocated and consumed capacity of one service unit in one quota class.
///
/// A `*_total` of zero or less means the dimension is uncapped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaRecord {
    /// Owning service unit.
    pub service_ref: ServiceRef,
    /// Capacity pool of this record.
    pub class: QuotaClass,
    /// Allocated vCPU cores.
    pub vcpu_total: i64,
    /// Consumed vCPU cores.
    pub vcpu_used: i64,
    /// Allocated memory (GiB).
    pub ram_total: i64,
    /// Consumed memory (GiB).
    pub ram_used: i64,
    /// Allocated disk (GB).
    pub disk_size_total: i64,
    /// Consumed disk (GB).
    pub disk_size_used: i64,
    /// Allocated public IPs.
    pub public_ip_total: i64,
    /// Consumed public IPs.
    pub public_ip_used: i64,
    /// Allocated private IPs.
    pub private_ip_total: i64,
    /// Consumed private IPs.
    pub private_ip_used: i64,
    /// Creation timestamp, milliseconds since epoch.
    pub creation_time_ms: i64,
    /// Informational flag; no ledger operation reads it.
    pub enabled: bool,
}

impl QuotaRecord {
    /// Fresh record with every total and used counter at zero.
    pub fn new(class: QuotaClass, service_ref: ServiceRef, creation_time_ms: i64) -> Self {
        Self {
            service_ref,
            class,
            vcpu_total: 0,
            vcpu_used: 0,
            ram_total: 0,
            ram_used: 0,
            disk_size_total: 0,
            disk_size_used: 0,
            public_ip_total: 0,
            public_ip_used: 0,
            private_ip_total: 0,
            private_ip_used: 0,
            creation_time_ms,
            enabled: true,
        }
    }

    /// Allocated capacity of a dimension.
    pub const fn total(&self, dim: Dimension) -> i64 {
        match dim {
            Dimension::Vcpu => self.vcpu_total,
            Dimension::RamGib => self.ram_total,
            Dimension::DiskSize => self.disk_size_total,
            Dimension::PublicIp => self.public_ip_total,
            Dimension::PrivateIp => self.private_ip_total,
        }
    }

    /// Consumed capacity of a dimension.
    pub const fn used(&self, dim: Dimension) -> i64 {
        match dim {
            Dimension::Vcpu => self.vcpu_used,
            Dimension::RamGib => self.ram_used,
            Dimension::DiskSize => self.disk_size_used,
            Dimension::PublicIp => self.public_ip_used,
            Dimension::PrivateIp => self.private_ip_used,
        }
    }

    /// Overwrite the allocated capacity of a dimension.
    pub fn set_total(&mut self, dim: Dimension, value: i64) {
        let slot = match dim {
            Dimension::Vcpu => &mut self.vcpu_total,
            Dimension::RamGib => &mut self.ram_total,
            Dimension::DiskSize => &mut self.disk_size_total,
            Dimension::PublicIp => &mut self.public_ip_total,
            Dimension::PrivateIp => &mut self.private_ip_total,
        };
        *slot = value;
    }

    /// Overwrite the consumed capacity of a dimension.
    pub fn set_used(&mut self, dim: Dimension, value: i64) {
        let slot = match dim {
            Dimension::Vcpu => &mut self.vcpu_used,
            Dimension::RamGib => &mut self.ram_used,
            Dimension::DiskSize => &mut self.disk_size_used,
            Dimension::PublicIp => &mut self.public_ip_used,
            Dimension::PrivateIp => &mut self.private_ip_used,
        };
        *slot = value;
    }

    /// Whether no ceiling is enforced for a dimension.
    pub const fn is_uncapped(&self, dim: Dimension) -> bool {
        self.total(dim) <= 0
    }

    /// Remaining capacity (`total - used`); may be negative after a decrease.
    pub const fn remaining(&self, dim: Dimension) -> i64 {
        self.total(dim) - self.used(dim)
    }

    /// Whether `requested` more units fit into a dimension.
    pub const fn can_take(&self, dim: Dimension, requested: i64) -> bool {
        self.is_uncapped(dim) || self.remaining(dim) >= requested
    }
}

/// Per-dimension amounts passed to `deduct`, `release`, `increase`, `decrease`
/// and `requires`. Zero means "not requested".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceAmounts {
    /// vCPU cores.
    pub vcpus: i64,
    /// Memory (GiB).
    pub ram_gib: i64,
    /// Disk (GB).
    pub disk_size: i64,
    /// Public IPs.
    pub public_ip: i64,
    /// Private IPs.
    pub private_ip: i64,
}

impl ResourceAmounts {
    /// Empty request; every dimension skipped.
    pub const fn new() -> Self {
        Self {
            vcpus: 0,
            ram_gib: 0,
            disk_size: 0,
            public_ip: 0,
            private_ip: 0,
        }
    }

    /// Set the vCPU amount.
    pub const fn with_vcpus(mut self, vcpus: i64) -> Self {
        self.vcpus = vcpus;
        self
    }

    /// Set the memory amount in GiB.
    pub const fn with_ram_gib(mut self, ram_gib: i64) -> Self {
        self.ram_gib = ram_gib;
        self
    }

    /// Set the disk amount in GB.
    pub const fn with_disk_size(mut self, disk_size: i64) -> Self {
        self.disk_size = disk_size;
        self
    }

    /// Set the public IP amount.
    pub const fn with_public_ip(mut self, public_ip: i64) -> Self {
        self.public_ip = public_ip;
        self
    }

    /// Set the private IP amount.
    pub const fn with_private_ip(mut self, private_ip: i64) -> Self {
        self.private_ip = private_ip;
        self
    }

    /// Amount for a dimension.
    pub const fn get(&self, dim: Dimension) -> i64 {
        match dim {
            Dimension::Vcpu => self.vcpus,
            Dimension::RamGib => self.ram_gib,
            Dimension::DiskSize => self.disk_size,
            Dimension::PublicIp => self.public_ip,
            Dimension::PrivateIp => self.private_ip,
        }
    }

    /// Reject the whole request if any amount is negative.
    pub fn validate(&self) -> Result<(), QuotaError> {
        match Dimension::ALL.into_iter().find(|dim| self.get(*dim) < 0) {
            Some(dimension) => Err(QuotaError::InvalidAmount {
                dimension,
                amount: self.get(dimension),
            }),
            None => Ok(()),
        }
    }

    /// Dimensions with a positive amount, in check order.
    pub fn requested(&self) -> impl Iterator<Item = (Dimension, i64)> + '_ {
        Dimension::ALL
            .into_iter()
            .map(|dim| (dim, self.get(dim)))
            .filter(|(_, amount)| *amount > 0)
    }

    /// True when every dimension is zero.
    pub fn is_empty(&self) -> bool {
        self.requested().next().is_none()
    }
}

/// Absolute totals for `update`; `None` leaves a dimension untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaTotals {
    /// vCPU cores.
    pub vcpus: Option<i64>,
    /// Memory (GiB).
    pub ram_gib: Option<i64>,
    /// Disk (GB).
    pub disk_size: Option<i64>,
    /// Public IPs.
    pub public_ip: Option<i64>,
    /// Private IPs.
    pub private_ip: Option<i64>,
}

impl QuotaTotals {
    /// No dimension provided.
    pub const fn new() -> Self {
        Self {
            vcpus: None,
            ram_gib: None,
            disk_size: None,
            public_ip: None,
            private_ip: None,
        }
    }

    /// Set the vCPU total.
    pub const fn with_vcpus(mut self, vcpus: i64) -> Self {
        self.vcpus = Some(vcpus);
        self
    }

    /// Set the memory total in GiB.
    pub const fn with_ram_gib(mut self, ram_gib: i64) -> Self {
        self.ram_gib = Some(ram_gib);
        self
    }

    /// Set the disk total in GB.
    pub const fn with_disk_size(mut self, disk_size: i64) -> Self {
        self.disk_size = Some(disk_size);
        self
    }

    /// Set the public IP total.
    pub const fn with_public_ip(mut self, public_ip: i64) -> Self {
        self.public_ip = Some(public_ip);
        self
    }

    /// Set the private IP total.
    pub const fn with_private_ip(mut self, private_ip: i64) -> Self {
        self.private_ip = Some(private_ip);
        self
    }

    /// Provided value for a dimension.
    pub const fn get(&self, dim: Dimension) -> Option<i64> {
        match dim {
            Dimension::Vcpu => self.vcpus,
            Dimension::RamGib => self.ram_gib,
            Dimension::DiskSize => self.disk_size,
            Dimension::PublicIp => self.public_ip,
            Dimension::PrivateIp => self.private_ip,
        }
    }

    /// Provided dimensions, in check order.
    pub fn provided(&self) -> impl Iterator<Item = (Dimension, i64)> + '_ {
        Dimension::ALL
            .into_iter()
            .filter_map(|dim| self.get(dim).map(|value| (dim, value)))
    }
}

/// Registration of a service unit, used by reporting listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceUnit {
    /// Service identifier.
    pub id: ServiceRef,
    /// Data center the service belongs to.
    pub center_id: Option<String>,
    /// Deleted services are hidden from listings.
    pub deleted: bool,
}

/// Listing filter. A service filter takes precedence over a center filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuotaFilter {
    /// Restrict to one service unit.
    pub service: Option<ServiceRef>,
    /// Restrict to service units of one data center.
    pub center_id: Option<String>,
    /// Restrict to a set of service units.
    pub services: Option<Vec<ServiceRef>>,
}

impl QuotaFilter {
    /// Whether a record of `unit` (if registered) passes the filter.
    pub fn matches(&self, service: &ServiceRef, unit: Option<&ServiceUnit>) -> bool {
        if unit.is_some_and(|u| u.deleted) {
            return false;
        }
        if let Some(services) = &self.services {
            if !services.contains(service) {
                return false;
            }
        }
        if let Some(wanted) = &self.service {
            return wanted == service;
        }
        if let Some(center) = &self.center_id {
            return unit.and_then(|u| u.center_id.as_ref()) == Some(center);
        }
        true
    }
}
