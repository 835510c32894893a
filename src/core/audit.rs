//! Audit sink implementations.
//!
//! The ledger emits one event per applied mutation. Sinks are write-only; no
//! ledger decision ever reads them back.

use std::collections::VecDeque;

use parking_lot::Mutex;
use serde::Serialize;

use crate::core::{QuotaClass, ServiceRef};
use crate::util::clock::now_ms;

/// Ledger change event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEvent {
    /// Event identifier.
    pub event_id: String,
    /// Quota class of the mutated record.
    pub class: QuotaClass,
    /// Service the record belongs to.
    pub service: ServiceRef,
    /// Operation applied (deduct, release, increase, decrease, update).
    pub action: String,
    /// Timestamp milliseconds.
    pub created_at_ms: i64,
    /// Requested amounts as JSON.
    pub payload: Option<String>,
}

/// Audit sink abstraction.
pub trait AuditSink: Send + Sync {
    /// Record an audit event.
    fn record(&self, event: LedgerEvent);
}

/// In-memory audit sink for testing and dev.
pub struct InMemoryAuditSink {
    events: Mutex<VecDeque<LedgerEvent>>,
    max_events: usize,
}

impl InMemoryAuditSink {
    /// Create a new in-memory sink with a bounded buffer.
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(max_events.min(1024))),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events.
    pub fn events(&self) -> Vec<LedgerEvent> {
        self.events.lock().iter().cloned().collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&self, event: LedgerEvent) {
        if self.max_events == 0 {
            return;
        }
        let mut events = self.events.lock();
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event);
    }
}

/// Sink that emits each event as a structured `tracing` record.
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: LedgerEvent) {
        tracing::info!(
            event_id = %event.event_id,
            class = event.class.as_str(),
            service = %event.service,
            action = %event.action,
            payload = event.payload.as_deref().unwrap_or(""),
            "quota ledger change"
        );
    }
}

/// Helper to build an audit event with a fresh id and the current time.
pub fn build_ledger_event<A: Serialize>(
    class: QuotaClass,
    service: &ServiceRef,
    action: impl Into<String>,
    amounts: &A,
) -> LedgerEvent {
    LedgerEvent {
        event_id: uuid::Uuid::new_v4().to_string(),
        class,
        service: service.clone(),
        action: action.into(),
        created_at_ms: now_ms(),
        payload: serde_json::to_string(amounts).ok(),
    }
}
