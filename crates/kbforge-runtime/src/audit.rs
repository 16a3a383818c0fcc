use kbforge_core::ResourceKind;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisioningEventType {
    Requested,
    Created,
    Failed,
}

/// One step of applying a plan.
#[derive(Debug, Clone, Serialize)]
pub struct ProvisioningEvent {
    pub event_id: Uuid,
    /// UTC timestamp (RFC3339).
    pub occurred_at: chrono::DateTime<chrono::Utc>,
    pub resource_id: String,
    pub kind: ResourceKind,
    pub event_type: ProvisioningEventType,
    pub detail: serde_json::Value,
}

impl ProvisioningEvent {
    pub fn new(
        resource_id: impl Into<String>,
        kind: ResourceKind,
        event_type: ProvisioningEventType,
        detail: serde_json::Value,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: chrono::Utc::now(),
            resource_id: resource_id.into(),
            kind,
            event_type,
            detail,
        }
    }
}

/// Trait boundary for recording provisioning steps.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: ProvisioningEvent);
}

/// Prints one line per event.
pub struct StdoutAuditSink;

impl AuditSink for StdoutAuditSink {
    fn record(&self, event: ProvisioningEvent) {
        println!(
            "[AUDIT] {} resource={} kind={} event={:?} detail={}",
            event.occurred_at.to_rfc3339(),
            event.resource_id,
            event.kind,
            event.event_type,
            event.detail
        );
    }
}

/// Forwards events to the tracing subscriber.
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: ProvisioningEvent) {
        tracing::info!(
            event_id = %event.event_id,
            resource = %event.resource_id,
            kind = %event.kind,
            event = ?event.event_type,
            detail = %event.detail,
            "provisioning event"
        );
    }
}
