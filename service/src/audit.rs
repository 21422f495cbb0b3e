//! Audit and domain-event sinks.
//!
//! Both are best-effort side channels: a sink failure is logged and
//! swallowed, never surfaced to the caller, because it must not invalidate
//! a committed primary write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One append-only audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub entity_type: String,
    pub entity_id: String,
    pub action: String,
    /// Human-readable delta, e.g. "renamed 'floor' to 'floor_number'"
    pub summary: String,
    pub actor: String,
    pub at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        action: impl Into<String>,
        summary: impl Into<String>,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            action: action.into(),
            summary: summary.into(),
            actor: actor.into(),
            at: Utc::now(),
        }
    }
}

/// Append-only activity log consumed by the wider system.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn log_activity(&self, entry: AuditEntry) -> Result<()>;
}

/// Audit sink that writes structured tracing events.
#[derive(Debug, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn log_activity(&self, entry: AuditEntry) -> Result<()> {
        tracing::info!(
            target: "fieldkit::audit",
            entity_type = %entry.entity_type,
            entity_id = %entry.entity_id,
            action = %entry.action,
            actor = %entry.actor,
            "{}",
            entry.summary
        );
        Ok(())
    }
}

/// Record an audit entry, swallowing sink failures.
pub(crate) async fn record_audit(sink: &dyn AuditSink, entry: AuditEntry) {
    if let Err(e) = sink.log_activity(entry).await {
        tracing::warn!("audit sink failed: {}", e);
    }
}

/// Domain events emitted after schema or value mutations. Optional:
/// correctness never depends on a listener seeing them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    DefinitionCreated { field_id: String },
    DefinitionUpdated { field_id: String },
    DefinitionDeleted { field_id: String },
    GroupChanged { group_id: String },
    ValuesReplaced { instance_id: String },
}

/// Downstream event listener seam.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: DomainEvent) -> Result<()>;
}

/// Event sink that drops everything.
#[derive(Debug, Default)]
pub struct NoopEventSink;

#[async_trait]
impl EventSink for NoopEventSink {
    async fn publish(&self, _event: DomainEvent) -> Result<()> {
        Ok(())
    }
}

/// Publish an event, swallowing sink failures.
pub(crate) async fn emit_event(sink: &dyn EventSink, event: DomainEvent) {
    if let Err(e) = sink.publish(event).await {
        tracing::warn!("event sink failed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tracing_sink_accepts_entries() {
        let sink = TracingAuditSink;
        let entry = AuditEntry::new("FieldDefinition", "f-1", "create", "created 'floor'", "u-9");
        assert!(sink.log_activity(entry).await.is_ok());
    }

    #[tokio::test]
    async fn noop_event_sink_accepts_events() {
        let sink = NoopEventSink;
        let event = DomainEvent::DefinitionCreated {
            field_id: "f-1".into(),
        };
        assert!(sink.publish(event).await.is_ok());
    }

    #[test]
    fn event_serialization() {
        let event = DomainEvent::ValuesReplaced {
            instance_id: "i-1".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"values_replaced\""));
    }
}
