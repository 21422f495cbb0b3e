//! External collaborators: availability checks and the search index client.
//!
//! Both are opaque to this core. The index is an eventually consistent
//! replica: it is written fire-and-forget and never read back for
//! correctness-critical filtering.

use async_trait::async_trait;
use fieldkit_engine::{InstanceSnapshot, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::error::Result;

/// Availability collaborator, consulted for stay-window filtering.
#[async_trait]
pub trait AvailabilityProvider: Send + Sync {
    /// Whether one instance is free for the whole window.
    async fn is_available(
        &self,
        instance_id: &str,
        check_in: Timestamp,
        check_out: Timestamp,
    ) -> Result<bool>;

    /// Batch variant scoped to one container (e.g. a property); preferred
    /// over per-candidate calls when the search carries a container filter.
    /// Returning an empty set defers to per-candidate [`is_available`]
    /// checks, so providers without batch support stay consistent.
    ///
    /// [`is_available`]: AvailabilityProvider::is_available
    async fn available_instance_ids(
        &self,
        container_id: &str,
        check_in: Timestamp,
        check_out: Timestamp,
        guest_count: u32,
    ) -> Result<HashSet<String>>;
}

/// Provider that reports every instance as available. Useful for embedding
/// without a booking system and for tests. Has no batch support: its batch
/// variant returns the empty set, deferring to per-candidate checks.
#[derive(Debug, Default)]
pub struct AlwaysAvailable;

#[async_trait]
impl AvailabilityProvider for AlwaysAvailable {
    async fn is_available(&self, _: &str, _: Timestamp, _: Timestamp) -> Result<bool> {
        Ok(true)
    }

    async fn available_instance_ids(
        &self,
        _: &str,
        _: Timestamp,
        _: Timestamp,
        _: u32,
    ) -> Result<HashSet<String>> {
        Ok(HashSet::new())
    }
}

/// The instance-level document mirrored to the external index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceDocument {
    pub id: String,
    pub owner_type_id: String,
    pub name: String,
    pub location: String,
    pub price: f64,
    pub capacity: u32,
    pub available: bool,
    /// Raw attribute values keyed by field ID
    pub attributes: HashMap<String, String>,
}

impl InstanceDocument {
    pub fn from_snapshot(snapshot: &InstanceSnapshot) -> Self {
        Self {
            id: snapshot.id.clone(),
            owner_type_id: snapshot.owner_type_id.clone(),
            name: snapshot.name.clone(),
            location: snapshot.location.clone(),
            price: snapshot.price,
            capacity: snapshot.capacity,
            available: snapshot.available,
            attributes: snapshot.attributes.clone(),
        }
    }
}

/// What an attribute-level index event does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeOp {
    Upsert,
    Delete,
}

/// One attribute-level index event, so the index can maintain per-field
/// documents rather than only instance documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeEvent {
    pub field_id: String,
    pub field_name: String,
    pub field_type: String,
    pub raw_value: String,
    pub instance_id: String,
    pub op: AttributeOp,
    /// Groups the events of one logical mutation
    pub correlation_id: Uuid,
}

/// External search index client. Fire-and-forget from this core's
/// perspective; failures are logged by the caller, never propagated.
#[async_trait]
pub trait SearchIndexClient: Send + Sync {
    async fn index_instance(&self, doc: &InstanceDocument) -> Result<()>;
    async fn update_instance(&self, doc: &InstanceDocument) -> Result<()>;
    async fn publish_attribute_event(&self, event: &AttributeEvent) -> Result<()>;
}

/// Index client that drops everything.
#[derive(Debug, Default)]
pub struct NoopIndexClient;

#[async_trait]
impl SearchIndexClient for NoopIndexClient {
    async fn index_instance(&self, _: &InstanceDocument) -> Result<()> {
        Ok(())
    }

    async fn update_instance(&self, _: &InstanceDocument) -> Result<()> {
        Ok(())
    }

    async fn publish_attribute_event(&self, _: &AttributeEvent) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_event_serialization() {
        let event = AttributeEvent {
            field_id: "f-1".into(),
            field_name: "floor".into(),
            field_type: "number".into(),
            raw_value: "3".into(),
            instance_id: "i-1".into(),
            op: AttributeOp::Delete,
            correlation_id: Uuid::new_v4(),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"op\":\"delete\""));
        assert!(json.contains("\"correlationId\""));

        let parsed: AttributeEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, parsed);
    }

    #[tokio::test]
    async fn always_available() {
        let provider = AlwaysAvailable;
        assert!(provider.is_available("i-1", 0, 1).await.unwrap());
    }
}
