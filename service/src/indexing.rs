//! Best-effort synchronization with the external search index.
//!
//! Every method here logs failures and returns normally: the database is the
//! source of truth and the index is a replica that may lag or miss updates.
//! A full reindex reconciles any drift.

use fieldkit_engine::{AttributeValue, FieldDefinition, InstanceSnapshot, ValueDiff};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::external::{AttributeEvent, AttributeOp, InstanceDocument, SearchIndexClient};

/// Mirrors instance and attribute mutations into the search index.
pub struct IndexSync {
    client: Arc<dyn SearchIndexClient>,
}

impl IndexSync {
    pub fn new(client: Arc<dyn SearchIndexClient>) -> Self {
        Self { client }
    }

    /// Mirror a newly stored instance.
    pub async fn instance_indexed(&self, snapshot: &InstanceSnapshot) {
        let doc = InstanceDocument::from_snapshot(snapshot);
        if let Err(e) = self.client.index_instance(&doc).await {
            tracing::warn!(instance_id = %snapshot.id, "index write failed: {}", e);
        }
    }

    /// Mirror an updated instance.
    pub async fn instance_updated(&self, snapshot: &InstanceSnapshot) {
        let doc = InstanceDocument::from_snapshot(snapshot);
        if let Err(e) = self.client.update_instance(&doc).await {
            tracing::warn!(instance_id = %snapshot.id, "index update failed: {}", e);
        }
    }

    /// Publish one delete event per stored attribute of a removed instance,
    /// all sharing a correlation ID.
    pub async fn instance_removed(
        &self,
        instance_id: &str,
        values: &[AttributeValue],
        definitions: &[FieldDefinition],
    ) {
        let correlation_id = Uuid::new_v4();
        let defs = by_id(definitions);

        for value in values {
            let Some(def) = defs.get(value.field_id.as_str()) else {
                continue;
            };
            let event = attribute_event(
                def,
                instance_id,
                &value.raw_value,
                AttributeOp::Delete,
                correlation_id,
            );
            self.publish(&event).await;
        }
    }

    /// Publish attribute events for a committed value diff: upserts for
    /// inserted and updated values, deletes for removed ones.
    pub async fn values_changed(
        &self,
        instance_id: &str,
        diff: &ValueDiff,
        definitions: &[FieldDefinition],
    ) {
        let correlation_id = Uuid::new_v4();
        let defs = by_id(definitions);

        for input in diff.insert.iter().chain(diff.update.iter()) {
            let Some(def) = defs.get(input.field_id.as_str()) else {
                continue;
            };
            let event = attribute_event(
                def,
                instance_id,
                &input.raw_value,
                AttributeOp::Upsert,
                correlation_id,
            );
            self.publish(&event).await;
        }

        for field_id in &diff.delete {
            let Some(def) = defs.get(field_id.as_str()) else {
                continue;
            };
            let event = attribute_event(def, instance_id, "", AttributeOp::Delete, correlation_id);
            self.publish(&event).await;
        }
    }

    async fn publish(&self, event: &AttributeEvent) {
        if let Err(e) = self.client.publish_attribute_event(event).await {
            tracing::warn!(
                instance_id = %event.instance_id,
                field_id = %event.field_id,
                "attribute event publish failed: {}",
                e
            );
        }
    }
}

fn by_id(definitions: &[FieldDefinition]) -> HashMap<&str, &FieldDefinition> {
    definitions.iter().map(|d| (d.id.as_str(), d)).collect()
}

fn attribute_event(
    def: &FieldDefinition,
    instance_id: &str,
    raw_value: &str,
    op: AttributeOp,
    correlation_id: Uuid,
) -> AttributeEvent {
    AttributeEvent {
        field_id: def.id.clone(),
        field_name: def.name.clone(),
        field_type: def.field_type.to_string(),
        raw_value: raw_value.to_string(),
        instance_id: instance_id.to_string(),
        op,
        correlation_id,
    }
}
