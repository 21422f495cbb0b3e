//! Searchable instance lifecycle and its index mirroring.

use fieldkit_engine::{Error, InstanceSnapshot};
use std::sync::Arc;

use crate::audit::{record_audit, AuditEntry, AuditSink};
use crate::context::ActorContext;
use crate::error::Result;
use crate::indexing::IndexSync;
use crate::repo::{DefinitionRepo, InstanceRepo, ValueRepo};

/// Orchestrates instance writes and deletions.
pub struct InstanceService {
    instances: Arc<dyn InstanceRepo>,
    values: Arc<dyn ValueRepo>,
    definitions: Arc<dyn DefinitionRepo>,
    audit: Arc<dyn AuditSink>,
    index: Arc<IndexSync>,
}

impl InstanceService {
    pub fn new(
        instances: Arc<dyn InstanceRepo>,
        values: Arc<dyn ValueRepo>,
        definitions: Arc<dyn DefinitionRepo>,
        audit: Arc<dyn AuditSink>,
        index: Arc<IndexSync>,
    ) -> Self {
        Self {
            instances,
            values,
            definitions,
            audit,
            index,
        }
    }

    /// Create or update a searchable instance, then mirror it to the index
    /// best effort.
    pub async fn upsert_instance(
        &self,
        ctx: &ActorContext,
        snapshot: InstanceSnapshot,
    ) -> Result<()> {
        let existed = self.instances.get(&snapshot.id).await?.is_some();
        self.instances.upsert(&snapshot).await?;

        let action = if existed { "update" } else { "create" };
        record_audit(
            self.audit.as_ref(),
            AuditEntry::new(
                "Instance",
                &snapshot.id,
                action,
                format!("{}d instance '{}'", action, snapshot.name),
                ctx.user_id.to_string(),
            ),
        )
        .await;

        if existed {
            self.index.instance_updated(&snapshot).await;
        } else {
            self.index.instance_indexed(&snapshot).await;
        }

        Ok(())
    }

    /// Fetch one instance with its searchable attributes.
    pub async fn get_instance(&self, instance_id: &str) -> Result<InstanceSnapshot> {
        self.instances
            .get(instance_id)
            .await?
            .ok_or_else(|| Error::InstanceNotFound(instance_id.to_string()).into())
    }

    /// Delete an instance and all of its attribute values, then publish one
    /// index delete event per stored attribute so attribute-level documents
    /// can be cleaned up.
    pub async fn delete_instance(&self, ctx: &ActorContext, instance_id: &str) -> Result<()> {
        let snapshot = self.get_instance(instance_id).await?;
        let values = self.values.values_for_instance(instance_id).await?;
        // Soft-deleted definitions included: their inert values still have
        // attribute documents to clean up.
        let definitions = self
            .definitions
            .list_for_owner_including_deleted(&snapshot.owner_type_id)
            .await?;

        self.values.delete_for_instance(instance_id).await?;
        self.instances.delete(instance_id).await?;

        tracing::info!(instance_id, values = values.len(), "instance deleted");
        record_audit(
            self.audit.as_ref(),
            AuditEntry::new(
                "Instance",
                instance_id,
                "delete",
                format!("deleted instance '{}'", snapshot.name),
                ctx.user_id.to_string(),
            ),
        )
        .await;

        self.index
            .instance_removed(instance_id, &values, &definitions)
            .await;

        Ok(())
    }
}
