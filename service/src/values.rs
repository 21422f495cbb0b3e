//! Per-instance attribute values: validated full-set replacement with
//! diffing, plus the grouped display read side.

use fieldkit_engine::{
    diff_values, group_for_display, validate_inputs, AttributeValue, DisplayGroup, ValueDiff,
    ValueInput,
};
use std::collections::HashSet;
use std::sync::Arc;

use crate::audit::{emit_event, record_audit, AuditEntry, AuditSink, DomainEvent, EventSink};
use crate::context::ActorContext;
use crate::error::Result;
use crate::indexing::IndexSync;
use crate::now_ms;
use crate::repo::{DefinitionRepo, GroupRepo, ValueRepo};

/// Orchestrates value reads and the set-values flow.
pub struct ValueService {
    definitions: Arc<dyn DefinitionRepo>,
    groups: Arc<dyn GroupRepo>,
    values: Arc<dyn ValueRepo>,
    audit: Arc<dyn AuditSink>,
    events: Arc<dyn EventSink>,
    index: Arc<IndexSync>,
}

impl ValueService {
    pub fn new(
        definitions: Arc<dyn DefinitionRepo>,
        groups: Arc<dyn GroupRepo>,
        values: Arc<dyn ValueRepo>,
        audit: Arc<dyn AuditSink>,
        events: Arc<dyn EventSink>,
        index: Arc<IndexSync>,
    ) -> Self {
        Self {
            definitions,
            groups,
            values,
            audit,
            events,
            index,
        }
    }

    /// Replace an instance's full value set.
    ///
    /// The incoming set is validated against the owner type's live
    /// definitions, diffed against stored values, and the diff is applied
    /// atomically. Fields absent from the input are deleted. Returns the
    /// applied diff; an unchanged set writes nothing.
    pub async fn set_values(
        &self,
        ctx: &ActorContext,
        owner_type_id: &str,
        instance_id: &str,
        inputs: &[ValueInput],
    ) -> Result<ValueDiff> {
        let definitions = self.definitions.list_for_owner(owner_type_id).await?;
        validate_inputs(&definitions, inputs)?;

        // Values of soft-deleted definitions are inert: keeping them out of
        // the diff means a full-set replacement cannot destroy them.
        let live: HashSet<&str> = definitions.iter().map(|d| d.id.as_str()).collect();
        let existing: Vec<AttributeValue> = self
            .values
            .values_for_instance(instance_id)
            .await?
            .into_iter()
            .filter(|v| live.contains(v.field_id.as_str()))
            .collect();
        let diff = diff_values(&existing, inputs);
        if diff.is_empty() {
            return Ok(diff);
        }

        self.values.apply_diff(instance_id, &diff, now_ms()).await?;
        tracing::debug!(
            instance_id,
            inserts = diff.insert.len(),
            updates = diff.update.len(),
            deletes = diff.delete.len(),
            "value set replaced"
        );

        record_audit(
            self.audit.as_ref(),
            AuditEntry::new(
                "AttributeValue",
                instance_id,
                "set_values",
                format!("applied {} value change(s)", diff.len()),
                ctx.user_id.to_string(),
            ),
        )
        .await;
        emit_event(
            self.events.as_ref(),
            DomainEvent::ValuesReplaced {
                instance_id: instance_id.to_string(),
            },
        )
        .await;

        // Mirror to the index, best effort.
        self.index
            .values_changed(instance_id, &diff, &definitions)
            .await;

        Ok(diff)
    }

    /// All stored values of one instance.
    pub async fn get_values(&self, instance_id: &str) -> Result<Vec<AttributeValue>> {
        self.values.values_for_instance(instance_id).await
    }

    /// An instance's values arranged by field group for presentation:
    /// groups in their sort order, entries in membership order, valueless
    /// and deleted fields omitted.
    pub async fn grouped_for_display(
        &self,
        owner_type_id: &str,
        instance_id: &str,
    ) -> Result<Vec<DisplayGroup>> {
        let groups = self.groups.list_groups(owner_type_id).await?;
        let memberships = self.groups.memberships_for_owner(owner_type_id).await?;
        let definitions = self.definitions.list_for_owner(owner_type_id).await?;
        let values = self.values.values_for_instance(instance_id).await?;

        Ok(group_for_display(
            &groups,
            &memberships,
            &definitions,
            &values,
        ))
    }
}
