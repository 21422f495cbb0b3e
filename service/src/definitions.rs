//! Field definition lifecycle: create, update (guarded), activation toggle,
//! and soft delete. All mutations are admin-gated and audited.

use fieldkit_engine::{
    check_update, ensure_unique_name, DefinitionSpec, Error, FieldDefinition, OptionPolicy,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::audit::{emit_event, record_audit, AuditEntry, AuditSink, DomainEvent, EventSink};
use crate::context::{parse_guid, ActorContext};
use crate::error::Result;
use crate::now_ms;
use crate::repo::{DefinitionRepo, ValueRepo};

/// Orchestrates field definition mutations against storage.
pub struct DefinitionService {
    definitions: Arc<dyn DefinitionRepo>,
    values: Arc<dyn ValueRepo>,
    audit: Arc<dyn AuditSink>,
    events: Arc<dyn EventSink>,
    policy: OptionPolicy,
}

impl DefinitionService {
    pub fn new(
        definitions: Arc<dyn DefinitionRepo>,
        values: Arc<dyn ValueRepo>,
        audit: Arc<dyn AuditSink>,
        events: Arc<dyn EventSink>,
        policy: OptionPolicy,
    ) -> Self {
        Self {
            definitions,
            values,
            audit,
            events,
            policy,
        }
    }

    /// Create a field definition for an owner type. Admin only; the name
    /// must be unique (case-insensitive) among the owner type's live
    /// definitions.
    pub async fn create(
        &self,
        ctx: &ActorContext,
        owner_type_id: &str,
        spec: DefinitionSpec,
    ) -> Result<FieldDefinition> {
        ctx.require_admin("create field definition")?;

        let siblings = self.definitions.list_for_owner(owner_type_id).await?;
        ensure_unique_name(&siblings, owner_type_id, &spec.name, None)?;

        let def = FieldDefinition::new(Uuid::new_v4().to_string(), owner_type_id, spec, now_ms())?;
        self.definitions.insert(&def).await?;

        tracing::info!(field_id = %def.id, owner_type_id, name = %def.name, "field definition created");
        record_audit(
            self.audit.as_ref(),
            AuditEntry::new(
                "FieldDefinition",
                &def.id,
                "create",
                format!("created '{}'", def.name),
                ctx.user_id.to_string(),
            ),
        )
        .await;
        emit_event(
            self.events.as_ref(),
            DomainEvent::DefinitionCreated {
                field_id: def.id.clone(),
            },
        )
        .await;

        Ok(def)
    }

    /// Update a field definition. Admin only. The schema-change guard runs
    /// against the field's stored values before anything is written.
    pub async fn update(
        &self,
        ctx: &ActorContext,
        field_id: &str,
        spec: DefinitionSpec,
    ) -> Result<FieldDefinition> {
        ctx.require_admin("update field definition")?;
        let field_id = parse_guid("field id", field_id)?;

        let mut def = self.get_live(&field_id).await?;

        let stored = self.values.values_for_field(&field_id).await?;
        let siblings = self.definitions.list_for_owner(&def.owner_type_id).await?;
        check_update(&def, &spec, &stored, &siblings, self.policy)?;

        let renamed = !def.name_matches(&spec.name);
        let summary = if renamed {
            format!("renamed '{}' to '{}'", def.name, spec.name)
        } else {
            format!("updated '{}'", def.name)
        };

        def.apply_spec(spec, now_ms())?;
        self.definitions.update(&def).await?;

        record_audit(
            self.audit.as_ref(),
            AuditEntry::new(
                "FieldDefinition",
                &def.id,
                "update",
                summary,
                ctx.user_id.to_string(),
            ),
        )
        .await;
        emit_event(
            self.events.as_ref(),
            DomainEvent::DefinitionUpdated {
                field_id: def.id.clone(),
            },
        )
        .await;

        Ok(def)
    }

    /// Flip a definition's active flag. Inactive definitions keep their
    /// values but stop being enforced as required.
    pub async fn toggle_active(
        &self,
        ctx: &ActorContext,
        field_id: &str,
        active: bool,
    ) -> Result<FieldDefinition> {
        ctx.require_admin("toggle field definition")?;
        let field_id = parse_guid("field id", field_id)?;

        let mut def = self.get_live(&field_id).await?;
        if def.is_active != active {
            def.is_active = active;
            def.updated_at = now_ms();
            self.definitions.update(&def).await?;

            let action = if active { "activate" } else { "deactivate" };
            record_audit(
                self.audit.as_ref(),
                AuditEntry::new(
                    "FieldDefinition",
                    &def.id,
                    action,
                    format!("{}d '{}'", action, def.name),
                    ctx.user_id.to_string(),
                ),
            )
            .await;
            emit_event(
                self.events.as_ref(),
                DomainEvent::DefinitionUpdated {
                    field_id: def.id.clone(),
                },
            )
            .await;
        }

        Ok(def)
    }

    /// Soft-delete a definition. Stored values survive but become inert:
    /// invisible in display, no longer validated or required.
    pub async fn soft_delete(&self, ctx: &ActorContext, field_id: &str) -> Result<()> {
        ctx.require_admin("delete field definition")?;
        let field_id = parse_guid("field id", field_id)?;

        let mut def = self.get_live(&field_id).await?;
        def.mark_deleted(now_ms());
        self.definitions.update(&def).await?;

        tracing::info!(field_id = %def.id, name = %def.name, "field definition soft-deleted");
        record_audit(
            self.audit.as_ref(),
            AuditEntry::new(
                "FieldDefinition",
                &def.id,
                "delete",
                format!("deleted '{}'", def.name),
                ctx.user_id.to_string(),
            ),
        )
        .await;
        emit_event(
            self.events.as_ref(),
            DomainEvent::DefinitionDeleted { field_id: def.id },
        )
        .await;

        Ok(())
    }

    /// Fetch one live definition by ID.
    pub async fn get(&self, field_id: &str) -> Result<FieldDefinition> {
        let field_id = parse_guid("field id", field_id)?;
        self.get_live(&field_id).await
    }

    /// Live definitions for an owner type, in sort order.
    pub async fn list_for_owner(&self, owner_type_id: &str) -> Result<Vec<FieldDefinition>> {
        self.definitions.list_for_owner(owner_type_id).await
    }

    async fn get_live(&self, field_id: &str) -> Result<FieldDefinition> {
        match self.definitions.get(field_id).await? {
            Some(def) if def.is_live() => Ok(def),
            _ => Err(Error::DefinitionNotFound(field_id.to_string()).into()),
        }
    }
}
