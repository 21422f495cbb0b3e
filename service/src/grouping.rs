//! Field grouping: group creation, membership assignment (single, bulk, and
//! cross-group), reordering, and removal.
//!
//! Bulk assignment upserts memberships; reordering only rewrites existing
//! ones and silently skips unknown field IDs. The two are deliberately
//! asymmetric.

use fieldkit_engine::{
    ensure_same_owner, reorder_memberships, Error, FieldDefinition, FieldGroup, GroupMembership,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::audit::{emit_event, record_audit, AuditEntry, AuditSink, DomainEvent, EventSink};
use crate::context::{parse_guid, ActorContext};
use crate::error::Result;
use crate::now_ms;
use crate::repo::{DefinitionRepo, GroupRepo};

/// Orchestrates group and membership mutations.
pub struct GroupingService {
    groups: Arc<dyn GroupRepo>,
    definitions: Arc<dyn DefinitionRepo>,
    audit: Arc<dyn AuditSink>,
    events: Arc<dyn EventSink>,
}

impl GroupingService {
    pub fn new(
        groups: Arc<dyn GroupRepo>,
        definitions: Arc<dyn DefinitionRepo>,
        audit: Arc<dyn AuditSink>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            groups,
            definitions,
            audit,
            events,
        }
    }

    /// Create a field group for an owner type. Admin only.
    pub async fn create_group(
        &self,
        ctx: &ActorContext,
        owner_type_id: &str,
        name: &str,
        display_name: &str,
        sort_order: i32,
    ) -> Result<FieldGroup> {
        ctx.require_admin("create field group")?;

        let group = FieldGroup::new(
            Uuid::new_v4().to_string(),
            owner_type_id,
            name,
            display_name,
            sort_order,
            now_ms(),
        );
        self.groups.insert_group(&group).await?;

        record_audit(
            self.audit.as_ref(),
            AuditEntry::new(
                "FieldGroup",
                &group.id,
                "create",
                format!("created group '{}'", group.name),
                ctx.user_id.to_string(),
            ),
        )
        .await;

        Ok(group)
    }

    /// Groups of an owner type, in sort order.
    pub async fn list_groups(&self, owner_type_id: &str) -> Result<Vec<FieldGroup>> {
        self.groups.list_groups(owner_type_id).await
    }

    /// Assign one field to a group at a position. Admin only; the field and
    /// group must belong to the same owner type. Re-assigning updates the
    /// position.
    pub async fn assign_field(
        &self,
        ctx: &ActorContext,
        group_id: &str,
        field_id: &str,
        sort_order: i32,
    ) -> Result<GroupMembership> {
        ctx.require_admin("assign field to group")?;
        let group_id = parse_guid("group id", group_id)?;
        let field_id = parse_guid("field id", field_id)?;

        let group = self.get_group(&group_id).await?;
        let field = self.get_field(&field_id).await?;
        ensure_same_owner(&group, &field)?;

        let membership = GroupMembership::new(group_id, field_id, sort_order);
        self.groups.upsert_membership(&membership).await?;
        self.group_changed(ctx, &group, "assign_field").await;

        Ok(membership)
    }

    /// Assign many fields to one group in the given order, atomically.
    /// Every field is validated before anything is written: one bad field
    /// ID fails the whole call with no partial assignment.
    pub async fn assign_fields_bulk(
        &self,
        ctx: &ActorContext,
        group_id: &str,
        field_ids: &[String],
    ) -> Result<Vec<GroupMembership>> {
        ctx.require_admin("assign fields to group")?;
        let group_id = parse_guid("group id", group_id)?;

        let group = self.get_group(&group_id).await?;

        let mut memberships = Vec::with_capacity(field_ids.len());
        for (position, raw_id) in field_ids.iter().enumerate() {
            let field_id = parse_guid("field id", raw_id)?;
            let field = self.get_field(&field_id).await?;
            ensure_same_owner(&group, &field)?;
            memberships.push(GroupMembership::new(
                group_id.clone(),
                field_id,
                position as i32,
            ));
        }

        self.groups.assign_bulk(&memberships).await?;
        self.group_changed(ctx, &group, "assign_fields_bulk").await;

        Ok(memberships)
    }

    /// Assign fields across several groups in one atomic batch. Each entry
    /// is `(group_id, field_id, sort_order)`.
    pub async fn assign_across_groups(
        &self,
        ctx: &ActorContext,
        assignments: &[(String, String, i32)],
    ) -> Result<Vec<GroupMembership>> {
        ctx.require_admin("assign fields across groups")?;

        let mut memberships = Vec::with_capacity(assignments.len());
        for (raw_group, raw_field, sort_order) in assignments {
            let group_id = parse_guid("group id", raw_group)?;
            let field_id = parse_guid("field id", raw_field)?;

            let group = self.get_group(&group_id).await?;
            let field = self.get_field(&field_id).await?;
            ensure_same_owner(&group, &field)?;

            memberships.push(GroupMembership::new(group_id, field_id, *sort_order));
        }

        self.groups.assign_bulk(&memberships).await?;

        record_audit(
            self.audit.as_ref(),
            AuditEntry::new(
                "FieldGroup",
                "batch",
                "assign_across_groups",
                format!("assigned {} membership(s)", memberships.len()),
                ctx.user_id.to_string(),
            ),
        )
        .await;

        Ok(memberships)
    }

    /// Reorder a group's fields to match `ordered_field_ids`. Only existing
    /// memberships are rewritten; unknown field IDs are skipped, never
    /// created.
    pub async fn reorder(
        &self,
        ctx: &ActorContext,
        group_id: &str,
        ordered_field_ids: &[String],
    ) -> Result<()> {
        ctx.require_admin("reorder group fields")?;
        let group_id = parse_guid("group id", group_id)?;

        let group = self.get_group(&group_id).await?;
        let existing = self.groups.memberships_for_group(&group_id).await?;

        let updates = reorder_memberships(&existing, ordered_field_ids);
        if !updates.is_empty() {
            let orders: Vec<(String, i32)> = updates
                .into_iter()
                .map(|m| (m.field_id, m.sort_order))
                .collect();
            self.groups.update_sort_orders(&group_id, &orders).await?;
            self.group_changed(ctx, &group, "reorder").await;
        }

        Ok(())
    }

    /// Remove one field from a group. Fails with not-found when the
    /// membership does not exist.
    pub async fn remove(&self, ctx: &ActorContext, group_id: &str, field_id: &str) -> Result<()> {
        ctx.require_admin("remove field from group")?;
        let group_id = parse_guid("group id", group_id)?;
        let field_id = parse_guid("field id", field_id)?;

        let group = self.get_group(&group_id).await?;
        if self
            .groups
            .get_membership(&group_id, &field_id)
            .await?
            .is_none()
        {
            return Err(Error::MembershipNotFound { group_id, field_id }.into());
        }

        self.groups.remove(&group_id, &field_id).await?;
        self.group_changed(ctx, &group, "remove_field").await;

        Ok(())
    }

    async fn get_group(&self, group_id: &str) -> Result<FieldGroup> {
        self.groups
            .get_group(group_id)
            .await?
            .ok_or_else(|| Error::GroupNotFound(group_id.to_string()).into())
    }

    async fn get_field(&self, field_id: &str) -> Result<FieldDefinition> {
        match self.definitions.get(field_id).await? {
            Some(def) if def.is_live() => Ok(def),
            _ => Err(Error::DefinitionNotFound(field_id.to_string()).into()),
        }
    }

    async fn group_changed(&self, ctx: &ActorContext, group: &FieldGroup, action: &str) {
        record_audit(
            self.audit.as_ref(),
            AuditEntry::new(
                "FieldGroup",
                &group.id,
                action,
                format!("{} on group '{}'", action, group.name),
                ctx.user_id.to_string(),
            ),
        )
        .await;
        emit_event(
            self.events.as_ref(),
            DomainEvent::GroupChanged {
                group_id: group.id.clone(),
            },
        )
        .await;
    }
}
