//! Field groups and display assembly.
//!
//! Groups organize a type's field definitions into ordered, named blocks for
//! presentation. Membership is a `(group_id, field_id)` pair with its own
//! sort order inside the group.

use crate::{
    error::Result, AttributeValue, Error, FieldDefinition, FieldId, GroupId, OwnerTypeId,
    Timestamp,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A named, ordered collection of field definitions for one owner type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldGroup {
    pub id: GroupId,
    pub owner_type_id: OwnerTypeId,
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub sort_order: i32,
    pub created_at: Timestamp,
}

impl FieldGroup {
    pub fn new(
        id: impl Into<GroupId>,
        owner_type_id: impl Into<OwnerTypeId>,
        name: impl Into<String>,
        display_name: impl Into<String>,
        sort_order: i32,
        now: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            owner_type_id: owner_type_id.into(),
            name: name.into(),
            display_name: display_name.into(),
            description: None,
            sort_order,
            created_at: now,
        }
    }
}

/// Membership of one field in one group, with its position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMembership {
    pub group_id: GroupId,
    pub field_id: FieldId,
    pub sort_order: i32,
}

impl GroupMembership {
    pub fn new(group_id: impl Into<GroupId>, field_id: impl Into<FieldId>, sort_order: i32) -> Self {
        Self {
            group_id: group_id.into(),
            field_id: field_id.into(),
            sort_order,
        }
    }
}

/// Reject assignment of a field to a group of a different owner type.
pub fn ensure_same_owner(group: &FieldGroup, field: &FieldDefinition) -> Result<()> {
    if group.owner_type_id != field.owner_type_id {
        return Err(Error::OwnerTypeMismatch {
            field_id: field.id.clone(),
            field_owner: field.owner_type_id.clone(),
            group_id: group.id.clone(),
            group_owner: group.owner_type_id.clone(),
        });
    }
    Ok(())
}

/// Compute new sort orders for a reorder call.
///
/// Only existing memberships are rewritten: field IDs in `ordered_field_ids`
/// with no membership in the group are silently skipped, and memberships not
/// mentioned keep their current sort order. This is intentionally narrower
/// than bulk assignment, which upserts.
pub fn reorder_memberships(
    existing: &[GroupMembership],
    ordered_field_ids: &[FieldId],
) -> Vec<GroupMembership> {
    let known: HashMap<&str, &GroupMembership> = existing
        .iter()
        .map(|m| (m.field_id.as_str(), m))
        .collect();

    ordered_field_ids
        .iter()
        .filter_map(|field_id| known.get(field_id.as_str()))
        .enumerate()
        .map(|(position, membership)| GroupMembership {
            group_id: membership.group_id.clone(),
            field_id: membership.field_id.clone(),
            sort_order: position as i32,
        })
        .collect()
}

/// One field with its stored value, positioned inside a display group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayEntry {
    pub field: FieldDefinition,
    pub raw_value: String,
    pub sort_order: i32,
}

/// A display group with its value-bearing entries, in presentation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayGroup {
    pub group: FieldGroup,
    pub entries: Vec<DisplayEntry>,
}

/// Join groups, memberships, definitions, and stored values into the
/// display structure: groups ordered by their sort order, entries ordered by
/// membership sort order. Fields with no stored value are omitted, as are
/// deleted definitions.
pub fn group_for_display(
    groups: &[FieldGroup],
    memberships: &[GroupMembership],
    definitions: &[FieldDefinition],
    values: &[AttributeValue],
) -> Vec<DisplayGroup> {
    let defs_by_id: HashMap<&str, &FieldDefinition> = definitions
        .iter()
        .filter(|d| d.is_live())
        .map(|d| (d.id.as_str(), d))
        .collect();
    let values_by_field: HashMap<&str, &AttributeValue> = values
        .iter()
        .map(|v| (v.field_id.as_str(), v))
        .collect();

    let mut ordered_groups: Vec<&FieldGroup> = groups.iter().collect();
    ordered_groups.sort_by_key(|g| g.sort_order);

    ordered_groups
        .into_iter()
        .map(|group| {
            let mut members: Vec<&GroupMembership> = memberships
                .iter()
                .filter(|m| m.group_id == group.id)
                .collect();
            members.sort_by_key(|m| m.sort_order);

            let entries = members
                .into_iter()
                .filter_map(|membership| {
                    let field = defs_by_id.get(membership.field_id.as_str())?;
                    let value = values_by_field.get(membership.field_id.as_str())?;
                    Some(DisplayEntry {
                        field: (*field).clone(),
                        raw_value: value.raw_value.clone(),
                        sort_order: membership.sort_order,
                    })
                })
                .collect();

            DisplayGroup {
                group: group.clone(),
                entries,
            }
        })
        .collect()
}
