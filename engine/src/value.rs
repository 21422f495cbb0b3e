//! Attribute values and the set-values diffing logic.
//!
//! Values are string-encoded and keyed by `(instance_id, field_id)`.
//! Replacing an instance's full value set is expressed as a [`ValueDiff`]
//! so that storage can apply it atomically.

use crate::{error::Result, Error, FieldDefinition, FieldId, InstanceId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// True when a raw value is empty or whitespace-only.
pub fn is_blank(raw: &str) -> bool {
    raw.trim().is_empty()
}

/// The concrete value of one field definition for one entity instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeValue {
    pub id: String,
    pub instance_id: InstanceId,
    pub field_id: FieldId,
    /// String-encoded; numeric fields are additionally parse-checked
    pub raw_value: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl AttributeValue {
    /// Create a new value.
    pub fn new(
        id: impl Into<String>,
        instance_id: impl Into<InstanceId>,
        field_id: impl Into<FieldId>,
        raw_value: impl Into<String>,
        now: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            instance_id: instance_id.into(),
            field_id: field_id.into(),
            raw_value: raw_value.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// One incoming `(field_id, raw_value)` pair for a set-values call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueInput {
    pub field_id: FieldId,
    pub raw_value: String,
}

impl ValueInput {
    pub fn new(field_id: impl Into<FieldId>, raw_value: impl Into<String>) -> Self {
        Self {
            field_id: field_id.into(),
            raw_value: raw_value.into(),
        }
    }
}

/// Validate a full set of incoming values against the live definitions of
/// one owner type.
///
/// Checks, in order:
/// - every input references a live definition (`DefinitionNotFound`)
/// - every required, active, instance-scoped definition has a non-blank
///   input (`RequiredValueMissing` naming the display name)
/// - each provided value satisfies the definition's type and rules
pub fn validate_inputs(definitions: &[FieldDefinition], inputs: &[ValueInput]) -> Result<()> {
    let by_id: HashMap<&str, &FieldDefinition> = definitions
        .iter()
        .filter(|d| d.is_live())
        .map(|d| (d.id.as_str(), d))
        .collect();

    let provided: HashMap<&str, &str> = inputs
        .iter()
        .map(|i| (i.field_id.as_str(), i.raw_value.as_str()))
        .collect();

    for input in inputs {
        if !by_id.contains_key(input.field_id.as_str()) {
            return Err(Error::DefinitionNotFound(input.field_id.clone()));
        }
    }

    for def in by_id.values() {
        if !(def.is_required && def.is_active && def.for_instances) {
            continue;
        }
        match provided.get(def.id.as_str()) {
            Some(raw) if !is_blank(raw) => {}
            _ => return Err(Error::RequiredValueMissing(def.display_name.clone())),
        }
    }

    for input in inputs {
        let def = by_id[input.field_id.as_str()];
        def.validate_value(&input.raw_value)?;
    }

    Ok(())
}

/// The changes needed to make stored values match an incoming set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueDiff {
    /// Field IDs with no stored value yet
    pub insert: Vec<ValueInput>,
    /// Field IDs whose stored value differs from the incoming one
    pub update: Vec<ValueInput>,
    /// Stored field IDs absent from the incoming set
    pub delete: Vec<FieldId>,
}

impl ValueDiff {
    pub fn is_empty(&self) -> bool {
        self.insert.is_empty() && self.update.is_empty() && self.delete.is_empty()
    }

    /// Total number of writes the diff will perform.
    pub fn len(&self) -> usize {
        self.insert.len() + self.update.len() + self.delete.len()
    }
}

/// Compute the symmetric difference between stored values and an incoming
/// full set: intersecting field IDs become updates (only when the raw value
/// changed), new field IDs become inserts, stored field IDs missing from the
/// input become deletes.
pub fn diff_values(existing: &[AttributeValue], incoming: &[ValueInput]) -> ValueDiff {
    let stored: HashMap<&str, &AttributeValue> = existing
        .iter()
        .map(|v| (v.field_id.as_str(), v))
        .collect();
    let incoming_ids: HashSet<&str> = incoming.iter().map(|i| i.field_id.as_str()).collect();

    let mut diff = ValueDiff::default();

    for input in incoming {
        match stored.get(input.field_id.as_str()) {
            Some(current) if current.raw_value == input.raw_value => {}
            Some(_) => diff.update.push(input.clone()),
            None => diff.insert.push(input.clone()),
        }
    }

    for value in existing {
        if !incoming_ids.contains(value.field_id.as_str()) {
            diff.delete.push(value.field_id.clone());
        }
    }

    diff
}
