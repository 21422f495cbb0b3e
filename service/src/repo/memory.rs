//! In-memory backend for embedding and tests.
//!
//! Per-instance value writes serialize on the instance's map entry;
//! different instances never contend. Bulk operations are validated by the
//! services before they reach the repo, so applying them here is a plain
//! sequence of inserts inside one entry lock.

use async_trait::async_trait;
use dashmap::DashMap;
use fieldkit_engine::{
    query, AttributeValue, FieldDefinition, FieldGroup, GroupMembership, InstanceSnapshot,
    SearchCriteria, Timestamp, ValueDiff,
};
use std::sync::Mutex;
use uuid::Uuid;

use super::{
    DefinitionRepo, GroupRepo, InstanceRepo, SearchLogEntry, SearchLogRepo, ValueRepo,
};
use crate::error::Result;

/// A complete storage backend held in process memory.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    definitions: DashMap<String, FieldDefinition>,
    groups: DashMap<String, FieldGroup>,
    memberships: DashMap<(String, String), GroupMembership>,
    /// Values per instance; the entry lock serializes same-instance writes
    values: DashMap<String, Vec<AttributeValue>>,
    instances: DashMap<String, InstanceSnapshot>,
    search_logs: Mutex<Vec<SearchLogEntry>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded search log entries, for assertions.
    pub fn search_log_entries(&self) -> Vec<SearchLogEntry> {
        match self.search_logs.lock() {
            Ok(logs) => logs.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl DefinitionRepo for MemoryBackend {
    async fn insert(&self, def: &FieldDefinition) -> Result<()> {
        self.definitions.insert(def.id.clone(), def.clone());
        Ok(())
    }

    async fn update(&self, def: &FieldDefinition) -> Result<()> {
        self.definitions.insert(def.id.clone(), def.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<FieldDefinition>> {
        Ok(self.definitions.get(id).map(|d| d.clone()))
    }

    async fn list_for_owner(&self, owner_type_id: &str) -> Result<Vec<FieldDefinition>> {
        let mut defs: Vec<FieldDefinition> = self
            .definitions
            .iter()
            .filter(|d| d.owner_type_id == owner_type_id && d.is_live())
            .map(|d| d.clone())
            .collect();
        defs.sort_by_key(|d| (d.sort_order, d.name.clone()));
        Ok(defs)
    }

    async fn list_for_owner_including_deleted(
        &self,
        owner_type_id: &str,
    ) -> Result<Vec<FieldDefinition>> {
        let mut defs: Vec<FieldDefinition> = self
            .definitions
            .iter()
            .filter(|d| d.owner_type_id == owner_type_id)
            .map(|d| d.clone())
            .collect();
        defs.sort_by_key(|d| (d.sort_order, d.name.clone()));
        Ok(defs)
    }
}

#[async_trait]
impl GroupRepo for MemoryBackend {
    async fn insert_group(&self, group: &FieldGroup) -> Result<()> {
        self.groups.insert(group.id.clone(), group.clone());
        Ok(())
    }

    async fn get_group(&self, id: &str) -> Result<Option<FieldGroup>> {
        Ok(self.groups.get(id).map(|g| g.clone()))
    }

    async fn list_groups(&self, owner_type_id: &str) -> Result<Vec<FieldGroup>> {
        let mut groups: Vec<FieldGroup> = self
            .groups
            .iter()
            .filter(|g| g.owner_type_id == owner_type_id)
            .map(|g| g.clone())
            .collect();
        groups.sort_by_key(|g| g.sort_order);
        Ok(groups)
    }

    async fn upsert_membership(&self, membership: &GroupMembership) -> Result<()> {
        self.memberships.insert(
            (membership.group_id.clone(), membership.field_id.clone()),
            membership.clone(),
        );
        Ok(())
    }

    async fn get_membership(
        &self,
        group_id: &str,
        field_id: &str,
    ) -> Result<Option<GroupMembership>> {
        Ok(self
            .memberships
            .get(&(group_id.to_string(), field_id.to_string()))
            .map(|m| m.clone()))
    }

    async fn memberships_for_group(&self, group_id: &str) -> Result<Vec<GroupMembership>> {
        let mut members: Vec<GroupMembership> = self
            .memberships
            .iter()
            .filter(|m| m.group_id == group_id)
            .map(|m| m.clone())
            .collect();
        members.sort_by_key(|m| m.sort_order);
        Ok(members)
    }

    async fn memberships_for_owner(&self, owner_type_id: &str) -> Result<Vec<GroupMembership>> {
        let group_ids: Vec<String> = self
            .groups
            .iter()
            .filter(|g| g.owner_type_id == owner_type_id)
            .map(|g| g.id.clone())
            .collect();

        let mut members: Vec<GroupMembership> = self
            .memberships
            .iter()
            .filter(|m| group_ids.contains(&m.group_id))
            .map(|m| m.clone())
            .collect();
        members.sort_by_key(|m| m.sort_order);
        Ok(members)
    }

    async fn assign_bulk(&self, memberships: &[GroupMembership]) -> Result<()> {
        for membership in memberships {
            self.memberships.insert(
                (membership.group_id.clone(), membership.field_id.clone()),
                membership.clone(),
            );
        }
        Ok(())
    }

    async fn update_sort_orders(&self, group_id: &str, orders: &[(String, i32)]) -> Result<()> {
        for (field_id, sort_order) in orders {
            if let Some(mut entry) = self
                .memberships
                .get_mut(&(group_id.to_string(), field_id.clone()))
            {
                entry.sort_order = *sort_order;
            }
        }
        Ok(())
    }

    async fn remove(&self, group_id: &str, field_id: &str) -> Result<bool> {
        Ok(self
            .memberships
            .remove(&(group_id.to_string(), field_id.to_string()))
            .is_some())
    }
}

#[async_trait]
impl ValueRepo for MemoryBackend {
    async fn values_for_instance(&self, instance_id: &str) -> Result<Vec<AttributeValue>> {
        Ok(self
            .values
            .get(instance_id)
            .map(|v| v.clone())
            .unwrap_or_default())
    }

    async fn values_for_field(&self, field_id: &str) -> Result<Vec<AttributeValue>> {
        Ok(self
            .values
            .iter()
            .flat_map(|entry| {
                entry
                    .iter()
                    .filter(|v| v.field_id == field_id)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect())
    }

    async fn apply_diff(&self, instance_id: &str, diff: &ValueDiff, now: Timestamp) -> Result<()> {
        let mut entry = self.values.entry(instance_id.to_string()).or_default();

        entry.retain(|v| !diff.delete.contains(&v.field_id));

        for input in &diff.update {
            if let Some(value) = entry.iter_mut().find(|v| v.field_id == input.field_id) {
                value.raw_value = input.raw_value.clone();
                value.updated_at = now;
            }
        }

        for input in &diff.insert {
            entry.push(AttributeValue::new(
                Uuid::new_v4().to_string(),
                instance_id,
                input.field_id.clone(),
                input.raw_value.clone(),
                now,
            ));
        }

        Ok(())
    }

    async fn delete_for_instance(&self, instance_id: &str) -> Result<()> {
        self.values.remove(instance_id);
        Ok(())
    }
}

#[async_trait]
impl InstanceRepo for MemoryBackend {
    async fn upsert(&self, snapshot: &InstanceSnapshot) -> Result<()> {
        self.instances.insert(snapshot.id.clone(), snapshot.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<InstanceSnapshot>> {
        Ok(self.instances.get(id).map(|i| i.clone()))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.instances.remove(id);
        Ok(())
    }

    async fn fetch_candidates(&self, criteria: &SearchCriteria) -> Result<Vec<InstanceSnapshot>> {
        let mut candidates: Vec<InstanceSnapshot> = self
            .instances
            .iter()
            .filter(|i| query::matches_structured(i, criteria))
            .map(|i| i.clone())
            .collect();

        // Overlay current attribute values; the stored snapshot may predate
        // the latest set-values call.
        for candidate in &mut candidates {
            if let Some(values) = self.values.get(&candidate.id) {
                for value in values.iter() {
                    candidate
                        .attributes
                        .insert(value.field_id.clone(), value.raw_value.clone());
                }
            }
        }

        candidates.sort_by_key(|c| c.id.clone());
        Ok(candidates)
    }
}

#[async_trait]
impl SearchLogRepo for MemoryBackend {
    async fn append(&self, entry: &SearchLogEntry) -> Result<()> {
        let mut logs = match self.search_logs.lock() {
            Ok(logs) => logs,
            Err(poisoned) => poisoned.into_inner(),
        };
        logs.push(entry.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldkit_engine::ValueInput;

    fn diff_of(insert: Vec<ValueInput>) -> ValueDiff {
        ValueDiff {
            insert,
            update: Vec::new(),
            delete: Vec::new(),
        }
    }

    #[tokio::test]
    async fn apply_diff_roundtrip() {
        let backend = MemoryBackend::new();

        backend
            .apply_diff(
                "i-1",
                &diff_of(vec![ValueInput::new("f-1", "a"), ValueInput::new("f-2", "b")]),
                1000,
            )
            .await
            .unwrap();

        let stored = backend.values_for_instance("i-1").await.unwrap();
        assert_eq!(stored.len(), 2);

        // Update one, delete the other.
        let diff = ValueDiff {
            insert: Vec::new(),
            update: vec![ValueInput::new("f-1", "a2")],
            delete: vec!["f-2".to_string()],
        };
        backend.apply_diff("i-1", &diff, 2000).await.unwrap();

        let stored = backend.values_for_instance("i-1").await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].raw_value, "a2");
        assert_eq!(stored[0].updated_at, 2000);
    }

    #[tokio::test]
    async fn values_for_field_spans_instances() {
        let backend = MemoryBackend::new();
        backend
            .apply_diff("i-1", &diff_of(vec![ValueInput::new("f-1", "x")]), 1000)
            .await
            .unwrap();
        backend
            .apply_diff("i-2", &diff_of(vec![ValueInput::new("f-1", "y")]), 1000)
            .await
            .unwrap();

        let values = backend.values_for_field("f-1").await.unwrap();
        assert_eq!(values.len(), 2);
    }

    #[tokio::test]
    async fn membership_remove_reports_existence() {
        let backend = MemoryBackend::new();
        backend
            .upsert_membership(&GroupMembership::new("g-1", "f-1", 0))
            .await
            .unwrap();

        assert!(backend.remove("g-1", "f-1").await.unwrap());
        assert!(!backend.remove("g-1", "f-1").await.unwrap());
    }
}
