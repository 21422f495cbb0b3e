//! Persistence abstraction, split by aggregate.
//!
//! Multi-step mutations (bulk assignment, value diffs) are single trait
//! methods so that each backend can make them atomic its own way: the
//! Postgres backend wraps them in one transaction, the in-memory backend in
//! one lock scope.

pub mod memory;
pub mod pg;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fieldkit_engine::{
    AttributeValue, FieldDefinition, FieldGroup, GroupMembership, InstanceSnapshot,
    SearchCriteria, Timestamp, ValueDiff,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Field definition storage.
#[async_trait]
pub trait DefinitionRepo: Send + Sync {
    async fn insert(&self, def: &FieldDefinition) -> Result<()>;
    async fn update(&self, def: &FieldDefinition) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<FieldDefinition>>;
    /// Live (non-deleted) definitions for one owner type.
    async fn list_for_owner(&self, owner_type_id: &str) -> Result<Vec<FieldDefinition>>;

    /// All definitions for one owner type, soft-deleted included. Needed by
    /// cleanup paths that must still describe inert values.
    async fn list_for_owner_including_deleted(
        &self,
        owner_type_id: &str,
    ) -> Result<Vec<FieldDefinition>>;
}

/// Field group and membership storage.
#[async_trait]
pub trait GroupRepo: Send + Sync {
    async fn insert_group(&self, group: &FieldGroup) -> Result<()>;
    async fn get_group(&self, id: &str) -> Result<Option<FieldGroup>>;
    async fn list_groups(&self, owner_type_id: &str) -> Result<Vec<FieldGroup>>;

    async fn upsert_membership(&self, membership: &GroupMembership) -> Result<()>;
    async fn get_membership(&self, group_id: &str, field_id: &str)
        -> Result<Option<GroupMembership>>;
    async fn memberships_for_group(&self, group_id: &str) -> Result<Vec<GroupMembership>>;
    async fn memberships_for_owner(&self, owner_type_id: &str) -> Result<Vec<GroupMembership>>;

    /// Upsert a batch of memberships atomically: either all land or none.
    async fn assign_bulk(&self, memberships: &[GroupMembership]) -> Result<()>;

    /// Rewrite sort orders for existing memberships atomically. Never
    /// inserts.
    async fn update_sort_orders(
        &self,
        group_id: &str,
        orders: &[(String, i32)],
    ) -> Result<()>;

    /// Remove one membership; returns whether it existed.
    async fn remove(&self, group_id: &str, field_id: &str) -> Result<bool>;
}

/// Attribute value storage.
#[async_trait]
pub trait ValueRepo: Send + Sync {
    async fn values_for_instance(&self, instance_id: &str) -> Result<Vec<AttributeValue>>;
    async fn values_for_field(&self, field_id: &str) -> Result<Vec<AttributeValue>>;

    /// Apply a full set-values diff for one instance atomically.
    async fn apply_diff(
        &self,
        instance_id: &str,
        diff: &ValueDiff,
        now: Timestamp,
    ) -> Result<()>;

    /// Drop all values of one instance (instance deletion path).
    async fn delete_for_instance(&self, instance_id: &str) -> Result<()>;
}

/// Searchable instance storage.
#[async_trait]
pub trait InstanceRepo: Send + Sync {
    async fn upsert(&self, snapshot: &InstanceSnapshot) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<InstanceSnapshot>>;
    async fn delete(&self, id: &str) -> Result<()>;

    /// Materialize candidates with the structured predicates applied and
    /// searchable attribute values attached. Dynamic, geo, and
    /// availability filtering happen above this call.
    async fn fetch_candidates(&self, criteria: &SearchCriteria) -> Result<Vec<InstanceSnapshot>>;
}

/// One append-only search log row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchLogEntry {
    pub user_id: String,
    pub search_type: String,
    /// The serialized criteria as submitted
    pub criteria: serde_json::Value,
    pub result_count: i64,
    pub page_number: i32,
    pub page_size: i32,
    pub logged_at: DateTime<Utc>,
}

/// Append-only search log storage. No update path exists by design.
#[async_trait]
pub trait SearchLogRepo: Send + Sync {
    async fn append(&self, entry: &SearchLogEntry) -> Result<()>;
}
