//! Postgres backend.
//!
//! Rows carry JSONB columns for options, validation rules, and search
//! criteria; everything else is flat columns. Multi-step mutations run in a
//! single transaction, which rolls back if the future is dropped before
//! commit.

use async_trait::async_trait;
use fieldkit_engine::{
    AttributeValue, FieldDefinition, FieldGroup, FieldType, GroupMembership, InstanceSnapshot,
    GeoPoint, SearchCriteria, Timestamp, ValidationRule, ValueDiff,
};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, QueryBuilder, Row};
use std::collections::HashMap;
use uuid::Uuid;

use super::{
    DefinitionRepo, GroupRepo, InstanceRepo, SearchLogEntry, SearchLogRepo, ValueRepo,
};
use crate::error::Result;

/// Create a new database connection pool.
pub async fn create_pool(database_url: &str) -> std::result::Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
}

/// Run database migrations.
pub async fn run_migrations(pool: &PgPool) -> std::result::Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Storage backend over a Postgres pool.
#[derive(Debug, Clone)]
pub struct PgBackend {
    pool: PgPool,
}

impl PgBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn decode_err(column: &str, source: impl std::error::Error + Send + Sync + 'static) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(source),
    }
}

fn json_decode_err(column: &str, source: serde_json::Error) -> sqlx::Error {
    decode_err(column, source)
}

/// A field definition row.
#[derive(Debug)]
struct DefinitionRow {
    id: String,
    owner_type_id: String,
    field_type: String,
    name: String,
    display_name: String,
    description: Option<String>,
    options: serde_json::Value,
    validation_rules: serde_json::Value,
    is_required: bool,
    is_searchable: bool,
    is_public: bool,
    category: Option<String>,
    sort_order: i32,
    for_instances: bool,
    is_active: bool,
    deleted: bool,
    created_at: i64,
    updated_at: i64,
}

impl<'r> sqlx::FromRow<'r, PgRow> for DefinitionRow {
    fn from_row(row: &'r PgRow) -> std::result::Result<Self, sqlx::Error> {
        Ok(DefinitionRow {
            id: row.try_get("id")?,
            owner_type_id: row.try_get("owner_type_id")?,
            field_type: row.try_get("field_type")?,
            name: row.try_get("name")?,
            display_name: row.try_get("display_name")?,
            description: row.try_get("description")?,
            options: row.try_get("options")?,
            validation_rules: row.try_get("validation_rules")?,
            is_required: row.try_get("is_required")?,
            is_searchable: row.try_get("is_searchable")?,
            is_public: row.try_get("is_public")?,
            category: row.try_get("category")?,
            sort_order: row.try_get("sort_order")?,
            for_instances: row.try_get("for_instances")?,
            is_active: row.try_get("is_active")?,
            deleted: row.try_get("deleted")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl DefinitionRow {
    fn into_definition(self) -> std::result::Result<FieldDefinition, sqlx::Error> {
        let field_type: FieldType = self
            .field_type
            .parse()
            .map_err(|e: String| decode_err("field_type", std::io::Error::other(e)))?;
        let options: Vec<String> = serde_json::from_value(self.options)
            .map_err(|e| json_decode_err("options", e))?;
        let validation_rules: Vec<ValidationRule> = serde_json::from_value(self.validation_rules)
            .map_err(|e| json_decode_err("validation_rules", e))?;

        Ok(FieldDefinition {
            id: self.id,
            owner_type_id: self.owner_type_id,
            field_type,
            name: self.name,
            display_name: self.display_name,
            description: self.description,
            options,
            validation_rules,
            is_required: self.is_required,
            is_searchable: self.is_searchable,
            is_public: self.is_public,
            category: self.category,
            sort_order: self.sort_order,
            for_instances: self.for_instances,
            is_active: self.is_active,
            deleted: self.deleted,
            created_at: self.created_at as Timestamp,
            updated_at: self.updated_at as Timestamp,
        })
    }
}

#[async_trait]
impl DefinitionRepo for PgBackend {
    async fn insert(&self, def: &FieldDefinition) -> Result<()> {
        let options = serde_json::to_value(&def.options).map_err(|e| {
            crate::error::ServiceError::Internal(format!("options encode: {}", e))
        })?;
        let rules = serde_json::to_value(&def.validation_rules).map_err(|e| {
            crate::error::ServiceError::Internal(format!("rules encode: {}", e))
        })?;

        sqlx::query(
            r#"
            INSERT INTO field_definitions (
                id, owner_type_id, field_type, name, display_name, description,
                options, validation_rules, is_required, is_searchable, is_public,
                category, sort_order, for_instances, is_active, deleted,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                    $14, $15, $16, $17, $18)
            "#,
        )
        .bind(&def.id)
        .bind(&def.owner_type_id)
        .bind(def.field_type.to_string())
        .bind(&def.name)
        .bind(&def.display_name)
        .bind(&def.description)
        .bind(options)
        .bind(rules)
        .bind(def.is_required)
        .bind(def.is_searchable)
        .bind(def.is_public)
        .bind(&def.category)
        .bind(def.sort_order)
        .bind(def.for_instances)
        .bind(def.is_active)
        .bind(def.deleted)
        .bind(def.created_at as i64)
        .bind(def.updated_at as i64)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(&self, def: &FieldDefinition) -> Result<()> {
        let options = serde_json::to_value(&def.options).map_err(|e| {
            crate::error::ServiceError::Internal(format!("options encode: {}", e))
        })?;
        let rules = serde_json::to_value(&def.validation_rules).map_err(|e| {
            crate::error::ServiceError::Internal(format!("rules encode: {}", e))
        })?;

        sqlx::query(
            r#"
            UPDATE field_definitions
            SET owner_type_id = $2, field_type = $3, name = $4,
                display_name = $5, description = $6, options = $7,
                validation_rules = $8, is_required = $9, is_searchable = $10,
                is_public = $11, category = $12, sort_order = $13,
                for_instances = $14, is_active = $15, deleted = $16,
                updated_at = $17
            WHERE id = $1
            "#,
        )
        .bind(&def.id)
        .bind(&def.owner_type_id)
        .bind(def.field_type.to_string())
        .bind(&def.name)
        .bind(&def.display_name)
        .bind(&def.description)
        .bind(options)
        .bind(rules)
        .bind(def.is_required)
        .bind(def.is_searchable)
        .bind(def.is_public)
        .bind(&def.category)
        .bind(def.sort_order)
        .bind(def.for_instances)
        .bind(def.is_active)
        .bind(def.deleted)
        .bind(def.updated_at as i64)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<FieldDefinition>> {
        let row = sqlx::query_as::<_, DefinitionRow>(
            r#"SELECT * FROM field_definitions WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(DefinitionRow::into_definition)
            .transpose()
            .map_err(Into::into)
    }

    async fn list_for_owner(&self, owner_type_id: &str) -> Result<Vec<FieldDefinition>> {
        let rows = sqlx::query_as::<_, DefinitionRow>(
            r#"
            SELECT * FROM field_definitions
            WHERE owner_type_id = $1 AND NOT deleted
            ORDER BY sort_order ASC, name ASC
            "#,
        )
        .bind(owner_type_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| r.into_definition().map_err(Into::into))
            .collect()
    }

    async fn list_for_owner_including_deleted(
        &self,
        owner_type_id: &str,
    ) -> Result<Vec<FieldDefinition>> {
        let rows = sqlx::query_as::<_, DefinitionRow>(
            r#"
            SELECT * FROM field_definitions
            WHERE owner_type_id = $1
            ORDER BY sort_order ASC, name ASC
            "#,
        )
        .bind(owner_type_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| r.into_definition().map_err(Into::into))
            .collect()
    }
}

#[derive(Debug)]
struct GroupRow {
    id: String,
    owner_type_id: String,
    name: String,
    display_name: String,
    description: Option<String>,
    sort_order: i32,
    created_at: i64,
}

impl<'r> sqlx::FromRow<'r, PgRow> for GroupRow {
    fn from_row(row: &'r PgRow) -> std::result::Result<Self, sqlx::Error> {
        Ok(GroupRow {
            id: row.try_get("id")?,
            owner_type_id: row.try_get("owner_type_id")?,
            name: row.try_get("name")?,
            display_name: row.try_get("display_name")?,
            description: row.try_get("description")?,
            sort_order: row.try_get("sort_order")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl GroupRow {
    fn into_group(self) -> FieldGroup {
        FieldGroup {
            id: self.id,
            owner_type_id: self.owner_type_id,
            name: self.name,
            display_name: self.display_name,
            description: self.description,
            sort_order: self.sort_order,
            created_at: self.created_at as Timestamp,
        }
    }
}

#[derive(Debug)]
struct MembershipRow {
    group_id: String,
    field_id: String,
    sort_order: i32,
}

impl<'r> sqlx::FromRow<'r, PgRow> for MembershipRow {
    fn from_row(row: &'r PgRow) -> std::result::Result<Self, sqlx::Error> {
        Ok(MembershipRow {
            group_id: row.try_get("group_id")?,
            field_id: row.try_get("field_id")?,
            sort_order: row.try_get("sort_order")?,
        })
    }
}

impl MembershipRow {
    fn into_membership(self) -> GroupMembership {
        GroupMembership {
            group_id: self.group_id,
            field_id: self.field_id,
            sort_order: self.sort_order,
        }
    }
}

#[async_trait]
impl GroupRepo for PgBackend {
    async fn insert_group(&self, group: &FieldGroup) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO field_groups (
                id, owner_type_id, name, display_name, description, sort_order,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&group.id)
        .bind(&group.owner_type_id)
        .bind(&group.name)
        .bind(&group.display_name)
        .bind(&group.description)
        .bind(group.sort_order)
        .bind(group.created_at as i64)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_group(&self, id: &str) -> Result<Option<FieldGroup>> {
        let row = sqlx::query_as::<_, GroupRow>(r#"SELECT * FROM field_groups WHERE id = $1"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(GroupRow::into_group))
    }

    async fn list_groups(&self, owner_type_id: &str) -> Result<Vec<FieldGroup>> {
        let rows = sqlx::query_as::<_, GroupRow>(
            r#"
            SELECT * FROM field_groups
            WHERE owner_type_id = $1
            ORDER BY sort_order ASC
            "#,
        )
        .bind(owner_type_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(GroupRow::into_group).collect())
    }

    async fn upsert_membership(&self, membership: &GroupMembership) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO group_memberships (group_id, field_id, sort_order)
            VALUES ($1, $2, $3)
            ON CONFLICT (group_id, field_id) DO UPDATE SET sort_order = $3
            "#,
        )
        .bind(&membership.group_id)
        .bind(&membership.field_id)
        .bind(membership.sort_order)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_membership(
        &self,
        group_id: &str,
        field_id: &str,
    ) -> Result<Option<GroupMembership>> {
        let row = sqlx::query_as::<_, MembershipRow>(
            r#"
            SELECT group_id, field_id, sort_order FROM group_memberships
            WHERE group_id = $1 AND field_id = $2
            "#,
        )
        .bind(group_id)
        .bind(field_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(MembershipRow::into_membership))
    }

    async fn memberships_for_group(&self, group_id: &str) -> Result<Vec<GroupMembership>> {
        let rows = sqlx::query_as::<_, MembershipRow>(
            r#"
            SELECT group_id, field_id, sort_order FROM group_memberships
            WHERE group_id = $1
            ORDER BY sort_order ASC
            "#,
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(MembershipRow::into_membership).collect())
    }

    async fn memberships_for_owner(&self, owner_type_id: &str) -> Result<Vec<GroupMembership>> {
        let rows = sqlx::query_as::<_, MembershipRow>(
            r#"
            SELECT m.group_id, m.field_id, m.sort_order
            FROM group_memberships m
            JOIN field_groups g ON g.id = m.group_id
            WHERE g.owner_type_id = $1
            ORDER BY m.sort_order ASC
            "#,
        )
        .bind(owner_type_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(MembershipRow::into_membership).collect())
    }

    async fn assign_bulk(&self, memberships: &[GroupMembership]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for membership in memberships {
            sqlx::query(
                r#"
                INSERT INTO group_memberships (group_id, field_id, sort_order)
                VALUES ($1, $2, $3)
                ON CONFLICT (group_id, field_id) DO UPDATE SET sort_order = $3
                "#,
            )
            .bind(&membership.group_id)
            .bind(&membership.field_id)
            .bind(membership.sort_order)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn update_sort_orders(&self, group_id: &str, orders: &[(String, i32)]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for (field_id, sort_order) in orders {
            sqlx::query(
                r#"
                UPDATE group_memberships SET sort_order = $3
                WHERE group_id = $1 AND field_id = $2
                "#,
            )
            .bind(group_id)
            .bind(field_id)
            .bind(sort_order)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn remove(&self, group_id: &str, field_id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"DELETE FROM group_memberships WHERE group_id = $1 AND field_id = $2"#,
        )
        .bind(group_id)
        .bind(field_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug)]
struct ValueRow {
    id: String,
    instance_id: String,
    field_id: String,
    raw_value: String,
    created_at: i64,
    updated_at: i64,
}

impl<'r> sqlx::FromRow<'r, PgRow> for ValueRow {
    fn from_row(row: &'r PgRow) -> std::result::Result<Self, sqlx::Error> {
        Ok(ValueRow {
            id: row.try_get("id")?,
            instance_id: row.try_get("instance_id")?,
            field_id: row.try_get("field_id")?,
            raw_value: row.try_get("raw_value")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl ValueRow {
    fn into_value(self) -> AttributeValue {
        AttributeValue {
            id: self.id,
            instance_id: self.instance_id,
            field_id: self.field_id,
            raw_value: self.raw_value,
            created_at: self.created_at as Timestamp,
            updated_at: self.updated_at as Timestamp,
        }
    }
}

#[async_trait]
impl ValueRepo for PgBackend {
    async fn values_for_instance(&self, instance_id: &str) -> Result<Vec<AttributeValue>> {
        let rows = sqlx::query_as::<_, ValueRow>(
            r#"SELECT * FROM attribute_values WHERE instance_id = $1"#,
        )
        .bind(instance_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ValueRow::into_value).collect())
    }

    async fn values_for_field(&self, field_id: &str) -> Result<Vec<AttributeValue>> {
        let rows = sqlx::query_as::<_, ValueRow>(
            r#"SELECT * FROM attribute_values WHERE field_id = $1"#,
        )
        .bind(field_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ValueRow::into_value).collect())
    }

    async fn apply_diff(&self, instance_id: &str, diff: &ValueDiff, now: Timestamp) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for field_id in &diff.delete {
            sqlx::query(
                r#"DELETE FROM attribute_values WHERE instance_id = $1 AND field_id = $2"#,
            )
            .bind(instance_id)
            .bind(field_id)
            .execute(&mut *tx)
            .await?;
        }

        for input in &diff.update {
            sqlx::query(
                r#"
                UPDATE attribute_values SET raw_value = $3, updated_at = $4
                WHERE instance_id = $1 AND field_id = $2
                "#,
            )
            .bind(instance_id)
            .bind(&input.field_id)
            .bind(&input.raw_value)
            .bind(now as i64)
            .execute(&mut *tx)
            .await?;
        }

        for input in &diff.insert {
            sqlx::query(
                r#"
                INSERT INTO attribute_values (
                    id, instance_id, field_id, raw_value, created_at, updated_at
                )
                VALUES ($1, $2, $3, $4, $5, $5)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(instance_id)
            .bind(&input.field_id)
            .bind(&input.raw_value)
            .bind(now as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_for_instance(&self, instance_id: &str) -> Result<()> {
        sqlx::query(r#"DELETE FROM attribute_values WHERE instance_id = $1"#)
            .bind(instance_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[derive(Debug)]
struct InstanceRow {
    id: String,
    owner_type_id: String,
    container_id: Option<String>,
    name: String,
    location: String,
    price: f64,
    capacity: i32,
    available: bool,
    booking_count: i32,
    latitude: Option<f64>,
    longitude: Option<f64>,
    created_at: i64,
}

impl<'r> sqlx::FromRow<'r, PgRow> for InstanceRow {
    fn from_row(row: &'r PgRow) -> std::result::Result<Self, sqlx::Error> {
        Ok(InstanceRow {
            id: row.try_get("id")?,
            owner_type_id: row.try_get("owner_type_id")?,
            container_id: row.try_get("container_id")?,
            name: row.try_get("name")?,
            location: row.try_get("location")?,
            price: row.try_get("price")?,
            capacity: row.try_get("capacity")?,
            available: row.try_get("available")?,
            booking_count: row.try_get("booking_count")?,
            latitude: row.try_get("latitude")?,
            longitude: row.try_get("longitude")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl InstanceRow {
    fn into_snapshot(self) -> InstanceSnapshot {
        let coords = match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)),
            _ => None,
        };

        InstanceSnapshot {
            id: self.id,
            owner_type_id: self.owner_type_id,
            container_id: self.container_id,
            name: self.name,
            location: self.location,
            price: self.price,
            capacity: self.capacity.max(0) as u32,
            available: self.available,
            booking_count: self.booking_count.max(0) as u32,
            coords,
            attributes: HashMap::new(),
            created_at: self.created_at as Timestamp,
        }
    }
}

#[async_trait]
impl InstanceRepo for PgBackend {
    async fn upsert(&self, snapshot: &InstanceSnapshot) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO instances (
                id, owner_type_id, container_id, name, location, price,
                capacity, available, booking_count, latitude, longitude,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (id) DO UPDATE SET
                owner_type_id = $2, container_id = $3, name = $4,
                location = $5, price = $6, capacity = $7, available = $8,
                booking_count = $9, latitude = $10, longitude = $11
            "#,
        )
        .bind(&snapshot.id)
        .bind(&snapshot.owner_type_id)
        .bind(&snapshot.container_id)
        .bind(&snapshot.name)
        .bind(&snapshot.location)
        .bind(snapshot.price)
        .bind(snapshot.capacity as i32)
        .bind(snapshot.available)
        .bind(snapshot.booking_count as i32)
        .bind(snapshot.coords.as_ref().map(|c| c.lat))
        .bind(snapshot.coords.as_ref().map(|c| c.lon))
        .bind(snapshot.created_at as i64)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<InstanceSnapshot>> {
        let row = sqlx::query_as::<_, InstanceRow>(r#"SELECT * FROM instances WHERE id = $1"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else { return Ok(None) };
        let mut snapshot = row.into_snapshot();
        self.attach_attributes(std::slice::from_mut(&mut snapshot))
            .await?;
        Ok(Some(snapshot))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        sqlx::query(r#"DELETE FROM instances WHERE id = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn fetch_candidates(&self, criteria: &SearchCriteria) -> Result<Vec<InstanceSnapshot>> {
        let mut qb: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new("SELECT * FROM instances WHERE TRUE");

        if let Some(text) = &criteria.text {
            let pattern = format!("%{}%", text.to_lowercase());
            qb.push(" AND (LOWER(name) LIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" OR LOWER(location) LIKE ");
            qb.push_bind(pattern);
            qb.push(")");
        }
        if let Some(owner) = &criteria.owner_type_id {
            qb.push(" AND owner_type_id = ");
            qb.push_bind(owner.clone());
        }
        if let Some(container) = &criteria.container_id {
            qb.push(" AND container_id = ");
            qb.push_bind(container.clone());
        }
        if let Some(min) = criteria.min_price {
            qb.push(" AND price >= ");
            qb.push_bind(min);
        }
        if let Some(max) = criteria.max_price {
            qb.push(" AND price <= ");
            qb.push_bind(max);
        }
        if let Some(min) = criteria.min_capacity {
            qb.push(" AND capacity >= ");
            qb.push_bind(min as i32);
        }
        if let Some(max) = criteria.max_capacity {
            qb.push(" AND capacity <= ");
            qb.push_bind(max as i32);
        }
        if let Some(available) = criteria.available {
            qb.push(" AND available = ");
            qb.push_bind(available);
        }
        qb.push(" ORDER BY id ASC");

        let rows: Vec<InstanceRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        let mut snapshots: Vec<InstanceSnapshot> =
            rows.into_iter().map(InstanceRow::into_snapshot).collect();

        self.attach_attributes(&mut snapshots).await?;
        Ok(snapshots)
    }
}

impl PgBackend {
    /// Load searchable, live attribute values for the given snapshots.
    async fn attach_attributes(&self, snapshots: &mut [InstanceSnapshot]) -> Result<()> {
        if snapshots.is_empty() {
            return Ok(());
        }
        let ids: Vec<String> = snapshots.iter().map(|s| s.id.clone()).collect();

        let rows = sqlx::query(
            r#"
            SELECT v.instance_id, v.field_id, v.raw_value
            FROM attribute_values v
            JOIN field_definitions d ON d.id = v.field_id
            WHERE d.is_searchable AND NOT d.deleted AND v.instance_id = ANY($1)
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_instance: HashMap<String, Vec<(String, String)>> = HashMap::new();
        for row in rows {
            let instance_id: String = row.try_get("instance_id")?;
            let field_id: String = row.try_get("field_id")?;
            let raw_value: String = row.try_get("raw_value")?;
            by_instance
                .entry(instance_id)
                .or_default()
                .push((field_id, raw_value));
        }

        for snapshot in snapshots {
            if let Some(values) = by_instance.remove(&snapshot.id) {
                snapshot.attributes.extend(values);
            }
        }

        Ok(())
    }
}

#[async_trait]
impl SearchLogRepo for PgBackend {
    async fn append(&self, entry: &SearchLogEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO search_logs (
                user_id, search_type, criteria, result_count, page_number,
                page_size, logged_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&entry.user_id)
        .bind(&entry.search_type)
        .bind(&entry.criteria)
        .bind(entry.result_count)
        .bind(entry.page_number)
        .bind(entry.page_size)
        .bind(entry.logged_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
