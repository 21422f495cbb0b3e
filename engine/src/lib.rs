//! # Fieldkit Engine
//!
//! The deterministic core of Fieldkit's dynamic attribute (EAV) subsystem.
//!
//! Administrators declare [`FieldDefinition`]s at runtime for an owner type
//! (for example a unit type), organize them into ordered [`FieldGroup`]s for
//! display, and store per-instance [`AttributeValue`]s that are validated
//! against the live schema at write time. The same core feeds the search
//! pipeline: dynamic attribute filters, haversine geo distance, sorting, and
//! in-memory pagination.
//!
//! ## Design Principles
//!
//! - **No IO**: the engine has no knowledge of databases, networks, or clocks
//! - **Deterministic**: the same inputs always produce the same outputs
//! - **Testable**: pure logic, no mocks needed
//!
//! ## Core Concepts
//!
//! ### Field definitions
//!
//! A [`FieldDefinition`] describes one dynamic attribute: name (unique
//! case-insensitively within its owner type), type, options for choice
//! fields, validation rules, and presentation flags. Definitions are
//! soft-deleted; values of deleted definitions become inert but survive.
//!
//! ### Values and diffing
//!
//! [`AttributeValue`]s are keyed by `(instance_id, field_id)`. Replacing an
//! instance's full value set goes through [`diff_values`], which yields the
//! inserts, updates, and deletions to apply as one atomic unit.
//!
//! ### Schema-change guard
//!
//! [`check_update`] rejects definition changes that would silently
//! invalidate stored values, such as making a field required while blank
//! values exist. Narrowing a choice field's options is governed by
//! [`OptionPolicy`].
//!
//! ### Query pipeline
//!
//! [`SearchCriteria`] combine structured predicates, dynamic attribute
//! filters, an optional [`GeoFilter`], a sort key, and paging. The pipeline
//! functions in [`query`] operate on materialized [`InstanceSnapshot`]s;
//! pushing structured predicates down to storage is the caller's job.

pub mod error;
pub mod field;
pub mod geo;
pub mod group;
pub mod guard;
pub mod query;
pub mod value;

// Re-export main types at crate root
pub use error::{Error, ErrorKind, Result};
pub use field::{ensure_unique_name, DefinitionSpec, FieldDefinition, FieldType, ValidationRule};
pub use geo::{GeoFilter, GeoPoint, EARTH_RADIUS_KM};
pub use group::{
    ensure_same_owner, group_for_display, reorder_memberships, DisplayEntry, DisplayGroup,
    FieldGroup, GroupMembership,
};
pub use guard::{check_update, OptionPolicy};
pub use query::{
    FieldFilter, InstanceSnapshot, Page, SearchCriteria, SearchHit, SortKey, StayWindow,
};
pub use value::{diff_values, is_blank, validate_inputs, AttributeValue, ValueDiff, ValueInput};

/// Type aliases for clarity
pub type FieldId = String;
pub type GroupId = String;
pub type OwnerTypeId = String;
pub type InstanceId = String;
pub type Timestamp = u64;
