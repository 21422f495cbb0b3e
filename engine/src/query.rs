//! The in-memory half of the search pipeline.
//!
//! Structured predicates are pushed down to storage where possible; the
//! functions here run over materialized [`InstanceSnapshot`]s: dynamic
//! attribute filters, geo distance, sorting, and pagination. Availability
//! filtering sits between the dynamic filters and the geo step and is the
//! orchestrator's job, since it needs an external collaborator.

use crate::{FieldId, GeoFilter, InstanceId, OwnerTypeId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One dynamic-attribute filter: case-insensitive substring match against
/// the stored raw value of `field_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldFilter {
    pub field_id: FieldId,
    pub contains: String,
}

impl FieldFilter {
    pub fn new(field_id: impl Into<FieldId>, contains: impl Into<String>) -> Self {
        Self {
            field_id: field_id.into(),
            contains: contains.into(),
        }
    }
}

/// A requested check-in/check-out window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StayWindow {
    pub check_in: Timestamp,
    pub check_out: Timestamp,
    pub guest_count: u32,
}

/// Requested result ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Booking count, descending
    Popularity,
    PriceAsc,
    PriceDesc,
    NameAsc,
    NameDesc,
    /// Recency, descending (the default)
    Newest,
}

/// Multi-criteria search input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchCriteria {
    /// Free-text containment against name and location
    pub text: Option<String>,
    pub owner_type_id: Option<OwnerTypeId>,
    /// The containing entity (e.g. a property), when searching inside one
    pub container_id: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_capacity: Option<u32>,
    pub max_capacity: Option<u32>,
    pub available: Option<bool>,
    pub field_filters: Vec<FieldFilter>,
    pub stay: Option<StayWindow>,
    pub geo: Option<GeoFilter>,
    pub sort: Option<SortKey>,
    /// 1-based page number
    pub page: u32,
    pub page_size: u32,
}

impl Default for SearchCriteria {
    fn default() -> Self {
        Self {
            text: None,
            owner_type_id: None,
            container_id: None,
            min_price: None,
            max_price: None,
            min_capacity: None,
            max_capacity: None,
            available: None,
            field_filters: Vec::new(),
            stay: None,
            geo: None,
            sort: None,
            page: 1,
            page_size: 20,
        }
    }
}

/// A materialized search candidate: structured columns plus the searchable
/// attribute values, as read from storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceSnapshot {
    pub id: InstanceId,
    pub owner_type_id: OwnerTypeId,
    pub container_id: Option<String>,
    pub name: String,
    pub location: String,
    pub price: f64,
    pub capacity: u32,
    pub available: bool,
    pub booking_count: u32,
    pub coords: Option<crate::GeoPoint>,
    /// Raw attribute values keyed by field ID
    pub attributes: HashMap<FieldId, String>,
    pub created_at: Timestamp,
}

/// One search result with its computed geo distance, when a geo filter ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub snapshot: InstanceSnapshot,
    pub distance_km: Option<f64>,
}

/// A page of results, sliced after all filters and sorting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Total matches before pagination
    pub total: usize,
    pub page: u32,
    pub page_size: u32,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u32 {
        if self.page_size == 0 {
            return 0;
        }
        self.total.div_ceil(self.page_size as usize) as u32
    }
}

/// Structured-column predicates. The storage backends push these down where
/// they can; the in-memory backend evaluates them with this function.
pub fn matches_structured(snapshot: &InstanceSnapshot, criteria: &SearchCriteria) -> bool {
    if let Some(text) = &criteria.text {
        let needle = text.to_lowercase();
        let in_name = snapshot.name.to_lowercase().contains(&needle);
        let in_location = snapshot.location.to_lowercase().contains(&needle);
        if !in_name && !in_location {
            return false;
        }
    }
    if let Some(owner) = &criteria.owner_type_id {
        if &snapshot.owner_type_id != owner {
            return false;
        }
    }
    if let Some(container) = &criteria.container_id {
        if snapshot.container_id.as_deref() != Some(container.as_str()) {
            return false;
        }
    }
    if let Some(min) = criteria.min_price {
        if snapshot.price < min {
            return false;
        }
    }
    if let Some(max) = criteria.max_price {
        if snapshot.price > max {
            return false;
        }
    }
    if let Some(min) = criteria.min_capacity {
        if snapshot.capacity < min {
            return false;
        }
    }
    if let Some(max) = criteria.max_capacity {
        if snapshot.capacity > max {
            return false;
        }
    }
    if let Some(available) = criteria.available {
        if snapshot.available != available {
            return false;
        }
    }
    true
}

/// Dynamic-attribute predicates: every filter must match, case-insensitive
/// substring semantics. An instance with no value for a filtered field does
/// not match.
pub fn matches_field_filters(snapshot: &InstanceSnapshot, filters: &[FieldFilter]) -> bool {
    filters.iter().all(|filter| {
        snapshot
            .attributes
            .get(&filter.field_id)
            .map(|raw| {
                raw.to_lowercase()
                    .contains(&filter.contains.to_lowercase())
            })
            .unwrap_or(false)
    })
}

/// Apply the optional geo filter, turning snapshots into hits. Candidates
/// without coordinates never match a geo filter; without a filter every
/// candidate passes with no distance.
pub fn apply_geo(candidates: Vec<InstanceSnapshot>, geo: Option<&GeoFilter>) -> Vec<SearchHit> {
    match geo {
        None => candidates
            .into_iter()
            .map(|snapshot| SearchHit {
                snapshot,
                distance_km: None,
            })
            .collect(),
        Some(filter) => candidates
            .into_iter()
            .filter_map(|snapshot| {
                let distance = filter.distance_within(snapshot.coords.as_ref()?)?;
                Some(SearchHit {
                    snapshot,
                    distance_km: Some(distance),
                })
            })
            .collect(),
    }
}

/// Sort hits by the requested key. With no explicit key, a geo-filtered
/// search sorts by distance; everything else falls back to recency.
pub fn sort_hits(hits: &mut [SearchHit], sort: Option<SortKey>, geo_applied: bool) {
    match sort {
        Some(SortKey::Popularity) => {
            hits.sort_by(|a, b| b.snapshot.booking_count.cmp(&a.snapshot.booking_count));
        }
        Some(SortKey::PriceAsc) => {
            hits.sort_by(|a, b| a.snapshot.price.total_cmp(&b.snapshot.price));
        }
        Some(SortKey::PriceDesc) => {
            hits.sort_by(|a, b| b.snapshot.price.total_cmp(&a.snapshot.price));
        }
        Some(SortKey::NameAsc) => {
            hits.sort_by(|a, b| a.snapshot.name.cmp(&b.snapshot.name));
        }
        Some(SortKey::NameDesc) => {
            hits.sort_by(|a, b| b.snapshot.name.cmp(&a.snapshot.name));
        }
        Some(SortKey::Newest) => {
            hits.sort_by(|a, b| b.snapshot.created_at.cmp(&a.snapshot.created_at));
        }
        None if geo_applied => {
            hits.sort_by(|a, b| {
                let da = a.distance_km.unwrap_or(f64::MAX);
                let db = b.distance_km.unwrap_or(f64::MAX);
                da.total_cmp(&db)
            });
        }
        None => {
            hits.sort_by(|a, b| b.snapshot.created_at.cmp(&a.snapshot.created_at));
        }
    }
}

/// Slice one page out of the sorted hit list. Pages are 1-based; a page
/// past the end yields an empty item list with the true total.
pub fn paginate<T>(items: Vec<T>, page: u32, page_size: u32) -> Page<T> {
    let total = items.len();
    let page = page.max(1);
    let size = page_size.max(1) as usize;
    let start = (page as usize - 1) * size;

    let items = if start >= total {
        Vec::new()
    } else {
        items.into_iter().skip(start).take(size).collect()
    };

    Page {
        items,
        total,
        page,
        page_size: page_size.max(1),
    }
}

/// Run the in-memory tail of the pipeline over pre-materialized candidates:
/// dynamic filters, geo, sort, paginate. Structured and availability
/// filtering are assumed to have happened already.
pub fn run(candidates: Vec<InstanceSnapshot>, criteria: &SearchCriteria) -> Page<SearchHit> {
    let filtered: Vec<InstanceSnapshot> = candidates
        .into_iter()
        .filter(|c| matches_field_filters(c, &criteria.field_filters))
        .collect();

    let geo_applied = criteria.geo.is_some();
    let mut hits = apply_geo(filtered, criteria.geo.as_ref());
    sort_hits(&mut hits, criteria.sort, geo_applied);
    paginate(hits, criteria.page, criteria.page_size)
}
