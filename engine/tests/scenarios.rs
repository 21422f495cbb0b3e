//! Cross-module scenarios for fieldkit-engine.
//!
//! These exercise the schema, guard, diffing, and query pipeline together,
//! plus property tests for the pure numeric pieces.

use fieldkit_engine::{
    check_update, diff_values, group_for_display, reorder_memberships, validate_inputs,
    AttributeValue, DefinitionSpec, Error, FieldDefinition, FieldFilter, FieldGroup, FieldType,
    GeoFilter, GeoPoint, GroupMembership, OptionPolicy, SearchCriteria, ValueInput,
};
use proptest::prelude::*;
use std::collections::HashMap;

fn number_def(id: &str, name: &str, required: bool) -> FieldDefinition {
    let mut spec = DefinitionSpec::new(name, name, FieldType::Number);
    if required {
        spec = spec.required();
    }
    FieldDefinition::new(id, "u-1", spec, 1000).unwrap()
}

// ============================================================================
// Schema lifecycle
// ============================================================================

#[test]
fn required_number_field_lifecycle() {
    // Define a required numeric field, store a valid value, reject a
    // non-decimal one.
    let defs = vec![number_def("f-floor", "floor", true)];

    let ok = validate_inputs(&defs, &[ValueInput::new("f-floor", "3")]);
    assert!(ok.is_ok());

    let bad = validate_inputs(&defs, &[ValueInput::new("f-floor", "third")]);
    assert!(matches!(bad, Err(Error::NotDecimal { display_name, .. }) if display_name == "floor"));
}

#[test]
fn guard_blocks_required_flip_then_allows_after_cleanup() {
    let current = number_def("f-floor", "floor", false);
    let spec = DefinitionSpec::new("floor", "floor", FieldType::Number).required();

    let blank = AttributeValue::new("v-1", "i-1", "f-floor", "", 1000);
    let filled = AttributeValue::new("v-2", "i-2", "f-floor", "2", 1000);

    let siblings = vec![current.clone()];
    let blocked = check_update(
        &current,
        &spec,
        &[blank, filled.clone()],
        &siblings,
        OptionPolicy::Lenient,
    );
    assert!(matches!(blocked, Err(Error::BlankValuesExist { count: 1, .. })));

    // After the blank is remediated the same transition passes.
    let allowed = check_update(&current, &spec, &[filled], &siblings, OptionPolicy::Lenient);
    assert!(allowed.is_ok());
}

// ============================================================================
// Grouping: bulk assign then reorder
// ============================================================================

#[test]
fn bulk_assign_then_partial_reorder() {
    let group = FieldGroup::new("g-1", "u-1", "basics", "Basics", 0, 1000);
    let defs = vec![
        number_def("f-1", "one", false),
        number_def("f-2", "two", false),
        number_def("f-3", "three", false),
    ];

    // Bulk assignment: sequential sort order by position.
    let mut memberships: Vec<GroupMembership> = defs
        .iter()
        .enumerate()
        .map(|(i, d)| GroupMembership::new("g-1", d.id.clone(), i as i32))
        .collect();

    // Reorder [f-3, f-1]: f-2 keeps its old position, nothing is created.
    let updates = reorder_memberships(&memberships, &["f-3".to_string(), "f-1".to_string()]);
    for update in updates {
        let slot = memberships
            .iter_mut()
            .find(|m| m.field_id == update.field_id)
            .unwrap();
        slot.sort_order = update.sort_order;
    }

    let values: Vec<AttributeValue> = defs
        .iter()
        .map(|d| AttributeValue::new(format!("v-{}", d.id), "i-1", d.id.clone(), "1", 1000))
        .collect();

    let display = group_for_display(&[group], &memberships, &defs, &values);
    let order: Vec<&str> = display[0]
        .entries
        .iter()
        .map(|e| e.field.name.as_str())
        .collect();

    // f-3 (order 0) precedes f-1 (order 1); f-2 still appears at its last
    // sort order (1, tied with f-1, stable by membership order).
    assert_eq!(display[0].entries.len(), 3);
    let pos = |name: &str| order.iter().position(|n| *n == name).unwrap();
    assert!(pos("three") < pos("one"));
    assert!(order.contains(&"two"));
}

// ============================================================================
// Search pipeline
// ============================================================================

fn candidate(id: &str, price: f64, floor: Option<&str>) -> fieldkit_engine::InstanceSnapshot {
    let mut attributes = HashMap::new();
    if let Some(f) = floor {
        attributes.insert("f-floor".to_string(), f.to_string());
    }
    fieldkit_engine::InstanceSnapshot {
        id: id.into(),
        owner_type_id: "u-1".into(),
        container_id: None,
        name: format!("Unit {}", id),
        location: "Lisbon".into(),
        price,
        capacity: 2,
        available: true,
        booking_count: 0,
        coords: None,
        attributes,
        created_at: 1,
    }
}

#[test]
fn price_and_field_filter_pipeline() {
    // Ten candidates: four satisfy the price band, two of those have a
    // floor value containing "3".
    let candidates = vec![
        candidate("a", 60.0, Some("3")),
        candidate("b", 75.0, Some("13")),
        candidate("c", 80.0, Some("2")),
        candidate("d", 99.0, None),
        candidate("e", 20.0, Some("3")),
        candidate("f", 120.0, Some("3")),
        candidate("g", 150.0, None),
        candidate("h", 10.0, None),
        candidate("i", 200.0, Some("30")),
        candidate("j", 45.0, Some("2")),
    ];

    let criteria = SearchCriteria {
        min_price: Some(50.0),
        max_price: Some(100.0),
        field_filters: vec![FieldFilter::new("f-floor", "3")],
        ..Default::default()
    };

    let structured: Vec<_> = candidates
        .into_iter()
        .filter(|c| fieldkit_engine::query::matches_structured(c, &criteria))
        .collect();
    assert_eq!(structured.len(), 4);

    let page = fieldkit_engine::query::run(structured, &criteria);
    assert_eq!(page.total, 2);
    let ids: Vec<&str> = page.items.iter().map(|h| h.snapshot.id.as_str()).collect();
    assert!(ids.contains(&"a"));
    assert!(ids.contains(&"b"));
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn haversine_is_zero_on_identical_points(
        lat in -90.0f64..90.0,
        lon in -180.0f64..180.0,
    ) {
        let p = GeoPoint::new(lat, lon);
        prop_assert!(p.distance_km(&p).abs() < 1e-6);
    }

    #[test]
    fn haversine_is_symmetric(
        lat1 in -90.0f64..90.0, lon1 in -180.0f64..180.0,
        lat2 in -90.0f64..90.0, lon2 in -180.0f64..180.0,
    ) {
        let a = GeoPoint::new(lat1, lon1);
        let b = GeoPoint::new(lat2, lon2);
        prop_assert!((a.distance_km(&b) - b.distance_km(&a)).abs() < 1e-6);
    }

    #[test]
    fn haversine_bounded_by_half_circumference(
        lat1 in -90.0f64..90.0, lon1 in -180.0f64..180.0,
        lat2 in -90.0f64..90.0, lon2 in -180.0f64..180.0,
    ) {
        let a = GeoPoint::new(lat1, lon1);
        let b = GeoPoint::new(lat2, lon2);
        let max = std::f64::consts::PI * fieldkit_engine::EARTH_RADIUS_KM;
        prop_assert!(a.distance_km(&b) <= max + 1e-6);
    }

    #[test]
    fn diff_of_applied_diff_is_empty(
        raws in prop::collection::vec("[a-z0-9]{0,8}", 0..10),
    ) {
        // Applying a diff and re-submitting the same inputs must be a no-op.
        let incoming: Vec<ValueInput> = raws
            .iter()
            .enumerate()
            .map(|(i, raw)| ValueInput::new(format!("f-{}", i), raw.clone()))
            .collect();

        let stored: Vec<AttributeValue> = incoming
            .iter()
            .map(|input| {
                AttributeValue::new(
                    format!("v-{}", input.field_id),
                    "i-1",
                    input.field_id.clone(),
                    input.raw_value.clone(),
                    1000,
                )
            })
            .collect();

        let diff = diff_values(&stored, &incoming);
        prop_assert!(diff.is_empty());
    }

    #[test]
    fn geo_filter_never_exceeds_radius(
        lat in -90.0f64..90.0,
        lon in -180.0f64..180.0,
        radius in 0.0f64..20000.0,
    ) {
        let filter = GeoFilter::new(0.0, 0.0, radius);
        if let Some(distance) = filter.distance_within(&GeoPoint::new(lat, lon)) {
            prop_assert!(distance <= radius);
        }
    }
}
