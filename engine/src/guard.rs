//! Schema-change consistency guard.
//!
//! Runs before a field definition update commits and rejects changes that
//! would silently invalidate stored values.

use crate::{
    error::Result,
    field::{ensure_unique_name, DefinitionSpec, FieldDefinition},
    value::{is_blank, AttributeValue},
    Error,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Policy for narrowing a choice field's options while values reference the
/// removed options. The source system applied this check inconsistently, so
/// it is configuration, not an invariant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionPolicy {
    /// Allow narrowing; stored values referencing removed options survive
    #[default]
    Lenient,
    /// Reject narrowing when stored values reference removed options
    Strict,
}

impl std::str::FromStr for OptionPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lenient" => Ok(OptionPolicy::Lenient),
            "strict" => Ok(OptionPolicy::Strict),
            other => Err(format!("unknown option policy: '{}'", other)),
        }
    }
}

/// Check a definition update for consistency with stored values.
///
/// - `stored` are the existing values for this field across all instances
/// - `siblings` are the owner type's definitions, used for rename collisions
///
/// Rules:
/// 1. optional → required is rejected while any stored value is blank
/// 2. a rename re-checks case-insensitive uniqueness, excluding self
/// 3. under [`OptionPolicy::Strict`], removing options still referenced by
///    stored values is rejected with the incompatible count
pub fn check_update(
    current: &FieldDefinition,
    spec: &DefinitionSpec,
    stored: &[AttributeValue],
    siblings: &[FieldDefinition],
    policy: OptionPolicy,
) -> Result<()> {
    if !current.is_required && spec.is_required {
        let blanks = stored.iter().filter(|v| is_blank(&v.raw_value)).count();
        if blanks > 0 {
            return Err(Error::BlankValuesExist {
                display_name: spec.display_name.clone(),
                count: blanks,
            });
        }
    }

    if !current.name_matches(&spec.name) {
        ensure_unique_name(
            siblings,
            &current.owner_type_id,
            &spec.name,
            Some(&current.id),
        )?;
    }

    if policy == OptionPolicy::Strict && spec.field_type.is_choice() {
        let removed: HashSet<&str> = current
            .options
            .iter()
            .map(String::as_str)
            .filter(|opt| !spec.options.iter().any(|o| o == opt))
            .collect();

        if !removed.is_empty() {
            let incompatible = stored
                .iter()
                .filter(|v| references_removed(&v.raw_value, &removed))
                .count();
            if incompatible > 0 {
                return Err(Error::RemovedOptionsInUse {
                    display_name: spec.display_name.clone(),
                    count: incompatible,
                });
            }
        }
    }

    Ok(())
}

// Multi-select values are stored comma-separated; a single-select value is
// the raw string itself.
fn references_removed(raw: &str, removed: &HashSet<&str>) -> bool {
    raw.split(',')
        .map(str::trim)
        .any(|part| removed.contains(part))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldType;
    use crate::value::AttributeValue;

    fn choice_def(options: &[&str]) -> FieldDefinition {
        FieldDefinition::new(
            "f-view",
            "u-1",
            DefinitionSpec::new("view", "View", FieldType::Select).with_options(options.to_vec()),
            1000,
        )
        .unwrap()
    }

    fn value(instance: &str, raw: &str) -> AttributeValue {
        AttributeValue::new(format!("v-{}", instance), instance, "f-view", raw, 1000)
    }

    #[test]
    fn required_transition_with_blanks_rejected() {
        let current = FieldDefinition::new(
            "f-1",
            "u-1",
            DefinitionSpec::new("floor", "Floor", FieldType::Number),
            1000,
        )
        .unwrap();
        let spec = DefinitionSpec::new("floor", "Floor", FieldType::Number).required();
        let stored = vec![
            AttributeValue::new("v-1", "i-1", "f-1", "3", 1000),
            AttributeValue::new("v-2", "i-2", "f-1", "  ", 1000),
            AttributeValue::new("v-3", "i-3", "f-1", "", 1000),
        ];

        let result = check_update(&current, &spec, &stored, &[current.clone()], OptionPolicy::Lenient);
        assert!(matches!(
            result,
            Err(Error::BlankValuesExist { count: 2, .. })
        ));
    }

    #[test]
    fn required_transition_without_blanks_passes() {
        let current = FieldDefinition::new(
            "f-1",
            "u-1",
            DefinitionSpec::new("floor", "Floor", FieldType::Number),
            1000,
        )
        .unwrap();
        let spec = DefinitionSpec::new("floor", "Floor", FieldType::Number).required();
        let stored = vec![AttributeValue::new("v-1", "i-1", "f-1", "3", 1000)];

        assert!(check_update(&current, &spec, &stored, &[current.clone()], OptionPolicy::Lenient).is_ok());
    }

    #[test]
    fn already_required_not_rechecked() {
        let current = FieldDefinition::new(
            "f-1",
            "u-1",
            DefinitionSpec::new("floor", "Floor", FieldType::Number).required(),
            1000,
        )
        .unwrap();
        let spec = DefinitionSpec::new("floor", "Floor", FieldType::Number).required();
        // A blank slipped in historically; required → required stays legal.
        let stored = vec![AttributeValue::new("v-1", "i-1", "f-1", "", 1000)];

        assert!(check_update(&current, &spec, &stored, &[current.clone()], OptionPolicy::Lenient).is_ok());
    }

    #[test]
    fn rename_collision_rejected() {
        let current = FieldDefinition::new(
            "f-1",
            "u-1",
            DefinitionSpec::new("floor", "Floor", FieldType::Number),
            1000,
        )
        .unwrap();
        let sibling = FieldDefinition::new(
            "f-2",
            "u-1",
            DefinitionSpec::new("area", "Area", FieldType::Number),
            1000,
        )
        .unwrap();
        let spec = DefinitionSpec::new("AREA", "Floor", FieldType::Number);

        let result = check_update(
            &current,
            &spec,
            &[],
            &[current.clone(), sibling],
            OptionPolicy::Lenient,
        );
        assert!(matches!(result, Err(Error::DuplicateName { .. })));
    }

    #[test]
    fn rename_case_only_is_not_a_collision() {
        let current = FieldDefinition::new(
            "f-1",
            "u-1",
            DefinitionSpec::new("floor", "Floor", FieldType::Number),
            1000,
        )
        .unwrap();
        let spec = DefinitionSpec::new("FLOOR", "Floor", FieldType::Number);

        assert!(check_update(&current, &spec, &[], &[current.clone()], OptionPolicy::Lenient).is_ok());
    }

    #[test]
    fn narrowing_lenient_allows() {
        let current = choice_def(&["sea", "garden", "street"]);
        let spec = DefinitionSpec::new("view", "View", FieldType::Select).with_options(["sea"]);
        let stored = vec![value("i-1", "garden")];

        assert!(check_update(&current, &spec, &stored, &[current.clone()], OptionPolicy::Lenient).is_ok());
    }

    #[test]
    fn narrowing_strict_rejects_referenced_options() {
        let current = choice_def(&["sea", "garden", "street"]);
        let spec = DefinitionSpec::new("view", "View", FieldType::Select).with_options(["sea"]);
        let stored = vec![value("i-1", "garden"), value("i-2", "sea"), value("i-3", "street")];

        let result = check_update(&current, &spec, &stored, &[current.clone()], OptionPolicy::Strict);
        assert!(matches!(
            result,
            Err(Error::RemovedOptionsInUse { count: 2, .. })
        ));
    }

    #[test]
    fn narrowing_strict_passes_when_unreferenced() {
        let current = choice_def(&["sea", "garden"]);
        let spec = DefinitionSpec::new("view", "View", FieldType::Select).with_options(["sea"]);
        let stored = vec![value("i-1", "sea")];

        assert!(check_update(&current, &spec, &stored, &[current.clone()], OptionPolicy::Strict).is_ok());
    }

    #[test]
    fn multi_select_parts_checked() {
        let current = FieldDefinition::new(
            "f-view",
            "u-1",
            DefinitionSpec::new("amenities", "Amenities", FieldType::MultiSelect)
                .with_options(["wifi", "pool", "gym"]),
            1000,
        )
        .unwrap();
        let spec = DefinitionSpec::new("amenities", "Amenities", FieldType::MultiSelect)
            .with_options(["wifi", "gym"]);
        let stored = vec![value("i-1", "wifi, pool")];

        let result = check_update(&current, &spec, &stored, &[current.clone()], OptionPolicy::Strict);
        assert!(matches!(
            result,
            Err(Error::RemovedOptionsInUse { count: 1, .. })
        ));
    }

    #[test]
    fn policy_from_str() {
        assert_eq!("strict".parse::<OptionPolicy>().unwrap(), OptionPolicy::Strict);
        assert_eq!("Lenient".parse::<OptionPolicy>().unwrap(), OptionPolicy::Lenient);
        assert!("nope".parse::<OptionPolicy>().is_err());
    }
}
