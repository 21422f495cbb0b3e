//! Field definitions - the schema of one dynamic attribute.
//!
//! A definition belongs to exactly one owner type and carries everything
//! needed to validate and present stored values: type, options for choice
//! fields, structured validation rules, and presentation flags.

use crate::{error::Result, value::is_blank, Error, FieldId, OwnerTypeId, Timestamp};
use serde::{Deserialize, Serialize};

/// Types a dynamic field can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Number,
    Currency,
    Percentage,
    Range,
    Select,
    MultiSelect,
    Bool,
    Date,
}

impl FieldType {
    /// Numeric family: raw values must parse as decimals.
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            FieldType::Number | FieldType::Currency | FieldType::Percentage | FieldType::Range
        )
    }

    /// Choice family: definitions must carry at least one option.
    pub fn is_choice(self) -> bool {
        matches!(self, FieldType::Select | FieldType::MultiSelect)
    }
}

impl std::str::FromStr for FieldType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "text" => Ok(FieldType::Text),
            "number" => Ok(FieldType::Number),
            "currency" => Ok(FieldType::Currency),
            "percentage" => Ok(FieldType::Percentage),
            "range" => Ok(FieldType::Range),
            "select" => Ok(FieldType::Select),
            "multi_select" => Ok(FieldType::MultiSelect),
            "bool" => Ok(FieldType::Bool),
            "date" => Ok(FieldType::Date),
            other => Err(format!("unknown field type: '{}'", other)),
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FieldType::Text => "text",
            FieldType::Number => "number",
            FieldType::Currency => "currency",
            FieldType::Percentage => "percentage",
            FieldType::Range => "range",
            FieldType::Select => "select",
            FieldType::MultiSelect => "multi_select",
            FieldType::Bool => "bool",
            FieldType::Date => "date",
        };
        write!(f, "{}", name)
    }
}

/// A structured validation rule attached to a definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ValidationRule {
    MinLength { value: usize },
    MaxLength { value: usize },
    Min { value: f64 },
    Max { value: f64 },
}

/// The mutable part of a field definition, used for create and update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionSpec {
    pub field_type: FieldType,
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    /// Ordered set of allowed values, required for choice types
    pub options: Vec<String>,
    pub validation_rules: Vec<ValidationRule>,
    pub is_required: bool,
    pub is_searchable: bool,
    pub is_public: bool,
    pub category: Option<String>,
    pub sort_order: i32,
    /// Whether the field applies to concrete instances (vs. the type itself)
    pub for_instances: bool,
}

impl DefinitionSpec {
    /// Create a spec with sensible defaults: optional, searchable, public,
    /// instance-scoped.
    pub fn new(
        name: impl Into<String>,
        display_name: impl Into<String>,
        field_type: FieldType,
    ) -> Self {
        Self {
            field_type,
            name: name.into(),
            display_name: display_name.into(),
            description: None,
            options: Vec::new(),
            validation_rules: Vec::new(),
            is_required: false,
            is_searchable: true,
            is_public: true,
            category: None,
            sort_order: 0,
            for_instances: true,
        }
    }

    /// Builder-style: mark the field required.
    pub fn required(mut self) -> Self {
        self.is_required = true;
        self
    }

    /// Builder-style: set the allowed options.
    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    /// Builder-style: add a validation rule.
    pub fn with_rule(mut self, rule: ValidationRule) -> Self {
        self.validation_rules.push(rule);
        self
    }

    /// Check the spec's own shape: non-empty name, options present for
    /// choice types.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::EmptyName);
        }
        if self.field_type.is_choice() && self.options.is_empty() {
            return Err(Error::MissingOptions(self.name.clone()));
        }
        Ok(())
    }
}

/// Schema-level description of one dynamic attribute for an owner type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    pub id: FieldId,
    pub owner_type_id: OwnerTypeId,
    pub field_type: FieldType,
    /// Unique (case-insensitive) within the owner type
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub options: Vec<String>,
    pub validation_rules: Vec<ValidationRule>,
    pub is_required: bool,
    pub is_searchable: bool,
    pub is_public: bool,
    pub category: Option<String>,
    pub sort_order: i32,
    pub for_instances: bool,
    pub is_active: bool,
    /// Soft delete flag; values of deleted definitions become inert
    pub deleted: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl FieldDefinition {
    /// Create a new definition from a validated spec.
    pub fn new(
        id: impl Into<FieldId>,
        owner_type_id: impl Into<OwnerTypeId>,
        spec: DefinitionSpec,
        now: Timestamp,
    ) -> Result<Self> {
        spec.validate()?;
        Ok(Self {
            id: id.into(),
            owner_type_id: owner_type_id.into(),
            field_type: spec.field_type,
            name: spec.name,
            display_name: spec.display_name,
            description: spec.description,
            options: spec.options,
            validation_rules: spec.validation_rules,
            is_required: spec.is_required,
            is_searchable: spec.is_searchable,
            is_public: spec.is_public,
            category: spec.category,
            sort_order: spec.sort_order,
            for_instances: spec.for_instances,
            is_active: true,
            deleted: false,
            created_at: now,
            updated_at: now,
        })
    }

    /// Overwrite the mutable part of the definition with a validated spec.
    ///
    /// Callers are expected to have run the schema-change guard first; this
    /// only re-checks the spec's own shape.
    pub fn apply_spec(&mut self, spec: DefinitionSpec, now: Timestamp) -> Result<()> {
        spec.validate()?;
        self.field_type = spec.field_type;
        self.name = spec.name;
        self.display_name = spec.display_name;
        self.description = spec.description;
        self.options = spec.options;
        self.validation_rules = spec.validation_rules;
        self.is_required = spec.is_required;
        self.is_searchable = spec.is_searchable;
        self.is_public = spec.is_public;
        self.category = spec.category;
        self.sort_order = spec.sort_order;
        self.for_instances = spec.for_instances;
        self.updated_at = now;
        Ok(())
    }

    /// Case-insensitive name comparison.
    pub fn name_matches(&self, other: &str) -> bool {
        self.name.to_lowercase() == other.to_lowercase()
    }

    /// Mark the definition soft-deleted. Stored values are untouched.
    pub fn mark_deleted(&mut self, now: Timestamp) {
        self.deleted = true;
        self.updated_at = now;
    }

    /// Whether the definition participates in validation and display.
    pub fn is_live(&self) -> bool {
        !self.deleted
    }

    /// Validate one raw value against this definition's type and rules.
    ///
    /// Presence of required values is the caller's concern (a missing value
    /// never reaches this function); blank values are accepted here so that
    /// optional fields can be cleared.
    pub fn validate_value(&self, raw: &str) -> Result<()> {
        if is_blank(raw) {
            if self.is_required {
                return Err(Error::RequiredValueMissing(self.display_name.clone()));
            }
            return Ok(());
        }

        let numeric = if self.field_type.is_numeric() {
            let parsed: f64 = raw.trim().parse().map_err(|_| Error::NotDecimal {
                display_name: self.display_name.clone(),
                raw: raw.to_string(),
            })?;
            if !parsed.is_finite() {
                return Err(Error::NotDecimal {
                    display_name: self.display_name.clone(),
                    raw: raw.to_string(),
                });
            }
            Some(parsed)
        } else {
            None
        };

        for rule in &self.validation_rules {
            self.apply_rule(rule, raw, numeric)?;
        }

        Ok(())
    }

    fn apply_rule(&self, rule: &ValidationRule, raw: &str, numeric: Option<f64>) -> Result<()> {
        let violation = |message: String| Error::RuleViolation {
            display_name: self.display_name.clone(),
            message,
        };

        match rule {
            ValidationRule::MinLength { value } => {
                if raw.chars().count() < *value {
                    return Err(violation(format!("must be at least {} characters", value)));
                }
            }
            ValidationRule::MaxLength { value } => {
                if raw.chars().count() > *value {
                    return Err(violation(format!("must be at most {} characters", value)));
                }
            }
            ValidationRule::Min { value } => {
                if let Some(n) = numeric {
                    if n < *value {
                        return Err(violation(format!("must be at least {}", value)));
                    }
                }
            }
            ValidationRule::Max { value } => {
                if let Some(n) = numeric {
                    if n > *value {
                        return Err(violation(format!("must be at most {}", value)));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Reject a name that collides (case-insensitively) with an existing live
/// definition for the same owner type. `exclude_id` skips the definition
/// being updated.
pub fn ensure_unique_name(
    existing: &[FieldDefinition],
    owner_type_id: &str,
    name: &str,
    exclude_id: Option<&str>,
) -> Result<()> {
    let collision = existing.iter().any(|def| {
        def.is_live()
            && def.owner_type_id == owner_type_id
            && def.name_matches(name)
            && exclude_id != Some(def.id.as_str())
    });

    if collision {
        Err(Error::DuplicateName {
            name: name.to_string(),
            owner_type_id: owner_type_id.to_string(),
        })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floor_def() -> FieldDefinition {
        FieldDefinition::new(
            "f-1",
            "u-1",
            DefinitionSpec::new("floor", "Floor", FieldType::Number).required(),
            1000,
        )
        .unwrap()
    }

    #[test]
    fn create_definition() {
        let def = floor_def();
        assert_eq!(def.name, "floor");
        assert!(def.is_required);
        assert!(def.is_active);
        assert!(def.is_live());
        assert_eq!(def.created_at, 1000);
    }

    #[test]
    fn choice_without_options_rejected() {
        let result = FieldDefinition::new(
            "f-2",
            "u-1",
            DefinitionSpec::new("view", "View", FieldType::Select),
            1000,
        );
        assert!(matches!(result, Err(Error::MissingOptions(name)) if name == "view"));
    }

    #[test]
    fn choice_with_options_accepted() {
        let def = FieldDefinition::new(
            "f-2",
            "u-1",
            DefinitionSpec::new("view", "View", FieldType::Select)
                .with_options(["sea", "garden"]),
            1000,
        )
        .unwrap();
        assert_eq!(def.options, vec!["sea", "garden"]);
    }

    #[test]
    fn empty_name_rejected() {
        let result = FieldDefinition::new(
            "f-3",
            "u-1",
            DefinitionSpec::new("  ", "Blank", FieldType::Text),
            1000,
        );
        assert!(matches!(result, Err(Error::EmptyName)));
    }

    #[test]
    fn numeric_value_validation() {
        let def = floor_def();
        assert!(def.validate_value("3").is_ok());
        assert!(def.validate_value("3.5").is_ok());
        assert!(def.validate_value(" 42 ").is_ok());

        let result = def.validate_value("third");
        assert!(matches!(result, Err(Error::NotDecimal { display_name, .. }) if display_name == "Floor"));
    }

    #[test]
    fn required_blank_rejected() {
        let def = floor_def();
        let result = def.validate_value("   ");
        assert!(matches!(result, Err(Error::RequiredValueMissing(name)) if name == "Floor"));
    }

    #[test]
    fn optional_blank_accepted() {
        let def = FieldDefinition::new(
            "f-4",
            "u-1",
            DefinitionSpec::new("note", "Note", FieldType::Text),
            1000,
        )
        .unwrap();
        assert!(def.validate_value("").is_ok());
    }

    #[test]
    fn min_max_rules() {
        let def = FieldDefinition::new(
            "f-5",
            "u-1",
            DefinitionSpec::new("capacity", "Capacity", FieldType::Number)
                .with_rule(ValidationRule::Min { value: 1.0 })
                .with_rule(ValidationRule::Max { value: 10.0 }),
            1000,
        )
        .unwrap();

        assert!(def.validate_value("5").is_ok());
        assert!(matches!(
            def.validate_value("0"),
            Err(Error::RuleViolation { .. })
        ));
        assert!(matches!(
            def.validate_value("11"),
            Err(Error::RuleViolation { .. })
        ));
    }

    #[test]
    fn length_rules() {
        let def = FieldDefinition::new(
            "f-6",
            "u-1",
            DefinitionSpec::new("code", "Code", FieldType::Text)
                .with_rule(ValidationRule::MinLength { value: 2 })
                .with_rule(ValidationRule::MaxLength { value: 4 }),
            1000,
        )
        .unwrap();

        assert!(def.validate_value("ab").is_ok());
        assert!(def.validate_value("abcd").is_ok());
        assert!(matches!(
            def.validate_value("a"),
            Err(Error::RuleViolation { .. })
        ));
        assert!(matches!(
            def.validate_value("abcde"),
            Err(Error::RuleViolation { .. })
        ));
    }

    #[test]
    fn unique_name_case_insensitive() {
        let defs = vec![floor_def()];
        assert!(ensure_unique_name(&defs, "u-1", "area", None).is_ok());

        let result = ensure_unique_name(&defs, "u-1", "FLOOR", None);
        assert!(matches!(result, Err(Error::DuplicateName { name, .. }) if name == "FLOOR"));
    }

    #[test]
    fn unique_name_excludes_self() {
        let defs = vec![floor_def()];
        assert!(ensure_unique_name(&defs, "u-1", "Floor", Some("f-1")).is_ok());
    }

    #[test]
    fn unique_name_other_owner_type() {
        let defs = vec![floor_def()];
        // Same name under a different owner type is fine.
        assert!(ensure_unique_name(&defs, "u-2", "floor", None).is_ok());
    }

    #[test]
    fn deleted_definition_frees_name() {
        let mut def = floor_def();
        def.mark_deleted(2000);
        assert!(!def.is_live());

        let defs = vec![def];
        assert!(ensure_unique_name(&defs, "u-1", "floor", None).is_ok());
    }

    #[test]
    fn apply_spec_overwrites() {
        let mut def = floor_def();
        let spec = DefinitionSpec::new("floor_number", "Floor number", FieldType::Number);
        def.apply_spec(spec, 2000).unwrap();

        assert_eq!(def.name, "floor_number");
        assert!(!def.is_required);
        assert_eq!(def.updated_at, 2000);
        assert_eq!(def.created_at, 1000);
    }

    #[test]
    fn field_type_families() {
        assert!(FieldType::Currency.is_numeric());
        assert!(FieldType::Range.is_numeric());
        assert!(!FieldType::Text.is_numeric());

        assert!(FieldType::Select.is_choice());
        assert!(FieldType::MultiSelect.is_choice());
        assert!(!FieldType::Number.is_choice());
    }

    #[test]
    fn serialization_roundtrip() {
        let def = floor_def();
        let json = serde_json::to_string(&def).unwrap();
        let parsed: FieldDefinition = serde_json::from_str(&json).unwrap();
        assert_eq!(def, parsed);
        assert!(json.contains("\"fieldType\":\"number\""));
    }
}
