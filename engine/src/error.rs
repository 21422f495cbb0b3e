//! Error types for the Fieldkit engine.

use crate::{FieldId, GroupId, OwnerTypeId};
use thiserror::Error;

/// Coarse error category, stable across the crate's error variants.
///
/// Callers that map failures to a transport (HTTP, RPC) branch on the kind;
/// the variant itself carries the human-readable reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    Forbidden,
    Conflict,
    ValidationFailed,
}

/// All possible errors from the Fieldkit engine.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error("invalid identifier for {label}: '{raw}'")]
    InvalidId { label: String, raw: String },

    #[error("field definition not found: {0}")]
    DefinitionNotFound(FieldId),

    #[error("field group not found: {0}")]
    GroupNotFound(GroupId),

    #[error("instance not found: {0}")]
    InstanceNotFound(String),

    #[error("field {field_id} is not a member of group {group_id}")]
    MembershipNotFound {
        group_id: GroupId,
        field_id: FieldId,
    },

    #[error("admin role required to {0}")]
    AdminRequired(String),

    #[error("field name '{name}' already exists for owner type {owner_type_id}")]
    DuplicateName {
        name: String,
        owner_type_id: OwnerTypeId,
    },

    #[error(
        "field {field_id} belongs to owner type {field_owner}, \
         but group {group_id} belongs to {group_owner}"
    )]
    OwnerTypeMismatch {
        field_id: FieldId,
        field_owner: OwnerTypeId,
        group_id: GroupId,
        group_owner: OwnerTypeId,
    },

    #[error("choice field '{0}' requires at least one option")]
    MissingOptions(String),

    #[error("field name must not be empty")]
    EmptyName,

    #[error("'{0}' is required and no value was provided")]
    RequiredValueMissing(String),

    #[error("'{display_name}' must be a decimal number, got '{raw}'")]
    NotDecimal { display_name: String, raw: String },

    #[error("rule violation for '{display_name}': {message}")]
    RuleViolation {
        display_name: String,
        message: String,
    },

    #[error("cannot make '{display_name}' required: {count} stored value(s) are blank")]
    BlankValuesExist { display_name: String, count: usize },

    #[error(
        "cannot narrow options of '{display_name}': \
         {count} stored value(s) reference removed options"
    )]
    RemovedOptionsInUse { display_name: String, count: usize },
}

impl Error {
    /// Map the variant to its coarse category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidId { .. } => ErrorKind::InvalidArgument,
            Error::DefinitionNotFound(_)
            | Error::GroupNotFound(_)
            | Error::InstanceNotFound(_)
            | Error::MembershipNotFound { .. } => ErrorKind::NotFound,
            Error::AdminRequired(_) => ErrorKind::Forbidden,
            Error::DuplicateName { .. }
            | Error::OwnerTypeMismatch { .. }
            | Error::BlankValuesExist { .. }
            | Error::RemovedOptionsInUse { .. } => ErrorKind::Conflict,
            Error::MissingOptions(_)
            | Error::EmptyName
            | Error::RequiredValueMissing(_)
            | Error::NotDecimal { .. }
            | Error::RuleViolation { .. } => ErrorKind::ValidationFailed,
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = Error::DefinitionNotFound("f-1".into());
        assert_eq!(err.to_string(), "field definition not found: f-1");

        let err = Error::RequiredValueMissing("Floor".into());
        assert_eq!(err.to_string(), "'Floor' is required and no value was provided");

        let err = Error::NotDecimal {
            display_name: "Floor".into(),
            raw: "third".into(),
        };
        assert_eq!(
            err.to_string(),
            "'Floor' must be a decimal number, got 'third'"
        );

        let err = Error::BlankValuesExist {
            display_name: "Floor".into(),
            count: 3,
        };
        assert_eq!(
            err.to_string(),
            "cannot make 'Floor' required: 3 stored value(s) are blank"
        );
    }

    #[test]
    fn error_kinds() {
        assert_eq!(
            Error::InvalidId {
                label: "field id".into(),
                raw: "nope".into()
            }
            .kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            Error::GroupNotFound("g-1".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            Error::AdminRequired("create field definition".into()).kind(),
            ErrorKind::Forbidden
        );
        assert_eq!(
            Error::DuplicateName {
                name: "floor".into(),
                owner_type_id: "u-1".into()
            }
            .kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            Error::RequiredValueMissing("Floor".into()).kind(),
            ErrorKind::ValidationFailed
        );
    }
}
