//! Actor context threaded through every mutating call.
//!
//! There is no ambient "current user": callers pass an explicit
//! [`ActorContext`], and admin-gated operations check it up front.

use fieldkit_engine::{Error, Result};
use uuid::Uuid;

/// Caller role for authorization checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Member,
}

/// The identity and role of the caller.
#[derive(Debug, Clone)]
pub struct ActorContext {
    pub user_id: Uuid,
    pub role: Role,
}

impl ActorContext {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn admin(user_id: Uuid) -> Self {
        Self::new(user_id, Role::Admin)
    }

    pub fn member(user_id: Uuid) -> Self {
        Self::new(user_id, Role::Member)
    }

    /// Fail with `Forbidden` unless the caller is an administrator.
    /// `action` names the attempted operation in the error message.
    pub fn require_admin(&self, action: &str) -> Result<()> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(Error::AdminRequired(action.to_string()))
        }
    }
}

/// Validate a GUID-shaped identifier before any lookup, returning the
/// canonical lowercase-hyphenated form. `label` names the parameter in the
/// error message.
pub fn parse_guid(label: &str, raw: &str) -> Result<String> {
    Uuid::parse_str(raw)
        .map(|id| id.to_string())
        .map_err(|_| Error::InvalidId {
            label: label.to_string(),
            raw: raw.to_string(),
        })
}
