//! Unified error handling for the service layer.

use fieldkit_engine::ErrorKind;

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Domain(#[from] fieldkit_engine::Error),

    #[error("index client error: {0}")]
    Index(String),

    #[error("availability provider error: {0}")]
    Availability(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// The coarse category for domain failures; infrastructure failures
    /// have no domain kind.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ServiceError::Domain(e) => Some(e.kind()),
            _ => None,
        }
    }
}

/// Result type alias for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use fieldkit_engine::Error;

    #[test]
    fn domain_errors_keep_their_kind() {
        let err = ServiceError::from(Error::GroupNotFound("g-1".into()));
        assert_eq!(err.kind(), Some(ErrorKind::NotFound));
        assert_eq!(err.to_string(), "field group not found: g-1");
    }

    #[test]
    fn infrastructure_errors_have_no_kind() {
        let err = ServiceError::Internal("boom".into());
        assert_eq!(err.kind(), None);
    }
}
