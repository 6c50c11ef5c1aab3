use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Error categories surfaced across the engine boundary.
///
/// `Validation` and `NotFound` are final: the caller gets a specific message
/// and must not blindly retry. `Conflict` means a uniqueness race was lost
/// (typically a concurrent session start); the caller should re-read the
/// active session and retry the whole operation. `Store` is a transient
/// persistence failure; retrying after a state refresh is safe because every
/// multi-step operation leaves a re-tryable state behind.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage failure: {0}")]
    Store(anyhow::Error),
}

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        EngineError::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        EngineError::Conflict(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        EngineError::NotFound(msg.into())
    }

    /// Whether the caller may retry after refreshing state.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Conflict(_) | EngineError::Store(_))
    }

    /// Message suitable for direct display. Validation and not-found errors
    /// carry their specific cause; conflict and storage failures collapse to
    /// a generic retry prompt so callers refresh before trying again.
    pub fn user_message(&self) -> String {
        match self {
            EngineError::Validation(msg) => msg.clone(),
            EngineError::NotFound(msg) => msg.clone(),
            EngineError::Conflict(_) | EngineError::Store(_) => {
                "the request could not be completed; please refresh and retry".to_string()
            }
        }
    }
}

impl From<rusqlite::Error> for EngineError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, _)
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                EngineError::Conflict(err.to_string())
            }
            _ => EngineError::Store(anyhow::Error::new(err)),
        }
    }
}

impl From<anyhow::Error> for EngineError {
    fn from(err: anyhow::Error) -> Self {
        EngineError::Store(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_split_matches_error_policy() {
        assert!(!EngineError::validation("empty slot set").is_retryable());
        assert!(!EngineError::not_found("record x").is_retryable());
        assert!(EngineError::conflict("active session exists").is_retryable());
        assert!(EngineError::Store(anyhow::anyhow!("db down")).is_retryable());
    }

    #[test]
    fn user_message_hides_conflict_details() {
        let err = EngineError::conflict("UNIQUE constraint failed: sessions");
        assert!(err.user_message().contains("retry"));
        assert!(!err.user_message().contains("UNIQUE"));

        let err = EngineError::validation("slot 3 has malformed time '25:00'");
        assert!(err.user_message().contains("25:00"));
    }

    #[test]
    fn constraint_violation_maps_to_conflict() {
        let sqlite_err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT),
            Some("UNIQUE constraint failed".to_string()),
        );
        assert!(matches!(
            EngineError::from(sqlite_err),
            EngineError::Conflict(_)
        ));

        let other = rusqlite::Error::QueryReturnedNoRows;
        assert!(matches!(EngineError::from(other), EngineError::Store(_)));
    }
}
