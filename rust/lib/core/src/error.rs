use thiserror::Error;

// ── Error codes ─────────────────────────────────────────────────────
//
// Stable, machine-readable identifiers. Clients match on these,
// never on the human-readable message string.

/// Stable error code constants.
///
/// Clients should match on `code` from `{"code": "NOT_FOUND", "message": "..."}`.
/// Codes never change; messages may be reworded. Modules may define
/// additional codes for their own error types (e.g. `QUANTITY_MISMATCH`).
pub mod error_code {
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";
    pub const FAILED_PRECONDITION: &str = "FAILED_PRECONDITION";
    pub const STORAGE_ERROR: &str = "STORAGE_ERROR";
}

// ── ServiceError ────────────────────────────────────────────────────

/// Unified service error type shared by all modules.
///
/// Module constructors return it, so the server binary can report any
/// module's failure through one type. Each variant maps to a stable
/// error code (see [`error_code`]).
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Resource does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Input data or configuration is invalid.
    #[error("{0}")]
    Validation(String),

    /// The resource is not in a state that allows the operation.
    #[error("{0}")]
    FailedPrecondition(String),

    /// Storage backend failure.
    #[error("{0}")]
    Storage(String),
}

impl ServiceError {
    /// Stable, machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            ServiceError::NotFound(_) => error_code::NOT_FOUND,
            ServiceError::Validation(_) => error_code::VALIDATION_FAILED,
            ServiceError::FailedPrecondition(_) => error_code::FAILED_PRECONDITION,
            ServiceError::Storage(_) => error_code::STORAGE_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_mapping() {
        assert_eq!(ServiceError::NotFound("x".into()).error_code(), "NOT_FOUND");
        assert_eq!(ServiceError::Validation("x".into()).error_code(), "VALIDATION_FAILED");
        assert_eq!(
            ServiceError::FailedPrecondition("x".into()).error_code(),
            "FAILED_PRECONDITION"
        );
        assert_eq!(ServiceError::Storage("x".into()).error_code(), "STORAGE_ERROR");
    }

    #[test]
    fn error_display_is_just_message() {
        assert_eq!(ServiceError::NotFound("line 123".into()).to_string(), "line 123");
        assert_eq!(ServiceError::Validation("bad input".into()).to_string(), "bad input");
    }
}
