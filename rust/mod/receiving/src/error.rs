use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use openerp_core::ServiceError;
use openerp_core::error::error_code;
use openerp_sql::SQLError;
use thiserror::Error;

/// Receiving-specific error codes, on top of the shared
/// [`openerp_core::error::error_code`] set.
pub mod code {
    pub const UNKNOWN_PACK: &str = "UNKNOWN_PACK";
    pub const QUANTITY_MISMATCH: &str = "QUANTITY_MISMATCH";
    pub const APPROVAL_BLOCKED: &str = "APPROVAL_BLOCKED";
    pub const REDEFINITION_LOCKED: &str = "REDEFINITION_LOCKED";
    pub const HEADER_APPROVED: &str = "HEADER_APPROVED";
}

/// Failures of the receiving module.
///
/// Everything except [`ReceivingError::Storage`] is a recoverable condition
/// that the request boundary turns into a structured response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReceivingError {
    /// Non-positive pack count, negative quantity, malformed payload.
    #[error("{0}")]
    InvalidInput(String),

    /// Header or line lookup miss.
    #[error("{0}")]
    NotFound(String),

    /// A scanned identifier matches no pack.
    #[error("unknown pack '{0}', verify label")]
    UnknownPack(String),

    #[error("pack '{pack_identifier}' holds {expected}, scan claimed {claimed}")]
    QuantityMismatch {
        pack_identifier: String,
        expected: i64,
        claimed: i64,
    },

    #[error(
        "header {header_id} cannot be approved: {pending_count} pack(s) pending, \
         {lines_without_packs} line(s) without packs"
    )]
    ApprovalBlocked {
        header_id: i64,
        pending_count: u64,
        lines_without_packs: u64,
    },

    #[error("line {line_id} already has {verified} verified pack(s); packs cannot be redefined")]
    RedefinitionLocked { line_id: i64, verified: u64 },

    #[error("header {0} is approved and can no longer change")]
    HeaderApproved(i64),

    /// Persistence failure. The only fatal variant.
    #[error("{0}")]
    Storage(String),
}

impl ReceivingError {
    /// Stable, machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => error_code::VALIDATION_FAILED,
            Self::NotFound(_) => error_code::NOT_FOUND,
            Self::UnknownPack(_) => code::UNKNOWN_PACK,
            Self::QuantityMismatch { .. } => code::QUANTITY_MISMATCH,
            Self::ApprovalBlocked { .. } => code::APPROVAL_BLOCKED,
            Self::RedefinitionLocked { .. } => code::REDEFINITION_LOCKED,
            Self::HeaderApproved(_) => code::HEADER_APPROVED,
            Self::Storage(_) => error_code::STORAGE_ERROR,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) | Self::UnknownPack(_) => StatusCode::NOT_FOUND,
            Self::QuantityMismatch { .. }
            | Self::ApprovalBlocked { .. }
            | Self::RedefinitionLocked { .. }
            | Self::HeaderApproved(_) => StatusCode::CONFLICT,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Variant-specific fields added next to `code` and `message`.
    fn details(&self) -> serde_json::Value {
        match self {
            Self::QuantityMismatch {
                pack_identifier,
                expected,
                claimed,
            } => serde_json::json!({
                "packIdentifier": pack_identifier,
                "expectedQuantity": expected,
                "claimedQuantity": claimed,
            }),
            Self::ApprovalBlocked {
                header_id,
                pending_count,
                lines_without_packs,
            } => serde_json::json!({
                "headerId": header_id,
                "pendingCount": pending_count,
                "linesWithoutPacks": lines_without_packs,
            }),
            Self::RedefinitionLocked { line_id, verified } => serde_json::json!({
                "lineId": line_id,
                "verifiedCount": verified,
            }),
            Self::UnknownPack(id) => serde_json::json!({ "packIdentifier": id }),
            Self::HeaderApproved(header_id) => serde_json::json!({ "headerId": header_id }),
            _ => serde_json::Value::Null,
        }
    }
}

impl From<SQLError> for ReceivingError {
    fn from(e: SQLError) -> Self {
        ReceivingError::Storage(e.to_string())
    }
}

impl From<ReceivingError> for ServiceError {
    fn from(e: ReceivingError) -> Self {
        let msg = e.to_string();
        match e {
            ReceivingError::InvalidInput(_) => ServiceError::Validation(msg),
            ReceivingError::NotFound(_) | ReceivingError::UnknownPack(_) => {
                ServiceError::NotFound(msg)
            }
            ReceivingError::QuantityMismatch { .. }
            | ReceivingError::ApprovalBlocked { .. }
            | ReceivingError::RedefinitionLocked { .. }
            | ReceivingError::HeaderApproved(_) => ServiceError::FailedPrecondition(msg),
            ReceivingError::Storage(_) => ServiceError::Storage(msg),
        }
    }
}

impl IntoResponse for ReceivingError {
    fn into_response(self) -> Response {
        if let ReceivingError::Storage(msg) = &self {
            tracing::error!("receiving storage failure: {msg}");
        }
        let mut body = serde_json::json!({
            "code": self.error_code(),
            "message": self.to_string(),
        });
        if let (Some(obj), serde_json::Value::Object(extra)) = (body.as_object_mut(), self.details())
        {
            obj.extend(extra);
        }
        (self.status_code(), axum::Json(body)).into_response()
    }
}
