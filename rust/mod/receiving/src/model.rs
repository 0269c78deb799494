use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::identity::PackKey;

// ---------------------------------------------------------------------------
// Status enums
// ---------------------------------------------------------------------------

/// Physical verification state of a pack.
///
/// ```text
/// PENDING → VERIFIED
/// ```
///
/// Only a matching scan moves a pack forward; nothing moves it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    Pending,
    Verified,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Verified => "VERIFIED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "VERIFIED" => Some(Self::Verified),
            _ => None,
        }
    }
}

impl std::fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Approval state of a receiving header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HeaderStatus {
    Draft,
    Approved,
}

impl HeaderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Approved => "APPROVED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "DRAFT" => Some(Self::Draft),
            "APPROVED" => Some(Self::Approved),
            _ => None,
        }
    }
}

impl std::fmt::Display for HeaderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A receiving document: the unit of approval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderGroup {
    pub id: i64,
    /// Parent document reference (e.g. the purchase receipt number).
    pub document_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier: Option<String>,
    pub status: HeaderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<String>,
    pub created_at: String,
}

/// One item entry of a header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptLine {
    pub id: i64,
    pub header_id: i64,
    pub item_code: String,
    pub total_quantity: Decimal,
    /// Number of packs currently defined (0 until packs are defined).
    pub pack_count: u32,
    pub created_at: String,
}

/// One physical pack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackRecord {
    pub pack_identifier: String,
    pub header_id: i64,
    pub line_id: i64,
    pub sub_index: u32,
    pub pack_sequence: u32,
    pub pack_quantity: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lot_no: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<NaiveDate>,
    pub verification_status: VerificationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_by: Option<String>,
    pub created_at: String,
}

impl PackRecord {
    pub fn key(&self) -> PackKey {
        PackKey {
            header_id: self.header_id,
            line_id: self.line_id,
            sub_index: self.sub_index,
            pack_sequence: self.pack_sequence,
        }
    }

    pub fn is_verified(&self) -> bool {
        self.verification_status == VerificationStatus::Verified
    }
}

/// One pack group of a line, as requested by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotGroup {
    #[serde(default)]
    pub lot_no: Option<String>,
    pub total_quantity: Decimal,
    pub pack_count: i64,
    #[serde(default)]
    pub expiry_date: Option<NaiveDate>,
}

/// A decoded scan, as submitted by a scanning client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanEvent {
    pub pack_identifier: String,
    pub claimed_quantity: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scanned_by: Option<String>,
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

/// Verified vs. total packs within a scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub verified: u64,
    pub total: u64,
}

impl Progress {
    pub fn pending(&self) -> u64 {
        self.total - self.verified
    }
}

/// Answer of the approval gate for one header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Readiness {
    pub ready: bool,
    pub pending_count: u64,
    pub verified: u64,
    pub total: u64,
    /// Lines that have no packs defined yet; these also block approval.
    pub lines_without_packs: u64,
}

// ---------------------------------------------------------------------------
// Scan results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Success,
    AlreadyVerified,
    Mismatch,
    NotFound,
}

/// Successful outcome of a scan (fresh verification or a repeat).
#[derive(Debug, Clone, PartialEq)]
pub struct ScanOutcome {
    pub status: ScanStatus,
    pub pack: PackRecord,
    pub header_progress: Progress,
}

/// What a scanning client receives for every scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResponse {
    pub status: ScanStatus,
    pub pack_identifier: String,
    pub header_progress: Progress,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_quantity: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_quantity: Option<i64>,
}

// ---------------------------------------------------------------------------
// API request types
// ---------------------------------------------------------------------------

/// Body for `POST /headers`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateHeaderRequest {
    pub document_ref: String,
    #[serde(default)]
    pub supplier: Option<String>,
}

/// Body for `POST /headers/{id}/lines`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddLineRequest {
    pub item_code: String,
    pub total_quantity: Decimal,
}

/// Body for `POST /lines/{id}/@define-packs`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinePacksRequest {
    pub total_quantity: Decimal,
    pub pack_count: i64,
}

/// Body for `POST /lines/{id}/@define-lots`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefineLotsRequest {
    pub groups: Vec<LotGroup>,
}

/// Body for `POST /headers/{id}/@approve`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveRequest {
    #[serde(default)]
    pub approved_by: Option<String>,
}

/// Body for `POST /scan`: either the raw label text or an already
/// decoded scan.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ScanRequest {
    #[serde(rename_all = "camelCase")]
    Raw {
        payload: String,
        #[serde(default)]
        scanned_by: Option<String>,
    },
    Decoded(ScanEvent),
}
