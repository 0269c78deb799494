//! Label payloads.
//!
//! The payload is the text a label printer encodes into an optical code.
//! It is compact JSON with a fixed field order, so the same pack always
//! yields byte-identical text. Only `id` and `qty` take part in
//! verification; the rest is for people reading the label and for audit.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ReceivingError;
use crate::model::{HeaderGroup, PackRecord, ReceiptLine, ScanEvent};

/// Current payload format.
pub const PAYLOAD_VERSION: u32 = 1;

/// Context printed next to the pack's own data.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelContext {
    pub item_code: String,
    pub document_ref: String,
    /// Number of packs in the pack's group (the "of N" on the label).
    pub pack_total_count: u32,
    pub created_on: NaiveDate,
    pub expiry_date: Option<NaiveDate>,
    pub lot_no: Option<String>,
}

impl LabelContext {
    /// Assemble the context from stored records.
    pub fn for_pack(
        header: &HeaderGroup,
        line: &ReceiptLine,
        pack: &PackRecord,
        pack_total_count: u32,
    ) -> Self {
        let created_on = chrono::DateTime::parse_from_rfc3339(&pack.created_at)
            .map(|ts| ts.date_naive())
            .unwrap_or_else(|_| openerp_core::today());
        Self {
            item_code: line.item_code.clone(),
            document_ref: header.document_ref.clone(),
            pack_total_count,
            created_on,
            expiry_date: pack.expiry_date,
            lot_no: pack.lot_no.clone(),
        }
    }
}

/// Structured label content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelPayload {
    #[serde(rename = "v")]
    pub version: u32,
    #[serde(rename = "id")]
    pub pack_identifier: String,
    #[serde(rename = "qty")]
    pub pack_quantity: i64,
    #[serde(rename = "item")]
    pub item_code: String,
    #[serde(rename = "doc")]
    pub document_ref: String,
    #[serde(rename = "seq")]
    pub pack_sequence: u32,
    #[serde(rename = "of")]
    pub pack_total_count: u32,
    #[serde(rename = "lot", default, skip_serializing_if = "Option::is_none")]
    pub lot_no: Option<String>,
    #[serde(rename = "date")]
    pub created_on: NaiveDate,
    #[serde(rename = "exp", default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<NaiveDate>,
}

impl LabelPayload {
    /// Text handed to the optical encoder.
    pub fn encode(&self) -> Result<String, ReceivingError> {
        serde_json::to_string(self)
            .map_err(|e| ReceivingError::InvalidInput(format!("label payload: {e}")))
    }

    /// The scan a client submits after reading this label.
    pub fn scan_event(&self, scanned_by: Option<String>) -> ScanEvent {
        ScanEvent {
            pack_identifier: self.pack_identifier.clone(),
            claimed_quantity: Decimal::from(self.pack_quantity),
            scanned_by,
        }
    }
}

pub fn build_label_payload(pack: &PackRecord, context: &LabelContext) -> LabelPayload {
    LabelPayload {
        version: PAYLOAD_VERSION,
        pack_identifier: pack.pack_identifier.clone(),
        pack_quantity: pack.pack_quantity,
        item_code: context.item_code.clone(),
        document_ref: context.document_ref.clone(),
        pack_sequence: pack.pack_sequence,
        pack_total_count: context.pack_total_count,
        lot_no: context.lot_no.clone(),
        created_on: context.created_on,
        expiry_date: context.expiry_date,
    }
}

/// Parse scanned label text.
pub fn decode_label_payload(text: &str) -> Result<LabelPayload, ReceivingError> {
    let payload: LabelPayload = serde_json::from_str(text.trim())
        .map_err(|e| ReceivingError::InvalidInput(format!("unreadable label payload: {e}")))?;

    if payload.version != PAYLOAD_VERSION {
        return Err(ReceivingError::InvalidInput(format!(
            "unsupported label payload version {}",
            payload.version
        )));
    }
    if payload.pack_identifier.is_empty() {
        return Err(ReceivingError::InvalidInput(
            "label payload has no pack identifier".into(),
        ));
    }
    if payload.pack_quantity < 0 {
        return Err(ReceivingError::InvalidInput(format!(
            "label payload quantity {} is negative",
            payload.pack_quantity
        )));
    }
    Ok(payload)
}
