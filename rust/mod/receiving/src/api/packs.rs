use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use super::{EngineState, extract_json};
use crate::engine::ReceivingEngine;
use crate::error::ReceivingError;
use crate::label::LabelPayload;
use crate::model::{PackRecord, ScanRequest, ScanResponse};

pub fn router(engine: Arc<ReceivingEngine>) -> Router {
    Router::new()
        .route("/packs/{identifier}", get(get_pack))
        .route("/packs/{identifier}/label", get(get_label))
        .route("/scan", post(scan))
        .with_state(engine)
}

/// Label content for printing: the structured payload and the exact text
/// to encode.
#[derive(Debug, Serialize)]
struct LabelResponse {
    label: LabelPayload,
    text: String,
}

async fn get_pack(
    State(engine): State<EngineState>,
    Path(identifier): Path<String>,
) -> Result<Json<PackRecord>, ReceivingError> {
    Ok(Json(engine.get_pack(&identifier)?))
}

async fn get_label(
    State(engine): State<EngineState>,
    Path(identifier): Path<String>,
) -> Result<Json<LabelResponse>, ReceivingError> {
    let label = engine.label_for_pack(&identifier)?;
    let text = label.encode()?;
    Ok(Json(LabelResponse { label, text }))
}

// ---------------------------------------------------------------------------
// POST /scan
// ---------------------------------------------------------------------------

/// Unknown packs and quantity mismatches are answered with 200 and a
/// status in the body; scanning clients only see an error status for
/// malformed requests and storage failures.
async fn scan(
    State(engine): State<EngineState>,
    body: Result<Json<ScanRequest>, JsonRejection>,
) -> Result<Json<ScanResponse>, ReceivingError> {
    let req = extract_json(body)?;
    let response = match req {
        ScanRequest::Raw {
            payload,
            scanned_by,
        } => engine.scan_label(&payload, scanned_by)?,
        ScanRequest::Decoded(event) => engine.scan(&event)?,
    };
    Ok(Json(response))
}
