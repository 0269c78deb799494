use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};

use super::{EngineState, extract_json};
use crate::engine::ReceivingEngine;
use crate::error::ReceivingError;
use crate::model::{DefineLotsRequest, DefinePacksRequest, PackRecord, Progress, ReceiptLine};

pub fn router(engine: Arc<ReceivingEngine>) -> Router {
    Router::new()
        .route("/lines/{id}", get(get_line).delete(delete_line))
        .route("/lines/{id}/@define-packs", post(define_packs))
        .route("/lines/{id}/@define-lots", post(define_lots))
        .route("/lines/{id}/packs", get(list_packs))
        .route("/lines/{id}/progress", get(line_progress))
        .with_state(engine)
}

async fn get_line(
    State(engine): State<EngineState>,
    Path(id): Path<i64>,
) -> Result<Json<ReceiptLine>, ReceivingError> {
    Ok(Json(engine.get_line(id)?))
}

async fn delete_line(
    State(engine): State<EngineState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ReceivingError> {
    engine.delete_line(id)?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

// ---------------------------------------------------------------------------
// POST /lines/{id}/@define-packs
// ---------------------------------------------------------------------------

async fn define_packs(
    State(engine): State<EngineState>,
    Path(id): Path<i64>,
    body: Result<Json<DefinePacksRequest>, JsonRejection>,
) -> Result<Json<Vec<PackRecord>>, ReceivingError> {
    let req = extract_json(body)?;
    let packs = engine.define_packs(id, req.total_quantity, req.pack_count)?;
    Ok(Json(packs))
}

// ---------------------------------------------------------------------------
// POST /lines/{id}/@define-lots
// ---------------------------------------------------------------------------

async fn define_lots(
    State(engine): State<EngineState>,
    Path(id): Path<i64>,
    body: Result<Json<DefineLotsRequest>, JsonRejection>,
) -> Result<Json<Vec<PackRecord>>, ReceivingError> {
    let req = extract_json(body)?;
    let packs = engine.define_lot_packs(id, &req.groups)?;
    Ok(Json(packs))
}

async fn list_packs(
    State(engine): State<EngineState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<PackRecord>>, ReceivingError> {
    Ok(Json(engine.list_packs(id)?))
}

async fn line_progress(
    State(engine): State<EngineState>,
    Path(id): Path<i64>,
) -> Result<Json<Progress>, ReceivingError> {
    Ok(Json(engine.line_progress(id)?))
}
