use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};

use openerp_core::{ListParams, ListResult};

use super::{EngineState, extract_json};
use crate::engine::ReceivingEngine;
use crate::error::ReceivingError;
use crate::model::{
    AddLineRequest, ApproveRequest, CreateHeaderRequest, HeaderGroup, Progress, Readiness,
    ReceiptLine,
};

pub fn router(engine: Arc<ReceivingEngine>) -> Router {
    Router::new()
        .route("/headers", post(create_header).get(list_headers))
        .route("/headers/{id}", get(get_header).delete(delete_header))
        .route("/headers/{id}/lines", post(add_line).get(list_lines))
        .route("/headers/{id}/progress", get(header_progress))
        .route("/headers/{id}/readiness", get(readiness))
        .route("/headers/{id}/@approve", post(approve_header))
        .with_state(engine)
}

// ---------------------------------------------------------------------------
// POST /headers
// ---------------------------------------------------------------------------

async fn create_header(
    State(engine): State<EngineState>,
    body: Result<Json<CreateHeaderRequest>, JsonRejection>,
) -> Result<Json<HeaderGroup>, ReceivingError> {
    let req = extract_json(body)?;
    let header = engine.create_header(&req.document_ref, req.supplier.as_deref())?;
    Ok(Json(header))
}

// ---------------------------------------------------------------------------
// GET /headers
// ---------------------------------------------------------------------------

async fn list_headers(
    State(engine): State<EngineState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResult<HeaderGroup>>, ReceivingError> {
    Ok(Json(engine.list_headers(&params)?))
}

// ---------------------------------------------------------------------------
// GET /headers/{id}
// ---------------------------------------------------------------------------

async fn get_header(
    State(engine): State<EngineState>,
    Path(id): Path<i64>,
) -> Result<Json<HeaderGroup>, ReceivingError> {
    Ok(Json(engine.get_header(id)?))
}

// ---------------------------------------------------------------------------
// DELETE /headers/{id}
// ---------------------------------------------------------------------------

async fn delete_header(
    State(engine): State<EngineState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ReceivingError> {
    engine.delete_header(id)?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

// ---------------------------------------------------------------------------
// /headers/{id}/lines
// ---------------------------------------------------------------------------

async fn add_line(
    State(engine): State<EngineState>,
    Path(id): Path<i64>,
    body: Result<Json<AddLineRequest>, JsonRejection>,
) -> Result<Json<ReceiptLine>, ReceivingError> {
    let req = extract_json(body)?;
    let line = engine.add_line(id, &req.item_code, req.total_quantity)?;
    Ok(Json(line))
}

async fn list_lines(
    State(engine): State<EngineState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<ReceiptLine>>, ReceivingError> {
    Ok(Json(engine.list_lines(id)?))
}

// ---------------------------------------------------------------------------
// Gate
// ---------------------------------------------------------------------------

async fn header_progress(
    State(engine): State<EngineState>,
    Path(id): Path<i64>,
) -> Result<Json<Progress>, ReceivingError> {
    engine.get_header(id)?;
    Ok(Json(engine.header_progress(id)?))
}

async fn readiness(
    State(engine): State<EngineState>,
    Path(id): Path<i64>,
) -> Result<Json<Readiness>, ReceivingError> {
    Ok(Json(engine.check_header_ready_for_approval(id)?))
}

/// The body is optional; an empty body approves anonymously.
async fn approve_header(
    State(engine): State<EngineState>,
    Path(id): Path<i64>,
    body: Bytes,
) -> Result<Json<HeaderGroup>, ReceivingError> {
    let req: ApproveRequest = if body.is_empty() {
        ApproveRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ReceivingError::InvalidInput(format!("invalid approve request: {e}")))?
    };
    let header = engine.approve_header(id, req.approved_by.as_deref())?;
    Ok(Json(header))
}
