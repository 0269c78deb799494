mod headers;
mod lines;
mod packs;

use std::sync::Arc;
use axum::Router;
use axum::extract::rejection::JsonRejection;
use axum::Json;

use crate::engine::ReceivingEngine;
use crate::error::ReceivingError;

type EngineState = Arc<ReceivingEngine>;

/// Unwrap a JSON body, turning axum's plain-text rejection into a
/// structured `VALIDATION_FAILED` error.
fn extract_json<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ReceivingError> {
    body.map(|Json(v)| v)
        .map_err(|e| ReceivingError::InvalidInput(format!("invalid request body: {}", e.body_text())))
}

/// Build the complete receiving module router.
///
/// Routes:
/// - `POST   /headers`  create header
/// - `GET    /headers`  list headers
/// - `GET    /headers/{id}`  get header
/// - `DELETE /headers/{id}`  delete header (cascades)
/// - `POST   /headers/{id}/lines`  add line
/// - `GET    /headers/{id}/lines`  list lines
/// - `GET    /headers/{id}/progress`  verified vs. total packs
/// - `GET    /headers/{id}/readiness`  approval gate
/// - `POST   /headers/{id}/@approve`  approve header
/// - `GET    /lines/{id}`  get line
/// - `DELETE /lines/{id}`  delete line (cascades)
/// - `POST   /lines/{id}/@define-packs`  split line into packs
/// - `POST   /lines/{id}/@define-lots`  split line into lot groups
/// - `GET    /lines/{id}/packs`  list packs
/// - `GET    /lines/{id}/progress`  verified vs. total packs
/// - `GET    /packs/{identifier}`  get pack
/// - `GET    /packs/{identifier}/label`  label payload
/// - `POST   /scan`  verify a scan
pub fn router(engine: Arc<ReceivingEngine>) -> Router {
    Router::new()
        .merge(headers::router(Arc::clone(&engine)))
        .merge(lines::router(Arc::clone(&engine)))
        .merge(packs::router(engine))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::Router;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use openerp_sql::SqliteStore;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::{ReceivingConfig, ReceivingModule};
    use openerp_core::Module;

    fn router() -> Router {
        let db = Arc::new(SqliteStore::open_in_memory().unwrap());
        ReceivingModule::with_config(db, &ReceivingConfig::default())
            .unwrap()
            .routes()
    }

    async fn api_call(
        router: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if body.is_some() {
            builder = builder.header("content-type", "application/json");
        }
        let body = match body {
            Some(v) => Body::from(serde_json::to_string(&v).unwrap()),
            None => Body::empty(),
        };
        let req = builder.body(body).unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
        let json = if bytes.is_empty() {
            json!(null)
        } else {
            serde_json::from_slice(&bytes).unwrap_or(json!(null))
        };
        (status, json)
    }

    /// Header with one line of 11 units in 3 packs. Returns (header id, line id, packs).
    async fn seed(router: &Router) -> (i64, i64, Vec<Value>) {
        let (status, header) = api_call(
            router,
            "POST",
            "/headers",
            Some(json!({"documentRef": "PR-2026-0007", "supplier": "ACME"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let header_id = header["id"].as_i64().unwrap();

        let (status, line) = api_call(
            router,
            "POST",
            &format!("/headers/{header_id}/lines"),
            Some(json!({"itemCode": "SKU-1", "totalQuantity": "11"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let line_id = line["id"].as_i64().unwrap();

        let (status, packs) = api_call(
            router,
            "POST",
            &format!("/lines/{line_id}/@define-packs"),
            Some(json!({"totalQuantity": "11", "packCount": 3})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        (header_id, line_id, packs.as_array().unwrap().clone())
    }

    #[tokio::test]
    async fn receiving_flow_end_to_end() {
        let r = router();
        let (header_id, line_id, packs) = seed(&r).await;

        let quantities: Vec<_> = packs.iter().map(|p| p["packQuantity"].as_i64().unwrap()).collect();
        assert_eq!(quantities, vec![4, 4, 3]);
        assert_eq!(packs[0]["verificationStatus"], "PENDING");

        let (status, body) = api_call(&r, "POST", &format!("/headers/{header_id}/@approve"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "APPROVAL_BLOCKED");
        assert_eq!(body["pendingCount"], 3);

        for p in &packs {
            let id = p["packIdentifier"].as_str().unwrap();
            let (status, label) = api_call(&r, "GET", &format!("/packs/{id}/label"), None).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(label["label"]["id"], id);

            let text = label["text"].as_str().unwrap();
            let (status, resp) = api_call(
                &r,
                "POST",
                "/scan",
                Some(json!({"payload": text, "scannedBy": "dock-2"})),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(resp["status"], "success");
        }

        let (_, progress) = api_call(&r, "GET", &format!("/lines/{line_id}/progress"), None).await;
        assert_eq!(progress, json!({"verified": 3, "total": 3}));

        let (_, readiness) = api_call(&r, "GET", &format!("/headers/{header_id}/readiness"), None).await;
        assert_eq!(readiness["ready"], true);

        let (status, header) = api_call(
            &r,
            "POST",
            &format!("/headers/{header_id}/@approve"),
            Some(json!({"approvedBy": "lead"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(header["status"], "APPROVED");
        assert_eq!(header["approvedBy"], "lead");
    }

    #[tokio::test]
    async fn scan_statuses_are_structured() {
        let r = router();
        let (header_id, _, packs) = seed(&r).await;
        let id = packs[0]["packIdentifier"].as_str().unwrap();

        let (status, resp) = api_call(
            &r,
            "POST",
            "/scan",
            Some(json!({"packIdentifier": id, "claimedQuantity": "7"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resp["status"], "mismatch");
        assert_eq!(resp["expectedQuantity"], 4);
        assert_eq!(resp["claimedQuantity"], 7);

        let scan = json!({"packIdentifier": id, "claimedQuantity": "4"});
        let (_, first) = api_call(&r, "POST", "/scan", Some(scan.clone())).await;
        assert_eq!(first["status"], "success");
        let (_, second) = api_call(&r, "POST", "/scan", Some(scan)).await;
        assert_eq!(second["status"], "already_verified");
        assert_eq!(second["headerProgress"], json!({"verified": 1, "total": 3}));

        let missing = format!("PKG-{header_id}-999-1-1");
        let (status, resp) = api_call(
            &r,
            "POST",
            "/scan",
            Some(json!({"packIdentifier": missing, "claimedQuantity": "1"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resp["status"], "not_found");
        assert_eq!(resp["headerProgress"]["total"], 3);

        let (status, resp) = api_call(&r, "POST", "/scan", Some(json!({"payload": "???"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp["code"], "VALIDATION_FAILED");
    }

    #[tokio::test]
    async fn redefinition_locked_after_scan() {
        let r = router();
        let (_, line_id, packs) = seed(&r).await;
        let id = packs[2]["packIdentifier"].as_str().unwrap();
        api_call(
            &r,
            "POST",
            "/scan",
            Some(json!({"packIdentifier": id, "claimedQuantity": "3"})),
        )
        .await;

        let (status, body) = api_call(
            &r,
            "POST",
            &format!("/lines/{line_id}/@define-packs"),
            Some(json!({"totalQuantity": "11", "packCount": 2})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "REDEFINITION_LOCKED");
        assert_eq!(body["verifiedCount"], 1);
    }

    #[tokio::test]
    async fn lot_groups_and_listing() {
        let r = router();
        let (header_id, _, _) = seed(&r).await;
        let (_, line) = api_call(
            &r,
            "POST",
            &format!("/headers/{header_id}/lines"),
            Some(json!({"itemCode": "SKU-MILK", "totalQuantity": "0"})),
        )
        .await;
        let line_id = line["id"].as_i64().unwrap();

        let (status, packs) = api_call(
            &r,
            "POST",
            &format!("/lines/{line_id}/@define-lots"),
            Some(json!({"groups": [
                {"lotNo": "A1", "totalQuantity": "6", "packCount": 2, "expiryDate": "2026-12-31"},
                {"lotNo": "B2", "totalQuantity": "1", "packCount": 1}
            ]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(packs.as_array().unwrap().len(), 3);
        assert_eq!(packs[0]["lotNo"], "A1");
        assert_eq!(packs[0]["expiryDate"], "2026-12-31");
        assert_eq!(packs[2]["subIndex"], 2);

        let (_, lines) = api_call(&r, "GET", &format!("/headers/{header_id}/lines"), None).await;
        assert_eq!(lines.as_array().unwrap().len(), 2);
        assert_eq!(lines[1]["totalQuantity"], "7");

        let (_, listed) = api_call(&r, "GET", &format!("/lines/{line_id}/packs"), None).await;
        assert_eq!(listed, packs);

        let (_, headers) = api_call(&r, "GET", "/headers?limit=10", None).await;
        assert_eq!(headers["total"], 1);
    }

    #[tokio::test]
    async fn lookups_and_deletes() {
        let r = router();
        let (header_id, line_id, packs) = seed(&r).await;
        let id = packs[0]["packIdentifier"].as_str().unwrap();

        let (status, pack) = api_call(&r, "GET", &format!("/packs/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(pack["lineId"], line_id);

        let (status, body) = api_call(&r, "GET", "/packs/PKG-1-1-1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "UNKNOWN_PACK");

        let (status, _) = api_call(&r, "GET", "/headers/4242", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = api_call(&r, "DELETE", &format!("/headers/{header_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["deleted"], true);
        let (status, _) = api_call(&r, "GET", &format!("/lines/{line_id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = api_call(&r, "GET", &format!("/packs/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_bodies_get_structured_errors() {
        let r = router();
        let (header_id, line_id, packs) = seed(&r).await;
        let id = packs[0]["packIdentifier"].as_str().unwrap();

        let (status, body) = api_call(
            &r,
            "POST",
            "/scan",
            Some(json!({"packIdentifier": id, "claimedQuantity": "abc"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_FAILED");
        assert!(body["message"].as_str().unwrap().starts_with("invalid request body"));

        let (status, body) = api_call(
            &r,
            "POST",
            &format!("/lines/{line_id}/@define-packs"),
            Some(json!({"totalQuantity": "11"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_FAILED");

        // No content-type header at all.
        let (status, body) = api_call(&r, "POST", &format!("/headers/{header_id}/lines"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_FAILED");

        let (_, pack) = api_call(&r, "GET", &format!("/packs/{id}"), None).await;
        assert_eq!(pack["verificationStatus"], "PENDING");
    }

    #[tokio::test]
    async fn approved_header_rejects_line_changes() {
        let r = router();
        let (header_id, line_id, packs) = seed(&r).await;
        for p in &packs {
            let scan = json!({
                "packIdentifier": p["packIdentifier"],
                "claimedQuantity": p["packQuantity"].to_string(),
            });
            api_call(&r, "POST", "/scan", Some(scan)).await;
        }
        let (status, _) = api_call(&r, "POST", &format!("/headers/{header_id}/@approve"), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = api_call(&r, "DELETE", &format!("/lines/{line_id}"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "HEADER_APPROVED");
        assert_eq!(body["headerId"], header_id);
    }

    #[tokio::test]
    async fn invalid_pack_count_is_rejected() {
        let r = router();
        let (_, line_id, _) = seed(&r).await;
        let (status, body) = api_call(
            &r,
            "POST",
            &format!("/lines/{line_id}/@define-packs"),
            Some(json!({"totalQuantity": "11", "packCount": 0})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_FAILED");
    }
}
