//! HTTP surface: `POST /api/analyze-pdf` and `GET /health`.
//!
//! Every response to the analyze endpoint uses one envelope:
//!
//! ```json
//! { "success": true,  "data": { "barcode": "…", "referenceNumber": null } }
//! { "success": false, "error": "Download of '…' returned HTTP 404" }
//! ```
//!
//! Failures map to a status by [`ErrorKind`]: validation 400, fetch and
//! extraction 502, rasterization 422, everything else 500.

use crate::analyze::Analyzer;
use crate::error::{AnalyzeError, ErrorKind};
use crate::output::ExtractedFields;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared state of the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub analyzer: Arc<Analyzer>,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct AnalyzeResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ExtractedFields>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalyzeResponse {
    fn ok(data: ExtractedFields) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
}

/// HTTP status for a failed analysis.
pub fn status_for(error: &AnalyzeError) -> StatusCode {
    match error.kind() {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Fetch | ErrorKind::Extraction => StatusCode::BAD_GATEWAY,
        ErrorKind::Rasterization => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Encoding | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/analyze-pdf", post(analyze_pdf))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the router on `addr` until `shutdown` resolves.
pub async fn serve(
    addr: SocketAddr,
    state: AppState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Server listening on {}", listener.local_addr()?);
    info!("Health check: GET /health");
    info!("API endpoint: POST /api/analyze-pdf");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

/// Handler for `POST /api/analyze-pdf`.
async fn analyze_pdf(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> (StatusCode, Json<AnalyzeResponse>) {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!("Rejected request body: {}", rejection.body_text());
            return (
                StatusCode::BAD_REQUEST,
                Json(AnalyzeResponse::failure(format!(
                    "Invalid request body: {}",
                    rejection.body_text()
                ))),
            );
        }
    };

    let url = request.url.unwrap_or_default();
    match state.analyzer.analyze_document(&url).await {
        Ok(fields) => (StatusCode::OK, Json(AnalyzeResponse::ok(fields))),
        Err(e) => (status_for(&e), Json(AnalyzeResponse::failure(e.to_string()))),
    }
}

/// Handler for `GET /health`.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        message: "API is running",
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(status_for(&AnalyzeError::MissingUrl), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(&AnalyzeError::HttpStatus {
                url: "u".into(),
                status: 404
            }),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(status_for(&AnalyzeError::NoPages), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            status_for(&AnalyzeError::EmptyModelAnswer),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&AnalyzeError::Internal("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn success_envelope_keeps_null_fields() {
        let body = serde_json::to_value(AnalyzeResponse::ok(ExtractedFields {
            barcode: Some("ABC".into()),
            reference_number: None,
        }))
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "success": true,
                "data": { "barcode": "ABC", "referenceNumber": null }
            })
        );
    }

    #[test]
    fn failure_envelope_omits_data() {
        let body = serde_json::to_value(AnalyzeResponse::failure("boom")).unwrap();
        assert_eq!(body, serde_json::json!({ "success": false, "error": "boom" }));
    }
}
