use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;

use crate::error::{AnalysisError, ErrorKind};
use crate::handlers::session::FailureInfo;
use crate::handlers::{AttemptId, LabelAnalyzer, SessionSnapshot};
use crate::models::{AnalysisReport, ImagePreview, UploadedImage};

/// Bodies above this are refused by the router; the 10 MB rule itself is
/// enforced during ingestion so that it produces a validation error.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

pub fn create_router(analyzer: Arc<LabelAnalyzer>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_check))
        .route("/api/label", get(snapshot_handler))
        .route("/api/label/image", post(upload_handler))
        .route("/api/label/analyze", post(analyze_handler))
        .route("/api/label/clear", post(clear_handler))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(analyzer)
}

#[derive(Serialize)]
struct UploadResponse {
    attempt: AttemptId,
    preview: ImagePreview,
}

struct ApiError(AnalysisError);

impl From<AnalysisError> for ApiError {
    fn from(err: AnalysisError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.kind() {
            ErrorKind::Validation | ErrorKind::Schema => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::NotReady | ErrorKind::Superseded => StatusCode::CONFLICT,
            ErrorKind::Configuration => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::Transport | ErrorKind::EmptyResponse | ErrorKind::Parse => {
                StatusCode::BAD_GATEWAY
            }
        };
        (status, Json(FailureInfo::from(&self.0))).into_response()
    }
}

async fn upload_handler(
    State(analyzer): State<Arc<LabelAnalyzer>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<UploadResponse>, ApiError> {
    let media_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    log::info!("📨 Upload received: {} bytes ({})", body.len(), media_type);

    let (attempt, preview) = analyzer
        .upload(UploadedImage::new(body.to_vec(), media_type))
        .await?;

    Ok(Json(UploadResponse { attempt, preview }))
}

async fn analyze_handler(
    State(analyzer): State<Arc<LabelAnalyzer>>,
) -> Result<Json<AnalysisReport>, ApiError> {
    Ok(Json(analyzer.analyze().await?))
}

async fn clear_handler(State(analyzer): State<Arc<LabelAnalyzer>>) -> Json<SessionSnapshot> {
    Json(analyzer.clear().await)
}

async fn snapshot_handler(State(analyzer): State<Arc<LabelAnalyzer>>) -> Json<SessionSnapshot> {
    Json(analyzer.snapshot().await)
}

async fn root_handler() -> &'static str {
    "Cocoa Label Analyzer - POST an image to /api/label/image, then POST /api/label/analyze"
}

async fn health_check() -> &'static str {
    "OK"
}
