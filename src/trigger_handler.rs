use crate::image_event::ImageEvent;
use crate::thumbnail_pipeline::ThumbnailPipeline;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Routes for the storage trigger plus health and version checks
pub fn router(pipeline: Arc<ThumbnailPipeline>) -> Router {
    Router::new()
        .route("/", post(trigger_handler))
        .route("/health", get(|| async { "OK" }))
        .route("/version", get(version_handler))
        .with_state(pipeline)
}

pub async fn version_handler() -> Json<serde_json::Value> {
    Json(json!({ "version": env!("CARGO_PKG_VERSION") }))
}

/// One invocation per request. A 5xx asks the platform to redeliver; a 4xx drops the event.
pub async fn trigger_handler(
    State(pipeline): State<Arc<ThumbnailPipeline>>,
    body: Bytes,
) -> Response {
    let event = match ImageEvent::from_json(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!("Trigger rejected: {}", e);
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    info!(
        "Trigger received for gs://{}/{}",
        event.bucket_name, event.object_name
    );

    match pipeline.handle(&event).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => {
            error!("Failed to process {}: {}", event.object_name, e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
