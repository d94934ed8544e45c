//! One-shot multimodal analysis
//!
//! `POST /analyze/multimodal` takes a multipart form with optional `image`
//! and `audio` file parts plus optional `text` and `language` fields.

use axum::{
    extract::{Multipart, State},
    routing::post,
    Json, Router,
};
use tracing::debug;

use crate::analyzer::MediaPayload;
use crate::error::ApiResult;
use crate::orchestrator::{FusedResult, MultimodalRequest};
use crate::AppState;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// POST /analyze/multimodal
pub async fn analyze_multimodal(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<FusedResult>> {
    let request = read_form(multipart).await?;
    let fused = state.orchestrator.orchestrate(request).await?;
    Ok(Json(fused))
}

async fn read_form(mut multipart: Multipart) -> ApiResult<MultimodalRequest> {
    let mut request = MultimodalRequest::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" | "audio" => {
                let file_name = field.file_name().unwrap_or(name.as_str()).to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or(DEFAULT_CONTENT_TYPE)
                    .to_string();
                let bytes = field.bytes().await?;
                debug!(field = %name, size = bytes.len(), "Received upload");

                let payload = MediaPayload::new(bytes.to_vec(), file_name, content_type);
                if name == "image" {
                    request.image = Some(payload);
                } else {
                    request.audio = Some(payload);
                }
            }
            "text" => request.text = Some(field.text().await?),
            "language" => request.language = Some(field.text().await?),
            other => debug!(field = %other, "Ignoring unknown form field"),
        }
    }

    Ok(request)
}

/// Build multimodal analysis routes
pub fn multimodal_routes() -> Router<AppState> {
    Router::new().route("/analyze/multimodal", post(analyze_multimodal))
}
