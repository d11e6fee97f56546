use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    response::IntoResponse,
    Json,
};

use crate::app::{errors, services::{self, AppServices}};
use crate::context::EventContext;

pub async fn health(Extension(services): Extension<Arc<AppServices>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "storage": services.storage(),
    }))
}

/// GET /events/:event_id/registry/stream
pub async fn stream(
    Extension(services): Extension<Arc<AppServices>>,
    Path(event_id): Path<String>,
) -> axum::response::Response {
    let ctx = match EventContext::from_path(&event_id) {
        Ok(ctx) => ctx,
        Err(e) => return e.into_response(),
    };

    match services::registry_sse_stream(services, ctx.planned_event_id()).await {
        Ok(sse) => sse.into_response(),
        Err(e) => errors::claim_error_to_response(e),
    }
}
