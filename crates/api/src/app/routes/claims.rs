use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use partyplan_infra::ClaimRequest;
use partyplan_registry::Claim;

use crate::app::dto::{self, SubmitClaimRequest};
use crate::app::routes::registry::scoped_item;
use crate::app::{errors, services::AppServices};
use crate::context::{self, EventContext};

/// Header alternative to the body's `request_key`.
pub const IDEMPOTENCY_KEY: &str = "idempotency-key";

/// GET /events/:event_id/registry/items/:item_id/claims
pub async fn list_claims(
    Extension(services): Extension<Arc<AppServices>>,
    Path((event_id, item_id)): Path<(String, String)>,
) -> Result<Json<Vec<Claim>>, Response> {
    let (planned_event_id, item_id) = scoped_item(&event_id, &item_id)?;
    let claims = services
        .reservations()
        .active_claims(planned_event_id, item_id)
        .await
        .map_err(errors::claim_error_to_response)?;
    Ok(Json(claims))
}

/// POST /events/:event_id/registry/items/:item_id/claims
///
/// 201 with the claim on success. A request key that already holds an
/// active claim on this item returns that claim again.
pub async fn submit_claim(
    Extension(services): Extension<Arc<AppServices>>,
    Path((event_id, item_id)): Path<(String, String)>,
    headers: HeaderMap,
    body: Result<Json<SubmitClaimRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Claim>), Response> {
    let (planned_event_id, item_id) = scoped_item(&event_id, &item_id)?;
    let Json(body) = body.map_err(errors::body_rejection)?;

    let quantity = dto::integer_quantity("quantity", &body.quantity).map_err(errors::claim_error_to_response)?;
    let request_key = body.request_key.or_else(|| {
        headers
            .get(IDEMPOTENCY_KEY)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    });

    let claim = services
        .reservations()
        .submit_claim(ClaimRequest {
            planned_event_id,
            item_id,
            claimant_id: body.claimant_id,
            quantity,
            contact_info: body.contact_info,
            message: body.message,
            request_key,
        })
        .await
        .map_err(errors::claim_error_to_response)?;

    Ok((StatusCode::CREATED, Json(claim)))
}

/// DELETE /events/:event_id/registry/claims/:claim_id
///
/// A second release of the same claim is 404 and changes nothing.
pub async fn release_claim(
    Extension(services): Extension<Arc<AppServices>>,
    Path((event_id, claim_id)): Path<(String, String)>,
) -> Result<Json<Claim>, Response> {
    let ctx = EventContext::from_path(&event_id).map_err(IntoResponse::into_response)?;
    let claim_id = context::claim_id(&claim_id).map_err(IntoResponse::into_response)?;

    let claim = services
        .reservations()
        .release_claim(ctx.planned_event_id(), claim_id)
        .await
        .map_err(errors::claim_error_to_response)?;
    Ok(Json(claim))
}
