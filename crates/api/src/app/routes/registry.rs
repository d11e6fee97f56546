//! Catalog item endpoints of a planned event's gift registry.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use partyplan_core::{CatalogItemId, PlannedEventId};
use partyplan_registry::{CatalogEntry, ItemAvailability, ItemSummary};

use crate::app::dto::{self, CreateItemRequest, ItemListResponse, SetTargetRequest};
use crate::app::{errors, services::AppServices};
use crate::context::{self, EventContext};

/// Resolve `{event_id}/.../{item_id}` path segments.
pub(crate) fn scoped_item(event_id: &str, item_id: &str) -> Result<(PlannedEventId, CatalogItemId), Response> {
    let ctx = EventContext::from_path(event_id).map_err(IntoResponse::into_response)?;
    let item_id = context::item_id(item_id).map_err(IntoResponse::into_response)?;
    Ok((ctx.planned_event_id(), item_id))
}

/// POST /events/:event_id/registry/items
pub async fn create_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path(event_id): Path<String>,
    body: Result<Json<CreateItemRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CatalogEntry>), Response> {
    let ctx = EventContext::from_path(&event_id).map_err(IntoResponse::into_response)?;
    let Json(body) = body.map_err(errors::body_rejection)?;

    let item = body
        .into_new_item(ctx.planned_event_id())
        .map_err(errors::claim_error_to_response)?;
    let entry = services
        .reservations()
        .list_item(item)
        .await
        .map_err(errors::claim_error_to_response)?;

    Ok((StatusCode::CREATED, Json(entry)))
}

/// GET /events/:event_id/registry/items
pub async fn list_items(
    Extension(services): Extension<Arc<AppServices>>,
    Path(event_id): Path<String>,
) -> Result<Json<ItemListResponse>, Response> {
    let ctx = EventContext::from_path(&event_id).map_err(IntoResponse::into_response)?;
    let items = services
        .reservations()
        .list_items(ctx.planned_event_id())
        .await
        .map_err(errors::claim_error_to_response)?;

    Ok(Json(ItemListResponse {
        planned_event_id: ctx.planned_event_id(),
        items,
    }))
}

/// GET /events/:event_id/registry/items/:item_id
///
/// Entry and availability are two reads; the figures are advisory.
pub async fn get_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path((event_id, item_id)): Path<(String, String)>,
) -> Result<Json<ItemSummary>, Response> {
    let (planned_event_id, item_id) = scoped_item(&event_id, &item_id)?;
    let reservations = services.reservations();

    let entry = reservations
        .entry(planned_event_id, item_id)
        .await
        .map_err(errors::claim_error_to_response)?;
    let availability = reservations
        .available_quantity(planned_event_id, item_id)
        .await
        .map_err(errors::claim_error_to_response)?;

    Ok(Json(ItemSummary { entry, availability }))
}

/// PUT /events/:event_id/registry/items/:item_id/target
pub async fn set_target(
    Extension(services): Extension<Arc<AppServices>>,
    Path((event_id, item_id)): Path<(String, String)>,
    body: Result<Json<SetTargetRequest>, JsonRejection>,
) -> Result<Json<ItemAvailability>, Response> {
    let (planned_event_id, item_id) = scoped_item(&event_id, &item_id)?;
    let Json(body) = body.map_err(errors::body_rejection)?;

    let target = dto::integer_quantity("target_quantity", &body.target_quantity)
        .map_err(errors::claim_error_to_response)?;
    let availability = services
        .reservations()
        .set_target_quantity(planned_event_id, item_id, target)
        .await
        .map_err(errors::claim_error_to_response)?;

    Ok(Json(availability))
}
