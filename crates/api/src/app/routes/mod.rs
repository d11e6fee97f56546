use axum::{
    routing::{delete, get, put},
    Router,
};

pub mod claims;
pub mod registry;
pub mod system;

/// Router for all planned-event-scoped registry endpoints.
pub fn router() -> Router {
    Router::new()
        .route(
            "/events/:event_id/registry/items",
            get(registry::list_items).post(registry::create_item),
        )
        .route("/events/:event_id/registry/items/:item_id", get(registry::get_item))
        .route(
            "/events/:event_id/registry/items/:item_id/target",
            put(registry::set_target),
        )
        .route(
            "/events/:event_id/registry/items/:item_id/claims",
            get(claims::list_claims).post(claims::submit_claim),
        )
        .route(
            "/events/:event_id/registry/claims/:claim_id",
            delete(claims::release_claim),
        )
        .route("/events/:event_id/registry/stream", get(system::stream))
}
