use core::str::FromStr;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use thiserror::Error;

use partyplan_core::{CatalogItemId, ClaimId, PlannedEventId};

use crate::app::errors;

/// Planned event a request is scoped to.
///
/// Taken from the `{event_id}` path segment; every registry route carries it
/// and nothing resolves items or claims outside of it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EventContext {
    planned_event_id: PlannedEventId,
}

impl EventContext {
    pub fn new(planned_event_id: PlannedEventId) -> Self {
        Self { planned_event_id }
    }

    pub fn from_path(raw: &str) -> Result<Self, PathIdError> {
        parse_id::<PlannedEventId>("event_id", raw).map(Self::new)
    }

    pub fn planned_event_id(&self) -> PlannedEventId {
        self.planned_event_id
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("malformed {segment}: {reason}")]
pub struct PathIdError {
    pub segment: &'static str,
    pub reason: String,
}

impl IntoResponse for PathIdError {
    fn into_response(self) -> axum::response::Response {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "Validation", self.to_string())
    }
}

fn parse_id<T>(segment: &'static str, raw: &str) -> Result<T, PathIdError>
where
    T: FromStr,
    T::Err: core::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| PathIdError {
        segment,
        reason: e.to_string(),
    })
}

pub fn item_id(raw: &str) -> Result<CatalogItemId, PathIdError> {
    parse_id("item_id", raw)
}

pub fn claim_id(raw: &str) -> Result<ClaimId, PathIdError> {
    parse_id("claim_id", raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_ids_parse() {
        let planned = PlannedEventId::new();
        let ctx = EventContext::from_path(&planned.to_string()).unwrap();
        assert_eq!(ctx.planned_event_id(), planned);

        let claim = ClaimId::new();
        assert_eq!(claim_id(&claim.to_string()).unwrap(), claim);
    }

    #[test]
    fn malformed_ids_name_the_segment() {
        let err = item_id("not-a-uuid").unwrap_err();
        assert_eq!(err.segment, "item_id");

        let err = EventContext::from_path("").unwrap_err();
        assert_eq!(err.segment, "event_id");
    }
}
