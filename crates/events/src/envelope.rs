use serde::{Deserialize, Serialize};
use uuid::Uuid;

use partyplan_core::{CatalogItemId, PlannedEventId};

/// Envelope for an event, carrying planned-event scope + stream metadata.
///
/// Notes:
/// - Every registry stream is keyed by `(planned_event_id, item_id)`.
/// - `sequence_number` increases by exactly one per event within a stream.
/// - `payload` is the domain event (typed, or JSON once it crossed a boundary).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    planned_event_id: PlannedEventId,

    item_id: CatalogItemId,
    event_type: String,

    /// Monotonically increasing position in the item stream.
    sequence_number: u64,

    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        planned_event_id: PlannedEventId,
        item_id: CatalogItemId,
        event_type: impl Into<String>,
        sequence_number: u64,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            planned_event_id,
            item_id,
            event_type: event_type.into(),
            sequence_number,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn planned_event_id(&self) -> PlannedEventId {
        self.planned_event_id
    }

    pub fn item_id(&self) -> CatalogItemId {
        self.item_id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }

    /// Replace the payload, keeping all stream metadata.
    pub fn map<F, T>(self, f: F) -> EventEnvelope<T>
    where
        F: FnOnce(E) -> T,
    {
        EventEnvelope {
            event_id: self.event_id,
            planned_event_id: self.planned_event_id,
            item_id: self.item_id,
            event_type: self.event_type,
            sequence_number: self.sequence_number,
            payload: f(self.payload),
        }
    }
}
