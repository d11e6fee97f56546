//! Reservation ledger boundary.
//!
//! The ledger exclusively owns each item's claimed total and claim set. Every
//! mutation goes through one atomic step per item: the in-memory backend holds
//! the item's mutex across decide+apply, the Postgres backend uses a
//! conditional update inside a transaction.

pub mod in_memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use partyplan_core::{CatalogItemId, ClaimId, PlannedEventId};
use partyplan_events::{Event, EventBus, EventEnvelope};
use partyplan_registry::{
    CatalogEntry, Claim, ClaimQuantity, ItemAvailability, ItemSummary, ListItem, RegistryEvent,
    ReservationError, SetTargetQuantity,
};

pub use in_memory::InMemoryLedger;
pub use postgres::PostgresLedger;

/// Ledger operation error.
///
/// `Rejected` is a business outcome (the command was evaluated and refused).
/// `StorageUnavailable` means the atomic step could not run or its outcome is
/// unknown; it is the only kind worth retrying.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error(transparent)]
    Rejected(#[from] ReservationError),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("corrupted ledger state: {0}")]
    Corrupted(String),
}

/// Result of a committed ledger mutation plus the events it produced.
///
/// `events` is empty when the mutation was a no-op, e.g. an idempotent replay
/// of a claim whose request key was already accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed<T> {
    pub value: T,
    pub events: Vec<EventEnvelope<RegistryEvent>>,
}

impl<T> Committed<T> {
    pub fn new(value: T, events: Vec<EventEnvelope<RegistryEvent>>) -> Self {
        Self { value, events }
    }

    pub fn unchanged(value: T) -> Self {
        Self {
            value,
            events: Vec::new(),
        }
    }

    pub fn is_unchanged(&self) -> bool {
        self.events.is_empty()
    }
}

/// Wrap a registry event for publication at the item stream position `sequence_number`.
pub fn envelope(event: RegistryEvent, sequence_number: u64) -> EventEnvelope<RegistryEvent> {
    EventEnvelope::new(
        Uuid::now_v7(),
        event.planned_event_id(),
        event.item_id(),
        event.event_type(),
        sequence_number,
        event,
    )
}

/// Authoritative per-item claim ledger.
///
/// Implementations must:
/// - run each mutation's check-and-act as one atomic step per item
/// - never apply part of a mutation (a dropped call is either committed or absent)
/// - scope every lookup by planned event (other events see `NotFound`)
#[async_trait]
pub trait ReservationLedger: Send + Sync {
    /// List a new catalog item.
    async fn list_item(&self, cmd: ListItem) -> Result<Committed<CatalogEntry>, LedgerError>;

    /// Change an item's target; refused while any claim is active.
    async fn set_target_quantity(
        &self,
        cmd: SetTargetQuantity,
    ) -> Result<Committed<ItemAvailability>, LedgerError>;

    /// Atomically accept the claim if it fits in the remaining capacity.
    async fn try_claim(&self, cmd: ClaimQuantity) -> Result<Committed<Claim>, LedgerError>;

    /// Release an active claim, returning it in `Released` state.
    async fn release(
        &self,
        planned_event_id: PlannedEventId,
        claim_id: ClaimId,
        released_at: DateTime<Utc>,
    ) -> Result<Committed<Claim>, LedgerError>;

    async fn entry(
        &self,
        planned_event_id: PlannedEventId,
        item_id: CatalogItemId,
    ) -> Result<CatalogEntry, LedgerError>;

    /// Advisory snapshot; may be stale immediately.
    async fn availability(
        &self,
        planned_event_id: PlannedEventId,
        item_id: CatalogItemId,
    ) -> Result<ItemAvailability, LedgerError>;

    /// Active claims in acceptance order.
    async fn active_claims(
        &self,
        planned_event_id: PlannedEventId,
        item_id: CatalogItemId,
    ) -> Result<Vec<Claim>, LedgerError>;

    /// Every item of a planned event, in listing order.
    async fn list_items(&self, planned_event_id: PlannedEventId) -> Result<Vec<ItemSummary>, LedgerError>;
}

#[async_trait]
impl<L> ReservationLedger for Arc<L>
where
    L: ReservationLedger + ?Sized,
{
    async fn list_item(&self, cmd: ListItem) -> Result<Committed<CatalogEntry>, LedgerError> {
        (**self).list_item(cmd).await
    }

    async fn set_target_quantity(
        &self,
        cmd: SetTargetQuantity,
    ) -> Result<Committed<ItemAvailability>, LedgerError> {
        (**self).set_target_quantity(cmd).await
    }

    async fn try_claim(&self, cmd: ClaimQuantity) -> Result<Committed<Claim>, LedgerError> {
        (**self).try_claim(cmd).await
    }

    async fn release(
        &self,
        planned_event_id: PlannedEventId,
        claim_id: ClaimId,
        released_at: DateTime<Utc>,
    ) -> Result<Committed<Claim>, LedgerError> {
        (**self).release(planned_event_id, claim_id, released_at).await
    }

    async fn entry(
        &self,
        planned_event_id: PlannedEventId,
        item_id: CatalogItemId,
    ) -> Result<CatalogEntry, LedgerError> {
        (**self).entry(planned_event_id, item_id).await
    }

    async fn availability(
        &self,
        planned_event_id: PlannedEventId,
        item_id: CatalogItemId,
    ) -> Result<ItemAvailability, LedgerError> {
        (**self).availability(planned_event_id, item_id).await
    }

    async fn active_claims(
        &self,
        planned_event_id: PlannedEventId,
        item_id: CatalogItemId,
    ) -> Result<Vec<Claim>, LedgerError> {
        (**self).active_claims(planned_event_id, item_id).await
    }

    async fn list_items(&self, planned_event_id: PlannedEventId) -> Result<Vec<ItemSummary>, LedgerError> {
        (**self).list_items(planned_event_id).await
    }
}

/// Adapter that publishes committed events to an `EventBus` after a successful ledger step.
///
/// Publication happens only after the mutation committed. A publish failure
/// is logged and does not turn the committed outcome into an error: the claim
/// exists whether or not the board heard about it.
pub struct PublishingLedger<L, B> {
    ledger: L,
    bus: B,
}

impl<L, B> PublishingLedger<L, B> {
    pub fn new(ledger: L, bus: B) -> Self {
        Self { ledger, bus }
    }
}

impl<L, B> PublishingLedger<L, B>
where
    B: EventBus<EventEnvelope<RegistryEvent>>,
{
    fn publish<T>(&self, committed: Committed<T>) -> Committed<T> {
        for env in &committed.events {
            if let Err(err) = self.bus.publish(env.clone()) {
                warn!(
                    event_type = env.event_type(),
                    item_id = %env.item_id(),
                    sequence_number = env.sequence_number(),
                    "registry event publication failed: {err:?}"
                );
            }
        }
        committed
    }
}

#[async_trait]
impl<L, B> ReservationLedger for PublishingLedger<L, B>
where
    L: ReservationLedger,
    B: EventBus<EventEnvelope<RegistryEvent>>,
{
    async fn list_item(&self, cmd: ListItem) -> Result<Committed<CatalogEntry>, LedgerError> {
        let committed = self.ledger.list_item(cmd).await?;
        Ok(self.publish(committed))
    }

    async fn set_target_quantity(
        &self,
        cmd: SetTargetQuantity,
    ) -> Result<Committed<ItemAvailability>, LedgerError> {
        let committed = self.ledger.set_target_quantity(cmd).await?;
        Ok(self.publish(committed))
    }

    async fn try_claim(&self, cmd: ClaimQuantity) -> Result<Committed<Claim>, LedgerError> {
        let committed = self.ledger.try_claim(cmd).await?;
        Ok(self.publish(committed))
    }

    async fn release(
        &self,
        planned_event_id: PlannedEventId,
        claim_id: ClaimId,
        released_at: DateTime<Utc>,
    ) -> Result<Committed<Claim>, LedgerError> {
        let committed = self
            .ledger
            .release(planned_event_id, claim_id, released_at)
            .await?;
        Ok(self.publish(committed))
    }

    async fn entry(
        &self,
        planned_event_id: PlannedEventId,
        item_id: CatalogItemId,
    ) -> Result<CatalogEntry, LedgerError> {
        self.ledger.entry(planned_event_id, item_id).await
    }

    async fn availability(
        &self,
        planned_event_id: PlannedEventId,
        item_id: CatalogItemId,
    ) -> Result<ItemAvailability, LedgerError> {
        self.ledger.availability(planned_event_id, item_id).await
    }

    async fn active_claims(
        &self,
        planned_event_id: PlannedEventId,
        item_id: CatalogItemId,
    ) -> Result<Vec<Claim>, LedgerError> {
        self.ledger.active_claims(planned_event_id, item_id).await
    }

    async fn list_items(&self, planned_event_id: PlannedEventId) -> Result<Vec<ItemSummary>, LedgerError> {
        self.ledger.list_items(planned_event_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use partyplan_core::ClaimantId;
    use partyplan_events::InMemoryEventBus;
    use partyplan_registry::Quantity;

    type Bus = InMemoryEventBus<EventEnvelope<RegistryEvent>>;

    #[tokio::test]
    async fn only_committed_mutations_are_published() {
        let bus = Arc::new(Bus::new());
        let subscription = bus.subscribe();
        let ledger = PublishingLedger::new(InMemoryLedger::new(), bus.clone());

        let planned_event_id = PlannedEventId::new();
        let item_id = CatalogItemId::new();
        ledger
            .list_item(ListItem {
                planned_event_id,
                item_id,
                name: "Gazebo".to_string(),
                description: None,
                price_cents: None,
                link: None,
                target_quantity: Quantity::ONE,
                occurred_at: Utc::now(),
            })
            .await
            .unwrap();

        let claim = |request_key: Option<&str>| ClaimQuantity {
            planned_event_id,
            item_id,
            claim_id: ClaimId::new(),
            claimant_id: ClaimantId::new(),
            quantity: Quantity::ONE,
            contact_info: None,
            message: None,
            request_key: request_key.map(str::to_string),
            occurred_at: Utc::now(),
        };

        ledger.try_claim(claim(Some("k1"))).await.unwrap();
        ledger.try_claim(claim(Some("k1"))).await.unwrap();
        assert!(ledger.try_claim(claim(None)).await.is_err());

        let types: Vec<String> = std::iter::from_fn(|| subscription.try_recv().ok())
            .map(|env| env.event_type().to_string())
            .collect();
        assert_eq!(types, vec!["registry.item.listed", "registry.claim.accepted"]);
    }

    #[tokio::test]
    async fn envelopes_are_numbered_by_item_version() {
        let bus = Arc::new(Bus::new());
        let subscription = bus.subscribe();
        let ledger = PublishingLedger::new(InMemoryLedger::new(), bus);

        let planned_event_id = PlannedEventId::new();
        let item_id = CatalogItemId::new();
        ledger
            .list_item(ListItem {
                planned_event_id,
                item_id,
                name: "Bunting".to_string(),
                description: None,
                price_cents: None,
                link: None,
                target_quantity: Quantity::new(3).unwrap(),
                occurred_at: Utc::now(),
            })
            .await
            .unwrap();
        let accepted = ledger
            .try_claim(ClaimQuantity {
                planned_event_id,
                item_id,
                claim_id: ClaimId::new(),
                claimant_id: ClaimantId::new(),
                quantity: Quantity::new(2).unwrap(),
                contact_info: None,
                message: None,
                request_key: None,
                occurred_at: Utc::now(),
            })
            .await
            .unwrap();
        ledger
            .release(planned_event_id, accepted.value.id, Utc::now())
            .await
            .unwrap();

        let sequences: Vec<u64> = std::iter::from_fn(|| subscription.try_recv().ok())
            .map(|env| {
                assert_eq!(env.planned_event_id(), planned_event_id);
                assert_eq!(env.item_id(), item_id);
                env.sequence_number()
            })
            .collect();
        assert_eq!(sequences, vec![1, 2, 3]);
    }
}
