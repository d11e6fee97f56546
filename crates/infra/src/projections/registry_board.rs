use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use partyplan_core::{CatalogItemId, PlannedEventId};
use partyplan_events::EventEnvelope;
use partyplan_registry::{ItemAvailability, ItemSummary, RegistryEvent};

use crate::read_model::EventScopedStore;

/// One row of the registry board: what guests see for an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryBoardEntry {
    pub planned_event_id: PlannedEventId,
    pub item_id: CatalogItemId,
    pub name: String,
    pub target_quantity: u32,
    pub claimed_quantity: u32,
    pub available: u32,
    pub active_claims: usize,
    /// `None` until the listing or a snapshot of the item reached the board.
    pub listed_at: Option<DateTime<Utc>>,
    /// Item version of the last envelope applied; 0 when seeded from a snapshot.
    pub last_sequence: u64,
}

impl RegistryBoardEntry {
    fn with_figures(mut self, availability: &ItemAvailability, sequence: u64) -> Self {
        self.target_quantity = availability.target_quantity;
        self.claimed_quantity = availability.claimed_quantity;
        self.available = availability.available;
        self.active_claims = availability.active_claims;
        self.last_sequence = sequence;
        self
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct CursorKey {
    planned_event_id: PlannedEventId,
    item_id: CatalogItemId,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BoardProjectionError {
    #[error("sequence numbers start at 1")]
    ZeroSequence,

    #[error("scope mismatch: {0}")]
    ScopeMismatch(String),

    #[error("board cursor lock poisoned")]
    Poisoned,
}

/// Registry board projection.
///
/// Disposable and rebuildable. Envelopes of one item can arrive out of order
/// (publication happens after the ledger released the item), so the cursor
/// only moves forward: anything at or below it is a replay or superseded and
/// is ignored. Events carry absolute figures, which makes skipping harmless.
#[derive(Debug)]
pub struct RegistryBoardProjection<S>
where
    S: EventScopedStore<CatalogItemId, RegistryBoardEntry>,
{
    store: S,
    cursors: Mutex<HashMap<CursorKey, u64>>,
}

impl<S> RegistryBoardProjection<S>
where
    S: EventScopedStore<CatalogItemId, RegistryBoardEntry>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, planned_event_id: PlannedEventId, item_id: &CatalogItemId) -> Option<RegistryBoardEntry> {
        self.store.get(planned_event_id, item_id)
    }

    /// Board rows of one planned event, oldest listing first.
    ///
    /// Rows whose listing time is not known yet sort last.
    pub fn list(&self, planned_event_id: PlannedEventId) -> Vec<RegistryBoardEntry> {
        let mut rows = self.store.list(planned_event_id);
        rows.sort_by_key(|row| (row.listed_at.is_none(), row.listed_at, row.item_id));
        rows
    }

    /// Apply one published envelope.
    ///
    /// Returns the updated row, or `None` when the envelope was a replay or
    /// older than what the board already shows.
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<RegistryEvent>,
    ) -> Result<Option<RegistryBoardEntry>, BoardProjectionError> {
        let planned_event_id = envelope.planned_event_id();
        let item_id = envelope.item_id();
        let seq = envelope.sequence_number();

        if seq == 0 {
            return Err(BoardProjectionError::ZeroSequence);
        }

        let event = envelope.payload();
        if event.planned_event_id() != planned_event_id {
            return Err(BoardProjectionError::ScopeMismatch(
                "event planned_event_id does not match envelope".to_string(),
            ));
        }
        if event.item_id() != item_id {
            return Err(BoardProjectionError::ScopeMismatch(
                "event item_id does not match envelope".to_string(),
            ));
        }

        let mut cursors = self
            .cursors
            .lock()
            .map_err(|_| BoardProjectionError::Poisoned)?;
        let key = CursorKey {
            planned_event_id,
            item_id,
        };
        let last = cursors.get(&key).copied().unwrap_or(0);
        if seq <= last {
            return Ok(None);
        }

        let current = self.store.get(planned_event_id, &item_id).unwrap_or(RegistryBoardEntry {
            planned_event_id,
            item_id,
            name: String::new(),
            target_quantity: 0,
            claimed_quantity: 0,
            available: 0,
            active_claims: 0,
            listed_at: None,
            last_sequence: 0,
        });

        let updated = match event {
            RegistryEvent::ItemListed(e) => {
                let target = e.entry.target_quantity.get();
                RegistryBoardEntry {
                    planned_event_id,
                    item_id,
                    name: e.entry.name.clone(),
                    target_quantity: target,
                    claimed_quantity: 0,
                    available: target,
                    active_claims: 0,
                    listed_at: Some(e.entry.listed_at),
                    last_sequence: seq,
                }
            }
            RegistryEvent::TargetQuantityChanged(e) => current.with_figures(&e.availability, seq),
            RegistryEvent::ClaimAccepted(e) => current.with_figures(&e.availability, seq),
            RegistryEvent::ClaimReleased(e) => current.with_figures(&e.availability, seq),
        };

        self.store.upsert(planned_event_id, item_id, updated.clone());
        cursors.insert(key, seq);
        Ok(Some(updated))
    }

    /// Fill the board from ledger snapshots.
    ///
    /// Rows already driven by envelopes keep their figures; only a missing
    /// name is filled in.
    pub fn seed(
        &self,
        planned_event_id: PlannedEventId,
        summaries: &[ItemSummary],
    ) -> Result<Vec<RegistryBoardEntry>, BoardProjectionError> {
        let cursors = self
            .cursors
            .lock()
            .map_err(|_| BoardProjectionError::Poisoned)?;

        for summary in summaries {
            let item_id = summary.entry.item_id;
            if summary.entry.planned_event_id != planned_event_id {
                return Err(BoardProjectionError::ScopeMismatch(
                    "snapshot belongs to another planned event".to_string(),
                ));
            }

            let key = CursorKey {
                planned_event_id,
                item_id,
            };
            let row = match self.store.get(planned_event_id, &item_id) {
                Some(mut row) if cursors.contains_key(&key) => {
                    if row.name.is_empty() {
                        row.name = summary.entry.name.clone();
                    }
                    if row.listed_at.is_none() {
                        row.listed_at = Some(summary.entry.listed_at);
                    }
                    row
                }
                _ => RegistryBoardEntry {
                    planned_event_id,
                    item_id,
                    name: summary.entry.name.clone(),
                    target_quantity: 0,
                    claimed_quantity: 0,
                    available: 0,
                    active_claims: 0,
                    listed_at: Some(summary.entry.listed_at),
                    last_sequence: 0,
                }
                .with_figures(&summary.availability, 0),
            };
            self.store.upsert(planned_event_id, item_id, row);
        }
        drop(cursors);

        Ok(self.list(planned_event_id))
    }

    /// Rebuild from scratch by replaying envelopes.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<RegistryEvent>>,
    ) -> Result<(), BoardProjectionError> {
        let mut envs: Vec<_> = envelopes.into_iter().collect();

        {
            let mut cursors = self
                .cursors
                .lock()
                .map_err(|_| BoardProjectionError::Poisoned)?;
            cursors.clear();
        }

        let mut scopes = envs.iter().map(|e| e.planned_event_id()).collect::<Vec<_>>();
        scopes.sort();
        scopes.dedup();
        for scope in scopes {
            self.store.clear_scope(scope);
        }

        envs.sort_by_key(|e| (e.planned_event_id(), e.item_id(), e.sequence_number()));
        for env in &envs {
            self.apply_envelope(env)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read_model::InMemoryEventScopedStore;
    use chrono::{Duration, Utc};
    use partyplan_core::{ClaimId, ClaimantId};
    use partyplan_events::Event;
    use partyplan_registry::{
        CatalogEntry, Claim, ClaimAccepted, ClaimReleased, ItemListed, Quantity,
    };
    use uuid::Uuid;

    type Board = RegistryBoardProjection<InMemoryEventScopedStore<CatalogItemId, RegistryBoardEntry>>;

    fn board() -> Board {
        RegistryBoardProjection::new(InMemoryEventScopedStore::new())
    }

    fn wrap(event: RegistryEvent, seq: u64) -> EventEnvelope<RegistryEvent> {
        EventEnvelope::new(
            Uuid::now_v7(),
            event.planned_event_id(),
            event.item_id(),
            event.event_type(),
            seq,
            event,
        )
    }

    fn entry(target: u32) -> CatalogEntry {
        CatalogEntry {
            item_id: CatalogItemId::new(),
            planned_event_id: PlannedEventId::new(),
            name: "Punch bowl".to_string(),
            description: None,
            price_cents: None,
            link: None,
            target_quantity: Quantity::new(target).unwrap(),
            listed_at: Utc::now(),
        }
    }

    fn figures(entry: &CatalogEntry, claimed: u32, active_claims: usize) -> ItemAvailability {
        let target = entry.target_quantity.get();
        ItemAvailability {
            item_id: entry.item_id,
            target_quantity: target,
            claimed_quantity: claimed,
            available: target - claimed,
            active_claims,
        }
    }

    fn accepted(entry: &CatalogEntry, quantity: u32, claimed_after: u32, active: usize) -> RegistryEvent {
        let claim = Claim::pending(
            ClaimId::new(),
            entry.planned_event_id,
            entry.item_id,
            ClaimantId::new(),
            Quantity::new(quantity).unwrap(),
            None,
            None,
            None,
            Utc::now(),
        )
        .activate()
        .unwrap();
        RegistryEvent::ClaimAccepted(ClaimAccepted {
            claim,
            availability: figures(entry, claimed_after, active),
        })
    }

    fn listed(entry: &CatalogEntry) -> RegistryEvent {
        RegistryEvent::ItemListed(ItemListed {
            entry: entry.clone(),
        })
    }

    #[test]
    fn listing_and_claims_drive_the_row() {
        let board = board();
        let item = entry(4);

        board.apply_envelope(&wrap(listed(&item), 1)).unwrap();
        let row = board
            .apply_envelope(&wrap(accepted(&item, 3, 3, 1), 2))
            .unwrap()
            .unwrap();

        assert_eq!(row.name, "Punch bowl");
        assert_eq!(row.claimed_quantity, 3);
        assert_eq!(row.available, 1);
        assert_eq!(row.active_claims, 1);
        assert_eq!(board.list(item.planned_event_id), vec![row]);
    }

    #[test]
    fn replays_are_ignored() {
        let board = board();
        let item = entry(4);
        let claim = wrap(accepted(&item, 1, 1, 1), 2);

        board.apply_envelope(&wrap(listed(&item), 1)).unwrap();
        assert!(board.apply_envelope(&claim).unwrap().is_some());
        assert!(board.apply_envelope(&claim).unwrap().is_none());

        let row = board.get(item.planned_event_id, &item.item_id).unwrap();
        assert_eq!(row.claimed_quantity, 1);
    }

    #[test]
    fn late_envelopes_do_not_roll_the_board_back() {
        let board = board();
        let item = entry(5);
        board.apply_envelope(&wrap(listed(&item), 1)).unwrap();

        let second = wrap(accepted(&item, 2, 2, 1), 2);
        let third = wrap(accepted(&item, 1, 3, 2), 3);

        board.apply_envelope(&third).unwrap();
        assert!(board.apply_envelope(&second).unwrap().is_none());

        let row = board.get(item.planned_event_id, &item.item_id).unwrap();
        assert_eq!(row.claimed_quantity, 3);
        assert_eq!(row.active_claims, 2);
        assert_eq!(row.last_sequence, 3);
    }

    #[test]
    fn release_restores_figures() {
        let board = board();
        let item = entry(2);
        let accept = accepted(&item, 2, 2, 1);
        let claim_id = match &accept {
            RegistryEvent::ClaimAccepted(e) => e.claim.id,
            _ => unreachable!(),
        };

        board.apply_envelope(&wrap(listed(&item), 1)).unwrap();
        board.apply_envelope(&wrap(accept, 2)).unwrap();
        let row = board
            .apply_envelope(&wrap(
                RegistryEvent::ClaimReleased(ClaimReleased {
                    planned_event_id: item.planned_event_id,
                    item_id: item.item_id,
                    claim_id,
                    quantity: Quantity::new(2).unwrap(),
                    released_at: Utc::now(),
                    availability: figures(&item, 0, 0),
                }),
                3,
            ))
            .unwrap()
            .unwrap();

        assert_eq!(row.available, 2);
        assert_eq!(row.active_claims, 0);
    }

    #[test]
    fn zero_sequence_and_scope_mismatch_are_errors() {
        let board = board();
        let item = entry(1);

        assert_eq!(
            board.apply_envelope(&wrap(listed(&item), 0)).unwrap_err(),
            BoardProjectionError::ZeroSequence
        );

        let mismatched = EventEnvelope::new(
            Uuid::now_v7(),
            PlannedEventId::new(),
            item.item_id,
            "registry.item.listed",
            1,
            listed(&item),
        );
        assert!(matches!(
            board.apply_envelope(&mismatched),
            Err(BoardProjectionError::ScopeMismatch(_))
        ));
    }

    #[test]
    fn seeding_fills_unknown_items_without_touching_live_rows() {
        let board = board();
        let live = entry(3);
        board.apply_envelope(&wrap(listed(&live), 1)).unwrap();
        board.apply_envelope(&wrap(accepted(&live, 1, 1, 1), 2)).unwrap();

        let mut restored = entry(6);
        restored.planned_event_id = live.planned_event_id;

        let rows = board
            .seed(
                live.planned_event_id,
                &[
                    ItemSummary {
                        entry: live.clone(),
                        availability: figures(&live, 0, 0),
                    },
                    ItemSummary {
                        entry: restored.clone(),
                        availability: figures(&restored, 4, 2),
                    },
                ],
            )
            .unwrap();

        assert_eq!(rows.len(), 2);
        let live_row = board.get(live.planned_event_id, &live.item_id).unwrap();
        assert_eq!(live_row.claimed_quantity, 1);
        let restored_row = board.get(live.planned_event_id, &restored.item_id).unwrap();
        assert_eq!(restored_row.available, 2);
        assert_eq!(restored_row.last_sequence, 0);
    }

    #[test]
    fn rebuild_replays_in_sequence_order() {
        let board = board();
        let item = entry(3);
        let envelopes = vec![
            wrap(accepted(&item, 1, 2, 2), 3),
            wrap(listed(&item), 1),
            wrap(accepted(&item, 1, 1, 1), 2),
        ];

        board.rebuild_from_scratch(envelopes).unwrap();

        let row = board.get(item.planned_event_id, &item.item_id).unwrap();
        assert_eq!(row.claimed_quantity, 2);
        assert_eq!(row.last_sequence, 3);
    }

    #[test]
    fn rows_list_in_listing_order() {
        let board = board();
        let mut later = entry(2);
        later.item_id = CatalogItemId::from_uuid(Uuid::from_u128(1));
        let mut earlier = entry(2);
        earlier.item_id = CatalogItemId::from_uuid(Uuid::from_u128(2));
        earlier.planned_event_id = later.planned_event_id;
        earlier.listed_at = later.listed_at - Duration::minutes(5);
        let mut unlisted = entry(2);
        unlisted.item_id = CatalogItemId::from_uuid(Uuid::from_u128(0));
        unlisted.planned_event_id = later.planned_event_id;

        board.apply_envelope(&wrap(accepted(&unlisted, 1, 1, 1), 2)).unwrap();
        board.apply_envelope(&wrap(listed(&later), 1)).unwrap();
        board.apply_envelope(&wrap(listed(&earlier), 1)).unwrap();

        let order: Vec<_> = board
            .list(later.planned_event_id)
            .into_iter()
            .map(|row| row.item_id)
            .collect();
        assert_eq!(order, vec![earlier.item_id, later.item_id, unlisted.item_id]);
    }
}
