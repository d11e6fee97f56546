use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use partyplan_core::{Aggregate, AggregateRoot, CatalogItemId, ClaimId, PlannedEventId};
use partyplan_registry::{
    CatalogEntry, CatalogItem, Claim, ClaimQuantity, ItemAvailability, ItemSummary, ListItem,
    RegistryCommand, RegistryEvent, ReleaseClaim, ReservationError, SetTargetQuantity,
};

use super::{envelope, Committed, LedgerError, ReservationLedger};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct ItemKey {
    planned_event_id: PlannedEventId,
    item_id: CatalogItemId,
}

type ItemSlot = Arc<Mutex<CatalogItem>>;

/// In-memory reservation ledger.
///
/// Each item lives behind its own mutex; claims against different items never
/// contend. The outer maps are only locked long enough to find or insert a
/// slot. Lock order is always item slot, then claim index.
///
/// No `.await` happens while an item lock is held, so a cancelled caller can
/// never leave an item half-updated.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    items: RwLock<HashMap<ItemKey, ItemSlot>>,
    /// Active claim id -> owning item, for release-by-claim-id.
    claim_index: RwLock<HashMap<ClaimId, ItemKey>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: ItemKey) -> Result<Option<ItemSlot>, LedgerError> {
        let items = self.items.read().map_err(|_| poisoned())?;
        Ok(items.get(&key).cloned())
    }

    fn existing_slot(&self, key: ItemKey) -> Result<ItemSlot, LedgerError> {
        self.slot(key)?
            .ok_or(LedgerError::Rejected(ReservationError::ItemNotFound))
    }

    fn lock(slot: &ItemSlot) -> Result<MutexGuard<'_, CatalogItem>, LedgerError> {
        slot.lock().map_err(|_| poisoned())
    }

    /// Run one command against a locked item and wrap the resulting events.
    fn execute_locked(
        item: &mut CatalogItem,
        command: &RegistryCommand,
    ) -> Result<Vec<partyplan_events::EventEnvelope<RegistryEvent>>, LedgerError> {
        let base = item.version();
        let events = item.execute(command)?;
        Ok(events
            .into_iter()
            .enumerate()
            .map(|(offset, event)| envelope(event, base + offset as u64 + 1))
            .collect())
    }
}

fn poisoned() -> LedgerError {
    LedgerError::StorageUnavailable("ledger lock poisoned".to_string())
}

#[async_trait]
impl ReservationLedger for InMemoryLedger {
    async fn list_item(&self, cmd: ListItem) -> Result<Committed<CatalogEntry>, LedgerError> {
        let key = ItemKey {
            planned_event_id: cmd.planned_event_id,
            item_id: cmd.item_id,
        };

        let mut items = self.items.write().map_err(|_| poisoned())?;
        if items.contains_key(&key) {
            return Err(ReservationError::ItemExists.into());
        }

        let mut item = CatalogItem::empty(cmd.item_id);
        let events = Self::execute_locked(&mut item, &RegistryCommand::ListItem(cmd))?;
        let entry = item
            .entry()
            .cloned()
            .ok_or_else(|| LedgerError::Corrupted("listed item has no entry".to_string()))?;

        items.insert(key, Arc::new(Mutex::new(item)));
        Ok(Committed::new(entry, events))
    }

    async fn set_target_quantity(
        &self,
        cmd: SetTargetQuantity,
    ) -> Result<Committed<ItemAvailability>, LedgerError> {
        let slot = self.existing_slot(ItemKey {
            planned_event_id: cmd.planned_event_id,
            item_id: cmd.item_id,
        })?;
        let mut item = Self::lock(&slot)?;

        let events = Self::execute_locked(&mut item, &RegistryCommand::SetTargetQuantity(cmd))?;
        Ok(Committed::new(item.availability(), events))
    }

    async fn try_claim(&self, cmd: ClaimQuantity) -> Result<Committed<Claim>, LedgerError> {
        let key = ItemKey {
            planned_event_id: cmd.planned_event_id,
            item_id: cmd.item_id,
        };
        let slot = self.existing_slot(key)?;
        let mut item = Self::lock(&slot)?;

        if let Some(existing) = cmd
            .request_key
            .as_deref()
            .and_then(|k| item.claim_with_request_key(k))
        {
            return Ok(Committed::unchanged(existing.clone()));
        }

        let claim_id = cmd.claim_id;
        let events = Self::execute_locked(&mut item, &RegistryCommand::ClaimQuantity(cmd))?;
        let claim = item
            .active_claim(claim_id)
            .cloned()
            .ok_or_else(|| LedgerError::Corrupted("accepted claim missing from item".to_string()))?;

        self.claim_index
            .write()
            .map_err(|_| poisoned())?
            .insert(claim_id, key);

        Ok(Committed::new(claim, events))
    }

    async fn release(
        &self,
        planned_event_id: PlannedEventId,
        claim_id: ClaimId,
        released_at: DateTime<Utc>,
    ) -> Result<Committed<Claim>, LedgerError> {
        let key = self
            .claim_index
            .read()
            .map_err(|_| poisoned())?
            .get(&claim_id)
            .copied()
            .filter(|k| k.planned_event_id == planned_event_id)
            .ok_or(LedgerError::Rejected(ReservationError::ClaimNotFound))?;

        let slot = self
            .slot(key)?
            .ok_or(LedgerError::Rejected(ReservationError::ClaimNotFound))?;
        let mut item = Self::lock(&slot)?;

        let claim = item
            .active_claim(claim_id)
            .cloned()
            .ok_or(LedgerError::Rejected(ReservationError::ClaimNotFound))?;

        let events = Self::execute_locked(
            &mut item,
            &RegistryCommand::ReleaseClaim(ReleaseClaim {
                planned_event_id,
                item_id: key.item_id,
                claim_id,
                occurred_at: released_at,
            }),
        )?;

        self.claim_index
            .write()
            .map_err(|_| poisoned())?
            .remove(&claim_id);

        Ok(Committed::new(claim.release(released_at)?, events))
    }

    async fn entry(
        &self,
        planned_event_id: PlannedEventId,
        item_id: CatalogItemId,
    ) -> Result<CatalogEntry, LedgerError> {
        let slot = self.existing_slot(ItemKey {
            planned_event_id,
            item_id,
        })?;
        let item = Self::lock(&slot)?;
        item.entry()
            .cloned()
            .ok_or(LedgerError::Rejected(ReservationError::ItemNotFound))
    }

    async fn availability(
        &self,
        planned_event_id: PlannedEventId,
        item_id: CatalogItemId,
    ) -> Result<ItemAvailability, LedgerError> {
        let slot = self.existing_slot(ItemKey {
            planned_event_id,
            item_id,
        })?;
        let item = Self::lock(&slot)?;
        Ok(item.availability())
    }

    async fn active_claims(
        &self,
        planned_event_id: PlannedEventId,
        item_id: CatalogItemId,
    ) -> Result<Vec<Claim>, LedgerError> {
        let slot = self.existing_slot(ItemKey {
            planned_event_id,
            item_id,
        })?;
        let item = Self::lock(&slot)?;
        Ok(item.active_claims().to_vec())
    }

    async fn list_items(&self, planned_event_id: PlannedEventId) -> Result<Vec<ItemSummary>, LedgerError> {
        let slots: Vec<ItemSlot> = {
            let items = self.items.read().map_err(|_| poisoned())?;
            items
                .iter()
                .filter(|(key, _)| key.planned_event_id == planned_event_id)
                .map(|(_, slot)| slot.clone())
                .collect()
        };

        let mut summaries = Vec::with_capacity(slots.len());
        for slot in &slots {
            if let Some(summary) = Self::lock(slot)?.summary() {
                summaries.push(summary);
            }
        }
        summaries.sort_by_key(|s| (s.entry.listed_at, s.entry.item_id));
        Ok(summaries)
    }
}
