use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use partyplan_core::{Aggregate, AggregateRoot, CatalogItemId, ClaimId, ClaimantId, PlannedEventId};
use partyplan_events::Event;

use crate::claim::Claim;
use crate::error::ReservationError;
use crate::quantity::Quantity;

/// Static description of a reservable item, as the organizer listed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub item_id: CatalogItemId,
    pub planned_event_id: PlannedEventId,
    pub name: String,
    pub description: Option<String>,
    pub price_cents: Option<u64>,
    pub link: Option<String>,
    pub target_quantity: Quantity,
    pub listed_at: DateTime<Utc>,
}

/// Point-in-time capacity figures for one item.
///
/// Advisory only: the numbers may be stale as soon as they are returned.
/// Acceptance is decided by the ledger's atomic claim step, never by a
/// prior read of this value.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAvailability {
    pub item_id: CatalogItemId,
    pub target_quantity: u32,
    pub claimed_quantity: u32,
    pub available: u32,
    pub active_claims: usize,
}

/// Catalog entry together with its current capacity figures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSummary {
    pub entry: CatalogEntry,
    pub availability: ItemAvailability,
}

/// Aggregate root: one catalog item and its active claims.
///
/// Invariant: `claimed == sum(active claim quantities) <= target_quantity`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogItem {
    id: CatalogItemId,
    entry: Option<CatalogEntry>,
    claims: Vec<Claim>,
    claimed: u32,
    version: u64,
}

impl CatalogItem {
    /// Create an empty, not-yet-listed aggregate instance.
    pub fn empty(id: CatalogItemId) -> Self {
        Self {
            id,
            entry: None,
            claims: Vec::new(),
            claimed: 0,
            version: 0,
        }
    }

    /// Rebuild an item from its event history.
    pub fn from_history<'a>(
        id: CatalogItemId,
        history: impl IntoIterator<Item = &'a RegistryEvent>,
    ) -> Self {
        let mut item = Self::empty(id);
        for event in history {
            item.apply(event);
        }
        item
    }

    pub fn entry(&self) -> Option<&CatalogEntry> {
        self.entry.as_ref()
    }

    pub fn is_listed(&self) -> bool {
        self.entry.is_some()
    }

    pub fn planned_event_id(&self) -> Option<PlannedEventId> {
        self.entry.as_ref().map(|e| e.planned_event_id)
    }

    pub fn target_quantity(&self) -> u32 {
        self.entry.as_ref().map(|e| e.target_quantity.get()).unwrap_or(0)
    }

    pub fn claimed_quantity(&self) -> u32 {
        self.claimed
    }

    pub fn available(&self) -> u32 {
        self.target_quantity().saturating_sub(self.claimed)
    }

    pub fn availability(&self) -> ItemAvailability {
        ItemAvailability {
            item_id: self.id,
            target_quantity: self.target_quantity(),
            claimed_quantity: self.claimed,
            available: self.available(),
            active_claims: self.claims.len(),
        }
    }

    pub fn summary(&self) -> Option<ItemSummary> {
        self.entry.clone().map(|entry| ItemSummary {
            entry,
            availability: self.availability(),
        })
    }

    /// Active claims in acceptance order.
    pub fn active_claims(&self) -> &[Claim] {
        &self.claims
    }

    pub fn active_claim(&self, claim_id: ClaimId) -> Option<&Claim> {
        self.claims.iter().find(|c| c.id == claim_id)
    }

    /// The active claim previously accepted under `request_key`, if any.
    pub fn claim_with_request_key(&self, request_key: &str) -> Option<&Claim> {
        self.claims
            .iter()
            .find(|c| c.request_key.as_deref() == Some(request_key))
    }
}

impl AggregateRoot for CatalogItem {
    type Id = CatalogItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: ListItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListItem {
    pub planned_event_id: PlannedEventId,
    pub item_id: CatalogItemId,
    pub name: String,
    pub description: Option<String>,
    pub price_cents: Option<u64>,
    pub link: Option<String>,
    pub target_quantity: Quantity,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetTargetQuantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetTargetQuantity {
    pub planned_event_id: PlannedEventId,
    pub item_id: CatalogItemId,
    pub target_quantity: Quantity,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ClaimQuantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimQuantity {
    pub planned_event_id: PlannedEventId,
    pub item_id: CatalogItemId,
    pub claim_id: ClaimId,
    pub claimant_id: ClaimantId,
    pub quantity: Quantity,
    pub contact_info: Option<String>,
    pub message: Option<String>,
    pub request_key: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReleaseClaim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseClaim {
    pub planned_event_id: PlannedEventId,
    pub item_id: CatalogItemId,
    pub claim_id: ClaimId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistryCommand {
    ListItem(ListItem),
    SetTargetQuantity(SetTargetQuantity),
    ClaimQuantity(ClaimQuantity),
    ReleaseClaim(ReleaseClaim),
}

/// Event: ItemListed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemListed {
    pub entry: CatalogEntry,
}

/// Event: TargetQuantityChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetQuantityChanged {
    pub planned_event_id: PlannedEventId,
    pub item_id: CatalogItemId,
    pub previous: Quantity,
    pub target_quantity: Quantity,
    pub occurred_at: DateTime<Utc>,
    pub availability: ItemAvailability,
}

/// Event: ClaimAccepted.
///
/// Every event after the listing carries the item's figures as they stand
/// after the mutation, so consumers can apply the latest one they see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimAccepted {
    pub claim: Claim,
    pub availability: ItemAvailability,
}

/// Event: ClaimReleased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimReleased {
    pub planned_event_id: PlannedEventId,
    pub item_id: CatalogItemId,
    pub claim_id: ClaimId,
    pub quantity: Quantity,
    pub released_at: DateTime<Utc>,
    pub availability: ItemAvailability,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistryEvent {
    ItemListed(ItemListed),
    TargetQuantityChanged(TargetQuantityChanged),
    ClaimAccepted(ClaimAccepted),
    ClaimReleased(ClaimReleased),
}

impl RegistryEvent {
    pub fn planned_event_id(&self) -> PlannedEventId {
        match self {
            RegistryEvent::ItemListed(e) => e.entry.planned_event_id,
            RegistryEvent::TargetQuantityChanged(e) => e.planned_event_id,
            RegistryEvent::ClaimAccepted(e) => e.claim.planned_event_id,
            RegistryEvent::ClaimReleased(e) => e.planned_event_id,
        }
    }

    pub fn item_id(&self) -> CatalogItemId {
        match self {
            RegistryEvent::ItemListed(e) => e.entry.item_id,
            RegistryEvent::TargetQuantityChanged(e) => e.item_id,
            RegistryEvent::ClaimAccepted(e) => e.claim.item_id,
            RegistryEvent::ClaimReleased(e) => e.item_id,
        }
    }
}

impl Event for RegistryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RegistryEvent::ItemListed(_) => "registry.item.listed",
            RegistryEvent::TargetQuantityChanged(_) => "registry.item.target_changed",
            RegistryEvent::ClaimAccepted(_) => "registry.claim.accepted",
            RegistryEvent::ClaimReleased(_) => "registry.claim.released",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            RegistryEvent::ItemListed(e) => e.entry.listed_at,
            RegistryEvent::TargetQuantityChanged(e) => e.occurred_at,
            RegistryEvent::ClaimAccepted(e) => e.claim.created_at,
            RegistryEvent::ClaimReleased(e) => e.released_at,
        }
    }
}

impl Aggregate for CatalogItem {
    type Command = RegistryCommand;
    type Event = RegistryEvent;
    type Error = ReservationError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            RegistryEvent::ItemListed(e) => {
                self.id = e.entry.item_id;
                self.entry = Some(e.entry.clone());
                self.claims.clear();
                self.claimed = 0;
            }
            RegistryEvent::TargetQuantityChanged(e) => {
                if let Some(entry) = self.entry.as_mut() {
                    entry.target_quantity = e.target_quantity;
                }
            }
            RegistryEvent::ClaimAccepted(e) => {
                self.claimed += e.claim.quantity.get();
                self.claims.push(e.claim.clone());
            }
            RegistryEvent::ClaimReleased(e) => {
                if let Some(pos) = self.claims.iter().position(|c| c.id == e.claim_id) {
                    let claim = self.claims.remove(pos);
                    self.claimed = self.claimed.saturating_sub(claim.quantity.get());
                }
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            RegistryCommand::ListItem(cmd) => self.handle_list(cmd),
            RegistryCommand::SetTargetQuantity(cmd) => self.handle_set_target(cmd),
            RegistryCommand::ClaimQuantity(cmd) => self.handle_claim(cmd),
            RegistryCommand::ReleaseClaim(cmd) => self.handle_release(cmd),
        }
    }
}

impl CatalogItem {
    /// Items are only visible inside the planned event they were listed under.
    fn ensure_scope(
        &self,
        planned_event_id: PlannedEventId,
        item_id: CatalogItemId,
    ) -> Result<&CatalogEntry, ReservationError> {
        match &self.entry {
            Some(entry) if entry.planned_event_id == planned_event_id && self.id == item_id => Ok(entry),
            _ => Err(ReservationError::ItemNotFound),
        }
    }

    fn handle_list(&self, cmd: &ListItem) -> Result<Vec<RegistryEvent>, ReservationError> {
        if self.is_listed() {
            return Err(ReservationError::ItemExists);
        }
        let name = cmd.name.trim();
        if name.is_empty() {
            return Err(ReservationError::validation("name cannot be empty"));
        }
        Ok(vec![RegistryEvent::ItemListed(ItemListed {
            entry: CatalogEntry {
                item_id: cmd.item_id,
                planned_event_id: cmd.planned_event_id,
                name: name.to_string(),
                description: non_blank(&cmd.description),
                price_cents: cmd.price_cents,
                link: non_blank(&cmd.link),
                target_quantity: cmd.target_quantity,
                listed_at: cmd.occurred_at,
            },
        })])
    }

    fn handle_set_target(&self, cmd: &SetTargetQuantity) -> Result<Vec<RegistryEvent>, ReservationError> {
        let entry = self.ensure_scope(cmd.planned_event_id, cmd.item_id)?;

        if entry.target_quantity == cmd.target_quantity {
            return Ok(vec![]);
        }
        if !self.claims.is_empty() {
            return Err(ReservationError::TargetLocked { claimed: self.claimed });
        }

        Ok(vec![RegistryEvent::TargetQuantityChanged(TargetQuantityChanged {
            planned_event_id: cmd.planned_event_id,
            item_id: cmd.item_id,
            previous: entry.target_quantity,
            target_quantity: cmd.target_quantity,
            occurred_at: cmd.occurred_at,
            availability: ItemAvailability {
                item_id: self.id,
                target_quantity: cmd.target_quantity.get(),
                claimed_quantity: 0,
                available: cmd.target_quantity.get(),
                active_claims: 0,
            },
        })])
    }

    fn handle_claim(&self, cmd: &ClaimQuantity) -> Result<Vec<RegistryEvent>, ReservationError> {
        let entry = self.ensure_scope(cmd.planned_event_id, cmd.item_id)?;

        // Same request key while the earlier claim is active: nothing to do.
        if let Some(key) = cmd.request_key.as_deref() {
            if self.claim_with_request_key(key).is_some() {
                return Ok(vec![]);
            }
        }

        if cmd.quantity > entry.target_quantity {
            return Err(ReservationError::invalid_quantity(format!(
                "quantity {} exceeds the item's target of {}",
                cmd.quantity, entry.target_quantity
            )));
        }

        let available = self.available();
        if cmd.quantity.get() > available {
            return Err(ReservationError::Oversubscribed { available });
        }

        if self.active_claim(cmd.claim_id).is_some() {
            return Err(ReservationError::validation("claim id already in use"));
        }

        let claim = Claim::pending(
            cmd.claim_id,
            cmd.planned_event_id,
            cmd.item_id,
            cmd.claimant_id,
            cmd.quantity,
            non_blank(&cmd.contact_info),
            non_blank(&cmd.message),
            cmd.request_key.clone(),
            cmd.occurred_at,
        )
        .activate()?;

        Ok(vec![RegistryEvent::ClaimAccepted(ClaimAccepted {
            claim,
            availability: ItemAvailability {
                item_id: self.id,
                target_quantity: entry.target_quantity.get(),
                claimed_quantity: self.claimed + cmd.quantity.get(),
                available: available - cmd.quantity.get(),
                active_claims: self.claims.len() + 1,
            },
        })])
    }

    fn handle_release(&self, cmd: &ReleaseClaim) -> Result<Vec<RegistryEvent>, ReservationError> {
        self.ensure_scope(cmd.planned_event_id, cmd.item_id)
            .map_err(|_| ReservationError::ClaimNotFound)?;

        let claim = self
            .active_claim(cmd.claim_id)
            .ok_or(ReservationError::ClaimNotFound)?;

        Ok(vec![RegistryEvent::ClaimReleased(ClaimReleased {
            planned_event_id: cmd.planned_event_id,
            item_id: cmd.item_id,
            claim_id: claim.id,
            quantity: claim.quantity,
            released_at: cmd.occurred_at,
            availability: ItemAvailability {
                item_id: self.id,
                target_quantity: self.target_quantity(),
                claimed_quantity: self.claimed - claim.quantity.get(),
                available: self.available() + claim.quantity.get(),
                active_claims: self.claims.len() - 1,
            },
        })])
    }
}

/// Trimmed text, or `None` when nothing but whitespace was given.
pub fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn listed(target: u32) -> (CatalogItem, PlannedEventId) {
        let planned_event_id = PlannedEventId::new();
        let item_id = CatalogItemId::new();
        let mut item = CatalogItem::empty(item_id);
        item.execute(&RegistryCommand::ListItem(ListItem {
            planned_event_id,
            item_id,
            name: "Espresso machine".to_string(),
            description: None,
            price_cents: Some(24_900),
            link: None,
            target_quantity: Quantity::new(target).unwrap(),
            occurred_at: Utc::now(),
        }))
        .unwrap();
        (item, planned_event_id)
    }

    fn claim_cmd(item: &CatalogItem, planned_event_id: PlannedEventId, quantity: u32) -> RegistryCommand {
        RegistryCommand::ClaimQuantity(ClaimQuantity {
            planned_event_id,
            item_id: *item.id(),
            claim_id: ClaimId::new(),
            claimant_id: ClaimantId::new(),
            quantity: Quantity::new(quantity).unwrap(),
            contact_info: None,
            message: None,
            request_key: None,
            occurred_at: Utc::now(),
        })
    }

    fn release_cmd(item: &CatalogItem, planned_event_id: PlannedEventId, claim_id: ClaimId) -> RegistryCommand {
        RegistryCommand::ReleaseClaim(ReleaseClaim {
            planned_event_id,
            item_id: *item.id(),
            claim_id,
            occurred_at: Utc::now(),
        })
    }

    fn accepted_claim(events: &[RegistryEvent]) -> Claim {
        match &events[0] {
            RegistryEvent::ClaimAccepted(e) => e.claim.clone(),
            other => panic!("expected ClaimAccepted, got {other:?}"),
        }
    }

    #[test]
    fn claiming_the_full_target_leaves_nothing_available() {
        let (mut item, pe) = listed(3);

        let events = item.execute(&claim_cmd(&item, pe, 3)).unwrap();
        assert!(accepted_claim(&events).is_active());
        assert_eq!(item.available(), 0);

        let err = item.execute(&claim_cmd(&item, pe, 1)).unwrap_err();
        assert_eq!(err, ReservationError::Oversubscribed { available: 0 });
    }

    #[test]
    fn oversubscription_reports_remaining_and_changes_nothing() {
        let (mut item, pe) = listed(3);
        item.execute(&claim_cmd(&item, pe, 2)).unwrap();
        let before = item.clone();

        let err = item.execute(&claim_cmd(&item, pe, 2)).unwrap_err();

        assert_eq!(err, ReservationError::Oversubscribed { available: 1 });
        assert_eq!(item, before);
    }

    #[test]
    fn quantity_above_target_is_invalid_not_oversubscribed() {
        let (item, pe) = listed(2);
        let err = item.handle(&claim_cmd(&item, pe, 3)).unwrap_err();
        assert!(matches!(err, ReservationError::InvalidQuantity(_)));
    }

    #[test]
    fn release_restores_availability_exactly_once() {
        let (mut item, pe) = listed(4);
        let before = item.available();

        let claim = accepted_claim(&item.execute(&claim_cmd(&item, pe, 3)).unwrap());
        assert_eq!(item.available(), before - 3);

        let events = item.execute(&release_cmd(&item, pe, claim.id)).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(item.available(), before);

        let err = item.execute(&release_cmd(&item, pe, claim.id)).unwrap_err();
        assert_eq!(err, ReservationError::ClaimNotFound);
        assert_eq!(item.available(), before);
    }

    #[test]
    fn events_carry_post_mutation_figures() {
        let (mut item, pe) = listed(5);

        let events = item.execute(&claim_cmd(&item, pe, 2)).unwrap();
        let RegistryEvent::ClaimAccepted(accepted) = &events[0] else {
            panic!("expected ClaimAccepted");
        };
        assert_eq!(accepted.availability, item.availability());

        let events = item
            .execute(&release_cmd(&item, pe, accepted.claim.id))
            .unwrap();
        let RegistryEvent::ClaimReleased(released) = &events[0] else {
            panic!("expected ClaimReleased");
        };
        assert_eq!(released.availability, item.availability());
        assert_eq!(released.availability.available, 5);
    }

    #[test]
    fn releasing_unknown_claim_is_not_found() {
        let (item, pe) = listed(1);
        let err = item.handle(&release_cmd(&item, pe, ClaimId::new())).unwrap_err();
        assert_eq!(err, ReservationError::ClaimNotFound);
    }

    #[test]
    fn other_planned_events_cannot_see_the_item() {
        let (item, _pe) = listed(5);
        let err = item.handle(&claim_cmd(&item, PlannedEventId::new(), 1)).unwrap_err();
        assert_eq!(err, ReservationError::ItemNotFound);
    }

    #[test]
    fn unlisted_item_rejects_claims() {
        let item = CatalogItem::empty(CatalogItemId::new());
        let err = item.handle(&claim_cmd(&item, PlannedEventId::new(), 1)).unwrap_err();
        assert_eq!(err, ReservationError::ItemNotFound);
    }

    #[test]
    fn repeated_request_key_yields_no_new_claim() {
        let (mut item, pe) = listed(5);
        let mut cmd = claim_cmd(&item, pe, 2);
        if let RegistryCommand::ClaimQuantity(c) = &mut cmd {
            c.request_key = Some("guest-42-submit".to_string());
        }

        item.execute(&cmd).unwrap();
        let again = item.execute(&cmd).unwrap();

        assert!(again.is_empty());
        assert_eq!(item.claimed_quantity(), 2);
        assert!(item.claim_with_request_key("guest-42-submit").is_some());
    }

    #[test]
    fn target_is_locked_once_claimed() {
        let (mut item, pe) = listed(2);
        let item_id = *item.id();
        let set_target = |q: u32| {
            RegistryCommand::SetTargetQuantity(SetTargetQuantity {
                planned_event_id: pe,
                item_id,
                target_quantity: Quantity::new(q).unwrap(),
                occurred_at: Utc::now(),
            })
        };
        item.execute(&set_target(6)).unwrap();
        assert_eq!(item.target_quantity(), 6);

        let claim = accepted_claim(&item.execute(&claim_cmd(&item, pe, 1)).unwrap());
        let err = item.execute(&set_target(1)).unwrap_err();
        assert_eq!(err, ReservationError::TargetLocked { claimed: 1 });

        item.execute(&release_cmd(&item, pe, claim.id)).unwrap();
        item.execute(&set_target(1)).unwrap();
        assert_eq!(item.target_quantity(), 1);
    }

    #[test]
    fn listing_requires_a_name_and_happens_once() {
        let (item, pe) = listed(1);
        let relist = RegistryCommand::ListItem(ListItem {
            planned_event_id: pe,
            item_id: *item.id(),
            name: "Again".to_string(),
            description: None,
            price_cents: None,
            link: None,
            target_quantity: Quantity::ONE,
            occurred_at: Utc::now(),
        });
        assert_eq!(item.handle(&relist).unwrap_err(), ReservationError::ItemExists);

        let fresh = CatalogItem::empty(CatalogItemId::new());
        let blank = RegistryCommand::ListItem(ListItem {
            planned_event_id: pe,
            item_id: *fresh.id(),
            name: "   ".to_string(),
            description: None,
            price_cents: None,
            link: None,
            target_quantity: Quantity::ONE,
            occurred_at: Utc::now(),
        });
        assert!(matches!(fresh.handle(&blank), Err(ReservationError::Validation(_))));
    }

    #[test]
    fn history_replay_rebuilds_same_state() {
        let (mut item, pe) = listed(5);
        let listed_events = vec![RegistryEvent::ItemListed(ItemListed {
            entry: item.entry().cloned().unwrap(),
        })];
        let mut history = listed_events;
        history.extend(item.execute(&claim_cmd(&item, pe, 2)).unwrap());
        history.extend(item.execute(&claim_cmd(&item, pe, 1)).unwrap());

        let rebuilt = CatalogItem::from_history(*item.id(), &history);
        assert_eq!(rebuilt, item);
        assert_eq!(rebuilt.version(), 3);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Claim(u32),
        Release(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            3 => (1u32..6).prop_map(Op::Claim),
            1 => (0usize..16).prop_map(Op::Release),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: whatever sequence of claims and releases is applied, the
        /// claimed total equals the sum of active claims and never exceeds target.
        #[test]
        fn claimed_never_exceeds_target(
            target in 1u32..20,
            ops in prop::collection::vec(op(), 1..60)
        ) {
            let (mut item, pe) = listed(target);

            for op in ops {
                let cmd = match op {
                    Op::Claim(q) => claim_cmd(&item, pe, q),
                    Op::Release(idx) => {
                        let claims = item.active_claims();
                        if claims.is_empty() {
                            continue;
                        }
                        let id = claims[idx % claims.len()].id;
                        release_cmd(&item, pe, id)
                    }
                };
                let _ = item.execute(&cmd);

                let sum: u32 = item.active_claims().iter().map(|c| c.quantity.get()).sum();
                prop_assert_eq!(item.claimed_quantity(), sum);
                prop_assert!(item.claimed_quantity() <= target);
                prop_assert_eq!(item.available(), target - item.claimed_quantity());
            }
        }
    }

    #[test]
    fn blank_optional_text_is_dropped() {
        assert_eq!(non_blank(&Some("  bring ice  ".to_string())), Some("bring ice".to_string()));
        assert_eq!(non_blank(&Some(" \t ".to_string())), None);
        assert_eq!(non_blank(&None), None);
    }
}
