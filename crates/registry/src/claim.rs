use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use partyplan_core::{CatalogItemId, ClaimId, ClaimantId, Entity, PlannedEventId};

use crate::error::ReservationError;
use crate::quantity::Quantity;

/// Lifecycle of a claim.
///
/// `Pending -> Active` when the ledger accepts it, `Active -> Released` on
/// release. `Released` is terminal; a guest who changes their mind again
/// creates a new claim.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    Pending,
    Active,
    Released,
}

impl ClaimStatus {
    pub fn can_transition_to(self, next: ClaimStatus) -> bool {
        matches!(
            (self, next),
            (ClaimStatus::Pending, ClaimStatus::Active) | (ClaimStatus::Active, ClaimStatus::Released)
        )
    }

    fn transition(self, next: ClaimStatus) -> Result<ClaimStatus, ReservationError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(ReservationError::IllegalTransition { from: self, to: next })
        }
    }
}

impl core::fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            ClaimStatus::Pending => "pending",
            ClaimStatus::Active => "active",
            ClaimStatus::Released => "released",
        })
    }
}

/// A reservation of `quantity` units of a catalog item by one claimant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub id: ClaimId,
    pub planned_event_id: PlannedEventId,
    pub item_id: CatalogItemId,
    pub claimant_id: ClaimantId,
    pub quantity: Quantity,
    pub contact_info: Option<String>,
    pub message: Option<String>,
    /// Client-supplied idempotency key.
    pub request_key: Option<String>,
    pub status: ClaimStatus,
    pub created_at: DateTime<Utc>,
    pub released_at: Option<DateTime<Utc>>,
}

impl Claim {
    /// A claim that has not yet passed the ledger's capacity check.
    #[allow(clippy::too_many_arguments)]
    pub fn pending(
        id: ClaimId,
        planned_event_id: PlannedEventId,
        item_id: CatalogItemId,
        claimant_id: ClaimantId,
        quantity: Quantity,
        contact_info: Option<String>,
        message: Option<String>,
        request_key: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            planned_event_id,
            item_id,
            claimant_id,
            quantity,
            contact_info,
            message,
            request_key,
            status: ClaimStatus::Pending,
            created_at,
            released_at: None,
        }
    }

    pub fn activate(mut self) -> Result<Self, ReservationError> {
        self.status = self.status.transition(ClaimStatus::Active)?;
        Ok(self)
    }

    pub fn release(mut self, at: DateTime<Utc>) -> Result<Self, ReservationError> {
        self.status = self.status.transition(ClaimStatus::Released)?;
        self.released_at = Some(at);
        Ok(self)
    }

    pub fn is_active(&self) -> bool {
        self.status == ClaimStatus::Active
    }
}

impl Entity for Claim {
    type Id = ClaimId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_claim() -> Claim {
        Claim::pending(
            ClaimId::new(),
            PlannedEventId::new(),
            CatalogItemId::new(),
            ClaimantId::new(),
            Quantity::ONE,
            None,
            None,
            None,
            Utc::now(),
        )
    }

    #[test]
    fn pending_activates_then_releases() {
        let claim = pending_claim().activate().unwrap();
        assert!(claim.is_active());

        let at = Utc::now();
        let released = claim.release(at).unwrap();
        assert_eq!(released.status, ClaimStatus::Released);
        assert_eq!(released.released_at, Some(at));
    }

    #[test]
    fn released_is_terminal() {
        let released = pending_claim().activate().unwrap().release(Utc::now()).unwrap();

        let err = released.clone().activate().unwrap_err();
        assert_eq!(
            err,
            ReservationError::IllegalTransition {
                from: ClaimStatus::Released,
                to: ClaimStatus::Active
            }
        );
        assert!(released.release(Utc::now()).is_err());
    }

    #[test]
    fn pending_cannot_be_released() {
        assert!(pending_claim().release(Utc::now()).is_err());
    }
}
