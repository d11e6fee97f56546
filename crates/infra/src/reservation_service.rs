//! Reservation service: the entry point used by request handlers.
//!
//! ```text
//! ClaimRequest
//!   ↓
//! 1. Validate quantity (positive, fits u32)        -> InvalidQuantity, ledger untouched
//!   ↓
//! 2. Load catalog entry (scoped by planned event)  -> NotFound
//!   ↓
//! 3. Ceiling check against the target              -> InvalidQuantity
//!   ↓
//! 4. Ledger try_claim (atomic, bounded by timeout) -> Active claim | Oversubscribed
//! ```
//!
//! The service performs no check-then-act of its own. Step 3 is a static
//! ceiling; capacity is only ever decided inside the ledger's atomic step.
//!
//! ## Timeouts and retries
//!
//! Every ledger attempt runs under `tokio::time::timeout`. An elapsed timer or
//! a storage fault maps to `StorageUnavailable`. Only that kind is retried,
//! with capped exponential backoff, and a claim is retried only when it
//! carries a request key (otherwise a retry after an unacknowledged commit
//! could double-claim). Business rejections are never retried.

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use partyplan_core::{CatalogItemId, ClaimId, ClaimantId, PlannedEventId};
use partyplan_registry::{
    CatalogEntry, Claim, ClaimQuantity, ItemAvailability, ItemSummary, ListItem, Quantity,
    RejectionKind, ReservationError, SetTargetQuantity,
};

use crate::ledger::{LedgerError, ReservationLedger};

/// Caller-facing claim outcome error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClaimError {
    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("not enough remaining: {available} available")]
    Oversubscribed { available: u32 },

    #[error("not found")]
    NotFound,

    #[error("target quantity is locked while {claimed} unit(s) are claimed")]
    TargetLocked { claimed: u32 },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ClaimError {
    /// Stable machine-readable kind (`"Oversubscribed"`, `"StorageUnavailable"`, ...).
    pub fn kind(&self) -> &'static str {
        match self {
            ClaimError::InvalidQuantity(_) => RejectionKind::InvalidQuantity.as_str(),
            ClaimError::Oversubscribed { .. } => RejectionKind::Oversubscribed.as_str(),
            ClaimError::NotFound => RejectionKind::NotFound.as_str(),
            ClaimError::TargetLocked { .. } => RejectionKind::TargetLocked.as_str(),
            ClaimError::Conflict(_) => RejectionKind::Conflict.as_str(),
            ClaimError::Validation(_) => RejectionKind::Validation.as_str(),
            ClaimError::StorageUnavailable(_) => "StorageUnavailable",
            ClaimError::Internal(_) => "Internal",
        }
    }

    pub fn available(&self) -> Option<u32> {
        match self {
            ClaimError::Oversubscribed { available } => Some(*available),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ClaimError::StorageUnavailable(_))
    }

    pub fn is_rejection(&self) -> bool {
        !matches!(self, ClaimError::StorageUnavailable(_) | ClaimError::Internal(_))
    }
}

impl From<ReservationError> for ClaimError {
    fn from(value: ReservationError) -> Self {
        match value {
            ReservationError::InvalidQuantity(msg) => ClaimError::InvalidQuantity(msg),
            ReservationError::Oversubscribed { available } => ClaimError::Oversubscribed { available },
            ReservationError::ItemNotFound | ReservationError::ClaimNotFound => ClaimError::NotFound,
            ReservationError::TargetLocked { claimed } => ClaimError::TargetLocked { claimed },
            ReservationError::ItemExists => ClaimError::Conflict("catalog item already exists".to_string()),
            ReservationError::IllegalTransition { from, to } => {
                ClaimError::Conflict(format!("claim cannot move from {from} to {to}"))
            }
            ReservationError::Validation(msg) => ClaimError::Validation(msg),
        }
    }
}

impl From<LedgerError> for ClaimError {
    fn from(value: LedgerError) -> Self {
        match value {
            LedgerError::Rejected(rejection) => rejection.into(),
            LedgerError::StorageUnavailable(msg) => ClaimError::StorageUnavailable(msg),
            LedgerError::Corrupted(msg) => ClaimError::Internal(msg),
        }
    }
}

/// Capped exponential backoff for `StorageUnavailable`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (0-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(1_000),
        }
    }
}

/// A guest's request to reserve units of one item.
///
/// `quantity` is the raw requested amount; it is validated before the ledger
/// is consulted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimRequest {
    pub planned_event_id: PlannedEventId,
    pub item_id: CatalogItemId,
    pub claimant_id: ClaimantId,
    pub quantity: i64,
    pub contact_info: Option<String>,
    pub message: Option<String>,
    pub request_key: Option<String>,
}

/// Organizer's request to list an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    pub planned_event_id: PlannedEventId,
    pub name: String,
    pub description: Option<String>,
    pub price_cents: Option<u64>,
    pub link: Option<String>,
    pub target_quantity: i64,
}

pub struct ReservationService<L> {
    ledger: L,
    retry: RetryPolicy,
    attempt_timeout: Duration,
}

impl<L> ReservationService<L>
where
    L: ReservationLedger,
{
    pub fn new(ledger: L, retry: RetryPolicy, attempt_timeout: Duration) -> Self {
        Self {
            ledger,
            retry,
            attempt_timeout,
        }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Submit a claim. At most one outcome is committed per call.
    pub async fn submit_claim(&self, request: ClaimRequest) -> Result<Claim, ClaimError> {
        let quantity = Quantity::try_from(request.quantity).map_err(|e| {
            debug!(
                item_id = %request.item_id,
                quantity = request.quantity,
                "claim rejected before reaching the ledger: {e}"
            );
            ClaimError::from(e)
        })?;

        let entry = self.entry(request.planned_event_id, request.item_id).await?;
        if quantity > entry.target_quantity {
            debug!(
                item_id = %request.item_id,
                %quantity,
                target_quantity = %entry.target_quantity,
                "claim exceeds target"
            );
            return Err(ClaimError::InvalidQuantity(format!(
                "quantity {quantity} exceeds the item's target of {}",
                entry.target_quantity
            )));
        }

        let retry_allowed = request.request_key.is_some();
        let cmd = ClaimQuantity {
            planned_event_id: request.planned_event_id,
            item_id: request.item_id,
            claim_id: ClaimId::new(),
            claimant_id: request.claimant_id,
            quantity,
            contact_info: request.contact_info,
            message: request.message,
            request_key: request.request_key,
            occurred_at: Utc::now(),
        };

        let ledger = &self.ledger;
        let outcome = self
            .attempt("try_claim", retry_allowed, || ledger.try_claim(cmd.clone()))
            .await;

        match outcome {
            Ok(committed) => {
                if committed.is_unchanged() {
                    info!(
                        claim_id = %committed.value.id,
                        item_id = %committed.value.item_id,
                        "claim replayed by request key"
                    );
                } else {
                    info!(
                        claim_id = %committed.value.id,
                        item_id = %committed.value.item_id,
                        quantity = committed.value.quantity.get(),
                        "claim accepted"
                    );
                }
                Ok(committed.value)
            }
            Err(err) => {
                if err.is_rejection() {
                    debug!(item_id = %cmd.item_id, kind = err.kind(), "claim rejected: {err}");
                } else {
                    warn!(item_id = %cmd.item_id, kind = err.kind(), "claim failed: {err}");
                }
                Err(err)
            }
        }
    }

    /// Release a claim. A second release of the same claim is `NotFound`.
    pub async fn release_claim(
        &self,
        planned_event_id: PlannedEventId,
        claim_id: ClaimId,
    ) -> Result<Claim, ClaimError> {
        let released_at = Utc::now();
        let ledger = &self.ledger;

        // Releasing is safe to repeat: a retry after an unacknowledged
        // commit resolves to NotFound and capacity is restored exactly once.
        let committed = self
            .attempt("release", true, || {
                ledger.release(planned_event_id, claim_id, released_at)
            })
            .await?;

        info!(
            claim_id = %claim_id,
            item_id = %committed.value.item_id,
            quantity = committed.value.quantity.get(),
            "claim released"
        );
        Ok(committed.value)
    }

    pub async fn list_item(&self, item: NewItem) -> Result<CatalogEntry, ClaimError> {
        let target_quantity = Quantity::try_from(item.target_quantity)?;
        let cmd = ListItem {
            planned_event_id: item.planned_event_id,
            item_id: CatalogItemId::new(),
            name: item.name,
            description: item.description,
            price_cents: item.price_cents,
            link: item.link,
            target_quantity,
            occurred_at: Utc::now(),
        };

        let ledger = &self.ledger;
        // Fresh item ids make a repeated insert a duplicate listing, not a replay.
        let committed = self
            .attempt("list_item", false, || ledger.list_item(cmd.clone()))
            .await?;
        info!(item_id = %committed.value.item_id, name = %committed.value.name, "catalog item listed");
        Ok(committed.value)
    }

    pub async fn set_target_quantity(
        &self,
        planned_event_id: PlannedEventId,
        item_id: CatalogItemId,
        target_quantity: i64,
    ) -> Result<ItemAvailability, ClaimError> {
        let cmd = SetTargetQuantity {
            planned_event_id,
            item_id,
            target_quantity: Quantity::try_from(target_quantity)?,
            occurred_at: Utc::now(),
        };

        let ledger = &self.ledger;
        let committed = self
            .attempt("set_target_quantity", true, || ledger.set_target_quantity(cmd.clone()))
            .await?;
        Ok(committed.value)
    }

    pub async fn entry(
        &self,
        planned_event_id: PlannedEventId,
        item_id: CatalogItemId,
    ) -> Result<CatalogEntry, ClaimError> {
        let ledger = &self.ledger;
        self.attempt("entry", true, || ledger.entry(planned_event_id, item_id))
            .await
    }

    pub async fn available_quantity(
        &self,
        planned_event_id: PlannedEventId,
        item_id: CatalogItemId,
    ) -> Result<ItemAvailability, ClaimError> {
        let ledger = &self.ledger;
        self.attempt("availability", true, || {
            ledger.availability(planned_event_id, item_id)
        })
        .await
    }

    pub async fn active_claims(
        &self,
        planned_event_id: PlannedEventId,
        item_id: CatalogItemId,
    ) -> Result<Vec<Claim>, ClaimError> {
        let ledger = &self.ledger;
        self.attempt("active_claims", true, || {
            ledger.active_claims(planned_event_id, item_id)
        })
        .await
    }

    pub async fn list_items(&self, planned_event_id: PlannedEventId) -> Result<Vec<ItemSummary>, ClaimError> {
        let ledger = &self.ledger;
        self.attempt("list_items", true, || ledger.list_items(planned_event_id))
            .await
    }

    /// Run one ledger operation under the attempt timeout, retrying
    /// `StorageUnavailable` when `retry_allowed`.
    async fn attempt<T, F, Fut>(
        &self,
        operation: &'static str,
        retry_allowed: bool,
        mut call: F,
    ) -> Result<T, ClaimError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LedgerError>>,
    {
        let max_attempts = if retry_allowed {
            self.retry.max_attempts.max(1)
        } else {
            1
        };

        let mut attempt = 1;
        loop {
            let outcome = match tokio::time::timeout(self.attempt_timeout, call()).await {
                Ok(result) => result.map_err(ClaimError::from),
                Err(_) => Err(ClaimError::StorageUnavailable(format!(
                    "{operation} timed out after {}ms",
                    self.attempt_timeout.as_millis()
                ))),
            };

            match outcome {
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    let delay = self.retry.delay_for(attempt - 1);
                    warn!(
                        operation,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "storage unavailable, retrying: {err}"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}
