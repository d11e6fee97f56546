//! Postgres-backed reservation ledger.
//!
//! ## Atomic claim step
//!
//! `try_claim` runs inside one transaction:
//!
//! 1. lock the item row (`SELECT ... FOR UPDATE`)
//! 2. replay check: an active claim with the same `request_key` is returned unchanged
//! 3. conditional increment:
//!    `UPDATE catalog_items SET claimed_quantity = claimed_quantity + $n
//!     WHERE ... AND claimed_quantity + $n <= target_quantity`
//! 4. insert the claim row
//! 5. commit
//!
//! Concurrent claims on one item serialize on the row lock. The replay check
//! and the capacity check both run while it is held, so a retry whose first
//! attempt committed in the meantime sees that claim instead of a full item.
//! If zero rows are updated the claim is rejected and nothing is written. If
//! the caller is dropped before commit the transaction rolls back.
//!
//! ## Error mapping
//!
//! | SQLx error | Code | LedgerError |
//! |------------|------|-------------|
//! | Database (unique violation) | `23505` | handled per operation (`ItemExists` / request-key replay) |
//! | Database (check violation) | `23514` | `Corrupted` |
//! | Database (other) | any | `StorageUnavailable` |
//! | PoolClosed / PoolTimedOut / Io / Tls | n/a | `StorageUnavailable` |
//! | Decode / ColumnDecode | n/a | `Corrupted` |

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgConnection, PgPool, Postgres, Row, Transaction};
use std::time::Duration;
use tracing::{debug, instrument};
use uuid::Uuid;

use partyplan_core::{Aggregate, CatalogItemId, ClaimId, ClaimantId, PlannedEventId};
use partyplan_registry::{
    CatalogEntry, CatalogItem, Claim, ClaimAccepted, ClaimQuantity, ClaimReleased, ClaimStatus,
    ItemAvailability, ItemSummary, ListItem, Quantity, RegistryCommand, RegistryEvent, ReservationError,
    SetTargetQuantity, TargetQuantityChanged, non_blank,
};

use super::{envelope, Committed, LedgerError, ReservationLedger};

const MIGRATION: &str = include_str!("../../migrations/0001_registry.sql");

const CLAIM_COLUMNS: &str = "claim_id, planned_event_id, item_id, claimant_id, quantity, \
     contact_info, message, request_key, created_at, released_at";

const ENTRY_COLUMNS: &str = "item_id, planned_event_id, name, description, price_cents, link, \
     target_quantity, listed_at";

/// Reservation ledger persisted in Postgres.
///
/// Every query filters on `planned_event_id`, so an id from another planned
/// event behaves exactly like an unknown id.
#[derive(Debug, Clone)]
pub struct PostgresLedger {
    pool: PgPool,
}

impl PostgresLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool against `database_url`.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, LedgerError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Apply the ledger schema. Idempotent.
    pub async fn migrate(&self) -> Result<(), LedgerError> {
        sqlx::raw_sql(MIGRATION)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>, LedgerError> {
        self.pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))
    }
}

async fn active_claim_by_key(
    conn: &mut PgConnection,
    planned_event_id: PlannedEventId,
    item_id: CatalogItemId,
    request_key: &str,
) -> Result<Option<Claim>, LedgerError> {
    let row = sqlx::query(&format!(
        "SELECT {CLAIM_COLUMNS} FROM claims \
         WHERE planned_event_id = $1 AND item_id = $2 AND request_key = $3 AND released_at IS NULL"
    ))
    .bind(planned_event_id.as_uuid())
    .bind(item_id.as_uuid())
    .bind(request_key)
    .fetch_optional(conn)
    .await
    .map_err(|e| map_sqlx_error("active_claim_by_key", e))?;

    row.as_ref().map(claim_from_row).transpose()
}

#[async_trait]
impl ReservationLedger for PostgresLedger {
    #[instrument(skip(self, cmd), fields(planned_event_id = %cmd.planned_event_id, item_id = %cmd.item_id))]
    async fn list_item(&self, cmd: ListItem) -> Result<Committed<CatalogEntry>, LedgerError> {
        let events = CatalogItem::empty(cmd.item_id).handle(&RegistryCommand::ListItem(cmd))?;
        let entry = match events.first() {
            Some(RegistryEvent::ItemListed(listed)) => listed.entry.clone(),
            _ => return Err(LedgerError::Corrupted("listing produced no entry".to_string())),
        };
        let price_cents = entry
            .price_cents
            .map(i64::try_from)
            .transpose()
            .map_err(|_| ReservationError::validation("price is too large"))?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO catalog_items (
                item_id, planned_event_id, name, description, price_cents, link,
                target_quantity, claimed_quantity, version, listed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, 0, 1, $8)
            ON CONFLICT (item_id) DO NOTHING
            RETURNING version
            "#,
        )
        .bind(entry.item_id.as_uuid())
        .bind(entry.planned_event_id.as_uuid())
        .bind(&entry.name)
        .bind(&entry.description)
        .bind(price_cents)
        .bind(&entry.link)
        .bind(i64::from(entry.target_quantity.get()))
        .bind(entry.listed_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_item", e))?;

        if inserted.is_none() {
            return Err(ReservationError::ItemExists.into());
        }

        let envelopes = events.into_iter().map(|e| envelope(e, 1)).collect();
        Ok(Committed::new(entry, envelopes))
    }

    #[instrument(skip(self, cmd), fields(planned_event_id = %cmd.planned_event_id, item_id = %cmd.item_id))]
    async fn set_target_quantity(
        &self,
        cmd: SetTargetQuantity,
    ) -> Result<Committed<ItemAvailability>, LedgerError> {
        let mut tx = self.begin().await?;

        let row = sqlx::query(
            r#"
            SELECT target_quantity, claimed_quantity
            FROM catalog_items
            WHERE planned_event_id = $1 AND item_id = $2
            FOR UPDATE
            "#,
        )
        .bind(cmd.planned_event_id.as_uuid())
        .bind(cmd.item_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("set_target_quantity", e))?
        .ok_or(LedgerError::Rejected(ReservationError::ItemNotFound))?;

        let previous = quantity_column(&row, "target_quantity")?;
        let claimed = u32_column(&row, "claimed_quantity")?;

        if previous == cmd.target_quantity {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            let availability = self.availability(cmd.planned_event_id, cmd.item_id).await?;
            return Ok(Committed::unchanged(availability));
        }
        if claimed > 0 {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(ReservationError::TargetLocked { claimed }.into());
        }

        let row = sqlx::query(
            r#"
            UPDATE catalog_items
            SET target_quantity = $3, version = version + 1
            WHERE planned_event_id = $1 AND item_id = $2
            RETURNING version
            "#,
        )
        .bind(cmd.planned_event_id.as_uuid())
        .bind(cmd.item_id.as_uuid())
        .bind(i64::from(cmd.target_quantity.get()))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("set_target_quantity", e))?;
        let version = version_column(&row)?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))?;

        let availability = ItemAvailability {
            item_id: cmd.item_id,
            target_quantity: cmd.target_quantity.get(),
            claimed_quantity: 0,
            available: cmd.target_quantity.get(),
            active_claims: 0,
        };
        let event = RegistryEvent::TargetQuantityChanged(TargetQuantityChanged {
            planned_event_id: cmd.planned_event_id,
            item_id: cmd.item_id,
            previous,
            target_quantity: cmd.target_quantity,
            occurred_at: cmd.occurred_at,
            availability,
        });
        Ok(Committed::new(availability, vec![envelope(event, version)]))
    }

    #[instrument(
        skip(self, cmd),
        fields(
            planned_event_id = %cmd.planned_event_id,
            item_id = %cmd.item_id,
            claim_id = %cmd.claim_id,
            quantity = cmd.quantity.get()
        )
    )]
    async fn try_claim(&self, cmd: ClaimQuantity) -> Result<Committed<Claim>, LedgerError> {
        let quantity = i64::from(cmd.quantity.get());
        let mut tx = self.begin().await?;

        let locked = sqlx::query(
            r#"
            SELECT target_quantity, claimed_quantity
            FROM catalog_items
            WHERE planned_event_id = $1 AND item_id = $2
            FOR UPDATE
            "#,
        )
        .bind(cmd.planned_event_id.as_uuid())
        .bind(cmd.item_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("try_claim", e))?;

        let Some(locked) = locked else {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(ReservationError::ItemNotFound.into());
        };

        if let Some(key) = cmd.request_key.as_deref() {
            if let Some(existing) =
                active_claim_by_key(&mut tx, cmd.planned_event_id, cmd.item_id, key).await?
            {
                tx.rollback()
                    .await
                    .map_err(|e| map_sqlx_error("rollback", e))?;
                debug!("request key already accepted; returning existing claim");
                return Ok(Committed::unchanged(existing));
            }
        }

        let updated = sqlx::query(
            r#"
            UPDATE catalog_items
            SET claimed_quantity = claimed_quantity + $3,
                active_claims = active_claims + 1,
                version = version + 1
            WHERE planned_event_id = $1
              AND item_id = $2
              AND claimed_quantity + $3 <= target_quantity
            RETURNING target_quantity, claimed_quantity, active_claims, version
            "#,
        )
        .bind(cmd.planned_event_id.as_uuid())
        .bind(cmd.item_id.as_uuid())
        .bind(quantity)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("try_claim", e))?;

        let Some(updated) = updated else {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(reject_claim(&cmd, &locked));
        };

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

        let inserted = sqlx::query(
            r#"
            INSERT INTO claims (
                claim_id, planned_event_id, item_id, claimant_id, quantity,
                contact_info, message, request_key, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(claim.id.as_uuid())
        .bind(claim.planned_event_id.as_uuid())
        .bind(claim.item_id.as_uuid())
        .bind(claim.claimant_id.as_uuid())
        .bind(quantity)
        .bind(&claim.contact_info)
        .bind(&claim.message)
        .bind(&claim.request_key)
        .bind(claim.created_at)
        .execute(&mut *tx)
        .await;

        if let Err(err) = inserted {
            if !is_unique_violation(&err) {
                return Err(map_sqlx_error("try_claim", err));
            }
            // Keys cannot collide under the row lock, so this is a reused claim id.
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(ReservationError::validation("claim id already in use").into());
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))?;

        let availability = availability_from_row(cmd.item_id, &updated)?;
        let version = version_column(&updated)?;

        let event = RegistryEvent::ClaimAccepted(ClaimAccepted {
            claim: claim.clone(),
            availability,
        });
        Ok(Committed::new(claim, vec![envelope(event, version)]))
    }

    #[instrument(skip(self), fields(planned_event_id = %planned_event_id, claim_id = %claim_id))]
    async fn release(
        &self,
        planned_event_id: PlannedEventId,
        claim_id: ClaimId,
        released_at: DateTime<Utc>,
    ) -> Result<Committed<Claim>, LedgerError> {
        let mut tx = self.begin().await?;

        // The row lock on the claim serializes concurrent releases; the loser
        // re-checks `released_at IS NULL` and matches nothing.
        let row = sqlx::query(&format!(
            "UPDATE claims SET released_at = $3 \
             WHERE planned_event_id = $1 AND claim_id = $2 AND released_at IS NULL \
             RETURNING {CLAIM_COLUMNS}"
        ))
        .bind(planned_event_id.as_uuid())
        .bind(claim_id.as_uuid())
        .bind(released_at)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("release", e))?;

        let Some(row) = row else {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(ReservationError::ClaimNotFound.into());
        };
        let claim = claim_from_row(&row)?;

        let item = sqlx::query(
            r#"
            UPDATE catalog_items
            SET claimed_quantity = claimed_quantity - $3,
                active_claims = active_claims - 1,
                version = version + 1
            WHERE planned_event_id = $1 AND item_id = $2
            RETURNING target_quantity, claimed_quantity, active_claims, version
            "#,
        )
        .bind(planned_event_id.as_uuid())
        .bind(claim.item_id.as_uuid())
        .bind(i64::from(claim.quantity.get()))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("release", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))?;

        let availability = availability_from_row(claim.item_id, &item)?;
        let version = version_column(&item)?;

        let event = RegistryEvent::ClaimReleased(ClaimReleased {
            planned_event_id,
            item_id: claim.item_id,
            claim_id,
            quantity: claim.quantity,
            released_at,
            availability,
        });
        Ok(Committed::new(claim, vec![envelope(event, version)]))
    }

    #[instrument(skip(self), fields(planned_event_id = %planned_event_id, item_id = %item_id))]
    async fn entry(
        &self,
        planned_event_id: PlannedEventId,
        item_id: CatalogItemId,
    ) -> Result<CatalogEntry, LedgerError> {
        let row = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM catalog_items WHERE planned_event_id = $1 AND item_id = $2"
        ))
        .bind(planned_event_id.as_uuid())
        .bind(item_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("entry", e))?
        .ok_or(LedgerError::Rejected(ReservationError::ItemNotFound))?;

        entry_from_row(&row)
    }

    #[instrument(skip(self), fields(planned_event_id = %planned_event_id, item_id = %item_id))]
    async fn availability(
        &self,
        planned_event_id: PlannedEventId,
        item_id: CatalogItemId,
    ) -> Result<ItemAvailability, LedgerError> {
        let row = sqlx::query(
            r#"
            SELECT target_quantity, claimed_quantity, active_claims
            FROM catalog_items
            WHERE planned_event_id = $1 AND item_id = $2
            "#,
        )
        .bind(planned_event_id.as_uuid())
        .bind(item_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("availability", e))?
        .ok_or(LedgerError::Rejected(ReservationError::ItemNotFound))?;

        availability_from_row(item_id, &row)
    }

    #[instrument(skip(self), fields(planned_event_id = %planned_event_id, item_id = %item_id))]
    async fn active_claims(
        &self,
        planned_event_id: PlannedEventId,
        item_id: CatalogItemId,
    ) -> Result<Vec<Claim>, LedgerError> {
        // Existence check keeps unknown items distinct from items with no claims.
        self.entry(planned_event_id, item_id).await?;

        let rows = sqlx::query(&format!(
            "SELECT {CLAIM_COLUMNS} FROM claims \
             WHERE planned_event_id = $1 AND item_id = $2 AND released_at IS NULL \
             ORDER BY created_at ASC, claim_id ASC"
        ))
        .bind(planned_event_id.as_uuid())
        .bind(item_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("active_claims", e))?;

        rows.iter().map(claim_from_row).collect()
    }

    #[instrument(skip(self), fields(planned_event_id = %planned_event_id))]
    async fn list_items(&self, planned_event_id: PlannedEventId) -> Result<Vec<ItemSummary>, LedgerError> {
        let rows = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS}, claimed_quantity, active_claims \
             FROM catalog_items \
             WHERE planned_event_id = $1 \
             ORDER BY listed_at ASC, item_id ASC"
        ))
        .bind(planned_event_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_items", e))?;

        rows.iter()
            .map(|row| {
                let entry = entry_from_row(row)?;
                Ok(ItemSummary {
                    availability: availability_from_row(entry.item_id, row)?,
                    entry,
                })
            })
            .collect()
    }
}

/// Explain why the conditional increment matched no row, from the figures
/// read under the row lock.
fn reject_claim(cmd: &ClaimQuantity, locked: &PgRow) -> LedgerError {
    let figures = u32_column(locked, "target_quantity")
        .and_then(|target| Ok((target, u32_column(locked, "claimed_quantity")?)));
    match figures {
        Ok((target, _)) if cmd.quantity.get() > target => ReservationError::invalid_quantity(format!(
            "quantity {} exceeds the item's target of {target}",
            cmd.quantity
        ))
        .into(),
        Ok((target, claimed)) => ReservationError::Oversubscribed {
            available: target.saturating_sub(claimed),
        }
        .into(),
        Err(err) => err,
    }
}

fn claim_from_row(row: &PgRow) -> Result<Claim, LedgerError> {
    let get_uuid = |column: &str| -> Result<Uuid, LedgerError> {
        row.try_get(column)
            .map_err(|e| map_sqlx_error("decode_claim", e))
    };
    let get_text = |column: &str| -> Result<Option<String>, LedgerError> {
        row.try_get(column)
            .map_err(|e| map_sqlx_error("decode_claim", e))
    };

    let released_at: Option<DateTime<Utc>> = row
        .try_get("released_at")
        .map_err(|e| map_sqlx_error("decode_claim", e))?;

    Ok(Claim {
        id: ClaimId::from_uuid(get_uuid("claim_id")?),
        planned_event_id: PlannedEventId::from_uuid(get_uuid("planned_event_id")?),
        item_id: CatalogItemId::from_uuid(get_uuid("item_id")?),
        claimant_id: ClaimantId::from_uuid(get_uuid("claimant_id")?),
        quantity: quantity_column(row, "quantity")?,
        contact_info: get_text("contact_info")?,
        message: get_text("message")?,
        request_key: get_text("request_key")?,
        status: if released_at.is_some() {
            ClaimStatus::Released
        } else {
            ClaimStatus::Active
        },
        created_at: row
            .try_get("created_at")
            .map_err(|e| map_sqlx_error("decode_claim", e))?,
        released_at,
    })
}

fn entry_from_row(row: &PgRow) -> Result<CatalogEntry, LedgerError> {
    let decode = |e| map_sqlx_error("decode_entry", e);

    let price_cents: Option<i64> = row.try_get("price_cents").map_err(decode)?;
    Ok(CatalogEntry {
        item_id: CatalogItemId::from_uuid(row.try_get("item_id").map_err(decode)?),
        planned_event_id: PlannedEventId::from_uuid(row.try_get("planned_event_id").map_err(decode)?),
        name: row.try_get("name").map_err(decode)?,
        description: row.try_get("description").map_err(decode)?,
        price_cents: price_cents
            .map(u64::try_from)
            .transpose()
            .map_err(|_| LedgerError::Corrupted("negative price".to_string()))?,
        link: row.try_get("link").map_err(decode)?,
        target_quantity: quantity_column(row, "target_quantity")?,
        listed_at: row.try_get("listed_at").map_err(decode)?,
    })
}

/// Needs `target_quantity`, `claimed_quantity` and `active_claims` columns.
fn availability_from_row(item_id: CatalogItemId, row: &PgRow) -> Result<ItemAvailability, LedgerError> {
    let target_quantity = u32_column(row, "target_quantity")?;
    let claimed_quantity = u32_column(row, "claimed_quantity")?;
    let active_claims = u32_column(row, "active_claims")?;
    Ok(ItemAvailability {
        item_id,
        target_quantity,
        claimed_quantity,
        available: target_quantity.saturating_sub(claimed_quantity),
        active_claims: active_claims as usize,
    })
}

fn u32_column(row: &PgRow, column: &str) -> Result<u32, LedgerError> {
    let value: i64 = row
        .try_get(column)
        .map_err(|e| map_sqlx_error("decode", e))?;
    u32::try_from(value).map_err(|_| LedgerError::Corrupted(format!("{column} out of range: {value}")))
}

fn quantity_column(row: &PgRow, column: &str) -> Result<Quantity, LedgerError> {
    let value: i64 = row
        .try_get(column)
        .map_err(|e| map_sqlx_error("decode", e))?;
    Quantity::try_from(value)
        .map_err(|_| LedgerError::Corrupted(format!("{column} is not a positive quantity: {value}")))
}

fn version_column(row: &PgRow) -> Result<u64, LedgerError> {
    let value: i64 = row
        .try_get("version")
        .map_err(|e| map_sqlx_error("decode", e))?;
    u64::try_from(value).map_err(|_| LedgerError::Corrupted(format!("negative version: {value}")))
}

/// Map SQLx errors to ledger errors.
///
/// Anything that means "the statement may not have run" is `StorageUnavailable`
/// and therefore retryable by the service.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> LedgerError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23514") => LedgerError::Corrupted(msg),
                _ => LedgerError::StorageUnavailable(msg),
            }
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_) => {
            LedgerError::Corrupted(format!("failed to decode row in {}: {}", operation, err))
        }
        sqlx::Error::PoolClosed => {
            LedgerError::StorageUnavailable(format!("connection pool closed in {}", operation))
        }
        sqlx::Error::PoolTimedOut => {
            LedgerError::StorageUnavailable(format!("connection pool timed out in {}", operation))
        }
        _ => LedgerError::StorageUnavailable(format!("sqlx error in {}: {}", operation, err)),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_failures_are_retryable() {
        assert!(matches!(
            map_sqlx_error("try_claim", sqlx::Error::PoolTimedOut),
            LedgerError::StorageUnavailable(_)
        ));
        assert!(matches!(
            map_sqlx_error("try_claim", sqlx::Error::PoolClosed),
            LedgerError::StorageUnavailable(_)
        ));
    }

    #[test]
    fn decode_failures_are_not_retryable() {
        let err = map_sqlx_error("decode", sqlx::Error::ColumnNotFound("quantity".to_string()));
        assert!(matches!(err, LedgerError::Corrupted(_)));
    }

    #[test]
    fn migration_declares_the_capacity_constraint() {
        assert!(MIGRATION.contains("claimed_quantity <= target_quantity"));
        assert!(MIGRATION.contains("claims_active_request_key"));
    }
}
