//! Gift registry domain module.
//!
//! Business rules for reservable catalog items and the claims guests place
//! against them, implemented as deterministic domain logic (no IO, no HTTP,
//! no storage). Callers provide atomicity by executing commands against a
//! `CatalogItem` they hold exclusively.

pub mod catalog;
pub mod claim;
pub mod error;
pub mod quantity;

pub use catalog::{
    CatalogEntry, CatalogItem, ClaimAccepted, ClaimQuantity, ClaimReleased, ItemAvailability,
    ItemListed, ItemSummary, ListItem, RegistryCommand, RegistryEvent, ReleaseClaim, SetTargetQuantity,
    TargetQuantityChanged, non_blank,
};
pub use claim::{Claim, ClaimStatus};
pub use error::{RejectionKind, ReservationError};
pub use quantity::Quantity;
