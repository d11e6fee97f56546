//! Typed rejections produced by the registry domain.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::claim::ClaimStatus;

/// Outward-facing classification of a rejection.
///
/// Serialized in PascalCase (`"Oversubscribed"`, `"InvalidQuantity"`, ...)
/// because that is the `kind` field clients branch on.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RejectionKind {
    InvalidQuantity,
    Oversubscribed,
    NotFound,
    TargetLocked,
    Conflict,
    Validation,
}

impl RejectionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RejectionKind::InvalidQuantity => "InvalidQuantity",
            RejectionKind::Oversubscribed => "Oversubscribed",
            RejectionKind::NotFound => "NotFound",
            RejectionKind::TargetLocked => "TargetLocked",
            RejectionKind::Conflict => "Conflict",
            RejectionKind::Validation => "Validation",
        }
    }
}

impl core::fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Business rejection of a registry command.
///
/// These are expected outcomes, not faults: `Oversubscribed` in particular is
/// a normal answer to a guest who lost the race for the last unit.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReservationError {
    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("oversubscribed: only {available} available")]
    Oversubscribed { available: u32 },

    #[error("catalog item not found")]
    ItemNotFound,

    #[error("claim not found or already released")]
    ClaimNotFound,

    #[error("target quantity is locked while {claimed} unit(s) are claimed")]
    TargetLocked { claimed: u32 },

    #[error("catalog item already exists")]
    ItemExists,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("illegal claim transition from {from} to {to}")]
    IllegalTransition { from: ClaimStatus, to: ClaimStatus },
}

impl ReservationError {
    pub fn invalid_quantity(msg: impl Into<String>) -> Self {
        Self::InvalidQuantity(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn kind(&self) -> RejectionKind {
        match self {
            ReservationError::InvalidQuantity(_) => RejectionKind::InvalidQuantity,
            ReservationError::Oversubscribed { .. } => RejectionKind::Oversubscribed,
            ReservationError::ItemNotFound | ReservationError::ClaimNotFound => RejectionKind::NotFound,
            ReservationError::TargetLocked { .. } => RejectionKind::TargetLocked,
            ReservationError::ItemExists | ReservationError::IllegalTransition { .. } => {
                RejectionKind::Conflict
            }
            ReservationError::Validation(_) => RejectionKind::Validation,
        }
    }

    /// Remaining capacity reported with the rejection, if any.
    pub fn available(&self) -> Option<u32> {
        match self {
            ReservationError::Oversubscribed { available } => Some(*available),
            _ => None,
        }
    }
}
