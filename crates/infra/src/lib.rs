//! Infrastructure layer: ledger backends, reservation service, projections, config.

pub mod config;
pub mod ledger;
pub mod projections;
pub mod read_model;
pub mod reservation_service;

pub use config::{ConfigError, RegistryConfig, StorageConfig};
pub use ledger::{
    Committed, InMemoryLedger, LedgerError, PostgresLedger, PublishingLedger, ReservationLedger,
};
pub use reservation_service::{ClaimError, ClaimRequest, NewItem, ReservationService, RetryPolicy};
