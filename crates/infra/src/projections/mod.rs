//! Projections (read model builders).
//!
//! Projections consume published registry envelopes and build query-optimized
//! read models. They are rebuildable, isolated per planned event, and
//! idempotent under at-least-once delivery.

pub mod registry_board;

pub use registry_board::{BoardProjectionError, RegistryBoardEntry, RegistryBoardProjection};
