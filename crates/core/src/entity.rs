//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// A claim is an entity: it keeps its identity from acceptance to release even
/// though its status changes.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
