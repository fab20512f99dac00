//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
pub trait Entity {
    /// Strongly-typed entity identifier.
    ///
    /// Ordered so stores can return deterministic listings (insertion order).
    type Id: Copy + Eq + Ord + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> Self::Id;
}

/// Sort a collection of entities by identifier (ascending).
pub fn sort_by_id<E: Entity>(items: &mut [E]) {
    items.sort_by_key(|e| e.id());
}
