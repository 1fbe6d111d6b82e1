//! Entity trait: records the API addresses by identifier.

/// Entity marker + minimal interface.
///
/// Every record served from a `/{collection}/{id}/` endpoint implements this so
/// generic resource clients can build detail paths without knowing the type.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug + core::fmt::Display;

    /// Returns the entity identifier.
    fn id(&self) -> Self::Id;
}
