//! Value objects: compared by their attributes, never by identity.
//!
//! A requested stock quantity is a value object; an item size is not (it is an
//! [`Entity`](crate::Entity) that keeps its id while its counters move).

/// Marker for immutable, value-compared domain types.
///
/// Constructors are expected to validate, so holding an instance means the
/// value is already known to be well formed.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
