//! Entities live inside an aggregate and keep their identity while their
//! attributes change (an item's sizes, for example).

pub trait Entity {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;
}
