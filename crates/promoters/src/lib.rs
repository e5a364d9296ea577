//! Promoters domain module (event-sourced).
//!
//! Promoters are the field staff that receive merchandise. What a promoter
//! currently holds is derived from stock movements in the inventory crate,
//! not stored on the promoter itself.

pub mod promoter;

pub use promoter::{
    ContactDetails, CreatePromoter, DeletePromoter, Promoter, PromoterActivationChanged,
    PromoterCommand, PromoterCreated, PromoterDeleted, PromoterEvent, PromoterId,
    PromoterUpdated, SetPromoterActive, UpdatePromoter,
};

/// Aggregate type tag used for promoter streams in the event store.
pub const AGGREGATE_TYPE: &str = "promoters.promoter";
