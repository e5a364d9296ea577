//! Brands domain module (event-sourced).
//!
//! A brand groups merchandise items. Items reference their owning brand by
//! [`BrandId`]; stock itself lives in the inventory crate.

pub mod brand;

pub use brand::{
    Brand, BrandActivationChanged, BrandCommand, BrandCreated, BrandDeleted, BrandEvent, BrandId,
    BrandPinChanged, BrandUpdated, CreateBrand, DeleteBrand, SetBrandActive, SetBrandPinned,
    UpdateBrand,
};

/// Aggregate type tag used for brand streams in the event store.
pub const AGGREGATE_TYPE: &str = "brands.brand";
